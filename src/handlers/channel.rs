//! Channel verbs: JOIN, PART, KICK, INVITE, TOPIC.

use std::sync::Arc;

use async_trait::async_trait;
use ferric_proto::{ChannelExt, Message, Reply};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::HandlerResult;
use crate::handlers::{Context, Handler};
use crate::state::{Channel, Topic};

/// JOIN `<channels>[ <keys>]`, plus the `JOIN 0` part-all special case.
pub struct JoinHandler;

#[async_trait]
impl Handler for JoinHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Some(channels) = msg.arg(0) else {
            return ctx
                .send_reply(Reply::err_needmoreparams(&ctx.nick, "JOIN"))
                .await;
        };
        if channels == "0" {
            return part_all(ctx).await;
        }
        let keys: Vec<&str> = msg.arg(1).map(|k| k.split(',').collect()).unwrap_or_default();

        for (i, name) in channels.split(',').enumerate() {
            if name.is_empty() {
                continue;
            }
            if !name.is_channel_name() {
                ctx.send_reply(Reply::err_nosuchchannel(&ctx.nick, name))
                    .await?;
                continue;
            }
            let key = keys.get(i).copied().filter(|k| !k.is_empty());
            join_one(ctx, name, key).await?;
        }
        Ok(())
    }
}

async fn join_one(ctx: &mut Context<'_>, name: &str, key: Option<&str>) -> HandlerResult {
    let uid = ctx.uid.to_string();
    let nick = ctx.nick.clone();

    // Get-or-create under the map entry so concurrent first joins cannot
    // race a second creator. The creator is seated as initial operator by
    // `Channel::new`.
    let mut created = false;
    let channel = match ctx.hub.channels.entry(name.to_string()) {
        dashmap::mapref::entry::Entry::Occupied(e) => e.get().clone(),
        dashmap::mapref::entry::Entry::Vacant(e) => {
            let fresh = Arc::new(RwLock::new(Channel::new(name.to_string(), &uid, &nick)));
            e.insert(fresh.clone());
            created = true;
            debug!(channel = %name, creator = %nick, "channel created");
            fresh
        }
    };

    let newly_added = if created {
        true
    } else {
        let mut ch = channel.write().await;
        match ch.try_add_member(&uid, &nick, key) {
            Ok(added) => added,
            Err(e) => {
                let server = ctx.server_name().to_string();
                drop(ch);
                return ctx.send(e.to_reply(&server, &nick, name)).await;
            }
        }
    };
    if !newly_added {
        return Ok(());
    }

    if let Some(session) = ctx.hub.session(&uid) {
        session.write().await.channels.insert(name.to_string());
    }

    if let Some(mask) = ctx.mask().await {
        let join = Message::new("JOIN", vec![name.to_string()]).with_prefix(mask);
        ctx.hub.broadcast_channel(name, join, None).await;
    }

    send_topic_reply(ctx, name).await?;
    send_names_reply(ctx, name).await?;
    ctx.hub.bots.on_join(ctx.hub, &uid, &nick, name).await;
    Ok(())
}

/// PART `<channels> [:msg]`.
pub struct PartHandler;

#[async_trait]
impl Handler for PartHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Some(channels) = msg.arg(0) else {
            return ctx
                .send_reply(Reply::err_needmoreparams(&ctx.nick, "PART"))
                .await;
        };
        let reason = msg.arg(1).map(str::to_string);
        for name in channels.split(',') {
            if name.is_empty() {
                continue;
            }
            part_one(ctx, name, reason.as_deref()).await?;
        }
        Ok(())
    }
}

async fn part_one(ctx: &mut Context<'_>, name: &str, reason: Option<&str>) -> HandlerResult {
    let uid = ctx.uid.to_string();
    let nick = ctx.nick.clone();

    let Some(channel) = ctx.hub.channel(name) else {
        return ctx
            .send_reply(Reply::err_nosuchchannel(&ctx.nick, name))
            .await;
    };
    if !channel.read().await.is_member(&uid) {
        return ctx
            .send_reply(Reply::err_notonchannel(&ctx.nick, name))
            .await;
    }

    let mut params = vec![name.to_string()];
    if let Some(reason) = reason {
        params.push(reason.to_string());
    }
    if let Some(mask) = ctx.mask().await {
        let part = Message::new("PART", params).with_prefix(mask);
        ctx.hub.broadcast_channel(name, part, None).await;
    }

    channel.write().await.remove_member(&uid, &nick);
    if let Some(session) = ctx.hub.session(&uid) {
        session.write().await.channels.remove(name);
    }
    // The periodic sweep would also catch this; removing inline keeps the
    // window short.
    ctx.hub.channels.remove_if(name, |_, ch| {
        ch.try_read().map(|c| c.members.is_empty()).unwrap_or(false)
    });
    ctx.hub.bots.on_part(ctx.hub, &uid, &nick, name).await;
    Ok(())
}

/// `JOIN 0`: part every joined channel.
async fn part_all(ctx: &mut Context<'_>) -> HandlerResult {
    let joined: Vec<String> = match ctx.hub.session(ctx.uid) {
        Some(session) => session.read().await.channels.iter().cloned().collect(),
        None => return Ok(()),
    };
    for name in joined {
        part_one(ctx, &name, None).await?;
    }
    Ok(())
}

/// KICK `<chan> <nick> [:reason]` - operator only.
pub struct KickHandler;

#[async_trait]
impl Handler for KickHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let (Some(name), Some(target_nick)) = (msg.arg(0), msg.arg(1)) else {
            return ctx
                .send_reply(Reply::err_needmoreparams(&ctx.nick, "KICK"))
                .await;
        };
        let reason = msg.arg(2).unwrap_or(&ctx.nick).to_string();

        let Some(channel) = ctx.hub.channel(name) else {
            return ctx
                .send_reply(Reply::err_nosuchchannel(&ctx.nick, name))
                .await;
        };
        let target_uid = {
            let ch = channel.read().await;
            if !ch.is_member(ctx.uid) {
                drop(ch);
                return ctx
                    .send_reply(Reply::err_notonchannel(&ctx.nick, name))
                    .await;
            }
            if !ch.is_operator(&ctx.nick) {
                drop(ch);
                return ctx
                    .send_reply(Reply::err_chanoprivsneeded(&ctx.nick, name))
                    .await;
            }
            let target_uid = ctx.hub.resolve_nick(target_nick);
            match target_uid {
                Some(uid) if ch.is_member(&uid) => uid,
                _ => {
                    drop(ch);
                    return ctx
                        .send_reply(Reply::err_usernotinchannel(&ctx.nick, target_nick, name))
                        .await;
                }
            }
        };

        if let Some(mask) = ctx.mask().await {
            let kick = Message::new(
                "KICK",
                vec![name.to_string(), target_nick.to_string(), reason],
            )
            .with_prefix(mask);
            ctx.hub.broadcast_channel(name, kick, None).await;
        }

        channel.write().await.remove_member(&target_uid, target_nick);
        if let Some(session) = ctx.hub.session(&target_uid) {
            session.write().await.channels.remove(name);
        }
        debug!(channel = %name, by = %ctx.nick, target = %target_nick, "kick");
        Ok(())
    }
}

/// INVITE `<nick> <chan>`.
pub struct InviteHandler;

#[async_trait]
impl Handler for InviteHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let (Some(target_nick), Some(name)) = (msg.arg(0), msg.arg(1)) else {
            return ctx
                .send_reply(Reply::err_needmoreparams(&ctx.nick, "INVITE"))
                .await;
        };
        let Some(target_uid) = ctx.hub.resolve_nick(target_nick) else {
            return ctx
                .send_reply(Reply::err_nosuchnick(&ctx.nick, target_nick))
                .await;
        };
        let Some(channel) = ctx.hub.channel(name) else {
            return ctx
                .send_reply(Reply::err_nosuchchannel(&ctx.nick, name))
                .await;
        };

        {
            let mut ch = channel.write().await;
            if !ch.is_member(ctx.uid) {
                drop(ch);
                return ctx
                    .send_reply(Reply::err_notonchannel(&ctx.nick, name))
                    .await;
            }
            // Only invite-only channels restrict inviting to operators.
            if ch.modes.invite_only && !ch.is_operator(&ctx.nick) {
                drop(ch);
                return ctx
                    .send_reply(Reply::err_chanoprivsneeded(&ctx.nick, name))
                    .await;
            }
            if ch.is_member(&target_uid) {
                drop(ch);
                return ctx
                    .send_reply(Reply::err_useronchannel(&ctx.nick, target_nick, name))
                    .await;
            }
            ch.invited.insert(target_nick.to_string());
        }

        ctx.send_reply(Reply::RPL_INVITING.msg(vec![
            ctx.nick.clone(),
            target_nick.to_string(),
            name.to_string(),
        ]))
        .await?;

        if let Some(mask) = ctx.mask().await {
            let invite = Message::new(
                "INVITE",
                vec![target_nick.to_string(), name.to_string()],
            )
            .with_prefix(mask);
            ctx.hub.send_to_uid(&target_uid, invite).await;
        }
        Ok(())
    }
}

/// TOPIC `<chan> [:topic]` - view, or set subject to +t.
pub struct TopicHandler;

#[async_trait]
impl Handler for TopicHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Some(name) = msg.arg(0) else {
            return ctx
                .send_reply(Reply::err_needmoreparams(&ctx.nick, "TOPIC"))
                .await;
        };
        let Some(channel) = ctx.hub.channel(name) else {
            return ctx
                .send_reply(Reply::err_nosuchchannel(&ctx.nick, name))
                .await;
        };
        if !channel.read().await.is_member(ctx.uid) {
            return ctx
                .send_reply(Reply::err_notonchannel(&ctx.nick, name))
                .await;
        }

        match msg.arg(1) {
            None => send_topic_reply(ctx, name).await,
            Some(text) => {
                {
                    let mut ch = channel.write().await;
                    if ch.modes.topic_restricted && !ch.is_operator(&ctx.nick) {
                        drop(ch);
                        return ctx
                            .send_reply(Reply::err_chanoprivsneeded(&ctx.nick, name))
                            .await;
                    }
                    ch.topic = if text.is_empty() {
                        None
                    } else {
                        Some(Topic {
                            text: text.to_string(),
                            set_by: ctx.nick.clone(),
                            set_at: chrono::Utc::now().timestamp(),
                        })
                    };
                }
                if let Some(mask) = ctx.mask().await {
                    let topic = Message::new(
                        "TOPIC",
                        vec![name.to_string(), text.to_string()],
                    )
                    .with_prefix(mask);
                    ctx.hub.broadcast_channel(name, topic, None).await;
                }
                Ok(())
            }
        }
    }
}

/// 331 or 332 for one channel.
pub(super) async fn send_topic_reply(ctx: &Context<'_>, name: &str) -> HandlerResult {
    let Some(channel) = ctx.hub.channel(name) else {
        return Ok(());
    };
    let topic = channel.read().await.topic.clone();
    match topic {
        Some(topic) => {
            ctx.send_reply(Reply::RPL_TOPIC.msg(vec![
                ctx.nick.clone(),
                name.to_string(),
                topic.text,
            ]))
            .await
        }
        None => {
            ctx.send_reply(Reply::RPL_NOTOPIC.msg(vec![
                ctx.nick.clone(),
                name.to_string(),
                "No topic is set".to_string(),
            ]))
            .await
        }
    }
}

/// 353 RPL_NAMREPLY (operators prefixed `@`) followed by 366.
pub(super) async fn send_names_reply(ctx: &Context<'_>, name: &str) -> HandlerResult {
    let Some(channel) = ctx.hub.channel(name) else {
        return Ok(());
    };
    let (members, operators) = {
        let ch = channel.read().await;
        (ch.members.clone(), ch.operators.clone())
    };

    let mut names = Vec::with_capacity(members.len());
    for uid in &members {
        let Some(session) = ctx.hub.session(uid) else {
            continue;
        };
        let nick = session.read().await.nick.clone();
        if operators.contains(&nick) {
            names.push(format!("@{nick}"));
        } else {
            names.push(nick);
        }
    }

    ctx.send_reply(Reply::RPL_NAMREPLY.msg(vec![
        ctx.nick.clone(),
        "=".to_string(),
        name.to_string(),
        names.join(" "),
    ]))
    .await?;
    ctx.send_reply(Reply::RPL_ENDOFNAMES.msg(vec![
        ctx.nick.clone(),
        name.to_string(),
        "End of /NAMES list".to_string(),
    ]))
    .await
}
