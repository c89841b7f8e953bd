//! WHO, WHOIS, and MOTD.

use async_trait::async_trait;
use ferric_proto::{ChannelExt, Message, Reply};

use crate::error::HandlerResult;
use crate::handlers::connection::send_motd;
use crate::handlers::{Context, Handler};
use crate::state::Uid;

pub struct WhoHandler;

#[async_trait]
impl Handler for WhoHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let mask = msg.arg(0).unwrap_or("*").to_string();

        if mask.is_channel_name() {
            who_channel(ctx, &mask).await?;
        } else if mask == "*" || mask == "0" {
            who_all(ctx).await?;
        } else {
            who_nick(ctx, &mask).await?;
        }

        ctx.send_reply(Reply::RPL_ENDOFWHO.msg(vec![
            ctx.nick.clone(),
            mask,
            "End of WHO list".to_string(),
        ]))
        .await
    }
}

async fn who_channel(ctx: &Context<'_>, name: &str) -> HandlerResult {
    let Some(channel) = ctx.hub.channel(name) else {
        return Ok(());
    };
    let (members, operators) = {
        let ch = channel.read().await;
        (ch.members.clone(), ch.operators.clone())
    };
    for uid in members {
        let Some(session) = ctx.hub.session(&uid) else {
            continue;
        };
        let s = session.read().await;
        let mut flags = if s.away.is_some() { "G" } else { "H" }.to_string();
        if operators.contains(&s.nick) {
            flags.push('@');
        }
        send_who_reply(ctx, name, &s.user, &s.host, &s.nick, &flags, &s.realname).await?;
    }
    Ok(())
}

async fn who_all(ctx: &Context<'_>) -> HandlerResult {
    let uids: Vec<Uid> = ctx.hub.users.iter().map(|e| e.key().clone()).collect();
    for uid in uids {
        let Some(session) = ctx.hub.session(&uid) else {
            continue;
        };
        let s = session.read().await;
        let flags = if s.away.is_some() { "G" } else { "H" };
        send_who_reply(ctx, "*", &s.user, &s.host, &s.nick, flags, &s.realname).await?;
    }
    Ok(())
}

async fn who_nick(ctx: &Context<'_>, nick: &str) -> HandlerResult {
    let Some(uid) = ctx.hub.resolve_nick(nick) else {
        return Ok(());
    };
    let Some(session) = ctx.hub.session(&uid) else {
        return Ok(());
    };
    let s = session.read().await;
    let flags = if s.away.is_some() { "G" } else { "H" };
    send_who_reply(ctx, "*", &s.user, &s.host, &s.nick, flags, &s.realname).await
}

async fn send_who_reply(
    ctx: &Context<'_>,
    channel: &str,
    user: &str,
    host: &str,
    nick: &str,
    flags: &str,
    realname: &str,
) -> HandlerResult {
    ctx.send_reply(Reply::RPL_WHOREPLY.msg(vec![
        ctx.nick.clone(),
        channel.to_string(),
        user.to_string(),
        host.to_string(),
        ctx.server_name().to_string(),
        nick.to_string(),
        flags.to_string(),
        format!("0 {realname}"),
    ]))
    .await
}

pub struct WhoisHandler;

#[async_trait]
impl Handler for WhoisHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Some(target) = msg.arg(0) else {
            return ctx.send_reply(Reply::err_nonicknamegiven(&ctx.nick)).await;
        };

        let end = Reply::RPL_ENDOFWHOIS.msg(vec![
            ctx.nick.clone(),
            target.to_string(),
            "End of /WHOIS list".to_string(),
        ]);

        let session = ctx.hub.resolve_nick(target).and_then(|uid| ctx.hub.session(&uid));
        let Some(session) = session else {
            ctx.send_reply(Reply::err_nosuchnick(&ctx.nick, target)).await?;
            return ctx.send_reply(end).await;
        };

        let (user, host, realname, away, joined) = {
            let s = session.read().await;
            (
                s.user.clone(),
                s.host.clone(),
                s.realname.clone(),
                s.away.clone(),
                s.channels.iter().cloned().collect::<Vec<_>>(),
            )
        };

        ctx.send_reply(Reply::RPL_WHOISUSER.msg(vec![
            ctx.nick.clone(),
            target.to_string(),
            user,
            host,
            "*".to_string(),
            realname,
        ]))
        .await?;

        if !joined.is_empty() {
            let mut entries = Vec::with_capacity(joined.len());
            for name in &joined {
                let is_op = match ctx.hub.channel(name) {
                    Some(ch) => ch.read().await.is_operator(target),
                    None => false,
                };
                entries.push(if is_op {
                    format!("@{name}")
                } else {
                    name.clone()
                });
            }
            ctx.send_reply(Reply::RPL_WHOISCHANNELS.msg(vec![
                ctx.nick.clone(),
                target.to_string(),
                entries.join(" "),
            ]))
            .await?;
        }

        ctx.send_reply(Reply::RPL_WHOISSERVER.msg(vec![
            ctx.nick.clone(),
            target.to_string(),
            ctx.server_name().to_string(),
            format!("{} server", ctx.hub.info.network),
        ]))
        .await?;

        if let Some(away_msg) = away {
            ctx.send_reply(Reply::RPL_AWAY.msg(vec![
                ctx.nick.clone(),
                target.to_string(),
                away_msg,
            ]))
            .await?;
        }

        ctx.send_reply(end).await
    }
}

pub struct MotdHandler;

#[async_trait]
impl Handler for MotdHandler {
    async fn handle(&self, ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        send_motd(ctx).await
    }
}
