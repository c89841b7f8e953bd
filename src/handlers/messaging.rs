//! PRIVMSG, NOTICE, and AWAY.
//!
//! Channel targets fan out to every member except the sender; user targets
//! deliver to that session, with 301 echoed for away targets. NOTICE takes
//! the same path but never emits error numerics. Messages addressed to a
//! reserved bot nickname are consumed by the bot instead.

use async_trait::async_trait;
use ferric_proto::{ChannelExt, Message, Reply};
use tracing::debug;

use crate::error::HandlerResult;
use crate::handlers::{Context, Handler};

pub struct PrivmsgHandler;

#[async_trait]
impl Handler for PrivmsgHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        route(ctx, msg, "PRIVMSG").await
    }
}

pub struct NoticeHandler;

#[async_trait]
impl Handler for NoticeHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        route(ctx, msg, "NOTICE").await
    }
}

async fn route(ctx: &mut Context<'_>, msg: &Message, verb: &str) -> HandlerResult {
    let silent = verb == "NOTICE";

    let targets = match msg.arg(0) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => {
            if silent {
                return Ok(());
            }
            return ctx.send_reply(Reply::err_norecipient(&ctx.nick, verb)).await;
        }
    };
    let text = match msg.arg(1) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => {
            if silent {
                return Ok(());
            }
            return ctx.send_reply(Reply::err_notexttosend(&ctx.nick)).await;
        }
    };

    for target in targets.split(',') {
        if target.is_empty() {
            continue;
        }
        if ctx.hub.bots.is_bot(target) {
            if !silent {
                let uid = ctx.uid.to_string();
                let nick = ctx.nick.clone();
                ctx.hub
                    .bots
                    .on_message(ctx.hub, &uid, &nick, target, &text)
                    .await;
            }
            continue;
        }
        if target.is_channel_name() {
            route_to_channel(ctx, verb, target, &text, silent).await?;
        } else {
            route_to_user(ctx, verb, target, &text, silent).await?;
        }
    }
    Ok(())
}

async fn route_to_channel(
    ctx: &Context<'_>,
    verb: &str,
    target: &str,
    text: &str,
    silent: bool,
) -> HandlerResult {
    let Some(channel) = ctx.hub.channel(target) else {
        if silent {
            return Ok(());
        }
        return ctx
            .send_reply(Reply::err_nosuchchannel(&ctx.nick, target))
            .await;
    };
    if !channel.read().await.is_member(ctx.uid) {
        if silent {
            return Ok(());
        }
        return ctx
            .send_reply(Reply::err_cannotsendtochan(&ctx.nick, target))
            .await;
    }

    let Some(mask) = ctx.mask().await else {
        return Ok(());
    };
    let out = Message::new(verb, vec![target.to_string(), text.to_string()]).with_prefix(mask);
    ctx.hub.broadcast_channel(target, out, Some(ctx.uid)).await;
    debug!(from = %ctx.nick, to = %target, "{verb} to channel");
    Ok(())
}

async fn route_to_user(
    ctx: &Context<'_>,
    verb: &str,
    target: &str,
    text: &str,
    silent: bool,
) -> HandlerResult {
    let Some(target_uid) = ctx.hub.resolve_nick(target) else {
        if silent {
            return Ok(());
        }
        return ctx.send_reply(Reply::err_nosuchnick(&ctx.nick, target)).await;
    };
    let Some(session) = ctx.hub.session(&target_uid) else {
        if silent {
            return Ok(());
        }
        return ctx.send_reply(Reply::err_nosuchnick(&ctx.nick, target)).await;
    };

    let away = session.read().await.away.clone();
    if let Some(away_msg) = away {
        if !silent {
            ctx.send_reply(Reply::RPL_AWAY.msg(vec![
                ctx.nick.clone(),
                target.to_string(),
                away_msg,
            ]))
            .await?;
        }
    }

    let Some(mask) = ctx.mask().await else {
        return Ok(());
    };
    let out = Message::new(verb, vec![target.to_string(), text.to_string()]).with_prefix(mask);
    ctx.hub.send_to_uid(&target_uid, out).await;
    debug!(from = %ctx.nick, to = %target, "{verb} to user");
    Ok(())
}

/// AWAY `[:message]` - set or clear the away flag.
pub struct AwayHandler;

#[async_trait]
impl Handler for AwayHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Some(session) = ctx.hub.session(ctx.uid) else {
            return Ok(());
        };
        match msg.arg(0) {
            Some(text) if !text.is_empty() => {
                session.write().await.away = Some(text.to_string());
                ctx.send_reply(Reply::rpl_nowaway(&ctx.nick)).await
            }
            _ => {
                session.write().await.away = None;
                ctx.send_reply(Reply::rpl_unaway(&ctx.nick)).await
            }
        }
    }
}
