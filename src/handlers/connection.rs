//! Connection-maintenance verbs and the welcome burst.
//!
//! PASS/NICK/USER here are the post-registration variants; the handshake
//! state machine in `network::connection` owns them before registration.

use async_trait::async_trait;
use ferric_proto::{is_valid_nick, Message, Reply};
use tracing::debug;

use crate::error::{HandlerError, HandlerResult};
use crate::handlers::{Context, Handler};

/// PASS after registration: 462.
pub struct PassHandler;

#[async_trait]
impl Handler for PassHandler {
    async fn handle(&self, ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        ctx.send_reply(Reply::err_alreadyregistred(&ctx.nick)).await
    }
}

/// USER after registration: 462.
pub struct UserHandler;

#[async_trait]
impl Handler for UserHandler {
    async fn handle(&self, ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        ctx.send_reply(Reply::err_alreadyregistred(&ctx.nick)).await
    }
}

/// NICK change by a registered client: validates, swaps the index
/// atomically, and broadcasts one copy per observer.
pub struct NickHandler;

#[async_trait]
impl Handler for NickHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Some(new_nick) = msg.arg(0) else {
            return ctx.send_reply(Reply::err_nonicknamegiven(&ctx.nick)).await;
        };
        if !is_valid_nick(new_nick) {
            return ctx
                .send_reply(Reply::err_erroneusnickname(&ctx.nick, new_nick))
                .await;
        }
        if new_nick == ctx.nick {
            return Ok(());
        }
        let uid = ctx.uid.to_string();
        if !ctx.hub.change_nick(&uid, new_nick).await {
            return ctx
                .send_reply(Reply::err_nicknameinuse(&ctx.nick, new_nick))
                .await;
        }
        ctx.nick = new_nick.to_string();
        Ok(())
    }
}

/// QUIT: unwinds the connection through the event loop.
pub struct QuitHandler;

#[async_trait]
impl Handler for QuitHandler {
    fn needs_registration(&self) -> bool {
        false
    }

    async fn handle(&self, _ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        Err(HandlerError::Quit(msg.arg(0).map(str::to_string)))
    }
}

/// PING: `:server PONG server :<token>`.
pub struct PingHandler;

#[async_trait]
impl Handler for PingHandler {
    fn needs_registration(&self) -> bool {
        false
    }

    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Some(token) = msg.arg(0) else {
            return ctx.send_reply(Reply::err_noorigin(&ctx.nick)).await;
        };
        let server = ctx.server_name().to_string();
        ctx.send_reply(Message::new("PONG", vec![server, token.to_string()]))
            .await
    }
}

/// PONG: nothing beyond the activity touch the event loop already does.
pub struct PongHandler;

#[async_trait]
impl Handler for PongHandler {
    fn needs_registration(&self) -> bool {
        false
    }

    async fn handle(&self, _ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        Ok(())
    }
}

/// CAP stub: LS/LIST advertise the empty set, REQ is NAKed, END is a
/// no-op. Never advances the registration state machine.
pub struct CapHandler;

#[async_trait]
impl Handler for CapHandler {
    fn needs_registration(&self) -> bool {
        false
    }

    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let target = if ctx.nick.is_empty() {
            "*".to_string()
        } else {
            ctx.nick.clone()
        };
        match msg.arg(0).map(str::to_ascii_uppercase).as_deref() {
            Some("LS") | Some("LIST") => {
                let sub = msg.arg(0).map(str::to_ascii_uppercase).unwrap_or_default();
                ctx.send_reply(Message::new("CAP", vec![target, sub, String::new()]))
                    .await
            }
            Some("REQ") => {
                let requested = msg.arg(1).unwrap_or_default().to_string();
                ctx.send_reply(Message::new(
                    "CAP",
                    vec![target, "NAK".to_string(), requested],
                ))
                .await
            }
            _ => Ok(()), // END and anything else
        }
    }
}

/// Send 001-004 plus the MOTD block after registration completes.
pub async fn send_welcome_burst(ctx: &Context<'_>) -> HandlerResult {
    let (user, host) = {
        let Some(session) = ctx.hub.session(ctx.uid) else {
            return Ok(());
        };
        let s = session.read().await;
        (s.user.clone(), s.host.clone())
    };
    let nick = ctx.nick.clone();
    let info = &ctx.hub.info;

    ctx.send_reply(Reply::RPL_WELCOME.msg(vec![
        nick.clone(),
        format!(
            "Welcome to the Internet Relay Network {}!{}@{}",
            nick, user, host
        ),
    ]))
    .await?;
    ctx.send_reply(Reply::RPL_YOURHOST.msg(vec![
        nick.clone(),
        format!("Your host is {}, running version {}", info.name, info.version),
    ]))
    .await?;
    ctx.send_reply(Reply::RPL_CREATED.msg(vec![
        nick.clone(),
        format!("This server was created {}", info.created),
    ]))
    .await?;
    ctx.send_reply(Reply::RPL_MYINFO.msg(vec![
        nick.clone(),
        info.name.clone(),
        info.version.clone(),
        "o".to_string(),
        "itkl".to_string(),
    ]))
    .await?;

    send_motd(ctx).await?;
    debug!(uid = %ctx.uid, nick = %nick, "welcome burst sent");
    Ok(())
}

/// The 375/372/376 MOTD block.
pub async fn send_motd(ctx: &Context<'_>) -> HandlerResult {
    let nick = ctx.nick.clone();
    let info = &ctx.hub.info;
    ctx.send_reply(Reply::RPL_MOTDSTART.msg(vec![
        nick.clone(),
        format!("- {} Message of the day - ", info.name),
    ]))
    .await?;
    for line in &info.motd {
        ctx.send_reply(Reply::RPL_MOTD.msg(vec![nick.clone(), format!("- {line}")]))
            .await?;
    }
    ctx.send_reply(Reply::RPL_ENDOFMOTD.msg(vec![
        nick,
        "End of /MOTD command".to_string(),
    ]))
    .await
}
