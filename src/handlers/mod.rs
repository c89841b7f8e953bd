//! Command dispatch: one handler per verb, dispatched by uppercase command.

mod channel;
mod connection;
mod dcc;
mod messaging;
mod mode;
mod user_query;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ferric_proto::{Message, Prefix, Reply};
use tokio::sync::mpsc;

use crate::error::{HandlerError, HandlerResult};
use crate::state::Hub;

pub use connection::send_welcome_burst;

/// Per-command context handed to handlers.
pub struct Context<'a> {
    pub uid: &'a str,
    /// Nick snapshot taken at dispatch time.
    pub nick: String,
    pub hub: &'a Arc<Hub>,
    /// This connection's egress queue.
    pub sender: &'a mpsc::Sender<Message>,
    pub registered: bool,
}

impl Context<'_> {
    pub fn server_name(&self) -> &str {
        &self.hub.info.name
    }

    /// Queue a message on this connection's egress.
    pub async fn send(&self, msg: Message) -> HandlerResult {
        self.sender.send(msg).await?;
        Ok(())
    }

    /// Queue a message with the server-name prefix attached.
    pub async fn send_reply(&self, msg: Message) -> HandlerResult {
        self.send(msg.with_prefix(Prefix::Server(self.server_name().to_string())))
            .await
    }

    /// Queue a server NOTICE addressed to this client.
    pub async fn notice(&self, text: &str) -> HandlerResult {
        self.send_reply(Message::new(
            "NOTICE",
            vec![self.nick.clone(), text.to_string()],
        ))
        .await
    }

    /// This session's `nick!user@host` prefix.
    pub async fn mask(&self) -> Option<Prefix> {
        let session = self.hub.session(self.uid)?;
        let s = session.read().await;
        Some(s.mask())
    }
}

/// A command handler.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Commands outside the registration handshake require a registered
    /// session; the dispatcher answers 451 otherwise.
    fn needs_registration(&self) -> bool {
        true
    }

    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult;
}

/// Verb → handler table.
pub struct Dispatcher {
    handlers: HashMap<&'static str, Box<dyn Handler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, Box<dyn Handler>> = HashMap::new();

        // Connection maintenance. PASS/USER/NICK here are the
        // post-registration variants; the handshake loop owns pre-reg.
        handlers.insert("PASS", Box::new(connection::PassHandler));
        handlers.insert("NICK", Box::new(connection::NickHandler));
        handlers.insert("USER", Box::new(connection::UserHandler));
        handlers.insert("QUIT", Box::new(connection::QuitHandler));
        handlers.insert("PING", Box::new(connection::PingHandler));
        handlers.insert("PONG", Box::new(connection::PongHandler));
        handlers.insert("CAP", Box::new(connection::CapHandler));

        // Channels.
        handlers.insert("JOIN", Box::new(channel::JoinHandler));
        handlers.insert("PART", Box::new(channel::PartHandler));
        handlers.insert("KICK", Box::new(channel::KickHandler));
        handlers.insert("INVITE", Box::new(channel::InviteHandler));
        handlers.insert("TOPIC", Box::new(channel::TopicHandler));

        // Messaging.
        handlers.insert("PRIVMSG", Box::new(messaging::PrivmsgHandler));
        handlers.insert("NOTICE", Box::new(messaging::NoticeHandler));
        handlers.insert("AWAY", Box::new(messaging::AwayHandler));

        // Modes and queries.
        handlers.insert("MODE", Box::new(mode::ModeHandler));
        handlers.insert("WHO", Box::new(user_query::WhoHandler));
        handlers.insert("WHOIS", Box::new(user_query::WhoisHandler));
        handlers.insert("MOTD", Box::new(user_query::MotdHandler));

        // DCC file transfers.
        handlers.insert("DCC", Box::new(dcc::DccHandler));

        Self { handlers }
    }

    /// Whether a verb exists and requires registration. `None` for unknown
    /// verbs; the handshake loop uses this to answer 451 or stay silent.
    pub fn registration_gate(&self, verb: &str) -> Option<bool> {
        self.handlers.get(verb).map(|h| h.needs_registration())
    }

    /// Dispatch one parsed message for a registered session.
    pub async fn dispatch(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Some(handler) = self.handlers.get(msg.command.as_str()) else {
            if ctx.registered {
                ctx.send_reply(Reply::err_unknowncommand(&ctx.nick, &msg.command))
                    .await?;
            }
            return Ok(());
        };
        if handler.needs_registration() && !ctx.registered {
            return Err(HandlerError::NotRegistered);
        }
        handler.handle(ctx, msg).await
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_gate_classifies_verbs() {
        let dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.registration_gate("JOIN"), Some(true));
        assert_eq!(dispatcher.registration_gate("PRIVMSG"), Some(true));
        assert_eq!(dispatcher.registration_gate("DCC"), Some(true));
        assert_eq!(dispatcher.registration_gate("CAP"), Some(false));
        assert_eq!(dispatcher.registration_gate("PING"), Some(false));
        assert_eq!(dispatcher.registration_gate("QUIT"), Some(false));
        assert_eq!(dispatcher.registration_gate("BOGUS"), None);
    }
}
