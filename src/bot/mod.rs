//! In-process bots: pluggable message consumers attached to reserved
//! nicknames, consulted after normal command dispatch.

mod janken;

use std::sync::Arc;

use async_trait::async_trait;
use ferric_proto::{Message, Prefix};

use crate::state::Hub;

pub use janken::JankenBot;

/// A bot occupies a reserved nickname and reacts to traffic addressed to
/// it. Hooks other than `on_message` default to no-ops.
#[async_trait]
pub trait Bot: Send + Sync {
    /// The reserved nickname this bot answers to.
    fn nick(&self) -> &str;

    /// A PRIVMSG was addressed to this bot.
    async fn on_message(&self, hub: &Arc<Hub>, sender_uid: &str, sender_nick: &str, text: &str);

    async fn on_join(&self, _hub: &Arc<Hub>, _uid: &str, _nick: &str, _channel: &str) {}
    async fn on_part(&self, _hub: &Arc<Hub>, _uid: &str, _nick: &str, _channel: &str) {}
    async fn on_quit(&self, _hub: &Arc<Hub>, _uid: &str, _nick: &str) {}
}

/// Routes bot-addressed traffic and lifecycle hooks to registered bots.
pub struct BotManager {
    bots: Vec<Arc<dyn Bot>>,
}

impl BotManager {
    pub fn new() -> Self {
        Self { bots: Vec::new() }
    }

    /// The default bot roster.
    pub fn with_default_bots() -> Self {
        let mut manager = Self::new();
        manager.register(Arc::new(JankenBot::new()));
        manager
    }

    pub fn register(&mut self, bot: Arc<dyn Bot>) {
        self.bots.push(bot);
    }

    /// Reserved nicknames, for seeding the nickname index.
    pub fn nicks(&self) -> Vec<String> {
        self.bots.iter().map(|b| b.nick().to_string()).collect()
    }

    pub fn is_bot(&self, nick: &str) -> bool {
        self.bots.iter().any(|b| b.nick() == nick)
    }

    /// Deliver a PRIVMSG addressed to a bot nickname. Returns `true` if a
    /// bot consumed the message.
    pub async fn on_message(
        &self,
        hub: &Arc<Hub>,
        sender_uid: &str,
        sender_nick: &str,
        target: &str,
        text: &str,
    ) -> bool {
        for bot in &self.bots {
            if bot.nick() == target {
                bot.on_message(hub, sender_uid, sender_nick, text).await;
                return true;
            }
        }
        false
    }

    pub async fn on_join(&self, hub: &Arc<Hub>, uid: &str, nick: &str, channel: &str) {
        for bot in &self.bots {
            bot.on_join(hub, uid, nick, channel).await;
        }
    }

    pub async fn on_part(&self, hub: &Arc<Hub>, uid: &str, nick: &str, channel: &str) {
        for bot in &self.bots {
            bot.on_part(hub, uid, nick, channel).await;
        }
    }

    pub async fn on_quit(&self, hub: &Arc<Hub>, uid: &str, nick: &str) {
        for bot in &self.bots {
            bot.on_quit(hub, uid, nick).await;
        }
    }
}

impl Default for BotManager {
    fn default() -> Self {
        Self::with_default_bots()
    }
}

/// Send a PRIVMSG from a bot's prefix to a client.
pub(crate) async fn bot_reply(hub: &Arc<Hub>, bot_nick: &str, target_uid: &str, text: &str) {
    let Some(session) = hub.session(target_uid) else {
        return;
    };
    let target_nick = session.read().await.nick.clone();
    let msg = Message::new("PRIVMSG", vec![target_nick, text.to_string()]).with_prefix(
        Prefix::user(bot_nick, "bot", hub.info.name.clone()),
    );
    hub.send_to_uid(target_uid, msg).await;
}
