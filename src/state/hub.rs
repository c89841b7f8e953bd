//! The Hub - central shared state for the server.
//!
//! The Hub is the sole owner of sessions and channels; everything else
//! holds ids resolved through it per use. Cross-connection access goes
//! through concurrent maps and per-entity locks.
//!
//! Lock order, always: channel lock before session lock, never both while
//! iterating a map. Fan-out is collect-then-send: snapshot the recipient
//! set under the lock, release, then push to egress queues.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use ferric_proto::{Message, Prefix};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

use crate::bot::BotManager;
use crate::config::Config;
use crate::dcc::DccManager;
use crate::state::{Channel, Session, Uid};

/// Identity advertised in prefixes and numerics.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub network: String,
    pub version: String,
    pub created: String,
    pub motd: Vec<String>,
}

/// Central shared state.
pub struct Hub {
    /// Registered sessions, owned here.
    pub users: DashMap<Uid, Arc<RwLock<Session>>>,
    /// Nickname index (case-sensitive, as stored). Invariant: for every
    /// entry `(nick, uid)` backed by a session, that session's nick is
    /// `nick`. Reserved bot nicknames also live here.
    pub nicks: DashMap<String, Uid>,
    /// Channels, owned here.
    pub channels: DashMap<String, Arc<RwLock<Channel>>>,
    /// Per-session egress queues.
    senders: DashMap<Uid, mpsc::Sender<Message>>,
    pub info: ServerInfo,
    pub password: String,
    pub dcc: DccManager,
    pub bots: BotManager,
    uid_counter: AtomicU64,
}

impl Hub {
    pub fn new(config: &Config) -> Self {
        let hub = Self {
            users: DashMap::new(),
            nicks: DashMap::new(),
            channels: DashMap::new(),
            senders: DashMap::new(),
            info: ServerInfo {
                name: config.server.name.clone(),
                network: config.server.network.clone(),
                version: config.server.version.clone(),
                created: config.server.created.clone(),
                motd: config.server.motd.clone(),
            },
            password: config.password.clone(),
            dcc: DccManager::new(config.dcc.clone()),
            bots: BotManager::with_default_bots(),
            uid_counter: AtomicU64::new(1),
        };
        // Reserve bot nicknames so clients cannot claim them.
        for nick in hub.bots.nicks() {
            hub.nicks.insert(nick.clone(), format!("bot:{nick}"));
        }
        hub
    }

    pub fn next_uid(&self) -> Uid {
        format!("{:06}", self.uid_counter.fetch_add(1, Ordering::Relaxed))
    }

    pub fn server_prefix(&self) -> Prefix {
        Prefix::Server(self.info.name.clone())
    }

    // ------------------------------------------------------------------
    // Nickname index
    // ------------------------------------------------------------------

    pub fn resolve_nick(&self, nick: &str) -> Option<Uid> {
        self.nicks.get(nick).map(|e| e.value().clone())
    }

    /// Claim a nickname for a session. Idempotent for the same session;
    /// fails if another session holds it.
    pub fn claim_nick(&self, nick: &str, uid: &Uid) -> bool {
        match self.nicks.entry(nick.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(e) => e.get() == uid,
            dashmap::mapref::entry::Entry::Vacant(e) => {
                e.insert(uid.clone());
                true
            }
        }
    }

    /// Release a nickname if this session holds it.
    pub fn release_nick(&self, nick: &str, uid: &Uid) {
        self.nicks.remove_if(nick, |_, held| held == uid);
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    /// Attach a fully registered session and its egress queue.
    pub fn attach(&self, session: Session, sender: mpsc::Sender<Message>) {
        let uid = session.uid.clone();
        debug_assert!(self.resolve_nick(&session.nick).as_ref() == Some(&uid));
        self.users.insert(uid.clone(), Arc::new(RwLock::new(session)));
        self.senders.insert(uid, sender);
    }

    pub fn session(&self, uid: &str) -> Option<Arc<RwLock<Session>>> {
        self.users.get(uid).map(|e| e.value().clone())
    }

    /// Atomic nickname change for a registered session: index swap, channel
    /// operator/invite renames, and a single NICK broadcast per observer
    /// (the session itself included).
    ///
    /// Returns `false` if the new nickname is taken.
    pub async fn change_nick(self: &Arc<Self>, uid: &Uid, new_nick: &str) -> bool {
        if !self.claim_nick(new_nick, uid) {
            return false;
        }
        let Some(session) = self.session(uid) else {
            self.release_nick(new_nick, uid);
            return false;
        };

        let (old_nick, user, host, joined) = {
            let mut s = session.write().await;
            let old = s.nick.clone();
            s.nick = new_nick.to_string();
            (old, s.user.clone(), s.host.clone(), s.channels.clone())
        };
        if old_nick == new_nick {
            return true;
        }

        let mut observers: Vec<Uid> = vec![uid.clone()];
        for name in &joined {
            if let Some(channel) = self.channel(name) {
                let mut ch = channel.write().await;
                ch.rename_member(&old_nick, new_nick);
                for member in &ch.members {
                    if !observers.contains(member) {
                        observers.push(member.clone());
                    }
                }
            }
        }
        self.release_nick(&old_nick, uid);

        let msg = Message::new("NICK", vec![new_nick.to_string()])
            .with_prefix(Prefix::user(&old_nick, &user, &host));
        for observer in observers {
            self.send_to_uid(&observer, msg.clone()).await;
        }
        info!(uid = %uid, old = %old_nick, new = %new_nick, "nick change");
        true
    }

    /// Tear down a session: QUIT broadcast to its channels, eviction from
    /// every index (including stale nickname entries), egress queue
    /// dropped, and any DCC transfers it participates in failed.
    pub async fn disconnect(self: &Arc<Self>, uid: &Uid, reason: &str) {
        let Some((_, session)) = self.users.remove(uid) else {
            return;
        };
        let (nick, user, host, joined) = {
            let s = session.read().await;
            (
                s.nick.clone(),
                s.user.clone(),
                s.host.clone(),
                s.channels.clone(),
            )
        };

        let quit = Message::new("QUIT", vec![reason.to_string()])
            .with_prefix(Prefix::user(&nick, &user, &host));
        for name in &joined {
            if let Some(channel) = self.channel(name) {
                let members = {
                    let mut ch = channel.write().await;
                    ch.remove_member(uid, &nick);
                    ch.members.clone()
                };
                for member in members {
                    self.send_to_uid(&member, quit.clone()).await;
                }
                self.channels
                    .remove_if(name, |_, ch| {
                        ch.try_read().map(|c| c.members.is_empty()).unwrap_or(false)
                    });
            }
        }

        self.release_nick(&nick, uid);
        // A crashed nick change could leave a stale entry behind; scan for
        // anything else still pointing at this session.
        self.nicks.retain(|_, held| held != uid);
        self.senders.remove(uid);
        self.bots.on_quit(self, uid, &nick).await;
        self.dcc.remove_client(self, uid).await;
        info!(uid = %uid, nick = %nick, reason = %reason, "session closed");
    }

    // ------------------------------------------------------------------
    // Channels
    // ------------------------------------------------------------------

    pub fn channel(&self, name: &str) -> Option<Arc<RwLock<Channel>>> {
        self.channels.get(name).map(|e| e.value().clone())
    }

    /// Remove channels that have reached zero members. Runs on the
    /// maintenance tick; PART/QUIT also remove inline as an optimization.
    pub async fn sweep_empty_channels(&self) {
        let snapshot: Vec<(String, Arc<RwLock<Channel>>)> = self
            .channels
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        for (name, channel) in snapshot {
            if channel.read().await.members.is_empty() {
                let removed = self.channels.remove_if(&name, |_, ch| {
                    ch.try_read().map(|c| c.members.is_empty()).unwrap_or(false)
                });
                if removed.is_some() {
                    debug!(channel = %name, "swept empty channel");
                }
            }
        }
    }

    /// Send to every member of a channel, except one uid if given.
    pub async fn broadcast_channel(&self, name: &str, msg: Message, except: Option<&str>) {
        let Some(channel) = self.channel(name) else {
            return;
        };
        let members = channel.read().await.members.clone();
        for member in members {
            if Some(member.as_str()) != except {
                self.send_to_uid(&member, msg.clone()).await;
            }
        }
    }

    // ------------------------------------------------------------------
    // Egress
    // ------------------------------------------------------------------

    /// Queue a message for a session. A full or closed queue drops the
    /// message; the connection is on its way out in either case.
    pub async fn send_to_uid(&self, uid: &str, msg: Message) {
        let sender = self.senders.get(uid).map(|e| e.value().clone());
        if let Some(sender) = sender {
            if sender.send(msg).await.is_err() {
                debug!(uid = %uid, "egress queue closed");
            }
        }
    }

    /// Queue a server NOTICE for a session.
    pub async fn server_notice(&self, uid: &str, text: &str) {
        let Some(session) = self.session(uid) else {
            return;
        };
        let nick = session.read().await.nick.clone();
        let msg = Message::new("NOTICE", vec![nick, text.to_string()])
            .with_prefix(self.server_prefix());
        self.send_to_uid(uid, msg).await;
    }
}
