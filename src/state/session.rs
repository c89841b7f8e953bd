//! Per-connection session state.

use std::collections::HashSet;
use std::time::Instant;

use crate::state::Uid;

/// A registered client session.
///
/// The connection task owns the socket; the hub owns this record and the
/// egress sender. Everything here is mutated under the session lock by
/// command handlers.
#[derive(Debug)]
pub struct Session {
    pub uid: Uid,
    pub nick: String,
    pub user: String,
    pub realname: String,
    /// Remote host string, as resolved at accept time.
    pub host: String,
    /// Names of joined channels.
    pub channels: HashSet<String>,
    /// Away message; `Some` means the away flag is set.
    pub away: Option<String>,
    /// Server-operator flag (diagnostic only; no OPER command).
    pub oper: bool,
    pub connected_at: Instant,
    /// Touched on every processed command; tracked for diagnostics, an
    /// idle timeout is deliberately not enforced.
    pub last_activity: Instant,
}

impl Session {
    pub fn new(uid: Uid, nick: String, user: String, realname: String, host: String) -> Self {
        let now = Instant::now();
        Self {
            uid,
            nick,
            user,
            realname,
            host,
            channels: HashSet::new(),
            away: None,
            oper: false,
            connected_at: now,
            last_activity: now,
        }
    }

    /// The `nick!user@host` mask used as this session's message prefix.
    pub fn mask(&self) -> ferric_proto::Prefix {
        ferric_proto::Prefix::user(&self.nick, &self.user, &self.host)
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}
