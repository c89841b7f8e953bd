//! Channel state: membership, operators, invites, topic, modes.

use std::collections::HashSet;

use crate::error::ChannelError;
use crate::state::Uid;

/// Channel topic with attribution.
#[derive(Debug, Clone)]
pub struct Topic {
    pub text: String,
    pub set_by: String,
    pub set_at: i64,
}

/// The four channel flags: +i, +t, +k, +l.
#[derive(Debug, Clone)]
pub struct ChannelModes {
    pub invite_only: bool,
    pub topic_restricted: bool,
    /// `None` means no key.
    pub key: Option<String>,
    /// `None` means no limit.
    pub limit: Option<usize>,
}

impl Default for ChannelModes {
    fn default() -> Self {
        // Channels start topic-restricted, like most networks.
        Self {
            invite_only: false,
            topic_restricted: true,
            key: None,
            limit: None,
        }
    }
}

impl ChannelModes {
    /// Render as a mode string plus parameters, for RPL_CHANNELMODEIS.
    pub fn to_mode_line(&self) -> (String, Vec<String>) {
        let mut flags = String::from("+");
        let mut params = Vec::new();
        if self.invite_only {
            flags.push('i');
        }
        if self.topic_restricted {
            flags.push('t');
        }
        if let Some(key) = &self.key {
            flags.push('k');
            params.push(key.clone());
        }
        if let Some(limit) = self.limit {
            flags.push('l');
            params.push(limit.to_string());
        }
        (flags, params)
    }
}

/// A channel. Membership is an ordered list of session ids; the channel
/// does not own sessions. Operator and invite sets hold nicknames and are
/// renamed when a member changes nick.
#[derive(Debug)]
pub struct Channel {
    pub name: String,
    pub topic: Option<Topic>,
    pub modes: ChannelModes,
    pub members: Vec<Uid>,
    pub operators: HashSet<String>,
    pub invited: HashSet<String>,
    pub created_at: i64,
}

impl Channel {
    /// Create a channel with its first member, who becomes an operator.
    pub fn new(name: String, creator_uid: &Uid, creator_nick: &str) -> Self {
        let mut operators = HashSet::new();
        operators.insert(creator_nick.to_string());
        Self {
            name,
            topic: None,
            modes: ChannelModes::default(),
            members: vec![creator_uid.clone()],
            operators,
            invited: HashSet::new(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn is_member(&self, uid: &str) -> bool {
        self.members.iter().any(|m| m == uid)
    }

    pub fn is_operator(&self, nick: &str) -> bool {
        self.operators.contains(nick)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Admission check and append, in this order: already a member is a
    /// no-op; then key, invite-only, and limit are enforced. A successful
    /// join consumes the nickname's invitation.
    ///
    /// Returns `true` if the member was newly added.
    pub fn try_add_member(
        &mut self,
        uid: &Uid,
        nick: &str,
        key: Option<&str>,
    ) -> Result<bool, ChannelError> {
        if self.is_member(uid) {
            return Ok(false);
        }
        if let Some(required) = &self.modes.key {
            if key != Some(required.as_str()) {
                return Err(ChannelError::BadChannelKey);
            }
        }
        if self.modes.invite_only && !self.invited.contains(nick) {
            return Err(ChannelError::InviteOnlyChan);
        }
        if let Some(limit) = self.modes.limit {
            if self.members.len() >= limit {
                return Err(ChannelError::ChannelIsFull);
            }
        }
        self.members.push(uid.clone());
        self.invited.remove(nick);
        Ok(true)
    }

    /// Remove a member and its operator entry.
    pub fn remove_member(&mut self, uid: &str, nick: &str) {
        self.members.retain(|m| m != uid);
        self.operators.remove(nick);
    }

    /// Rename a member's entries in the operator and invite sets.
    pub fn rename_member(&mut self, old_nick: &str, new_nick: &str) {
        if self.operators.remove(old_nick) {
            self.operators.insert(new_nick.to_string());
        }
        if self.invited.remove(old_nick) {
            self.invited.insert(new_nick.to_string());
        }
    }
}
