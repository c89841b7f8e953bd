//! Error types for command handling and channel operations.

use ferric_proto::{Message, Prefix, Reply};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors produced by command handlers.
///
/// Most protocol errors are answered inline by the handler; these variants
/// cover the cases the dispatcher resolves centrally, plus control flow
/// (`Quit`) and egress failure.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("not enough parameters")]
    NeedMoreParams,

    #[error("not registered")]
    NotRegistered,

    #[error("client quit: {0:?}")]
    Quit(Option<String>),

    #[error("send error: {0}")]
    Send(#[from] mpsc::error::SendError<Message>),
}

impl HandlerError {
    /// Map to a numeric reply, where one applies.
    pub fn to_reply(&self, server: &str, nick: &str, command: &str) -> Option<Message> {
        let msg = match self {
            Self::NeedMoreParams => Reply::err_needmoreparams(nick, command),
            Self::NotRegistered => Reply::err_notregistered(nick),
            Self::Quit(_) | Self::Send(_) => return None,
        };
        Some(msg.with_prefix(Prefix::Server(server.to_string())))
    }
}

/// Result type for command handlers.
pub type HandlerResult = Result<(), HandlerError>;

/// Channel membership and permission failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("cannot join channel (+k)")]
    BadChannelKey,

    #[error("cannot join channel (+i)")]
    InviteOnlyChan,

    #[error("cannot join channel (+l)")]
    ChannelIsFull,

    #[error("you're not on that channel")]
    NotOnChannel,

    #[error("you're not channel operator")]
    ChanOpPrivsNeeded,

    #[error("user {0} is not on that channel")]
    UserNotInChannel(String),
}

impl ChannelError {
    /// Map to the RFC numeric for this failure.
    pub fn to_reply(&self, server: &str, nick: &str, channel: &str) -> Message {
        let msg = match self {
            Self::BadChannelKey => Reply::err_badchannelkey(nick, channel),
            Self::InviteOnlyChan => Reply::err_inviteonlychan(nick, channel),
            Self::ChannelIsFull => Reply::err_channelisfull(nick, channel),
            Self::NotOnChannel => Reply::err_notonchannel(nick, channel),
            Self::ChanOpPrivsNeeded => Reply::err_chanoprivsneeded(nick, channel),
            Self::UserNotInChannel(target) => Reply::err_usernotinchannel(nick, target, channel),
        };
        msg.with_prefix(Prefix::Server(server.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn need_more_params_maps_to_461() {
        let reply = HandlerError::NeedMoreParams
            .to_reply("ft_irc", "alice", "JOIN")
            .unwrap();
        assert_eq!(reply.command, "461");
        assert_eq!(
            reply.to_string(),
            ":ft_irc 461 alice JOIN :Not enough parameters"
        );
    }

    #[test]
    fn quit_has_no_reply() {
        assert!(HandlerError::Quit(None)
            .to_reply("ft_irc", "alice", "QUIT")
            .is_none());
    }

    #[test]
    fn channel_errors_map_to_numerics() {
        let cases = [
            (ChannelError::BadChannelKey, "475"),
            (ChannelError::InviteOnlyChan, "473"),
            (ChannelError::ChannelIsFull, "471"),
            (ChannelError::NotOnChannel, "442"),
            (ChannelError::ChanOpPrivsNeeded, "482"),
        ];
        for (err, code) in cases {
            assert_eq!(err.to_reply("ft_irc", "alice", "#room").command, code);
        }
        assert_eq!(
            ChannelError::UserNotInChannel("bob".into())
                .to_reply("ft_irc", "alice", "#room")
                .command,
            "441"
        );
    }
}
