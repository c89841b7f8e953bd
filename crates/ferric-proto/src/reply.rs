//! IRC numeric replies (RFC 1459/2812 subset).
//!
//! [`Reply`] enumerates the numerics this server emits. Constructors return
//! a bare [`Message`] whose command is the zero-padded three-digit code; the
//! sender layer attaches the server-name prefix.

#![allow(non_camel_case_types)]

use crate::message::Message;

/// Numeric reply codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Reply {
    RPL_WELCOME = 1,
    RPL_YOURHOST = 2,
    RPL_CREATED = 3,
    RPL_MYINFO = 4,
    RPL_UMODEIS = 221,
    RPL_AWAY = 301,
    RPL_UNAWAY = 305,
    RPL_NOWAWAY = 306,
    RPL_WHOISUSER = 311,
    RPL_WHOISSERVER = 312,
    RPL_ENDOFWHO = 315,
    RPL_ENDOFWHOIS = 318,
    RPL_WHOISCHANNELS = 319,
    RPL_CHANNELMODEIS = 324,
    RPL_NOTOPIC = 331,
    RPL_TOPIC = 332,
    RPL_INVITING = 341,
    RPL_WHOREPLY = 352,
    RPL_NAMREPLY = 353,
    RPL_ENDOFNAMES = 366,
    RPL_MOTD = 372,
    RPL_MOTDSTART = 375,
    RPL_ENDOFMOTD = 376,
    ERR_NOSUCHNICK = 401,
    ERR_NOSUCHCHANNEL = 403,
    ERR_CANNOTSENDTOCHAN = 404,
    ERR_NOORIGIN = 409,
    ERR_NORECIPIENT = 411,
    ERR_NOTEXTTOSEND = 412,
    ERR_UNKNOWNCOMMAND = 421,
    ERR_NONICKNAMEGIVEN = 431,
    ERR_ERRONEUSNICKNAME = 432,
    ERR_NICKNAMEINUSE = 433,
    ERR_USERNOTINCHANNEL = 441,
    ERR_NOTONCHANNEL = 442,
    ERR_USERONCHANNEL = 443,
    ERR_NOTREGISTERED = 451,
    ERR_NEEDMOREPARAMS = 461,
    ERR_ALREADYREGISTRED = 462,
    ERR_PASSWDMISMATCH = 464,
    ERR_CHANNELISFULL = 471,
    ERR_UNKNOWNMODE = 472,
    ERR_INVITEONLYCHAN = 473,
    ERR_BADCHANNELKEY = 475,
    ERR_CHANOPRIVSNEEDED = 482,
    ERR_UMODEUNKNOWNFLAG = 501,
    ERR_USERSDONTMATCH = 502,
}

impl Reply {
    /// The numeric code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Build a reply message: command is the zero-padded code, first
    /// parameter is the target client.
    pub fn msg(self, args: Vec<String>) -> Message {
        Message::new(format!("{:03}", self.code()), args)
    }
}

macro_rules! reply_ctor {
    (
        $(#[$meta:meta])*
        $name:ident, $reply:ident, $text:literal
    ) => {
        $(#[$meta])*
        pub fn $name(client: &str) -> Message {
            Reply::$reply.msg(vec![client.to_string(), $text.to_string()])
        }
    };
    (
        $(#[$meta:meta])*
        $name:ident, $reply:ident, $arg:ident, $text:literal
    ) => {
        $(#[$meta])*
        pub fn $name(client: &str, $arg: &str) -> Message {
            Reply::$reply.msg(vec![
                client.to_string(),
                $arg.to_string(),
                $text.to_string(),
            ])
        }
    };
}

impl Reply {
    reply_ctor!(
        /// `409 ERR_NOORIGIN`
        err_noorigin, ERR_NOORIGIN, "No origin specified"
    );
    reply_ctor!(
        /// `412 ERR_NOTEXTTOSEND`
        err_notexttosend, ERR_NOTEXTTOSEND, "No text to send"
    );
    reply_ctor!(
        /// `431 ERR_NONICKNAMEGIVEN`
        err_nonicknamegiven, ERR_NONICKNAMEGIVEN, "No nickname given"
    );
    reply_ctor!(
        /// `451 ERR_NOTREGISTERED`
        err_notregistered, ERR_NOTREGISTERED, "You have not registered"
    );
    reply_ctor!(
        /// `462 ERR_ALREADYREGISTRED`
        err_alreadyregistred, ERR_ALREADYREGISTRED, "Unauthorized command (already registered)"
    );
    reply_ctor!(
        /// `464 ERR_PASSWDMISMATCH`
        err_passwdmismatch, ERR_PASSWDMISMATCH, "Password incorrect"
    );
    reply_ctor!(
        /// `305 RPL_UNAWAY`
        rpl_unaway, RPL_UNAWAY, "You are no longer marked as being away"
    );
    reply_ctor!(
        /// `306 RPL_NOWAWAY`
        rpl_nowaway, RPL_NOWAWAY, "You have been marked as being away"
    );

    reply_ctor!(
        /// `401 ERR_NOSUCHNICK`
        err_nosuchnick, ERR_NOSUCHNICK, nick, "No such nick/channel"
    );
    reply_ctor!(
        /// `403 ERR_NOSUCHCHANNEL`
        err_nosuchchannel, ERR_NOSUCHCHANNEL, channel, "No such channel"
    );
    reply_ctor!(
        /// `404 ERR_CANNOTSENDTOCHAN`
        err_cannotsendtochan, ERR_CANNOTSENDTOCHAN, channel, "Cannot send to channel"
    );
    reply_ctor!(
        /// `411 ERR_NORECIPIENT`
        err_norecipient, ERR_NORECIPIENT, command, "No recipient given"
    );
    reply_ctor!(
        /// `421 ERR_UNKNOWNCOMMAND`
        err_unknowncommand, ERR_UNKNOWNCOMMAND, command, "Unknown command"
    );
    reply_ctor!(
        /// `432 ERR_ERRONEUSNICKNAME`
        err_erroneusnickname, ERR_ERRONEUSNICKNAME, nick, "Erroneous nickname"
    );
    reply_ctor!(
        /// `433 ERR_NICKNAMEINUSE`
        err_nicknameinuse, ERR_NICKNAMEINUSE, nick, "Nickname is already in use"
    );
    reply_ctor!(
        /// `442 ERR_NOTONCHANNEL`
        err_notonchannel, ERR_NOTONCHANNEL, channel, "You're not on that channel"
    );
    reply_ctor!(
        /// `461 ERR_NEEDMOREPARAMS`
        err_needmoreparams, ERR_NEEDMOREPARAMS, command, "Not enough parameters"
    );
    reply_ctor!(
        /// `471 ERR_CHANNELISFULL`
        err_channelisfull, ERR_CHANNELISFULL, channel, "Cannot join channel (+l)"
    );
    reply_ctor!(
        /// `473 ERR_INVITEONLYCHAN`
        err_inviteonlychan, ERR_INVITEONLYCHAN, channel, "Cannot join channel (+i)"
    );
    reply_ctor!(
        /// `475 ERR_BADCHANNELKEY`
        err_badchannelkey, ERR_BADCHANNELKEY, channel, "Cannot join channel (+k)"
    );
    reply_ctor!(
        /// `482 ERR_CHANOPRIVSNEEDED`
        err_chanoprivsneeded, ERR_CHANOPRIVSNEEDED, channel, "You're not channel operator"
    );
    reply_ctor!(
        /// `501 ERR_UMODEUNKNOWNFLAG`
        err_umodeunknownflag, ERR_UMODEUNKNOWNFLAG, "Unknown MODE flag"
    );
    reply_ctor!(
        /// `502 ERR_USERSDONTMATCH`
        err_usersdontmatch, ERR_USERSDONTMATCH, "Cannot change mode for other users"
    );

    /// `441 ERR_USERNOTINCHANNEL`
    pub fn err_usernotinchannel(client: &str, nick: &str, channel: &str) -> Message {
        Reply::ERR_USERNOTINCHANNEL.msg(vec![
            client.to_string(),
            nick.to_string(),
            channel.to_string(),
            "They aren't on that channel".to_string(),
        ])
    }

    /// `443 ERR_USERONCHANNEL`
    pub fn err_useronchannel(client: &str, nick: &str, channel: &str) -> Message {
        Reply::ERR_USERONCHANNEL.msg(vec![
            client.to_string(),
            nick.to_string(),
            channel.to_string(),
            "is already on channel".to_string(),
        ])
    }

    /// `472 ERR_UNKNOWNMODE`
    pub fn err_unknownmode(client: &str, mode: char, channel: &str) -> Message {
        Reply::ERR_UNKNOWNMODE.msg(vec![
            client.to_string(),
            mode.to_string(),
            format!("is unknown mode char to me for {channel}"),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_zero_padded() {
        let msg = Reply::RPL_WELCOME.msg(vec!["alice".into(), "Welcome".into()]);
        assert_eq!(msg.command, "001");
        let msg = Reply::ERR_NICKNAMEINUSE.msg(vec!["*".into()]);
        assert_eq!(msg.command, "433");
    }

    #[test]
    fn constructor_shape() {
        let msg = Reply::err_nicknameinuse("*", "bob");
        assert_eq!(msg.command, "433");
        assert_eq!(
            msg.params,
            vec!["*", "bob", "Nickname is already in use"]
        );
    }

    #[test]
    fn reply_serializes_with_trailing_text() {
        let msg = Reply::err_needmoreparams("alice", "JOIN");
        assert_eq!(msg.to_string(), "461 alice JOIN :Not enough parameters");
    }
}
