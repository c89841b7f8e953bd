//! Message prefixes (`:source` on a wire line).

use std::fmt;

/// The originator of a message: either the server itself or a user mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prefix {
    /// A bare server name (`:ft_irc`).
    Server(String),
    /// A user mask (`:nick!user@host`).
    User {
        nick: String,
        user: String,
        host: String,
    },
}

impl Prefix {
    /// Build a user prefix from its three components.
    pub fn user(nick: impl Into<String>, user: impl Into<String>, host: impl Into<String>) -> Self {
        Prefix::User {
            nick: nick.into(),
            user: user.into(),
            host: host.into(),
        }
    }

    /// Parse a prefix token (without the leading `:`).
    ///
    /// `nick!user@host` becomes [`Prefix::User`]; anything else is treated
    /// as a server name. Empty input is rejected.
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() {
            return None;
        }
        if let Some(bang) = s.find('!') {
            if let Some(at) = s[bang + 1..].find('@') {
                let nick = &s[..bang];
                let user = &s[bang + 1..bang + 1 + at];
                let host = &s[bang + 2 + at..];
                if !nick.is_empty() && !user.is_empty() && !host.is_empty() {
                    return Some(Prefix::user(nick, user, host));
                }
                return None;
            }
        }
        Some(Prefix::Server(s.to_string()))
    }

    /// The nickname, if this is a user prefix.
    pub fn nick(&self) -> Option<&str> {
        match self {
            Prefix::User { nick, .. } => Some(nick),
            Prefix::Server(_) => None,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::Server(name) => f.write_str(name),
            Prefix::User { nick, user, host } => write!(f, "{nick}!{user}@{host}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_user_mask() {
        let p = Prefix::parse("alice!ali@localhost").unwrap();
        assert_eq!(p, Prefix::user("alice", "ali", "localhost"));
        assert_eq!(p.nick(), Some("alice"));
    }

    #[test]
    fn parse_server_name() {
        let p = Prefix::parse("ft_irc").unwrap();
        assert_eq!(p, Prefix::Server("ft_irc".into()));
        assert_eq!(p.nick(), None);
    }

    #[test]
    fn parse_empty_rejected() {
        assert!(Prefix::parse("").is_none());
    }

    #[test]
    fn parse_malformed_mask_rejected() {
        assert!(Prefix::parse("alice!@host").is_none());
        assert!(Prefix::parse("!user@host").is_none());
    }

    #[test]
    fn display_round_trip() {
        for raw in ["alice!ali@localhost", "ft_irc"] {
            assert_eq!(Prefix::parse(raw).unwrap().to_string(), raw);
        }
    }
}
