//! IRC message grammar: parsing and serialization.
//!
//! One wire line (terminators already stripped) parses into an optional
//! prefix, an uppercase command, and up to 15 parameters where a parameter
//! introduced by `:` is the trailing parameter and consumes the rest of the
//! line verbatim.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::prefix::Prefix;

/// Hard limit on a wire line, including the CR-LF terminator.
pub const MAX_MESSAGE_LEN: usize = 512;

/// Maximum number of parameters a message may carry.
pub const MAX_PARAMS: usize = 15;

/// Maximum length of a command token.
const MAX_COMMAND_LEN: usize = 16;

/// Why a line failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty message")]
    Empty,
    #[error("message exceeds {MAX_MESSAGE_LEN} bytes")]
    TooLong,
    #[error("empty prefix")]
    EmptyPrefix,
    #[error("malformed prefix")]
    BadPrefix,
    #[error("missing or oversized command")]
    BadCommand,
    #[error("message contains control bytes")]
    ControlBytes,
}

/// A parsed IRC message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub prefix: Option<Prefix>,
    /// Uppercased command verb or three-digit numeric.
    pub command: String,
    pub params: Vec<String>,
}

impl Message {
    /// Build a message with no prefix.
    pub fn new(command: impl Into<String>, params: Vec<String>) -> Self {
        Message {
            prefix: None,
            command: command.into(),
            params,
        }
    }

    /// Attach a prefix, builder style.
    pub fn with_prefix(mut self, prefix: Prefix) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// The `i`th parameter, if present.
    pub fn arg(&self, i: usize) -> Option<&str> {
        self.params.get(i).map(String::as_str)
    }

    /// Parse one line. Whitespace between tokens is one or more spaces.
    pub fn parse(line: &str) -> Result<Message, ParseError> {
        if line.is_empty() {
            return Err(ParseError::Empty);
        }
        if line.len() > MAX_MESSAGE_LEN {
            return Err(ParseError::TooLong);
        }
        // Terminators are stripped before parse; anything else below 0x20
        // is garbage a client should never have sent.
        if line.bytes().any(|b| b < 0x20 && b != 0x01) {
            return Err(ParseError::ControlBytes);
        }

        let mut rest = line;

        let prefix = if let Some(stripped) = rest.strip_prefix(':') {
            let space = stripped.find(' ').ok_or(ParseError::BadCommand)?;
            let token = &stripped[..space];
            if token.is_empty() {
                return Err(ParseError::EmptyPrefix);
            }
            let prefix = Prefix::parse(token).ok_or(ParseError::BadPrefix)?;
            rest = stripped[space..].trim_start_matches(' ');
            Some(prefix)
        } else {
            None
        };

        let command_end = rest.find(' ').unwrap_or(rest.len());
        let command = &rest[..command_end];
        if command.is_empty() || command.len() > MAX_COMMAND_LEN {
            return Err(ParseError::BadCommand);
        }
        let command = command.to_ascii_uppercase();
        rest = rest[command_end..].trim_start_matches(' ');

        let mut params = Vec::new();
        while !rest.is_empty() && params.len() < MAX_PARAMS {
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                rest = "";
                break;
            }
            let end = rest.find(' ').unwrap_or(rest.len());
            params.push(rest[..end].to_string());
            rest = rest[end..].trim_start_matches(' ');
        }

        Ok(Message {
            prefix,
            command,
            params,
        })
    }
}

impl FromStr for Message {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Message::parse(s)
    }
}

impl fmt::Display for Message {
    /// Serialize without terminator. The last parameter is introduced by
    /// `:` whenever it needs to be (spaces, empty, or leading `:`), so the
    /// output always re-parses to the same message.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        f.write_str(&self.command)?;
        let last = self.params.len().saturating_sub(1);
        for (i, param) in self.params.iter().enumerate() {
            if i == last && (param.is_empty() || param.contains(' ') || param.starts_with(':')) {
                write!(f, " :{param}")?;
            } else {
                write!(f, " {param}")?;
            }
        }
        Ok(())
    }
}
