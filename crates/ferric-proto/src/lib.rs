//! # ferric-proto
//!
//! Wire-protocol library for the ferricd IRC server.
//!
//! Provides the RFC 1459/2812 message grammar (prefix, command, parameters,
//! trailing), numeric replies, CTCP/DCC framing, nickname and channel name
//! validation, and the ingress/egress line framing rules. The optional
//! `tokio` feature adds [`IrcCodec`], a `tokio_util` codec applying those
//! framing rules to a TCP byte stream.
//!
//! Parsing is pure: no I/O, no side effects.
//!
//! ```
//! use ferric_proto::Message;
//!
//! let msg = Message::parse(":alice!a@localhost PRIVMSG #room :hi there").unwrap();
//! assert_eq!(msg.command, "PRIVMSG");
//! assert_eq!(msg.params, vec!["#room", "hi there"]);
//! ```

pub mod chan;
#[cfg(feature = "tokio")]
pub mod codec;
pub mod ctcp;
pub mod line;
pub mod message;
pub mod nick;
pub mod prefix;
pub mod reply;

pub use self::chan::ChannelExt;
#[cfg(feature = "tokio")]
pub use self::codec::IrcCodec;
pub use self::ctcp::{Ctcp, DccSendOffer, CTCP_DELIM};
pub use self::line::{LineBuffer, MAX_LINE_LEN};
pub use self::message::{Message, ParseError};
pub use self::nick::is_valid_nick;
pub use self::prefix::Prefix;
pub use self::reply::Reply;
