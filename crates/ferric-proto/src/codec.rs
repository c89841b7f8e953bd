//! Tokio codec applying the line-framing rules to a TCP stream.
//!
//! Decoding yields filtered, complete lines (the caller parses them with
//! [`Message::parse`] and decides how to react to invalid ones). Encoding
//! serializes a [`Message`] with CR-LF, truncating to 512 bytes total.

use bytes::{BufMut, BytesMut};
use std::collections::VecDeque;
use tokio_util::codec::{Decoder, Encoder};

use crate::line::LineBuffer;
use crate::message::{Message, MAX_MESSAGE_LEN};

/// Frames an IRC byte stream into lines and serializes outbound messages.
#[derive(Debug, Default)]
pub struct IrcCodec {
    lines: LineBuffer,
    pending: VecDeque<String>,
}

impl IrcCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines dropped over the per-read cap since the last call.
    pub fn take_discarded(&mut self) -> u64 {
        self.lines.take_discarded()
    }
}

impl Decoder for IrcCodec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.pending.pop_front() {
            return Ok(Some(line));
        }
        if !src.is_empty() {
            self.lines.push(&src.split());
            self.pending.extend(self.lines.drain_lines());
        }
        Ok(self.pending.pop_front())
    }
}

impl Encoder<Message> for IrcCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut wire = item.to_string();
        if wire.len() > MAX_MESSAGE_LEN - 2 {
            let mut cut = MAX_MESSAGE_LEN - 2;
            while !wire.is_char_boundary(cut) {
                cut -= 1;
            }
            wire.truncate(cut);
        }
        dst.reserve(wire.len() + 2);
        dst.put_slice(wire.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_complete_line() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::from("NICK alice\r\n");
        let line = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(line, "NICK alice");
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decode_partial_then_complete() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::from("NICK al");
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"ice\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), "NICK alice");
    }

    #[test]
    fn decode_two_lines_one_read() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::from("NICK a\r\nUSER a 0 * :A\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), "NICK a");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), "USER a 0 * :A");
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decode_filters_garbage() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::from(&b"PI\x00NG \x1b[31mx\r\n"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), "PING x");
    }

    #[test]
    fn encode_truncates_to_512() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::new();
        let msg = Message::new(
            "PRIVMSG",
            vec!["bob".into(), "A".repeat(600)],
        );
        codec.encode(msg, &mut buf).unwrap();
        assert_eq!(buf.len(), MAX_MESSAGE_LEN);
        assert!(buf.ends_with(b"\r\n"));
    }

    #[test]
    fn encode_then_decode_round_trip() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::new();
        let msg = Message::parse(":alice!a@h PRIVMSG #room :hi there").unwrap();
        codec.encode(msg.clone(), &mut buf).unwrap();
        let line = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(Message::parse(&line).unwrap(), msg);
    }
}
