//! CTCP framing and the DCC SEND offer payload.
//!
//! CTCP messages ride inside PRIVMSG/NOTICE bodies between `\x01` bytes.
//! DCC negotiation is layered on CTCP; the offer this server emits is
//!
//! ```text
//! \x01DCC SEND <filename> <ip-u32> <port> <filesize> <id>\x01
//! ```
//!
//! where `<ip-u32>` is the sender's IPv4 address as an unsigned 32-bit
//! value in host byte order, rendered in decimal. Byte order varies between
//! DCC clients in the wild; host order matches the classical clients this
//! server was tested against.

use std::fmt;
use std::net::Ipv4Addr;

/// The CTCP delimiter byte.
pub const CTCP_DELIM: char = '\x01';

/// A parsed CTCP message: command word plus optional argument tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ctcp {
    pub command: String,
    pub params: Option<String>,
}

impl Ctcp {
    /// Parse a CTCP message from a PRIVMSG/NOTICE body.
    ///
    /// Returns `None` if the body is not CTCP-framed. A missing trailing
    /// delimiter is tolerated, as real clients omit it.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.strip_prefix(CTCP_DELIM)?;
        let text = text.strip_suffix(CTCP_DELIM).unwrap_or(text);
        if text.is_empty() {
            return None;
        }
        let (command, params) = match text.find(' ') {
            Some(pos) => {
                let tail = &text[pos + 1..];
                (
                    &text[..pos],
                    if tail.is_empty() { None } else { Some(tail) },
                )
            }
            None => (text, None),
        };
        Some(Ctcp {
            command: command.to_ascii_uppercase(),
            params: params.map(str::to_string),
        })
    }

    /// True if a message body is CTCP-framed.
    #[inline]
    pub fn is_ctcp(text: &str) -> bool {
        text.starts_with(CTCP_DELIM)
    }
}

impl fmt::Display for Ctcp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{CTCP_DELIM}{}", self.command)?;
        if let Some(params) = &self.params {
            write!(f, " {params}")?;
        }
        write!(f, "{CTCP_DELIM}")
    }
}

/// The DCC SEND offer announced to a transfer's receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DccSendOffer {
    pub filename: String,
    pub addr: Ipv4Addr,
    pub port: u16,
    pub filesize: u64,
    pub id: String,
}

impl DccSendOffer {
    /// Render the CTCP-framed offer body.
    pub fn to_ctcp(&self) -> String {
        format!(
            "{CTCP_DELIM}DCC SEND {} {} {} {} {}{CTCP_DELIM}",
            self.filename,
            u32::from(self.addr),
            self.port,
            self.filesize,
            self.id,
        )
    }

    /// Parse an offer back out of a CTCP body.
    pub fn parse(text: &str) -> Option<Self> {
        let ctcp = Ctcp::parse(text)?;
        if ctcp.command != "DCC" {
            return None;
        }
        let params = ctcp.params?;
        let mut words = params.split_whitespace();
        if !words.next()?.eq_ignore_ascii_case("SEND") {
            return None;
        }
        let filename = words.next()?.to_string();
        let addr = Ipv4Addr::from(words.next()?.parse::<u32>().ok()?);
        let port = words.next()?.parse().ok()?;
        let filesize = words.next()?.parse().ok()?;
        let id = words.next()?.to_string();
        Some(DccSendOffer {
            filename,
            addr,
            port,
            filesize,
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_dcc_send() {
        let ctcp = Ctcp::parse("\x01DCC SEND file.txt 2130706433 5000 1000 x\x01").unwrap();
        assert_eq!(ctcp.command, "DCC");
        assert_eq!(
            ctcp.params.as_deref(),
            Some("SEND file.txt 2130706433 5000 1000 x")
        );
    }

    #[test]
    fn parse_case_insensitive_command() {
        let ctcp = Ctcp::parse("\x01action waves\x01").unwrap();
        assert_eq!(ctcp.command, "ACTION");
        assert_eq!(ctcp.params.as_deref(), Some("waves"));
    }

    #[test]
    fn parse_missing_trailing_delim() {
        let ctcp = Ctcp::parse("\x01VERSION").unwrap();
        assert_eq!(ctcp.command, "VERSION");
        assert_eq!(ctcp.params, None);
    }

    #[test]
    fn parse_not_ctcp() {
        assert!(Ctcp::parse("hello world").is_none());
        assert!(Ctcp::parse("").is_none());
        assert!(Ctcp::parse("\x01\x01").is_none());
    }

    #[test]
    fn display_round_trip() {
        let original = "\x01DCC SEND f 1 2 3 id\x01";
        let parsed = Ctcp::parse(original).unwrap();
        assert_eq!(parsed.to_string(), original);
    }

    #[test]
    fn offer_ip_is_host_order_decimal() {
        let offer = DccSendOffer {
            filename: "test.txt".into(),
            addr: Ipv4Addr::new(127, 0, 0, 1),
            port: 5000,
            filesize: 1000,
            id: "1700000000_42".into(),
        };
        assert_eq!(
            offer.to_ctcp(),
            "\x01DCC SEND test.txt 2130706433 5000 1000 1700000000_42\x01"
        );
    }

    #[test]
    fn offer_round_trip() {
        let offer = DccSendOffer {
            filename: "a.bin".into(),
            addr: Ipv4Addr::new(10, 0, 0, 7),
            port: 5042,
            filesize: 123_456,
            id: "1700000001_7".into(),
        };
        assert_eq!(DccSendOffer::parse(&offer.to_ctcp()).unwrap(), offer);
    }
}
