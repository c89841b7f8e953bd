//! Server configuration.
//!
//! The process takes exactly two arguments - listening port and connection
//! password - so configuration is built from argv plus compiled defaults
//! rather than a config file.

use std::time::Duration;

use thiserror::Error;

/// Argument validation errors. Any of these means: print usage, exit 1.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("expected exactly two arguments: <port> <password>")]
    WrongArgCount,
    #[error("invalid port: {0}")]
    BadPort(String),
    #[error("password must be non-empty")]
    EmptyPassword,
}

/// Identity advertised in prefixes and the welcome burst.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub network: String,
    pub version: String,
    pub created: String,
    pub motd: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "ft_irc".to_string(),
            network: "ft_irc".to_string(),
            version: concat!("ferricd-", env!("CARGO_PKG_VERSION")).to_string(),
            created: chrono::Utc::now().format("%Y-%m-%d").to_string(),
            motd: vec![
                "Welcome to ferricd.".to_string(),
                "DCC SEND/GET file transfer is available; see DCC LIST.".to_string(),
            ],
        }
    }
}

/// DCC subsystem tunables.
#[derive(Debug, Clone)]
pub struct DccConfig {
    /// Inclusive port pool for sender-side listening sockets.
    pub port_min: u16,
    pub port_max: u16,
    pub max_file_size: u64,
    pub max_transfers_per_client: usize,
    /// A transfer with no progress for this long is failed.
    pub idle_timeout: Duration,
    pub chunk_size: usize,
    /// Receiver flushes its file every this many bytes.
    pub flush_interval: u64,
    pub send_root: String,
    pub recv_root: String,
}

impl Default for DccConfig {
    fn default() -> Self {
        Self {
            port_min: 5000,
            port_max: 5100,
            max_file_size: 100 * 1024 * 1024,
            max_transfers_per_client: 3,
            idle_timeout: Duration::from_secs(300),
            chunk_size: 8 * 1024,
            flush_interval: 64 * 1024,
            send_root: "./dcc_transfers".to_string(),
            recv_root: "./dcc_transfers/received".to_string(),
        }
    }
}

/// Complete daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub password: String,
    pub server: ServerConfig,
    pub dcc: DccConfig,
}

impl Config {
    /// Build a configuration from the two positional arguments.
    pub fn from_args<I>(mut args: I) -> Result<Self, UsageError>
    where
        I: Iterator<Item = String>,
    {
        let port = args.next().ok_or(UsageError::WrongArgCount)?;
        let password = args.next().ok_or(UsageError::WrongArgCount)?;
        if args.next().is_some() {
            return Err(UsageError::WrongArgCount);
        }
        let port = parse_port(&port)?;
        if password.is_empty() {
            return Err(UsageError::EmptyPassword);
        }
        Ok(Self {
            port,
            password,
            server: ServerConfig::default(),
            dcc: DccConfig::default(),
        })
    }
}

/// Decimal 1-65535, no leading zeros, no sign, no stray characters.
fn parse_port(s: &str) -> Result<u16, UsageError> {
    let bad = || UsageError::BadPort(s.to_string());
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    if s.len() > 1 && s.starts_with('0') {
        return Err(bad());
    }
    let port: u32 = s.parse().map_err(|_| bad())?;
    if !(1..=65535).contains(&port) {
        return Err(bad());
    }
    Ok(port as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> impl Iterator<Item = String> {
        v.iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn accepts_valid_args() {
        let cfg = Config::from_args(args(&["6667", "letmein"])).unwrap();
        assert_eq!(cfg.port, 6667);
        assert_eq!(cfg.password, "letmein");
        assert_eq!(cfg.server.name, "ft_irc");
    }

    #[test]
    fn rejects_wrong_arity() {
        assert_eq!(
            Config::from_args(args(&["6667"])).unwrap_err(),
            UsageError::WrongArgCount
        );
        assert_eq!(
            Config::from_args(args(&["6667", "pw", "extra"])).unwrap_err(),
            UsageError::WrongArgCount
        );
    }

    #[test]
    fn rejects_bad_ports() {
        for bad in ["0", "65536", "06667", "6667x", "-1", "+80", ""] {
            assert!(
                Config::from_args(args(&[bad, "pw"])).is_err(),
                "port {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_empty_password() {
        assert_eq!(
            Config::from_args(args(&["6667", ""])).unwrap_err(),
            UsageError::EmptyPassword
        );
    }

    #[test]
    fn dcc_defaults_match_contract() {
        let dcc = DccConfig::default();
        assert_eq!((dcc.port_min, dcc.port_max), (5000, 5100));
        assert_eq!(dcc.max_file_size, 100 * 1024 * 1024);
        assert_eq!(dcc.max_transfers_per_client, 3);
        assert_eq!(dcc.idle_timeout.as_secs(), 300);
    }
}
