//! A single peer-to-peer transfer: bookkeeping shared between the command
//! handlers, the transfer tasks, and the timeout scan. Sockets and file
//! handles are owned by the transfer tasks, not this record.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Instant;

use crate::state::Uid;

/// Transfer lifecycle. `Pending → Active → (Completed | Failed)`, plus
/// `Pending → Rejected`. Terminal transitions release sockets, file
/// handles, and the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DccStatus {
    Pending,
    Active,
    Completed,
    Failed,
    Rejected,
}

impl DccStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Rejected => "REJECTED",
        }
    }
}

/// Which side of the transfer a participant is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DccDirection {
    Send,
    Get,
}

impl DccDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Send => "SEND",
            Self::Get => "GET",
        }
    }
}

/// Shared transfer record.
#[derive(Debug)]
pub struct DccTransfer {
    pub id: String,
    pub sender_uid: Uid,
    pub sender_nick: String,
    pub receiver_uid: Uid,
    pub receiver_nick: String,
    /// Basename only; path traversal never reaches the filesystem.
    pub filename: String,
    /// Source path under the transfer directory.
    pub path: PathBuf,
    pub filesize: u64,
    pub bytes: u64,
    pub status: DccStatus,
    /// Pool port the sender side listens on while pending.
    pub port: u16,
    pub addr: Ipv4Addr,
    pub started_at: Instant,
    pub last_activity: Instant,
    /// Last 10%-boundary a progress NOTICE was emitted for.
    pub last_progress_decile: u8,
}

impl DccTransfer {
    pub fn progress(&self) -> f64 {
        if self.filesize == 0 {
            return 100.0;
        }
        self.bytes as f64 / self.filesize as f64 * 100.0
    }

    /// Bytes per second since the data connection was established.
    pub fn rate(&self) -> f64 {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.bytes as f64 / elapsed
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// The side `uid` plays in this transfer, if it participates.
    pub fn direction_for(&self, uid: &str) -> Option<DccDirection> {
        if self.sender_uid == uid {
            Some(DccDirection::Send)
        } else if self.receiver_uid == uid {
            Some(DccDirection::Get)
        } else {
            None
        }
    }
}

/// Human-readable byte count: `1000 B`, `1.50 KB`, `2.00 MB`, `1.25 GB`.
pub fn format_size(size: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;
    let s = size as f64;
    if s >= GB {
        format!("{:.2} GB", s / GB)
    } else if s >= MB {
        format!("{:.2} MB", s / MB)
    } else if s >= KB {
        format!("{:.2} KB", s / KB)
    } else {
        format!("{size} B")
    }
}

/// Human-readable transfer rate.
pub fn format_rate(rate: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    if rate >= MB {
        format!("{:.2} MB/s", rate / MB)
    } else if rate >= KB {
        format!("{:.2} KB/s", rate / KB)
    } else {
        format!("{rate:.0} B/s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_terminality() {
        assert!(!DccStatus::Pending.is_terminal());
        assert!(!DccStatus::Active.is_terminal());
        assert!(DccStatus::Completed.is_terminal());
        assert!(DccStatus::Failed.is_terminal());
        assert!(DccStatus::Rejected.is_terminal());
    }

    #[test]
    fn sizes_format_like_classic_clients() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1000), "1000 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(2 * 1024 * 1024), "2.00 MB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024 / 4), "1.25 GB");
    }

    #[test]
    fn rates_format() {
        assert_eq!(format_rate(512.0), "512 B/s");
        assert_eq!(format_rate(2048.0), "2.00 KB/s");
        assert_eq!(format_rate(3.0 * 1024.0 * 1024.0), "3.00 MB/s");
    }
}
