//! Transfer lifecycle management: offer/accept/reject, the port pool, the
//! transfer tasks, timeouts, and CTCP/NOTICE notifications back into the
//! IRC pipe.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use dashmap::DashMap;
use ferric_proto::{DccSendOffer, Message};
use rand::Rng;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::DccConfig;
use crate::dcc::transfer::{format_rate, format_size, DccStatus, DccTransfer};
use crate::state::{Hub, Uid};

type Shared = Arc<RwLock<DccTransfer>>;

/// Aggregate counters reported by `DCC STATUS`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DccCounters {
    pub active: usize,
    pub pending: usize,
    pub completed: u64,
    pub total_bytes: u64,
}

/// Owns all transfers and the data-port pool.
pub struct DccManager {
    pub config: DccConfig,
    transfers: DashMap<String, Shared>,
    /// receiver nickname → pending transfer ids.
    pending_by_receiver: DashMap<String, Vec<String>>,
    /// Pool cursor; advances past the last allocated port and wraps.
    next_port: Mutex<u16>,
    completed: AtomicU64,
    finished_bytes: AtomicU64,
}

impl DccManager {
    pub fn new(config: DccConfig) -> Self {
        let next_port = config.port_min;
        Self {
            config,
            transfers: DashMap::new(),
            pending_by_receiver: DashMap::new(),
            next_port: Mutex::new(next_port),
            completed: AtomicU64::new(0),
            finished_bytes: AtomicU64::new(0),
        }
    }

    pub fn get(&self, id: &str) -> Option<Shared> {
        self.transfers.get(id).map(|e| e.value().clone())
    }

    /// All live transfers a session participates in.
    pub fn client_transfers(&self, uid: &str) -> Vec<Shared> {
        self.transfers
            .iter()
            .map(|e| e.value().clone())
            .collect::<Vec<_>>()
            .into_iter()
            .filter(|t| {
                t.try_read()
                    .map(|t| t.sender_uid == uid || t.receiver_uid == uid)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Create a SEND transfer: bind a pool port, register the record, spawn
    /// the sender task, and announce the offer to the receiver.
    ///
    /// Returns the transfer id, or `None` when the per-client cap, the port
    /// pool, or the source file denies the transfer.
    pub async fn create_send_transfer(
        &self,
        hub: &Arc<Hub>,
        sender_uid: &Uid,
        receiver_uid: &Uid,
        filename: &str,
        filesize: u64,
    ) -> Option<String> {
        if filesize == 0 || filesize > self.config.max_file_size {
            return None;
        }
        if self.client_transfers(sender_uid).len() >= self.config.max_transfers_per_client {
            debug!(uid = %sender_uid, "per-client transfer cap reached");
            return None;
        }

        let (listener, port) = self.bind_pool_port().await?;
        let path = PathBuf::from(&self.config.send_root).join(filename);

        let (sender_nick, sender_mask, receiver_nick) = {
            let sender = hub.session(sender_uid)?;
            let receiver = hub.session(receiver_uid)?;
            let s = sender.read().await;
            let r = receiver.read().await.nick.clone();
            (s.nick.clone(), s.mask(), r)
        };

        let id = self.fresh_id();
        let now = Instant::now();
        let record = Arc::new(RwLock::new(DccTransfer {
            id: id.clone(),
            sender_uid: sender_uid.clone(),
            sender_nick: sender_nick.clone(),
            receiver_uid: receiver_uid.clone(),
            receiver_nick: receiver_nick.clone(),
            filename: filename.to_string(),
            path,
            filesize,
            bytes: 0,
            status: DccStatus::Pending,
            port,
            // The daemon plays both transfer peers, so the announced
            // address is its own loopback.
            addr: Ipv4Addr::LOCALHOST,
            started_at: now,
            last_activity: now,
            last_progress_decile: 0,
        }));
        self.transfers.insert(id.clone(), record.clone());
        self.pending_by_receiver
            .entry(receiver_nick.clone())
            .or_default()
            .push(id.clone());

        tokio::spawn(run_sender(hub.clone(), record.clone(), listener));

        // CTCP-framed offer, delivered as a PRIVMSG from the sender.
        let offer = DccSendOffer {
            filename: filename.to_string(),
            addr: Ipv4Addr::LOCALHOST,
            port,
            filesize,
            id: id.clone(),
        };
        let msg = Message::new("PRIVMSG", vec![receiver_nick, offer.to_ctcp()])
            .with_prefix(sender_mask);
        hub.send_to_uid(receiver_uid, msg).await;

        info!(id = %id, file = %filename, port, size = filesize, "DCC SEND offer created");
        Some(id)
    }

    /// Accept a pending offer: the caller must be the receiver. Spawns the
    /// receiver task, which connects to the announced endpoint.
    pub async fn accept_transfer(&self, hub: &Arc<Hub>, uid: &Uid, id: &str) -> bool {
        let Some(record) = self.get(id) else {
            return false;
        };
        {
            let t = record.read().await;
            if t.receiver_uid != *uid || t.status != DccStatus::Pending {
                return false;
            }
        }
        let (sender_uid, text) = {
            let mut t = record.write().await;
            // Claimed now so a second GET cannot spawn a second receiver;
            // the sender side restamps the start time on socket accept.
            t.status = DccStatus::Active;
            t.touch();
            (
                t.sender_uid.clone(),
                format!(
                    "DCC SEND accepted by {} for file {}",
                    t.receiver_nick, t.filename
                ),
            )
        };
        hub.server_notice(&sender_uid, &text).await;
        tokio::spawn(run_receiver(hub.clone(), record));
        true
    }

    /// Reject a pending offer: the caller must be the receiver.
    pub async fn reject_transfer(&self, hub: &Arc<Hub>, uid: &Uid, id: &str) -> bool {
        let Some(record) = self.get(id) else {
            return false;
        };
        {
            let t = record.read().await;
            if t.receiver_uid != *uid || t.status != DccStatus::Pending {
                return false;
            }
        }
        let (sender_uid, text) = {
            let mut t = record.write().await;
            t.status = DccStatus::Rejected;
            (
                t.sender_uid.clone(),
                format!(
                    "DCC SEND rejected by {} for file {}",
                    t.receiver_nick, t.filename
                ),
            )
        };
        hub.server_notice(&sender_uid, &text).await;
        self.cleanup(id).await;
        true
    }

    /// Cancel a transfer in any non-terminal state; both peers are notified
    /// through the failure path.
    pub async fn cancel_transfer(&self, hub: &Arc<Hub>, id: &str) {
        self.fail(hub, id, "error").await;
    }

    /// Fail every transfer a departing session participates in.
    pub async fn remove_client(&self, hub: &Arc<Hub>, uid: &str) {
        let ids: Vec<String> = {
            let mut ids = Vec::new();
            for record in self.client_transfers(uid) {
                ids.push(record.read().await.id.clone());
            }
            ids
        };
        for id in ids {
            self.fail(hub, &id, "error").await;
        }
    }

    /// Scan for transfers with no progress for the idle timeout and fail
    /// them. Runs on the maintenance tick.
    pub async fn check_timeouts(&self, hub: &Arc<Hub>) {
        let snapshot: Vec<Shared> = self.transfers.iter().map(|e| e.value().clone()).collect();
        let mut stale = Vec::new();
        for record in snapshot {
            let t = record.read().await;
            if !t.status.is_terminal() && t.last_activity.elapsed() > self.config.idle_timeout {
                stale.push(t.id.clone());
            }
        }
        for id in stale {
            warn!(id = %id, "DCC transfer timed out");
            self.fail(hub, &id, "timeout").await;
        }
    }

    /// Find a pending offer from `sender_nick` to the calling receiver for
    /// a given filename.
    pub async fn find_pending(
        &self,
        sender_nick: &str,
        receiver_uid: &str,
        filename: &str,
    ) -> Option<String> {
        let snapshot: Vec<Shared> = self.transfers.iter().map(|e| e.value().clone()).collect();
        for record in snapshot {
            let t = record.read().await;
            if t.status == DccStatus::Pending
                && t.sender_nick == sender_nick
                && t.receiver_uid == receiver_uid
                && t.filename == filename
            {
                return Some(t.id.clone());
            }
        }
        None
    }

    /// Aggregate counters for `DCC STATUS`.
    pub async fn counters(&self) -> DccCounters {
        let mut counters = DccCounters {
            completed: self.completed.load(Ordering::Relaxed),
            total_bytes: self.finished_bytes.load(Ordering::Relaxed),
            ..Default::default()
        };
        let snapshot: Vec<Shared> = self.transfers.iter().map(|e| e.value().clone()).collect();
        for record in snapshot {
            let t = record.read().await;
            match t.status {
                DccStatus::Active => {
                    counters.active += 1;
                    counters.total_bytes += t.bytes;
                }
                DccStatus::Pending => counters.pending += 1,
                _ => {}
            }
        }
        counters
    }

    // ------------------------------------------------------------------
    // Terminal transitions (idempotent)
    // ------------------------------------------------------------------

    /// Mark a transfer completed and notify both peers. A transfer already
    /// in a terminal state is left untouched.
    pub async fn complete(&self, hub: &Arc<Hub>, id: &str) {
        let Some(record) = self.get(id) else {
            return;
        };
        let notice = {
            let mut t = record.write().await;
            if t.status.is_terminal() {
                return;
            }
            t.status = DccStatus::Completed;
            self.completed.fetch_add(1, Ordering::Relaxed);
            self.finished_bytes.fetch_add(t.filesize, Ordering::Relaxed);
            (
                t.sender_uid.clone(),
                format!(
                    "DCC SEND completed: {} ({}) to {}",
                    t.filename,
                    format_size(t.filesize),
                    t.receiver_nick
                ),
                t.receiver_uid.clone(),
                format!(
                    "DCC GET completed: {} ({}) from {}",
                    t.filename,
                    format_size(t.filesize),
                    t.sender_nick
                ),
            )
        };
        hub.server_notice(&notice.0, &notice.1).await;
        hub.server_notice(&notice.2, &notice.3).await;
        info!(id = %id, "DCC transfer completed");
        self.cleanup(id).await;
    }

    /// Mark a transfer failed (`reason` is `timeout` or `error`) and notify
    /// both peers. Idempotent.
    pub async fn fail(&self, hub: &Arc<Hub>, id: &str, reason: &str) {
        let Some(record) = self.get(id) else {
            return;
        };
        let notice = {
            let mut t = record.write().await;
            if t.status.is_terminal() {
                return;
            }
            t.status = DccStatus::Failed;
            self.finished_bytes.fetch_add(t.bytes, Ordering::Relaxed);
            (
                t.sender_uid.clone(),
                format!("DCC SEND failed ({reason}): {}", t.filename),
                t.receiver_uid.clone(),
                format!("DCC GET failed ({reason}): {}", t.filename),
            )
        };
        hub.server_notice(&notice.0, &notice.1).await;
        hub.server_notice(&notice.2, &notice.3).await;
        self.cleanup(id).await;
    }

    /// Emit a progress NOTICE to both peers when a 10% boundary is crossed.
    async fn progress(&self, hub: &Arc<Hub>, record: &Shared) {
        let notice = {
            let mut t = record.write().await;
            if t.status != DccStatus::Active {
                return;
            }
            let decile = (t.progress() / 10.0) as u8 * 10;
            if decile == t.last_progress_decile {
                return;
            }
            t.last_progress_decile = decile;
            let text = format!(
                "DCC Transfer progress: {} [{:.1}%] ({}/{}) Speed: {}",
                t.filename,
                t.progress(),
                format_size(t.bytes),
                format_size(t.filesize),
                format_rate(t.rate()),
            );
            (t.sender_uid.clone(), t.receiver_uid.clone(), text)
        };
        hub.server_notice(&notice.0, &notice.2).await;
        hub.server_notice(&notice.1, &notice.2).await;
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn fresh_id(&self) -> String {
        loop {
            let id = format!(
                "{}_{}",
                chrono::Utc::now().timestamp(),
                rand::thread_rng().gen_range(0..10_000)
            );
            if !self.transfers.contains_key(&id) {
                return id;
            }
        }
    }

    /// Ports held by non-terminal transfers.
    async fn ports_in_use(&self) -> HashSet<u16> {
        let snapshot: Vec<Shared> = self.transfers.iter().map(|e| e.value().clone()).collect();
        let mut used = HashSet::new();
        for record in snapshot {
            let t = record.read().await;
            if !t.status.is_terminal() {
                used.insert(t.port);
            }
        }
        used
    }

    /// Bind a listening socket on a free pool port, scanning from the
    /// cursor and wrapping. `None` means pool exhaustion.
    async fn bind_pool_port(&self) -> Option<(TcpListener, u16)> {
        let in_use = self.ports_in_use().await;
        let span = u32::from(self.config.port_max - self.config.port_min) + 1;
        let start = *self.next_port.lock().expect("port cursor poisoned");
        for i in 0..span {
            let offset = (u32::from(start - self.config.port_min) + i) % span;
            let port = self.config.port_min + offset as u16;
            if in_use.contains(&port) {
                continue;
            }
            match TcpListener::bind(("0.0.0.0", port)).await {
                Ok(listener) => {
                    let mut cursor = self.next_port.lock().expect("port cursor poisoned");
                    *cursor = if port >= self.config.port_max {
                        self.config.port_min
                    } else {
                        port + 1
                    };
                    return Some((listener, port));
                }
                Err(_) => continue,
            }
        }
        warn!("DCC port pool exhausted");
        None
    }

    async fn cleanup(&self, id: &str) {
        let Some((_, record)) = self.transfers.remove(id) else {
            return;
        };
        let receiver_nick = record.read().await.receiver_nick.clone();
        if let Some(mut pending) = self.pending_by_receiver.get_mut(&receiver_nick) {
            pending.retain(|p| p != id);
        }
        self.pending_by_receiver
            .remove_if(&receiver_nick, |_, v| v.is_empty());
    }
}

// ----------------------------------------------------------------------
// Transfer tasks
// ----------------------------------------------------------------------

/// True when the transfer was cancelled or failed elsewhere. A `Completed`
/// set by the opposite side does not stop the loop: the remaining in-flight
/// bytes must still be drained.
async fn aborted(record: &Shared) -> bool {
    matches!(
        record.read().await.status,
        DccStatus::Failed | DccStatus::Rejected
    )
}

/// Sender side: wait for the data connection on the pool port, then stream
/// the file in 8 KiB chunks. The listening socket is dropped as soon as the
/// data connection is established.
async fn run_sender(hub: Arc<Hub>, record: Shared, listener: TcpListener) {
    let id = record.read().await.id.clone();
    let idle = hub.dcc.config.idle_timeout;

    let (mut stream, peer) = match timeout(idle, listener.accept()).await {
        Ok(Ok(accepted)) => accepted,
        Ok(Err(e)) => {
            debug!(id = %id, error = %e, "DCC accept failed");
            hub.dcc.fail(&hub, &id, "error").await;
            return;
        }
        Err(_) => {
            hub.dcc.fail(&hub, &id, "timeout").await;
            return;
        }
    };
    drop(listener);
    debug!(id = %id, peer = %peer, "DCC data connection accepted");

    let path = {
        let mut t = record.write().await;
        if t.status.is_terminal() {
            return;
        }
        t.status = DccStatus::Active;
        t.started_at = Instant::now();
        t.touch();
        t.path.clone()
    };

    let mut file = match fs::File::open(&path).await {
        Ok(f) => f,
        Err(e) => {
            warn!(id = %id, path = %path.display(), error = %e, "DCC source open failed");
            hub.dcc.fail(&hub, &id, "error").await;
            return;
        }
    };

    let mut buf = vec![0u8; hub.dcc.config.chunk_size];
    loop {
        if aborted(&record).await {
            return;
        }
        let n = match file.read(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                warn!(id = %id, error = %e, "DCC file read failed");
                hub.dcc.fail(&hub, &id, "error").await;
                return;
            }
        };
        if n == 0 {
            let done = {
                let t = record.read().await;
                t.bytes >= t.filesize
            };
            if done {
                hub.dcc.complete(&hub, &id).await;
            } else {
                hub.dcc.fail(&hub, &id, "error").await;
            }
            return;
        }
        match timeout(idle, stream.write_all(&buf[..n])).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(id = %id, error = %e, "DCC send failed");
                hub.dcc.fail(&hub, &id, "error").await;
                return;
            }
            Err(_) => {
                hub.dcc.fail(&hub, &id, "timeout").await;
                return;
            }
        }
        let finished = {
            let mut t = record.write().await;
            t.bytes += n as u64;
            t.touch();
            t.bytes >= t.filesize
        };
        hub.dcc.progress(&hub, &record).await;
        if finished {
            // Flush the stream so the peer observes EOF at exactly
            // filesize bytes.
            let _ = stream.flush().await;
            hub.dcc.complete(&hub, &id).await;
            return;
        }
    }
}

/// Receiver side: connect to the announced endpoint, write the bytes under
/// the receive directory, and acknowledge the running total after each
/// chunk with a 4-byte big-endian counter.
async fn run_receiver(hub: Arc<Hub>, record: Shared) {
    let (id, addr, port, filename, filesize) = {
        let t = record.read().await;
        (
            t.id.clone(),
            t.addr,
            t.port,
            t.filename.clone(),
            t.filesize,
        )
    };
    let idle = hub.dcc.config.idle_timeout;

    if let Err(e) = fs::create_dir_all(&hub.dcc.config.recv_root).await {
        warn!(id = %id, error = %e, "DCC receive dir creation failed");
        hub.dcc.fail(&hub, &id, "error").await;
        return;
    }
    let dest = PathBuf::from(&hub.dcc.config.recv_root).join(&filename);
    let mut file = match fs::File::create(&dest).await {
        Ok(f) => f,
        Err(e) => {
            warn!(id = %id, path = %dest.display(), error = %e, "DCC destination open failed");
            hub.dcc.fail(&hub, &id, "error").await;
            return;
        }
    };

    let mut stream = match timeout(idle, TcpStream::connect((addr, port))).await {
        Ok(Ok(s)) => s,
        Ok(Err(e)) => {
            debug!(id = %id, error = %e, "DCC connect failed");
            hub.dcc.fail(&hub, &id, "error").await;
            return;
        }
        Err(_) => {
            hub.dcc.fail(&hub, &id, "timeout").await;
            return;
        }
    };

    let mut buf = vec![0u8; hub.dcc.config.chunk_size];
    let mut received: u64 = 0;
    let mut unflushed: u64 = 0;
    loop {
        if aborted(&record).await {
            return;
        }
        let n = match timeout(idle, stream.read(&mut buf)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                debug!(id = %id, error = %e, "DCC recv failed");
                hub.dcc.fail(&hub, &id, "error").await;
                return;
            }
            Err(_) => {
                hub.dcc.fail(&hub, &id, "timeout").await;
                return;
            }
        };
        if n == 0 {
            // Peer close: completion iff every byte arrived.
            let _ = file.flush().await;
            if received >= filesize {
                hub.dcc.complete(&hub, &id).await;
            } else {
                hub.dcc.fail(&hub, &id, "error").await;
            }
            return;
        }
        if let Err(e) = file.write_all(&buf[..n]).await {
            warn!(id = %id, error = %e, "DCC file write failed");
            hub.dcc.fail(&hub, &id, "error").await;
            return;
        }
        received += n as u64;
        unflushed += n as u64;
        if unflushed >= hub.dcc.config.flush_interval {
            let _ = file.flush().await;
            unflushed = 0;
        }
        record.write().await.touch();

        // Classical DCC acknowledgment; best-effort, never blocks the
        // data path.
        let ack = (received as u32).to_be_bytes();
        let _ = stream.try_write(&ack);

        if received >= filesize {
            let _ = file.flush().await;
            hub.dcc.complete(&hub, &id).await;
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, port: u16, status: DccStatus, bytes: u64, filesize: u64) -> Shared {
        let now = Instant::now();
        Arc::new(RwLock::new(DccTransfer {
            id: id.to_string(),
            sender_uid: "000001".to_string(),
            sender_nick: "alice".to_string(),
            receiver_uid: "000002".to_string(),
            receiver_nick: "bob".to_string(),
            filename: "f.bin".to_string(),
            path: PathBuf::from("./dcc_transfers/f.bin"),
            filesize,
            bytes,
            status,
            port,
            addr: Ipv4Addr::LOCALHOST,
            started_at: now,
            last_activity: now,
            last_progress_decile: 0,
        }))
    }

    fn manager() -> DccManager {
        DccManager::new(DccConfig::default())
    }

    #[tokio::test]
    async fn port_is_free_once_its_transfer_is_terminal() {
        let m = manager();
        m.transfers
            .insert("a".into(), record("a", 5000, DccStatus::Active, 0, 10));
        m.transfers
            .insert("b".into(), record("b", 5001, DccStatus::Completed, 10, 10));
        m.transfers
            .insert("c".into(), record("c", 5002, DccStatus::Pending, 0, 10));

        let used = m.ports_in_use().await;
        assert!(used.contains(&5000));
        assert!(!used.contains(&5001), "terminal transfer frees its port");
        assert!(used.contains(&5002));
    }

    #[tokio::test]
    async fn client_transfers_matches_either_side() {
        let m = manager();
        m.transfers
            .insert("a".into(), record("a", 5000, DccStatus::Pending, 0, 10));
        assert_eq!(m.client_transfers("000001").len(), 1);
        assert_eq!(m.client_transfers("000002").len(), 1);
        assert_eq!(m.client_transfers("000003").len(), 0);
    }

    #[tokio::test]
    async fn counters_aggregate_live_and_finished() {
        let m = manager();
        m.transfers
            .insert("a".into(), record("a", 5000, DccStatus::Active, 300, 1000));
        m.transfers
            .insert("b".into(), record("b", 5001, DccStatus::Pending, 0, 10));
        m.completed.store(2, Ordering::Relaxed);
        m.finished_bytes.store(5000, Ordering::Relaxed);

        let counters = m.counters().await;
        assert_eq!(counters.active, 1);
        assert_eq!(counters.pending, 1);
        assert_eq!(counters.completed, 2);
        assert_eq!(counters.total_bytes, 5300);
    }

    #[test]
    fn fresh_ids_are_unique_and_shaped() {
        let m = manager();
        let a = m.fresh_id();
        let b = m.fresh_id();
        assert!(a.contains('_'));
        // Same-second ids still differ once one is registered.
        m.transfers
            .insert(a.clone(), record(&a, 5000, DccStatus::Pending, 0, 1));
        let c = m.fresh_id();
        assert_ne!(a, c);
        let _ = b;
    }
}
