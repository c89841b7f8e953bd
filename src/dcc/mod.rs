//! DCC file transfer subsystem.
//!
//! The server mediates DCC SEND between two of its clients: the sender
//! side binds a listening socket from the pool and streams the file; the
//! receiver side connects to the announced address and writes the bytes
//! under `./dcc_transfers/received/`. Negotiation rides the IRC pipe as
//! CTCP PRIVMSG offers and server NOTICEs.

mod manager;
mod transfer;

pub use manager::DccManager;
pub use transfer::{format_rate, format_size, DccDirection, DccStatus, DccTransfer};
