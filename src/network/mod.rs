//! Network front end: the listening gateway and per-connection handling.

mod connection;
mod gateway;

pub use gateway::Gateway;
