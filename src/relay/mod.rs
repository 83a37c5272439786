// src/relay/mod.rs
//! Network-relay backend: wire codec, pending-request bookkeeping and the
//! socket transport adapter

pub mod client;
pub mod codec;
pub mod pending;

pub use client::RelayTransport;
pub use codec::{RelayCommand, RelayEvent, RemoteConfig, WireSample, WireVec3};
pub use pending::{AckPayload, PendingTable, RequestKind};
