// src/relay/pending.rs
//! Outstanding-request bookkeeping for the relay backend
//!
//! The wire protocol has no correlation ids; it assumes at most one
//! outstanding request of a given kind. Each sent command that expects a
//! reply occupies the single slot for its kind and is resolved exactly once:
//! by the matching acknowledgment, by timeout (the slot is discarded and a
//! late reply is ignored), or by a wire `error` (which fails every request
//! currently in flight).

use crate::error::TransportError;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::debug;

/// Request kinds that await a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Hello,
    Open,
    GetConfig,
    SetConfig,
    SetSamplingRate,
    Start,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Hello => "hello",
            RequestKind::Open => "open",
            RequestKind::GetConfig => "get_config",
            RequestKind::SetConfig => "set_config",
            RequestKind::SetSamplingRate => "set_sampling_rate",
            RequestKind::Start => "start",
        }
    }
}

/// Payload of a resolved acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AckPayload {
    pub ok: bool,
    /// Only `set_sampling_rate_ack` carries this.
    pub applied_hz: Option<f64>,
}

impl AckPayload {
    pub fn ok() -> Self {
        Self { ok: true, applied_hz: None }
    }

    pub fn rejected() -> Self {
        Self { ok: false, applied_hz: None }
    }
}

type Completion = oneshot::Sender<Result<AckPayload, TransportError>>;

/// Single-slot pending-request table, shared between the command side and
/// the receive loop.
#[derive(Default)]
pub struct PendingTable {
    slots: Mutex<HashMap<RequestKind, Completion>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupy the slot for `kind`. Fails if a request of this kind is
    /// already in flight; the protocol does not pipeline same-kind commands.
    pub fn register(
        &self,
        kind: RequestKind,
    ) -> Result<oneshot::Receiver<Result<AckPayload, TransportError>>, TransportError> {
        let mut slots = self.slots.lock();
        if slots.contains_key(&kind) {
            return Err(TransportError::RequestInFlight { request: kind.as_str() });
        }
        let (tx, rx) = oneshot::channel();
        slots.insert(kind, tx);
        Ok(rx)
    }

    /// Resolve the slot for `kind`, if occupied. Returns false for late or
    /// unsolicited replies, which callers simply ignore.
    pub fn resolve(&self, kind: RequestKind, result: Result<AckPayload, TransportError>) -> bool {
        let sender = self.slots.lock().remove(&kind);
        match sender {
            Some(tx) => tx.send(result).is_ok(),
            None => {
                debug!(request = kind.as_str(), "reply with no pending request, ignoring");
                false
            }
        }
    }

    /// Drop the slot for `kind` without resolving it (timeout path).
    pub fn discard(&self, kind: RequestKind) {
        self.slots.lock().remove(&kind);
    }

    /// Fail every request currently in flight.
    ///
    /// The protocol cannot correlate an `error` message to the request that
    /// caused it, so the safest reading is that everything outstanding
    /// failed.
    pub fn fail_all(&self, reason: &str) {
        let drained: Vec<(RequestKind, Completion)> =
            self.slots.lock().drain().collect();
        for (kind, tx) in drained {
            let _ = tx.send(Err(TransportError::ConnectionLost {
                reason: format!("{} failed: {}", kind.as_str(), reason),
            }));
        }
    }

    /// Number of requests currently in flight.
    pub fn in_flight(&self) -> usize {
        self.slots.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_slot_per_kind() {
        let table = PendingTable::new();
        let _rx = table.register(RequestKind::Start).expect("first register");
        assert!(matches!(
            table.register(RequestKind::Start),
            Err(TransportError::RequestInFlight { request: "start" })
        ));
        // A different kind is unaffected.
        assert!(table.register(RequestKind::Hello).is_ok());
        assert_eq!(table.in_flight(), 2);
    }

    #[tokio::test]
    async fn test_resolution_is_exactly_once() {
        let table = PendingTable::new();
        let rx = table.register(RequestKind::Open).unwrap();

        assert!(table.resolve(RequestKind::Open, Ok(AckPayload::ok())));
        // Second resolution finds no slot.
        assert!(!table.resolve(RequestKind::Open, Ok(AckPayload::ok())));

        let payload = rx.await.expect("completion").expect("ack");
        assert!(payload.ok);
    }

    #[tokio::test]
    async fn test_late_reply_after_discard_ignored() {
        let table = PendingTable::new();
        let rx = table.register(RequestKind::SetSamplingRate).unwrap();
        table.discard(RequestKind::SetSamplingRate);

        assert!(!table.resolve(RequestKind::SetSamplingRate, Ok(AckPayload::ok())));
        // The waiter sees a closed channel, not a value.
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_error_fails_all_in_flight() {
        let table = PendingTable::new();
        let open_rx = table.register(RequestKind::Open).unwrap();
        let start_rx = table.register(RequestKind::Start).unwrap();

        table.fail_all("device unplugged");
        assert_eq!(table.in_flight(), 0);

        for rx in [open_rx, start_rx] {
            match rx.await.expect("completion") {
                Err(TransportError::ConnectionLost { reason }) => {
                    assert!(reason.contains("device unplugged"));
                }
                other => panic!("expected ConnectionLost, got {:?}", other),
            }
        }
    }
}
