// src/session/subscribers.rs
//! Fan-out of decoded sample frames to session subscribers

use crate::acquisition::SampleFrame;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::warn;

/// Event delivered to session subscribers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A fully assembled sample frame.
    Frame(SampleFrame),
    /// The underlying link failed; no further frames will arrive until the
    /// session reconnects.
    SessionLost { reason: String },
}

/// Receiving end of a session subscription.
///
/// Delivery is lossy under backpressure: when a subscriber's queue is full
/// the newest frame is dropped for that subscriber rather than stalling the
/// receive loop.
pub struct SubscriptionHandle {
    rx: mpsc::Receiver<SessionEvent>,
}

impl SubscriptionHandle {
    /// Waits for the next event. Returns `None` once the session is gone.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    /// Non-blocking poll for the next event.
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.rx.try_recv().ok()
    }
}

/// Shared subscriber registry.
pub(crate) struct Subscribers {
    queue_depth: usize,
    senders: Mutex<Vec<mpsc::Sender<SessionEvent>>>,
    dropped: AtomicU64,
}

impl Subscribers {
    pub(crate) fn new(queue_depth: usize) -> Self {
        Self {
            queue_depth: queue_depth.max(1),
            senders: Mutex::new(Vec::new()),
            dropped: AtomicU64::new(0),
        }
    }

    pub(crate) fn subscribe(&self) -> SubscriptionHandle {
        let (tx, rx) = mpsc::channel(self.queue_depth);
        self.senders.lock().push(tx);
        SubscriptionHandle { rx }
    }

    /// Pushes an event to every live subscriber, pruning closed channels.
    pub(crate) fn publish(&self, event: SessionEvent) {
        let mut senders = self.senders.lock();
        senders.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if total % 256 == 1 {
                    warn!(total_dropped = total, "subscriber queue full, frame dropped");
                }
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.senders.lock().len()
    }

    pub(crate) fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_event() -> SessionEvent {
        let mut frame = SampleFrame::default();
        frame.timestamp = 7;
        frame.battery = Some(3.7);
        SessionEvent::Frame(frame)
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let subs = Subscribers::new(8);
        let mut a = subs.subscribe();
        let mut b = subs.subscribe();
        subs.publish(frame_event());

        for handle in [&mut a, &mut b] {
            match handle.recv().await {
                Some(SessionEvent::Frame(frame)) => assert_eq!(frame.timestamp, 7),
                other => panic!("unexpected event: {:?}", other.is_some()),
            }
        }
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let subs = Subscribers::new(1);
        let mut handle = subs.subscribe();
        subs.publish(frame_event());
        subs.publish(frame_event());
        assert_eq!(subs.dropped_frames(), 1);

        // The first frame is still there; the second was discarded.
        assert!(handle.try_recv().is_some());
        assert!(handle.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_closed_subscribers_are_pruned() {
        let subs = Subscribers::new(4);
        let handle = subs.subscribe();
        assert_eq!(subs.subscriber_count(), 1);
        drop(handle);
        subs.publish(SessionEvent::SessionLost {
            reason: "link reset".to_string(),
        });
        assert_eq!(subs.subscriber_count(), 0);
    }
}
