//! Realtime fan-out hub.
//!
//! Each event is encoded to a JSON text frame once and sent through a tokio
//! broadcast channel, so publishing never waits on a subscriber. Receivers
//! buffer up to `capacity` frames; a receiver that falls further behind
//! observes `Lagged` and should be sent [`recovery_frames`] so the client
//! re-fetches instead of silently missing state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use domains::{EventPublisher, FanoutEvent};
use serde::Serialize;
use tokio::sync::broadcast;

pub type Frame = Arc<str>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanoutStats {
    pub published: u64,
    /// Events nobody was subscribed to.
    pub undelivered: u64,
    /// Frames skipped by lagging subscribers.
    pub lagged: u64,
    pub subscribers: usize,
}

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    undelivered: AtomicU64,
    lagged: AtomicU64,
}

#[derive(Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<Frame>,
    counters: Arc<Counters>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Frame> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Records frames a subscriber skipped after lagging.
    pub fn record_lag(&self, skipped: u64) {
        self.counters.lagged.fetch_add(skipped, Ordering::Relaxed);
    }

    pub fn stats(&self) -> FanoutStats {
        FanoutStats {
            published: self.counters.published.load(Ordering::Relaxed),
            undelivered: self.counters.undelivered.load(Ordering::Relaxed),
            lagged: self.counters.lagged.load(Ordering::Relaxed),
            subscribers: self.subscriber_count(),
        }
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: FanoutEvent) {
        let frame = match encode(&event) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::error!(error = %err, "failed to encode fan-out event");
                return;
            }
        };
        self.counters.published.fetch_add(1, Ordering::Relaxed);
        if self.sender.send(frame).is_err() {
            self.counters.undelivered.fetch_add(1, Ordering::Relaxed);
        }
    }
}

pub fn encode(event: &FanoutEvent) -> Result<Frame, serde_json::Error> {
    serde_json::to_string(event).map(Frame::from)
}

/// What a lagging subscriber receives in place of the frames it missed.
pub fn recovery_frames() -> Vec<Frame> {
    [FanoutEvent::RefreshThreads, FanoutEvent::RefreshGossips]
        .iter()
        .filter_map(|event| encode(event).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    #[tokio::test]
    async fn every_subscriber_gets_each_frame() {
        let hub = BroadcastPublisher::new(8);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.publish(FanoutEvent::RefreshThreads);

        let expected = r#"{"event":"refresh-threads"}"#;
        assert_eq!(&*a.recv().await.unwrap(), expected);
        assert_eq!(&*b.recv().await.unwrap(), expected);
        assert_eq!(hub.stats().published, 1);
    }

    #[test]
    fn publishing_without_subscribers_is_counted_not_fatal() {
        let hub = BroadcastPublisher::new(4);
        hub.publish(FanoutEvent::RefreshGossips);
        let stats = hub.stats();
        assert_eq!((stats.published, stats.undelivered, stats.subscribers), (1, 1, 0));
    }

    #[tokio::test]
    async fn slow_subscriber_lags_without_blocking_publish() {
        let hub = BroadcastPublisher::new(2);
        let mut slow = hub.subscribe();
        for _ in 0..5 {
            hub.publish(FanoutEvent::RefreshThreads);
        }
        match slow.recv().await {
            Err(RecvError::Lagged(skipped)) => {
                hub.record_lag(skipped);
                assert_eq!(skipped, 3);
            }
            other => panic!("expected lag, got {other:?}"),
        }
        assert_eq!(hub.stats().lagged, 3);
    }

    #[tokio::test]
    async fn dropped_subscriber_is_pruned() {
        let hub = BroadcastPublisher::new(4);
        let rx = hub.subscribe();
        let mut keep = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);
        drop(rx);
        assert_eq!(hub.subscriber_count(), 1);

        hub.publish(FanoutEvent::RefreshThreads);
        assert!(keep.recv().await.is_ok());
    }

    #[test]
    fn recovery_asks_for_both_refreshes() {
        let frames = recovery_frames();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].contains("refresh-threads"));
        assert!(frames[1].contains("refresh-gossips"));
    }
}
