//! Non-blocking snapshot bridge from the world to a rendering consumer.
//!
//! A bounded channel with drop-on-full semantics: the producer never blocks,
//! so a stalled consumer can only cost dropped frames, never simulation time.
//! The consumer reads whatever is pending at the top of its frame and keeps
//! only the most recent snapshot.

use crate::message::WorldSnapshot;
use crossfire::{MAsyncTx, MRx, TryRecvError, TrySendError, mpmc};
use tracing::debug;

/// Default capacity of the bridge; enough to smooth a few frames of consumer
/// jitter without buffering stale state.
pub const SNAPSHOT_CAPACITY: usize = 10;

/// Producer half held by the world actor.
pub struct SnapshotSender {
    tx: MAsyncTx<WorldSnapshot>,
    dropped: u64,
}

/// Consumer half held by the driver/renderer.
pub struct SnapshotReceiver {
    rx: MRx<WorldSnapshot>,
}

/// Create a bridge with the given capacity.
#[must_use]
pub fn snapshot_bridge(capacity: usize) -> (SnapshotSender, SnapshotReceiver) {
    crossfire::detect_backoff_cfg();
    let (tx, rx) = mpmc::bounded_tx_async_rx_blocking(capacity);
    (SnapshotSender { tx, dropped: 0 }, SnapshotReceiver { rx })
}

impl SnapshotSender {
    /// Push a frame without blocking. Returns true when the frame was
    /// accepted; a full or disconnected channel drops the frame.
    pub fn publish(&mut self, snapshot: WorldSnapshot) -> bool {
        match self.tx.try_send(snapshot) {
            Ok(()) => true,
            Err(TrySendError::Full(_frame)) => {
                self.dropped += 1;
                debug!(dropped = self.dropped, "snapshot sink full, dropping frame");
                false
            }
            Err(TrySendError::Disconnected(_frame)) => false,
        }
    }

    /// Total frames dropped because the sink was full.
    #[must_use]
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }
}

impl SnapshotReceiver {
    /// Drain every pending snapshot and return the most recent one, or `None`
    /// when nothing arrived since the last call.
    #[must_use]
    pub fn latest(&self) -> Option<WorldSnapshot> {
        let mut latest = None;
        loop {
            match self.rx.try_recv() {
                Ok(snapshot) => latest = Some(snapshot),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(red_count: usize) -> WorldSnapshot {
        WorldSnapshot {
            red_count,
            ..WorldSnapshot::empty()
        }
    }

    #[test]
    fn consumer_sees_only_the_most_recent_frame() {
        let (mut tx, rx) = snapshot_bridge(4);
        assert!(tx.publish(frame(1)));
        assert!(tx.publish(frame(2)));
        assert!(tx.publish(frame(3)));
        let latest = rx.latest().expect("snapshot");
        assert_eq!(latest.red_count, 3);
        assert!(rx.latest().is_none());
    }

    #[test]
    fn full_bridge_drops_the_newest_frame() {
        let (mut tx, rx) = snapshot_bridge(2);
        assert!(tx.publish(frame(1)));
        assert!(tx.publish(frame(2)));
        assert!(!tx.publish(frame(3)));
        assert_eq!(tx.dropped_frames(), 1);
        // The dropped frame never reaches the consumer.
        assert_eq!(rx.latest().expect("snapshot").red_count, 2);
    }

    #[test]
    fn disconnected_consumer_does_not_block_the_producer() {
        let (mut tx, rx) = snapshot_bridge(2);
        drop(rx);
        assert!(!tx.publish(frame(1)));
    }
}
