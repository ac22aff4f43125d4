// Fan-out of published snapshots to subscribers.

use crate::models::Snapshot;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, watch};

/// Receives each snapshot once, in production order.
pub trait SnapshotSink: Send + Sync + 'static {
    /// Hands the snapshot to the transport; returns how many subscribers it reached.
    fn publish(&self, snapshot: Arc<Snapshot>) -> usize;
}

/// A snapshot tagged with its publish sequence number. `seq` starts at 1 and grows by one
/// per publish regardless of the snapshot's wall-clock timestamp.
#[derive(Debug, Clone)]
pub struct Published {
    pub seq: u64,
    pub snapshot: Arc<Snapshot>,
}

/// Broadcast channel for live subscribers plus a watch slot with the latest snapshot, so a
/// new subscriber can be served immediately instead of waiting for the next tick.
#[derive(Clone)]
pub struct SnapshotHub {
    tx: broadcast::Sender<Published>,
    latest: watch::Sender<Option<Published>>,
    seq: Arc<AtomicU64>,
}

impl SnapshotHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        let (latest, _) = watch::channel(None);
        Self {
            tx,
            latest,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Published> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.latest.borrow().as_ref().map(|p| p.snapshot.clone())
    }

    /// Latest snapshot with its sequence number.
    pub fn latest_published(&self) -> Option<Published> {
        self.latest.borrow().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl SnapshotSink for SnapshotHub {
    fn publish(&self, snapshot: Arc<Snapshot>) -> usize {
        let published = Published {
            seq: self.seq.fetch_add(1, Ordering::Relaxed) + 1,
            snapshot,
        };
        self.latest.send_replace(Some(published.clone()));
        self.tx.send(published).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;

    fn snapshot(timestamp: u64) -> Arc<Snapshot> {
        Arc::new(Snapshot {
            timestamp,
            cpu: Section::ok(CpuStats::default()),
            memory: Section::ok(MemoryStats::default()),
            storage: Section::ok(StorageStats::default()),
            network: Section::ok(NetworkStats::default()),
            uptime: Section::ok(UptimeStats::default()),
            disk_io: Section::ok(DiskIoStats::default()),
            logs: Section::ok(LogStats::default()),
            gpu: Section::unavailable("off"),
            containers: Section::unavailable("off"),
            processes: Section::ok(ProcessStats::default()),
            sensors: Section::unavailable("off"),
        })
    }

    #[test]
    fn sequence_grows_when_clock_steps_back() {
        let hub = SnapshotHub::new(4);
        let mut rx = hub.subscribe();
        let clone = hub.clone();

        hub.publish(snapshot(2_000));
        clone.publish(snapshot(1_000));

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!((first.seq, first.snapshot.timestamp), (1, 2_000));
        assert_eq!((second.seq, second.snapshot.timestamp), (2, 1_000));
        assert_eq!(hub.latest_published().map(|p| p.seq), Some(2));
        assert_eq!(hub.latest().map(|s| s.timestamp), Some(1_000));
    }
}
