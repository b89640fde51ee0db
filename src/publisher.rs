//! Lock-free hand-off of the latest snapshot to readers.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::history::HistoryWindow;
use crate::models::StatsSnapshot;

/// Holds the most recent [`StatsSnapshot`].
///
/// The sampler swaps in a complete snapshot once per cycle; readers load
/// whichever snapshot is current without ever blocking the writer.
pub struct SnapshotPublisher {
    current: ArcSwap<StatsSnapshot>,
}

impl SnapshotPublisher {
    /// Start with the baseline snapshot (windows of `depth` zeros).
    pub fn new(depth: usize) -> Self {
        Self {
            current: ArcSwap::from_pointee(StatsSnapshot::baseline(depth)),
        }
    }

    /// Shared handle to the current snapshot.
    pub fn current(&self) -> Arc<StatsSnapshot> {
        self.current.load_full()
    }

    /// Named history window of the current snapshot.
    pub fn history_for(&self, name: &str) -> Option<HistoryWindow> {
        self.current.load().history_for(name)
    }

    pub fn publish(&self, snapshot: StatsSnapshot) -> Arc<StatsSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.current.store(Arc::clone(&snapshot));
        snapshot
    }
}
