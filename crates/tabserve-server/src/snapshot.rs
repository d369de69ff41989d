//! Snapshot store
//!
//! Holds the single live snapshot of input rows. A delivered batch replaces
//! the snapshot wholesale; readers hold an `Arc` to the snapshot they started
//! with, so a replacement never shows them a mix of two batches.

use std::sync::Arc;

use tabserve_core::Row;
use tracing::debug;

/// Rows of one delivered batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Batch sequence number, 0 before the first delivery.
    pub batch: u64,
    pub rows: Vec<Row>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }
}

#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: Arc<Snapshot>,
    last_batch: u64,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a new snapshot and return its batch sequence number.
    pub fn replace(&mut self, rows: Vec<Row>) -> u64 {
        self.last_batch += 1;
        debug!(batch = self.last_batch, rows = rows.len(), "Replacing snapshot");
        self.current = Arc::new(Snapshot {
            batch: self.last_batch,
            rows,
        });
        self.last_batch
    }

    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current)
    }

    /// Drop the live rows. Batch numbering continues.
    pub fn clear(&mut self) {
        self.current = Arc::new(Snapshot {
            batch: self.last_batch,
            rows: Vec::new(),
        });
    }
}
