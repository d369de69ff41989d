//! Query queue manager
//!
//! Buffers data queries between window boundaries. Each admitted query gets a
//! [`QueueEntry`] holding a monotonically increasing sequence number and a
//! lifetime counter. At every window close the server starts a new drain,
//! numbered by the caller, and takes the due entries in sequence order.
//! Serving an entry decrements its lifetime, and an entry whose lifetime
//! reaches zero leaves the queue.
//!
//! Every entry leaves the queue through exactly one accounted path: it
//! expires, it is cancelled, it is replaced by a query with the same id, or
//! it is discarded when the queue is cleared.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::types::{DataQuery, Lifetime};

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// Bookkeeping record for a buffered data query.
#[derive(Debug, Clone)]
pub struct QueueEntry<M> {
    /// Admission order. Replacing a query assigns a new sequence number.
    pub sequence: u64,
    pub query: Arc<DataQuery>,
    pub meta: M,
    pub remaining: Lifetime,
    /// Number of the last drain that served this entry.
    last_drain: Option<u64>,
}

/// An entry handed out for execution at a window boundary.
#[derive(Debug, Clone)]
pub struct DueEntry<M> {
    pub sequence: u64,
    pub query: Arc<DataQuery>,
    pub meta: M,
    /// Lifetime left after this serve.
    pub remaining: Lifetime,
}

/// Queue accounting counters.
///
/// Every admitted entry is eventually counted once in `replaced`, `expired`,
/// `cancelled` or `discarded`, or is still buffered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub admitted: u64,
    pub replaced: u64,
    pub served: u64,
    pub expired: u64,
    pub cancelled: u64,
    pub discarded: u64,
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// Unbounded, window-scheduled queue of data queries.
///
/// `M` is an opaque payload carried next to each query.
#[derive(Debug)]
pub struct QueryQueue<M = ()> {
    entries: BTreeMap<u64, QueueEntry<M>>,
    by_id: HashMap<String, u64>,
    next_sequence: u64,
    stats: QueueStats,
}

impl<M> Default for QueryQueue<M> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            by_id: HashMap::new(),
            next_sequence: 0,
            stats: QueueStats::default(),
        }
    }
}

impl<M: Clone> QueryQueue<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a query and return its sequence number.
    ///
    /// `context` overrides the query's declared lifetime. A query whose id
    /// matches a buffered entry replaces that entry.
    pub fn enqueue(&mut self, query: DataQuery, meta: M, context: Option<Lifetime>) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        if let Some(previous) = self.by_id.remove(&query.id) {
            self.entries.remove(&previous);
            self.stats.replaced += 1;
            debug!(query_id = %query.id, previous, sequence, "Replacing queued query");
        }

        let remaining = context.unwrap_or(query.lifetime);
        self.stats.admitted += 1;

        if remaining.is_expired() {
            self.stats.expired += 1;
            debug!(query_id = %query.id, sequence, "Query admitted with no remaining lifetime");
            return sequence;
        }

        debug!(query_id = %query.id, sequence, remaining = %remaining, "Query enqueued");
        self.by_id.insert(query.id.clone(), sequence);
        let entry = QueueEntry {
            sequence,
            query: Arc::new(query),
            meta,
            remaining,
            last_drain: None,
        };
        if self.entries.insert(sequence, entry).is_some() {
            panic!("duplicate queue sequence number {}", sequence);
        }

        sequence
    }

    /// Lazily yield every entry due in drain `drain` in sequence order.
    ///
    /// The caller numbers its drains, one per window close. Each yielded
    /// entry is marked served for `drain`, so restarting the same drain only
    /// yields entries not served yet, while the next drain number serves
    /// everything again. Entries left unconsumed when the iterator is dropped
    /// are untouched.
    pub fn dequeue_due_entries(&mut self, drain: u64) -> DueEntries<'_, M> {
        DueEntries {
            queue: self,
            drain,
            cursor: 0,
        }
    }

    /// Remove the entry for `id`. Returns whether one was buffered.
    pub fn cancel(&mut self, id: &str) -> bool {
        match self.by_id.remove(id) {
            Some(sequence) => {
                self.entries.remove(&sequence);
                self.stats.cancelled += 1;
                debug!(query_id = %id, sequence, "Query cancelled");
                true
            }
            None => false,
        }
    }

    /// Drop every buffered entry, returning how many were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.entries.len();
        self.entries.clear();
        self.by_id.clear();
        self.stats.discarded += discarded as u64;
        discarded
    }

    pub fn get(&self, id: &str) -> Option<&QueueEntry<M>> {
        self.by_id.get(id).and_then(|sequence| self.entries.get(sequence))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    fn expire(&mut self, sequence: u64) {
        if let Some(entry) = self.entries.remove(&sequence) {
            self.by_id.remove(&entry.query.id);
            self.stats.expired += 1;
            debug!(query_id = %entry.query.id, sequence, "Query expired");
        }
    }
}

/// Iterator returned by [`QueryQueue::dequeue_due_entries`].
pub struct DueEntries<'a, M> {
    queue: &'a mut QueryQueue<M>,
    drain: u64,
    cursor: u64,
}

impl<'a, M: Clone> Iterator for DueEntries<'a, M> {
    type Item = DueEntry<M>;

    fn next(&mut self) -> Option<Self::Item> {
        let drain = self.drain;

        let due = {
            let (_, entry) = self
                .queue
                .entries
                .range_mut(self.cursor..)
                .find(|(_, entry)| entry.last_drain != Some(drain))?;

            entry.last_drain = Some(drain);
            entry.remaining = entry.remaining.decrement();

            DueEntry {
                sequence: entry.sequence,
                query: Arc::clone(&entry.query),
                meta: entry.meta.clone(),
                remaining: entry.remaining,
            }
        };

        self.cursor = due.sequence + 1;
        self.queue.stats.served += 1;
        if due.remaining.is_expired() {
            self.queue.expire(due.sequence);
        }

        Some(due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(queue: &mut QueryQueue, number: u64) -> Vec<String> {
        queue
            .dequeue_due_entries(number)
            .map(|due| due.query.id.clone())
            .collect()
    }

    // ------------------------------------------------------------------
    // Lifetimes
    // ------------------------------------------------------------------

    #[test]
    fn test_one_shot_served_once() {
        let mut queue = QueryQueue::new();
        queue.enqueue(DataQuery::new("a"), (), None);

        assert_eq!(drain(&mut queue, 1), vec!["a"]);
        assert!(queue.is_empty());
        assert!(drain(&mut queue, 2).is_empty());
        assert_eq!(queue.stats().expired, 1);
    }

    #[test]
    fn test_countdown_served_n_times() {
        let mut queue = QueryQueue::new();
        queue.enqueue(
            DataQuery::new("n").with_lifetime(Lifetime::Windows(3)),
            (),
            None,
        );

        let remaining: Vec<_> = (1..=4)
            .flat_map(|w| queue.dequeue_due_entries(w).map(|d| d.remaining).collect::<Vec<_>>())
            .collect();
        assert_eq!(
            remaining,
            vec![Lifetime::Windows(2), Lifetime::Windows(1), Lifetime::Windows(0)]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_continuous_never_expires() {
        let mut queue = QueryQueue::new();
        queue.enqueue(
            DataQuery::new("c").with_lifetime(Lifetime::Continuous),
            (),
            None,
        );

        for window in 0..50 {
            assert_eq!(drain(&mut queue, window), vec!["c"]);
        }
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.stats().served, 50);
        assert_eq!(queue.stats().expired, 0);
    }

    #[test]
    fn test_context_overrides_lifetime() {
        let mut queue = QueryQueue::new();
        queue.enqueue(DataQuery::new("a"), (), Some(Lifetime::Windows(2)));

        assert_eq!(drain(&mut queue, 1), vec!["a"]);
        assert_eq!(drain(&mut queue, 2), vec!["a"]);
        assert!(drain(&mut queue, 3).is_empty());
    }

    #[test]
    fn test_exhausted_lifetime_is_accounted_not_buffered() {
        let mut queue = QueryQueue::new();
        queue.enqueue(DataQuery::new("z"), (), Some(Lifetime::Windows(0)));

        assert!(queue.is_empty());
        assert_eq!(queue.stats().admitted, 1);
        assert_eq!(queue.stats().expired, 1);
    }

    // ------------------------------------------------------------------
    // Ordering and restartability
    // ------------------------------------------------------------------

    #[test]
    fn test_sequence_order() {
        let mut queue = QueryQueue::new();
        for id in ["x", "y", "z"] {
            queue.enqueue(DataQuery::new(id), (), None);
        }
        assert_eq!(drain(&mut queue, 7), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_restartable_within_drain() {
        let mut queue = QueryQueue::new();
        for id in ["x", "y", "z"] {
            queue.enqueue(DataQuery::new(id).with_lifetime(Lifetime::Continuous), (), None);
        }

        let first: Vec<_> = queue
            .dequeue_due_entries(4)
            .take(1)
            .map(|d| d.query.id.clone())
            .collect();
        assert_eq!(first, vec!["x"]);

        // x was already served in drain 4
        assert_eq!(drain(&mut queue, 4), vec!["y", "z"]);
        assert!(drain(&mut queue, 4).is_empty());
        assert_eq!(drain(&mut queue, 5), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_dropped_iterator_leaves_entries() {
        let mut queue = QueryQueue::new();
        queue.enqueue(DataQuery::new("a"), (), None);
        queue.enqueue(DataQuery::new("b"), (), None);

        drop(queue.dequeue_due_entries(1));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.get("a").unwrap().remaining, Lifetime::ONE_SHOT);
    }

    // ------------------------------------------------------------------
    // Replacement and cancellation
    // ------------------------------------------------------------------

    #[test]
    fn test_same_id_replaces_entry() {
        let mut queue = QueryQueue::new();
        let first = queue.enqueue(DataQuery::new("a"), (), None);
        queue.enqueue(DataQuery::new("b"), (), None);
        let second = queue.enqueue(
            DataQuery::new("a").with_lifetime(Lifetime::Windows(2)),
            (),
            None,
        );

        assert!(second > first);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.stats().replaced, 1);
        assert_eq!(drain(&mut queue, 1), vec!["b", "a"]);
        assert_eq!(queue.get("a").unwrap().remaining, Lifetime::Windows(1));
    }

    #[test]
    fn test_cancel() {
        let mut queue = QueryQueue::new();
        queue.enqueue(DataQuery::new("a").with_lifetime(Lifetime::Continuous), (), None);

        assert!(queue.cancel("a"));
        assert!(!queue.cancel("a"));
        assert!(queue.is_empty());
        assert_eq!(queue.stats().cancelled, 1);
    }

    #[test]
    fn test_clear_counts_discarded() {
        let mut queue = QueryQueue::new();
        queue.enqueue(DataQuery::new("a"), (), None);
        queue.enqueue(DataQuery::new("b"), (), None);

        assert_eq!(queue.clear(), 2);
        assert!(queue.get("a").is_none());
        assert_eq!(queue.stats().discarded, 2);
    }

    #[test]
    fn test_meta_travels_with_entry() {
        let mut queue: QueryQueue<&'static str> = QueryQueue::new();
        queue.enqueue(DataQuery::new("a"), "dashboard", None);

        let due: Vec<_> = queue.dequeue_due_entries(1).collect();
        assert_eq!(due[0].meta, "dashboard");
    }
}
