//! Query executor
//!
//! Pure selection over a snapshot: rows matching every filter, in snapshot
//! order. Neither the snapshot nor the query is modified.

use crate::snapshot::Snapshot;
use crate::types::{DataQuery, DataResult};

/// Run `query` against `snapshot`.
///
/// The result's remaining lifetime is the query's declared one; the server
/// overrides it with the queue entry's count.
pub fn execute<'a>(query: &'a DataQuery, snapshot: &'a Snapshot) -> DataResult<'a> {
    let rows = snapshot.iter().filter(|row| query.matches(row)).collect();

    DataResult {
        query,
        remaining: query.lifetime,
        batch: snapshot.batch,
        rows,
    }
}
