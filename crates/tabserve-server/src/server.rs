//! Window-synchronous tabular server
//!
//! [`TabularServer`] is embedded in a pipeline that drives window boundaries
//! and delivers input batches. Within that loop it:
//!
//! 1. Answers schema queries as soon as they arrive
//! 2. Buffers data queries until the current window closes
//! 3. Replaces the snapshot wholesale with every input batch
//! 4. At window close, executes every due query against the live snapshot
//!    and emits one serialized result per query
//!
//! ## Window state machine
//!
//! ```text
//! Closed --begin_window(id)--> Open(id) --end_window--> Draining(id) --> Closed
//! ```
//!
//! Calls that do not fit the current state return
//! [`ServerError::InvalidTransition`].
//!
//! ## Example
//!
//! ```ignore
//! let config = ServerConfig::with_schema(r#"{"values": [{"name": "id", "type": "int"}]}"#);
//! let mut server = TabularServer::setup(&config, JsonRowConverter)?;
//! let mut out: Vec<String> = Vec::new();
//!
//! server.begin_window(1)?;
//! server.process_input(&[json!({"id": 1})])?;
//! server.process_query(r#"{"type": "dataQuery", "id": "q1"}"#, &mut out);
//! server.end_window(&mut out)?;
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tabserve_core::{Row, Schema, SchemaRegistry};
use tracing::{debug, info, warn};

use crate::codec::Codec;
use crate::config::ServerConfig;
use crate::error::{CodecError, Result, ServerError};
use crate::executor;
use crate::queue::{QueryQueue, QueueStats};
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::types::{QueryEnvelope, QueryResult};

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// Output channel for serialized results.
pub trait ResultSink {
    fn emit(&mut self, message: String);
}

impl ResultSink for Vec<String> {
    fn emit(&mut self, message: String) {
        self.push(message);
    }
}

impl<F: FnMut(String)> ResultSink for F {
    fn emit(&mut self, message: String) {
        self(message)
    }
}

/// Converts one input record of the embedding pipeline into a row.
pub trait RowConverter<I> {
    fn convert(&self, input: &I, schema: &Schema) -> tabserve_core::Result<Row>;
}

impl<I, F: Fn(&I) -> Row> RowConverter<I> for F {
    fn convert(&self, input: &I, _schema: &Schema) -> tabserve_core::Result<Row> {
        Ok(self(input))
    }
}

/// Reads JSON objects as rows typed by the schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRowConverter;

impl RowConverter<JsonValue> for JsonRowConverter {
    fn convert(&self, input: &JsonValue, schema: &Schema) -> tabserve_core::Result<Row> {
        Row::from_json(input, schema)
    }
}

// ---------------------------------------------------------------------------
// State and statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Closed,
    Open(u64),
    Draining(u64),
}

impl fmt::Display for WindowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowState::Closed => f.write_str("closed"),
            WindowState::Open(id) => write!(f, "window {} is open", id),
            WindowState::Draining(id) => write!(f, "window {} is draining", id),
        }
    }
}

/// Server counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerStats {
    /// Envelopes dropped because they could not be parsed.
    pub malformed_envelopes: u64,
    /// Envelopes dropped because they did not fit the schema.
    pub schema_mismatches: u64,
    pub schema_results: u64,
    pub data_results: u64,
    pub cancel_requests: u64,
    pub batches_accepted: u64,
    pub batches_rejected: u64,
    pub windows_closed: u64,
}

impl ServerStats {
    pub fn dropped_envelopes(&self) -> u64 {
        self.malformed_envelopes + self.schema_mismatches
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

pub struct TabularServer<I> {
    registry: SchemaRegistry,
    codec: Codec,
    queue: QueryQueue,
    snapshots: SnapshotStore,
    converter: Box<dyn RowConverter<I>>,
    state: WindowState,
    last_window: Option<u64>,
    /// Queue drains started so far, one per window close.
    drains: u64,
    stats: ServerStats,
}

impl<I> TabularServer<I> {
    /// Build the server from its configuration.
    ///
    /// Fails with [`ServerError::Configuration`] when the schema or the
    /// formatter settings are invalid.
    pub fn setup(config: &ServerConfig, converter: impl RowConverter<I> + 'static) -> Result<Self> {
        let declaration = config.schema_declaration()?;
        let registry = SchemaRegistry::from_json(&declaration)
            .map_err(|e| ServerError::Configuration(e.to_string()))?;
        config
            .formatter
            .validate()
            .map_err(ServerError::Configuration)?;

        let codec = Codec::new(registry.schema(), config.formatter.build());
        info!(
            fields = registry.schema().len(),
            formatter = codec.formatter_name(),
            "Tabular server set up"
        );

        Ok(Self {
            registry,
            codec,
            queue: QueryQueue::new(),
            snapshots: SnapshotStore::new(),
            converter: Box::new(converter),
            state: WindowState::Closed,
            last_window: None,
            drains: 0,
            stats: ServerStats::default(),
        })
    }

    pub fn begin_window(&mut self, window_id: u64) -> Result<()> {
        if self.state != WindowState::Closed {
            return Err(self.invalid_transition("begin a window"));
        }
        if self.last_window.is_some_and(|last| window_id <= last) {
            warn!(
                window_id,
                last_window = ?self.last_window,
                "Window id does not advance"
            );
        }

        debug!(window_id, "Window opened");
        self.state = WindowState::Open(window_id);
        Ok(())
    }

    /// Handle one envelope from the query channel.
    ///
    /// Schema queries are answered on `sink` immediately, data queries are
    /// buffered, cancellations remove a buffered query. Envelopes that fail to
    /// decode are logged, counted and dropped.
    pub fn process_query(&mut self, text: &str, sink: &mut impl ResultSink) {
        let envelope = match self.codec.decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.drop_envelope(text, &e);
                return;
            }
        };

        match envelope {
            QueryEnvelope::Schema(query) => {
                let result = self.registry.describe(&query);
                sink.emit(self.codec.encode_result(&QueryResult::Schema(result)));
                self.stats.schema_results += 1;
            }
            QueryEnvelope::Data(query) => {
                self.queue.enqueue(query, (), None);
            }
            QueryEnvelope::Cancel(cancel) => {
                self.stats.cancel_requests += 1;
                if !self.queue.cancel(&cancel.id) {
                    debug!(query_id = %cancel.id, "No queued query to cancel");
                }
            }
        }
    }

    fn drop_envelope(&mut self, text: &str, error: &CodecError) {
        match error {
            CodecError::MalformedEnvelope(_) => self.stats.malformed_envelopes += 1,
            CodecError::SchemaMismatch(_) => self.stats.schema_mismatches += 1,
        }
        warn!(kind = error.kind(), error = %error, envelope = text, "Dropping query envelope");
    }

    /// Convert a batch and make it the live snapshot.
    ///
    /// A batch containing any row that does not fit the schema is rejected
    /// as a whole and the previous snapshot stays live.
    pub fn process_input(&mut self, batch: &[I]) -> Result<u64> {
        let schema = self.registry.schema();
        let converted = batch
            .iter()
            .map(|input| {
                let row = self.converter.convert(input, &schema)?;
                schema.validate_row(&row)?;
                Ok(row)
            })
            .collect::<tabserve_core::Result<Vec<_>>>();

        match converted {
            Ok(rows) => {
                self.stats.batches_accepted += 1;
                Ok(self.snapshots.replace(rows))
            }
            Err(e) => {
                self.stats.batches_rejected += 1;
                warn!(error = %e, rows = batch.len(), "Rejecting input batch");
                Err(e.into())
            }
        }
    }

    /// Close the open window: serve every due query and emit its result.
    /// Returns the number of results emitted.
    pub fn end_window(&mut self, sink: &mut impl ResultSink) -> Result<usize> {
        let window_id = match self.state {
            WindowState::Open(id) => id,
            _ => return Err(self.invalid_transition("end a window")),
        };
        self.state = WindowState::Draining(window_id);
        self.drains += 1;

        let snapshot = self.snapshots.current();
        let mut emitted = 0;
        for due in self.queue.dequeue_due_entries(self.drains) {
            let result = executor::execute(&due.query, &snapshot).with_remaining(due.remaining);
            debug!(
                query_id = %due.query.id,
                rows = result.rows.len(),
                remaining = %due.remaining,
                "Serving query"
            );
            sink.emit(self.codec.encode_result(&QueryResult::Data(result)));
            emitted += 1;
        }

        self.stats.data_results += emitted as u64;
        self.stats.windows_closed += 1;
        self.last_window = Some(window_id);
        self.state = WindowState::Closed;

        debug!(
            window_id,
            emitted,
            batch = snapshot.batch,
            pending = self.queue.len(),
            "Window closed"
        );
        Ok(emitted)
    }

    /// Drop all buffered queries and the live snapshot.
    pub fn teardown(&mut self) {
        let discarded = self.queue.clear();
        self.snapshots.clear();
        self.state = WindowState::Closed;
        info!(discarded, "Tabular server torn down");
    }

    fn invalid_transition(&self, operation: &'static str) -> ServerError {
        ServerError::InvalidTransition {
            state: self.state.to_string(),
            operation,
        }
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn schema(&self) -> Arc<Schema> {
        self.registry.schema()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshots.current()
    }

    pub fn pending_queries(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    pub fn queue_stats(&self) -> &QueueStats {
        self.queue.stats()
    }
}

impl<I> fmt::Debug for TabularServer<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabularServer")
            .field("state", &self.state)
            .field("codec", &self.codec)
            .field("pending_queries", &self.queue.len())
            .field("stats", &self.stats)
            .finish()
    }
}
