//! TabServe Server
//!
//! A windowed ad-hoc query server embedded in a continuously running data
//! pipeline. The server keeps a snapshot of tabular data that every input
//! batch replaces, buffers data queries between window boundaries and
//! answers them against the snapshot live when a window closes.
//!
//! # Components
//!
//! - **Codec** (`codec`): JSON envelopes in, JSON results out
//! - **Formatter** (`formatter`): per-cell rendering policy for data results
//! - **Queue** (`queue`): data queries with sequence numbers and lifetimes
//! - **Executor** (`executor`): pure row selection over a snapshot
//! - **Snapshot store** (`snapshot`): the single live snapshot
//! - **Server** (`server`): the window-synchronous orchestrator
//!
//! # Query lifetimes
//!
//! | `countdown` | Served at |
//! |-------------|-----------|
//! | absent | the next window close only |
//! | `N` | the next `N` window closes |
//! | `"continuous"` | every window close until cancelled |

pub mod codec;
pub mod config;
pub mod error;
pub mod executor;
pub mod formatter;
pub mod queue;
pub mod server;
pub mod snapshot;
pub mod types;

pub use codec::Codec;
pub use config::ServerConfig;
pub use error::{CodecError, Result, ServerError};
pub use formatter::{FormatterConfig, PassThroughFormatter, PatternFormatter, ValueFormatter};
pub use queue::{DueEntry, QueryQueue, QueueStats};
pub use server::{JsonRowConverter, ResultSink, RowConverter, ServerStats, TabularServer, WindowState};
pub use snapshot::{Snapshot, SnapshotStore};
pub use types::{CancelQuery, DataQuery, DataResult, Filter, Lifetime, QueryEnvelope, QueryResult};
