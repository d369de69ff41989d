//! Query and result types
//!
//! Envelopes arriving on the query channel decode into a [`QueryEnvelope`];
//! everything the server emits is a [`QueryResult`] before serialization.

use std::fmt;

use tabserve_core::{FieldDef, Row, Schema, SchemaQuery, SchemaResult, Value};

// ---------------------------------------------------------------------------
// Lifetime
// ---------------------------------------------------------------------------

/// How many window closes a data query remains due for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// Due at this many more closes.
    Windows(u32),
    /// Due at every close until cancelled.
    Continuous,
}

impl Lifetime {
    /// Lifetime of a query that declares no countdown.
    pub const ONE_SHOT: Lifetime = Lifetime::Windows(1);

    pub fn is_continuous(&self) -> bool {
        matches!(self, Lifetime::Continuous)
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, Lifetime::Windows(0))
    }

    /// Lifetime after being served once.
    ///
    /// # Panics
    ///
    /// Panics when the lifetime is already exhausted.
    pub fn decrement(self) -> Lifetime {
        match self {
            Lifetime::Windows(0) => panic!("query lifetime decremented below zero"),
            Lifetime::Windows(n) => Lifetime::Windows(n - 1),
            Lifetime::Continuous => Lifetime::Continuous,
        }
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Lifetime::ONE_SHOT
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Windows(n) => write!(f, "{}", n),
            Lifetime::Continuous => f.write_str("continuous"),
        }
    }
}

// ---------------------------------------------------------------------------
// Data query
// ---------------------------------------------------------------------------

/// Equality predicate on one field. A missing field reads as null.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        row.get(&self.field) == &self.value
    }
}

/// A schema-bound request for snapshot rows.
#[derive(Debug, Clone, PartialEq)]
pub struct DataQuery {
    pub id: String,
    /// Fields to project. An empty list selects every schema field.
    pub fields: Vec<String>,
    /// All filters must hold for a row to be selected.
    pub filters: Vec<Filter>,
    pub lifetime: Lifetime,
}

impl DataQuery {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Vec::new(),
            filters: Vec::new(),
            lifetime: Lifetime::ONE_SHOT,
        }
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::new(field, value));
        self
    }

    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|filter| filter.matches(row))
    }

    /// Projected fields in output order. Names the schema does not declare
    /// are skipped.
    pub fn projection<'a>(&'a self, schema: &'a Schema) -> Vec<&'a FieldDef> {
        if self.fields.is_empty() {
            schema.fields().iter().collect()
        } else {
            self.fields
                .iter()
                .filter_map(|name| schema.field(name))
                .collect()
        }
    }
}

/// Request to drop a buffered data query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelQuery {
    pub id: String,
}

impl CancelQuery {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

// ---------------------------------------------------------------------------
// Envelopes and results
// ---------------------------------------------------------------------------

/// A decoded query envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryEnvelope {
    Schema(SchemaQuery),
    Data(DataQuery),
    Cancel(CancelQuery),
}

impl QueryEnvelope {
    pub fn id(&self) -> &str {
        match self {
            QueryEnvelope::Schema(q) => &q.id,
            QueryEnvelope::Data(q) => &q.id,
            QueryEnvelope::Cancel(q) => &q.id,
        }
    }
}

/// Rows selected for a data query, borrowed from the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct DataResult<'a> {
    pub query: &'a DataQuery,
    /// Lifetime left after this result.
    pub remaining: Lifetime,
    /// Batch sequence number of the snapshot the rows come from.
    pub batch: u64,
    pub rows: Vec<&'a Row>,
}

impl<'a> DataResult<'a> {
    pub fn with_remaining(mut self, remaining: Lifetime) -> Self {
        self.remaining = remaining;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult<'a> {
    Schema(SchemaResult),
    Data(DataResult<'a>),
}

impl<'a> QueryResult<'a> {
    pub fn id(&self) -> &str {
        match self {
            QueryResult::Schema(r) => &r.id,
            QueryResult::Data(r) => &r.query.id,
        }
    }
}
