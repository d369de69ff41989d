//! Protocol codec
//!
//! Translates between JSON envelopes on the query channel and typed requests,
//! and renders results for the output channel.
//!
//! ## Envelopes
//!
//! ```json
//! {"type": "schemaQuery", "id": "s1"}
//! {"type": "dataQuery", "id": "q1",
//!  "data": {"fields": ["id", "msg"], "filters": {"msg": "hello"}},
//!  "countdown": 3}
//! {"type": "cancelQuery", "id": "q1"}
//! ```
//!
//! `countdown` is absent for a one-shot query, a positive integer for a fixed
//! number of windows, or `"continuous"`.
//!
//! ## Results
//!
//! ```json
//! {"id": "s1", "type": "schemaResult", "data": [{"schemaType": "tabular", ...}]}
//! {"id": "q1", "type": "dataResult", "countdown": 2, "data": [{"id": 1, "msg": "hello"}]}
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use tabserve_core::{Schema, SchemaQuery, SchemaResult, Value};

use crate::error::CodecError;
use crate::formatter::{PassThroughFormatter, ValueFormatter};
use crate::types::{CancelQuery, DataQuery, DataResult, Filter, Lifetime, QueryEnvelope, QueryResult};

pub const SCHEMA_RESULT: &str = "schemaResult";
pub const DATA_RESULT: &str = "dataResult";
pub const CONTINUOUS: &str = "continuous";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum WireQuery {
    SchemaQuery {
        id: String,
    },
    DataQuery {
        id: String,
        #[serde(default)]
        data: WireDataBody,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        countdown: Option<WireCountdown>,
    },
    CancelQuery {
        id: String,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WireDataBody {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    filters: Map<String, JsonValue>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum WireCountdown {
    Windows(u64),
    Keyword(String),
}

impl WireCountdown {
    fn into_lifetime(self) -> Result<Lifetime, CodecError> {
        match self {
            WireCountdown::Windows(0) => Err(CodecError::malformed("countdown must be positive")),
            WireCountdown::Windows(n) => u32::try_from(n)
                .map(Lifetime::Windows)
                .map_err(|_| CodecError::malformed(format!("countdown {} is too large", n))),
            WireCountdown::Keyword(k) if k == CONTINUOUS => Ok(Lifetime::Continuous),
            WireCountdown::Keyword(k) => {
                Err(CodecError::malformed(format!("unrecognized countdown '{}'", k)))
            }
        }
    }

    fn from_lifetime(lifetime: Lifetime) -> Option<Self> {
        match lifetime {
            Lifetime::ONE_SHOT => None,
            Lifetime::Windows(n) => Some(WireCountdown::Windows(u64::from(n))),
            Lifetime::Continuous => Some(WireCountdown::Keyword(CONTINUOUS.to_string())),
        }
    }
}

fn countdown_json(lifetime: Lifetime) -> JsonValue {
    match lifetime {
        Lifetime::Windows(n) => JsonValue::from(n),
        Lifetime::Continuous => JsonValue::from(CONTINUOUS),
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Schema-bound envelope decoder and result encoder.
pub struct Codec {
    schema: Arc<Schema>,
    formatter: Box<dyn ValueFormatter>,
}

impl Codec {
    pub fn new(schema: Arc<Schema>, formatter: Box<dyn ValueFormatter>) -> Self {
        Self { schema, formatter }
    }

    pub fn pass_through(schema: Arc<Schema>) -> Self {
        Self::new(schema, Box::new(PassThroughFormatter))
    }

    pub fn formatter_name(&self) -> &'static str {
        self.formatter.name()
    }

    /// Decode a query envelope, validating data queries against the schema.
    pub fn decode(&self, text: &str) -> Result<QueryEnvelope, CodecError> {
        let json: JsonValue = serde_json::from_str(text)
            .map_err(|e| CodecError::malformed(format!("invalid JSON: {}", e)))?;

        if !json.is_object() {
            return Err(CodecError::malformed("envelope is not a JSON object"));
        }

        let wire: WireQuery =
            serde_json::from_value(json).map_err(|e| CodecError::malformed(e.to_string()))?;

        match wire {
            WireQuery::SchemaQuery { id } => Ok(QueryEnvelope::Schema(SchemaQuery::new(id))),
            WireQuery::CancelQuery { id } => Ok(QueryEnvelope::Cancel(CancelQuery::new(id))),
            WireQuery::DataQuery {
                id,
                data,
                countdown,
            } => {
                let lifetime = match countdown {
                    Some(countdown) => countdown.into_lifetime()?,
                    None => Lifetime::ONE_SHOT,
                };
                self.decode_data_query(id, data, lifetime)
                    .map(QueryEnvelope::Data)
            }
        }
    }

    fn decode_data_query(
        &self,
        id: String,
        data: WireDataBody,
        lifetime: Lifetime,
    ) -> Result<DataQuery, CodecError> {
        for name in &data.fields {
            self.schema
                .require_field(name)
                .map_err(CodecError::SchemaMismatch)?;
        }

        let filters = data
            .filters
            .iter()
            .map(|(name, raw)| {
                let field = self
                    .schema
                    .require_field(name)
                    .map_err(CodecError::SchemaMismatch)?;
                let value = Value::from_json(raw, field).map_err(CodecError::SchemaMismatch)?;
                Ok(Filter::new(name.clone(), value))
            })
            .collect::<Result<Vec<_>, CodecError>>()?;

        Ok(DataQuery {
            id,
            fields: data.fields,
            filters,
            lifetime,
        })
    }

    /// Encode a request the way a client would send it.
    pub fn encode_query(&self, envelope: &QueryEnvelope) -> Result<String, CodecError> {
        let wire = match envelope {
            QueryEnvelope::Schema(q) => WireQuery::SchemaQuery { id: q.id.clone() },
            QueryEnvelope::Cancel(q) => WireQuery::CancelQuery { id: q.id.clone() },
            QueryEnvelope::Data(q) => WireQuery::DataQuery {
                id: q.id.clone(),
                data: WireDataBody {
                    fields: q.fields.clone(),
                    filters: q
                        .filters
                        .iter()
                        .map(|filter| (filter.field.clone(), self.filter_json(filter)))
                        .collect(),
                },
                countdown: WireCountdown::from_lifetime(q.lifetime),
            },
        };

        serde_json::to_string(&wire).map_err(|e| CodecError::malformed(e.to_string()))
    }

    /// Render a filter operand so that decoding it yields the same value.
    ///
    /// Dates go out in the field's format unless that format drops part of
    /// the value (e.g. a date-only pattern and a timestamp with a time of
    /// day), in which case they go out as epoch milliseconds.
    fn filter_json(&self, filter: &Filter) -> JsonValue {
        let Some(field) = self.schema.field(&filter.field) else {
            return JsonValue::String(filter.value.to_string());
        };

        let json = filter.value.to_json(field);
        match &filter.value {
            Value::Date(date)
                if Value::from_json(&json, field).ok().as_ref() != Some(&filter.value) =>
            {
                JsonValue::from(date.and_utc().timestamp_millis())
            }
            _ => json,
        }
    }

    /// Render a result for the output channel.
    pub fn encode_result(&self, result: &QueryResult<'_>) -> String {
        let json = match result {
            QueryResult::Schema(r) => self.schema_result_json(r),
            QueryResult::Data(r) => self.data_result_json(r),
        };
        json.to_string()
    }

    fn schema_result_json(&self, result: &SchemaResult) -> JsonValue {
        json!({
            "id": result.id,
            "type": SCHEMA_RESULT,
            "data": [result.schema.to_declaration()],
        })
    }

    fn data_result_json(&self, result: &DataResult<'_>) -> JsonValue {
        let projection = result.query.projection(&self.schema);

        let rows = result
            .rows
            .iter()
            .map(|row| {
                let cells = projection
                    .iter()
                    .map(|field| {
                        (
                            field.name.clone(),
                            self.formatter.format(row.get(&field.name), field),
                        )
                    })
                    .collect::<Map<_, _>>();
                JsonValue::Object(cells)
            })
            .collect::<Vec<_>>();

        let mut out = Map::new();
        out.insert("id".into(), result.query.id.clone().into());
        out.insert("type".into(), DATA_RESULT.into());
        out.insert("countdown".into(), countdown_json(result.remaining));
        out.insert("data".into(), JsonValue::Array(rows));
        JsonValue::Object(out)
    }
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec")
            .field("fields", &self.schema.len())
            .field("formatter", &self.formatter.name())
            .finish()
    }
}
