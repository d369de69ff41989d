//! Event script replay
//!
//! A script is JSON lines, one pipeline event per line:
//!
//! ```text
//! {"event": "beginWindow", "windowId": 1}
//! {"event": "input", "rows": [{"id": 1, "msg": "hello"}]}
//! {"event": "query", "envelope": {"type": "dataQuery", "id": "q1"}}
//! {"event": "endWindow"}
//! ```
//!
//! A query envelope given as a JSON string is passed through verbatim, which
//! allows replaying text that is not valid JSON. Blank lines and lines
//! starting with `#` are skipped.

use std::io::BufRead;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tabserve_server::{ResultSink, ServerError, TabularServer};
use tracing::warn;

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ReplayEvent {
    BeginWindow {
        #[serde(rename = "windowId")]
        window_id: u64,
    },
    EndWindow,
    Query {
        envelope: JsonValue,
    },
    Input {
        rows: Vec<JsonValue>,
    },
    Teardown,
}

impl ReplayEvent {
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line).context("invalid replay event")
    }
}

/// What happened during a replay
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub windows: usize,
    pub rejected_batches: usize,
}

/// Feed every event of `script` to `server`, emitting results on `sink`
pub fn replay(
    script: impl BufRead,
    server: &mut TabularServer<JsonValue>,
    sink: &mut impl ResultSink,
) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for (index, line) in script.lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("failed to read line {}", line_no))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let event = ReplayEvent::parse(trimmed).with_context(|| format!("line {}", line_no))?;
        summary.events += 1;

        match event {
            ReplayEvent::BeginWindow { window_id } => server
                .begin_window(window_id)
                .with_context(|| format!("line {}", line_no))?,
            ReplayEvent::EndWindow => {
                server
                    .end_window(sink)
                    .with_context(|| format!("line {}", line_no))?;
                summary.windows += 1;
            }
            ReplayEvent::Query { envelope } => {
                let text = match envelope {
                    JsonValue::String(raw) => raw,
                    other => other.to_string(),
                };
                server.process_query(&text, sink);
            }
            ReplayEvent::Input { rows } => match server.process_input(&rows) {
                Ok(_) => {}
                Err(ServerError::Core(e)) => {
                    warn!(line = line_no, error = %e, "Input batch rejected, keeping previous snapshot");
                    summary.rejected_batches += 1;
                }
                Err(e) => return Err(e).with_context(|| format!("line {}", line_no)),
            },
            ReplayEvent::Teardown => server.teardown(),
        }
    }

    Ok(summary)
}
