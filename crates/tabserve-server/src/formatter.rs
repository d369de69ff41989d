//! Result value formatting
//!
//! Data results render every cell through a [`ValueFormatter`]. The default
//! [`PassThroughFormatter`] emits the natural JSON form of each value (dates
//! in their field's format). [`PatternFormatter`] applies a fixed decimal
//! precision to floating point fields, can override the date pattern, and can
//! render every cell as a string.

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tabserve_core::{FieldDef, Value};

/// Largest accepted `float_precision` / `double_precision`. An `f64` carries
/// at most 17 significant decimal digits.
pub const MAX_PRECISION: usize = 17;

/// Renders a single result cell.
pub trait ValueFormatter: Send + Sync {
    fn format(&self, value: &Value, field: &FieldDef) -> JsonValue;

    /// Identifier used in logs.
    fn name(&self) -> &'static str;
}

/// Emits values unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughFormatter;

impl ValueFormatter for PassThroughFormatter {
    fn format(&self, value: &Value, field: &FieldDef) -> JsonValue {
        value.to_json(field)
    }

    fn name(&self) -> &'static str {
        "pass-through"
    }
}

/// Formatter settings as they appear in the `[formatter]` config table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct FormatterConfig {
    /// Digits after the decimal point for `float` fields.
    pub float_precision: Option<usize>,

    /// Digits after the decimal point for `double` fields.
    pub double_precision: Option<usize>,

    /// strftime pattern replacing each date field's own format.
    pub date_format: Option<String>,

    /// Render every non-null cell as a JSON string.
    pub stringify: bool,
}

impl FormatterConfig {
    pub fn is_pass_through(&self) -> bool {
        *self == FormatterConfig::default()
    }

    /// Reject a precision above [`MAX_PRECISION`] and a date pattern chrono
    /// cannot render.
    pub fn validate(&self) -> Result<(), String> {
        for (key, precision) in [
            ("float_precision", self.float_precision),
            ("double_precision", self.double_precision),
        ] {
            if let Some(p) = precision.filter(|&p| p > MAX_PRECISION) {
                return Err(format!(
                    "formatter {} {} exceeds the maximum of {}",
                    key, p, MAX_PRECISION
                ));
            }
        }

        match self.date_format.as_deref() {
            Some(pattern)
                if pattern.is_empty()
                    || StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) =>
            {
                Err(format!("invalid formatter date_format '{}'", pattern))
            }
            _ => Ok(()),
        }
    }

    /// Build the formatter these settings describe.
    pub fn build(&self) -> Box<dyn ValueFormatter> {
        if self.is_pass_through() {
            Box::new(PassThroughFormatter)
        } else {
            Box::new(PatternFormatter::new(self.clone()))
        }
    }
}

/// Precision and pattern driven formatter.
#[derive(Debug, Clone)]
pub struct PatternFormatter {
    config: FormatterConfig,
}

impl PatternFormatter {
    pub fn new(config: FormatterConfig) -> Self {
        Self { config }
    }

    fn decimal(&self, v: f64, precision: Option<usize>) -> JsonValue {
        match precision {
            Some(p) if self.config.stringify => JsonValue::String(format!("{:.*}", p, v)),
            Some(p) => format!("{:.*}", p, v)
                .parse::<f64>()
                .map(JsonValue::from)
                .unwrap_or(JsonValue::Null),
            None if self.config.stringify => JsonValue::String(v.to_string()),
            None => JsonValue::from(v),
        }
    }
}

impl ValueFormatter for PatternFormatter {
    fn format(&self, value: &Value, field: &FieldDef) -> JsonValue {
        match value {
            Value::Null => JsonValue::Null,
            Value::Float(v) => self.decimal(f64::from(*v), self.config.float_precision),
            Value::Double(v) => self.decimal(*v, self.config.double_precision),
            Value::Date(d) => {
                let pattern = self
                    .config
                    .date_format
                    .as_deref()
                    .unwrap_or_else(|| field.date_format());
                JsonValue::String(d.format(pattern).to_string())
            }
            other if self.config.stringify => JsonValue::String(other.to_string()),
            other => other.to_json(field),
        }
    }

    fn name(&self) -> &'static str {
        "pattern"
    }
}
