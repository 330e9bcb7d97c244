//! Input and output records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Write;

use crate::error::{PipelineError, PipelineResult};

/// One unit of input: a JSON object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Wrap a JSON value, which must be an object
    pub fn from_value(value: Value) -> PipelineResult<Self> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(PipelineError::validation(format!(
                "record must be a JSON object, got {}",
                json_type(&other)
            ))),
        }
    }

    /// Record identity from its `id` field (string or integer)
    pub fn id(&self) -> Option<String> {
        match self.0.get("id")? {
            Value::String(id) if !id.is_empty() => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Canonical JSON of the record: object keys sorted at every depth, no whitespace.
    ///
    /// Two records with the same content produce the same fingerprint regardless of the
    /// order their fields arrived in.
    pub fn fingerprint(&self) -> String {
        let mut out = String::with_capacity(64);
        write_object(&self.0, &mut out);
        out
    }

    /// Cache key under a converter namespace
    pub fn cache_key(&self, namespace: &str) -> String {
        format!("conversion:{namespace}:{}", self.fingerprint())
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl TryFrom<Value> for Record {
    type Error = PipelineError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => write_object(map, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        // Scalars already have a single canonical rendering
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}

fn write_object(map: &Map<String, Value>, out: &mut String) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    out.push('{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{}:", Value::String(key.clone()));
        write_canonical(&map[key], out);
    }
    out.push('}');
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Result of a successful conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertedRecord {
    /// Identity of the input record, when it carried one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Name of the converter that produced the output
    pub kind: String,

    pub output: Value,
}

impl ConvertedRecord {
    pub fn new(id: Option<String>, kind: impl Into<String>, output: Value) -> Self {
        Self {
            id,
            kind: kind.into(),
            output,
        }
    }
}
