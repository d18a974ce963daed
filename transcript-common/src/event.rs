//! Permissive model of the conversation webhook payload.
//!
//! The voice platform owns this schema and we only read a handful of fields out of it, so
//! every field is decoded leniently: a key that is absent, `null`, or of an unexpected JSON
//! type decodes to its default instead of failing the whole payload.
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

/// A single scalar value, as stored in one spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Number(Number),
    Bool(bool),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(text) => f.write_str(text),
            Cell::Number(number) => write!(f, "{}", number),
            Cell::Bool(value) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for Cell {
    fn from(text: &str) -> Self {
        Cell::Text(text.to_owned())
    }
}

impl From<String> for Cell {
    fn from(text: String) -> Self {
        Cell::Text(text)
    }
}

impl From<i64> for Cell {
    fn from(number: i64) -> Self {
        Cell::Number(number.into())
    }
}

impl From<&Cell> for Value {
    fn from(cell: &Cell) -> Self {
        match cell {
            Cell::Text(text) => Value::String(text.clone()),
            Cell::Number(number) => Value::Number(number.clone()),
            Cell::Bool(value) => Value::Bool(*value),
        }
    }
}

/// The inbound webhook event. Only exists for the duration of one request.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConversationEvent {
    #[serde(deserialize_with = "lenient")]
    pub event_timestamp: Option<Cell>,
    #[serde(deserialize_with = "lenient_object")]
    pub data: ConversationData,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConversationData {
    #[serde(deserialize_with = "lenient_turns")]
    pub transcript: Vec<Turn>,
    #[serde(deserialize_with = "lenient_object")]
    pub analysis: Analysis,
    #[serde(deserialize_with = "lenient_object")]
    pub metadata: CallMetadata,
}

/// One utterance in the conversation.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Turn {
    #[serde(deserialize_with = "lenient")]
    pub role: Option<Cell>,
    #[serde(deserialize_with = "lenient")]
    pub message: Option<Cell>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Analysis {
    #[serde(deserialize_with = "lenient")]
    pub transcript_summary: Option<Cell>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CallMetadata {
    #[serde(deserialize_with = "lenient")]
    pub call_duration_secs: Option<Cell>,
}

impl ConversationEvent {
    /// Decode an event from an already parsed JSON value. Anything other than a JSON object
    /// yields the all-default event.
    pub fn from_value(value: Value) -> Self {
        from_object(value)
    }

    /// Decode an event from a raw request body. Only fails when the body is not JSON at all.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_slice(body)?;
        Ok(Self::from_value(value))
    }

    pub fn summary(&self) -> Option<&Cell> {
        self.data.analysis.transcript_summary.as_ref()
    }

    pub fn call_duration(&self) -> Option<&Cell> {
        self.data.metadata.call_duration_secs.as_ref()
    }
}

fn from_object<T: DeserializeOwned + Default>(value: Value) -> T {
    // Deserializing a struct from a JSON array would map elements positionally.
    match value {
        Value::Object(_) => T::deserialize(value).unwrap_or_default(),
        _ => T::default(),
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

fn lenient_object<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(from_object(value))
}

fn lenient_turns<'de, D>(deserializer: D) -> Result<Vec<Turn>, D::Error>
where
    D: Deserializer<'de>,
{
    let turns: Vec<Value> = lenient(deserializer)?;
    Ok(turns.into_iter().map(from_object::<Turn>).collect())
}
