use serde::Serialize;
use serde_json::Value;

use crate::event::Cell;

/// The flat record appended to the store for each processed event.
///
/// Column order is fixed: timestamp, transcript text, summary, call duration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptRow {
    pub timestamp: Cell,
    pub transcript: String,
    pub summary: Cell,
    pub call_duration: Cell,
}

impl TranscriptRow {
    pub const WIDTH: usize = 4;

    pub fn cells(&self) -> [Cell; Self::WIDTH] {
        [
            self.timestamp.clone(),
            Cell::Text(self.transcript.clone()),
            self.summary.clone(),
            self.call_duration.clone(),
        ]
    }

    /// The row as positional JSON values, ready to be sent as one row of a values range.
    pub fn to_values(&self) -> Vec<Value> {
        self.cells().iter().map(Value::from).collect()
    }
}
