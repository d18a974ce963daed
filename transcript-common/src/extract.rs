//! Turn an inbound conversation event into the row we append to the store.
use crate::event::{Cell, ConversationEvent, Turn};
use crate::row::TranscriptRow;

pub const UNKNOWN_ROLE: &str = "unknown";
pub const DEFAULT_SUMMARY: &str = "No summary";
const TURN_SEPARATOR: &str = "\n\n";

/// Build a `TranscriptRow` out of an event. Never fails: every absent field resolves to its
/// default, so the row always holds four scalar cells.
pub fn extract(event: &ConversationEvent) -> TranscriptRow {
    TranscriptRow {
        timestamp: event
            .event_timestamp
            .clone()
            .unwrap_or_else(|| Cell::from("")),
        transcript: flatten_transcript(&event.data.transcript),
        summary: event
            .summary()
            .cloned()
            .unwrap_or_else(|| Cell::from(DEFAULT_SUMMARY)),
        call_duration: event.call_duration().cloned().unwrap_or_else(|| Cell::from(0)),
    }
}

/// Render turns as `role: message` entries in their original order, separated by a blank line.
pub fn flatten_transcript(turns: &[Turn]) -> String {
    let text: String = turns
        .iter()
        .map(|turn| {
            let role = match &turn.role {
                Some(role) => role.to_string(),
                None => UNKNOWN_ROLE.to_owned(),
            };
            let message = turn
                .message
                .as_ref()
                .map(Cell::to_string)
                .unwrap_or_default();

            format!("{}: {}{}", role, message, TURN_SEPARATOR)
        })
        .collect();

    text.trim().to_owned()
}
