use async_trait::async_trait;
use thiserror::Error;

use crate::credentials::CredentialsError;
use crate::row::TranscriptRow;

/// Enumeration of errors that can occur while appending a row to the store.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("store is not configured: {0}")]
    Configuration(String),
    #[error("store is unavailable: {0}")]
    Unavailable(String),
    #[error("failed to authenticate with the store: {0}")]
    Authentication(#[from] CredentialsError),
    #[error("append request could not be sent: {0}")]
    Request(#[from] reqwest::Error),
    #[error("store rejected the append with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl SinkError {
    /// A short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SinkError::Configuration(_) => "configuration",
            SinkError::Unavailable(_) => "unavailable",
            SinkError::Authentication(_) => "authentication",
            SinkError::Request(_) => "request",
            SinkError::Rejected { .. } => "rejected",
        }
    }
}

/// Append-only destination for transcript rows.
#[async_trait]
pub trait RowSink {
    async fn append(&self, row: TranscriptRow) -> Result<(), SinkError>;
}

/// Logs rows instead of storing them. Useful for running locally without credentials.
pub struct PrintSink {}

#[async_trait]
impl RowSink for PrintSink {
    async fn append(&self, row: TranscriptRow) -> Result<(), SinkError> {
        tracing::info!("transcript row: {:?}", row);

        Ok(())
    }
}

/// Stands in for the store when it could not be set up at startup, so that requests are
/// still acknowledged and every lost row shows up in the logs.
pub struct UnavailableSink {
    reason: String,
}

impl UnavailableSink {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl RowSink for UnavailableSink {
    async fn append(&self, _row: TranscriptRow) -> Result<(), SinkError> {
        Err(SinkError::Unavailable(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Cell;

    fn row() -> TranscriptRow {
        TranscriptRow {
            timestamp: Cell::from(""),
            transcript: String::new(),
            summary: Cell::from("No summary"),
            call_duration: Cell::from(0),
        }
    }

    #[tokio::test]
    async fn print_sink_accepts_rows() {
        assert!(PrintSink {}.append(row()).await.is_ok());
    }

    #[tokio::test]
    async fn unavailable_sink_reports_reason() {
        let sink = UnavailableSink::new("GOOGLE_CREDENTIALS is not set");

        let error = sink.append(row()).await.unwrap_err();

        assert_eq!(error.kind(), "unavailable");
        assert_eq!(
            error.to_string(),
            "store is unavailable: GOOGLE_CREDENTIALS is not set"
        );
    }
}
