use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing_subscriber::fmt::MakeWriter;

use transcript_common::row::TranscriptRow;
use transcript_common::sink::{RowSink, SinkError};

#[derive(Clone, Default)]
pub struct MemorySink {
    rows: Arc<Mutex<Vec<TranscriptRow>>>,
}

impl MemorySink {
    pub fn rows(&self) -> Vec<TranscriptRow> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl RowSink for MemorySink {
    async fn append(&self, row: TranscriptRow) -> Result<(), SinkError> {
        self.rows.lock().unwrap().push(row);
        Ok(())
    }
}

/// Fails every append the way a store that rejects our credentials would.
pub struct FailingSink {}

#[async_trait]
impl RowSink for FailingSink {
    async fn append(&self, _row: TranscriptRow) -> Result<(), SinkError> {
        Err(SinkError::Rejected {
            status: 403,
            body: "The caller does not have permission".to_owned(),
        })
    }
}

/// Panics inside the append, like a collaborator hitting a bug.
pub struct PanickingSink {}

#[async_trait]
impl RowSink for PanickingSink {
    async fn append(&self, _row: TranscriptRow) -> Result<(), SinkError> {
        panic!("store client bug");
    }
}

/// Collects formatted log output so tests can assert on what was logged.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
