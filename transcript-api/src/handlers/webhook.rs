use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use axum::{extract::State, Json};
use bytes::Bytes;
use futures::FutureExt;
use serde_derive::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use transcript_common::event::ConversationEvent;
use transcript_common::extract::extract;
use transcript_common::row::TranscriptRow;
use transcript_common::sink::RowSink;

use super::app::SharedSink;

#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Ok,
}

/// The webhook sender does not act on failures, so every request gets this same reply.
#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct AckResponse {
    pub status: AckStatus,
}

impl AckResponse {
    fn ok() -> Json<Self> {
        Json(AckResponse {
            status: AckStatus::Ok,
        })
    }
}

#[instrument(skip_all, fields(body_size = body.len()))]
pub async fn post(State(sink): State<SharedSink>, body: Bytes) -> Json<AckResponse> {
    metrics::counter!("transcript_events_received_total").increment(1);
    info!("webhook received");
    debug!("received body: {}", String::from_utf8_lossy(&body));

    let event = match ConversationEvent::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            metrics::counter!("transcript_events_undecodable_total").increment(1);
            warn!(error = %e, "webhook body is not valid JSON, nothing to record");
            return AckResponse::ok();
        }
    };

    debug!(
        turns = event.data.transcript.len(),
        timestamp = ?event.event_timestamp,
        "decoded conversation event"
    );

    let outcome = AssertUnwindSafe(async {
        let row = extract(&event);
        record(sink.as_ref(), row).await;
    })
    .catch_unwind()
    .await;

    if let Err(panic) = outcome {
        metrics::counter!("transcript_rows_failed_total", &[("kind", "panic")]).increment(1);
        error!(
            kind = "panic",
            error = panic_message(panic.as_ref()),
            "panicked while recording transcript row"
        );
    }

    AckResponse::ok()
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}

/// Append a row, logging instead of returning any failure.
async fn record(sink: &(dyn RowSink + Send + Sync), row: TranscriptRow) {
    let start_time = Instant::now();

    let result = sink.append(row).await;

    let elapsed_time = start_time.elapsed().as_secs_f64();
    metrics::histogram!("transcript_append_duration_seconds").record(elapsed_time);

    match result {
        Ok(()) => {
            metrics::counter!("transcript_rows_appended_total").increment(1);
            info!("transcript row appended");
        }
        Err(e) => {
            metrics::counter!("transcript_rows_failed_total", &[("kind", e.kind())])
                .increment(1);
            error!(
                kind = e.kind(),
                error = %e,
                details = ?e,
                "failed to append transcript row"
            );
        }
    }
}
