//! Receive conversation webhooks and append their transcripts to a spreadsheet.
use std::sync::Arc;

use axum::Router;
use envconfig::Envconfig;
use eyre::Result;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use transcript_common::credentials::ServiceAccountKey;
use transcript_common::metrics::{serve, setup_metrics_routes};
use transcript_common::sheets::{SheetsConfig, SheetsSink};
use transcript_common::sink::{PrintSink, SinkError, UnavailableSink};

use config::Config;
use handlers::SharedSink;

mod config;
mod handlers;

async fn shutdown() {
    let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("failed to register SIGTERM handler");

    let mut interrupt = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("failed to register SIGINT handler");

    tokio::select! {
        _ = term.recv() => {},
        _ = interrupt.recv() => {},
    };

    info!("Shutting down gracefully...");
}

fn sheets_sink(config: &Config) -> Result<SheetsSink, SinkError> {
    let credentials = config
        .google_credentials
        .as_deref()
        .ok_or_else(|| SinkError::Configuration("GOOGLE_CREDENTIALS is not set".to_owned()))?;
    let spreadsheet_id = config
        .spreadsheet_id
        .as_ref()
        .ok_or_else(|| SinkError::Configuration("SPREADSHEET_ID is not set".to_owned()))?;

    let key = ServiceAccountKey::from_json(credentials)?;
    info!(client_email = %key.client_email, "loaded service account credentials");

    SheetsSink::new(
        SheetsConfig {
            api_url: config.sheets_api_url.clone(),
            spreadsheet_id: spreadsheet_id.as_str().to_owned(),
            range: config.sheet_range.as_str().to_owned(),
            value_input_option: config.value_input_option,
            request_timeout: config.request_timeout.0,
        },
        key,
    )
}

/// Set up the row sink once. A store we cannot set up is logged and replaced by a sink that
/// fails every append, so webhooks keep being acknowledged.
fn build_sink(config: &Config) -> SharedSink {
    if config.print_sink {
        return Arc::new(PrintSink {});
    }

    match sheets_sink(config) {
        Ok(sink) => {
            info!(append_url = %sink.append_url(), "appending transcripts to spreadsheet");
            Arc::new(sink)
        }
        Err(e) => {
            error!(
                kind = e.kind(),
                error = %e,
                details = ?e,
                "spreadsheet store is unavailable, events will be acknowledged but not recorded"
            );
            Arc::new(UnavailableSink::new(e.to_string()))
        }
    }
}

async fn listen(app: Router, bind: String) -> Result<()> {
    info!("listening on {}", bind);

    serve(app, &bind, shutdown()).await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::init_from_env().expect("failed to load configuration from env");

    let sink = build_sink(&config);

    let app = handlers::add_routes(
        Router::new(),
        sink,
        config.max_body_size,
        config.concurrency_limit,
    )
    .layer(TraceLayer::new_for_http());
    let app = if config.export_prometheus {
        setup_metrics_routes(app)
    } else {
        app
    };

    match listen(app, config.bind()).await {
        Ok(_) => {}
        Err(e) => error!("failed to start transcript-api http server, {}", e),
    }
}
