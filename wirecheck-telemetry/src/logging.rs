//! ## wirecheck-telemetry::logging
//! Structured logging with `tracing` and OpenTelemetry key-values.
//!
//! `RUST_LOG` takes precedence over the configured level.

use opentelemetry::KeyValue;
use tracing::{info_span, Instrument};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

pub type InitError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global fmt subscriber. Fails if one is already set.
    pub fn init(level: &str) -> Result<(), InitError> {
        fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
            .with_thread_names(true)
            .with_span_events(FmtSpan::ENTER)
            .try_init()
    }

    pub async fn log_event(event_type: &str, metadata: Vec<KeyValue>) {
        let span = info_span!("harness_event", event_type = event_type, otel.kind = "INTERNAL");

        async {
            tracing::info!(metadata = ?metadata, "Harness event recorded");
        }
        .instrument(span)
        .await
    }
}
