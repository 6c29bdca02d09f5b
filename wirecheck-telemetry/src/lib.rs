//! # wirecheck Telemetry
//!
//! Logging setup and run metrics for the harness.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
