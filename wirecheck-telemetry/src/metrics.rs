//! ## wirecheck-telemetry::metrics
//! Prometheus counters for scenario runs.

use std::time::Duration;

use prometheus::{Counter, Histogram, HistogramOpts, Registry};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub runs: Counter,
    pub events_passed: Counter,
    pub events_failed: Counter,
    pub unexpected_calls: Counter,
    pub run_duration: Histogram,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let runs = Counter::new("wirecheck_runs_total", "Scenario runs started")?;
        let events_passed = Counter::new("wirecheck_events_passed_total", "Expected events satisfied")?;
        let events_failed = Counter::new("wirecheck_events_failed_total", "Expected events failed")?;
        let unexpected_calls = Counter::new(
            "wirecheck_unexpected_calls_total",
            "Candidate calls made after the scenario was done",
        )?;
        let run_duration = Histogram::with_opts(
            HistogramOpts::new("wirecheck_run_duration_seconds", "Wall-clock time per scenario run")
                .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 30.0]),
        )?;

        registry.register(Box::new(runs.clone()))?;
        registry.register(Box::new(events_passed.clone()))?;
        registry.register(Box::new(events_failed.clone()))?;
        registry.register(Box::new(unexpected_calls.clone()))?;
        registry.register(Box::new(run_duration.clone()))?;

        Ok(Self {
            registry,
            runs,
            events_passed,
            events_failed,
            unexpected_calls,
            run_duration,
        })
    }

    pub fn record_run(&self, passed: usize, failed: usize, unexpected: usize, elapsed: Duration) {
        self.runs.inc();
        self.events_passed.inc_by(passed as f64);
        self.events_failed.inc_by(failed as f64);
        self.unexpected_calls.inc_by(unexpected as f64);
        self.run_duration.observe(elapsed.as_secs_f64());
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
