//! # Execution Supervisor
//!
//! Runs one candidate against one scenario. The candidate gets its own OS
//! thread and a `NetworkProxy`; this task owns the scenario and answers the
//! proxy's requests one at a time, racing everything against the run
//! deadline. Once the run halts the request channel is dropped, so an
//! abandoned candidate can only ever see `ProxyError::Shutdown`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use opentelemetry::KeyValue;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};
use tracing::{debug, info, instrument, warn};

use wirecheck_core::event::{CallKind, Occurrence};
use wirecheck_core::scenario::Scenario;
use wirecheck_core::Outcome;
use wirecheck_telemetry::{EventLogger, MetricsRecorder};

use crate::candidate::Candidate;
use crate::error::EngineError;
use crate::proxy::{Call, NetworkProxy, ProxyError, ReceivedPacket, Reply, Request};
use crate::report::{Halt, RunReport, RunState};

const CANDIDATE_THREAD: &str = "wirecheck-candidate";

/// How the candidate thread finished.
enum Exit {
    Returned,
    Failed(String),
    Panicked(String),
}

pub struct Supervisor {
    scenario: Scenario,
    deadline: Duration,
    metrics: Option<MetricsRecorder>,
    state: RunState,
    notes: Vec<String>,
}

impl Supervisor {
    /// The run deadline defaults to the scenario's own timeout.
    pub fn new(scenario: Scenario) -> Self {
        Self {
            deadline: scenario.timeout(),
            scenario,
            metrics: None,
            state: RunState::NotStarted,
            notes: Vec::new(),
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsRecorder) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn into_scenario(self) -> Scenario {
        self.scenario
    }

    /// Runs `candidate` to completion, halt or deadline. A scenario can be
    /// run only once.
    #[instrument(level = "info", name = "supervisor_run", skip(self, candidate), fields(scenario = %self.scenario.name()))]
    pub async fn run<C: Candidate>(&mut self, candidate: C) -> Result<RunReport, EngineError> {
        if self.state != RunState::NotStarted {
            return Err(EngineError::AlreadyRun);
        }

        let (requests_tx, mut requests) = mpsc::channel::<Request>(1);
        let (exit_tx, mut exit_rx) = oneshot::channel::<Exit>();
        let mut proxy = NetworkProxy::new(requests_tx, self.scenario.interfaces().to_vec());

        std::thread::Builder::new()
            .name(CANDIDATE_THREAD.to_string())
            .spawn(move || {
                let exit = match panic::catch_unwind(AssertUnwindSafe(|| candidate.run(&mut proxy))) {
                    Ok(Ok(())) => Exit::Returned,
                    Ok(Err(err)) => Exit::Failed(format!("{:#}", err)),
                    Err(payload) => Exit::Panicked(panic_message(payload)),
                };
                drop(proxy);
                let _ = exit_tx.send(exit);
            })
            .map_err(EngineError::Spawn)?;

        self.scenario.start();
        self.state = RunState::Running;
        let started = Instant::now();
        let deadline = started + self.deadline;
        info!(deadline = ?self.deadline, events = self.scenario.report().entries.len(), "run started");

        let state = loop {
            tokio::select! {
                biased;
                _ = time::sleep_until(deadline) => break self.on_deadline(),
                exit = &mut exit_rx => break self.on_exit(exit.ok()),
                request = requests.recv() => match request {
                    Some(request) => {
                        if let Some(state) = self.handle(request, started, deadline).await {
                            break state;
                        }
                    }
                    None => {
                        let exit = (&mut exit_rx).await;
                        break self.on_exit(exit.ok());
                    }
                },
            }
        };
        drop(requests);

        let elapsed = started.elapsed();
        self.state = state.clone();
        let report = RunReport {
            scenario: self.scenario.report(),
            state,
            notes: std::mem::take(&mut self.notes),
            elapsed,
        };
        info!(state = %report.state, summary = %report.summary(), "run finished");

        if let Some(metrics) = &self.metrics {
            metrics.record_run(report.passed(), report.failed(), report.unexpected(), elapsed);
        }
        EventLogger::log_event(
            "scenario_complete",
            vec![
                KeyValue::new("scenario", self.scenario.name().to_string()),
                KeyValue::new("summary", report.summary()),
                KeyValue::new("state", report.state.to_string()),
            ],
        )
        .await;
        Ok(report)
    }

    /// Drives `run` on a fresh current-thread runtime.
    pub fn run_blocking<C: Candidate>(&mut self, candidate: C) -> Result<RunReport, EngineError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(EngineError::Runtime)?;
        runtime.block_on(self.run(candidate))
    }

    /// Answers one proxy call. Returns the final state when the call ends
    /// the run.
    async fn handle(&mut self, request: Request, started: Instant, deadline: Instant) -> Option<RunState> {
        let Request { call, reply } = request;
        match call {
            Call::Stop => {
                info!(pending = self.scenario.report().pending(), "candidate requested stop");
                let _ = reply.send(Ok(None));
                Some(self.finish_or(Halt::Stopped))
            }
            Call::Send { interface, packet } => {
                debug!(%interface, %packet, "send");
                let outcome = self.scenario.advance(Occurrence::send(interface, packet));
                self.settle(outcome, reply, Ok(None))
            }
            Call::Receive => self.on_receive(reply, started, deadline).await,
        }
    }

    async fn on_receive(&mut self, reply: oneshot::Sender<Reply>, started: Instant, deadline: Instant) -> Option<RunState> {
        let quiet_period = self
            .scenario
            .current()
            .filter(|event| event.call_kind() == CallKind::Timeout)
            .and_then(|event| event.duration());

        if let Some(duration) = quiet_period {
            debug!(?duration, "holding receive for a timeout event");
            tokio::select! {
                biased;
                _ = time::sleep_until(deadline) => return Some(self.on_deadline()),
                _ = time::sleep(duration) => {}
            }
            let outcome = self.scenario.advance(Occurrence::timeout());
            return self.settle(outcome, reply, Err(ProxyError::NoPackets));
        }

        let outcome = self.scenario.advance(Occurrence::receive());
        let delivered = self.scenario.completed().last().and_then(|c| {
            Some(ReceivedPacket {
                timestamp: started.elapsed(),
                interface: c.event.interface()?.to_string(),
                packet: c.actual.clone()?,
            })
        });
        self.settle(outcome, reply, Ok(delivered))
    }

    fn settle(&mut self, outcome: Outcome, reply: oneshot::Sender<Reply>, success: Reply) -> Option<RunState> {
        match outcome {
            Outcome::Success => {
                let _ = reply.send(success);
                None
            }
            Outcome::UnexpectedExtra => {
                let detail = self
                    .scenario
                    .unexpected()
                    .last()
                    .map(|u| u.detail.clone())
                    .unwrap_or_default();
                self.notes.push(format!(
                    "Your code didn't crash, but something unexpected happened. {}",
                    detail
                ));
                Some(RunState::Halted(Halt::UnexpectedCall))
            }
            other => {
                if let Some(failed) = self.scenario.failed() {
                    warn!(label = %failed.event.label, detail = %failed.detail, "expectation failed");
                }
                Some(RunState::Halted(Halt::Mismatch(other)))
            }
        }
    }

    fn on_exit(&mut self, exit: Option<Exit>) -> RunState {
        let message = match exit {
            Some(Exit::Returned) => return self.on_return(),
            Some(Exit::Failed(msg)) | Some(Exit::Panicked(msg)) => msg,
            None => "the candidate thread ended without reporting".to_string(),
        };

        warn!(error = %message, "candidate crashed");
        if self.scenario.fail_current(Outcome::Crash, format!("your code crashed: {}", message)) {
            self.notes
                .push(format!("Your code crashed before I could run all the tests: {}", message));
        } else {
            self.notes.push(format!(
                "Your code crashed after every expected event had happened: {}",
                message
            ));
        }
        RunState::Halted(Halt::Crashed(message))
    }

    /// A normal return fails whatever the scenario was still waiting for.
    fn on_return(&mut self) -> RunState {
        let Some(expected) = self.scenario.current().map(|event| event.call_kind()) else {
            return RunState::Completed;
        };
        info!(%expected, "candidate returned with events still pending");
        self.scenario.fail_current(
            Outcome::CallKindMismatch,
            format!("your code returned, but I was expecting {}", expected),
        );
        RunState::Halted(Halt::Returned)
    }

    /// `Completed` only once every declared event has happened.
    fn finish_or(&self, halt: Halt) -> RunState {
        if self.scenario.done() {
            RunState::Completed
        } else {
            RunState::Halted(halt)
        }
    }

    fn on_deadline(&mut self) -> RunState {
        let budget = self.deadline.as_secs_f64();
        warn!(deadline = budget, "run deadline expired");
        self.scenario
            .fail_current(Outcome::Timeout, format!("timed out after {:.1}s", budget));
        self.notes.push(format!(
            "Your code didn't finish within {:.1}s, so I stopped waiting for it.",
            budget
        ));
        RunState::Halted(Halt::DeadlineExceeded(self.deadline))
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic with a non-text payload".to_string())
}
