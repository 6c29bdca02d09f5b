//! Run state and the final verdict.

use std::fmt;
use std::time::Duration;

use wirecheck_core::scenario::ScenarioReport;
use wirecheck_core::Outcome;

/// Why a run stopped early.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Halt {
    Mismatch(Outcome),
    Crashed(String),
    DeadlineExceeded(Duration),
    UnexpectedCall,
    /// The candidate asked to stop with events still pending.
    Stopped,
    /// The candidate returned with events still pending.
    Returned,
}

impl fmt::Display for Halt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Halt::Mismatch(outcome) => write!(f, "halted on {}", outcome),
            Halt::Crashed(msg) => write!(f, "candidate crashed: {}", msg),
            Halt::DeadlineExceeded(budget) => write!(f, "deadline of {:.1}s exceeded", budget.as_secs_f64()),
            Halt::UnexpectedCall => f.write_str("unexpected call after the last event"),
            Halt::Stopped => f.write_str("stopped with events pending"),
            Halt::Returned => f.write_str("returned with events pending"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    NotStarted,
    Running,
    Completed,
    Halted(Halt),
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::NotStarted => f.write_str("not started"),
            RunState::Running => f.write_str("running"),
            RunState::Completed => f.write_str("completed"),
            RunState::Halted(halt) => halt.fmt(f),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RunReport {
    pub scenario: ScenarioReport,
    pub state: RunState,
    /// Run-level remarks (crash, deadline, unexpected calls).
    pub notes: Vec<String>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn passed(&self) -> usize {
        self.scenario.passed()
    }

    pub fn failed(&self) -> usize {
        self.scenario.failed()
    }

    pub fn pending(&self) -> usize {
        self.scenario.pending()
    }

    pub fn unexpected(&self) -> usize {
        self.scenario.unexpected.len()
    }

    pub fn summary(&self) -> String {
        self.scenario.summary()
    }

    /// Completed cleanly, every event passed, and nothing extra happened.
    pub fn all_passed(&self) -> bool {
        self.state == RunState::Completed && self.failed() == 0 && self.pending() == 0 && self.unexpected() == 0
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.scenario)?;
        for note in &self.notes {
            writeln!(f)?;
            writeln!(f, "{}", note)?;
        }
        if self.all_passed() {
            writeln!(f)?;
            writeln!(f, "All tests passed!")?;
        }
        Ok(())
    }
}
