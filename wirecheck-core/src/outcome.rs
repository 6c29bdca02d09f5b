use std::fmt;

use serde::{Deserialize, Serialize};

/// How an occurrence compared against the current expectation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    CallKindMismatch,
    EndpointMismatch,
    PayloadMismatch,
    Crash,
    Timeout,
    UnexpectedExtra,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        self == Outcome::Success
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Outcome::Success => "success",
            Outcome::CallKindMismatch => "wrong call",
            Outcome::EndpointMismatch => "wrong device",
            Outcome::PayloadMismatch => "wrong packet",
            Outcome::Crash => "crash",
            Outcome::Timeout => "timeout",
            Outcome::UnexpectedExtra => "unexpected call",
        };
        f.write_str(text)
    }
}
