//! # wirecheck-engine
//!
//! Runs a candidate program against a scenario. The candidate sees the
//! network only through a [`NetworkProxy`]; a [`Supervisor`] answers its
//! calls, enforces the run deadline and turns crashes into failures.

pub mod candidate;
pub mod error;
pub mod proxy;
pub mod report;
pub mod supervisor;

pub use candidate::Candidate;
pub use error::EngineError;
pub use proxy::{NetworkProxy, ProxyError, ReceivedPacket};
pub use report::{Halt, RunReport, RunState};
pub use supervisor::Supervisor;
