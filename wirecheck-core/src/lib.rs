//! # wirecheck-core
//!
//! Scenario matching and the expected-event queue.
//!
//! ### Key Submodules:
//! - `matcher`: exact / relaxed packet comparison with wildcards, predicates
//!   and deferred field bindings
//! - `predicate`: lambda-source predicates parsed with `nom`
//! - `event`: expected events (input, output, timeout) and occurrences
//! - `scenario`: interfaces, the pending queue, completed table and report

pub mod error;
pub mod event;
pub mod matcher;
pub mod outcome;
pub mod predicate;
pub mod scenario;

pub mod prelude {
    pub use crate::error::*;
    pub use crate::event::*;
    pub use crate::matcher::*;
    pub use crate::outcome::Outcome;
    pub use crate::predicate::{Predicate, PredicateError};
    pub use crate::scenario::*;
}

pub use error::{ConfigurationError, MatchFailure};
pub use outcome::Outcome;
