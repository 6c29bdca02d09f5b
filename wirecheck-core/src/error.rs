use thiserror::Error;

use wirecheck_protocols::{HeaderKind, PacketError};

use crate::outcome::Outcome;

/// Malformed matchers, predicates, scenarios or references. Raised while a
/// scenario is being built, never while it runs.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("'{0}' is not a named packet field")]
    UnknownField(String),

    #[error("invalid predicate '{source_text}': {reason}")]
    Predicate { source_text: String, reason: String },

    #[error("interface '{0}' is already defined")]
    DuplicateInterface(String),

    #[error("interface '{0}' is not defined in this scenario")]
    UnknownInterface(String),

    #[error("invalid network {address}/{mask}")]
    InvalidNetwork { address: String, mask: String },

    #[error("event {ordinal} refers to event {target}, which is not declared before it")]
    ForwardReference { ordinal: usize, target: usize },

    #[error("event {0} has no packet to refer to")]
    NotAPacketEvent(usize),

    #[error("no {direction} event on interface '{interface}' has been declared")]
    NoPriorEvent {
        direction: &'static str,
        interface: String,
    },

    #[error("{header} header has no field '{field}'")]
    UnknownHeaderField { header: HeaderKind, field: String },

    #[error("scenario has already started; expectations are fixed")]
    AlreadyStarted,

    #[error(transparent)]
    Packet(#[from] PacketError),
}

/// Raised form of a non-successful comparison.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{outcome}: {message}")]
pub struct MatchFailure {
    pub outcome: Outcome,
    pub message: String,
}

impl MatchFailure {
    pub fn new(outcome: Outcome, message: impl Into<String>) -> Self {
        Self {
            outcome,
            message: message.into(),
        }
    }
}

/// Field lookup on a matcher's reference packet.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum LookupError {
    #[error("field '{0}' is wildcarded in this matcher")]
    Wildcarded(String),

    #[error(transparent)]
    Packet(#[from] PacketError),
}

/// Deferred reference resolution against the completed-events table.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ResolveError {
    #[error("event {0} has not completed with a packet")]
    NotCompleted(usize),

    #[error("event {ordinal}: {source}")]
    Packet {
        ordinal: usize,
        #[source]
        source: PacketError,
    },
}
