//! Expected events and the occurrences they are checked against.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use wirecheck_protocols::Packet;

use crate::error::{MatchFailure, ResolveError};
use crate::matcher::Matcher;
use crate::outcome::Outcome;

/// What the candidate did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Receive,
    Send,
    Timeout,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallKind::Receive => f.write_str("receive"),
            CallKind::Send => f.write_str("send"),
            CallKind::Timeout => f.write_str("timeout"),
        }
    }
}

/// The harness's observation of one candidate action.
#[derive(Clone, Debug, PartialEq)]
pub struct Occurrence {
    pub kind: CallKind,
    pub interface: Option<String>,
    pub packet: Option<Packet>,
}

impl Occurrence {
    pub fn receive() -> Self {
        Self {
            kind: CallKind::Receive,
            interface: None,
            packet: None,
        }
    }

    pub fn send(interface: impl Into<String>, packet: Packet) -> Self {
        Self {
            kind: CallKind::Send,
            interface: Some(interface.into()),
            packet: Some(packet),
        }
    }

    pub fn timeout() -> Self {
        Self {
            kind: CallKind::Timeout,
            interface: None,
            packet: None,
        }
    }
}

impl fmt::Display for Occurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)?;
        if let Some(interface) = &self.interface {
            write!(f, " on {}", interface)?;
        }
        if let Some(packet) = &self.packet {
            write!(f, ": {}", packet)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub enum Expectation {
    /// The harness delivers a packet on `interface`.
    Input { interface: String, matcher: Matcher },
    /// The candidate must send a matching packet on `interface`.
    Output { interface: String, matcher: Matcher },
    /// Nothing may happen for `duration`.
    Timeout { duration: Duration },
}

impl Expectation {
    pub fn input(interface: impl Into<String>, matcher: Matcher) -> Self {
        Expectation::Input {
            interface: interface.into(),
            matcher,
        }
    }

    pub fn output(interface: impl Into<String>, matcher: Matcher) -> Self {
        Expectation::Output {
            interface: interface.into(),
            matcher,
        }
    }

    pub fn timeout(duration: Duration) -> Self {
        Expectation::Timeout { duration }
    }

    /// The call that satisfies this expectation.
    pub fn call_kind(&self) -> CallKind {
        match self {
            Expectation::Input { .. } => CallKind::Receive,
            Expectation::Output { .. } => CallKind::Send,
            Expectation::Timeout { .. } => CallKind::Timeout,
        }
    }

    pub fn interface(&self) -> Option<&str> {
        match self {
            Expectation::Input { interface, .. } | Expectation::Output { interface, .. } => Some(interface),
            Expectation::Timeout { .. } => None,
        }
    }

    pub fn matcher(&self) -> Option<&Matcher> {
        match self {
            Expectation::Input { matcher, .. } | Expectation::Output { matcher, .. } => Some(matcher),
            Expectation::Timeout { .. } => None,
        }
    }

    fn matcher_mut(&mut self) -> Option<&mut Matcher> {
        match self {
            Expectation::Input { matcher, .. } | Expectation::Output { matcher, .. } => Some(matcher),
            Expectation::Timeout { .. } => None,
        }
    }
}

/// An expectation placed in a scenario, with its label and position.
#[derive(Clone, Debug)]
pub struct ExpectedEvent {
    pub ordinal: usize,
    pub label: String,
    pub expectation: Expectation,
}

impl ExpectedEvent {
    pub fn call_kind(&self) -> CallKind {
        self.expectation.call_kind()
    }

    pub fn interface(&self) -> Option<&str> {
        self.expectation.interface()
    }

    pub fn matcher(&self) -> Option<&Matcher> {
        self.expectation.matcher()
    }

    /// Reference packet, i.e. what an Input event delivers.
    pub fn packet(&self) -> Option<&Packet> {
        self.matcher().map(Matcher::reference)
    }

    pub fn duration(&self) -> Option<Duration> {
        match self.expectation {
            Expectation::Timeout { duration } => Some(duration),
            _ => None,
        }
    }

    /// Applies deferred bindings in place.
    pub(crate) fn resolve<'a, F>(&mut self, lookup: F) -> Result<(), ResolveError>
    where
        F: Fn(usize) -> Option<&'a Packet>,
    {
        if let Some(matcher) = self.expectation.matcher_mut() {
            if !matcher.bindings().is_empty() {
                *matcher = matcher.resolve(lookup)?;
            }
        }
        Ok(())
    }

    pub fn evaluate(&self, occurrence: &Occurrence) -> Result<(), MatchFailure> {
        let want = self.call_kind();
        if occurrence.kind != want {
            return Err(MatchFailure::new(
                Outcome::CallKindMismatch,
                format!("{} was called, but I was expecting {}", occurrence.kind, want),
            ));
        }

        let (Some(expected_interface), Some(matcher)) = (self.interface(), self.matcher()) else {
            return Ok(());
        };
        if let Some(got) = occurrence.interface.as_deref() {
            if got != expected_interface {
                let direction = match want {
                    CallKind::Send => "output",
                    _ => "input",
                };
                return Err(MatchFailure::new(
                    Outcome::EndpointMismatch,
                    format!(
                        "{} on device {} unexpected (expected {})",
                        direction, got, expected_interface
                    ),
                ));
            }
        }
        match &occurrence.packet {
            Some(packet) => matcher.check(packet),
            None if want == CallKind::Send => Err(MatchFailure::new(Outcome::PayloadMismatch, "no packet was sent")),
            None => Ok(()),
        }
    }

    pub fn outcome(&self, occurrence: &Occurrence) -> Outcome {
        match self.evaluate(occurrence) {
            Ok(()) => Outcome::Success,
            Err(failure) => failure.outcome,
        }
    }
}

impl fmt::Display for ExpectedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.expectation {
            Expectation::Input { interface, matcher } => {
                write!(f, "{}: input on {}: {}", self.label, interface, matcher)
            }
            Expectation::Output { interface, matcher } => {
                write!(f, "{}: output on {}: {}", self.label, interface, matcher)
            }
            Expectation::Timeout { duration } => {
                write!(f, "{}: nothing for {:.1}s", self.label, duration.as_secs_f64())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wirecheck_protocols::create_ip_arp_reply;

    fn reply() -> Packet {
        create_ip_arp_reply(
            "40:00:00:00:00:03".parse().unwrap(),
            "30:00:00:00:00:01".parse().unwrap(),
            "10.1.1.1".parse().unwrap(),
            "10.1.1.2".parse().unwrap(),
        )
    }

    fn output_event() -> ExpectedEvent {
        ExpectedEvent {
            ordinal: 1,
            label: "Outgoing ARP reply".to_string(),
            expectation: Expectation::output("router-eth3", Matcher::exact(reply())),
        }
    }

    #[test]
    fn wrong_call_kind() {
        let err = output_event().evaluate(&Occurrence::receive()).unwrap_err();
        assert_eq!(err.outcome, Outcome::CallKindMismatch);
        assert_eq!(err.message, "receive was called, but I was expecting send");
    }

    #[test]
    fn device_checked_before_payload() {
        let event = output_event();
        let err = event.evaluate(&Occurrence::send("router-eth0", Packet::new())).unwrap_err();
        assert_eq!(err.outcome, Outcome::EndpointMismatch);
        assert!(err.message.starts_with("output on device router-eth0 unexpected"));
        assert_eq!(event.outcome(&Occurrence::send("router-eth3", reply())), Outcome::Success);
        assert_eq!(
            event.outcome(&Occurrence::send("router-eth3", Packet::new())),
            Outcome::PayloadMismatch
        );
    }

    #[test]
    fn timeout_accepts_only_timeout() {
        let event = ExpectedEvent {
            ordinal: 2,
            label: "quiet".to_string(),
            expectation: Expectation::timeout(Duration::from_millis(500)),
        };
        assert!(event.evaluate(&Occurrence::timeout()).is_ok());
        assert_eq!(event.outcome(&Occurrence::send("x", reply())), Outcome::CallKindMismatch);
        assert_eq!(event.to_string(), "quiet: nothing for 0.5s");
    }
}
