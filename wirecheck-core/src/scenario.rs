//! Scenario: interfaces plus the ordered queue of expected events, and the
//! record of what happened to each of them.

use std::collections::VecDeque;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use wirecheck_protocols::{HeaderKind, MacAddr, Packet};

use crate::error::{ConfigurationError, ResolveError};
use crate::event::{CallKind, Expectation, ExpectedEvent, Occurrence};
use crate::matcher::{header_has_field, DeferredRef};
use crate::outcome::Outcome;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceType {
    #[default]
    Ethernet,
    Loopback,
    Wireless,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    pub hwaddr: MacAddr,
    pub network: Ipv4Network,
    pub kind: InterfaceType,
}

impl Interface {
    pub fn ipaddr(&self) -> Ipv4Addr {
        self.network.ip()
    }

    pub fn netmask(&self) -> Ipv4Addr {
        self.network.mask()
    }
}

#[derive(Clone, Debug)]
pub struct CompletedEvent {
    pub event: ExpectedEvent,
    /// Packet observed (sent) or delivered (received); none for timeouts.
    pub actual: Option<Packet>,
    pub outcome: Outcome,
}

#[derive(Clone, Debug)]
pub struct FailedEvent {
    pub event: ExpectedEvent,
    pub outcome: Outcome,
    pub detail: String,
}

#[derive(Clone, Debug)]
pub struct UnexpectedCall {
    pub occurrence: Occurrence,
    pub detail: String,
}

#[derive(Debug)]
pub struct Scenario {
    name: String,
    timeout: Duration,
    interfaces: Vec<Interface>,
    pending: VecDeque<ExpectedEvent>,
    completed: Vec<CompletedEvent>,
    failed: Option<FailedEvent>,
    unexpected: Vec<UnexpectedCall>,
    unresolved: Option<ResolveError>,
    declared: usize,
    started: bool,
}

impl Scenario {
    pub fn new(name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            timeout,
            interfaces: Vec::new(),
            pending: VecDeque::new(),
            completed: Vec::new(),
            failed: None,
            unexpected: Vec::new(),
            unresolved: None,
            declared: 0,
            started: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Overall wall-clock budget for a run.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn add_interface(
        &mut self,
        name: &str,
        hwaddr: MacAddr,
        netaddr: Ipv4Addr,
        mask: Ipv4Addr,
        kind: InterfaceType,
    ) -> Result<(), ConfigurationError> {
        if self.interface(name).is_some() {
            return Err(ConfigurationError::DuplicateInterface(name.to_string()));
        }
        let network = Ipv4Network::with_netmask(netaddr, mask).map_err(|_| ConfigurationError::InvalidNetwork {
            address: netaddr.to_string(),
            mask: mask.to_string(),
        })?;
        self.interfaces.push(Interface {
            name: name.to_string(),
            hwaddr,
            network,
            kind,
        });
        Ok(())
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    /// Appends an expectation and returns its ordinal.
    pub fn expect(&mut self, expectation: Expectation, label: impl Into<String>) -> Result<usize, ConfigurationError> {
        if self.started {
            return Err(ConfigurationError::AlreadyStarted);
        }
        let ordinal = self.declared;
        if let Some(interface) = expectation.interface() {
            if self.interface(interface).is_none() {
                return Err(ConfigurationError::UnknownInterface(interface.to_string()));
            }
        }
        for binding in expectation.matcher().map(|m| m.bindings()).unwrap_or_default() {
            let target = binding.source.ordinal;
            if target >= ordinal {
                return Err(ConfigurationError::ForwardReference { ordinal, target });
            }
            match self.declared_event(target).map(|e| e.call_kind()) {
                Some(CallKind::Receive | CallKind::Send) => {}
                _ => return Err(ConfigurationError::NotAPacketEvent(target)),
            }
        }
        self.pending.push_back(ExpectedEvent {
            ordinal,
            label: label.into(),
            expectation,
        });
        self.declared += 1;
        Ok(ordinal)
    }

    /// Reference to `header.field` of the packet the most recently declared
    /// output on `interface` will carry.
    pub fn last_output(&self, interface: &str, header: HeaderKind, field: &str) -> Result<DeferredRef, ConfigurationError> {
        self.last_reference(CallKind::Send, interface, header, field)
    }

    /// Same as `last_output`, for inputs.
    pub fn last_input(&self, interface: &str, header: HeaderKind, field: &str) -> Result<DeferredRef, ConfigurationError> {
        self.last_reference(CallKind::Receive, interface, header, field)
    }

    fn last_reference(
        &self,
        kind: CallKind,
        interface: &str,
        header: HeaderKind,
        field: &str,
    ) -> Result<DeferredRef, ConfigurationError> {
        if !header_has_field(header, field) {
            return Err(ConfigurationError::UnknownHeaderField {
                header,
                field: field.to_string(),
            });
        }
        let event = self
            .declared_events()
            .filter(|e| e.call_kind() == kind && e.interface() == Some(interface))
            .last()
            .ok_or_else(|| ConfigurationError::NoPriorEvent {
                direction: if kind == CallKind::Send { "output" } else { "input" },
                interface: interface.to_string(),
            })?;
        Ok(DeferredRef {
            ordinal: event.ordinal,
            interface: interface.to_string(),
            header,
            field: field.to_string(),
        })
    }

    /// Every declared event in declaration order, completed ones first.
    pub fn declared_events(&self) -> impl Iterator<Item = &ExpectedEvent> {
        self.completed.iter().map(|c| &c.event).chain(self.pending.iter())
    }

    fn declared_event(&self, ordinal: usize) -> Option<&ExpectedEvent> {
        self.declared_events().find(|e| e.ordinal == ordinal)
    }

    /// Fixes the queue and resolves the first event.
    pub fn start(&mut self) {
        if !self.started {
            self.started = true;
            self.promote_front();
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Front of the queue, with deferred references resolved once the run
    /// has started.
    pub fn current(&self) -> Option<&ExpectedEvent> {
        self.pending.front()
    }

    pub fn done(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_failed(&self) -> bool {
        self.failed.is_some()
    }

    pub fn completed(&self) -> &[CompletedEvent] {
        &self.completed
    }

    pub fn failed(&self) -> Option<&FailedEvent> {
        self.failed.as_ref()
    }

    pub fn unexpected(&self) -> &[UnexpectedCall] {
        &self.unexpected
    }

    /// Checks `occurrence` against the current event. On success the event
    /// moves to the completed table; otherwise it stays at the front and is
    /// recorded as the failed event.
    pub fn advance(&mut self, occurrence: Occurrence) -> Outcome {
        self.start();
        if let Some(failed) = &self.failed {
            return failed.outcome;
        }
        if self.pending.is_empty() {
            let detail = format!("{} was called after every expected event had happened", occurrence.kind);
            warn!(scenario = %self.name, %occurrence, "unexpected call");
            self.unexpected.push(UnexpectedCall { occurrence, detail });
            return Outcome::UnexpectedExtra;
        }

        if let Some(err) = self.unresolved.take() {
            let detail = format!("could not fill in the expected packet: {}", err);
            self.fail_current(Outcome::PayloadMismatch, detail);
            return Outcome::PayloadMismatch;
        }

        let evaluation = self
            .pending
            .front()
            .map_or(Ok(()), |front| front.evaluate(&occurrence));
        if let Err(failure) = evaluation {
            self.fail_current(failure.outcome, failure.message);
            return failure.outcome;
        }

        let Some(event) = self.pending.pop_front() else {
            return Outcome::Success;
        };
        debug!(scenario = %self.name, ordinal = event.ordinal, label = %event.label, "event passed");
        let actual = match event.call_kind() {
            CallKind::Receive => event.packet().cloned(),
            _ => occurrence.packet,
        };
        self.completed.push(CompletedEvent {
            event,
            actual,
            outcome: Outcome::Success,
        });
        self.promote_front();
        Outcome::Success
    }

    /// Records `outcome` against the current event. Returns `false` when
    /// there is no current event or a failure is already recorded.
    pub fn fail_current(&mut self, outcome: Outcome, detail: impl Into<String>) -> bool {
        if self.failed.is_some() {
            return false;
        }
        let Some(front) = self.pending.front() else {
            return false;
        };
        let detail = detail.into();
        debug!(scenario = %self.name, ordinal = front.ordinal, %outcome, %detail, "event failed");
        self.failed = Some(FailedEvent {
            event: front.clone(),
            outcome,
            detail,
        });
        true
    }

    fn promote_front(&mut self) {
        let completed = &self.completed;
        let lookup = |ordinal: usize| {
            completed
                .iter()
                .find(|c| c.event.ordinal == ordinal)
                .and_then(|c| c.actual.as_ref())
        };
        if let Some(front) = self.pending.front_mut() {
            if let Err(err) = front.resolve(lookup) {
                self.unresolved = Some(err);
            }
        }
    }

    pub fn report(&self) -> ScenarioReport {
        let mut entries: Vec<ReportEntry> = self
            .completed
            .iter()
            .map(|c| ReportEntry {
                ordinal: c.event.ordinal,
                label: c.event.label.clone(),
                status: EntryStatus::Passed,
            })
            .collect();
        for event in &self.pending {
            let status = match &self.failed {
                Some(failed) if failed.event.ordinal == event.ordinal => EntryStatus::Failed {
                    outcome: failed.outcome,
                    detail: failed.detail.clone(),
                },
                _ => EntryStatus::Pending,
            };
            entries.push(ReportEntry {
                ordinal: event.ordinal,
                label: event.label.clone(),
                status,
            });
        }
        entries.sort_by_key(|e| e.ordinal);
        ScenarioReport {
            name: self.name.clone(),
            entries,
            unexpected: self.unexpected.iter().map(|u| u.detail.clone()).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EntryStatus {
    Passed,
    Failed { outcome: Outcome, detail: String },
    Pending,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub ordinal: usize,
    pub label: String,
    pub status: EntryStatus,
}

/// Per-event results in declaration order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub entries: Vec<ReportEntry>,
    pub unexpected: Vec<String>,
}

impl ScenarioReport {
    fn count(&self, pred: impl Fn(&EntryStatus) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.status)).count()
    }

    pub fn passed(&self) -> usize {
        self.count(|s| *s == EntryStatus::Passed)
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, EntryStatus::Failed { .. }))
    }

    pub fn pending(&self) -> usize {
        self.count(|s| *s == EntryStatus::Pending)
    }

    pub fn failed_entry(&self) -> Option<&ReportEntry> {
        self.entries
            .iter()
            .find(|e| matches!(e.status, EntryStatus::Failed { .. }))
    }

    pub fn summary(&self) -> String {
        format!(
            "{} passed, {} failed, {} pending",
            self.passed(),
            self.failed(),
            self.pending()
        )
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Results for test scenario {}: {}", self.name, self.summary())?;

        let passed: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.status == EntryStatus::Passed)
            .collect();
        if !passed.is_empty() {
            writeln!(f, "Passed:")?;
            for (i, entry) in passed.iter().enumerate() {
                writeln!(f, "{} {}", i + 1, entry.label)?;
            }
        }

        if let Some(entry) = self.failed_entry() {
            writeln!(f, "Failed:")?;
            writeln!(f, "    {}", entry.label)?;
            if let EntryStatus::Failed { detail, .. } = &entry.status {
                writeln!(f, "    {}", detail)?;
            }
        }

        let pending: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.status == EntryStatus::Pending)
            .collect();
        if !pending.is_empty() {
            writeln!(f, "Pending (couldn't test because of earlier failure):")?;
            for (i, entry) in pending.iter().enumerate() {
                writeln!(f, "{} {}", i + 1, entry.label)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::Matcher;
    use wirecheck_protocols::{IpProtocol, Ipv4, Null, Udp};

    fn udp(src_port: u16, dst_port: u16) -> Packet {
        Packet::new()
            + Null::default()
            + Ipv4::new("127.0.0.1".parse().unwrap(), "127.0.0.1".parse().unwrap(), IpProtocol::UDP)
            + Udp::new(src_port, dst_port)
    }

    fn loopback() -> Scenario {
        let mut s = Scenario::new("loopback", Duration::from_secs(1));
        s.add_interface(
            "lo0",
            MacAddr::ZERO,
            "127.0.0.1".parse().unwrap(),
            "255.0.0.0".parse().unwrap(),
            InterfaceType::Loopback,
        )
        .unwrap();
        s
    }

    #[test]
    fn interfaces_are_unique() {
        let mut s = loopback();
        let err = s
            .add_interface(
                "lo0",
                MacAddr::ZERO,
                "127.0.0.1".parse().unwrap(),
                "255.0.0.0".parse().unwrap(),
                InterfaceType::Loopback,
            )
            .unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicateInterface("lo0".to_string()));
        assert_eq!(s.interface("lo0").unwrap().netmask(), Ipv4Addr::new(255, 0, 0, 0));
    }

    #[test]
    fn expect_rejects_unknown_interfaces_and_late_additions() {
        let mut s = loopback();
        let err = s
            .expect(Expectation::input("eth0", Matcher::exact(udp(1, 2))), "in")
            .unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownInterface("eth0".to_string()));
        s.expect(Expectation::input("lo0", Matcher::exact(udp(1, 2))), "in").unwrap();
        s.start();
        assert_eq!(
            s.expect(Expectation::timeout(Duration::from_millis(1)), "late"),
            Err(ConfigurationError::AlreadyStarted)
        );
    }

    #[test]
    fn forward_references_are_rejected() {
        let mut s = loopback();
        let forward = DeferredRef {
            ordinal: 0,
            interface: "lo0".to_string(),
            header: HeaderKind::Udp,
            field: "src_port".to_string(),
        };
        let m = Matcher::exact(udp(1, 2)).bind(HeaderKind::Udp, "dst_port", forward).unwrap();
        assert_eq!(
            s.expect(Expectation::input("lo0", m), "self"),
            Err(ConfigurationError::ForwardReference { ordinal: 0, target: 0 })
        );
        assert!(matches!(
            s.last_output("lo0", HeaderKind::Udp, "src_port"),
            Err(ConfigurationError::NoPriorEvent { .. })
        ));
    }

    #[test]
    fn failure_keeps_front_and_report_counts() {
        let mut s = loopback();
        s.expect(Expectation::input("lo0", Matcher::exact(udp(1, 2))), "first").unwrap();
        s.expect(Expectation::output("lo0", Matcher::exact(udp(2, 1))), "second").unwrap();
        s.expect(Expectation::timeout(Duration::from_millis(10)), "third").unwrap();

        assert_eq!(s.advance(Occurrence::receive()), Outcome::Success);
        assert_eq!(s.advance(Occurrence::receive()), Outcome::CallKindMismatch);
        assert_eq!(s.current().unwrap().label, "second");
        assert!(!s.done());

        let report = s.report();
        assert_eq!(report.summary(), "1 passed, 1 failed, 1 pending");
        assert_eq!(report.failed_entry().unwrap().label, "second");
        let text = report.to_string();
        assert!(text.contains("Passed:\n1 first\n"));
        assert!(text.contains("Failed:\n    second\n    receive was called, but I was expecting send"));
        assert!(text.contains("Pending (couldn't test because of earlier failure):\n1 third"));
    }

    #[test]
    fn calls_after_done_are_unexpected() {
        let mut s = loopback();
        s.expect(Expectation::output("lo0", Matcher::exact(udp(2, 1))), "only").unwrap();
        assert_eq!(s.advance(Occurrence::send("lo0", udp(2, 1))), Outcome::Success);
        assert!(s.done());
        assert_eq!(s.advance(Occurrence::receive()), Outcome::UnexpectedExtra);
        assert!(!s.fail_current(Outcome::Crash, "late crash"));
        let report = s.report();
        assert_eq!(report.summary(), "1 passed, 0 failed, 0 pending");
        assert_eq!(report.unexpected.len(), 1);
    }

    #[test]
    fn deferred_port_is_taken_from_the_observed_packet() {
        let mut s = loopback();
        let sent = Matcher::relaxed(udp(65535, 4444)).wildcard(["tp_src"]).unwrap();
        s.expect(Expectation::output("lo0", sent), "client sends").unwrap();
        let port = s.last_output("lo0", HeaderKind::Udp, "src_port").unwrap();
        let reply = Matcher::exact(udp(4444, 65535))
            .bind(HeaderKind::Udp, "dst_port", port)
            .unwrap();
        s.expect(Expectation::input("lo0", reply), "server answers").unwrap();

        assert_eq!(s.advance(Occurrence::send("lo0", udp(50123, 4444))), Outcome::Success);
        let delivered = s.current().unwrap().packet().unwrap().clone();
        assert_eq!(delivered, udp(4444, 50123));
        assert_eq!(s.advance(Occurrence::receive()), Outcome::Success);
        assert_eq!(s.completed()[1].actual.as_ref(), Some(&delivered));
    }
}
