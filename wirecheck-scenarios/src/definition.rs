//! On-disk scenario schema.
//!
//! A definition is plain data; [`ScenarioDefinition::build`] turns it into a
//! checked [`Scenario`], which is where every configuration error surfaces.

use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use wirecheck_core::event::Expectation;
use wirecheck_core::matcher::{DeferredRef, MatchMode, Matcher};
use wirecheck_core::predicate::Predicate;
use wirecheck_core::scenario::{InterfaceType, Scenario};
use wirecheck_core::ConfigurationError;
use wirecheck_protocols::{HeaderKind, MacAddr, Packet};

use crate::error::LoaderError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    pub name: String,
    /// Run deadline in milliseconds; the loader's default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceDefinition>,
    #[serde(default)]
    pub events: Vec<EventDefinition>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDefinition {
    pub name: String,
    pub hwaddr: MacAddr,
    pub ipaddr: Ipv4Addr,
    pub netmask: Ipv4Addr,
    #[serde(default)]
    pub kind: InterfaceType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Input,
    Output,
    Timeout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

/// `from:` side of a binding: a field of the most recent earlier event in
/// `last` direction on `interface`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDefinition {
    pub last: Direction,
    pub interface: String,
    pub header: HeaderKind,
    pub field: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BindingDefinition {
    pub header: HeaderKind,
    pub field: String,
    pub from: ReferenceDefinition,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventDefinition {
    pub label: String,
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packet: Option<Packet>,
    #[serde(default)]
    pub mode: MatchMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wildcard: Vec<String>,
    /// Lambda source strings. Kept as raw YAML so that a non-string entry is
    /// reported as a predicate error rather than a parse error.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub predicates: Vec<serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bind: Vec<BindingDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ScenarioDefinition {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Builds the scenario, using `default_timeout` when the definition has
    /// none of its own.
    pub fn build(&self, default_timeout: Duration) -> Result<Scenario, LoaderError> {
        let timeout = self.timeout_ms.map(Duration::from_millis).unwrap_or(default_timeout);
        let mut scenario = Scenario::new(self.name.clone(), timeout);
        let invalid = |source: ConfigurationError| LoaderError::Definition {
            scenario: self.name.clone(),
            source,
        };

        for iface in &self.interfaces {
            scenario
                .add_interface(&iface.name, iface.hwaddr, iface.ipaddr, iface.netmask, iface.kind)
                .map_err(invalid)?;
        }
        for event in &self.events {
            let expectation = event.expectation(&scenario)?;
            scenario.expect(expectation, event.label.clone()).map_err(invalid)?;
        }
        Ok(scenario)
    }
}

impl EventDefinition {
    fn expectation(&self, scenario: &Scenario) -> Result<Expectation, LoaderError> {
        let missing = |field| LoaderError::MissingField {
            label: self.label.clone(),
            field,
        };
        let invalid = |source: ConfigurationError| LoaderError::Definition {
            scenario: scenario.name().to_string(),
            source,
        };

        if self.kind == EventKind::Timeout {
            let millis = self.duration_ms.ok_or_else(|| missing("duration_ms"))?;
            return Ok(Expectation::timeout(Duration::from_millis(millis)));
        }

        let interface = self.interface.clone().ok_or_else(|| missing("interface"))?;
        let packet = self.packet.clone().ok_or_else(|| missing("packet"))?;
        let mut matcher = Matcher::new(packet, self.mode)
            .wildcard(&self.wildcard)
            .map_err(invalid)?;
        for source in &self.predicates {
            matcher = matcher.predicate(Predicate::try_from(source).map_err(invalid)?);
        }
        for binding in &self.bind {
            let reference = binding.from.resolve(scenario).map_err(invalid)?;
            matcher = matcher
                .bind(binding.header, &binding.field, reference)
                .map_err(invalid)?;
        }

        Ok(match self.kind {
            EventKind::Input => Expectation::input(interface, matcher),
            _ => Expectation::output(interface, matcher),
        })
    }
}

impl ReferenceDefinition {
    fn resolve(&self, scenario: &Scenario) -> Result<DeferredRef, ConfigurationError> {
        match self.last {
            Direction::Output => scenario.last_output(&self.interface, self.header, &self.field),
            Direction::Input => scenario.last_input(&self.interface, self.header, &self.field),
        }
    }
}
