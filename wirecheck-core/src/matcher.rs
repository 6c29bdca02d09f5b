//! Packet field matcher: compares an observed packet with a reference packet
//! either exactly (same layers, same wire bytes) or relaxed (wildcarded named
//! fields skipped, predicates applied).

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use wirecheck_protocols::{is_named_field, FieldValue, Header, HeaderKind, Packet, NAMED_FIELDS};

use crate::error::{ConfigurationError, LookupError, MatchFailure, ResolveError};
use crate::outcome::Outcome;
use crate::predicate::Predicate;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Exact,
    Relaxed,
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Exact => f.write_str("exact"),
            MatchMode::Relaxed => f.write_str("relaxed"),
        }
    }
}

/// Named fields excluded from relaxed comparison.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldSet(BTreeSet<String>);

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names<I, S>(names: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for name in names {
            set.insert(name.as_ref())?;
        }
        Ok(set)
    }

    /// Adds `name`; only named packet fields are accepted.
    pub fn insert(&mut self, name: &str) -> Result<bool, ConfigurationError> {
        if !is_named_field(name) {
            return Err(ConfigurationError::UnknownField(name.to_string()));
        }
        Ok(self.0.insert(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.iter().collect::<Vec<_>>().join(", "))
    }
}

/// Placeholder for a field of the packet some earlier event actually saw.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredRef {
    pub ordinal: usize,
    pub interface: String,
    pub header: HeaderKind,
    pub field: String,
}

impl DeferredRef {
    /// Reads the referenced value from the packet the source event observed.
    pub fn value_in(&self, pkt: &Packet) -> Result<FieldValue, ResolveError> {
        let packet_error = |source| ResolveError::Packet {
            ordinal: self.ordinal,
            source,
        };
        let header = pkt
            .header(self.header)
            .ok_or(wirecheck_protocols::PacketError::MissingHeader(self.header))
            .map_err(packet_error)?;
        match header.named(&self.field) {
            Some(value) => Ok(value),
            None => header.get(&self.field).map_err(packet_error),
        }
    }
}

impl fmt::Display for DeferredRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "event {} on {} ({}.{})",
            self.ordinal, self.interface, self.header, self.field
        )
    }
}

/// Reference-packet slot filled from a deferred reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub header: HeaderKind,
    pub attribute: String,
    pub source: DeferredRef,
}

/// `true` when `field` is an attribute of `kind` or a named alias that
/// resolves against it.
pub(crate) fn header_has_field(kind: HeaderKind, field: &str) -> bool {
    kind.attributes().iter().any(|a| *a == field)
        || NAMED_FIELDS
            .iter()
            .any(|(name, kinds)| *name == field && kinds.contains(&kind))
}

#[derive(Clone, Debug)]
pub struct Matcher {
    reference: Packet,
    mode: MatchMode,
    wildcards: FieldSet,
    predicates: Vec<Predicate>,
    bindings: Vec<Binding>,
}

impl Matcher {
    pub fn new(reference: Packet, mode: MatchMode) -> Self {
        Self {
            reference,
            mode,
            wildcards: FieldSet::new(),
            predicates: Vec::new(),
            bindings: Vec::new(),
        }
    }

    pub fn exact(reference: Packet) -> Self {
        Self::new(reference, MatchMode::Exact)
    }

    pub fn relaxed(reference: Packet) -> Self {
        Self::new(reference, MatchMode::Relaxed)
    }

    /// Excludes named fields from relaxed comparison. Ignored in exact mode.
    pub fn wildcard<I, S>(mut self, names: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.wildcards.insert(name.as_ref())?;
        }
        Ok(self)
    }

    /// Adds a predicate every matching packet must satisfy. Ignored in
    /// exact mode.
    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Fills `header.attribute` of the reference packet from `source` once
    /// the event becomes current.
    pub fn bind(mut self, header: HeaderKind, attribute: &str, source: DeferredRef) -> Result<Self, ConfigurationError> {
        if !header.attributes().iter().any(|a| *a == attribute) {
            return Err(ConfigurationError::UnknownHeaderField {
                header,
                field: attribute.to_string(),
            });
        }
        if !self.reference.has(header) {
            return Err(wirecheck_protocols::PacketError::MissingHeader(header).into());
        }
        self.bindings.push(Binding {
            header,
            attribute: attribute.to_string(),
            source,
        });
        Ok(self)
    }

    pub fn reference(&self) -> &Packet {
        &self.reference
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn wildcards(&self) -> &FieldSet {
        &self.wildcards
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Named-field value of the reference packet. Wildcarded fields have no
    /// meaningful reference value and fail the lookup.
    pub fn field(&self, name: &str) -> Result<FieldValue, LookupError> {
        if self.mode == MatchMode::Relaxed && self.wildcards.contains(name) {
            return Err(LookupError::Wildcarded(name.to_string()));
        }
        Ok(self.reference.field(name)?)
    }

    /// Copy of this matcher with every binding applied, looking source
    /// packets up by event ordinal.
    pub fn resolve<'a, F>(&self, lookup: F) -> Result<Matcher, ResolveError>
    where
        F: Fn(usize) -> Option<&'a Packet>,
    {
        let mut resolved = self.clone();
        for binding in &self.bindings {
            let source = lookup(binding.source.ordinal).ok_or(ResolveError::NotCompleted(binding.source.ordinal))?;
            let value = binding.source.value_in(source)?;
            resolved
                .reference
                .set(binding.header, &binding.attribute, value)
                .map_err(|source| ResolveError::Packet {
                    ordinal: binding.source.ordinal,
                    source,
                })?;
        }
        resolved.bindings.clear();
        Ok(resolved)
    }

    pub fn is_match(&self, actual: &Packet) -> bool {
        self.explain(actual).is_none()
    }

    /// Why `actual` does not match, or `None` when it does.
    pub fn explain(&self, actual: &Packet) -> Option<String> {
        if let Some(diff) = self.layer_mismatch(actual) {
            return Some(diff);
        }
        match self.mode {
            MatchMode::Exact => self.field_mismatch(actual, &|_| false).or_else(|| {
                (self.reference.to_bytes() != actual.to_bytes())
                    .then(|| "the wire bytes differ although every header field agrees".to_string())
            }),
            MatchMode::Relaxed => self
                .field_mismatch(actual, &|name| self.wildcards.contains(name))
                .or_else(|| self.predicate_failure(actual)),
        }
    }

    /// Raised form of `explain`.
    pub fn check(&self, actual: &Packet) -> Result<(), MatchFailure> {
        match self.explain(actual) {
            None => Ok(()),
            Some(diagnostic) => {
                let article = match self.mode {
                    MatchMode::Exact => "an",
                    MatchMode::Relaxed => "a",
                };
                Err(MatchFailure::new(
                    Outcome::PayloadMismatch,
                    format!("{} {} match failed: {}", article, self.mode, diagnostic),
                ))
            }
        }
    }

    fn layer_mismatch(&self, actual: &Packet) -> Option<String> {
        let expected = self.reference.layers();
        let got = actual.layers();
        for (i, (want, have)) in expected.iter().zip(got).enumerate() {
            if want.kind() != have.kind() {
                return Some(format!(
                    "header {} is {} but should be {}",
                    i + 1,
                    have.kind(),
                    want.kind()
                ));
            }
        }
        if expected.len() != got.len() {
            let kinds = |layers: &[Header]| {
                layers
                    .iter()
                    .map(|h| h.kind().to_string())
                    .collect::<Vec<_>>()
                    .join("/")
            };
            return Some(format!(
                "packet has {} headers ({}) but should have {} ({})",
                got.len(),
                kinds(got),
                expected.len(),
                kinds(expected)
            ));
        }
        None
    }

    /// First layer whose unmasked fields differ. Layer kinds already agree.
    fn field_mismatch(&self, actual: &Packet, masked: &dyn Fn(&str) -> bool) -> Option<String> {
        for (want, have) in self.reference.layers().iter().zip(actual.layers()) {
            let wrong: Vec<String> = want
                .fields()
                .into_iter()
                .zip(have.fields())
                .filter(|(w, _)| !w.alias.is_some_and(masked))
                .filter(|(w, h)| w.value != h.value)
                .map(|(w, h)| format!("{} is wrong (is {} but should be {})", w.attribute, h.value, w.value))
                .collect();
            if !wrong.is_empty() {
                return Some(format!(
                    "In the {} header, {}; expected {}, got {}",
                    want.kind(),
                    wrong.join(", "),
                    want.render_masked(masked),
                    have
                ));
            }
        }
        None
    }

    fn predicate_failure(&self, actual: &Packet) -> Option<String> {
        self.predicates.iter().find_map(|p| match p.eval(actual) {
            Ok(true) => None,
            Ok(false) => Some(format!("predicate {} is not satisfied", p)),
            Err(e) => Some(format!("predicate {} could not be evaluated: {}", p, e)),
        })
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} match of {}", self.mode, self.reference)?;
        if self.mode == MatchMode::Relaxed {
            if !self.wildcards.is_empty() {
                write!(f, " ignoring {}", self.wildcards)?;
            }
            for p in &self.predicates {
                write!(f, " where {}", p)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wirecheck_protocols::{create_ip_arp_reply, IpProtocol, Ipv4, Null, Raw, Udp};

    fn udp(src_port: u16, dst_port: u16) -> Packet {
        Packet::new()
            + Null::default()
            + Ipv4::new("127.0.0.1".parse().unwrap(), "127.0.0.1".parse().unwrap(), IpProtocol::UDP)
            + Udp::new(src_port, dst_port)
            + Raw::from(b"Hello stack")
    }

    #[test]
    fn exact_diagnostic_names_only_the_mismatching_header() {
        let m = Matcher::exact(udp(9999, 4444));
        let diag = m.explain(&udp(9999, 5555)).unwrap();
        assert_eq!(
            diag,
            "In the UDP header, dst_port is wrong (is 5555 but should be 4444); \
             expected UDP 9999->4444, got UDP 9999->5555"
        );
        assert!(!diag.contains("IPv4"));
    }

    #[test]
    fn layer_kind_mismatch_names_both_types() {
        let m = Matcher::exact(udp(1, 2));
        let arp = create_ip_arp_reply(
            "40:00:00:00:00:03".parse().unwrap(),
            "30:00:00:00:00:01".parse().unwrap(),
            "10.1.1.1".parse().unwrap(),
            "10.1.1.2".parse().unwrap(),
        );
        let diag = m.explain(&arp).unwrap();
        assert!(diag.contains("Ethernet"), "{}", diag);
        assert!(diag.contains("Null"), "{}", diag);
        let err = m.check(&arp).unwrap_err();
        assert_eq!(err.outcome, Outcome::PayloadMismatch);
        assert!(err.message.contains("an exact match failed"));
    }

    #[test]
    fn relaxed_skips_wildcards_and_masks_them_in_diagnostics() {
        let m = Matcher::relaxed(udp(65535, 4444)).wildcard(["tp_src"]).unwrap();
        assert!(m.is_match(&udp(40000, 4444)));
        let diag = m.explain(&udp(40000, 5555)).unwrap();
        assert!(diag.contains("expected UDP *->4444"), "{}", diag);
        assert!(m.check(&udp(1, 1)).unwrap_err().message.contains("a relaxed match failed"));
    }

    #[test]
    fn exact_mode_ignores_wildcards_and_predicates() {
        let m = Matcher::exact(udp(65535, 4444))
            .wildcard(["tp_src"])
            .unwrap()
            .predicate(Predicate::from_fn("never", |_| false));
        assert!(m.is_match(&udp(65535, 4444)));
        assert!(!m.is_match(&udp(40000, 4444)));
    }

    #[test]
    fn predicates_are_named_in_failures() {
        let m = Matcher::relaxed(udp(1, 2)).predicate(Predicate::parse("|p| p.tp_dst == 3").unwrap());
        let diag = m.explain(&udp(1, 2)).unwrap();
        assert!(diag.contains("|p| p.tp_dst == 3"));
    }

    #[test]
    fn unknown_wildcard_is_a_configuration_error() {
        let err = Matcher::relaxed(udp(1, 2)).wildcard(["tp_sport"]).unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownField("tp_sport".to_string()));
    }

    #[test]
    fn field_lookup_refuses_wildcarded_and_missing_names() {
        let m = Matcher::relaxed(udp(1, 2)).wildcard(["tp_src"]).unwrap();
        assert_eq!(m.field("tp_dst").unwrap(), FieldValue::Int(2));
        assert!(matches!(m.field("tp_src"), Err(LookupError::Wildcarded(_))));
        assert!(matches!(m.field("dl_src"), Err(LookupError::Packet(_))));
    }

    #[test]
    fn display_lists_wildcards() {
        let m = Matcher::relaxed(udp(1, 2)).wildcard(["tp_src", "nw_src"]).unwrap();
        let text = m.to_string();
        assert!(text.starts_with("relaxed match of Null: AF_INET | IPv4"));
        assert!(text.ends_with("ignoring [nw_src, tp_src]"));
    }

    #[test]
    fn resolve_fills_bound_fields() {
        let source = DeferredRef {
            ordinal: 0,
            interface: "lo0".to_string(),
            header: HeaderKind::Udp,
            field: "src_port".to_string(),
        };
        let m = Matcher::exact(udp(4444, 65535))
            .bind(HeaderKind::Udp, "dst_port", source)
            .unwrap();
        let observed = udp(40001, 4444);
        let resolved = m.resolve(|ordinal| (ordinal == 0).then_some(&observed)).unwrap();
        assert!(resolved.bindings().is_empty());
        assert!(resolved.is_match(&udp(4444, 40001)));
        assert_eq!(m.resolve(|_| None).unwrap_err(), ResolveError::NotCompleted(0));
    }
}
