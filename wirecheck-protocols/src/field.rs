//! ## wirecheck-protocols::field
//! Typed field values and the named-field vocabulary (`dl_src`, `nw_dst`,
//! `tp_src`, ...) shared by matchers, predicates and scenario files.

use std::fmt;
use std::net::Ipv4Addr;

use crate::address::{EtherType, IpProtocol, MacAddr};
use crate::error::PacketError;
use crate::header::HeaderKind;

/// Value held by a single header field.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldValue {
    Mac(MacAddr),
    Ip(Ipv4Addr),
    Int(u64),
    EtherType(EtherType),
    Protocol(IpProtocol),
    Bytes(Vec<u8>),
}

impl FieldValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Mac(_) => "a hardware address",
            FieldValue::Ip(_) => "an IPv4 address",
            FieldValue::Int(_) => "an integer",
            FieldValue::EtherType(_) => "an ethertype",
            FieldValue::Protocol(_) => "an IP protocol",
            FieldValue::Bytes(_) => "a byte string",
        }
    }

    /// Numeric view for integer-like values.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::Int(n) => Some(*n),
            FieldValue::EtherType(t) => Some(u64::from(t.0)),
            FieldValue::Protocol(p) => Some(u64::from(p.0)),
            _ => None,
        }
    }

    /// Parses `text` into the same variant as `self`.
    pub fn parse_like(&self, text: &str) -> Result<FieldValue, PacketError> {
        let invalid = || PacketError::InvalidValue {
            expected: self.type_name(),
            text: text.to_string(),
        };
        let text = text.trim();
        match self {
            FieldValue::Mac(_) => text.parse().map(FieldValue::Mac),
            FieldValue::Ip(_) => text.parse().map(FieldValue::Ip).map_err(|_| invalid()),
            FieldValue::Int(_) => {
                let parsed = match text.strip_prefix("0x") {
                    Some(hex) => u64::from_str_radix(hex, 16),
                    None => text.parse(),
                };
                parsed.map(FieldValue::Int).map_err(|_| invalid())
            }
            FieldValue::EtherType(_) => text.parse().map(FieldValue::EtherType),
            FieldValue::Protocol(_) => text.parse().map(FieldValue::Protocol),
            FieldValue::Bytes(_) => Ok(FieldValue::Bytes(text.as_bytes().to_vec())),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Mac(mac) => mac.fmt(f),
            FieldValue::Ip(ip) => ip.fmt(f),
            FieldValue::Int(n) => n.fmt(f),
            FieldValue::EtherType(t) => t.fmt(f),
            FieldValue::Protocol(p) => p.fmt(f),
            FieldValue::Bytes(b) => match std::str::from_utf8(b) {
                Ok(text) => write!(f, "{:?}", text),
                Err(_) => write!(f, "0x{}", hex::encode(b)),
            },
        }
    }
}

impl From<MacAddr> for FieldValue {
    fn from(value: MacAddr) -> Self {
        FieldValue::Mac(value)
    }
}

impl From<Ipv4Addr> for FieldValue {
    fn from(value: Ipv4Addr) -> Self {
        FieldValue::Ip(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<u16> for FieldValue {
    fn from(value: u16) -> Self {
        FieldValue::Int(u64::from(value))
    }
}

impl From<u8> for FieldValue {
    fn from(value: u8) -> Self {
        FieldValue::Int(u64::from(value))
    }
}

impl From<EtherType> for FieldValue {
    fn from(value: EtherType) -> Self {
        FieldValue::EtherType(value)
    }
}

impl From<IpProtocol> for FieldValue {
    fn from(value: IpProtocol) -> Self {
        FieldValue::Protocol(value)
    }
}

/// One field of a header as seen by the comparator.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    /// Attribute name on the header (`src_port`).
    pub attribute: &'static str,
    /// Named-field alias usable across packets (`tp_src`).
    pub alias: Option<&'static str>,
    pub value: FieldValue,
}

impl Field {
    pub(crate) fn new(attribute: &'static str, alias: Option<&'static str>, value: impl Into<FieldValue>) -> Self {
        Self {
            attribute,
            alias,
            value: value.into(),
        }
    }
}

/// Named fields and the header types they resolve against.
pub const NAMED_FIELDS: &[(&str, &[HeaderKind])] = &[
    ("dl_src", &[HeaderKind::Ethernet]),
    ("dl_dst", &[HeaderKind::Ethernet]),
    ("dl_type", &[HeaderKind::Ethernet]),
    ("nw_src", &[HeaderKind::Ipv4]),
    ("nw_dst", &[HeaderKind::Ipv4]),
    ("nw_proto", &[HeaderKind::Ipv4]),
    ("nw_tos", &[HeaderKind::Ipv4]),
    ("tp_src", &[HeaderKind::Udp, HeaderKind::Tcp, HeaderKind::Icmp]),
    ("tp_dst", &[HeaderKind::Udp, HeaderKind::Tcp, HeaderKind::Icmp]),
    ("arp_op", &[HeaderKind::Arp]),
    ("arp_sha", &[HeaderKind::Arp]),
    ("arp_spa", &[HeaderKind::Arp]),
    ("arp_tha", &[HeaderKind::Arp]),
    ("arp_tpa", &[HeaderKind::Arp]),
];

pub fn is_named_field(name: &str) -> bool {
    NAMED_FIELDS.iter().any(|(n, _)| *n == name)
}

pub(crate) fn type_error(header: HeaderKind, attribute: &str, expected: &'static str, got: &FieldValue) -> PacketError {
    PacketError::FieldType {
        header,
        attribute: attribute.to_string(),
        expected,
        got: got.clone(),
    }
}

pub(crate) fn expect_mac(header: HeaderKind, attribute: &str, value: FieldValue) -> Result<MacAddr, PacketError> {
    match value {
        FieldValue::Mac(mac) => Ok(mac),
        other => Err(type_error(header, attribute, "a hardware address", &other)),
    }
}

pub(crate) fn expect_ip(header: HeaderKind, attribute: &str, value: FieldValue) -> Result<Ipv4Addr, PacketError> {
    match value {
        FieldValue::Ip(ip) => Ok(ip),
        other => Err(type_error(header, attribute, "an IPv4 address", &other)),
    }
}

pub(crate) fn expect_int<T: TryFrom<u64>>(
    header: HeaderKind,
    attribute: &str,
    value: FieldValue,
) -> Result<T, PacketError> {
    value
        .as_u64()
        .and_then(|n| T::try_from(n).ok())
        .ok_or_else(|| type_error(header, attribute, "an integer in range", &value))
}
