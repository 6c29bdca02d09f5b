//! ## wirecheck-protocols::header
//! The closed set of header layers a packet can be stacked from.

use std::fmt;
use std::str::FromStr;

use bytes::BytesMut;
use serde::{Deserialize, Serialize};

use crate::arp::Arp;
use crate::error::PacketError;
use crate::ethernet::{Ethernet, Null};
use crate::field::{Field, FieldValue};
use crate::ipv4::Ipv4;
use crate::raw::Raw;
use crate::transport::{Icmp, Tcp, Udp};

/// Layer-type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderKind {
    Ethernet,
    #[serde(rename = "loopback")]
    Null,
    Arp,
    Ipv4,
    Udp,
    Tcp,
    Icmp,
    Raw,
}

impl HeaderKind {
    pub const ALL: [HeaderKind; 8] = [
        HeaderKind::Ethernet,
        HeaderKind::Null,
        HeaderKind::Arp,
        HeaderKind::Ipv4,
        HeaderKind::Udp,
        HeaderKind::Tcp,
        HeaderKind::Icmp,
        HeaderKind::Raw,
    ];

    pub(crate) fn unknown_attribute(self, attribute: &str) -> PacketError {
        PacketError::UnknownAttribute {
            header: self,
            attribute: attribute.to_string(),
        }
    }

    /// Attribute names carried by this header type.
    pub fn attributes(self) -> Vec<&'static str> {
        self.template().fields().into_iter().map(|f| f.attribute).collect()
    }

    fn template(self) -> Header {
        match self {
            HeaderKind::Ethernet => Header::Ethernet(Ethernet::default()),
            HeaderKind::Null => Header::Null(Null::default()),
            HeaderKind::Arp => Header::Arp(Arp::default()),
            HeaderKind::Ipv4 => Header::Ipv4(Ipv4::default()),
            HeaderKind::Udp => Header::Udp(Udp::default()),
            HeaderKind::Tcp => Header::Tcp(Tcp::default()),
            HeaderKind::Icmp => Header::Icmp(Icmp::default()),
            HeaderKind::Raw => Header::Raw(Raw::default()),
        }
    }
}

impl fmt::Display for HeaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HeaderKind::Ethernet => "Ethernet",
            HeaderKind::Null => "Null",
            HeaderKind::Arp => "Arp",
            HeaderKind::Ipv4 => "IPv4",
            HeaderKind::Udp => "UDP",
            HeaderKind::Tcp => "TCP",
            HeaderKind::Icmp => "ICMP",
            HeaderKind::Raw => "Raw",
        };
        f.write_str(name)
    }
}

impl FromStr for HeaderKind {
    type Err = PacketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("loopback") {
            return Ok(HeaderKind::Null);
        }
        HeaderKind::ALL
            .into_iter()
            .find(|kind| kind.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PacketError::UnknownHeaderKind(s.to_string()))
    }
}

/// A single header layer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "header", rename_all = "lowercase")]
pub enum Header {
    Ethernet(Ethernet),
    #[serde(rename = "loopback")]
    Null(Null),
    Arp(Arp),
    Ipv4(Ipv4),
    Udp(Udp),
    Tcp(Tcp),
    Icmp(Icmp),
    Raw(Raw),
}

impl Header {
    pub fn kind(&self) -> HeaderKind {
        match self {
            Header::Ethernet(_) => HeaderKind::Ethernet,
            Header::Null(_) => HeaderKind::Null,
            Header::Arp(_) => HeaderKind::Arp,
            Header::Ipv4(_) => HeaderKind::Ipv4,
            Header::Udp(_) => HeaderKind::Udp,
            Header::Tcp(_) => HeaderKind::Tcp,
            Header::Icmp(_) => HeaderKind::Icmp,
            Header::Raw(_) => HeaderKind::Raw,
        }
    }

    /// Every field of the header, in wire order.
    pub fn fields(&self) -> Vec<Field> {
        match self {
            Header::Ethernet(h) => h.fields(),
            Header::Null(h) => h.fields(),
            Header::Arp(h) => h.fields(),
            Header::Ipv4(h) => h.fields(),
            Header::Udp(h) => h.fields(),
            Header::Tcp(h) => h.fields(),
            Header::Icmp(h) => h.fields(),
            Header::Raw(h) => h.fields(),
        }
    }

    pub fn get(&self, attribute: &str) -> Result<FieldValue, PacketError> {
        self.fields()
            .into_iter()
            .find(|f| f.attribute == attribute)
            .map(|f| f.value)
            .ok_or_else(|| self.kind().unknown_attribute(attribute))
    }

    /// Value of a named field (`dl_src`, `tp_dst`, ...) if this layer has it.
    pub fn named(&self, name: &str) -> Option<FieldValue> {
        self.fields()
            .into_iter()
            .find(|f| f.alias == Some(name))
            .map(|f| f.value)
    }

    pub fn set(&mut self, attribute: &str, value: FieldValue) -> Result<(), PacketError> {
        match self {
            Header::Ethernet(h) => h.set(attribute, value),
            Header::Null(h) => h.set(attribute, value),
            Header::Arp(h) => h.set(attribute, value),
            Header::Ipv4(h) => h.set(attribute, value),
            Header::Udp(h) => h.set(attribute, value),
            Header::Tcp(h) => h.set(attribute, value),
            Header::Icmp(h) => h.set(attribute, value),
            Header::Raw(h) => h.set(attribute, value),
        }
    }

    /// Appends the wire form of this header; `payload` is everything that
    /// follows it, for length and checksum fields.
    pub(crate) fn write(&self, buf: &mut BytesMut, payload: &[u8]) {
        match self {
            Header::Ethernet(h) => h.write(buf),
            Header::Null(h) => h.write(buf),
            Header::Arp(h) => h.write(buf),
            Header::Ipv4(h) => h.write(buf, payload),
            Header::Udp(h) => h.write(buf, payload),
            Header::Tcp(h) => h.write(buf),
            Header::Icmp(h) => h.write(buf, payload),
            Header::Raw(h) => h.write(buf),
        }
    }

    /// One-line summary with every field whose named alias satisfies
    /// `masked` printed as `*`.
    pub fn render_masked(&self, masked: &dyn Fn(&str) -> bool) -> String {
        match self {
            Header::Ethernet(h) => h.render(masked),
            Header::Null(h) => h.render(),
            Header::Arp(h) => h.render(masked),
            Header::Ipv4(h) => h.render(masked),
            Header::Udp(h) => h.render(masked),
            Header::Tcp(h) => h.render(masked),
            Header::Icmp(h) => h.render(masked),
            Header::Raw(h) => h.render(),
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_masked(&|_| false))
    }
}

pub(crate) fn shown<T: fmt::Display>(value: T, alias: &str, masked: &dyn Fn(&str) -> bool) -> String {
    if masked(alias) {
        "*".to_string()
    } else {
        value.to_string()
    }
}

macro_rules! header_from {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Header {
                fn from(h: $variant) -> Self {
                    Header::$variant(h)
                }
            }
        )*
    };
}

header_from!(Ethernet, Null, Arp, Ipv4, Udp, Tcp, Icmp, Raw);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("udp".parse::<HeaderKind>().unwrap(), HeaderKind::Udp);
        assert_eq!("IPv4".parse::<HeaderKind>().unwrap(), HeaderKind::Ipv4);
        assert!("gre".parse::<HeaderKind>().is_err());
    }

    #[test]
    fn attributes_are_listed() {
        assert_eq!(HeaderKind::Udp.attributes(), vec!["src_port", "dst_port"]);
    }

    #[test]
    fn set_rejects_wrong_type() {
        let mut h = Header::from(Udp::new(1, 2));
        assert!(h.set("src_port", FieldValue::Int(70_000)).is_err());
        assert!(h.set("nope", FieldValue::Int(1)).is_err());
        h.set("src_port", FieldValue::Int(7)).unwrap();
        assert_eq!(h.get("src_port").unwrap(), FieldValue::Int(7));
    }
}
