//! ## wirecheck-protocols::address
//! Link-layer addresses and the small numeric registries (EtherType, IP
//! protocol numbers) that header fields are typed with.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PacketError;

/// A 48-bit Ethernet hardware address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);
    pub const ZERO: MacAddr = MacAddr([0; 6]);

    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = PacketError;

    /// Accepts `aa:bb:cc:dd:ee:ff` and `aa-bb-cc-dd-ee-ff`, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split([':', '-']).collect();
        if parts.len() != 6 {
            return Err(PacketError::InvalidMac(s.to_string()));
        }
        let mut octets = [0u8; 6];
        for (slot, part) in octets.iter_mut().zip(parts) {
            if part.is_empty() || part.len() > 2 {
                return Err(PacketError::InvalidMac(s.to_string()));
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| PacketError::InvalidMac(s.to_string()))?;
        }
        Ok(Self(octets))
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Number-or-name form used by the registries below, so scenario files can
/// say either `ethertype: arp` or `ethertype: 0x0806`.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrName {
    Num(u64),
    Name(String),
}

fn parse_number(text: &str) -> Option<u64> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// Link-layer payload type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EtherType(pub u16);

impl EtherType {
    pub const IPV4: EtherType = EtherType(0x0800);
    pub const ARP: EtherType = EtherType(0x0806);
    pub const VLAN: EtherType = EtherType(0x8100);
    pub const IPV6: EtherType = EtherType(0x86dd);

    fn name(&self) -> Option<&'static str> {
        match *self {
            Self::IPV4 => Some("IPv4"),
            Self::ARP => Some("ARP"),
            Self::VLAN => Some("VLAN"),
            Self::IPV6 => Some("IPv6"),
            _ => None,
        }
    }
}

impl Default for EtherType {
    fn default() -> Self {
        Self::IPV4
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:04x}", self.0),
        }
    }
}

impl FromStr for EtherType {
    type Err = PacketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ip" | "ipv4" => Ok(Self::IPV4),
            "arp" => Ok(Self::ARP),
            "vlan" => Ok(Self::VLAN),
            "ipv6" => Ok(Self::IPV6),
            other => parse_number(other)
                .and_then(|n| u16::try_from(n).ok())
                .map(EtherType)
                .ok_or_else(|| PacketError::InvalidEtherType(s.to_string())),
        }
    }
}

impl Serialize for EtherType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.name() {
            Some(name) => serializer.serialize_str(&name.to_ascii_lowercase()),
            None => serializer.serialize_u16(self.0),
        }
    }
}

impl<'de> Deserialize<'de> for EtherType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match NumberOrName::deserialize(deserializer)? {
            NumberOrName::Num(n) => u16::try_from(n)
                .map(EtherType)
                .map_err(serde::de::Error::custom),
            NumberOrName::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// IPv4 `protocol` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IpProtocol(pub u8);

impl IpProtocol {
    pub const ICMP: IpProtocol = IpProtocol(1);
    pub const TCP: IpProtocol = IpProtocol(6);
    pub const UDP: IpProtocol = IpProtocol(17);

    fn name(&self) -> Option<&'static str> {
        match *self {
            Self::ICMP => Some("ICMP"),
            Self::TCP => Some("TCP"),
            Self::UDP => Some("UDP"),
            _ => None,
        }
    }
}

impl Default for IpProtocol {
    fn default() -> Self {
        Self::ICMP
    }
}

impl fmt::Display for IpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "proto {}", self.0),
        }
    }
}

impl FromStr for IpProtocol {
    type Err = PacketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "icmp" => Ok(Self::ICMP),
            "tcp" => Ok(Self::TCP),
            "udp" => Ok(Self::UDP),
            other => parse_number(other)
                .and_then(|n| u8::try_from(n).ok())
                .map(IpProtocol)
                .ok_or_else(|| PacketError::InvalidProtocol(s.to_string())),
        }
    }
}

impl Serialize for IpProtocol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.name() {
            Some(name) => serializer.serialize_str(&name.to_ascii_lowercase()),
            None => serializer.serialize_u8(self.0),
        }
    }
}

impl<'de> Deserialize<'de> for IpProtocol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match NumberOrName::deserialize(deserializer)? {
            NumberOrName::Num(n) => u8::try_from(n)
                .map(IpProtocol)
                .map_err(serde::de::Error::custom),
            NumberOrName::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}
