//! ## wirecheck-protocols::arp
//! ARP for IPv4 over Ethernet, plus the request/reply builders scenario
//! authors reach for most.

use std::net::Ipv4Addr;

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::address::{EtherType, MacAddr};
use crate::error::PacketError;
use crate::ethernet::Ethernet;
use crate::field::{expect_int, expect_ip, expect_mac, Field, FieldValue};
use crate::header::{shown, HeaderKind};
use crate::packet::Packet;

pub const ARP_REQUEST: u16 = 1;
pub const ARP_REPLY: u16 = 2;

const HTYPE_ETHERNET: u16 = 1;

/// ARP header (Ethernet hardware, IPv4 protocol addresses).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Arp {
    pub operation: u16,
    pub sender_hwaddr: MacAddr,
    pub sender_protoaddr: Ipv4Addr,
    pub target_hwaddr: MacAddr,
    pub target_protoaddr: Ipv4Addr,
}

impl Default for Arp {
    fn default() -> Self {
        Self {
            operation: ARP_REQUEST,
            sender_hwaddr: MacAddr::ZERO,
            sender_protoaddr: Ipv4Addr::UNSPECIFIED,
            target_hwaddr: MacAddr::ZERO,
            target_protoaddr: Ipv4Addr::UNSPECIFIED,
        }
    }
}

impl Arp {
    pub(crate) fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("operation", Some("arp_op"), self.operation),
            Field::new("sender_hwaddr", Some("arp_sha"), self.sender_hwaddr),
            Field::new("sender_protoaddr", Some("arp_spa"), self.sender_protoaddr),
            Field::new("target_hwaddr", Some("arp_tha"), self.target_hwaddr),
            Field::new("target_protoaddr", Some("arp_tpa"), self.target_protoaddr),
        ]
    }

    pub(crate) fn set(&mut self, attribute: &str, value: FieldValue) -> Result<(), PacketError> {
        const KIND: HeaderKind = HeaderKind::Arp;
        match attribute {
            "operation" => self.operation = expect_int(KIND, attribute, value)?,
            "sender_hwaddr" => self.sender_hwaddr = expect_mac(KIND, attribute, value)?,
            "sender_protoaddr" => self.sender_protoaddr = expect_ip(KIND, attribute, value)?,
            "target_hwaddr" => self.target_hwaddr = expect_mac(KIND, attribute, value)?,
            "target_protoaddr" => self.target_protoaddr = expect_ip(KIND, attribute, value)?,
            _ => return Err(KIND.unknown_attribute(attribute)),
        }
        Ok(())
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u16(HTYPE_ETHERNET);
        buf.put_u16(EtherType::IPV4.0);
        buf.put_u8(6);
        buf.put_u8(4);
        buf.put_u16(self.operation);
        buf.put_slice(&self.sender_hwaddr.octets());
        buf.put_slice(&self.sender_protoaddr.octets());
        buf.put_slice(&self.target_hwaddr.octets());
        buf.put_slice(&self.target_protoaddr.octets());
    }

    pub(crate) fn render(&self, masked: &dyn Fn(&str) -> bool) -> String {
        let op = match self.operation {
            ARP_REQUEST => "request".to_string(),
            ARP_REPLY => "reply".to_string(),
            other => format!("op {}", other),
        };
        format!(
            "Arp {} {}:{} {}:{}",
            shown(op, "arp_op", masked),
            shown(self.sender_hwaddr, "arp_sha", masked),
            shown(self.sender_protoaddr, "arp_spa", masked),
            shown(self.target_hwaddr, "arp_tha", masked),
            shown(self.target_protoaddr, "arp_tpa", masked)
        )
    }
}

/// Broadcast ARP request from `sender_hw`/`sender_ip` asking for `target_ip`.
pub fn create_ip_arp_request(sender_hw: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Packet {
    Packet::new()
        + Ethernet::new(sender_hw, MacAddr::BROADCAST, EtherType::ARP)
        + Arp {
            operation: ARP_REQUEST,
            sender_hwaddr: sender_hw,
            sender_protoaddr: sender_ip,
            target_hwaddr: MacAddr::BROADCAST,
            target_protoaddr: target_ip,
        }
}

/// Unicast ARP reply announcing `sender_hw` as the owner of `sender_ip`.
pub fn create_ip_arp_reply(
    sender_hw: MacAddr,
    target_hw: MacAddr,
    sender_ip: Ipv4Addr,
    target_ip: Ipv4Addr,
) -> Packet {
    Packet::new()
        + Ethernet::new(sender_hw, target_hw, EtherType::ARP)
        + Arp {
            operation: ARP_REPLY,
            sender_hwaddr: sender_hw,
            sender_protoaddr: sender_ip,
            target_hwaddr: target_hw,
            target_protoaddr: target_ip,
        }
}
