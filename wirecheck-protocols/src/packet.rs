//! ## wirecheck-protocols::packet
//! A packet is an ordered stack of header layers.

use std::fmt;
use std::ops::{Add, Index, IndexMut};

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::PacketError;
use crate::field::FieldValue;
use crate::header::{Header, HeaderKind};

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Packet {
    layers: Vec<Header>,
}

impl Packet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_headers(layers: impl IntoIterator<Item = Header>) -> Self {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    pub fn push(&mut self, header: impl Into<Header>) {
        self.layers.push(header.into());
    }

    pub fn layers(&self) -> &[Header] {
        &self.layers
    }

    pub fn num_headers(&self) -> usize {
        self.layers.len()
    }

    pub fn kinds(&self) -> Vec<HeaderKind> {
        self.layers.iter().map(Header::kind).collect()
    }

    pub fn has(&self, kind: HeaderKind) -> bool {
        self.layers.iter().any(|h| h.kind() == kind)
    }

    /// First header of the given type.
    pub fn header(&self, kind: HeaderKind) -> Option<&Header> {
        self.layers.iter().find(|h| h.kind() == kind)
    }

    pub fn header_mut(&mut self, kind: HeaderKind) -> Option<&mut Header> {
        self.layers.iter_mut().find(|h| h.kind() == kind)
    }

    /// Looks a named field (`dl_src`, `nw_dst`, ...) up across the layers,
    /// first match wins.
    pub fn field(&self, name: &str) -> Result<FieldValue, PacketError> {
        self.layers
            .iter()
            .find_map(|h| h.named(name))
            .ok_or_else(|| PacketError::UnknownField(name.to_string()))
    }

    pub fn get(&self, kind: HeaderKind, attribute: &str) -> Result<FieldValue, PacketError> {
        self.header(kind)
            .ok_or(PacketError::MissingHeader(kind))?
            .get(attribute)
    }

    pub fn set(&mut self, kind: HeaderKind, attribute: &str, value: FieldValue) -> Result<(), PacketError> {
        self.header_mut(kind)
            .ok_or(PacketError::MissingHeader(kind))?
            .set(attribute, value)
    }

    /// Wire form. Length and checksum fields are derived from the layers
    /// that follow each header.
    pub fn to_bytes(&self) -> Bytes {
        let mut tail = BytesMut::new();
        for header in self.layers.iter().rev() {
            let mut buf = BytesMut::new();
            header.write(&mut buf, &tail);
            buf.extend_from_slice(&tail);
            tail = buf;
        }
        tail.freeze()
    }

    /// Layer summaries joined with ` | `, masking named fields as `masked`
    /// dictates.
    pub fn render_masked(&self, masked: &dyn Fn(&str) -> bool) -> String {
        self.layers
            .iter()
            .map(|h| h.render_masked(masked))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.layers.is_empty() {
            return f.write_str("<empty packet>");
        }
        f.write_str(&self.render_masked(&|_| false))
    }
}

impl<H: Into<Header>> Add<H> for Packet {
    type Output = Packet;

    fn add(mut self, header: H) -> Packet {
        self.push(header);
        self
    }
}

impl Index<usize> for Packet {
    type Output = Header;

    fn index(&self, index: usize) -> &Header {
        &self.layers[index]
    }
}

impl IndexMut<usize> for Packet {
    fn index_mut(&mut self, index: usize) -> &mut Header {
        &mut self.layers[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{EtherType, IpProtocol};
    use crate::ethernet::{Ethernet, Null};
    use crate::ipv4::Ipv4;
    use crate::raw::Raw;
    use crate::transport::Udp;

    fn udp_packet() -> Packet {
        Packet::new()
            + Null::default()
            + Ipv4::new(
                "127.0.0.1".parse().unwrap(),
                "127.0.0.1".parse().unwrap(),
                IpProtocol::UDP,
            )
            + Udp::new(65535, 10000)
            + Raw::from(b"Hello stack")
    }

    #[test]
    fn named_lookup_spans_layers() {
        let pkt = udp_packet();
        assert_eq!(pkt.field("tp_dst").unwrap(), FieldValue::Int(10000));
        assert_eq!(pkt.field("nw_proto").unwrap(), FieldValue::Protocol(IpProtocol::UDP));
        assert_eq!(
            pkt.field("dl_src"),
            Err(PacketError::UnknownField("dl_src".to_string()))
        );
    }

    #[test]
    fn set_by_kind_and_attribute() {
        let mut pkt = udp_packet();
        pkt.set(HeaderKind::Udp, "dst_port", FieldValue::Int(4242)).unwrap();
        assert_eq!(pkt.get(HeaderKind::Udp, "dst_port").unwrap(), FieldValue::Int(4242));
        assert_eq!(
            pkt.set(HeaderKind::Tcp, "dst_port", FieldValue::Int(1)),
            Err(PacketError::MissingHeader(HeaderKind::Tcp))
        );
    }

    #[test]
    fn wire_lengths_follow_payload() {
        let bytes = udp_packet().to_bytes();
        // null(4) + ipv4(20) + udp(8) + payload(11)
        assert_eq!(bytes.len(), 43);
        assert_eq!(&bytes[6..8], &[0x00, 39]);
        assert_eq!(&bytes[28..30], &[0x00, 19]);
    }

    #[test]
    fn summary_lists_every_layer() {
        let pkt = Packet::new() + Ethernet::default() + Ipv4::default();
        let text = pkt.to_string();
        assert!(text.starts_with("Ethernet 00:00:00:00:00:00->00:00:00:00:00:00 IPv4"));
        assert!(text.contains(" | IPv4 0.0.0.0->0.0.0.0 ICMP"));
        assert_eq!(pkt.kinds(), vec![HeaderKind::Ethernet, HeaderKind::Ipv4]);
        assert_eq!(pkt.field("dl_type").unwrap(), FieldValue::EtherType(EtherType::IPV4));
    }

    #[test]
    fn yaml_form_is_a_list_of_tagged_headers() {
        let pkt = udp_packet();
        let text = serde_yaml::to_string(&pkt).unwrap();
        assert!(text.contains("header: udp"));
        let back: Packet = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back, pkt);
    }
}
