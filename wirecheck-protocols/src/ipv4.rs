//! ## wirecheck-protocols::ipv4
//! IPv4 header without options.

use std::net::Ipv4Addr;

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::address::IpProtocol;
use crate::error::PacketError;
use crate::field::{expect_int, expect_ip, Field, FieldValue};
use crate::header::{shown, HeaderKind};

pub(crate) const IPV4_HEADER_LEN: usize = 20;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Ipv4 {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: IpProtocol,
    pub tos: u8,
    pub ttl: u8,
    pub ipid: u16,
}

impl Default for Ipv4 {
    fn default() -> Self {
        Self {
            src: Ipv4Addr::UNSPECIFIED,
            dst: Ipv4Addr::UNSPECIFIED,
            protocol: IpProtocol::default(),
            tos: 0,
            ttl: 0,
            ipid: 0,
        }
    }
}

impl Ipv4 {
    pub fn new(src: Ipv4Addr, dst: Ipv4Addr, protocol: IpProtocol) -> Self {
        Self {
            src,
            dst,
            protocol,
            ..Self::default()
        }
    }

    pub(crate) fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("src", Some("nw_src"), self.src),
            Field::new("dst", Some("nw_dst"), self.dst),
            Field::new("protocol", Some("nw_proto"), self.protocol),
            Field::new("tos", Some("nw_tos"), self.tos),
            Field::new("ttl", None, self.ttl),
            Field::new("ipid", None, self.ipid),
        ]
    }

    pub(crate) fn set(&mut self, attribute: &str, value: FieldValue) -> Result<(), PacketError> {
        const KIND: HeaderKind = HeaderKind::Ipv4;
        match attribute {
            "src" => self.src = expect_ip(KIND, attribute, value)?,
            "dst" => self.dst = expect_ip(KIND, attribute, value)?,
            "protocol" => self.protocol = IpProtocol(expect_int(KIND, attribute, value)?),
            "tos" => self.tos = expect_int(KIND, attribute, value)?,
            "ttl" => self.ttl = expect_int(KIND, attribute, value)?,
            "ipid" => self.ipid = expect_int(KIND, attribute, value)?,
            _ => return Err(KIND.unknown_attribute(attribute)),
        }
        Ok(())
    }

    pub(crate) fn write(&self, buf: &mut BytesMut, payload: &[u8]) {
        let total_len = (IPV4_HEADER_LEN + payload.len()).min(usize::from(u16::MAX)) as u16;
        let mut header = BytesMut::with_capacity(IPV4_HEADER_LEN);
        header.put_u8(0x45);
        header.put_u8(self.tos);
        header.put_u16(total_len);
        header.put_u16(self.ipid);
        header.put_u16(0);
        header.put_u8(self.ttl);
        header.put_u8(self.protocol.0);
        header.put_u16(0);
        header.put_slice(&self.src.octets());
        header.put_slice(&self.dst.octets());
        let checksum = internet_checksum(&[&header]);
        header[10..12].copy_from_slice(&checksum.to_be_bytes());
        buf.put_slice(&header);
    }

    pub(crate) fn render(&self, masked: &dyn Fn(&str) -> bool) -> String {
        format!(
            "IPv4 {}->{} {}",
            shown(self.src, "nw_src", masked),
            shown(self.dst, "nw_dst", masked),
            shown(self.protocol, "nw_proto", masked)
        )
    }
}

/// RFC 1071 ones-complement sum over the concatenation of `chunks`.
pub(crate) fn internet_checksum(chunks: &[&[u8]]) -> u16 {
    let mut sum: u32 = 0;
    let mut odd: Option<u8> = None;
    for byte in chunks.iter().flat_map(|c| c.iter().copied()) {
        match odd.take() {
            Some(hi) => sum += u32::from(u16::from_be_bytes([hi, byte])),
            None => odd = Some(byte),
        }
    }
    if let Some(hi) = odd {
        sum += u32::from(u16::from_be_bytes([hi, 0]));
    }
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_of_known_header() {
        // Example header from RFC 1071 discussions, checksum field zeroed.
        let header = [
            0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00, 0xc0, 0xa8,
            0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
        ];
        assert_eq!(internet_checksum(&[&header]), 0xb861);
    }

    #[test]
    fn written_header_verifies() {
        let ip = Ipv4::new(
            "192.168.1.1".parse().unwrap(),
            "192.168.1.2".parse().unwrap(),
            IpProtocol::UDP,
        );
        let mut buf = BytesMut::new();
        ip.write(&mut buf, &[0u8; 8]);
        assert_eq!(buf.len(), IPV4_HEADER_LEN);
        assert_eq!(&buf[2..4], &[0x00, 28]);
        assert_eq!(internet_checksum(&[&buf]), 0);
    }
}
