//! ## wirecheck-protocols::transport
//! UDP, TCP and ICMP headers. Transport checksums other than ICMP's are left
//! zero; nothing downstream validates them.

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::PacketError;
use crate::field::{expect_int, Field, FieldValue};
use crate::header::{shown, HeaderKind};
use crate::ipv4::internet_checksum;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Udp {
    pub src_port: u16,
    pub dst_port: u16,
}

impl Udp {
    pub fn new(src_port: u16, dst_port: u16) -> Self {
        Self { src_port, dst_port }
    }

    pub(crate) fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("src_port", Some("tp_src"), self.src_port),
            Field::new("dst_port", Some("tp_dst"), self.dst_port),
        ]
    }

    pub(crate) fn set(&mut self, attribute: &str, value: FieldValue) -> Result<(), PacketError> {
        const KIND: HeaderKind = HeaderKind::Udp;
        match attribute {
            "src_port" => self.src_port = expect_int(KIND, attribute, value)?,
            "dst_port" => self.dst_port = expect_int(KIND, attribute, value)?,
            _ => return Err(KIND.unknown_attribute(attribute)),
        }
        Ok(())
    }

    pub(crate) fn write(&self, buf: &mut BytesMut, payload: &[u8]) {
        buf.put_u16(self.src_port);
        buf.put_u16(self.dst_port);
        buf.put_u16((8 + payload.len()).min(usize::from(u16::MAX)) as u16);
        buf.put_u16(0);
    }

    pub(crate) fn render(&self, masked: &dyn Fn(&str) -> bool) -> String {
        format!(
            "UDP {}->{}",
            shown(self.src_port, "tp_src", masked),
            shown(self.dst_port, "tp_dst", masked)
        )
    }
}

pub const TCP_FIN: u8 = 0x01;
pub const TCP_SYN: u8 = 0x02;
pub const TCP_RST: u8 = 0x04;
pub const TCP_PSH: u8 = 0x08;
pub const TCP_ACK: u8 = 0x10;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Tcp {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ack: u32,
    pub flags: u8,
    pub window: u16,
}

impl Default for Tcp {
    fn default() -> Self {
        Self {
            src_port: 0,
            dst_port: 0,
            seq: 0,
            ack: 0,
            flags: 0,
            window: 0xffff,
        }
    }
}

impl Tcp {
    pub(crate) fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("src_port", Some("tp_src"), self.src_port),
            Field::new("dst_port", Some("tp_dst"), self.dst_port),
            Field::new("seq", None, u64::from(self.seq)),
            Field::new("ack", None, u64::from(self.ack)),
            Field::new("flags", None, self.flags),
            Field::new("window", None, self.window),
        ]
    }

    pub(crate) fn set(&mut self, attribute: &str, value: FieldValue) -> Result<(), PacketError> {
        const KIND: HeaderKind = HeaderKind::Tcp;
        match attribute {
            "src_port" => self.src_port = expect_int(KIND, attribute, value)?,
            "dst_port" => self.dst_port = expect_int(KIND, attribute, value)?,
            "seq" => self.seq = expect_int(KIND, attribute, value)?,
            "ack" => self.ack = expect_int(KIND, attribute, value)?,
            "flags" => self.flags = expect_int(KIND, attribute, value)?,
            "window" => self.window = expect_int(KIND, attribute, value)?,
            _ => return Err(KIND.unknown_attribute(attribute)),
        }
        Ok(())
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u16(self.src_port);
        buf.put_u16(self.dst_port);
        buf.put_u32(self.seq);
        buf.put_u32(self.ack);
        buf.put_u8(5 << 4);
        buf.put_u8(self.flags);
        buf.put_u16(self.window);
        buf.put_u16(0);
        buf.put_u16(0);
    }

    fn flag_string(&self) -> String {
        const NAMES: [(u8, char); 5] = [
            (TCP_SYN, 'S'),
            (TCP_ACK, 'A'),
            (TCP_FIN, 'F'),
            (TCP_RST, 'R'),
            (TCP_PSH, 'P'),
        ];
        let flags: String = NAMES
            .iter()
            .filter(|(bit, _)| self.flags & bit != 0)
            .map(|(_, c)| *c)
            .collect();
        if flags.is_empty() {
            "-".to_string()
        } else {
            flags
        }
    }

    pub(crate) fn render(&self, masked: &dyn Fn(&str) -> bool) -> String {
        format!(
            "TCP {}->{} {}",
            shown(self.src_port, "tp_src", masked),
            shown(self.dst_port, "tp_dst", masked),
            self.flag_string()
        )
    }
}

pub const ICMP_ECHO_REPLY: u8 = 0;
pub const ICMP_DEST_UNREACHABLE: u8 = 3;
pub const ICMP_ECHO_REQUEST: u8 = 8;
pub const ICMP_TIME_EXCEEDED: u8 = 11;

/// ICMP header. `icmp_type`/`icmp_code` answer to `tp_src`/`tp_dst`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Icmp {
    pub icmp_type: u8,
    pub icmp_code: u8,
    pub identifier: u16,
    pub sequence: u16,
}

impl Default for Icmp {
    fn default() -> Self {
        Self {
            icmp_type: ICMP_ECHO_REQUEST,
            icmp_code: 0,
            identifier: 0,
            sequence: 0,
        }
    }
}

impl Icmp {
    pub(crate) fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("icmp_type", Some("tp_src"), self.icmp_type),
            Field::new("icmp_code", Some("tp_dst"), self.icmp_code),
            Field::new("identifier", None, self.identifier),
            Field::new("sequence", None, self.sequence),
        ]
    }

    pub(crate) fn set(&mut self, attribute: &str, value: FieldValue) -> Result<(), PacketError> {
        const KIND: HeaderKind = HeaderKind::Icmp;
        match attribute {
            "icmp_type" => self.icmp_type = expect_int(KIND, attribute, value)?,
            "icmp_code" => self.icmp_code = expect_int(KIND, attribute, value)?,
            "identifier" => self.identifier = expect_int(KIND, attribute, value)?,
            "sequence" => self.sequence = expect_int(KIND, attribute, value)?,
            _ => return Err(KIND.unknown_attribute(attribute)),
        }
        Ok(())
    }

    pub(crate) fn write(&self, buf: &mut BytesMut, payload: &[u8]) {
        let mut header = [0u8; 8];
        header[0] = self.icmp_type;
        header[1] = self.icmp_code;
        header[4..6].copy_from_slice(&self.identifier.to_be_bytes());
        header[6..8].copy_from_slice(&self.sequence.to_be_bytes());
        let checksum = internet_checksum(&[&header, payload]);
        header[2..4].copy_from_slice(&checksum.to_be_bytes());
        buf.put_slice(&header);
    }

    pub(crate) fn render(&self, masked: &dyn Fn(&str) -> bool) -> String {
        let name = match (self.icmp_type, masked("tp_src")) {
            (_, true) => "*".to_string(),
            (ICMP_ECHO_REQUEST, _) => "EchoRequest".to_string(),
            (ICMP_ECHO_REPLY, _) => "EchoReply".to_string(),
            (ICMP_DEST_UNREACHABLE, _) => "DestinationUnreachable".to_string(),
            (ICMP_TIME_EXCEEDED, _) => "TimeExceeded".to_string(),
            (other, _) => format!("type {}", other),
        };
        format!(
            "ICMP {}:{} {}/{}",
            name,
            shown(self.icmp_code, "tp_dst", masked),
            self.identifier,
            self.sequence
        )
    }
}
