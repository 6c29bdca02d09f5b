//! ## wirecheck-protocols::ethernet
//! Link-layer framing: Ethernet II and the BSD loopback ("Null") header.

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::address::{EtherType, MacAddr};
use crate::error::PacketError;
use crate::field::{expect_int, expect_mac, Field, FieldValue};
use crate::header::{shown, HeaderKind};

/// Ethernet II header.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Ethernet {
    pub src: MacAddr,
    pub dst: MacAddr,
    pub ethertype: EtherType,
}

impl Ethernet {
    pub fn new(src: MacAddr, dst: MacAddr, ethertype: EtherType) -> Self {
        Self { src, dst, ethertype }
    }

    pub(crate) fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("src", Some("dl_src"), self.src),
            Field::new("dst", Some("dl_dst"), self.dst),
            Field::new("ethertype", Some("dl_type"), self.ethertype),
        ]
    }

    pub(crate) fn set(&mut self, attribute: &str, value: FieldValue) -> Result<(), PacketError> {
        const KIND: HeaderKind = HeaderKind::Ethernet;
        match attribute {
            "src" => self.src = expect_mac(KIND, attribute, value)?,
            "dst" => self.dst = expect_mac(KIND, attribute, value)?,
            "ethertype" => self.ethertype = EtherType(expect_int(KIND, attribute, value)?),
            _ => return Err(KIND.unknown_attribute(attribute)),
        }
        Ok(())
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.dst.octets());
        buf.put_slice(&self.src.octets());
        buf.put_u16(self.ethertype.0);
    }

    pub(crate) fn render(&self, masked: &dyn Fn(&str) -> bool) -> String {
        format!(
            "Ethernet {}->{} {}",
            shown(self.src, "dl_src", masked),
            shown(self.dst, "dl_dst", masked),
            shown(self.ethertype, "dl_type", masked)
        )
    }
}

/// Address family written by BSD loopback devices.
pub const AF_INET: u32 = 2;

/// BSD loopback ("Null") link header: a host-order address family word.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Null {
    pub af: u32,
}

impl Default for Null {
    fn default() -> Self {
        Self { af: AF_INET }
    }
}

impl Null {
    pub(crate) fn fields(&self) -> Vec<Field> {
        vec![Field::new("af", None, u64::from(self.af))]
    }

    pub(crate) fn set(&mut self, attribute: &str, value: FieldValue) -> Result<(), PacketError> {
        match attribute {
            "af" => self.af = expect_int(HeaderKind::Null, attribute, value)?,
            _ => return Err(HeaderKind::Null.unknown_attribute(attribute)),
        }
        Ok(())
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.af);
    }

    pub(crate) fn render(&self) -> String {
        if self.af == AF_INET {
            "Null: AF_INET".to_string()
        } else {
            format!("Null: af {}", self.af)
        }
    }
}
