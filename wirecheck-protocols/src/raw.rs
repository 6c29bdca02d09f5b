//! ## wirecheck-protocols::raw
//! Opaque trailing payload.

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::PacketError;
use crate::field::{type_error, Field, FieldValue};
use crate::header::HeaderKind;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Raw {
    #[serde(with = "payload")]
    pub data: Vec<u8>,
}

impl Raw {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    pub(crate) fn fields(&self) -> Vec<Field> {
        vec![Field::new("data", None, FieldValue::Bytes(self.data.clone()))]
    }

    pub(crate) fn set(&mut self, attribute: &str, value: FieldValue) -> Result<(), PacketError> {
        match (attribute, value) {
            ("data", FieldValue::Bytes(data)) => self.data = data,
            ("data", other) => return Err(type_error(HeaderKind::Raw, attribute, "a byte string", &other)),
            _ => return Err(HeaderKind::Raw.unknown_attribute(attribute)),
        }
        Ok(())
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.data);
    }

    pub(crate) fn render(&self) -> String {
        format!("Raw {} bytes", self.data.len())
    }
}

impl From<&[u8]> for Raw {
    fn from(data: &[u8]) -> Self {
        Self::new(data)
    }
}

impl<const N: usize> From<&[u8; N]> for Raw {
    fn from(data: &[u8; N]) -> Self {
        Self::new(&data[..])
    }
}

/// Payloads are written as plain text when they are UTF-8 and as
/// `hex:<digits>` otherwise, which keeps scenario files readable.
mod payload {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(data) {
            Ok(text) if !text.starts_with("hex:") => serializer.serialize_str(text),
            _ => serializer.serialize_str(&format!("hex:{}", hex::encode(data))),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        match text.strip_prefix("hex:") {
            Some(digits) => hex::decode(digits).map_err(serde::de::Error::custom),
            None => Ok(text.into_bytes()),
        }
    }
}
