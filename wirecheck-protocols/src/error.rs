use thiserror::Error;

use crate::field::FieldValue;
use crate::header::HeaderKind;

/// Errors raised by packet construction and field access.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum PacketError {
    #[error("no header in this packet has a field named '{0}'")]
    UnknownField(String),
    #[error("packet has no {0} header")]
    MissingHeader(HeaderKind),
    #[error("{header} header has no attribute '{attribute}'")]
    UnknownAttribute {
        header: HeaderKind,
        attribute: String,
    },
    #[error("{header}.{attribute} expects {expected}, got {got}")]
    FieldType {
        header: HeaderKind,
        attribute: String,
        expected: &'static str,
        got: FieldValue,
    },
    #[error("invalid hardware address '{0}'")]
    InvalidMac(String),
    #[error("invalid ethertype '{0}'")]
    InvalidEtherType(String),
    #[error("invalid IP protocol '{0}'")]
    InvalidProtocol(String),
    #[error("unknown header type '{0}'")]
    UnknownHeaderKind(String),
    #[error("cannot read {expected} from '{text}'")]
    InvalidValue { expected: &'static str, text: String },
}
