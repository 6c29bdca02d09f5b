//! # wirecheck Packet Model
//!
//! Header-stack packets used by scenarios and candidates alike.
//!
//! ### Key Types:
//! - `Packet`: ordered stack of `Header` layers with named-field lookup
//!   (`dl_src`, `nw_dst`, `tp_src`, ...) and wire serialization
//! - `Header` / `HeaderKind`: Ethernet, Null, ARP, IPv4, UDP, TCP, ICMP, Raw
//! - `FieldValue`: typed value of a single header field

pub mod address;
pub mod arp;
pub mod error;
pub mod ethernet;
pub mod field;
pub mod header;
pub mod ipv4;
pub mod packet;
pub mod raw;
pub mod transport;

pub use address::{EtherType, IpProtocol, MacAddr};
pub use arp::{create_ip_arp_reply, create_ip_arp_request, Arp, ARP_REPLY, ARP_REQUEST};
pub use error::PacketError;
pub use ethernet::{Ethernet, Null};
pub use field::{is_named_field, Field, FieldValue, NAMED_FIELDS};
pub use header::{Header, HeaderKind};
pub use ipv4::Ipv4;
pub use packet::Packet;
pub use raw::Raw;
pub use transport::{Icmp, Tcp, Udp};
