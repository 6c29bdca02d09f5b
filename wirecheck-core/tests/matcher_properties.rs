//! Property-based tests for the packet matcher.
//!
//! - Exact matching is reflexive and sensitive to every field
//! - Relaxed matching ignores exactly the wildcarded named fields

use std::net::Ipv4Addr;

use proptest::prelude::*;
use wirecheck_core::matcher::Matcher;
use wirecheck_protocols::{EtherType, Ethernet, FieldValue, HeaderKind, IpProtocol, Ipv4, MacAddr, Packet, Raw, Udp};

// Mutable fields: (header, attribute, named alias)
const FIELDS: &[(HeaderKind, &str, Option<&str>)] = &[
    (HeaderKind::Ethernet, "src", Some("dl_src")),
    (HeaderKind::Ethernet, "dst", Some("dl_dst")),
    (HeaderKind::Ipv4, "src", Some("nw_src")),
    (HeaderKind::Ipv4, "dst", Some("nw_dst")),
    (HeaderKind::Ipv4, "ttl", None),
    (HeaderKind::Udp, "src_port", Some("tp_src")),
    (HeaderKind::Udp, "dst_port", Some("tp_dst")),
    (HeaderKind::Raw, "data", None),
];

fn packet_strategy() -> impl Strategy<Value = Packet> {
    (
        any::<[u8; 6]>(),
        any::<[u8; 6]>(),
        any::<u32>(),
        any::<u32>(),
        any::<u8>(),
        any::<u16>(),
        any::<u16>(),
        proptest::collection::vec(any::<u8>(), 0..64),
    )
        .prop_map(|(src_mac, dst_mac, src_ip, dst_ip, ttl, sport, dport, payload)| {
            Packet::new()
                + Ethernet::new(MacAddr::new(src_mac), MacAddr::new(dst_mac), EtherType::IPV4)
                + Ipv4 {
                    ttl,
                    ..Ipv4::new(Ipv4Addr::from(src_ip), Ipv4Addr::from(dst_ip), IpProtocol::UDP)
                }
                + Udp::new(sport, dport)
                + Raw::new(payload)
        })
}

fn bumped(value: FieldValue) -> FieldValue {
    match value {
        FieldValue::Mac(mac) => {
            let mut octets = mac.octets();
            octets[5] ^= 1;
            FieldValue::Mac(MacAddr::new(octets))
        }
        FieldValue::Ip(ip) => FieldValue::Ip(Ipv4Addr::from(u32::from(ip) ^ 1)),
        FieldValue::Int(n) => FieldValue::Int(n ^ 1),
        FieldValue::Bytes(mut bytes) => {
            bytes.push(0x2a);
            FieldValue::Bytes(bytes)
        }
        other => other,
    }
}

fn mutate(pkt: &Packet, field: usize) -> Packet {
    let (kind, attribute, _) = FIELDS[field];
    let mut copy = pkt.clone();
    let value = copy.get(kind, attribute).unwrap();
    copy.set(kind, attribute, bumped(value)).unwrap();
    copy
}

#[test]
fn prop_exact_match_is_reflexive() {
    proptest!(|(pkt in packet_strategy())| {
        let matcher = Matcher::exact(pkt.clone());
        prop_assert!(matcher.is_match(&pkt));
        prop_assert!(matcher.explain(&pkt).is_none());
    });
}

#[test]
fn prop_exact_match_detects_any_mutation() {
    proptest!(|(pkt in packet_strategy(), field in 0..FIELDS.len())| {
        let matcher = Matcher::exact(pkt.clone());
        let changed = mutate(&pkt, field);
        prop_assert!(!matcher.is_match(&changed));
        let diagnostic = matcher.explain(&changed).unwrap();
        let expected_header = format!("In the {} header", FIELDS[field].0);
        prop_assert!(diagnostic.starts_with(&expected_header), "{}", diagnostic);
    });
}

#[test]
fn prop_relaxed_ignores_only_wildcarded_fields() {
    proptest!(|(pkt in packet_strategy(), wildcard_mask in any::<u8>(), field in 0..FIELDS.len())| {
        let wildcards: Vec<&str> = FIELDS
            .iter()
            .enumerate()
            .filter(|(i, _)| wildcard_mask & (1 << i) != 0)
            .filter_map(|(_, (_, _, alias))| *alias)
            .collect();
        let matcher = Matcher::relaxed(pkt.clone()).wildcard(&wildcards).unwrap();
        prop_assert!(matcher.is_match(&pkt));

        let changed = mutate(&pkt, field);
        let masked = FIELDS[field].2.is_some_and(|alias| wildcards.contains(&alias));
        prop_assert_eq!(matcher.is_match(&changed), masked);
    });
}

#[test]
fn prop_empty_relaxed_matcher_is_full_equality() {
    proptest!(|(pkt in packet_strategy(), field in 0..FIELDS.len())| {
        let exact = Matcher::exact(pkt.clone());
        let relaxed = Matcher::relaxed(pkt.clone());
        let changed = mutate(&pkt, field);
        prop_assert_eq!(exact.is_match(&changed), relaxed.is_match(&changed));
    });
}
