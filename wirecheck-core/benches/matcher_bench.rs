#[macro_use]
extern crate criterion;

use criterion::{black_box, Criterion};

use wirecheck_core::matcher::Matcher;
use wirecheck_core::predicate::Predicate;
use wirecheck_protocols::{IpProtocol, Ipv4, Null, Packet, Raw, Udp};

fn udp(src_port: u16) -> Packet {
    Packet::new()
        + Null::default()
        + Ipv4::new(
            "127.0.0.1".parse().unwrap(),
            "127.0.0.1".parse().unwrap(),
            IpProtocol::UDP,
        )
        + Udp::new(src_port, 4444)
        + Raw::from(b"Hello stack")
}

fn bench_matchers(c: &mut Criterion) {
    let mut group = c.benchmark_group("matcher");
    let actual = udp(40000);

    let exact = Matcher::exact(udp(40000));
    group.bench_function("exact", |b| b.iter(|| exact.is_match(black_box(&actual))));

    let relaxed = Matcher::relaxed(udp(65535)).wildcard(["tp_src"]).unwrap();
    group.bench_function("relaxed_wildcard", |b| {
        b.iter(|| relaxed.is_match(black_box(&actual)))
    });

    let predicated = Matcher::relaxed(udp(65535))
        .wildcard(["tp_src"])
        .unwrap()
        .predicate(Predicate::parse("|pkt| pkt.tp_src >= 1024 && has(udp)").unwrap());
    group.bench_function("relaxed_predicate", |b| {
        b.iter(|| predicated.is_match(black_box(&actual)))
    });

    let mismatch = udp(1);
    group.bench_function("exact_explain_mismatch", |b| {
        b.iter(|| exact.explain(black_box(&mismatch)))
    });
    group.finish();
}

fn bench_predicate_parse(c: &mut Criterion) {
    c.bench_function("predicate_parse", |b| {
        b.iter(|| {
            Predicate::parse(black_box(
                "|pkt| pkt.dl_src == 00:00:00:00:00:00 && (pkt.ipv4.ttl == 0 || !has(arp))",
            ))
        })
    });
}

criterion_group!(benches, bench_matchers, bench_predicate_parse);
criterion_main!(benches);
