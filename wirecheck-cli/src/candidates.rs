//! Reference candidates shipped with the CLI, handy for checking a scenario
//! file before pointing real code at it.

use std::net::Ipv4Addr;

use anyhow::{bail, Context};
use clap::ValueEnum;
use rand::Rng;
use tracing::debug;

use wirecheck_core::scenario::InterfaceType;
use wirecheck_engine::{Candidate, NetworkProxy, ProxyError};
use wirecheck_protocols::{
    create_ip_arp_reply, FieldValue, Header, HeaderKind, IpProtocol, Ipv4, Null, Packet, Raw, Udp, ARP_REQUEST,
};

pub const ECHO_PORT: u16 = 10000;
pub const PING_PAYLOAD: &[u8] = b"Hello stack";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BuiltinCandidate {
    /// Returns immediately.
    Idle,
    /// Answers ARP requests for its own addresses and repeats the last
    /// answer once after a quiet period.
    ArpResponder,
    /// Sends a UDP datagram to the loopback echo port and checks the reply.
    UdpPing,
}

impl Candidate for BuiltinCandidate {
    fn run(self, proxy: &mut NetworkProxy) -> anyhow::Result<()> {
        match self {
            BuiltinCandidate::Idle => Ok(()),
            BuiltinCandidate::ArpResponder => arp_responder(proxy),
            BuiltinCandidate::UdpPing => udp_ping(proxy),
        }
    }
}

fn arp_reply_for(proxy: &NetworkProxy, interface: &str, request: &Packet) -> Option<Packet> {
    let Some(Header::Arp(arp)) = request.header(HeaderKind::Arp) else {
        return None;
    };
    if arp.operation != ARP_REQUEST {
        return None;
    }
    let iface = proxy.interface(interface)?;
    if iface.ipaddr() != arp.target_protoaddr {
        return None;
    }
    Some(create_ip_arp_reply(
        iface.hwaddr,
        arp.sender_hwaddr,
        iface.ipaddr(),
        arp.sender_protoaddr,
    ))
}

fn arp_responder(proxy: &mut NetworkProxy) -> anyhow::Result<()> {
    let mut last: Option<(String, Packet)> = None;
    loop {
        match proxy.receive() {
            Ok(received) => {
                if let Some(reply) = arp_reply_for(proxy, &received.interface, &received.packet) {
                    debug!(interface = %received.interface, "answering ARP request");
                    proxy.send(&received.interface, reply.clone())?;
                    last = Some((received.interface, reply));
                }
            }
            Err(ProxyError::NoPackets) => {
                if let Some((interface, reply)) = last.take() {
                    proxy.send(&interface, reply)?;
                    proxy.request_stop()?;
                    return Ok(());
                }
            }
            Err(ProxyError::Shutdown) => return Ok(()),
        }
    }
}

fn udp_ping(proxy: &mut NetworkProxy) -> anyhow::Result<()> {
    let iface = proxy
        .interfaces()
        .iter()
        .find(|i| i.kind == InterfaceType::Loopback)
        .cloned()
        .context("scenario has no loopback interface")?;
    let port: u16 = rand::rng().random_range(1024..60000);
    proxy.send(&iface.name, datagram(iface.ipaddr(), port, ECHO_PORT))?;

    let reply = proxy.receive()?;
    let dst_port = reply.packet.get(HeaderKind::Udp, "dst_port")?;
    if dst_port != FieldValue::Int(u64::from(port)) {
        bail!("echo reply went to port {} instead of {}", dst_port, port);
    }
    proxy.request_stop()?;
    Ok(())
}

pub fn datagram(addr: Ipv4Addr, src_port: u16, dst_port: u16) -> Packet {
    Packet::new()
        + Null::default()
        + Ipv4::new(addr, addr, IpProtocol::UDP)
        + Udp::new(src_port, dst_port)
        + Raw::new(PING_PAYLOAD)
}
