//! Candidate-side handle. Every call is a request/reply round trip to the
//! supervisor task; the candidate never touches scenario state directly.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use wirecheck_core::scenario::Interface;
use wirecheck_protocols::Packet;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProxyError {
    /// Nothing arrived before the receive timed out.
    #[error("no packets available")]
    NoPackets,

    /// The run is over; no further calls are answered.
    #[error("the test run has ended")]
    Shutdown,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReceivedPacket {
    /// Time since the run started.
    pub timestamp: Duration,
    pub interface: String,
    pub packet: Packet,
}

pub(crate) type Reply = Result<Option<ReceivedPacket>, ProxyError>;

#[derive(Debug)]
pub(crate) enum Call {
    Receive,
    Send { interface: String, packet: Packet },
    Stop,
}

#[derive(Debug)]
pub(crate) struct Request {
    pub(crate) call: Call,
    pub(crate) reply: oneshot::Sender<Reply>,
}

pub struct NetworkProxy {
    requests: mpsc::Sender<Request>,
    interfaces: Vec<Interface>,
}

impl NetworkProxy {
    pub(crate) fn new(requests: mpsc::Sender<Request>, interfaces: Vec<Interface>) -> Self {
        Self { requests, interfaces }
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    /// Blocks until the harness delivers a packet, or fails with
    /// `NoPackets` once a quiet period has elapsed.
    pub fn receive(&mut self) -> Result<ReceivedPacket, ProxyError> {
        self.call(Call::Receive)?.ok_or(ProxyError::NoPackets)
    }

    pub fn send(&mut self, interface: &str, packet: Packet) -> Result<(), ProxyError> {
        self.call(Call::Send {
            interface: interface.to_string(),
            packet,
        })
        .map(|_| ())
    }

    /// Ends the run. Events still pending stay pending.
    pub fn request_stop(&mut self) -> Result<(), ProxyError> {
        self.call(Call::Stop).map(|_| ())
    }

    fn call(&self, call: Call) -> Reply {
        let (reply, response) = oneshot::channel();
        self.requests
            .blocking_send(Request { call, reply })
            .map_err(|_| ProxyError::Shutdown)?;
        response.blocking_recv().map_err(|_| ProxyError::Shutdown)?
    }
}
