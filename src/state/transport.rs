//! Transport adapters.
//!
//! The session machine never touches a radio or a socket directly. It drives
//! three non-blocking primitives:
//!
//! - [`WifiLink`] - station association
//! - [`DatagramSocket`] - broadcast probes and replies for discovery
//! - [`MessageStream`] - the persistent duplex text stream to the server
//!
//! None of these may block. A call that cannot complete immediately returns
//! and is polled again on the next tick.

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use serde::Deserialize;

/// Resolved address of the game server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct ServerEndpoint {
    pub addr: IpAddr,
    pub port: u16,
}

impl ServerEndpoint {
    pub fn new(addr: IpAddr, port: u16) -> Self {
        Self { addr, port }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

/// Event reported by a [`MessageStream`] when polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The stream (re)established its connection
    Connected,

    /// The connection dropped; the adapter keeps retrying while open
    Disconnected,

    /// A text frame arrived
    Text(String),

    /// A binary frame arrived (not part of the protocol)
    Binary(Vec<u8>),

    /// The adapter hit an error it recovered from
    Error(String),
}

/// Failure reported by a transport adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Could not bind a local port
    Bind { port: u16, reason: String },

    /// Could not hand data to the network stack
    Send(String),

    /// Could not read from the network stack
    Receive(String),

    /// Operation needs an open stream or socket
    NotOpen,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind { port, reason } => write!(f, "Failed to bind port {}: {}", port, reason),
            Self::Send(reason) => write!(f, "Send failed: {}", reason),
            Self::Receive(reason) => write!(f, "Receive failed: {}", reason),
            Self::NotOpen => write!(f, "Transport is not open"),
        }
    }
}

impl std::error::Error for TransportError {}

/// WiFi station association.
pub trait WifiLink {
    /// Start (or restart) associating with the access point.
    fn begin(&mut self, ssid: &str, password: &str);

    /// Check if the station is associated and has an address.
    fn is_connected(&self) -> bool;
}

/// Datagram primitive used for discovery.
pub trait DatagramSocket {
    /// Open a listener on the given local port.
    fn bind(&mut self, port: u16) -> Result<(), TransportError>;

    /// Send a datagram to the broadcast address on the given port.
    fn broadcast(&mut self, port: u16, data: &[u8]) -> Result<(), TransportError>;

    /// Receive one pending datagram, if any, with its sender address.
    fn poll_recv(&mut self, buf: &mut [u8]) -> Result<Option<(usize, IpAddr)>, TransportError>;

    /// Close the listener. Closing a closed socket is a no-op.
    fn close(&mut self);
}

/// Persistent duplex text stream to the game server.
///
/// Once opened, the adapter reconnects by itself every `reconnect_interval`
/// after a drop until [`MessageStream::close`] is called.
pub trait MessageStream {
    /// Start connecting to `endpoint` at `path`.
    fn open(&mut self, endpoint: &ServerEndpoint, path: &str, reconnect_interval: Duration);

    /// Take the next pending event, if any.
    fn poll(&mut self) -> Option<StreamEvent>;

    /// Send one text frame.
    fn send_text(&mut self, text: &str) -> Result<(), TransportError>;

    /// Tear the stream down and stop reconnecting.
    fn close(&mut self);
}

/// [`DatagramSocket`] over a non-blocking `std::net::UdpSocket`.
#[derive(Debug, Default)]
pub struct UdpDatagram {
    socket: Option<UdpSocket>,
}

impl UdpDatagram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local address of the listener, if bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    fn open_socket(port: u16) -> io::Result<UdpSocket> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))?;
        socket.set_broadcast(true)?;
        socket.set_nonblocking(true)?;
        Ok(socket)
    }
}

impl DatagramSocket for UdpDatagram {
    fn bind(&mut self, port: u16) -> Result<(), TransportError> {
        let socket = Self::open_socket(port).map_err(|e| TransportError::Bind {
            port,
            reason: e.to_string(),
        })?;
        self.socket = Some(socket);
        Ok(())
    }

    fn broadcast(&mut self, port: u16, data: &[u8]) -> Result<(), TransportError> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotOpen)?;
        socket
            .send_to(data, (Ipv4Addr::BROADCAST, port))
            .map(|_| ())
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    fn poll_recv(&mut self, buf: &mut [u8]) -> Result<Option<(usize, IpAddr)>, TransportError> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotOpen)?;
        match socket.recv_from(buf) {
            Ok((len, from)) => Ok(Some((len, from.ip()))),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(TransportError::Receive(e.to_string())),
        }
    }

    fn close(&mut self) {
        self.socket = None;
    }
}
