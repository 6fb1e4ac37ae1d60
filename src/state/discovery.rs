//! Server discovery over datagram broadcast.
//!
//! The terminal broadcasts a probe token on the discovery port. The server
//! answers with the response prefix followed by its stream port, e.g.
//! `MURDERHOUSE_SERVER:8080`. The answer's sender address becomes the
//! server address.

use std::net::IpAddr;
use std::time::Instant;

use log::{debug, info, warn};

use super::transport::{DatagramSocket, ServerEndpoint, TransportError};
use crate::config::DiscoveryConfig;

/// Largest reply read from the socket; longer datagrams are truncated.
const MAX_REPLY_LEN: usize = 64;

/// One discovery attempt.
///
/// Lives from [`Discovery::begin`] until it resolves or is abandoned. The
/// listener is closed on resolution so no stale reply can reach a later
/// attempt.
#[derive(Debug, Clone)]
pub struct Discovery {
    config: DiscoveryConfig,
    default_port: u16,
    last_broadcast: Option<Instant>,
    listening: bool,
}

impl Discovery {
    pub fn new(config: DiscoveryConfig, default_port: u16) -> Self {
        Self {
            config,
            default_port,
            last_broadcast: None,
            listening: false,
        }
    }

    /// Check if the listener is open.
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Open the listener. The first tick broadcasts immediately.
    pub fn begin<D: DatagramSocket>(&mut self, socket: &mut D) -> Result<(), TransportError> {
        socket.bind(self.config.port)?;
        self.listening = true;
        self.last_broadcast = None;
        info!("discovery: listening on port {}", self.config.port);
        Ok(())
    }

    /// Broadcast when due, then check for one reply.
    ///
    /// Returns the endpoint once a valid reply arrives. Anything else keeps
    /// discovery waiting.
    pub fn tick<D: DatagramSocket>(
        &mut self,
        now: Instant,
        socket: &mut D,
    ) -> Option<ServerEndpoint> {
        if !self.listening {
            return None;
        }

        let due = self
            .last_broadcast
            .map_or(true, |last| now.duration_since(last) >= self.config.interval());
        if due {
            debug!("discovery: broadcasting probe");
            if let Err(e) = socket.broadcast(self.config.port, self.config.probe.as_bytes()) {
                warn!("discovery: probe failed: {}", e);
            }
            self.last_broadcast = Some(now);
        }

        let mut buf = [0u8; MAX_REPLY_LEN];
        let (len, from) = match socket.poll_recv(&mut buf) {
            Ok(Some(packet)) => packet,
            Ok(None) => return None,
            Err(e) => {
                warn!("discovery: receive failed: {}", e);
                return None;
            }
        };

        let Some(endpoint) = self.parse_reply(&buf[..len], from) else {
            debug!("discovery: ignoring datagram from {}", from);
            return None;
        };

        info!("discovery: server found at {}", endpoint);
        self.stop(socket);
        Some(endpoint)
    }

    /// Close the listener. Safe to call when already closed.
    pub fn stop<D: DatagramSocket>(&mut self, socket: &mut D) {
        if self.listening {
            socket.close();
            self.listening = false;
        }
    }

    /// Parse a reply: prefix, then the decimal port.
    ///
    /// A missing, unparsable or zero port falls back to the default port.
    pub fn parse_reply(&self, data: &[u8], from: IpAddr) -> Option<ServerEndpoint> {
        let rest = data.strip_prefix(self.config.response_prefix.as_bytes())?;
        let port = leading_port(rest)
            .filter(|&p| p != 0)
            .unwrap_or(self.default_port);
        Some(ServerEndpoint::new(from, port))
    }
}

/// Read the decimal digits at the start of `data` as a port.
fn leading_port(data: &[u8]) -> Option<u16> {
    let digits = data.iter().take_while(|b| b.is_ascii_digit()).count();
    std::str::from_utf8(&data[..digits]).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::transport::mock::MockDatagram;
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    const SERVER: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 50));

    fn discovery() -> Discovery {
        Discovery::new(DiscoveryConfig::default(), 8080)
    }

    #[test]
    fn test_parse_reply() {
        let d = discovery();
        assert_eq!(
            d.parse_reply(b"MURDERHOUSE_SERVER:9001", SERVER),
            Some(ServerEndpoint::new(SERVER, 9001))
        );
        assert_eq!(
            d.parse_reply(b"MURDERHOUSE_SERVER:9001\n", SERVER),
            Some(ServerEndpoint::new(SERVER, 9001))
        );
    }

    #[test]
    fn test_parse_reply_default_port() {
        let d = discovery();
        let expected = Some(ServerEndpoint::new(SERVER, 8080));
        assert_eq!(d.parse_reply(b"MURDERHOUSE_SERVER:", SERVER), expected);
        assert_eq!(d.parse_reply(b"MURDERHOUSE_SERVER:0", SERVER), expected);
        assert_eq!(d.parse_reply(b"MURDERHOUSE_SERVER:abc", SERVER), expected);
        assert_eq!(d.parse_reply(b"MURDERHOUSE_SERVER:99999", SERVER), expected);
    }

    #[test]
    fn test_parse_reply_wrong_prefix() {
        let d = discovery();
        assert_eq!(d.parse_reply(b"MURDERHOUSE_DISCOVER", SERVER), None);
        assert_eq!(d.parse_reply(b"HELLO:9001", SERVER), None);
        assert_eq!(d.parse_reply(b"", SERVER), None);
    }

    #[test]
    fn test_broadcast_interval() {
        let socket = MockDatagram::default();
        let mut handle = socket.clone();
        let mut d = discovery();
        let start = Instant::now();

        d.begin(&mut handle).unwrap();
        assert_eq!(d.tick(start, &mut handle), None);
        assert_eq!(socket.sent_count(), 1);

        // Not due yet
        d.tick(start + Duration::from_millis(500), &mut handle);
        assert_eq!(socket.sent_count(), 1);

        d.tick(start + Duration::from_secs(2), &mut handle);
        assert_eq!(socket.sent_count(), 2);

        let state = socket.0.borrow();
        assert_eq!(state.sent[0], (8089, b"MURDERHOUSE_DISCOVER".to_vec()));
    }

    #[test]
    fn test_resolves_and_closes() {
        let socket = MockDatagram::default();
        let mut handle = socket.clone();
        let mut d = discovery();
        let now = Instant::now();

        d.begin(&mut handle).unwrap();
        socket.deliver("SOMETHING_ELSE", SERVER);
        assert_eq!(d.tick(now, &mut handle), None);
        assert!(d.is_listening());

        socket.deliver("MURDERHOUSE_SERVER:9001", SERVER);
        assert_eq!(
            d.tick(now, &mut handle),
            Some(ServerEndpoint::new(SERVER, 9001))
        );
        assert!(!d.is_listening());
        assert!(!socket.is_bound());

        // Closed: later replies go nowhere
        assert_eq!(d.tick(now, &mut handle), None);
    }

    #[test]
    fn test_bind_failure() {
        let socket = MockDatagram::default();
        socket.set_fail_bind(true);
        let mut handle = socket.clone();
        let mut d = discovery();

        assert!(matches!(
            d.begin(&mut handle),
            Err(TransportError::Bind { port: 8089, .. })
        ));
        assert!(!d.is_listening());
        assert_eq!(d.tick(Instant::now(), &mut handle), None);
        assert_eq!(socket.sent_count(), 0);
    }
}
