//! Connection phase state machine.
//!
//! Tracks where the terminal is in bringing up its link to the game server
//! and validates transitions.
//!
//! # State Diagram
//!
//! ```text
//! ┌──────┐ start  ┌────────────────┐  wifi up, no endpoint  ┌─────────────┐
//! │ Boot │───────▶│ WifiConnecting │───────────────────────▶│ Discovering │
//! └──────┘        └───────┬────────┘                        └──────┬──────┘
//!                    ▲    │ wifi up, endpoint known                │ resolved
//!          wifi lost │    ▼                                        │
//!                    │ ┌──────────────────┐◀───────────────────────┘
//!                    │ │ StreamConnecting │
//!                    │ └────────┬─────────┘
//!                    │          │ join sent
//!                    │          ▼
//!                    │    ┌───────────┐  rejected   ┌───────┐
//!                    │    │  Joining  │────────────▶│ Error │
//!                    │    └─────┬─────┘◀────────────└───┬───┘
//!                    │          │ welcome   retry       │ retry, stream down
//!                    │          ▼                       │
//!                    │    ┌───────────┐                 │
//!                    │    │ Connected │                 │
//!                    │    └─────┬─────┘                 │
//!                    │          │ stream lost           │
//!                    │          ▼                       │
//!                    │   ┌──────────────┐◀──────────────┘
//!                    └───│ Reconnecting │── rejoin sent ──▶ Joining
//!                        └──────────────┘
//! ```

use std::fmt;

/// Terminal's current connection phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionPhase {
    /// Nothing started yet; identity may still be changed
    #[default]
    Boot,

    /// WiFi association in progress
    WifiConnecting,

    /// Broadcasting discovery probes for the server
    Discovering,

    /// Stream opened towards the endpoint, waiting for it to come up
    StreamConnecting,

    /// Join (or rejoin) sent, waiting for the server's answer
    Joining,

    /// Joined and exchanging game traffic
    Connected,

    /// Stream lost, waiting for it to come back
    Reconnecting,

    /// Server refused the join; waits for an explicit retry
    Error,
}

impl ConnectionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boot => "boot",
            Self::WifiConnecting => "wifi_connecting",
            Self::Discovering => "discovering",
            Self::StreamConnecting => "stream_connecting",
            Self::Joining => "joining",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        }
    }

    /// Check if the session is fully joined.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if the phase is waiting on user action.
    pub fn needs_retry(&self) -> bool {
        matches!(self, Self::Error)
    }

    /// Apply an event, returning the next phase or an error.
    pub fn next(self, event: PhaseEvent) -> Result<Self, InvalidTransition> {
        use ConnectionPhase::*;
        use PhaseEvent::*;

        let invalid = |reason: &'static str| InvalidTransition {
            from: self,
            event,
            reason,
        };

        match (self, event) {
            // Start: Boot -> WifiConnecting
            (Boot, Start) => Ok(WifiConnecting),
            (_, Start) => Err(invalid("Already started")),

            // WifiAssociated: WifiConnecting -> StreamConnecting | Discovering
            (WifiConnecting, WifiAssociated { endpoint_known: true }) => Ok(StreamConnecting),
            (WifiConnecting, WifiAssociated { endpoint_known: false }) => Ok(Discovering),
            (_, WifiAssociated { .. }) => Err(invalid("Not associating")),

            // WifiLost: restart association
            (Discovering | Reconnecting | WifiConnecting, WifiLost) => Ok(WifiConnecting),
            (_, WifiLost) => Err(invalid("WiFi loss is handled through the stream")),

            // EndpointResolved: Discovering -> StreamConnecting
            (Discovering, EndpointResolved) => Ok(StreamConnecting),
            (_, EndpointResolved) => Err(invalid("Not discovering")),

            // JoinSent: anything with a live stream -> Joining
            (StreamConnecting | Reconnecting | Error, JoinSent) => Ok(Joining),
            (Joining, JoinSent) => Err(invalid("Join already pending")),
            (_, JoinSent) => Err(invalid("No stream to join on")),

            // Welcome: Joining -> Connected
            (Joining, Welcome) => Ok(Connected),
            (_, Welcome) => Err(invalid("No join pending")),

            // Rejected: Joining -> Error
            (Joining, Rejected) => Ok(Error),
            (_, Rejected) => Err(invalid("No join pending")),

            // StreamLost: Joining/Connected -> Reconnecting
            (Joining | Connected, StreamLost) => Ok(Reconnecting),
            (_, StreamLost) => Err(invalid("No stream in this phase")),

            // RetryDeferred: Error with the stream gone -> Reconnecting
            (Error, RetryDeferred) => Ok(Reconnecting),
            (_, RetryDeferred) => Err(invalid("Retry only applies to Error")),

            // Rediscover: Reconnecting -> Discovering
            (Reconnecting, Rediscover) => Ok(Discovering),
            (_, Rediscover) => Err(invalid("Only a stalled reconnect rediscovers")),
        }
    }
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boot => "Boot",
            Self::WifiConnecting => "WifiConnecting",
            Self::Discovering => "Discovering",
            Self::StreamConnecting => "StreamConnecting",
            Self::Joining => "Joining",
            Self::Connected => "Connected",
            Self::Reconnecting => "Reconnecting",
            Self::Error => "Error",
        };
        f.write_str(name)
    }
}

/// Phase transition events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    Start,
    WifiAssociated { endpoint_known: bool },
    WifiLost,
    EndpointResolved,
    JoinSent,
    Welcome,
    Rejected,
    StreamLost,
    RetryDeferred,
    Rediscover,
}

/// Error when a phase transition is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: ConnectionPhase,
    pub event: PhaseEvent,
    pub reason: &'static str,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid transition from {} via {:?}: {}",
            self.from, self.event, self.reason
        )
    }
}

impl std::error::Error for InvalidTransition {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn walk(start: ConnectionPhase, events: &[PhaseEvent]) -> ConnectionPhase {
        events
            .iter()
            .fold(start, |phase, event| phase.next(*event).unwrap())
    }

    #[test]
    fn test_initial_phase() {
        let phase = ConnectionPhase::default();
        assert_eq!(phase, ConnectionPhase::Boot);
        assert!(!phase.is_connected());
    }

    #[test]
    fn test_discovery_flow() {
        let phase = walk(
            ConnectionPhase::Boot,
            &[
                PhaseEvent::Start,
                PhaseEvent::WifiAssociated {
                    endpoint_known: false,
                },
                PhaseEvent::EndpointResolved,
                PhaseEvent::JoinSent,
                PhaseEvent::Welcome,
            ],
        );
        assert_eq!(phase, ConnectionPhase::Connected);
        assert!(phase.is_connected());
    }

    #[test]
    fn test_discovery_bypass() {
        let phase = walk(
            ConnectionPhase::WifiConnecting,
            &[PhaseEvent::WifiAssociated {
                endpoint_known: true,
            }],
        );
        assert_eq!(phase, ConnectionPhase::StreamConnecting);
    }

    #[test]
    fn test_reconnect_cycle() {
        let phase = walk(
            ConnectionPhase::Connected,
            &[
                PhaseEvent::StreamLost,
                PhaseEvent::JoinSent,
                PhaseEvent::Welcome,
            ],
        );
        assert_eq!(phase, ConnectionPhase::Connected);

        let phase = walk(
            ConnectionPhase::Connected,
            &[PhaseEvent::StreamLost, PhaseEvent::WifiLost],
        );
        assert_eq!(phase, ConnectionPhase::WifiConnecting);
    }

    #[test]
    fn test_rejection_and_retry() {
        let phase = walk(ConnectionPhase::Joining, &[PhaseEvent::Rejected]);
        assert_eq!(phase, ConnectionPhase::Error);
        assert!(phase.needs_retry());

        assert_eq!(
            phase.next(PhaseEvent::JoinSent).unwrap(),
            ConnectionPhase::Joining
        );
        assert_eq!(
            phase.next(PhaseEvent::RetryDeferred).unwrap(),
            ConnectionPhase::Reconnecting
        );
    }

    #[test]
    fn test_invalid_transitions() {
        // No skipping straight to Connected
        assert!(ConnectionPhase::StreamConnecting
            .next(PhaseEvent::Welcome)
            .is_err());

        // Rejections outside a join are not phase changes
        assert!(ConnectionPhase::Connected
            .next(PhaseEvent::Rejected)
            .is_err());

        // Can't start twice
        assert!(ConnectionPhase::Connected.next(PhaseEvent::Start).is_err());

        // Error is absorbing for transport events
        assert!(ConnectionPhase::Error.next(PhaseEvent::StreamLost).is_err());
    }

    #[test]
    fn test_only_connected_is_connected() {
        let all = [
            ConnectionPhase::Boot,
            ConnectionPhase::WifiConnecting,
            ConnectionPhase::Discovering,
            ConnectionPhase::StreamConnecting,
            ConnectionPhase::Joining,
            ConnectionPhase::Connected,
            ConnectionPhase::Reconnecting,
            ConnectionPhase::Error,
        ];
        for phase in all {
            assert_eq!(phase.is_connected(), phase == ConnectionPhase::Connected);
        }
    }

    #[test]
    fn test_display() {
        let err = ConnectionPhase::Boot.next(PhaseEvent::Welcome).unwrap_err();
        assert_eq!(
            format!("{}", err),
            "Invalid transition from Boot via Welcome: No join pending"
        );
    }
}
