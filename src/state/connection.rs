//! Session lifecycle.
//!
//! [`Session`] owns the terminal's link to the game server: WiFi
//! association, discovery, the message stream, the join handshake and
//! recovery. The device loop calls [`Session::tick`] once per iteration;
//! every transition happens synchronously inside that call and nothing in
//! it blocks.
//!
//! Failure handling:
//!
//! - Transport loss (stream or WiFi) is recovered automatically through
//!   `Reconnecting` / `WifiConnecting`.
//! - A server refusing the join parks the session in `Error` with the
//!   server's message in [`Session::last_error`] until [`Session::retry`].
//! - Malformed frames are logged and dropped.
//! - Bind failures are retried on the next attempt to enter discovery.

use std::sync::mpsc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use super::discovery::Discovery;
use super::display::DisplayState;
use super::phase::{ConnectionPhase, PhaseEvent};
use super::protocol::{ClientMessage, ServerMessage, SessionIdentity};
use super::transport::{DatagramSocket, MessageStream, ServerEndpoint, StreamEvent, WifiLink};
use crate::config::TerminalConfig;

/// Most stream events handled in one tick, to keep loop latency bounded.
pub const MAX_EVENTS_PER_TICK: usize = 16;

/// Receives a copy of every display state the server pushes.
pub trait DisplayListener {
    fn display_updated(&mut self, state: DisplayState);
}

impl<F: FnMut(DisplayState)> DisplayListener for F {
    fn display_updated(&mut self, state: DisplayState) {
        self(state)
    }
}

impl DisplayListener for mpsc::Sender<DisplayState> {
    fn display_updated(&mut self, state: DisplayState) {
        // A dropped receiver just means nobody is watching anymore
        let _ = self.send(state);
    }
}

/// Session API misuse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Identity can only change before the first tick
    AlreadyStarted { phase: ConnectionPhase },
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyStarted { phase } => {
                write!(f, "Session already started (phase {})", phase)
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// The terminal's single session with the game server.
pub struct Session<W, D, S> {
    config: TerminalConfig,
    identity: SessionIdentity,
    phase: ConnectionPhase,

    /// When the current phase was first ticked
    phase_entered: Option<Instant>,

    wifi: W,
    datagram: D,
    stream: S,
    discovery: Discovery,

    /// Last failed attempt to open the discovery listener
    discovery_failed_at: Option<Instant>,

    /// Association has been reported since the last `begin_wifi`
    wifi_up: bool,

    endpoint: Option<ServerEndpoint>,
    endpoint_is_static: bool,

    stream_open: bool,
    stream_connected: bool,
    joined: bool,

    last_error: String,
    display: DisplayState,
    listener: Option<Box<dyn DisplayListener>>,

    last_heartbeat: Option<Instant>,
    connected_since: Option<DateTime<Utc>>,
}

impl<W: WifiLink, D: DatagramSocket, S: MessageStream> Session<W, D, S> {
    /// Create a session in `Boot`. Nothing happens until the first tick.
    pub fn new(
        config: TerminalConfig,
        identity: SessionIdentity,
        wifi: W,
        datagram: D,
        stream: S,
    ) -> Self {
        let discovery = Discovery::new(config.discovery.clone(), config.default_port);
        Self {
            identity,
            phase: ConnectionPhase::Boot,
            phase_entered: None,
            wifi,
            datagram,
            stream,
            discovery,
            discovery_failed_at: None,
            wifi_up: false,
            endpoint: config.server,
            endpoint_is_static: config.server.is_some(),
            stream_open: false,
            stream_connected: false,
            joined: false,
            last_error: String::new(),
            display: DisplayState::default(),
            listener: None,
            last_heartbeat: None,
            connected_since: None,
            config,
        }
    }

    /// Change the identity. Only allowed before the first tick.
    pub fn set_identity(&mut self, identity: SessionIdentity) -> Result<(), SessionError> {
        if self.phase != ConnectionPhase::Boot {
            return Err(SessionError::AlreadyStarted { phase: self.phase });
        }
        info!("session: player id set to {}", identity);
        self.identity = identity;
        Ok(())
    }

    /// Register the receiver of display updates, replacing any previous one.
    pub fn set_display_listener(&mut self, listener: impl DisplayListener + 'static) {
        self.listener = Some(Box::new(listener));
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// True iff the phase is `Connected`.
    pub fn is_connected(&self) -> bool {
        self.phase.is_connected()
    }

    /// Most recent server error, empty after a retry.
    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    /// Server endpoint, once known.
    pub fn endpoint(&self) -> Option<ServerEndpoint> {
        self.endpoint
    }

    /// Wall-clock start of the current `Connected` phase.
    pub fn connected_since(&self) -> Option<DateTime<Utc>> {
        self.connected_since
    }

    pub fn config(&self) -> &TerminalConfig {
        &self.config
    }

    /// Advance the state machine. Call once per loop iteration.
    pub fn tick(&mut self, now: Instant) -> ConnectionPhase {
        let entered = *self.phase_entered.get_or_insert(now);

        match self.phase {
            ConnectionPhase::Boot => {
                self.begin_wifi();
                self.apply(PhaseEvent::Start);
            }
            ConnectionPhase::WifiConnecting => self.tick_wifi(now, entered),
            ConnectionPhase::Discovering => self.tick_discovery(now),
            ConnectionPhase::StreamConnecting => {
                self.pump();
                if self.stream_connected && !self.joined {
                    self.register(ClientMessage::Join {
                        player_id: self.identity.clone(),
                    });
                }
            }
            ConnectionPhase::Joining => {
                let dropped = self.pump();
                if self.phase != ConnectionPhase::Joining {
                    // Rejected while pumping
                } else if dropped || !self.stream_connected {
                    self.apply(PhaseEvent::StreamLost);
                } else if self.joined {
                    self.apply(PhaseEvent::Welcome);
                }
            }
            ConnectionPhase::Connected => {
                let dropped = self.pump();
                if dropped || !self.stream_connected || !self.joined {
                    self.joined = false;
                    self.apply(PhaseEvent::StreamLost);
                } else {
                    self.tick_heartbeat(now);
                }
            }
            ConnectionPhase::Reconnecting => self.tick_reconnecting(now, entered),
            ConnectionPhase::Error => {
                self.pump();
            }
        }

        self.phase
    }

    /// Retry the join after the server refused it. No-op outside `Error`.
    pub fn retry(&mut self) {
        if self.phase != ConnectionPhase::Error {
            debug!("session: retry ignored in {}", self.phase);
            return;
        }

        info!("session: retrying join");
        self.last_error.clear();

        if self.stream_connected {
            self.register(ClientMessage::Join {
                player_id: self.identity.clone(),
            });
        } else {
            self.apply(PhaseEvent::RetryDeferred);
        }
    }

    pub fn select_up(&mut self) -> bool {
        self.send(ClientMessage::SelectUp)
    }

    pub fn select_down(&mut self) -> bool {
        self.send(ClientMessage::SelectDown)
    }

    pub fn confirm(&mut self) -> bool {
        self.send(ClientMessage::Confirm)
    }

    pub fn abstain(&mut self) -> bool {
        self.send(ClientMessage::Abstain)
    }

    pub fn use_item(&mut self, item_id: &str) -> bool {
        self.send(ClientMessage::UseItem {
            item_id: item_id.to_string(),
        })
    }

    pub fn idle_scroll_up(&mut self) -> bool {
        self.send(ClientMessage::IdleScrollUp)
    }

    pub fn idle_scroll_down(&mut self) -> bool {
        self.send(ClientMessage::IdleScrollDown)
    }

    /// Send a game command while `Connected`.
    ///
    /// Join and rejoin are refused here; the session sends those itself.
    /// Returns whether the frame was handed to the stream.
    pub fn send(&mut self, message: ClientMessage) -> bool {
        if message.is_registration() {
            warn!(
                "session: refusing external {}, registration is session-driven",
                message.type_str()
            );
            return false;
        }
        if !self.is_connected() {
            debug!(
                "session: dropping {} while {}",
                message.type_str(),
                self.phase
            );
            return false;
        }
        self.transmit(&message)
    }

    fn transmit(&mut self, message: &ClientMessage) -> bool {
        let frame = message.encode();
        debug!("session: sending {}", frame);
        match self.stream.send_text(&frame) {
            Ok(()) => true,
            Err(e) => {
                warn!("session: failed to send {}: {}", message.type_str(), e);
                false
            }
        }
    }

    fn tick_wifi(&mut self, now: Instant, entered: Instant) {
        if !self.wifi.is_connected() {
            if now.duration_since(entered) >= self.config.wifi_timeout() {
                warn!("session: WiFi association timed out, restarting");
                self.begin_wifi();
                self.apply(PhaseEvent::WifiLost);
            }
            return;
        }

        if !self.wifi_up {
            info!("session: WiFi connected");
            self.wifi_up = true;
        }
        match self.endpoint {
            Some(endpoint) => {
                self.open_stream(endpoint);
                self.apply(PhaseEvent::WifiAssociated {
                    endpoint_known: true,
                });
            }
            None => self.enter_discovery(
                now,
                PhaseEvent::WifiAssociated {
                    endpoint_known: false,
                },
            ),
        }
    }

    fn tick_discovery(&mut self, now: Instant) {
        if !self.wifi.is_connected() {
            warn!("session: WiFi lost during discovery");
            self.discovery.stop(&mut self.datagram);
            self.begin_wifi();
            self.apply(PhaseEvent::WifiLost);
            return;
        }

        if let Some(endpoint) = self.discovery.tick(now, &mut self.datagram) {
            self.endpoint = Some(endpoint);
            self.endpoint_is_static = false;
            self.open_stream(endpoint);
            self.apply(PhaseEvent::EndpointResolved);
        }
    }

    fn tick_reconnecting(&mut self, now: Instant, entered: Instant) {
        self.pump();

        if !self.wifi.is_connected() {
            warn!("session: WiFi lost, restarting association");
            self.close_stream();
            self.begin_wifi();
            self.apply(PhaseEvent::WifiLost);
        } else if self.stream_connected {
            self.register(ClientMessage::Rejoin {
                player_id: self.identity.clone(),
            });
        } else if self.rediscovery_due(now, entered) {
            info!("session: server unreachable, rediscovering");
            self.close_stream();
            self.enter_discovery(now, PhaseEvent::Rediscover);
        }
    }

    fn tick_heartbeat(&mut self, now: Instant) {
        let Some(interval) = self.config.heartbeat_interval() else {
            return;
        };
        match self.last_heartbeat {
            Some(last) if now.duration_since(last) < interval => {}
            Some(_) => {
                self.send(ClientMessage::Heartbeat);
                self.last_heartbeat = Some(now);
            }
            None => self.last_heartbeat = Some(now),
        }
    }

    fn rediscovery_due(&self, now: Instant, entered: Instant) -> bool {
        !self.endpoint_is_static
            && self
                .config
                .rediscover_after()
                .map_or(false, |after| now.duration_since(entered) >= after)
    }

    fn enter_discovery(&mut self, now: Instant, event: PhaseEvent) {
        let interval = self.config.discovery.interval();
        if self
            .discovery_failed_at
            .map_or(false, |failed| now.duration_since(failed) < interval)
        {
            return;
        }

        match self.discovery.begin(&mut self.datagram) {
            Ok(()) => {
                self.discovery_failed_at = None;
                self.apply(event);
            }
            Err(e) => {
                warn!("session: cannot start discovery: {}", e);
                self.discovery_failed_at = Some(now);
            }
        }
    }

    /// Send join/rejoin on a connected stream and move to `Joining`.
    fn register(&mut self, message: ClientMessage) {
        if !self.stream_connected {
            return;
        }
        self.joined = false;
        info!(
            "session: sending {} as player {}",
            message.type_str(),
            self.identity
        );
        self.transmit(&message);
        self.apply(PhaseEvent::JoinSent);
    }

    fn begin_wifi(&mut self) {
        self.wifi_up = false;
        info!("session: connecting to WiFi {}", self.config.wifi.ssid);
        self.wifi
            .begin(&self.config.wifi.ssid, &self.config.wifi.password);
    }

    fn open_stream(&mut self, endpoint: ServerEndpoint) {
        self.close_stream();
        info!("session: opening stream to {}", endpoint);
        self.stream.open(
            &endpoint,
            &self.config.stream_path,
            self.config.reconnect_interval(),
        );
        self.stream_open = true;
    }

    fn close_stream(&mut self) {
        if self.stream_open {
            self.stream.close();
            self.stream_open = false;
        }
        self.stream_connected = false;
        self.joined = false;
    }

    /// Drain pending stream events. Returns whether the stream dropped.
    fn pump(&mut self) -> bool {
        let mut dropped = false;

        for _ in 0..MAX_EVENTS_PER_TICK {
            let Some(event) = self.stream.poll() else {
                break;
            };
            match event {
                StreamEvent::Connected => {
                    info!("session: stream connected");
                    self.stream_connected = true;
                }
                StreamEvent::Disconnected => {
                    info!("session: stream disconnected");
                    self.stream_connected = false;
                    self.joined = false;
                    dropped = true;
                }
                StreamEvent::Text(text) => self.handle_frame(&text),
                StreamEvent::Binary(data) => {
                    debug!("session: ignoring binary frame ({} bytes)", data.len());
                }
                StreamEvent::Error(reason) => warn!("session: stream error: {}", reason),
            }
        }

        dropped
    }

    fn handle_frame(&mut self, text: &str) {
        debug!("session: received {}", text);
        match ServerMessage::decode(text) {
            Ok(message) => self.handle_message(message),
            Err(e) => warn!("session: dropping frame: {}", e),
        }
    }

    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Welcome => {
                info!("session: joined game");
                self.joined = true;
            }
            ServerMessage::Error { message } => {
                warn!("session: server error: {}", message);
                self.last_error = message;
                if self.phase == ConnectionPhase::Joining {
                    self.apply(PhaseEvent::Rejected);
                }
            }
            ServerMessage::PlayerState {
                display: Some(display),
            } => {
                self.display = display;
                if let Some(listener) = self.listener.as_mut() {
                    listener.display_updated(self.display.clone());
                }
            }
            ServerMessage::PlayerState { display: None } => {
                debug!("session: player state without display");
            }
            ServerMessage::GameState
            | ServerMessage::PlayerList
            | ServerMessage::EventPrompt
            | ServerMessage::EventResult
            | ServerMessage::PhaseChange => {
                debug!("session: received {:?}", message);
            }
            ServerMessage::Unknown(tag) => {
                debug!("session: ignoring message type {}", tag);
            }
        }
    }

    fn apply(&mut self, event: PhaseEvent) {
        match self.phase.next(event) {
            Ok(next) => {
                info!("session: {} -> {}", self.phase, next);
                if next == ConnectionPhase::Connected {
                    self.connected_since = Some(Utc::now());
                    self.last_heartbeat = None;
                } else {
                    self.connected_since = None;
                }
                self.phase = next;
                self.phase_entered = None;
            }
            Err(e) => warn!("session: {}", e),
        }
    }
}
