//! Connection and session state for the terminal.
//!
//! - `phase` - Connection phase state machine (where is the terminal?)
//! - `transport` - WiFi, datagram and message stream seams
//! - `discovery` - Broadcast discovery of the game server
//! - `protocol` - JSON envelopes in both directions
//! - `display` - Display snapshots pushed by the server
//! - `connection` - The session driving all of the above
//! - `terminal` - Device loop glue: input routing, screen and LEDs
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                              Terminal                                 │
//! │                                                                       │
//! │   InputSource ──▶ route ──▶ Session commands                          │
//! │   Session ──(mpsc)──▶ DisplayState ──▶ DisplaySink / LedSink          │
//! │                                                                       │
//! │  ┌────────────────────────────────────────────────────────────────┐   │
//! │  │                           Session                              │   │
//! │  │                                                                │   │
//! │  │  ┌──────────┐   ┌───────────────┐   ┌───────────────┐          │   │
//! │  │  │ WifiLink │   │ DatagramSocket│   │ MessageStream │          │   │
//! │  │  └──────────┘   │  (Discovery)  │   │  (protocol)   │          │   │
//! │  │                 └───────────────┘   └───────────────┘          │   │
//! │  │                                                                │   │
//! │  │  Boot ─▶ WifiConnecting ─▶ Discovering ─▶ StreamConnecting     │   │
//! │  │          ─▶ Joining ─▶ Connected ◀─▶ Reconnecting   Error      │   │
//! │  └────────────────────────────────────────────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use terminal_link::config::TerminalConfig;
//! use terminal_link::state::{Session, SessionIdentity, UdpDatagram};
//!
//! let config = TerminalConfig::new("GameNet", "secret");
//! let mut session = Session::new(
//!     config,
//!     SessionIdentity::player(4),
//!     wifi,
//!     UdpDatagram::new(),
//!     stream,
//! );
//!
//! loop {
//!     session.tick(Instant::now());
//! }
//! ```

pub mod connection;
pub mod discovery;
pub mod display;
pub mod phase;
pub mod protocol;
pub mod terminal;
pub mod transport;

// Re-export commonly used types
pub use connection::{DisplayListener, Session, SessionError, MAX_EVENTS_PER_TICK};
pub use discovery::Discovery;
pub use display::{
    ButtonLeds, DisplayState, DisplayStyle, HeaderLine, HintLine, IconSlot, IconState, LedState,
    MainLine, StatusLed, ICON_SLOTS,
};
pub use phase::{ConnectionPhase, InvalidTransition, PhaseEvent};
pub use protocol::{ClientMessage, DecodeError, ServerMessage, SessionIdentity};
pub use terminal::{
    DisplaySink, InputEvent, InputSource, LedSink, PlayerSelect, Terminal, MAX_PLAYER_NUMBER,
};
pub use transport::{
    DatagramSocket, MessageStream, ServerEndpoint, StreamEvent, TransportError, UdpDatagram,
    WifiLink,
};
