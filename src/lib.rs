//! Terminal Link Library
//!
//! This crate brings a physical game terminal onto the game server and
//! keeps it there.
//!
//! # Overview
//!
//! - **Connection Phases** - Tracks where the terminal is (WiFi, discovery,
//!   stream, join, connected, reconnecting, error) with validated transitions.
//!
//! - **Discovery** - Finds the server on the local network by broadcasting a
//!   probe and reading the reply.
//!
//! - **Session** - Joins as a player, rejoins after drops, and gates game
//!   commands until the server has accepted the terminal.
//!
//! - **Display Updates** - Parses the server's display pushes leniently and
//!   hands them to the device.
//!
//! # Design Principles
//!
//! 1. **Nothing blocks** - Everything advances from `tick(now)`; time is
//!    passed in, never read.
//!
//! 2. **Transports are traits** - WiFi, datagram and stream sit behind
//!    small traits so the state machine runs against mocks in tests.
//!
//! 3. **Malformed input is dropped, not fatal** - Bad frames and replies
//!    are logged and ignored.
//!
//! # Example
//!
//! ```rust
//! use terminal_link::config::TerminalConfig;
//! use terminal_link::state::{ClientMessage, InputEvent, PlayerSelect};
//!
//! let config = TerminalConfig::from_json_str(
//!     r#"{"wifi": {"ssid": "GameNet", "password": "secret"}}"#,
//! )
//! .unwrap();
//! assert_eq!(config.default_port, 8080);
//!
//! // Pick seat 9 by wrapping the dial backwards
//! let mut select = PlayerSelect::new();
//! select.handle(InputEvent::Up);
//! let identity = select.handle(InputEvent::Confirm).unwrap();
//!
//! let join = ClientMessage::Join { player_id: identity };
//! assert_eq!(
//!     join.encode(),
//!     r#"{"payload":{"playerId":"9","source":"terminal"},"type":"join"}"#
//! );
//! ```

pub mod config;
pub mod state;

// Re-export everything from state module at crate root
pub use state::*;
