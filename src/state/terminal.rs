//! Device loop glue.
//!
//! [`Terminal`] sits between the session and the rest of the device: it
//! feeds dial/button events into session commands and pushes phase changes
//! and display snapshots out to the screen and LEDs. The hardware drivers
//! behind [`InputSource`], [`DisplaySink`] and [`LedSink`] live elsewhere.

use std::sync::mpsc;
use std::time::Instant;

use log::info;

use super::connection::Session;
use super::display::{ButtonLeds, DisplayState, LedState, StatusLed};
use super::phase::ConnectionPhase;
use super::protocol::SessionIdentity;
use super::transport::{DatagramSocket, MessageStream, WifiLink};

/// Highest selectable seat number.
pub const MAX_PLAYER_NUMBER: u8 = 9;

/// Debounced input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputEvent {
    #[default]
    None,
    Up,
    Down,
    /// Yes button
    Confirm,
    /// No button
    Cancel,
}

/// Debounced dial and buttons.
pub trait InputSource {
    /// Next pending event, or `InputEvent::None`.
    fn poll(&mut self) -> InputEvent;
}

/// The screen.
pub trait DisplaySink {
    fn render(&mut self, state: &DisplayState);

    /// Show a connection status screen, with an error detail in `Error`.
    fn show_status(&mut self, phase: ConnectionPhase, detail: Option<&str>);
}

/// Button LEDs and the status pixel.
pub trait LedSink {
    fn set_buttons(&mut self, leds: ButtonLeds);
    fn set_game_status(&mut self, status: StatusLed);
    fn set_connection_status(&mut self, phase: ConnectionPhase);
}

/// Seat picker shown before the session starts.
///
/// The dial walks through 1..=9 with wraparound; confirm picks the seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerSelect {
    selected: u8,
}

impl Default for PlayerSelect {
    fn default() -> Self {
        Self { selected: 1 }
    }
}

impl PlayerSelect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> u8 {
        self.selected
    }

    /// Handle one event; returns the identity once confirmed.
    pub fn handle(&mut self, event: InputEvent) -> Option<SessionIdentity> {
        match event {
            InputEvent::Up => {
                self.selected = if self.selected == 1 {
                    MAX_PLAYER_NUMBER
                } else {
                    self.selected - 1
                };
                None
            }
            InputEvent::Down => {
                self.selected = if self.selected == MAX_PLAYER_NUMBER {
                    1
                } else {
                    self.selected + 1
                };
                None
            }
            InputEvent::Confirm => {
                info!("terminal: player {} confirmed", self.selected);
                Some(SessionIdentity::player(self.selected))
            }
            InputEvent::Cancel | InputEvent::None => None,
        }
    }
}

/// A session plus the device-facing state around it.
pub struct Terminal<W, D, S> {
    session: Session<W, D, S>,
    updates: mpsc::Receiver<DisplayState>,
    display: DisplayState,
    display_dirty: bool,
    last_phase: Option<ConnectionPhase>,
}

impl<W: WifiLink, D: DatagramSocket, S: MessageStream> Terminal<W, D, S> {
    /// Wrap a session, taking over its display listener.
    pub fn new(mut session: Session<W, D, S>) -> Self {
        let (tx, rx) = mpsc::channel();
        session.set_display_listener(tx);
        Self {
            session,
            updates: rx,
            display: DisplayState::connecting(),
            display_dirty: true,
            last_phase: None,
        }
    }

    pub fn session(&self) -> &Session<W, D, S> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<W, D, S> {
        &mut self.session
    }

    /// Latest display snapshot received from the server.
    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    /// Run one loop iteration.
    pub fn tick(
        &mut self,
        now: Instant,
        input: &mut impl InputSource,
        screen: &mut impl DisplaySink,
        leds: &mut impl LedSink,
    ) -> ConnectionPhase {
        let phase = self.session.tick(now);

        for state in self.updates.try_iter() {
            leds.set_buttons(state.leds);
            leds.set_game_status(state.status_led);
            self.display = state;
            self.display_dirty = true;
        }

        if self.last_phase != Some(phase) {
            self.last_phase = Some(phase);
            info!("terminal: connection state {}", phase);
            leds.set_connection_status(phase);
            if phase.is_connected() {
                self.display_dirty = true;
            } else {
                let detail = phase.needs_retry().then(|| self.session.last_error());
                screen.show_status(phase, detail);
            }
        }

        if self.session.is_connected() {
            let event = input.poll();
            self.route(event);
            if self.display_dirty {
                screen.render(&self.display);
                self.display_dirty = false;
            }
        } else if phase.needs_retry() {
            if matches!(input.poll(), InputEvent::Confirm | InputEvent::Cancel) {
                self.session.retry();
            }
        }

        phase
    }

    /// Turn an input event into a server command.
    fn route(&mut self, event: InputEvent) {
        let idle = self.display.is_idle();
        match event {
            InputEvent::Up if idle => {
                self.session.idle_scroll_up();
            }
            InputEvent::Up => {
                self.session.select_up();
            }
            InputEvent::Down if idle => {
                self.session.idle_scroll_down();
            }
            InputEvent::Down => {
                self.session.select_down();
            }
            InputEvent::Confirm if idle && self.display.leds.yes == LedState::Dim => {
                if let Some(item) = self.display.selected_item() {
                    self.session.use_item(item);
                }
            }
            InputEvent::Confirm => {
                self.session.confirm();
            }
            InputEvent::Cancel => {
                self.session.abstain();
            }
            InputEvent::None => {}
        }
    }
}
