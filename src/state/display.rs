//! Display state pushed by the server.
//!
//! The server describes what the terminal should show as a `display` object
//! inside a `playerState` message. Parsing is lenient: each field falls back
//! to its own default when missing or of the wrong type, so a partial or
//! newer server schema still yields a complete [`DisplayState`].

use serde_json::Value;

/// Number of icon slots in the idle icon column.
pub const ICON_SLOTS: usize = 3;

/// Button LED directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedState {
    #[default]
    Off,
    Dim,
    Bright,
    Pulse,
}

impl LedState {
    /// Parse a directive; anything unknown is `Off`.
    pub fn parse(s: &str) -> Self {
        match s {
            "dim" => Self::Dim,
            "bright" => Self::Bright,
            "pulse" => Self::Pulse,
            _ => Self::Off,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Dim => "dim",
            Self::Bright => "bright",
            Self::Pulse => "pulse",
        }
    }
}

/// Visual variant of the main line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayStyle {
    #[default]
    Normal,
    Locked,
    Abstained,
    Waiting,
}

impl DisplayStyle {
    pub fn parse(s: &str) -> Self {
        match s {
            "locked" => Self::Locked,
            "abstained" => Self::Abstained,
            "waiting" => Self::Waiting,
            _ => Self::Normal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Locked => "locked",
            Self::Abstained => "abstained",
            Self::Waiting => "waiting",
        }
    }
}

/// Game status shown on the status LED while in a game.
///
/// `None` means the server has no game status, and the LED falls back to
/// showing the connection phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusLed {
    #[default]
    None,
    Lobby,
    Day,
    Night,
    Voting,
    Locked,
    Abstained,
    Dead,
    GameOver,
}

impl StatusLed {
    pub fn parse(s: &str) -> Self {
        match s {
            "lobby" => Self::Lobby,
            "day" => Self::Day,
            "night" => Self::Night,
            "voting" => Self::Voting,
            "locked" => Self::Locked,
            "abstained" => Self::Abstained,
            "dead" => Self::Dead,
            "gameOver" => Self::GameOver,
            _ => Self::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Lobby => "lobby",
            Self::Day => "day",
            Self::Night => "night",
            Self::Voting => "voting",
            Self::Locked => "locked",
            Self::Abstained => "abstained",
            Self::Dead => "dead",
            Self::GameOver => "gameOver",
        }
    }
}

/// State of one icon slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IconState {
    Active,
    Inactive,
    #[default]
    Empty,
}

impl IconState {
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "inactive" => Self::Inactive,
            _ => Self::Empty,
        }
    }
}

/// One slot of the icon column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconSlot {
    pub id: String,
    pub state: IconState,
}

impl Default for IconSlot {
    fn default() -> Self {
        Self {
            id: "empty".to_string(),
            state: IconState::Empty,
        }
    }
}

/// Line 1: context, e.g. "DAY 1" with an icon on the right.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderLine {
    pub left: String,
    pub right: String,
}

/// Line 2: main content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MainLine {
    pub text: String,
    pub style: DisplayStyle,
}

/// Line 3: hint text, either centered or split in columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HintLine {
    /// Centered text, used when the columns are empty
    pub text: String,
    /// Above the yes button
    pub left: String,
    pub center: String,
    /// Above the no button
    pub right: String,
}

/// Button LED directives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonLeds {
    pub yes: LedState,
    pub no: LedState,
}

/// Everything the terminal shows, as last pushed by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayState {
    pub line1: HeaderLine,
    pub line2: MainLine,
    pub line3: HintLine,
    pub leds: ButtonLeds,
    pub status_led: StatusLed,
    pub icons: [IconSlot; ICON_SLOTS],
    pub idle_scroll_index: u8,
}

impl DisplayState {
    /// Placeholder shown before the server pushes anything.
    pub fn connecting() -> Self {
        Self {
            line1: HeaderLine {
                left: "CONNECTING".to_string(),
                right: String::new(),
            },
            line2: MainLine {
                text: "...".to_string(),
                style: DisplayStyle::Normal,
            },
            line3: HintLine {
                text: "Please wait".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Build from a `display` object, defaulting every missing field.
    pub fn from_json(display: &Value) -> Self {
        let line1 = &display["line1"];
        let line2 = &display["line2"];
        let line3 = &display["line3"];
        let leds = &display["leds"];

        let mut icons: [IconSlot; ICON_SLOTS] = Default::default();
        if let Some(entries) = display["icons"].as_array() {
            for (slot, entry) in icons.iter_mut().zip(entries) {
                *slot = IconSlot {
                    id: str_or(&entry["id"], "empty"),
                    state: IconState::parse(&str_or(&entry["state"], "empty")),
                };
            }
        }

        Self {
            line1: HeaderLine {
                left: str_or(&line1["left"], ""),
                right: str_or(&line1["right"], ""),
            },
            line2: MainLine {
                text: str_or(&line2["text"], ""),
                style: DisplayStyle::parse(&str_or(&line2["style"], "normal")),
            },
            line3: HintLine {
                text: str_or(&line3["text"], ""),
                left: str_or(&line3["left"], ""),
                center: str_or(&line3["center"], ""),
                right: str_or(&line3["right"], ""),
            },
            leds: ButtonLeds {
                yes: LedState::parse(&str_or(&leds["yes"], "off")),
                no: LedState::parse(&str_or(&leds["no"], "off")),
            },
            status_led: StatusLed::parse(&str_or(&display["statusLed"], "")),
            icons,
            idle_scroll_index: display["idleScrollIndex"]
                .as_u64()
                .and_then(|i| u8::try_from(i).ok())
                .unwrap_or(0),
        }
    }

    /// Whether the server is asking the player for a decision right now.
    pub fn has_active_event(&self) -> bool {
        self.leds.yes == LedState::Bright
            || matches!(
                self.status_led,
                StatusLed::Voting | StatusLed::Locked | StatusLed::Abstained
            )
    }

    /// Whether dial and buttons drive the idle icon column.
    pub fn is_idle(&self) -> bool {
        !self.has_active_event()
            && !matches!(
                self.status_led,
                StatusLed::Lobby | StatusLed::GameOver | StatusLed::Dead
            )
    }

    /// Item under the idle cursor, if the cursor sits on a usable item slot.
    pub fn selected_item(&self) -> Option<&str> {
        let index = usize::from(self.idle_scroll_index);
        if (1..ICON_SLOTS).contains(&index) {
            Some(self.icons[index].id.as_str())
        } else {
            None
        }
    }
}

fn str_or(value: &Value, default: &str) -> String {
    value.as_str().unwrap_or(default).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_full_display() {
        let state = DisplayState::from_json(&json!({
            "line1": { "left": "DAY 1", "right": ":wolf:" },
            "line2": { "text": "PLAYER 3", "style": "locked" },
            "line3": { "left": "YES", "center": "pack", "right": "NO" },
            "leds": { "yes": "bright", "no": "pulse" },
            "statusLed": "voting",
            "icons": [
                { "id": "role", "state": "active" },
                { "id": "torch", "state": "inactive" }
            ],
            "idleScrollIndex": 1
        }));

        assert_eq!(state.line1.left, "DAY 1");
        assert_eq!(state.line1.right, ":wolf:");
        assert_eq!(state.line2.text, "PLAYER 3");
        assert_eq!(state.line2.style, DisplayStyle::Locked);
        assert_eq!(state.line3.text, "");
        assert_eq!(state.line3.center, "pack");
        assert_eq!(
            state.leds,
            ButtonLeds {
                yes: LedState::Bright,
                no: LedState::Pulse
            }
        );
        assert_eq!(state.status_led, StatusLed::Voting);
        assert_eq!(state.icons[1].id, "torch");
        assert_eq!(state.icons[1].state, IconState::Inactive);
        assert_eq!(state.icons[2], IconSlot::default());
        assert_eq!(state.idle_scroll_index, 1);
    }

    #[test]
    fn test_missing_leds_default_off() {
        let state = DisplayState::from_json(&json!({
            "line2": { "text": "WAITING" }
        }));
        assert_eq!(state.leds.yes, LedState::Off);
        assert_eq!(state.leds.no, LedState::Off);
        assert_eq!(state.line2.style, DisplayStyle::Normal);
        assert_eq!(state.status_led, StatusLed::None);
    }

    #[test]
    fn test_wrong_types_default() {
        let state = DisplayState::from_json(&json!({
            "line1": "oops",
            "line2": { "text": 42, "style": "sparkly" },
            "leds": { "yes": true },
            "icons": "none",
            "idleScrollIndex": 900
        }));
        assert_eq!(state, DisplayState::default());
    }

    #[test]
    fn test_idle_routing_rules() {
        let mut state = DisplayState::default();
        state.status_led = StatusLed::Day;
        assert!(state.is_idle());

        state.leds.yes = LedState::Bright;
        assert!(!state.is_idle());

        state.leds.yes = LedState::Dim;
        state.status_led = StatusLed::Lobby;
        assert!(!state.is_idle());
        assert!(!state.has_active_event());
    }

    #[test]
    fn test_selected_item() {
        let mut state = DisplayState::default();
        state.icons[2].id = "potion".to_string();

        assert_eq!(state.selected_item(), None);
        state.idle_scroll_index = 2;
        assert_eq!(state.selected_item(), Some("potion"));
        state.idle_scroll_index = 3;
        assert_eq!(state.selected_item(), None);
    }
}
