//! Navigation / injection mode state machine
//!
//! The mode decides how stick directions and buttons are interpreted. Both
//! interpretations are plain data tables ([`StickBindings`], [`button_action`])
//! so the event router has a single code path for either mode.

use chrono::{DateTime, Duration, Local};
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::Orientation;
use crate::controller::event_collector::PadButton;
use crate::device::MouseButton;
use crate::navigation::KeyboardLayout;

/// Time after a toggle during which further toggle presses are ignored
pub const TOGGLE_DEBOUNCE_MS: i64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Sticks move the focus over the on-screen keyboard
    #[default]
    Navigation,
    /// Sticks and buttons drive keys and the mouse directly
    Injection,
}

impl Mode {
    pub fn other(self) -> Self {
        match self {
            Mode::Navigation => Mode::Injection,
            Mode::Injection => Mode::Navigation,
        }
    }

    /// Whether the keyboard panel is shown in this mode
    pub fn panel_visible(self) -> bool {
        matches!(self, Mode::Navigation)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Navigation => write!(f, "Navigation"),
            Mode::Injection => write!(f, "Injection"),
        }
    }
}

/// Result of an accepted toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Mode,
    pub to: Mode,
}

#[derive(Debug, Clone)]
pub struct ModeMachine {
    mode: Mode,
    last_toggle: Option<DateTime<Local>>,
    debounce: Duration,
}

impl Default for ModeMachine {
    fn default() -> Self {
        Self::new(Duration::milliseconds(TOGGLE_DEBOUNCE_MS))
    }
}

impl ModeMachine {
    pub fn new(debounce: Duration) -> Self {
        Self {
            mode: Mode::default(),
            last_toggle: None,
            debounce,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Handles a toggle press at `at`.
    ///
    /// Presses closer than the debounce window to the last accepted toggle
    /// are dropped. `at` is the controller timestamp, so presses queued while
    /// the reader was settling are still measured against the real press time.
    pub fn toggle(&mut self, at: DateTime<Local>) -> Option<Transition> {
        if let Some(last) = self.last_toggle {
            let elapsed = at - last;
            if elapsed < self.debounce {
                debug!(
                    "Ignoring mode toggle {}ms after the previous one",
                    elapsed.num_milliseconds()
                );
                return None;
            }
        }

        let transition = Transition {
            from: self.mode,
            to: self.mode.other(),
        };
        self.mode = transition.to;
        self.last_toggle = Some(at);
        info!("Mode changed: {} -> {}", transition.from, transition.to);
        Some(transition)
    }
}

/// What a discrete stick direction does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StickAction {
    /// Step the focus cursor
    MoveFocus { dx: i32, dy: i32 },
    /// Invoke a fixed layout element, by index
    Activate(usize),
    Nothing,
}

/// Direction table for one mode, keyed by the sign of the raw stick value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StickBindings {
    pub positive_x: StickAction,
    pub negative_x: StickAction,
    pub positive_y: StickAction,
    pub negative_y: StickAction,
}

impl StickBindings {
    /// Navigation table: every direction steps the focus.
    pub fn navigation(orientation: Orientation) -> Self {
        let sign = if orientation.invert_navigation { -1 } else { 1 };
        Self {
            positive_x: StickAction::MoveFocus { dx: sign, dy: 0 },
            negative_x: StickAction::MoveFocus { dx: -sign, dy: 0 },
            positive_y: StickAction::MoveFocus { dx: 0, dy: sign },
            negative_y: StickAction::MoveFocus { dx: 0, dy: -sign },
        }
    }

    /// Injection table: directions press the movement keys of the layout.
    pub fn injection(layout: &KeyboardLayout) -> Self {
        let resolve = |id: &str| match layout.index_of(id) {
            Some(index) => StickAction::Activate(index),
            None => {
                warn!("Layout has no '{}' key, direction left unbound", id);
                StickAction::Nothing
            }
        };
        Self {
            positive_x: resolve("D"),
            negative_x: resolve("A"),
            positive_y: resolve("S"),
            negative_y: resolve("W"),
        }
    }

    pub fn horizontal(&self, direction: i8) -> &StickAction {
        match direction.signum() {
            1 => &self.positive_x,
            -1 => &self.negative_x,
            _ => &StickAction::Nothing,
        }
    }

    pub fn vertical(&self, direction: i8) -> &StickAction {
        match direction.signum() {
            1 => &self.positive_y,
            -1 => &self.negative_y,
            _ => &StickAction::Nothing,
        }
    }
}

/// Both direction tables, selected by mode
#[derive(Debug, Clone)]
pub struct ModeBindings {
    navigation: StickBindings,
    injection: StickBindings,
}

impl ModeBindings {
    pub fn new(layout: &KeyboardLayout, orientation: Orientation) -> Self {
        Self {
            navigation: StickBindings::navigation(orientation),
            injection: StickBindings::injection(layout),
        }
    }

    pub fn sticks(&self, mode: Mode) -> &StickBindings {
        match mode {
            Mode::Navigation => &self.navigation,
            Mode::Injection => &self.injection,
        }
    }
}

/// What a controller button does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    ToggleMode,
    ActivateFocus,
    /// Held for as long as the controller button is held
    Mouse(MouseButton),
    /// One wheel step per press
    Wheel(i32),
}

const SHARED_BUTTONS: &[(PadButton, ButtonAction)] = &[
    (PadButton::Guide, ButtonAction::ToggleMode),
    (PadButton::LeftBumper, ButtonAction::Mouse(MouseButton::Left)),
    (PadButton::RightBumper, ButtonAction::Mouse(MouseButton::Right)),
    (PadButton::LeftTrigger, ButtonAction::Wheel(1)),
    (PadButton::RightTrigger, ButtonAction::Wheel(-1)),
];

const NAVIGATION_BUTTONS: &[(PadButton, ButtonAction)] =
    &[(PadButton::RightThumb, ButtonAction::ActivateFocus)];

const INJECTION_BUTTONS: &[(PadButton, ButtonAction)] = &[];

/// Looks up the binding of `button` in `mode`.
pub fn button_action(mode: Mode, button: PadButton) -> Option<ButtonAction> {
    let specific = match mode {
        Mode::Navigation => NAVIGATION_BUTTONS,
        Mode::Injection => INJECTION_BUTTONS,
    };
    specific
        .iter()
        .chain(SHARED_BUTTONS.iter())
        .find(|(bound, _)| *bound == button)
        .map(|(_, action)| *action)
}
