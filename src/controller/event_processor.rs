use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

use crate::config::{InputConfig, Orientation};
use crate::controller::event_collector::{ButtonState, ControllerEvent, PadAxis, PadButton};
use crate::controller::motion::SharedMotion;
use crate::controller::signal::{discretize, normalize};
use crate::device::SharedDevice;
use crate::mode::{button_action, ButtonAction, Mode, ModeBindings, ModeMachine, StickAction};
use crate::navigation::{FocusNavigator, KeyboardLayout};
use crate::ui::PanelControl;

/// Blocking pause after an accepted mode toggle
pub const MODE_SETTLE: Duration = Duration::from_millis(200);

/// What the reader loop should do after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Continue,
    /// Block for the given time before polling again
    Settle(Duration),
}

// Processor settings
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessorSettings {
    pub deadzone: i32,
    pub sensitivity: f32,
    pub orientation: Orientation,
}

impl ProcessorSettings {
    pub fn new(input: &InputConfig, orientation: Orientation) -> Self {
        Self {
            deadzone: input.deadzone,
            sensitivity: input.sensitivity,
            orientation,
        }
    }
}

// Last raw value per left-stick axis
#[derive(Debug, Clone, Copy, Default)]
struct StickCache {
    x: i32,
    y: i32,
}

/// Routes controller events to the focus navigator, the UI, the virtual
/// device and the shared motion state according to the current mode.
///
/// Owned by the reader thread; everything in here except [`SharedMotion`]
/// and [`SharedDevice`] is single-threaded.
#[derive(Debug)]
pub struct EventProcessor {
    settings: ProcessorSettings,
    modes: ModeMachine,
    bindings: ModeBindings,
    navigator: FocusNavigator,
    left_stick: StickCache,
    last_direction: (i8, i8),
    motion: SharedMotion,
    device: SharedDevice,
    panel: Box<dyn PanelControl>,
}

impl EventProcessor {
    /// Creates the processor and announces the initial focus to the UI.
    pub fn create(
        layout: Arc<KeyboardLayout>,
        settings: ProcessorSettings,
        motion: SharedMotion,
        device: SharedDevice,
        panel: Box<dyn PanelControl>,
    ) -> Self {
        debug!("Creating Event Processor with settings: {:?}", settings);
        let bindings = ModeBindings::new(&layout, settings.orientation);
        let navigator = FocusNavigator::new(layout);
        navigator.announce(panel.as_ref());

        Self {
            settings,
            modes: ModeMachine::default(),
            bindings,
            navigator,
            left_stick: StickCache::default(),
            last_direction: (0, 0),
            motion,
            device,
            panel,
        }
    }

    pub fn mode(&self) -> Mode {
        self.modes.mode()
    }

    pub fn dispatch(&mut self, event: &ControllerEvent) -> Dispatch {
        match event {
            ControllerEvent::Axis { axis, value, .. } => {
                self.handle_axis(*axis, *value);
                Dispatch::Continue
            }
            ControllerEvent::Button {
                button,
                state,
                timestamp,
            } => self.handle_button(*button, *state, timestamp),
        }
    }

    fn handle_axis(&mut self, axis: PadAxis, value: i32) {
        let ProcessorSettings {
            deadzone,
            sensitivity,
            ..
        } = self.settings;

        match axis {
            // continuous motion is tracked in both modes
            PadAxis::RightX => self.motion.set_x(normalize(value, deadzone, sensitivity)),
            PadAxis::RightY => self.motion.set_y(normalize(value, deadzone, sensitivity)),
            PadAxis::LeftX => {
                self.left_stick.x = value;
                self.update_direction();
            }
            PadAxis::LeftY => {
                self.left_stick.y = value;
                self.update_direction();
            }
        }
    }

    fn update_direction(&mut self) {
        let deadzone = self.settings.deadzone;
        let direction = (
            discretize(self.left_stick.x, deadzone),
            discretize(self.left_stick.y, deadzone),
        );
        if direction == self.last_direction {
            return;
        }
        trace!("Stick direction {:?} -> {:?}", self.last_direction, direction);
        self.last_direction = direction;

        let table = self.bindings.sticks(self.modes.mode());
        let actions = [
            table.horizontal(direction.0).clone(),
            table.vertical(direction.1).clone(),
        ];
        for action in actions {
            self.run_stick_action(action);
        }
    }

    fn run_stick_action(&mut self, action: StickAction) {
        match action {
            StickAction::MoveFocus { dx, dy } => {
                self.navigator.move_focus(dx, dy, self.panel.as_ref());
            }
            StickAction::Activate(index) => {
                if let Some(element) = self.navigator.layout().get(index) {
                    self.panel.invoke_action(&element.id);
                }
            }
            StickAction::Nothing => {}
        }
    }

    fn handle_button(
        &mut self,
        button: PadButton,
        state: ButtonState,
        timestamp: &chrono::DateTime<Local>,
    ) -> Dispatch {
        let Some(action) = button_action(self.modes.mode(), button) else {
            trace!("{:?} unbound in {} mode", button, self.modes.mode());
            return Dispatch::Continue;
        };

        match (action, state) {
            (ButtonAction::Mouse(mouse), _) => {
                self.device
                    .lock()
                    .emit_mouse_button(mouse, state == ButtonState::Pressed);
            }
            (_, ButtonState::Released) => {}
            (ButtonAction::Wheel(direction), ButtonState::Pressed) => {
                self.device.lock().emit_wheel(direction);
            }
            (ButtonAction::ActivateFocus, ButtonState::Pressed) => {
                self.navigator.activate_current(self.panel.as_ref());
            }
            (ButtonAction::ToggleMode, ButtonState::Pressed) => {
                if let Some(transition) = self.modes.toggle(*timestamp) {
                    let visible = transition.to.panel_visible();
                    info!(
                        "{} keyboard panel",
                        if visible { "Showing" } else { "Hiding" }
                    );
                    self.panel.set_panel_visible(visible);
                    return Dispatch::Settle(MODE_SETTLE);
                }
            }
        }
        Dispatch::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::event_collector::testing::{axis, press, release};
    use crate::controller::motion::MotionVector;
    use crate::device::testing::{recording_device, RecordingSink, SYN};
    use crate::device::VirtualInputDevice;
    use crate::ui::testing::RecordingPanel;
    use crate::ui::UiCommand;
    use chrono::TimeZone;
    use evdev::{EventType, Key, RelativeAxisType};

    struct Harness {
        processor: EventProcessor,
        panel: RecordingPanel,
        sink: RecordingSink,
        motion: SharedMotion,
    }

    fn settings() -> ProcessorSettings {
        ProcessorSettings {
            deadzone: 400,
            sensitivity: 1.0,
            orientation: Orientation::default(),
        }
    }

    fn harness() -> Harness {
        let (device, sink) = recording_device(Orientation::default());
        let panel = RecordingPanel::default();
        let motion = SharedMotion::default();
        let mut processor = EventProcessor::create(
            Arc::new(KeyboardLayout::standard()),
            settings(),
            motion.clone(),
            SharedDevice::new(device),
            Box::new(panel.clone()),
        );
        // walk from ESC to G, the centre of the letter block
        let steps = [(0, 1), (0, 1), (0, 1), (1, 0), (1, 0), (1, 0), (1, 0), (1, 0)];
        for (dx, dy) in steps {
            assert!(processor.navigator.move_focus(dx, dy, &panel));
        }
        assert_eq!(processor.navigator.current().unwrap().id, "G");
        panel.clear();
        Harness {
            processor,
            panel,
            sink,
            motion,
        }
    }

    fn guide_at(ms: i64) -> ControllerEvent {
        ControllerEvent::Button {
            button: PadButton::Guide,
            state: ButtonState::Pressed,
            timestamp: Local.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap(),
        }
    }

    #[test]
    fn creation_announces_initial_focus() {
        let panel = RecordingPanel::default();
        let processor = EventProcessor::create(
            Arc::new(KeyboardLayout::standard()),
            settings(),
            SharedMotion::default(),
            SharedDevice::new(VirtualInputDevice::inert(Orientation::default())),
            Box::new(panel.clone()),
        );
        assert_eq!(processor.mode(), Mode::Navigation);
        assert_eq!(panel.commands(), vec![UiCommand::MoveFocus("ESC".into())]);
    }

    #[test]
    fn held_stick_moves_focus_once_per_direction_change() {
        let mut h = harness();

        // negative raw X beyond the deadzone steps right
        for _ in 0..5 {
            h.processor.dispatch(&axis(PadAxis::LeftX, -600));
        }
        assert_eq!(h.panel.commands(), vec![UiCommand::MoveFocus("H".into())]);

        h.processor.dispatch(&axis(PadAxis::LeftX, -100));
        h.processor.dispatch(&axis(PadAxis::LeftX, -650));
        assert_eq!(
            h.panel.commands(),
            vec![
                UiCommand::MoveFocus("H".into()),
                UiCommand::MoveFocus("J".into())
            ]
        );
    }

    #[test]
    fn positive_raw_y_moves_focus_up() {
        let mut h = harness();
        h.processor.dispatch(&axis(PadAxis::LeftY, 900));
        assert_eq!(h.panel.commands(), vec![UiCommand::MoveFocus("T".into())]);
    }

    #[test]
    fn injection_mode_presses_movement_keys() {
        let mut h = harness();
        assert_eq!(h.processor.dispatch(&guide_at(0)), Dispatch::Settle(MODE_SETTLE));
        assert_eq!(h.processor.mode(), Mode::Injection);
        h.panel.clear();

        h.processor.dispatch(&axis(PadAxis::LeftX, 800));
        h.processor.dispatch(&axis(PadAxis::LeftX, 820));
        h.processor.dispatch(&axis(PadAxis::LeftY, -800));
        h.processor.dispatch(&axis(PadAxis::LeftX, 0));

        assert_eq!(
            h.panel.commands(),
            vec![
                UiCommand::Invoke("D".into()),
                // diagonal re-fires the held horizontal direction
                UiCommand::Invoke("D".into()),
                UiCommand::Invoke("W".into()),
                UiCommand::Invoke("W".into()),
            ]
        );
        assert_eq!(h.processor.navigator.current().unwrap().id, "G");
    }

    #[test]
    fn mode_toggle_hides_and_shows_the_panel_with_debounce() {
        let mut h = harness();
        assert_eq!(h.processor.dispatch(&guide_at(0)), Dispatch::Settle(MODE_SETTLE));
        assert_eq!(h.processor.dispatch(&guide_at(150)), Dispatch::Continue);
        assert_eq!(h.processor.dispatch(&guide_at(400)), Dispatch::Settle(MODE_SETTLE));

        assert_eq!(
            h.panel.commands(),
            vec![UiCommand::SetVisible(false), UiCommand::SetVisible(true)]
        );
        assert_eq!(h.processor.mode(), Mode::Navigation);
    }

    #[test]
    fn right_thumb_activates_focus_only_in_navigation() {
        let mut h = harness();
        h.processor.dispatch(&press(PadButton::RightThumb));
        h.processor.dispatch(&release(PadButton::RightThumb));
        assert_eq!(h.panel.commands(), vec![UiCommand::Invoke("G".into())]);

        h.processor.dispatch(&guide_at(0));
        h.panel.clear();
        h.processor.dispatch(&press(PadButton::RightThumb));
        assert!(h.panel.commands().is_empty());
    }

    #[test]
    fn bumpers_and_triggers_drive_the_mouse_in_both_modes() {
        let mut h = harness();
        let key = |k: Key, v: i32| (EventType::KEY, k.code(), v);
        let wheel = |v: i32| (EventType::RELATIVE, RelativeAxisType::REL_WHEEL.0, v);

        for toggle_at in [0, 1000] {
            h.sink.clear();
            h.processor.dispatch(&press(PadButton::LeftBumper));
            h.processor.dispatch(&release(PadButton::LeftBumper));
            h.processor.dispatch(&press(PadButton::RightBumper));
            h.processor.dispatch(&release(PadButton::RightBumper));
            h.processor.dispatch(&press(PadButton::LeftTrigger));
            h.processor.dispatch(&release(PadButton::LeftTrigger));
            h.processor.dispatch(&press(PadButton::RightTrigger));

            assert_eq!(
                h.sink.triples(),
                vec![
                    key(Key::BTN_LEFT, 1),
                    SYN,
                    key(Key::BTN_LEFT, 0),
                    SYN,
                    key(Key::BTN_RIGHT, 1),
                    SYN,
                    key(Key::BTN_RIGHT, 0),
                    SYN,
                    wheel(1),
                    SYN,
                    wheel(-1),
                    SYN,
                ]
            );
            h.processor.dispatch(&guide_at(toggle_at));
        }
    }

    #[test]
    fn right_stick_updates_shared_motion_in_both_modes() {
        let mut h = harness();
        h.processor.dispatch(&axis(PadAxis::RightX, 900));
        h.processor.dispatch(&axis(PadAxis::RightY, 100));
        assert_eq!(h.motion.load(), MotionVector { x: 0.5, y: 0.0 });

        h.processor.dispatch(&guide_at(0));
        h.processor.dispatch(&axis(PadAxis::RightY, -1800));
        assert_eq!(h.motion.load(), MotionVector { x: 0.5, y: -1.0 });
        assert!(h.panel.commands().iter().all(|c| !matches!(c, UiCommand::MoveFocus(_))));
    }

    #[test]
    fn navigation_keeps_working_without_a_virtual_device() {
        let panel = RecordingPanel::default();
        let mut processor = EventProcessor::create(
            Arc::new(KeyboardLayout::standard()),
            settings(),
            SharedMotion::default(),
            SharedDevice::new(VirtualInputDevice::inert(Orientation::default())),
            Box::new(panel.clone()),
        );
        panel.clear();

        processor.dispatch(&press(PadButton::LeftBumper));
        processor.dispatch(&press(PadButton::LeftTrigger));
        processor.dispatch(&axis(PadAxis::LeftX, -600));
        assert_eq!(panel.commands(), vec![UiCommand::MoveFocus("F1".into())]);

        assert_eq!(processor.dispatch(&guide_at(0)), Dispatch::Settle(MODE_SETTLE));
        assert_eq!(processor.mode(), Mode::Injection);
    }
}
