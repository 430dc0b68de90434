//! Single-threaded dispatch queue of the on-screen keyboard
//!
//! Runs as a tokio task next to the egui event loop. Commands are applied in
//! arrival order; the egui frame only ever reads the resulting [`PanelView`],
//! so typing and visibility changes keep working while the window is hidden
//! and egui stops scheduling frames.

use eframe::egui::{Context, ViewportCommand};
use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::UiCommand;
use crate::device::SharedDevice;
use crate::navigation::KeyboardLayout;

/// What the keyboard panel draws
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelView {
    pub focused: Option<usize>,
    pub visible: bool,
    /// Modifiers waiting to wrap the next key press
    pub latched: BTreeSet<usize>,
    pub last_pressed: Option<String>,
}

impl Default for PanelView {
    fn default() -> Self {
        Self {
            focused: None,
            visible: true,
            latched: BTreeSet::new(),
            last_pressed: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SharedPanelView(Arc<RwLock<PanelView>>);

impl SharedPanelView {
    pub fn read(&self) -> RwLockReadGuard<'_, PanelView> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, PanelView> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
pub struct PanelDispatcher {
    layout: Arc<KeyboardLayout>,
    view: SharedPanelView,
    device: SharedDevice,
}

impl PanelDispatcher {
    pub fn new(layout: Arc<KeyboardLayout>, view: SharedPanelView, device: SharedDevice) -> Self {
        Self {
            layout,
            view,
            device,
        }
    }

    /// Applies one command to the view and, for key invocations, the device.
    pub fn apply(&mut self, command: &UiCommand) {
        match command {
            UiCommand::MoveFocus(id) => match self.layout.index_of(id) {
                Some(index) => self.view.write().focused = Some(index),
                None => warn!("Cannot focus unknown key '{}'", id),
            },
            UiCommand::Invoke(id) => match self.layout.index_of(id) {
                Some(index) => self.invoke(index),
                None => warn!("Cannot invoke unknown key '{}'", id),
            },
            UiCommand::SetVisible(visible) => {
                debug!("Keyboard panel visible: {}", visible);
                self.view.write().visible = *visible;
            }
        }
    }

    fn invoke(&mut self, index: usize) {
        let Some(element) = self.layout.get(index) else {
            return;
        };
        let mut view = self.view.write();

        if element.is_modifier() {
            if view.latched.remove(&index) {
                debug!("Released latched modifier '{}'", element.id);
            } else {
                debug!("Latched modifier '{}'", element.id);
                view.latched.insert(index);
            }
            return;
        }

        let modifiers: Vec<_> = view
            .latched
            .iter()
            .filter_map(|i| self.layout.get(*i))
            .map(|m| m.key)
            .collect();

        let mut device = self.device.lock();
        for key in &modifiers {
            device.emit_key(*key, true);
        }
        device.tap_key(element.key);
        for key in modifiers.iter().rev() {
            device.emit_key(*key, false);
        }
        drop(device);

        debug!("Typed '{}' with {} modifier(s)", element.id, modifiers.len());
        view.latched.clear();
        view.last_pressed = Some(element.id.clone());
    }

    /// Drains `commands` until every sender is gone or `shutdown` fires.
    ///
    /// With an egui context, visibility commands are forwarded to the native
    /// window and the window is closed on shutdown.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<UiCommand>,
        ctx: Option<Context>,
        shutdown: CancellationToken,
    ) {
        info!("Keyboard panel dispatcher started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, closing keyboard panel");
                    if let Some(ctx) = &ctx {
                        ctx.send_viewport_cmd(ViewportCommand::Close);
                    }
                    break;
                }
                command = commands.recv() => {
                    let Some(command) = command else {
                        debug!("All UI handles dropped");
                        break;
                    };
                    self.apply(&command);
                    if let Some(ctx) = &ctx {
                        if let UiCommand::SetVisible(visible) = command {
                            ctx.send_viewport_cmd(ViewportCommand::Visible(visible));
                        }
                        ctx.request_repaint();
                    }
                }
            }
        }
        info!("Keyboard panel dispatcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Orientation;
    use crate::device::testing::{recording_device, RecordingSink, SYN};
    use crate::ui::{PanelControl, UiHandle};
    use evdev::{EventType, Key};

    fn dispatcher() -> (PanelDispatcher, SharedPanelView, RecordingSink) {
        let (device, sink) = recording_device(Orientation::default());
        let view = SharedPanelView::default();
        let dispatcher = PanelDispatcher::new(
            Arc::new(KeyboardLayout::standard()),
            view.clone(),
            SharedDevice::new(device),
        );
        (dispatcher, view, sink)
    }

    fn key(key: Key, value: i32) -> (EventType, u16, i32) {
        (EventType::KEY, key.code(), value)
    }

    #[test]
    fn focus_and_visibility_update_the_view() {
        let (mut dispatcher, view, sink) = dispatcher();
        dispatcher.apply(&UiCommand::MoveFocus("Q".into()));
        dispatcher.apply(&UiCommand::SetVisible(false));

        let layout = KeyboardLayout::standard();
        let snapshot = view.read().clone();
        assert_eq!(snapshot.focused, layout.index_of("Q"));
        assert!(!snapshot.visible);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn invoking_a_key_taps_it() {
        let (mut dispatcher, view, sink) = dispatcher();
        dispatcher.apply(&UiCommand::Invoke("A".into()));

        assert_eq!(
            sink.triples(),
            vec![key(Key::KEY_A, 1), SYN, key(Key::KEY_A, 0), SYN]
        );
        assert_eq!(view.read().last_pressed.as_deref(), Some("A"));
    }

    #[test]
    fn latched_modifier_wraps_the_next_key_once() {
        let (mut dispatcher, view, sink) = dispatcher();
        dispatcher.apply(&UiCommand::Invoke("SHIFT".into()));
        assert!(sink.events().is_empty());
        assert_eq!(view.read().latched.len(), 1);

        dispatcher.apply(&UiCommand::Invoke("Q".into()));
        assert_eq!(
            sink.triples(),
            vec![
                key(Key::KEY_LEFTSHIFT, 1),
                SYN,
                key(Key::KEY_Q, 1),
                SYN,
                key(Key::KEY_Q, 0),
                SYN,
                key(Key::KEY_LEFTSHIFT, 0),
                SYN,
            ]
        );
        assert!(view.read().latched.is_empty());

        sink.clear();
        dispatcher.apply(&UiCommand::Invoke("Q".into()));
        assert_eq!(
            sink.triples(),
            vec![key(Key::KEY_Q, 1), SYN, key(Key::KEY_Q, 0), SYN]
        );
    }

    #[test]
    fn invoking_a_latched_modifier_again_unlatches_it() {
        let (mut dispatcher, view, sink) = dispatcher();
        dispatcher.apply(&UiCommand::Invoke("CTRL".into()));
        dispatcher.apply(&UiCommand::Invoke("CTRL".into()));
        assert!(view.read().latched.is_empty());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let (mut dispatcher, view, sink) = dispatcher();
        dispatcher.apply(&UiCommand::Invoke("NOPE".into()));
        dispatcher.apply(&UiCommand::MoveFocus("NOPE".into()));
        assert!(sink.events().is_empty());
        assert_eq!(*view.read(), PanelView::default());
    }

    #[tokio::test]
    async fn run_applies_commands_in_order_until_handles_drop() {
        let (dispatcher, view, sink) = dispatcher();
        let (handle, receiver) = UiHandle::channel();

        handle.move_visual_focus("W");
        handle.invoke_action("W");
        handle.set_panel_visible(false);
        drop(handle);

        dispatcher
            .run(receiver, None, CancellationToken::new())
            .await;

        let layout = KeyboardLayout::standard();
        let snapshot = view.read().clone();
        assert_eq!(snapshot.focused, layout.index_of("W"));
        assert_eq!(snapshot.last_pressed.as_deref(), Some("W"));
        assert!(!snapshot.visible);
        assert_eq!(sink.triples().len(), 4);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let (dispatcher, _view, _sink) = dispatcher();
        let (_handle, receiver) = UiHandle::channel();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        dispatcher.run(receiver, None, shutdown).await;
    }
}
