//! # On-screen keyboard UI
//!
//! The UI is a collaborator of the input pipeline, never a dependency of its
//! timing. The reader thread only ever talks to it through [`PanelControl`],
//! whose implementation [`UiHandle`] drops a [`UiCommand`] into an unbounded
//! channel and returns immediately.
//!
//! ```text
//! EventReader ──[UiCommand]──► PanelDispatcher ──► PanelView ──► KeyboardPanel (egui)
//!                               (tokio task)          │
//!                                    │                └──► viewport visibility
//!                                    └──► SharedDevice (typed keys)
//! ```
//!
//! The dispatcher is the UI's single-threaded dispatch queue: commands are
//! applied strictly in the order they were sent.

pub mod dispatcher;
pub mod keyboard_panel;

use std::fmt;
use tokio::sync::mpsc;
use tracing::debug;

pub use dispatcher::{PanelDispatcher, PanelView, SharedPanelView};
pub use keyboard_panel::KeyboardPanel;

/// Requests accepted by the UI collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    /// Move the visual focus to the key with this identifier
    MoveFocus(String),
    /// Invoke the action bound to the key with this identifier
    Invoke(String),
    /// Show or hide the keyboard panel
    SetVisible(bool),
}

/// Contract the input pipeline consumes from the UI.
///
/// All calls are fire-and-forget and safe from any thread.
pub trait PanelControl: Send + fmt::Debug {
    fn move_visual_focus(&self, element_id: &str);
    fn invoke_action(&self, element_id: &str);
    fn set_panel_visible(&self, visible: bool);
}

/// Channel-backed [`PanelControl`]
#[derive(Clone, Debug)]
pub struct UiHandle {
    sender: mpsc::UnboundedSender<UiCommand>,
}

impl UiHandle {
    /// Creates a handle and the receiving end for the dispatcher.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UiCommand>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn send(&self, command: UiCommand) {
        if let Err(e) = self.sender.send(command) {
            // UI already gone, typically during shutdown
            debug!("Dropping UI command {:?}: dispatcher closed", e.0);
        }
    }
}

impl PanelControl for UiHandle {
    fn move_visual_focus(&self, element_id: &str) {
        self.send(UiCommand::MoveFocus(element_id.to_string()));
    }

    fn invoke_action(&self, element_id: &str) {
        self.send(UiCommand::Invoke(element_id.to_string()));
    }

    fn set_panel_visible(&self, visible: bool) {
        self.send(UiCommand::SetVisible(visible));
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_enqueues_in_order() {
        let (handle, mut receiver) = UiHandle::channel();
        handle.move_visual_focus("Q");
        handle.invoke_action("Q");
        handle.set_panel_visible(false);

        assert_eq!(receiver.try_recv().unwrap(), UiCommand::MoveFocus("Q".into()));
        assert_eq!(receiver.try_recv().unwrap(), UiCommand::Invoke("Q".into()));
        assert_eq!(receiver.try_recv().unwrap(), UiCommand::SetVisible(false));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn sending_after_dispatcher_is_gone_does_not_panic() {
        let (handle, receiver) = UiHandle::channel();
        drop(receiver);
        handle.invoke_action("A");
        handle.set_panel_visible(true);
    }
}
