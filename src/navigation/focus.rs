use std::sync::Arc;
use tracing::{debug, warn};

use super::layout::{FocusElement, KeyboardLayout};
use crate::ui::PanelControl;

/// Cursor over the keyboard layout.
///
/// The cursor is always meant to index into the layout; every access is
/// still checked, and a broken cursor turns the operation into a no-op.
#[derive(Debug, Clone)]
pub struct FocusNavigator {
    layout: Arc<KeyboardLayout>,
    cursor: usize,
}

impl FocusNavigator {
    pub fn new(layout: Arc<KeyboardLayout>) -> Self {
        Self { layout, cursor: 0 }
    }

    pub fn current(&self) -> Option<&FocusElement> {
        self.layout.get(self.cursor)
    }

    pub fn layout(&self) -> &Arc<KeyboardLayout> {
        &self.layout
    }

    /// Asks the UI to show focus on the current element.
    pub fn announce(&self, panel: &dyn PanelControl) {
        if let Some(current) = self.current() {
            panel.move_visual_focus(&current.id);
        }
    }

    /// Moves one step in the requested direction.
    ///
    /// Only elements strictly on the requested side qualify; among those the
    /// closest in squared (row, col) distance wins and ties go to the first
    /// one in layout order. Returns whether the cursor moved.
    pub fn move_focus(&mut self, dx: i32, dy: i32, panel: &dyn PanelControl) -> bool {
        let Some(current) = self.layout.get(self.cursor) else {
            warn!("Focus cursor {} is outside the layout", self.cursor);
            return false;
        };

        let mut best: Option<(usize, i32)> = None;
        for (index, candidate) in self.layout.elements().iter().enumerate() {
            if index == self.cursor || !lies_in_direction(current, candidate, dx, dy) {
                continue;
            }

            let dcol = candidate.col - current.col;
            let drow = candidate.row - current.row;
            let score = dcol * dcol + drow * drow;

            if best.map_or(true, |(_, best_score)| score < best_score) {
                best = Some((index, score));
            }
        }

        match best {
            Some((index, _)) => {
                self.cursor = index;
                debug!(
                    "Focus moved ({}, {}) to '{}'",
                    dx, dy, self.layout.elements()[index].id
                );
                self.announce(panel);
                true
            }
            None => {
                debug!("No focus target in direction ({}, {})", dx, dy);
                false
            }
        }
    }

    /// Requests the UI to invoke the focused element.
    pub fn activate_current(&self, panel: &dyn PanelControl) {
        match self.current() {
            Some(current) => {
                debug!("Activating '{}'", current.id);
                panel.invoke_action(&current.id);
            }
            None => warn!("Focus cursor {} is outside the layout", self.cursor),
        }
    }
}

fn lies_in_direction(current: &FocusElement, candidate: &FocusElement, dx: i32, dy: i32) -> bool {
    let horizontal = match dx.signum() {
        1 => candidate.col > current.col,
        -1 => candidate.col < current.col,
        _ => true,
    };
    let vertical = match dy.signum() {
        1 => candidate.row > current.row,
        -1 => candidate.row < current.row,
        _ => true,
    };
    horizontal && vertical
}
