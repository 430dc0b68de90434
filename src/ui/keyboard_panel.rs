//! egui rendering of the on-screen keyboard

use eframe::egui::{self, vec2, Button, Color32, Frame, RichText, Stroke, Vec2};
use std::sync::Arc;
use std::time::Duration;

use super::{PanelControl, SharedPanelView, UiHandle};
use crate::navigation::KeyboardLayout;

/// Width of a span-1 key in points
const KEY_UNIT: f32 = 40.0;
const KEY_HEIGHT: f32 = 30.0;
const KEY_GAP: f32 = 4.0;

pub struct PanelColors;

impl PanelColors {
    pub const BACKGROUND: Color32 = Color32::from_rgb(30, 30, 30);
    pub const KEY: Color32 = Color32::from_rgb(45, 45, 45);
    pub const BORDER: Color32 = Color32::from_rgb(60, 60, 60);
    /// Focus ring and fill
    pub const FOCUS: Color32 = Color32::from_rgb(50, 120, 200);
    /// Latched modifiers
    pub const LATCHED: Color32 = Color32::from_rgb(50, 200, 20);
}

/// How a key is drawn in the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyLook {
    Normal,
    Focused,
    Latched,
}

impl KeyLook {
    fn fill(self) -> Color32 {
        match self {
            KeyLook::Normal => PanelColors::KEY,
            KeyLook::Focused => PanelColors::FOCUS,
            KeyLook::Latched => PanelColors::LATCHED.gamma_multiply(0.5),
        }
    }

    fn stroke(self) -> Stroke {
        match self {
            KeyLook::Normal => Stroke::new(1.0, PanelColors::BORDER),
            KeyLook::Focused => Stroke::new(2.0, Color32::WHITE),
            KeyLook::Latched => Stroke::new(2.0, PanelColors::LATCHED),
        }
    }
}

fn key_size(span: i32) -> Vec2 {
    let span = span.max(1) as f32;
    vec2(span * KEY_UNIT + (span - 1.0) * KEY_GAP, KEY_HEIGHT)
}

/// eframe application drawing [`PanelView`](super::PanelView).
///
/// Clicks go through the same [`PanelControl::invoke_action`] path the
/// controller uses.
pub struct KeyboardPanel {
    layout: Arc<KeyboardLayout>,
    view: SharedPanelView,
    panel: UiHandle,
}

impl KeyboardPanel {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        layout: Arc<KeyboardLayout>,
        view: SharedPanelView,
        panel: UiHandle,
    ) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());
        Self {
            layout,
            view,
            panel,
        }
    }

    fn look(&self, index: usize, focused: Option<usize>, latched: bool) -> KeyLook {
        if focused == Some(index) {
            KeyLook::Focused
        } else if latched {
            KeyLook::Latched
        } else {
            KeyLook::Normal
        }
    }
}

impl eframe::App for KeyboardPanel {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Snapshot so the dispatcher is never blocked by rendering
        let view = self.view.read().clone();

        egui::CentralPanel::default()
            .frame(Frame::new().fill(PanelColors::BACKGROUND).inner_margin(6))
            .show(ctx, |ui| {
                ui.spacing_mut().item_spacing = vec2(KEY_GAP, KEY_GAP);
                for row in self.layout.rows() {
                    ui.horizontal(|ui| {
                        for (index, element) in row {
                            let look =
                                self.look(index, view.focused, view.latched.contains(&index));
                            let button = Button::new(RichText::new(&element.label).size(12.0))
                                .min_size(key_size(element.span))
                                .fill(look.fill())
                                .stroke(look.stroke());
                            if ui.add(button).clicked() {
                                self.panel.invoke_action(&element.id);
                            }
                        }
                    });
                }
            });

        ctx.request_repaint_after(Duration::from_millis(33));
    }
}
