//! Grid focus navigation over the on-screen keyboard
//!
//! [`layout`] holds the static key grid, [`focus`] the cursor and the
//! nearest-neighbour-in-direction move rule.

pub mod focus;
pub mod layout;

pub use focus::FocusNavigator;
pub use layout::{FocusElement, KeyboardLayout};
