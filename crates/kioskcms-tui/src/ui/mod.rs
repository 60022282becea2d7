//! Terminal UI module using ratatui.
//!
//! - `render`: frame layout, login form and console screen
//! - `input`: keyboard event handling
//! - `styles`: color scheme and text styling

pub mod input;
pub mod render;
pub mod styles;
