//! UI modules for the map picker playground.
//!
//! The UI is split into distinct panels:
//! - Top bar: title, lifecycle and marker status
//! - Left panel: the hosting form and its events
//! - Central canvas: the map surface
//! - Bottom panel: notices
//! - Right panel: layers, draw tools and shapes

mod bottom_panel;
mod canvas;
pub mod colors;
mod interaction;
mod left_panel;
mod right_panel;
mod top_bar;

pub use bottom_panel::{render_alert, render_bottom_panel};
pub use canvas::render_canvas;
pub use left_panel::render_left_panel;
pub use right_panel::render_right_panel;
pub use top_bar::render_top_bar;
