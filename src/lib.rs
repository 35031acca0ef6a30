//! Map picker form field.
//!
//! A map embedded in a form lets the user pick a coordinate, draw shapes and
//! keep both synchronized with the form's state. The [`controller`] holds all
//! of the field's behavior and talks to the outside world through two seams:
//! a [`engine::MapEngine`] that renders the map, and a [`host::FormHost`] that
//! stores the form state. [`runtime::MapField`] ties them together with the
//! asynchronous [`services`].
//!
//! Browser builds expose the field to JavaScript through the `web` module;
//! native builds use the in-memory [`engine::HeadlessEngine`] and
//! [`host::MemoryHost`], which the playground binary and the tests rely on.

pub mod config;
pub mod controller;
pub mod engine;
pub mod geo;
pub mod host;
pub mod runtime;
pub mod services;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use config::MapConfig;
pub use controller::{MapController, MapMessage};
pub use runtime::MapField;
