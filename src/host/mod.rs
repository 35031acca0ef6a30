//! The hosting form, as seen by the controller.
//!
//! The controller never talks to the form directly. It reads a cached
//! [`HostSnapshot`] and answers every message with a list of [`Effect`]s that
//! the runtime applies to a [`FormHost`]: the Livewire bridge on the web, or
//! the in-memory [`MemoryHost`] on native builds and in tests.

mod effects;
mod events;
mod memory;

pub use effects::{Effect, LocatePurpose, Notice, NoticeLevel, StateSlot};
pub use events::{EventError, HostEvent};
pub use memory::MemoryHost;

use crate::config::MapConfig;
use serde_json::Value;

/// The parts of the form state the controller reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostSnapshot {
    /// Value at the coordinate state path (`Null` when unset).
    pub location: Value,
    /// Value of the range input, if configured.
    pub range: Value,
    /// Hidden GeoJSON input; `None` when the element does not exist.
    pub hidden_field: Option<String>,
    pub csrf_token: Option<String>,
}

impl HostSnapshot {
    /// Reads everything the controller needs from `host`.
    pub fn read(host: &dyn FormHost, config: &MapConfig) -> Self {
        Self {
            location: host.get(&config.state_path),
            range: config
                .range_select_field
                .as_deref()
                .map(|path| host.get(path))
                .unwrap_or(Value::Null),
            hidden_field: host.hidden_field(),
            csrf_token: host.csrf_token(),
        }
    }
}

/// Reactive form state plus the DOM pieces the field relies on.
pub trait FormHost {
    /// Reads the value at a state path, `Null` when unset.
    fn get(&self, path: &str) -> Value;

    /// Writes a state path without triggering a server round-trip.
    fn set(&mut self, path: &str, value: Value);

    /// Asks the form to re-render from the server.
    fn refresh(&mut self);

    /// Current text of the hidden GeoJSON input, `None` if it is missing.
    fn hidden_field(&self) -> Option<String>;

    /// Replaces the hidden input's text; ignored when it is missing.
    fn set_hidden_field(&mut self, text: &str);

    fn csrf_token(&self) -> Option<String>;

    /// Shows a message to the user.
    fn notify(&mut self, notice: &Notice);

    /// Applies a state effect. Service effects are not handled here.
    fn apply(&mut self, effect: &Effect) {
        match effect {
            Effect::SetState { path, value, .. } => self.set(path, value.clone()),
            Effect::Refresh => self.refresh(),
            Effect::WriteHiddenField(text) => self.set_hidden_field(text),
            Effect::Notify(notice) => self.notify(notice),
            _ => {}
        }
    }
}
