//! In-memory form host for native builds and tests.

use super::{FormHost, Notice};
use serde_json::Value;
use std::collections::BTreeMap;

/// Form state kept in a map keyed by state path.
///
/// Writing an object onto an object merges the keys, so the coordinate and
/// GeoJSON slots can share one state path like they do in Livewire forms.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    state: BTreeMap<String, Value>,
    hidden_field: Option<String>,
    csrf_token: Option<String>,
    /// Number of refresh requests received.
    pub refreshes: usize,
    /// Every notice shown so far.
    pub notices: Vec<Notice>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host with an (empty) hidden GeoJSON input.
    pub fn with_hidden_field(mut self, text: impl Into<String>) -> Self {
        self.hidden_field = Some(text.into());
        self
    }

    pub fn with_state(mut self, path: impl Into<String>, value: Value) -> Self {
        self.state.insert(path.into(), value);
        self
    }

    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    /// Replaces a state path without merging, as a server round-trip would.
    pub fn put(&mut self, path: &str, value: Value) {
        self.state.insert(path.to_string(), value);
    }

    /// Every state path written so far.
    pub fn state(&self) -> &BTreeMap<String, Value> {
        &self.state
    }
}

impl FormHost for MemoryHost {
    fn get(&self, path: &str) -> Value {
        self.state.get(path).cloned().unwrap_or(Value::Null)
    }

    fn set(&mut self, path: &str, value: Value) {
        match (self.state.get_mut(path), value) {
            (Some(Value::Object(current)), Value::Object(incoming)) => {
                for (key, v) in incoming {
                    current.insert(key, v);
                }
            }
            (_, value) => {
                self.state.insert(path.to_string(), value);
            }
        }
    }

    fn refresh(&mut self) {
        self.refreshes += 1;
    }

    fn hidden_field(&self) -> Option<String> {
        self.hidden_field.clone()
    }

    fn set_hidden_field(&mut self, text: &str) {
        if let Some(field) = self.hidden_field.as_mut() {
            *field = text.to_string();
        }
    }

    fn csrf_token(&self) -> Option<String> {
        self.csrf_token.clone()
    }

    fn notify(&mut self, notice: &Notice) {
        log::info!("Notice: {}", notice);
        self.notices.push(notice.clone());
    }
}
