//! Outbound instructions produced by the controller.

use crate::services::UploadRequest;
use serde_json::Value;

/// Which form slot a state write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateSlot {
    /// `{lat, lng}` of the marker or map center.
    Location,
    /// `{geojson: "<document>"}` of the drawn shapes.
    GeoJson,
}

/// Why a device position was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatePurpose {
    /// No usable coordinate at activation; apply the configured zoom on success.
    Start,
    /// The location button was pressed.
    Button,
    /// Realtime polling tick.
    Poll,
}

/// Severity of a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
    /// Must be acknowledged before the user continues (an `alert`).
    Blocking,
}

/// A message shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    pub fn blocking(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Blocking, message)
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.level, self.message)
    }
}

/// Something the runtime must do on the controller's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Silent write of a form state path.
    SetState {
        slot: StateSlot,
        path: String,
        value: Value,
    },
    /// Server round-trip of the form.
    Refresh,
    /// New text of the hidden GeoJSON input.
    WriteHiddenField(String),
    Notify(Notice),
    /// Fetch remote GeoJSON for an overlay.
    FetchOverlay {
        generation: u64,
        layer: String,
        url: String,
    },
    /// Ask the device for its position.
    RequestLocation {
        generation: u64,
        purpose: LocatePurpose,
    },
    /// Post a rendered snapshot to the upload endpoint.
    UploadSnapshot(UploadRequest),
}

impl Effect {
    pub fn notify(notice: Notice) -> Self {
        Effect::Notify(notice)
    }
}
