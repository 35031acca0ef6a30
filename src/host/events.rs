//! Named events dispatched to the field by the hosting form.

use crate::geo::{is_value_present, value_as_f64, LatLng};
use serde_json::Value;

/// Errors raised while decoding an inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventError {
    /// No handler exists for the event name.
    Unknown(String),
    /// A required payload field is absent.
    MissingField { event: &'static str, field: &'static str },
    /// A payload field has the wrong type or range.
    InvalidField {
        event: &'static str,
        field: &'static str,
        reason: String,
    },
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventError::Unknown(name) => write!(f, "Unknown map event '{}'", name),
            EventError::MissingField { event, field } => {
                write!(f, "Event '{}' is missing '{}'", event, field)
            }
            EventError::InvalidField {
                event,
                field,
                reason,
            } => write!(f, "Event '{}' has an invalid '{}': {}", event, field, reason),
        }
    }
}

impl std::error::Error for EventError {}

/// An inbound event from the hosting form.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// Fly to the stored coordinate and re-place the marker.
    RefreshMap,
    /// Rasterize the view and upload it.
    CaptureMapImage,
    /// Move the marker to a point, optionally recentering on it.
    UpdateMarkerPosition { at: LatLng, fix: bool },
    /// Swap the marker icon.
    UpdateMarkerIcon {
        url: Option<String>,
        size: Option<u32>,
        color: Option<String>,
    },
    /// Replace every drawn shape with a GeoJSON document.
    LoadGeoJson { geojson: String },
}

impl HostEvent {
    pub const REFRESH_MAP: &'static str = "refreshMap";
    pub const CAPTURE_MAP_IMAGE: &'static str = "captureMapImage";
    pub const UPDATE_MARKER_POSITION: &'static str = "updateMarkerPosition";
    pub const UPDATE_MARKER_ICON: &'static str = "updateMarkerIcon";
    pub const LOAD_GEOJSON: &'static str = "loadGeoJsonDataFromFile";

    /// Every event name the field listens for.
    pub const NAMES: [&'static str; 5] = [
        Self::REFRESH_MAP,
        Self::CAPTURE_MAP_IMAGE,
        Self::UPDATE_MARKER_POSITION,
        Self::UPDATE_MARKER_ICON,
        Self::LOAD_GEOJSON,
    ];

    /// Decodes a named event.
    ///
    /// Livewire delivers parameters either as an object or as a one-element
    /// array holding that object; both are accepted.
    pub fn from_named(name: &str, payload: &Value) -> Result<Self, EventError> {
        let payload = match payload {
            Value::Array(items) if items.len() == 1 => &items[0],
            other => other,
        };

        match name {
            Self::REFRESH_MAP => Ok(HostEvent::RefreshMap),
            Self::CAPTURE_MAP_IMAGE => Ok(HostEvent::CaptureMapImage),
            Self::UPDATE_MARKER_POSITION => {
                let event = Self::UPDATE_MARKER_POSITION;
                let lat = number_field(payload, event, "lat")?;
                let lng = number_field(payload, event, "lng")?;
                let at = LatLng::new(lat, lng);
                if !at.is_valid() {
                    return Err(EventError::InvalidField {
                        event,
                        field: "lat",
                        reason: format!("{} is out of range", at),
                    });
                }
                let fix = match payload.get("fix") {
                    None | Some(Value::Null) => false,
                    Some(Value::Bool(b)) => *b,
                    Some(other) => {
                        return Err(EventError::InvalidField {
                            event,
                            field: "fix",
                            reason: format!("expected a boolean, got {}", other),
                        })
                    }
                };
                Ok(HostEvent::UpdateMarkerPosition { at, fix })
            }
            Self::UPDATE_MARKER_ICON => {
                let text = |key: &str| {
                    payload
                        .get(key)
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                };
                let size = payload
                    .get("size")
                    .and_then(value_as_f64)
                    .filter(|s| *s >= 1.0)
                    .map(|s| s.round() as u32);
                Ok(HostEvent::UpdateMarkerIcon {
                    url: text("url"),
                    size,
                    color: text("color"),
                })
            }
            Self::LOAD_GEOJSON => {
                let raw = match payload {
                    Value::Object(map) if !map.is_empty() => {
                        map.get("geojson").ok_or(EventError::MissingField {
                            event: Self::LOAD_GEOJSON,
                            field: "geojson",
                        })?
                    }
                    _ => payload,
                };
                let geojson = match raw {
                    _ if !is_value_present(raw) => String::new(),
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Ok(HostEvent::LoadGeoJson { geojson })
            }
            other => Err(EventError::Unknown(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HostEvent::RefreshMap => Self::REFRESH_MAP,
            HostEvent::CaptureMapImage => Self::CAPTURE_MAP_IMAGE,
            HostEvent::UpdateMarkerPosition { .. } => Self::UPDATE_MARKER_POSITION,
            HostEvent::UpdateMarkerIcon { .. } => Self::UPDATE_MARKER_ICON,
            HostEvent::LoadGeoJson { .. } => Self::LOAD_GEOJSON,
        }
    }
}

fn number_field(
    payload: &Value,
    event: &'static str,
    field: &'static str,
) -> Result<f64, EventError> {
    let value = payload
        .get(field)
        .filter(|v| !v.is_null())
        .ok_or(EventError::MissingField { event, field })?;
    value_as_f64(value).ok_or_else(|| EventError::InvalidField {
        event,
        field,
        reason: format!("expected a number, got {}", value),
    })
}
