//! Device position lookups.

use crate::geo::LatLng;
use crate::host::LocatePurpose;
use std::sync::mpsc::{channel, Receiver, Sender};

/// Errors reported by the geolocation capability.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationError {
    /// The platform has no geolocation support.
    Unsupported,
    /// The user refused to share the position.
    PermissionDenied,
    /// The position could not be determined.
    Unavailable(String),
    Timeout,
}

impl std::fmt::Display for LocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocationError::Unsupported => {
                write!(f, "Geolocation is not supported by this browser.")
            }
            LocationError::PermissionDenied => write!(f, "Location access was denied."),
            LocationError::Unavailable(msg) => {
                write!(f, "Error fetching current location: {}", msg)
            }
            LocationError::Timeout => write!(f, "Timed out while fetching current location."),
        }
    }
}

impl std::error::Error for LocationError {}

/// A finished position request.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationFix {
    /// Lifecycle generation that asked for the position.
    pub generation: u64,
    pub purpose: LocatePurpose,
    pub result: Result<LatLng, LocationError>,
}

/// Channel bridging position requests to the run loop.
pub struct LocationChannel {
    sender: Sender<LocationFix>,
    receiver: Receiver<LocationFix>,
    /// Position reported on native builds, where there is no device API.
    #[cfg_attr(target_arch = "wasm32", allow(dead_code))]
    simulated: Option<LatLng>,
}

impl Default for LocationChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationChannel {
    pub fn new() -> Self {
        let (sender, receiver) = channel();
        Self {
            sender,
            receiver,
            simulated: None,
        }
    }

    /// Channel that answers every request with a fixed position.
    pub fn simulated(position: LatLng) -> Self {
        Self {
            simulated: Some(position),
            ..Self::new()
        }
    }

    pub fn set_simulated(&mut self, position: Option<LatLng>) {
        self.simulated = position;
    }

    /// Asks the browser for the current position.
    #[cfg(target_arch = "wasm32")]
    pub fn request(&self, generation: u64, purpose: LocatePurpose) {
        let sender = self.sender.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let result = current_position().await;
            if let Err(e) = &result {
                log::warn!("Geolocation failed: {}", e);
            }
            let _ = sender.send(LocationFix {
                generation,
                purpose,
                result,
            });
        });
    }

    /// Native builds answer immediately with the simulated position, if any.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn request(&self, generation: u64, purpose: LocatePurpose) {
        let result = self.simulated.ok_or(LocationError::Unsupported);
        let _ = self.sender.send(LocationFix {
            generation,
            purpose,
            result,
        });
    }

    /// Non-blocking check for a finished request.
    pub fn try_recv(&self) -> Option<LocationFix> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(target_arch = "wasm32")]
async fn current_position() -> Result<LatLng, LocationError> {
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::{JsCast, JsValue};

    let geolocation = web_sys::window()
        .and_then(|w| w.navigator().geolocation().ok())
        .ok_or(LocationError::Unsupported)?;

    let (tx, rx) = futures_channel::oneshot::channel::<Result<LatLng, LocationError>>();
    let tx = Rc::new(RefCell::new(Some(tx)));

    let tx_success = tx.clone();
    let on_success = Closure::once(move |position: JsValue| {
        let result = read_coords(&position);
        if let Some(tx) = tx_success.borrow_mut().take() {
            let _ = tx.send(result);
        }
    });

    let tx_error = tx.clone();
    let on_error = Closure::once(move |error: JsValue| {
        let code = js_sys::Reflect::get(&error, &"code".into())
            .ok()
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0) as u16;
        let message = js_sys::Reflect::get(&error, &"message".into())
            .ok()
            .and_then(|v| v.as_string())
            .unwrap_or_default();
        let result = Err(match code {
            1 => LocationError::PermissionDenied,
            3 => LocationError::Timeout,
            _ => LocationError::Unavailable(message),
        });
        if let Some(tx) = tx_error.borrow_mut().take() {
            let _ = tx.send(result);
        }
    });

    let options = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&options, &"enableHighAccuracy".into(), &JsValue::TRUE);

    geolocation
        .get_current_position_with_error_callback_and_options(
            on_success.as_ref().unchecked_ref(),
            Some(on_error.as_ref().unchecked_ref()),
            options.unchecked_ref(),
        )
        .map_err(|e| LocationError::Unavailable(format!("{:?}", e)))?;

    let result = rx
        .await
        .unwrap_or_else(|_| Err(LocationError::Unavailable("request dropped".to_string())));
    drop(on_success);
    drop(on_error);
    result
}

#[cfg(target_arch = "wasm32")]
fn read_coords(position: &wasm_bindgen::JsValue) -> Result<LatLng, LocationError> {
    let coords = js_sys::Reflect::get(position, &"coords".into())
        .map_err(|_| LocationError::Unavailable("position has no coords".to_string()))?;
    let field = |name: &str| {
        js_sys::Reflect::get(&coords, &name.into())
            .ok()
            .and_then(|v| v.as_f64())
    };
    match (field("latitude"), field("longitude")) {
        (Some(lat), Some(lng)) => Ok(LatLng::new(lat, lng)),
        _ => Err(LocationError::Unavailable("position has no coordinates".to_string())),
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[test]
    fn test_native_reports_unsupported() {
        let channel = LocationChannel::new();
        assert!(channel.try_recv().is_none());
        channel.request(3, LocatePurpose::Button);
        let fix = channel.try_recv().unwrap();
        assert_eq!(fix.generation, 3);
        assert_eq!(fix.result, Err(LocationError::Unsupported));
    }

    #[test]
    fn test_simulated_position() {
        let channel = LocationChannel::simulated(LatLng::new(48.85, 2.35));
        channel.request(1, LocatePurpose::Start);
        let fix = channel.try_recv().unwrap();
        assert_eq!(fix.purpose, LocatePurpose::Start);
        assert_eq!(fix.result, Ok(LatLng::new(48.85, 2.35)));
    }
}
