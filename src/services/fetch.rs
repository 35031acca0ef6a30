//! Remote GeoJSON downloads for overlay layers.

use std::sync::mpsc::{channel, Receiver, Sender};

/// Errors raised while downloading overlay data.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// The request could not be sent or the connection failed.
    Network(String),
    /// The server answered with a non-success status.
    Status(u16),
    /// The body is not JSON.
    Body(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Network(msg) => write!(f, "Network error: {}", msg),
            FetchError::Status(code) => write!(f, "Server responded with status {}", code),
            FetchError::Body(msg) => write!(f, "Response is not JSON: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

/// A finished overlay download.
#[derive(Debug, Clone)]
pub struct OverlayFetched {
    pub generation: u64,
    /// Overlay name the data belongs to.
    pub layer: String,
    pub result: Result<serde_json::Value, FetchError>,
}

/// Channel-based downloader for overlay GeoJSON.
pub struct OverlayChannel {
    sender: Sender<OverlayFetched>,
    receiver: Receiver<OverlayFetched>,
}

impl Default for OverlayChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayChannel {
    pub fn new() -> Self {
        let (sender, receiver) = channel();
        Self { sender, receiver }
    }

    /// Spawns a download of `url` through the browser's `fetch`.
    #[cfg(target_arch = "wasm32")]
    pub fn fetch(&self, generation: u64, layer: String, url: String) {
        let sender = self.sender.clone();
        wasm_bindgen_futures::spawn_local(async move {
            log::info!("Fetching overlay '{}' from {}", layer, url);
            let result = fetch_json(&url).await;
            let _ = sender.send(OverlayFetched {
                generation,
                layer,
                result,
            });
        });
    }

    /// Spawns a blocking download on a worker thread.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn fetch(&self, generation: u64, layer: String, url: String) {
        let sender = self.sender.clone();
        std::thread::spawn(move || {
            log::info!("Fetching overlay '{}' from {}", layer, url);
            let result = fetch_json_native(&url);
            let _ = sender.send(OverlayFetched {
                generation,
                layer,
                result,
            });
        });
    }

    /// Non-blocking check for a finished download.
    pub fn try_recv(&self) -> Option<OverlayFetched> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(target_arch = "wasm32")]
async fn fetch_json(url: &str) -> Result<serde_json::Value, FetchError> {
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;

    let window = web_sys::window().ok_or_else(|| FetchError::Network("no window".to_string()))?;
    let response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(|e| FetchError::Network(format!("{:?}", e)))?;
    let response: web_sys::Response = response
        .dyn_into()
        .map_err(|_| FetchError::Network("fetch did not return a Response".to_string()))?;

    if !response.ok() {
        return Err(FetchError::Status(response.status()));
    }

    let json = response
        .json()
        .map_err(|e| FetchError::Body(format!("{:?}", e)))?;
    let json = JsFuture::from(json)
        .await
        .map_err(|e| FetchError::Body(format!("{:?}", e)))?;
    serde_wasm_bindgen::from_value(json).map_err(|e| FetchError::Body(e.to_string()))
}

#[cfg(not(target_arch = "wasm32"))]
fn fetch_json_native(url: &str) -> Result<serde_json::Value, FetchError> {
    let response = reqwest::blocking::get(url).map_err(|e| FetchError::Network(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    response
        .json::<serde_json::Value>()
        .map_err(|e| FetchError::Body(e.to_string()))
}
