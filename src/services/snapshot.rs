//! Map snapshot capture and upload.

use crate::engine::{MapEngine, SnapshotImage};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::mpsc::{channel, Receiver, Sender};

/// Errors raised while capturing or uploading a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotError {
    /// The surface could not be rasterized.
    Render(String),
    Network(String),
    Status(u16),
    /// The endpoint answered but refused the image.
    Rejected(String),
    /// The endpoint answer was not understood.
    Response(String),
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Render(msg) => write!(f, "Could not capture the map: {}", msg),
            SnapshotError::Network(msg) => write!(f, "Upload failed: {}", msg),
            SnapshotError::Status(code) => write!(f, "Upload failed with status {}", code),
            SnapshotError::Rejected(msg) => write!(f, "Upload rejected: {}", msg),
            SnapshotError::Response(msg) => write!(f, "Unexpected upload response: {}", msg),
        }
    }
}

impl std::error::Error for SnapshotError {}

/// A rendered snapshot ready to post.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub endpoint: String,
    pub csrf_token: Option<String>,
    pub file_name: String,
    pub image: SnapshotImage,
}

impl UploadRequest {
    pub fn new(
        endpoint: impl Into<String>,
        csrf_token: Option<String>,
        image: SnapshotImage,
        taken_at: DateTime<Utc>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            csrf_token,
            file_name: snapshot_file_name(taken_at, image.extension()),
            image,
        }
    }
}

/// `map-snapshot-YYYYMMDDTHHMMSSZ.<ext>`
pub fn snapshot_file_name(taken_at: DateTime<Utc>, extension: &str) -> String {
    format!(
        "map-snapshot-{}.{}",
        taken_at.format("%Y%m%dT%H%M%SZ"),
        extension
    )
}

/// Rasterizes the view without controls.
///
/// Chrome is hidden for the duration of the render and always restored,
/// including when rendering fails.
pub fn capture(engine: &mut dyn MapEngine) -> Result<SnapshotImage, SnapshotError> {
    engine.set_chrome_visible(false);
    let result = engine.rasterize();
    engine.set_chrome_visible(true);
    result.map_err(|e| SnapshotError::Render(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

/// Interprets the endpoint's `{success, message?}` answer.
pub fn parse_upload_response(status: u16, body: &str) -> Result<String, SnapshotError> {
    let parsed: Result<UploadResponse, _> = serde_json::from_str(body);
    match parsed {
        Ok(r) if r.success && (200..300).contains(&status) => {
            Ok(r.message.unwrap_or_else(|| "Map image uploaded.".to_string()))
        }
        Ok(r) if !r.success => Err(SnapshotError::Rejected(
            r.message.unwrap_or_else(|| "no reason given".to_string()),
        )),
        _ if !(200..300).contains(&status) => Err(SnapshotError::Status(status)),
        Ok(_) => Err(SnapshotError::Status(status)),
        Err(e) => Err(SnapshotError::Response(e.to_string())),
    }
}

/// Channel-based uploader; results carry the server message.
pub struct SnapshotChannel {
    sender: Sender<Result<String, SnapshotError>>,
    receiver: Receiver<Result<String, SnapshotError>>,
}

impl Default for SnapshotChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotChannel {
    pub fn new() -> Self {
        let (sender, receiver) = channel();
        Self { sender, receiver }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn upload(&self, request: UploadRequest) {
        let sender = self.sender.clone();
        wasm_bindgen_futures::spawn_local(async move {
            log::info!(
                "Uploading {} ({} bytes) to {}",
                request.file_name,
                request.image.bytes.len(),
                request.endpoint
            );
            let _ = sender.send(upload_web(&request).await);
        });
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn upload(&self, request: UploadRequest) {
        let sender = self.sender.clone();
        std::thread::spawn(move || {
            log::info!(
                "Uploading {} ({} bytes) to {}",
                request.file_name,
                request.image.bytes.len(),
                request.endpoint
            );
            let _ = sender.send(upload_native(&request));
        });
    }

    /// Non-blocking check for a finished upload.
    pub fn try_recv(&self) -> Option<Result<String, SnapshotError>> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(target_arch = "wasm32")]
async fn upload_web(request: &UploadRequest) -> Result<String, SnapshotError> {
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;

    let js_err = |e: wasm_bindgen::JsValue| SnapshotError::Network(format!("{:?}", e));

    let window = web_sys::window().ok_or_else(|| SnapshotError::Network("no window".to_string()))?;

    let bytes = js_sys::Uint8Array::from(request.image.bytes.as_slice());
    let parts = js_sys::Array::of1(&bytes);
    let bag = web_sys::BlobPropertyBag::new();
    bag.set_type(&request.image.mime);
    let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &bag).map_err(js_err)?;

    let form = web_sys::FormData::new().map_err(js_err)?;
    form.append_with_blob_and_filename("image", &blob, &request.file_name)
        .map_err(js_err)?;

    let headers = web_sys::Headers::new().map_err(js_err)?;
    headers.set("Accept", "application/json").map_err(js_err)?;
    if let Some(token) = &request.csrf_token {
        headers.set("X-CSRF-TOKEN", token).map_err(js_err)?;
    }

    let init = web_sys::RequestInit::new();
    init.set_method("POST");
    init.set_body(&form);
    init.set_headers(&headers);

    let response = JsFuture::from(window.fetch_with_str_and_init(&request.endpoint, &init))
        .await
        .map_err(js_err)?;
    let response: web_sys::Response = response
        .dyn_into()
        .map_err(|_| SnapshotError::Network("fetch did not return a Response".to_string()))?;

    let status = response.status();
    let text = response.text().map_err(js_err)?;
    let body = JsFuture::from(text)
        .await
        .map_err(js_err)?
        .as_string()
        .unwrap_or_default();
    parse_upload_response(status, &body)
}

#[cfg(not(target_arch = "wasm32"))]
fn upload_native(request: &UploadRequest) -> Result<String, SnapshotError> {
    use reqwest::blocking::multipart::{Form, Part};

    let part = Part::bytes(request.image.bytes.clone())
        .file_name(request.file_name.clone())
        .mime_str(&request.image.mime)
        .map_err(|e| SnapshotError::Network(e.to_string()))?;
    let form = Form::new().part("image", part);

    let client = reqwest::blocking::Client::new();
    let mut builder = client
        .post(&request.endpoint)
        .header("Accept", "application/json")
        .multipart(form);
    if let Some(token) = &request.csrf_token {
        builder = builder.header("X-CSRF-TOKEN", token);
    }

    let response = builder
        .send()
        .map_err(|e| SnapshotError::Network(e.to_string()))?;
    let status = response.status().as_u16();
    let body = response
        .text()
        .map_err(|e| SnapshotError::Network(e.to_string()))?;
    parse_upload_response(status, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineFactory, HeadlessFactory};
    use chrono::TimeZone;

    #[test]
    fn test_file_name_embeds_utc_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            snapshot_file_name(at, "png"),
            "map-snapshot-20240309T140507Z.png"
        );

        let request = UploadRequest::new(
            "/map-picker/upload-image",
            None,
            SnapshotImage {
                bytes: vec![1, 2, 3],
                mime: "image/svg+xml".to_string(),
            },
            at,
        );
        assert_eq!(request.file_name, "map-snapshot-20240309T140507Z.svg");
    }

    #[test]
    fn test_capture_restores_chrome_on_failure() {
        let mut factory = HeadlessFactory::default();
        let mut engine = factory.create().unwrap();
        let surface = factory.current().unwrap();
        surface.borrow_mut().fail_rasterize = true;

        let err = capture(engine.as_mut()).unwrap_err();
        assert!(matches!(err, SnapshotError::Render(_)));
        assert!(surface.borrow().chrome_visible);

        let image = capture(engine.as_mut()).unwrap();
        assert!(!String::from_utf8(image.bytes).unwrap().contains("map-chrome"));
        assert!(surface.borrow().chrome_visible);
    }

    #[test]
    fn test_upload_response_parsing() {
        assert_eq!(
            parse_upload_response(200, r#"{"success": true, "message": "Stored"}"#),
            Ok("Stored".to_string())
        );
        assert_eq!(
            parse_upload_response(200, r#"{"success": false, "message": "Too large"}"#),
            Err(SnapshotError::Rejected("Too large".to_string()))
        );
        assert_eq!(
            parse_upload_response(500, "<html>"),
            Err(SnapshotError::Status(500))
        );
        assert!(matches!(
            parse_upload_response(200, "<html>"),
            Err(SnapshotError::Response(_))
        ));
    }
}
