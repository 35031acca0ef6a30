//! GeoJSON bulk-load file picking.
//!
//! The rfd dialog is async; egui's update loop is not. The dialog runs on a
//! worker thread and its outcome comes back over an mpsc channel.

use eframe::egui;
use map_picker::geo::FeatureGroup;
use std::sync::mpsc::{channel, Receiver, Sender};

/// A GeoJSON file that parsed cleanly on the worker thread.
#[derive(Clone, Debug)]
pub struct PickedGeoJson {
    pub file_name: String,
    pub file_size: u64,
    pub shape_count: usize,
    pub text: String,
}

#[derive(Clone, Debug)]
pub enum PickOutcome {
    Picked(PickedGeoJson),
    /// The file was read but is not usable GeoJSON; the form is left alone.
    Invalid { file_name: String, error: String },
    Cancelled,
}

pub struct FilePickerChannel {
    sender: Sender<PickOutcome>,
    receiver: Receiver<PickOutcome>,
}

impl Default for FilePickerChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl FilePickerChannel {
    pub fn new() -> Self {
        let (sender, receiver) = channel();
        Self { sender, receiver }
    }

    /// Opens the dialog on a worker thread and repaints once it closes.
    pub fn pick_file(&self, ctx: egui::Context) {
        let sender = self.sender.clone();
        std::thread::spawn(move || {
            let outcome = pollster::block_on(pick_geojson());
            let _ = sender.send(outcome);
            ctx.request_repaint();
        });
    }

    pub fn try_recv(&self) -> Option<PickOutcome> {
        self.receiver.try_recv().ok()
    }
}

async fn pick_geojson() -> PickOutcome {
    let Some(file) = rfd::AsyncFileDialog::new()
        .set_title("Load GeoJSON")
        .add_filter("GeoJSON", &["geojson", "json"])
        .pick_file()
        .await
    else {
        return PickOutcome::Cancelled;
    };

    let file_name = file.file_name();
    let bytes = file.read().await;
    check_geojson(file_name, bytes)
}

/// Decodes and parses the file so a bad pick never reaches the form.
fn check_geojson(file_name: String, bytes: Vec<u8>) -> PickOutcome {
    let file_size = bytes.len() as u64;
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            return PickOutcome::Invalid {
                file_name,
                error: format!("not UTF-8 text ({})", e.utf8_error()),
            }
        }
    };

    match FeatureGroup::from_geojson(&text) {
        Ok(group) => PickOutcome::Picked(PickedGeoJson {
            file_name,
            file_size,
            shape_count: group.len(),
            text,
        }),
        Err(e) => PickOutcome::Invalid {
            file_name,
            error: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_sample_parses() {
        let bytes = include_bytes!("../demos/parks.geojson").to_vec();
        match check_geojson("parks.geojson".to_string(), bytes) {
            PickOutcome::Picked(picked) => {
                assert_eq!(picked.shape_count, 4);
                let expected = include_bytes!("../demos/parks.geojson").len() as u64;
                assert_eq!(picked.file_size, expected);
            }
            other => panic!("expected a parsed file, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_binary_and_malformed_files() {
        let binary = check_geojson("tile.png".to_string(), vec![0x89, 0x50, 0xff, 0xfe]);
        assert!(matches!(binary, PickOutcome::Invalid { .. }));

        let malformed = check_geojson("broken.json".to_string(), b"{\"type\":".to_vec());
        match malformed {
            PickOutcome::Invalid { file_name, .. } => assert_eq!(file_name, "broken.json"),
            other => panic!("expected an invalid file, got {:?}", other),
        }
    }
}
