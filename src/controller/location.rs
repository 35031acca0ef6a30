//! Device location requests and their results.

use super::MapController;
use crate::host::{Effect, LocatePurpose, Notice};
use crate::services::{LocationError, LocationFix};

impl MapController {
    pub(super) fn request_location(&mut self, purpose: LocatePurpose) {
        match self.lifecycle.generation() {
            Some(generation) => self.effects.push(Effect::RequestLocation {
                generation,
                purpose,
            }),
            None => log::debug!("Location request ignored, no map surface"),
        }
    }

    /// Flies to a found position and re-syncs the coordinate and marker.
    pub(super) fn location_found(&mut self, fix: LocationFix) {
        if self.lifecycle.generation() != Some(fix.generation) {
            log::debug!("Dropping location result from a torn down map");
            return;
        }
        let position = match fix.result {
            Ok(position) => position,
            Err(e) => {
                self.location_failed(fix.purpose, e);
                return;
            }
        };
        let Some(engine) = self.engine.as_deref_mut() else {
            return;
        };
        log::info!("Device located at {}", position);
        match fix.purpose {
            LocatePurpose::Start => engine.set_view(position, self.config.zoom()),
            LocatePurpose::Button | LocatePurpose::Poll => {
                let zoom = engine.zoom();
                engine.fly_to(position, zoom);
            }
        }
        self.map_moved();
        self.update_location();

        let at = self.get_coordinates();
        self.move_marker(at);
        self.update_range_circle();
        self.move_sync.arm(self.now);
    }

    fn location_failed(&mut self, purpose: LocatePurpose, error: LocationError) {
        match purpose {
            LocatePurpose::Start | LocatePurpose::Poll => {
                log::warn!("Could not locate the device: {}", error);
            }
            LocatePurpose::Button => {
                log::error!("Error fetching current location: {}", error);
                let notice = match error {
                    LocationError::Unsupported => Notice::blocking(error.to_string()),
                    _ => Notice::error(error.to_string()),
                };
                self.effects.push(Effect::Notify(notice));
            }
        }
    }
}
