//! Drives one map field.
//!
//! [`MapField`] connects a [`MapController`] to its form host and to the
//! service channels. Whatever hosts the field calls [`MapField::pump`]
//! regularly (every frame on native, a short interval timer in the browser);
//! each pump collects finished service results, notices outside changes of
//! the form state, runs the controller and carries out its effects.

use crate::config::MapConfig;
use crate::controller::{MapController, MapMessage};
use crate::engine::EngineFactory;
use crate::host::{Effect, EventError, FormHost, HostEvent, HostSnapshot};
use crate::services::{LocationChannel, OverlayChannel, SnapshotChannel};
use web_time::Instant;

/// A map field bound to its host.
pub struct MapField<H: FormHost> {
    controller: MapController,
    host: H,
    location: LocationChannel,
    overlays: OverlayChannel,
    snapshots: SnapshotChannel,
}

impl<H: FormHost> MapField<H> {
    pub fn new(config: MapConfig, factory: Box<dyn EngineFactory>, host: H) -> Self {
        Self {
            controller: MapController::new(config, factory),
            host,
            location: LocationChannel::new(),
            overlays: OverlayChannel::new(),
            snapshots: SnapshotChannel::new(),
        }
    }

    /// Replaces the geolocation channel (native builds use a simulated one).
    pub fn with_location(mut self, location: LocationChannel) -> Self {
        self.location = location;
        self
    }

    /// Reads the form and shows the map if the container is visible.
    pub fn attach(&mut self, visible: bool, now: Instant) {
        let snapshot = HostSnapshot::read(&self.host, self.controller.config());
        let effects = self.controller.attach(snapshot, visible, now);
        self.perform(effects);
    }

    /// Queues a message for the next pump.
    pub fn send(&mut self, message: MapMessage) {
        self.controller.send(message);
    }

    /// Queues a named form event.
    pub fn dispatch(&mut self, name: &str, payload: &serde_json::Value) -> Result<(), EventError> {
        let event = HostEvent::from_named(name, payload)?;
        self.controller.send(MapMessage::Host(event));
        Ok(())
    }

    /// Runs one iteration of the field's loop.
    pub fn pump(&mut self, now: Instant) {
        while let Some(fix) = self.location.try_recv() {
            self.controller.send(MapMessage::LocationFound(fix));
        }
        while let Some(fetched) = self.overlays.try_recv() {
            self.controller.send(MapMessage::OverlayFetched(fetched));
        }
        while let Some(result) = self.snapshots.try_recv() {
            self.controller.send(MapMessage::SnapshotUploaded(result));
        }

        let snapshot = HostSnapshot::read(&self.host, self.controller.config());
        if &snapshot != self.controller.host() {
            log::debug!("Form state changed outside the map");
            self.controller.send(MapMessage::HostStateChanged(snapshot));
        }

        let effects = self.controller.run(now);
        self.perform(effects);
    }

    fn perform(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::FetchOverlay {
                    generation,
                    layer,
                    url,
                } => {
                    log::debug!("Fetching overlay '{}' from {}", layer, url);
                    self.overlays.fetch(generation, layer, url);
                }
                Effect::RequestLocation {
                    generation,
                    purpose,
                } => self.location.request(generation, purpose),
                Effect::UploadSnapshot(request) => self.snapshots.upload(request),
                host_effect => self.host.apply(&host_effect),
            }
        }
    }

    pub fn controller(&self) -> &MapController {
        &self.controller
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn location_mut(&mut self) -> &mut LocationChannel {
        &mut self.location
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::engine::HeadlessFactory;
    use crate::geo::LatLng;
    use crate::host::{MemoryHost, NoticeLevel};
    use serde_json::json;

    fn make_field(
        config: serde_json::Value,
        host: MemoryHost,
    ) -> (MapField<MemoryHost>, HeadlessFactory) {
        let config = MapConfig::from_value(config).unwrap();
        let factory = HeadlessFactory::default();
        let field = MapField::new(config, Box::new(factory.clone()), host);
        (field, factory)
    }

    #[test]
    fn test_locates_device_on_start() {
        let (field, factory) = make_field(json!({"statePath": "loc"}), MemoryHost::new());
        let mut field = field.with_location(LocationChannel::simulated(LatLng::new(52.5, 13.4)));
        let now = Instant::now();
        field.attach(true, now);
        field.pump(now);

        let surface = factory.current().unwrap();
        assert_eq!(surface.borrow().center, LatLng::new(52.5, 13.4));
        assert_eq!(field.host().get("loc"), json!({"lat": 52.5, "lng": 13.4}));
    }

    #[test]
    fn test_location_button_without_device_api() {
        let (mut field, _factory) = make_field(
            json!({"statePath": "loc", "default": {"lat": 1.0, "lng": 1.0}}),
            MemoryHost::new(),
        );
        let now = Instant::now();
        field.attach(true, now);
        field.send(MapMessage::LocateRequested);
        field.pump(now);
        field.pump(now);
        assert_eq!(field.host().notices.len(), 1);
        assert_eq!(field.host().notices[0].level, NoticeLevel::Blocking);
    }

    #[test]
    fn test_dispatch_named_event() {
        let (mut field, factory) = make_field(
            json!({"statePath": "loc", "default": {"lat": 1.0, "lng": 1.0}}),
            MemoryHost::new(),
        );
        let now = Instant::now();
        field.attach(true, now);
        field
            .dispatch(
                "updateMarkerPosition",
                &json!([{"lat": 48.85, "lng": 2.35, "fix": true}]),
            )
            .unwrap();
        field.pump(now);
        assert_eq!(factory.current().unwrap().borrow().center, LatLng::new(48.85, 2.35));
        assert_eq!(field.host().get("loc"), json!({"lat": 48.85, "lng": 2.35}));

        assert_eq!(
            field.dispatch("panTo", &json!({})),
            Err(EventError::Unknown("panTo".to_string()))
        );
    }

    #[test]
    fn test_outside_form_changes_reach_the_map() {
        let (mut field, factory) = make_field(
            json!({"statePath": "loc", "default": {"lat": 1.0, "lng": 1.0}}),
            MemoryHost::new(),
        );
        let now = Instant::now();
        field.attach(true, now);
        assert_eq!(factory.current().unwrap().borrow().range_circle, None);

        field.host_mut().put("distance", json!("1500"));
        field.pump(now);
        assert_eq!(
            factory.current().unwrap().borrow().range_circle,
            Some((LatLng::new(1.0, 1.0), 1500.0))
        );
        assert_eq!(field.controller().host().range, json!("1500"));
    }

    #[test]
    fn test_drawn_shapes_reach_the_hidden_field() {
        let (mut field, _factory) = make_field(
            json!({"statePath": "loc", "default": {"lat": 1.0, "lng": 1.0}}),
            MemoryHost::new().with_hidden_field(""),
        );
        let now = Instant::now();
        field.attach(true, now);
        field.send(MapMessage::ShapeCreated(crate::geo::ShapeData::point(
            crate::geo::ShapeKind::Marker,
            LatLng::new(2.0, 3.0),
        )));
        field.pump(now);

        let text = field.host().hidden_field().unwrap();
        assert_eq!(crate::geo::FeatureGroup::from_geojson(&text).unwrap().len(), 1);
        assert_eq!(field.host().get("loc"), json!({"geojson": text}));
    }
}
