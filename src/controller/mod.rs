//! The map field controller.
//!
//! `MapController` owns everything the field knows: the validated
//! configuration, the cached host state, the drawn shapes, the marker mode and
//! the map surface while it exists. Inputs arrive as [`MapMessage`]s on one
//! queue; [`MapController::run`] drains the queue in arrival order, fires due
//! timers and returns the [`Effect`]s the runtime has to carry out.

mod draw;
mod layers;
mod lifecycle;
mod location;
mod marker;
mod sync;

pub use draw::DrawState;
pub use layers::{base_sources, BaseEntry, LayerManager, OverlayEntry};
pub use lifecycle::Lifecycle;
pub use marker::{default_icon, range_radius, should_follow_map, MarkerState};
pub use sync::Debouncer;

use crate::config::MapConfig;
use crate::engine::{EngineFactory, MapEngine};
use crate::geo::{FeatureGroup, LatLng, ShapeData, ShapeId, StoredLocation};
use crate::host::{Effect, HostEvent, HostSnapshot, LocatePurpose, Notice, StateSlot};
use crate::services::{capture, LocationFix, OverlayFetched, SnapshotError, UploadRequest};
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;
use web_time::Instant;

/// Inputs of the controller.
#[derive(Debug, Clone)]
pub enum MapMessage {
    /// The container entered or left the viewport.
    VisibilityChanged { visible: bool },
    /// The container was removed from the document.
    Detach,
    /// The form state changed outside the controller.
    HostStateChanged(HostSnapshot),
    /// A named event dispatched by the form.
    Host(HostEvent),
    /// The view is moving (fires repeatedly while panning).
    MapMoved,
    /// A pan or zoom finished.
    MoveEnd,
    MapClicked(LatLng),
    ShapeCreated(ShapeData),
    ShapeEdited { id: ShapeId, shape: ShapeData },
    ShapeRemoved(ShapeId),
    /// The location button was pressed.
    LocateRequested,
    LocationFound(LocationFix),
    OverlayFetched(OverlayFetched),
    SnapshotUploaded(Result<String, SnapshotError>),
    SelectBaseLayer(String),
    SetOverlayVisible { name: String, visible: bool },
}

/// State machine behind one map field.
pub struct MapController {
    config: MapConfig,
    factory: Box<dyn EngineFactory>,
    engine: Option<Box<dyn MapEngine>>,
    lifecycle: Lifecycle,
    generations: u64,
    detached: bool,
    host: HostSnapshot,
    layers: LayerManager,
    marker: MarkerState,
    draw: DrawState,
    move_sync: Debouncer,
    next_poll: Option<Instant>,
    queue: VecDeque<MapMessage>,
    effects: Vec<Effect>,
    now: Instant,
}

impl MapController {
    pub fn new(config: MapConfig, factory: Box<dyn EngineFactory>) -> Self {
        let move_sync = Debouncer::new(Duration::from_millis(config.move_debounce_ms));
        Self {
            config,
            factory,
            engine: None,
            lifecycle: Lifecycle::Inactive,
            generations: 0,
            detached: false,
            host: HostSnapshot::default(),
            layers: LayerManager::default(),
            marker: MarkerState::default(),
            draw: DrawState::default(),
            move_sync,
            next_poll: None,
            queue: VecDeque::new(),
            effects: Vec::new(),
            now: Instant::now(),
        }
    }

    /// Binds the controller to its container.
    ///
    /// The map is created right away when the container is visible; later
    /// visibility changes arrive as [`MapMessage::VisibilityChanged`].
    pub fn attach(&mut self, host: HostSnapshot, visible: bool, now: Instant) -> Vec<Effect> {
        self.host = host;
        self.detached = false;
        self.handle(MapMessage::VisibilityChanged { visible }, now)
    }

    /// Queues a message for the next [`run`](Self::run).
    pub fn send(&mut self, message: MapMessage) {
        self.queue.push_back(message);
    }

    /// Processes every queued message, then fires due timers.
    pub fn run(&mut self, now: Instant) -> Vec<Effect> {
        self.now = now;
        while let Some(message) = self.queue.pop_front() {
            self.dispatch(message);
        }
        self.tick(now);
        std::mem::take(&mut self.effects)
    }

    /// Sends one message and runs the loop.
    pub fn handle(&mut self, message: MapMessage, now: Instant) -> Vec<Effect> {
        self.send(message);
        self.run(now)
    }

    /// Fires the move-end sync and the realtime location poll when due.
    pub fn tick(&mut self, now: Instant) {
        self.now = now;
        if self.move_sync.fire(now) {
            self.update_location();
        }
        if let (Some(due), Some(generation)) = (self.next_poll, self.lifecycle.generation()) {
            if now >= due {
                self.effects.push(Effect::RequestLocation {
                    generation,
                    purpose: LocatePurpose::Poll,
                });
                self.next_poll =
                    Some(now + Duration::from_millis(self.config.live_location.milliseconds));
            }
        }
    }

    fn dispatch(&mut self, message: MapMessage) {
        match message {
            MapMessage::VisibilityChanged { visible: true } => {
                if self.detached {
                    log::debug!("Ignoring visibility change of a detached field");
                } else if !self.lifecycle.is_active() {
                    self.activate();
                }
            }
            MapMessage::VisibilityChanged { visible: false } => self.deactivate(),
            MapMessage::Detach => self.detach(),
            MapMessage::HostStateChanged(snapshot) => self.host_changed(snapshot),
            MapMessage::Host(event) => self.host_event(event),
            MapMessage::MapMoved => self.map_moved(),
            MapMessage::MoveEnd => self.move_sync.arm(self.now),
            MapMessage::MapClicked(at) => self.map_clicked(at),
            MapMessage::ShapeCreated(shape) => self.shape_created(shape),
            MapMessage::ShapeEdited { id, shape } => self.shape_edited(id, shape),
            MapMessage::ShapeRemoved(id) => self.shape_removed(id),
            MapMessage::LocateRequested => self.request_location(LocatePurpose::Button),
            MapMessage::LocationFound(fix) => self.location_found(fix),
            MapMessage::OverlayFetched(fetched) => self.overlay_fetched(fetched),
            MapMessage::SnapshotUploaded(Ok(message)) => {
                log::info!("Snapshot uploaded: {}", message);
                self.notify(Notice::success(message));
            }
            MapMessage::SnapshotUploaded(Err(e)) => {
                log::error!("Snapshot upload failed: {}", e);
                self.notify(Notice::error(e.to_string()));
            }
            MapMessage::SelectBaseLayer(name) => {
                if let Some(engine) = self.engine.as_deref_mut() {
                    if !self.layers.select_base(engine, &name) {
                        log::warn!("No base layer named '{}'", name);
                    }
                }
            }
            MapMessage::SetOverlayVisible { name, visible } => {
                if let Some(engine) = self.engine.as_deref_mut() {
                    if !self.layers.set_overlay_visible(engine, &name, visible) {
                        log::warn!("No overlay named '{}'", name);
                    }
                }
            }
        }
    }

    fn host_event(&mut self, event: HostEvent) {
        log::debug!("Host event: {}", event.name());
        match event {
            HostEvent::RefreshMap => self.refresh_map(),
            HostEvent::CaptureMapImage => self.capture_map_image(),
            HostEvent::UpdateMarkerPosition { at, fix } => self.update_marker_position(at, fix),
            HostEvent::UpdateMarkerIcon { url, size, color } => {
                self.update_marker_icon(url, size, color)
            }
            HostEvent::LoadGeoJson { geojson } => self.load_geojson(&geojson),
        }
    }

    fn host_changed(&mut self, snapshot: HostSnapshot) {
        let range_changed = snapshot.range != self.host.range;
        self.host = snapshot;
        if range_changed {
            self.update_range_circle();
        }
    }

    fn capture_map_image(&mut self) {
        if self.engine.is_none() {
            self.notify(Notice::warning("The map is not visible and cannot be captured."));
            return;
        }
        let Some(engine) = self.engine.as_deref_mut() else {
            return;
        };
        match capture(engine) {
            Ok(image) => {
                let request = UploadRequest::new(
                    self.config.snapshot_endpoint.clone(),
                    self.host.csrf_token.clone(),
                    image,
                    chrono::Utc::now(),
                );
                log::info!("Captured {} for upload", request.file_name);
                self.effects.push(Effect::UploadSnapshot(request));
            }
            Err(e) => {
                log::error!("Snapshot capture failed: {}", e);
                self.notify(Notice::error(e.to_string()));
            }
        }
    }

    fn overlay_fetched(&mut self, fetched: OverlayFetched) {
        if self.lifecycle.generation() != Some(fetched.generation) {
            log::debug!("Dropping overlay '{}' from a torn down map", fetched.layer);
            return;
        }
        let Some(engine) = self.engine.as_deref_mut() else {
            return;
        };
        if let Err(message) = self.layers.overlay_loaded(engine, &fetched.layer, fetched.result) {
            self.notify(Notice::error(message));
        }
    }

    fn notify(&mut self, notice: Notice) {
        self.effects.push(Effect::Notify(notice));
    }

    /// Silent write of a form slot, mirrored into the cached snapshot.
    fn write_state(&mut self, slot: StateSlot, value: Value) {
        let path = match slot {
            StateSlot::Location => self.config.state_path.clone(),
            StateSlot::GeoJson => self.config.geojson_path().to_string(),
        };
        if path == self.config.state_path {
            merge_value(&mut self.host.location, value.clone());
        }
        self.effects.push(Effect::SetState { slot, path, value });
    }

    /// Refresh request, only when pushing live.
    fn refresh_if_live(&mut self) {
        if self.config.live_location.send {
            self.effects.push(Effect::Refresh);
        }
    }

    /// The stored coordinate, if it is usable.
    fn stored_location(&self) -> Option<StoredLocation> {
        StoredLocation::from_value(&self.host.location).filter(|s| s.position.is_valid())
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn host(&self) -> &HostSnapshot {
        &self.host
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    /// Whether the marker is tethered to the map center.
    pub fn follows_map(&self) -> bool {
        self.marker.follow
    }

    pub fn marker_position(&self) -> Option<LatLng> {
        self.marker.position
    }

    pub fn shapes(&self) -> &FeatureGroup {
        &self.draw.group
    }

    pub fn layers(&self) -> &LayerManager {
        &self.layers
    }

    /// Whether GeoJSON write-back was turned off for this session.
    pub fn geojson_write_back_disabled(&self) -> bool {
        self.draw.write_back_disabled
    }

    pub fn has_pending_sync(&self) -> bool {
        self.move_sync.is_pending()
    }
}

/// Shallow merge of objects; anything else replaces the target.
fn merge_value(target: &mut Value, value: Value) {
    match (target, value) {
        (Value::Object(current), Value::Object(incoming)) => {
            for (key, v) in incoming {
                current.insert(key, v);
            }
        }
        (target, value) => *target = value,
    }
}

#[cfg(test)]
mod tests;
