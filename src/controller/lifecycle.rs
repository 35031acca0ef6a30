//! Creation and teardown of the map surface.

use super::{should_follow_map, MapController};
use crate::engine::SurfaceOptions;
use crate::geo::LatLng;
use crate::host::{Effect, LocatePurpose, Notice};
use std::time::Duration;

/// Whether a map surface currently exists.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub enum Lifecycle {
    /// No surface; the container is off screen or was never shown.
    #[default]
    Inactive,
    /// A surface exists. Each activation gets a new generation.
    Active { generation: u64 },
}

impl Lifecycle {
    pub fn is_active(&self) -> bool {
        matches!(self, Lifecycle::Active { .. })
    }

    pub fn generation(&self) -> Option<u64> {
        match self {
            Lifecycle::Active { generation } => Some(*generation),
            Lifecycle::Inactive => None,
        }
    }
}

impl MapController {
    /// Creates the surface and restores everything drawn on it.
    pub(super) fn activate(&mut self) {
        self.generations += 1;
        let generation = self.generations;
        log::info!("Creating map surface (generation {})", generation);

        let mut engine = match self.factory.create() {
            Ok(engine) => engine,
            Err(e) => {
                log::error!("{}", e);
                self.notify(Notice::error(e.to_string()));
                return;
            }
        };
        engine.configure(&SurfaceOptions::from_config(&self.config));

        let fetches = self.layers.install(engine.as_mut(), &self.config, generation);
        self.effects.extend(fetches);

        let stored = self.stored_location();
        let zoom = self.config.zoom();
        let start = stored
            .as_ref()
            .map(|location| location.position)
            .unwrap_or(self.config.default);
        engine.set_view(start, zoom);
        if start == LatLng::new(0.0, 0.0) {
            log::debug!("No usable coordinate, locating the device");
            self.effects.push(Effect::RequestLocation {
                generation,
                purpose: LocatePurpose::Start,
            });
        }

        let toolbar = &self.config.geo_man_toolbar;
        if toolbar.show {
            engine.enable_draw_toolbar(toolbar);
        }
        if self.config.show_my_location_button {
            engine.set_location_button(true);
        }

        self.engine = Some(engine);
        self.lifecycle = Lifecycle::Active { generation };

        if !self.marker.initialized {
            self.marker.follow = should_follow_map(&self.config, stored.as_ref());
            self.marker.initialized = true;
        }
        self.show_marker(stored.as_ref());
        self.load_initial_shapes();
        self.after_view_change();

        if self.config.live_location.polls() {
            self.next_poll =
                Some(self.now + Duration::from_millis(self.config.live_location.milliseconds));
        }
    }

    /// Frees the surface. Safe to call when nothing is shown.
    pub(super) fn deactivate(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            log::info!("Removing map surface");
            engine.destroy();
        }
        self.layers.clear();
        self.marker.position = None;
        self.move_sync.cancel();
        self.next_poll = None;
        self.lifecycle = Lifecycle::Inactive;
    }

    /// Tears down for good; later visibility changes are ignored.
    pub(super) fn detach(&mut self) {
        self.deactivate();
        self.detached = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfig;
    use crate::controller::MapMessage;
    use crate::engine::HeadlessFactory;
    use crate::host::HostSnapshot;
    use web_time::Instant;

    fn controller(config: MapConfig) -> (MapController, HeadlessFactory) {
        let factory = HeadlessFactory::default();
        let controller = MapController::new(config, Box::new(factory.clone()));
        (controller, factory)
    }

    #[test]
    fn test_lifecycle_helpers() {
        assert!(!Lifecycle::Inactive.is_active());
        assert_eq!(Lifecycle::Inactive.generation(), None);
        assert_eq!(Lifecycle::Active { generation: 4 }.generation(), Some(4));
    }

    #[test]
    fn test_reentry_recreates_surface() {
        let (mut c, factory) = controller(MapConfig::default());
        let now = Instant::now();
        c.attach(HostSnapshot::default(), true, now);
        assert_eq!(c.lifecycle(), Lifecycle::Active { generation: 1 });

        c.handle(MapMessage::VisibilityChanged { visible: false }, now);
        assert_eq!(c.lifecycle(), Lifecycle::Inactive);
        assert!(factory.current().unwrap().borrow().destroyed);

        c.handle(MapMessage::VisibilityChanged { visible: true }, now);
        assert_eq!(c.lifecycle(), Lifecycle::Active { generation: 2 });
        assert_eq!(factory.created(), 2);
        assert!(!factory.current().unwrap().borrow().destroyed);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let (mut c, factory) = controller(MapConfig::default());
        let now = Instant::now();
        c.handle(MapMessage::VisibilityChanged { visible: false }, now);
        assert_eq!(factory.created(), 0);

        c.attach(HostSnapshot::default(), true, now);
        c.handle(MapMessage::VisibilityChanged { visible: false }, now);
        c.handle(MapMessage::Detach, now);
        c.handle(MapMessage::VisibilityChanged { visible: true }, now);
        assert!(!c.is_active());
        assert_eq!(factory.created(), 1);
    }

    #[test]
    fn test_visible_twice_keeps_one_surface() {
        let (mut c, factory) = controller(MapConfig::default());
        let now = Instant::now();
        c.attach(HostSnapshot::default(), true, now);
        c.handle(MapMessage::VisibilityChanged { visible: true }, now);
        assert_eq!(factory.created(), 1);
    }

    #[test]
    fn test_start_locates_without_a_usable_coordinate() {
        let (mut c, _) = controller(MapConfig::default());
        let effects = c.attach(HostSnapshot::default(), true, Instant::now());
        assert!(effects.contains(&Effect::RequestLocation {
            generation: 1,
            purpose: LocatePurpose::Start
        }));

        let config = MapConfig {
            default: LatLng::new(10.0, 10.0),
            ..MapConfig::default()
        };
        let (mut c, _) = controller(config.clone());
        let effects = c.attach(HostSnapshot::default(), true, Instant::now());
        assert!(!effects
            .iter()
            .any(|e| matches!(e, Effect::RequestLocation { .. })));

        // a stored null island counts as no position at all
        let (mut c, factory) = controller(config);
        let stored = HostSnapshot {
            location: serde_json::json!({"lat": 0.0, "lng": 0.0}),
            ..HostSnapshot::default()
        };
        let effects = c.attach(stored, true, Instant::now());
        assert!(effects.contains(&Effect::RequestLocation {
            generation: 1,
            purpose: LocatePurpose::Start
        }));
        let surface = factory.current().unwrap();
        assert_eq!(surface.borrow().center, LatLng::new(0.0, 0.0));
    }

    #[test]
    fn test_failed_creation_stays_inactive() {
        use crate::engine::{EngineError, MapEngine};

        let factory = || -> Result<Box<dyn MapEngine>, EngineError> {
            Err(EngineError::Create("container has no size".to_string()))
        };
        let mut c = MapController::new(MapConfig::default(), Box::new(factory));
        let effects = c.attach(HostSnapshot::default(), true, Instant::now());
        assert!(!c.is_active());
        assert!(matches!(effects.as_slice(), [Effect::Notify(_)]));
    }
}
