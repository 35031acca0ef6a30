//! Coordinate sync between the map and the form.

use super::MapController;
use crate::geo::LatLng;
use crate::host::StateSlot;
use std::time::Duration;
use web_time::Instant;

/// Centers closer than this are treated as equal.
const SAME_POSITION_EPSILON: f64 = 1e-9;

/// Trailing-edge debounce: fires once, `delay` after the last `arm`.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Starts or restarts the countdown.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns true once when the countdown has elapsed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

impl MapController {
    /// The stored coordinate, or the configured default when `lat` or `lng`
    /// is missing or null.
    pub fn get_coordinates(&self) -> LatLng {
        self.stored_location()
            .map(|s| s.position)
            .unwrap_or(self.config.default)
    }

    /// Writes the map center to the form while the marker follows the map.
    pub(super) fn update_location(&mut self) {
        if !self.marker.follow {
            return;
        }
        let Some(engine) = self.engine.as_deref() else {
            return;
        };
        let center = engine.center();
        if self.get_coordinates().approx_eq(&center, SAME_POSITION_EPSILON) {
            return;
        }
        log::debug!("Syncing map center {} to the form", center);
        self.write_state(StateSlot::Location, center.to_value());
        self.refresh_if_live();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debouncer_fires_once_after_last_arm() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(500));
        assert!(!debouncer.fire(start));

        debouncer.arm(start);
        debouncer.arm(start + Duration::from_millis(300));
        assert!(!debouncer.fire(start + Duration::from_millis(600)));
        assert!(debouncer.is_pending());
        assert!(debouncer.fire(start + Duration::from_millis(800)));
        assert!(!debouncer.fire(start + Duration::from_millis(900)));
    }

    #[test]
    fn test_cancel_drops_pending_fire() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(10));
        debouncer.arm(start);
        debouncer.cancel();
        assert!(!debouncer.fire(start + Duration::from_secs(1)));
    }
}
