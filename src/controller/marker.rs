//! Position marker and range circle.

use super::MapController;
use crate::config::MapConfig;
use crate::engine::MarkerIcon;
use crate::geo::{value_as_f64, LatLng, StoredLocation};
use crate::host::StateSlot;
use serde_json::Value;

/// Marker mode and placement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerState {
    /// The marker tracks the map center while the map moves.
    pub follow: bool,
    /// `follow` has been decided for this session.
    pub initialized: bool,
    /// Where the marker is drawn; `None` without a surface.
    pub position: Option<LatLng>,
    /// Icon set through `updateMarkerIcon`, kept across surfaces.
    pub icon: Option<MarkerIcon>,
}

/// Initial marker mode: follow the map only when nothing is stored yet and
/// the marker is not reserved for explicit clicks.
pub fn should_follow_map(config: &MapConfig, stored: Option<&StoredLocation>) -> bool {
    stored.is_none() && !config.click_to_place
}

/// The generated pin in the configured color and size.
pub fn default_icon(config: &MapConfig) -> MarkerIcon {
    MarkerIcon::Pin {
        color: config.marker_color.clone(),
        size: config.icon_size,
    }
}

/// Radius in metres from the range input; absent, non-numeric or
/// non-positive values disable the circle.
pub fn range_radius(value: &Value) -> Option<f64> {
    value_as_f64(value).filter(|r| *r > 0.0)
}

impl MapController {
    /// Places the marker on a new surface.
    pub(super) fn show_marker(&mut self, stored: Option<&StoredLocation>) {
        if !self.config.show_marker {
            return;
        }
        if self.marker.icon.is_none() {
            if let Some(url) = stored.and_then(|s| s.icon.clone()) {
                self.marker.icon = Some(MarkerIcon::Image {
                    url,
                    size: self.config.icon_size,
                });
            }
        }
        let at = match (stored, &self.engine) {
            (Some(location), _) if !self.marker.follow => location.position,
            (_, Some(engine)) => engine.center(),
            (_, None) => return,
        };
        self.move_marker(at);
    }

    /// Moves the marker onto the map center while following.
    pub(super) fn map_moved(&mut self) {
        if !self.marker.follow || !self.config.show_marker {
            return;
        }
        let Some(engine) = self.engine.as_deref_mut() else {
            return;
        };
        let center = engine.center();
        self.move_marker(center);
        self.update_range_circle();
    }

    /// Common tail of every programmatic view change.
    pub(super) fn after_view_change(&mut self) {
        self.map_moved();
        self.update_range_circle();
        self.move_sync.arm(self.now);
    }

    pub(super) fn map_clicked(&mut self, at: LatLng) {
        if !self.config.accepts_clicks() {
            log::debug!("Ignoring click at {}, map is not clickable", at);
            return;
        }
        log::debug!("Marker fixed at {}", at);
        self.marker.follow = false;
        self.move_marker(at);
        self.write_state(StateSlot::Location, at.to_value());
        self.refresh_if_live();
        self.update_range_circle();
    }

    /// `fix = true` recenters and re-tethers the marker; `fix = false` pins
    /// it at the point and leaves the view alone.
    pub(super) fn update_marker_position(&mut self, at: LatLng, fix: bool) {
        self.marker.follow = fix;
        if fix {
            if let Some(engine) = self.engine.as_deref_mut() {
                let zoom = engine.zoom();
                engine.set_view(at, zoom);
            }
        }
        self.move_marker(at);
        self.write_state(StateSlot::Location, at.to_value());
        self.refresh_if_live();
        if fix && self.engine.is_some() {
            self.after_view_change();
        } else {
            self.update_range_circle();
        }
    }

    pub(super) fn update_marker_icon(
        &mut self,
        url: Option<String>,
        size: Option<u32>,
        color: Option<String>,
    ) {
        let size = size.unwrap_or(self.config.icon_size);
        let icon = match url {
            Some(url) => MarkerIcon::Image { url, size },
            None => {
                let color = color.unwrap_or_else(|| match &self.marker.icon {
                    Some(MarkerIcon::Pin { color, .. }) => color.clone(),
                    _ => self.config.marker_color.clone(),
                });
                MarkerIcon::Pin { color, size }
            }
        };
        if let (Some(engine), Some(_)) = (self.engine.as_deref_mut(), self.marker.position) {
            engine.set_marker_icon(&icon);
        }
        self.marker.icon = Some(icon);
    }

    /// Flies to the stored coordinate and puts the marker there.
    pub(super) fn refresh_map(&mut self) {
        let at = self.get_coordinates();
        let Some(engine) = self.engine.as_deref_mut() else {
            log::debug!("Refresh ignored, no map surface");
            return;
        };
        let zoom = engine.zoom();
        engine.fly_to(at, zoom);
        self.move_marker(at);
        self.update_range_circle();
        self.move_sync.arm(self.now);
    }

    /// Draws, moves or removes the range circle around the marker.
    pub(super) fn update_range_circle(&mut self) {
        let center = self.marker.position.unwrap_or_else(|| self.get_coordinates());
        let radius = range_radius(&self.host.range);
        let Some(engine) = self.engine.as_deref_mut() else {
            return;
        };
        match radius {
            Some(radius) => engine.set_range_circle(center, radius),
            None => engine.remove_range_circle(),
        }
    }

    fn current_icon(&self) -> MarkerIcon {
        self.marker
            .icon
            .clone()
            .unwrap_or_else(|| default_icon(&self.config))
    }

    pub(super) fn move_marker(&mut self, at: LatLng) {
        if !self.config.show_marker {
            return;
        }
        let icon = self.current_icon();
        let Some(engine) = self.engine.as_deref_mut() else {
            return;
        };
        engine.set_marker(at, &icon);
        self.marker.position = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_should_follow_map() {
        let config = MapConfig::default();
        let stored = StoredLocation {
            position: LatLng::new(1.0, 2.0),
            icon: None,
        };
        assert!(should_follow_map(&config, None));
        assert!(!should_follow_map(&config, Some(&stored)));

        let clickable = MapConfig {
            clickable: true,
            ..MapConfig::default()
        };
        assert!(should_follow_map(&clickable, None));

        let click_to_place = MapConfig {
            click_to_place: true,
            ..MapConfig::default()
        };
        assert!(!should_follow_map(&click_to_place, None));
    }

    #[test]
    fn test_range_radius() {
        assert_eq!(range_radius(&json!(250)), Some(250.0));
        assert_eq!(range_radius(&json!("1500.5")), Some(1500.5));
        assert_eq!(range_radius(&json!(0)), None);
        assert_eq!(range_radius(&json!(-3)), None);
        assert_eq!(range_radius(&json!("far")), None);
        assert_eq!(range_radius(&Value::Null), None);
    }
}
