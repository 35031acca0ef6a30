//! Map projection and coordinate transformation.
//!
//! Converts between geographic coordinates and screen positions using the
//! spherical web-mercator projection shared by slippy-map tile servers.

use super::coords::{GeoBounds, LatLng};
use eframe::egui::{Pos2, Rect, Vec2};
use std::f64::consts::PI;

/// Pixel size of one tile at zoom 0.
pub const TILE_SIZE: f64 = 256.0;

/// Latitude limit of the mercator square.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Map projection for converting geographic to screen coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct MapProjection {
    /// Geographic center of the view
    pub center: LatLng,
    /// Fractional zoom level
    pub zoom: f64,
    /// Screen rectangle of the map surface
    pub screen_rect: Rect,
}

impl Default for MapProjection {
    fn default() -> Self {
        Self {
            center: LatLng::new(0.0, 0.0),
            zoom: 2.0,
            screen_rect: Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0)),
        }
    }
}

impl MapProjection {
    pub fn new(center: LatLng, zoom: f64, screen_rect: Rect) -> Self {
        Self {
            center,
            zoom,
            screen_rect,
        }
    }

    /// World pixel size at the current zoom.
    fn world_size(&self) -> f64 {
        TILE_SIZE * 2f64.powf(self.zoom)
    }

    /// Projects to world pixels at the current zoom.
    pub fn project(&self, p: LatLng) -> (f64, f64) {
        let size = self.world_size();
        let lat = p.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let x = (p.lng + 180.0) / 360.0 * size;
        let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * size;
        (x, y)
    }

    /// Inverse of [`project`](Self::project).
    pub fn unproject(&self, x: f64, y: f64) -> LatLng {
        let size = self.world_size();
        let lng = x / size * 360.0 - 180.0;
        let n = PI - 2.0 * PI * y / size;
        let lat = n.sinh().atan().to_degrees();
        LatLng::new(lat, lng)
    }

    /// Converts geographic coordinates to a screen position.
    pub fn geo_to_screen(&self, p: LatLng) -> Pos2 {
        let (cx, cy) = self.project(self.center);
        let (x, y) = self.project(p);
        let origin = self.screen_rect.center();
        Pos2::new(origin.x + (x - cx) as f32, origin.y + (y - cy) as f32)
    }

    /// Converts a screen position to geographic coordinates.
    pub fn screen_to_geo(&self, pos: Pos2) -> LatLng {
        let (cx, cy) = self.project(self.center);
        let origin = self.screen_rect.center();
        self.unproject(
            cx + (pos.x - origin.x) as f64,
            cy + (pos.y - origin.y) as f64,
        )
    }

    /// Center after dragging the surface by `delta` screen pixels.
    pub fn panned(&self, delta: Vec2) -> LatLng {
        let (cx, cy) = self.project(self.center);
        let mut next = self.unproject(cx - delta.x as f64, cy - delta.y as f64);
        next.lng = wrap_longitude(next.lng);
        next
    }

    /// Returns the visible geographic bounds.
    pub fn visible_bounds(&self) -> GeoBounds {
        let top_left = self.screen_to_geo(self.screen_rect.left_top());
        let bottom_right = self.screen_to_geo(self.screen_rect.right_bottom());
        GeoBounds::new(
            LatLng::new(bottom_right.lat, top_left.lng),
            LatLng::new(top_left.lat, bottom_right.lng),
        )
    }

    /// Largest whole zoom at which `bounds` fits inside the screen minus `padding` pixels.
    pub fn fit_zoom(&self, bounds: &GeoBounds, padding: f32) -> f64 {
        let at_zero = MapProjection {
            zoom: 0.0,
            ..self.clone()
        };
        let (x0, y0) = at_zero.project(LatLng::new(bounds.north_east.lat, bounds.south_west.lng));
        let (x1, y1) = at_zero.project(LatLng::new(bounds.south_west.lat, bounds.north_east.lng));
        let span_x = (x1 - x0).abs().max(f64::EPSILON);
        let span_y = (y1 - y0).abs().max(f64::EPSILON);

        let avail = self.screen_rect.size() - Vec2::splat(2.0 * padding);
        let avail_x = (avail.x as f64).max(1.0);
        let avail_y = (avail.y as f64).max(1.0);

        (avail_x / span_x).min(avail_y / span_y).log2().floor()
    }

    /// Ground resolution at a latitude.
    pub fn metres_per_pixel(&self, lat: f64) -> f64 {
        const EARTH_CIRCUMFERENCE_M: f64 = 40_075_016.686;
        EARTH_CIRCUMFERENCE_M * lat.to_radians().cos() / self.world_size()
    }
}

/// Normalizes a longitude into [-180, 180).
pub fn wrap_longitude(lng: f64) -> f64 {
    (lng + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projection(center: LatLng, zoom: f64) -> MapProjection {
        MapProjection::new(
            center,
            zoom,
            Rect::from_min_size(Pos2::ZERO, Vec2::new(512.0, 512.0)),
        )
    }

    #[test]
    fn test_center_maps_to_screen_center() {
        let p = projection(LatLng::new(51.5, -0.1), 10.0);
        let pos = p.geo_to_screen(LatLng::new(51.5, -0.1));
        assert!((pos.x - 256.0).abs() < 1e-3);
        assert!((pos.y - 256.0).abs() < 1e-3);
    }

    #[test]
    fn test_screen_round_trip() {
        let p = projection(LatLng::new(40.0, -74.0), 12.0);
        let geo = p.screen_to_geo(Pos2::new(100.0, 400.0));
        let back = p.geo_to_screen(geo);
        assert!((back.x - 100.0).abs() < 0.01);
        assert!((back.y - 400.0).abs() < 0.01);
    }

    #[test]
    fn test_fit_zoom_most_of_world() {
        let p = projection(LatLng::new(0.0, 0.0), 5.0);
        let most_of_world = GeoBounds::new(LatLng::new(-80.0, -170.0), LatLng::new(80.0, 170.0));
        assert_eq!(p.fit_zoom(&most_of_world, 0.0), 1.0);
    }

    #[test]
    fn test_pan_moves_center_opposite_to_drag() {
        let p = projection(LatLng::new(0.0, 0.0), 3.0);
        let next = p.panned(Vec2::new(100.0, 0.0));
        assert!(next.lng < 0.0);
        assert!(next.lat.abs() < 1e-9);
    }

    #[test]
    fn test_wrap_longitude() {
        assert_eq!(wrap_longitude(190.0), -170.0);
        assert_eq!(wrap_longitude(-180.0), -180.0);
        assert_eq!(wrap_longitude(45.0), 45.0);
    }
}
