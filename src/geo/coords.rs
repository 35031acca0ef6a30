//! Geographic coordinates, bounds and host-value helpers.

use geo_types::Coord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True when both components are finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Component-wise comparison with a tolerance in degrees.
    pub fn approx_eq(&self, other: &LatLng, epsilon: f64) -> bool {
        (self.lat - other.lat).abs() <= epsilon && (self.lng - other.lng).abs() <= epsilon
    }

    /// Great-circle distance in metres (haversine).
    pub fn distance_to(&self, other: &LatLng) -> f64 {
        const EARTH_RADIUS_M: f64 = 6_371_008.8;
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos()
                * other.lat.to_radians().cos()
                * (d_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }

    /// JSON form written to the hosting form's coordinate slot.
    pub fn to_value(&self) -> Value {
        serde_json::json!({ "lat": self.lat, "lng": self.lng })
    }
}

impl std::fmt::Display for LatLng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// GeoJSON positions are `[lng, lat]`, which maps onto `Coord { x: lng, y: lat }`.
impl From<Coord<f64>> for LatLng {
    fn from(c: Coord<f64>) -> Self {
        LatLng::new(c.y, c.x)
    }
}

impl From<LatLng> for Coord<f64> {
    fn from(p: LatLng) -> Self {
        Coord { x: p.lng, y: p.lat }
    }
}

/// An axis-aligned lat/lng rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    #[serde(rename = "sw")]
    pub south_west: LatLng,
    #[serde(rename = "ne")]
    pub north_east: LatLng,
}

impl GeoBounds {
    pub fn new(south_west: LatLng, north_east: LatLng) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// Smallest bounds containing every point, or `None` for an empty input.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = LatLng>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = GeoBounds::new(first, first);
        for p in iter {
            bounds.extend(p);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, p: LatLng) {
        self.south_west.lat = self.south_west.lat.min(p.lat);
        self.south_west.lng = self.south_west.lng.min(p.lng);
        self.north_east.lat = self.north_east.lat.max(p.lat);
        self.north_east.lng = self.north_east.lng.max(p.lng);
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }

    pub fn lat_span(&self) -> f64 {
        self.north_east.lat - self.south_west.lat
    }

    pub fn lng_span(&self) -> f64 {
        self.north_east.lng - self.south_west.lng
    }

    /// Bounds with no extent at all, such as a single point, cannot be fitted.
    ///
    /// A straight line along a parallel or a meridian still has one span and
    /// is fitted along it.
    pub fn is_degenerate(&self) -> bool {
        self.lat_span() <= f64::EPSILON && self.lng_span() <= f64::EPSILON
    }

    pub fn contains(&self, p: LatLng) -> bool {
        p.lat >= self.south_west.lat
            && p.lat <= self.north_east.lat
            && p.lng >= self.south_west.lng
            && p.lng <= self.north_east.lng
    }

    /// Moves a point inside the bounds.
    pub fn clamp(&self, p: LatLng) -> LatLng {
        LatLng::new(
            p.lat.clamp(self.south_west.lat, self.north_east.lat),
            p.lng.clamp(self.south_west.lng, self.north_east.lng),
        )
    }
}

/// Whether a host value counts as "present".
///
/// Null, blank strings, empty arrays/objects and NaN are absent; any boolean,
/// finite number, non-blank string or non-empty collection is present.
pub fn is_value_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(n) => n.as_f64().map(|f| !f.is_nan()).unwrap_or(false),
        Value::Bool(_) => true,
    }
}

/// Whether a GeoJSON document's text carries anything to load.
///
/// Blank text and text that is itself an absent JSON value (`{}`, `[]`,
/// `null`, `""`) count as empty. Anything else, malformed or not, is left to
/// the parser.
pub fn is_document_present(text: &str) -> bool {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => is_value_present(&value),
        Err(_) => is_value_present(&Value::String(text.to_string())),
    }
}

/// Reads a number from a JSON number or a numeric string.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// A stored coordinate: `{lat, lng}` plus an optional icon hint.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredLocation {
    pub position: LatLng,
    pub icon: Option<String>,
}

impl StoredLocation {
    /// Extracts a coordinate from a host value.
    ///
    /// Both `lat` and `lng` keys must exist and be non-null numbers (or
    /// numeric strings); anything else yields `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let lat = map.get("lat").and_then(value_as_f64)?;
        let lng = map.get("lng").and_then(value_as_f64)?;
        let icon = map
            .get("icon")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.to_string());
        Some(Self {
            position: LatLng::new(lat, lng),
            icon,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_presence() {
        assert!(!is_value_present(&Value::Null));
        assert!(!is_value_present(&json!("   ")));
        assert!(!is_value_present(&json!([])));
        assert!(!is_value_present(&json!({})));
        assert!(is_value_present(&json!(false)));
        assert!(is_value_present(&json!(0)));
        assert!(is_value_present(&json!("x")));
        assert!(is_value_present(&json!([1])));
        assert!(is_value_present(&json!({"a": 1})));

        for empty in ["", "  ", "{}", "[]", "null", "\"  \""] {
            assert!(!is_document_present(empty), "{:?}", empty);
        }
        assert!(is_document_present("{broken"));
        assert!(is_document_present(r#"{"type":"Point","coordinates":[0,0]}"#));
    }

    #[test]
    fn test_stored_location_parsing() {
        let loc = StoredLocation::from_value(&json!({"lat": "51.5", "lng": -0.1})).unwrap();
        assert_eq!(loc.position, LatLng::new(51.5, -0.1));
        assert_eq!(loc.icon, None);

        let with_icon =
            StoredLocation::from_value(&json!({"lat": 1, "lng": 2, "icon": "/pin.png"})).unwrap();
        assert_eq!(with_icon.icon.as_deref(), Some("/pin.png"));

        assert!(StoredLocation::from_value(&json!({"lat": null, "lng": 2})).is_none());
        assert!(StoredLocation::from_value(&json!({"lat": 1})).is_none());
        assert!(StoredLocation::from_value(&json!("51.5,-0.1")).is_none());
    }

    #[test]
    fn test_bounds_from_points() {
        let bounds = GeoBounds::from_points([
            LatLng::new(51.0, -1.0),
            LatLng::new(52.0, 0.5),
            LatLng::new(51.5, -0.2),
        ])
        .unwrap();
        assert_eq!(bounds.south_west, LatLng::new(51.0, -1.0));
        assert_eq!(bounds.north_east, LatLng::new(52.0, 0.5));
        assert!(bounds.center().approx_eq(&LatLng::new(51.5, -0.25), 1e-9));
        assert!(!bounds.is_degenerate());

        let point = GeoBounds::from_points([LatLng::new(3.0, 4.0)]).unwrap();
        assert!(point.is_degenerate());
        let parallel =
            GeoBounds::from_points([LatLng::new(10.0, 0.0), LatLng::new(10.0, 20.0)]).unwrap();
        assert!(!parallel.is_degenerate());
        let meridian =
            GeoBounds::from_points([LatLng::new(0.0, 5.0), LatLng::new(8.0, 5.0)]).unwrap();
        assert!(!meridian.is_degenerate());
        assert!(GeoBounds::from_points(Vec::new()).is_none());
    }

    #[test]
    fn test_distance() {
        let london = LatLng::new(51.5074, -0.1278);
        let paris = LatLng::new(48.8566, 2.3522);
        let d = london.distance_to(&paris);
        assert!((d - 343_500.0).abs() < 2_000.0, "got {}", d);
    }
}
