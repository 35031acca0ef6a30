//! Field configuration schema.
//!
//! The configuration is produced once by the form builder and handed to the
//! controller at mount time. Every recognized key has an explicit default so a
//! partial blob deserializes into a complete `MapConfig`; unknown keys are
//! ignored. After `validate()` the configuration is never mutated.

use crate::geo::{GeoBounds, LatLng};
use serde::{Deserialize, Deserializer, Serialize};

/// Tile URL used when neither `baseLayers` nor `tilesUrl` is configured.
pub const OSM_TILES_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Errors raised while reading or validating the configuration blob.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The blob is not valid JSON or does not match the schema.
    Parse(String),
    /// The blob parsed but holds contradictory values.
    Invalid(String),
    /// A base or overlay layer needs a URL but has none.
    MissingLayerUrl { layer: String },
    /// An `api` overlay was declared without inline data.
    MissingLayerData { layer: String },
    /// Inline overlay data is not usable GeoJSON.
    InvalidLayerData { layer: String, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "Invalid map configuration: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Map configuration rejected: {}", msg),
            ConfigError::MissingLayerUrl { layer } => {
                write!(f, "Layer '{}' has no url and was skipped", layer)
            }
            ConfigError::MissingLayerData { layer } => {
                write!(f, "Layer '{}' has no data and was skipped", layer)
            }
            ConfigError::InvalidLayerData { layer, reason } => {
                write!(f, "Layer '{}' data is not valid GeoJSON: {}", layer, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Complete, validated map field configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapConfig {
    /// State path of the coordinate slot in the hosting form.
    pub state_path: String,
    /// State path of the GeoJSON slot (falls back to `state_path`).
    pub geo_json_state_path: Option<String>,
    pub draggable: bool,
    pub clickable: bool,
    /// Marker is only ever placed by clicks and never follows the map.
    pub click_to_place: bool,
    pub show_marker: bool,
    pub marker_color: String,
    pub icon_size: u32,
    /// Legacy single base layer URL.
    pub tiles_url: Option<String>,
    pub attribution: Option<String>,
    pub zoom_offset: i32,
    pub tile_size: u32,
    pub detect_retina: bool,
    pub base_layers: Vec<BaseLayerConfig>,
    pub default_base_layer: Option<String>,
    pub overlay_layers: Vec<OverlayLayerConfig>,
    /// State path of the numeric input holding the range circle radius.
    pub range_select_field: Option<String>,
    #[serde(deserialize_with = "bounds_or_false")]
    pub bounds: Option<GeoBounds>,
    pub show_my_location_button: bool,
    pub default: LatLng,
    pub live_location: LiveLocation,
    pub geo_man_toolbar: DrawToolbar,
    pub controls: MapControls,
    pub snapshot_endpoint: String,
    /// Trailing debounce applied to move-end location syncing.
    pub move_debounce_ms: u64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            state_path: String::new(),
            geo_json_state_path: None,
            draggable: true,
            clickable: false,
            click_to_place: false,
            show_marker: true,
            marker_color: "#3b82f6".to_string(),
            icon_size: 32,
            tiles_url: None,
            attribution: None,
            zoom_offset: -1,
            tile_size: 512,
            detect_retina: true,
            base_layers: Vec::new(),
            default_base_layer: Some("OpenStreetMap".to_string()),
            overlay_layers: Vec::new(),
            range_select_field: Some("distance".to_string()),
            bounds: None,
            show_my_location_button: false,
            default: LatLng::new(0.0, 0.0),
            live_location: LiveLocation::default(),
            geo_man_toolbar: DrawToolbar::default(),
            controls: MapControls::default(),
            snapshot_endpoint: "/map-picker/upload-image".to_string(),
            move_debounce_ms: 500,
        }
    }
}

impl MapConfig {
    /// Parses and validates a configuration blob.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: MapConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Builds a configuration from an already-decoded JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let config: MapConfig =
            serde_json::from_value(value).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.controls;
        if c.min_zoom > c.max_zoom {
            return Err(ConfigError::Invalid(format!(
                "minZoom {} is greater than maxZoom {}",
                c.min_zoom, c.max_zoom
            )));
        }
        if c.zoom < c.min_zoom || c.zoom > c.max_zoom {
            return Err(ConfigError::Invalid(format!(
                "zoom {} is outside [{}, {}]",
                c.zoom, c.min_zoom, c.max_zoom
            )));
        }
        if self.live_location.realtime && self.live_location.milliseconds == 0 {
            return Err(ConfigError::Invalid(
                "liveLocation.milliseconds must be positive in realtime mode".to_string(),
            ));
        }
        if !self.default.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "default location {} is out of range",
                self.default
            )));
        }
        if let Some(bounds) = &self.bounds {
            if !bounds.south_west.is_valid() || !bounds.north_east.is_valid() {
                return Err(ConfigError::Invalid("bounds are out of range".to_string()));
            }
            if bounds.south_west.lat > bounds.north_east.lat
                || bounds.south_west.lng > bounds.north_east.lng
            {
                return Err(ConfigError::Invalid(
                    "bounds.sw must be south-west of bounds.ne".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Whether a direct map click places the marker.
    pub fn accepts_clicks(&self) -> bool {
        self.clickable || self.click_to_place
    }

    /// State path the GeoJSON wrapper is written to.
    pub fn geojson_path(&self) -> &str {
        self.geo_json_state_path
            .as_deref()
            .unwrap_or(&self.state_path)
    }

    /// Zoom applied when a view is set without explicit bounds.
    pub fn zoom(&self) -> f64 {
        self.controls.zoom
    }
}

/// Live-location push settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveLocation {
    /// Issue a host refresh after every coordinate write.
    pub send: bool,
    /// Poll the device position on a fixed interval.
    pub realtime: bool,
    pub milliseconds: u64,
}

impl Default for LiveLocation {
    fn default() -> Self {
        Self {
            send: false,
            realtime: false,
            milliseconds: 5000,
        }
    }
}

impl LiveLocation {
    /// Realtime polling is only meaningful while pushing live.
    pub fn polls(&self) -> bool {
        self.send && self.realtime && self.milliseconds > 0
    }
}

/// Draw toolbar capability flags and shape colors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DrawToolbar {
    pub show: bool,
    pub editable: bool,
    pub position: String,
    pub draw_circle_marker: bool,
    pub rotate_mode: bool,
    pub draw_marker: bool,
    pub draw_polygon: bool,
    pub draw_polyline: bool,
    pub draw_circle: bool,
    pub drag_mode: bool,
    pub edit_polygon: bool,
    pub cut_polygon: bool,
    pub delete_layer: bool,
    pub draw_text: bool,
    pub draw_rectangle: bool,
    pub color: String,
    pub border_color: String,
    pub fill_color: String,
    pub snappable: bool,
    pub snap_distance: u32,
}

impl Default for DrawToolbar {
    fn default() -> Self {
        Self {
            show: true,
            editable: true,
            position: "topleft".to_string(),
            draw_circle_marker: true,
            rotate_mode: true,
            draw_marker: true,
            draw_polygon: true,
            draw_polyline: true,
            draw_circle: true,
            drag_mode: true,
            edit_polygon: true,
            cut_polygon: true,
            delete_layer: true,
            draw_text: false,
            draw_rectangle: true,
            color: "#3388ff".to_string(),
            border_color: "#ffffff".to_string(),
            fill_color: "#ffffff".to_string(),
            snappable: false,
            snap_distance: 20,
        }
    }
}

/// Map interaction controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapControls {
    pub zoom_control: bool,
    pub scroll_wheel_zoom: ZoomBehavior,
    pub double_click_zoom: ZoomBehavior,
    pub touch_zoom: ZoomBehavior,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub zoom: f64,
    pub fullscreen_control: bool,
}

impl Default for MapControls {
    fn default() -> Self {
        Self {
            zoom_control: true,
            scroll_wheel_zoom: ZoomBehavior::Center,
            double_click_zoom: ZoomBehavior::Center,
            touch_zoom: ZoomBehavior::Center,
            min_zoom: 1.0,
            max_zoom: 28.0,
            zoom: 8.0,
            fullscreen_control: true,
        }
    }
}

/// How a zoom gesture behaves: disabled, around the cursor, or around the center.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomBehavior {
    Disabled,
    Cursor,
    Center,
}

impl Serialize for ZoomBehavior {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            ZoomBehavior::Disabled => serializer.serialize_bool(false),
            ZoomBehavior::Cursor => serializer.serialize_bool(true),
            ZoomBehavior::Center => serializer.serialize_str("center"),
        }
    }
}

impl<'de> Deserialize<'de> for ZoomBehavior {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Mode(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(false) => Ok(ZoomBehavior::Disabled),
            Raw::Flag(true) => Ok(ZoomBehavior::Cursor),
            Raw::Mode(mode) if mode == "center" => Ok(ZoomBehavior::Center),
            Raw::Mode(mode) => Err(serde::de::Error::custom(format!(
                "unknown zoom behavior '{}'",
                mode
            ))),
        }
    }
}

/// A background tile source descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BaseLayerConfig {
    pub name: String,
    pub url: Option<String>,
    pub attribution: Option<String>,
    pub min_zoom: Option<f64>,
    pub max_zoom: Option<f64>,
    pub opacity: f64,
    pub tile_size: Option<u32>,
    pub zoom_offset: Option<i32>,
    pub detect_retina: Option<bool>,
    pub cross_origin: bool,
}

impl Default for BaseLayerConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            url: None,
            attribution: None,
            min_zoom: None,
            max_zoom: None,
            opacity: 1.0,
            tile_size: None,
            zoom_offset: None,
            detect_retina: None,
            cross_origin: false,
        }
    }
}

/// Where an overlay's content comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
    /// Raster tiles drawn above the base layer.
    Tile,
    /// GeoJSON fetched from `url` after the map is created.
    #[serde(alias = "geoJson")]
    GeoJson,
    /// Feature data supplied inline by the form builder.
    Api,
}

/// A toggleable layer drawn above the base layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlayLayerConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: OverlayKind,
    pub url: Option<String>,
    pub data: Option<serde_json::Value>,
    pub visible_by_default: bool,
    pub opacity: f64,
    pub attribution: Option<String>,
    pub style: LayerStyleConfig,
}

impl Default for OverlayLayerConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: OverlayKind::GeoJson,
            url: None,
            data: None,
            visible_by_default: false,
            opacity: 1.0,
            attribution: None,
            style: LayerStyleConfig::default(),
        }
    }
}

/// Vector style for overlay features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayerStyleConfig {
    pub color: String,
    pub fill_color: String,
    pub weight: f64,
    pub opacity: f64,
    pub fill_opacity: f64,
}

impl Default for LayerStyleConfig {
    fn default() -> Self {
        Self {
            color: "#3388ff".to_string(),
            fill_color: "#3388ff".to_string(),
            weight: 3.0,
            opacity: 1.0,
            fill_opacity: 0.2,
        }
    }
}

/// `bounds` is either `false` or `{sw: {lat, lng}, ne: {lat, lng}}`.
fn bounds_or_false<'de, D>(deserializer: D) -> Result<Option<GeoBounds>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Corners {
        sw: LatLng,
        ne: LatLng,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Flag(bool),
        Corners(Corners),
        Null(()),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Flag(false) | Raw::Null(()) => Ok(None),
        Raw::Flag(true) => Err(serde::de::Error::custom(
            "bounds must be false or an object with sw/ne corners",
        )),
        Raw::Corners(c) => Ok(Some(GeoBounds::new(c.sw, c.ne))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_blob_uses_defaults() {
        let config = MapConfig::from_json("{}").unwrap();
        assert_eq!(config, MapConfig::default());
        assert_eq!(config.controls.zoom, 8.0);
        assert!(config.show_marker);
        assert!(config.bounds.is_none());
    }

    #[test]
    fn test_builder_blob() {
        let json = r#"{
            "statePath": "data.location",
            "clickable": true,
            "bounds": {"sw": {"lat": 49.5, "lng": -11}, "ne": {"lat": 61, "lng": 2}},
            "default": {"lat": 55.25, "lng": -4.5},
            "liveLocation": {"send": true, "realtime": true, "milliseconds": 3000},
            "controls": {"zoom": 10, "scrollWheelZoom": false, "touchZoom": true},
            "overlayLayers": [{"name": "Parks", "type": "api", "data": {"type": "FeatureCollection", "features": []}}],
            "someFutureKey": 12
        }"#;
        let config = MapConfig::from_json(json).unwrap();

        assert_eq!(config.state_path, "data.location");
        assert!(config.accepts_clicks());
        assert_eq!(config.geojson_path(), "data.location");
        let bounds = config.bounds.unwrap();
        assert_eq!(bounds.south_west, LatLng::new(49.5, -11.0));
        assert_eq!(bounds.north_east, LatLng::new(61.0, 2.0));
        assert!(config.live_location.polls());
        assert_eq!(config.controls.scroll_wheel_zoom, ZoomBehavior::Disabled);
        assert_eq!(config.controls.touch_zoom, ZoomBehavior::Cursor);
        assert_eq!(config.overlay_layers[0].kind, OverlayKind::Api);
    }

    #[test]
    fn test_rejects_inverted_zoom_range() {
        let err = MapConfig::from_json(r#"{"controls": {"minZoom": 10, "maxZoom": 5, "zoom": 7}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let err = MapConfig::from_json(
            r#"{"bounds": {"sw": {"lat": 61, "lng": 2}, "ne": {"lat": 49.5, "lng": -11}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            MapConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_geojson_state_path_override() {
        let config =
            MapConfig::from_json(r#"{"statePath": "loc", "geoJsonStatePath": "area"}"#).unwrap();
        assert_eq!(config.geojson_path(), "area");
    }
}
