//! The rendering capability the controller drives.
//!
//! The controller never draws anything itself. It talks to a `MapEngine`,
//! which on the web is a thin binding over the JavaScript map surface and on
//! native builds is the in-memory [`HeadlessEngine`]. Engines are created by an
//! [`EngineFactory`] each time the field becomes visible and destroyed when it
//! leaves the viewport.

mod headless;

pub use headless::{HeadlessEngine, HeadlessFactory, Surface, SurfaceLayer, SurfaceShape};

use crate::config::{DrawToolbar, LayerStyleConfig, MapConfig, ZoomBehavior};
use crate::geo::{GeoBounds, LatLng, ShapeData, ShapeId};
use geojson::FeatureCollection;
use serde::Serialize;

/// Opaque handle of a layer created on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LayerHandle(pub u32);

/// Errors reported by an engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The surface could not be created in the container.
    Create(String),
    /// The surface could not be turned into an image.
    Rasterize(String),
    /// The engine does not provide the requested capability.
    Unsupported(&'static str),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Create(msg) => write!(f, "Failed to create map: {}", msg),
            EngineError::Rasterize(msg) => write!(f, "Failed to render map image: {}", msg),
            EngineError::Unsupported(what) => write!(f, "Map surface does not support {}", what),
        }
    }
}

impl std::error::Error for EngineError {}

/// Surface-wide options applied once after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceOptions {
    pub dragging: bool,
    pub zoom_control: bool,
    pub fullscreen_control: bool,
    pub scroll_wheel_zoom: ZoomBehavior,
    pub double_click_zoom: ZoomBehavior,
    pub touch_zoom: ZoomBehavior,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub max_bounds: Option<GeoBounds>,
}

impl SurfaceOptions {
    pub fn from_config(config: &MapConfig) -> Self {
        let c = &config.controls;
        Self {
            dragging: config.draggable,
            zoom_control: c.zoom_control,
            fullscreen_control: c.fullscreen_control,
            scroll_wheel_zoom: c.scroll_wheel_zoom,
            double_click_zoom: c.double_click_zoom,
            touch_zoom: c.touch_zoom,
            min_zoom: c.min_zoom,
            max_zoom: c.max_zoom,
            max_bounds: config.bounds,
        }
    }
}

/// A raster (or vector) tile source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileSource {
    pub name: String,
    pub url: String,
    pub attribution: Option<String>,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub tile_size: u32,
    pub zoom_offset: i32,
    pub detect_retina: bool,
    pub opacity: f64,
    pub cross_origin: bool,
}

/// Stroke and fill of vector features.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorStyle {
    pub color: String,
    pub fill_color: String,
    pub weight: f64,
    pub opacity: f64,
    pub fill_opacity: f64,
}

impl From<&LayerStyleConfig> for VectorStyle {
    fn from(style: &LayerStyleConfig) -> Self {
        Self {
            color: style.color.clone(),
            fill_color: style.fill_color.clone(),
            weight: style.weight,
            opacity: style.opacity,
            fill_opacity: style.fill_opacity,
        }
    }
}

impl VectorStyle {
    /// Style of user-drawn shapes.
    pub fn for_drawing(toolbar: &DrawToolbar) -> Self {
        Self {
            color: toolbar.color.clone(),
            fill_color: toolbar.fill_color.clone(),
            weight: 3.0,
            opacity: 1.0,
            fill_opacity: 0.4,
        }
    }
}

/// Appearance of the position marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MarkerIcon {
    /// Generated pin shape.
    Pin { color: String, size: u32 },
    /// Image loaded from a URL.
    Image { url: String, size: u32 },
}

impl MarkerIcon {
    pub fn size(&self) -> u32 {
        match self {
            MarkerIcon::Pin { size, .. } | MarkerIcon::Image { size, .. } => *size,
        }
    }

    /// Pixel offset of the tip from the top-left corner.
    pub fn anchor(&self) -> (u32, u32) {
        let size = self.size();
        (size / 2, size)
    }

    /// SVG markup of the pin icon.
    pub fn pin_svg(color: &str, size: u32) -> String {
        format!(
            concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" class="map-icon" fill="{color}" "#,
                r#"width="{size}" height="{size}" viewBox="0 0 24 24">"#,
                r#"<path d="M12 0c-4.198 0-8 3.403-8 7.602 0 4.198 3.469 9.21 8 16.398 "#,
                r#"4.531-7.188 8-12.2 8-16.398 0-4.199-3.801-7.602-8-7.602zm0 11c-1.657 "#,
                r#"0-3-1.343-3-3s1.343-3 3-3 3 1.343 3 3-1.343 3-3 3z"/></svg>"#
            ),
            color = color,
            size = size
        )
    }
}

/// One row of the layer switcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitcherEntry {
    pub name: String,
    pub handle: LayerHandle,
    pub active: bool,
}

/// Contents of the layer switcher control.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerSwitcher {
    pub base: Vec<SwitcherEntry>,
    pub overlays: Vec<SwitcherEntry>,
}

/// An encoded image of the map surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl SnapshotImage {
    /// Decodes a `data:<mime>;base64,<payload>` URL as produced by canvas exports.
    pub fn from_data_url(url: &str) -> Result<Self, EngineError> {
        use base64::Engine as _;

        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| EngineError::Rasterize("not a data URL".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| EngineError::Rasterize("data URL has no payload".to_string()))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| EngineError::Rasterize("data URL is not base64".to_string()))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| EngineError::Rasterize(e.to_string()))?;
        Ok(Self {
            bytes,
            mime: if mime.is_empty() {
                "image/png".to_string()
            } else {
                mime.to_string()
            },
        })
    }

    /// File extension matching the MIME type.
    pub fn extension(&self) -> &'static str {
        match self.mime.as_str() {
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            "image/svg+xml" => "svg",
            _ => "bin",
        }
    }
}

/// Rendering, pan/zoom, layers and draw-and-edit primitives of a map surface.
pub trait MapEngine {
    /// Applies interaction options (dragging, zoom limits, geofence).
    fn configure(&mut self, options: &SurfaceOptions);

    fn center(&self) -> LatLng;

    fn zoom(&self) -> f64;

    /// Jumps to a view without animation.
    fn set_view(&mut self, center: LatLng, zoom: f64);

    /// Animates to a view.
    fn fly_to(&mut self, center: LatLng, zoom: f64);

    /// Shows the whole of `bounds`.
    fn fit_bounds(&mut self, bounds: &GeoBounds);

    /// Creates a hidden tile layer.
    fn add_tile_layer(&mut self, source: &TileSource) -> LayerHandle;

    /// Creates a hidden vector layer from feature data.
    fn add_feature_layer(
        &mut self,
        name: &str,
        features: &FeatureCollection,
        style: &VectorStyle,
    ) -> LayerHandle;

    fn set_layer_visible(&mut self, handle: LayerHandle, visible: bool);

    /// Installs or replaces the layer switcher control.
    fn set_layer_switcher(&mut self, switcher: &LayerSwitcher);

    /// Places the marker, creating it if needed.
    fn set_marker(&mut self, at: LatLng, icon: &MarkerIcon);

    /// Swaps the marker icon in place.
    fn set_marker_icon(&mut self, icon: &MarkerIcon);

    fn remove_marker(&mut self);

    fn set_range_circle(&mut self, center: LatLng, radius_m: f64);

    fn remove_range_circle(&mut self);

    /// Shows the draw toolbar with the enabled tools.
    fn enable_draw_toolbar(&mut self, toolbar: &DrawToolbar);

    /// Draws (or redraws) a managed shape.
    fn render_shape(&mut self, id: ShapeId, shape: &ShapeData, style: &VectorStyle, editable: bool);

    fn remove_shape(&mut self, id: ShapeId);

    fn set_location_button(&mut self, visible: bool);

    /// Hides or restores controls, toolbars and switchers.
    fn set_chrome_visible(&mut self, visible: bool);

    /// Renders the current view to an image.
    fn rasterize(&mut self) -> Result<SnapshotImage, EngineError>;

    /// Frees the surface, detaching every layer and listener.
    fn destroy(&mut self);
}

/// Creates a fresh surface each time the field becomes visible.
pub trait EngineFactory {
    fn create(&mut self) -> Result<Box<dyn MapEngine>, EngineError>;
}

impl<F> EngineFactory for F
where
    F: FnMut() -> Result<Box<dyn MapEngine>, EngineError>,
{
    fn create(&mut self) -> Result<Box<dyn MapEngine>, EngineError> {
        self()
    }
}
