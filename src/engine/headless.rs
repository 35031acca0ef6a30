//! In-memory map surface.
//!
//! `HeadlessEngine` keeps everything the controller asks it to show in a
//! shared [`Surface`] so that tests and the native playground can look at the
//! result. Views follow the same web-mercator math as the web surface, so
//! bounds fitting and snapshot output are realistic.

use super::{
    EngineError, LayerHandle, LayerSwitcher, MapEngine, MarkerIcon, SnapshotImage,
    SurfaceOptions, TileSource, VectorStyle,
};
use crate::config::DrawToolbar;
use crate::geo::{GeoBounds, LatLng, MapProjection, ShapeData, ShapeId};
use eframe::egui::{Pos2, Rect, Vec2};
use geojson::{FeatureCollection, Value as GeometryValue};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::rc::Rc;

/// Pixel padding kept around fitted bounds.
const FIT_PADDING: f32 = 20.0;

/// What a surface layer draws.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceLayer {
    Tiles {
        source: TileSource,
        visible: bool,
    },
    Features {
        name: String,
        features: FeatureCollection,
        style: VectorStyle,
        visible: bool,
    },
}

impl SurfaceLayer {
    pub fn name(&self) -> &str {
        match self {
            SurfaceLayer::Tiles { source, .. } => &source.name,
            SurfaceLayer::Features { name, .. } => name,
        }
    }

    pub fn is_visible(&self) -> bool {
        match self {
            SurfaceLayer::Tiles { visible, .. } | SurfaceLayer::Features { visible, .. } => {
                *visible
            }
        }
    }

    fn set_visible(&mut self, value: bool) {
        match self {
            SurfaceLayer::Tiles { visible, .. } | SurfaceLayer::Features { visible, .. } => {
                *visible = value
            }
        }
    }
}

/// A drawn shape as rendered on the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceShape {
    pub shape: ShapeData,
    pub style: VectorStyle,
    pub editable: bool,
}

/// Observable state of one headless surface.
#[derive(Debug, Clone)]
pub struct Surface {
    /// Creation sequence number, starting at 1.
    pub serial: usize,
    /// Screen area the view is laid out in.
    pub viewport: Rect,
    pub options: Option<SurfaceOptions>,
    pub center: LatLng,
    pub zoom: f64,
    pub layers: BTreeMap<LayerHandle, SurfaceLayer>,
    pub switcher: Option<LayerSwitcher>,
    pub marker: Option<(LatLng, MarkerIcon)>,
    pub range_circle: Option<(LatLng, f64)>,
    pub toolbar: Option<DrawToolbar>,
    pub shapes: BTreeMap<ShapeId, SurfaceShape>,
    pub location_button: bool,
    pub chrome_visible: bool,
    /// Number of animated view changes.
    pub flights: usize,
    pub destroyed: bool,
    /// Makes the next `rasterize` call fail.
    pub fail_rasterize: bool,
    next_layer: u32,
}

impl Surface {
    fn new(serial: usize, viewport: Rect) -> Self {
        Self {
            serial,
            viewport,
            options: None,
            center: LatLng::new(0.0, 0.0),
            zoom: 1.0,
            layers: BTreeMap::new(),
            switcher: None,
            marker: None,
            range_circle: None,
            toolbar: None,
            shapes: BTreeMap::new(),
            location_button: false,
            chrome_visible: true,
            flights: 0,
            destroyed: false,
            fail_rasterize: false,
            next_layer: 0,
        }
    }

    /// Projection of the current view.
    pub fn projection(&self) -> MapProjection {
        MapProjection::new(self.center, self.zoom, self.viewport)
    }

    /// Names of the visible layers in creation order.
    pub fn visible_layers(&self) -> Vec<&str> {
        self.layers
            .values()
            .filter(|l| l.is_visible())
            .map(|l| l.name())
            .collect()
    }

    pub fn layer_by_name(&self, name: &str) -> Option<&SurfaceLayer> {
        self.layers.values().find(|l| l.name() == name)
    }

    fn clamp_zoom(&self, zoom: f64) -> f64 {
        match &self.options {
            Some(o) => zoom.clamp(o.min_zoom, o.max_zoom.max(o.min_zoom)),
            None => zoom,
        }
    }

    fn clamp_center(&self, center: LatLng) -> LatLng {
        match self.options.as_ref().and_then(|o| o.max_bounds.as_ref()) {
            Some(bounds) => bounds.clamp(center),
            None => center,
        }
    }

    /// Moves the view the way user interaction would, within the options.
    pub fn apply_view(&mut self, center: LatLng, zoom: f64) {
        self.center = self.clamp_center(center);
        self.zoom = self.clamp_zoom(zoom);
    }

    fn add_layer(&mut self, layer: SurfaceLayer) -> LayerHandle {
        self.next_layer += 1;
        let handle = LayerHandle(self.next_layer);
        self.layers.insert(handle, layer);
        handle
    }
}

/// Engine backed by a shared in-memory [`Surface`].
pub struct HeadlessEngine {
    surface: Rc<RefCell<Surface>>,
}

impl MapEngine for HeadlessEngine {
    fn configure(&mut self, options: &SurfaceOptions) {
        let mut s = self.surface.borrow_mut();
        s.options = Some(options.clone());
        let (center, zoom) = (s.center, s.zoom);
        s.apply_view(center, zoom);
    }

    fn center(&self) -> LatLng {
        self.surface.borrow().center
    }

    fn zoom(&self) -> f64 {
        self.surface.borrow().zoom
    }

    fn set_view(&mut self, center: LatLng, zoom: f64) {
        self.surface.borrow_mut().apply_view(center, zoom);
    }

    fn fly_to(&mut self, center: LatLng, zoom: f64) {
        let mut s = self.surface.borrow_mut();
        s.flights += 1;
        s.apply_view(center, zoom);
    }

    fn fit_bounds(&mut self, bounds: &GeoBounds) {
        let mut s = self.surface.borrow_mut();
        let zoom = s.projection().fit_zoom(bounds, FIT_PADDING);
        s.apply_view(bounds.center(), zoom);
    }

    fn add_tile_layer(&mut self, source: &TileSource) -> LayerHandle {
        self.surface.borrow_mut().add_layer(SurfaceLayer::Tiles {
            source: source.clone(),
            visible: false,
        })
    }

    fn add_feature_layer(
        &mut self,
        name: &str,
        features: &FeatureCollection,
        style: &VectorStyle,
    ) -> LayerHandle {
        self.surface.borrow_mut().add_layer(SurfaceLayer::Features {
            name: name.to_string(),
            features: features.clone(),
            style: style.clone(),
            visible: false,
        })
    }

    fn set_layer_visible(&mut self, handle: LayerHandle, visible: bool) {
        if let Some(layer) = self.surface.borrow_mut().layers.get_mut(&handle) {
            layer.set_visible(visible);
        }
    }

    fn set_layer_switcher(&mut self, switcher: &LayerSwitcher) {
        self.surface.borrow_mut().switcher = Some(switcher.clone());
    }

    fn set_marker(&mut self, at: LatLng, icon: &MarkerIcon) {
        self.surface.borrow_mut().marker = Some((at, icon.clone()));
    }

    fn set_marker_icon(&mut self, icon: &MarkerIcon) {
        if let Some((_, current)) = self.surface.borrow_mut().marker.as_mut() {
            *current = icon.clone();
        }
    }

    fn remove_marker(&mut self) {
        self.surface.borrow_mut().marker = None;
    }

    fn set_range_circle(&mut self, center: LatLng, radius_m: f64) {
        self.surface.borrow_mut().range_circle = Some((center, radius_m));
    }

    fn remove_range_circle(&mut self) {
        self.surface.borrow_mut().range_circle = None;
    }

    fn enable_draw_toolbar(&mut self, toolbar: &DrawToolbar) {
        self.surface.borrow_mut().toolbar = Some(toolbar.clone());
    }

    fn render_shape(
        &mut self,
        id: ShapeId,
        shape: &ShapeData,
        style: &VectorStyle,
        editable: bool,
    ) {
        self.surface.borrow_mut().shapes.insert(
            id,
            SurfaceShape {
                shape: shape.clone(),
                style: style.clone(),
                editable,
            },
        );
    }

    fn remove_shape(&mut self, id: ShapeId) {
        self.surface.borrow_mut().shapes.remove(&id);
    }

    fn set_location_button(&mut self, visible: bool) {
        self.surface.borrow_mut().location_button = visible;
    }

    fn set_chrome_visible(&mut self, visible: bool) {
        self.surface.borrow_mut().chrome_visible = visible;
    }

    fn rasterize(&mut self) -> Result<SnapshotImage, EngineError> {
        let mut s = self.surface.borrow_mut();
        if s.destroyed {
            return Err(EngineError::Rasterize("surface was destroyed".to_string()));
        }
        if s.fail_rasterize {
            s.fail_rasterize = false;
            return Err(EngineError::Rasterize("canvas is tainted".to_string()));
        }
        Ok(SnapshotImage {
            bytes: render_svg(&s).into_bytes(),
            mime: "image/svg+xml".to_string(),
        })
    }

    fn destroy(&mut self) {
        let mut s = self.surface.borrow_mut();
        s.layers.clear();
        s.switcher = None;
        s.marker = None;
        s.range_circle = None;
        s.toolbar = None;
        s.shapes.clear();
        s.location_button = false;
        s.destroyed = true;
    }
}

/// Hands out headless engines and remembers every surface it created.
///
/// Clones share the same record, so a caller can keep one clone and give the
/// other to a controller.
#[derive(Clone)]
pub struct HeadlessFactory {
    viewport: Rect,
    surfaces: Rc<RefCell<Vec<Rc<RefCell<Surface>>>>>,
}

impl Default for HeadlessFactory {
    fn default() -> Self {
        Self::new(Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0)))
    }
}

impl HeadlessFactory {
    pub fn new(viewport: Rect) -> Self {
        Self {
            viewport,
            surfaces: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// The most recently created surface.
    pub fn current(&self) -> Option<Rc<RefCell<Surface>>> {
        self.surfaces.borrow().last().cloned()
    }

    pub fn created(&self) -> usize {
        self.surfaces.borrow().len()
    }
}

impl super::EngineFactory for HeadlessFactory {
    fn create(&mut self) -> Result<Box<dyn MapEngine>, EngineError> {
        let serial = self.created() + 1;
        let surface = Rc::new(RefCell::new(Surface::new(serial, self.viewport)));
        self.surfaces.borrow_mut().push(Rc::clone(&surface));
        log::debug!("Created headless surface #{}", serial);
        Ok(Box::new(HeadlessEngine { surface }))
    }
}

/// Renders the visible content (never the chrome) as an SVG document.
fn render_svg(s: &Surface) -> String {
    let proj = s.projection();
    let rect = s.viewport;
    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="{} {} {} {}">"#,
        rect.width(),
        rect.height(),
        rect.min.x,
        rect.min.y,
        rect.width(),
        rect.height()
    );
    let _ = write!(
        svg,
        r##"<rect x="{}" y="{}" width="{}" height="{}" fill="#e5e3df"/>"##,
        rect.min.x,
        rect.min.y,
        rect.width(),
        rect.height()
    );

    for layer in s.layers.values() {
        match layer {
            SurfaceLayer::Tiles { source, visible: true } => {
                let _ = write!(svg, r#"<g class="tiles" data-name="{}"/>"#, escape(&source.name));
            }
            SurfaceLayer::Features {
                features,
                style,
                visible: true,
                ..
            } => {
                for geometry in features.features.iter().filter_map(|f| f.geometry.as_ref()) {
                    write_geometry(&mut svg, &proj, &geometry.value, style);
                }
            }
            _ => {}
        }
    }

    for drawn in s.shapes.values() {
        match drawn.shape.radius {
            Some(radius) => {
                if let Some(center) = drawn.shape.positions().first() {
                    let p = proj.geo_to_screen(*center);
                    let r = radius / proj.metres_per_pixel(center.lat);
                    let _ = write!(
                        svg,
                        r#"<circle cx="{:.1}" cy="{:.1}" r="{:.1}" {}/>"#,
                        p.x,
                        p.y,
                        r,
                        paint(&drawn.style, true)
                    );
                }
            }
            None => write_geometry(&mut svg, &proj, &drawn.shape.geometry.value, &drawn.style),
        }
    }

    if let Some((center, radius)) = s.range_circle {
        let p = proj.geo_to_screen(center);
        let r = radius / proj.metres_per_pixel(center.lat);
        let _ = write!(
            svg,
            r##"<circle class="range" cx="{:.1}" cy="{:.1}" r="{:.1}" stroke="#3b82f6" fill="#3b82f6" fill-opacity="0.2"/>"##,
            p.x, p.y, r
        );
    }

    if let Some((at, icon)) = &s.marker {
        let p = proj.geo_to_screen(*at);
        let (ax, ay) = icon.anchor();
        let size = icon.size();
        let x = p.x - ax as f32;
        let y = p.y - ay as f32;
        match icon {
            MarkerIcon::Pin { color, .. } => {
                let _ = write!(
                    svg,
                    r#"<g class="marker" transform="translate({:.1} {:.1})">{}</g>"#,
                    x,
                    y,
                    MarkerIcon::pin_svg(color, size)
                );
            }
            MarkerIcon::Image { url, .. } => {
                let _ = write!(
                    svg,
                    r#"<image class="marker" x="{:.1}" y="{:.1}" width="{}" height="{}" href="{}"/>"#,
                    x,
                    y,
                    size,
                    size,
                    escape(url)
                );
            }
        }
    }

    if s.chrome_visible {
        let _ = write!(
            svg,
            r##"<g class="map-chrome"><rect x="{}" y="{}" width="30" height="60" fill="#fff"/></g>"##,
            rect.min.x + 10.0,
            rect.min.y + 10.0
        );
    }

    svg.push_str("</svg>");
    svg
}

fn write_geometry(
    svg: &mut String,
    proj: &MapProjection,
    value: &GeometryValue,
    style: &VectorStyle,
) {
    let to_screen = |pos: &Vec<f64>| -> Option<Pos2> {
        match pos.as_slice() {
            [lng, lat, ..] => Some(proj.geo_to_screen(LatLng::new(*lat, *lng))),
            _ => None,
        }
    };
    let path = |ring: &[Vec<f64>], close: bool| -> String {
        let mut d = String::new();
        for (i, p) in ring.iter().filter_map(to_screen).enumerate() {
            let _ = write!(d, "{}{:.1} {:.1} ", if i == 0 { "M" } else { "L" }, p.x, p.y);
        }
        if close {
            d.push('Z');
        }
        d
    };

    match value {
        GeometryValue::Point(p) => {
            if let Some(p) = to_screen(p) {
                let _ = write!(
                    svg,
                    r#"<circle cx="{:.1}" cy="{:.1}" r="5" {}/>"#,
                    p.x,
                    p.y,
                    paint(style, true)
                );
            }
        }
        GeometryValue::MultiPoint(points) => {
            for p in points {
                write_geometry(svg, proj, &GeometryValue::Point(p.clone()), style);
            }
        }
        GeometryValue::LineString(line) => {
            let _ = write!(svg, r#"<path d="{}" {}/>"#, path(line, false), paint(style, false));
        }
        GeometryValue::MultiLineString(lines) => {
            for line in lines {
                let _ = write!(svg, r#"<path d="{}" {}/>"#, path(line, false), paint(style, false));
            }
        }
        GeometryValue::Polygon(rings) => {
            let d: String = rings.iter().map(|r| path(r, true)).collect();
            let _ = write!(svg, r#"<path d="{}" {}/>"#, d, paint(style, true));
        }
        GeometryValue::MultiPolygon(polygons) => {
            for rings in polygons {
                let d: String = rings.iter().map(|r| path(r, true)).collect();
                let _ = write!(svg, r#"<path d="{}" {}/>"#, d, paint(style, true));
            }
        }
        GeometryValue::GeometryCollection(geometries) => {
            for g in geometries {
                write_geometry(svg, proj, &g.value, style);
            }
        }
    }
}

fn paint(style: &VectorStyle, filled: bool) -> String {
    let fill = if filled {
        format!(
            r#"fill="{}" fill-opacity="{}""#,
            escape(&style.fill_color),
            style.fill_opacity
        )
    } else {
        r#"fill="none""#.to_string()
    };
    format!(
        r#"stroke="{}" stroke-width="{}" stroke-opacity="{}" {}"#,
        escape(&style.color),
        style.weight,
        style.opacity,
        fill
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
