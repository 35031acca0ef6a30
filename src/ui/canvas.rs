//! Central canvas UI: paints the headless map surface.
//!
//! Tiles are never downloaded; a visible base layer is drawn as a graticule
//! with its attribution so panning and zooming stay readable.

use super::colors::{self, css_color, parse_hex};
use super::interaction::{handle_canvas_interaction, translated};
use crate::state::{DrawTool, PlaygroundState};
use eframe::egui::{
    self, Align2, Color32, FontId, Painter, Pos2, Rect, Sense, Shape, Stroke, StrokeKind, Vec2,
};
use egui_phosphor::regular as icons;
use geojson::Value as GeometryValue;
use map_picker::controller::MapMessage;
use map_picker::engine::{MarkerIcon, Surface, SurfaceLayer, VectorStyle};
use map_picker::geo::{LatLng, MapProjection, ShapeData, ShapeKind};
use std::cell::RefCell;
use std::rc::Rc;

/// Pixel size of the chrome buttons.
const BUTTON_SIZE: f32 = 28.0;

/// Interactive controls drawn over the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromeButton {
    ZoomIn,
    ZoomOut,
    Locate,
}

impl ChromeButton {
    fn icon(&self) -> &'static str {
        match self {
            ChromeButton::ZoomIn => icons::PLUS,
            ChromeButton::ZoomOut => icons::MINUS,
            ChromeButton::Locate => icons::CROSSHAIR,
        }
    }
}

/// Renders the surface and turns pointer input into controller messages.
pub fn render_canvas(
    ctx: &egui::Context,
    state: &mut PlaygroundState,
    surface: Option<Rc<RefCell<Surface>>>,
) -> Vec<MapMessage> {
    let mut messages = Vec::new();

    egui::CentralPanel::default().show(ctx, |ui| {
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), Sense::click_and_drag());
        let rect = response.rect;

        let Some(surface) = surface.filter(|s| !s.borrow().destroyed) else {
            painter.rect_filled(rect, 0.0, colors::canvas::INACTIVE);
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "Map surface is not active",
                FontId::proportional(14.0),
                colors::ui::LABEL,
            );
            return;
        };

        surface.borrow_mut().viewport = rect;
        paint_surface(&painter, &surface.borrow(), state, response.hover_pos());
        handle_canvas_interaction(&response, &mut surface.borrow_mut(), state, &mut messages);
    });

    messages
}

/// Chrome buttons of the surface with their screen rectangles.
pub(super) fn chrome_buttons(s: &Surface) -> Vec<(ChromeButton, Rect)> {
    let mut buttons = Vec::new();
    if !s.chrome_visible {
        return buttons;
    }

    let mut top = s.viewport.left_top() + Vec2::splat(10.0);
    let zoom_control = s.options.as_ref().is_some_and(|o| o.zoom_control);
    if zoom_control {
        for button in [ChromeButton::ZoomIn, ChromeButton::ZoomOut] {
            buttons.push((button, Rect::from_min_size(top, Vec2::splat(BUTTON_SIZE))));
            top.y += BUTTON_SIZE + 2.0;
        }
        top.y += 8.0;
    }
    if s.location_button {
        buttons.push((
            ChromeButton::Locate,
            Rect::from_min_size(top, Vec2::splat(BUTTON_SIZE)),
        ));
    }
    buttons
}

fn paint_surface(painter: &Painter, s: &Surface, state: &PlaygroundState, hover: Option<Pos2>) {
    let proj = s.projection();
    painter.rect_filled(s.viewport, 0.0, colors::canvas::BACKGROUND);
    let painter = painter.with_clip_rect(s.viewport);

    let base = s.layers.values().find_map(|layer| match layer {
        SurfaceLayer::Tiles {
            source,
            visible: true,
        } => Some(source),
        _ => None,
    });
    if base.is_some() {
        paint_graticule(&painter, &proj);
    }

    for layer in s.layers.values() {
        if let SurfaceLayer::Features {
            features,
            style,
            visible: true,
            ..
        } = layer
        {
            let (stroke, fill) = style_colors(style);
            for feature in &features.features {
                if let Some(geometry) = &feature.geometry {
                    paint_geometry(&painter, &proj, &geometry.value, stroke, fill);
                }
            }
        }
    }

    if let Some((center, radius_m)) = s.range_circle {
        let pos = proj.geo_to_screen(center);
        let radius = (radius_m / proj.metres_per_pixel(center.lat)) as f32;
        painter.circle(
            pos,
            radius,
            colors::canvas::range_fill(),
            Stroke::new(2.0, colors::canvas::range_stroke()),
        );
    }

    for (id, drawn) in &s.shapes {
        let selected = state.selected == Some(*id);
        match state.drag.as_ref().filter(|d| d.id == *id) {
            Some(drag) => {
                let moved = translated(&drag.shape, &proj, drag.offset);
                paint_shape(&painter, &proj, &moved, &drawn.style, true);
            }
            None => paint_shape(&painter, &proj, &drawn.shape, &drawn.style, selected),
        }
    }

    if let Some((at, icon)) = &s.marker {
        paint_marker(&painter, proj.geo_to_screen(*at), icon);
    }

    paint_sketch(&painter, &proj, state, hover);

    for (button, rect) in chrome_buttons(s) {
        painter.rect_filled(rect, 4.0, colors::canvas::CHROME);
        painter.rect_stroke(
            rect,
            4.0,
            Stroke::new(1.0, colors::ui::LABEL),
            StrokeKind::Inside,
        );
        painter.text(
            rect.center(),
            Align2::CENTER_CENTER,
            button.icon(),
            FontId::proportional(16.0),
            colors::canvas::CHROME_TEXT,
        );
    }

    if let Some(source) = base {
        let text = match &source.attribution {
            Some(attribution) => format!("{} | {}", source.name, attribution),
            None => source.name.clone(),
        };
        painter.text(
            s.viewport.right_bottom() - Vec2::new(6.0, 4.0),
            Align2::RIGHT_BOTTOM,
            text,
            FontId::proportional(10.0),
            colors::canvas::ATTRIBUTION,
        );
    }
}

/// Latitude and longitude lines at a step that suits the zoom.
fn paint_graticule(painter: &Painter, proj: &MapProjection) {
    let bounds = proj.visible_bounds();
    let span = bounds.lng_span().max(bounds.lat_span()).max(1e-6);
    let step = 10f64.powf((span / 4.0).log10().floor());
    let stroke = Stroke::new(1.0, colors::canvas::graticule());
    let rect = proj.screen_rect;
    let mid = bounds.center();

    let mut lng = (bounds.south_west.lng / step).floor() * step;
    for _ in 0..100 {
        if lng > bounds.north_east.lng {
            break;
        }
        let x = proj.geo_to_screen(LatLng::new(mid.lat, lng)).x;
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
        lng += step;
    }

    let mut lat = (bounds.south_west.lat / step).floor() * step;
    for _ in 0..100 {
        if lat > bounds.north_east.lat {
            break;
        }
        let y = proj.geo_to_screen(LatLng::new(lat, mid.lng)).y;
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
        lat += step;
    }
}

fn style_colors(style: &VectorStyle) -> (Stroke, Color32) {
    let stroke = Stroke::new(
        style.weight as f32,
        css_color(&style.color, style.opacity, colors::ui::ACTIVE),
    );
    let fill = css_color(&style.fill_color, style.fill_opacity, colors::ui::ACTIVE);
    (stroke, fill)
}

fn to_screen(proj: &MapProjection, position: &[f64]) -> Option<Pos2> {
    match position {
        [lng, lat, ..] => Some(proj.geo_to_screen(LatLng::new(*lat, *lng))),
        _ => None,
    }
}

fn paint_line(painter: &Painter, proj: &MapProjection, line: &[Vec<f64>], stroke: Stroke) {
    let points: Vec<Pos2> = line.iter().filter_map(|p| to_screen(proj, p)).collect();
    if points.len() >= 2 {
        painter.add(Shape::line(points, stroke));
    }
}

fn paint_geometry(
    painter: &Painter,
    proj: &MapProjection,
    value: &GeometryValue,
    stroke: Stroke,
    fill: Color32,
) {
    match value {
        GeometryValue::Point(p) => {
            if let Some(pos) = to_screen(proj, p) {
                painter.circle(pos, 4.0, fill, stroke);
            }
        }
        GeometryValue::MultiPoint(points) => {
            for pos in points.iter().filter_map(|p| to_screen(proj, p)) {
                painter.circle(pos, 4.0, fill, stroke);
            }
        }
        GeometryValue::LineString(line) => paint_line(painter, proj, line, stroke),
        GeometryValue::MultiLineString(lines) => {
            for line in lines {
                paint_line(painter, proj, line, stroke);
            }
        }
        // Exterior and holes as outlines; filling would need tessellation
        GeometryValue::Polygon(rings) => {
            for ring in rings {
                paint_line(painter, proj, ring, stroke);
            }
        }
        GeometryValue::MultiPolygon(polygons) => {
            for ring in polygons.iter().flatten() {
                paint_line(painter, proj, ring, stroke);
            }
        }
        GeometryValue::GeometryCollection(geometries) => {
            for geometry in geometries {
                paint_geometry(painter, proj, &geometry.value, stroke, fill);
            }
        }
    }
}

fn paint_shape(
    painter: &Painter,
    proj: &MapProjection,
    shape: &ShapeData,
    style: &VectorStyle,
    selected: bool,
) {
    let (mut stroke, fill) = style_colors(style);
    if selected {
        stroke = Stroke::new(stroke.width + 2.0, colors::canvas::SELECTION);
    }
    let positions = shape.positions();

    match shape.kind {
        ShapeKind::Circle => {
            if let (Some(center), Some(radius_m)) = (positions.first(), shape.radius) {
                let radius = (radius_m / proj.metres_per_pixel(center.lat)) as f32;
                painter.circle(proj.geo_to_screen(*center), radius, fill, stroke);
            }
        }
        ShapeKind::CircleMarker => {
            for p in &positions {
                painter.circle(proj.geo_to_screen(*p), 8.0, fill, stroke);
            }
        }
        ShapeKind::Marker => {
            for p in &positions {
                paint_pin(painter, proj.geo_to_screen(*p), 24.0, stroke.color);
            }
        }
        ShapeKind::Text => {
            for p in &positions {
                painter.text(
                    proj.geo_to_screen(*p),
                    Align2::CENTER_CENTER,
                    shape.text.as_deref().unwrap_or_default(),
                    FontId::proportional(14.0),
                    stroke.color,
                );
            }
        }
        ShapeKind::Rectangle => {
            let points: Vec<Pos2> = positions.iter().map(|p| proj.geo_to_screen(*p)).collect();
            painter.add(Shape::convex_polygon(points, fill, Stroke::NONE));
            paint_geometry(painter, proj, &shape.geometry.value, stroke, fill);
        }
        ShapeKind::Polygon | ShapeKind::Polyline => {
            paint_geometry(painter, proj, &shape.geometry.value, stroke, fill)
        }
    }
}

/// A map pin whose tip sits at `tip`.
fn paint_pin(painter: &Painter, tip: Pos2, size: f32, color: Color32) {
    let head = tip - Vec2::new(0.0, size * 0.65);
    let radius = size * 0.33;
    painter.add(Shape::convex_polygon(
        vec![
            tip,
            head + Vec2::new(radius * 0.9, radius * 0.4),
            head + Vec2::new(-radius * 0.9, radius * 0.4),
        ],
        color,
        Stroke::NONE,
    ));
    painter.circle_filled(head, radius, color);
    painter.circle_filled(head, radius * 0.4, Color32::WHITE);
}

fn paint_marker(painter: &Painter, tip: Pos2, icon: &MarkerIcon) {
    match icon {
        MarkerIcon::Pin { color, size } => {
            let color = parse_hex(color).unwrap_or(colors::ui::ACTIVE);
            paint_pin(painter, tip, *size as f32, color);
        }
        MarkerIcon::Image { size, .. } => {
            let (ax, ay) = icon.anchor();
            let rect = Rect::from_min_size(
                tip - Vec2::new(ax as f32, ay as f32),
                Vec2::splat(*size as f32),
            );
            painter.rect_filled(rect, 2.0, colors::canvas::CHROME);
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                icons::IMAGE,
                FontId::proportional(*size as f32 * 0.7),
                colors::canvas::CHROME_TEXT,
            );
        }
    }
}

/// The shape being drawn, following the pointer.
fn paint_sketch(
    painter: &Painter,
    proj: &MapProjection,
    state: &PlaygroundState,
    hover: Option<Pos2>,
) {
    let Some(first) = state.sketch.first() else {
        return;
    };
    let stroke = Stroke::new(2.0, colors::canvas::SKETCH);
    let mut points: Vec<Pos2> = state.sketch.iter().map(|p| proj.geo_to_screen(*p)).collect();
    for p in &points {
        painter.circle_filled(*p, 3.0, colors::canvas::SKETCH);
    }

    match (state.tool, hover) {
        (DrawTool::Circle, Some(hover)) => {
            let center = proj.geo_to_screen(*first);
            painter.circle_stroke(center, center.distance(hover), stroke);
        }
        (DrawTool::Rectangle, Some(hover)) => {
            let rect = Rect::from_two_pos(proj.geo_to_screen(*first), hover);
            painter.rect_stroke(rect, 0.0, stroke, StrokeKind::Middle);
        }
        (tool, hover) if tool.is_multi_point() => {
            points.extend(hover);
            if tool == DrawTool::Polygon && points.len() > 2 {
                points.push(points[0]);
            }
            if points.len() >= 2 {
                painter.add(Shape::line(points, stroke));
            }
        }
        _ => {}
    }
}
