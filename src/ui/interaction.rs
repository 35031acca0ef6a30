//! Pointer and keyboard handling for the map canvas.

use super::canvas::{chrome_buttons, ChromeButton};
use crate::state::{DrawTool, PlaygroundState, ShapeDrag};
use eframe::egui::{self, Pos2, Rect, Vec2};
use geojson::Value as GeometryValue;
use map_picker::config::ZoomBehavior;
use map_picker::controller::MapMessage;
use map_picker::engine::Surface;
use map_picker::geo::{LatLng, MapProjection, ShapeData, ShapeId};

/// Screen distance within which a point shape counts as hit.
const HIT_RADIUS: f32 = 12.0;

pub fn handle_canvas_interaction(
    response: &egui::Response,
    surface: &mut Surface,
    state: &mut PlaygroundState,
    messages: &mut Vec<MapMessage>,
) {
    let proj = surface.projection();
    let ctx = &response.ctx;

    if !ctx.wants_keyboard_input() {
        handle_keys(ctx, surface, state, messages);
    }

    // Chrome buttons swallow their clicks
    if response.clicked() {
        if let Some(pos) = response.interact_pointer_pos() {
            let hit = chrome_buttons(surface)
                .into_iter()
                .find(|(_, rect)| rect.contains(pos));
            if let Some((button, _)) = hit {
                match button {
                    ChromeButton::ZoomIn => zoom_by(surface, 1.0, None, messages),
                    ChromeButton::ZoomOut => zoom_by(surface, -1.0, None, messages),
                    ChromeButton::Locate => messages.push(MapMessage::LocateRequested),
                }
                return;
            }
        }
    }

    if response.drag_started() && state.tool == DrawTool::Select {
        if let Some(pos) = response.interact_pointer_pos() {
            if let Some(id) = hit_test(surface, &proj, pos) {
                state.selected = Some(id);
                state.drag = surface.shapes.get(&id).map(|drawn| ShapeDrag {
                    id,
                    shape: drawn.shape.clone(),
                    offset: Vec2::ZERO,
                });
            }
        }
    }

    if response.dragged() {
        let delta = response.drag_delta();
        match state.drag.as_mut() {
            Some(drag) => drag.offset += delta,
            None => {
                let dragging = surface.options.as_ref().is_none_or(|o| o.dragging);
                if dragging && delta != Vec2::ZERO {
                    let center = proj.panned(delta);
                    let zoom = surface.zoom;
                    surface.apply_view(center, zoom);
                    messages.push(MapMessage::MapMoved);
                }
            }
        }
    }

    if response.drag_stopped() {
        match state.drag.take() {
            Some(drag) => {
                let shape = translated(&drag.shape, &proj, drag.offset);
                messages.push(MapMessage::ShapeEdited { id: drag.id, shape });
            }
            None => messages.push(MapMessage::MoveEnd),
        }
    }

    if response.clicked() {
        if let Some(pos) = response.interact_pointer_pos() {
            let at = proj.screen_to_geo(pos);
            match state.tool {
                DrawTool::Pointer => messages.push(MapMessage::MapClicked(at)),
                DrawTool::Select => state.selected = hit_test(surface, &proj, pos),
                _ => {
                    if let Some(shape) = state.sketch_click(at) {
                        messages.push(MapMessage::ShapeCreated(shape));
                    }
                }
            }
        }
    }

    if response.double_clicked() {
        if let Some(options) = surface.options.clone() {
            let anchor = response.interact_pointer_pos();
            match options.double_click_zoom {
                ZoomBehavior::Disabled => {}
                ZoomBehavior::Cursor => zoom_by(surface, 1.0, anchor, messages),
                ZoomBehavior::Center => zoom_by(surface, 1.0, None, messages),
            }
        }
    }

    if response.hovered() {
        let scroll = ctx.input(|i| i.raw_scroll_delta.y);
        if scroll != 0.0 {
            if let Some(options) = surface.options.clone() {
                let step = if scroll > 0.0 { 0.5 } else { -0.5 };
                match options.scroll_wheel_zoom {
                    ZoomBehavior::Disabled => {}
                    ZoomBehavior::Cursor => zoom_by(surface, step, response.hover_pos(), messages),
                    ZoomBehavior::Center => zoom_by(surface, step, None, messages),
                }
            }
        }
    }
}

fn handle_keys(
    ctx: &egui::Context,
    surface: &Surface,
    state: &mut PlaygroundState,
    messages: &mut Vec<MapMessage>,
) {
    let (escape, enter, delete) = ctx.input(|i| {
        (
            i.key_pressed(egui::Key::Escape),
            i.key_pressed(egui::Key::Enter),
            i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace),
        )
    });

    if escape {
        state.sketch.clear();
        state.drag = None;
        state.selected = None;
    }
    if enter {
        if let Some(shape) = state.finish_sketch() {
            messages.push(MapMessage::ShapeCreated(shape));
        }
    }
    if delete {
        let removable = surface.toolbar.as_ref().is_some_and(|t| t.delete_layer);
        if let Some(id) = state.selected.filter(|_| removable) {
            messages.push(MapMessage::ShapeRemoved(id));
            state.selected = None;
        }
    }
}

/// Zooms like a user gesture, keeping `anchor` (or the center) in place.
fn zoom_by(surface: &mut Surface, step: f64, anchor: Option<Pos2>, messages: &mut Vec<MapMessage>) {
    let zoom = surface.zoom + step;
    let center = match anchor {
        Some(anchor) => {
            let fixed = surface.projection().screen_to_geo(anchor);
            let zoomed = MapProjection::new(surface.center, zoom, surface.viewport);
            zoomed.panned(anchor - zoomed.geo_to_screen(fixed))
        }
        None => surface.center,
    };
    surface.apply_view(center, zoom);
    messages.push(MapMessage::MapMoved);
    messages.push(MapMessage::MoveEnd);
}

/// Topmost editable shape under `pos`.
fn hit_test(surface: &Surface, proj: &MapProjection, pos: Pos2) -> Option<ShapeId> {
    surface
        .shapes
        .iter()
        .rev()
        .filter(|(_, drawn)| drawn.editable)
        .find(|(_, drawn)| shape_contains(&drawn.shape, proj, pos))
        .map(|(id, _)| *id)
}

fn shape_contains(shape: &ShapeData, proj: &MapProjection, pos: Pos2) -> bool {
    if shape.kind.is_point_like() {
        let reach = match (shape.positions().first(), shape.radius) {
            (Some(center), Some(radius_m)) => {
                (radius_m / proj.metres_per_pixel(center.lat)) as f32 + 4.0
            }
            _ => HIT_RADIUS,
        };
        return shape
            .positions()
            .iter()
            .any(|p| proj.geo_to_screen(*p).distance(pos) <= reach);
    }
    shape.bounds().is_some_and(|bounds| {
        Rect::from_two_pos(
            proj.geo_to_screen(bounds.south_west),
            proj.geo_to_screen(bounds.north_east),
        )
        .expand(4.0)
        .contains(pos)
    })
}

/// The shape moved by a screen offset.
pub(crate) fn translated(shape: &ShapeData, proj: &MapProjection, offset: Vec2) -> ShapeData {
    let mut moved = shape.clone();
    for_each_position(&mut moved.geometry.value, &mut |position| {
        if let [lng, lat, ..] = position.as_mut_slice() {
            let screen = proj.geo_to_screen(LatLng::new(*lat, *lng)) + offset;
            let at = proj.screen_to_geo(screen);
            *lat = at.lat;
            *lng = at.lng;
        }
    });
    moved
}

fn for_each_position(value: &mut GeometryValue, f: &mut impl FnMut(&mut Vec<f64>)) {
    match value {
        GeometryValue::Point(p) => f(p),
        GeometryValue::MultiPoint(points) | GeometryValue::LineString(points) => {
            points.iter_mut().for_each(|p| f(p))
        }
        GeometryValue::MultiLineString(lines) | GeometryValue::Polygon(lines) => {
            lines.iter_mut().flatten().for_each(|p| f(p))
        }
        GeometryValue::MultiPolygon(polygons) => {
            polygons.iter_mut().flatten().flatten().for_each(|p| f(p))
        }
        GeometryValue::GeometryCollection(geometries) => {
            for geometry in geometries {
                for_each_position(&mut geometry.value, f);
            }
        }
    }
}
