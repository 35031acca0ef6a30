//! Playground state that lives outside the map field.

use eframe::egui::Vec2;
use egui_phosphor::regular as icons;
use map_picker::config::DrawToolbar;
use map_picker::geo::{LatLng, ShapeData, ShapeId, ShapeKind};

/// The active canvas tool.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub enum DrawTool {
    /// Clicks go to the map (marker placement).
    #[default]
    Pointer,
    Marker,
    CircleMarker,
    Circle,
    Rectangle,
    Polygon,
    Polyline,
    Text,
    /// Pick a drawn shape, drag it to edit.
    Select,
}

impl DrawTool {
    pub fn all() -> &'static [DrawTool] {
        &[
            DrawTool::Pointer,
            DrawTool::Marker,
            DrawTool::CircleMarker,
            DrawTool::Circle,
            DrawTool::Rectangle,
            DrawTool::Polygon,
            DrawTool::Polyline,
            DrawTool::Text,
            DrawTool::Select,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            DrawTool::Pointer => "Pointer",
            DrawTool::Marker => "Marker",
            DrawTool::CircleMarker => "Circle marker",
            DrawTool::Circle => "Circle",
            DrawTool::Rectangle => "Rectangle",
            DrawTool::Polygon => "Polygon",
            DrawTool::Polyline => "Line",
            DrawTool::Text => "Text",
            DrawTool::Select => "Edit",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            DrawTool::Pointer => icons::CURSOR,
            DrawTool::Marker => icons::MAP_PIN,
            DrawTool::CircleMarker => icons::DOT_OUTLINE,
            DrawTool::Circle => icons::CIRCLE,
            DrawTool::Rectangle => icons::RECTANGLE,
            DrawTool::Polygon => icons::POLYGON,
            DrawTool::Polyline => icons::LINE_SEGMENTS,
            DrawTool::Text => icons::TEXT_T,
            DrawTool::Select => icons::PENCIL_SIMPLE,
        }
    }

    /// Whether the configured toolbar offers this tool.
    pub fn enabled(&self, toolbar: &DrawToolbar) -> bool {
        match self {
            DrawTool::Pointer => true,
            _ if !toolbar.show => false,
            DrawTool::Marker => toolbar.draw_marker,
            DrawTool::CircleMarker => toolbar.draw_circle_marker,
            DrawTool::Circle => toolbar.draw_circle,
            DrawTool::Rectangle => toolbar.draw_rectangle,
            DrawTool::Polygon => toolbar.draw_polygon,
            DrawTool::Polyline => toolbar.draw_polyline,
            DrawTool::Text => toolbar.draw_text,
            DrawTool::Select => toolbar.editable && (toolbar.drag_mode || toolbar.edit_polygon),
        }
    }

    /// Tools that collect vertices until finished explicitly.
    pub fn is_multi_point(&self) -> bool {
        matches!(self, DrawTool::Polygon | DrawTool::Polyline)
    }
}

/// A drawn shape being dragged in edit mode.
#[derive(Debug, Clone)]
pub struct ShapeDrag {
    pub id: ShapeId,
    pub shape: ShapeData,
    /// Accumulated screen offset since the drag started.
    pub offset: Vec2,
}

/// Inputs of the side panels and the in-progress sketch.
pub struct PlaygroundState {
    pub status_message: String,
    pub tool: DrawTool,
    /// Vertices of the shape being drawn.
    pub sketch: Vec<LatLng>,
    pub selected: Option<ShapeId>,
    pub drag: Option<ShapeDrag>,
    pub container_visible: bool,
    pub picking_file: bool,
    /// Name and size of the last bulk-loaded GeoJSON file.
    pub loaded_file: Option<(String, u64)>,
    /// Blocking notices the user has dismissed.
    pub acknowledged_alerts: usize,

    pub marker_lat: String,
    pub marker_lng: String,
    pub marker_fix: bool,
    pub icon_url: String,
    pub icon_color: String,
    pub icon_size: String,
    pub range_text: String,
    pub text_label: String,

    pub simulate_location: bool,
    pub simulated_lat: String,
    pub simulated_lng: String,
}

impl Default for PlaygroundState {
    fn default() -> Self {
        Self {
            status_message: "Ready".to_string(),
            tool: DrawTool::default(),
            sketch: Vec::new(),
            selected: None,
            drag: None,
            container_visible: true,
            picking_file: false,
            loaded_file: None,
            acknowledged_alerts: 0,
            marker_lat: "51.5074".to_string(),
            marker_lng: "-0.1278".to_string(),
            marker_fix: false,
            icon_url: String::new(),
            icon_color: "#ef4444".to_string(),
            icon_size: "32".to_string(),
            range_text: String::new(),
            text_label: "Label".to_string(),
            simulate_location: true,
            simulated_lat: "48.8566".to_string(),
            simulated_lng: "2.3522".to_string(),
        }
    }
}

impl PlaygroundState {
    /// Switches tools, dropping any unfinished sketch.
    pub fn select_tool(&mut self, tool: DrawTool) {
        if self.tool != tool {
            self.tool = tool;
            self.sketch.clear();
            self.drag = None;
            if tool != DrawTool::Select {
                self.selected = None;
            }
        }
    }

    /// Adds a clicked point to the sketch of the current tool.
    ///
    /// Returns the finished shape once the tool has all the points it needs.
    /// Polygons and lines keep collecting until [`finish_sketch`](Self::finish_sketch).
    pub fn sketch_click(&mut self, at: LatLng) -> Option<ShapeData> {
        match self.tool {
            DrawTool::Pointer | DrawTool::Select => None,
            DrawTool::Marker => Some(ShapeData::point(ShapeKind::Marker, at)),
            DrawTool::CircleMarker => Some(ShapeData::point(ShapeKind::CircleMarker, at)),
            DrawTool::Text => Some(ShapeData {
                text: Some(self.text_label.clone()),
                ..ShapeData::point(ShapeKind::Text, at)
            }),
            DrawTool::Circle | DrawTool::Rectangle => match self.sketch.pop() {
                None => {
                    self.sketch.push(at);
                    None
                }
                Some(first) if self.tool == DrawTool::Circle => {
                    Some(ShapeData::circle(first, first.distance_to(&at)))
                }
                Some(first) => Some(ShapeData::rectangle(first, at)),
            },
            DrawTool::Polygon | DrawTool::Polyline => {
                self.sketch.push(at);
                None
            }
        }
    }

    /// Completes a polygon or line sketch; too few points discard it.
    pub fn finish_sketch(&mut self) -> Option<ShapeData> {
        let points = std::mem::take(&mut self.sketch);
        match self.tool {
            DrawTool::Polygon if points.len() >= 3 => {
                Some(ShapeData::polygon(ShapeKind::Polygon, &points))
            }
            DrawTool::Polyline if points.len() >= 2 => Some(ShapeData::polyline(&points)),
            _ => None,
        }
    }

    /// The simulated device position, if enabled and readable.
    pub fn simulated_position(&self) -> Option<LatLng> {
        if !self.simulate_location {
            return None;
        }
        let lat = self.simulated_lat.trim().parse().ok()?;
        let lng = self.simulated_lng.trim().parse().ok()?;
        Some(LatLng::new(lat, lng)).filter(LatLng::is_valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tools_follow_toolbar_flags() {
        let mut toolbar = DrawToolbar::default();
        assert!(DrawTool::Polygon.enabled(&toolbar));
        assert!(!DrawTool::Text.enabled(&toolbar));

        toolbar.show = false;
        assert!(DrawTool::Pointer.enabled(&toolbar));
        assert!(!DrawTool::Marker.enabled(&toolbar));
    }

    #[test]
    fn test_switching_tools_drops_sketch() {
        let mut state = PlaygroundState::default();
        state.select_tool(DrawTool::Polygon);
        state.sketch.push(LatLng::new(1.0, 1.0));
        state.select_tool(DrawTool::Polygon);
        assert_eq!(state.sketch.len(), 1);
        state.select_tool(DrawTool::Circle);
        assert!(state.sketch.is_empty());
    }

    #[test]
    fn test_two_click_shapes() {
        let mut state = PlaygroundState::default();
        state.select_tool(DrawTool::Rectangle);
        assert_eq!(state.sketch_click(LatLng::new(1.0, 1.0)), None);
        let shape = state.sketch_click(LatLng::new(0.0, 2.0)).unwrap();
        assert_eq!(shape.kind, ShapeKind::Rectangle);
        assert!(state.sketch.is_empty());

        state.select_tool(DrawTool::Circle);
        state.sketch_click(LatLng::new(0.0, 0.0));
        let circle = state.sketch_click(LatLng::new(0.0, 1.0)).unwrap();
        let radius = circle.radius.unwrap();
        assert!((radius - 111_195.0).abs() < 100.0);
    }

    #[test]
    fn test_polygon_needs_three_points() {
        let mut state = PlaygroundState::default();
        state.select_tool(DrawTool::Polygon);
        state.sketch_click(LatLng::new(0.0, 0.0));
        state.sketch_click(LatLng::new(1.0, 0.0));
        assert_eq!(state.finish_sketch(), None);
        assert!(state.sketch.is_empty());

        for p in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)] {
            state.sketch_click(LatLng::new(p.0, p.1));
        }
        let polygon = state.finish_sketch().unwrap();
        assert_eq!(polygon.kind, ShapeKind::Polygon);
        assert_eq!(polygon.positions().len(), 4);
    }

    #[test]
    fn test_text_uses_label() {
        let mut state = PlaygroundState::default();
        state.select_tool(DrawTool::Text);
        state.text_label = "Gate".to_string();
        let shape = state.sketch_click(LatLng::new(0.0, 0.0)).unwrap();
        assert_eq!(shape.text.as_deref(), Some("Gate"));
    }

    #[test]
    fn test_simulated_position() {
        let mut state = PlaygroundState::default();
        assert_eq!(state.simulated_position(), Some(LatLng::new(48.8566, 2.3522)));
        state.simulated_lat = "95".to_string();
        assert_eq!(state.simulated_position(), None);
        state.simulated_lat = "10".to_string();
        state.simulate_location = false;
        assert_eq!(state.simulated_position(), None);
    }
}
