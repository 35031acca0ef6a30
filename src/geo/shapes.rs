//! Drawn shapes and the managed feature group.
//!
//! The group is the single source of truth for everything the user has
//! drawn. It serializes to a `FeatureCollection` whose features carry a
//! `shape` property so kinds survive a round trip through the hidden field;
//! circles are written as points with a `radius` (metres).

use super::coords::{GeoBounds, LatLng};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value as GeometryValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Approximate metres per degree of latitude.
const METRES_PER_DEGREE: f64 = 111_320.0;

/// Errors raised while reading or writing GeoJSON documents.
#[derive(Debug, Clone, PartialEq)]
pub enum GeoJsonError {
    /// The document was blank.
    Empty,
    /// The text is not a GeoJSON document.
    Parse(String),
    /// A geometry holds unusable positions.
    InvalidGeometry(String),
    /// The group could not be encoded.
    Serialize(String),
}

impl std::fmt::Display for GeoJsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeoJsonError::Empty => write!(f, "GeoJSON document is empty"),
            GeoJsonError::Parse(msg) => write!(f, "Failed to parse GeoJSON: {}", msg),
            GeoJsonError::InvalidGeometry(msg) => write!(f, "Invalid geometry: {}", msg),
            GeoJsonError::Serialize(msg) => write!(f, "Failed to serialize GeoJSON: {}", msg),
        }
    }
}

impl std::error::Error for GeoJsonError {}

/// Identifier of a shape inside the group. Never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShapeId(pub u64);

impl std::fmt::Display for ShapeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "shape-{}", self.0)
    }
}

/// The kinds of shape the draw toolbar produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Marker,
    CircleMarker,
    Circle,
    #[serde(rename = "Line")]
    Polyline,
    Rectangle,
    Polygon,
    Text,
}

impl ShapeKind {
    /// Name used in the `shape` property and by the draw toolbar.
    pub fn name(&self) -> &'static str {
        match self {
            ShapeKind::Marker => "Marker",
            ShapeKind::CircleMarker => "CircleMarker",
            ShapeKind::Circle => "Circle",
            ShapeKind::Polyline => "Line",
            ShapeKind::Rectangle => "Rectangle",
            ShapeKind::Polygon => "Polygon",
            ShapeKind::Text => "Text",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Marker" => Some(ShapeKind::Marker),
            "CircleMarker" => Some(ShapeKind::CircleMarker),
            "Circle" => Some(ShapeKind::Circle),
            "Line" | "Polyline" | "LineString" => Some(ShapeKind::Polyline),
            "Rectangle" => Some(ShapeKind::Rectangle),
            "Polygon" => Some(ShapeKind::Polygon),
            "Text" => Some(ShapeKind::Text),
            _ => None,
        }
    }

    /// Kinds that are stored as a GeoJSON point.
    pub fn is_point_like(&self) -> bool {
        matches!(
            self,
            ShapeKind::Marker | ShapeKind::CircleMarker | ShapeKind::Circle | ShapeKind::Text
        )
    }

    /// Whether a geometry can carry this kind.
    fn accepts(&self, value: &GeometryValue) -> bool {
        match value {
            GeometryValue::Point(_) => self.is_point_like(),
            GeometryValue::MultiPoint(_) => *self == ShapeKind::Marker,
            GeometryValue::LineString(_) | GeometryValue::MultiLineString(_) => {
                *self == ShapeKind::Polyline
            }
            GeometryValue::Polygon(_) | GeometryValue::MultiPolygon(_) => {
                matches!(self, ShapeKind::Polygon | ShapeKind::Rectangle)
            }
            GeometryValue::GeometryCollection(_) => false,
        }
    }

    /// Kind implied by a bare geometry.
    fn infer(value: &GeometryValue, radius: Option<f64>) -> Option<Self> {
        match value {
            GeometryValue::Point(_) if radius.is_some() => Some(ShapeKind::Circle),
            GeometryValue::Point(_) | GeometryValue::MultiPoint(_) => Some(ShapeKind::Marker),
            GeometryValue::LineString(_) | GeometryValue::MultiLineString(_) => {
                Some(ShapeKind::Polyline)
            }
            GeometryValue::Polygon(_) | GeometryValue::MultiPolygon(_) => Some(ShapeKind::Polygon),
            GeometryValue::GeometryCollection(_) => None,
        }
    }
}

/// A shape as produced by the draw engine or read from a document.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeData {
    pub kind: ShapeKind,
    pub geometry: Geometry,
    /// Circle radius in metres.
    pub radius: Option<f64>,
    /// Label of a text shape.
    pub text: Option<String>,
}

impl ShapeData {
    pub fn new(kind: ShapeKind, geometry: Geometry) -> Self {
        Self {
            kind,
            geometry,
            radius: None,
            text: None,
        }
    }

    pub fn point(kind: ShapeKind, at: LatLng) -> Self {
        Self::new(kind, Geometry::new(GeometryValue::Point(vec![at.lng, at.lat])))
    }

    pub fn circle(center: LatLng, radius_m: f64) -> Self {
        Self {
            radius: Some(radius_m),
            ..Self::point(ShapeKind::Circle, center)
        }
    }

    /// Closed ring polygon from an open list of vertices.
    pub fn polygon(kind: ShapeKind, vertices: &[LatLng]) -> Self {
        let mut ring: Vec<Vec<f64>> = vertices.iter().map(|p| vec![p.lng, p.lat]).collect();
        if ring.len() > 1 && ring.first() != ring.last() {
            let first = ring[0].clone();
            ring.push(first);
        }
        Self::new(kind, Geometry::new(GeometryValue::Polygon(vec![ring])))
    }

    pub fn rectangle(a: LatLng, b: LatLng) -> Self {
        let sw = LatLng::new(a.lat.min(b.lat), a.lng.min(b.lng));
        let ne = LatLng::new(a.lat.max(b.lat), a.lng.max(b.lng));
        Self::polygon(
            ShapeKind::Rectangle,
            &[
                sw,
                LatLng::new(ne.lat, sw.lng),
                ne,
                LatLng::new(sw.lat, ne.lng),
            ],
        )
    }

    pub fn polyline(vertices: &[LatLng]) -> Self {
        let line = vertices.iter().map(|p| vec![p.lng, p.lat]).collect();
        Self::new(ShapeKind::Polyline, Geometry::new(GeometryValue::LineString(line)))
    }

    /// Every position of the geometry in document order.
    pub fn positions(&self) -> Vec<LatLng> {
        let mut out = Vec::new();
        collect_positions(&self.geometry.value, &mut out);
        out
    }

    /// Bounds of the shape, widened by the radius for circles.
    pub fn bounds(&self) -> Option<GeoBounds> {
        let mut bounds = GeoBounds::from_points(self.positions())?;
        if let Some(radius) = self.radius.filter(|r| *r > 0.0) {
            let center = bounds.center();
            let d_lat = radius / METRES_PER_DEGREE;
            let d_lng = radius / (METRES_PER_DEGREE * center.lat.to_radians().cos().max(1e-6));
            bounds.extend(LatLng::new(center.lat - d_lat, center.lng - d_lng));
            bounds.extend(LatLng::new(center.lat + d_lat, center.lng + d_lng));
        }
        Some(bounds)
    }

    fn validate(&self) -> Result<(), GeoJsonError> {
        validate_geometry(&self.geometry.value)?;
        if !self.kind.accepts(&self.geometry.value) {
            return Err(GeoJsonError::InvalidGeometry(format!(
                "{} cannot be stored as {}",
                self.kind.name(),
                geometry_type_name(&self.geometry.value)
            )));
        }
        if let Some(r) = self.radius {
            if !r.is_finite() || r < 0.0 {
                return Err(GeoJsonError::InvalidGeometry(format!("bad radius {}", r)));
            }
        }
        Ok(())
    }

    /// The shape as a GeoJSON feature with its `shape` property.
    pub fn to_feature(&self) -> Feature {
        let mut properties = JsonObject::new();
        properties.insert("shape".to_string(), self.kind.name().into());
        if let Some(radius) = self.radius {
            properties.insert("radius".to_string(), radius.into());
        }
        if let Some(text) = &self.text {
            properties.insert("text".to_string(), text.clone().into());
        }
        Feature {
            bbox: None,
            geometry: Some(self.geometry.clone()),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// The live collection of drawn shapes.
#[derive(Debug, Clone, Default)]
pub struct FeatureGroup {
    shapes: BTreeMap<ShapeId, ShapeData>,
    next_id: u64,
}

impl FeatureGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a group from a GeoJSON document.
    pub fn from_geojson(text: &str) -> Result<Self, GeoJsonError> {
        let mut group = Self::new();
        group.replace_from_geojson(text)?;
        Ok(group)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn get(&self, id: ShapeId) -> Option<&ShapeData> {
        self.shapes.get(&id)
    }

    pub fn contains(&self, id: ShapeId) -> bool {
        self.shapes.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ShapeId, &ShapeData)> {
        self.shapes.iter().map(|(id, s)| (*id, s))
    }

    pub fn ids(&self) -> Vec<ShapeId> {
        self.shapes.keys().copied().collect()
    }

    /// Adds a shape and returns its new id.
    pub fn insert(&mut self, shape: ShapeData) -> Result<ShapeId, GeoJsonError> {
        shape.validate()?;
        self.next_id += 1;
        let id = ShapeId(self.next_id);
        self.shapes.insert(id, shape);
        Ok(id)
    }

    /// Replaces the geometry of an existing shape. Returns `Ok(false)` for an unknown id.
    pub fn update(&mut self, id: ShapeId, shape: ShapeData) -> Result<bool, GeoJsonError> {
        shape.validate()?;
        match self.shapes.get_mut(&id) {
            Some(existing) => {
                *existing = shape;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn remove(&mut self, id: ShapeId) -> Option<ShapeData> {
        self.shapes.remove(&id)
    }

    /// Removes every shape and returns the ids that were dropped.
    pub fn clear(&mut self) -> Vec<ShapeId> {
        let ids = self.ids();
        self.shapes.clear();
        ids
    }

    /// Replaces the whole contents with a parsed document.
    ///
    /// The group is left untouched when parsing fails.
    pub fn replace_from_geojson(&mut self, text: &str) -> Result<Vec<ShapeId>, GeoJsonError> {
        let parsed = parse_shapes(text)?;
        self.shapes.clear();
        let mut ids = Vec::with_capacity(parsed.len());
        for shape in parsed {
            self.next_id += 1;
            let id = ShapeId(self.next_id);
            self.shapes.insert(id, shape);
            ids.push(id);
        }
        Ok(ids)
    }

    pub fn to_feature_collection(&self) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: self.shapes.values().map(ShapeData::to_feature).collect(),
            foreign_members: None,
        }
    }

    /// Serialized form written to the hidden field.
    pub fn to_geojson_string(&self) -> Result<String, GeoJsonError> {
        serde_json::to_string(&self.to_feature_collection())
            .map_err(|e| GeoJsonError::Serialize(e.to_string()))
    }

    /// Bounds over every shape.
    pub fn bounds(&self) -> Option<GeoBounds> {
        let mut iter = self.shapes.values().filter_map(ShapeData::bounds);
        let mut bounds = iter.next()?;
        for b in iter {
            bounds.extend(b.south_west);
            bounds.extend(b.north_east);
        }
        Some(bounds)
    }

    /// First position of the first shape, used when bounds are degenerate.
    pub fn first_position(&self) -> Option<LatLng> {
        self.shapes
            .values()
            .find_map(|s| s.positions().into_iter().next())
    }
}

/// Parses a GeoJSON document into shapes.
///
/// Accepts a FeatureCollection, a Feature or a bare geometry. Geometry
/// collections are flattened and features without geometry are skipped.
pub fn parse_shapes(text: &str) -> Result<Vec<ShapeData>, GeoJsonError> {
    if text.trim().is_empty() {
        return Err(GeoJsonError::Empty);
    }
    let geojson: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| GeoJsonError::Parse(e.to_string()))?;
    shapes_from_geojson(geojson)
}

/// Same as [`parse_shapes`] for an already-decoded JSON value.
pub fn parse_shapes_value(value: serde_json::Value) -> Result<Vec<ShapeData>, GeoJsonError> {
    let geojson =
        GeoJson::from_json_value(value).map_err(|e| GeoJsonError::Parse(e.to_string()))?;
    shapes_from_geojson(geojson)
}

/// Normalizes any GeoJSON value into a FeatureCollection (for overlays).
pub fn to_feature_collection(value: serde_json::Value) -> Result<FeatureCollection, GeoJsonError> {
    let geojson =
        GeoJson::from_json_value(value).map_err(|e| GeoJsonError::Parse(e.to_string()))?;
    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(g) => vec![Feature {
            bbox: None,
            geometry: Some(g),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    };
    for geometry in features.iter().filter_map(|f| f.geometry.as_ref()) {
        validate_geometry(&geometry.value)?;
    }
    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

fn shapes_from_geojson(geojson: GeoJson) -> Result<Vec<ShapeData>, GeoJsonError> {
    let mut shapes = Vec::new();
    match geojson {
        GeoJson::FeatureCollection(fc) => {
            for feature in &fc.features {
                convert_feature(feature, &mut shapes)?;
            }
        }
        GeoJson::Feature(f) => convert_feature(&f, &mut shapes)?,
        GeoJson::Geometry(g) => convert_geometry(g, None, &mut shapes)?,
    }
    Ok(shapes)
}

fn convert_feature(feature: &Feature, out: &mut Vec<ShapeData>) -> Result<(), GeoJsonError> {
    match &feature.geometry {
        Some(geometry) => convert_geometry(geometry.clone(), feature.properties.as_ref(), out),
        None => {
            log::debug!("Skipping feature without geometry");
            Ok(())
        }
    }
}

fn convert_geometry(
    geometry: Geometry,
    properties: Option<&JsonObject>,
    out: &mut Vec<ShapeData>,
) -> Result<(), GeoJsonError> {
    if let GeometryValue::GeometryCollection(members) = geometry.value {
        for member in members {
            convert_geometry(member, properties, out)?;
        }
        return Ok(());
    }

    validate_geometry(&geometry.value)?;

    let radius = properties
        .and_then(|p| p.get("radius"))
        .and_then(|v| v.as_f64())
        .filter(|r| r.is_finite() && *r >= 0.0);
    let text = properties
        .and_then(|p| p.get("text"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let declared = properties
        .and_then(|p| p.get("shape"))
        .and_then(|v| v.as_str())
        .and_then(ShapeKind::from_name)
        .filter(|k| k.accepts(&geometry.value));

    let Some(kind) = declared.or_else(|| ShapeKind::infer(&geometry.value, radius)) else {
        return Ok(());
    };

    out.push(ShapeData {
        kind,
        radius: if kind == ShapeKind::Circle { radius } else { None },
        text: if kind == ShapeKind::Text { text } else { None },
        geometry,
    });
    Ok(())
}

fn geometry_type_name(value: &GeometryValue) -> &'static str {
    match value {
        GeometryValue::Point(_) => "Point",
        GeometryValue::MultiPoint(_) => "MultiPoint",
        GeometryValue::LineString(_) => "LineString",
        GeometryValue::MultiLineString(_) => "MultiLineString",
        GeometryValue::Polygon(_) => "Polygon",
        GeometryValue::MultiPolygon(_) => "MultiPolygon",
        GeometryValue::GeometryCollection(_) => "GeometryCollection",
    }
}

fn validate_geometry(value: &GeometryValue) -> Result<(), GeoJsonError> {
    fn check(position: &[f64]) -> Result<(), GeoJsonError> {
        if position.len() < 2 || !position.iter().all(|c| c.is_finite()) {
            return Err(GeoJsonError::InvalidGeometry(format!(
                "position {:?} needs two finite coordinates",
                position
            )));
        }
        Ok(())
    }

    match value {
        GeometryValue::Point(p) => check(p),
        GeometryValue::MultiPoint(ps) | GeometryValue::LineString(ps) => {
            ps.iter().try_for_each(|p| check(p))
        }
        GeometryValue::MultiLineString(lines) | GeometryValue::Polygon(lines) => lines
            .iter()
            .flatten()
            .try_for_each(|p| check(p)),
        GeometryValue::MultiPolygon(polys) => polys
            .iter()
            .flatten()
            .flatten()
            .try_for_each(|p| check(p)),
        GeometryValue::GeometryCollection(members) => members
            .iter()
            .try_for_each(|g| validate_geometry(&g.value)),
    }
}

fn collect_positions(value: &GeometryValue, out: &mut Vec<LatLng>) {
    let push = |p: &Vec<f64>, out: &mut Vec<LatLng>| {
        if p.len() >= 2 {
            out.push(LatLng::new(p[1], p[0]));
        }
    };
    match value {
        GeometryValue::Point(p) => push(p, out),
        GeometryValue::MultiPoint(ps) | GeometryValue::LineString(ps) => {
            ps.iter().for_each(|p| push(p, out))
        }
        GeometryValue::MultiLineString(lines) | GeometryValue::Polygon(lines) => {
            lines.iter().flatten().for_each(|p| push(p, out))
        }
        GeometryValue::MultiPolygon(polys) => {
            polys.iter().flatten().flatten().for_each(|p| push(p, out))
        }
        GeometryValue::GeometryCollection(members) => {
            members.iter().for_each(|g| collect_positions(&g.value, out))
        }
    }
}
