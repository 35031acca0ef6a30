//! Geographic primitives for the map field.
//!
//! This module provides coordinates and bounds, the managed feature group with
//! its GeoJSON codec, and the web-mercator projection used by the headless
//! surface and the playground renderer.

mod coords;
mod projection;
mod shapes;

pub use coords::{
    is_document_present, is_value_present, value_as_f64, GeoBounds, LatLng, StoredLocation,
};
pub use projection::{wrap_longitude, MapProjection, MAX_LATITUDE, TILE_SIZE};
pub use shapes::{
    parse_shapes, parse_shapes_value, to_feature_collection, FeatureGroup, GeoJsonError, ShapeData,
    ShapeId, ShapeKind,
};
