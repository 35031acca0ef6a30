//! Binding to the JavaScript map surface.
//!
//! The page supplies a factory function that builds a surface inside the
//! field's container (a thin adapter over the tile and drawing libraries)
//! and returns an object with the methods declared below.

use super::to_js;
use crate::config::DrawToolbar;
use crate::engine::{
    EngineError, EngineFactory, LayerHandle, LayerSwitcher, MapEngine, MarkerIcon, SnapshotImage,
    SurfaceOptions, TileSource, VectorStyle,
};
use crate::geo::{GeoBounds, LatLng, ShapeData, ShapeId};
use geojson::FeatureCollection;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

#[wasm_bindgen]
extern "C" {
    /// A map surface living in the field's container.
    pub type JsSurface;

    #[wasm_bindgen(method)]
    fn configure(this: &JsSurface, options: JsValue);

    #[wasm_bindgen(method, js_name = getCenter)]
    fn get_center(this: &JsSurface) -> JsValue;

    #[wasm_bindgen(method, js_name = getZoom)]
    fn get_zoom(this: &JsSurface) -> f64;

    #[wasm_bindgen(method, js_name = setView)]
    fn set_view(this: &JsSurface, lat: f64, lng: f64, zoom: f64);

    #[wasm_bindgen(method, js_name = flyTo)]
    fn fly_to(this: &JsSurface, lat: f64, lng: f64, zoom: f64);

    #[wasm_bindgen(method, js_name = fitBounds)]
    fn fit_bounds(this: &JsSurface, bounds: JsValue);

    #[wasm_bindgen(method, js_name = addTileLayer)]
    fn add_tile_layer(this: &JsSurface, source: JsValue) -> u32;

    #[wasm_bindgen(method, js_name = addFeatureLayer)]
    fn add_feature_layer(this: &JsSurface, name: &str, features: JsValue, style: JsValue) -> u32;

    #[wasm_bindgen(method, js_name = setLayerVisible)]
    fn set_layer_visible(this: &JsSurface, handle: u32, visible: bool);

    #[wasm_bindgen(method, js_name = setLayerSwitcher)]
    fn set_layer_switcher(this: &JsSurface, switcher: JsValue);

    #[wasm_bindgen(method, js_name = setMarker)]
    fn set_marker(this: &JsSurface, lat: f64, lng: f64, icon: JsValue);

    #[wasm_bindgen(method, js_name = setMarkerIcon)]
    fn set_marker_icon(this: &JsSurface, icon: JsValue);

    #[wasm_bindgen(method, js_name = removeMarker)]
    fn remove_marker(this: &JsSurface);

    #[wasm_bindgen(method, js_name = setRangeCircle)]
    fn set_range_circle(this: &JsSurface, lat: f64, lng: f64, radius: f64);

    #[wasm_bindgen(method, js_name = removeRangeCircle)]
    fn remove_range_circle(this: &JsSurface);

    #[wasm_bindgen(method, js_name = enableDrawToolbar)]
    fn enable_draw_toolbar(this: &JsSurface, toolbar: JsValue);

    /// Draws a shape under the controller's id. The surface drops any
    /// temporary layer the draw tool created for it.
    #[wasm_bindgen(method, js_name = renderShape)]
    fn render_shape(this: &JsSurface, id: f64, feature: JsValue, style: JsValue, editable: bool);

    #[wasm_bindgen(method, js_name = removeShape)]
    fn remove_shape(this: &JsSurface, id: f64);

    #[wasm_bindgen(method, js_name = setLocationButton)]
    fn set_location_button(this: &JsSurface, visible: bool);

    #[wasm_bindgen(method, js_name = setChromeVisible)]
    fn set_chrome_visible(this: &JsSurface, visible: bool);

    /// Synchronously composes the visible layers into a data URL.
    #[wasm_bindgen(method, catch, js_name = toDataUrl)]
    fn to_data_url(this: &JsSurface) -> Result<String, JsValue>;

    #[wasm_bindgen(method)]
    fn remove(this: &JsSurface);
}

/// [`MapEngine`] over a [`JsSurface`].
pub struct JsEngine {
    surface: JsSurface,
}

impl MapEngine for JsEngine {
    fn configure(&mut self, options: &SurfaceOptions) {
        self.surface.configure(to_js(options));
    }

    fn center(&self) -> LatLng {
        serde_wasm_bindgen::from_value(self.surface.get_center()).unwrap_or_else(|e| {
            log::warn!("Surface reported an unreadable center: {}", e);
            LatLng::new(0.0, 0.0)
        })
    }

    fn zoom(&self) -> f64 {
        self.surface.get_zoom()
    }

    fn set_view(&mut self, center: LatLng, zoom: f64) {
        self.surface.set_view(center.lat, center.lng, zoom);
    }

    fn fly_to(&mut self, center: LatLng, zoom: f64) {
        self.surface.fly_to(center.lat, center.lng, zoom);
    }

    fn fit_bounds(&mut self, bounds: &GeoBounds) {
        self.surface.fit_bounds(to_js(bounds));
    }

    fn add_tile_layer(&mut self, source: &TileSource) -> LayerHandle {
        LayerHandle(self.surface.add_tile_layer(to_js(source)))
    }

    fn add_feature_layer(
        &mut self,
        name: &str,
        features: &FeatureCollection,
        style: &VectorStyle,
    ) -> LayerHandle {
        LayerHandle(
            self.surface
                .add_feature_layer(name, to_js(features), to_js(style)),
        )
    }

    fn set_layer_visible(&mut self, handle: LayerHandle, visible: bool) {
        self.surface.set_layer_visible(handle.0, visible);
    }

    fn set_layer_switcher(&mut self, switcher: &LayerSwitcher) {
        self.surface.set_layer_switcher(to_js(switcher));
    }

    fn set_marker(&mut self, at: LatLng, icon: &MarkerIcon) {
        self.surface.set_marker(at.lat, at.lng, icon_value(icon));
    }

    fn set_marker_icon(&mut self, icon: &MarkerIcon) {
        self.surface.set_marker_icon(icon_value(icon));
    }

    fn remove_marker(&mut self) {
        self.surface.remove_marker();
    }

    fn set_range_circle(&mut self, center: LatLng, radius_m: f64) {
        self.surface.set_range_circle(center.lat, center.lng, radius_m);
    }

    fn remove_range_circle(&mut self) {
        self.surface.remove_range_circle();
    }

    fn enable_draw_toolbar(&mut self, toolbar: &DrawToolbar) {
        self.surface.enable_draw_toolbar(to_js(toolbar));
    }

    fn render_shape(
        &mut self,
        id: ShapeId,
        shape: &ShapeData,
        style: &VectorStyle,
        editable: bool,
    ) {
        self.surface.render_shape(
            id.0 as f64,
            to_js(&shape.to_feature()),
            to_js(style),
            editable,
        );
    }

    fn remove_shape(&mut self, id: ShapeId) {
        self.surface.remove_shape(id.0 as f64);
    }

    fn set_location_button(&mut self, visible: bool) {
        self.surface.set_location_button(visible);
    }

    fn set_chrome_visible(&mut self, visible: bool) {
        self.surface.set_chrome_visible(visible);
    }

    fn rasterize(&mut self) -> Result<SnapshotImage, EngineError> {
        let url = self
            .surface
            .to_data_url()
            .map_err(|e| EngineError::Rasterize(format!("{:?}", e)))?;
        SnapshotImage::from_data_url(&url)
    }

    fn destroy(&mut self) {
        self.surface.remove();
    }
}

/// Icon description handed to the surface; pins carry their SVG markup.
fn icon_value(icon: &MarkerIcon) -> JsValue {
    let value = to_js(icon);
    if let MarkerIcon::Pin { color, size } = icon {
        let (x, y) = icon.anchor();
        let anchor = js_sys::Array::of2(&JsValue::from(x), &JsValue::from(y));
        let svg = MarkerIcon::pin_svg(color, *size);
        let _ = js_sys::Reflect::set(&value, &"svg".into(), &svg.into());
        let _ = js_sys::Reflect::set(&value, &"anchor".into(), &anchor);
    }
    value
}

/// Builds surfaces by calling the page's factory with the container.
pub struct JsSurfaceFactory {
    container: web_sys::Element,
    create: js_sys::Function,
}

impl JsSurfaceFactory {
    pub fn new(container: web_sys::Element, create: js_sys::Function) -> Self {
        Self { container, create }
    }
}

impl EngineFactory for JsSurfaceFactory {
    fn create(&mut self) -> Result<Box<dyn MapEngine>, EngineError> {
        let value = self
            .create
            .call1(&JsValue::NULL, &self.container)
            .map_err(|e| EngineError::Create(format!("{:?}", e)))?;
        if value.is_undefined() || value.is_null() {
            return Err(EngineError::Create(
                "surface factory returned nothing".to_string(),
            ));
        }
        Ok(Box::new(JsEngine {
            surface: value.unchecked_into(),
        }))
    }
}
