//! Browser entry point.
//!
//! A page mounts one [`MapPicker`] per field:
//!
//! ```js
//! const picker = new MapPicker(container, config, $wire, createSurface);
//! for (const name of MapPicker.eventNames()) {
//!     $wire.on(name, (payload) => picker.dispatch(name, payload));
//! }
//! ```
//!
//! `createSurface(container)` builds the JavaScript map surface (see
//! [`JsSurface`]) and the page forwards its interaction events to the
//! picker's `mapMoved`, `moveEnd`, `mapClicked` and shape methods. Inputs are
//! queued and handled by a short interval timer, so surface events raised
//! while the controller is driving the surface are never lost.

mod host;
mod surface;
mod visibility;

pub use host::{LivewireHost, HIDDEN_FIELD_ID, NOTICE_EVENT};
pub use surface::{JsEngine, JsSurface, JsSurfaceFactory};
pub use visibility::VisibilityObserver;

use crate::config::MapConfig;
use crate::controller::MapMessage;
use crate::geo::{parse_shapes_value, LatLng, ShapeId};
use crate::host::HostEvent;
use crate::runtime::MapField;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_time::Instant;

/// Interval between two runs of the field's loop.
const PUMP_INTERVAL_MS: i32 = 50;

type Inbox = Rc<RefCell<VecDeque<MapMessage>>>;

#[wasm_bindgen(start)]
pub fn start() {
    // Redirect `log` messages to `console.log`:
    eframe::WebLogger::init(log::LevelFilter::Debug).ok();
}

/// Converts a value for the JavaScript side, with plain objects for maps.
pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> JsValue {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .unwrap_or_else(|e| {
            log::error!("Failed to convert value for JavaScript: {}", e);
            JsValue::NULL
        })
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// One map field mounted in the page.
#[wasm_bindgen]
pub struct MapPicker {
    field: Rc<RefCell<MapField<LivewireHost>>>,
    inbox: Inbox,
    observer: Option<VisibilityObserver>,
    timer: Option<(i32, Closure<dyn FnMut()>)>,
}

#[wasm_bindgen]
impl MapPicker {
    #[wasm_bindgen(constructor)]
    pub fn new(
        container: web_sys::Element,
        config: JsValue,
        wire: JsValue,
        create_surface: js_sys::Function,
    ) -> Result<MapPicker, JsValue> {
        let config: serde_json::Value = serde_wasm_bindgen::from_value(config)?;
        let config = MapConfig::from_value(config).map_err(js_error)?;
        let host = LivewireHost::new(wire)?;
        let factory = JsSurfaceFactory::new(container.clone(), create_surface);

        let field = Rc::new(RefCell::new(MapField::new(config, Box::new(factory), host)));
        field.borrow_mut().attach(false, Instant::now());

        let inbox: Inbox = Rc::default();
        let observer = {
            let inbox = Rc::clone(&inbox);
            VisibilityObserver::observe(&container, move |visible| {
                inbox
                    .borrow_mut()
                    .push_back(MapMessage::VisibilityChanged { visible });
            })?
        };

        let tick = {
            let field = Rc::clone(&field);
            let inbox = Rc::clone(&inbox);
            Closure::<dyn FnMut()>::new(move || pump(&field, &inbox))
        };
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let id = window.set_interval_with_callback_and_timeout_and_arguments_0(
            tick.as_ref().unchecked_ref(),
            PUMP_INTERVAL_MS,
        )?;

        log::info!("Map picker mounted");
        Ok(MapPicker {
            field,
            inbox,
            observer: Some(observer),
            timer: Some((id, tick)),
        })
    }

    /// Names of the form events the picker handles.
    #[wasm_bindgen(js_name = eventNames)]
    pub fn event_names() -> js_sys::Array {
        HostEvent::NAMES.iter().map(|name| JsValue::from_str(name)).collect()
    }

    /// Handles a named form event.
    pub fn dispatch(&self, name: &str, payload: JsValue) -> Result<(), JsValue> {
        let payload: serde_json::Value = if payload.is_undefined() {
            serde_json::Value::Null
        } else {
            serde_wasm_bindgen::from_value(payload)?
        };
        let event = HostEvent::from_named(name, &payload).map_err(js_error)?;
        self.post(MapMessage::Host(event));
        Ok(())
    }

    #[wasm_bindgen(js_name = mapMoved)]
    pub fn map_moved(&self) {
        self.post(MapMessage::MapMoved);
    }

    #[wasm_bindgen(js_name = moveEnd)]
    pub fn move_end(&self) {
        self.post(MapMessage::MoveEnd);
    }

    #[wasm_bindgen(js_name = mapClicked)]
    pub fn map_clicked(&self, lat: f64, lng: f64) {
        self.post(MapMessage::MapClicked(LatLng::new(lat, lng)));
    }

    /// A shape finished drawing; `feature` is its GeoJSON.
    #[wasm_bindgen(js_name = shapeCreated)]
    pub fn shape_created(&self, feature: JsValue) -> Result<(), JsValue> {
        for shape in parse_feature(feature)? {
            self.post(MapMessage::ShapeCreated(shape));
        }
        Ok(())
    }

    #[wasm_bindgen(js_name = shapeEdited)]
    pub fn shape_edited(&self, id: f64, feature: JsValue) -> Result<(), JsValue> {
        let shape = parse_feature(feature)?
            .into_iter()
            .next()
            .ok_or_else(|| JsValue::from_str("edited feature has no geometry"))?;
        self.post(MapMessage::ShapeEdited {
            id: ShapeId(id as u64),
            shape,
        });
        Ok(())
    }

    #[wasm_bindgen(js_name = shapeRemoved)]
    pub fn shape_removed(&self, id: f64) {
        self.post(MapMessage::ShapeRemoved(ShapeId(id as u64)));
    }

    /// The location button was pressed.
    pub fn locate(&self) {
        self.post(MapMessage::LocateRequested);
    }

    #[wasm_bindgen(js_name = selectBaseLayer)]
    pub fn select_base_layer(&self, name: String) {
        self.post(MapMessage::SelectBaseLayer(name));
    }

    #[wasm_bindgen(js_name = setOverlayVisible)]
    pub fn set_overlay_visible(&self, name: String, visible: bool) {
        self.post(MapMessage::SetOverlayVisible { name, visible });
    }

    /// Removes the map and stops every timer; the picker is inert afterwards.
    pub fn destroy(&mut self) {
        if let Some(observer) = self.observer.take() {
            observer.disconnect();
        }
        if let Some((id, _tick)) = self.timer.take() {
            if let Some(window) = web_sys::window() {
                window.clear_interval_with_handle(id);
            }
        }
        self.post(MapMessage::Detach);
        pump(&self.field, &self.inbox);
        log::info!("Map picker destroyed");
    }

    fn post(&self, message: MapMessage) {
        self.inbox.borrow_mut().push_back(message);
    }
}

fn parse_feature(feature: JsValue) -> Result<Vec<crate::geo::ShapeData>, JsValue> {
    let value: serde_json::Value = serde_wasm_bindgen::from_value(feature)?;
    parse_shapes_value(value).map_err(js_error)
}

/// Moves queued inputs into the field and runs it once.
fn pump(field: &RefCell<MapField<LivewireHost>>, inbox: &RefCell<VecDeque<MapMessage>>) {
    let Ok(mut field) = field.try_borrow_mut() else {
        return;
    };
    loop {
        let next = inbox.borrow_mut().pop_front();
        match next {
            Some(message) => field.send(message),
            None => break,
        }
    }
    field.pump(Instant::now());
}
