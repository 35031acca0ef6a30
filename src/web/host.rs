//! Form host backed by a Livewire component.

use super::to_js;
use crate::host::{FormHost, Notice, NoticeLevel};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

/// Id of the hidden input that persists the drawn shapes.
pub const HIDDEN_FIELD_ID: &str = "geomanbox";

/// DOM event carrying non-blocking notices to the page.
pub const NOTICE_EVENT: &str = "map-picker:notice";

/// Reads and writes form state through the component's `$wire` object.
pub struct LivewireHost {
    wire: JsValue,
    document: web_sys::Document,
}

impl LivewireHost {
    pub fn new(wire: JsValue) -> Result<Self, JsValue> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| JsValue::from_str("no document"))?;
        Ok(Self { wire, document })
    }

    fn call(&self, method: &str, args: &js_sys::Array) -> Result<JsValue, JsValue> {
        let function: js_sys::Function =
            js_sys::Reflect::get(&self.wire, &method.into())?.dyn_into()?;
        function.apply(&self.wire, args)
    }

    fn hidden_input(&self) -> Option<web_sys::HtmlInputElement> {
        self.document
            .get_element_by_id(HIDDEN_FIELD_ID)?
            .dyn_into::<web_sys::HtmlInputElement>()
            .ok()
    }

    fn publish(&self, notice: &Notice) {
        let Some(window) = self.document.default_view() else {
            return;
        };
        let detail = js_sys::Object::new();
        let level = format!("{:?}", notice.level).to_lowercase();
        let _ = js_sys::Reflect::set(&detail, &"level".into(), &level.into());
        let _ = js_sys::Reflect::set(&detail, &"message".into(), &notice.message.as_str().into());

        let init = web_sys::CustomEventInit::new();
        init.set_detail(&detail);
        match web_sys::CustomEvent::new_with_event_init_dict(NOTICE_EVENT, &init) {
            Ok(event) => {
                let _ = window.dispatch_event(&event);
            }
            Err(e) => log::error!("Failed to create notice event: {:?}", e),
        }
    }
}

impl FormHost for LivewireHost {
    fn get(&self, path: &str) -> Value {
        match self.call("get", &js_sys::Array::of1(&path.into())) {
            Ok(value) => serde_wasm_bindgen::from_value(value).unwrap_or_else(|e| {
                log::warn!("Unreadable form state at '{}': {}", path, e);
                Value::Null
            }),
            Err(e) => {
                log::error!("$wire.get('{}') failed: {:?}", path, e);
                Value::Null
            }
        }
    }

    fn set(&mut self, path: &str, value: Value) {
        let args = js_sys::Array::of3(&path.into(), &to_js(&value), &JsValue::FALSE);
        if let Err(e) = self.call("set", &args) {
            log::error!("$wire.set('{}') failed: {:?}", path, e);
        }
    }

    fn refresh(&mut self) {
        if let Err(e) = self.call("$refresh", &js_sys::Array::new()) {
            log::error!("$wire.$refresh() failed: {:?}", e);
        }
    }

    fn hidden_field(&self) -> Option<String> {
        self.hidden_input().map(|input| input.value())
    }

    fn set_hidden_field(&mut self, text: &str) {
        if let Some(input) = self.hidden_input() {
            input.set_value(text);
        }
    }

    fn csrf_token(&self) -> Option<String> {
        self.document
            .query_selector("meta[name=\"csrf-token\"]")
            .ok()
            .flatten()
            .and_then(|meta| meta.get_attribute("content"))
            .filter(|token| !token.is_empty())
    }

    fn notify(&mut self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Blocking => {
                log::error!("{}", notice.message);
                if let Some(window) = self.document.default_view() {
                    let _ = window.alert_with_message(&notice.message);
                }
            }
            NoticeLevel::Error => log::error!("{}", notice.message),
            NoticeLevel::Warning => log::warn!("{}", notice.message),
            NoticeLevel::Info | NoticeLevel::Success => log::info!("{}", notice.message),
        }
        if notice.level != NoticeLevel::Blocking {
            self.publish(notice);
        }
    }
}
