//! hls.js bindings
//!
//! Expects the `Hls` class on the global object (the hls.js UMD bundle).

use crate::dom::plays_hls_natively;
use fusion_core::streaming::{is_safari, EngineError, EngineErrorKind};
use fusion_core::{EngineConfig, EngineFactory, EngineLevel, StreamingEngine, StreamingEvent};
use js_sys::{Array, Reflect};
use serde::Serialize;
use std::rc::Rc;
use url::Url;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::HtmlVideoElement;

#[wasm_bindgen]
extern "C" {
    type Hls;

    #[wasm_bindgen(constructor)]
    fn new(config: &JsValue) -> Hls;

    #[wasm_bindgen(static_method_of = Hls, js_name = isSupported)]
    fn is_supported() -> bool;

    #[wasm_bindgen(method, js_name = loadSource)]
    fn load_source(this: &Hls, src: &str);

    #[wasm_bindgen(method, js_name = attachMedia)]
    fn attach_media(this: &Hls, media: &HtmlVideoElement);

    #[wasm_bindgen(method)]
    fn on(this: &Hls, event: &str, callback: &js_sys::Function);

    #[wasm_bindgen(method, getter)]
    fn levels(this: &Hls) -> JsValue;

    #[wasm_bindgen(method, getter)]
    fn media(this: &Hls) -> JsValue;

    #[wasm_bindgen(method, setter = currentLevel)]
    fn set_current_level(this: &Hls, index: i32);

    #[wasm_bindgen(method, setter = nextLevel)]
    fn set_next_level(this: &Hls, index: i32);

    #[wasm_bindgen(method, js_name = startLoad)]
    fn start_load(this: &Hls);

    #[wasm_bindgen(method, js_name = recoverMediaError)]
    fn recover_media_error(this: &Hls);

    #[wasm_bindgen(method)]
    fn destroy(this: &Hls);
}

const MANIFEST_PARSED: &str = "hlsManifestParsed";
const MEDIA_ATTACHED: &str = "hlsMediaAttached";
const ERROR: &str = "hlsError";

/// Receives engine events on the player's behalf
pub type EngineSink = Rc<dyn Fn(StreamingEvent)>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HlsConfig {
    enable_worker: bool,
    low_latency_mode: bool,
    back_buffer_length: f64,
}

impl From<&EngineConfig> for HlsConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            enable_worker: config.enable_worker,
            low_latency_mode: config.low_latency_mode,
            back_buffer_length: config.back_buffer_length,
        }
    }
}

fn number(item: &JsValue, key: &str) -> f64 {
    Reflect::get(item, &key.into())
        .ok()
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0)
}

fn parse_levels(levels: &JsValue) -> Option<Vec<EngineLevel>> {
    if !Array::is_array(levels) {
        return None;
    }
    let levels = Array::from(levels)
        .iter()
        .filter(|item| !item.is_undefined() && !item.is_null())
        .map(|item| EngineLevel {
            width: number(&item, "width") as u32,
            height: number(&item, "height") as u32,
            bitrate: number(&item, "bitrate") as u64,
        })
        .collect();
    Some(levels)
}

fn parse_error(data: &JsValue) -> EngineError {
    let text = |key: &str| {
        Reflect::get(data, &key.into())
            .ok()
            .and_then(|v| v.as_string())
            .unwrap_or_default()
    };
    let kind = match text("type").as_str() {
        "networkError" => EngineErrorKind::Network,
        "mediaError" => EngineErrorKind::Media,
        other => EngineErrorKind::Other(other.to_string()),
    };
    let fatal = Reflect::get(data, &"fatal".into())
        .ok()
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    EngineError { kind, fatal, details: text("details") }
}

/// A live hls.js instance
pub struct HlsEngine {
    hls: Hls,
    video: HtmlVideoElement,
    listeners: Vec<Closure<dyn FnMut(JsValue, JsValue)>>,
    destroyed: bool,
}

impl HlsEngine {
    fn new(config: &EngineConfig, video: HtmlVideoElement, sink: EngineSink) -> Self {
        let config = serde_wasm_bindgen::to_value(&HlsConfig::from(config)).unwrap_or(JsValue::UNDEFINED);
        let hls = Hls::new(&config);

        let mut listeners = Vec::with_capacity(3);
        for name in [MANIFEST_PARSED, MEDIA_ATTACHED, ERROR] {
            let sink = sink.clone();
            let callback = Closure::<dyn FnMut(JsValue, JsValue)>::new(move |_event: JsValue, data: JsValue| {
                let event = match name {
                    MANIFEST_PARSED => StreamingEvent::ManifestParsed,
                    MEDIA_ATTACHED => StreamingEvent::MediaAttached,
                    _ => StreamingEvent::Error(parse_error(&data)),
                };
                sink(event);
            });
            hls.on(name, callback.as_ref().unchecked_ref());
            listeners.push(callback);
        }

        Self { hls, video, listeners, destroyed: false }
    }
}

impl StreamingEngine for HlsEngine {
    fn load_source(&mut self, src: &Url) {
        self.hls.load_source(src.as_str());
    }

    fn attach_media(&mut self) {
        self.hls.attach_media(&self.video);
    }

    fn levels(&self) -> Option<Vec<EngineLevel>> {
        parse_levels(&self.hls.levels())
    }

    fn has_media(&self) -> bool {
        let media = self.hls.media();
        !media.is_null() && !media.is_undefined()
    }

    fn set_current_level(&mut self, index: i32) {
        self.hls.set_current_level(index);
    }

    fn set_next_level(&mut self, index: i32) {
        self.hls.set_next_level(index);
    }

    fn start_load(&mut self) {
        self.hls.start_load();
    }

    fn recover_media_error(&mut self) {
        self.hls.recover_media_error();
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.hls.destroy();
        self.listeners.clear();
    }
}

/// Creates hls.js engines bound to one `<video>` element
pub struct HlsFactory {
    video: HtmlVideoElement,
    sink: EngineSink,
}

impl HlsFactory {
    pub fn new(video: HtmlVideoElement, sink: EngineSink) -> Self {
        Self { video, sink }
    }
}

impl EngineFactory for HlsFactory {
    /// Safari only; other browsers that claim HLS support still go through hls.js
    fn native_hls_supported(&self) -> bool {
        let user_agent = web_sys::window()
            .and_then(|window| window.navigator().user_agent().ok())
            .unwrap_or_default();
        is_safari(&user_agent) && plays_hls_natively(&self.video)
    }

    fn is_supported(&self) -> bool {
        Reflect::has(&js_sys::global(), &"Hls".into()).unwrap_or(false) && Hls::is_supported()
    }

    fn create(&self, config: &EngineConfig) -> Box<dyn StreamingEngine> {
        Box::new(HlsEngine::new(config, self.video.clone(), self.sink.clone()))
    }
}
