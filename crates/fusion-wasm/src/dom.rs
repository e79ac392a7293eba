//! DOM implementations of the host traits
//!
//! `<video>` backs [`MediaElement`], the document's fullscreen and
//! picture-in-picture APIs back [`DisplayBridge`], and `performance.now()`
//! drives the player clock.

use fusion_core::{Clock, DisplayBridge, Error, MediaElement, PlayAttempt, PlayRejection, Result};
use js_sys::{Function, Promise, Reflect};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use url::Url;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, HtmlElement, HtmlVideoElement, Performance};

/// Slot for the promise of the latest `play()` call
pub type PendingPlay = Rc<RefCell<Option<Promise>>>;

/// Read `name` and `message` off a rejection value
pub fn rejection(value: &JsValue) -> PlayRejection {
    let field = |key: &str| {
        Reflect::get(value, &key.into())
            .ok()
            .and_then(|v| v.as_string())
            .unwrap_or_default()
    };
    let name = field("name");
    let message = field("message");
    if name.is_empty() && message.is_empty() {
        PlayRejection::new("Error", format!("{:?}", value))
    } else {
        PlayRejection::new(name, message)
    }
}

/// A `<video>` element
pub struct DomMedia {
    video: HtmlVideoElement,
    pending: PendingPlay,
}

impl DomMedia {
    pub fn new(video: HtmlVideoElement, pending: PendingPlay) -> Self {
        Self { video, pending }
    }
}

impl MediaElement for DomMedia {
    fn current_time(&self) -> f64 {
        self.video.current_time()
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.video.set_current_time(seconds);
    }

    fn duration(&self) -> f64 {
        self.video.duration()
    }

    fn volume(&self) -> f64 {
        self.video.volume()
    }

    fn set_volume(&mut self, volume: f64) {
        self.video.set_volume(volume);
    }

    fn muted(&self) -> bool {
        self.video.muted()
    }

    fn set_muted(&mut self, muted: bool) {
        self.video.set_muted(muted);
    }

    fn playback_rate(&self) -> f64 {
        self.video.playback_rate()
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.video.set_playback_rate(rate);
    }

    fn paused(&self) -> bool {
        self.video.paused()
    }

    fn play(&mut self) -> PlayAttempt {
        match self.video.play() {
            Ok(promise) => {
                self.pending.borrow_mut().replace(promise);
                PlayAttempt::Pending
            }
            Err(e) => PlayAttempt::Rejected(rejection(&e)),
        }
    }

    fn pause(&mut self) {
        self.video.pause().ok();
    }

    fn set_src(&mut self, src: &Url) {
        self.video.set_src(src.as_str());
    }
}

/// Whether the `<video>` element plays HLS without an engine (Safari)
pub fn plays_hls_natively(video: &HtmlVideoElement) -> bool {
    !video.can_play_type("application/vnd.apple.mpegurl").is_empty()
}

fn call_method(target: &JsValue, name: &str) -> std::result::Result<JsValue, JsValue> {
    let method: Function = Reflect::get(target, &name.into())?.dyn_into()?;
    method.call0(target)
}

/// Log a display promise's rejection to the console
fn report_rejection(result: JsValue, what: &'static str) {
    if let Ok(promise) = result.dyn_into::<Promise>() {
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = JsFuture::from(promise).await {
                web_sys::console::error_2(&format!("[Fusion] {} failed:", what).into(), &e);
            }
        });
    }
}

/// Fullscreen on the player container, picture-in-picture on the video
pub struct DomBridge {
    document: Document,
    container: HtmlElement,
    video: HtmlVideoElement,
}

impl DomBridge {
    pub fn new(document: Document, container: HtmlElement, video: HtmlVideoElement) -> Self {
        Self { document, container, video }
    }

    fn pip_element(&self) -> JsValue {
        Reflect::get(&self.document, &"pictureInPictureElement".into()).unwrap_or(JsValue::NULL)
    }
}

impl DisplayBridge for DomBridge {
    fn fullscreen_active(&self) -> bool {
        self.document.fullscreen_element().is_some()
    }

    fn request_fullscreen(&mut self) -> Result<()> {
        self.container
            .request_fullscreen()
            .map_err(|e| Error::Fullscreen(format!("{:?}", e)))
    }

    fn exit_fullscreen(&mut self) -> Result<()> {
        self.document.exit_fullscreen();
        Ok(())
    }

    fn pip_active(&self) -> bool {
        let element = self.pip_element();
        !element.is_null() && !element.is_undefined()
    }

    fn request_pip(&mut self) -> Result<()> {
        let result = call_method(&self.video, "requestPictureInPicture")
            .map_err(|e| Error::PictureInPicture(format!("{:?}", e)))?;
        report_rejection(result, "requestPictureInPicture");
        Ok(())
    }

    fn exit_pip(&mut self) -> Result<()> {
        let result = call_method(&self.document, "exitPictureInPicture")
            .map_err(|e| Error::PictureInPicture(format!("{:?}", e)))?;
        report_rejection(result, "exitPictureInPicture");
        Ok(())
    }
}

/// Milliseconds since page load, from `performance.now()`
pub struct PerformanceClock {
    performance: Performance,
}

impl PerformanceClock {
    pub fn new(performance: Performance) -> Self {
        Self { performance }
    }
}

impl Clock for PerformanceClock {
    fn now(&self) -> Duration {
        Duration::from_secs_f64(self.performance.now().max(0.0) / 1000.0)
    }
}
