//! `FusionWebPlayer` - the player wired to a live page
//!
//! DOM listeners, hls.js callbacks and promise continuations all funnel into
//! one `FusionPlayer` behind a `RefCell`. A callback that lands while the
//! player is already borrowed is queued and run by the current holder before
//! it lets go.

use crate::dom::{rejection, DomBridge, DomMedia, PendingPlay, PerformanceClock};
use crate::hls::{EngineSink, HlsFactory};
use fusion_core::input::{shortcut_sections, FocusGroup};
use fusion_core::{
    FusionPlayer, KeyEvent, KeyTarget, MediaEvent, Overlay, PlayerConfig, PlayerId, PlayerOptions, TargetKind,
    ThumbnailTrack,
};
use js_sys::Function;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use url::Url;
use uuid::Uuid;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{
    Document, Element, Event, EventTarget, HtmlElement, HtmlStyleElement, HtmlVideoElement, KeyboardEvent, Response,
    Window,
};

/// Attribute marking a player container with its id
const OWNER_ATTRIBUTE: &str = "data-fusion-player";

/// Timer poll interval (milliseconds)
const TICK_MS: i32 = 100;

const MEDIA_EVENTS: [(&str, MediaEvent); 8] = [
    ("loadedmetadata", MediaEvent::LoadedMetadata),
    ("durationchange", MediaEvent::DurationChange),
    ("timeupdate", MediaEvent::TimeUpdate),
    ("volumechange", MediaEvent::VolumeChange),
    ("ratechange", MediaEvent::RateChange),
    ("play", MediaEvent::Play),
    ("pause", MediaEvent::Pause),
    ("ended", MediaEvent::Ended),
];

type Job = Box<dyn FnOnce(&mut FusionPlayer)>;

thread_local! {
    /// Every player on the page shares the document's keyboard
    static PAGE_FOCUS: FocusGroup = FocusGroup::new();
}

fn js_error(e: fusion_core::Error) -> JsValue {
    JsError::new(&e.to_string()).into()
}

fn warn(message: &str) {
    web_sys::console::warn_1(&format!("[Fusion] {}", message).into());
}

struct Shared {
    player: RefCell<FusionPlayer>,
    queued: RefCell<VecDeque<Job>>,
    pending_play: PendingPlay,
    on_change: RefCell<Option<Function>>,
}

impl Shared {
    /// Run `f` against the player, then anything queued meanwhile.
    /// `None` when the player is already borrowed further up the stack.
    fn with<R>(self: &Rc<Self>, notify: bool, f: impl FnOnce(&mut FusionPlayer) -> R) -> Option<R> {
        let result = {
            let mut player = self.player.try_borrow_mut().ok()?;
            let result = f(&mut player);
            loop {
                let job = self.queued.borrow_mut().pop_front();
                match job {
                    Some(job) => job(&mut player),
                    None => break,
                }
            }
            result
        };
        self.watch_play();
        if notify {
            self.notify();
        }
        Some(result)
    }

    /// Run `job` now, or as soon as the current borrow ends
    fn post(self: &Rc<Self>, job: impl FnOnce(&mut FusionPlayer) + 'static) {
        self.queued.borrow_mut().push_back(Box::new(job));
        self.with(true, |_| ());
    }

    /// Settle the latest `play()` promise once it resolves
    fn watch_play(self: &Rc<Self>) {
        let promise = self.pending_play.borrow_mut().take();
        let Some(promise) = promise else {
            return;
        };
        let shared = Rc::downgrade(self);
        spawn_local(async move {
            let result = JsFuture::from(promise).await.map(|_| ()).map_err(|e| rejection(&e));
            if let Some(shared) = shared.upgrade() {
                shared.post(move |player| {
                    if let Err(e) = player.settle_play(result) {
                        warn(&e.to_string());
                    }
                });
            }
        });
    }

    fn notify(&self) {
        let callback = self.on_change.borrow().clone();
        let Some(callback) = callback else {
            return;
        };
        let snapshot = match self.player.try_borrow() {
            Ok(player) => serde_wasm_bindgen::to_value(&player.snapshot()),
            Err(_) => return,
        };
        match snapshot {
            Ok(snapshot) => {
                callback.call1(&JsValue::NULL, &snapshot).ok();
            }
            Err(e) => warn(&format!("snapshot serialization failed: {}", e)),
        }
    }
}

/// An event listener removed when dropped
struct Listener {
    target: EventTarget,
    name: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

impl Listener {
    fn attach(target: &EventTarget, name: &'static str, callback: impl FnMut(Event) + 'static) -> Result<Self, JsValue> {
        let callback = Closure::<dyn FnMut(Event)>::new(callback);
        target.add_event_listener_with_callback(name, callback.as_ref().unchecked_ref())?;
        Ok(Self { target: target.clone(), name, callback })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.target
            .remove_event_listener_with_callback(self.name, self.callback.as_ref().unchecked_ref())
            .ok();
    }
}

/// A `setInterval` cleared when dropped
struct Ticker {
    window: Window,
    handle: i32,
    _callback: Closure<dyn FnMut()>,
}

impl Ticker {
    fn start(window: &Window, period_ms: i32, callback: impl FnMut() + 'static) -> Result<Self, JsValue> {
        let callback = Closure::<dyn FnMut()>::new(callback);
        let handle = window.set_interval_with_callback_and_timeout_and_arguments_0(
            callback.as_ref().unchecked_ref(),
            period_ms,
        )?;
        Ok(Self { window: window.clone(), handle, _callback: callback })
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.window.clear_interval_with_handle(self.handle);
    }
}

fn key_target(event: &KeyboardEvent) -> KeyTarget {
    let Some(element) = event.target().and_then(|t| t.dyn_into::<Element>().ok()) else {
        return KeyTarget::default();
    };
    let kind = match element.tag_name().to_ascii_uppercase().as_str() {
        "INPUT" => TargetKind::TextInput,
        "TEXTAREA" => TargetKind::TextArea,
        _ if element
            .dyn_ref::<HtmlElement>()
            .map_or(false, |e| e.is_content_editable()) =>
        {
            TargetKind::ContentEditable
        }
        _ => TargetKind::Other,
    };
    let owner = element
        .closest(&format!("[{}]", OWNER_ATTRIBUTE))
        .ok()
        .flatten()
        .and_then(|container| container.get_attribute(OWNER_ATTRIBUTE))
        .and_then(|id| id.parse::<Uuid>().ok())
        .map(PlayerId);
    KeyTarget { kind, owner }
}

fn resolve(window: &Window, href: &str) -> Result<Url, JsValue> {
    let base = window.location().href()?;
    let base = Url::parse(&base).map_err(|e| JsValue::from_str(&e.to_string()))?;
    base.join(href).map_err(|e| JsValue::from_str(&e.to_string()))
}

async fn fetch_text(window: &Window, url: &Url) -> Result<String, JsValue> {
    let response: Response = JsFuture::from(window.fetch_with_str(url.as_str())).await?.dyn_into()?;
    if !response.ok() {
        return Err(JsValue::from_str(&format!("HTTP {}", response.status())));
    }
    let text = JsFuture::from(response.text()?).await?;
    text.as_string().ok_or_else(|| JsValue::from_str("timeline body is not text"))
}

/// Fusion Player bound to a container and its `<video>`
#[wasm_bindgen]
pub struct FusionWebPlayer {
    shared: Rc<Shared>,
    window: Window,
    factory: HlsFactory,
    listeners: Vec<Listener>,
    ticker: Option<Ticker>,
    /// Accent variables scoped to the container
    style: HtmlStyleElement,
    selector: String,
}

#[wasm_bindgen]
impl FusionWebPlayer {
    /// Mount on `container`, which holds `video`. `config` is an optional
    /// partial player configuration object.
    #[wasm_bindgen(constructor)]
    pub fn new(container: HtmlElement, video: HtmlVideoElement, config: JsValue) -> Result<FusionWebPlayer, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document: Document = window.document().ok_or_else(|| JsValue::from_str("no document"))?;
        let performance = window
            .performance()
            .ok_or_else(|| JsValue::from_str("no performance clock"))?;

        let config: PlayerConfig = if config.is_undefined() || config.is_null() {
            PlayerConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)?
        };

        let pending_play = PendingPlay::default();
        let mut player = FusionPlayer::new(config, PerformanceClock::new(performance)).map_err(js_error)?;
        player.mount(
            Box::new(DomMedia::new(video.clone(), pending_play.clone())),
            Box::new(DomBridge::new(document.clone(), container.clone(), video.clone())),
        );
        PAGE_FOCUS.with(|group| player.join_focus_group(group));
        let id = player.id().to_string();
        container.set_attribute(OWNER_ATTRIBUTE, &id)?;
        let selector = format!("[{}=\"{}\"]", OWNER_ATTRIBUTE, id);
        let style: HtmlStyleElement = document.create_element("style")?.dyn_into()?;
        container.append_child(&style)?;

        let shared = Rc::new(Shared {
            player: RefCell::new(player),
            queued: RefCell::new(VecDeque::new()),
            pending_play,
            on_change: RefCell::new(None),
        });

        let weak: Weak<Shared> = Rc::downgrade(&shared);
        let sink: EngineSink = Rc::new(move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.post(move |player| player.handle_engine_event(event));
            }
        });
        let factory = HlsFactory::new(video.clone(), sink);

        let mut listeners = Vec::new();
        for (name, event) in MEDIA_EVENTS {
            let shared = shared.clone();
            listeners.push(Listener::attach(&video, name, move |_| {
                shared.post(move |player| player.handle_media_event(event));
            })?);
        }
        for (name, active) in [("enterpictureinpicture", true), ("leavepictureinpicture", false)] {
            let shared = shared.clone();
            listeners.push(Listener::attach(&video, name, move |_| {
                shared.post(move |player| player.on_pip_change(active));
            })?);
        }
        {
            let shared = shared.clone();
            let doc = document.clone();
            listeners.push(Listener::attach(&document, "fullscreenchange", move |_| {
                let active = doc.fullscreen_element().is_some();
                shared.post(move |player| player.on_fullscreen_change(active));
            })?);
        }
        {
            let shared = shared.clone();
            listeners.push(Listener::attach(&document, "keydown", move |event| {
                let Some(key) = event.dyn_ref::<KeyboardEvent>() else {
                    return;
                };
                let input = match key.shift_key() {
                    true => KeyEvent::shifted(key.code()),
                    false => KeyEvent::new(key.code()),
                };
                let input = input.with_target(key_target(key));
                if let Some(Some(dispatch)) = shared.with(true, |player| player.handle_key(&input)) {
                    if dispatch.prevent_default {
                        key.prevent_default();
                    }
                }
            })?);
        }
        let pointer: [(&'static str, fn(&mut FusionPlayer)); 4] = [
            ("pointerenter", FusionPlayer::pointer_enter),
            ("pointermove", FusionPlayer::pointer_move),
            ("pointerleave", FusionPlayer::pointer_leave),
            ("focusin", FusionPlayer::activate),
        ];
        for (name, handler) in pointer {
            let shared = shared.clone();
            listeners.push(Listener::attach(&container, name, move |_| {
                shared.with(true, handler);
            })?);
        }

        let ticker = {
            let shared = shared.clone();
            Ticker::start(&window, TICK_MS, move || {
                let fired = shared.with(false, |player| player.poll_timers());
                if fired.map_or(false, |channels| !channels.is_empty()) {
                    shared.notify();
                }
            })?
        };

        web_sys::console::log_1(&"[Fusion] Player mounted".into());
        Ok(Self {
            shared,
            window,
            factory,
            listeners,
            ticker: Some(ticker),
            style,
            selector,
        })
    }

    /// Player instance id
    #[wasm_bindgen(getter)]
    pub fn id(&self) -> String {
        self.shared.player.borrow().id().to_string()
    }

    /// Load a source. Relative URLs resolve against the page. Returns the
    /// streaming mode: "Native", "Engine" or "Unsupported".
    pub fn load(
        &self,
        src: &str,
        poster: Option<String>,
        timeline: Option<String>,
        accent_color: Option<String>,
    ) -> Result<String, JsValue> {
        let mut options = PlayerOptions::new(resolve(&self.window, src)?);
        if let Some(poster) = poster {
            options = options.with_poster(resolve(&self.window, &poster)?);
        }
        if let Some(timeline) = timeline {
            options = options.with_timeline(resolve(&self.window, &timeline)?);
        }
        if let Some(color) = accent_color {
            options = options.with_accent_color(color);
        }
        let css = options.accent_color.css_variables(&self.selector);
        self.style.set_text_content(Some(&css));

        let timeline = options.timeline.clone();
        let mode = self
            .shared
            .with(true, |player| player.load(options, &self.factory))
            .ok_or_else(|| JsValue::from_str("player is busy"))?;

        if let Some(url) = timeline {
            self.load_timeline(url);
        }
        Ok(format!("{:?}", mode))
    }

    pub fn play(&self) -> Result<(), JsValue> {
        self.call(|p| p.play().map(|_| ()))
    }

    pub fn pause(&self) -> Result<(), JsValue> {
        self.call(|p| p.pause().map(|_| ()))
    }

    pub fn toggle_play(&self) -> Result<(), JsValue> {
        self.call(|p| p.toggle_play().map(|_| ()))
    }

    /// Click on the video surface
    pub fn click_surface(&self) {
        self.run(|p| p.click_surface());
    }

    pub fn seek(&self, seconds: f64) -> Result<f64, JsValue> {
        self.call(|p| p.seek(seconds))
    }

    /// Seek to a percentage of the duration (scrubber input)
    pub fn seek_percent(&self, percent: f64) -> Result<f64, JsValue> {
        self.call(|p| p.seek_percent(percent))
    }

    pub fn set_volume(&self, volume: f64) -> Result<f64, JsValue> {
        self.call(|p| p.set_volume(volume))
    }

    /// Switch the time readout between elapsed and remaining
    pub fn toggle_time_display(&self) {
        self.run(|p| {
            p.toggle_time_display();
        });
    }

    /// Hover preview for a pointer at `x` over a scrubber `width` pixels wide
    pub fn hover_scrubber(&self, x: f64, width: f64) -> Result<JsValue, JsValue> {
        let preview = self
            .shared
            .with(true, |p| p.hover_scrubber(x, width).cloned())
            .flatten();
        Ok(serde_wasm_bindgen::to_value(&preview)?)
    }

    pub fn leave_scrubber(&self) {
        self.run(|p| p.leave_scrubber());
    }

    /// Open a panel by name ("Settings", "Quality", "Speed", "SleepTimer",
    /// "Shortcuts" or "None")
    pub fn open_overlay(&self, panel: JsValue) -> Result<(), JsValue> {
        let panel: Overlay = serde_wasm_bindgen::from_value(panel)?;
        self.run(|p| p.open_overlay(panel));
        Ok(())
    }

    pub fn toggle_settings(&self) {
        self.run(|p| {
            p.toggle_settings();
        });
    }

    pub fn overlay_back(&self) {
        self.run(|p| {
            p.overlay_back();
        });
    }

    pub fn close_overlay(&self) {
        self.run(|p| p.close_overlay());
    }

    /// Engine level index, -1 for auto
    pub fn select_quality(&self, index: i32) -> Result<(), JsValue> {
        self.call(|p| p.select_quality(index).map(|_| ()))
    }

    pub fn select_speed(&self, rate: f64) -> Result<(), JsValue> {
        self.call(|p| p.select_speed(rate).map(|_| ()))
    }

    /// Minutes until playback pauses, 0 to cancel
    pub fn select_sleep_timer(&self, minutes: u32) {
        self.run(|p| p.select_sleep_timer(minutes));
    }

    pub fn toggle_fullscreen(&self) -> Result<(), JsValue> {
        self.call(|p| p.toggle_fullscreen().map(|_| ()))
    }

    pub fn toggle_pip(&self) -> Result<(), JsValue> {
        self.call(|p| p.toggle_pip().map(|_| ()))
    }

    /// Current render state
    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        let snapshot = self.shared.player.try_borrow().map_err(|_| JsValue::from_str("player is busy"))?.snapshot();
        Ok(serde_wasm_bindgen::to_value(&snapshot)?)
    }

    /// Called with a fresh snapshot after every state change; pass
    /// `undefined` to stop
    pub fn on_change(&self, callback: Option<Function>) {
        self.shared.on_change.replace(callback);
    }

    /// Keyboard shortcut reference
    pub fn shortcuts() -> Result<JsValue, JsValue> {
        Ok(serde_wasm_bindgen::to_value(shortcut_sections())?)
    }

    /// Remove listeners, stop timers and release the engine. Safe to call
    /// more than once.
    pub fn destroy(&mut self) {
        self.ticker = None;
        self.listeners.clear();
        self.shared.on_change.replace(None);
        self.style.remove();
        self.run(|p| p.teardown());
    }
}

impl FusionWebPlayer {
    fn call<R>(&self, f: impl FnOnce(&mut FusionPlayer) -> fusion_core::Result<R>) -> Result<R, JsValue> {
        self.shared
            .with(true, f)
            .ok_or_else(|| JsValue::from_str("player is busy"))?
            .map_err(js_error)
    }

    fn run(&self, f: impl FnOnce(&mut FusionPlayer)) {
        if self.shared.with(true, f).is_none() {
            warn("player is busy, call dropped");
        }
    }

    fn load_timeline(&self, url: Url) {
        let shared = Rc::downgrade(&self.shared);
        let window = self.window.clone();
        spawn_local(async move {
            let track = match fetch_text(&window, &url).await {
                Ok(text) => ThumbnailTrack::parse_with_base(&text, Some(&url)),
                Err(e) => {
                    web_sys::console::warn_2(&format!("[Fusion] Timeline {} unavailable:", url).into(), &e);
                    return;
                }
            };
            if let Some(shared) = shared.upgrade() {
                shared.post(move |player| {
                    // A newer load may have replaced the timeline
                    if player.timeline_url() == Some(&url) {
                        player.set_thumbnails(track);
                    }
                });
            }
        });
    }
}

impl Drop for FusionWebPlayer {
    fn drop(&mut self) {
        self.destroy();
    }
}
