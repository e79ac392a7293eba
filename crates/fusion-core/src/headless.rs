//! Headless host implementations
//!
//! In-memory stand-ins for the browser: a media element, a streaming engine,
//! a display bridge and a timeline source. Each is cheaply cloneable and
//! clones share state, so a test or a scripted session can keep a handle and
//! inspect what the player did.

use crate::bridge::DisplayBridge;
use crate::error::{Error, Result};
use crate::playback::{MediaElement, PlayAttempt, PlayRejection};
use crate::streaming::{EngineFactory, EngineLevel, StreamingEngine};
use crate::thumbnails::TimelineSource;
use crate::types::EngineConfig;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
struct MediaInner {
    current_time: f64,
    duration: f64,
    volume: f64,
    muted: bool,
    rate: f64,
    paused: bool,
    src: Option<Url>,
    defer_plays: bool,
    next_rejection: Option<PlayRejection>,
    play_calls: usize,
}

/// In-memory media element
#[derive(Debug, Clone)]
pub struct HeadlessMedia {
    inner: Arc<Mutex<MediaInner>>,
}

impl HeadlessMedia {
    /// A paused element whose metadata reports `duration` seconds
    pub fn new(duration: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MediaInner {
                current_time: 0.0,
                duration,
                volume: 1.0,
                muted: false,
                rate: 1.0,
                paused: true,
                src: None,
                defer_plays: false,
                next_rejection: None,
                play_calls: 0,
            })),
        }
    }

    pub fn set_duration(&self, duration: f64) {
        lock(&self.inner).duration = duration;
    }

    /// Make the next `play()` reject with `rejection`
    pub fn reject_next_play(&self, rejection: PlayRejection) {
        lock(&self.inner).next_rejection = Some(rejection);
    }

    /// Leave `play()` pending until the host settles it
    pub fn defer_plays(&self, defer: bool) {
        lock(&self.inner).defer_plays = defer;
    }

    /// Advance the playhead by `seconds` of wall time if playing
    pub fn advance(&self, seconds: f64) {
        let mut inner = lock(&self.inner);
        if inner.paused {
            return;
        }
        let next = inner.current_time + seconds * inner.rate;
        inner.current_time = if inner.duration.is_finite() { next.min(inner.duration) } else { next };
        if inner.duration.is_finite() && inner.current_time >= inner.duration {
            inner.paused = true;
        }
    }

    pub fn src(&self) -> Option<Url> {
        lock(&self.inner).src.clone()
    }

    pub fn play_calls(&self) -> usize {
        lock(&self.inner).play_calls
    }
}

impl MediaElement for HeadlessMedia {
    fn current_time(&self) -> f64 {
        lock(&self.inner).current_time
    }

    fn set_current_time(&mut self, seconds: f64) {
        lock(&self.inner).current_time = seconds;
    }

    fn duration(&self) -> f64 {
        lock(&self.inner).duration
    }

    fn volume(&self) -> f64 {
        lock(&self.inner).volume
    }

    fn set_volume(&mut self, volume: f64) {
        lock(&self.inner).volume = volume;
    }

    fn muted(&self) -> bool {
        lock(&self.inner).muted
    }

    fn set_muted(&mut self, muted: bool) {
        lock(&self.inner).muted = muted;
    }

    fn playback_rate(&self) -> f64 {
        lock(&self.inner).rate
    }

    fn set_playback_rate(&mut self, rate: f64) {
        lock(&self.inner).rate = rate;
    }

    fn paused(&self) -> bool {
        lock(&self.inner).paused
    }

    fn play(&mut self) -> PlayAttempt {
        let mut inner = lock(&self.inner);
        inner.play_calls += 1;
        if let Some(rejection) = inner.next_rejection.take() {
            return PlayAttempt::Rejected(rejection);
        }
        inner.paused = false;
        if inner.defer_plays {
            PlayAttempt::Pending
        } else {
            PlayAttempt::Resolved
        }
    }

    fn pause(&mut self) {
        lock(&self.inner).paused = true;
    }

    fn set_src(&mut self, src: &Url) {
        let mut inner = lock(&self.inner);
        inner.src = Some(src.clone());
        inner.current_time = 0.0;
    }
}

#[derive(Debug)]
struct ProbeState {
    created: usize,
    destroy_calls: usize,
    start_load_calls: usize,
    recover_calls: usize,
    level_requests: Vec<i32>,
    current_level: i32,
    next_level: i32,
    sources: Vec<Url>,
}

impl Default for ProbeState {
    fn default() -> Self {
        Self {
            created: 0,
            destroy_calls: 0,
            start_load_calls: 0,
            recover_calls: 0,
            level_requests: Vec::new(),
            current_level: -1,
            next_level: -1,
            sources: Vec::new(),
        }
    }
}

/// Records every call made on headless engines
#[derive(Debug, Clone, Default)]
pub struct EngineProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl EngineProbe {
    pub fn created(&self) -> usize {
        lock(&self.state).created
    }

    pub fn destroy_calls(&self) -> usize {
        lock(&self.state).destroy_calls
    }

    pub fn start_load_calls(&self) -> usize {
        lock(&self.state).start_load_calls
    }

    pub fn recover_calls(&self) -> usize {
        lock(&self.state).recover_calls
    }

    /// Arguments of every `set_current_level` call
    pub fn level_requests(&self) -> Vec<i32> {
        lock(&self.state).level_requests.clone()
    }

    pub fn current_level(&self) -> i32 {
        lock(&self.state).current_level
    }

    pub fn next_level(&self) -> i32 {
        lock(&self.state).next_level
    }

    pub fn sources(&self) -> Vec<Url> {
        lock(&self.state).sources.clone()
    }
}

/// In-memory streaming engine
pub struct HeadlessEngine {
    probe: EngineProbe,
    levels: Vec<EngineLevel>,
    has_media: bool,
}

impl StreamingEngine for HeadlessEngine {
    fn load_source(&mut self, src: &Url) {
        lock(&self.probe.state).sources.push(src.clone());
    }

    fn attach_media(&mut self) {
        self.has_media = true;
    }

    fn levels(&self) -> Option<Vec<EngineLevel>> {
        Some(self.levels.clone())
    }

    fn has_media(&self) -> bool {
        self.has_media
    }

    fn set_current_level(&mut self, index: i32) {
        let mut state = lock(&self.probe.state);
        state.level_requests.push(index);
        state.current_level = index;
    }

    fn set_next_level(&mut self, index: i32) {
        lock(&self.probe.state).next_level = index;
    }

    fn start_load(&mut self) {
        lock(&self.probe.state).start_load_calls += 1;
    }

    fn recover_media_error(&mut self) {
        lock(&self.probe.state).recover_calls += 1;
    }

    fn destroy(&mut self) {
        self.has_media = false;
        lock(&self.probe.state).destroy_calls += 1;
    }
}

/// Creates [`HeadlessEngine`]s reporting into one probe
#[derive(Debug, Clone)]
pub struct HeadlessEngineFactory {
    probe: EngineProbe,
    levels: Vec<EngineLevel>,
    native_hls: bool,
    engine_supported: bool,
}

impl HeadlessEngineFactory {
    pub fn new(probe: EngineProbe) -> Self {
        Self {
            probe,
            levels: Vec::new(),
            native_hls: false,
            engine_supported: true,
        }
    }

    pub fn with_levels(mut self, levels: Vec<EngineLevel>) -> Self {
        self.levels = levels;
        self
    }

    pub fn with_native_hls(mut self, native: bool) -> Self {
        self.native_hls = native;
        self
    }

    pub fn with_engine_support(mut self, supported: bool) -> Self {
        self.engine_supported = supported;
        self
    }

    pub fn probe(&self) -> &EngineProbe {
        &self.probe
    }
}

impl EngineFactory for HeadlessEngineFactory {
    fn native_hls_supported(&self) -> bool {
        self.native_hls
    }

    fn is_supported(&self) -> bool {
        self.engine_supported
    }

    fn create(&self, _config: &EngineConfig) -> Box<dyn StreamingEngine> {
        lock(&self.probe.state).created += 1;
        Box::new(HeadlessEngine {
            probe: self.probe.clone(),
            levels: self.levels.clone(),
            has_media: false,
        })
    }
}

#[derive(Debug, Default)]
struct BridgeInner {
    fullscreen: bool,
    pip: bool,
    pip_unsupported: bool,
}

/// In-memory display bridge; state flips synchronously on request
#[derive(Debug, Clone, Default)]
pub struct HeadlessBridge {
    inner: Arc<Mutex<BridgeInner>>,
}

impl HeadlessBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pip_supported(self, supported: bool) -> Self {
        lock(&self.inner).pip_unsupported = !supported;
        self
    }
}

impl DisplayBridge for HeadlessBridge {
    fn fullscreen_active(&self) -> bool {
        lock(&self.inner).fullscreen
    }

    fn request_fullscreen(&mut self) -> Result<()> {
        lock(&self.inner).fullscreen = true;
        Ok(())
    }

    fn exit_fullscreen(&mut self) -> Result<()> {
        lock(&self.inner).fullscreen = false;
        Ok(())
    }

    fn pip_active(&self) -> bool {
        lock(&self.inner).pip
    }

    fn request_pip(&mut self) -> Result<()> {
        let mut inner = lock(&self.inner);
        if inner.pip_unsupported {
            return Err(Error::PictureInPicture("NotSupportedError: picture-in-picture is disabled".to_string()));
        }
        inner.pip = true;
        Ok(())
    }

    fn exit_pip(&mut self) -> Result<()> {
        lock(&self.inner).pip = false;
        Ok(())
    }
}

/// Serves timelines from memory, keyed by URL
#[derive(Debug, Clone, Default)]
pub struct StaticTimelineSource {
    documents: HashMap<String, String>,
}

impl StaticTimelineSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, url: &Url, text: impl Into<String>) -> Self {
        self.documents.insert(url.to_string(), text.into());
        self
    }
}

#[async_trait]
impl TimelineSource for StaticTimelineSource {
    async fn fetch(&self, url: &Url) -> Result<String> {
        self.documents
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| Error::TimelineFetch(format!("{}: not found", url)))
    }
}
