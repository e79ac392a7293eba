//! Streaming adapter - adaptive streaming engine lifecycle and quality ladder
//!
//! The adapter owns at most one [`StreamingEngine`] (hls.js in the browser)
//! and guarantees it is destroyed exactly once: when the source changes, when
//! a fatal error cannot be recovered, or when the adapter goes away. Quality
//! levels are captured once the manifest is parsed and kept as a ladder sorted
//! by height, each level remembering the engine index it came from.

use crate::error::{Error, Result};
use crate::types::EngineConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// A rendition as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineLevel {
    pub width: u32,
    pub height: u32,
    /// Bits per second
    pub bitrate: u64,
}

/// Engine error classes used for recovery triage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineErrorKind {
    Network,
    Media,
    Other(String),
}

/// Error reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub fatal: bool,
    pub details: String,
}

/// Events emitted by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamingEvent {
    ManifestParsed,
    MediaAttached,
    Error(EngineError),
}

/// The adaptive streaming engine contract (hls.js subset)
pub trait StreamingEngine {
    fn load_source(&mut self, src: &Url);
    fn attach_media(&mut self);
    /// The engine's level list, `None` if it does not currently hold one
    fn levels(&self) -> Option<Vec<EngineLevel>>;
    fn has_media(&self) -> bool;
    fn set_current_level(&mut self, index: i32);
    fn set_next_level(&mut self, index: i32);
    /// Restart loading after a network error
    fn start_load(&mut self);
    fn recover_media_error(&mut self);
    /// Release network and decode resources
    fn destroy(&mut self);
}

/// Creates engines and reports platform support
pub trait EngineFactory {
    /// The media element plays HLS itself
    fn native_hls_supported(&self) -> bool;
    /// The engine can run on this platform
    fn is_supported(&self) -> bool;
    fn create(&self, config: &EngineConfig) -> Box<dyn StreamingEngine>;
}

/// Whether a user agent belongs to Safari, which plays HLS natively
pub fn is_safari(user_agent: &str) -> bool {
    let ua = user_agent.to_lowercase();
    ua.contains("safari") && !ua.contains("chrome") && !ua.contains("android")
}

/// How the current source is being played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamingMode {
    /// No source loaded
    Detached,
    /// The media element plays the source directly
    Native,
    /// The engine feeds the media element
    Engine,
    /// Neither native playback nor the engine is available
    Unsupported,
    /// The engine hit an unrecoverable error and was destroyed
    Terminated,
}

/// One entry of the quality ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityLevel {
    /// Index in the engine's level list
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub bitrate: u64,
}

impl QualityLevel {
    pub fn label(&self) -> String {
        format!("{}p", self.height)
    }

    /// Premium labelling, only when a threshold is configured
    pub fn is_premium(&self, threshold_bps: Option<u64>) -> bool {
        threshold_bps.is_some_and(|t| self.bitrate >= t)
    }
}

/// Levels sorted by descending height, then descending bitrate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityLadder {
    levels: Vec<QualityLevel>,
}

impl QualityLadder {
    pub fn from_engine(levels: &[EngineLevel]) -> Self {
        let mut levels: Vec<QualityLevel> = levels
            .iter()
            .enumerate()
            .map(|(index, l)| QualityLevel {
                index,
                width: l.width,
                height: l.height,
                bitrate: l.bitrate,
            })
            .collect();
        levels.sort_by(|a, b| b.height.cmp(&a.height).then(b.bitrate.cmp(&a.bitrate)));
        Self { levels }
    }

    pub fn levels(&self) -> &[QualityLevel] {
        &self.levels
    }

    /// Look up a level by its engine index
    pub fn by_engine_index(&self, index: usize) -> Option<&QualityLevel> {
        self.levels.iter().find(|l| l.index == index)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Selected quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QualitySelection {
    /// Engine picks the level
    #[default]
    Auto,
    /// Pinned to an engine level index
    Level(usize),
}

impl QualitySelection {
    /// Engine-style index, -1 meaning automatic
    pub fn as_index(&self) -> i32 {
        match self {
            QualitySelection::Auto => -1,
            QualitySelection::Level(i) => *i as i32,
        }
    }
}

/// Owns an engine and destroys it exactly once
#[derive(Default)]
struct EngineGuard {
    engine: Option<Box<dyn StreamingEngine>>,
}

impl EngineGuard {
    fn new(engine: Box<dyn StreamingEngine>) -> Self {
        Self { engine: Some(engine) }
    }

    fn get(&self) -> Option<&dyn StreamingEngine> {
        self.engine.as_deref()
    }

    fn get_mut(&mut self) -> Option<&mut (dyn StreamingEngine + 'static)> {
        self.engine.as_deref_mut()
    }

    fn destroy(&mut self) -> bool {
        match self.engine.take() {
            Some(mut engine) => {
                engine.destroy();
                true
            }
            None => false,
        }
    }
}

impl Drop for EngineGuard {
    fn drop(&mut self) {
        if self.destroy() {
            debug!("Streaming engine released on drop");
        }
    }
}

/// Streaming engine lifecycle and quality control
pub struct StreamingAdapter {
    config: EngineConfig,
    engine: EngineGuard,
    mode: StreamingMode,
    source: Option<Url>,
    manifest_ready: bool,
    media_attached: bool,
    ladder: QualityLadder,
    selection: QualitySelection,
}

impl StreamingAdapter {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            engine: EngineGuard::default(),
            mode: StreamingMode::Detached,
            source: None,
            manifest_ready: false,
            media_attached: false,
            ladder: QualityLadder::default(),
            selection: QualitySelection::Auto,
        }
    }

    /// Start playing `src`, tearing down any previous engine first
    #[instrument(skip(self, factory), fields(src = %src))]
    pub fn load(&mut self, src: &Url, factory: &dyn EngineFactory) -> StreamingMode {
        self.teardown();
        self.source = Some(src.clone());

        if factory.native_hls_supported() {
            info!("Using native HLS playback");
            self.mode = StreamingMode::Native;
            return self.mode;
        }

        if !factory.is_supported() {
            warn!("No native HLS support and streaming engine unavailable");
            self.mode = StreamingMode::Unsupported;
            return self.mode;
        }

        // Guard first so the engine is released even if setup stops short
        self.engine = EngineGuard::new(factory.create(&self.config));
        if let Some(engine) = self.engine.get_mut() {
            engine.load_source(src);
            engine.attach_media();
        }
        self.mode = StreamingMode::Engine;
        info!(
            enable_worker = self.config.enable_worker,
            back_buffer = self.config.back_buffer_length,
            "Streaming engine attached"
        );
        self.mode
    }

    /// Apply an engine event
    pub fn handle_event(&mut self, event: StreamingEvent) -> Result<()> {
        let Some(engine) = self.engine.get_mut() else {
            debug!(?event, "Ignoring event without a live engine");
            return Ok(());
        };

        match event {
            StreamingEvent::ManifestParsed => {
                self.ladder = QualityLadder::from_engine(&engine.levels().unwrap_or_default());
                self.manifest_ready = true;
                info!(levels = self.ladder.len(), "Manifest parsed");
            }
            StreamingEvent::MediaAttached => {
                self.media_attached = true;
                debug!("Media attached to engine");
            }
            StreamingEvent::Error(err) if !err.fatal => {
                debug!(kind = ?err.kind, details = %err.details, "Non-fatal engine error");
            }
            StreamingEvent::Error(err) => match err.kind {
                EngineErrorKind::Network => {
                    warn!(details = %err.details, "Fatal network error, reloading source");
                    engine.start_load();
                }
                EngineErrorKind::Media => {
                    warn!(details = %err.details, "Fatal media error, recovering");
                    engine.recover_media_error();
                }
                EngineErrorKind::Other(ref kind) => {
                    error!(kind = %kind, details = %err.details, "Unrecoverable engine error, destroying engine");
                    self.engine.destroy();
                    self.mode = StreamingMode::Terminated;
                    self.manifest_ready = false;
                    self.media_attached = false;
                    return Err(Error::EngineTerminated {
                        details: format!("{}: {}", kind, err.details),
                    });
                }
            },
        }
        Ok(())
    }

    /// Request a quality level; -1 selects automatic
    pub fn select_quality(&mut self, index: i32) -> Result<QualitySelection> {
        let media_attached = self.media_attached;
        let manifest_ready = self.manifest_ready;

        let engine = self
            .engine
            .get_mut()
            .ok_or(Error::QualityNotReady { reason: "streaming engine not initialised" })?;
        if !media_attached {
            return Err(Error::QualityNotReady { reason: "media not attached" });
        }
        if !manifest_ready {
            return Err(Error::QualityNotReady { reason: "manifest not parsed" });
        }
        if !engine.has_media() {
            return Err(Error::QualityNotReady { reason: "engine has no media element" });
        }
        let available = engine
            .levels()
            .ok_or(Error::QualityNotReady { reason: "engine reported no level list" })?
            .len();

        let selection = if index == -1 {
            engine.set_current_level(-1);
            engine.set_next_level(-1);
            QualitySelection::Auto
        } else if index >= 0 && (index as usize) < available {
            engine.set_current_level(index);
            QualitySelection::Level(index as usize)
        } else {
            return Err(Error::QualityOutOfRange { index, available });
        };

        self.selection = selection;
        info!(index, "Quality selected");
        Ok(selection)
    }

    /// Destroy the engine and forget the current source state
    pub fn teardown(&mut self) {
        if self.engine.destroy() {
            info!("Streaming engine destroyed");
        }
        self.mode = StreamingMode::Detached;
        self.manifest_ready = false;
        self.media_attached = false;
        self.ladder = QualityLadder::default();
        self.selection = QualitySelection::Auto;
    }

    pub fn mode(&self) -> StreamingMode {
        self.mode
    }

    pub fn source(&self) -> Option<&Url> {
        self.source.as_ref()
    }

    pub fn ladder(&self) -> &QualityLadder {
        &self.ladder
    }

    pub fn selection(&self) -> QualitySelection {
        self.selection
    }

    /// Label for the current selection ("Auto" or "720p")
    pub fn selection_label(&self) -> String {
        match self.selection {
            QualitySelection::Auto => "Auto".to_string(),
            QualitySelection::Level(i) => self
                .ladder
                .by_engine_index(i)
                .map(|l| l.label())
                .unwrap_or_else(|| "Auto".to_string()),
        }
    }

    /// Whether quality menu entries should be enabled
    pub fn quality_selectable(&self) -> bool {
        self.mode == StreamingMode::Engine
            && self.manifest_ready
            && self.media_attached
            && self.engine.get().is_some_and(|e| e.has_media())
    }

    pub fn manifest_ready(&self) -> bool {
        self.manifest_ready
    }

    pub fn media_attached(&self) -> bool {
        self.media_attached
    }

    pub fn has_engine(&self) -> bool {
        self.engine.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{EngineProbe, HeadlessEngineFactory};

    fn ladder() -> Vec<EngineLevel> {
        vec![
            EngineLevel { width: 640, height: 360, bitrate: 800_000 },
            EngineLevel { width: 1920, height: 1080, bitrate: 5_000_000 },
            EngineLevel { width: 1280, height: 720, bitrate: 2_800_000 },
        ]
    }

    fn src() -> Url {
        Url::parse("https://cdn.test/master.m3u8").unwrap()
    }

    fn ready_adapter(probe: &EngineProbe) -> StreamingAdapter {
        let factory = HeadlessEngineFactory::new(probe.clone()).with_levels(ladder());
        let mut adapter = StreamingAdapter::new(EngineConfig::default());
        adapter.load(&src(), &factory);
        adapter.handle_event(StreamingEvent::MediaAttached).unwrap();
        adapter.handle_event(StreamingEvent::ManifestParsed).unwrap();
        adapter
    }

    #[test]
    fn test_safari_detection() {
        let safari = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15";
        let chrome = "Mozilla/5.0 (Windows NT 10.0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
        let android = "Mozilla/5.0 (Linux; Android 14) AppleWebKit/537.36 (KHTML, like Gecko) Version/4.0 Safari/537.36";
        assert!(is_safari(safari));
        assert!(!is_safari(chrome));
        assert!(!is_safari(android));
    }

    #[test]
    fn test_ladder_sorted_with_engine_indices() {
        let ladder = QualityLadder::from_engine(&ladder());
        let heights: Vec<u32> = ladder.levels().iter().map(|l| l.height).collect();
        assert_eq!(heights, vec![1080, 720, 360]);
        assert_eq!(ladder.by_engine_index(0).unwrap().height, 360);
        assert_eq!(ladder.by_engine_index(2).unwrap().label(), "720p");
    }

    #[test]
    fn test_quality_rejected_before_ready() {
        let probe = EngineProbe::default();
        let factory = HeadlessEngineFactory::new(probe.clone()).with_levels(ladder());
        let mut adapter = StreamingAdapter::new(EngineConfig::default());

        assert!(matches!(adapter.select_quality(1), Err(Error::QualityNotReady { .. })));

        adapter.load(&src(), &factory);
        adapter.handle_event(StreamingEvent::MediaAttached).unwrap();
        assert!(matches!(
            adapter.select_quality(1),
            Err(Error::QualityNotReady { reason: "manifest not parsed" })
        ));
        assert_eq!(adapter.selection(), QualitySelection::Auto);
        assert!(probe.level_requests().is_empty());
    }

    #[test]
    fn test_quality_selection() {
        let probe = EngineProbe::default();
        let mut adapter = ready_adapter(&probe);

        assert_eq!(adapter.select_quality(1).unwrap(), QualitySelection::Level(1));
        assert_eq!(adapter.selection().as_index(), 1);
        assert_eq!(adapter.selection_label(), "1080p");

        assert_eq!(adapter.select_quality(-1).unwrap(), QualitySelection::Auto);
        assert_eq!(adapter.selection().as_index(), -1);
        assert_eq!(probe.current_level(), -1);
        assert_eq!(probe.next_level(), -1);
    }

    #[test]
    fn test_quality_out_of_range() {
        let probe = EngineProbe::default();
        let mut adapter = ready_adapter(&probe);
        adapter.select_quality(2).unwrap();

        assert!(matches!(
            adapter.select_quality(3),
            Err(Error::QualityOutOfRange { index: 3, available: 3 })
        ));
        assert!(adapter.select_quality(-2).is_err());
        assert_eq!(adapter.selection(), QualitySelection::Level(2));
    }

    #[test]
    fn test_fatal_error_triage() {
        let probe = EngineProbe::default();
        let mut adapter = ready_adapter(&probe);

        let network = EngineError { kind: EngineErrorKind::Network, fatal: true, details: "manifestLoadError".into() };
        adapter.handle_event(StreamingEvent::Error(network)).unwrap();
        assert_eq!(probe.start_load_calls(), 1);

        let media = EngineError { kind: EngineErrorKind::Media, fatal: true, details: "bufferStalledError".into() };
        adapter.handle_event(StreamingEvent::Error(media)).unwrap();
        assert_eq!(probe.recover_calls(), 1);

        let other = EngineError { kind: EngineErrorKind::Other("muxError".into()), fatal: true, details: "remux".into() };
        assert!(matches!(
            adapter.handle_event(StreamingEvent::Error(other)),
            Err(Error::EngineTerminated { .. })
        ));
        assert_eq!(adapter.mode(), StreamingMode::Terminated);
        assert_eq!(probe.destroy_calls(), 1);

        // Terminal: later events are ignored and nothing is destroyed twice
        adapter.handle_event(StreamingEvent::ManifestParsed).unwrap();
        drop(adapter);
        assert_eq!(probe.destroy_calls(), 1);
    }

    #[test]
    fn test_non_fatal_error_ignored() {
        let probe = EngineProbe::default();
        let mut adapter = ready_adapter(&probe);
        let err = EngineError { kind: EngineErrorKind::Network, fatal: false, details: "fragLoadError".into() };
        adapter.handle_event(StreamingEvent::Error(err)).unwrap();
        assert_eq!(probe.start_load_calls(), 0);
        assert_eq!(adapter.mode(), StreamingMode::Engine);
    }

    #[test]
    fn test_engine_destroyed_once() {
        let probe = EngineProbe::default();
        let factory = HeadlessEngineFactory::new(probe.clone());
        let mut adapter = StreamingAdapter::new(EngineConfig::default());

        adapter.load(&src(), &factory);
        adapter.load(&src(), &factory);
        assert_eq!(probe.created(), 2);
        assert_eq!(probe.destroy_calls(), 1);

        adapter.teardown();
        adapter.teardown();
        drop(adapter);
        assert_eq!(probe.destroy_calls(), 2);
    }

    #[test]
    fn test_native_and_unsupported_modes() {
        let probe = EngineProbe::default();
        let mut adapter = StreamingAdapter::new(EngineConfig::default());

        let native = HeadlessEngineFactory::new(probe.clone()).with_native_hls(true);
        assert_eq!(adapter.load(&src(), &native), StreamingMode::Native);
        assert!(!adapter.has_engine());

        let unsupported = HeadlessEngineFactory::new(probe.clone()).with_engine_support(false);
        assert_eq!(adapter.load(&src(), &unsupported), StreamingMode::Unsupported);

        drop(adapter);
        assert_eq!(probe.created(), 0);
        assert_eq!(probe.destroy_calls(), 0);
    }

    #[test]
    fn test_premium_requires_threshold() {
        let level = QualityLevel { index: 0, width: 3840, height: 2160, bitrate: 8_231_300 };
        assert!(!level.is_premium(None));
        assert!(level.is_premium(Some(8_000_000)));
        assert!(!level.is_premium(Some(10_000_000)));
    }
}
