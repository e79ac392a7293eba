//! Fusion Core - headless logic for the Fusion video player
//!
//! This crate provides the player's state machine, independent of any UI:
//! - Thumbnail timeline parsing and seek previews
//! - Streaming engine lifecycle and the quality ladder
//! - Transport state synchronised with a media element
//! - Keyboard routing, overlay panels, toasts and control auto-hide
//! - Sleep timer, fullscreen and picture-in-picture
//!
//! Hosts implement [`MediaElement`], [`StreamingEngine`], [`EngineFactory`],
//! [`DisplayBridge`] and [`Clock`], feed events into a [`FusionPlayer`] and
//! render its [`PlayerSnapshot`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Fusion Core                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │  Thumbnail   │  │  Streaming   │  │   Playback   │           │
//! │  │  Cue Parser  │  │   Adapter    │  │  Controller  │           │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │   Fusion    │◄──── Scheduler / Clock       │
//! │                    │   Player    │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐            │
//! │  │    Input     │  │  Overlays   │  │  Activity /  │            │
//! │  │    Router    │  │  & Toasts   │  │ Sleep Timer  │            │
//! │  └──────────────┘  └─────────────┘  └──────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod theme;
pub mod scheduler;
pub mod thumbnails;
pub mod streaming;
pub mod playback;
pub mod input;
pub mod overlay;
pub mod activity;
pub mod sleep;
pub mod bridge;
pub mod player;
pub mod headless;
#[cfg(feature = "native")]
pub mod runtime;

pub use error::{Error, Result};
pub use types::*;
pub use theme::{AccentColor, ProgressStyle};
pub use scheduler::{Clock, ManualClock, Scheduler, TimerChannel, ToastKind};
pub use thumbnails::{Cue, SeekPreview, SpriteRect, ThumbnailLoader, ThumbnailTrack, TimelineSource};
pub use streaming::{
    EngineFactory, EngineLevel, QualityLadder, QualityLevel, QualitySelection, StreamingAdapter,
    StreamingEngine, StreamingEvent, StreamingMode,
};
pub use playback::{MediaElement, MediaEvent, PlayAttempt, PlayRejection, PlaybackController, SPEED_PRESETS};
pub use input::{Action, FocusGroup, InputRouter, KeyEvent, KeyTarget, TargetKind};
pub use overlay::{Overlay, Toasts};
pub use sleep::{SleepTimer, SLEEP_PRESETS};
pub use bridge::DisplayBridge;
pub use player::{FusionPlayer, PlayerSnapshot};

#[cfg(feature = "native")]
pub use scheduler::TokioClock;
#[cfg(feature = "native")]
pub use thumbnails::HttpTimelineSource;
#[cfg(feature = "native")]
pub use runtime::{PlayerHandle, PlayerInput, PlayerRuntime};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the player library
pub fn init() {
    tracing::info!(version = VERSION, "Fusion Core initialized");
}
