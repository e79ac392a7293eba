//! Core types for Fusion Player

use crate::error::{Error, Result};
use crate::theme::AccentColor;
use crate::thumbnails::format_time;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Unique identifier for a player instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportState {
    /// No media mounted, or nothing played yet
    Idle,
    /// Media is playing
    Playing,
    /// Playback paused
    Paused,
}

impl TransportState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: TransportState) -> bool {
        use TransportState::*;
        matches!(
            (self, target),
            (Idle, Playing) | (Idle, Paused) |
            (Playing, Paused) | (Playing, Idle) |
            (Paused, Playing) | (Paused, Idle)
        )
    }
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportState::Idle => write!(f, "idle"),
            TransportState::Playing => write!(f, "playing"),
            TransportState::Paused => write!(f, "paused"),
        }
    }
}

/// The single mutable record of playback state.
///
/// Only the playback controller writes to it, in response to media element
/// events or explicit commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    /// Current position in seconds, always within `[0, duration]`
    pub current_time: f64,
    /// Content duration in seconds (0 while unknown, infinite for live)
    pub duration: f64,
    /// Volume in `[0, 1]`
    pub volume: f64,
    /// Whether the media is playing
    pub playing: bool,
    /// Playback rate multiplier
    pub speed: f64,
    /// Whether the container is fullscreen
    pub is_fullscreen: bool,
    /// Whether picture-in-picture was requested
    pub pip_requested: bool,
}

/// What the time readout next to the scrubber shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeDisplay {
    #[default]
    Elapsed,
    Remaining,
}

impl TimeDisplay {
    pub fn toggled(self) -> Self {
        match self {
            TimeDisplay::Elapsed => TimeDisplay::Remaining,
            TimeDisplay::Remaining => TimeDisplay::Elapsed,
        }
    }

    pub fn label(self, state: &PlaybackState) -> String {
        match self {
            TimeDisplay::Elapsed => format_time(state.current_time),
            TimeDisplay::Remaining => {
                format!("-{}", format_time((state.duration - state.current_time).max(0.0)))
            }
        }
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_time: 0.0,
            duration: 0.0,
            volume: PlayerConfig::DEFAULT_VOLUME,
            playing: false,
            speed: 1.0,
            is_fullscreen: false,
            pip_requested: false,
        }
    }
}

impl PlaybackState {
    /// Progress through the content as a percentage
    pub fn progress_percent(&self) -> f64 {
        if self.duration > 0.0 && self.duration.is_finite() {
            (self.current_time / self.duration) * 100.0
        } else {
            0.0
        }
    }
}

/// Streaming engine tuning passed through to the engine on creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Run transmuxing in a web worker
    pub enable_worker: bool,
    /// Low-latency live mode
    pub low_latency_mode: bool,
    /// Seconds of back buffer kept behind the playhead
    pub back_buffer_length: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_worker: true,
            low_latency_mode: false,
            back_buffer_length: 90.0,
        }
    }
}

/// Player configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Volume applied when metadata loads
    pub default_volume: f64,
    /// Inactivity before controls hide while playing (milliseconds)
    pub idle_hide_ms: u64,
    /// Volume toast lifetime (milliseconds)
    pub volume_toast_ms: u64,
    /// Speed toast lifetime (milliseconds)
    pub speed_toast_ms: u64,
    /// Seek toast lifetime (milliseconds)
    pub seek_toast_ms: u64,
    /// Relative seek step for J/L/arrow keys (seconds)
    pub seek_step: f64,
    /// Volume step for up/down arrows
    pub volume_step: f64,
    /// Speed step for Shift+comma/period
    pub speed_step: f64,
    /// Lowest speed reachable from shortcuts
    pub min_speed: f64,
    /// Highest speed reachable from shortcuts
    pub max_speed: f64,
    /// Frame rate assumed by frame stepping
    pub frame_rate: f64,
    /// Streaming engine settings
    pub engine: EngineConfig,
    /// Levels at or above this bitrate are labelled premium (unset = never)
    pub premium_bitrate_bps: Option<u64>,
    /// Diagnostics kept in memory
    pub max_diagnostics: usize,
}

impl PlayerConfig {
    pub const DEFAULT_VOLUME: f64 = 0.7;

    /// Check the configuration for inconsistent values
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_volume) {
            return Err(Error::InvalidConfig(format!(
                "default_volume must be within 0..=1, got {}",
                self.default_volume
            )));
        }
        for (name, value) in [
            ("seek_step", self.seek_step),
            ("volume_step", self.volume_step),
            ("speed_step", self.speed_step),
            ("min_speed", self.min_speed),
            ("max_speed", self.max_speed),
            ("frame_rate", self.frame_rate),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidConfig(format!("{} must be positive, got {}", name, value)));
            }
        }
        if self.min_speed > self.max_speed {
            return Err(Error::InvalidConfig(format!(
                "min_speed {} exceeds max_speed {}",
                self.min_speed, self.max_speed
            )));
        }
        if self.idle_hide_ms == 0 {
            return Err(Error::InvalidConfig("idle_hide_ms must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn idle_hide_delay(&self) -> Duration {
        Duration::from_millis(self.idle_hide_ms)
    }

    /// Duration of a single frame step in seconds
    pub fn frame_duration(&self) -> f64 {
        1.0 / self.frame_rate
    }

    /// Load a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: Self::DEFAULT_VOLUME,
            idle_hide_ms: 5000,
            volume_toast_ms: 1000,
            speed_toast_ms: 1000,
            seek_toast_ms: 700,
            seek_step: 10.0,
            volume_step: 0.05,
            speed_step: 0.25,
            min_speed: 0.25,
            max_speed: 3.0,
            frame_rate: 30.0,
            engine: EngineConfig::default(),
            premium_bitrate_bps: None,
            max_diagnostics: 100,
        }
    }
}

/// Per-instance player inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerOptions {
    /// Media source (HLS manifest or progressive file)
    pub src: Url,
    /// Poster image shown before playback
    pub poster: Option<Url>,
    /// Thumbnail timeline for seek previews
    pub timeline: Option<Url>,
    /// Accent color for the progress bar and highlights
    pub accent_color: AccentColor,
}

impl PlayerOptions {
    pub fn new(src: Url) -> Self {
        Self {
            src,
            poster: None,
            timeline: None,
            accent_color: AccentColor::default(),
        }
    }

    /// Parse the source URL and build options
    pub fn parse(src: &str) -> Result<Self> {
        Ok(Self::new(Url::parse(src)?))
    }

    pub fn with_poster(mut self, poster: Url) -> Self {
        self.poster = Some(poster);
        self
    }

    pub fn with_timeline(mut self, timeline: Url) -> Self {
        self.timeline = Some(timeline);
        self
    }

    pub fn with_accent_color(mut self, color: impl Into<AccentColor>) -> Self {
        self.accent_color = color.into();
        self
    }
}

/// A diagnostic record surfaced by the player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Milliseconds on the player clock when recorded
    pub at_ms: u64,
    /// Error code (see [`Error::error_code`])
    pub code: String,
    /// Human readable message
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_transitions() {
        assert!(TransportState::Idle.can_transition_to(TransportState::Playing));
        assert!(TransportState::Playing.can_transition_to(TransportState::Paused));
        assert!(TransportState::Paused.can_transition_to(TransportState::Idle));
        assert!(!TransportState::Playing.can_transition_to(TransportState::Playing));
    }

    #[test]
    fn test_config_validation() {
        assert!(PlayerConfig::default().validate().is_ok());

        let config = PlayerConfig { min_speed: 4.0, ..Default::default() };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = PlayerConfig { default_volume: 1.5, ..Default::default() };
        assert!(config.validate().is_err());

        for max_speed in [f64::NAN, f64::INFINITY, -1.0] {
            let config = PlayerConfig { max_speed, ..Default::default() };
            assert!(config.validate().is_err(), "{}", max_speed);
        }
    }

    #[test]
    fn test_time_display_labels() {
        let state = PlaybackState { current_time: 75.0, duration: 200.0, ..Default::default() };
        assert_eq!(TimeDisplay::Elapsed.label(&state), "1:15");
        assert_eq!(TimeDisplay::Remaining.label(&state), "-2:05");
        assert_eq!(TimeDisplay::Elapsed.toggled(), TimeDisplay::Remaining);

        let past_end = PlaybackState { current_time: 210.0, duration: 200.0, ..Default::default() };
        assert_eq!(TimeDisplay::Remaining.label(&past_end), "-0:00");
    }

    #[test]
    fn test_config_partial_json() {
        let config = PlayerConfig::from_json(r#"{"idle_hide_ms": 3000}"#).unwrap();
        assert_eq!(config.idle_hide_ms, 3000);
        assert_eq!(config.seek_step, 10.0);
        assert_eq!(config.engine.back_buffer_length, 90.0);
    }

    #[test]
    fn test_progress_percent() {
        let state = PlaybackState { current_time: 30.0, duration: 120.0, ..Default::default() };
        assert_eq!(state.progress_percent(), 25.0);

        let live = PlaybackState { current_time: 30.0, duration: f64::INFINITY, ..Default::default() };
        assert_eq!(live.progress_percent(), 0.0);
    }
}
