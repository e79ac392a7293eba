//! Playback controller - transport state over a media element
//!
//! The controller is the only writer of [`PlaybackState`]. It issues commands
//! to the mounted [`MediaElement`] and folds the element's events back into
//! state. Every command is a no-op error ([`Error::MediaNotMounted`]) while no
//! element is mounted.

use crate::error::{Error, Result};
use crate::types::{PlaybackState, PlayerConfig, TransportState};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use url::Url;

/// Speeds offered by the speed menu
pub const SPEED_PRESETS: [f64; 10] = [0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0, 2.5, 3.0];

/// Why the media element refused to play
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayRejection {
    /// DOMException name, e.g. "AbortError" or "NotAllowedError"
    pub name: String,
    pub message: String,
}

impl PlayRejection {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), message: message.into() }
    }

    pub fn abort() -> Self {
        Self::new("AbortError", "The play() request was interrupted")
    }

    /// Interrupted by a later command; benign
    pub fn is_abort(&self) -> bool {
        self.name == "AbortError"
    }
}

impl std::fmt::Display for PlayRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Immediate result of asking the element to play
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayAttempt {
    /// Playback started
    Resolved,
    /// The host settles it later through [`PlaybackController::settle_play`]
    Pending,
    Rejected(PlayRejection),
}

/// The HTML media element contract
pub trait MediaElement {
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, seconds: f64);
    /// NaN until metadata is known, infinite for live streams
    fn duration(&self) -> f64;
    fn volume(&self) -> f64;
    fn set_volume(&mut self, volume: f64);
    fn muted(&self) -> bool;
    fn set_muted(&mut self, muted: bool);
    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&mut self, rate: f64);
    fn paused(&self) -> bool;
    fn play(&mut self) -> PlayAttempt;
    fn pause(&mut self);
    /// Point the element at a source it plays natively
    fn set_src(&mut self, src: &Url);
}

/// Events fired by the media element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaEvent {
    LoadedMetadata,
    DurationChange,
    TimeUpdate,
    VolumeChange,
    RateChange,
    Play,
    Pause,
    Ended,
}

/// Frame step direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepDirection {
    Backward,
    Forward,
}

impl StepDirection {
    pub fn sign(&self) -> f64 {
        match self {
            StepDirection::Backward => -1.0,
            StepDirection::Forward => 1.0,
        }
    }
}

fn sanitize_duration(duration: f64) -> f64 {
    if duration.is_nan() || duration < 0.0 {
        0.0
    } else {
        duration
    }
}

/// Transport state synchronised with a media element
pub struct PlaybackController {
    config: PlayerConfig,
    media: Option<Box<dyn MediaElement>>,
    state: PlaybackState,
    transport: TransportState,
    play_pending: bool,
    /// Volume saved by the last mute
    stored_volume: Option<f64>,
}

impl PlaybackController {
    pub fn new(config: PlayerConfig) -> Self {
        let state = PlaybackState {
            volume: config.default_volume,
            ..Default::default()
        };
        Self {
            config,
            media: None,
            state,
            transport: TransportState::Idle,
            play_pending: false,
            stored_volume: None,
        }
    }

    /// Mount a media element and adopt its current state
    pub fn mount(&mut self, media: Box<dyn MediaElement>) {
        self.state.duration = sanitize_duration(media.duration());
        self.state.current_time = media.current_time().clamp(0.0, self.state.duration.max(0.0));
        self.state.speed = media.playback_rate();
        self.state.playing = false;
        self.media = Some(media);
        self.transport = TransportState::Idle;
        self.play_pending = false;
        debug!("Media element mounted");
    }

    /// Unmount the media element, handing it back
    pub fn unmount(&mut self) -> Option<Box<dyn MediaElement>> {
        let media = self.media.take();
        if media.is_some() {
            self.set_transport(TransportState::Idle);
            self.play_pending = false;
            debug!("Media element unmounted");
        }
        media
    }

    pub fn is_mounted(&self) -> bool {
        self.media.is_some()
    }

    pub fn media(&self) -> Option<&dyn MediaElement> {
        self.media.as_deref()
    }

    fn media_mut(&mut self) -> Result<&mut (dyn MediaElement + 'static)> {
        self.media.as_deref_mut().ok_or(Error::MediaNotMounted)
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn transport(&self) -> TransportState {
        self.transport
    }

    pub fn is_playing(&self) -> bool {
        self.state.playing
    }

    pub fn play_pending(&self) -> bool {
        self.play_pending
    }

    fn set_transport(&mut self, target: TransportState) {
        if self.transport == target {
            return;
        }
        if self.transport.can_transition_to(target) {
            debug!(from = %self.transport, to = %target, "Transport transition");
        }
        self.transport = target;
        self.state.playing = target == TransportState::Playing;
    }

    /// Point a natively playing element at `src`
    pub fn set_source(&mut self, src: &Url) -> Result<()> {
        self.media_mut()?.set_src(src);
        self.state.current_time = 0.0;
        self.state.duration = 0.0;
        Ok(())
    }

    /// Fold a media element event into state
    pub fn handle_media_event(&mut self, event: MediaEvent) -> Result<()> {
        let default_volume = self.config.default_volume;
        let media = self.media_mut()?;

        match event {
            MediaEvent::LoadedMetadata => {
                media.set_volume(default_volume);
                media.set_muted(default_volume == 0.0);
                let duration = sanitize_duration(media.duration());
                self.state.duration = duration;
                self.state.volume = default_volume;
                self.state.current_time = self.state.current_time.clamp(0.0, duration);
                info!(duration, "Metadata loaded");
            }
            MediaEvent::DurationChange => {
                let duration = sanitize_duration(media.duration());
                self.state.duration = duration;
                self.state.current_time = self.state.current_time.clamp(0.0, duration);
            }
            MediaEvent::TimeUpdate => {
                let time = media.current_time();
                if time.is_finite() {
                    self.state.current_time = time.clamp(0.0, self.state.duration);
                }
            }
            MediaEvent::VolumeChange => {
                let volume = media.volume();
                if !volume.is_nan() {
                    self.state.volume = volume.clamp(0.0, 1.0);
                }
            }
            MediaEvent::RateChange => {
                self.state.speed = media.playback_rate();
            }
            MediaEvent::Play => {
                self.set_transport(TransportState::Playing);
            }
            MediaEvent::Pause | MediaEvent::Ended => {
                self.set_transport(TransportState::Paused);
            }
        }
        Ok(())
    }

    /// Play if paused, pause otherwise. Returns the resulting transport state.
    pub fn toggle_play(&mut self) -> Result<TransportState> {
        if self.media_mut()?.paused() {
            self.play()
        } else {
            self.pause()
        }
    }

    /// Ask the element to play
    pub fn play(&mut self) -> Result<TransportState> {
        match self.media_mut()?.play() {
            PlayAttempt::Resolved => self.settle_play(Ok(()))?,
            PlayAttempt::Pending => {
                self.play_pending = true;
                debug!("Play request pending");
            }
            PlayAttempt::Rejected(rejection) => self.settle_play(Err(rejection))?,
        }
        Ok(self.transport)
    }

    /// Settle a deferred play request.
    ///
    /// Abort rejections are swallowed; anything else is returned as
    /// [`Error::PlayRejected`] and leaves the transport paused.
    pub fn settle_play(&mut self, result: std::result::Result<(), PlayRejection>) -> Result<()> {
        self.play_pending = false;
        match result {
            Ok(()) => {
                self.set_transport(TransportState::Playing);
                Ok(())
            }
            Err(rejection) if rejection.is_abort() => {
                debug!(%rejection, "Play interrupted by a later command");
                Ok(())
            }
            Err(rejection) => {
                error!(%rejection, "Playback rejected");
                if self.transport == TransportState::Playing {
                    self.set_transport(TransportState::Paused);
                }
                Err(Error::PlayRejected(rejection.to_string()))
            }
        }
    }

    pub fn pause(&mut self) -> Result<TransportState> {
        self.media_mut()?.pause();
        self.set_transport(TransportState::Paused);
        Ok(self.transport)
    }

    /// Seek to `seconds`, clamped to `[0, duration]`
    pub fn seek(&mut self, seconds: f64) -> Result<f64> {
        let duration = self.state.duration;
        let target = if seconds.is_nan() { 0.0 } else { seconds.clamp(0.0, duration) };
        self.media_mut()?.set_current_time(target);
        self.state.current_time = target;
        debug!(to = target, "Seek");
        Ok(target)
    }

    /// Seek relative to the current position.
    ///
    /// Returns `None` when nothing moved: unknown duration, or already at the
    /// boundary being moved towards.
    pub fn seek_by(&mut self, delta: f64) -> Result<Option<f64>> {
        let current = self.media_mut()?.current_time();
        let duration = self.state.duration;
        if !duration.is_finite() || duration <= 0.0 || !current.is_finite() {
            return Ok(None);
        }
        if (delta < 0.0 && current <= 0.0) || (delta > 0.0 && current >= duration) {
            return Ok(None);
        }
        self.seek(current + delta).map(Some)
    }

    /// Seek to `tenths * 10` percent of the duration
    pub fn seek_fraction(&mut self, tenths: u8) -> Result<Option<f64>> {
        self.media_mut()?;
        let duration = self.state.duration;
        if !duration.is_finite() || duration <= 0.0 {
            return Ok(None);
        }
        let fraction = f64::from(tenths.min(10)) / 10.0;
        self.seek(duration * fraction).map(Some)
    }

    /// Set the volume, clamped to `[0, 1]`
    pub fn set_volume(&mut self, volume: f64) -> Result<f64> {
        let volume = if volume.is_nan() { self.state.volume } else { volume.clamp(0.0, 1.0) };
        self.media_mut()?.set_volume(volume);
        self.state.volume = volume;
        Ok(volume)
    }

    pub fn nudge_volume(&mut self, delta: f64) -> Result<f64> {
        let current = self.media_mut()?.volume();
        self.set_volume(current + delta)
    }

    /// Mute by zeroing the volume, or restore the volume saved by the last mute
    pub fn toggle_mute(&mut self) -> Result<f64> {
        let current = self.media_mut()?.volume();
        if current <= 0.0 {
            let restored = self.stored_volume.filter(|v| *v > 0.0).unwrap_or(1.0);
            self.set_volume(restored)
        } else {
            self.stored_volume = Some(current);
            self.set_volume(0.0)
        }
    }

    /// Set an exact speed (speed menu)
    pub fn set_speed(&mut self, rate: f64) -> Result<f64> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(Error::InvalidSpeed(rate));
        }
        self.media_mut()?.set_playback_rate(rate);
        self.state.speed = rate;
        Ok(rate)
    }

    /// Step the speed by one increment, clamped to the shortcut range
    pub fn step_speed(&mut self, up: bool) -> Result<f64> {
        self.media_mut()?;
        let step = if up { self.config.speed_step } else { -self.config.speed_step };
        let rate = (self.state.speed + step).clamp(self.config.min_speed, self.config.max_speed);
        self.set_speed(rate)
    }

    /// Pause and move one frame
    pub fn step_frame(&mut self, direction: StepDirection) -> Result<f64> {
        self.pause()?;
        let current = self.media_mut()?.current_time();
        self.seek(current + direction.sign() * self.config.frame_duration())
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        self.state.is_fullscreen = fullscreen;
    }

    pub fn set_pip_requested(&mut self, requested: bool) {
        self.state.pip_requested = requested;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessMedia;

    fn controller(duration: f64) -> (PlaybackController, HeadlessMedia) {
        let media = HeadlessMedia::new(duration);
        let mut controller = PlaybackController::new(PlayerConfig::default());
        controller.mount(Box::new(media.clone()));
        controller.handle_media_event(MediaEvent::LoadedMetadata).unwrap();
        (controller, media)
    }

    #[test]
    fn test_unmounted_commands_fail() {
        let mut controller = PlaybackController::new(PlayerConfig::default());
        assert!(matches!(controller.toggle_play(), Err(Error::MediaNotMounted)));
        assert!(matches!(controller.seek(5.0), Err(Error::MediaNotMounted)));
        assert!(matches!(controller.toggle_mute(), Err(Error::MediaNotMounted)));
    }

    #[test]
    fn test_metadata_applies_default_volume() {
        let (controller, media) = controller(120.0);
        assert_eq!(controller.state().duration, 120.0);
        assert_eq!(controller.state().volume, 0.7);
        assert_eq!(media.volume(), 0.7);
        assert!(!media.muted());
    }

    #[test]
    fn test_seek_clamped() {
        let (mut controller, media) = controller(120.0);
        for (input, expected) in [(-5.0, 0.0), (60.0, 60.0), (500.0, 120.0), (f64::NAN, 0.0), (f64::INFINITY, 120.0)] {
            assert_eq!(controller.seek(input).unwrap(), expected);
            assert_eq!(media.current_time(), expected);
        }
    }

    #[test]
    fn test_seek_by_boundaries() {
        let (mut controller, _media) = controller(120.0);
        controller.seek(5.0).unwrap();
        assert_eq!(controller.seek_by(-10.0).unwrap(), Some(0.0));
        assert_eq!(controller.seek_by(-10.0).unwrap(), None);

        controller.seek(115.0).unwrap();
        assert_eq!(controller.seek_by(10.0).unwrap(), Some(120.0));
        assert_eq!(controller.seek_by(10.0).unwrap(), None);
    }

    #[test]
    fn test_seek_unknown_duration() {
        let (mut controller, _media) = controller(f64::NAN);
        assert_eq!(controller.state().duration, 0.0);
        assert_eq!(controller.seek_by(10.0).unwrap(), None);
        assert_eq!(controller.seek_fraction(5).unwrap(), None);
        assert_eq!(controller.seek(30.0).unwrap(), 0.0);
    }

    #[test]
    fn test_volume_clamped_and_mute_round_trip() {
        let (mut controller, _media) = controller(60.0);
        assert_eq!(controller.set_volume(1.7).unwrap(), 1.0);
        assert_eq!(controller.set_volume(-0.2).unwrap(), 0.0);

        controller.set_volume(0.4).unwrap();
        assert_eq!(controller.toggle_mute().unwrap(), 0.0);
        assert_eq!(controller.toggle_mute().unwrap(), 0.4);
    }

    #[test]
    fn test_unmute_without_stored_volume() {
        let (mut controller, _media) = controller(60.0);
        controller.set_volume(0.0).unwrap();
        assert_eq!(controller.toggle_mute().unwrap(), 1.0);
    }

    #[test]
    fn test_speed_steps_clamped() {
        let (mut controller, _media) = controller(60.0);
        for _ in 0..20 {
            controller.step_speed(true).unwrap();
        }
        assert_eq!(controller.state().speed, 3.0);
        for _ in 0..20 {
            controller.step_speed(false).unwrap();
        }
        assert_eq!(controller.state().speed, 0.25);
        assert!(matches!(controller.set_speed(0.0), Err(Error::InvalidSpeed(_))));
    }

    #[test]
    fn test_frame_step_pauses() {
        let (mut controller, media) = controller(60.0);
        controller.play().unwrap();
        controller.seek(10.0).unwrap();

        let position = controller.step_frame(StepDirection::Forward).unwrap();
        assert!((position - (10.0 + 1.0 / 30.0)).abs() < 1e-9);
        assert!(media.paused());
        assert_eq!(controller.transport(), TransportState::Paused);

        controller.seek(0.0).unwrap();
        assert_eq!(controller.step_frame(StepDirection::Backward).unwrap(), 0.0);
    }

    #[test]
    fn test_play_abort_swallowed() {
        let (mut controller, media) = controller(60.0);
        media.reject_next_play(PlayRejection::abort());
        assert_eq!(controller.play().unwrap(), TransportState::Idle);
        assert!(!controller.is_playing());
    }

    #[test]
    fn test_play_rejection_surfaced() {
        let (mut controller, media) = controller(60.0);
        media.reject_next_play(PlayRejection::new("NotAllowedError", "autoplay blocked"));
        assert!(matches!(controller.play(), Err(Error::PlayRejected(_))));
        assert!(!controller.is_playing());
    }

    #[test]
    fn test_pending_play_settles() {
        let (mut controller, media) = controller(60.0);
        media.defer_plays(true);
        controller.play().unwrap();
        assert!(controller.play_pending());
        assert!(!controller.is_playing());

        controller.settle_play(Ok(())).unwrap();
        assert!(!controller.play_pending());
        assert!(controller.is_playing());
    }

    #[test]
    fn test_time_update_clamped() {
        let (mut controller, mut media) = controller(60.0);
        media.set_current_time(75.0);
        controller.handle_media_event(MediaEvent::TimeUpdate).unwrap();
        assert_eq!(controller.state().current_time, 60.0);
    }
}
