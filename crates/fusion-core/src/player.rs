//! Fusion Player - the composite that owns every component
//!
//! Coordinates:
//! - Media element events and transport commands
//! - Streaming engine lifecycle and quality selection
//! - Keyboard and pointer input
//! - Overlay panels, toasts and control visibility
//! - Sleep timer and the other scheduled effects
//!
//! The player is single-threaded and never sleeps. Hosts feed it events,
//! call [`FusionPlayer::poll_timers`] when [`FusionPlayer::next_deadline`]
//! passes and render [`FusionPlayer::snapshot`].

use crate::activity::ActivityTracker;
use crate::bridge::{self, DisplayBridge, DisplayRequest};
use crate::error::{Error, Result};
use crate::input::{Action, Dispatch, FocusGroup, InputRouter, KeyEvent};
use crate::overlay::{toast_lifetime, Overlay, OverlayState, Toasts};
use crate::playback::{MediaElement, MediaEvent, PlayRejection, PlaybackController};
use crate::scheduler::{Clock, Scheduler, TimerChannel, ToastKind};
use crate::sleep::SleepTimer;
use crate::streaming::{
    EngineFactory, QualitySelection, StreamingAdapter, StreamingEvent, StreamingMode,
};
use crate::theme::{AccentColor, ProgressStyle};
use crate::thumbnails::{SeekPreview, ThumbnailTrack};
use crate::types::{Diagnostic, PlaybackState, PlayerConfig, PlayerId, PlayerOptions, TimeDisplay, TransportState};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// A quality menu entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityOption {
    /// Engine level index
    pub index: usize,
    pub label: String,
    pub premium: bool,
}

/// Quality menu state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityMenu {
    /// Levels by descending height
    pub options: Vec<QualityOption>,
    /// -1 for automatic
    pub selected: i32,
    pub label: String,
    /// Whether entries are enabled
    pub selectable: bool,
}

/// Everything a renderer needs, in one serialisable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub transport: TransportState,
    pub playback: PlaybackState,
    pub progress_percent: f64,
    pub time_display: TimeDisplay,
    /// Readout next to the scrubber, elapsed or `-remaining`
    pub time_label: String,
    pub progress_style: ProgressStyle,
    pub accent: AccentColor,
    pub overlay: Overlay,
    pub toasts: Toasts,
    pub controls_visible: bool,
    pub hovering: bool,
    pub sleep: SleepTimer,
    pub quality: QualityMenu,
    pub streaming: StreamingMode,
    pub preview: Option<SeekPreview>,
    pub poster: Option<Url>,
    pub play_pending: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// A headless video player
pub struct FusionPlayer {
    id: PlayerId,
    config: PlayerConfig,
    clock: Box<dyn Clock>,
    scheduler: Scheduler,
    playback: PlaybackController,
    streaming: StreamingAdapter,
    input: InputRouter,
    overlay: OverlayState,
    toasts: Toasts,
    activity: ActivityTracker,
    sleep: SleepTimer,
    bridge: Option<Box<dyn DisplayBridge>>,
    options: Option<PlayerOptions>,
    thumbnails: ThumbnailTrack,
    preview: Option<SeekPreview>,
    time_display: TimeDisplay,
    diagnostics: VecDeque<Diagnostic>,
    torn_down: bool,
}

impl FusionPlayer {
    /// Create a player; the configuration is validated first
    pub fn new(config: PlayerConfig, clock: impl Clock + 'static) -> Result<Self> {
        config.validate()?;
        let id = PlayerId::new();

        Ok(Self {
            id,
            scheduler: Scheduler::new(),
            playback: PlaybackController::new(config.clone()),
            streaming: StreamingAdapter::new(config.engine.clone()),
            input: InputRouter::new(id, &config),
            overlay: OverlayState::new(),
            toasts: Toasts::default(),
            activity: ActivityTracker::new(config.idle_hide_delay()),
            sleep: SleepTimer::default(),
            bridge: None,
            options: None,
            thumbnails: ThumbnailTrack::empty(),
            preview: None,
            time_display: TimeDisplay::default(),
            diagnostics: VecDeque::with_capacity(config.max_diagnostics.min(128)),
            torn_down: false,
            clock: Box::new(clock),
            config,
        })
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Current clock reading
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Mount the media element and display bridge, and start taking keys
    #[instrument(skip_all, fields(player = %self.id))]
    pub fn mount(&mut self, media: Box<dyn MediaElement>, bridge: Box<dyn DisplayBridge>) {
        self.playback.mount(media);
        self.bridge = Some(bridge);
        self.input.subscribe();
        self.torn_down = false;
        info!("Player mounted");
    }

    /// Share the keyboard with the other players in `group`
    pub fn join_focus_group(&mut self, group: &FocusGroup) {
        self.input.join(group.clone());
    }

    /// Take keys pressed while focus is outside every player
    pub fn activate(&mut self) {
        self.input.activate();
    }

    pub fn is_active(&self) -> bool {
        self.input.is_active()
    }

    /// Unmount the media element, handing it back. The engine is torn down.
    pub fn unmount(&mut self) -> Option<Box<dyn MediaElement>> {
        self.input.unsubscribe();
        self.streaming.teardown();
        self.sleep.cancel(&mut self.scheduler);
        self.scheduler.clear();
        self.bridge = None;
        self.playback.unmount()
    }

    /// Load a source, replacing the current one
    #[instrument(skip_all, fields(player = %self.id, src = %options.src))]
    pub fn load(&mut self, options: PlayerOptions, factory: &dyn EngineFactory) -> StreamingMode {
        let mode = self.streaming.load(&options.src, factory);
        if mode == StreamingMode::Native {
            if let Err(e) = self.playback.set_source(&options.src) {
                warn!(error = %e, "Native source set before media was mounted");
            }
        }
        self.thumbnails = ThumbnailTrack::empty();
        self.preview = None;
        self.options = Some(options);
        mode
    }

    pub fn options(&self) -> Option<&PlayerOptions> {
        self.options.as_ref()
    }

    /// Timeline the host should fetch for seek previews
    pub fn timeline_url(&self) -> Option<&Url> {
        self.options.as_ref().and_then(|o| o.timeline.as_ref())
    }

    pub fn set_thumbnails(&mut self, track: ThumbnailTrack) {
        debug!(cues = track.len(), "Thumbnails installed");
        self.thumbnails = track;
    }

    pub fn thumbnails(&self) -> &ThumbnailTrack {
        &self.thumbnails
    }

    pub fn media(&self) -> Option<&dyn MediaElement> {
        self.playback.media()
    }

    pub fn bridge(&self) -> Option<&dyn DisplayBridge> {
        self.bridge.as_deref()
    }

    pub fn playback(&self) -> &PlaybackState {
        self.playback.state()
    }

    pub fn transport(&self) -> TransportState {
        self.playback.transport()
    }

    pub fn overlay(&self) -> Overlay {
        self.overlay.current()
    }

    pub fn toasts(&self) -> &Toasts {
        &self.toasts
    }

    pub fn controls_visible(&self) -> bool {
        self.activity.controls_visible()
    }

    pub fn sleep_timer(&self) -> SleepTimer {
        self.sleep
    }

    pub fn streaming(&self) -> &StreamingAdapter {
        &self.streaming
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    fn record(&mut self, err: &Error) {
        if err.is_recoverable() {
            debug!(code = err.error_code(), error = %err, "Diagnostic recorded");
        } else {
            error!(code = err.error_code(), error = %err, "Unrecoverable player error");
        }
        if self.diagnostics.len() >= self.config.max_diagnostics {
            self.diagnostics.pop_front();
        }
        if self.config.max_diagnostics == 0 {
            return;
        }
        self.diagnostics.push_back(Diagnostic {
            at_ms: self.clock.now().as_millis() as u64,
            code: err.error_code().to_string(),
            message: err.to_string(),
        });
    }

    /// Run `result` through the diagnostics channel, dropping the value
    fn absorb<T>(&mut self, result: Result<T>) {
        match result {
            Ok(_) => {}
            Err(Error::MediaNotMounted) => debug!("Ignoring command without a mounted media element"),
            Err(e) => self.record(&e),
        }
    }

    fn rearm_activity(&mut self) {
        let now = self.clock.now();
        let playing = self.playback.is_playing();
        let menu_open = self.overlay.is_open();
        self.activity.reset(&mut self.scheduler, now, playing, menu_open);
    }

    /// Any successful command counts as activity
    fn commanded<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_ok() {
            self.rearm_activity();
        }
        result
    }

    fn show_toast(&mut self, kind: ToastKind) {
        let now = self.clock.now();
        self.scheduler
            .schedule(TimerChannel::Toast(kind), now, toast_lifetime(&self.config, kind));
    }

    // Media and engine events

    pub fn handle_media_event(&mut self, event: MediaEvent) {
        if let Err(e) = self.playback.handle_media_event(event) {
            debug!(?event, error = %e, "Media event dropped");
            return;
        }
        match event {
            MediaEvent::Play => self.rearm_activity(),
            MediaEvent::Pause | MediaEvent::Ended => self.activity.suspend(&mut self.scheduler),
            _ => {}
        }
    }

    pub fn handle_engine_event(&mut self, event: StreamingEvent) {
        if let Err(e) = self.streaming.handle_event(event) {
            self.record(&e);
            if matches!(e, Error::EngineTerminated { .. }) {
                let paused = self.playback.pause();
                self.absorb(paused);
                self.activity.suspend(&mut self.scheduler);
            }
        }
    }

    // Transport

    /// Imperative play handle
    pub fn play(&mut self) -> Result<TransportState> {
        let result = self.playback.play();
        self.after_transport(result)
    }

    /// Imperative pause handle
    pub fn pause(&mut self) -> Result<TransportState> {
        let result = self.playback.pause();
        self.after_transport(result)
    }

    pub fn toggle_play(&mut self) -> Result<TransportState> {
        let result = self.playback.toggle_play();
        self.after_transport(result)
    }

    /// Settle a play request the host left pending
    pub fn settle_play(&mut self, result: std::result::Result<(), PlayRejection>) -> Result<()> {
        let settled = self.playback.settle_play(result).map(|_| self.playback.transport());
        self.after_transport(settled)?;
        Ok(())
    }

    fn after_transport(&mut self, result: Result<TransportState>) -> Result<TransportState> {
        match result {
            Ok(state) => {
                self.rearm_activity();
                Ok(state)
            }
            Err(e) => {
                if !matches!(e, Error::MediaNotMounted) {
                    self.record(&e);
                }
                Err(e)
            }
        }
    }

    /// Click on the video surface: toggle playback and close menus
    pub fn click_surface(&mut self) {
        self.input.activate();
        self.overlay.close();
        let result = self.toggle_play();
        if let Err(e) = result {
            debug!(error = %e, "Surface click did not change playback");
        }
    }

    /// Scrubber drag to an absolute time
    pub fn seek(&mut self, seconds: f64) -> Result<f64> {
        let result = self.playback.seek(seconds);
        self.commanded(result)
    }

    /// Scrubber drag to a percentage of the duration
    pub fn seek_percent(&mut self, percent: f64) -> Result<f64> {
        let duration = self.playback.state().duration;
        let target = if duration.is_finite() { duration * percent / 100.0 } else { 0.0 };
        self.seek(target)
    }

    /// Volume slider
    pub fn set_volume(&mut self, volume: f64) -> Result<f64> {
        let result = self.playback.set_volume(volume);
        self.commanded(result)
    }

    /// Switch the time readout between elapsed and remaining
    pub fn toggle_time_display(&mut self) -> TimeDisplay {
        self.time_display = self.time_display.toggled();
        self.rearm_activity();
        self.time_display
    }

    pub fn time_display(&self) -> TimeDisplay {
        self.time_display
    }

    // Keyboard

    /// Route a keydown event. The returned dispatch tells the host whether to
    /// suppress the browser default.
    pub fn handle_key(&mut self, event: &KeyEvent) -> Option<Dispatch> {
        if !self.playback.is_mounted() {
            return None;
        }
        let dispatch = self.input.dispatch(event)?;
        self.apply(dispatch.action);
        Some(dispatch)
    }

    /// Apply a keyboard action. Every key shows the controls again.
    pub fn apply(&mut self, action: Action) {
        match action {
            Action::TogglePlay => {
                let _ = self.toggle_play();
            }
            Action::SeekBy(delta) => match self.playback.seek_by(delta) {
                Ok(Some(_)) => {
                    let (shown, dropped) = self.toasts.add_seek(delta > 0.0, delta);
                    self.scheduler.cancel(TimerChannel::Toast(dropped));
                    self.show_toast(shown);
                }
                other => self.absorb(other),
            },
            Action::NudgeVolume(delta) => {
                let result = self.playback.nudge_volume(delta);
                self.volume_toast(result);
            }
            Action::ToggleMute => {
                let result = self.playback.toggle_mute();
                self.volume_toast(result);
            }
            Action::ToggleFullscreen => {
                let _ = self.toggle_fullscreen();
            }
            Action::TogglePip => {
                let _ = self.toggle_pip();
            }
            Action::StepFrame(direction) => {
                let result = self.playback.step_frame(direction);
                self.absorb(result);
                self.activity.suspend(&mut self.scheduler);
            }
            Action::StepSpeed { up } => match self.playback.step_speed(up) {
                Ok(speed) => {
                    let kind = self.toasts.show_speed(speed);
                    self.show_toast(kind);
                }
                Err(e) => self.absorb::<()>(Err(e)),
            },
            Action::SeekFraction(tenths) => {
                let result = self.playback.seek_fraction(tenths);
                self.absorb(result);
            }
            Action::OpenShortcuts => {
                self.overlay.open(Overlay::Shortcuts);
            }
            Action::CloseShortcuts => {
                self.overlay.close_shortcuts();
            }
        }
        self.rearm_activity();
    }

    fn volume_toast(&mut self, result: Result<f64>) {
        match result {
            Ok(volume) => {
                let kind = self.toasts.show_volume(volume);
                self.show_toast(kind);
            }
            Err(e) => self.absorb::<()>(Err(e)),
        }
    }

    // Pointer

    pub fn pointer_enter(&mut self) {
        self.input.activate();
        let now = self.clock.now();
        let playing = self.playback.is_playing();
        let menu_open = self.overlay.is_open();
        self.activity.pointer_enter(&mut self.scheduler, now, playing, menu_open);
    }

    pub fn pointer_move(&mut self) {
        let now = self.clock.now();
        let playing = self.playback.is_playing();
        let menu_open = self.overlay.is_open();
        self.activity.pointer_move(&mut self.scheduler, now, playing, menu_open);
    }

    pub fn pointer_leave(&mut self) {
        self.activity.pointer_leave(&mut self.scheduler);
    }

    /// Pointer over the scrubber, `pointer_x` pixels into a track `track_width` wide
    pub fn hover_scrubber(&mut self, pointer_x: f64, track_width: f64) -> Option<&SeekPreview> {
        if self.overlay.current() == Overlay::Settings {
            self.preview = None;
        } else {
            let duration = self.playback.state().duration;
            self.preview = Some(self.thumbnails.preview(pointer_x, track_width, duration));
        }
        self.preview.as_ref()
    }

    pub fn leave_scrubber(&mut self) {
        self.preview = None;
    }

    // Overlays

    pub fn open_overlay(&mut self, panel: Overlay) {
        self.overlay.open(panel);
        if self.overlay.is_open() {
            self.activity.suspend(&mut self.scheduler);
        } else {
            self.rearm_activity();
        }
    }

    /// Settings gear
    pub fn toggle_settings(&mut self) -> Overlay {
        let panel = self.overlay.toggle_settings();
        self.open_overlay(panel);
        panel
    }

    /// Back from a settings sub-panel
    pub fn overlay_back(&mut self) -> Overlay {
        self.overlay.back()
    }

    pub fn close_overlay(&mut self) {
        self.open_overlay(Overlay::None);
    }

    /// Pick a quality level; -1 selects automatic
    pub fn select_quality(&mut self, index: i32) -> Result<QualitySelection> {
        let result = self.streaming.select_quality(index).inspect_err(|e| {
            warn!(index, error = %e, "Quality change rejected");
        });
        self.commanded(result)
    }

    /// Pick a speed from the speed menu
    pub fn select_speed(&mut self, rate: f64) -> Result<f64> {
        let result = self.playback.set_speed(rate);
        self.commanded(result)
    }

    /// Pick a sleep timer duration; 0 turns it off
    pub fn select_sleep_timer(&mut self, minutes: u32) {
        let now = self.clock.now();
        self.sleep.set(&mut self.scheduler, now, minutes);
        self.rearm_activity();
    }

    // Display

    pub fn toggle_fullscreen(&mut self) -> Result<DisplayRequest> {
        let display = self.bridge.as_deref_mut().ok_or(Error::MediaNotMounted)?;
        let result = bridge::toggle_fullscreen(display);
        if let Err(ref e) = result {
            error!(error = %e, "Fullscreen toggle failed");
            self.record(e);
        }
        self.commanded(result)
    }

    /// Host notification; the only writer of the fullscreen flag
    pub fn on_fullscreen_change(&mut self, active: bool) {
        self.playback.set_fullscreen(active);
    }

    pub fn toggle_pip(&mut self) -> Result<DisplayRequest> {
        let display = self.bridge.as_deref_mut().ok_or(Error::MediaNotMounted)?;
        let result = bridge::toggle_pip(display);
        match result {
            Ok(request) => self.playback.set_pip_requested(request == DisplayRequest::Enter),
            Err(ref e) => self.record(e),
        }
        self.commanded(result)
    }

    /// Host notification that picture-in-picture started or ended
    pub fn on_pip_change(&mut self, active: bool) {
        self.playback.set_pip_requested(active);
    }

    // Timers

    /// Earliest pending timer deadline on the player clock
    pub fn next_deadline(&self) -> Option<Duration> {
        self.scheduler.next_deadline()
    }

    /// Fire every due timer. Returns the channels that fired.
    pub fn poll_timers(&mut self) -> Vec<TimerChannel> {
        let now = self.clock.now();
        let due = self.scheduler.take_due(now);
        for channel in &due {
            match channel {
                TimerChannel::IdleHide => {
                    let playing = self.playback.is_playing();
                    let menu_open = self.overlay.is_open();
                    self.activity.on_idle(playing, menu_open);
                }
                TimerChannel::SleepPause => {
                    info!("Sleep timer elapsed, pausing");
                    self.sleep.on_fired();
                    let _ = self.pause();
                    self.activity.suspend(&mut self.scheduler);
                }
                TimerChannel::Toast(kind) => self.toasts.hide(*kind),
            }
        }
        due
    }

    // Rendering

    pub fn quality_menu(&self) -> QualityMenu {
        let threshold = self.config.premium_bitrate_bps;
        QualityMenu {
            options: self
                .streaming
                .ladder()
                .levels()
                .iter()
                .map(|level| QualityOption {
                    index: level.index,
                    label: level.label(),
                    premium: level.is_premium(threshold),
                })
                .collect(),
            selected: self.streaming.selection().as_index(),
            label: self.streaming.selection_label(),
            selectable: self.streaming.quality_selectable(),
        }
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let playback = self.playback.state().clone();
        let accent = self
            .options
            .as_ref()
            .map(|o| o.accent_color.clone())
            .unwrap_or_default();
        let progress_percent = playback.progress_percent();

        PlayerSnapshot {
            id: self.id,
            transport: self.playback.transport(),
            time_display: self.time_display,
            time_label: self.time_display.label(&playback),
            progress_style: accent.progress_style(progress_percent),
            progress_percent,
            playback,
            accent,
            overlay: self.overlay.current(),
            toasts: self.toasts,
            controls_visible: self.activity.controls_visible(),
            hovering: self.activity.hovering(),
            sleep: self.sleep,
            quality: self.quality_menu(),
            streaming: self.streaming.mode(),
            preview: self.preview.clone(),
            poster: self.options.as_ref().and_then(|o| o.poster.clone()),
            play_pending: self.playback.play_pending(),
            diagnostics: self.diagnostics.iter().cloned().collect(),
        }
    }

    /// Release everything; safe to call more than once
    #[instrument(skip_all, fields(player = %self.id))]
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.unmount();
        info!("Player torn down");
    }
}

impl Drop for FusionPlayer {
    fn drop(&mut self) {
        self.teardown();
    }
}
