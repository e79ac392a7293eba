//! Tokio host for a [`FusionPlayer`]
//!
//! The runtime owns the player on one task. It waits on an input channel and
//! on the player's next timer deadline, applies whichever comes first and
//! publishes a fresh snapshot through a `watch` channel.

use crate::error::{Error, Result};
use crate::input::{Action, KeyEvent};
use crate::overlay::Overlay;
use crate::playback::{MediaEvent, PlayRejection};
use crate::player::{FusionPlayer, PlayerSnapshot};
use crate::scheduler::TokioClock;
use crate::streaming::StreamingEvent;
use crate::thumbnails::ThumbnailTrack;
use crate::types::PlayerConfig;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info};

/// Inputs accepted by the runtime
#[derive(Debug, Clone)]
pub enum PlayerInput {
    Media(MediaEvent),
    Engine(StreamingEvent),
    Key(KeyEvent),
    Action(Action),
    PointerEnter,
    PointerMove,
    PointerLeave,
    ClickSurface,
    /// Focus moved into the player
    Activate,
    ToggleTimeDisplay,
    Play,
    Pause,
    SettlePlay(std::result::Result<(), PlayRejection>),
    Seek(f64),
    SetVolume(f64),
    OpenOverlay(Overlay),
    SelectQuality(i32),
    SelectSpeed(f64),
    SelectSleepTimer(u32),
    FullscreenChanged(bool),
    Thumbnails(ThumbnailTrack),
    Shutdown,
}

/// Cloneable handle to a running player
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    inputs: mpsc::UnboundedSender<PlayerInput>,
    snapshots: watch::Receiver<PlayerSnapshot>,
}

impl PlayerHandle {
    pub fn send(&self, input: PlayerInput) -> Result<()> {
        self.inputs.send(input).map_err(|_| Error::RuntimeClosed)
    }

    pub fn key(&self, code: &str) -> Result<()> {
        self.send(PlayerInput::Key(KeyEvent::new(code)))
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Subscribe to snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshots.clone()
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(PlayerInput::Shutdown)
    }
}

/// Drives a player from a tokio task
pub struct PlayerRuntime {
    player: FusionPlayer,
    clock: TokioClock,
    inputs: mpsc::UnboundedReceiver<PlayerInput>,
    snapshots: watch::Sender<PlayerSnapshot>,
}

impl PlayerRuntime {
    /// Build a player on a tokio clock along with its handle
    pub fn new(config: PlayerConfig) -> Result<(Self, PlayerHandle)> {
        let clock = TokioClock::new();
        let player = FusionPlayer::new(config, clock.clone())?;
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(player.snapshot());

        let runtime = Self {
            player,
            clock,
            inputs: input_rx,
            snapshots: snapshot_tx,
        };
        let handle = PlayerHandle {
            inputs: input_tx,
            snapshots: snapshot_rx,
        };
        Ok((runtime, handle))
    }

    pub fn player(&self) -> &FusionPlayer {
        &self.player
    }

    /// Mutable access for mounting and loading before [`PlayerRuntime::run`]
    pub fn player_mut(&mut self) -> &mut FusionPlayer {
        &mut self.player
    }

    /// Run until shutdown or until every handle is dropped. The player is torn
    /// down and handed back.
    pub async fn run(mut self) -> FusionPlayer {
        info!(player = %self.player.id(), "Player runtime started");
        self.publish();

        loop {
            let deadline = self.player.next_deadline().map(|d| self.clock.instant_at(d));
            tokio::select! {
                input = self.inputs.recv() => match input {
                    Some(PlayerInput::Shutdown) | None => break,
                    Some(input) => self.apply(input),
                },
                _ = wait_until(deadline) => {
                    let fired = self.player.poll_timers();
                    debug!(?fired, "Timers fired");
                }
            }
            self.publish();
        }

        self.player.teardown();
        self.publish();
        info!(player = %self.player.id(), "Player runtime stopped");
        self.player
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.player.snapshot());
    }

    fn apply(&mut self, input: PlayerInput) {
        let player = &mut self.player;
        match input {
            PlayerInput::Media(event) => player.handle_media_event(event),
            PlayerInput::Engine(event) => player.handle_engine_event(event),
            PlayerInput::Key(event) => {
                player.handle_key(&event);
            }
            PlayerInput::Action(action) => player.apply(action),
            PlayerInput::PointerEnter => player.pointer_enter(),
            PlayerInput::PointerMove => player.pointer_move(),
            PlayerInput::PointerLeave => player.pointer_leave(),
            PlayerInput::ClickSurface => player.click_surface(),
            PlayerInput::Activate => player.activate(),
            PlayerInput::ToggleTimeDisplay => {
                player.toggle_time_display();
            }
            PlayerInput::Play => log_rejected("play", player.play()),
            PlayerInput::Pause => log_rejected("pause", player.pause()),
            PlayerInput::SettlePlay(result) => log_rejected("settle play", player.settle_play(result)),
            PlayerInput::Seek(seconds) => log_rejected("seek", player.seek(seconds)),
            PlayerInput::SetVolume(volume) => log_rejected("volume", player.set_volume(volume)),
            PlayerInput::OpenOverlay(panel) => player.open_overlay(panel),
            PlayerInput::SelectQuality(index) => log_rejected("quality", player.select_quality(index)),
            PlayerInput::SelectSpeed(rate) => log_rejected("speed", player.select_speed(rate)),
            PlayerInput::SelectSleepTimer(minutes) => player.select_sleep_timer(minutes),
            PlayerInput::FullscreenChanged(active) => player.on_fullscreen_change(active),
            PlayerInput::Thumbnails(track) => player.set_thumbnails(track),
            PlayerInput::Shutdown => {}
        }
    }
}

fn log_rejected<T>(command: &str, result: Result<T>) {
    if let Err(e) = result {
        debug!(command, error = %e, "Command rejected");
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessBridge, HeadlessMedia};
    use crate::playback::MediaElement;
    use crate::types::TransportState;
    use std::time::Duration;
    use tokio::time::sleep;

    fn runtime(duration: f64) -> (PlayerRuntime, PlayerHandle, HeadlessMedia) {
        let (mut runtime, handle) = PlayerRuntime::new(PlayerConfig::default()).unwrap();
        let media = HeadlessMedia::new(duration);
        let player = runtime.player_mut();
        player.mount(Box::new(media.clone()), Box::new(HeadlessBridge::new()));
        player.handle_media_event(MediaEvent::LoadedMetadata);
        (runtime, handle, media)
    }

    #[tokio::test(start_paused = true)]
    async fn test_controls_hide_while_playing() {
        let (runtime, handle, _media) = runtime(600.0);

        let driver = async move {
            handle.send(PlayerInput::PointerEnter).unwrap();
            handle.key("Space").unwrap();
            sleep(Duration::from_secs(3)).await;
            handle.send(PlayerInput::PointerMove).unwrap();

            sleep(Duration::from_secs(4)).await;
            assert!(handle.snapshot().controls_visible);

            sleep(Duration::from_secs(2)).await;
            assert!(!handle.snapshot().controls_visible);
            handle.shutdown().unwrap();
        };

        let (player, ()) = tokio::join!(runtime.run(), driver);
        assert!(player.media().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_timer_reset_pauses_once() {
        let (runtime, handle, media) = runtime(3600.0);

        let driver = async move {
            handle.send(PlayerInput::Play).unwrap();
            handle.send(PlayerInput::SelectSleepTimer(5)).unwrap();
            handle.send(PlayerInput::SelectSleepTimer(10)).unwrap();

            sleep(Duration::from_secs(6 * 60)).await;
            assert_eq!(handle.snapshot().transport, TransportState::Playing);

            sleep(Duration::from_secs(5 * 60)).await;
            let snapshot = handle.snapshot();
            assert_eq!(snapshot.transport, TransportState::Paused);
            assert_eq!(snapshot.sleep.minutes, 0);
            handle.shutdown().unwrap();
        };

        tokio::join!(runtime.run(), driver);
        assert!(media.paused());
        assert_eq!(media.play_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_key_shows_hidden_controls() {
        let (runtime, handle, _media) = runtime(600.0);

        let driver = async move {
            handle.send(PlayerInput::PointerEnter).unwrap();
            handle.send(PlayerInput::Play).unwrap();
            sleep(Duration::from_secs(6)).await;
            assert!(!handle.snapshot().controls_visible);

            handle.key("KeyL").unwrap();
            sleep(Duration::from_millis(10)).await;
            assert!(handle.snapshot().controls_visible);

            handle.send(PlayerInput::ToggleTimeDisplay).unwrap();
            sleep(Duration::from_millis(10)).await;
            assert!(handle.snapshot().time_label.starts_with('-'));
            handle.shutdown().unwrap();
        };

        tokio::join!(runtime.run(), driver);
    }

    #[tokio::test]
    async fn test_send_after_shutdown_fails() {
        let (runtime, handle, _media) = runtime(60.0);
        handle.shutdown().unwrap();
        runtime.run().await;
        assert!(matches!(handle.key("Space"), Err(Error::RuntimeClosed)));
    }
}
