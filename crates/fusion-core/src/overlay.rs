//! Overlay panels and toasts
//!
//! Panels are one enumeration so at most one is ever open. Toasts carry
//! their value while visible; hiding them is driven by the scheduler.

use crate::scheduler::ToastKind;
use crate::types::PlayerConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// The open overlay panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Overlay {
    #[default]
    None,
    Settings,
    Quality,
    Speed,
    SleepTimer,
    Shortcuts,
}

impl Overlay {
    /// Sub-panels reached from the settings panel
    pub fn is_submenu(&self) -> bool {
        matches!(self, Overlay::Quality | Overlay::Speed | Overlay::SleepTimer)
    }

    /// Menus that suspend control auto-hide
    pub fn is_menu(&self) -> bool {
        matches!(self, Overlay::Settings) || self.is_submenu()
    }
}

/// Panel state with navigation rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayState {
    open: Overlay,
}

impl OverlayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Overlay {
        self.open
    }

    pub fn is_open(&self) -> bool {
        self.open != Overlay::None
    }

    /// Open `panel`, closing whatever was open. Returns the previous panel.
    pub fn open(&mut self, panel: Overlay) -> Overlay {
        let previous = std::mem::replace(&mut self.open, panel);
        if previous != panel {
            debug!(from = ?previous, to = ?panel, "Overlay changed");
        }
        previous
    }

    pub fn close(&mut self) -> Overlay {
        self.open(Overlay::None)
    }

    /// Settings gear: open settings when nothing is open, otherwise close
    pub fn toggle_settings(&mut self) -> Overlay {
        if self.open == Overlay::None {
            self.open(Overlay::Settings);
        } else {
            self.close();
        }
        self.open
    }

    /// Back from a sub-panel to settings
    pub fn back(&mut self) -> Overlay {
        if self.open.is_submenu() {
            self.open(Overlay::Settings);
        }
        self.open
    }

    /// Esc only dismisses the shortcuts modal
    pub fn close_shortcuts(&mut self) -> bool {
        if self.open == Overlay::Shortcuts {
            self.close();
            true
        } else {
            false
        }
    }
}

/// Visible toast values
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Toasts {
    /// Volume in `[0, 1]`
    pub volume: Option<f64>,
    /// Speed multiplier
    pub speed: Option<f64>,
    /// Accumulated forward seek in seconds
    pub seek_forward: Option<f64>,
    /// Accumulated backward seek in seconds
    pub seek_backward: Option<f64>,
}

impl Toasts {
    pub fn show_volume(&mut self, volume: f64) -> ToastKind {
        self.volume = Some(volume);
        ToastKind::Volume
    }

    pub fn show_speed(&mut self, speed: f64) -> ToastKind {
        self.speed = Some(speed);
        ToastKind::Speed
    }

    /// Add `seconds` to the seek toast in the direction of `forward`,
    /// dropping the opposite one. Returns the shown kind and the dropped kind.
    pub fn add_seek(&mut self, forward: bool, seconds: f64) -> (ToastKind, ToastKind) {
        let seconds = seconds.abs();
        if forward {
            self.seek_forward = Some(self.seek_forward.unwrap_or(0.0) + seconds);
            self.seek_backward = None;
            (ToastKind::SeekForward, ToastKind::SeekBackward)
        } else {
            self.seek_backward = Some(self.seek_backward.unwrap_or(0.0) + seconds);
            self.seek_forward = None;
            (ToastKind::SeekBackward, ToastKind::SeekForward)
        }
    }

    pub fn hide(&mut self, kind: ToastKind) {
        *self.slot(kind) = None;
    }

    pub fn get(&self, kind: ToastKind) -> Option<f64> {
        match kind {
            ToastKind::Volume => self.volume,
            ToastKind::Speed => self.speed,
            ToastKind::SeekForward => self.seek_forward,
            ToastKind::SeekBackward => self.seek_backward,
        }
    }

    fn slot(&mut self, kind: ToastKind) -> &mut Option<f64> {
        match kind {
            ToastKind::Volume => &mut self.volume,
            ToastKind::Speed => &mut self.speed,
            ToastKind::SeekForward => &mut self.seek_forward,
            ToastKind::SeekBackward => &mut self.seek_backward,
        }
    }
}

/// How long a toast of `kind` stays up
pub fn toast_lifetime(config: &PlayerConfig, kind: ToastKind) -> Duration {
    let ms = match kind {
        ToastKind::Volume => config.volume_toast_ms,
        ToastKind::Speed => config.speed_toast_ms,
        ToastKind::SeekForward | ToastKind::SeekBackward => config.seek_toast_ms,
    };
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_panel_open() {
        let mut overlay = OverlayState::new();
        overlay.open(Overlay::Speed);
        assert_eq!(overlay.open(Overlay::Shortcuts), Overlay::Speed);
        assert_eq!(overlay.current(), Overlay::Shortcuts);
    }

    #[test]
    fn test_settings_navigation() {
        let mut overlay = OverlayState::new();
        assert_eq!(overlay.toggle_settings(), Overlay::Settings);
        overlay.open(Overlay::Quality);
        assert_eq!(overlay.back(), Overlay::Settings);
        assert_eq!(overlay.back(), Overlay::Settings);
        assert_eq!(overlay.toggle_settings(), Overlay::None);

        overlay.open(Overlay::SleepTimer);
        assert_eq!(overlay.toggle_settings(), Overlay::None);
    }

    #[test]
    fn test_escape_only_closes_shortcuts() {
        let mut overlay = OverlayState::new();
        overlay.open(Overlay::Settings);
        assert!(!overlay.close_shortcuts());
        assert_eq!(overlay.current(), Overlay::Settings);

        overlay.open(Overlay::Shortcuts);
        assert!(overlay.close_shortcuts());
        assert!(!overlay.is_open());
    }

    #[test]
    fn test_seek_toasts_accumulate() {
        let mut toasts = Toasts::default();
        toasts.add_seek(true, 10.0);
        toasts.add_seek(true, 10.0);
        assert_eq!(toasts.seek_forward, Some(20.0));

        assert_eq!(toasts.add_seek(false, -10.0), (ToastKind::SeekBackward, ToastKind::SeekForward));
        assert_eq!(toasts.seek_forward, None);
        assert_eq!(toasts.seek_backward, Some(10.0));

        toasts.hide(ToastKind::SeekBackward);
        assert_eq!(toasts.get(ToastKind::SeekBackward), None);
    }

    #[test]
    fn test_toast_lifetimes() {
        let config = PlayerConfig::default();
        assert_eq!(toast_lifetime(&config, ToastKind::Volume), Duration::from_millis(1000));
        assert_eq!(toast_lifetime(&config, ToastKind::SeekForward), Duration::from_millis(700));
    }
}
