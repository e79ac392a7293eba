//! Control visibility and the idle timer

use crate::scheduler::{Scheduler, TimerChannel};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::trace;

/// Whether controls are shown and the pointer is over the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityState {
    pub controls_visible: bool,
    pub hovering: bool,
}

/// Shows controls on activity and hides them after an idle delay
#[derive(Debug, Clone)]
pub struct ActivityTracker {
    idle_delay: Duration,
    state: ActivityState,
}

impl ActivityTracker {
    pub fn new(idle_delay: Duration) -> Self {
        Self {
            idle_delay,
            state: ActivityState {
                controls_visible: true,
                hovering: false,
            },
        }
    }

    pub fn state(&self) -> ActivityState {
        self.state
    }

    pub fn controls_visible(&self) -> bool {
        self.state.controls_visible
    }

    pub fn hovering(&self) -> bool {
        self.state.hovering
    }

    /// Show controls and restart the idle countdown.
    ///
    /// The countdown only runs while playing with no menu open; otherwise
    /// controls stay up and the timer is cancelled.
    pub fn reset(&mut self, scheduler: &mut Scheduler, now: Duration, playing: bool, menu_open: bool) {
        self.state.controls_visible = true;
        if playing && !menu_open {
            scheduler.schedule(TimerChannel::IdleHide, now, self.idle_delay);
        } else {
            scheduler.cancel(TimerChannel::IdleHide);
        }
    }

    pub fn pointer_enter(&mut self, scheduler: &mut Scheduler, now: Duration, playing: bool, menu_open: bool) {
        self.state.hovering = true;
        self.reset(scheduler, now, playing, menu_open);
    }

    /// Movement only counts while hovering
    pub fn pointer_move(&mut self, scheduler: &mut Scheduler, now: Duration, playing: bool, menu_open: bool) {
        if self.state.hovering {
            self.reset(scheduler, now, playing, menu_open);
        }
    }

    pub fn pointer_leave(&mut self, scheduler: &mut Scheduler) {
        self.state.hovering = false;
        self.state.controls_visible = false;
        scheduler.cancel(TimerChannel::IdleHide);
    }

    /// Force controls visible with no countdown
    pub fn suspend(&mut self, scheduler: &mut Scheduler) {
        self.state.controls_visible = true;
        scheduler.cancel(TimerChannel::IdleHide);
    }

    /// The idle timer fired
    pub fn on_idle(&mut self, playing: bool, menu_open: bool) {
        if playing && !menu_open {
            trace!("Hiding controls after inactivity");
            self.state.controls_visible = false;
        }
    }
}
