//! Sleep timer - a delayed, cancellable pause

use crate::scheduler::{Scheduler, TimerChannel};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// Minutes offered by the sleep-timer menu; 0 turns it off
pub const SLEEP_PRESETS: [u32; 8] = [0, 1, 5, 10, 15, 20, 25, 30];

/// Sleep timer selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepTimer {
    /// Selected minutes, 0 when disabled
    pub minutes: u32,
    /// Clock reading at which playback pauses
    pub deadline: Option<Duration>,
}

impl SleepTimer {
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Cancel any pending pause, then arm a new one unless `minutes` is 0
    pub fn set(&mut self, scheduler: &mut Scheduler, now: Duration, minutes: u32) {
        scheduler.cancel(TimerChannel::SleepPause);
        self.minutes = minutes;
        self.deadline = None;
        if minutes == 0 {
            info!("Sleep timer off");
            return;
        }
        let deadline = now + Duration::from_secs(u64::from(minutes) * 60);
        scheduler.schedule_at(TimerChannel::SleepPause, deadline);
        self.deadline = Some(deadline);
        info!(minutes, "Sleep timer set");
    }

    /// The pause fired; back to disabled
    pub fn on_fired(&mut self) {
        self.minutes = 0;
        self.deadline = None;
    }

    pub fn cancel(&mut self, scheduler: &mut Scheduler) {
        scheduler.cancel(TimerChannel::SleepPause);
        self.on_fired();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Duration = Duration::from_secs(60);

    #[test]
    fn test_reset_replaces_pending() {
        let mut scheduler = Scheduler::new();
        let mut timer = SleepTimer::default();
        timer.set(&mut scheduler, Duration::ZERO, 5);
        timer.set(&mut scheduler, Duration::ZERO, 10);

        assert!(scheduler.take_due(5 * MIN).is_empty());
        assert_eq!(scheduler.take_due(10 * MIN), vec![TimerChannel::SleepPause]);
        assert_eq!(timer.minutes, 10);
    }

    #[test]
    fn test_zero_disables() {
        let mut scheduler = Scheduler::new();
        let mut timer = SleepTimer::default();
        timer.set(&mut scheduler, Duration::ZERO, 15);
        timer.set(&mut scheduler, MIN, 0);
        assert!(!timer.is_armed());
        assert!(scheduler.is_empty());
    }
}
