//! Owned, cancellable one-shot timers
//!
//! Every timed effect in the player (idle hide, sleep pause, toast hides) runs
//! on its own [`TimerChannel`]. A channel holds at most one deadline, so
//! scheduling a channel always cancels whatever was pending on it.
//!
//! The scheduler never sleeps. Hosts read [`Scheduler::next_deadline`] to know
//! when to wake up and then hand the current time to [`Scheduler::take_due`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Monotonic time source, measured from an arbitrary origin
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Clock advanced by hand, for tests and scripted sessions
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, to: Duration) {
        self.millis.store(to.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

/// Clock backed by tokio's instant, so paused test time applies
#[cfg(feature = "native")]
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

#[cfg(feature = "native")]
impl TokioClock {
    pub fn new() -> Self {
        Self { origin: tokio::time::Instant::now() }
    }

    /// Convert a clock reading back into a tokio instant
    pub fn instant_at(&self, at: Duration) -> tokio::time::Instant {
        self.origin + at
    }
}

#[cfg(feature = "native")]
impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "native")]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Toast kinds, each with its own hide timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToastKind {
    Volume,
    Speed,
    SeekForward,
    SeekBackward,
}

/// Independent timer channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerChannel {
    /// Hide transport controls after inactivity
    IdleHide,
    /// Pause playback when the sleep timer elapses
    SleepPause,
    /// Hide a toast
    Toast(ToastKind),
}

/// Deadline table keyed by channel
#[derive(Debug, Default)]
pub struct Scheduler {
    deadlines: HashMap<TimerChannel, Duration>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `channel` to fire at `deadline`, replacing any pending deadline
    pub fn schedule_at(&mut self, channel: TimerChannel, deadline: Duration) {
        if let Some(previous) = self.deadlines.insert(channel, deadline) {
            tracing::trace!(?channel, ?previous, ?deadline, "Timer rescheduled");
        }
    }

    /// Schedule `channel` to fire `delay` after `now`
    pub fn schedule(&mut self, channel: TimerChannel, now: Duration, delay: Duration) {
        self.schedule_at(channel, now + delay);
    }

    /// Cancel the pending deadline on `channel`, returning it if there was one
    pub fn cancel(&mut self, channel: TimerChannel) -> Option<Duration> {
        self.deadlines.remove(&channel)
    }

    pub fn is_scheduled(&self, channel: TimerChannel) -> bool {
        self.deadlines.contains_key(&channel)
    }

    /// Earliest pending deadline across all channels
    pub fn next_deadline(&self) -> Option<Duration> {
        self.deadlines.values().copied().min()
    }

    /// Remove and return every channel due at `now`, earliest first
    pub fn take_due(&mut self, now: Duration) -> Vec<TimerChannel> {
        let mut due: Vec<(Duration, TimerChannel)> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(channel, deadline)| (*deadline, *channel))
            .collect();
        due.sort_by_key(|(deadline, _)| *deadline);

        for (_, channel) in &due {
            self.deadlines.remove(channel);
        }
        due.into_iter().map(|(_, channel)| channel).collect()
    }

    pub fn clear(&mut self) {
        self.deadlines.clear();
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: Duration = Duration::from_secs(1);

    #[test]
    fn test_reschedule_replaces() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(TimerChannel::SleepPause, Duration::ZERO, 5 * SEC);
        scheduler.schedule(TimerChannel::SleepPause, Duration::ZERO, 10 * SEC);

        assert_eq!(scheduler.len(), 1);
        assert!(scheduler.take_due(5 * SEC).is_empty());
        assert_eq!(scheduler.take_due(10 * SEC), vec![TimerChannel::SleepPause]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_due_in_deadline_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(TimerChannel::IdleHide, Duration::ZERO, 5 * SEC);
        scheduler.schedule(TimerChannel::Toast(ToastKind::Volume), Duration::ZERO, SEC);
        scheduler.schedule(TimerChannel::Toast(ToastKind::SeekForward), Duration::ZERO, 2 * SEC);

        assert_eq!(scheduler.next_deadline(), Some(SEC));
        assert_eq!(
            scheduler.take_due(10 * SEC),
            vec![
                TimerChannel::Toast(ToastKind::Volume),
                TimerChannel::Toast(ToastKind::SeekForward),
                TimerChannel::IdleHide,
            ]
        );
    }

    #[test]
    fn test_cancel() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(TimerChannel::IdleHide, Duration::ZERO, SEC);
        assert_eq!(scheduler.cancel(TimerChannel::IdleHide), Some(SEC));
        assert_eq!(scheduler.cancel(TimerChannel::IdleHide), None);
        assert!(scheduler.take_due(2 * SEC).is_empty());
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new();
        clock.advance(Duration::from_millis(1500));
        assert_eq!(clock.now(), Duration::from_millis(1500));
        clock.set(Duration::ZERO);
        assert_eq!(clock.now(), Duration::ZERO);
    }
}
