use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::billing::format::clock_display;

use super::entities::{Category, Session, SessionId};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TimerState {
    #[default]
    Idle,
    Running {
        start_time: DateTime<Utc>,
        /// Counted from ticks rather than derived from the wall clock.
        elapsed: Duration,
    },
}

/// Tracks a session in progress. It doesn't own a clock, callers pass the current time in and
/// call [Timer::tick] once per second while it runs.
#[derive(Debug, Default)]
pub struct Timer {
    state: TimerState,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, TimerState::Running { .. })
    }

    pub fn elapsed(&self) -> Duration {
        match self.state {
            TimerState::Idle => Duration::zero(),
            TimerState::Running { elapsed, .. } => elapsed,
        }
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        match self.state {
            TimerState::Idle => None,
            TimerState::Running { start_time, .. } => Some(start_time),
        }
    }

    /// Returns `false` when the timer was already running, in which case nothing changes.
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_running() {
            return false;
        }
        debug!("Timer started at {now}");
        self.state = TimerState::Running {
            start_time: now,
            elapsed: Duration::zero(),
        };
        true
    }

    pub fn tick(&mut self) {
        if let TimerState::Running { elapsed, .. } = &mut self.state {
            *elapsed += Duration::seconds(1);
        }
    }

    /// Finishes the running span and turns it into a session billed under `category`. The
    /// timer goes back to idle in every case. An idle timer produces nothing, and so does a span
    /// that ended no later than it started, since it has nothing to bill.
    pub fn stop(&mut self, now: DateTime<Utc>, category: Category) -> Option<Session> {
        let TimerState::Running {
            start_time,
            elapsed,
        } = std::mem::take(&mut self.state)
        else {
            return None;
        };

        match Session::with_duration(SessionId::generate(), category, start_time, now, elapsed) {
            Ok(session) => {
                debug!("Timer stopped with {session:?}");
                Some(session)
            }
            Err(e) => {
                warn!("Discarding timer span {start_time} - {now}: {e}");
                None
            }
        }
    }

    /// Drops whatever was running without producing a session.
    pub fn reset(&mut self) {
        if self.is_running() {
            debug!("Timer reset after {}", self.elapsed().num_seconds());
        }
        self.state = TimerState::Idle;
    }

    /// `HH:MM:SS` view of the elapsed time.
    pub fn display(&self) -> String {
        clock_display(self.elapsed())
    }
}
