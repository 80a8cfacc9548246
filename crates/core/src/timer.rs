//! Countdown state machine.
//!
//! Pure and clock-agnostic: every command takes the monotonic instant at
//! which it happened, and the caller drives `tick()` once per
//! [`TICK_INTERVAL`]. The async driver lives in the services crate.
//!
//! ```text
//! Idle -> Running -> (Paused <-> Running) -> Finished
//! ```
//!
//! `Finished` is terminal. `TimerEvent::Finished` is reported at most once
//! per instance, and only when the remaining time runs out; `stop()` ends
//! the countdown silently.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Time removed from the countdown by every tick.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

const TICK_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimerEvent {
    Started { remaining_ms: u64 },
    Tick { remaining_ms: u64 },
    Paused { remaining_ms: u64 },
    Resumed { remaining_ms: u64 },
    Stopped { remaining_ms: u64 },
    Finished,
}

#[derive(Debug, Clone)]
pub struct Countdown {
    state: TimerState,
    remaining_ms: u64,
    running_since: Option<Instant>,
    running_total: Duration,
    finished_reported: bool,
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Countdown {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: TimerState::Idle,
            remaining_ms: 0,
            running_since: None,
            running_total: Duration::ZERO,
            finished_reported: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    #[must_use]
    pub fn state(&self) -> TimerState {
        self.state
    }

    #[must_use]
    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state == TimerState::Finished
    }

    /// Total time spent in `Running` up to `at`.
    #[must_use]
    pub fn running_time(&self, at: Instant) -> Duration {
        match self.running_since {
            Some(since) => self.running_total + at.saturating_duration_since(since),
            None => self.running_total,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin counting down from `remaining_ms`. Only valid from `Idle`.
    ///
    /// Starting with nothing left finishes immediately.
    pub fn start(&mut self, remaining_ms: u64, at: Instant) -> Option<TimerEvent> {
        if self.state != TimerState::Idle {
            return None;
        }
        self.remaining_ms = remaining_ms;
        if remaining_ms == 0 {
            return self.finish(at);
        }
        self.state = TimerState::Running;
        self.running_since = Some(at);
        Some(TimerEvent::Started { remaining_ms })
    }

    /// Freeze the remaining time at its last whole tick.
    ///
    /// Time run since the previous tick is not deducted, and a resumed
    /// countdown waits a full [`TICK_INTERVAL`] for its next tick. Pausing
    /// more often than once per interval therefore never lowers the
    /// remaining time, although [`Countdown::running_time`] still counts it.
    pub fn pause(&mut self, at: Instant) -> Option<TimerEvent> {
        if self.state != TimerState::Running {
            return None;
        }
        self.flush_running(at);
        self.state = TimerState::Paused;
        Some(TimerEvent::Paused {
            remaining_ms: self.remaining_ms,
        })
    }

    pub fn resume(&mut self, at: Instant) -> Option<TimerEvent> {
        if self.state != TimerState::Paused {
            return None;
        }
        self.state = TimerState::Running;
        self.running_since = Some(at);
        Some(TimerEvent::Resumed {
            remaining_ms: self.remaining_ms,
        })
    }

    /// Force `Finished` without reporting `TimerEvent::Finished`.
    pub fn stop(&mut self, at: Instant) -> Option<TimerEvent> {
        if self.state == TimerState::Finished {
            return None;
        }
        self.flush_running(at);
        self.state = TimerState::Finished;
        Some(TimerEvent::Stopped {
            remaining_ms: self.remaining_ms,
        })
    }

    /// Remove one tick from a running countdown.
    pub fn tick(&mut self, at: Instant) -> Option<TimerEvent> {
        if self.state != TimerState::Running {
            return None;
        }
        self.remaining_ms = self.remaining_ms.saturating_sub(TICK_MS);
        if self.remaining_ms == 0 {
            return self.finish(at);
        }
        Some(TimerEvent::Tick {
            remaining_ms: self.remaining_ms,
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn finish(&mut self, at: Instant) -> Option<TimerEvent> {
        self.flush_running(at);
        self.state = TimerState::Finished;
        if self.finished_reported {
            return None;
        }
        self.finished_reported = true;
        Some(TimerEvent::Finished)
    }

    fn flush_running(&mut self, at: Instant) {
        if let Some(since) = self.running_since.take() {
            self.running_total += at.saturating_duration_since(since);
        }
    }
}
