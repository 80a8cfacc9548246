//! Async driver for the core `Countdown`.
//!
//! Every Running period owns one tokio interval task. Pausing or stopping
//! bumps a generation counter under the same lock the task takes before
//! each tick and aborts the task, so once `pause()` or `stop()` returns no
//! further tick can land.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use exam_core::MonotonicClock;
use exam_core::timer::{Countdown, TICK_INTERVAL, TimerEvent, TimerState};
use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

/// Monotonic clock that follows tokio's clock, including paused test time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioMonotonic;

impl MonotonicClock for TokioMonotonic {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

/// Observable timer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub remaining_ms: u64,
}

impl TimerSnapshot {
    fn of(countdown: &Countdown) -> Self {
        Self {
            state: countdown.state(),
            remaining_ms: countdown.remaining_ms(),
        }
    }
}

/// Resolves once the countdown ends.
#[derive(Debug)]
pub struct FinishedSignal(oneshot::Receiver<()>);

impl FinishedSignal {
    /// Wait for the countdown to end.
    ///
    /// Returns `true` when time ran out and `false` when the timer was
    /// stopped or dropped first.
    pub async fn wait(self) -> bool {
        self.0.await.is_ok()
    }
}

struct Shared {
    countdown: Countdown,
    generation: u64,
    ticker: Option<JoinHandle<()>>,
    finished_tx: Option<oneshot::Sender<()>>,
}

impl Shared {
    fn cancel_ticker(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }

    fn fire_finished(&mut self) {
        if let Some(tx) = self.finished_tx.take() {
            // receiver may already be gone
            let _ = tx.send(());
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Countdown that ticks on the tokio runtime.
///
/// Commands must be issued from within a tokio runtime.
pub struct CountdownTimer {
    clock: Arc<dyn MonotonicClock>,
    shared: Arc<Mutex<Shared>>,
    snapshots: Arc<watch::Sender<TimerSnapshot>>,
}

impl std::fmt::Debug for CountdownTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountdownTimer")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl CountdownTimer {
    /// Create an idle timer and the signal that fires when its time runs out.
    #[must_use]
    pub fn new(clock: Arc<dyn MonotonicClock>) -> (Self, FinishedSignal) {
        let (finished_tx, finished_rx) = oneshot::channel();
        let countdown = Countdown::new();
        let (snapshots, _) = watch::channel(TimerSnapshot::of(&countdown));
        let timer = Self {
            clock,
            shared: Arc::new(Mutex::new(Shared {
                countdown,
                generation: 0,
                ticker: None,
                finished_tx: Some(finished_tx),
            })),
            snapshots: Arc::new(snapshots),
        };
        (timer, FinishedSignal(finished_rx))
    }

    /// Timer driven by [`TokioMonotonic`].
    #[must_use]
    pub fn tokio() -> (Self, FinishedSignal) {
        Self::new(Arc::new(TokioMonotonic))
    }

    pub fn start(&self, remaining_ms: u64) -> Option<TimerEvent> {
        let mut shared = lock(&self.shared);
        let event = shared.countdown.start(remaining_ms, self.clock.now());
        match event {
            Some(TimerEvent::Started { .. }) => self.spawn_ticker(&mut shared),
            Some(TimerEvent::Finished) => shared.fire_finished(),
            _ => {}
        }
        self.publish(&shared);
        event
    }

    /// Freeze the countdown. The part of a second since the last tick is
    /// not deducted; see [`Countdown::pause`].
    pub fn pause(&self) -> Option<TimerEvent> {
        let mut shared = lock(&self.shared);
        let event = shared.countdown.pause(self.clock.now());
        if event.is_some() {
            shared.cancel_ticker();
            self.publish(&shared);
        }
        event
    }

    pub fn resume(&self) -> Option<TimerEvent> {
        let mut shared = lock(&self.shared);
        let event = shared.countdown.resume(self.clock.now());
        if event.is_some() {
            self.spawn_ticker(&mut shared);
            self.publish(&shared);
        }
        event
    }

    /// End the countdown now. The finished signal resolves to `false`.
    pub fn stop(&self) -> Option<TimerEvent> {
        let mut shared = lock(&self.shared);
        let event = shared.countdown.stop(self.clock.now());
        if event.is_some() {
            shared.cancel_ticker();
            shared.finished_tx = None;
            self.publish(&shared);
        }
        event
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        lock(&self.shared).countdown.state()
    }

    #[must_use]
    pub fn remaining_ms(&self) -> u64 {
        lock(&self.shared).countdown.remaining_ms()
    }

    #[must_use]
    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot::of(&lock(&self.shared).countdown)
    }

    /// Total time spent running so far.
    #[must_use]
    pub fn running_time(&self) -> Duration {
        lock(&self.shared).countdown.running_time(self.clock.now())
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.snapshots.subscribe()
    }

    fn publish(&self, shared: &Shared) {
        self.snapshots
            .send_replace(TimerSnapshot::of(&shared.countdown));
    }

    fn spawn_ticker(&self, shared: &mut Shared) {
        shared.cancel_ticker();
        let generation = shared.generation;
        let state = Arc::clone(&self.shared);
        let clock = Arc::clone(&self.clock);
        let snapshots = Arc::clone(&self.snapshots);
        let first = tokio::time::Instant::now() + TICK_INTERVAL;

        shared.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(first, TICK_INTERVAL);
            loop {
                interval.tick().await;
                let mut guard = lock(&state);
                if guard.generation != generation {
                    return;
                }
                let event = guard.countdown.tick(clock.now());
                snapshots.send_replace(TimerSnapshot::of(&guard.countdown));
                match event {
                    Some(TimerEvent::Tick { .. }) => {}
                    Some(TimerEvent::Finished) => {
                        debug!("countdown reached zero");
                        guard.ticker = None;
                        guard.fire_finished();
                        return;
                    }
                    _ => {
                        guard.ticker = None;
                        return;
                    }
                }
            }
        }));
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        let mut shared = lock(&self.shared);
        shared.cancel_ticker();
        shared.finished_tx = None;
    }
}
