//! Countdown timer
//!
//! An independent ticking clock for the current stage. The ticker is a
//! tokio task that only mutates timer state; expiry is posted as a
//! [`TimerExpired`] on a channel, never delivered inline with the
//! decrement, so the session decides when the engine hears about it.
//!
//! Every `configure` or `reset` starts a new countdown cycle. An expiry
//! carries the cycle it belongs to, which lets the receiver drop expiries
//! from a countdown that has since been replaced.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

/// Largest countdown the `MM:SS` display can show (99:59).
pub const MAX_TIMER_SECONDS: u32 = 5999;

/// Largest minutes value accepted by [`CountdownTimer::apply`].
pub const MAX_APPLY_MINUTES: u32 = 99;

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Expiry notification for one countdown cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerExpired {
    /// Cycle whose countdown reached zero
    pub cycle: u64,
}

/// Point-in-time view of the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimerSnapshot {
    /// Configured countdown length
    pub total: u32,
    /// Seconds left in this cycle
    pub remaining: u32,
    /// Whether the ticker is counting down
    pub running: bool,
    /// Whether this cycle already fired its expiry
    pub expired: bool,
    /// Current countdown cycle
    pub cycle: u64,
}

#[derive(Debug, Default)]
struct TimerInner {
    total: u32,
    remaining: u32,
    running: bool,
    expired: bool,
    cycle: u64,
    // Bumped on every start so a cancelled ticker can never touch a newer one's state.
    generation: u64,
    ticker: Option<CancellationToken>,
}

impl TimerInner {
    fn stop_ticker(&mut self) {
        self.running = false;
        if let Some(token) = self.ticker.take() {
            token.cancel();
        }
    }

    fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            total: self.total,
            remaining: self.remaining,
            running: self.running,
            expired: self.expired,
            cycle: self.cycle,
        }
    }
}

/// Countdown timer with configure/start/pause/reset/apply.
///
/// Must be started from within a tokio runtime.
#[derive(Debug)]
pub struct CountdownTimer {
    inner: Arc<Mutex<TimerInner>>,
    expiry_tx: mpsc::UnboundedSender<TimerExpired>,
}

impl CountdownTimer {
    /// Creates an idle timer and the receiver its expiries are posted to.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerExpired>) {
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        let timer = Self {
            inner: Arc::new(Mutex::new(TimerInner::default())),
            expiry_tx,
        };
        (timer, expiry_rx)
    }

    /// Sets a new countdown of `seconds` (clamped to [`MAX_TIMER_SECONDS`]).
    ///
    /// Stops the ticker and begins a new cycle.
    pub fn configure(&self, seconds: u32) -> TimerSnapshot {
        let seconds = seconds.min(MAX_TIMER_SECONDS);
        let mut inner = lock(&self.inner);
        inner.stop_ticker();
        inner.total = seconds;
        inner.remaining = seconds;
        inner.expired = false;
        inner.cycle += 1;
        debug!(seconds, cycle = inner.cycle, "timer configured");
        inner.snapshot()
    }

    /// Sets the countdown from a minutes/seconds entry.
    ///
    /// Minutes are clamped to 0-99 and seconds to 0-59.
    pub fn apply(&self, minutes: u32, seconds: u32) -> TimerSnapshot {
        let minutes = minutes.min(MAX_APPLY_MINUTES);
        let seconds = seconds.min(59);
        self.configure(minutes * 60 + seconds)
    }

    /// Starts counting down.
    ///
    /// Returns `false` without doing anything if nothing is left to count
    /// or the timer is already running.
    pub fn start(&self) -> bool {
        let mut inner = lock(&self.inner);
        if inner.remaining == 0 || inner.running {
            return false;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            error!("timer started outside a tokio runtime");
            return false;
        };

        let token = CancellationToken::new();
        inner.running = true;
        inner.generation += 1;
        inner.ticker = Some(token.clone());

        let ticker = Ticker {
            inner: Arc::clone(&self.inner),
            expiry_tx: self.expiry_tx.clone(),
            cycle: inner.cycle,
            generation: inner.generation,
            first_tick: Instant::now() + TICK_PERIOD,
        };
        debug!(remaining = inner.remaining, cycle = inner.cycle, "timer started");
        drop(inner);

        handle.spawn(ticker.run(token));
        true
    }

    /// Stops counting down; remaining time is kept.
    pub fn pause(&self) -> TimerSnapshot {
        let mut inner = lock(&self.inner);
        inner.stop_ticker();
        debug!(remaining = inner.remaining, "timer paused");
        inner.snapshot()
    }

    /// Restores the configured total and begins a new cycle, stopped.
    pub fn reset(&self) -> TimerSnapshot {
        let mut inner = lock(&self.inner);
        inner.stop_ticker();
        inner.remaining = inner.total;
        inner.expired = false;
        inner.cycle += 1;
        debug!(total = inner.total, cycle = inner.cycle, "timer reset");
        inner.snapshot()
    }

    /// Current timer state.
    #[must_use]
    pub fn snapshot(&self) -> TimerSnapshot {
        lock(&self.inner).snapshot()
    }

    /// Current countdown cycle.
    #[must_use]
    pub fn cycle(&self) -> u64 {
        lock(&self.inner).cycle
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        lock(&self.inner).stop_ticker();
    }
}

struct Ticker {
    inner: Arc<Mutex<TimerInner>>,
    expiry_tx: mpsc::UnboundedSender<TimerExpired>,
    cycle: u64,
    generation: u64,
    first_tick: Instant,
}

impl Ticker {
    async fn run(self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval_at(self.first_tick, TICK_PERIOD);
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    trace!(cycle = self.cycle, "ticker cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if !self.tick() {
                        break;
                    }
                }
            }
        }
    }

    /// Applies one tick. Returns `false` once this ticker should stop.
    fn tick(&self) -> bool {
        let mut inner = lock(&self.inner);
        if inner.generation != self.generation || inner.cycle != self.cycle || !inner.running {
            return false;
        }

        inner.remaining = inner.remaining.saturating_sub(1);
        trace!(remaining = inner.remaining, "tick");
        if inner.remaining > 0 {
            return true;
        }

        inner.running = false;
        inner.ticker = None;
        if !inner.expired {
            inner.expired = true;
            debug!(cycle = self.cycle, "timer expired");
            // Receiver gone means the session is shutting down.
            let _ = self.expiry_tx.send(TimerExpired { cycle: self.cycle });
        }
        false
    }
}

fn lock(inner: &Mutex<TimerInner>) -> MutexGuard<'_, TimerInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Renders seconds as `MM:SS`.
#[must_use]
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

// ============================================================================
// Tests
// ============================================================================
