//! One-shot, cancelable expiry timers for roomlease.
//!
//! Every lease owns exactly one [`TimerHandle`]. When the planned duration
//! elapses the timer sends an [`Expiry`] on the scheduler's channel; the
//! consumer of that channel decides what releasing means.
//!
//! # Firing vs. cancelling
//!
//! A timer is a tiny state machine shared between its task and its handle:
//!
//! ```text
//! Armed ──(sleep elapsed)──→ Fired
//!   │
//!   └────(cancel / drop)───→ Cancelled
//! ```
//!
//! Both transitions are a compare-and-swap out of `Armed`, so exactly one
//! of them wins. Cancelling a timer that already fired (or was already
//! cancelled) returns `false` and does nothing else.
//!
//! The timer task only *reports* expiry. It never runs release work
//! itself, so cancelling the handle from inside a release cannot abort
//! that release halfway through.
//!
//! # Integration
//!
//! ```ignore
//! let (scheduler, mut expiries) = ExpiryScheduler::new();
//! let handle = scheduler.arm(resource_id, Duration::from_secs(300));
//!
//! while let Some(expiry) = expiries.recv().await {
//!     coordinator.release(expiry.key, ReleaseTrigger::expired(expiry.planned)).await;
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tracing::{debug, trace};

const ARMED: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

// ---------------------------------------------------------------------------
// Expiry (delivered to the consumer)
// ---------------------------------------------------------------------------

/// A timer that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiry<K> {
    /// The key the timer was armed for.
    pub key: K,
    /// The duration it was armed with. This is the realized duration of
    /// an expired lease.
    pub planned: Duration,
}

// ---------------------------------------------------------------------------
// Timer state
// ---------------------------------------------------------------------------

/// Observable state of a single timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Waiting for its deadline.
    Armed,
    /// Deadline passed and the expiry was reported.
    Fired,
    /// Cancelled before the deadline.
    Cancelled,
}

impl TimerState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            ARMED => Self::Armed,
            FIRED => Self::Fired,
            _ => Self::Cancelled,
        }
    }
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Armed => write!(f, "Armed"),
            Self::Fired => write!(f, "Fired"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Counters {
    armed: AtomicU64,
    fired: AtomicU64,
    cancelled: AtomicU64,
}

/// Snapshot of scheduler activity since creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerMetrics {
    /// Timers armed.
    pub total_armed: u64,
    /// Timers that reached their deadline.
    pub total_fired: u64,
    /// Timers cancelled before their deadline.
    pub total_cancelled: u64,
}

impl TimerMetrics {
    /// Timers that have neither fired nor been cancelled.
    pub fn pending(&self) -> u64 {
        self.total_armed
            .saturating_sub(self.total_fired + self.total_cancelled)
    }
}

// ---------------------------------------------------------------------------
// TimerHandle
// ---------------------------------------------------------------------------

/// Exclusive handle to one armed timer.
///
/// Not `Clone`: whoever holds the handle owns the timer. Dropping the
/// handle cancels the timer.
pub struct TimerHandle {
    state: Arc<AtomicU8>,
    cancel_tx: Option<oneshot::Sender<()>>,
    counters: Arc<Counters>,
    deadline: time::Instant,
}

impl TimerHandle {
    /// Cancels the timer.
    ///
    /// Returns `true` if this call stopped the timer from firing, `false`
    /// if it had already fired or been cancelled. Never blocks and never
    /// fails.
    pub fn cancel(&mut self) -> bool {
        let won = self
            .state
            .compare_exchange(ARMED, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
        }
        // Wake the task either way so it exits promptly.
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
        won
    }

    /// Current state of the timer.
    pub fn state(&self) -> TimerState {
        TimerState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// When the timer fires (or would have fired).
    pub fn deadline(&self) -> time::Instant {
        self.deadline
    }

    /// Time left before the deadline; zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline
            .saturating_duration_since(time::Instant::now())
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("state", &self.state())
            .field("deadline", &self.deadline)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Arms one-shot timers and reports their expiry on a channel.
///
/// Cheap to clone; every clone feeds the same receiver.
pub struct ExpiryScheduler<K> {
    sender: mpsc::UnboundedSender<Expiry<K>>,
    counters: Arc<Counters>,
}

impl<K> Clone for ExpiryScheduler<K> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<K> ExpiryScheduler<K>
where
    K: fmt::Display + Send + 'static,
{
    /// Creates a scheduler and the receiver its expiries arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Expiry<K>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let scheduler = Self {
            sender,
            counters: Arc::new(Counters::default()),
        };
        (scheduler, receiver)
    }

    /// Arms a timer that reports `key` once `duration` has elapsed.
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn arm(&self, key: K, duration: Duration) -> TimerHandle {
        let state = Arc::new(AtomicU8::new(ARMED));
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let deadline = time::Instant::now() + duration;

        self.counters.armed.fetch_add(1, Ordering::Relaxed);
        debug!(%key, secs = duration.as_secs(), "expiry timer armed");

        let task_state = Arc::clone(&state);
        let counters = Arc::clone(&self.counters);
        let sender = self.sender.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = time::sleep_until(deadline) => {
                    let fired = task_state
                        .compare_exchange(ARMED, FIRED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok();
                    if !fired {
                        trace!(%key, "timer lost race to cancel");
                        return;
                    }
                    counters.fired.fetch_add(1, Ordering::Relaxed);
                    trace!(%key, "expiry timer fired");
                    if sender.send(Expiry { key, planned: duration }).is_err() {
                        debug!("expiry receiver dropped, expiry discarded");
                    }
                }
                _ = cancel_rx => {
                    trace!(%key, "expiry timer cancelled");
                }
            }
        });

        TimerHandle {
            state,
            cancel_tx: Some(cancel_tx),
            counters: Arc::clone(&self.counters),
            deadline,
        }
    }

    /// Snapshot of armed/fired/cancelled counts.
    pub fn metrics(&self) -> TimerMetrics {
        TimerMetrics {
            total_armed: self.counters.armed.load(Ordering::Relaxed),
            total_fired: self.counters.fired.load(Ordering::Relaxed),
            total_cancelled: self.counters.cancelled.load(Ordering::Relaxed),
        }
    }
}
