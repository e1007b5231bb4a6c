//! Consecutive-failure circuit for the cache store.
//!
//! ## States
//!
//! ```text
//!             N consecutive failures
//! Available ─────────────────────────▶ Degraded
//!     ▲                                   │
//!     │ any success                       │ cool-down elapsed:
//!     └───────────────────────────────────┘ next call is let through as a probe
//! ```
//!
//! While degraded and inside the cool-down window, [`HealthTracker::allows_attempt`]
//! returns `false` and callers skip the store entirely. Once the window has
//! passed, calls are attempted again; the first success closes the circuit and
//! a failed probe restarts the window.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::clock::Clock;

const NOT_DEGRADED: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Available,
    Degraded,
}

#[derive(Debug)]
pub struct HealthTracker {
    consecutive_failures: AtomicU32,
    degraded_since_ms: AtomicU64,
    threshold: u32,
    cooldown: Duration,
    clock: Arc<dyn Clock>,
}

impl HealthTracker {
    pub fn new(threshold: u32, cooldown: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
            degraded_since_ms: AtomicU64::new(NOT_DEGRADED),
            threshold: threshold.max(1),
            cooldown,
            clock,
        }
    }

    pub fn state(&self) -> HealthState {
        if self.consecutive_failures.load(Ordering::SeqCst) >= self.threshold {
            HealthState::Degraded
        } else {
            HealthState::Available
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    /// Whether a store operation should be attempted right now.
    pub fn allows_attempt(&self) -> bool {
        if self.state() == HealthState::Available {
            return true;
        }
        let since = self.degraded_since_ms.load(Ordering::SeqCst);
        if since == NOT_DEGRADED {
            return true;
        }
        let now = self.clock.now_millis();
        now.saturating_sub(since) >= self.cooldown.as_millis() as u64
    }

    pub fn record_success(&self) {
        let previous = self.consecutive_failures.swap(0, Ordering::SeqCst);
        self.degraded_since_ms.store(NOT_DEGRADED, Ordering::SeqCst);
        if previous >= self.threshold {
            tracing::info!(previous_failures = previous, "cache store recovered");
        }
    }

    pub fn record_failure(&self) {
        let failures = self
            .consecutive_failures
            .fetch_add(1, Ordering::SeqCst)
            .saturating_add(1);
        if failures >= self.threshold {
            // Entering the degraded state, or a failed probe after cool-down:
            // either way the window starts again from now.
            self.degraded_since_ms
                .store(self.clock.now_millis(), Ordering::SeqCst);
            if failures == self.threshold {
                tracing::warn!(
                    failures,
                    cooldown_secs = self.cooldown.as_secs(),
                    "cache store degraded, bypassing until cool-down elapses"
                );
            }
        }
    }
}
