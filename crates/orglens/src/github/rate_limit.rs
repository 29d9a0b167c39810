//! Shared sleep-until-reset gate for one API credential.
//!
//! GitHub reports exhaustion through `rateLimit { remaining resetAt }` in
//! GraphQL bodies and through `x-ratelimit-*` headers on REST responses.
//! Once either says the budget is gone, every request sent through any clone
//! of the client waits on the same gate until the reset time plus a margin.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::http::{HttpHeaders, header_get};
use crate::sync::{ProgressCallback, RATE_LIMIT_MARGIN_SECS, SyncProgress, emit};

/// Remaining-call count and reset timestamp reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitState {
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitState {
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Extract rate limit info from REST response headers.
    pub fn from_headers(headers: &HttpHeaders) -> Option<Self> {
        let remaining = header_get(headers, "x-ratelimit-remaining")?
            .parse::<u64>()
            .ok()?;
        let reset_epoch = header_get(headers, "x-ratelimit-reset")?
            .parse::<i64>()
            .ok()?;
        let reset_at = DateTime::from_timestamp(reset_epoch, 0)?;
        Some(Self {
            remaining,
            reset_at,
        })
    }
}

/// Source of wall-clock time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy)]
struct Block {
    until: DateTime<Utc>,
    deadline: Instant,
}

/// Process-wide (per credential) rate-limit gate.
#[derive(Clone)]
pub struct RateLimitGate {
    block: Arc<Mutex<Option<Block>>>,
    clock: Clock,
    margin: chrono::Duration,
}

impl Default for RateLimitGate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimitGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitGate")
            .field("blocked_until", &self.blocked_until())
            .finish()
    }
}

impl RateLimitGate {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(Utc::now))
    }

    /// Create a gate that reads wall-clock time from `clock`.
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            block: Arc::new(Mutex::new(None)),
            clock,
            margin: chrono::Duration::seconds(RATE_LIMIT_MARGIN_SECS),
        }
    }

    /// Close the gate until `reset_at` plus the margin.
    ///
    /// An earlier block is never shortened. Returns the time the gate
    /// opens again.
    pub fn block_until(&self, reset_at: DateTime<Utc>) -> DateTime<Utc> {
        let until = reset_at + self.margin;
        let wait = (until - (self.clock)()).to_std().unwrap_or(Duration::ZERO);
        let candidate = Block {
            until,
            deadline: Instant::now() + wait,
        };

        let mut guard = self.block.lock().unwrap_or_else(|e| e.into_inner());
        match *guard {
            Some(existing) if existing.deadline >= candidate.deadline => existing.until,
            _ => {
                tracing::warn!("Rate limit exhausted; pausing requests until {}", until);
                *guard = Some(candidate);
                until
            }
        }
    }

    /// Feed a rate-limit observation into the gate.
    pub fn observe(&self, state: &RateLimitState) {
        if state.is_exhausted() {
            self.block_until(state.reset_at);
        }
    }

    /// Time the gate opens again, if it is currently closed.
    pub fn blocked_until(&self) -> Option<DateTime<Utc>> {
        let guard = self.block.lock().unwrap_or_else(|e| e.into_inner());
        (*guard)
            .filter(|b| b.deadline > Instant::now())
            .map(|b| b.until)
    }

    /// Sleep until the gate is open. Returns how long this call slept.
    pub async fn wait(&self, on_progress: Option<&ProgressCallback>) -> Duration {
        let block = {
            let guard = self.block.lock().unwrap_or_else(|e| e.into_inner());
            *guard
        };

        let Some(block) = block else {
            return Duration::ZERO;
        };

        let now = Instant::now();
        if block.deadline <= now {
            return Duration::ZERO;
        }

        let wait = block.deadline - now;
        emit(
            on_progress,
            SyncProgress::RateLimitWait {
                until: block.until,
                wait_ms: wait.as_millis() as u64,
            },
        );
        tracing::info!("Waiting {:?} for rate limit reset", wait);
        tokio::time::sleep_until(block.deadline).await;
        wait
    }
}
