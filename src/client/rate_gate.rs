//! Rate/backoff gate
//!
//! Every authenticated request passes [`RateGate::admit`] before it leaves and
//! reports its response headers through [`RateGate::observe`] afterwards.
//! The check of the rate window and the reservation of the next dispatch slot
//! happen under one lock, so bursts of concurrent callers are spaced evenly.

use crate::client::transport::HttpResponse;
use crate::config::AppConfig;
use crate::error::{RedditClientError, Result};
use log::{debug, warn};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RESET_HEADER: &str = "x-ratelimit-reset";

/// Longest reset the gate will wait for; larger header values are clamped to it
pub const MAX_RESET_WINDOW: Duration = Duration::from_secs(3600);

/// Remote rate-limit state derived from the most recent response headers
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RateWindow {
    /// Requests left in the current window; `None` until a response reported it
    pub remaining: Option<f64>,
    pub resets_at: Option<Instant>,
}

impl RateWindow {
    /// Time left until the window resets, if it is exhausted at `now`
    pub fn exhausted_for(&self, now: Instant) -> Option<Duration> {
        match (self.remaining, self.resets_at) {
            (Some(remaining), Some(resets_at)) if remaining < 1.0 && now < resets_at => {
                Some(resets_at - now)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct GateState {
    window: RateWindow,
    next_slot: Option<Instant>,
}

#[derive(Debug)]
pub struct RateGate {
    request_delay: Duration,
    queue_when_exhausted: bool,
    state: Mutex<GateState>,
}

impl RateGate {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            request_delay: config.request_delay,
            queue_when_exhausted: config.continue_after_ratelimit_error,
            state: Mutex::new(GateState::default()),
        }
    }

    /// Wait until this caller may dispatch, or fail if the window is exhausted and queueing is off
    pub async fn admit(&self) -> Result<()> {
        let slot = self.reserve(Instant::now()).await?;
        if slot > Instant::now() {
            debug!("Delaying request by {:?}", slot - Instant::now());
            sleep_until(slot).await;
        }
        Ok(())
    }

    /// Check the window and claim the next dispatch instant atomically
    async fn reserve(&self, now: Instant) -> Result<Instant> {
        let mut state = self.state.lock().await;

        let mut earliest = now;
        if let Some(wait) = state.window.exhausted_for(now) {
            if !self.queue_when_exhausted {
                warn!("Rate limit exhausted; refusing request for another {:?}", wait);
                return Err(RedditClientError::RateLimitExceeded { wait });
            }
            warn!("Rate limit exhausted; queueing request for {:?}", wait);
            earliest = now + wait;
        }

        let slot = match state.next_slot {
            Some(next) if next > earliest => next,
            _ => earliest,
        };
        if !self.request_delay.is_zero() {
            state.next_slot = Some(slot + self.request_delay);
        }
        Ok(slot)
    }

    /// Record the rate-limit headers of a response
    pub async fn observe(&self, response: &HttpResponse) {
        let remaining = response
            .header(REMAINING_HEADER)
            .and_then(|v| v.trim().parse::<f64>().ok());
        let reset = response
            .header(RESET_HEADER)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs >= 0.0);

        if remaining.is_none() && reset.is_none() {
            return;
        }

        let mut state = self.state.lock().await;
        if let Some(remaining) = remaining {
            state.window.remaining = Some(remaining);
        }
        if let Some(reset) = reset {
            let wait = Duration::try_from_secs_f64(reset)
                .unwrap_or(MAX_RESET_WINDOW)
                .min(MAX_RESET_WINDOW);
            state.window.resets_at = Instant::now().checked_add(wait);
        }
        debug!(
            "Rate window: {:?} requests remaining, reset in {:?}s",
            state.window.remaining, reset
        );
    }

    /// Snapshot of the current window
    pub async fn window(&self) -> RateWindow {
        self.state.lock().await.window
    }
}
