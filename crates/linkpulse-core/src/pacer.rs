//! Inter-wave pacing.
//!
//! The scheduler asks its [`Pacer`] to pause before every wave except the
//! first. Pacing caps the provider-facing request rate without serialising
//! the requests inside a wave.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use linkpulse_core::pacer::FixedDelayPacer;
//!
//! // 500ms between waves plus up to 250ms of random jitter
//! let pacer = FixedDelayPacer::new(Duration::from_millis(500))
//!     .with_jitter(Duration::from_millis(250));
//! ```

use std::future::Future;
use std::time::Duration;

/// Decides how long to wait between two waves.
pub trait Pacer: Send + Sync {
    /// Called before wave `next_wave` (1-based, never for the first wave).
    fn pause(&self, next_wave: usize) -> impl Future<Output = ()> + Send;
}

/// Sleeps a fixed delay (plus optional jitter) between waves.
#[derive(Debug, Clone)]
pub struct FixedDelayPacer {
    /// Base delay between consecutive waves.
    pub delay: Duration,

    /// Maximum random jitter added on top of `delay` (uniform [0, jitter]).
    ///
    /// Set to `Duration::ZERO` to disable.
    pub jitter: Duration,
}

impl FixedDelayPacer {
    /// Create a pacer with the given delay and no jitter.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            jitter: Duration::ZERO,
        }
    }

    /// Add random jitter (uniform [0, jitter]) on top of the base delay.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Compute the effective delay for a single wait (delay + random jitter).
    fn effective_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.delay;
        }
        let jitter_ms = rand_jitter_ms(self.jitter.as_millis() as u64);
        self.delay + Duration::from_millis(jitter_ms)
    }
}

impl Default for FixedDelayPacer {
    /// 500ms between waves, no jitter.
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl Pacer for FixedDelayPacer {
    async fn pause(&self, next_wave: usize) {
        let delay = self.effective_delay();
        if delay.is_zero() {
            return;
        }
        tracing::debug!(
            next_wave,
            sleep_ms = %delay.as_millis(),
            "Pacing before next wave"
        );
        tokio::time::sleep(delay).await;
    }
}

// Xorshift seeded from the clock; jitter only, not crypto.
fn rand_jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x % max_ms
}
