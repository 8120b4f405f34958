//! Request pacing for the listing source.
//!
//! Bounds requests to a maximum per rolling window and adds a random pause
//! before every request so calls do not arrive at a fixed cadence.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

const WINDOW: Duration = Duration::from_secs(60);

pub struct RateLimiter {
    max_per_window: usize,
    window: Duration,
    min_delay: Duration,
    max_delay: Duration,
    history: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// `max_per_minute` is clamped to at least one request.
    pub fn new(max_per_minute: usize, min_delay: Duration, max_delay: Duration) -> Self {
        let max_per_window = max_per_minute.max(1);
        Self {
            max_per_window,
            window: WINDOW,
            min_delay,
            max_delay,
            history: Mutex::new(VecDeque::with_capacity(max_per_window)),
        }
    }

    /// Waits until another request may be issued, then records it.
    ///
    /// The lock is held across the window check, the random delay and the
    /// recording step, so concurrent callers are serialized and recorded
    /// timestamps follow completion order.
    pub async fn wait(&self) {
        let mut history = self.history.lock().await;

        self.trim(&mut history, Instant::now());
        if history.len() >= self.max_per_window {
            if let Some(&oldest) = history.front() {
                let ready_at = oldest + self.window;
                debug!(
                    wait_ms = ready_at.saturating_duration_since(Instant::now()).as_millis() as u64,
                    "request window full, waiting"
                );
                tokio::time::sleep_until(ready_at).await;
            }
            self.trim(&mut history, Instant::now());
        }

        let delay = self.random_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        history.push_back(Instant::now());
    }

    /// Requests recorded inside the current window.
    pub async fn in_flight_window(&self) -> usize {
        let mut history = self.history.lock().await;
        self.trim(&mut history, Instant::now());
        history.len()
    }

    fn trim(&self, history: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&front) = history.front() {
            if now.saturating_duration_since(front) >= self.window {
                history.pop_front();
            } else {
                break;
            }
        }
    }

    /// Uniform in `[min_delay, max_delay)`; `min_delay` when the range is empty.
    fn random_delay(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        let span = self.max_delay - self.min_delay;
        self.min_delay + span.mul_f64(rand::random::<f64>())
    }
}
