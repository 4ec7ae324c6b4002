use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::time::{Duration, Instant};

/// Sliding-window rate limiter shared by every request to one provider host.
///
/// At most `max_requests` calls are admitted in any `window`. A caller over the
/// budget sleeps until the oldest admitted request leaves the window; the lock is
/// never held across the sleep.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    admitted: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        RateLimiter {
            max_requests: max_requests.max(1),
            window,
            admitted: Mutex::new(VecDeque::new()),
        }
    }

    /// Admit the request now, or return how long to wait before retrying.
    fn try_admit(&self) -> Option<Duration> {
        let mut admitted = self.admitted.lock();
        let now = Instant::now();

        while let Some(oldest) = admitted.front() {
            if now.duration_since(*oldest) >= self.window {
                admitted.pop_front();
            } else {
                break;
            }
        }

        if admitted.len() >= self.max_requests {
            if let Some(oldest) = admitted.front() {
                return Some(self.window - now.duration_since(*oldest));
            }
        }
        admitted.push_back(now);
        None
    }

    /// Wait for a free slot in the window.
    pub async fn acquire(&self) {
        while let Some(wait) = self.try_admit() {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Requests admitted in the current window.
    pub fn in_flight_window(&self) -> usize {
        let admitted = self.admitted.lock();
        let now = Instant::now();
        admitted
            .iter()
            .filter(|t| now.duration_since(**t) < self.window)
            .count()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        RateLimiter::new(10, Duration::from_secs(60))
    }
}
