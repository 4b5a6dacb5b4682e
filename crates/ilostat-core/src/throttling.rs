use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

/// Rolling-window request limiter shared by every call the client makes.
///
/// At most `limit` permits are handed out within any `window`-long span.
/// Callers that find the window full are suspended until the oldest permit
/// ages out; they are never rejected.
#[derive(Debug, Clone)]
pub struct SlidingWindowLimiter {
    limit: usize,
    window: Duration,
    issued: Arc<Mutex<VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        let limit = limit.max(1) as usize;
        Self {
            limit,
            window,
            issued: Arc::new(Mutex::new(VecDeque::with_capacity(limit))),
        }
    }

    /// Tries to take a permit now. When the window is full the time until the
    /// next permit frees up is returned instead.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut issued = self
            .issued
            .lock()
            .expect("rate limiter window should not be poisoned");

        while let Some(oldest) = issued.front() {
            if now.duration_since(*oldest) >= self.window {
                issued.pop_front();
            } else {
                break;
            }
        }

        if issued.len() < self.limit {
            issued.push_back(now);
            return Ok(());
        }

        let oldest = issued.front().copied().unwrap_or(now);
        Err(self.window.saturating_sub(now.duration_since(oldest)))
    }

    /// Waits until a permit is available and takes it.
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire() {
                Ok(()) => return,
                Err(wait) => {
                    tracing::trace!(
                        wait_ms = wait.as_millis() as u64,
                        "rate limit reached, waiting"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    pub fn in_flight(&self) -> usize {
        let now = Instant::now();
        self.issued
            .lock()
            .expect("rate limiter window should not be poisoned")
            .iter()
            .filter(|issued_at| now.duration_since(**issued_at) < self.window)
            .count()
    }

    pub const fn limit(&self) -> usize {
        self.limit
    }
}
