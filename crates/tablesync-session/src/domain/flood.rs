//! Per-connection inbound rate limit.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Sliding-window message counter owned by one connection's reader task.
#[derive(Debug, Clone)]
pub struct FloodGuard {
    max_messages: usize,
    window: Duration,
    seen: VecDeque<DateTime<Utc>>,
}

impl FloodGuard {
    /// Allows `max_messages` per `window`.
    #[must_use]
    pub fn new(max_messages: usize, window: Duration) -> Self {
        Self {
            max_messages,
            window,
            seen: VecDeque::with_capacity(max_messages.min(1024)),
        }
    }

    /// Records a message at `now`. Returns `false` once the budget for the
    /// current window is spent.
    pub fn admit(&mut self, now: DateTime<Utc>) -> bool {
        while let Some(oldest) = self.seen.front() {
            let age = (now - *oldest).to_std().unwrap_or(Duration::ZERO);
            if age < self.window {
                break;
            }
            self.seen.pop_front();
        }
        if self.seen.len() >= self.max_messages {
            return false;
        }
        self.seen.push_back(now);
        true
    }
}
