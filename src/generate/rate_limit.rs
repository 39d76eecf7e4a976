// src/generate/rate_limit.rs
//! Fixed-window article rate limiter shared by concurrent runs.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Window {
    count: u32,
    /// Set on the first acquisition.
    started: Option<DateTime<Utc>>,
}

/// At most `limit` acquisitions per window; the window resets when
/// `now - start > window` (wall-clock, not a sliding log).
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    state: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new(Window::default()),
        }
    }

    /// 50 per 60 minutes.
    pub fn with_defaults() -> Self {
        Self::new(50, Duration::minutes(60))
    }

    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Utc::now())
    }

    pub fn try_acquire_at(&self, now: DateTime<Utc>) -> bool {
        let mut w = self.state.lock();
        let expired = w.started.map_or(true, |start| now - start > self.window);
        if expired {
            w.count = 0;
            w.started = Some(now);
        }
        if w.count >= self.limit {
            return false;
        }
        w.count += 1;
        true
    }

    /// Acquisitions left in the current window.
    pub fn remaining(&self) -> u32 {
        let w = self.state.lock();
        self.limit.saturating_sub(w.count)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn nth_plus_one_fails_until_window_expires() {
        let rl = RateLimiter::new(3, Duration::minutes(60));
        for i in 0..3 {
            assert!(rl.try_acquire_at(t0() + Duration::minutes(i)));
        }
        assert!(!rl.try_acquire_at(t0() + Duration::minutes(10)));
        // exactly at the boundary the window is still open
        assert!(!rl.try_acquire_at(t0() + Duration::minutes(60)));
        assert!(rl.try_acquire_at(t0() + Duration::minutes(61)));
        assert_eq!(rl.remaining(), 2);
    }

    #[test]
    fn zero_limit_always_denies() {
        let rl = RateLimiter::new(0, Duration::minutes(60));
        assert!(!rl.try_acquire_at(t0()));
    }
}
