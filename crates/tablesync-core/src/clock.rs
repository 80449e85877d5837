//! Clock abstraction so timestamps and idle windows are testable.

use chrono::{DateTime, Utc};

/// Abstraction over system time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;

    /// Milliseconds since the Unix epoch, as reported in `pong` replies.
    fn timestamp_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Production clock that delegates to the system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct At(DateTime<Utc>);

    impl Clock for At {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[test]
    fn test_timestamp_millis_follows_now() {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 30).unwrap();
        assert_eq!(At(now).timestamp_millis(), 1_768_471_230_000);
    }
}
