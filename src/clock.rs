//! Wall-clock helpers.
//!
//! Timestamps are stored as epoch milliseconds, so values are truncated to
//! millisecond precision at creation. A record then compares equal to itself
//! after a trip through storage.

use chrono::{DateTime, Utc};

/// Current time truncated to whole milliseconds
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_millisecond_precision() {
        let t = now();
        assert_eq!(t.timestamp_subsec_nanos() % 1_000_000, 0);
    }
}
