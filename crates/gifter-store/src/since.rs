//! Human-readable relative ages ("3 days", "1 hour").

use chrono::{DateTime, Utc};

const UNITS: [(&str, i64); 6] = [
    ("year", 365 * 24 * 3600),
    ("week", 7 * 24 * 3600),
    ("day", 24 * 3600),
    ("hour", 3600),
    ("minute", 60),
    ("second", 1),
];

/// Age of `then` at `now`, whole seconds, largest unit only.
///
/// Future timestamps read as `"0 seconds"`.
pub fn since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);

    for (unit, size) in UNITS {
        let count = secs / size;
        if count > 0 {
            return plural(count, unit);
        }
    }
    plural(0, "second")
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("{count} {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn ago(d: Duration) -> String {
        let now = Utc::now();
        since(now - d, now)
    }

    #[test]
    fn largest_unit_only() {
        assert_eq!(ago(Duration::days(3) + Duration::hours(5)), "3 days");
        assert_eq!(ago(Duration::hours(1) + Duration::minutes(59)), "1 hour");
        assert_eq!(ago(Duration::days(15)), "2 weeks");
        assert_eq!(ago(Duration::days(400)), "1 year");
        assert_eq!(ago(Duration::seconds(42)), "42 seconds");
        assert_eq!(ago(Duration::minutes(1)), "1 minute");
    }

    #[test]
    fn sub_second_and_future() {
        assert_eq!(ago(Duration::milliseconds(300)), "0 seconds");
        assert_eq!(ago(Duration::seconds(-30)), "0 seconds");
    }
}
