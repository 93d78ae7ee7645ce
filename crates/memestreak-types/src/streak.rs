//! Daily streak rule.
//!
//! A streak advances by at most one per UTC calendar day and falls back to one
//! after a missed day. Both directions of a pairing run through this rule on
//! every relayed meme.

use chrono::{DateTime, NaiveTime, Utc};

const MS_PER_DAY: f64 = 86_400_000.0;

/// Computes the streak after an activity at `now`.
///
/// `previous` is the stored counter (absent for a fresh pairing) and
/// `previous_activity` the stored `last_meme_at`. The result is always at least 1.
pub fn next_streak(
    previous: Option<u32>,
    previous_activity: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> u32 {
    let current = previous.unwrap_or(0);

    let Some(last) = previous_activity else {
        return 1;
    };

    match day_gap(last, now) {
        0 => current.max(1),
        1 => current.saturating_add(1),
        _ => 1,
    }
}

/// Whole days between the UTC midnights of `earlier` and `later`, rounded.
/// Negative when `later` falls on an earlier calendar day.
pub fn day_gap(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    let start_of_earlier = start_of_day(earlier);
    let start_of_later = start_of_day(later);
    let diff_ms = (start_of_later - start_of_earlier).num_milliseconds();
    (diff_ms as f64 / MS_PER_DAY).round() as i64
}

fn start_of_day(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.date_naive().and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn first_activity_starts_at_one() {
        let now = at(2026, 3, 1, 12, 0);
        assert_eq!(next_streak(None, None, now), 1);
        assert_eq!(next_streak(Some(42), None, now), 1);
    }

    #[test]
    fn same_day_never_increments() {
        let t = at(2026, 3, 1, 0, 5);
        let later = at(2026, 3, 1, 23, 59);
        for n in [0, 1, 3, 100] {
            assert_eq!(next_streak(Some(n), Some(t), t), n.max(1));
            assert_eq!(next_streak(Some(n), Some(t), later), n.max(1));
        }
        assert_eq!(next_streak(None, Some(t), later), 1);
    }

    #[test]
    fn consecutive_day_increments() {
        let t = at(2026, 3, 1, 22, 0);
        for n in [0, 1, 4, 365] {
            assert_eq!(next_streak(Some(n), Some(t), t + Duration::days(1)), n + 1);
        }
        // Absent count with a stored timestamp counts from zero.
        assert_eq!(next_streak(None, Some(t), t + Duration::days(1)), 1);
    }

    #[test]
    fn boundary_is_utc_midnight_not_24_hours() {
        // Five minutes apart, but across midnight.
        let last = at(2026, 3, 1, 23, 58);
        let now = at(2026, 3, 2, 0, 3);
        assert_eq!(next_streak(Some(7), Some(last), now), 8);

        // Almost 48 hours apart, but only one calendar day.
        let last = at(2026, 3, 1, 0, 1);
        let now = at(2026, 3, 2, 23, 59);
        assert_eq!(next_streak(Some(7), Some(last), now), 8);
    }

    #[test]
    fn missed_day_resets() {
        let t = at(2026, 3, 1, 9, 0);
        for n in [0, 1, 5, 99] {
            assert_eq!(next_streak(Some(n), Some(t), t + Duration::days(2)), 1);
            assert_eq!(next_streak(Some(n), Some(t), t + Duration::days(30)), 1);
        }
    }

    #[test]
    fn clock_going_backwards_resets() {
        let t = at(2026, 3, 5, 9, 0);
        assert_eq!(next_streak(Some(9), Some(t), t - Duration::days(1)), 1);
    }

    #[test]
    fn month_and_year_rollover() {
        assert_eq!(day_gap(at(2026, 2, 28, 12, 0), at(2026, 3, 1, 1, 0)), 1);
        assert_eq!(day_gap(at(2025, 12, 31, 23, 0), at(2026, 1, 1, 0, 0)), 1);
        assert_eq!(day_gap(at(2028, 2, 28, 12, 0), at(2028, 3, 1, 1, 0)), 2);
    }

    #[test]
    fn counter_saturates() {
        let t = at(2026, 3, 1, 9, 0);
        assert_eq!(
            next_streak(Some(u32::MAX), Some(t), t + Duration::days(1)),
            u32::MAX
        );
    }
}
