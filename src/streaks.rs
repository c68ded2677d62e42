//! Consecutive-day streak detection
//!
//! Streaks count calendar days, not sessions: several sessions on the same
//! day collapse to one unit.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Current and longest run of consecutive training days
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streaks {
    pub current: u32,
    pub longest: u32,
}

/// Calendar day of a timestamp in the given offset
pub fn calendar_day(at: DateTime<Utc>, offset: &FixedOffset) -> NaiveDate {
    at.with_timezone(offset).date_naive()
}

/// Unique training days, newest first
pub fn unique_days_desc<I>(timestamps: I, offset: &FixedOffset) -> Vec<NaiveDate>
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let mut days: Vec<NaiveDate> = timestamps
        .into_iter()
        .map(|at| calendar_day(at, offset))
        .collect();
    days.sort_unstable_by(|a, b| b.cmp(a));
    days.dedup();
    days
}

/// Compute streaks from session timestamps.
///
/// Walks the descending unique-day sequence from the newest day. A one-day
/// gap extends the running count, anything else resets it to 1. The longest
/// run is a high-water mark. The current streak is the run that contains the
/// newest day.
pub fn calculate_streaks<I>(timestamps: I, offset: &FixedOffset) -> Streaks
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let days = unique_days_desc(timestamps, offset);
    if days.is_empty() {
        return Streaks::default();
    }

    let mut run = 1u32;
    let mut longest = 1u32;
    let mut current: Option<u32> = None;
    for pair in days.windows(2) {
        if (pair[0] - pair[1]).num_days() == 1 {
            run += 1;
            longest = longest.max(run);
        } else {
            if current.is_none() {
                current = Some(run);
            }
            run = 1;
        }
    }

    Streaks {
        current: current.unwrap_or(run),
        longest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(calculate_streaks(Vec::new(), &utc()), Streaks { current: 0, longest: 0 });
    }

    #[test]
    fn test_single_session() {
        let streaks = calculate_streaks(vec![at(2024, 1, 10, 9)], &utc());
        assert_eq!(streaks, Streaks { current: 1, longest: 1 });
    }

    #[test]
    fn test_same_day_sessions_collapse_and_gap_resets() {
        // Two sessions on Jan 10, then a 3-day gap back to Jan 7
        let timestamps = vec![at(2024, 1, 10, 7), at(2024, 1, 10, 19), at(2024, 1, 7, 8)];
        let streaks = calculate_streaks(timestamps, &utc());
        assert_eq!(streaks.current, 1);
        assert_eq!(streaks.longest, 1);
    }

    #[test]
    fn test_walk_is_anchored_at_newest_day() {
        // Newest run: Jan 20-21 (2 days), older run: Jan 1-4 (4 days)
        let mut timestamps = vec![at(2024, 1, 21, 6), at(2024, 1, 20, 6)];
        timestamps.extend((1..=4).map(|d| at(2024, 1, d, 6)));

        let streaks = calculate_streaks(timestamps, &utc());
        assert_eq!(streaks.longest, 4);
        assert_eq!(streaks.current, 2);
    }

    #[test]
    fn test_offset_changes_calendar_day() {
        // 23:30 UTC on Jan 1 and 00:30 UTC on Jan 3 are Jan 2 and Jan 3 at UTC+1
        let timestamps = vec![
            Utc.with_ymd_and_hms(2024, 1, 1, 23, 30, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 3, 0, 30, 0).unwrap(),
        ];
        let plus_one = FixedOffset::east_opt(3600).unwrap();

        assert_eq!(calculate_streaks(timestamps.clone(), &utc()).longest, 1);
        assert_eq!(calculate_streaks(timestamps, &plus_one).longest, 2);
    }

    #[test]
    fn test_unique_days_desc() {
        let days = unique_days_desc(vec![at(2024, 2, 1, 1), at(2024, 2, 3, 1), at(2024, 2, 1, 22)], &utc());
        assert_eq!(
            days,
            vec![
                NaiveDate::from_ymd_opt(2024, 2, 3).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
            ]
        );
    }

    proptest! {
        #[test]
        fn test_consecutive_days_give_full_streak(
            n in 1u32..120u32,
            hour in 0u32..24u32,
            extra_per_day in 0usize..3usize,
        ) {
            let start = at(2023, 6, 1, hour);
            let mut timestamps = Vec::new();
            for day in 0..n {
                let base = start + Duration::days(i64::from(day));
                for k in 0..=extra_per_day {
                    timestamps.push(base + Duration::minutes(k as i64));
                }
            }

            let streaks = calculate_streaks(timestamps, &utc());
            prop_assert_eq!(streaks.current, n);
            prop_assert_eq!(streaks.longest, n);
        }

        #[test]
        fn test_longest_bounds_current(days in proptest::collection::vec(0i64..60, 1..40)) {
            let base = at(2024, 1, 1, 12);
            let timestamps: Vec<_> = days.iter().map(|d| base + Duration::days(*d)).collect();
            let unique = unique_days_desc(timestamps.clone(), &utc()).len() as u32;

            let streaks = calculate_streaks(timestamps, &utc());
            prop_assert!(streaks.current >= 1);
            prop_assert!(streaks.longest >= streaks.current);
            prop_assert!(streaks.longest <= unique);
        }
    }
}
