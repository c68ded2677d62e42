use chrono::{DateTime, Duration, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{MetricsResult, SessionRecord, SplitTime, WorkoutDefinition};
use crate::streaks::{calculate_streaks, Streaks};

/// Metrics computable from session records alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FreeTierMetrics {
    pub total_sessions: usize,
    pub average_duration_minutes: Decimal,
    pub total_duration_minutes: Decimal,
    pub last_session_duration_minutes: Decimal,
    pub sessions_per_week: u32,
    pub fastest_time_seconds: u32,
    pub streaks: Streaks,
    pub split_times: Vec<SplitTime>,
}

impl FreeTierMetrics {
    /// Copy these values into a result, leaving premium fields untouched
    pub fn apply_to(self, result: &mut MetricsResult) {
        result.total_sessions = self.total_sessions;
        result.average_duration_minutes = self.average_duration_minutes;
        result.total_duration_minutes = self.total_duration_minutes;
        result.last_session_duration_minutes = self.last_session_duration_minutes;
        result.sessions_per_week = self.sessions_per_week;
        result.fastest_time_seconds = self.fastest_time_seconds;
        result.current_streak_days = self.streaks.current;
        result.longest_streak_days = self.streaks.longest;
        result.split_times = self.split_times;
    }
}

/// Session counts, durations and streaks; no sensor dependency
pub struct FreeTierAggregator {
    offset: FixedOffset,
}

impl FreeTierAggregator {
    pub fn new(offset: FixedOffset) -> Self {
        FreeTierAggregator { offset }
    }

    /// Aggregate an already-fetched record set.
    ///
    /// `records` is expected newest-first; the "last session" is the one
    /// with the latest completion time regardless. Weekly frequency is only
    /// counted when a workout context is given.
    pub fn aggregate(
        &self,
        records: &[SessionRecord],
        workout: Option<&WorkoutDefinition>,
        session: Option<&SessionRecord>,
        now: DateTime<Utc>,
    ) -> FreeTierMetrics {
        let total_sessions = records.len();
        let total_seconds: u64 = records.iter().map(|r| u64::from(r.duration_seconds)).sum();
        let total_duration_minutes = minutes(Decimal::from(total_seconds));

        let average_duration_minutes = if total_sessions > 0 {
            minutes(Decimal::from(total_seconds) / Decimal::from(total_sessions))
        } else {
            Decimal::ZERO
        };

        let last_session_duration_minutes = records
            .iter()
            .max_by_key(|r| r.completed_at)
            .map(|r| minutes(Decimal::from(r.duration_seconds)))
            .unwrap_or(Decimal::ZERO);

        let sessions_per_week = match workout {
            Some(_) => Self::sessions_in_last_week(records, now),
            None => 0,
        };

        FreeTierMetrics {
            total_sessions,
            average_duration_minutes,
            total_duration_minutes,
            last_session_duration_minutes,
            sessions_per_week,
            fastest_time_seconds: workout.map(|w| w.fastest_time_seconds).unwrap_or(0),
            streaks: calculate_streaks(records.iter().map(|r| r.completed_at), &self.offset),
            split_times: session.map(|s| s.splits.clone()).unwrap_or_default(),
        }
    }

    /// Sessions completed within the rolling 7 days ending at `now`
    pub fn sessions_in_last_week(records: &[SessionRecord], now: DateTime<Utc>) -> u32 {
        let since = now - Duration::days(7);
        records
            .iter()
            .filter(|r| r.completed_at > since && r.completed_at <= now)
            .count() as u32
    }
}

fn minutes(seconds: Decimal) -> Decimal {
    (seconds / Decimal::from(60)).round_dp(2)
}
