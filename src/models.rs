use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Workout categories offered in the workout editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutCategory {
    Running,
    Walking,
    Cycling,
    Swimming,
    Hiit,
    Strength,
    Yoga,
    Other,
}

/// Activity types understood by the sensor provider when saving workouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityType {
    Running,
    Walking,
    Cycling,
    Swimming,
    HighIntensityIntervalTraining,
    TraditionalStrengthTraining,
    Yoga,
    Other,
}

impl WorkoutCategory {
    pub const ALL: [WorkoutCategory; 8] = [
        WorkoutCategory::Running,
        WorkoutCategory::Walking,
        WorkoutCategory::Cycling,
        WorkoutCategory::Swimming,
        WorkoutCategory::Hiit,
        WorkoutCategory::Strength,
        WorkoutCategory::Yoga,
        WorkoutCategory::Other,
    ];

    /// Sensor-provider activity type this category is saved as
    pub fn activity_type(&self) -> ActivityType {
        match self {
            WorkoutCategory::Running => ActivityType::Running,
            WorkoutCategory::Walking => ActivityType::Walking,
            WorkoutCategory::Cycling => ActivityType::Cycling,
            WorkoutCategory::Swimming => ActivityType::Swimming,
            WorkoutCategory::Hiit => ActivityType::HighIntensityIntervalTraining,
            WorkoutCategory::Strength => ActivityType::TraditionalStrengthTraining,
            WorkoutCategory::Yoga => ActivityType::Yoga,
            WorkoutCategory::Other => ActivityType::Other,
        }
    }

    /// Label shown in reports
    pub fn display_name(&self) -> &'static str {
        match self {
            WorkoutCategory::Running => "Running",
            WorkoutCategory::Walking => "Walking",
            WorkoutCategory::Cycling => "Cycling",
            WorkoutCategory::Swimming => "Swimming",
            WorkoutCategory::Hiit => "HIIT",
            WorkoutCategory::Strength => "Strength",
            WorkoutCategory::Yoga => "Yoga",
            WorkoutCategory::Other => "Other",
        }
    }
}

/// Position of a split inside a workout, accounting for rounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPosition {
    /// Index into the workout's exercise list
    pub exercise_index: usize,

    /// Exercise name at that index
    pub exercise: String,

    /// 1-based round number
    pub round: u32,
}

/// User-authored workout template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutDefinition {
    /// Unique identifier for the workout
    pub id: String,

    /// Workout title
    pub title: String,

    /// Ordered exercise names
    pub exercises: Vec<String>,

    /// Optional category
    pub category: Option<WorkoutCategory>,

    /// Round count for circuit-style repetition
    pub rounds: Option<u32>,

    /// Cached fastest recorded duration in seconds (0 = none recorded)
    #[serde(default)]
    pub fastest_time_seconds: u32,
}

impl WorkoutDefinition {
    pub fn new(title: impl Into<String>, exercises: Vec<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            exercises,
            category: None,
            rounds: None,
            fastest_time_seconds: 0,
        }
    }

    /// Map a split's order index onto the exercise list.
    ///
    /// Index `i` maps to exercise `i mod n` in round `i / n + 1`. Returns
    /// `None` for workouts without exercises.
    pub fn exercise_for_split(&self, order: u32) -> Option<SplitPosition> {
        let count = self.exercises.len();
        if count == 0 {
            return None;
        }
        let index = order as usize % count;
        Some(SplitPosition {
            exercise_index: index,
            exercise: self.exercises[index].clone(),
            round: (order as usize / count) as u32 + 1,
        })
    }

    /// Number of split entries a complete session produces
    pub fn expected_split_count(&self) -> usize {
        self.exercises.len() * self.rounds.unwrap_or(1).max(1) as usize
    }

    /// Update the cached fastest time after a completed session.
    ///
    /// Returns true when the cache changed.
    pub fn record_completion(&mut self, duration_seconds: u32) -> bool {
        if duration_seconds == 0 {
            return false;
        }
        if self.fastest_time_seconds == 0 || duration_seconds < self.fastest_time_seconds {
            self.fastest_time_seconds = duration_seconds;
            return true;
        }
        false
    }
}

/// Time taken for one exercise/round position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitTime {
    /// Position in the session, see [`WorkoutDefinition::exercise_for_split`]
    pub order: u32,

    /// Split duration in seconds
    pub duration_seconds: u32,
}

/// Premium metrics cached on a session once computed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PremiumFields {
    pub intensity_score: Option<Decimal>,
    pub composite_score: Option<u8>,
    pub dominant_zone: Option<HeartRateZone>,
}

impl PremiumFields {
    /// True when all three fields have been computed
    pub fn is_complete(&self) -> bool {
        self.intensity_score.is_some() && self.composite_score.is_some() && self.dominant_zone.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.intensity_score.is_none() && self.composite_score.is_none() && self.dominant_zone.is_none()
    }
}

/// One completed execution of a workout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Unique identifier for the session
    pub id: String,

    /// Parent workout identifier
    pub workout_id: String,

    /// When the session finished
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_seconds: u32,

    /// Ordered split times
    #[serde(default)]
    pub splits: Vec<SplitTime>,

    /// Free-text notes
    #[serde(default)]
    pub notes: String,

    /// Lazily memoized premium metrics
    #[serde(default)]
    pub premium: PremiumFields,
}

impl SessionRecord {
    pub fn new(workout_id: impl Into<String>, completed_at: DateTime<Utc>, duration_seconds: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workout_id: workout_id.into(),
            completed_at,
            duration_seconds,
            splits: Vec::new(),
            notes: String::new(),
            premium: PremiumFields::default(),
        }
    }

    /// Builder-style split assignment, orders are renumbered positionally
    pub fn with_splits(mut self, durations: &[u32]) -> Self {
        self.splits = durations
            .iter()
            .enumerate()
            .map(|(order, &duration_seconds)| SplitTime {
                order: order as u32,
                duration_seconds,
            })
            .collect();
        self
    }

    pub fn duration_minutes(&self) -> Decimal {
        Decimal::from(self.duration_seconds) / Decimal::from(60)
    }

    /// Session window used to scope sensor queries
    pub fn window(&self) -> SessionWindow {
        SessionWindow {
            start: self.completed_at - Duration::seconds(i64::from(self.duration_seconds)),
            end: self.completed_at,
        }
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = notes.into();
    }

    /// Write computed premium fields back onto the record.
    ///
    /// Only fields that are present in `fields` overwrite the cache.
    /// Returns true when anything changed.
    pub fn memoize(&mut self, fields: &PremiumFields) -> bool {
        let before = self.premium.clone();
        if fields.intensity_score.is_some() {
            self.premium.intensity_score = fields.intensity_score;
        }
        if fields.composite_score.is_some() {
            self.premium.composite_score = fields.composite_score;
        }
        if fields.dominant_zone.is_some() {
            self.premium.dominant_zone = fields.dominant_zone;
        }
        before != self.premium
    }
}

/// Start/end timestamps of one completed workout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SessionWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.end - self.start).num_seconds().max(0)
    }
}

/// Five heart-rate intensity bands, by percentage of maximum heart rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HeartRateZone {
    Zone1,
    Zone2,
    Zone3,
    Zone4,
    Zone5,
}

impl HeartRateZone {
    pub const ALL: [HeartRateZone; 5] = [
        HeartRateZone::Zone1,
        HeartRateZone::Zone2,
        HeartRateZone::Zone3,
        HeartRateZone::Zone4,
        HeartRateZone::Zone5,
    ];

    pub fn number(&self) -> u8 {
        match self {
            HeartRateZone::Zone1 => 1,
            HeartRateZone::Zone2 => 2,
            HeartRateZone::Zone3 => 3,
            HeartRateZone::Zone4 => 4,
            HeartRateZone::Zone5 => 5,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(HeartRateZone::Zone1),
            2 => Some(HeartRateZone::Zone2),
            3 => Some(HeartRateZone::Zone3),
            4 => Some(HeartRateZone::Zone4),
            5 => Some(HeartRateZone::Zone5),
            _ => None,
        }
    }

    /// Effort label for the zone
    pub fn description(&self) -> &'static str {
        match self {
            HeartRateZone::Zone1 => "Very light",
            HeartRateZone::Zone2 => "Light",
            HeartRateZone::Zone3 => "Moderate",
            HeartRateZone::Zone4 => "Hard",
            HeartRateZone::Zone5 => "Maximum",
        }
    }
}

impl std::fmt::Display for HeartRateZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Zone {}", self.number())
    }
}

/// A single heart-rate reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartRateSample {
    pub timestamp: DateTime<Utc>,

    /// Beats per minute
    pub bpm: f64,
}

/// Seconds spent in each heart-rate zone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDistribution {
    pub seconds: BTreeMap<HeartRateZone, u64>,
}

impl ZoneDistribution {
    pub fn add(&mut self, zone: HeartRateZone, seconds: u64) {
        *self.seconds.entry(zone).or_insert(0) += seconds;
    }

    pub fn seconds_in(&self, zone: HeartRateZone) -> u64 {
        self.seconds.get(&zone).copied().unwrap_or(0)
    }

    pub fn total_seconds(&self) -> u64 {
        self.seconds.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_seconds() == 0
    }
}

/// Aggregated metrics for one query, recomputed on every call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsResult {
    pub total_sessions: usize,
    pub average_duration_minutes: Decimal,
    pub total_duration_minutes: Decimal,
    pub last_session_duration_minutes: Decimal,
    pub sessions_per_week: u32,
    pub fastest_time_seconds: u32,
    pub current_streak_days: u32,
    pub longest_streak_days: u32,
    pub split_times: Vec<SplitTime>,

    // Premium-only, None unless entitled and a workout+session was supplied
    pub intensity_score: Option<Decimal>,
    pub composite_score: Option<u8>,
    pub dominant_zone: Option<HeartRateZone>,
    pub zone_distribution: Option<ZoneDistribution>,
    pub resting_heart_rate: Option<f64>,
    pub maximum_heart_rate: Option<f64>,
    pub estimated_distance_km: Option<Decimal>,
}

impl MetricsResult {
    /// The subset of premium fields that gets memoized onto a session
    pub fn premium_fields(&self) -> PremiumFields {
        PremiumFields {
            intensity_score: self.intensity_score,
            composite_score: self.composite_score,
            dominant_zone: self.dominant_zone,
        }
    }

    pub fn has_premium(&self) -> bool {
        self.intensity_score.is_some()
            || self.composite_score.is_some()
            || self.dominant_zone.is_some()
            || self.zone_distribution.is_some()
            || self.resting_heart_rate.is_some()
            || self.maximum_heart_rate.is_some()
            || self.estimated_distance_km.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn circuit() -> WorkoutDefinition {
        WorkoutDefinition {
            id: "w1".to_string(),
            title: "Circuit".to_string(),
            exercises: vec!["Squat".to_string(), "Push-up".to_string(), "Plank".to_string()],
            category: Some(WorkoutCategory::Hiit),
            rounds: Some(2),
            fastest_time_seconds: 0,
        }
    }

    #[test]
    fn test_split_position_wraps_rounds() {
        let workout = circuit();

        let first = workout.exercise_for_split(0).unwrap();
        assert_eq!(first.exercise, "Squat");
        assert_eq!(first.round, 1);

        let fifth = workout.exercise_for_split(4).unwrap();
        assert_eq!(fifth.exercise_index, 1);
        assert_eq!(fifth.exercise, "Push-up");
        assert_eq!(fifth.round, 2);

        assert_eq!(workout.expected_split_count(), 6);
    }

    #[test]
    fn test_split_position_without_exercises() {
        let workout = WorkoutDefinition::new("Empty", Vec::new());
        assert!(workout.exercise_for_split(0).is_none());
    }

    #[test]
    fn test_record_completion_tracks_fastest() {
        let mut workout = circuit();
        assert!(workout.record_completion(900));
        assert_eq!(workout.fastest_time_seconds, 900);
        assert!(!workout.record_completion(1000));
        assert!(!workout.record_completion(900));
        assert!(workout.record_completion(850));
        assert_eq!(workout.fastest_time_seconds, 850);
        assert!(!workout.record_completion(0));
    }

    #[test]
    fn test_session_window() {
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        let session = SessionRecord::new("w1", end, 1800);
        let window = session.window();

        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap());
        assert_eq!(window.duration_seconds(), 1800);
        assert_eq!(session.duration_minutes(), dec!(30));
    }

    #[test]
    fn test_memoize_only_overwrites_present_fields() {
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        let mut session = SessionRecord::new("w1", end, 1800);

        let changed = session.memoize(&PremiumFields {
            intensity_score: Some(dec!(55.5)),
            composite_score: Some(70),
            dominant_zone: Some(HeartRateZone::Zone3),
        });
        assert!(changed);
        assert!(session.premium.is_complete());

        let changed = session.memoize(&PremiumFields {
            intensity_score: None,
            composite_score: Some(75),
            dominant_zone: None,
        });
        assert!(changed);
        assert_eq!(session.premium.intensity_score, Some(dec!(55.5)));
        assert_eq!(session.premium.composite_score, Some(75));

        assert!(!session.memoize(&PremiumFields::default()));
    }

    #[test]
    fn test_with_splits_orders_positionally() {
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        let session = SessionRecord::new("w1", end, 300).with_splits(&[60, 90, 150]);
        let orders: Vec<u32> = session.splits.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn test_zone_numbers_round_trip() {
        for zone in HeartRateZone::ALL {
            assert_eq!(HeartRateZone::from_number(zone.number()), Some(zone));
        }
        assert_eq!(HeartRateZone::from_number(0), None);
        assert_eq!(HeartRateZone::Zone4.to_string(), "Zone 4");
        assert_eq!(HeartRateZone::Zone4.description(), "Hard");
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(
            WorkoutCategory::Hiit.activity_type(),
            ActivityType::HighIntensityIntervalTraining
        );
        assert_eq!(WorkoutCategory::Hiit.display_name(), "HIIT");
        assert!(WorkoutCategory::ALL.iter().all(|c| !c.display_name().is_empty()));
    }

    #[test]
    fn test_default_result_has_no_premium() {
        let result = MetricsResult::default();
        assert_eq!(result.total_sessions, 0);
        assert!(!result.has_premium());
        assert!(result.premium_fields().is_empty());
    }
}
