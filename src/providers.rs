//! Collaborator seams for the metrics engine
//!
//! The engine only sees these traits. Platform adapters (health framework,
//! purchase framework, persistence) implement them outside this crate; the
//! implementations here cover fixtures, the CLI and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::{SensorError, StoreError};
use crate::models::{ActivityType, HeartRateSample, PremiumFields, SessionRecord, WorkoutDefinition};

/// Completed-workout persistence
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// All sessions, optionally for one workout, newest first
    async fn fetch_sessions(&self, workout_id: Option<&str>) -> Result<Vec<SessionRecord>, StoreError>;

    async fn fetch_workout(&self, workout_id: &str) -> Result<WorkoutDefinition, StoreError>;

    /// Persist memoized premium fields for one session
    async fn save_premium_fields(&self, session_id: &str, fields: &PremiumFields) -> Result<(), StoreError>;
}

/// Scalar quantities readable from the sensor provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityType {
    RestingHeartRate,
    MaximumHeartRate,
    BodyMass,
    Height,
}

impl QuantityType {
    pub fn name(&self) -> &'static str {
        match self {
            QuantityType::RestingHeartRate => "resting_heart_rate",
            QuantityType::MaximumHeartRate => "maximum_heart_rate",
            QuantityType::BodyMass => "body_mass",
            QuantityType::Height => "height",
        }
    }

    /// Unit a quantity is read in by default
    pub fn default_unit(&self) -> Unit {
        match self {
            QuantityType::RestingHeartRate | QuantityType::MaximumHeartRate => Unit::BeatsPerMinute,
            QuantityType::BodyMass => Unit::Kilograms,
            QuantityType::Height => Unit::Centimeters,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    BeatsPerMinute,
    Kilograms,
    Centimeters,
}

/// Energy/distance write issued by the session-logging flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutEnergySample {
    pub activity: ActivityType,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub energy_kcal: Option<f64>,
    pub distance_km: Option<f64>,
}

/// Physiological sensor data source
#[async_trait]
pub trait SensorProvider: Send + Sync {
    /// Latest reading for a quantity, `Ok(None)` when nothing is recorded
    async fn latest_quantity(&self, quantity: QuantityType, unit: Unit) -> Result<Option<f64>, SensorError>;

    /// Average heart rate over `[start, end]`
    async fn average_heart_rate(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<f64>, SensorError>;

    /// Heart-rate time series over `[start, end]`
    async fn heart_rate_samples(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HeartRateSample>, SensorError>;

    async fn save_workout(&self, sample: WorkoutEnergySample) -> Result<(), SensorError>;
}

/// Premium subscription status
#[async_trait]
pub trait EntitlementProvider: Send + Sync {
    async fn is_entitled(&self) -> bool;
}

/// User-facing alert sink
pub trait ErrorPresenter: Send + Sync {
    fn present(&self, title: &str, message: &str);
}

/// Entitlement fixed at construction, switchable at runtime
#[derive(Debug, Default)]
pub struct StaticEntitlement {
    entitled: AtomicBool,
}

impl StaticEntitlement {
    pub fn new(entitled: bool) -> Self {
        Self {
            entitled: AtomicBool::new(entitled),
        }
    }

    pub fn set(&self, entitled: bool) {
        self.entitled.store(entitled, Ordering::SeqCst);
    }
}

#[async_trait]
impl EntitlementProvider for StaticEntitlement {
    async fn is_entitled(&self) -> bool {
        self.entitled.load(Ordering::SeqCst)
    }
}

/// Presents errors by logging them
#[derive(Debug, Default)]
pub struct TracingErrorPresenter;

impl ErrorPresenter for TracingErrorPresenter {
    fn present(&self, title: &str, message: &str) {
        tracing::error!(title, message, "Presenting error to user");
    }
}

/// Serializable sensor snapshot, used by the CLI and tests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorRecording {
    #[serde(default)]
    pub quantities: HashMap<QuantityType, f64>,

    #[serde(default)]
    pub heart_rate: Vec<HeartRateSample>,
}

/// Sensor provider backed by a [`SensorRecording`]
///
/// Averages are computed from the recorded stream. Individual queries can be
/// forced to fail to exercise degraded paths.
#[derive(Debug, Default)]
pub struct RecordedSensorProvider {
    recording: SensorRecording,
    failures: HashMap<&'static str, SensorError>,
    saved: Mutex<Vec<WorkoutEnergySample>>,
}

impl RecordedSensorProvider {
    pub fn new(recording: SensorRecording) -> Self {
        Self {
            recording,
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Make every query for `data_type` fail ("average_heart_rate",
    /// "heart_rate_samples" or a [`QuantityType::name`])
    pub fn failing(mut self, data_type: &'static str, error: SensorError) -> Self {
        self.failures.insert(data_type, error);
        self
    }

    pub fn saved_workouts(&self) -> Vec<WorkoutEnergySample> {
        self.saved.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn check(&self, data_type: &str) -> Result<(), SensorError> {
        match self.failures.get(data_type) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn samples_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<HeartRateSample> {
        self.recording
            .heart_rate
            .iter()
            .filter(|s| s.timestamp >= start && s.timestamp <= end)
            .copied()
            .collect()
    }
}

#[async_trait]
impl SensorProvider for RecordedSensorProvider {
    async fn latest_quantity(&self, quantity: QuantityType, unit: Unit) -> Result<Option<f64>, SensorError> {
        self.check(quantity.name())?;
        if unit != quantity.default_unit() {
            return Err(SensorError::UnsupportedType {
                data_type: format!("{} in {:?}", quantity.name(), unit),
            });
        }
        Ok(self.recording.quantities.get(&quantity).copied())
    }

    async fn average_heart_rate(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<f64>, SensorError> {
        self.check("average_heart_rate")?;
        let samples = self.samples_between(start, end);
        if samples.is_empty() {
            return Ok(None);
        }
        Ok(Some(samples.iter().map(|s| s.bpm).sum::<f64>() / samples.len() as f64))
    }

    async fn heart_rate_samples(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HeartRateSample>, SensorError> {
        self.check("heart_rate_samples")?;
        Ok(self.samples_between(start, end))
    }

    async fn save_workout(&self, sample: WorkoutEnergySample) -> Result<(), SensorError> {
        self.check("save_workout")?;
        let mut saved = self.saved.lock().map_err(|_| SensorError::QueryFailed {
            reason: "recording lock poisoned".to_string(),
        })?;
        saved.push(sample);
        Ok(())
    }
}
