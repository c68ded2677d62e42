//! Metrics engine: combines free-tier and premium-tier aggregation behind a
//! single query that always returns a value.

use chrono::{DateTime, FixedOffset, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

use crate::config::EngineConfig;
use crate::error::{MetricsError, Result};
use crate::free_tier::{FreeTierAggregator, FreeTierMetrics};
use crate::models::{MetricsResult, SessionRecord, WorkoutDefinition};
use crate::premium::{PremiumAggregator, PremiumMetrics};
use crate::providers::{EntitlementProvider, ErrorPresenter, SensorProvider, SessionStore};

pub const ERROR_TITLE: &str = "Error";

/// Source of "now" for weekly frequency
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub struct MetricsEngine {
    store: Arc<dyn SessionStore>,
    entitlement: Arc<dyn EntitlementProvider>,
    presenter: Arc<dyn ErrorPresenter>,
    clock: Arc<dyn Clock>,
    free_tier: FreeTierAggregator,
    premium: PremiumAggregator,
}

impl MetricsEngine {
    pub fn new(
        store: Arc<dyn SessionStore>,
        sensors: Arc<dyn SensorProvider>,
        entitlement: Arc<dyn EntitlementProvider>,
        presenter: Arc<dyn ErrorPresenter>,
        config: &EngineConfig,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| MetricsError::Configuration(e.to_string()))?;
        let offset: FixedOffset = config
            .timezone()
            .map_err(|e| MetricsError::Configuration(e.to_string()))?;

        Ok(MetricsEngine {
            store,
            entitlement,
            presenter,
            clock: Arc::new(SystemClock),
            free_tier: FreeTierAggregator::new(offset),
            premium: PremiumAggregator::new(sensors, config),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fetch metrics for an optional workout/session context.
    ///
    /// Never fails: a store failure is logged, presented once, and replaced
    /// by `MetricsResult::default()`. Premium fields are only computed for
    /// entitled users when both a workout and a session are supplied.
    #[instrument(skip_all, fields(
        workout_id = workout.map(|w| w.id.as_str()),
        session_id = session.map(|s| s.id.as_str()),
    ))]
    pub async fn fetch_metrics(
        &self,
        workout: Option<&WorkoutDefinition>,
        session: Option<&SessionRecord>,
    ) -> MetricsResult {
        let started = Instant::now();
        match self.try_fetch(workout, session).await {
            Ok(result) => {
                info!(
                    total_sessions = result.total_sessions,
                    premium = result.has_premium(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Metrics computed"
                );
                result
            }
            Err(e) => {
                e.log("Failed to fetch metrics");
                self.presenter.present(ERROR_TITLE, &e.user_message());
                MetricsResult::default()
            }
        }
    }

    async fn try_fetch(
        &self,
        workout: Option<&WorkoutDefinition>,
        session: Option<&SessionRecord>,
    ) -> Result<MetricsResult> {
        let records = self
            .store
            .fetch_sessions(workout.map(|w| w.id.as_str()))
            .await?;
        let now = self.clock.now();

        let free = async { self.free_tier.aggregate(&records, workout, session, now) };
        let premium = self.premium_if_entitled(&records, workout, session, now);
        let (free, premium): (FreeTierMetrics, PremiumMetrics) = tokio::join!(free, premium);

        let mut result = MetricsResult::default();
        free.apply_to(&mut result);
        premium.apply_to(&mut result);
        Ok(result)
    }

    async fn premium_if_entitled(
        &self,
        records: &[SessionRecord],
        workout: Option<&WorkoutDefinition>,
        session: Option<&SessionRecord>,
        now: DateTime<Utc>,
    ) -> PremiumMetrics {
        if workout.is_none() || session.is_none() {
            return PremiumMetrics::default();
        }
        if !self.entitlement.is_entitled().await {
            return PremiumMetrics::default();
        }
        let this_week = FreeTierAggregator::sessions_in_last_week(records, now);
        self.premium.compute(session, workout, this_week).await
    }

    /// Write a result's premium fields onto the session and persist them.
    ///
    /// Returns `Ok(false)` without touching the store when the result
    /// carries nothing new for this session.
    #[instrument(skip_all, fields(session_id = %session.id))]
    pub async fn memoize(&self, session: &mut SessionRecord, result: &MetricsResult) -> Result<bool> {
        let fields = result.premium_fields();
        if fields.is_empty() || !session.memoize(&fields) {
            return Ok(false);
        }
        self.store.save_premium_fields(&session.id, &fields).await?;
        info!("Memoized premium metrics");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{RecordedSensorProvider, SensorRecording, StaticEntitlement, TracingErrorPresenter};
    use crate::store::InMemorySessionStore;

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.weekly_target = 0;

        let engine = MetricsEngine::new(
            Arc::new(InMemorySessionStore::new()),
            Arc::new(RecordedSensorProvider::new(SensorRecording::default())),
            Arc::new(StaticEntitlement::new(true)),
            Arc::new(TracingErrorPresenter),
            &config,
        );
        assert!(matches!(engine, Err(MetricsError::Configuration(_))));
    }

    #[test]
    fn test_out_of_range_config_is_rejected_not_panicking() {
        let build = |config: &EngineConfig| {
            MetricsEngine::new(
                Arc::new(InMemorySessionStore::new()),
                Arc::new(RecordedSensorProvider::new(SensorRecording::default())),
                Arc::new(StaticEntitlement::new(true)),
                Arc::new(TracingErrorPresenter),
                config,
            )
        };

        let mut config = EngineConfig::default();
        config.composite.per_session = 1_000_000_000;
        config.weekly_target = 5;
        assert!(matches!(build(&config), Err(MetricsError::Configuration(_))));

        let mut config = EngineConfig::default();
        config.timezone_offset_minutes = 40_000_000;
        assert!(matches!(build(&config), Err(MetricsError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_empty_store_returns_defaults() {
        let engine = MetricsEngine::new(
            Arc::new(InMemorySessionStore::new()),
            Arc::new(RecordedSensorProvider::new(SensorRecording::default())),
            Arc::new(StaticEntitlement::new(true)),
            Arc::new(TracingErrorPresenter),
            &EngineConfig::default(),
        )
        .unwrap();

        let result = engine.fetch_metrics(None, None).await;
        assert_eq!(result, MetricsResult::default());
    }
}
