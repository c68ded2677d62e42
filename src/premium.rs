use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::config::{CompositeWeights, DistanceRates, EngineConfig};
use crate::error::{MetricsError, SensorError};
use crate::models::{HeartRateZone, MetricsResult, PremiumFields, SessionRecord, WorkoutDefinition, ZoneDistribution};
use crate::providers::{QuantityType, SensorProvider};
use crate::zones::ZoneCalculator;

/// Sensor-derived metrics for one session; every field degrades to `None` independently
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PremiumMetrics {
    pub intensity_score: Option<Decimal>,
    pub composite_score: Option<u8>,
    pub dominant_zone: Option<HeartRateZone>,
    pub zone_distribution: Option<ZoneDistribution>,
    pub resting_heart_rate: Option<f64>,
    pub maximum_heart_rate: Option<f64>,
    pub estimated_distance_km: Option<Decimal>,
}

impl PremiumMetrics {
    pub fn apply_to(self, result: &mut MetricsResult) {
        result.intensity_score = self.intensity_score;
        result.composite_score = self.composite_score;
        result.dominant_zone = self.dominant_zone;
        result.zone_distribution = self.zone_distribution;
        result.resting_heart_rate = self.resting_heart_rate;
        result.maximum_heart_rate = self.maximum_heart_rate;
        result.estimated_distance_km = self.estimated_distance_km;
    }

    pub fn fields(&self) -> PremiumFields {
        PremiumFields {
            intensity_score: self.intensity_score,
            composite_score: self.composite_score,
            dominant_zone: self.dominant_zone,
        }
    }
}

/// Inputs to the composite progress score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeInputs {
    /// Session matched or beat the cached fastest time
    pub personal_best: bool,
    pub sessions_this_week: u32,
    pub dominant_zone: Option<HeartRateZone>,
}

/// Composite progress score, clamped to [0, 100].
///
/// base + personal best bonus + per-session bonus (capped at the weekly
/// target) + zone bonus (zone 4-5 high, zone 3 moderate).
pub fn compose_score(inputs: &CompositeInputs, weights: &CompositeWeights, weekly_target: u32) -> u8 {
    let mut score = weights.base;
    if inputs.personal_best {
        score = score.saturating_add(weights.personal_best);
    }
    score = score.saturating_add(
        weights
            .per_session
            .saturating_mul(inputs.sessions_this_week.min(weekly_target)),
    );
    score = score.saturating_add(match inputs.dominant_zone.map(|z| z.number()) {
        Some(n) if n >= 4 => weights.zone_high,
        Some(3) => weights.zone_moderate,
        _ => 0,
    });
    score.min(100) as u8
}

/// Heart-rate reserve intensity: (avg - rest) / (max - rest) * 100, clamped to [0, 100].
///
/// `None` when the reserve is not positive or a value is not finite.
pub fn intensity_score(average_hr: f64, resting_hr: f64, max_hr: f64) -> Option<Decimal> {
    let reserve = max_hr - resting_hr;
    if reserve <= 0.0 {
        return None;
    }
    let raw = Decimal::from_f64((average_hr - resting_hr) / reserve * 100.0)?;
    Some(raw.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED).round_dp(2))
}

/// Fixed-rate distance estimate for a session
pub fn estimate_distance_km(
    workout: &WorkoutDefinition,
    duration_seconds: u32,
    rates: &DistanceRates,
) -> Option<Decimal> {
    let rate = rates.rate_for(workout.category?)?;
    let hours = Decimal::from(duration_seconds) / Decimal::from(3600);
    Some((rate * hours).round_dp(2))
}

/// Computes sensor-backed metrics for a single session
pub struct PremiumAggregator {
    sensors: Arc<dyn SensorProvider>,
    zones: ZoneCalculator,
    weights: CompositeWeights,
    distance: DistanceRates,
    weekly_target: u32,
}

impl PremiumAggregator {
    pub fn new(sensors: Arc<dyn SensorProvider>, config: &EngineConfig) -> Self {
        PremiumAggregator {
            sensors,
            zones: ZoneCalculator::with_settings(config.zones.clone()),
            weights: config.composite.clone(),
            distance: config.distance.clone(),
            weekly_target: config.weekly_target,
        }
    }

    /// Compute premium metrics for `session`.
    ///
    /// Without both a session and its workout this returns an all-`None`
    /// result without querying any sensor. Each sensor failure only clears
    /// the fields that depend on it.
    pub async fn compute(
        &self,
        session: Option<&SessionRecord>,
        workout: Option<&WorkoutDefinition>,
        sessions_this_week: u32,
    ) -> PremiumMetrics {
        let (Some(session), Some(workout)) = (session, workout) else {
            debug!("No session context, skipping premium metrics");
            return PremiumMetrics::default();
        };

        let window = session.window();
        let (resting, maximum) = tokio::join!(
            self.quantity(QuantityType::RestingHeartRate),
            self.quantity(QuantityType::MaximumHeartRate),
        );

        let cached = &session.premium;
        let intensity = match cached.intensity_score {
            Some(score) => Some(score),
            None => match (resting, maximum) {
                (Some(rest), Some(max)) => self
                    .average_heart_rate(session)
                    .await
                    .and_then(|avg| intensity_score(avg, rest, max)),
                _ => None,
            },
        };

        let zone_distribution = match maximum {
            Some(max) => self.zone_distribution(session, max).await,
            None => None,
        };
        let dominant_zone = cached
            .dominant_zone
            .or_else(|| zone_distribution.as_ref().and_then(ZoneCalculator::dominant));

        let composite_score = cached.composite_score.or_else(|| {
            let inputs = CompositeInputs {
                personal_best: workout.fastest_time_seconds > 0
                    && session.duration_seconds <= workout.fastest_time_seconds,
                sessions_this_week,
                dominant_zone,
            };
            Some(compose_score(&inputs, &self.weights, self.weekly_target))
        });

        debug!(
            session_id = %session.id,
            window_start = %window.start,
            window_end = %window.end,
            ?intensity,
            ?dominant_zone,
            ?composite_score,
            "Computed premium metrics"
        );

        PremiumMetrics {
            intensity_score: intensity,
            composite_score,
            dominant_zone,
            zone_distribution,
            resting_heart_rate: resting,
            maximum_heart_rate: maximum,
            estimated_distance_km: estimate_distance_km(workout, session.duration_seconds, &self.distance),
        }
    }

    async fn quantity(&self, quantity: QuantityType) -> Option<f64> {
        let reading = self.sensors.latest_quantity(quantity, quantity.default_unit()).await;
        degrade(quantity.name(), reading).flatten()
    }

    async fn average_heart_rate(&self, session: &SessionRecord) -> Option<f64> {
        let window = session.window();
        let reading = self.sensors.average_heart_rate(window.start, window.end).await;
        degrade("average_heart_rate", reading).flatten()
    }

    async fn zone_distribution(&self, session: &SessionRecord, max_hr: f64) -> Option<ZoneDistribution> {
        let window = session.window();
        let samples = self.sensors.heart_rate_samples(window.start, window.end).await;
        let samples = degrade("heart_rate_samples", samples)?;
        let distribution = self.zones.distribution(&samples, &window, max_hr);
        (!distribution.is_empty()).then_some(distribution)
    }
}

fn degrade<T>(query: &str, result: Result<T, SensorError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            MetricsError::from(e).log(&format!("Sensor query {} failed, field unavailable", query));
            None
        }
    }
}
