use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::WorkoutCategory;

/// Composite weights are points on a 0-100 scale
const MAX_COMPOSITE_WEIGHT: u32 = 100;
/// Two sessions a day
const MAX_WEEKLY_TARGET: u32 = 14;

/// Metrics engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Configuration metadata
    pub metadata: ConfigMetadata,

    /// Target sessions per week; caps the composite frequency bonus
    pub weekly_target: u32,

    /// UTC offset (minutes) used to decide calendar days for streaks
    pub timezone_offset_minutes: i32,

    /// Heart-rate zone boundaries
    pub zones: ZoneSettings,

    /// Composite score weights
    pub composite: CompositeWeights,

    /// Fixed-rate distance model
    pub distance: DistanceRates,
}

/// Configuration metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// Upper bounds (percent of max HR, exclusive) for zones 1-4; zone 5 is everything above
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSettings {
    pub zone1_max_pct: Decimal,
    pub zone2_max_pct: Decimal,
    pub zone3_max_pct: Decimal,
    pub zone4_max_pct: Decimal,
}

/// Point weights for the composite progress score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeWeights {
    pub base: u32,
    pub personal_best: u32,
    pub per_session: u32,
    pub zone_high: u32,
    pub zone_moderate: u32,
}

/// Average speed (km/h) assumed per category when estimating distance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceRates {
    pub rates: Vec<CategoryRate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRate {
    pub category: WorkoutCategory,
    pub km_per_hour: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let now = Utc::now();

        EngineConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            weekly_target: 3,
            timezone_offset_minutes: 0,
            zones: ZoneSettings::default(),
            composite: CompositeWeights::default(),
            distance: DistanceRates::default(),
        }
    }
}

impl Default for ZoneSettings {
    fn default() -> Self {
        ZoneSettings {
            zone1_max_pct: dec!(60),
            zone2_max_pct: dec!(70),
            zone3_max_pct: dec!(80),
            zone4_max_pct: dec!(90),
        }
    }
}

impl Default for CompositeWeights {
    fn default() -> Self {
        CompositeWeights {
            base: 50,
            personal_best: 15,
            per_session: 5,
            zone_high: 10,
            zone_moderate: 5,
        }
    }
}

impl Default for DistanceRates {
    fn default() -> Self {
        let rate = |category, km_per_hour| CategoryRate { category, km_per_hour };
        DistanceRates {
            rates: vec![
                rate(WorkoutCategory::Running, dec!(9.7)),
                rate(WorkoutCategory::Walking, dec!(5.0)),
                rate(WorkoutCategory::Cycling, dec!(20.0)),
                rate(WorkoutCategory::Swimming, dec!(2.5)),
            ],
        }
    }
}

impl DistanceRates {
    pub fn rate_for(&self, category: WorkoutCategory) -> Option<Decimal> {
        self.rates
            .iter()
            .find(|r| r.category == category)
            .map(|r| r.km_per_hour)
    }
}

impl CompositeWeights {
    /// Highest reachable score before clamping, for a given weekly target
    pub fn max_score(&self, weekly_target: u32) -> u32 {
        self.base
            .saturating_add(self.personal_best)
            .saturating_add(self.per_session.saturating_mul(weekly_target))
            .saturating_add(self.zone_high)
    }

    fn validate(&self) -> Result<()> {
        let weights = [
            ("base", self.base),
            ("personal_best", self.personal_best),
            ("per_session", self.per_session),
            ("zone_high", self.zone_high),
            ("zone_moderate", self.zone_moderate),
        ];
        if let Some((name, value)) = weights.iter().find(|(_, v)| *v > MAX_COMPOSITE_WEIGHT) {
            anyhow::bail!(
                "Composite weight {} = {} exceeds {}",
                name,
                value,
                MAX_COMPOSITE_WEIGHT
            );
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: EngineConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".fitmetrics")
            .join("config.toml")
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(path = %config_path.display(), error = %e, "Using default configuration");
                Self::default()
            }
        }
    }

    /// Check zone ordering, the weekly target, composite weights and the timezone offset
    pub fn validate(&self) -> Result<()> {
        let z = &self.zones;
        let bounds = [z.zone1_max_pct, z.zone2_max_pct, z.zone3_max_pct, z.zone4_max_pct];
        if bounds[0] <= Decimal::ZERO || bounds.windows(2).any(|w| w[0] >= w[1]) {
            anyhow::bail!("Zone boundaries must be positive and strictly ascending: {:?}", bounds);
        }
        if self.weekly_target == 0 || self.weekly_target > MAX_WEEKLY_TARGET {
            anyhow::bail!(
                "weekly_target must be between 1 and {}: {}",
                MAX_WEEKLY_TARGET,
                self.weekly_target
            );
        }
        self.composite.validate()?;
        self.timezone()?;
        Ok(())
    }

    /// Offset used to normalize timestamps to calendar days
    pub fn timezone(&self) -> Result<FixedOffset> {
        self.timezone_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .with_context(|| format!("Invalid timezone offset: {} minutes", self.timezone_offset_minutes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: EngineConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.metadata.version, deserialized.metadata.version);
        assert_eq!(config.zones, deserialized.zones);
        assert_eq!(config.distance, deserialized.distance);
    }

    #[test]
    fn test_default_max_score_is_ninety() {
        let config = EngineConfig::default();
        assert_eq!(config.composite.max_score(config.weekly_target), 90);
    }

    #[test]
    fn test_validation_rejects_unordered_zones() {
        let mut config = EngineConfig::default();
        config.zones.zone3_max_pct = dec!(65);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_bounds_composite_inputs() {
        let mut config = EngineConfig::default();
        config.composite.per_session = 1_000_000_000;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.weekly_target = 0;
        assert!(config.validate().is_err());
        config.weekly_target = 15;
        assert!(config.validate().is_err());
        config.weekly_target = 14;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_score_saturates() {
        let mut weights = CompositeWeights::default();
        weights.per_session = u32::MAX;
        assert_eq!(weights.max_score(u32::MAX), u32::MAX);
    }

    #[test]
    fn test_validation_rejects_bad_offset() {
        let mut config = EngineConfig::default();
        config.timezone_offset_minutes = 24 * 60;
        assert!(config.validate().is_err());

        config.timezone_offset_minutes = 40_000_000;
        assert!(config.validate().is_err());
        config.timezone_offset_minutes = i32::MIN;
        assert!(config.timezone().is_err());

        config.timezone_offset_minutes = -300;
        assert!(config.validate().is_ok());
        assert_eq!(config.timezone().unwrap().local_minus_utc(), -300 * 60);
    }

    #[test]
    fn test_config_file_io() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original = EngineConfig::default();
        original.weekly_target = 4;
        original.save_to_file(&config_path).unwrap();

        let loaded = EngineConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.weekly_target, 4);
        assert_eq!(loaded.distance.rate_for(WorkoutCategory::Cycling), Some(dec!(20.0)));
        assert_eq!(loaded.distance.rate_for(WorkoutCategory::Yoga), None);
    }
}
