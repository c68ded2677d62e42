// Library interface for the fitmetrics engine
// The CLI and integration tests build on these modules

pub mod config;
pub mod engine;
pub mod error;
pub mod free_tier;
pub mod logging;
pub mod models;
pub mod premium;
pub mod providers;
pub mod store;
pub mod streaks;
pub mod zones;

// Re-export commonly used types for convenience
pub use models::*;
pub use config::EngineConfig;
pub use engine::{Clock, FixedClock, MetricsEngine, SystemClock};
pub use error::{MetricsError, Result, SensorError, StoreError};
pub use free_tier::{FreeTierAggregator, FreeTierMetrics};
pub use premium::{compose_score, intensity_score, CompositeInputs, PremiumAggregator, PremiumMetrics};
pub use providers::{EntitlementProvider, ErrorPresenter, SensorProvider, SessionStore};
pub use streaks::{calculate_streaks, Streaks};
pub use zones::ZoneCalculator;
pub use logging::{LogConfig, LogFormat, LogLevel};
