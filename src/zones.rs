use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::config::ZoneSettings;
use crate::models::{HeartRateSample, HeartRateZone, SessionWindow, ZoneDistribution};

/// Heart-rate zone classification and time-in-zone accounting
pub struct ZoneCalculator {
    settings: ZoneSettings,
}

impl ZoneCalculator {
    pub fn new() -> Self {
        Self::with_settings(ZoneSettings::default())
    }

    pub fn with_settings(settings: ZoneSettings) -> Self {
        ZoneCalculator { settings }
    }

    /// Determine which zone a heart rate falls into, by percentage of max HR
    ///
    /// Default boundaries:
    /// - Z1: < 60%
    /// - Z2: 60-70%
    /// - Z3: 70-80%
    /// - Z4: 80-90%
    /// - Z5: >= 90%
    ///
    /// Returns `None` when `max_hr` is not positive or either value is not finite.
    pub fn classify(&self, bpm: f64, max_hr: f64) -> Option<HeartRateZone> {
        if max_hr <= 0.0 {
            return None;
        }
        let pct = Decimal::from_f64(bpm / max_hr * 100.0)?;
        let s = &self.settings;

        let zone = if pct < s.zone1_max_pct {
            HeartRateZone::Zone1
        } else if pct < s.zone2_max_pct {
            HeartRateZone::Zone2
        } else if pct < s.zone3_max_pct {
            HeartRateZone::Zone3
        } else if pct < s.zone4_max_pct {
            HeartRateZone::Zone4
        } else {
            HeartRateZone::Zone5
        };
        Some(zone)
    }

    /// Accumulate time spent per zone over a session window.
    ///
    /// Step function: a sample's zone holds from its timestamp until the
    /// next sample, the last one until window end. The stretch between
    /// window start and the first sample belongs to the first sample, so a
    /// stream with any classifiable sample accounts for the whole window.
    /// Out-of-window and unclassifiable samples are dropped.
    pub fn distribution(
        &self,
        samples: &[HeartRateSample],
        window: &SessionWindow,
        max_hr: f64,
    ) -> ZoneDistribution {
        let mut steps: Vec<(DateTime<Utc>, HeartRateZone)> = samples
            .iter()
            .filter(|s| window.contains(s.timestamp))
            .filter_map(|s| Some((s.timestamp, self.classify(s.bpm, max_hr)?)))
            .collect();
        steps.sort_by_key(|(timestamp, _)| *timestamp);

        let mut distribution = ZoneDistribution::default();
        for (i, &(timestamp, zone)) in steps.iter().enumerate() {
            let from = if i == 0 { window.start } else { timestamp };
            let until = steps.get(i + 1).map(|(next, _)| *next).unwrap_or(window.end);
            let seconds = (until - from).num_seconds().max(0) as u64;
            distribution.add(zone, seconds);
        }
        distribution
    }

    /// Zone with the most accumulated time; ties go to the lowest zone
    pub fn dominant(distribution: &ZoneDistribution) -> Option<HeartRateZone> {
        let mut best: Option<(HeartRateZone, u64)> = None;
        // BTreeMap iterates Zone1..Zone5, strict > keeps the lower zone on ties
        for (&zone, &seconds) in &distribution.seconds {
            if seconds == 0 {
                continue;
            }
            match best {
                Some((_, top)) if seconds <= top => {}
                _ => best = Some((zone, seconds)),
            }
        }
        best.map(|(zone, _)| zone)
    }
}

impl Default for ZoneCalculator {
    fn default() -> Self {
        Self::new()
    }
}
