//! Water parameter trend analysis

use super::models::{ParameterKind, ParameterReading, WaterType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Relative change (percent) inside which a parameter counts as stable
pub const STABLE_BAND_PERCENT: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
    InsufficientData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeStatus {
    Low,
    Ideal,
    High,
}

/// Inclusive ideal range for a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdealRange {
    pub min: f64,
    pub max: f64,
}

impl IdealRange {
    const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn classify(&self, value: f64) -> RangeStatus {
        if value < self.min {
            RangeStatus::Low
        } else if value > self.max {
            RangeStatus::High
        } else {
            RangeStatus::Ideal
        }
    }
}

/// Ideal ranges for community freshwater and reef saltwater tanks
pub fn ideal_range(water_type: WaterType, kind: ParameterKind) -> IdealRange {
    use ParameterKind::*;
    match (water_type, kind) {
        (WaterType::Freshwater, Temperature) => IdealRange::new(22.0, 28.0),
        (WaterType::Freshwater, Ph) => IdealRange::new(6.5, 7.8),
        (WaterType::Freshwater, Ammonia) => IdealRange::new(0.0, 0.25),
        (WaterType::Freshwater, Nitrite) => IdealRange::new(0.0, 0.25),
        (WaterType::Freshwater, Nitrate) => IdealRange::new(0.0, 40.0),
        (WaterType::Freshwater, Phosphate) => IdealRange::new(0.0, 1.0),
        (WaterType::Freshwater, Kh) => IdealRange::new(3.0, 8.0),
        (WaterType::Saltwater, Temperature) => IdealRange::new(24.0, 27.0),
        (WaterType::Saltwater, Ph) => IdealRange::new(7.9, 8.4),
        (WaterType::Saltwater, Ammonia) => IdealRange::new(0.0, 0.1),
        (WaterType::Saltwater, Nitrite) => IdealRange::new(0.0, 0.1),
        (WaterType::Saltwater, Nitrate) => IdealRange::new(1.0, 20.0),
        (WaterType::Saltwater, Phosphate) => IdealRange::new(0.03, 0.1),
        (WaterType::Saltwater, Kh) => IdealRange::new(7.0, 11.0),
    }
}

/// Trend summary for one parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterTrend {
    pub kind: ParameterKind,
    pub latest: f64,
    pub direction: TrendDirection,
    /// Change of the latest reading against the mean of earlier ones
    pub change_percent: Option<f64>,
    pub status: RangeStatus,
    pub sample_count: usize,
}

/// Analyze readings per parameter, ordered by parameter kind.
///
/// The latest reading is compared with the mean of all earlier readings of
/// the same parameter. A zero baseline has no relative change: any non-zero
/// latest value counts as rising.
pub fn analyze_trends(water_type: WaterType, readings: &[ParameterReading]) -> Vec<ParameterTrend> {
    let mut grouped: BTreeMap<ParameterKind, Vec<&ParameterReading>> = BTreeMap::new();
    for reading in readings {
        grouped.entry(reading.kind).or_default().push(reading);
    }

    grouped
        .into_iter()
        .filter_map(|(kind, mut series)| {
            series.sort_by_key(|r| r.recorded_at);
            let (latest, earlier) = series.split_last()?;
            let (direction, change_percent) = direction_of(latest.value, earlier);

            Some(ParameterTrend {
                kind,
                latest: latest.value,
                direction,
                change_percent,
                status: ideal_range(water_type, kind).classify(latest.value),
                sample_count: series.len(),
            })
        })
        .collect()
}

fn direction_of(latest: f64, earlier: &[&ParameterReading]) -> (TrendDirection, Option<f64>) {
    if earlier.is_empty() {
        return (TrendDirection::InsufficientData, None);
    }

    let baseline = earlier.iter().map(|r| r.value).sum::<f64>() / earlier.len() as f64;
    if baseline == 0.0 {
        let direction = if latest > 0.0 {
            TrendDirection::Rising
        } else {
            TrendDirection::Stable
        };
        return (direction, None);
    }

    let change = (latest - baseline) / baseline.abs() * 100.0;
    let direction = if change.abs() < STABLE_BAND_PERCENT {
        TrendDirection::Stable
    } else if change > 0.0 {
        TrendDirection::Rising
    } else {
        TrendDirection::Falling
    };
    (direction, Some(change))
}
