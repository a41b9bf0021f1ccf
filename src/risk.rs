use crate::config::RiskConfig;
use crate::domain::{Reading, VEGETATION_INDEX_MAX, VEGETATION_INDEX_MIN};
use std::fmt;

/// Human-readable agro-climate risk flag. Pure threshold checks over the
/// reading, no error paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskFlag {
    Drought,
    HeatStress,
    LowVegetation,
}

impl fmt::Display for RiskFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RiskFlag::Drought => "Drought risk",
            RiskFlag::HeatStress => "Heat stress risk",
            RiskFlag::LowVegetation => "Low vegetation health",
        };
        f.write_str(text)
    }
}

/// Thresholds the risk checks compare against.
#[derive(Debug, Clone, Copy)]
pub struct RiskThresholds {
    pub drought_rainfall_mm: f64,
    pub heat_stress_celsius: f64,
    pub low_vegetation_index: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            drought_rainfall_mm: 10.0,
            heat_stress_celsius: 32.0,
            low_vegetation_index: 0.35,
        }
    }
}

impl From<&RiskConfig> for RiskThresholds {
    fn from(config: &RiskConfig) -> Self {
        Self {
            drought_rainfall_mm: config.drought_rainfall_mm,
            heat_stress_celsius: config.heat_stress_celsius,
            low_vegetation_index: config.low_vegetation_index,
        }
    }
}

/// Evaluate all risk checks for a reading, in fixed order.
pub fn assess_risks(reading: &Reading, thresholds: &RiskThresholds) -> Vec<RiskFlag> {
    let mut flags = Vec::new();
    if reading.rainfall < thresholds.drought_rainfall_mm {
        flags.push(RiskFlag::Drought);
    }
    if reading.temperature > thresholds.heat_stress_celsius {
        flags.push(RiskFlag::HeatStress);
    }
    if reading.vegetation_index < thresholds.low_vegetation_index {
        flags.push(RiskFlag::LowVegetation);
    }
    flags
}

/// Rainfall at or above this counts as fully sufficient for the
/// sustainability index.
const SUSTAINABILITY_RAINFALL_CAP_MM: f64 = 40.0;
const VEGETATION_WEIGHT: f64 = 0.6;
const RAINFALL_WEIGHT: f64 = 0.4;

/// Sustainability index on a 0-10 scale: a fixed linear combination of the
/// normalized vegetation index and normalized rainfall. Bottoms out at a
/// clamped-to-minimum vegetation index with no rainfall.
pub fn sustainability_score(reading: &Reading) -> f64 {
    let vegetation = (reading.vegetation_index - VEGETATION_INDEX_MIN)
        / (VEGETATION_INDEX_MAX - VEGETATION_INDEX_MIN);
    let rainfall = (reading.rainfall / SUSTAINABILITY_RAINFALL_CAP_MM).min(1.0);
    let combined = VEGETATION_WEIGHT * vegetation.clamp(0.0, 1.0) + RAINFALL_WEIGHT * rainfall;
    combined * 10.0
}
