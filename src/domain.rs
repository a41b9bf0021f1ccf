use crate::error::{AppError, Result};
use serde::Deserialize;
use std::fmt;

/// Vegetation index is a synthetic proxy, never a sensor measurement.
/// All values are clamped into this range before use.
pub const VEGETATION_INDEX_MIN: f64 = 0.2;
pub const VEGETATION_INDEX_MAX: f64 = 0.85;

pub fn clamp_vegetation_index(value: f64) -> f64 {
    value.clamp(VEGETATION_INDEX_MIN, VEGETATION_INDEX_MAX)
}

/// Current indicator snapshot for a location. Built once per request and
/// immutable for the duration of scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub temperature: f64,
    pub rainfall: f64,
    pub humidity: Option<f64>,
    pub vegetation_index: f64,
}

impl Reading {
    /// Construct a reading, clamping out-of-range inputs at the boundary
    /// rather than rejecting them.
    pub fn new(temperature: f64, rainfall: f64, humidity: Option<f64>, vegetation_index: f64) -> Self {
        Self {
            temperature,
            rainfall: rainfall.max(0.0),
            humidity: humidity.map(|h| h.clamp(0.0, 100.0)),
            vegetation_index: clamp_vegetation_index(vegetation_index),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IrrigationLevel {
    Low,
    Medium,
    High,
}

impl IrrigationLevel {
    /// Lowercase name, matching the labels the irrigation model is fit on.
    pub fn as_str(&self) -> &'static str {
        match self {
            IrrigationLevel::Low => "low",
            IrrigationLevel::Medium => "medium",
            IrrigationLevel::High => "high",
        }
    }
}

impl fmt::Display for IrrigationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IrrigationLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(IrrigationLevel::Low),
            "medium" => Ok(IrrigationLevel::Medium),
            "high" => Ok(IrrigationLevel::High),
            other => Err(AppError::Parse(format!(
                "Unknown irrigation level '{}'",
                other
            ))),
        }
    }
}

/// One entry of the static crop table: a crop paired with its nominal
/// irrigation requirement.
#[derive(Debug, Clone, Deserialize)]
pub struct CropSpec {
    pub name: String,
    pub irrigation: IrrigationLevel,
}

/// The static crop / irrigation-level pairing the training set builder
/// depends on. Order matters: row i of the synthetic table is labeled with
/// entry i, so changing this table changes scoring behavior.
#[derive(Debug, Clone)]
pub struct CropTable {
    entries: Vec<CropSpec>,
}

impl CropTable {
    /// Build a table from explicit entries.
    ///
    /// Requires at least 2 entries with unique names; the scorer cannot fit
    /// a multi-class model on fewer.
    pub fn from_entries(entries: Vec<CropSpec>) -> Result<Self> {
        if entries.len() < 2 {
            return Err(AppError::Config(format!(
                "Crop table needs at least 2 entries, got {}",
                entries.len()
            )));
        }
        for (i, entry) in entries.iter().enumerate() {
            if entry.name.trim().is_empty() {
                return Err(AppError::Config(format!("Crop entry {} has an empty name", i)));
            }
            if entries[..i].iter().any(|e| e.name == entry.name) {
                return Err(AppError::Config(format!(
                    "Duplicate crop '{}' in crop table",
                    entry.name
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Default Moroccan crop table.
    pub fn morocco_default() -> Self {
        let entries = vec![
            ("wheat", IrrigationLevel::Low),
            ("olives", IrrigationLevel::Low),
            ("tomatoes", IrrigationLevel::High),
            ("citrus", IrrigationLevel::Medium),
            ("grapes", IrrigationLevel::Medium),
            ("almonds", IrrigationLevel::Low),
            ("vegetables", IrrigationLevel::High),
        ]
        .into_iter()
        .map(|(name, irrigation)| CropSpec {
            name: name.to_string(),
            irrigation,
        })
        .collect();

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CropSpec] {
        &self.entries
    }

    pub fn crop_name(&self, index: usize) -> &str {
        &self.entries[index].name
    }
}
