use crate::domain::{CropSpec, CropTable};
use crate::error::{AppError, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub weather: WeatherConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    /// Optional crop table override. Empty means the built-in Moroccan table.
    #[serde(default)]
    pub crops: Vec<CropSpec>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeatherConfig {
    pub api_base_url: String,
    pub geocode_base_url: String,
    pub api_key: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScoringConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_trees")]
    pub trees: usize,
    #[serde(default = "default_temperature_spread")]
    pub temperature_spread: f64,
    #[serde(default = "default_rainfall_spread")]
    pub rainfall_spread: f64,
    #[serde(default = "default_vegetation_spread")]
    pub vegetation_spread: f64,
}

fn default_seed() -> u64 {
    42
}

fn default_trees() -> usize {
    100
}

fn default_temperature_spread() -> f64 {
    3.0
}

fn default_rainfall_spread() -> f64 {
    10.0
}

fn default_vegetation_spread() -> f64 {
    0.05
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            trees: default_trees(),
            temperature_spread: default_temperature_spread(),
            rainfall_spread: default_rainfall_spread(),
            vegetation_spread: default_vegetation_spread(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RiskConfig {
    #[serde(default = "default_drought_rainfall_mm")]
    pub drought_rainfall_mm: f64,
    #[serde(default = "default_heat_stress_celsius")]
    pub heat_stress_celsius: f64,
    #[serde(default = "default_low_vegetation_index")]
    pub low_vegetation_index: f64,
}

fn default_drought_rainfall_mm() -> f64 {
    10.0
}

fn default_heat_stress_celsius() -> f64 {
    32.0
}

fn default_low_vegetation_index() -> f64 {
    0.35
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            drought_rainfall_mm: default_drought_rainfall_mm(),
            heat_stress_celsius: default_heat_stress_celsius(),
            low_vegetation_index: default_low_vegetation_index(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;

        // Substitute environment variables
        let expanded = expand_env_vars(&content)?;

        let config: Config = serde_yaml::from_str(&expanded)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Resolve the crop table: the configured override if present, otherwise
    /// the built-in Moroccan table.
    pub fn crop_table(&self) -> Result<CropTable> {
        if self.crops.is_empty() {
            Ok(CropTable::morocco_default())
        } else {
            CropTable::from_entries(self.crops.clone())
        }
    }

    /// Validate configuration values
    ///
    /// Checks for:
    /// - Unexpanded environment variables
    /// - Valid URL formats
    /// - Positive timeouts, tree counts, and field spreads
    fn validate(&self) -> Result<()> {
        if self.weather.api_key.contains("${") {
            return Err(AppError::Config(
                "OPENWEATHER_API_KEY environment variable is not set. \
                 Please set it or create a .env file. \
                 See .env.example for required variables."
                    .to_string(),
            ));
        }

        if self.weather.api_key.is_empty() {
            return Err(AppError::Config("Weather API key cannot be empty".to_string()));
        }

        for (name, value) in [
            ("api_base_url", &self.weather.api_base_url),
            ("geocode_base_url", &self.weather.geocode_base_url),
        ] {
            let parsed = url::Url::parse(value)
                .map_err(|e| AppError::Config(format!("Invalid weather {} '{}': {}", name, value, e)))?;
            if parsed.scheme() != "https" && parsed.scheme() != "http" {
                return Err(AppError::Config(format!(
                    "Weather {} must use HTTP or HTTPS, got: {}",
                    name,
                    parsed.scheme()
                )));
            }
        }

        if self.weather.timeout_seconds == 0 {
            return Err(AppError::Config(
                "Weather timeout_seconds must be greater than 0".to_string(),
            ));
        }

        // A slow lookup should fall back, not stall the whole request
        if self.weather.timeout_seconds > 30 {
            tracing::warn!(
                "Weather timeout of {}s is very long, consider 5s or less",
                self.weather.timeout_seconds
            );
        }

        if self.scoring.trees == 0 {
            return Err(AppError::Config(
                "Scoring trees must be at least 1".to_string(),
            ));
        }

        if self.scoring.trees > 1000 {
            return Err(AppError::Config(format!(
                "Scoring trees {} seems too high, maximum recommended is 1000",
                self.scoring.trees
            )));
        }

        for (name, value) in [
            ("temperature_spread", self.scoring.temperature_spread),
            ("rainfall_spread", self.scoring.rainfall_spread),
            ("vegetation_spread", self.scoring.vegetation_spread),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(AppError::Config(format!(
                    "Scoring {} must be a positive number, got {}",
                    name, value
                )));
            }
        }

        // Delegates entry-level checks (duplicates, minimum size)
        self.crop_table()?;

        Ok(())
    }
}

fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}").unwrap();

    let mut missing_vars = Vec::new();

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(value) => {
                result = result.replace(&cap[0], &value);
            }
            Err(_) => {
                missing_vars.push(var_name.to_string());
            }
        }
    }

    if !missing_vars.is_empty() {
        return Err(AppError::Config(format!(
            "Missing required environment variable{}: {}\n\n\
             To fix this:\n\
             1. Create a .env file in the project root (copy .env.example)\n\
             2. Set the missing variable{}: export {}=<value>\n\
             3. Or set {} in your environment before running",
            if missing_vars.len() > 1 { "s" } else { "" },
            missing_vars.join(", "),
            if missing_vars.len() > 1 { "s" } else { "" },
            missing_vars[0],
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}
