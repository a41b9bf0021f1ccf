use crate::config::WeatherConfig;
use crate::domain::{clamp_vegetation_index, Reading};
use crate::error::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Defaults substituted when the weather lookup fails. The pipeline always
/// proceeds with these, never with an error.
pub const DEFAULT_TEMPERATURE_C: f64 = 25.0;
pub const DEFAULT_HUMIDITY_PCT: f64 = 50.0;
pub const DEFAULT_RAINFALL_MM: f64 = 0.0;

const VEGETATION_INDEX_MEAN: f64 = 0.55;
const VEGETATION_INDEX_STDDEV: f64 = 0.1;

/// Supplies the current indicator snapshot for a location, either from the
/// weather API or from documented defaults when the lookup fails.
pub struct IndicatorSource {
    client: Client,
    weather_url: String,
    geocode_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    main: WeatherMain,
    #[serde(default)]
    rain: Option<RainVolume>,
}

#[derive(Debug, Deserialize)]
struct WeatherMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct RainVolume {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
    #[serde(rename = "3h")]
    three_hour: Option<f64>,
}

impl RainVolume {
    /// Hourly rainfall in mm: the 1h reading when present, otherwise a third
    /// of the 3h reading, otherwise zero.
    fn hourly_mm(&self) -> f64 {
        match (self.one_hour, self.three_hour) {
            (Some(mm), _) => mm,
            (None, Some(mm)) => mm / 3.0,
            (None, None) => 0.0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeocodePlace {
    name: String,
}

impl IndicatorSource {
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent("agrisense/0.1.0")
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            weather_url: config.api_base_url.trim_end_matches('/').to_string(),
            geocode_url: config.geocode_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Current reading for a location. Never fails: any transport or parse
    /// failure falls back to the default reading. The vegetation index is
    /// always sampled locally, it is a synthetic proxy with no upstream.
    pub async fn reading(&self, lat: f64, lon: f64, rng: &mut StdRng) -> Reading {
        let vegetation_index = sample_vegetation_index(rng);

        match self.fetch_weather(lat, lon).await {
            Ok((temperature, rainfall, humidity)) => {
                debug!(
                    "Weather for ({:.2}, {:.2}): {:.1}°C, {:.1}mm, {:.0}%",
                    lat, lon, temperature, rainfall, humidity
                );
                Reading::new(temperature, rainfall, Some(humidity), vegetation_index)
            }
            Err(e) => {
                warn!(
                    "Weather lookup for ({:.2}, {:.2}) failed, using default reading: {}",
                    lat, lon, e
                );
                Reading::new(
                    DEFAULT_TEMPERATURE_C,
                    DEFAULT_RAINFALL_MM,
                    Some(DEFAULT_HUMIDITY_PCT),
                    vegetation_index,
                )
            }
        }
    }

    /// Reverse geocode to a display name. Failure yields "Unknown" and never
    /// affects scoring.
    pub async fn place_name(&self, lat: f64, lon: f64) -> String {
        match self.fetch_place_name(lat, lon).await {
            Ok(Some(name)) => name,
            Ok(None) => {
                debug!("No reverse geocoding result for ({:.2}, {:.2})", lat, lon);
                "Unknown".to_string()
            }
            Err(e) => {
                warn!(
                    "Reverse geocoding for ({:.2}, {:.2}) failed: {}",
                    lat, lon, e
                );
                "Unknown".to_string()
            }
        }
    }

    async fn fetch_weather(&self, lat: f64, lon: f64) -> Result<(f64, f64, f64)> {
        let response = self
            .client
            .get(&self.weather_url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let weather: WeatherResponse = response.json().await?;
        let rainfall = weather.rain.map(|r| r.hourly_mm()).unwrap_or(0.0);

        Ok((weather.main.temp, rainfall, weather.main.humidity))
    }

    async fn fetch_place_name(&self, lat: f64, lon: f64) -> Result<Option<String>> {
        let response = self
            .client
            .get(&self.geocode_url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("limit", "1".to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let places: Vec<GeocodePlace> = response.json().await?;
        Ok(places.into_iter().next().map(|p| p.name))
    }
}

/// Sample the synthetic vegetation index: Normal(0.55, 0.1) clamped to the
/// valid range. This stands in for a vegetation-health signal, it is not a
/// measurement.
pub fn sample_vegetation_index(rng: &mut StdRng) -> f64 {
    // Box-Muller from two uniforms; the first is shifted off zero so the
    // logarithm stays finite.
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    clamp_vegetation_index(VEGETATION_INDEX_MEAN + VEGETATION_INDEX_STDDEV * z)
}

/// Deterministic local reading for offline use: indicators drawn from a
/// seed-keyed generator, so the same seed always yields the same reading.
pub fn simulated_reading(seed: u64) -> Reading {
    let mut rng = StdRng::seed_from_u64(seed);
    let temperature = rng.gen_range(10.0..35.0);
    let rainfall = rng.gen_range(0.0..50.0);
    let vegetation_index = sample_vegetation_index(&mut rng);
    Reading::new(temperature, rainfall, None, vegetation_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{VEGETATION_INDEX_MAX, VEGETATION_INDEX_MIN};

    #[test]
    fn test_rain_volume_prefers_one_hour() {
        let rain = RainVolume {
            one_hour: Some(2.4),
            three_hour: Some(9.0),
        };
        assert_eq!(rain.hourly_mm(), 2.4);
    }

    #[test]
    fn test_rain_volume_averages_three_hour() {
        let rain = RainVolume {
            one_hour: None,
            three_hour: Some(9.0),
        };
        assert_eq!(rain.hourly_mm(), 3.0);
    }

    #[test]
    fn test_rain_volume_empty_is_dry() {
        let rain = RainVolume {
            one_hour: None,
            three_hour: None,
        };
        assert_eq!(rain.hourly_mm(), 0.0);
    }

    #[test]
    fn test_weather_response_parses_rain_keys() {
        let json = r#"{"main":{"temp":21.5,"humidity":64},"rain":{"1h":0.8}}"#;
        let weather: WeatherResponse = serde_json::from_str(json).unwrap();
        assert_eq!(weather.main.temp, 21.5);
        assert_eq!(weather.rain.unwrap().hourly_mm(), 0.8);

        let json = r#"{"main":{"temp":21.5,"humidity":64}}"#;
        let weather: WeatherResponse = serde_json::from_str(json).unwrap();
        assert!(weather.rain.is_none());
    }

    #[test]
    fn test_vegetation_index_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let v = sample_vegetation_index(&mut rng);
            assert!((VEGETATION_INDEX_MIN..=VEGETATION_INDEX_MAX).contains(&v));
        }
    }

    #[test]
    fn test_simulated_reading_is_deterministic() {
        let a = simulated_reading(11);
        let b = simulated_reading(11);
        assert_eq!(a, b);

        let other = simulated_reading(12);
        assert_ne!(a, other);
    }

    #[test]
    fn test_simulated_reading_in_documented_ranges() {
        for seed in 0..50 {
            let r = simulated_reading(seed);
            assert!((10.0..35.0).contains(&r.temperature));
            assert!((0.0..50.0).contains(&r.rainfall));
            assert!((VEGETATION_INDEX_MIN..=VEGETATION_INDEX_MAX).contains(&r.vegetation_index));
        }
    }
}
