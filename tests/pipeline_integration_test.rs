use agrisense::config::{Config, RiskConfig, ScoringConfig, WeatherConfig};
use agrisense::domain::{CropSpec, IrrigationLevel, Reading};
use agrisense::error::AppError;
use agrisense::pipeline::Pipeline;
use agrisense::report;
use agrisense::risk::RiskFlag;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn offline_config() -> Config {
    // Valid URLs that never get contacted by rescore/assess_reading
    Config {
        weather: WeatherConfig {
            api_base_url: "https://api.openweathermap.org/data/2.5/weather".to_string(),
            geocode_base_url: "https://api.openweathermap.org/geo/1.0/reverse".to_string(),
            api_key: "test-key".to_string(),
            timeout_seconds: 1,
        },
        scoring: ScoringConfig::default(),
        risk: RiskConfig::default(),
        crops: Vec::new(),
    }
}

fn mock_config(server: &MockServer) -> Config {
    let mut config = offline_config();
    config.weather.api_base_url = format!("{}/weather", server.uri());
    config.weather.geocode_base_url = format!("{}/geocode", server.uri());
    config
}

/// Full pass over a mocked weather service: fetch, build, fit-and-score,
/// annotate, render.
#[tokio::test]
async fn test_full_assessment_over_mock_weather() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"main":{"temp":30.0,"humidity":40}}"#),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/geocode"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"name":"Agadir"}]"#))
        .mount(&mock_server)
        .await;

    let mut pipeline = Pipeline::new(&mock_config(&mock_server)).unwrap();
    let assessment = pipeline.assess(30.42, -9.6).await.unwrap();

    assert_eq!(assessment.place, "Agadir");
    assert_eq!(assessment.reading.temperature, 30.0);
    assert_eq!(assessment.reading.rainfall, 0.0);

    // Zero rainfall raises the drought flag
    assert!(assessment.risks.contains(&RiskFlag::Drought));

    // One probability per crop, summing to 1
    assert_eq!(
        assessment.suitability.probabilities.len(),
        pipeline.crop_table().len()
    );
    let total: f64 = assessment
        .suitability
        .probabilities
        .iter()
        .map(|p| p.probability)
        .sum();
    assert!((total - 1.0).abs() < 1e-6);

    let text = report::render(&assessment);
    assert!(text.contains("Region: Agadir"));
    assert!(text.contains("Temperature: 30.0 °C"));
}

/// An unreachable weather service still yields a complete assessment from
/// the default reading; the failure never surfaces.
#[tokio::test]
async fn test_assessment_completes_without_weather_service() {
    let mock_server = MockServer::start().await;
    // No mocks mounted: every request 404s

    let mut pipeline = Pipeline::new(&mock_config(&mock_server)).unwrap();
    let assessment = pipeline.assess(31.63, -7.98).await.unwrap();

    assert_eq!(assessment.place, "Unknown");
    assert_eq!(assessment.reading.temperature, 25.0);
    assert_eq!(assessment.reading.humidity, Some(50.0));
    assert!(!assessment.suitability.crop.is_empty());
}

/// Probabilities are reported against the stable lexicographic crop
/// ordering.
#[test]
fn test_probabilities_in_lexicographic_order() {
    let pipeline = Pipeline::new(&offline_config()).unwrap();
    let result = pipeline
        .rescore(&Reading::new(25.0, 30.0, Some(50.0), 0.55))
        .unwrap();

    let names: Vec<&str> = result.probabilities.iter().map(|p| p.crop.as_str()).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}

/// Scenario: hot and rainfall-scarce. Drought is flagged and the suggested
/// irrigation is not the low tier.
#[test]
fn test_low_rainfall_scenario() {
    let pipeline = Pipeline::new(&offline_config()).unwrap();
    let reading = Reading::new(30.0, 2.0, Some(40.0), 0.6);

    let assessment = pipeline
        .assess_reading("Souss-Massa".to_string(), 30.4, -9.1, reading)
        .unwrap();

    assert!(assessment.risks.contains(&RiskFlag::Drought));
    assert_ne!(assessment.suitability.irrigation, IrrigationLevel::Low);

    let total: f64 = assessment
        .suitability
        .probabilities
        .iter()
        .map(|p| p.probability)
        .sum();
    assert!((total - 1.0).abs() < 1e-6);
}

/// Scenario: extreme heat, no rainfall, floor vegetation index. Every flag
/// raises and the sustainability index bottoms out.
#[test]
fn test_stress_scenario_minimum_sustainability() {
    let pipeline = Pipeline::new(&offline_config()).unwrap();
    let reading = Reading::new(34.0, 0.0, None, 0.2);

    let assessment = pipeline
        .assess_reading("Draa-Tafilalet".to_string(), 30.3, -5.8, reading)
        .unwrap();

    assert!(assessment.risks.contains(&RiskFlag::Drought));
    assert!(assessment.risks.contains(&RiskFlag::HeatStress));
    assert!(assessment.risks.contains(&RiskFlag::LowVegetation));
    assert!(assessment.sustainability < 1e-9);
}

/// Two independent pipelines with the same seed agree bit-for-bit.
#[test]
fn test_independent_runs_identical() {
    let reading = Reading::new(30.0, 2.0, Some(40.0), 0.6);

    let first = Pipeline::new(&offline_config())
        .unwrap()
        .rescore(&reading)
        .unwrap();
    let second = Pipeline::new(&offline_config())
        .unwrap()
        .rescore(&reading)
        .unwrap();

    assert_eq!(first.crop, second.crop);
    assert_eq!(first.irrigation, second.irrigation);
    for (a, b) in first.probabilities.iter().zip(second.probabilities.iter()) {
        assert_eq!(a.probability.to_bits(), b.probability.to_bits());
    }
}

/// Rendering a report and re-reading it recovers the literal fields.
#[test]
fn test_report_round_trip() {
    let pipeline = Pipeline::new(&offline_config()).unwrap();
    let reading = Reading::new(30.0, 2.0, Some(40.0), 0.6);

    let assessment = pipeline
        .assess_reading("Marrakech".to_string(), 31.63, -7.98, reading)
        .unwrap();
    let parsed = report::parse(&report::render(&assessment)).unwrap();

    assert_eq!(parsed.region, "Marrakech");
    assert_eq!(parsed.temperature, 30.0);
    assert_eq!(parsed.rainfall, 2.0);
    assert_eq!(parsed.vegetation_index, 0.6);
    assert_eq!(parsed.crop, assessment.suitability.crop);
    assert_eq!(parsed.irrigation, assessment.suitability.irrigation);
}

/// A crop table whose crops all share one irrigation level leaves the
/// irrigation model with a single class; the scoring attempt is rejected.
#[test]
fn test_single_irrigation_class_rejected() {
    let mut config = offline_config();
    config.crops = vec![
        CropSpec {
            name: "wheat".to_string(),
            irrigation: IrrigationLevel::Low,
        },
        CropSpec {
            name: "olives".to_string(),
            irrigation: IrrigationLevel::Low,
        },
    ];

    let pipeline = Pipeline::new(&config).unwrap();
    let result = pipeline.rescore(&Reading::new(25.0, 10.0, None, 0.5));

    assert!(matches!(result, Err(AppError::InvalidTrainingData(_))));
}
