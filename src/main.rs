use agrisense::config::Config;
use agrisense::pipeline::Pipeline;
use agrisense::report;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Marrakech, the dashboard's default marker
const DEFAULT_LATITUDE: f64 = 31.6295;
const DEFAULT_LONGITUDE: f64 = -7.9811;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,agrisense=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("AgriSense assessment starting...");

    // Load configuration
    let config = Config::load("config/config.yaml").map_err(|e| {
        anyhow::anyhow!(
            "Failed to load configuration: {}\n\n\
             Make sure:\n\
             1. config/config.yaml exists\n\
             2. All required environment variables are set (check .env.example)\n\
             3. Create a .env file if needed",
            e
        )
    })?;
    info!("Configuration loaded");

    let (latitude, longitude) = location_from_env();

    let mut pipeline = Pipeline::new(&config)?;
    let assessment = pipeline.assess(latitude, longitude).await?;

    println!("{}", report::render(&assessment));

    // What-if: the same conditions with 20mm more rainfall
    let what_if = pipeline.what_if_rainfall(&assessment.reading, 20.0)?;
    println!();
    println!("What-if (+20.0 mm rainfall):");
    println!("  Recommended Crop: {}", what_if.crop);
    println!("  Irrigation Level: {}", what_if.irrigation);

    info!("AgriSense assessment finished");
    Ok(())
}

/// Location from AGRISENSE_LAT / AGRISENSE_LON, defaulting to Marrakech.
fn location_from_env() -> (f64, f64) {
    let latitude = std::env::var("AGRISENSE_LAT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_LATITUDE);
    let longitude = std::env::var("AGRISENSE_LON")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_LONGITUDE);
    (latitude, longitude)
}
