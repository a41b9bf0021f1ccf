use crate::domain::IrrigationLevel;
use crate::error::{AppError, Result};
use crate::pipeline::Assessment;
use chrono::Utc;

/// Render an assessment as a plain-text report. Field precisions are part
/// of the format: temperature and rainfall to one decimal, vegetation index
/// to two.
pub fn render(assessment: &Assessment) -> String {
    let mut lines = Vec::new();

    lines.push("AgriSense Morocco Report".to_string());
    lines.push(format!(
        "Region: {} (Lat: {:.2}, Lon: {:.2})",
        assessment.place, assessment.latitude, assessment.longitude
    ));
    lines.push(format!("Temperature: {:.1} °C", assessment.reading.temperature));
    lines.push(format!("Rainfall: {:.1} mm", assessment.reading.rainfall));
    if let Some(humidity) = assessment.reading.humidity {
        lines.push(format!("Humidity: {:.0} %", humidity));
    }
    lines.push(format!(
        "Vegetation Index: {:.2}",
        assessment.reading.vegetation_index
    ));
    lines.push(format!("Recommended Crop: {}", assessment.suitability.crop));
    lines.push(format!(
        "Irrigation Level: {}",
        assessment.suitability.irrigation
    ));
    lines.push(format!(
        "Sustainability Index: {:.1}/10",
        assessment.sustainability
    ));

    if assessment.risks.is_empty() {
        lines.push("Risks: none detected".to_string());
    } else {
        let flags: Vec<String> = assessment.risks.iter().map(|r| r.to_string()).collect();
        lines.push(format!("Risks: {}", flags.join(", ")));
    }

    lines.push(format!(
        "Generated: {}",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));

    lines.join("\n")
}

/// The literal fields recovered from a rendered report.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReport {
    pub region: String,
    pub temperature: f64,
    pub rainfall: f64,
    pub humidity: Option<f64>,
    pub vegetation_index: f64,
    pub crop: String,
    pub irrigation: IrrigationLevel,
    pub sustainability: f64,
}

/// Re-read the fields of a rendered report. Values come back at the
/// documented precision, not at full float width.
pub fn parse(text: &str) -> Result<ParsedReport> {
    let mut region = None;
    let mut temperature = None;
    let mut rainfall = None;
    let mut humidity = None;
    let mut vegetation_index = None;
    let mut crop = None;
    let mut irrigation = None;
    let mut sustainability = None;

    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Region: ") {
            let name = rest.split(" (Lat:").next().unwrap_or(rest);
            region = Some(name.to_string());
        } else if let Some(rest) = line.strip_prefix("Temperature: ") {
            temperature = Some(parse_value(rest, " °C")?);
        } else if let Some(rest) = line.strip_prefix("Rainfall: ") {
            rainfall = Some(parse_value(rest, " mm")?);
        } else if let Some(rest) = line.strip_prefix("Humidity: ") {
            humidity = Some(parse_value(rest, " %")?);
        } else if let Some(rest) = line.strip_prefix("Vegetation Index: ") {
            vegetation_index = Some(parse_value(rest, "")?);
        } else if let Some(rest) = line.strip_prefix("Recommended Crop: ") {
            crop = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("Irrigation Level: ") {
            irrigation = Some(rest.parse::<IrrigationLevel>()?);
        } else if let Some(rest) = line.strip_prefix("Sustainability Index: ") {
            sustainability = Some(parse_value(rest, "/10")?);
        }
    }

    Ok(ParsedReport {
        region: region.ok_or_else(|| missing("Region"))?,
        temperature: temperature.ok_or_else(|| missing("Temperature"))?,
        rainfall: rainfall.ok_or_else(|| missing("Rainfall"))?,
        humidity,
        vegetation_index: vegetation_index.ok_or_else(|| missing("Vegetation Index"))?,
        crop: crop.ok_or_else(|| missing("Recommended Crop"))?,
        irrigation: irrigation.ok_or_else(|| missing("Irrigation Level"))?,
        sustainability: sustainability.ok_or_else(|| missing("Sustainability Index"))?,
    })
}

fn parse_value(text: &str, suffix: &str) -> Result<f64> {
    let trimmed = text.strip_suffix(suffix).unwrap_or(text).trim();
    trimmed
        .parse::<f64>()
        .map_err(|e| AppError::Parse(format!("Failed to parse value '{}': {}", trimmed, e)))
}

fn missing(field: &str) -> AppError {
    AppError::Parse(format!("Report is missing the '{}' line", field))
}
