//! AgriSense Morocco: agro-climate crop suitability scoring.
//!
//! Turns a current indicator reading (temperature, rainfall, humidity and a
//! synthetic vegetation index) into a recommended crop, an irrigation level
//! and per-crop suitability probabilities. Every request rebuilds a small
//! interpolated training table around the reading and refits two seeded
//! tree ensembles from scratch; nothing is persisted between calls.

pub mod config;
pub mod domain;
pub mod error;
pub mod indicator;
pub mod pipeline;
pub mod report;
pub mod risk;
pub mod scorer;
pub mod trainset;
