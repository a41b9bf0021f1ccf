use crate::domain::{CropTable, IrrigationLevel, Reading};

/// One synthetic labeled sample. The scorer fits on a fresh sequence of these
/// for every request.
#[derive(Debug, Clone)]
pub struct TrainingRow {
    pub temperature: f64,
    pub rainfall: f64,
    pub vegetation_index: f64,
    /// Index into the crop table this row is labeled with.
    pub crop_index: usize,
    pub irrigation: IrrigationLevel,
}

impl TrainingRow {
    pub fn features(&self) -> [f64; 3] {
        [self.temperature, self.rainfall, self.vegetation_index]
    }
}

/// Per-field half-widths of the interpolation window centered on the
/// current reading. A fixed, documented artifact: changing these changes
/// scoring behavior.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpreads {
    pub temperature: f64,
    pub rainfall: f64,
    pub vegetation_index: f64,
}

impl Default for FieldSpreads {
    fn default() -> Self {
        Self {
            temperature: 3.0,
            rainfall: 10.0,
            vegetation_index: 0.05,
        }
    }
}

/// Build the synthetic training table for a reading: one row per crop, in
/// table order, each numeric field linearly interpolated across a symmetric
/// window centered on the reading. The rainfall window low end is clamped to
/// zero.
///
/// Because the rows are evenly spaced around the reading, the row nearest the
/// reading is the one at the middle index, which structurally favors the
/// middle crop of the table. That bias is inherited behavior and is kept
/// as-is.
pub fn build_training_set(
    reading: &Reading,
    table: &CropTable,
    spreads: &FieldSpreads,
) -> Vec<TrainingRow> {
    let n = table.len();

    let temperatures = linspace(
        reading.temperature - spreads.temperature,
        reading.temperature + spreads.temperature,
        n,
    );
    let rainfalls = linspace(
        (reading.rainfall - spreads.rainfall).max(0.0),
        reading.rainfall + spreads.rainfall,
        n,
    );
    let vegetation = linspace(
        reading.vegetation_index - spreads.vegetation_index,
        reading.vegetation_index + spreads.vegetation_index,
        n,
    );

    table
        .entries()
        .iter()
        .enumerate()
        .map(|(i, entry)| TrainingRow {
            temperature: temperatures[i],
            rainfall: rainfalls[i],
            vegetation_index: vegetation[i],
            crop_index: i,
            irrigation: entry.irrigation,
        })
        .collect()
}

/// Evenly spaced values across [start, end], inclusive endpoints.
fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![(start + end) / 2.0],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}
