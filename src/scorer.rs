use crate::domain::{CropTable, IrrigationLevel, Reading};
use crate::error::{AppError, Result};
use crate::trainset::TrainingRow;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

const N_FEATURES: usize = 3;

/// A node in a fitted decision tree. Split nodes send samples with
/// feature value <= threshold to the left child.
#[derive(Debug, Clone)]
enum TreeNode {
    Leaf {
        class: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A CART classification tree, grown to purity with Gini impurity splits.
///
/// Split search is exhaustive over midpoint thresholds and ties keep the
/// first candidate in feature-then-threshold order, so fitting the same
/// samples always yields the same tree.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn fit(samples: &[[f64; N_FEATURES]], labels: &[usize], n_classes: usize) -> Self {
        let members: Vec<usize> = (0..samples.len()).collect();
        let mut nodes = Vec::new();
        grow(&mut nodes, samples, labels, n_classes, &members);
        Self { nodes }
    }

    /// Classify a single sample by root-to-leaf traversal.
    pub fn predict(&self, features: &[f64; N_FEATURES]) -> usize {
        let mut index = 0usize;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { class } => return *class,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }
}

/// Grow a subtree over `members` and return its root node index.
fn grow(
    nodes: &mut Vec<TreeNode>,
    samples: &[[f64; N_FEATURES]],
    labels: &[usize],
    n_classes: usize,
    members: &[usize],
) -> usize {
    let mut counts = vec![0usize; n_classes];
    for &i in members {
        counts[labels[i]] += 1;
    }
    let majority = argmax(&counts);

    let node_index = nodes.len();
    nodes.push(TreeNode::Leaf { class: majority });

    let distinct = counts.iter().filter(|&&c| c > 0).count();
    if members.len() < 2 || distinct < 2 {
        return node_index;
    }

    let Some((feature, threshold)) = best_split(samples, labels, n_classes, members) else {
        // No feature separates the members; keep the majority leaf
        return node_index;
    };

    let (left_members, right_members): (Vec<usize>, Vec<usize>) = members
        .iter()
        .partition(|&&i| samples[i][feature] <= threshold);

    let left = grow(nodes, samples, labels, n_classes, &left_members);
    let right = grow(nodes, samples, labels, n_classes, &right_members);
    nodes[node_index] = TreeNode::Split {
        feature,
        threshold,
        left,
        right,
    };
    node_index
}

fn best_split(
    samples: &[[f64; N_FEATURES]],
    labels: &[usize],
    n_classes: usize,
    members: &[usize],
) -> Option<(usize, f64)> {
    let mut best: Option<(f64, usize, f64)> = None;

    for feature in 0..N_FEATURES {
        let mut values: Vec<f64> = members.iter().map(|&i| samples[i][feature]).collect();
        values.sort_by(f64::total_cmp);
        values.dedup();

        for pair in values.windows(2) {
            let threshold = (pair[0] + pair[1]) / 2.0;
            let impurity =
                weighted_gini(samples, labels, n_classes, members, feature, threshold);
            let improves = match best {
                None => true,
                // Strict improvement only, so earlier candidates win ties
                Some((current, _, _)) => impurity < current - 1e-12,
            };
            if improves {
                best = Some((impurity, feature, threshold));
            }
        }
    }

    best.map(|(_, feature, threshold)| (feature, threshold))
}

/// Weighted Gini impurity of the partition induced by (feature, threshold).
fn weighted_gini(
    samples: &[[f64; N_FEATURES]],
    labels: &[usize],
    n_classes: usize,
    members: &[usize],
    feature: usize,
    threshold: f64,
) -> f64 {
    let mut left = vec![0usize; n_classes];
    let mut right = vec![0usize; n_classes];
    for &i in members {
        if samples[i][feature] <= threshold {
            left[labels[i]] += 1;
        } else {
            right[labels[i]] += 1;
        }
    }

    let total = members.len() as f64;
    let n_left: usize = left.iter().sum();
    let n_right: usize = right.iter().sum();
    (n_left as f64 / total) * gini(&left, n_left) + (n_right as f64 / total) * gini(&right, n_right)
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let sum_sq: f64 = counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total as f64;
            p * p
        })
        .sum();
    1.0 - sum_sq
}

/// Arg-max with lowest-index tie-break.
fn argmax<T: PartialOrd + Copy>(values: &[T]) -> usize {
    let mut best = 0usize;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// A bagged ensemble of decision trees: each tree is fit on a bootstrap
/// resample drawn from the caller's seeded generator, and class
/// probabilities are the fraction of trees voting for each class.
#[derive(Debug, Clone)]
pub struct ForestClassifier {
    trees: Vec<DecisionTree>,
    n_classes: usize,
}

impl ForestClassifier {
    /// Fit a fresh forest. The generator drives bootstrap sampling only;
    /// split search itself is deterministic.
    pub fn fit(
        samples: &[[f64; N_FEATURES]],
        labels: &[usize],
        n_classes: usize,
        n_trees: usize,
        rng: &mut StdRng,
    ) -> Result<Self> {
        if samples.is_empty() || samples.len() != labels.len() {
            return Err(AppError::InvalidTrainingData(format!(
                "Expected matching non-empty samples and labels, got {} samples and {} labels",
                samples.len(),
                labels.len()
            )));
        }
        if n_trees == 0 {
            return Err(AppError::InvalidTrainingData(
                "Forest needs at least 1 tree".to_string(),
            ));
        }
        if let Some(&bad) = labels.iter().find(|&&l| l >= n_classes) {
            return Err(AppError::InvalidTrainingData(format!(
                "Label {} out of range for {} classes",
                bad, n_classes
            )));
        }

        let mut seen = vec![false; n_classes];
        for &l in labels {
            seen[l] = true;
        }
        if seen.iter().filter(|&&s| s).count() < 2 {
            return Err(AppError::InvalidTrainingData(
                "Training labels contain fewer than 2 distinct classes".to_string(),
            ));
        }

        let n = samples.len();
        let trees = (0..n_trees)
            .map(|_| {
                let mut boot_samples = Vec::with_capacity(n);
                let mut boot_labels = Vec::with_capacity(n);
                for _ in 0..n {
                    let pick = rng.gen_range(0..n);
                    boot_samples.push(samples[pick]);
                    boot_labels.push(labels[pick]);
                }
                DecisionTree::fit(&boot_samples, &boot_labels, n_classes)
            })
            .collect();

        Ok(Self { trees, n_classes })
    }

    /// Vote fraction per class. Non-negative, sums to exactly 1.
    pub fn predict_proba(&self, features: &[f64; N_FEATURES]) -> Vec<f64> {
        let mut votes = vec![0usize; self.n_classes];
        for tree in &self.trees {
            votes[tree.predict(features)] += 1;
        }
        let n = self.trees.len() as f64;
        votes.iter().map(|&v| v as f64 / n).collect()
    }

    /// Majority-vote class, lowest index on ties.
    pub fn predict(&self, features: &[f64; N_FEATURES]) -> usize {
        let mut votes = vec![0usize; self.n_classes];
        for tree in &self.trees {
            votes[tree.predict(features)] += 1;
        }
        argmax(&votes)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}

/// Per-crop suitability probability, aligned to the lexicographic crop
/// ordering so charts and tests can index it reliably.
#[derive(Debug, Clone)]
pub struct CropProbability {
    pub crop: String,
    pub probability: f64,
}

/// Outcome of one fit-and-score pass. Derived fresh per request, never
/// persisted.
#[derive(Debug, Clone)]
pub struct SuitabilityResult {
    pub crop: String,
    pub irrigation: IrrigationLevel,
    pub probabilities: Vec<CropProbability>,
}

impl SuitabilityResult {
    pub fn probability_of(&self, crop: &str) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|p| p.crop == crop)
            .map(|p| p.probability)
    }
}

/// Fits two independent forests per request (crop and irrigation level) on
/// the synthetic table and scores the single current reading.
#[derive(Debug, Clone, Copy)]
pub struct SuitabilityScorer {
    pub trees: usize,
    pub seed: u64,
}

impl Default for SuitabilityScorer {
    fn default() -> Self {
        Self {
            trees: 100,
            seed: 42,
        }
    }
}

impl SuitabilityScorer {
    pub fn new(trees: usize, seed: u64) -> Self {
        Self { trees, seed }
    }

    /// Fit fresh crop and irrigation models on the training rows and score
    /// the reading. No model state survives the call.
    pub fn score(
        &self,
        rows: &[TrainingRow],
        reading: &Reading,
        table: &CropTable,
    ) -> Result<SuitabilityResult> {
        if rows.is_empty() {
            return Err(AppError::InvalidTrainingData(
                "Training table is empty".to_string(),
            ));
        }

        // Crop classes in lexicographic order
        let mut crop_classes: Vec<String> = table
            .entries()
            .iter()
            .map(|e| e.name.clone())
            .collect();
        crop_classes.sort();

        let mut crop_labels = Vec::with_capacity(rows.len());
        for row in rows {
            if row.crop_index >= table.len() {
                return Err(AppError::InvalidTrainingData(format!(
                    "Row crop index {} out of range for {} crops",
                    row.crop_index,
                    table.len()
                )));
            }
            let name = table.crop_name(row.crop_index);
            let label = crop_classes
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| {
                    AppError::InvalidTrainingData(format!("Crop '{}' missing from class list", name))
                })?;
            crop_labels.push(label);
        }

        // Irrigation classes present in the rows, lexicographic by name
        let mut irrigation_classes: Vec<IrrigationLevel> = Vec::new();
        for row in rows {
            if !irrigation_classes.contains(&row.irrigation) {
                irrigation_classes.push(row.irrigation);
            }
        }
        irrigation_classes.sort_by_key(|l| l.as_str());
        let irrigation_labels: Vec<usize> = rows
            .iter()
            .map(|row| {
                irrigation_classes
                    .iter()
                    .position(|l| *l == row.irrigation)
                    .unwrap_or(0)
            })
            .collect();

        let samples: Vec<[f64; N_FEATURES]> = rows.iter().map(|r| r.features()).collect();
        let features = [
            reading.temperature,
            reading.rainfall,
            reading.vegetation_index,
        ];

        // One seeded generator drives both fits, in a fixed order
        let mut rng = StdRng::seed_from_u64(self.seed);
        let crop_model =
            ForestClassifier::fit(&samples, &crop_labels, crop_classes.len(), self.trees, &mut rng)?;
        let irrigation_model = ForestClassifier::fit(
            &samples,
            &irrigation_labels,
            irrigation_classes.len(),
            self.trees,
            &mut rng,
        )?;

        let probabilities: Vec<CropProbability> = crop_classes
            .iter()
            .zip(crop_model.predict_proba(&features))
            .map(|(crop, probability)| CropProbability {
                crop: crop.clone(),
                probability,
            })
            .collect();

        let crop = crop_classes[crop_model.predict(&features)].clone();
        let irrigation = irrigation_classes[irrigation_model.predict(&features)];

        debug!(
            "Scored reading ({:.1}°C, {:.1}mm, {:.2}) -> {} / {} irrigation",
            reading.temperature, reading.rainfall, reading.vegetation_index, crop, irrigation
        );

        Ok(SuitabilityResult {
            crop,
            irrigation,
            probabilities,
        })
    }
}
