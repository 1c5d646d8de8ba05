// Forest - bagged CART decision trees for class-probability estimation
//
// Each tree is grown on a bootstrap sample with Gini impurity, a random
// feature subset per split and optional class re-weighting. Leaves store the
// weighted class distribution of their training samples; the forest
// probability is the mean of the leaf distributions reached by every tree.
//
// Tree `i` draws from its own RNG seeded with `seed + i`, so a given corpus,
// parameter set and seed always produce the same forest.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::analysis::model::ProbabilisticModel;
use crate::error::{ModelError, TrainingError};

/// Number of features considered at each split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// `floor(sqrt(n_features))`, at least 1
    Sqrt,
    All,
    Count(usize),
}

impl MaxFeatures {
    fn resolve(self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Count(k) => k,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Class re-weighting applied to training samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    None,
    /// `n_samples / (n_classes * count(class))` over the full training set
    Balanced,
    /// Same formula, recomputed on each tree's bootstrap sample
    BalancedSubsample,
}

/// Forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_trees: usize,
    /// `None` grows every tree until its leaves are pure
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub class_weight: ClassWeight,
    pub bootstrap: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: Some(15),
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            class_weight: ClassWeight::BalancedSubsample,
            bootstrap: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Samples with `x[feature] <= threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf { proba: Vec<f64> },
}

/// Single CART tree stored as a flat node arena, root at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Class distribution of the leaf `x` falls into
    pub fn leaf_proba(&self, x: &[f64]) -> Option<&[f64]> {
        let mut index = 0;
        loop {
            match self.nodes.get(index)? {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = *x.get(*feature)?;
                    index = if value <= *threshold { *left } else { *right };
                }
                Node::Leaf { proba } => return Some(proba),
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Longest root-to-leaf path, counted in splits
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], index: usize) -> usize {
            match nodes.get(index) {
                Some(Node::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Random forest classifier over dense `f64` feature rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    n_classes: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit a forest on rows `x` with class indices `y` in `0..n_classes`
    pub fn fit(
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        params: &ForestParams,
        seed: u64,
    ) -> Result<Self, TrainingError> {
        let fit_error = |reason: String| TrainingError::Fit { reason };

        if x.is_empty() {
            return Err(fit_error("no training rows".to_string()));
        }
        if x.len() != y.len() {
            return Err(fit_error(format!(
                "{} rows but {} labels",
                x.len(),
                y.len()
            )));
        }
        let n_features = x[0].len();
        if n_features == 0 || x.iter().any(|row| row.len() != n_features) {
            return Err(fit_error("rows must share one non-zero width".to_string()));
        }
        if let Some(&bad) = y.iter().find(|&&label| label >= n_classes) {
            return Err(fit_error(format!(
                "label {} outside 0..{}",
                bad, n_classes
            )));
        }
        if params.n_trees == 0 {
            return Err(fit_error("n_trees must be positive".to_string()));
        }

        let builder = TreeBuilder {
            x,
            y,
            n_classes,
            max_features: params.max_features.resolve(n_features),
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split.max(2),
            min_samples_leaf: params.min_samples_leaf.max(1),
        };
        let global_weights = class_weights(y, n_classes, None);

        let trees = (0..params.n_trees)
            .map(|tree_index| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(tree_index as u64));
                let multiplicity = if params.bootstrap {
                    let mut counts = vec![0usize; x.len()];
                    for _ in 0..x.len() {
                        counts[rng.gen_range(0..x.len())] += 1;
                    }
                    counts
                } else {
                    vec![1; x.len()]
                };

                let weights_by_class = match params.class_weight {
                    ClassWeight::None => vec![1.0; n_classes],
                    ClassWeight::Balanced => global_weights.clone(),
                    ClassWeight::BalancedSubsample => {
                        class_weights(y, n_classes, Some(&multiplicity))
                    }
                };

                let mut samples = Vec::new();
                let mut weights = vec![0.0; x.len()];
                for (i, &count) in multiplicity.iter().enumerate() {
                    if count > 0 {
                        samples.push(i);
                        weights[i] = count as f64 * weights_by_class[y[i]];
                    }
                }

                builder.build(samples, &weights, &mut rng)
            })
            .collect();

        log::debug!(
            "[Forest] Fitted {} trees on {} rows x {} features",
            params.n_trees,
            x.len(),
            n_features
        );

        Ok(Self {
            n_features,
            n_classes,
            trees,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Index of the most probable class, first index on ties
    pub fn predict(&self, x: &[f64]) -> Result<usize, ModelError> {
        let proba = self.predict_proba(x)?;
        Ok(arg_max(&proba))
    }
}

impl ProbabilisticModel for RandomForest {
    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, ModelError> {
        if x.len() != self.n_features {
            return Err(ModelError::FeatureMismatch {
                expected: self.n_features,
                actual: x.len(),
            });
        }
        if self.trees.is_empty() {
            return Err(ModelError::Prediction {
                reason: "forest has no trees".to_string(),
            });
        }

        let mut total = vec![0.0; self.n_classes];
        for tree in &self.trees {
            let proba = tree.leaf_proba(x).ok_or_else(|| ModelError::Prediction {
                reason: "malformed tree".to_string(),
            })?;
            if proba.len() != self.n_classes {
                return Err(ModelError::Prediction {
                    reason: format!(
                        "leaf has {} classes, forest has {}",
                        proba.len(),
                        self.n_classes
                    ),
                });
            }
            for (acc, p) in total.iter_mut().zip(proba) {
                *acc += p;
            }
        }

        let n_trees = self.trees.len() as f64;
        Ok(total.into_iter().map(|p| p / n_trees).collect())
    }
}

/// Index of the largest value; the earliest index wins ties
pub fn arg_max(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Balanced class weights, optionally over bootstrap multiplicities
///
/// Classes absent from the sample keep weight 1; they carry no samples anyway.
fn class_weights(y: &[usize], n_classes: usize, multiplicity: Option<&[usize]>) -> Vec<f64> {
    let mut counts = vec![0.0; n_classes];
    for (i, &label) in y.iter().enumerate() {
        counts[label] += multiplicity.map_or(1, |m| m[i]) as f64;
    }
    let total: f64 = counts.iter().sum();
    let present = counts.iter().filter(|&&c| c > 0.0).count() as f64;

    counts
        .iter()
        .map(|&c| if c > 0.0 { total / (present * c) } else { 1.0 })
        .collect()
}

fn gini(counts: &[f64], total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|c| (c / total).powi(2)).sum::<f64>()
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Weighted child impurity, lower is better
    score: f64,
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [usize],
    n_classes: usize,
    max_features: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
}

impl TreeBuilder<'_> {
    fn build(&self, samples: Vec<usize>, weights: &[f64], rng: &mut StdRng) -> DecisionTree {
        let mut nodes = Vec::new();
        self.grow(&mut nodes, samples, weights, 0, rng);
        DecisionTree { nodes }
    }

    fn class_counts(&self, samples: &[usize], weights: &[f64]) -> Vec<f64> {
        let mut counts = vec![0.0; self.n_classes];
        for &i in samples {
            counts[self.y[i]] += weights[i];
        }
        counts
    }

    /// Append the subtree for `samples` and return its root index
    fn grow(
        &self,
        nodes: &mut Vec<Node>,
        samples: Vec<usize>,
        weights: &[f64],
        depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let counts = self.class_counts(&samples, weights);
        let total: f64 = counts.iter().sum();
        let impurity = gini(&counts, total);

        let index = nodes.len();
        let leaf = Node::Leaf {
            proba: counts.iter().map(|c| c / total.max(f64::MIN_POSITIVE)).collect(),
        };

        let depth_reached = self.max_depth.is_some_and(|max| depth >= max);
        if depth_reached || samples.len() < self.min_samples_split || impurity <= 0.0 {
            nodes.push(leaf);
            return index;
        }

        let Some(best) = self.best_split(&samples, weights, impurity, total, rng) else {
            nodes.push(leaf);
            return index;
        };

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| self.x[i][best.feature] <= best.threshold);

        // Reserve the slot, children are appended after it
        nodes.push(leaf);
        let left = self.grow(nodes, left_samples, weights, depth + 1, rng);
        let right = self.grow(nodes, right_samples, weights, depth + 1, rng);
        nodes[index] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        index
    }

    fn best_split(
        &self,
        samples: &[usize],
        weights: &[f64],
        impurity: f64,
        total: f64,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let n_features = self.x[0].len();
        let features = sample(rng, n_features, self.max_features);

        let mut best: Option<SplitCandidate> = None;
        let mut order: Vec<usize> = samples.to_vec();

        for feature in features.iter() {
            order.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let mut left_counts = vec![0.0; self.n_classes];
            let mut left_weight = 0.0;
            let mut right_counts = self.class_counts(samples, weights);

            for split in 1..order.len() {
                let moved = order[split - 1];
                left_counts[self.y[moved]] += weights[moved];
                right_counts[self.y[moved]] -= weights[moved];
                left_weight += weights[moved];

                let lo = self.x[moved][feature];
                let hi = self.x[order[split]][feature];
                if hi <= lo {
                    continue;
                }
                if split < self.min_samples_leaf || order.len() - split < self.min_samples_leaf {
                    continue;
                }

                let right_weight = total - left_weight;
                let score = (left_weight * gini(&left_counts, left_weight)
                    + right_weight * gini(&right_counts, right_weight))
                    / total;

                if best.as_ref().map_or(true, |b| score < b.score) {
                    let mut threshold = lo + (hi - lo) / 2.0;
                    if threshold >= hi || !threshold.is_finite() {
                        threshold = lo;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        score,
                    });
                }
            }
        }

        best.filter(|b| b.score < impurity - 1e-12)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two well-separated blobs per class along different axes
    fn blobs(n_per_class: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let centers = [[0.0, 0.0, 0.0], [5.0, 0.0, 0.0], [0.0, 5.0, 5.0]];
        let mut x = Vec::new();
        let mut y = Vec::new();
        for (label, center) in centers.iter().enumerate() {
            for _ in 0..n_per_class {
                x.push(center.iter().map(|c| c + rng.gen_range(-1.0..1.0)).collect());
                y.push(label);
            }
        }
        (x, y)
    }

    fn small_params() -> ForestParams {
        ForestParams {
            n_trees: 15,
            ..ForestParams::default()
        }
    }

    #[test]
    fn test_separable_blobs_are_learned() {
        let (x, y) = blobs(30, 1);
        let forest = RandomForest::fit(&x, &y, 3, &small_params(), 42).unwrap();

        assert_eq!(forest.n_trees(), 15);
        assert_eq!(forest.predict(&[0.1, -0.2, 0.0]).unwrap(), 0);
        assert_eq!(forest.predict(&[5.2, 0.3, -0.1]).unwrap(), 1);
        assert_eq!(forest.predict(&[0.0, 4.8, 5.1]).unwrap(), 2);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (x, y) = blobs(20, 2);
        let forest = RandomForest::fit(&x, &y, 3, &small_params(), 42).unwrap();

        for row in &x {
            let proba = forest.predict_proba(row).unwrap();
            assert_eq!(proba.len(), 3);
            let sum: f64 = proba.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9, "sum = {}", sum);
            assert!(proba.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = blobs(15, 3);
        let a = RandomForest::fit(&x, &y, 3, &small_params(), 7).unwrap();
        let b = RandomForest::fit(&x, &y, 3, &small_params(), 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_max_depth_is_respected() {
        let (x, y) = blobs(25, 4);
        let params = ForestParams {
            n_trees: 5,
            max_depth: Some(2),
            ..ForestParams::default()
        };
        let forest = RandomForest::fit(&x, &y, 3, &params, 42).unwrap();
        assert!(forest.trees().iter().all(|t| t.depth() <= 2));
    }

    #[test]
    fn test_imbalanced_minority_still_predicted() {
        // 40 vs 4 samples; balanced weighting keeps the minority reachable
        let mut rng = StdRng::seed_from_u64(5);
        let mut x = Vec::new();
        let mut y = Vec::new();
        for _ in 0..40 {
            x.push(vec![rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)]);
            y.push(0);
        }
        for _ in 0..4 {
            x.push(vec![rng.gen_range(3.0..4.0), rng.gen_range(3.0..4.0)]);
            y.push(1);
        }
        let forest = RandomForest::fit(&x, &y, 2, &small_params(), 42).unwrap();
        assert_eq!(forest.predict(&[3.5, 3.5]).unwrap(), 1);
    }

    #[test]
    fn test_class_weights() {
        let y = [0, 0, 0, 1];
        let weights = class_weights(&y, 3, None);
        assert!((weights[0] - 4.0 / 6.0).abs() < 1e-12);
        assert!((weights[1] - 2.0).abs() < 1e-12);
        assert_eq!(weights[2], 1.0);

        let weights = class_weights(&y, 2, Some(&[1, 0, 0, 3]));
        assert!((weights[0] - 2.0).abs() < 1e-12);
        assert!((weights[1] - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_arg_max_first_wins_ties() {
        assert_eq!(arg_max(&[0.25, 0.5, 0.5, 0.1]), 1);
        assert_eq!(arg_max(&[0.2, 0.2, 0.2]), 0);
        assert_eq!(arg_max(&[]), 0);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let params = small_params();
        assert!(RandomForest::fit(&[], &[], 2, &params, 0).is_err());
        assert!(RandomForest::fit(&[vec![1.0]], &[0, 1], 2, &params, 0).is_err());
        assert!(RandomForest::fit(&[vec![1.0], vec![1.0, 2.0]], &[0, 1], 2, &params, 0).is_err());
        assert!(RandomForest::fit(&[vec![1.0]], &[3], 2, &params, 0).is_err());
    }

    #[test]
    fn test_width_mismatch_on_predict() {
        let (x, y) = blobs(10, 6);
        let forest = RandomForest::fit(&x, &y, 3, &small_params(), 42).unwrap();
        assert!(matches!(
            forest.predict_proba(&[1.0, 2.0]),
            Err(ModelError::FeatureMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_serde_roundtrip_predicts_identically() {
        let (x, y) = blobs(10, 8);
        let forest = RandomForest::fit(&x, &y, 3, &small_params(), 42).unwrap();
        let json = serde_json::to_string(&forest).unwrap();
        let restored: RandomForest = serde_json::from_str(&json).unwrap();
        assert_eq!(
            forest.predict_proba(&x[0]).unwrap(),
            restored.predict_proba(&x[0]).unwrap()
        );
    }
}
