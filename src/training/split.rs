// Stratified train/test split

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::TrainingError;

/// Row indices of each side of a split, ascending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Hold out `test_fraction` of every class
///
/// Each class contributes `round(n * test_fraction)` rows to the test side,
/// capped so at least one row per class stays in training. Classes are
/// shuffled in index order from one RNG seeded with `seed`.
pub fn stratified_split(
    labels: &[usize],
    n_classes: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<Split, TrainingError> {
    if !(0.0..1.0).contains(&test_fraction) {
        return Err(TrainingError::Fit {
            reason: format!("test fraction {} outside [0, 1)", test_fraction),
        });
    }

    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (row, &label) in labels.iter().enumerate() {
        let bucket = by_class.get_mut(label).ok_or_else(|| TrainingError::Fit {
            reason: format!("label {} outside 0..{}", label, n_classes),
        })?;
        bucket.push(row);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for mut rows in by_class {
        if rows.is_empty() {
            continue;
        }
        rows.shuffle(&mut rng);
        let n_test = ((rows.len() as f64 * test_fraction).round() as usize).min(rows.len() - 1);
        test.extend_from_slice(&rows[..n_test]);
        train.extend_from_slice(&rows[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(Split { train, test })
}
