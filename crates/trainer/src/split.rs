//! Stratified train/test split
//!
//! The test partition holds `ceil(test_fraction * n)` rows. Each class gets a
//! share proportional to its size (floors first, leftover rows to the largest
//! remainders), and rows are drawn per class after a seeded shuffle, so the
//! same labels and seed always give the same split.

use propensity_gbdt::LcgRng;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SplitError {
    #[error("cannot split an empty segment")]
    Empty,

    #[error("test_fraction must be in (0, 1), got {0}")]
    InvalidFraction(f64),

    #[error("label {label} has only {count} row(s); stratifying needs at least 2 per class")]
    ClassTooSmall { label: f64, count: usize },

    #[error("{n_test} test / {n_train} train rows cannot hold all {n_classes} classes")]
    PartitionTooSmall {
        n_test: usize,
        n_train: usize,
        n_classes: usize,
    },
}

/// Positions into the split slice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPair {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Stratified split of `labels` into train and test positions, both ascending
pub fn stratified_split(
    labels: &[f64],
    test_fraction: f64,
    seed: u64,
) -> Result<SplitPair, SplitError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(SplitError::InvalidFraction(test_fraction));
    }
    let n = labels.len();
    if n == 0 {
        return Err(SplitError::Empty);
    }

    let classes = group_by_class(labels);
    if let Some((label, members)) = classes.iter().find(|(_, members)| members.len() < 2) {
        return Err(SplitError::ClassTooSmall {
            label: *label,
            count: members.len(),
        });
    }

    let n_test = (test_fraction * n as f64).ceil() as usize;
    let n_train = n - n_test;
    if n_test < classes.len() || n_train < classes.len() {
        return Err(SplitError::PartitionTooSmall {
            n_test,
            n_train,
            n_classes: classes.len(),
        });
    }

    let counts: Vec<usize> = classes.iter().map(|(_, m)| m.len()).collect();
    let allocation = allocate(&counts, n_test);

    let mut rng = LcgRng::new(seed);
    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(n_test);

    for ((_, mut members), take) in classes.into_iter().zip(allocation) {
        rng.shuffle(&mut members);
        test.extend_from_slice(&members[..take]);
        train.extend_from_slice(&members[take..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(SplitPair { train, test })
}

/// Classes in ascending label order with their positions
fn group_by_class(labels: &[f64]) -> Vec<(f64, Vec<usize>)> {
    let mut classes: Vec<(f64, Vec<usize>)> = Vec::new();
    for (i, &label) in labels.iter().enumerate() {
        match classes.iter_mut().find(|(l, _)| *l == label) {
            Some((_, members)) => members.push(i),
            None => classes.push((label, vec![i])),
        }
    }
    classes.sort_by(|a, b| a.0.total_cmp(&b.0));
    classes
}

/// Proportional allocation of `total` draws over classes of size `counts`
fn allocate(counts: &[usize], total: usize) -> Vec<usize> {
    let n: usize = counts.iter().sum();
    let exact: Vec<f64> = counts
        .iter()
        .map(|&c| total as f64 * c as f64 / n as f64)
        .collect();

    let mut taken: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();
    let mut leftover = total - taken.iter().sum::<usize>();

    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });

    for &class in order.iter().cycle() {
        if leftover == 0 {
            break;
        }
        // keep at least one row of every class for training
        if taken[class] + 1 < counts[class] {
            taken[class] += 1;
            leftover -= 1;
        }
    }

    taken
}
