//! Linear separators and the cross-validated training protocol shared by
//! every trainer.

use nalgebra::DVector;
use tracing::debug;

use crate::error::{Error, Result};
use crate::features::FeatureVector;

/// Affine scoring function `w·x + b`.
#[derive(Debug, Clone, PartialEq)]
pub struct Separator {
    pub weights: DVector<f64>,
    pub bias: f64,
}

impl Separator {
    pub fn new(weights: DVector<f64>, bias: f64) -> Self {
        Self { weights, bias }
    }

    /// Signed score, positive on the `+1` side.
    pub fn predict(&self, features: &FeatureVector) -> f64 {
        self.weights.dot(features) + self.bias
    }

    pub fn classify(&self, features: &FeatureVector) -> f64 {
        if self.predict(features) >= 0.0 {
            1.0
        } else {
            -1.0
        }
    }

    pub fn dimension(&self) -> usize {
        self.weights.len()
    }

    pub fn norm_squared(&self) -> f64 {
        self.weights.norm_squared()
    }

    /// Weights followed by the bias, `dimension() + 1` values.
    pub fn full_weights(&self) -> Vec<f64> {
        self.weights
            .iter()
            .copied()
            .chain(std::iter::once(self.bias))
            .collect()
    }

    /// Number of misclassified samples.
    pub fn training_error(&self, samples: &[FeatureVector], labels: &[f64]) -> usize {
        samples
            .iter()
            .zip(labels)
            .filter(|(sample, &label)| (self.classify(sample) - label).abs() > f64::EPSILON)
            .count()
    }
}

/// Reject inputs no trainer can learn from.
pub fn validate_training_set(samples: &[FeatureVector], labels: &[f64]) -> Result<usize> {
    if samples.is_empty() {
        return Err(Error::Training("no samples".to_string()));
    }
    if samples.len() != labels.len() {
        return Err(Error::Training(format!(
            "{} samples but {} labels",
            samples.len(),
            labels.len()
        )));
    }
    let dimension = samples[0].len();
    if samples.iter().any(|s| s.len() != dimension) {
        return Err(Error::Training("samples of different dimensions".to_string()));
    }
    let positives = labels.iter().filter(|&&l| l > 0.0).count();
    if positives == 0 || positives == labels.len() {
        return Err(Error::Training("both classes must be present".to_string()));
    }
    Ok(dimension)
}

fn check_separator(separator: Separator) -> Result<Separator> {
    let finite = separator.bias.is_finite() && separator.weights.iter().all(|w| w.is_finite());
    if !finite {
        return Err(Error::Training("non-finite separator".to_string()));
    }
    if separator.norm_squared() == 0.0 {
        return Err(Error::Training(
            "degenerate separator, the classes could not be told apart".to_string(),
        ));
    }
    Ok(separator)
}

/// Contiguous `[start, end)` ranges of `folds` held-out blocks over `len` samples.
pub fn fold_ranges(len: usize, folds: usize) -> Vec<(usize, usize)> {
    let folds = folds.clamp(1, len.max(1));
    (0..folds)
        .map(|fold| (fold * len / folds, (fold + 1) * len / folds))
        .collect()
}

pub trait Trainer {
    /// Candidate hyperparameters, in order of preference on ties.
    fn candidates(&self) -> Vec<f64>;

    /// Fit a separator on the whole set with a fixed hyperparameter.
    fn fit(&self, hyperparameter: f64, samples: &[FeatureVector], labels: &[f64])
        -> Result<Separator>;

    /// Misclassifications on held-out folds for one hyperparameter.
    fn held_out_error(
        &self,
        folds: usize,
        hyperparameter: f64,
        samples: &[FeatureVector],
        labels: &[f64],
    ) -> Result<usize> {
        let mut errors = 0;
        for (start, end) in fold_ranges(samples.len(), folds.max(2)) {
            let train_samples: Vec<FeatureVector> = samples[..start]
                .iter()
                .chain(&samples[end..])
                .cloned()
                .collect();
            let train_labels: Vec<f64> = labels[..start]
                .iter()
                .chain(&labels[end..])
                .copied()
                .collect();

            let separator = self.fit(hyperparameter, &train_samples, &train_labels)?;
            errors += separator.training_error(&samples[start..end], &labels[start..end]);
        }
        Ok(errors)
    }

    /// Pick the candidate with the fewest held-out errors, earliest on ties.
    fn cross_validate(&self, folds: usize, samples: &[FeatureVector], labels: &[f64]) -> Result<f64> {
        validate_training_set(samples, labels)?;

        let mut best: Option<(f64, usize)> = None;
        for candidate in self.candidates() {
            let errors = self.held_out_error(folds, candidate, samples, labels)?;
            debug!(candidate, errors, "cross-validation");
            if best.is_none_or(|(_, best_errors)| errors < best_errors) {
                best = Some((candidate, errors));
            }
        }

        best.map(|(candidate, _)| candidate)
            .ok_or_else(|| Error::Training("no hyperparameter candidates".to_string()))
    }

    fn train(
        &self,
        folds: usize,
        hyperparameter: f64,
        samples: &[FeatureVector],
        labels: &[f64],
    ) -> Result<Separator> {
        validate_training_set(samples, labels)?;
        let separator = check_separator(self.fit(hyperparameter, samples, labels)?)?;
        debug!(
            folds,
            hyperparameter,
            training_error = separator.training_error(samples, labels),
            "trained separator"
        );
        Ok(separator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predict_is_affine_score() {
        let separator = Separator::new(DVector::from_vec(vec![2.0, -1.0]), 0.5);
        let sample = DVector::from_vec(vec![1.0, 3.0]);

        assert!((separator.predict(&sample) - (-0.5)).abs() < 1e-12);
        assert_eq!(separator.classify(&sample), -1.0);
        assert_eq!(separator.full_weights(), vec![2.0, -1.0, 0.5]);
    }

    #[test]
    fn test_fold_ranges_cover_all_samples() {
        let ranges = fold_ranges(23, 10);
        assert_eq!(ranges.len(), 10);
        assert_eq!(ranges[0].0, 0);
        assert_eq!(ranges[9].1, 23);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }

        assert_eq!(fold_ranges(3, 10).len(), 3);
    }

    #[test]
    fn test_single_class_is_rejected() {
        let samples = vec![DVector::from_vec(vec![1.0]), DVector::from_vec(vec![2.0])];
        let err = validate_training_set(&samples, &[1.0, 1.0]).unwrap_err();
        assert!(matches!(err, Error::Training(_)));
    }

    #[test]
    fn test_zero_separator_is_rejected() {
        let err = check_separator(Separator::new(DVector::zeros(3), 1.0)).unwrap_err();
        assert!(matches!(err, Error::Training(_)));
    }

    /// Trainer whose separator ignores the hyperparameter, so every
    /// candidate ties.
    struct Fixed {
        grid: Vec<f64>,
    }

    impl Trainer for Fixed {
        fn candidates(&self) -> Vec<f64> {
            self.grid.clone()
        }

        fn fit(&self, _: f64, _: &[FeatureVector], _: &[f64]) -> Result<Separator> {
            Ok(Separator::new(DVector::from_vec(vec![1.0]), 0.0))
        }
    }

    #[test]
    fn test_cross_validation_keeps_earliest_candidate_on_ties() {
        let samples: Vec<FeatureVector> = [-2.0, -1.0, 1.0, 2.0]
            .iter()
            .map(|&x| DVector::from_vec(vec![x]))
            .collect();
        let labels = [-1.0, -1.0, 1.0, 1.0];
        let trainer = Fixed {
            grid: vec![100.0, 10.0, 1.0],
        };

        assert_eq!(trainer.cross_validate(2, &samples, &labels).unwrap(), 100.0);
    }
}
