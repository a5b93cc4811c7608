use nalgebra::DVector;
use tracing::debug;

use crate::error::Result;
use crate::features::FeatureVector;
use crate::trainer::{Separator, Trainer};

/// Linear-kernel support vector machine trained with sequential minimal
/// optimization. The hyperparameter is the box constraint `C`.
#[derive(Debug, Clone)]
pub struct SupportVectorMachine {
    error_tolerance: f64,
    max_passes: usize,
    max_sweeps: usize,
    regularization_grid: Vec<f64>,
}

impl Default for SupportVectorMachine {
    fn default() -> Self {
        Self::new(1e-3, 5, 2000)
    }
}

impl SupportVectorMachine {
    pub fn new(tolerance: f64, max_passes: usize, max_sweeps: usize) -> Self {
        Self {
            error_tolerance: tolerance,
            max_passes,
            max_sweeps,
            regularization_grid: vec![100.0, 10.0, 1.0, 0.1],
        }
    }

    pub fn with_grid(mut self, grid: Vec<f64>) -> Self {
        self.regularization_grid = grid;
        self
    }

    fn kernel_function(first_sample: &FeatureVector, second_sample: &FeatureVector) -> f64 {
        first_sample.dot(second_sample)
    }

    fn get_empirical_risk(
        samples: &[FeatureVector],
        labels: &[f64],
        weights: &DVector<f64>,
        bias: f64,
    ) -> f64 {
        let total_loss: f64 = samples
            .iter()
            .zip(labels)
            .map(|(sample, &label)| f64::max(0.0, 1.0 - label * (weights.dot(sample) + bias)))
            .sum();

        total_loss / samples.len() as f64
    }
}

impl Trainer for SupportVectorMachine {
    fn candidates(&self) -> Vec<f64> {
        self.regularization_grid.clone()
    }

    #[allow(clippy::similar_names)]
    fn fit(&self, regularization: f64, samples: &[FeatureVector], labels: &[f64]) -> Result<Separator> {
        let n = samples.len();
        let dimension = samples.first().map_or(0, |sample| sample.len());

        let mut alphas = vec![0.0; n];
        let mut weights = DVector::zeros(dimension);
        let mut bias = 0.0;

        if n < 2 {
            return Ok(Separator::new(weights, bias));
        }

        let self_products: Vec<f64> = samples.iter().map(|s| Self::kernel_function(s, s)).collect();

        let mut passes = 0;
        let mut sweep = 0;

        while passes < self.max_passes && sweep < self.max_sweeps {
            let mut alpha_pairs_changed = 0;

            for i in 0..n {
                let sample_error = weights.dot(&samples[i]) + bias - labels[i];

                if !((labels[i] * sample_error < -self.error_tolerance && alphas[i] < regularization)
                    || (labels[i] * sample_error > self.error_tolerance && alphas[i] > 0.0))
                {
                    continue;
                }

                // pair partner rotates with every sweep, never equal to i
                let j = (i + 1 + sweep % (n - 1)) % n;
                let error_j = weights.dot(&samples[j]) + bias - labels[j];

                let prev_alpha_i = alphas[i];
                let prev_alpha_j = alphas[j];

                let (l, h) = if (labels[i] - labels[j]).abs() > f64::EPSILON {
                    (
                        f64::max(0.0, alphas[j] - alphas[i]),
                        f64::min(regularization, regularization + alphas[j] - alphas[i]),
                    )
                } else {
                    (
                        f64::max(0.0, alphas[i] + alphas[j] - regularization),
                        f64::min(regularization, alphas[i] + alphas[j]),
                    )
                };

                if l >= h {
                    continue;
                }

                let k_ij = Self::kernel_function(&samples[i], &samples[j]);
                let eta = 2.0 * k_ij - self_products[i] - self_products[j];

                if eta >= 0.0 {
                    continue;
                }

                alphas[j] -= labels[j] * (sample_error - error_j) / eta;
                alphas[j] = alphas[j].clamp(l, h);

                if (alphas[j] - prev_alpha_j).abs() < 1e-5 {
                    alphas[j] = prev_alpha_j;
                    continue;
                }

                alphas[i] += labels[i] * labels[j] * (prev_alpha_j - alphas[j]);

                let delta_i = labels[i] * (alphas[i] - prev_alpha_i);
                let delta_j = labels[j] * (alphas[j] - prev_alpha_j);

                let first_bias_candidate =
                    bias - sample_error - delta_i * self_products[i] - delta_j * k_ij;
                let second_bias_candidate =
                    bias - error_j - delta_i * k_ij - delta_j * self_products[j];

                if 0.0 < alphas[i] && alphas[i] < regularization {
                    bias = first_bias_candidate;
                } else if 0.0 < alphas[j] && alphas[j] < regularization {
                    bias = second_bias_candidate;
                } else {
                    bias = (first_bias_candidate + second_bias_candidate) / 2.0;
                }

                weights.axpy(delta_i, &samples[i], 1.0);
                weights.axpy(delta_j, &samples[j], 1.0);

                alpha_pairs_changed += 1;
            }

            if alpha_pairs_changed == 0 {
                passes += 1;
            } else {
                passes = 0;
            }
            sweep += 1;
        }

        let support_vectors = alphas.iter().filter(|&&alpha| alpha > 1e-5).count();
        debug!(
            regularization,
            sweeps = sweep,
            support_vectors,
            risk = Self::get_empirical_risk(samples, labels, &weights, bias),
            "SMO finished"
        );

        Ok(Separator::new(weights, bias))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<FeatureVector>, Vec<f64>) {
        let mut samples = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            let offset = (i % 5) as f64 * 0.1;
            samples.push(DVector::from_vec(vec![-2.0 - offset, offset - 0.2]));
            labels.push(-1.0);
            samples.push(DVector::from_vec(vec![2.0 + offset, 0.2 - offset]));
            labels.push(1.0);
        }
        (samples, labels)
    }

    #[test]
    fn test_separates_linearly_separable_data() {
        let (samples, labels) = separable();
        let svm = SupportVectorMachine::default();

        let separator = svm.train(5, 10.0, &samples, &labels).unwrap();

        assert_eq!(separator.training_error(&samples, &labels), 0);
        assert!(separator.weights[0] > 0.0);
    }

    #[test]
    fn test_cross_validation_returns_a_grid_value() {
        let (samples, labels) = separable();
        let svm = SupportVectorMachine::default().with_grid(vec![10.0, 1.0]);

        let regularization = svm.cross_validate(4, &samples, &labels).unwrap();

        assert!(regularization == 10.0 || regularization == 1.0);
    }

    #[test]
    fn test_identical_classes_fail() {
        let samples = vec![DVector::from_vec(vec![1.0, 1.0]); 6];
        let labels = vec![-1.0, 1.0, -1.0, 1.0, -1.0, 1.0];

        let result = SupportVectorMachine::default().train(3, 1.0, &samples, &labels);

        assert!(result.is_err());
    }
}
