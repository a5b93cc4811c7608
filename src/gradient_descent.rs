use nalgebra::DVector;
use ndarray::{Array1, Array2, ArrayView1};

use crate::error::Result;
use crate::features::FeatureVector;
use crate::trainer::{Separator, Trainer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossType {
    Logistic,
    Hinge,
}

/// Full-batch gradient descent on a margin loss with an L2 penalty on the
/// weights. The hyperparameter is the penalty strength; the bias is not
/// penalized.
#[derive(Debug, Clone)]
pub struct LinearClassifier {
    pub learning_rate: f64,
    pub epochs: usize,
    pub loss_type: LossType,
    pub regularization_grid: Vec<f64>,
}

impl Default for LinearClassifier {
    fn default() -> Self {
        Self::new(0.1, 2000, LossType::Hinge)
    }
}

struct Gradient {
    weights: Array1<f64>,
    bias: f64,
}

impl LinearClassifier {
    pub fn new(learning_rate: f64, epochs: usize, loss_type: LossType) -> Self {
        Self {
            learning_rate,
            epochs,
            loss_type,
            regularization_grid: vec![1e-4, 1e-3, 1e-2, 1e-1],
        }
    }

    fn design_matrix(samples: &[FeatureVector]) -> Array2<f64> {
        let dimension = samples.first().map_or(0, |sample| sample.len());
        Array2::from_shape_fn((samples.len(), dimension), |(i, j)| samples[i][j])
    }

    fn compute_loss_gradient(
        &self,
        features: &Array2<f64>,
        labels: &Array1<f64>,
        weights: &Array1<f64>,
        bias: f64,
    ) -> Gradient {
        match self.loss_type {
            LossType::Logistic => Self::get_logistic_loss_gradient(features, labels, weights, bias),
            LossType::Hinge => Self::get_hinge_loss_gradient(features, labels, weights, bias),
        }
    }

    fn get_logistic_loss_gradient(
        features: &Array2<f64>,
        labels: &Array1<f64>,
        weights: &Array1<f64>,
        bias: f64,
    ) -> Gradient {
        let mut gradient: Array1<f64> = Array1::zeros(weights.len());
        let mut bias_gradient = 0.0;
        let n_samples = features.nrows() as f64;

        for (sample_features, &label) in features.rows().into_iter().zip(labels) {
            let margin = label * (sample_features.dot(weights) + bias);
            let probability = 1.0 / (1.0 + margin.exp());

            gradient.zip_mut_with(&sample_features, |current_gradient, &feature_value| {
                *current_gradient -= feature_value * label * probability;
            });
            bias_gradient -= label * probability;
        }

        Gradient {
            weights: gradient / n_samples,
            bias: bias_gradient / n_samples,
        }
    }

    fn get_hinge_loss_gradient(
        features: &Array2<f64>,
        labels: &Array1<f64>,
        weights: &Array1<f64>,
        bias: f64,
    ) -> Gradient {
        let mut gradient: Array1<f64> = Array1::zeros(weights.len());
        let mut bias_gradient = 0.0;
        let n_samples = features.nrows() as f64;

        for (sample_features, &label) in features.rows().into_iter().zip(labels) {
            let margin = label * (sample_features.dot(weights) + bias);

            if margin < 1.0 {
                gradient.zip_mut_with(&sample_features, |current_gradient, &feature_value| {
                    *current_gradient -= label * feature_value;
                });
                bias_gradient -= label;
            }
        }

        Gradient {
            weights: gradient / n_samples,
            bias: bias_gradient / n_samples,
        }
    }
}

impl Trainer for LinearClassifier {
    fn candidates(&self) -> Vec<f64> {
        self.regularization_grid.clone()
    }

    fn fit(&self, regularization: f64, samples: &[FeatureVector], labels: &[f64]) -> Result<Separator> {
        let features = Self::design_matrix(samples);
        let labels = ArrayView1::from(labels).to_owned();

        let mut weights: Array1<f64> = Array1::zeros(features.ncols());
        let mut bias = 0.0;

        for _ in 0..self.epochs {
            let mut gradient = self.compute_loss_gradient(&features, &labels, &weights, bias);
            gradient.weights.scaled_add(2.0 * regularization, &weights);

            weights.scaled_add(-self.learning_rate, &gradient.weights);
            bias -= self.learning_rate * gradient.bias;
        }

        Ok(Separator::new(DVector::from_vec(weights.to_vec()), bias))
    }
}
