//! Two successive discriminant directions.
//!
//! The first separator is trained on the raw features. Its direction is then
//! projected out of every sample and a second separator is trained on what
//! remains, much like PCA but seeking separability instead of variance.

use tracing::info;

use crate::error::Result;
use crate::features::{FeatureVector, LabeledSet};
use crate::geometry::{Bounds, Point2};
use crate::trainer::{Separator, Trainer};

/// Remove the component along `separator`'s weight direction from every sample.
///
/// `scores` are the separator's predictions for `samples`; the bias is taken
/// back out of them so each result is exactly orthogonal to the weights.
pub fn deflate(samples: &[FeatureVector], scores: &[f64], separator: &Separator) -> Vec<FeatureVector> {
    let w2 = separator.norm_squared();
    samples
        .iter()
        .zip(scores)
        .map(|(sample, &score)| {
            let c = (score - separator.bias) / w2;
            sample - &separator.weights * c
        })
        .collect()
}

/// Both separators plus the projected coordinates they induce.
#[derive(Debug, Clone)]
pub struct Discriminants {
    pub first: Separator,
    pub second: Separator,
    /// First separator's score for each labeled sample, in shuffled order
    pub proj1: Vec<f64>,
    /// Second separator's score for each deflated labeled sample
    pub proj2: Vec<f64>,
    pub labels: Vec<f64>,
    pub unlabeled: Vec<Point2>,
}

impl Discriminants {
    pub fn labeled_points(&self) -> impl Iterator<Item = Point2> + '_ {
        self.proj1
            .iter()
            .zip(&self.proj2)
            .map(|(&x, &y)| Point2::new(x, y))
    }

    /// Every projected point, unlabeled ones first.
    pub fn all_points(&self) -> impl Iterator<Item = Point2> + '_ {
        self.unlabeled.iter().copied().chain(self.labeled_points())
    }

    /// Per-class centroids `(negative, positive)` of the projected samples.
    pub fn reference_points(&self) -> (Point2, Point2) {
        let mut sums = [Point2::default(); 2];
        let mut counts = [0usize; 2];
        for (point, &label) in self.labeled_points().zip(&self.labels) {
            let class = usize::from(label > 0.0);
            sums[class] = sums[class] + point;
            counts[class] += 1;
        }
        (
            sums[0] * (1.0 / counts[0].max(1) as f64),
            sums[1] * (1.0 / counts[1].max(1) as f64),
        )
    }

    pub fn labeled_bounds(&self) -> Bounds {
        let mut bounds = Bounds::default();
        self.labeled_points().for_each(|point| bounds.extend(point));
        bounds
    }

    pub fn bounds(&self) -> Bounds {
        let mut bounds = Bounds::default();
        self.all_points().for_each(|point| bounds.extend(point));
        bounds
    }

    /// Project a new feature vector with both separators.
    pub fn project(&self, features: &FeatureVector) -> Point2 {
        Point2::new(self.first.predict(features), self.second.predict(features))
    }
}

/// Train the two separators on `set`, whose order must already be randomized.
/// The order is kept as is so both projections stay index-aligned.
pub fn extract<T: Trainer + ?Sized>(
    trainer: &T,
    folds: usize,
    set: &LabeledSet,
    unlabeled: &[FeatureVector],
) -> Result<Discriminants> {
    info!(samples = set.len(), "cross-validating first direction");
    let hyperparameter = trainer.cross_validate(folds, &set.vectors, &set.labels)?;
    info!(hyperparameter, "training first direction");
    let first = trainer.train(folds, hyperparameter, &set.vectors, &set.labels)?;

    let proj1: Vec<f64> = set.vectors.iter().map(|s| first.predict(s)).collect();
    let deflated = deflate(&set.vectors, &proj1, &first);

    info!("cross-validating orthogonal direction");
    let hyperparameter = trainer.cross_validate(folds, &deflated, &set.labels)?;
    info!(hyperparameter, "training orthogonal direction");
    let second = trainer.train(folds, hyperparameter, &deflated, &set.labels)?;

    let proj2 = deflated.iter().map(|s| second.predict(s)).collect();
    let unlabeled = unlabeled
        .iter()
        .map(|u| Point2::new(first.predict(u), second.predict(u)))
        .collect();

    Ok(Discriminants {
        first,
        second,
        proj1,
        proj2,
        labels: set.labels.clone(),
        unlabeled,
    })
}
