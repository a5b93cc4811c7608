//! Placement of the suggested decision line through the sparsest region of
//! the projected plane.
//!
//! Candidate pivots are spread on the segment joining the two class
//! reference points. Around each pivot a line is swept through `directions`
//! unoriented angles; the density of a line is the total neighbor count at
//! evenly spaced positions along it. The least dense line wins, the earliest
//! pivot then the earliest angle on ties.

use std::f64::consts::PI;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::SearchConfig;
use crate::discriminant::Discriminants;
use crate::geometry::{Bounds, Line, Point2};
use crate::spatial::SpatialIndex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary {
    pub pivot: Point2,
    /// Unit direction of the line
    pub direction: Point2,
    pub density: usize,
    pub line: Line,
}

/// Index every projected point, unlabeled and labeled alike.
pub fn build_index<I: SpatialIndex>(discriminants: &Discriminants) -> I {
    let bounds = discriminants.bounds();
    let capacity = discriminants.proj1.len() + discriminants.unlabeled.len();
    let mut index = I::build(bounds, capacity);
    for point in discriminants.all_points() {
        index.insert(point);
    }
    index
}

pub struct DensitySearch<'a, I: SpatialIndex> {
    index: &'a I,
    pivots: usize,
    directions: usize,
    step: f64,
    radius: f64,
}

impl<'a, I: SpatialIndex> DensitySearch<'a, I> {
    /// `bounds` must cover every indexed point; its larger extent sets the
    /// spacing of the positions sampled along a line.
    pub fn new(index: &'a I, bounds: Bounds, config: &SearchConfig) -> Self {
        let pivots = config.pivots.max(1);
        Self {
            index,
            pivots,
            directions: config.directions.max(1),
            step: bounds.range() / pivots as f64,
            radius: config.radius(),
        }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Unit vector of the `slot`-th direction, covering `[0, PI)`.
    pub fn direction(&self, slot: usize) -> Point2 {
        Point2::unit(PI * slot as f64 / self.directions as f64)
    }

    /// Neighbor count summed over `pivots` positions centered on `pivot`.
    pub fn density(&self, pivot: Point2, direction: Point2) -> usize {
        let center = (self.pivots - 1) as f64 / 2.0;
        (0..self.pivots)
            .map(|k| {
                let offset = (k as f64 - center) * self.step;
                self.index.count_within(pivot + direction * offset, self.radius)
            })
            .sum()
    }

    /// Densities of every direction around `pivot`, one slot per direction.
    pub fn scan(&self, pivot: Point2) -> Vec<usize> {
        (0..self.directions)
            .into_par_iter()
            .map(|slot| self.density(pivot, self.direction(slot)))
            .collect()
    }

    pub fn run(&self, negative: Point2, positive: Point2) -> Boundary {
        info!(
            pivots = self.pivots + 1,
            directions = self.directions,
            radius = self.radius,
            "searching least dense line"
        );

        let mut best: Option<(Point2, usize, usize)> = None;
        for p in 0..=self.pivots {
            let pivot = negative.lerp(positive, p as f64 / self.pivots as f64);
            let densities = self.scan(pivot);

            for (slot, &density) in densities.iter().enumerate() {
                if best.is_none_or(|(_, _, least)| density < least) {
                    best = Some((pivot, slot, density));
                }
            }
            debug!(pivot = p, least = best.map(|(_, _, d)| d), "pivot scanned");
        }

        let (pivot, slot, density) = best.unwrap_or((negative, 0, 0));
        let direction = self.direction(slot);
        let line = Line::through(pivot, direction);
        info!(?pivot, ?direction, density, "least dense line found");

        Boundary {
            pivot,
            direction,
            density,
            line,
        }
    }
}
