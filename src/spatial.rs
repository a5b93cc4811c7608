use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::OnceLock;

use kiddo::{ImmutableKdTree, SquaredEuclidean};

use crate::geometry::{Bounds, Point2};

/// Neighbor counting over a fixed set of 2D points.
pub trait SpatialIndex: Sync {
    fn build(bounds: Bounds, capacity: usize) -> Self
    where
        Self: Sized;

    fn insert(&mut self, point: Point2);

    /// Number of indexed points strictly closer than `radius` to `query`.
    fn count_within(&self, query: Point2, radius: f64) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// k-d tree backed index.
///
/// Points are collected on insert and the tree is built on the first query.
/// Exact duplicates share one tree entry with a multiplicity.
pub struct KdIndex {
    positions: Vec<[f64; 2]>,
    tree: OnceLock<ImmutableKdTree<f64, 2>>,
    bounds: Bounds,
    multiplicity: Vec<usize>,
    slots: HashMap<[u64; 2], usize>,
    len: usize,
}

impl KdIndex {
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Number of distinct positions stored in the tree.
    pub fn distinct(&self) -> usize {
        self.positions.len()
    }

    fn tree(&self) -> &ImmutableKdTree<f64, 2> {
        self.tree
            .get_or_init(|| ImmutableKdTree::new_from_slice(&self.positions))
    }
}

impl SpatialIndex for KdIndex {
    fn build(bounds: Bounds, capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
            tree: OnceLock::new(),
            bounds,
            multiplicity: Vec::with_capacity(capacity),
            slots: HashMap::with_capacity(capacity),
            len: 0,
        }
    }

    fn insert(&mut self, point: Point2) {
        let key = [point.x.to_bits(), point.y.to_bits()];
        match self.slots.entry(key) {
            Entry::Occupied(slot) => self.multiplicity[*slot.get()] += 1,
            Entry::Vacant(slot) => {
                slot.insert(self.positions.len());
                self.positions.push(point.as_array());
                self.multiplicity.push(1);
                self.tree.take();
            }
        }
        self.len += 1;
    }

    fn count_within(&self, query: Point2, radius: f64) -> usize {
        if self.positions.is_empty() {
            return 0;
        }
        self.tree()
            .within_unsorted::<SquaredEuclidean>(&query.as_array(), radius * radius)
            .iter()
            .map(|neighbour| self.multiplicity[neighbour.item as usize])
            .sum()
    }

    fn len(&self) -> usize {
        self.len
    }
}

/// Linear scan, used to cross-check the tree.
#[derive(Debug, Default)]
pub struct BruteForceIndex {
    points: Vec<Point2>,
}

impl SpatialIndex for BruteForceIndex {
    fn build(_bounds: Bounds, capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    fn insert(&mut self, point: Point2) {
        self.points.push(point);
    }

    fn count_within(&self, query: Point2, radius: f64) -> usize {
        let radius_squared = radius * radius;
        self.points
            .iter()
            .filter(|p| {
                let delta = **p - query;
                delta.x * delta.x + delta.y * delta.y < radius_squared
            })
            .count()
    }

    fn len(&self) -> usize {
        self.points.len()
    }
}
