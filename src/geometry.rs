//! Points, bounds and lines of the projected plane.

use std::ops::{Add, Mul, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unit vector at `angle` radians from the x axis.
    pub fn unit(angle: f64) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    /// `self + (other - self) * t`
    pub fn lerp(self, other: Self, t: f64) -> Self {
        self + (other - self) * t
    }

    pub fn as_array(self) -> [f64; 2] {
        [self.x, self.y]
    }
}

impl Add for Point2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point2 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// Axis-aligned bounding box. Empty until the first point is added.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min_x: f64::MAX,
            max_x: -f64::MAX,
            min_y: f64::MAX,
            max_y: -f64::MAX,
        }
    }
}

impl Bounds {
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point2>) -> Self {
        let mut bounds = Self::default();
        for point in points {
            bounds.extend(*point);
        }
        bounds
    }

    pub fn extend(&mut self, point: Point2) {
        self.min_x = self.min_x.min(point.x);
        self.max_x = self.max_x.max(point.x);
        self.min_y = self.min_y.min(point.y);
        self.max_y = self.max_y.max(point.y);
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Largest extent along either axis.
    pub fn range(&self) -> f64 {
        self.width().max(self.height())
    }

    /// Largest absolute coordinate reached by the box.
    pub fn abs_max(&self) -> f64 {
        (-self.min_x).max(self.max_x).max(-self.min_y).max(self.max_y).abs()
    }
}

/// Homogeneous line `wx * x + wy * y + wc = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub wx: f64,
    pub wy: f64,
    pub wc: f64,
}

impl Line {
    /// Line through `pivot` with unit `direction`.
    ///
    /// One of the two coefficients is normalized to `-1`, choosing the one
    /// that stays finite when the direction is vertical.
    #[allow(clippy::float_cmp)]
    pub fn through(pivot: Point2, direction: Point2) -> Self {
        if direction.x == 0.0 {
            let wy = direction.x / direction.y;
            Self {
                wx: -1.0,
                wy,
                wc: pivot.x - pivot.y * wy,
            }
        } else {
            let wx = direction.y / direction.x;
            Self {
                wx,
                wy: -1.0,
                wc: pivot.y - pivot.x * wx,
            }
        }
    }

    pub fn evaluate(&self, point: Point2) -> f64 {
        self.wx * point.x + self.wy * point.y + self.wc
    }
}
