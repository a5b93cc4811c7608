/// Which linear trainer produces the two separators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrainerKind {
    /// Linear support vector machine trained by SMO
    #[default]
    Smo,
    /// Full-batch gradient descent on the hinge loss
    Gradient,
}

#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub kind: TrainerKind,
    pub folds: usize,
    /// Seed of the one-time sample permutation
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            kind: TrainerKind::Smo,
            folds: 10,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Pivot intervals between the two reference points (`pivots + 1` pivots)
    pub pivots: usize,
    /// Unoriented directions scanned per pivot, evenly covering 0..180 degrees
    pub directions: usize,
    /// Classification confidence defining the neighbor radius
    pub confidence: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            pivots: 25,
            directions: 90,
            confidence: 0.9,
        }
    }
}

impl SearchConfig {
    /// Half of the distance at which a calibrated linear separator reaches
    /// `confidence` on a logistic link.
    pub fn radius(&self) -> f64 {
        -(1.0 / self.confidence - 1.0).ln() / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RasterFormat {
    /// PNG inlined into the SVG as a data URI
    #[default]
    Png,
    /// Plain PPM written next to the SVG and referenced by name
    Ppm,
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub canvas_size: u32,
    /// Embed the parameters as an invisible text node instead of a comment
    pub params_as_text: bool,
    pub raster: RasterFormat,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            canvas_size: 800,
            params_as_text: false,
            raster: RasterFormat::Png,
        }
    }
}

impl RenderConfig {
    pub fn half_size(&self) -> i32 {
        (self.canvas_size / 2) as i32
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub trainer: TrainerConfig,
    pub search: SearchConfig,
    pub render: RenderConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_radius_matches_ninety_percent_confidence() {
        let radius = SearchConfig::default().radius();
        let expected = -(1.0_f64 / 0.9 - 1.0).ln() / 2.0;

        assert!((radius - expected).abs() < 1e-12);
        assert!((radius - 1.098_612_288_668_109_8).abs() < 1e-9);
    }

    #[test]
    fn test_half_size() {
        assert_eq!(RenderConfig::default().half_size(), 400);
    }
}
