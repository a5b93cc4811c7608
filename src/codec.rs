//! Binary record of everything needed to reapply a projection, and its
//! base64 text form embedded in the output document.
//!
//! Layout, little endian:
//!
//! ```text
//! i32 scale_count
//! f32 x scale_count           scales
//! f32 x (2 * scale_count + 1) first separator, bias last
//! f32 x (2 * scale_count + 1) second separator, bias last
//! f32                         largest absolute projected coordinate
//! f32                         projected-to-canvas scale factor
//! i32                         canvas half size
//! ```

use base64::{engine::general_purpose, Engine as _};

use crate::error::{Error, Result};
use crate::trainer::Separator;

const COMMENT_PREFIX: &str = "<!-- params ";
const COMMENT_SUFFIX: &str = " -->";
const TEXT_PREFIX: &str = "params=";
const TEXT_SUFFIX: &str = "</text>";

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionParams {
    pub scales: Vec<f32>,
    pub first: Vec<f32>,
    pub second: Vec<f32>,
    pub abs_max: f32,
    pub scale_factor: f32,
    pub half_size: i32,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl Cursor<'_> {
    fn take(&mut self) -> Result<[u8; 4]> {
        let end = self.position + 4;
        let chunk = self
            .bytes
            .get(self.position..end)
            .ok_or_else(|| Error::Codec(format!("record truncated at byte {}", self.position)))?;
        self.position = end;
        let mut word = [0u8; 4];
        word.copy_from_slice(chunk);
        Ok(word)
    }

    fn i32(&mut self) -> Result<i32> {
        self.take().map(i32::from_le_bytes)
    }

    fn f32(&mut self) -> Result<f32> {
        self.take().map(f32::from_le_bytes)
    }

    fn f32s(&mut self, count: usize) -> Result<Vec<f32>> {
        (0..count).map(|_| self.f32()).collect()
    }
}

impl ProjectionParams {
    pub fn new(
        scales: &[f64],
        first: &Separator,
        second: &Separator,
        abs_max: f64,
        scale_factor: f64,
        half_size: i32,
    ) -> Self {
        let narrow = |values: Vec<f64>| -> Vec<f32> { values.into_iter().map(|v| v as f32).collect() };
        Self {
            scales: scales.iter().map(|&s| s as f32).collect(),
            first: narrow(first.full_weights()),
            second: narrow(second.full_weights()),
            abs_max: abs_max as f32,
            scale_factor: scale_factor as f32,
            half_size,
        }
    }

    pub fn dimension(&self) -> usize {
        self.scales.len() * 2
    }

    /// Size in bytes of the record for `scale_count` scales.
    pub fn encoded_len(scale_count: usize) -> usize {
        4 * (1 + scale_count + 2 * (2 * scale_count + 1) + 3)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::encoded_len(self.scales.len()));
        bytes.extend((self.scales.len() as i32).to_le_bytes());
        for value in self.scales.iter().chain(&self.first).chain(&self.second) {
            bytes.extend(value.to_le_bytes());
        }
        bytes.extend(self.abs_max.to_le_bytes());
        bytes.extend(self.scale_factor.to_le_bytes());
        bytes.extend(self.half_size.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor { bytes, position: 0 };

        let scale_count = cursor.i32()?;
        let scale_count = usize::try_from(scale_count)
            .ok()
            .filter(|&count| count > 0)
            .ok_or_else(|| Error::Codec(format!("invalid scale count {scale_count}")))?;

        let expected = Self::encoded_len(scale_count);
        if bytes.len() != expected {
            return Err(Error::Codec(format!(
                "expected {expected} bytes for {scale_count} scales, got {}",
                bytes.len()
            )));
        }

        let weights = 2 * scale_count + 1;
        Ok(Self {
            scales: cursor.f32s(scale_count)?,
            first: cursor.f32s(weights)?,
            second: cursor.f32s(weights)?,
            abs_max: cursor.f32()?,
            scale_factor: cursor.f32()?,
            half_size: cursor.i32()?,
        })
    }

    pub fn encode(&self) -> String {
        general_purpose::STANDARD.encode(self.to_bytes())
    }

    pub fn decode(text: &str) -> Result<Self> {
        let bytes = general_purpose::STANDARD.decode(text.trim())?;
        Self::from_bytes(&bytes)
    }

    /// Locate the parameters in a document written by this tool, either as a
    /// comment or as a hidden text node.
    pub fn from_svg(document: &str) -> Result<Self> {
        let encoded = between(document, COMMENT_PREFIX, COMMENT_SUFFIX)
            .or_else(|| between(document, TEXT_PREFIX, TEXT_SUFFIX))
            .ok_or_else(|| Error::Codec("no parameters found in document".to_string()))?;
        Self::decode(encoded)
    }

    /// Score a feature vector with both stored separators.
    pub fn project(&self, features: &[f64]) -> Result<(f64, f64)> {
        if features.len() != self.dimension() {
            return Err(Error::Codec(format!(
                "feature vector has {} values, parameters expect {}",
                features.len(),
                self.dimension()
            )));
        }
        let score = |weights: &[f32]| {
            let (bias, weights) = weights.split_last().map_or((0.0, weights), |(b, w)| (*b, w));
            weights
                .iter()
                .zip(features)
                .map(|(&w, &x)| f64::from(w) * x)
                .sum::<f64>()
                + f64::from(bias)
        };
        Ok((score(&self.first), score(&self.second)))
    }

    /// Map a projected point to canvas pixels.
    pub fn to_canvas(&self, point: (f64, f64)) -> (f64, f64) {
        let half = f64::from(self.half_size);
        let scale = f64::from(self.scale_factor);
        (point.0 * scale + half, half - point.1 * scale)
    }
}

fn between<'a>(document: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    let start = document.find(prefix)? + prefix.len();
    let end = document[start..].find(suffix)? + start;
    Some(&document[start..end])
}

pub fn comment(encoded: &str) -> String {
    format!("{COMMENT_PREFIX}{encoded}{COMMENT_SUFFIX}")
}

pub fn hidden_text(encoded: &str) -> String {
    format!(
        "<text style=\"font-size:1px;fill:#ffffff;fill-opacity:0;stroke:none\" x=\"20\" y=\"20\">{TEXT_PREFIX}{encoded}{TEXT_SUFFIX}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;

    fn params() -> ProjectionParams {
        let first = Separator::new(DVector::from_vec(vec![1.5, -2.25, 0.125, 3.0]), -0.5);
        let second = Separator::new(DVector::from_vec(vec![0.1, 0.2, -0.3, 0.4]), 0.05);
        ProjectionParams::new(&[0.05, 0.3], &first, &second, 7.25, 400.0 / 7.25, 400)
    }

    #[test]
    fn test_layout_size() {
        let params = params();
        let bytes = params.to_bytes();

        assert_eq!(bytes.len(), ProjectionParams::encoded_len(2));
        assert_eq!(bytes.len(), 4 * (1 + 2 + 5 + 5 + 3));
        assert_eq!(&bytes[..4], &2i32.to_le_bytes());
        assert_eq!(&bytes[bytes.len() - 4..], &400i32.to_le_bytes());
    }

    #[test]
    fn test_binary_and_text_round_trip() {
        let params = params();

        let decoded = ProjectionParams::from_bytes(&params.to_bytes()).unwrap();
        assert_eq!(decoded, params);
        assert_eq!(decoded.to_bytes(), params.to_bytes());

        let decoded = ProjectionParams::decode(&params.encode()).unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn test_rejects_malformed_records() {
        let bytes = params().to_bytes();

        assert!(matches!(
            ProjectionParams::from_bytes(&bytes[..bytes.len() - 1]),
            Err(Error::Codec(_))
        ));

        let mut extended = bytes.clone();
        extended.extend([0, 0, 0, 0]);
        assert!(ProjectionParams::from_bytes(&extended).is_err());

        let mut zero_scales = bytes;
        zero_scales[..4].copy_from_slice(&0i32.to_le_bytes());
        assert!(ProjectionParams::from_bytes(&zero_scales).is_err());

        assert!(matches!(ProjectionParams::decode("not base64!"), Err(Error::Codec(_))));
    }

    #[test]
    fn test_from_svg_finds_both_embeddings() {
        let params = params();
        let encoded = params.encode();

        let with_comment = format!("<svg>\n{}\n<image/></svg>", comment(&encoded));
        assert_eq!(ProjectionParams::from_svg(&with_comment).unwrap(), params);

        let with_text = format!("<svg>\n{}\n</svg>", hidden_text(&encoded));
        assert_eq!(ProjectionParams::from_svg(&with_text).unwrap(), params);

        assert!(ProjectionParams::from_svg("<svg></svg>").is_err());
    }

    #[test]
    fn test_project_uses_weights_and_bias() {
        let params = params();

        let (x, y) = params.project(&[1.0, 0.0, 0.0, 2.0]).unwrap();

        assert!((x - (1.5 + 6.0 - 0.5)).abs() < 1e-6);
        assert!((y - (0.1 + 0.8 + 0.05)).abs() < 1e-6);
        assert!(params.project(&[1.0]).is_err());
    }
}
