//! Loading of multi-scale feature files.
//!
//! A feature file is a little-endian binary stream:
//!
//! ```text
//! i32 point_count
//! i32 scale_count, then scale_count f32 scales
//! i32 aux_param_count
//! per point: aux_param_count f32 (ignored)
//!            scale_count pairs of f32 barycentric components (a, b)
//!            scale_count i32 (ignored)
//! ```

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use nalgebra::DVector;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::error::{Error, Result};

pub type FeatureVector = DVector<f64>;

/// Relative tolerance used when comparing the scales of two files.
pub const SCALE_TOLERANCE: f64 = 1e-6;

const MAX_PREALLOCATED_POINTS: usize = 1 << 16;

const SQRT_3_OVER_2: f64 = 0.866_025_403_784_438_6;

/// Label of the first class group.
pub const NEGATIVE: f64 = -1.0;
/// Label of the second class group.
pub const POSITIVE: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub point_count: usize,
    pub scales: Vec<f64>,
    pub aux_params: usize,
}

impl Header {
    pub fn dimension(&self) -> usize {
        self.scales.len() * 2
    }
}

/// Map barycentric components `(a, b, 1 - a - b)` into the equilateral
/// triangle with vertices a=(0,0), b=(1,0), c=(1/2, sqrt(3)/2).
pub fn embed(a: f64, b: f64) -> (f64, f64) {
    let c = 1.0 - a - b;
    (b + c / 2.0, c * SQRT_3_OVER_2)
}

/// Compare two scale values with a relative tolerance, falling back to an
/// absolute one when the reference is exactly zero.
pub fn scales_match(value: f64, reference: f64) -> bool {
    if reference == 0.0 {
        return value.abs() < SCALE_TOLERANCE;
    }
    let ratio = value / reference;
    ratio > 1.0 - SCALE_TOLERANCE && ratio < 1.0 + SCALE_TOLERANCE
}

fn read_i32<R: Read>(reader: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_f32<R: Read>(reader: &mut R) -> Result<f64> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(f64::from(f32::from_le_bytes(buf)))
}

fn skip<R: Read>(reader: &mut R, bytes: usize) -> Result<()> {
    let copied = std::io::copy(&mut reader.by_ref().take(bytes as u64), &mut std::io::sink())?;
    if copied < bytes as u64 {
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
    }
    Ok(())
}

fn truncated(path: &Path, err: Error) -> Error {
    match err {
        Error::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
            Error::format(path, "unexpected end of file")
        }
        other => other,
    }
}

pub fn read_header<R: Read>(reader: &mut R, path: &Path) -> Result<Header> {
    let point_count = read_i32(reader).map_err(|e| truncated(path, e))?;
    if point_count <= 0 {
        return Err(Error::format(
            path,
            format!("point count must be positive, got {point_count}"),
        ));
    }

    let scale_count = read_i32(reader).map_err(|e| truncated(path, e))?;
    if scale_count <= 0 {
        return Err(Error::format(
            path,
            format!("scale count must be positive, got {scale_count}"),
        ));
    }

    let scales = (0..scale_count)
        .map(|_| read_f32(reader))
        .collect::<Result<Vec<_>>>()
        .map_err(|e| truncated(path, e))?;

    let aux_params = read_i32(reader).map_err(|e| truncated(path, e))?;
    let aux_params = usize::try_from(aux_params).map_err(|_| {
        Error::format(
            path,
            format!("auxiliary parameter count must not be negative, got {aux_params}"),
        )
    })?;

    Ok(Header {
        point_count: point_count as usize,
        scales,
        aux_params,
    })
}

/// Read the point records following `header`, in file order.
pub fn read_points<R: Read>(
    reader: &mut R,
    header: &Header,
    path: &Path,
) -> Result<Vec<FeatureVector>> {
    let scale_count = header.scales.len();
    let mut points = Vec::with_capacity(header.point_count.min(MAX_PREALLOCATED_POINTS));

    for _ in 0..header.point_count {
        skip(reader, header.aux_params * 4).map_err(|e| truncated(path, e))?;

        let mut features = FeatureVector::zeros(header.dimension());
        for scale in 0..scale_count {
            let a = read_f32(reader).map_err(|e| truncated(path, e))?;
            let b = read_f32(reader).map_err(|e| truncated(path, e))?;
            let (x, y) = embed(a, b);
            features[scale * 2] = x;
            features[scale * 2 + 1] = y;
        }

        // per-scale neighbor counts, unused
        skip(reader, scale_count * 4).map_err(|e| truncated(path, e))?;

        points.push(features);
    }

    Ok(points)
}

/// Loads feature files while enforcing that all of them share one scale list.
///
/// The first header seen fixes the canonical scales.
#[derive(Debug, Default)]
pub struct FeatureLoader {
    scales: Option<Vec<f64>>,
}

impl FeatureLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scales(&self) -> Option<&[f64]> {
        self.scales.as_deref()
    }

    pub fn dimension(&self) -> usize {
        self.scales.as_ref().map_or(0, |scales| scales.len() * 2)
    }

    fn check_scales(&mut self, header: &Header, path: &Path) -> Result<()> {
        let Some(canonical) = &self.scales else {
            debug!(?path, scales = ?header.scales, "adopting canonical scales");
            self.scales = Some(header.scales.clone());
            return Ok(());
        };

        if canonical.len() != header.scales.len() {
            return Err(Error::format(
                path,
                format!(
                    "expected {} scales, found {}",
                    canonical.len(),
                    header.scales.len()
                ),
            ));
        }
        for (&reference, &value) in canonical.iter().zip(&header.scales) {
            if !scales_match(value, reference) {
                return Err(Error::format(
                    path,
                    format!("scale {value} does not match {reference}"),
                ));
            }
        }
        Ok(())
    }

    fn open(path: &Path) -> Result<BufReader<File>> {
        Ok(BufReader::new(File::open(path)?))
    }

    /// Validate the header of every file without reading point data.
    /// Returns the total point count.
    pub fn validate_headers(&mut self, paths: &[PathBuf]) -> Result<usize> {
        let mut total = 0;
        for path in paths {
            let mut reader = Self::open(path)?;
            let header = read_header(&mut reader, path)?;
            self.check_scales(&header, path)?;
            total += header.point_count;
        }
        Ok(total)
    }

    pub fn load_file(&mut self, path: &Path) -> Result<Vec<FeatureVector>> {
        let mut reader = Self::open(path)?;
        self.load_from(&mut reader, path)
    }

    pub fn load_from<R: Read>(&mut self, reader: &mut R, path: &Path) -> Result<Vec<FeatureVector>> {
        let header = read_header(reader, path)?;
        self.check_scales(&header, path)?;
        let points = read_points(reader, &header, path)?;
        debug!(?path, points = points.len(), "loaded feature file");
        Ok(points)
    }

    /// Concatenate the points of `paths`, keeping file order then point order.
    pub fn load_group(&mut self, paths: &[PathBuf]) -> Result<Vec<FeatureVector>> {
        let mut points = Vec::new();
        for path in paths {
            points.extend(self.load_file(path)?);
        }
        Ok(points)
    }
}

/// Feature vectors with parallel `±1` labels.
#[derive(Debug, Clone, Default)]
pub struct LabeledSet {
    pub vectors: Vec<FeatureVector>,
    pub labels: Vec<f64>,
}

impl LabeledSet {
    /// First group is labelled `-1`, second group `+1`.
    pub fn from_classes(negative: Vec<FeatureVector>, positive: Vec<FeatureVector>) -> Self {
        let labels = std::iter::repeat(NEGATIVE)
            .take(negative.len())
            .chain(std::iter::repeat(POSITIVE).take(positive.len()))
            .collect();
        let mut vectors = negative;
        vectors.extend(positive);
        Self { vectors, labels }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Apply one random permutation to vectors and labels alike.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);

        self.vectors = order.iter().map(|&i| self.vectors[i].clone()).collect();
        self.labels = order.iter().map(|&i| self.labels[i]).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Cursor;

    fn header_bytes(point_count: i32, scales: &[f32], aux_params: i32) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend(point_count.to_le_bytes());
        bytes.extend((scales.len() as i32).to_le_bytes());
        for scale in scales {
            bytes.extend(scale.to_le_bytes());
        }
        bytes.extend(aux_params.to_le_bytes());
        bytes
    }

    fn point_bytes(aux: &[f32], components: &[(f32, f32)]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for value in aux {
            bytes.extend(value.to_le_bytes());
        }
        for (a, b) in components {
            bytes.extend(a.to_le_bytes());
            bytes.extend(b.to_le_bytes());
        }
        for _ in components {
            bytes.extend(7i32.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_embed_vertices() {
        assert_eq!(embed(1.0, 0.0), (0.0, 0.0));
        assert_eq!(embed(0.0, 1.0), (1.0, 0.0));

        let (x, y) = embed(0.0, 0.0);
        assert!((x - 0.5).abs() < 1e-12);
        assert!((y - 3.0_f64.sqrt() / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_embed_stays_in_triangle() {
        for i in 0..=10 {
            for j in 0..=(10 - i) {
                let (a, b) = (i as f64 / 10.0, j as f64 / 10.0);
                let (x, y) = embed(a, b);
                assert!((-1e-12..=1.0 + 1e-12).contains(&x), "x={x} for a={a} b={b}");
                assert!(y >= -1e-12, "y={y} for a={a} b={b}");
            }
        }
    }

    #[test]
    fn test_scales_match() {
        assert!(scales_match(1.0, 1.0));
        assert!(scales_match(1.000_000_5, 1.0));
        assert!(!scales_match(1.000_01, 1.0));
        assert!(scales_match(1e-7, 0.0));
        assert!(!scales_match(1e-3, 0.0));
    }

    #[test]
    fn test_read_points_skips_aux_fields() {
        let mut bytes = header_bytes(2, &[0.5, 1.0], 3);
        bytes.extend(point_bytes(&[9.0, 9.0, 9.0], &[(1.0, 0.0), (0.0, 1.0)]));
        bytes.extend(point_bytes(&[8.0, 8.0, 8.0], &[(0.0, 0.0), (0.5, 0.5)]));

        let mut loader = FeatureLoader::new();
        let points = loader
            .load_from(&mut Cursor::new(bytes), Path::new("mem"))
            .unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].len(), 4);
        assert_eq!(points[0].as_slice(), &[0.0, 0.0, 1.0, 0.0]);
        assert!((points[1][0] - 0.5).abs() < 1e-7);
        assert!((points[1][1] - SQRT_3_OVER_2).abs() < 1e-7);
        assert!((points[1][2] - 0.5).abs() < 1e-7);
        assert!(points[1][3].abs() < 1e-7);
        assert_eq!(loader.dimension(), 4);
    }

    #[test]
    fn test_zero_point_count_is_format_error() {
        let bytes = header_bytes(0, &[1.0], 0);
        let err = read_header(&mut Cursor::new(bytes), Path::new("empty")).unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
    }

    #[test]
    fn test_huge_point_count_without_data_is_format_error() {
        let bytes = header_bytes(i32::MAX, &[1.0], 0);

        let mut loader = FeatureLoader::new();
        let err = loader
            .load_from(&mut Cursor::new(bytes), Path::new("huge"))
            .unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
    }

    #[test]
    fn test_zero_scale_count_is_format_error() {
        let bytes = header_bytes(4, &[], 0);
        let err = read_header(&mut Cursor::new(bytes), Path::new("noscale")).unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
    }

    #[test]
    fn test_truncated_file_is_format_error() {
        let mut bytes = header_bytes(2, &[1.0], 0);
        bytes.extend(point_bytes(&[], &[(0.2, 0.3)]));

        let mut loader = FeatureLoader::new();
        let err = loader
            .load_from(&mut Cursor::new(bytes), Path::new("short"))
            .unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
    }

    #[test]
    fn test_scale_mismatch_is_rejected() {
        let mut first = header_bytes(1, &[0.1, 0.2], 0);
        first.extend(point_bytes(&[], &[(0.2, 0.3), (0.2, 0.3)]));
        let mut second = header_bytes(1, &[0.1, 0.21], 0);
        second.extend(point_bytes(&[], &[(0.2, 0.3), (0.2, 0.3)]));

        let mut loader = FeatureLoader::new();
        loader
            .load_from(&mut Cursor::new(first), Path::new("first"))
            .unwrap();
        let err = loader
            .load_from(&mut Cursor::new(second), Path::new("second"))
            .unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
    }

    #[test]
    fn test_close_scales_adopt_first_file() {
        let mut first = header_bytes(1, &[0.1, 0.2], 0);
        first.extend(point_bytes(&[], &[(0.2, 0.3), (0.2, 0.3)]));
        let mut second = header_bytes(1, &[0.100_000_01, 0.2], 0);
        second.extend(point_bytes(&[], &[(0.2, 0.3), (0.2, 0.3)]));

        let mut loader = FeatureLoader::new();
        loader
            .load_from(&mut Cursor::new(first), Path::new("first"))
            .unwrap();
        loader
            .load_from(&mut Cursor::new(second), Path::new("second"))
            .unwrap();

        assert!((loader.scales().unwrap()[0] - f64::from(0.1_f32)).abs() < 1e-12);
    }

    #[test]
    fn test_shuffle_keeps_labels_aligned() {
        let negative: Vec<_> = (0..20).map(|i| FeatureVector::from_element(2, -(i as f64) - 1.0)).collect();
        let positive: Vec<_> = (0..20).map(|i| FeatureVector::from_element(2, i as f64 + 1.0)).collect();
        let mut set = LabeledSet::from_classes(negative, positive);

        set.shuffle(&mut StdRng::seed_from_u64(3));

        assert_eq!(set.len(), 40);
        for (vector, &label) in set.vectors.iter().zip(&set.labels) {
            assert_eq!(vector[0].signum(), label);
        }
        assert!(set.labels[..20].iter().any(|&l| l > 0.0));
    }
}
