//! One complete run: load, extract both directions, search the boundary and
//! write the document.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose, Engine as _};
use rand::{rngs::StdRng, SeedableRng};
use tracing::{info, warn};

use crate::boundary::{build_index, Boundary, DensitySearch};
use crate::cli::Invocation;
use crate::codec::{self, ProjectionParams};
use crate::config::{RasterFormat, RunConfig, TrainerKind};
use crate::discriminant::{self, Discriminants};
use crate::error::{Error, Result};
use crate::export;
use crate::features::{FeatureLoader, FeatureVector, LabeledSet};
use crate::geometry::Point2;
use crate::gradient_descent::LinearClassifier;
use crate::render::{self, Canvas, Overlay, RasterLink};
use crate::spatial::KdIndex;
use crate::support_vector_machine::SupportVectorMachine;
use crate::trainer::Trainer;

/// Loaded feature groups sharing one scale list.
#[derive(Debug, Clone)]
pub struct Inputs {
    pub scales: Vec<f64>,
    pub class1: Vec<FeatureVector>,
    pub class2: Vec<FeatureVector>,
    pub unlabeled: Vec<FeatureVector>,
}

/// Everything computed before anything is written.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub discriminants: Discriminants,
    pub references: (Point2, Point2),
    pub boundary: Boundary,
    pub canvas: Canvas,
    pub params: ProjectionParams,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub class1: usize,
    pub class2: usize,
    pub unlabeled: usize,
    pub first_error: usize,
    pub second_error: usize,
    pub boundary: Boundary,
    pub params: ProjectionParams,
}

pub fn trainer_for(kind: TrainerKind) -> Box<dyn Trainer> {
    match kind {
        TrainerKind::Smo => Box::new(SupportVectorMachine::default()),
        TrainerKind::Gradient => Box::new(LinearClassifier::default()),
    }
}

/// Read every file of the invocation. All headers are checked before any
/// point data is read.
pub fn load(invocation: &Invocation) -> Result<Inputs> {
    let mut loader = FeatureLoader::new();
    let unlabeled_points = loader.validate_headers(&invocation.unlabeled)?;
    let class1_points = loader.validate_headers(&invocation.class1)?;
    let class2_points = loader.validate_headers(&invocation.class2)?;
    info!(
        unlabeled = unlabeled_points,
        class1 = class1_points,
        class2 = class2_points,
        "headers validated"
    );

    let unlabeled = loader.load_group(&invocation.unlabeled)?;
    let class1 = loader.load_group(&invocation.class1)?;
    let class2 = loader.load_group(&invocation.class2)?;

    let scales = loader
        .scales()
        .map(<[f64]>::to_vec)
        .ok_or_else(|| Error::Usage("no feature files given".to_string()))?;

    Ok(Inputs {
        scales,
        class1,
        class2,
        unlabeled,
    })
}

/// Train, project and search; nothing touches the filesystem.
pub fn analyze(inputs: &Inputs, config: &RunConfig) -> Result<Analysis> {
    let mut set = LabeledSet::from_classes(inputs.class1.clone(), inputs.class2.clone());
    let mut rng = StdRng::seed_from_u64(config.trainer.seed);
    set.shuffle(&mut rng);

    let trainer = trainer_for(config.trainer.kind);
    let discriminants =
        discriminant::extract(trainer.as_ref(), config.trainer.folds, &set, &inputs.unlabeled)?;

    let references = discriminants.reference_points();
    let index: KdIndex = build_index(&discriminants);
    let search = DensitySearch::new(&index, discriminants.bounds(), &config.search);
    let boundary = search.run(references.0, references.1);

    let canvas = Canvas::fit(&discriminants.labeled_bounds(), &config.render);
    let params = ProjectionParams::new(
        &inputs.scales,
        &discriminants.first,
        &discriminants.second,
        canvas.abs_max,
        canvas.scale_factor,
        canvas.half,
    );

    Ok(Analysis {
        discriminants,
        references,
        boundary,
        canvas,
        params,
    })
}

/// Scores whose sign disagrees with the label.
fn sign_errors(scores: &[f64], labels: &[f64]) -> usize {
    scores
        .iter()
        .zip(labels)
        .filter(|&(&score, &label)| score * label <= 0.0)
        .count()
}

fn raster_path(output: &Path) -> PathBuf {
    output.with_extension("ppm")
}

/// Render the document and write it, with the sibling raster when requested.
pub fn write_outputs(analysis: &Analysis, invocation: &Invocation, config: &RunConfig) -> Result<()> {
    let canvas = &analysis.canvas;
    let rgb = render::draw_raster(canvas, &analysis.discriminants)?;

    let encoded = analysis.params.encode();
    let params_markup = if config.render.params_as_text {
        codec::hidden_text(&encoded)
    } else {
        codec::comment(&encoded)
    };

    let side = f64::from(canvas.size);
    let boundary = render::boundary_path(
        &canvas.line_to_canvas(&analysis.boundary.line),
        canvas.to_canvas(analysis.boundary.pivot),
        side,
    );
    if boundary.is_none() {
        warn!("boundary does not cross the canvas, no path drawn");
    }

    let (raster, sibling) = match config.render.raster {
        RasterFormat::Png => {
            let png = render::encode_png(rgb, canvas.size)?;
            (RasterLink::Inline(general_purpose::STANDARD.encode(png)), None)
        }
        RasterFormat::Ppm => {
            let path = raster_path(&invocation.output);
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| Error::Usage(format!("invalid output path {}", invocation.output.display())))?;
            (RasterLink::File(name), Some((path, rgb)))
        }
    };

    let document = render::svg_document(
        canvas,
        &Overlay {
            params_markup,
            raster,
            references: analysis.references,
            boundary,
        },
    )?;

    if let Some((path, rgb)) = sibling {
        let mut out = BufWriter::new(File::create(&path)?);
        render::write_ppm(&rgb, canvas.size, &mut out)?;
        info!(?path, "raster written");
    }
    fs::write(&invocation.output, document)?;
    info!(path = ?invocation.output, "document written");

    if let Some(path) = &invocation.dump_projections {
        export::write_projections(&analysis.discriminants, BufWriter::new(File::create(path)?))?;
        info!(?path, "projections written");
    }
    Ok(())
}

pub fn run(invocation: &Invocation, config: &RunConfig) -> Result<RunSummary> {
    let inputs = load(invocation)?;
    info!(
        class1 = inputs.class1.len(),
        class2 = inputs.class2.len(),
        unlabeled = inputs.unlabeled.len(),
        dimension = inputs.scales.len() * 2,
        "features loaded"
    );

    let analysis = analyze(&inputs, config)?;

    let discriminants = &analysis.discriminants;
    let first_error = sign_errors(&discriminants.proj1, &discriminants.labels);
    let second_error = sign_errors(&discriminants.proj2, &discriminants.labels);
    info!(first_error, second_error, "training errors");

    write_outputs(&analysis, invocation, config)?;

    Ok(RunSummary {
        class1: inputs.class1.len(),
        class2: inputs.class2.len(),
        unlabeled: inputs.unlabeled.len(),
        first_error,
        second_error,
        boundary: analysis.boundary,
        params: analysis.params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;

    fn inputs() -> Inputs {
        let mut class1 = Vec::new();
        let mut class2 = Vec::new();
        for i in 0..15 {
            let t = f64::from(i) / 15.0;
            class1.push(DVector::from_vec(vec![-1.0 - t, 0.2 * t]));
            class2.push(DVector::from_vec(vec![1.0 + t, 0.1 - 0.2 * t]));
        }
        Inputs {
            scales: vec![0.1],
            class1,
            class2,
            unlabeled: vec![DVector::from_vec(vec![0.0, 0.0])],
        }
    }

    #[test]
    fn test_analysis_is_reproducible() {
        let config = RunConfig::default();

        let first = analyze(&inputs(), &config).unwrap();
        let second = analyze(&inputs(), &config).unwrap();

        assert_eq!(first.params, second.params);
        assert_eq!(first.boundary, second.boundary);
        assert_eq!(first.discriminants.labels, second.discriminants.labels);
    }

    #[test]
    fn test_params_reproduce_projections() {
        let inputs = inputs();
        let analysis = analyze(&inputs, &RunConfig::default()).unwrap();

        let sample = &inputs.unlabeled[0];
        let (x, y) = analysis.params.project(sample.as_slice()).unwrap();
        let expected = analysis.discriminants.unlabeled[0];

        assert!((x - expected.x).abs() < 1e-3 * (1.0 + expected.x.abs()));
        assert!((y - expected.y).abs() < 1e-3 * (1.0 + expected.y.abs()));
        assert_eq!(analysis.params.half_size, 400);
    }

    #[test]
    fn test_separable_classes_have_no_first_error() {
        let inputs = inputs();
        let analysis = analyze(&inputs, &RunConfig::default()).unwrap();
        let discriminants = &analysis.discriminants;

        assert_eq!(sign_errors(&discriminants.proj1, &discriminants.labels), 0);
    }

    #[test]
    fn test_ppm_sits_next_to_output() {
        assert_eq!(
            raster_path(Path::new("out/plot.svg")),
            PathBuf::from("out/plot.ppm")
        );
    }
}
