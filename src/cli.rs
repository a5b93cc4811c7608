//! ```text
//! suggest_boundary [OPTIONS] output.svg [unlabeled...] : class1... - class2...
//! ```

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{RasterFormat, RenderConfig, RunConfig, SearchConfig, TrainerConfig, TrainerKind};
use crate::error::{Error, Result};

pub const USAGE: &str =
    "suggest_boundary [OPTIONS] output.svg [unlabeled.msc ...] : class1.msc ... - class2.msc ...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TrainerArg {
    /// Linear SVM trained by sequential minimal optimization
    Smo,
    /// Hinge-loss gradient descent
    Gradient,
}

#[derive(Parser, Debug)]
#[command(name = "suggest_boundary")]
#[command(about = "Project two classes of multi-scale features onto their two most discriminant directions and suggest a decision boundary")]
#[command(override_usage = USAGE)]
pub struct Args {
    /// Seed of the sample shuffle
    #[arg(long, default_value = "0")]
    pub seed: u64,

    /// Cross-validation folds
    #[arg(long, default_value = "10")]
    pub folds: usize,

    /// Linear trainer used for both directions
    #[arg(long, value_enum, default_value = "smo")]
    pub trainer: TrainerArg,

    /// Pivot intervals between the class reference points
    #[arg(long, default_value = "25")]
    pub pivots: usize,

    /// Line orientations scanned per pivot
    #[arg(long, default_value = "90")]
    pub directions: usize,

    /// Canvas side in pixels
    #[arg(long, default_value = "800")]
    pub size: u32,

    /// Store the parameters in a hidden text node instead of a comment
    #[arg(long)]
    pub params_as_text: bool,

    /// Write the raster as a sibling PPM file instead of an inline PNG
    #[arg(long)]
    pub ppm: bool,

    /// Also write the projected coordinates to this CSV file
    #[arg(long)]
    pub dump_projections: Option<PathBuf>,

    /// output.svg [unlabeled ...] : class1 ... - class2 ...
    #[arg(required = true, num_args = 1.., allow_hyphen_values = true, trailing_var_arg = true)]
    pub files: Vec<String>,
}

impl Args {
    pub fn run_config(&self) -> Result<RunConfig> {
        if self.folds < 2 {
            return Err(Error::Usage("at least 2 folds are needed".to_string()));
        }
        if self.pivots == 0 || self.directions == 0 {
            return Err(Error::Usage(
                "pivots and directions must be positive".to_string(),
            ));
        }
        if self.size < 2 {
            return Err(Error::Usage("canvas size must be at least 2".to_string()));
        }

        Ok(RunConfig {
            trainer: TrainerConfig {
                kind: match self.trainer {
                    TrainerArg::Smo => TrainerKind::Smo,
                    TrainerArg::Gradient => TrainerKind::Gradient,
                },
                folds: self.folds,
                seed: self.seed,
            },
            search: SearchConfig {
                pivots: self.pivots,
                directions: self.directions,
                ..SearchConfig::default()
            },
            render: RenderConfig {
                canvas_size: self.size,
                params_as_text: self.params_as_text,
                raster: if self.ppm {
                    RasterFormat::Ppm
                } else {
                    RasterFormat::Png
                },
            },
        })
    }

    pub fn invocation(&self) -> Result<Invocation> {
        let mut invocation = Invocation::parse(&self.files)?;
        invocation.dump_projections.clone_from(&self.dump_projections);
        Ok(invocation)
    }
}

/// Input and output files of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub output: PathBuf,
    pub unlabeled: Vec<PathBuf>,
    /// Labelled `-1`
    pub class1: Vec<PathBuf>,
    /// Labelled `+1`
    pub class2: Vec<PathBuf>,
    pub dump_projections: Option<PathBuf>,
}

impl Invocation {
    /// Split `output [unlabeled...] : class1... - class2...`.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();

        let (output, rest) = args
            .split_first()
            .ok_or_else(|| Error::Usage("missing output file".to_string()))?;
        if *output == ":" || *output == "-" {
            return Err(Error::Usage("missing output file".to_string()));
        }

        let colon = rest
            .iter()
            .position(|&arg| arg == ":")
            .ok_or_else(|| Error::Usage("missing ':' before the first class".to_string()))?;
        let (unlabeled, classes) = (&rest[..colon], &rest[colon + 1..]);

        let dash = classes
            .iter()
            .position(|&arg| arg == "-")
            .ok_or_else(|| Error::Usage("missing '-' between the two classes".to_string()))?;
        let (class1, class2) = (&classes[..dash], &classes[dash + 1..]);

        if class1.is_empty() || class2.is_empty() {
            return Err(Error::Usage(
                "each class needs at least one file".to_string(),
            ));
        }

        let paths = |names: &[&str]| names.iter().map(PathBuf::from).collect::<Vec<_>>();
        Ok(Self {
            output: PathBuf::from(output),
            unlabeled: paths(unlabeled),
            class1: paths(class1),
            class2: paths(class2),
            dump_projections: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_invocation() {
        let invocation =
            Invocation::parse(&["out.svg", "scene.msc", ":", "a.msc", "b.msc", "-", "c.msc"]).unwrap();

        assert_eq!(invocation.output, PathBuf::from("out.svg"));
        assert_eq!(invocation.unlabeled, vec![PathBuf::from("scene.msc")]);
        assert_eq!(invocation.class1, vec![PathBuf::from("a.msc"), PathBuf::from("b.msc")]);
        assert_eq!(invocation.class2, vec![PathBuf::from("c.msc")]);
    }

    #[test]
    fn test_parse_without_unlabeled() {
        let invocation = Invocation::parse(&["out.svg", ":", "a.msc", "-", "c.msc"]).unwrap();
        assert!(invocation.unlabeled.is_empty());
    }

    #[test]
    fn test_malformed_invocations() {
        let cases: [&[&str]; 6] = [
            &[],
            &["out.svg", "a.msc", "-", "c.msc"],
            &["out.svg", ":", "a.msc", "c.msc"],
            &["out.svg", ":", "-", "c.msc"],
            &["out.svg", ":", "a.msc", "-"],
            &[":", "a.msc", "-", "c.msc"],
        ];
        for args in cases {
            assert!(
                matches!(Invocation::parse(args), Err(Error::Usage(_))),
                "{args:?}"
            );
        }
    }

    #[test]
    fn test_clap_accepts_separators_and_options() {
        let args = Args::try_parse_from([
            "suggest_boundary",
            "--seed",
            "7",
            "--ppm",
            "out.svg",
            ":",
            "a.msc",
            "-",
            "b.msc",
        ])
        .unwrap();

        let config = args.run_config().unwrap();
        assert_eq!(config.trainer.seed, 7);
        assert_eq!(config.render.raster, RasterFormat::Ppm);
        assert_eq!(config.search.pivots, 25);

        let invocation = args.invocation().unwrap();
        assert_eq!(invocation.class2, vec![PathBuf::from("b.msc")]);
    }

    #[test]
    fn test_zero_pivots_is_usage_error() {
        let args = Args::try_parse_from(["suggest_boundary", "--pivots", "0", "o.svg", ":", "a", "-", "b"]).unwrap();
        assert!(matches!(args.run_config(), Err(Error::Usage(_))));
    }
}
