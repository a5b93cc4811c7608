use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use suggest_boundary::{
    cli::{Args, USAGE},
    pipeline, Error,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn usage_error(reason: &str) -> ExitCode {
    eprintln!("error: {reason}");
    eprintln!("usage: {USAGE}");
    ExitCode::from(2)
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("suggest_boundary=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let parsed = args
        .invocation()
        .and_then(|invocation| args.run_config().map(|config| (invocation, config)));
    let (invocation, config) = match parsed {
        Ok(parsed) => parsed,
        Err(Error::Usage(reason)) => return Ok(usage_error(&reason)),
        Err(e) => return Err(e.into()),
    };

    let summary = match pipeline::run(&invocation, &config) {
        Ok(summary) => summary,
        Err(Error::Usage(reason)) => return Ok(usage_error(&reason)),
        Err(e) => {
            error!(%e, "run failed");
            return Err(e)
                .with_context(|| format!("failed to write {}", invocation.output.display()));
        }
    };

    info!(
        class1 = summary.class1,
        class2 = summary.class2,
        unlabeled = summary.unlabeled,
        first_error = summary.first_error,
        second_error = summary.second_error,
        density = summary.boundary.density,
        "done"
    );
    Ok(ExitCode::SUCCESS)
}
