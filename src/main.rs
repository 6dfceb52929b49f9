// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueHint};
use egto::{
    structure, Backend, EgtoConfig, ElementalGto, HostBackend, Tensor, APP_NAME, LOG_TARGETS,
};
use serde::Serialize;
use std::{
    fs::File,
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
};

#[derive(Parser)]
#[command(
    name = APP_NAME,
    author,
    version,
    about = "Computes eGTO representations for every atom of a structure file"
)]
struct Cli {
    /// Calculator configuration (JSON); defaults are used when omitted
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Structure file (.xyz or .pdb); every frame becomes one molecule of the batch
    #[arg(value_hint = ValueHint::FilePath)]
    structure: PathBuf,

    /// Also compute the derivative of the representation with respect to every coordinate
    #[arg(long)]
    gradients: bool,

    /// Compare the analytic derivative against central finite differences with this step
    #[arg(long, value_name = "DX")]
    check_gradients: Option<f32>,

    /// Destination for the JSON report; standard output when omitted
    #[arg(long, short, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Raise the log level (repeat for more detail)
    #[arg(long, short, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Serialize)]
struct Report {
    fp_size: usize,
    natom_counts: Vec<i32>,
    representation: Tensor<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    derivative: Option<Tensor<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_gradient_error: Option<f32>,
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => EgtoConfig::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => EgtoConfig::default(),
    };
    let backend = Arc::new(HostBackend::new());
    let calculator = ElementalGto::new(config, backend.clone())?;

    let frames = structure::read(&cli.structure)
        .with_context(|| format!("failed to read {}", cli.structure.display()))?;
    let batch = structure::batch(&frames, backend.device())?;
    let cells = batch.cells.as_deref();

    let (representation, derivative) = if cli.gradients || cli.check_gradients.is_some() {
        let (representation, derivative) = calculator
            .get_representation_and_derivative(
                &batch.coordinates,
                &batch.charges,
                &batch.natom_counts,
                cells,
            )
            .context("derivative evaluation failed")?;
        (representation, Some(derivative))
    } else {
        let representation = calculator
            .get_representation(&batch.coordinates, &batch.charges, &batch.natom_counts, cells)
            .context("representation evaluation failed")?;
        (representation, None)
    };

    let max_gradient_error = match (cli.check_gradients, &derivative) {
        (Some(dx), Some(analytic)) => {
            let numeric = calculator.finite_difference_derivative(
                &batch.coordinates,
                &batch.charges,
                &batch.natom_counts,
                cells,
                dx,
            )?;
            let error = analytic.max_abs_diff(&numeric).unwrap_or(0.0);
            log::info!("largest deviation from finite differences: {error:e}");
            Some(error)
        }
        _ => None,
    };

    let report = Report {
        fp_size: calculator.fp_size(),
        natom_counts: batch.natom_counts.data().to_vec(),
        representation,
        derivative: derivative.filter(|_| cli.gradients),
        max_gradient_error,
    };
    match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("unable to create {}", path.display()))?;
            write_report(io::BufWriter::new(file), &report)
                .with_context(|| format!("unable to write {}", path.display()))?;
            log::info!("wrote {}", path.display());
        }
        None => write_report(io::stdout().lock(), &report)
            .context("unable to write the report to standard output")?,
    }
    Ok(())
}

/// Serializes `report` and flushes the writer.
fn write_report(mut writer: impl Write, report: &Report) -> Result<()> {
    serde_json::to_writer(&mut writer, report)?;
    writer.flush()?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => logging::default_level(),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    logging::init_with_level(LOG_TARGETS, level);

    if let Err(err) = run(cli) {
        eprintln!("Error: {}", err);
        for cause in err.chain().skip(1) {
            eprintln!("because: {}", cause);
        }
        std::process::exit(1);
    }
}


// End of File
