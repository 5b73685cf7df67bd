mod charts;
mod data;

use std::{fs, path::PathBuf};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, value_parser};
use directories::ProjectDirs;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "wattbench-report", author, version, about = "Browser power efficiency analysis", long_about = None)]
struct Cli {
    /// Directory containing campaign CSV artifacts (defaults to the
    /// campaign output directory).
    #[arg(long, value_parser = value_parser!(PathBuf))]
    results: Option<PathBuf>,

    /// Location to write the charts (defaults to <data-dir>/analysis).
    #[arg(long, value_parser = value_parser!(PathBuf))]
    output: Option<PathBuf>,

    /// Increase logging verbosity.
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        "wattbench_report=debug"
    } else {
        "wattbench_report=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn data_dir(subdir: &str) -> PathBuf {
    ProjectDirs::from("dev", "wattbench", "Wattbench")
        .map(|dirs| dirs.data_dir().join(subdir))
        .unwrap_or_else(|| PathBuf::from(".").join(subdir))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let results_dir = cli.results.unwrap_or_else(|| data_dir("results"));
    let output_dir = cli.output.unwrap_or_else(|| data_dir("analysis"));
    fs::create_dir_all(&output_dir).with_context(|| {
        format!("unable to create analysis output directory {}", output_dir.display())
    })?;

    info!(results = %results_dir.display(), output = %output_dir.display(), "starting analysis");

    let tables = data::load_tables(&results_dir)?;
    if tables.is_empty() {
        bail!(
            "no aggregate result files found in {}; run the browser power tests first",
            results_dir.display()
        );
    }
    info!(workloads = tables.len(), "loaded aggregate result files");

    let chart = charts::average_power_comparison(&tables, &output_dir)?;
    info!(path = %chart.display(), "saved average power comparison chart");

    let chart = charts::total_energy_comparison(&tables, &output_dir)?;
    info!(path = %chart.display(), "saved total energy comparison chart");

    let matrix = data::ranking_matrix(&tables);
    let chart = charts::ranking_heatmap(&matrix, &output_dir)?;
    info!(path = %chart.display(), "saved browser ranking heatmap");

    let workloads: Vec<String> = tables.iter().map(|table| table.workload.clone()).collect();
    let series = data::normalized_power_scores(&tables);
    if series.is_empty() {
        warn!("no browsers common to every workload; skipping radar chart");
    } else {
        let chart = charts::radar_chart(&workloads, &series, &output_dir)?;
        info!(path = %chart.display(), "saved browser radar chart");
    }

    let scores = data::efficiency_index(&tables);
    let chart = charts::efficiency_index_chart(&scores, &output_dir)?;
    info!(path = %chart.display(), "saved browser efficiency index");

    println!("\nAnalysis complete!");
    println!("All results saved to: {}", output_dir.display());

    Ok(())
}
