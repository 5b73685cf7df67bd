use std::{path::PathBuf, process::ExitCode};

use anyhow::Result;
use clap::{ArgAction, Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use url::Url;
use wattbench::campaign::{Campaign, CampaignOutcome};
use wattbench::config::{CampaignSettings, Workload, default_config_path};

#[derive(Parser, Debug)]
#[command(name = "wattbench", version, about = "Browser power efficiency benchmark", long_about = None)]
struct Args {
    /// Duration of each test in seconds.
    #[arg(long)]
    duration: Option<u64>,

    /// Browsers to test, by executable name (default: all available).
    #[arg(long, num_args = 1..)]
    browsers: Vec<String>,

    /// Types of tests to run.
    #[arg(long = "test-types", value_enum, num_args = 1.., default_values_t = [WorkloadArg::All])]
    test_types: Vec<WorkloadArg>,

    /// URL for the webpage and multiple-tabs tests.
    #[arg(long)]
    url: Option<Url>,

    /// Number of test iterations to run.
    #[arg(long)]
    iterations: Option<u32>,

    /// Directory to write result artifacts into.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Port for the local content server.
    #[arg(long)]
    port: Option<u16>,

    /// Custom config path.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase logging verbosity.
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

/// CLI spelling of the workload subset: the fixed enum plus `all`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum WorkloadArg {
    All,
    Video,
    Animation,
    JsComputation,
    Webpage,
    MultipleTabs,
}

impl WorkloadArg {
    fn workload(self) -> Option<Workload> {
        match self {
            WorkloadArg::All => None,
            WorkloadArg::Video => Some(Workload::Video),
            WorkloadArg::Animation => Some(Workload::Animation),
            WorkloadArg::JsComputation => Some(Workload::JsComputation),
            WorkloadArg::Webpage => Some(Workload::Webpage),
            WorkloadArg::MultipleTabs => Some(Workload::MultipleTabs),
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "wattbench=debug"
    } else {
        "wattbench=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn resolve_settings(args: &Args) -> Result<CampaignSettings> {
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    info!(path = %config_path.display(), "using campaign config");
    let mut settings = CampaignSettings::load_or_default(&config_path)?;

    if let Some(duration) = args.duration {
        settings.duration_secs = duration;
    }
    if !args.browsers.is_empty() {
        settings.browsers = args.browsers.clone();
    }
    if !args.test_types.contains(&WorkloadArg::All) {
        settings.workloads = args
            .test_types
            .iter()
            .filter_map(|arg| arg.workload())
            .collect();
    }
    if let Some(url) = &args.url {
        settings.test_url = url.to_string();
    }
    if let Some(iterations) = args.iterations {
        settings.iterations = iterations;
    }
    if let Some(output) = &args.output {
        settings.output_dir = Some(output.clone());
    }
    if let Some(port) = args.port {
        settings.server_port = port;
    }

    Ok(settings)
}

fn run(args: &Args) -> Result<CampaignOutcome> {
    let settings = resolve_settings(args)?;
    let campaign = Campaign::prepare(settings)?;
    campaign.run()
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(outcome) => {
            println!("\nTests completed successfully!");
            println!("Summary report: {}", outcome.report_file.display());
            println!("Log file: {}", outcome.log_file.display());
            println!("Results directory: {}", outcome.output_dir.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %format!("{err:#}"), "campaign failed");
            eprintln!("\nTests failed. Check log for details.");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_every_workload() {
        let args = Args::parse_from(["wattbench"]);
        assert_eq!(args.test_types, vec![WorkloadArg::All]);
        assert!(args.browsers.is_empty());
    }

    #[test]
    fn parses_workload_subsets() {
        let args = Args::parse_from([
            "wattbench",
            "--test-types",
            "video",
            "js-computation",
            "--iterations",
            "2",
        ]);
        assert_eq!(
            args.test_types,
            vec![WorkloadArg::Video, WorkloadArg::JsComputation]
        );
        assert_eq!(args.iterations, Some(2));
    }

    #[test]
    fn subset_flags_override_loaded_settings() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.json");
        let args = Args::parse_from([
            "wattbench",
            "--config",
            config.to_str().unwrap(),
            "--duration",
            "30",
            "--browsers",
            "firefox",
            "opera",
            "--test-types",
            "webpage",
            "--url",
            "https://example.org/",
            "--port",
            "9000",
        ]);
        let settings = resolve_settings(&args).unwrap();
        assert_eq!(settings.duration_secs, 30);
        assert_eq!(settings.browsers, vec!["firefox", "opera"]);
        assert_eq!(settings.workloads, vec![Workload::Webpage]);
        assert_eq!(settings.test_url, "https://example.org/");
        assert_eq!(settings.server_port, 9000);
    }

    #[test]
    fn all_keeps_the_configured_workload_subset_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.json");
        let args = Args::parse_from(["wattbench", "--config", config.to_str().unwrap()]);
        let settings = resolve_settings(&args).unwrap();
        assert!(settings.workloads.is_empty());
    }

    #[test]
    fn rejects_invalid_urls() {
        assert!(Args::try_parse_from(["wattbench", "--url", "not a url"]).is_err());
    }
}
