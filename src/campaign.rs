use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    thread,
    time::Duration,
};

use anyhow::{Context, Result, bail};
use chrono::Local;
use uuid::Uuid;

use crate::config::{CampaignSettings, Workload};
use crate::logbook::Logbook;
use crate::power::PowerSource;
use crate::probe::{self, BrowserSpec};
use crate::report::{self, ReportWriter, RunResult};
use crate::server::ContentServer;
use crate::workload::{InputDriver, WorkloadDriver};

/// Artifacts a finished campaign leaves behind.
#[derive(Debug)]
pub struct CampaignOutcome {
    pub report_file: PathBuf,
    pub log_file: PathBuf,
    pub output_dir: PathBuf,
}

/// One full measurement campaign: iterations × browsers × workloads, run
/// strictly sequentially so every reading is attributable to exactly one
/// browser process.
pub struct Campaign {
    settings: CampaignSettings,
    id: Uuid,
    logbook: Logbook,
    source: PowerSource,
    input: Option<InputDriver>,
    browsers: Vec<BrowserSpec>,
    writer: ReportWriter,
}

impl Campaign {
    /// Resolve everything the campaign needs up front. The only fatal
    /// conditions live here: no power source, or no browsers left after
    /// subset filtering.
    pub fn prepare(settings: CampaignSettings) -> Result<Campaign> {
        let output_dir = settings.resolve_output_dir()?;
        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let logbook = Logbook::create(&output_dir.join(format!("power_test_{timestamp}.log")))?;
        let id = Uuid::new_v4();

        logbook.record("Starting browser power efficiency tests");
        logbook.record(format!("Campaign id: {id}"));
        logbook.record(format!("Number of test iterations: {}", settings.iterations));

        let source = match PowerSource::detect() {
            Ok(source) => {
                match &source {
                    PowerSource::Battery(path) => logbook.record(format!(
                        "Using power measurements from: {}",
                        path.display()
                    )),
                    PowerSource::Powertop(_) => logbook
                        .record("No direct power readings available. Will use powertop."),
                }
                source
            }
            Err(err) => {
                logbook.record(
                    "ERROR: No method available to measure power. Please install powertop or run on a laptop with battery.",
                );
                return Err(err);
            }
        };

        let candidates = probe::filter_candidates(&settings.browsers);
        let browsers = probe::available_browsers(&candidates, &logbook);
        if browsers.is_empty() {
            logbook.record("No browsers available for testing!");
            bail!("no browsers available for testing");
        }

        let input = InputDriver::detect();
        let writer = ReportWriter::new(&output_dir, &timestamp, settings.sample_interval_secs)?;

        Ok(Self {
            settings,
            id,
            logbook,
            source,
            input,
            browsers,
            writer,
        })
    }

    /// Run the whole campaign. The content server is stopped on every exit
    /// path; per-run failures are recorded and skipped.
    pub fn run(self) -> Result<CampaignOutcome> {
        let server = ContentServer::start(&self.settings, &self.logbook)
            .context("failed to start local test server")?;
        self.logbook.record("Local test server started");

        let outcome = self.execute();

        self.logbook.record("Shutting down HTTP server");
        server.stop();
        outcome
    }

    fn execute(&self) -> Result<CampaignOutcome> {
        let workloads = self.settings.selected_workloads();
        let iterations = self.settings.iterations;
        let banner = "=".repeat(20);

        let mut all_iterations: HashMap<Workload, Vec<Vec<Option<RunResult>>>> =
            workloads.iter().map(|w| (*w, Vec::new())).collect();

        for iteration in 1..=iterations {
            self.logbook.record(format!(
                "{banner} Starting test iteration {iteration}/{iterations} {banner}"
            ));

            let mut iteration_results: HashMap<Workload, Vec<Option<RunResult>>> =
                workloads.iter().map(|w| (*w, Vec::new())).collect();

            for browser in &self.browsers {
                self.logbook
                    .record(format!("{banner} Testing {} {banner}", browser.label));

                for workload in &workloads {
                    let driver = WorkloadDriver::new(
                        &self.settings,
                        &self.source,
                        self.input.as_ref(),
                        &self.logbook,
                    );
                    let result = driver.run(browser, *workload);

                    if let Some(run) = &result {
                        let label =
                            format!("{}_{}", workload.label(), browser.label.to_lowercase());
                        if let Err(err) = self.writer.write_run_artifacts(
                            &[Some(run.clone())],
                            &label,
                            Some(iteration),
                        ) {
                            self.logbook
                                .record(format!("Error saving results for {label}: {err:#}"));
                        }
                    }

                    iteration_results
                        .get_mut(workload)
                        .expect("selected workloads are pre-seeded")
                        .push(result);

                    thread::sleep(Duration::from_secs(self.settings.cooldown_secs));
                }
            }

            for workload in &workloads {
                let results = iteration_results
                    .remove(workload)
                    .expect("selected workloads are pre-seeded");
                if results.iter().any(Option::is_some) {
                    match self.writer.write_run_artifacts(
                        &results,
                        workload.label(),
                        Some(iteration),
                    ) {
                        Ok((detail, summary)) => {
                            self.logbook.record(format!(
                                "Saved detailed results to {}",
                                detail.display()
                            ));
                            self.logbook.record(format!(
                                "Saved summary results to {}",
                                summary.display()
                            ));
                        }
                        Err(err) => self.logbook.record(format!(
                            "Error saving {} iteration results: {err:#}",
                            workload.label()
                        )),
                    }
                    all_iterations
                        .get_mut(workload)
                        .expect("selected workloads are pre-seeded")
                        .push(results);
                }
            }
        }

        let aggregate_files = persist_aggregates(
            &self.writer,
            &self.logbook,
            iterations,
            &workloads,
            &all_iterations,
        )?;

        self.logbook.record("Creating summary report...");
        let report_file = self.write_summary_report(&aggregate_files)?;
        self.logbook
            .record(format!("Summary report created: {}", report_file.display()));
        self.logbook.record(format!(
            "All test results saved to: {}",
            self.writer.output_dir().display()
        ));

        Ok(CampaignOutcome {
            report_file,
            log_file: self.logbook.path().to_path_buf(),
            output_dir: self.writer.output_dir().to_path_buf(),
        })
    }

    fn write_summary_report(&self, aggregate_files: &[PathBuf]) -> Result<PathBuf> {
        let path = self.writer.output_dir().join(format!(
            "summary_report_{}.txt",
            Local::now().format("%Y%m%d_%H%M%S")
        ));

        let mut report = String::new();
        report.push_str("Browser Power Efficiency Test Results\n");
        report.push_str("=====================================\n");
        report.push_str(&format!("Campaign: {}\n", self.id));
        report.push_str(&format!(
            "Test conducted on: {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        report.push_str(&format!(
            "Number of test iterations: {}\n\n",
            self.settings.iterations
        ));
        report.push_str(&format!(
            "Test Results Directory: {}\n",
            self.writer.output_dir().display()
        ));
        report.push_str(&format!("Log File: {}\n\n", self.logbook.path().display()));

        if !aggregate_files.is_empty() {
            report.push_str("Aggregate Result Files:\n");
            for file in aggregate_files {
                if let Some(name) = file.file_name() {
                    report.push_str(&format!("- {}\n", name.to_string_lossy()));
                }
            }
        }

        fs::write(&path, report)
            .with_context(|| format!("Failed to write summary report {}", path.display()))?;
        Ok(path)
    }
}

/// Aggregates exist only for multi-iteration campaigns; a single pass has
/// nothing to average.
fn persist_aggregates(
    writer: &ReportWriter,
    logbook: &Logbook,
    iterations: u32,
    workloads: &[Workload],
    all_iterations: &HashMap<Workload, Vec<Vec<Option<RunResult>>>>,
) -> Result<Vec<PathBuf>> {
    let mut aggregate_files = Vec::new();
    if iterations <= 1 {
        return Ok(aggregate_files);
    }

    logbook.record("Calculating aggregate results across all iterations...");
    for workload in workloads {
        let collected = match all_iterations.get(workload) {
            Some(collected) if !collected.is_empty() => collected,
            _ => continue,
        };
        let stats = report::aggregate_across_iterations(*workload, collected);
        let path = writer.write_aggregate(workload.label(), &stats)?;
        logbook.record(format!("Saved aggregate results to {}", path.display()));
        aggregate_files.push(path);
    }
    Ok(aggregate_files)
}
