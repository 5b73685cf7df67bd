use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::Workload;

/// One timestamped power reading within a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerSample {
    /// Seconds since sampling started.
    pub elapsed_secs: f64,
    pub watts: f64,
}

/// Statistics for one (browser, workload) execution, derived entirely from
/// its sample sequence. A run that produced no samples has no `RunResult`;
/// callers represent it as `None`.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub browser_label: String,
    pub workload: Workload,
    pub samples: Vec<PowerSample>,
    pub avg_power: f64,
    pub max_power: f64,
    pub min_power: f64,
    pub total_energy_wh: f64,
}

impl RunResult {
    /// Fold a non-empty sample sequence into its summary statistics.
    /// Energy integrates watts over the sampling interval:
    /// `(Σ watts) × interval / 3600`.
    pub fn from_samples(
        browser_label: impl Into<String>,
        workload: Workload,
        samples: Vec<PowerSample>,
        interval_secs: f64,
    ) -> RunResult {
        assert!(!samples.is_empty(), "a run without samples has no result");
        let sum: f64 = samples.iter().map(|sample| sample.watts).sum();
        let avg_power = sum / samples.len() as f64;
        let max_power = samples.iter().map(|s| s.watts).fold(f64::MIN, f64::max);
        let min_power = samples.iter().map(|s| s.watts).fold(f64::MAX, f64::min);
        let total_energy_wh = sum * interval_secs / 3600.0;
        RunResult {
            browser_label: browser_label.into(),
            workload,
            samples,
            avg_power,
            max_power,
            min_power,
            total_energy_wh,
        }
    }
}

/// Cross-iteration statistics for one browser under one workload.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateStat {
    pub browser_label: String,
    pub workload: Workload,
    pub mean_avg_power: f64,
    pub stdev_avg_power: f64,
    pub mean_max_power: f64,
    pub stdev_max_power: f64,
    pub mean_min_power: f64,
    pub stdev_min_power: f64,
    pub mean_total_energy: f64,
    pub stdev_total_energy: f64,
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation; 0 by definition when fewer than two values
/// contribute.
fn stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[derive(Default)]
struct BrowserAccumulator {
    avg_power: Vec<f64>,
    max_power: Vec<f64>,
    min_power: Vec<f64>,
    total_energy: Vec<f64>,
}

/// Group every successful run for the same browser across iterations and
/// reduce each statistic to mean and standard deviation. Browsers absent
/// from some iterations contribute nothing for them. Grouping is
/// case-sensitive on the label as stored; output follows first-seen order.
pub fn aggregate_across_iterations(
    workload: Workload,
    iterations: &[Vec<Option<RunResult>>],
) -> Vec<AggregateStat> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: std::collections::HashMap<String, BrowserAccumulator> =
        std::collections::HashMap::new();

    for iteration in iterations {
        for result in iteration.iter().flatten() {
            let acc = grouped
                .entry(result.browser_label.clone())
                .or_insert_with(|| {
                    order.push(result.browser_label.clone());
                    BrowserAccumulator::default()
                });
            acc.avg_power.push(result.avg_power);
            acc.max_power.push(result.max_power);
            acc.min_power.push(result.min_power);
            acc.total_energy.push(result.total_energy_wh);
        }
    }

    order
        .into_iter()
        .map(|browser_label| {
            let acc = &grouped[&browser_label];
            AggregateStat {
                browser_label,
                workload,
                mean_avg_power: mean(&acc.avg_power),
                stdev_avg_power: stdev(&acc.avg_power),
                mean_max_power: mean(&acc.max_power),
                stdev_max_power: stdev(&acc.max_power),
                mean_min_power: mean(&acc.min_power),
                stdev_min_power: stdev(&acc.min_power),
                mean_total_energy: mean(&acc.total_energy),
                stdev_total_energy: stdev(&acc.total_energy),
            }
        })
        .collect()
}

/// Writes campaign CSV artifacts into one timestamped output directory.
pub struct ReportWriter {
    output_dir: PathBuf,
    timestamp: String,
    sample_interval_secs: u64,
}

impl ReportWriter {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        timestamp: impl Into<String>,
        sample_interval_secs: u64,
    ) -> Result<ReportWriter> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).with_context(|| {
            format!("Failed to create output directory {}", output_dir.display())
        })?;
        Ok(Self {
            output_dir,
            timestamp: timestamp.into(),
            sample_interval_secs,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn artifact_path(&self, label: &str, kind: &str, iteration: Option<u32>) -> PathBuf {
        let iter_suffix = iteration
            .map(|i| format!("_iter{i}"))
            .unwrap_or_default();
        self.output_dir
            .join(format!("{label}_{kind}{iter_suffix}_{}.csv", self.timestamp))
    }

    /// Write the per-slot detail table and the per-run summary table for one
    /// group of results. Failed runs (`None`) are skipped entirely; they
    /// never block the surviving columns. Detail rows cover the longest
    /// sample sequence, leaving trailing cells blank for shorter ones.
    pub fn write_run_artifacts(
        &self,
        results: &[Option<RunResult>],
        label: &str,
        iteration: Option<u32>,
    ) -> Result<(PathBuf, PathBuf)> {
        let successful: Vec<&RunResult> = results.iter().flatten().collect();

        let detail_path = self.artifact_path(label, "power_details", iteration);
        let file = File::create(&detail_path)
            .with_context(|| format!("Failed to create {}", detail_path.display()))?;
        let mut out = BufWriter::new(file);

        let mut header = vec!["Time (s)".to_string()];
        header.extend(successful.iter().map(|r| r.browser_label.clone()));
        writeln!(out, "{}", header.join(","))?;

        let slot_count = successful
            .iter()
            .map(|r| r.samples.len())
            .max()
            .unwrap_or(0);
        for slot in 0..slot_count {
            let mut row = vec![(slot as u64 * self.sample_interval_secs).to_string()];
            for result in &successful {
                match result.samples.get(slot) {
                    Some(sample) => row.push(sample.watts.to_string()),
                    None => row.push(String::new()),
                }
            }
            writeln!(out, "{}", row.join(","))?;
        }
        out.flush()?;

        let summary_path = self.artifact_path(label, "power_summary", iteration);
        let file = File::create(&summary_path)
            .with_context(|| format!("Failed to create {}", summary_path.display()))?;
        let mut out = BufWriter::new(file);
        writeln!(
            out,
            "Browser,Avg Power (W),Max Power (W),Min Power (W),Total Energy (Wh)"
        )?;
        for result in &successful {
            writeln!(
                out,
                "{},{},{},{},{}",
                result.browser_label,
                result.avg_power,
                result.max_power,
                result.min_power,
                result.total_energy_wh
            )?;
        }
        out.flush()?;

        Ok((detail_path, summary_path))
    }

    /// Write the cross-iteration aggregate table for one workload. Power
    /// columns carry two decimals, energy columns four.
    pub fn write_aggregate(&self, label: &str, stats: &[AggregateStat]) -> Result<PathBuf> {
        let path = self.artifact_path(label, "aggregate_results", None);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut out = BufWriter::new(file);
        writeln!(
            out,
            "Browser,Avg Power Mean (W),Avg Power StdDev (W),Max Power Mean (W),Max Power StdDev (W),Min Power Mean (W),Min Power StdDev (W),Total Energy Mean (Wh),Total Energy StdDev (Wh)"
        )?;
        for stat in stats {
            writeln!(
                out,
                "{},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.4},{:.4}",
                stat.browser_label,
                stat.mean_avg_power,
                stat.stdev_avg_power,
                stat.mean_max_power,
                stat.stdev_max_power,
                stat.mean_min_power,
                stat.stdev_min_power,
                stat.mean_total_energy,
                stat.stdev_total_energy
            )?;
        }
        out.flush()?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(watts: &[f64]) -> Vec<PowerSample> {
        watts
            .iter()
            .enumerate()
            .map(|(i, &w)| PowerSample {
                elapsed_secs: i as f64,
                watts: w,
            })
            .collect()
    }

    fn run(browser: &str, watts: &[f64]) -> RunResult {
        RunResult::from_samples(browser, Workload::Video, samples(watts), 1.0)
    }

    #[test]
    fn summary_orders_min_avg_max() {
        let result = run("Firefox", &[3.0, 9.5, 4.25, 7.75]);
        assert!(result.min_power <= result.avg_power);
        assert!(result.avg_power <= result.max_power);
        assert_eq!(result.min_power, 3.0);
        assert_eq!(result.max_power, 9.5);
    }

    #[test]
    fn energy_is_watt_sum_scaled_by_interval() {
        let watts = [2.0, 4.0, 6.0];
        let result = RunResult::from_samples("Chrome", Workload::Webpage, samples(&watts), 2.0);
        let expected = watts.iter().sum::<f64>() * 2.0 / 3600.0;
        assert_eq!(result.total_energy_wh, expected);
    }

    #[test]
    fn constant_readings_reproduce_the_reference_run() {
        // Three 5 W readings at one-second cadence.
        let result = run("Firefox", &[5.0, 5.0, 5.0]);
        assert_eq!(result.avg_power, 5.0);
        assert_eq!(result.max_power, 5.0);
        assert_eq!(result.min_power, 5.0);
        assert!((result.total_energy_wh - 5.0 * 3.0 / 3600.0).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "a run without samples has no result")]
    fn empty_sample_sequences_cannot_become_results() {
        let _ = RunResult::from_samples("Firefox", Workload::Video, Vec::new(), 1.0);
    }

    #[test]
    fn single_contribution_has_zero_stdev() {
        let iterations = vec![vec![Some(run("Firefox", &[10.0, 12.0]))]];
        let stats = aggregate_across_iterations(Workload::Video, &iterations);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].stdev_avg_power, 0.0);
        assert_eq!(stats[0].stdev_max_power, 0.0);
        assert_eq!(stats[0].stdev_min_power, 0.0);
        assert_eq!(stats[0].stdev_total_energy, 0.0);
    }

    #[test]
    fn two_contributions_compute_sample_stdev() {
        let iterations = vec![
            vec![Some(run("Firefox", &[10.0]))],
            vec![Some(run("Firefox", &[12.0]))],
        ];
        let stats = aggregate_across_iterations(Workload::Video, &iterations);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].mean_avg_power, 11.0);
        assert!((stats[0].stdev_avg_power - 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn browsers_missing_from_an_iteration_are_not_zero_filled() {
        let iterations = vec![
            vec![Some(run("Firefox", &[10.0])), Some(run("Chrome", &[20.0]))],
            vec![Some(run("Firefox", &[14.0])), None],
        ];
        let stats = aggregate_across_iterations(Workload::Video, &iterations);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].browser_label, "Firefox");
        assert_eq!(stats[0].mean_avg_power, 12.0);
        assert_eq!(stats[1].browser_label, "Chrome");
        assert_eq!(stats[1].mean_avg_power, 20.0);
        assert_eq!(stats[1].stdev_avg_power, 0.0);
    }

    #[test]
    fn aggregate_grouping_is_case_sensitive() {
        let iterations = vec![vec![
            Some(run("Firefox", &[10.0])),
            Some(run("firefox", &[20.0])),
        ]];
        let stats = aggregate_across_iterations(Workload::Video, &iterations);
        assert_eq!(stats.len(), 2);
    }

    fn test_writer() -> (tempfile::TempDir, ReportWriter) {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path(), "20260101_120000", 1).unwrap();
        (dir, writer)
    }

    #[test]
    fn detail_rows_pad_shorter_columns_with_blanks() {
        let (_dir, writer) = test_writer();
        let results = vec![
            Some(run("Firefox", &[1.0, 2.0, 3.0])),
            Some(run("Chrome", &[4.0])),
        ];
        let (detail_path, _) = writer
            .write_run_artifacts(&results, "video", Some(1))
            .unwrap();

        let contents = fs::read_to_string(&detail_path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "Time (s),Firefox,Chrome");
        assert_eq!(lines[1], "0,1,4");
        assert_eq!(lines[2], "1,2,");
        assert_eq!(lines[3], "2,3,");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn failed_runs_are_skipped_without_blocking_the_rest() {
        let (_dir, writer) = test_writer();
        let results = vec![None, Some(run("Chrome", &[4.0, 5.0]))];
        let (detail_path, summary_path) = writer
            .write_run_artifacts(&results, "webpage", None)
            .unwrap();

        let detail = fs::read_to_string(&detail_path).unwrap();
        assert!(detail.starts_with("Time (s),Chrome\n"));
        let summary = fs::read_to_string(&summary_path).unwrap();
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("Chrome,4.5,5,4,"));
    }

    #[test]
    fn all_failed_runs_still_produce_header_only_artifacts() {
        let (_dir, writer) = test_writer();
        let results: Vec<Option<RunResult>> = vec![None, None];
        let (detail_path, summary_path) = writer
            .write_run_artifacts(&results, "animation", Some(2))
            .unwrap();
        assert_eq!(fs::read_to_string(&detail_path).unwrap(), "Time (s)\n");
        assert!(
            fs::read_to_string(&summary_path)
                .unwrap()
                .starts_with("Browser,Avg Power (W)")
        );
    }

    #[test]
    fn artifact_names_carry_iteration_and_timestamp() {
        let (_dir, writer) = test_writer();
        let results = vec![Some(run("Firefox", &[1.0]))];
        let (detail_path, summary_path) = writer
            .write_run_artifacts(&results, "video", Some(3))
            .unwrap();
        assert!(
            detail_path
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .eq("video_power_details_iter3_20260101_120000.csv")
        );
        assert!(
            summary_path
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .eq("video_power_summary_iter3_20260101_120000.csv")
        );
    }

    #[test]
    fn aggregate_formats_power_and_energy_precision() {
        let (_dir, writer) = test_writer();
        let stats = vec![AggregateStat {
            browser_label: "Firefox".into(),
            workload: Workload::Video,
            mean_avg_power: 11.0,
            stdev_avg_power: 2.0_f64.sqrt(),
            mean_max_power: 12.5,
            stdev_max_power: 0.0,
            mean_min_power: 9.25,
            stdev_min_power: 0.0,
            mean_total_energy: 0.1833333,
            stdev_total_energy: 0.0,
        }];
        let path = writer.write_aggregate("video", &stats).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines[0],
            "Browser,Avg Power Mean (W),Avg Power StdDev (W),Max Power Mean (W),Max Power StdDev (W),Min Power Mean (W),Min Power StdDev (W),Total Energy Mean (Wh),Total Energy StdDev (Wh)"
        );
        assert_eq!(lines[1], "Firefox,11.00,1.41,12.50,0.00,9.25,0.00,0.1833,0.0000");
        assert!(
            path.file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .eq("video_aggregate_results_20260101_120000.csv")
        );
    }
}
