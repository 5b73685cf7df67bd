use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

/// Workload labels in campaign order; also the aggregate file name prefixes.
pub const WORKLOAD_LABELS: [&str; 5] = [
    "video",
    "animation",
    "js_computation",
    "webpage",
    "multiple_tabs",
];

/// One parsed row of a `<workload>_aggregate_results_*.csv` file.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub browser: String,
    pub avg_power_mean: f64,
    pub avg_power_stdev: f64,
    pub max_power_mean: f64,
    pub max_power_stdev: f64,
    pub min_power_mean: f64,
    pub min_power_stdev: f64,
    pub total_energy_mean: f64,
    pub total_energy_stdev: f64,
}

/// The newest aggregate table for one workload.
#[derive(Debug, Clone)]
pub struct WorkloadTable {
    pub workload: String,
    pub rows: Vec<AggregateRow>,
}

/// The newest aggregate file for a workload, by file name sort (the names
/// embed a sortable timestamp).
pub fn newest_aggregate(results_dir: &Path, workload: &str) -> Result<Option<PathBuf>> {
    let prefix = format!("{workload}_aggregate_results_");
    let mut names: Vec<String> = Vec::new();
    let entries = match fs::read_dir(results_dir) {
        Ok(entries) => entries,
        Err(err) => {
            bail!(
                "unable to read results directory {}: {err}",
                results_dir.display()
            );
        }
    };
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix) && name.ends_with(".csv") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names.pop().map(|name| results_dir.join(name)))
}

pub fn parse_aggregate_csv(raw: &str) -> Result<Vec<AggregateRow>> {
    let mut lines = raw.lines();
    let header = lines.next().context("aggregate file is empty")?;
    if !header.starts_with("Browser,") {
        bail!("unexpected aggregate header: {header}");
    }

    let mut rows = Vec::new();
    for (index, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 9 {
            bail!("aggregate row {} has {} fields, expected 9", index + 2, fields.len());
        }
        let parse = |field: &str| -> Result<f64> {
            field
                .trim()
                .parse::<f64>()
                .with_context(|| format!("bad numeric field '{field}' in row {}", index + 2))
        };
        rows.push(AggregateRow {
            browser: fields[0].trim().to_string(),
            avg_power_mean: parse(fields[1])?,
            avg_power_stdev: parse(fields[2])?,
            max_power_mean: parse(fields[3])?,
            max_power_stdev: parse(fields[4])?,
            min_power_mean: parse(fields[5])?,
            min_power_stdev: parse(fields[6])?,
            total_energy_mean: parse(fields[7])?,
            total_energy_stdev: parse(fields[8])?,
        });
    }
    Ok(rows)
}

/// Load the newest aggregate table per workload. Workloads with no
/// aggregate file are skipped; an unparseable file is skipped with a
/// warning rather than aborting the whole analysis.
pub fn load_tables(results_dir: &Path) -> Result<Vec<WorkloadTable>> {
    let mut tables = Vec::new();
    for workload in WORKLOAD_LABELS {
        let Some(path) = newest_aggregate(results_dir, workload)? else {
            debug!(workload, "no aggregate file found");
            continue;
        };
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("unable to read {}", path.display()))?;
        match parse_aggregate_csv(&raw) {
            Ok(rows) => {
                debug!(workload, entries = rows.len(), path = %path.display(), "loaded aggregate data");
                tables.push(WorkloadTable {
                    workload: workload.to_string(),
                    rows,
                });
            }
            Err(err) => warn!(workload, path = %path.display(), error = %err, "skipping malformed aggregate file"),
        }
    }
    Ok(tables)
}

/// `js_computation` -> `Js Computation`.
pub fn title_case(label: &str) -> String {
    label
        .split('_')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// First letter uppercased, the rest lowercased.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// 1-based rank per (lowercased) browser, 1 = lowest value.
pub fn rank_browsers(
    rows: &[AggregateRow],
    value: impl Fn(&AggregateRow) -> f64,
) -> Vec<(String, usize)> {
    let mut ordered: Vec<&AggregateRow> = rows.iter().collect();
    ordered.sort_by(|a, b| value(a).total_cmp(&value(b)));
    ordered
        .into_iter()
        .enumerate()
        .map(|(index, row)| (row.browser.to_lowercase(), index + 1))
        .collect()
}

/// Workload × browser rank matrices for the heatmap. Browsers are the
/// sorted union over all workloads; a browser missing from a workload has
/// no rank there.
#[derive(Debug, Clone)]
pub struct RankingMatrix {
    pub workloads: Vec<String>,
    pub browsers: Vec<String>,
    pub power_ranks: Vec<Vec<Option<usize>>>,
    pub energy_ranks: Vec<Vec<Option<usize>>>,
}

pub fn ranking_matrix(tables: &[WorkloadTable]) -> RankingMatrix {
    let browsers: Vec<String> = tables
        .iter()
        .flat_map(|table| table.rows.iter().map(|row| row.browser.to_lowercase()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let rank_table = |value: fn(&AggregateRow) -> f64| -> Vec<Vec<Option<usize>>> {
        tables
            .iter()
            .map(|table| {
                let ranks = rank_browsers(&table.rows, value);
                browsers
                    .iter()
                    .map(|browser| {
                        ranks
                            .iter()
                            .find(|(name, _)| name == browser)
                            .map(|(_, rank)| *rank)
                    })
                    .collect()
            })
            .collect()
    };

    let power_ranks = rank_table(|row| row.avg_power_mean);
    let energy_ranks = rank_table(|row| row.total_energy_mean);

    RankingMatrix {
        workloads: tables.iter().map(|t| t.workload.clone()).collect(),
        browsers,
        power_ranks,
        energy_ranks,
    }
}

/// Per-browser polyline for the radar chart: mean average power per
/// workload, min-max normalized and inverted so 1.0 marks the most
/// efficient browser. Only browsers present in every workload qualify.
#[derive(Debug, Clone, PartialEq)]
pub struct RadarSeries {
    pub browser: String,
    pub values: Vec<f64>,
}

pub fn normalized_power_scores(tables: &[WorkloadTable]) -> Vec<RadarSeries> {
    if tables.is_empty() {
        return Vec::new();
    }

    let mut common: Option<BTreeSet<String>> = None;
    for table in tables {
        let browsers: BTreeSet<String> = table
            .rows
            .iter()
            .map(|row| row.browser.to_lowercase())
            .collect();
        common = Some(match common {
            Some(existing) => existing.intersection(&browsers).cloned().collect(),
            None => browsers,
        });
    }
    let common = common.unwrap_or_default();
    if common.is_empty() {
        return Vec::new();
    }

    let mut series: Vec<RadarSeries> = common
        .iter()
        .map(|browser| RadarSeries {
            browser: browser.clone(),
            values: Vec::new(),
        })
        .collect();

    for table in tables {
        let value_of = |browser: &str| -> f64 {
            table
                .rows
                .iter()
                .find(|row| row.browser.eq_ignore_ascii_case(browser))
                .map(|row| row.avg_power_mean)
                .unwrap_or(0.0)
        };
        let values: Vec<f64> = common.iter().map(|browser| value_of(browser)).collect();
        let min = values.iter().copied().fold(f64::MAX, f64::min);
        let max = values.iter().copied().fold(f64::MIN, f64::max);
        for (entry, value) in series.iter_mut().zip(&values) {
            let score = if (max - min).abs() < f64::EPSILON {
                1.0
            } else {
                (max - value) / (max - min)
            };
            entry.values.push(score);
        }
    }
    series
}

/// Composite efficiency index: per workload, 100 × (max − value) / range
/// over mean average power (100 when every browser draws the same),
/// averaged over the workloads a browser appears in. Sorted best-first.
#[derive(Debug, Clone, PartialEq)]
pub struct EfficiencyScore {
    pub browser: String,
    pub average: f64,
}

pub fn efficiency_index(tables: &[WorkloadTable]) -> Vec<EfficiencyScore> {
    let mut order: Vec<String> = Vec::new();
    let mut totals: std::collections::HashMap<String, (f64, usize)> =
        std::collections::HashMap::new();

    for table in tables {
        let min = table
            .rows
            .iter()
            .map(|row| row.avg_power_mean)
            .fold(f64::MAX, f64::min);
        let max = table
            .rows
            .iter()
            .map(|row| row.avg_power_mean)
            .fold(f64::MIN, f64::max);
        let range = max - min;

        for row in &table.rows {
            let score = if range > 0.0 {
                100.0 * (max - row.avg_power_mean) / range
            } else {
                100.0
            };
            let key = row.browser.to_lowercase();
            let entry = totals.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                (0.0, 0)
            });
            entry.0 += score;
            entry.1 += 1;
        }
    }

    let mut scores: Vec<EfficiencyScore> = order
        .into_iter()
        .map(|browser| {
            let (total, count) = totals[&browser];
            EfficiencyScore {
                browser: capitalize(&browser),
                average: total / count as f64,
            }
        })
        .collect();
    scores.sort_by(|a, b| b.average.total_cmp(&a.average));
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "Browser,Avg Power Mean (W),Avg Power StdDev (W),Max Power Mean (W),Max Power StdDev (W),Min Power Mean (W),Min Power StdDev (W),Total Energy Mean (Wh),Total Energy StdDev (Wh)\n\
Firefox,10.00,1.41,12.50,0.00,9.25,0.00,0.1833,0.0000\n\
Chrome,12.00,0.50,14.00,0.10,10.00,0.20,0.2000,0.0010\n";

    fn row(browser: &str, avg: f64, energy: f64) -> AggregateRow {
        AggregateRow {
            browser: browser.into(),
            avg_power_mean: avg,
            avg_power_stdev: 0.0,
            max_power_mean: avg + 1.0,
            max_power_stdev: 0.0,
            min_power_mean: avg - 1.0,
            min_power_stdev: 0.0,
            total_energy_mean: energy,
            total_energy_stdev: 0.0,
        }
    }

    fn table(workload: &str, rows: Vec<AggregateRow>) -> WorkloadTable {
        WorkloadTable {
            workload: workload.into(),
            rows,
        }
    }

    #[test]
    fn parses_aggregate_rows() {
        let rows = parse_aggregate_csv(SAMPLE_CSV).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].browser, "Firefox");
        assert_eq!(rows[0].avg_power_mean, 10.0);
        assert_eq!(rows[0].avg_power_stdev, 1.41);
        assert_eq!(rows[1].total_energy_mean, 0.2);
    }

    #[test]
    fn rejects_short_rows() {
        let raw = "Browser,Avg Power Mean (W)\nFirefox,1.0\n";
        assert!(parse_aggregate_csv(raw).is_err());
    }

    #[test]
    fn newest_aggregate_picks_the_latest_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        for stamp in ["20260101_090000", "20260102_090000", "20251231_235959"] {
            fs::write(
                dir.path().join(format!("video_aggregate_results_{stamp}.csv")),
                SAMPLE_CSV,
            )
            .unwrap();
        }
        fs::write(
            dir.path().join("animation_aggregate_results_20260301_000000.csv"),
            SAMPLE_CSV,
        )
        .unwrap();

        let newest = newest_aggregate(dir.path(), "video").unwrap().unwrap();
        assert_eq!(
            newest.file_name().unwrap().to_str().unwrap(),
            "video_aggregate_results_20260102_090000.csv"
        );
    }

    #[test]
    fn missing_aggregate_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(newest_aggregate(dir.path(), "webpage").unwrap().is_none());
    }

    #[test]
    fn title_case_and_capitalize() {
        assert_eq!(title_case("js_computation"), "Js Computation");
        assert_eq!(title_case("video"), "Video");
        assert_eq!(capitalize("FIREFOX"), "Firefox");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn ranks_are_one_based_and_ascending_by_value() {
        let rows = vec![
            row("Chrome", 12.0, 0.2),
            row("Firefox", 10.0, 0.18),
            row("Opera", 11.0, 0.19),
        ];
        let ranks = rank_browsers(&rows, |r| r.avg_power_mean);
        assert_eq!(
            ranks,
            vec![
                ("firefox".to_string(), 1),
                ("opera".to_string(), 2),
                ("chrome".to_string(), 3),
            ]
        );
    }

    #[test]
    fn ranking_matrix_marks_missing_browsers() {
        let tables = vec![
            table("video", vec![row("Firefox", 10.0, 0.2), row("Chrome", 12.0, 0.3)]),
            table("webpage", vec![row("Firefox", 8.0, 0.1)]),
        ];
        let matrix = ranking_matrix(&tables);
        assert_eq!(matrix.browsers, vec!["chrome", "firefox"]);
        assert_eq!(matrix.workloads, vec!["video", "webpage"]);
        assert_eq!(matrix.power_ranks[0], vec![Some(2), Some(1)]);
        assert_eq!(matrix.power_ranks[1], vec![None, Some(1)]);
        assert_eq!(matrix.energy_ranks[0], vec![Some(2), Some(1)]);
    }

    #[test]
    fn radar_scores_invert_and_normalize_power() {
        let tables = vec![
            table("video", vec![row("Firefox", 10.0, 0.2), row("Chrome", 14.0, 0.3)]),
            table("webpage", vec![row("Firefox", 9.0, 0.1), row("Chrome", 9.0, 0.1)]),
        ];
        let series = normalized_power_scores(&tables);
        assert_eq!(series.len(), 2);
        let firefox = series.iter().find(|s| s.browser == "firefox").unwrap();
        let chrome = series.iter().find(|s| s.browser == "chrome").unwrap();
        assert_eq!(firefox.values, vec![1.0, 1.0]);
        assert_eq!(chrome.values, vec![0.0, 1.0]);
    }

    #[test]
    fn radar_requires_browsers_common_to_all_workloads() {
        let tables = vec![
            table("video", vec![row("Firefox", 10.0, 0.2)]),
            table("webpage", vec![row("Chrome", 9.0, 0.1)]),
        ];
        assert!(normalized_power_scores(&tables).is_empty());
    }

    #[test]
    fn efficiency_index_averages_per_workload_scores() {
        let tables = vec![
            table("video", vec![row("Firefox", 10.0, 0.2), row("Chrome", 12.0, 0.3)]),
            table("webpage", vec![row("Firefox", 10.0, 0.2), row("Chrome", 10.0, 0.2)]),
        ];
        let scores = efficiency_index(&tables);
        assert_eq!(scores[0].browser, "Firefox");
        assert_eq!(scores[0].average, 100.0);
        assert_eq!(scores[1].browser, "Chrome");
        // 0 for video, 100 for the flat webpage range.
        assert_eq!(scores[1].average, 50.0);
    }

    #[test]
    fn load_tables_skips_workloads_without_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("video_aggregate_results_20260101_000000.csv"),
            SAMPLE_CSV,
        )
        .unwrap();
        let tables = load_tables(dir.path()).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].workload, "video");
        assert_eq!(tables[0].rows.len(), 2);
    }
}
