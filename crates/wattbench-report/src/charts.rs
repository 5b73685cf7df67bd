use std::path::{Path, PathBuf};

use anyhow::Result;
use plotters::prelude::*;

use crate::data::{
    EfficiencyScore, RadarSeries, RankingMatrix, WorkloadTable, capitalize, title_case,
};

const PANEL_WIDTH: u32 = 1400;
const PANEL_HEIGHT: u32 = 400;
const FALLBACK_COLOR: RGBColor = RGBColor(0x33, 0x33, 0x33);

/// Fixed per-browser chart color, keyed by lowercased label.
pub fn browser_color(name: &str) -> RGBColor {
    match name.to_lowercase().as_str() {
        "firefox" => RGBColor(0xFF, 0x6F, 0x61),
        "chrome" => RGBColor(0x5B, 0x84, 0xB1),
        "chromium" => RGBColor(0x42, 0xBF, 0xDD),
        "brave" => RGBColor(0xFC, 0x76, 0x6A),
        "edge" => RGBColor(0x5F, 0x4B, 0x8B),
        "opera" => RGBColor(0xE6, 0x9A, 0x8D),
        "vivaldi" => RGBColor(0xF7, 0xCA, 0xC9),
        _ => FALLBACK_COLOR,
    }
}

fn render_err<E: std::fmt::Display>(err: E) -> anyhow::Error {
    anyhow::anyhow!("chart rendering failed: {err}")
}

struct Bar {
    name: String,
    value: f64,
    stdev: f64,
}

/// One bar panel: ascending bars with stdev whiskers and value labels.
fn draw_bar_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    title: &str,
    y_desc: &str,
    bars: &[Bar],
    value_label: &dyn Fn(f64) -> String,
    y_range: Option<(f64, f64)>,
) -> Result<()> {
    if bars.is_empty() {
        return Ok(());
    }
    let (y_min, y_max) = y_range.unwrap_or_else(|| {
        let peak = bars
            .iter()
            .map(|bar| bar.value + bar.stdev)
            .fold(0.0_f64, f64::max);
        (0.0, (peak * 1.2).max(1.0))
    });
    let names: Vec<String> = bars.iter().map(|bar| bar.name.clone()).collect();
    let count = bars.len();

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 22))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(-0.5f64..(count as f64 - 0.5), y_min..y_max)
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc(y_desc)
        .x_desc("Browser")
        .x_labels(count)
        .x_label_formatter(&|x: &f64| {
            let index = x.round();
            if (x - index).abs() < 1e-6 && index >= 0.0 && (index as usize) < names.len() {
                names[index as usize].clone()
            } else {
                String::new()
            }
        })
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(bars.iter().enumerate().map(|(i, bar)| {
            Rectangle::new(
                [(i as f64 - 0.35, y_min), (i as f64 + 0.35, bar.value)],
                browser_color(&bar.name).filled(),
            )
        }))
        .map_err(render_err)?;

    chart
        .draw_series(
            bars.iter()
                .enumerate()
                .filter(|(_, bar)| bar.stdev > 0.0)
                .map(|(i, bar)| {
                    ErrorBar::new_vertical(
                        i as f64,
                        bar.value - bar.stdev,
                        bar.value,
                        bar.value + bar.stdev,
                        BLACK.filled(),
                        10,
                    )
                }),
        )
        .map_err(render_err)?;

    chart
        .draw_series(bars.iter().enumerate().map(|(i, bar)| {
            Text::new(
                value_label(bar.value),
                (i as f64 - 0.2, bar.value + (y_max - y_min) * 0.02),
                ("sans-serif", 14).into_font(),
            )
        }))
        .map_err(render_err)?;

    Ok(())
}

/// Per-workload bar chart of mean average power, ascending, with stdev
/// whiskers.
pub fn average_power_comparison(tables: &[WorkloadTable], out_dir: &Path) -> Result<PathBuf> {
    let path = out_dir.join("average_power_comparison.png");
    draw_comparison(
        &path,
        tables,
        |row| (row.avg_power_mean, row.avg_power_stdev),
        "Average Power Consumption",
        "Average Power (Watts)",
        &|value| format!("{value:.2}W"),
    )?;
    Ok(path)
}

/// Per-workload bar chart of mean total energy, ascending, with stdev
/// whiskers.
pub fn total_energy_comparison(tables: &[WorkloadTable], out_dir: &Path) -> Result<PathBuf> {
    let path = out_dir.join("total_energy_comparison.png");
    draw_comparison(
        &path,
        tables,
        |row| (row.total_energy_mean, row.total_energy_stdev),
        "Total Energy Consumption",
        "Total Energy (Watt-hours)",
        &|value| format!("{value:.4}Wh"),
    )?;
    Ok(path)
}

fn draw_comparison(
    path: &Path,
    tables: &[WorkloadTable],
    metric: fn(&crate::data::AggregateRow) -> (f64, f64),
    title_prefix: &str,
    y_desc: &str,
    value_label: &dyn Fn(f64) -> String,
) -> Result<()> {
    let rows = tables.len().max(1) as u32;
    let root = BitMapBackend::new(path, (PANEL_WIDTH, PANEL_HEIGHT * rows)).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;
    let panels = root.split_evenly((tables.len().max(1), 1));

    for (panel, table) in panels.iter().zip(tables) {
        let mut bars: Vec<Bar> = table
            .rows
            .iter()
            .map(|row| {
                let (value, stdev) = metric(row);
                Bar {
                    name: row.browser.clone(),
                    value,
                    stdev,
                }
            })
            .collect();
        bars.sort_by(|a, b| a.value.total_cmp(&b.value));

        draw_bar_panel(
            panel,
            &format!("{title_prefix} - {} Test", title_case(&table.workload)),
            y_desc,
            &bars,
            value_label,
            None,
        )?;
    }

    root.present().map_err(render_err)?;
    Ok(())
}

/// Green (best rank) through yellow to red (worst rank).
fn rank_color(rank: usize, max_rank: usize) -> RGBColor {
    let t = if max_rank <= 1 {
        0.0
    } else {
        (rank - 1) as f64 / (max_rank - 1) as f64
    };
    let lerp = |a: u8, b: u8, t: f64| -> u8 { (a as f64 + (b as f64 - a as f64) * t) as u8 };
    let green = (0x4C, 0xAF, 0x50);
    let yellow = (0xFF, 0xEB, 0x3B);
    let red = (0xF4, 0x43, 0x36);
    if t < 0.5 {
        let t = t * 2.0;
        RGBColor(
            lerp(green.0, yellow.0, t),
            lerp(green.1, yellow.1, t),
            lerp(green.2, yellow.2, t),
        )
    } else {
        let t = (t - 0.5) * 2.0;
        RGBColor(
            lerp(yellow.0, red.0, t),
            lerp(yellow.1, red.1, t),
            lerp(yellow.2, red.2, t),
        )
    }
}

/// Two stacked workload × browser rank heatmaps: average power on top,
/// total energy below. Rank 1 is the most efficient.
pub fn ranking_heatmap(matrix: &RankingMatrix, out_dir: &Path) -> Result<PathBuf> {
    let path = out_dir.join("browser_ranking_heatmap.png");
    let root = BitMapBackend::new(&path, (1200, 1000)).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;
    let panels = root.split_evenly((2, 1));

    draw_rank_panel(
        &panels[0],
        matrix,
        &matrix.power_ranks,
        "Browser Rankings by Average Power Consumption (1 = Best/Lowest Power)",
    )?;
    draw_rank_panel(
        &panels[1],
        matrix,
        &matrix.energy_ranks,
        "Browser Rankings by Total Energy Consumption (1 = Best/Lowest Energy)",
    )?;

    root.present().map_err(render_err)?;
    drop(panels);
    drop(root);
    Ok(path)
}

fn draw_rank_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    matrix: &RankingMatrix,
    ranks: &[Vec<Option<usize>>],
    title: &str,
) -> Result<()> {
    let cols = matrix.browsers.len();
    let rows = matrix.workloads.len();
    if cols == 0 || rows == 0 {
        return Ok(());
    }
    let max_rank = ranks.iter().flatten().flatten().copied().max().unwrap_or(1);

    let browser_names: Vec<String> = matrix.browsers.iter().map(|b| capitalize(b)).collect();
    let workload_names: Vec<String> = matrix.workloads.iter().map(|w| title_case(w)).collect();

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 20))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(130)
        .build_cartesian_2d(
            -0.5f64..(cols as f64 - 0.5),
            -0.5f64..(rows as f64 - 0.5),
        )
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("Browser")
        .y_desc("Test Type")
        .x_labels(cols)
        .y_labels(rows)
        .x_label_formatter(&|x: &f64| {
            let index = x.round();
            if (x - index).abs() < 1e-6 && index >= 0.0 && (index as usize) < browser_names.len() {
                browser_names[index as usize].clone()
            } else {
                String::new()
            }
        })
        .y_label_formatter(&|y: &f64| {
            let index = y.round();
            if (y - index).abs() < 1e-6 && index >= 0.0 && (index as usize) < workload_names.len() {
                // First workload sits on the top row.
                workload_names[workload_names.len() - 1 - index as usize].clone()
            } else {
                String::new()
            }
        })
        .draw()
        .map_err(render_err)?;

    for (r, row) in ranks.iter().enumerate() {
        let y = (rows - 1 - r) as f64;
        for (c, rank) in row.iter().enumerate() {
            let x = c as f64;
            let fill = match rank {
                Some(rank) => rank_color(*rank, max_rank),
                None => RGBColor(0xE0, 0xE0, 0xE0),
            };
            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
                    fill.filled(),
                )))
                .map_err(render_err)?;
            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
                    WHITE.stroke_width(2),
                )))
                .map_err(render_err)?;
            if let Some(rank) = rank {
                chart
                    .draw_series(std::iter::once(Text::new(
                        rank.to_string(),
                        (x - 0.03, y + 0.05),
                        ("sans-serif", 18).into_font(),
                    )))
                    .map_err(render_err)?;
            }
        }
    }

    Ok(())
}

/// Radar chart of normalized efficiency per workload for the browsers
/// common to every workload. Callers skip rendering when `series` is empty.
pub fn radar_chart(
    workloads: &[String],
    series: &[RadarSeries],
    out_dir: &Path,
) -> Result<PathBuf> {
    let path = out_dir.join("browser_radar_chart.png");
    let root = BitMapBackend::new(&path, (1000, 1000)).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let spoke_count = workloads.len().max(1);
    let polar = |radius: f64, spoke: usize| -> (f64, f64) {
        let angle = std::f64::consts::FRAC_PI_2
            - spoke as f64 * std::f64::consts::TAU / spoke_count as f64;
        (radius * angle.cos(), radius * angle.sin())
    };

    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Browser Efficiency Across Test Types (Higher is Better - Normalized)",
            ("sans-serif", 22),
        )
        .margin(20)
        .build_cartesian_2d(-1.45f64..1.45f64, -1.45f64..1.45f64)
        .map_err(render_err)?;

    let grid = RGBColor(0xB0, 0xB0, 0xB0);
    for ring in [0.25, 0.5, 0.75, 1.0] {
        let mut points: Vec<(f64, f64)> =
            (0..spoke_count).map(|spoke| polar(ring, spoke)).collect();
        points.push(points[0]);
        chart
            .draw_series(std::iter::once(PathElement::new(points, grid)))
            .map_err(render_err)?;
        chart
            .draw_series(std::iter::once(Text::new(
                format!("{ring:.2}"),
                (0.03, ring),
                ("sans-serif", 13).into_font(),
            )))
            .map_err(render_err)?;
    }
    for spoke in 0..spoke_count {
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(0.0, 0.0), polar(1.05, spoke)],
                grid,
            )))
            .map_err(render_err)?;
    }
    for (spoke, workload) in workloads.iter().enumerate() {
        chart
            .draw_series(std::iter::once(Text::new(
                title_case(workload),
                polar(1.12, spoke),
                ("sans-serif", 16).into_font(),
            )))
            .map_err(render_err)?;
    }

    for entry in series {
        let color = browser_color(&entry.browser);
        let mut points: Vec<(f64, f64)> = entry
            .values
            .iter()
            .enumerate()
            .map(|(spoke, value)| polar(*value, spoke))
            .collect();
        points.push(points[0]);

        chart
            .draw_series(std::iter::once(Polygon::new(points.clone(), color.mix(0.1))))
            .map_err(render_err)?;
        chart
            .draw_series(std::iter::once(PathElement::new(
                points,
                color.stroke_width(2),
            )))
            .map_err(render_err)?
            .label(capitalize(&entry.browser))
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 18, y)], color.stroke_width(2))
            });
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK)
        .label_font(("sans-serif", 16))
        .draw()
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    drop(chart);
    drop(root);
    Ok(path)
}

/// Bar chart of the composite efficiency index, best browser first.
pub fn efficiency_index_chart(scores: &[EfficiencyScore], out_dir: &Path) -> Result<PathBuf> {
    let path = out_dir.join("browser_efficiency_index.png");
    let root = BitMapBackend::new(&path, (1200, 800)).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let bars: Vec<Bar> = scores
        .iter()
        .map(|score| Bar {
            name: score.browser.clone(),
            value: score.average,
            stdev: 0.0,
        })
        .collect();

    draw_bar_panel(
        &root,
        "Browser Power Efficiency Index (Higher Score = Better Efficiency)",
        "Efficiency Score (0-100)",
        &bars,
        &|value| format!("{value:.1}"),
        Some((0.0, 105.0)),
    )?;

    root.present().map_err(render_err)?;
    drop(root);
    Ok(path)
}
