//! Step charts of cumulative losses and occurrences, rendered to SVG

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use plotters::coord::ranged1d::{AsRangedCoord, ValueFormatter};
use plotters::prelude::*;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::report::{file_stem, IssueHistory};

const CHART_SIZE: (u32, u32) = (1024, 640);
const SECONDS_PER_DAY: f64 = 86_400.0;

/// The three charts drawn for every issue type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    CumulativeLoss,
    CumulativeLossLog,
    Occurrences,
}

impl ChartKind {
    pub const ALL: [ChartKind; 3] = [
        ChartKind::CumulativeLoss,
        ChartKind::CumulativeLossLog,
        ChartKind::Occurrences,
    ];

    fn file_prefix(self) -> &'static str {
        match self {
            ChartKind::CumulativeLoss => "cumsum",
            ChartKind::CumulativeLossLog => "logscale_cumsum",
            ChartKind::Occurrences => "occurrences",
        }
    }

    pub fn title(self, name: &str) -> String {
        match self {
            ChartKind::CumulativeLoss => format!("{} - Cumulative Sum", name),
            ChartKind::CumulativeLossLog => format!("{} - Cumulative Sum Log Scale", name),
            ChartKind::Occurrences => format!("{} - Cumulative Sum of Issue Occurrences", name),
        }
    }

    fn y_label(self) -> &'static str {
        match self {
            ChartKind::Occurrences => "Number of Issues",
            _ => "Funds Lost in USD",
        }
    }
}

/// Output path for one chart of one issue type.
pub fn chart_path(output_dir: &Path, kind: ChartKind, name: &str) -> PathBuf {
    output_dir.join(format!("{}_{}.svg", kind.file_prefix(), file_stem(name)))
}

/// Render all three charts, returning the written paths.
pub fn render_all(history: &IssueHistory, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(ChartKind::ALL.len());
    for kind in ChartKind::ALL {
        let path = chart_path(output_dir, kind, &history.name);
        render(history, kind, &path)?;
        tracing::debug!("Wrote {:?}", path);
        written.push(path);
    }
    Ok(written)
}

/// Render one chart kind for `history` to `path`.
pub fn render(history: &IssueHistory, kind: ChartKind, path: &Path) -> Result<()> {
    if history.is_empty() {
        anyhow::bail!("No dated incidents for {:?}", history.name);
    }

    let series: Vec<(f64, f64)> = history
        .points
        .iter()
        .map(|p| {
            let y = match kind {
                ChartKind::Occurrences => p.occurrences as f64,
                _ => p.cumulative_funds_lost as f64,
            };
            (p.date.timestamp() as f64, y)
        })
        .collect();

    let x_range = time_range(&series);
    let title = kind.title(&history.name);

    let drawn = match kind {
        ChartKind::CumulativeLossLog => {
            // Zero losses have no log; floor them at one dollar.
            let clamped: Vec<(f64, f64)> = series.iter().map(|&(x, y)| (x, y.max(1.0))).collect();
            let (lo, hi) = value_bounds(&clamped);
            let hi = if hi > lo { hi * 1.1 } else { lo * 10.0 };
            draw_step_chart(path, &title, kind.y_label(), x_range, (lo..hi).log_scale(), &clamped)
        }
        _ => {
            let (_, hi) = value_bounds(&series);
            let hi = if hi > 0.0 { hi * 1.05 } else { 1.0 };
            draw_step_chart(path, &title, kind.y_label(), x_range, 0.0..hi, &series)
        }
    };
    drawn.with_context(|| format!("Failed to draw {:?}", path))
}

fn draw_step_chart<Y>(
    path: &Path,
    title: &str,
    y_label: &str,
    x_range: Range<f64>,
    y_range: Y,
    series: &[(f64, f64)],
) -> Result<()>
where
    Y: AsRangedCoord<Value = f64>,
    Y::CoordDescType: ValueFormatter<f64>,
{
    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 26))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(110)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_desc("Time")
        .y_desc(y_label)
        .x_labels(8)
        .x_label_formatter(&format_time_label)
        .y_label_formatter(&format_amount)
        .draw()?;

    chart.draw_series(LineSeries::new(step_points(series), BLUE.stroke_width(2)))?;

    root.present()?;
    Ok(())
}

/// Expand a series into a `pre` step line: each value holds from the
/// previous x up to its own x.
fn step_points(series: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut points = Vec::with_capacity(series.len() * 2);
    for (i, &(x, y)) in series.iter().enumerate() {
        if i > 0 {
            points.push((series[i - 1].0, y));
        }
        points.push((x, y));
    }
    points
}

fn time_range(series: &[(f64, f64)]) -> Range<f64> {
    let start = series.first().map(|p| p.0).unwrap_or(0.0);
    let end = series.last().map(|p| p.0).unwrap_or(start);
    if end > start {
        start..end
    } else {
        start - SECONDS_PER_DAY..start + SECONDS_PER_DAY
    }
}

fn value_bounds(series: &[(f64, f64)]) -> (f64, f64) {
    series
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, y)| (lo.min(y), hi.max(y)))
}

fn format_time_label(x: &f64) -> String {
    DateTime::<Utc>::from_timestamp(*x as i64, 0)
        .map(|dt| dt.format("%Y-%m").to_string())
        .unwrap_or_default()
}

fn format_amount(y: &f64) -> String {
    let abs = y.abs();
    if abs >= 1e9 {
        format!("{:.1}B", y / 1e9)
    } else if abs >= 1e6 {
        format!("{:.1}M", y / 1e6)
    } else if abs >= 1e3 {
        format!("{:.1}K", y / 1e3)
    } else {
        format!("{:.0}", y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Incident;

    fn history(name: &str, dated: &[(&str, i64)]) -> IssueHistory {
        let records: Vec<Incident> = dated
            .iter()
            .enumerate()
            .map(|(i, (date, lost))| Incident {
                id: i as u64 + 1,
                date: Some(date.to_string()),
                project_name: "p".to_string(),
                category: "c".to_string(),
                funds_lost: *lost,
                issue_type: name.to_string(),
            })
            .collect();
        IssueHistory::from_records(name, &records)
    }

    #[test]
    fn test_chart_paths() {
        let dir = Path::new("graphs");
        assert_eq!(
            chart_path(dir, ChartKind::CumulativeLoss, "Flash Loan Attack"),
            PathBuf::from("graphs/cumsum_flash_loan_attack.svg")
        );
        assert_eq!(
            chart_path(dir, ChartKind::CumulativeLossLog, "Rugpull"),
            PathBuf::from("graphs/logscale_cumsum_rugpull.svg")
        );
        assert_eq!(
            chart_path(dir, ChartKind::Occurrences, "Rugpull"),
            PathBuf::from("graphs/occurrences_rugpull.svg")
        );
    }

    #[test]
    fn test_titles() {
        assert_eq!(ChartKind::CumulativeLoss.title("Exploit"), "Exploit - Cumulative Sum");
        assert_eq!(
            ChartKind::Occurrences.title("Exploit"),
            "Exploit - Cumulative Sum of Issue Occurrences"
        );
    }

    #[test]
    fn test_step_points() {
        let points = step_points(&[(0.0, 1.0), (10.0, 3.0), (20.0, 6.0)]);
        assert_eq!(
            points,
            vec![(0.0, 1.0), (0.0, 3.0), (10.0, 3.0), (10.0, 6.0), (20.0, 6.0)]
        );
        assert!(step_points(&[]).is_empty());
    }

    #[test]
    fn test_single_point_time_range_is_widened() {
        let range = time_range(&[(1_000_000.0, 5.0)]);
        assert!(range.start < 1_000_000.0 && range.end > 1_000_000.0);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(&950.0), "950");
        assert_eq!(format_amount(&12_500.0), "12.5K");
        assert_eq!(format_amount(&3_400_000.0), "3.4M");
        assert_eq!(format_amount(&1_200_000_000.0), "1.2B");
    }

    #[test]
    fn test_render_all_writes_svg() {
        let dir = tempfile::tempdir().unwrap();
        let history = history(
            "Access Control",
            &[("2021-01-01", 0), ("2021-06-01", 5_000), ("2022-02-01", 2_000_000)],
        );
        let written = render_all(&history, dir.path()).unwrap();

        assert_eq!(written.len(), 3);
        for path in &written {
            let svg = std::fs::read_to_string(path).unwrap();
            assert!(svg.contains("<svg"));
        }
        let cumsum = std::fs::read_to_string(&written[0]).unwrap();
        assert!(cumsum.contains("Access Control - Cumulative Sum"));
    }

    #[test]
    fn test_render_single_incident() {
        let dir = tempfile::tempdir().unwrap();
        let history = history("Rugpull", &[("2022-07-01", 0)]);
        assert!(render_all(&history, dir.path()).is_ok());
    }

    #[test]
    fn test_render_empty_history_fails() {
        let dir = tempfile::tempdir().unwrap();
        let history = history("Honeypot", &[]);
        let path = chart_path(dir.path(), ChartKind::CumulativeLoss, "Honeypot");
        assert!(render(&history, ChartKind::CumulativeLoss, &path).is_err());
    }
}
