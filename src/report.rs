//! Per-issue-type history: grouping, cleaning and running totals

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::chart;
use crate::model::Incident;

/// Group incidents by issue type (exact, case-sensitive match), keys ascending.
pub fn group_by_issue_type(records: &[Incident]) -> BTreeMap<&str, Vec<&Incident>> {
    let mut groups: BTreeMap<&str, Vec<&Incident>> = BTreeMap::new();
    for record in records {
        groups.entry(record.issue_type.as_str()).or_default().push(record);
    }
    groups
}

/// File name stem for an issue type: lower-cased, spaces become underscores.
pub fn file_stem(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

/// One dated incident with the running totals up to and including it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryPoint {
    pub date: DateTime<Utc>,
    pub funds_lost: i64,
    pub cumulative_funds_lost: i64,
    pub occurrences: u64,
}

/// Date-ordered history of one issue type
#[derive(Debug, Clone)]
pub struct IssueHistory {
    pub name: String,
    pub points: Vec<HistoryPoint>,
    /// Records dropped for a missing or unparseable date
    pub skipped: usize,
}

impl IssueHistory {
    pub fn from_records<'a, I>(name: &str, records: I) -> Self
    where
        I: IntoIterator<Item = &'a Incident>,
    {
        let mut skipped = 0;
        let mut dated: Vec<(DateTime<Utc>, i64)> = Vec::new();

        for record in records {
            match record.timestamp() {
                Some(date) => dated.push((date, record.funds_lost)),
                None => {
                    if let Some(raw) = record.date.as_deref() {
                        tracing::warn!("Skipping incident {}: unparseable date {:?}", record.id, raw);
                    }
                    skipped += 1;
                }
            }
        }

        // Stable, so same-day incidents keep arrival order.
        dated.sort_by_key(|(date, _)| *date);

        let mut cumulative: i64 = 0;
        let points = dated
            .into_iter()
            .enumerate()
            .map(|(i, (date, funds_lost))| {
                cumulative = cumulative.saturating_add(funds_lost);
                HistoryPoint {
                    date,
                    funds_lost,
                    cumulative_funds_lost: cumulative,
                    occurrences: i as u64 + 1,
                }
            })
            .collect();

        Self {
            name: name.to_string(),
            points,
            skipped,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn total_funds_lost(&self) -> i64 {
        self.points.last().map(|p| p.cumulative_funds_lost).unwrap_or(0)
    }
}

/// Totals for one issue type, dated or not
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueTotals {
    pub issue_type: String,
    pub incidents: usize,
    pub funds_lost: i64,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Per-issue-type totals over the whole collection.
pub fn summarize(records: &[Incident]) -> Vec<IssueTotals> {
    group_by_issue_type(records)
        .into_iter()
        .map(|(issue_type, group)| {
            let dates: Vec<DateTime<Utc>> = group.iter().filter_map(|r| r.timestamp()).collect();
            IssueTotals {
                issue_type: issue_type.to_string(),
                incidents: group.len(),
                funds_lost: group.iter().fold(0i64, |acc, r| acc.saturating_add(r.funds_lost)),
                first_seen: dates.iter().min().copied(),
                last_seen: dates.iter().max().copied(),
            }
        })
        .collect()
}

/// Outcome of a report run
#[derive(Debug, Default)]
pub struct ReportSummary {
    pub groups: usize,
    pub empty_groups: Vec<String>,
    pub charts_written: Vec<PathBuf>,
    pub skipped_records: usize,
}

/// Drives grouping and chart rendering into one output directory
pub struct Reporter {
    output_dir: PathBuf,
}

impl Reporter {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render the three charts for every issue type.
    pub fn run(&self, records: &[Incident]) -> Result<ReportSummary> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create output directory {:?}", self.output_dir))?;

        let groups = group_by_issue_type(records);
        let mut summary = ReportSummary {
            groups: groups.len(),
            ..Default::default()
        };

        for (name, group) in groups {
            tracing::info!("Processing: {}", name);
            let history = IssueHistory::from_records(name, group);
            summary.skipped_records += history.skipped;

            if history.is_empty() {
                tracing::warn!("No dated incidents for {:?}, skipping charts", name);
                summary.empty_groups.push(name.to_string());
                continue;
            }

            let written = chart::render_all(&history, &self.output_dir)
                .with_context(|| format!("Failed to render charts for {:?}", name))?;
            summary.charts_written.extend(written);
        }

        Ok(summary)
    }
}
