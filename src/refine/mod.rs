pub mod types;

pub use types::{ProjectedRow, PullRequestRow, RefineSummary, SCHEMA};

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::report;
use types::{RawItem, RawSearchResponse};

#[derive(Debug, Error)]
pub enum RefineError {
    #[error("Invalid input pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Failed to list input files: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("No raw files match {0}")]
    NoInput(String),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A date string that is not RFC 3339. Deliberately stricter than a
    /// lenient `to_timestamp` cast, which yields null: an unparseable
    /// `closed_at` must not turn into an open PR.
    #[error("Invalid timestamp in {field}: {value:?}")]
    Timestamp { field: &'static str, value: String },

    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to print diagnostics: {0}")]
    Report(#[from] std::io::Error),
}

/// Flatten every raw file matching `pattern` into one CSV at `output`.
///
/// Files are read in sorted path order and rows keep their first-seen
/// position after deduplication, so an unchanged input set always produces
/// the same bytes. Any previous `output` is overwritten.
#[instrument(skip(output), fields(output = %output.display()))]
pub fn refine_raw_data(pattern: &str, output: &Path) -> Result<RefineSummary, RefineError> {
    let mut paths = glob::glob(pattern)?.collect::<Result<Vec<_>, _>>()?;
    paths.retain(|path| path.is_file());
    if paths.is_empty() {
        return Err(RefineError::NoInput(pattern.to_string()));
    }
    paths.sort();
    info!(files = paths.len(), "refining raw files");

    let mut projected = Vec::new();
    for path in &paths {
        let items = read_items(path)?;
        debug!(path = %path.display(), items = items.len(), "expanded items");
        for item in items {
            projected.push(project(item)?);
        }
    }
    let rows_read = projected.len();

    let rows: Vec<PullRequestRow> = dedup(projected)
        .into_iter()
        .map(PullRequestRow::from_projected)
        .collect();
    debug!(rows_read, rows = rows.len(), "deduplicated rows");

    report::print_schema(SCHEMA)?;
    write_csv(&rows, output)?;

    let summary = RefineSummary {
        files_read: paths.len(),
        rows_read,
        rows_written: rows.len(),
        output: output.to_path_buf(),
    };
    report::print_summary(&summary)?;
    Ok(summary)
}

fn read_items(path: &Path) -> Result<Vec<RawItem>, RefineError> {
    let contents = std::fs::read_to_string(path).map_err(|source| RefineError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let response: RawSearchResponse =
        serde_json::from_str(&contents).map_err(|source| RefineError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(response.items)
}

/// Select the output columns from one search hit.
pub fn project(item: RawItem) -> Result<ProjectedRow, RefineError> {
    let (user_id, user_login) = match item.user {
        Some(user) => (user.id, user.login),
        None => (None, None),
    };

    Ok(ProjectedRow {
        url: item.url,
        repository_url: item.repository_url,
        id: item.id,
        number: item.number,
        title: item.title,
        user_id,
        user_login,
        labels: to_json(item.labels),
        state: item.state,
        locked: item.locked,
        assignee: to_json(item.assignee),
        assignees: to_json(item.assignees),
        created_at: parse_timestamp("created_at", item.created_at)?,
        updated_at: parse_timestamp("updated_at", item.updated_at)?,
        closed_at: parse_timestamp("closed_at", item.closed_at)?,
    })
}

fn to_json(value: Option<serde_json::Value>) -> Option<String> {
    value.map(|v| v.to_string())
}

fn parse_timestamp(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RefineError> {
    value
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|_| RefineError::Timestamp { field, value: raw })
        })
        .transpose()
}

/// Drop rows equal to an earlier row in every column, keeping input order.
pub fn dedup(rows: Vec<ProjectedRow>) -> Vec<ProjectedRow> {
    let mut seen = HashSet::with_capacity(rows.len());
    rows.into_iter()
        .filter(|row| seen.insert(row.clone()))
        .collect()
}

fn write_csv(rows: &[PullRequestRow], output: &Path) -> Result<(), RefineError> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| RefineError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    // The header is written explicitly so an empty result still has one.
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(output)?;
    writer.write_record(SCHEMA.iter().map(|(name, _)| *name))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|source| RefineError::Write {
        path: output.to_path_buf(),
        source,
    })?;
    debug!(rows = rows.len(), "wrote CSV");
    Ok(())
}
