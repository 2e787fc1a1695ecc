use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::path::PathBuf;

/// A raw search response as written by the fetcher. Only `items` is read;
/// a file without it fails to deserialize.
#[derive(Debug, Deserialize)]
pub struct RawSearchResponse {
    pub items: Vec<RawItem>,
}

/// One search hit. Every projected field may be absent or null.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawItem {
    pub url: Option<String>,
    pub repository_url: Option<String>,
    pub id: Option<i64>,
    pub number: Option<i64>,
    pub title: Option<String>,
    pub user: Option<RawUser>,
    pub labels: Option<serde_json::Value>,
    pub state: Option<String>,
    pub locked: Option<bool>,
    pub assignee: Option<serde_json::Value>,
    pub assignees: Option<serde_json::Value>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub closed_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawUser {
    pub id: Option<i64>,
    pub login: Option<String>,
}

/// The projected columns of one pull request, before `days_open` is derived.
/// Equality covers every column, which is what deduplication compares.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectedRow {
    pub url: Option<String>,
    pub repository_url: Option<String>,
    pub id: Option<i64>,
    pub number: Option<i64>,
    pub title: Option<String>,
    pub user_id: Option<i64>,
    pub user_login: Option<String>,
    /// JSON text of the labels array
    pub labels: Option<String>,
    pub state: Option<String>,
    pub locked: Option<bool>,
    /// JSON text of the assignee object
    pub assignee: Option<String>,
    /// JSON text of the assignees array
    pub assignees: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// A refined row as written to the CSV output. Field order is column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullRequestRow {
    pub url: Option<String>,
    pub repository_url: Option<String>,
    pub id: Option<i64>,
    pub number: Option<i64>,
    pub title: Option<String>,
    pub user_id: Option<i64>,
    pub user_login: Option<String>,
    pub labels: Option<String>,
    pub state: Option<String>,
    pub locked: Option<bool>,
    pub assignee: Option<String>,
    pub assignees: Option<String>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub closed_at: Option<DateTime<Utc>>,
    /// Days between creation and closure; null while the PR is open.
    pub days_open: Option<f64>,
}

impl PullRequestRow {
    pub fn from_projected(row: ProjectedRow) -> Self {
        let days_open = days_between(row.created_at, row.closed_at);
        PullRequestRow {
            url: row.url,
            repository_url: row.repository_url,
            id: row.id,
            number: row.number,
            title: row.title,
            user_id: row.user_id,
            user_login: row.user_login,
            labels: row.labels,
            state: row.state,
            locked: row.locked,
            assignee: row.assignee,
            assignees: row.assignees,
            created_at: row.created_at,
            updated_at: row.updated_at,
            closed_at: row.closed_at,
            days_open,
        }
    }
}

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Whole-second unix time difference expressed in days.
pub fn days_between(
    created_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
) -> Option<f64> {
    let (created_at, closed_at) = (created_at?, closed_at?);
    Some((closed_at.timestamp() - created_at.timestamp()) as f64 / SECONDS_PER_DAY)
}

fn serialize_timestamp<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(ts) => serializer.serialize_str(&ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
        None => serializer.serialize_none(),
    }
}

/// Logical column type, as reported by the schema print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Long,
    Boolean,
    Timestamp,
    Double,
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::String => write!(f, "string"),
            ColumnType::Long => write!(f, "long"),
            ColumnType::Boolean => write!(f, "boolean"),
            ColumnType::Timestamp => write!(f, "timestamp"),
            ColumnType::Double => write!(f, "double"),
        }
    }
}

/// Output columns in order. Every column is nullable.
pub const SCHEMA: &[(&str, ColumnType)] = &[
    ("url", ColumnType::String),
    ("repository_url", ColumnType::String),
    ("id", ColumnType::Long),
    ("number", ColumnType::Long),
    ("title", ColumnType::String),
    ("user_id", ColumnType::Long),
    ("user_login", ColumnType::String),
    ("labels", ColumnType::String),
    ("state", ColumnType::String),
    ("locked", ColumnType::Boolean),
    ("assignee", ColumnType::String),
    ("assignees", ColumnType::String),
    ("created_at", ColumnType::Timestamp),
    ("updated_at", ColumnType::Timestamp),
    ("closed_at", ColumnType::Timestamp),
    ("days_open", ColumnType::Double),
];

/// What a refine run read and wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct RefineSummary {
    pub files_read: usize,
    /// Rows expanded from `items`, before deduplication
    pub rows_read: usize,
    pub rows_written: usize,
    pub output: PathBuf,
}
