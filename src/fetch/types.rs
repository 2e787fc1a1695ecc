use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;

use super::FetchError;

/// A repository identifier in `owner/repo` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    pub owner: String,
    pub repo: String,
}

impl RepoId {
    /// Filename-safe form of the identifier: `owner_repo`.
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.owner, self.repo)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for RepoId {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => {
                Ok(RepoId {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                })
            }
            _ => Err(FetchError::InvalidRepo(s.to_string())),
        }
    }
}

/// Search predicate selecting the pull requests of one repository created
/// on or after `since`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub repo: RepoId,
    pub since: NaiveDate,
}

impl SearchQuery {
    /// Query for the `days`-day window ending at `now`. The lower bound is a
    /// calendar date in UTC; the time of day is dropped.
    ///
    /// Negative windows, and windows reaching past the representable date
    /// range, are `FetchError::InvalidWindow`.
    pub fn trailing(repo: RepoId, now: DateTime<Utc>, days: i64) -> Result<Self, FetchError> {
        let since = (days >= 0)
            .then(|| Duration::try_days(days))
            .flatten()
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or(FetchError::InvalidWindow(days))?
            .date_naive();
        Ok(SearchQuery { repo, since })
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "repo:{} is:pr created:>={}",
            self.repo,
            self.since.format("%Y-%m-%d")
        )
    }
}
