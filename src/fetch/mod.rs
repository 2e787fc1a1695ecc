pub mod types;

pub use types::{RepoId, SearchQuery};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::GitHubConfig;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GitHub API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid repository identifier (expected owner/repo): {0}")]
    InvalidRepo(String),

    #[error("Failed to write raw response to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid lookback window: {0} days")]
    InvalidWindow(i64),
}

/// Issue/pull-request search, returning the response body untouched.
#[async_trait]
pub trait SearchApi: Send + Sync {
    async fn search_issues(&self, query: &SearchQuery) -> Result<serde_json::Value, FetchError>;
}

/// `SearchApi` backed by the GitHub REST search endpoint.
///
/// Holds a single `reqwest::Client` so every fetch in a run shares one
/// connection pool.
pub struct GitHubSearch {
    client: reqwest::Client,
    endpoint: String,
    api_version: String,
    user_agent: String,
}

impl GitHubSearch {
    pub fn new(config: &GitHubConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: &GitHubConfig) -> Self {
        Self {
            client,
            endpoint: format!("{}/search/issues", config.api_url.trim_end_matches('/')),
            api_version: config.api_version.clone(),
            user_agent: config.user_agent.clone(),
        }
    }
}

#[async_trait]
impl SearchApi for GitHubSearch {
    async fn search_issues(&self, query: &SearchQuery) -> Result<serde_json::Value, FetchError> {
        // Only the first page is requested; the API's default page size applies.
        let body = self
            .client
            .get(&self.endpoint)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", &self.api_version)
            .header("User-Agent", &self.user_agent)
            .query(&[("q", query.to_string())])
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;
        Ok(body)
    }
}

/// Name of the raw file for `repo` fetched at `fetched_at`:
/// `<owner>_<repo>_<timestamp>.json` with `:` and spaces in the timestamp
/// replaced by `_`.
pub fn raw_file_name(repo: &RepoId, fetched_at: DateTime<Utc>) -> String {
    let timestamp = fetched_at
        .format("%Y-%m-%d %H:%M:%S%.6f%:z")
        .to_string()
        .replace([':', ' '], "_");
    format!("{}_{}.json", repo.file_stem(), timestamp)
}

/// Fetch the pull requests created in the trailing `lookback_days` window for
/// one repository and persist the raw response under `raw_dir`.
///
/// Returns the path of the written file. Every call writes a new file; nothing
/// already in `raw_dir` is touched.
#[instrument(skip(api, repo, raw_dir, now), fields(repo = %repo))]
pub async fn load_raw_data(
    api: &dyn SearchApi,
    repo: &RepoId,
    lookback_days: i64,
    raw_dir: &Path,
    now: DateTime<Utc>,
) -> Result<PathBuf, FetchError> {
    let query = SearchQuery::trailing(repo.clone(), now, lookback_days)?;
    info!(query = %query, "loading search results");

    let body = api.search_issues(&query).await?;
    let item_count = body
        .get("items")
        .and_then(|items| items.as_array())
        .map_or(0, Vec::len);
    debug!(items = item_count, "received search response");

    let path = raw_dir.join(raw_file_name(repo, now));
    std::fs::create_dir_all(raw_dir)
        .and_then(|()| std::fs::write(&path, body.to_string()))
        .map_err(|source| FetchError::Write {
            path: path.clone(),
            source,
        })?;
    debug!(path = %path.display(), "wrote raw response");

    Ok(path)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Records every query it receives and answers with a canned body.
    pub struct RecordingSearch {
        pub queries: Mutex<Vec<String>>,
        pub response: serde_json::Value,
    }

    impl RecordingSearch {
        pub fn new(response: serde_json::Value) -> Self {
            Self {
                queries: Mutex::new(Vec::new()),
                response,
            }
        }

        pub fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchApi for RecordingSearch {
        async fn search_issues(
            &self,
            query: &SearchQuery,
        ) -> Result<serde_json::Value, FetchError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.response.clone())
        }
    }

    /// Fails every query before anything is written.
    pub struct FailingSearch;

    #[async_trait]
    impl SearchApi for FailingSearch {
        async fn search_issues(
            &self,
            query: &SearchQuery,
        ) -> Result<serde_json::Value, FetchError> {
            Err(FetchError::InvalidRepo(query.repo.to_string()))
        }
    }

    fn fetched_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 3, 10, 15, 30).unwrap()
            + chrono::Duration::microseconds(123_456)
    }

    #[test]
    fn test_raw_file_name() {
        let repo: RepoId = "octocat/Hello-World".parse().unwrap();
        assert_eq!(
            raw_file_name(&repo, fetched_at()),
            "octocat_Hello-World_2025-11-03_10_15_30.123456+00_00.json"
        );
    }

    #[test]
    fn test_endpoint_from_config() {
        let config = GitHubConfig {
            api_url: "http://localhost:8080/".to_string(),
            ..GitHubConfig::default()
        };
        let search = GitHubSearch::new(&config);
        assert_eq!(search.endpoint, "http://localhost:8080/search/issues");
        assert_eq!(search.api_version, "2022-11-28");
    }

    #[tokio::test]
    async fn test_load_raw_data_writes_body() {
        let dir = tempfile::tempdir().unwrap();
        let raw_dir = dir.path().join("src");
        let body = serde_json::json!({ "total_count": 1, "items": [{ "id": 7 }] });
        let api = RecordingSearch::new(body.clone());
        let repo: RepoId = "octocat/Spoon-Knife".parse().unwrap();

        let path = load_raw_data(&api, &repo, 30, &raw_dir, fetched_at())
            .await
            .unwrap();

        assert_eq!(path.parent(), Some(raw_dir.as_path()));
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, body);
        assert_eq!(
            api.queries(),
            vec!["repo:octocat/Spoon-Knife is:pr created:>=2025-10-04"]
        );
    }

    #[tokio::test]
    async fn test_load_raw_data_keeps_earlier_files() {
        let dir = tempfile::tempdir().unwrap();
        let api = RecordingSearch::new(serde_json::json!({ "items": [] }));
        let repo: RepoId = "octocat/Spoon-Knife".parse().unwrap();

        let first = load_raw_data(&api, &repo, 30, dir.path(), fetched_at())
            .await
            .unwrap();
        let later = fetched_at() + chrono::Duration::hours(1);
        let second = load_raw_data(&api, &repo, 30, dir.path(), later)
            .await
            .unwrap();

        assert_ne!(first, second);
        assert!(first.exists());
        assert!(second.exists());
    }

    #[tokio::test]
    async fn test_load_raw_data_propagates_api_error() {
        let dir = tempfile::tempdir().unwrap();
        let repo: RepoId = "octocat/Spoon-Knife".parse().unwrap();

        let result = load_raw_data(&FailingSearch, &repo, 30, dir.path(), fetched_at()).await;

        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    /// Accept one connection on a local port, answer it with `status` and
    /// `body`, and hand back the raw request head.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8(head).unwrap()
        });

        (base_url, handle)
    }

    fn local_search(base_url: String) -> GitHubSearch {
        let config = GitHubConfig {
            api_url: base_url,
            ..GitHubConfig::default()
        };
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        GitHubSearch::with_client(client, &config)
    }

    #[tokio::test]
    async fn test_github_search_request_contract() {
        let (base_url, server) = serve_once("200 OK", r#"{"total_count":0,"items":[]}"#).await;
        let dir = tempfile::tempdir().unwrap();
        let repo: RepoId = "octocat/Spoon-Knife".parse().unwrap();

        let path = load_raw_data(&local_search(base_url), &repo, 30, dir.path(), fetched_at())
            .await
            .unwrap();
        let request = server.await.unwrap();

        let request_line = request.lines().next().unwrap();
        let mut parts = request_line.split_whitespace();
        assert_eq!(parts.next(), Some("GET"));
        let target = reqwest::Url::parse(&format!("http://localhost{}", parts.next().unwrap()))
            .unwrap();
        assert_eq!(target.path(), "/search/issues");
        let q: Vec<String> = target
            .query_pairs()
            .filter(|(key, _)| key == "q")
            .map(|(_, value)| value.into_owned())
            .collect();
        assert_eq!(q, vec!["repo:octocat/Spoon-Knife is:pr created:>=2025-10-04"]);

        let head = request.to_lowercase();
        assert!(head.contains("\r\naccept: application/vnd.github+json\r\n"));
        assert!(head.contains("\r\nx-github-api-version: 2022-11-28\r\n"));
        assert!(head.contains("\r\nuser-agent: pr-pipeline\r\n"));

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, serde_json::json!({ "total_count": 0, "items": [] }));
    }

    #[tokio::test]
    async fn test_github_search_error_status_writes_nothing() {
        let (base_url, server) =
            serve_once("403 Forbidden", r#"{"message":"API rate limit exceeded"}"#).await;
        let dir = tempfile::tempdir().unwrap();
        let raw_dir = dir.path().join("src");
        let repo: RepoId = "octocat/Hello-World".parse().unwrap();

        let result =
            load_raw_data(&local_search(base_url), &repo, 30, &raw_dir, fetched_at()).await;
        server.await.unwrap();

        match result {
            Err(FetchError::Request(err)) => {
                assert_eq!(err.status(), Some(reqwest::StatusCode::FORBIDDEN));
            }
            other => panic!("expected request error, got {:?}", other),
        }
        assert!(!raw_dir.exists());
    }
}
