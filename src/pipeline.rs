use chrono::{DateTime, Utc};
use clap::ValueEnum;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, info_span};

use crate::config::Config;
use crate::fetch::{self, FetchError, RepoId, SearchApi};
use crate::refine::{self, RefineError, RefineSummary};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Refine(#[from] RefineError),
}

/// Which layers a run executes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Stage {
    /// Fetch every repository, then refine
    #[default]
    All,
    /// Raw layer only
    Fetch,
    /// Refined layer only, over whatever raw files already exist
    Refine,
}

impl Stage {
    fn fetches(self) -> bool {
        matches!(self, Stage::All | Stage::Fetch)
    }

    fn refines(self) -> bool {
        matches!(self, Stage::All | Stage::Refine)
    }
}

/// What a pipeline run produced.
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    /// Raw files written this run, in fetch order
    pub raw_files: Vec<PathBuf>,
    /// Present when the refine stage ran
    pub summary: Option<RefineSummary>,
}

/// Run the pipeline: fetch each configured repository in order, then refine
/// the whole raw directory once.
///
/// Repositories are fetched one at a time. The first failure stops the run;
/// raw files already written stay on disk. The refine step reads every raw
/// file in the directory, including those from earlier runs.
pub async fn run(
    config: &Config,
    api: &dyn SearchApi,
    stage: Stage,
    now: DateTime<Utc>,
) -> Result<PipelineOutcome, PipelineError> {
    let mut outcome = PipelineOutcome::default();

    if stage.fetches() {
        let repos = config
            .github
            .repos
            .iter()
            .map(|r| r.parse::<RepoId>())
            .collect::<Result<Vec<_>, _>>()?;

        for repo in &repos {
            let path = fetch::load_raw_data(
                api,
                repo,
                config.github.lookback_days,
                &config.storage.raw_dir,
                now,
            )
            .await?;
            outcome.raw_files.push(path);
        }
        info!(files = outcome.raw_files.len(), "raw layer loaded");
    }

    if stage.refines() {
        let pattern = config.raw_glob();
        let _span = info_span!("refine", pattern = %pattern).entered();
        let summary = refine::refine_raw_data(&pattern, &config.storage.refined_path)?;
        debug!(
            files = summary.files_read,
            rows_read = summary.rows_read,
            rows = summary.rows_written,
            "refined layer written"
        );
        outcome.summary = Some(summary);
    }

    Ok(outcome)
}
