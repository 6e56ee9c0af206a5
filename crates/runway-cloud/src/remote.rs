//! Remote build execution.
//!
//! ```text
//! Uploading ─▶ BuildRequested ─▶ Polling ─┬─▶ Succeeded
//!                                         ├─▶ Failed
//!                                         └─▶ Cancelled
//! ```
//!
//! Exactly one build is created per [`RemoteExecutor::run`]. Polling waits on
//! a single `select!` over the interval tick and the cancellation token.

use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use runway_build::{ArchiveError, BuildContext, IgnoreRules, archive_to_file};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;
use crate::service::{BuildService, BuildStatus, CreateBuildRequest, LogEntry};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

const ARCHIVE_NAME: &str = "archive.tar.gz";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Uploading,
    BuildRequested,
    Polling,
    Succeeded,
    Failed,
    Cancelled,
}

impl BuildPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BuildPhase::Succeeded | BuildPhase::Failed | BuildPhase::Cancelled
        )
    }
}

/// A remote build, as last observed by polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildJob {
    pub build_id: String,
    pub upload_id: String,
    pub image: Option<String>,
    pub status: BuildStatus,
    /// Timestamp of the newest log entry seen so far.
    pub log_cursor: Option<DateTime<Utc>>,
}

impl BuildJob {
    pub fn phase(&self) -> BuildPhase {
        match self.status {
            BuildStatus::Pending | BuildStatus::Running => BuildPhase::Polling,
            BuildStatus::Succeeded => BuildPhase::Succeeded,
            BuildStatus::Failed => BuildPhase::Failed,
            BuildStatus::Cancelled => BuildPhase::Cancelled,
        }
    }
}

/// Remembers delivered log entries so each is emitted once.
#[derive(Debug, Default)]
pub struct LogDeduper {
    seen: HashSet<LogEntry>,
}

impl LogDeduper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries from `fetched` not delivered before, in fetch order.
    pub fn filter(&mut self, fetched: Vec<LogEntry>) -> Vec<LogEntry> {
        fetched
            .into_iter()
            .filter(|entry| self.seen.insert(entry.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Entries of `fetched` that are not in `seen` (nor repeated within `fetched`).
pub fn dedupe_logs(seen: &[LogEntry], fetched: &[LogEntry]) -> Vec<LogEntry> {
    let mut known: HashSet<&LogEntry> = seen.iter().collect();
    fetched
        .iter()
        .filter(|entry| known.insert(*entry))
        .cloned()
        .collect()
}

/// What to build: the task root, its generated files and its ignore rules.
#[derive(Debug, Clone, Copy)]
pub struct BuildSource<'a> {
    pub slug: &'a str,
    pub root: &'a Path,
    pub context: &'a BuildContext,
    pub rules: &'a IgnoreRules,
}

/// Drives a single remote build from upload to a terminal state.
pub struct RemoteExecutor<'a, S: BuildService> {
    service: &'a S,
    poll_interval: Duration,
}

impl<'a, S: BuildService> RemoteExecutor<'a, S> {
    pub fn new(service: &'a S) -> Self {
        Self {
            service,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// A zero interval falls back to [`DEFAULT_POLL_INTERVAL`].
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.poll_interval = interval;
        }
        self
    }

    /// Upload, request and wait for a build. `on_log` receives each build log
    /// entry exactly once.
    ///
    /// Returns the job in its terminal state; a remote `cancelled` status is
    /// a normal return, while [`RemoteError::Cancelled`] means `cancel` fired.
    pub async fn run<F>(
        &self,
        source: BuildSource<'_>,
        cancel: &CancellationToken,
        mut on_log: F,
    ) -> Result<BuildJob, RemoteError>
    where
        F: FnMut(&LogEntry),
    {
        // ── Uploading ──
        transition(BuildPhase::Uploading, source.slug);
        let upload_id = self.upload(source, cancel).await?;

        // ── BuildRequested ──
        transition(BuildPhase::BuildRequested, source.slug);
        let request = CreateBuildRequest {
            task_slug: source.slug.to_owned(),
            source_upload_id: upload_id.clone(),
        };
        let created = cancellable(cancel, || self.service.create_build(&request))
            .await?
            .map_err(|e| RemoteError::BuildRequest { source: e })?;
        tracing::info!(build_id = %created.id, "build requested");

        let mut job = BuildJob {
            build_id: created.id,
            upload_id,
            image: created.image,
            status: BuildStatus::Pending,
            log_cursor: None,
        };

        // ── Polling ──
        transition(BuildPhase::Polling, source.slug);
        self.poll(&mut job, cancel, &mut on_log).await?;
        tracing::info!(build_id = %job.build_id, phase = ?job.phase(), "build finished");
        Ok(job)
    }

    async fn upload(
        &self,
        source: BuildSource<'_>,
        cancel: &CancellationToken,
    ) -> Result<String, RemoteError> {
        let tmp = tempfile::Builder::new()
            .prefix("runway-build-")
            .tempdir()
            .map_err(|e| RemoteError::TempDir { source: e })?;
        let archive = tmp.path().join(ARCHIVE_NAME);

        archive_to_file(
            source.root.to_path_buf(),
            source.rules.clone(),
            source.context.files().clone(),
            archive.clone(),
            cancel.clone(),
        )
        .await
        .map_err(|e| match e {
            ArchiveError::Cancelled => RemoteError::Cancelled,
            other => RemoteError::Archive(other),
        })?;

        let size = tokio::fs::metadata(&archive)
            .await
            .map_err(|e| RemoteError::Upload {
                source: ApiError::Archive {
                    path: archive.clone(),
                    source: e,
                },
            })?
            .len();
        tracing::info!(size_bytes = size, "uploading build archive");

        let upload = cancellable(cancel, || self.service.create_upload(size))
            .await?
            .map_err(|e| RemoteError::Upload { source: e })?;
        tracing::debug!(upload_id = %upload.id, "upload created");

        cancellable(cancel, || self.service.put_archive(&upload.write_url, &archive))
            .await?
            .map_err(|e| RemoteError::Upload { source: e })?;

        // `tmp` is dropped here, removing the archive.
        Ok(upload.id)
    }

    async fn poll<F>(
        &self,
        job: &mut BuildJob,
        cancel: &CancellationToken,
        on_log: &mut F,
    ) -> Result<(), RemoteError>
    where
        F: FnMut(&LogEntry),
    {
        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut deduper = LogDeduper::new();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RemoteError::Cancelled),
                _ = ticker.tick() => {}
            }

            let since = job.log_cursor;
            let logs =
                cancellable(cancel, || self.service.get_build_logs(&job.build_id, since)).await?;
            match logs {
                Ok(logs) => {
                    if let Some(last) = logs.last() {
                        job.log_cursor = Some(last.timestamp);
                    }
                    for entry in deduper.filter(logs) {
                        on_log(&entry);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        build_id = %job.build_id,
                        error = %e,
                        "failed to fetch build logs; retrying"
                    );
                }
            }

            let build = cancellable(cancel, || self.service.get_build(&job.build_id)).await?;
            match build {
                Ok(build) => {
                    if build.status != job.status {
                        tracing::debug!(
                            build_id = %job.build_id,
                            status = ?build.status,
                            "build status changed"
                        );
                    }
                    job.status = build.status;
                    if build.status.is_stopped() {
                        return Ok(());
                    }
                }
                Err(e) if e.is_not_found() => {
                    return Err(RemoteError::BuildNotFound {
                        build_id: job.build_id.clone(),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        build_id = %job.build_id,
                        error = %e,
                        "failed to fetch build status; retrying"
                    );
                }
            }
        }
    }
}

fn transition(phase: BuildPhase, slug: &str) {
    tracing::debug!(task = slug, ?phase, "remote build phase");
}

/// Race a service call against cancellation. The call is not started at all
/// when the token has already fired.
async fn cancellable<F, Fut, T>(cancel: &CancellationToken, call: F) -> Result<T, RemoteError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    if cancel.is_cancelled() {
        return Err(RemoteError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RemoteError::Cancelled),
        out = call() => Ok(out),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("failed to create a temporary directory for the build archive")]
    TempDir { source: std::io::Error },

    #[error("failed to archive the build context")]
    Archive(#[source] ArchiveError),

    #[error("failed to upload the build archive")]
    Upload { source: ApiError },

    #[error("failed to request a build")]
    BuildRequest { source: ApiError },

    #[error("build {build_id} no longer exists")]
    BuildNotFound { build_id: String },

    #[error("build was cancelled")]
    Cancelled,
}
