use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// A source upload slot returned by the build service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub id: String,
    /// Pre-signed URL the archive is PUT to.
    pub write_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBuildRequest {
    pub task_slug: String,
    #[serde(rename = "sourceUploadID")]
    pub source_upload_id: String,
}

/// A build accepted by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedBuild {
    pub id: String,
    /// Image the service will push to, when it reports one.
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl BuildStatus {
    /// Whether the build has reached a terminal state.
    pub fn is_stopped(self) -> bool {
        matches!(
            self,
            BuildStatus::Succeeded | BuildStatus::Failed | BuildStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Build {
    pub id: String,
    pub status: BuildStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

/// Remote build service operations.
///
/// Production code uses [`HttpBuildService`](crate::HttpBuildService); tests
/// use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait BuildService: Send + Sync {
    /// Reserve an upload slot for an archive of `size_bytes`.
    async fn create_upload(&self, size_bytes: u64) -> Result<Upload, ApiError>;

    /// Stream the archive at `archive` to a pre-signed write URL.
    async fn put_archive(&self, write_url: &str, archive: &Path) -> Result<(), ApiError>;

    async fn create_build(&self, request: &CreateBuildRequest) -> Result<CreatedBuild, ApiError>;

    async fn get_build(&self, id: &str) -> Result<Build, ApiError>;

    /// Logs emitted at or after `since`, oldest first.
    async fn get_build_logs(
        &self,
        id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<LogEntry>, ApiError>;
}
