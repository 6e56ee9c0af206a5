//! Remote build service client and build orchestration for runway.
//!
//! # Build flow
//!
//! ```text
//! BuildOrchestrator::run
//!   1. Manual?     ── NoBuildNeeded
//!   2. Framework   ── FrameworkRegistry::open (when `framework` is set)
//!   3. Synthesize  ── recipe, Dockerfile, build context, ignore rules
//!   4a. Local      ── ImageBuilder::build (docker build -)
//!   4b. Remote     ── RemoteExecutor: upload → create build → poll
//! ```

pub mod api;
pub mod error;
pub mod local;
pub mod orchestrator;
pub mod remote;
pub mod service;

pub use api::HttpBuildService;
pub use error::ApiError;
pub use local::{DockerBuilder, ImageBuilder, LocalBuildError};
pub use orchestrator::{BuildOrchestrator, BuildOutput, BuildPreference, OrchestratorError};
pub use remote::{
    BuildJob, BuildPhase, BuildSource, DEFAULT_POLL_INTERVAL, LogDeduper, RemoteError,
    RemoteExecutor, dedupe_logs,
};
pub use service::{
    Build, BuildService, BuildStatus, CreateBuildRequest, CreatedBuild, LogEntry, Upload,
};
