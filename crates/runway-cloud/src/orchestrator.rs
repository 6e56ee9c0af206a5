use std::path::Path;

use runway_build::{
    ArchiveError, BuildContext, DOCKERFILE_PATH, IgnoreError, IgnoreRules, SynthError, Synthesize,
    archive_to_file,
};
use runway_core::{BuildConfig, BuildRequest, FrameworkRegistry};
use tokio_util::sync::CancellationToken;

use crate::local::{ImageBuilder, LocalBuildError};
use crate::remote::{BuildSource, RemoteError, RemoteExecutor};
use crate::service::{BuildService, BuildStatus, LogEntry};

/// Where the image gets built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPreference {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    /// Image reference. `None` when a remote service did not report one.
    pub image: Option<String>,
    /// Remote build id; local builds have none.
    pub build_id: Option<String>,
}

/// Turns a build request into an image, locally or through the build service.
pub struct BuildOrchestrator<'a, S: BuildService, B: ImageBuilder> {
    service: S,
    builder: B,
    frameworks: &'a FrameworkRegistry,
    config: BuildConfig,
}

impl<'a, S: BuildService, B: ImageBuilder> BuildOrchestrator<'a, S, B> {
    pub fn new(
        service: S,
        builder: B,
        frameworks: &'a FrameworkRegistry,
        config: BuildConfig,
    ) -> Self {
        Self {
            service,
            builder,
            frameworks,
            config,
        }
    }

    /// Tag used for local builds.
    pub fn local_tag(&self, slug: &str) -> String {
        format!("{}/{slug}:latest", self.config.image_repo)
    }

    pub async fn run<F>(
        &self,
        root: &Path,
        request: &BuildRequest,
        preference: BuildPreference,
        cancel: &CancellationToken,
        on_log: F,
    ) -> Result<BuildOutput, OrchestratorError>
    where
        F: FnMut(&LogEntry),
    {
        if !request.kind.needs_building() {
            return Err(OrchestratorError::NoBuildNeeded {
                image: request.image.clone(),
                command: request.command.clone(),
            });
        }

        if let Some(name) = request.options.get("framework") {
            let framework = self
                .frameworks
                .open(name, root)
                .map_err(OrchestratorError::Framework)?;
            tracing::info!(framework = framework.name(), "detected framework");
        }

        let recipe = request.kind.synthesize(root, &request.options)?;
        let context = BuildContext::from_recipe(&recipe);
        let rules = IgnoreRules::resolve(root, None, request.kind)?;
        tracing::debug!(
            task = %request.slug,
            kind = %request.kind,
            ?preference,
            rules = rules.len(),
            "build prepared"
        );

        match preference {
            BuildPreference::Local => {
                self.build_local(root, request, &context, &rules, cancel)
                    .await
            }
            BuildPreference::Remote => {
                self.build_remote(root, request, &context, &rules, cancel, on_log)
                    .await
            }
        }
    }

    async fn build_local(
        &self,
        root: &Path,
        request: &BuildRequest,
        context: &BuildContext,
        rules: &IgnoreRules,
        cancel: &CancellationToken,
    ) -> Result<BuildOutput, OrchestratorError> {
        let tag = self.local_tag(&request.slug);
        let tmp = tempfile::Builder::new()
            .prefix("runway-build-")
            .tempdir()
            .map_err(|e| OrchestratorError::TempDir { source: e })?;
        let archive = tmp.path().join("context.tar.gz");

        archive_to_file(
            root.to_path_buf(),
            rules.clone(),
            context.files().clone(),
            archive.clone(),
            cancel.clone(),
        )
        .await
        .map_err(|e| match e {
            ArchiveError::Cancelled => OrchestratorError::Cancelled,
            other => OrchestratorError::Archive(other),
        })?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
            result = self.builder.build(&archive, DOCKERFILE_PATH, &tag) => result?,
        }

        tracing::info!(image = %tag, "local build finished");
        Ok(BuildOutput {
            image: Some(tag),
            build_id: None,
        })
    }

    async fn build_remote<F>(
        &self,
        root: &Path,
        request: &BuildRequest,
        context: &BuildContext,
        rules: &IgnoreRules,
        cancel: &CancellationToken,
        on_log: F,
    ) -> Result<BuildOutput, OrchestratorError>
    where
        F: FnMut(&LogEntry),
    {
        let source = BuildSource {
            slug: &request.slug,
            root,
            context,
            rules,
        };
        let job = RemoteExecutor::new(&self.service)
            .with_poll_interval(self.config.poll_interval())
            .run(source, cancel, on_log)
            .await
            .map_err(|e| match e {
                RemoteError::Cancelled => OrchestratorError::Cancelled,
                other => OrchestratorError::Remote(other),
            })?;

        match job.status {
            BuildStatus::Succeeded => Ok(BuildOutput {
                image: job.image,
                build_id: Some(job.build_id),
            }),
            BuildStatus::Cancelled => Err(OrchestratorError::BuildCancelled {
                build_id: job.build_id,
            }),
            BuildStatus::Failed | BuildStatus::Pending | BuildStatus::Running => {
                Err(OrchestratorError::BuildFailed {
                    build_id: job.build_id,
                })
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("task uses a pre-built image; nothing to build")]
    NoBuildNeeded {
        image: Option<String>,
        command: Vec<String>,
    },

    #[error("framework check failed")]
    Framework(#[source] runway_core::Error),

    #[error(transparent)]
    Synth(#[from] SynthError),

    #[error(transparent)]
    Ignore(#[from] IgnoreError),

    #[error(transparent)]
    Archive(ArchiveError),

    #[error("failed to create a temporary directory for the build archive")]
    TempDir { source: std::io::Error },

    #[error("local build failed")]
    Local(#[from] LocalBuildError),

    #[error("remote build failed")]
    Remote(#[source] RemoteError),

    #[error("build {build_id} failed")]
    BuildFailed { build_id: String },

    #[error("build {build_id} was cancelled by the build service")]
    BuildCancelled { build_id: String },

    #[error("build was cancelled")]
    Cancelled,
}
