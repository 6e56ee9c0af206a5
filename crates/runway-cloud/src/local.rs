use std::path::Path;
use std::process::Stdio;

/// Builds an image from a gzip-compressed build-context archive.
///
/// Production code uses [`DockerBuilder`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait ImageBuilder: Send + Sync {
    /// Build `archive` using the Dockerfile at `dockerfile` (context-relative)
    /// and tag the result as `tag`.
    async fn build(&self, archive: &Path, dockerfile: &str, tag: &str)
    -> Result<(), LocalBuildError>;
}

/// Runs `docker build` with the archive piped to stdin.
#[derive(Debug, Clone)]
pub struct DockerBuilder {
    bin: String,
}

impl DockerBuilder {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    fn args(dockerfile: &str, tag: &str) -> Vec<String> {
        ["build", "--tag", tag, "--file", dockerfile, "-"]
            .into_iter()
            .map(str::to_owned)
            .collect()
    }
}

impl Default for DockerBuilder {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl ImageBuilder for DockerBuilder {
    async fn build(
        &self,
        archive: &Path,
        dockerfile: &str,
        tag: &str,
    ) -> Result<(), LocalBuildError> {
        use tokio::io::AsyncWriteExt;

        let args = Self::args(dockerfile, tag);
        tracing::info!(bin = %self.bin, %tag, "building image locally");

        let mut input = tokio::fs::File::open(archive)
            .await
            .map_err(|e| LocalBuildError::Archive {
                path: archive.to_path_buf(),
                source: e,
            })?;

        let mut child = tokio::process::Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LocalBuildError::Spawn {
                bin: self.bin.clone(),
                source: e,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            tokio::io::copy(&mut input, &mut stdin)
                .await
                .map_err(|e| LocalBuildError::StdinWrite { source: e })?;
            stdin
                .shutdown()
                .await
                .map_err(|e| LocalBuildError::StdinWrite { source: e })?;
        }

        let status = child.wait().await.map_err(|e| LocalBuildError::Spawn {
            bin: self.bin.clone(),
            source: e,
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(LocalBuildError::CommandFailed {
                args,
                status: status.to_string(),
            })
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LocalBuildError {
    #[error("failed to run {bin}; is it installed and on PATH?")]
    Spawn {
        bin: String,
        source: std::io::Error,
    },

    #[error("failed to open build archive {path}")]
    Archive {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write the build context to stdin")]
    StdinWrite { source: std::io::Error },

    #[error("image build {args:?} failed: {status}")]
    CommandFailed { args: Vec<String>, status: String },
}
