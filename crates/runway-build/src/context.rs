use std::path::Path;

use runway_core::{BuildRecipe, InjectedFiles};

use crate::archive::{ArchiveError, ArchiveSummary, Archiver};
use crate::dockerfile::DockerfileRenderer;
use crate::ignore::IgnoreRules;
use crate::synth::GENERATED_DIR;

/// Where the rendered Dockerfile lives inside a build context.
pub const DOCKERFILE_PATH: &str = ".runway/Dockerfile";

/// Everything that goes into a build context besides the task's own files:
/// the recipe's injected files plus the rendered Dockerfile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    dockerfile: String,
    files: InjectedFiles,
}

impl BuildContext {
    pub fn from_recipe(recipe: &BuildRecipe) -> Self {
        let dockerfile = DockerfileRenderer::new(recipe).render();
        let mut files = recipe.injected_files.clone();
        files.insert(DOCKERFILE_PATH.to_owned(), dockerfile.clone().into_bytes());
        debug_assert!(files.keys().all(|k| k.starts_with(GENERATED_DIR)));
        Self { dockerfile, files }
    }

    pub fn dockerfile(&self) -> &str {
        &self.dockerfile
    }

    pub fn dockerfile_path(&self) -> &'static str {
        DOCKERFILE_PATH
    }

    /// Generated files keyed by context-relative path, Dockerfile included.
    pub fn files(&self) -> &InjectedFiles {
        &self.files
    }

    /// An archiver over `root` that also carries the generated files.
    pub fn archiver<'a>(&'a self, root: &'a Path, rules: &'a IgnoreRules) -> Archiver<'a> {
        Archiver::new(root, rules).with_files(&self.files)
    }

    /// Write the full context (task files plus generated files) to `out`.
    pub fn write_archive(
        &self,
        root: &Path,
        rules: &IgnoreRules,
        out: &Path,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> Result<ArchiveSummary, ArchiveError> {
        self.archiver(root, rules).write_to(out, cancel)
    }
}
