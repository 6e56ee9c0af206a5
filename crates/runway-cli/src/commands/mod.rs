mod archive;
mod build;
mod frameworks;
mod recipe;

use std::path::{Path, PathBuf};

use runway_core::{BuildRequest, TaskDefinition};

/// Task definition looked up when `--file` is not given.
pub(crate) const DEFAULT_DEFINITION: &str = "runway.task.yaml";

pub use archive::archive;
pub use build::build;
pub use frameworks::{frameworks_commands, frameworks_list};
pub use recipe::recipe;

/// A loaded task definition with its resolved build root.
pub(crate) struct LoadedTask {
    pub root: PathBuf,
    pub request: BuildRequest,
}

pub(crate) fn load_task(file: &Path) -> anyhow::Result<LoadedTask> {
    if !file.is_file() {
        anyhow::bail!(
            "task definition {} not found.\n\
             Pass the definition with `runway <command> --file <path>`.",
            file.display()
        );
    }
    let definition = TaskDefinition::load(file)?;
    let root = definition.root_dir(file);
    if !root.is_dir() {
        anyhow::bail!("task root {} is not a directory", root.display());
    }
    let request = definition.build_request()?;
    tracing::debug!(
        task = %request.slug,
        kind = %request.kind,
        root = %root.display(),
        "loaded task"
    );
    Ok(LoadedTask { root, request })
}
