use std::path::Path;

use runway_build::{BuildContext, IgnoreRules, Synthesize, archive_to_file};
use tokio_util::sync::CancellationToken;

use super::load_task;

/// Write the filtered build context for a task to `output`.
pub async fn archive(file: &Path, output: &Path) -> anyhow::Result<()> {
    let task = load_task(file)?;

    let recipe = task.request.kind.synthesize(&task.root, &task.request.options)?;
    let context = BuildContext::from_recipe(&recipe);
    let rules = IgnoreRules::resolve(&task.root, None, task.request.kind)?;

    let summary = archive_to_file(
        task.root.clone(),
        rules,
        context.files().clone(),
        output.to_path_buf(),
        CancellationToken::new(),
    )
    .await?;

    println!(
        "Wrote {} ({} files, {} directories)",
        output.display(),
        summary.files,
        summary.dirs
    );
    Ok(())
}
