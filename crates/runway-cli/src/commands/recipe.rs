use std::path::Path;

use runway_build::{BuildContext, SynthError, Synthesize};

use super::load_task;

/// Print the synthesized Dockerfile followed by the generated file list.
pub fn recipe(file: &Path) -> anyhow::Result<()> {
    let task = load_task(file)?;

    let recipe = match task.request.kind.synthesize(&task.root, &task.request.options) {
        Ok(recipe) => recipe,
        Err(SynthError::NoBuildNeeded { .. }) => {
            anyhow::bail!(
                "task {} uses a pre-built image; there is no recipe to show",
                task.request.slug
            );
        }
        Err(e) => return Err(e.into()),
    };
    let context = BuildContext::from_recipe(&recipe);

    print!("{}", context.dockerfile());
    println!();
    println!("Generated files:");
    for (path, contents) in context.files() {
        println!("  {path} ({} bytes)", contents.len());
    }
    Ok(())
}
