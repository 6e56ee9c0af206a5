use std::path::Path;

use runway_core::{Base, BuildRecipe, Instruction, Options};

use super::{SynthError, WORKDIR, entrypoint, require_file};

const DENO_IMAGE: &str = "denoland/deno:alpine-1.10.3";

pub(super) fn synthesize(root: &Path, options: &Options) -> Result<BuildRecipe, SynthError> {
    let entry = entrypoint(options, "main.ts");
    require_file(root, &entry)?;

    let mut recipe = BuildRecipe::new(Base::Image(DENO_IMAGE.to_owned()));
    recipe
        .push(Instruction::Workdir(WORKDIR.to_owned()))
        .push(Instruction::copy(".", "."))
        .push(Instruction::run(format!("deno cache {entry}")))
        .push(Instruction::User("deno".to_owned()));
    recipe.entrypoint = ["deno", "run", "-A"]
        .into_iter()
        .map(str::to_owned)
        .chain([entry])
        .collect();
    Ok(recipe)
}
