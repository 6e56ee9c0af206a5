use std::path::Path;

use runway_core::{Base, BuildRecipe, Instruction, Options};

use super::{SynthError, WORKDIR, entrypoint, require_file};

const PYTHON_IMAGE: &str = "python:3.9.1-buster";

pub(super) fn synthesize(root: &Path, options: &Options) -> Result<BuildRecipe, SynthError> {
    let entry = entrypoint(options, "main.py");
    require_file(root, "requirements.txt")?;
    require_file(root, &entry)?;

    let mut recipe = BuildRecipe::new(Base::Image(PYTHON_IMAGE.to_owned()));
    recipe
        .push(Instruction::Workdir(WORKDIR.to_owned()))
        .push(Instruction::copy("requirements.txt", "."))
        .push(Instruction::run("pip install -r requirements.txt"))
        .push(Instruction::copy(".", "."));
    recipe.entrypoint = vec!["python".to_owned(), entry];
    Ok(recipe)
}
