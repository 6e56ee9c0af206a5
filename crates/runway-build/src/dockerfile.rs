use runway_core::{Base, BuildRecipe, Instruction};

/// Renders a [`BuildRecipe`] as Dockerfile text.
///
/// A `Base::Dockerfile` prefix is emitted verbatim; instructions follow in
/// recipe order and the entrypoint is always last, in exec form.
pub struct DockerfileRenderer<'a> {
    recipe: &'a BuildRecipe,
}

impl<'a> DockerfileRenderer<'a> {
    pub fn new(recipe: &'a BuildRecipe) -> Self {
        Self { recipe }
    }

    pub fn render(&self) -> String {
        let mut out = match &self.recipe.base {
            Base::Image(image) => format!("FROM {image}\n"),
            Base::Dockerfile { contents, .. } => {
                let mut prefix = contents.clone();
                if !prefix.ends_with('\n') {
                    prefix.push('\n');
                }
                prefix
            }
        };

        for instruction in &self.recipe.instructions {
            out.push_str(&render_instruction(instruction));
            out.push('\n');
        }

        if !self.recipe.entrypoint.is_empty() {
            out.push_str(&format!(
                "ENTRYPOINT {}\n",
                exec_form(&self.recipe.entrypoint)
            ));
        }
        out
    }
}

fn render_instruction(instruction: &Instruction) -> String {
    match instruction {
        Instruction::Workdir(dir) => format!("WORKDIR {dir}"),
        Instruction::Copy { src, dest } => format!("COPY {src} {dest}"),
        Instruction::Run(command) => format!("RUN {command}"),
        Instruction::Arg(name) => format!("ARG {name}"),
        Instruction::User(user) => format!("USER {user}"),
    }
}

/// JSON array form, e.g. `["node", "main.js"]`.
fn exec_form(args: &[String]) -> String {
    let quoted: Vec<String> = args
        .iter()
        .map(|a| serde_json::Value::from(a.as_str()).to_string())
        .collect();
    format!("[{}]", quoted.join(", "))
}
