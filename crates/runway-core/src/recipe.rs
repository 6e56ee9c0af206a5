use std::collections::BTreeMap;

/// Files generated during synthesis, keyed by build-context relative path.
pub type InjectedFiles = BTreeMap<String, Vec<u8>>;

/// The layer a recipe starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Base {
    /// A plain `FROM <image>`.
    Image(String),
    /// Raw Dockerfile text used verbatim as a prefix. Never parsed.
    Dockerfile { path: String, contents: String },
}

/// A single build step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Workdir(String),
    Copy { src: String, dest: String },
    Run(String),
    Arg(String),
    User(String),
}

impl Instruction {
    pub fn copy(src: impl Into<String>, dest: impl Into<String>) -> Self {
        Instruction::Copy {
            src: src.into(),
            dest: dest.into(),
        }
    }

    pub fn run(command: impl Into<String>) -> Self {
        Instruction::Run(command.into())
    }
}

/// Declarative description of how to build a task image.
///
/// Recipes are immutable once synthesized and owned by the build that
/// produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRecipe {
    pub base: Base,
    pub instructions: Vec<Instruction>,
    pub injected_files: InjectedFiles,
    pub entrypoint: Vec<String>,
}

impl BuildRecipe {
    pub fn new(base: Base) -> Self {
        Self {
            base,
            instructions: Vec::new(),
            injected_files: InjectedFiles::new(),
            entrypoint: Vec::new(),
        }
    }

    /// The base image identifier, when the recipe starts from an image.
    pub fn base_image(&self) -> Option<&str> {
        match &self.base {
            Base::Image(image) => Some(image),
            Base::Dockerfile { .. } => None,
        }
    }

    pub fn push(&mut self, instruction: Instruction) -> &mut Self {
        self.instructions.push(instruction);
        self
    }

    pub fn inject(&mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> &mut Self {
        self.injected_files.insert(path.into(), contents.into());
        self
    }
}
