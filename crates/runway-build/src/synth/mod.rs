//! Build recipe synthesis.
//!
//! Each runtime maps `(root, options)` to a [`BuildRecipe`]. Policies only
//! look at whether well-known files exist, plus the few config files they
//! merge or embed (`tsconfig.json`, a shell task's base Dockerfile).

mod deno;
mod node;
mod python;
mod shell;

use std::path::{Path, PathBuf};

use runway_core::{BuildRecipe, Options, RuntimeKind};

pub use node::{DEFAULT_NODE_VERSION, node_base_image};
pub use shell::{DEFAULT_SHELL_IMAGE, DEFAULT_SHELL_PACKAGES};

/// Working directory inside every built image.
pub const WORKDIR: &str = "/runway";

/// Directory, relative to the build context, holding generated files.
pub const GENERATED_DIR: &str = ".runway";

/// Prefix of the stdout line a shim prints when the task fails.
pub const ERROR_OUTPUT_MARKER: &str = "airplane_output:error";

/// Produces a build recipe for a task root.
pub trait Synthesize {
    fn synthesize(&self, root: &Path, options: &Options) -> Result<BuildRecipe, SynthError>;
}

impl Synthesize for RuntimeKind {
    fn synthesize(&self, root: &Path, options: &Options) -> Result<BuildRecipe, SynthError> {
        tracing::debug!(kind = %self, root = %root.display(), "synthesizing recipe");
        match self {
            RuntimeKind::Node => node::synthesize(root, options),
            RuntimeKind::Python => python::synthesize(root, options),
            RuntimeKind::Deno => deno::synthesize(root, options),
            RuntimeKind::Shell => shell::synthesize(root, options),
            RuntimeKind::Manual => Err(SynthError::NoBuildNeeded { kind: *self }),
        }
    }
}

/// Synthesize the recipe for `kind`.
pub fn synthesize(
    root: &Path,
    kind: RuntimeKind,
    options: &Options,
) -> Result<BuildRecipe, SynthError> {
    kind.synthesize(root, options)
}

fn option<'a>(options: &'a Options, key: &str, default: &'a str) -> &'a str {
    match options.get(key).map(|v| v.trim()) {
        Some(value) if !value.is_empty() => value,
        _ => default,
    }
}

/// Entrypoint as a clean context-relative path.
fn entrypoint(options: &Options, default: &str) -> String {
    let raw = option(options, "entrypoint", default);
    raw.split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn require_file(root: &Path, rel: &str) -> Result<PathBuf, SynthError> {
    let path = root.join(rel);
    if path.is_file() {
        Ok(path)
    } else {
        Err(SynthError::MissingFile { path })
    }
}

fn has_file(root: &Path, rel: &str) -> bool {
    root.join(rel).is_file()
}

fn generated(name: &str) -> String {
    format!("{GENERATED_DIR}/{name}")
}

#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("required file {} does not exist", path.display())]
    MissingFile { path: PathBuf },

    #[error("option {key:?} is required")]
    MissingOption { key: &'static str },

    #[error(
        "unsupported value {value:?} for option {key:?}; expected one of: {}",
        expected.join(", ")
    )]
    UnsupportedOption {
        key: &'static str,
        value: String,
        expected: &'static [&'static str],
    },

    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path} as JSON")]
    ParseJson {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{path} must contain a JSON object")]
    NotAnObject { path: PathBuf },

    #[error("failed to render {name}")]
    Render {
        name: String,
        source: serde_json::Error,
    },

    #[error("{kind} tasks use a pre-built image; nothing to build")]
    NoBuildNeeded { kind: RuntimeKind },
}
