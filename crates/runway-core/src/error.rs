use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    // ── Task definitions ──
    #[error("failed to read task definition {path}")]
    DefinitionRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse task definition {path}")]
    DefinitionParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("task {task} has no runtime section; add one of: {}", RUNTIME_SECTIONS.join(", "))]
    NoRuntime { task: String },

    #[error(
        "task {task} declares multiple runtimes ({}); keep exactly one",
        found.join(", ")
    )]
    MultipleRuntimes { task: String, found: Vec<String> },

    #[error("unknown runtime kind {0:?}")]
    UnknownKind(String),

    // ── Frameworks ──
    #[error("framework {0:?} is already registered")]
    FrameworkRegistered(String),

    #[error("framework {name:?} does not exist; known frameworks: {}", format_names(known))]
    UnknownFramework { name: String, known: Vec<String> },

    #[error("{framework}: cannot find {} in {}", missing.display(), root.display())]
    FrameworkMissingFile {
        framework: &'static str,
        root: PathBuf,
        missing: PathBuf,
    },

    #[error("{framework}: command {command} failed: {detail}")]
    FrameworkCommand {
        framework: &'static str,
        command: String,
        detail: String,
    },
}

const RUNTIME_SECTIONS: &[&str] = &["node", "python", "deno", "shell", "manual"];

fn format_names(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_owned()
    } else {
        names.join(", ")
    }
}
