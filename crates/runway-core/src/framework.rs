//! Framework adapters.
//!
//! Adapters detect project types (e.g. a Django project) inside a task root.
//! They live in an explicit [`FrameworkRegistry`] that is built once at
//! process start and passed by reference to whoever needs it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

/// An opened framework project.
pub trait Framework: std::fmt::Debug {
    /// Name the framework was registered under.
    fn name(&self) -> &'static str;

    /// Lists the commands the project exposes. Empty when there are none.
    fn list_commands(&self) -> crate::Result<Vec<String>>;
}

/// Opens a framework rooted at the given directory, failing when the
/// directory lacks the files the framework requires.
pub type FrameworkAdapter = fn(&Path) -> crate::Result<Box<dyn Framework>>;

#[derive(Debug, Default, Clone)]
pub struct FrameworkRegistry {
    adapters: BTreeMap<String, FrameworkAdapter>,
}

impl FrameworkRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in adapter registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register("django", Django::open)
            .expect("built-in framework names are unique");
        registry
    }

    /// Register `adapter` under `name`. Names are unique.
    pub fn register(&mut self, name: &str, adapter: FrameworkAdapter) -> crate::Result<()> {
        if self.adapters.contains_key(name) {
            return Err(crate::Error::FrameworkRegistered(name.to_owned()));
        }
        self.adapters.insert(name.to_owned(), adapter);
        Ok(())
    }

    /// Open the framework `name` at `root`.
    pub fn open(&self, name: &str, root: &Path) -> crate::Result<Box<dyn Framework>> {
        let adapter = self
            .adapters
            .get(name)
            .ok_or_else(|| crate::Error::UnknownFramework {
                name: name.to_owned(),
                known: self.names(),
            })?;
        tracing::debug!(framework = name, root = %root.display(), "opening framework");
        adapter(root)
    }

    /// Registered framework names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.adapters.keys().cloned().collect()
    }
}

/// A Django project, identified by its `manage.py`.
#[derive(Debug)]
pub struct Django {
    root: PathBuf,
}

impl Django {
    pub fn open(root: &Path) -> crate::Result<Box<dyn Framework>> {
        let manage_py = root.join("manage.py");
        if !manage_py.is_file() {
            return Err(crate::Error::FrameworkMissingFile {
                framework: "django",
                root: root.to_path_buf(),
                missing: PathBuf::from("manage.py"),
            });
        }
        Ok(Box::new(Self {
            root: root.to_path_buf(),
        }))
    }
}

impl Framework for Django {
    fn name(&self) -> &'static str {
        "django"
    }

    fn list_commands(&self) -> crate::Result<Vec<String>> {
        let bin = self.root.join("manage.py");
        let command = format!("{} help --commands", bin.display());

        let output = Command::new(&bin)
            .args(["help", "--commands"])
            .current_dir(&self.root)
            .output()
            .map_err(|e| crate::Error::FrameworkCommand {
                framework: "django",
                command: command.clone(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(crate::Error::FrameworkCommand {
                framework: "django",
                command,
                detail: format!("exited with {}: {}", output.status, stderr.trim()),
            });
        }

        Ok(parse_command_list(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// One command per non-blank line, sorted.
fn parse_command_list(stdout: &str) -> Vec<String> {
    let mut commands: Vec<String> = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect();
    commands.sort();
    commands
}
