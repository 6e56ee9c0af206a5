//! Task definitions and the build request derived from them.
//!
//! A task definition is a YAML file naming the task and exactly one runtime
//! section:
//!
//! ```yaml
//! slug: hello_world
//! name: Hello world
//! node:
//!   entrypoint: main.ts
//!   language: typescript
//!   nodeVersion: "16"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Free-form runtime options. Unknown keys are ignored by every runtime.
pub type Options = BTreeMap<String, String>;

/// The closed set of runtimes a task can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    Node,
    Python,
    Deno,
    Shell,
    /// A pre-built image; nothing to build.
    Manual,
}

impl RuntimeKind {
    pub const ALL: [RuntimeKind; 5] = [
        RuntimeKind::Node,
        RuntimeKind::Python,
        RuntimeKind::Deno,
        RuntimeKind::Shell,
        RuntimeKind::Manual,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeKind::Node => "node",
            RuntimeKind::Python => "python",
            RuntimeKind::Deno => "deno",
            RuntimeKind::Shell => "shell",
            RuntimeKind::Manual => "manual",
        }
    }

    /// Whether tasks of this kind need an image built from source.
    pub fn needs_building(self) -> bool {
        !matches!(self, RuntimeKind::Manual)
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuntimeKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuntimeKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| crate::Error::UnknownKind(s.to_owned()))
    }
}

/// Pre-built image section of a task definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualDefinition {
    pub image: Option<String>,
    #[serde(default)]
    pub command: Vec<String>,
}

/// A task definition file as written by users.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Directory, relative to the definition file, that forms the build context.
    #[serde(default)]
    pub root: Option<String>,

    #[serde(
        default,
        deserialize_with = "scalar_options",
        skip_serializing_if = "Option::is_none"
    )]
    pub node: Option<Options>,
    #[serde(
        default,
        deserialize_with = "scalar_options",
        skip_serializing_if = "Option::is_none"
    )]
    pub python: Option<Options>,
    #[serde(
        default,
        deserialize_with = "scalar_options",
        skip_serializing_if = "Option::is_none"
    )]
    pub deno: Option<Options>,
    #[serde(
        default,
        deserialize_with = "scalar_options",
        skip_serializing_if = "Option::is_none"
    )]
    pub shell: Option<Options>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual: Option<ManualDefinition>,
}

/// Everything the build pipeline needs to know about a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub slug: String,
    pub kind: RuntimeKind,
    pub options: Options,
    /// Image reference of a pre-built (manual) task.
    pub image: Option<String>,
    /// Command vector of a pre-built (manual) task.
    pub command: Vec<String>,
}

impl TaskDefinition {
    /// Read a task definition from a YAML file.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| crate::Error::DefinitionRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let def: Self =
            serde_yaml::from_str(&content).map_err(|e| crate::Error::DefinitionParse {
                path: path.to_path_buf(),
                source: e,
            })?;
        // Surface missing/duplicate runtime sections at load time.
        def.kind_for(&path.display().to_string())?;
        Ok(def)
    }

    /// Absolute build root for a definition stored at `definition_path`.
    pub fn root_dir(&self, definition_path: &Path) -> PathBuf {
        let parent = definition_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        match self.root.as_deref() {
            Some(root) if !root.is_empty() => parent.join(root),
            _ => parent.to_path_buf(),
        }
    }

    /// The runtime kind declared by this definition.
    pub fn kind(&self) -> crate::Result<RuntimeKind> {
        self.kind_for(&self.slug)
    }

    fn kind_for(&self, task: &str) -> crate::Result<RuntimeKind> {
        let declared: Vec<RuntimeKind> = [
            (RuntimeKind::Node, self.node.is_some()),
            (RuntimeKind::Python, self.python.is_some()),
            (RuntimeKind::Deno, self.deno.is_some()),
            (RuntimeKind::Shell, self.shell.is_some()),
            (RuntimeKind::Manual, self.manual.is_some()),
        ]
        .into_iter()
        .filter_map(|(kind, present)| present.then_some(kind))
        .collect();

        match declared.as_slice() {
            [] => Err(crate::Error::NoRuntime {
                task: task.to_owned(),
            }),
            [kind] => Ok(*kind),
            many => Err(crate::Error::MultipleRuntimes {
                task: task.to_owned(),
                found: many.iter().map(|k| k.to_string()).collect(),
            }),
        }
    }

    /// Convert the definition into the request consumed by the build pipeline.
    pub fn build_request(&self) -> crate::Result<BuildRequest> {
        let kind = self.kind()?;
        let options = match kind {
            RuntimeKind::Node => self.node.clone(),
            RuntimeKind::Python => self.python.clone(),
            RuntimeKind::Deno => self.deno.clone(),
            RuntimeKind::Shell => self.shell.clone(),
            RuntimeKind::Manual => None,
        }
        .unwrap_or_default();

        let (image, command) = match &self.manual {
            Some(manual) => (manual.image.clone(), manual.command.clone()),
            None => (None, Vec::new()),
        };

        Ok(BuildRequest {
            slug: self.slug.clone(),
            kind,
            options,
            image,
            command,
        })
    }
}

/// Accepts any YAML scalar as an option value so `nodeVersion: 16` works
/// the same as `nodeVersion: "16"`.
fn scalar_options<'de, D>(deserializer: D) -> Result<Option<Options>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error as _;
    use serde_yaml::Value;

    // A bare section (`deno:`) parses as null and means all defaults.
    let raw: BTreeMap<String, Value> = match Value::deserialize(deserializer)? {
        Value::Null => return Ok(Some(Options::new())),
        other => BTreeMap::deserialize(other).map_err(D::Error::custom)?,
    };

    let mut options = Options::new();
    for (key, value) in raw {
        let value = match value {
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Null => continue,
            other => {
                return Err(D::Error::custom(format!(
                    "option {key:?} must be a scalar, got {other:?}"
                )));
            }
        };
        options.insert(key, value);
    }
    Ok(Some(options))
}
