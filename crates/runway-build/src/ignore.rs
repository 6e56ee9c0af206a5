//! Ignore rules for build-context archives.
//!
//! Rules follow `.dockerignore` semantics: patterns are matched against
//! paths relative to the task root, a leading `!` turns a pattern into an
//! include override, and the last matching rule wins.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use runway_core::RuntimeKind;

/// Name of the ignore file read from a task root.
pub const IGNORE_FILE: &str = ".dockerignore";

/// Excluded for every runtime.
const BASELINE_EXCLUDES: &[&str] = &[".git", "*.env"];

const NODE_EXCLUDES: &[&str] = &["node_modules", ".npm", ".next", "out", "dist", ".yarn"];

const PYTHON_EXCLUDES: &[&str] = &["__pycache__", ".venv"];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Exclude,
    /// Re-admits paths excluded by an earlier rule (`!pattern`).
    Include,
}

/// A single ignore pattern.
#[derive(Debug, Clone)]
pub struct IgnoreRule {
    pattern: String,
    polarity: Polarity,
    matcher: Pattern,
    depth: usize,
}

impl IgnoreRule {
    /// Compile a cleaned pattern with the given polarity.
    pub fn new(pattern: &str, polarity: Polarity) -> Result<Self, IgnoreError> {
        if pattern.is_empty() {
            return Err(IgnoreError::IllegalExclusion(pattern.to_owned()));
        }
        let matcher = Pattern::new(pattern).map_err(|e| IgnoreError::Pattern {
            pattern: pattern.to_owned(),
            source: e,
        })?;
        Ok(Self {
            pattern: pattern.to_owned(),
            polarity,
            matcher,
            depth: pattern.split('/').count(),
        })
    }

    /// Parse one line of an ignore file. Blank lines and comments yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, IgnoreError> {
        if line.starts_with('#') {
            return Ok(None);
        }
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (polarity, raw) = match line.strip_prefix('!') {
            Some(rest) => (Polarity::Include, rest.trim()),
            None => (Polarity::Exclude, line),
        };
        if raw.is_empty() {
            return Err(IgnoreError::IllegalExclusion(line.to_owned()));
        }
        Self::new(&clean(raw), polarity).map(Some)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn is_include(&self) -> bool {
        self.polarity == Polarity::Include
    }

    fn matches(&self, path: &str) -> bool {
        self.matcher.matches_with(path, MATCH_OPTIONS)
    }
}

/// An ordered set of ignore rules.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<IgnoreRule>,
}

impl IgnoreRules {
    /// Parse ignore-file lines in order.
    pub fn parse<I, S>(lines: I) -> Result<Self, IgnoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rules = Vec::new();
        for line in lines {
            if let Some(rule) = IgnoreRule::parse(line.as_ref())? {
                rules.push(rule);
            }
        }
        Ok(Self { rules })
    }

    /// Read rules from an ignore file.
    pub fn from_file(path: &Path) -> Result<Self, IgnoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| IgnoreError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(content.lines())
    }

    /// Default rules for a runtime, used when a task has no ignore file.
    pub fn defaults(kind: RuntimeKind) -> Self {
        let extra: &[&str] = match kind {
            RuntimeKind::Node => NODE_EXCLUDES,
            RuntimeKind::Python => PYTHON_EXCLUDES,
            RuntimeKind::Deno | RuntimeKind::Shell | RuntimeKind::Manual => &[],
        };
        let rules = BASELINE_EXCLUDES
            .iter()
            .chain(extra)
            .map(|p| IgnoreRule::new(p, Polarity::Exclude).expect("default patterns are valid"))
            .collect();
        Self { rules }
    }

    /// Pick the rules for a task root: explicit rules when given, else the
    /// root's ignore file, else the runtime defaults.
    pub fn resolve(
        root: &Path,
        explicit: Option<IgnoreRules>,
        kind: RuntimeKind,
    ) -> Result<Self, IgnoreError> {
        if let Some(rules) = explicit.filter(|r| !r.is_empty()) {
            tracing::debug!(rules = rules.len(), "using explicit ignore rules");
            return Ok(rules);
        }

        let ignore_file = root.join(IGNORE_FILE);
        if ignore_file.is_file() {
            let rules = Self::from_file(&ignore_file)?;
            if !rules.is_empty() {
                tracing::debug!(
                    path = %ignore_file.display(),
                    rules = rules.len(),
                    "using ignore file"
                );
                return Ok(rules);
            }
        }

        tracing::debug!(%kind, "using default ignore rules");
        Ok(Self::defaults(kind))
    }

    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether `path` (relative, `/`-separated) is excluded.
    ///
    /// Each rule is tried against the path itself and, failing that, against
    /// the path's leading parent directories. The last matching rule decides.
    pub fn is_excluded(&self, path: &str) -> bool {
        let parents: Vec<&str> = match path.rsplit_once('/') {
            Some((parent, _)) => parent.split('/').collect(),
            None => Vec::new(),
        };

        let mut excluded = false;
        for rule in &self.rules {
            let mut hit = rule.matches(path);
            if !hit && !parents.is_empty() && rule.depth <= parents.len() {
                hit = rule.matches(&parents[..rule.depth].join("/"));
            }
            if hit {
                excluded = rule.polarity == Polarity::Exclude;
            }
        }
        excluded
    }

    /// Whether any include rule may re-admit something below `dir`.
    ///
    /// An excluded directory must still be walked when this holds.
    pub fn has_include_under(&self, dir: &str) -> bool {
        let prefix = format!("{dir}/");
        self.rules
            .iter()
            .filter(|r| r.is_include())
            .any(|r| format!("{}/", r.pattern).starts_with(&prefix))
    }
}

/// Lexically clean a pattern: collapse separators, drop `.` segments,
/// resolve `..` where possible and strip a leading `/`. A pattern that
/// cleans away entirely becomes `.`.
fn clean(raw: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !raw.starts_with('/') {
                    parts.push("..");
                }
            }
            s => parts.push(s),
        }
    }
    if parts.is_empty() {
        return ".".to_owned();
    }
    parts.join("/")
}

#[derive(Debug, thiserror::Error)]
pub enum IgnoreError {
    #[error("illegal exclusion pattern: {0:?}")]
    IllegalExclusion(String),

    #[error("invalid ignore pattern {pattern:?}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("failed to read ignore file {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}
