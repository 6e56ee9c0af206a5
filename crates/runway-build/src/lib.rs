//! Build recipe synthesis, Dockerfile rendering and build-context archiving.
//!
//! # Pipeline
//!
//! ```text
//! (root, kind, options)
//!   1. Synthesize ── RuntimeKind::synthesize() → BuildRecipe
//!   2. Render     ── DockerfileRenderer::render() → .runway/Dockerfile
//!   3. Context    ── BuildContext: injected files + Dockerfile
//!   4. Rules      ── IgnoreRules::resolve(): explicit → .dockerignore → defaults
//!   5. Archive    ── Archiver::write_to() → gzip tarball
//! ```
//!
//! Every step is deterministic: the same root, options and rules produce the
//! same recipe and byte-identical archives.

pub mod archive;
pub mod context;
pub mod dockerfile;
pub mod ignore;
pub mod synth;

pub use archive::{ArchiveEntry, ArchiveError, ArchiveSummary, Archiver, EntryKind, archive_to_file};
pub use context::{BuildContext, DOCKERFILE_PATH};
pub use dockerfile::DockerfileRenderer;
pub use ignore::{IGNORE_FILE, IgnoreError, IgnoreRule, IgnoreRules, Polarity};
pub use synth::{
    ERROR_OUTPUT_MARKER, GENERATED_DIR, SynthError, Synthesize, WORKDIR, synthesize,
};
