use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use runway_core::InjectedFiles;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::ignore::IgnoreRules;

/// One path selected for a build-context archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path relative to the archive root, `/`-separated.
    pub path: String,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
    Symlink,
}

/// Counts reported after an archive has been written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub dirs: usize,
    pub files: usize,
}

/// Packs a task root into a gzip-compressed tarball.
///
/// The walk is sorted by file name and every header carries fixed metadata
/// (mtime 0, uid/gid 0), so the same tree always produces the same bytes.
/// Excluded directories are pruned unless an include rule reaches below them.
pub struct Archiver<'a> {
    root: &'a Path,
    rules: &'a IgnoreRules,
    extra_files: Option<&'a InjectedFiles>,
}

impl<'a> Archiver<'a> {
    pub fn new(root: &'a Path, rules: &'a IgnoreRules) -> Self {
        Self {
            root,
            rules,
            extra_files: None,
        }
    }

    /// Add generated files at fixed paths. A walked file at the same path is
    /// replaced by the generated one.
    pub fn with_files(mut self, files: &'a InjectedFiles) -> Self {
        self.extra_files = Some(files);
        self
    }

    /// Paths from the task root that pass the ignore rules, in archive order.
    pub fn entries(&self) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let mut entries = Vec::new();
        let mut walker = WalkDir::new(self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|e| ArchiveError::Walk {
                root: self.root.to_path_buf(),
                source: e,
            })?;
            let rel = relative_path(self.root, entry.path())?;
            let file_type = entry.file_type();
            let excluded = self.rules.is_excluded(&rel);

            if file_type.is_dir() {
                if excluded && !self.rules.has_include_under(&rel) {
                    tracing::trace!(path = %rel, "pruning excluded directory");
                    walker.skip_current_dir();
                    continue;
                }
                entries.push(ArchiveEntry {
                    path: rel,
                    kind: EntryKind::Dir,
                });
            } else if !excluded {
                let kind = if file_type.is_symlink() {
                    EntryKind::Symlink
                } else {
                    EntryKind::File
                };
                entries.push(ArchiveEntry { path: rel, kind });
            }
        }
        Ok(entries)
    }

    /// Write the archive to `out`. A partially written file is removed on error.
    pub fn write_to(
        &self,
        out: &Path,
        cancel: &CancellationToken,
    ) -> Result<ArchiveSummary, ArchiveError> {
        let file = File::create(out).map_err(|e| ArchiveError::Create {
            path: out.to_path_buf(),
            source: e,
        })?;

        let result = self.write(file, cancel);
        if result.is_err()
            && let Err(e) = std::fs::remove_file(out)
        {
            tracing::warn!(path = %out.display(), error = %e, "failed to remove partial archive");
        }
        result
    }

    /// Write the archive into any writer.
    pub fn write<W: Write>(
        &self,
        writer: W,
        cancel: &CancellationToken,
    ) -> Result<ArchiveSummary, ArchiveError> {
        let entries = self.entries()?;
        let encoder = GzEncoder::new(writer, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut summary = ArchiveSummary::default();

        for entry in &entries {
            if cancel.is_cancelled() {
                return Err(ArchiveError::Cancelled);
            }
            if self
                .extra_files
                .is_some_and(|files| files.contains_key(&entry.path))
            {
                tracing::debug!(path = %entry.path, "generated file replaces source file");
                continue;
            }

            let source = self.root.join(&entry.path);
            match entry.kind {
                EntryKind::Dir => {
                    append_dir(&mut builder, &entry.path)?;
                    summary.dirs += 1;
                }
                EntryKind::File => {
                    append_file(&mut builder, &entry.path, &source)?;
                    summary.files += 1;
                }
                EntryKind::Symlink => {
                    append_symlink(&mut builder, &entry.path, &source)?;
                    summary.files += 1;
                }
            }
        }

        if let Some(files) = self.extra_files {
            for (path, contents) in files {
                if cancel.is_cancelled() {
                    return Err(ArchiveError::Cancelled);
                }
                let mut header = fixed_header(tar::EntryType::Regular, 0o644);
                header.set_size(contents.len() as u64);
                builder
                    .append_data(&mut header, path, contents.as_slice())
                    .map_err(ArchiveError::Write)?;
                summary.files += 1;
            }
        }

        let encoder = builder.into_inner().map_err(ArchiveError::Write)?;
        let mut writer = encoder.finish().map_err(ArchiveError::Write)?;
        writer.flush().map_err(ArchiveError::Write)?;

        tracing::debug!(
            root = %self.root.display(),
            dirs = summary.dirs,
            files = summary.files,
            "archive written"
        );
        Ok(summary)
    }
}

/// Build an archive on the blocking pool.
pub async fn archive_to_file(
    root: PathBuf,
    rules: IgnoreRules,
    files: InjectedFiles,
    out: PathBuf,
    cancel: CancellationToken,
) -> Result<ArchiveSummary, ArchiveError> {
    tokio::task::spawn_blocking(move || {
        Archiver::new(&root, &rules)
            .with_files(&files)
            .write_to(&out, &cancel)
    })
    .await?
}

fn fixed_header(entry_type: tar::EntryType, mode: u32) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_mode(mode);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_size(0);
    header
}

fn append_dir<W: Write>(builder: &mut tar::Builder<W>, rel: &str) -> Result<(), ArchiveError> {
    let mut header = fixed_header(tar::EntryType::Directory, 0o755);
    builder
        .append_data(&mut header, format!("{rel}/"), io::empty())
        .map_err(ArchiveError::Write)
}

fn append_file<W: Write>(
    builder: &mut tar::Builder<W>,
    rel: &str,
    source: &Path,
) -> Result<(), ArchiveError> {
    let read_err = |e| ArchiveError::Read {
        path: source.to_path_buf(),
        source: e,
    };
    let file = File::open(source).map_err(read_err)?;
    let metadata = file.metadata().map_err(read_err)?;

    let mut header = fixed_header(tar::EntryType::Regular, file_mode(&metadata));
    header.set_size(metadata.len());
    builder
        .append_data(&mut header, rel, file)
        .map_err(ArchiveError::Write)
}

fn append_symlink<W: Write>(
    builder: &mut tar::Builder<W>,
    rel: &str,
    source: &Path,
) -> Result<(), ArchiveError> {
    let target = std::fs::read_link(source).map_err(|e| ArchiveError::Read {
        path: source.to_path_buf(),
        source: e,
    })?;
    let mut header = fixed_header(tar::EntryType::Symlink, 0o777);
    builder
        .append_link(&mut header, rel, &target)
        .map_err(ArchiveError::Write)
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn file_mode(_metadata: &std::fs::Metadata) -> u32 {
    0o644
}

fn relative_path(root: &Path, path: &Path) -> Result<String, ArchiveError> {
    let rel = path
        .strip_prefix(root)
        .map_err(|e| ArchiveError::OutsideRoot {
            path: path.to_path_buf(),
            source: e,
        })?;
    let mut parts = Vec::new();
    for component in rel.components() {
        let part = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| ArchiveError::NonUtf8Path(path.to_path_buf()))?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("failed to walk {root}")]
    Walk {
        root: PathBuf,
        source: walkdir::Error,
    },

    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    #[error("path {path} is outside the archive root")]
    OutsideRoot {
        path: PathBuf,
        source: std::path::StripPrefixError,
    },

    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        source: io::Error,
    },

    #[error("failed to create archive {path}")]
    Create {
        path: PathBuf,
        source: io::Error,
    },

    #[error("failed to write archive")]
    Write(#[source] io::Error),

    #[error("archiving was cancelled")]
    Cancelled,

    #[error("archive task did not complete")]
    Join(#[from] tokio::task::JoinError),
}
