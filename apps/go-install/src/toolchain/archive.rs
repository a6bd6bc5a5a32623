//! Archive extraction for go-install.
//!
//! Unpacks a `.tar.gz` Go distribution in a single streamed pass. Entry paths
//! come from a downloaded file, so every entry is resolved against the
//! destination root before anything is written, and an entry that would land
//! outside the root aborts the whole extraction.
//!
//! Entry names are not rewritten: an archive whose top-level directory is
//! `go/` produces `<root>/go/...`.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};

use crate::errors::ExtractionError;

/// Permission bits for directories created during extraction.
const DIR_MODE: u32 = 0o755;

/// What a tar header says about one entry.
///
/// Built per entry and dropped as soon as the entry has been written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path as recorded in the archive.
    pub relative_path: PathBuf,
    /// Whether the entry is a directory.
    pub is_directory: bool,
    /// Permission bits from the header.
    pub mode: u32,
    /// Declared size in bytes.
    pub size: u64,
}

impl ArchiveEntry {
    fn from_tar<R: io::Read>(entry: &tar::Entry<'_, R>) -> io::Result<Self> {
        let header = entry.header();
        Ok(Self {
            relative_path: entry.path()?.into_owned(),
            is_directory: header.entry_type().is_dir(),
            mode: header.mode()? & 0o7777,
            size: entry.size(),
        })
    }
}

/// Resolves `relative` against `root` without touching the filesystem.
///
/// `.` components are dropped and `..` pops the previous component. Absolute
/// paths, drive prefixes, and any `..` that would climb above `root` are
/// rejected. Returns `root` itself for paths such as `./`.
///
/// # Errors
///
/// Returns [`ExtractionError::PathTraversal`] when the result would not stay
/// inside `root`.
pub fn resolve_entry_path(root: &Path, relative: &Path) -> Result<PathBuf, ExtractionError> {
    let traversal = || ExtractionError::PathTraversal {
        entry: relative.to_path_buf(),
        root: root.to_path_buf(),
    };

    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(traversal());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(traversal()),
        }
    }

    let mut resolved = root.to_path_buf();
    resolved.extend(parts);
    Ok(resolved)
}

/// Extracts a gzip-compressed tar archive into `destination_root`.
///
/// - Directories are created with mode `0755`, missing ancestors included.
/// - Regular files are created or truncated with the header's permission
///   bits; their parent directories are created on demand.
/// - The number of bytes written must equal the size in the header.
/// - Symlinks, hard links and special files are skipped with a warning.
///
/// A file that fails the size check is left on disk; the caller owns cleanup.
///
/// # Errors
///
/// Returns an error if:
/// - The archive cannot be opened or is not valid gzip/tar
/// - An entry resolves outside `destination_root`
/// - A file's written size differs from its declared size
/// - Directory or file creation fails
pub fn extract(archive_path: &Path, destination_root: &Path) -> Result<(), ExtractionError> {
    std::fs::create_dir_all(destination_root).map_err(|e| {
        ExtractionError::io(
            format!("failed to create {}", destination_root.display()),
            e,
        )
    })?;
    let root = std::path::absolute(destination_root).map_err(|e| {
        ExtractionError::io(
            format!("failed to resolve {}", destination_root.display()),
            e,
        )
    })?;

    let file = File::open(archive_path).map_err(|e| {
        ExtractionError::io(format!("failed to open {}", archive_path.display()), e)
    })?;
    let corrupt = |source: io::Error| ExtractionError::Archive {
        path: archive_path.to_path_buf(),
        source,
    };

    let mut archive = Archive::new(GzDecoder::new(file));
    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        let info = ArchiveEntry::from_tar(&entry).map_err(corrupt)?;
        let target = resolve_entry_path(&root, &info.relative_path)?;

        if info.is_directory {
            create_dir(&target)?;
            continue;
        }

        match entry.header().entry_type() {
            EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => {}
            other => {
                tracing::warn!(
                    "Skipping {} ({other:?} entries are not extracted)",
                    info.relative_path.display()
                );
                continue;
            }
        }

        if target == root {
            return Err(ExtractionError::PathTraversal {
                entry: info.relative_path,
                root,
            });
        }

        write_file(&mut entry, &target, &info)?;
    }

    Ok(())
}

/// Creates `path` and any missing ancestors with [`DIR_MODE`].
fn create_dir(path: &Path) -> Result<(), ExtractionError> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder
        .create(path)
        .map_err(|e| ExtractionError::io(format!("failed to create {}", path.display()), e))
}

/// Copies one file entry to `target` and checks its size.
fn write_file(
    reader: &mut impl io::Read,
    target: &Path,
    info: &ArchiveEntry,
) -> Result<(), ExtractionError> {
    if let Some(parent) = target.parent() {
        create_dir(parent)?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(info.mode & 0o777);
    }

    let mut file = options
        .open(target)
        .map_err(|e| ExtractionError::io(format!("failed to create {}", target.display()), e))?;

    tracing::debug!("Extracting {}", target.display());
    let written = io::copy(&mut io::Read::take(&mut *reader, info.size), &mut file)
        .map_err(|e| ExtractionError::io(format!("failed to write {}", target.display()), e))?;

    // An existing file keeps its old mode through `open`.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(info.mode & 0o777))
            .map_err(|e| {
                ExtractionError::io(format!("failed to set mode on {}", target.display()), e)
            })?;
    }

    if written != info.size {
        return Err(ExtractionError::SizeMismatch {
            path: target.to_path_buf(),
            expected: info.size,
            written,
        });
    }

    Ok(())
}
