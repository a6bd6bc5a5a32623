//! Installation state machine.
//!
//! An install replaces `<root>/go` in two steps:
//!
//! ```text
//! Idle --remove_old--> RemovingOld --extract_new--> Extracting --> Done
//!          |                |                           |
//!          +----------------+---------> Failed <--------+
//! ```
//!
//! `RemovingOld` is skipped when no version is currently installed. The old
//! tree is gone before extraction starts, so an extraction failure leaves no
//! runtime at all; [`InstallError::Extraction`] says so.
//!
//! Filesystem access goes through [`InstallBackend`] so each transition can be
//! driven in isolation.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use super::archive;
use super::version::RuntimeVersion;
use crate::errors::{ExtractionError, InstallError};

/// Name of the runtime directory under the installation root.
pub const RUNTIME_DIR: &str = "go";

/// Where an install currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    /// Nothing has happened yet.
    Idle,
    /// The previous runtime tree is being deleted.
    RemovingOld,
    /// The new archive is being unpacked.
    Extracting,
    /// The new runtime is in place.
    Done,
    /// A step failed; no further transitions are allowed.
    Failed,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::RemovingOld => "removing-old",
            Self::Extracting => "extracting",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Filesystem operations the installer needs.
pub trait InstallBackend {
    /// Recursively deletes `path`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error; `NotFound` is treated as success by
    /// the caller.
    fn remove_tree(&self, path: &Path) -> io::Result<()>;

    /// Unpacks `archive` into `destination`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExtractionError`] on any extraction failure.
    fn extract(&self, archive: &Path, destination: &Path) -> Result<(), ExtractionError>;
}

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl InstallBackend for LocalFs {
    fn remove_tree(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir_all(path)
    }

    fn extract(&self, archive: &Path, destination: &Path) -> Result<(), ExtractionError> {
        archive::extract(archive, destination)
    }
}

/// Replaces the runtime tree under one root.
#[derive(Debug)]
pub struct Installer<B> {
    backend: B,
    root: PathBuf,
    state: InstallState,
}

impl<B: InstallBackend> Installer<B> {
    /// Creates an installer for `root` in the `Idle` state.
    pub fn new(backend: B, root: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            root: root.into(),
            state: InstallState::Idle,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> InstallState {
        self.state
    }

    /// Returns `<root>/go`.
    #[must_use]
    pub fn runtime_dir(&self) -> PathBuf {
        self.root.join(RUNTIME_DIR)
    }

    /// Deletes the old runtime tree if `current` is a known version.
    ///
    /// A missing tree counts as removed. Allowed only from `Idle`; leaves the
    /// installer in `RemovingOld` on success (or `Idle` when there was nothing
    /// to remove) and in `Failed` on error.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Removal`] if the tree exists but cannot be
    /// deleted, or [`InstallError::InvalidTransition`] from any other state.
    pub fn remove_old(&mut self, current: &RuntimeVersion) -> Result<(), InstallError> {
        self.expect_state(InstallState::Idle, InstallState::RemovingOld)?;
        if !current.is_known() {
            return Ok(());
        }

        self.state = InstallState::RemovingOld;
        let path = self.runtime_dir();
        tracing::info!("Removing v{current} files");

        match self.backend.remove_tree(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("{} does not exist, nothing to remove", path.display());
                Ok(())
            }
            Err(source) => {
                self.state = InstallState::Failed;
                Err(InstallError::Removal { path, source })
            }
        }
    }

    /// Unpacks `archive` into the root.
    ///
    /// Allowed from `Idle` or `RemovingOld`; ends in `Done` or `Failed`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Extraction`] if extraction fails, or
    /// [`InstallError::InvalidTransition`] from any other state.
    pub fn extract_new(
        &mut self,
        new_version: &RuntimeVersion,
        archive: &Path,
    ) -> Result<(), InstallError> {
        if !matches!(self.state, InstallState::Idle | InstallState::RemovingOld) {
            return Err(InstallError::InvalidTransition {
                from: self.state,
                to: InstallState::Extracting,
            });
        }

        self.state = InstallState::Extracting;
        tracing::info!("Installing v{new_version} runtime");

        match self.backend.extract(archive, &self.root) {
            Ok(()) => {
                self.state = InstallState::Done;
                Ok(())
            }
            Err(source) => {
                self.state = InstallState::Failed;
                Err(InstallError::Extraction {
                    root: self.root.clone(),
                    source,
                })
            }
        }
    }

    /// Runs the full sequence: remove the old tree, then extract the new one.
    ///
    /// # Errors
    ///
    /// See [`Installer::remove_old`] and [`Installer::extract_new`]. A
    /// removal failure returns before the archive is touched.
    pub fn install(
        &mut self,
        new_version: &RuntimeVersion,
        current_version: &RuntimeVersion,
        archive: &Path,
    ) -> Result<(), InstallError> {
        self.remove_old(current_version)?;
        self.extract_new(new_version, archive)
    }

    fn expect_state(&self, expected: InstallState, to: InstallState) -> Result<(), InstallError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(InstallError::InvalidTransition {
                from: self.state,
                to,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::version::extract_version;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::cell::{Cell, RefCell};
    use std::fs::File;

    /// Backend that records calls and fails on demand.
    #[derive(Default)]
    struct ScriptedFs {
        removal_error: Option<io::ErrorKind>,
        fail_extract: bool,
        removed: RefCell<Vec<PathBuf>>,
        extract_calls: Cell<usize>,
    }

    impl InstallBackend for ScriptedFs {
        fn remove_tree(&self, path: &Path) -> io::Result<()> {
            self.removed.borrow_mut().push(path.to_path_buf());
            match self.removal_error {
                Some(kind) => Err(io::Error::from(kind)),
                None => Ok(()),
            }
        }

        fn extract(&self, _archive: &Path, _destination: &Path) -> Result<(), ExtractionError> {
            self.extract_calls.set(self.extract_calls.get() + 1);
            if self.fail_extract {
                Err(ExtractionError::SizeMismatch {
                    path: PathBuf::from("go/bin/go"),
                    expected: 10,
                    written: 4,
                })
            } else {
                Ok(())
            }
        }
    }

    fn v(text: &str) -> RuntimeVersion {
        extract_version(text)
    }

    #[test]
    fn new_installer_is_idle() {
        let installer = Installer::new(ScriptedFs::default(), "/opt");
        assert_eq!(installer.state(), InstallState::Idle);
        assert_eq!(installer.runtime_dir(), PathBuf::from("/opt/go"));
    }

    #[test]
    fn unknown_current_version_skips_removal() {
        let mut installer = Installer::new(ScriptedFs::default(), "/opt");

        installer.remove_old(&RuntimeVersion::Unknown).unwrap();

        assert_eq!(installer.state(), InstallState::Idle);
        assert!(installer.backend.removed.borrow().is_empty());
    }

    #[test]
    fn known_current_version_removes_runtime_dir() {
        let mut installer = Installer::new(ScriptedFs::default(), "/opt");

        installer.remove_old(&v("1.17.8")).unwrap();

        assert_eq!(installer.state(), InstallState::RemovingOld);
        assert_eq!(
            *installer.backend.removed.borrow(),
            vec![PathBuf::from("/opt/go")]
        );
    }

    #[test]
    fn missing_old_tree_counts_as_removed() {
        let backend = ScriptedFs {
            removal_error: Some(io::ErrorKind::NotFound),
            ..ScriptedFs::default()
        };
        let mut installer = Installer::new(backend, "/opt");

        installer.remove_old(&v("1.17.8")).unwrap();

        assert_eq!(installer.state(), InstallState::RemovingOld);
    }

    #[test]
    fn removal_failure_is_fatal_and_skips_extraction() {
        let backend = ScriptedFs {
            removal_error: Some(io::ErrorKind::PermissionDenied),
            ..ScriptedFs::default()
        };
        let mut installer = Installer::new(backend, "/opt");

        let err = installer
            .install(&v("1.18"), &v("1.17"), Path::new("go.tar.gz"))
            .unwrap_err();

        assert!(matches!(err, InstallError::Removal { .. }));
        assert_eq!(installer.state(), InstallState::Failed);
        assert_eq!(installer.backend.extract_calls.get(), 0);
    }

    #[test]
    fn extraction_failure_ends_in_failed() {
        let backend = ScriptedFs {
            fail_extract: true,
            ..ScriptedFs::default()
        };
        let mut installer = Installer::new(backend, "/opt");

        let err = installer
            .install(&v("1.18"), &v("1.17"), Path::new("go.tar.gz"))
            .unwrap_err();

        assert!(matches!(
            err,
            InstallError::Extraction {
                source: ExtractionError::SizeMismatch { .. },
                ..
            }
        ));
        assert_eq!(installer.state(), InstallState::Failed);
    }

    #[test]
    fn successful_install_reaches_done() {
        let mut installer = Installer::new(ScriptedFs::default(), "/opt");

        installer
            .install(&v("1.18"), &v("1.17"), Path::new("go.tar.gz"))
            .unwrap();

        assert_eq!(installer.state(), InstallState::Done);
        assert_eq!(installer.backend.extract_calls.get(), 1);
    }

    #[test]
    fn done_rejects_further_transitions() {
        let mut installer = Installer::new(ScriptedFs::default(), "/opt");
        installer
            .install(&v("1.18"), &RuntimeVersion::Unknown, Path::new("go.tar.gz"))
            .unwrap();

        let err = installer.remove_old(&v("1.18")).unwrap_err();
        assert!(matches!(
            err,
            InstallError::InvalidTransition {
                from: InstallState::Done,
                to: InstallState::RemovingOld
            }
        ));
        assert!(installer.extract_new(&v("1.18"), Path::new("x")).is_err());
        assert_eq!(installer.state(), InstallState::Done);
    }

    #[test]
    fn failed_is_absorbing() {
        let backend = ScriptedFs {
            removal_error: Some(io::ErrorKind::PermissionDenied),
            ..ScriptedFs::default()
        };
        let mut installer = Installer::new(backend, "/opt");
        let _ = installer.remove_old(&v("1.17"));

        assert!(installer.extract_new(&v("1.18"), Path::new("x")).is_err());
        assert_eq!(installer.state(), InstallState::Failed);
    }

    fn write_runtime_archive(path: &Path, files: &[(&str, &[u8])]) {
        let file = File::create(path).expect("Should create archive");
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, *data)
                .expect("Should append file");
        }
        builder
            .into_inner()
            .expect("Should finish tar")
            .finish()
            .expect("Should finish gzip");
    }

    #[test]
    fn install_replaces_existing_tree_on_disk() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("base");
        std::fs::create_dir_all(root.join("go/pkg/old")).unwrap();
        std::fs::write(root.join("go/VERSION"), "go1.17.8").unwrap();
        std::fs::write(root.join("go/pkg/old/stale.a"), "stale").unwrap();

        let archive = temp.path().join("go1.18.linux-amd64.tar.gz");
        write_runtime_archive(
            &archive,
            &[("go/VERSION", b"go1.18"), ("go/bin/go", b"new binary")],
        );

        let mut installer = Installer::new(LocalFs, &root);
        installer
            .install(&v("1.18"), &v("go1.17.8"), &archive)
            .expect("Should install");

        assert_eq!(installer.state(), InstallState::Done);
        let entries: Vec<_> = std::fs::read_dir(&root).unwrap().collect();
        assert_eq!(entries.len(), 1, "only the runtime directory should remain");
        assert_eq!(
            std::fs::read_to_string(root.join("go/VERSION")).unwrap(),
            "go1.18"
        );
        assert!(root.join("go/bin/go").is_file());
        assert!(!root.join("go/pkg").exists(), "old files must be gone");
    }

    #[test]
    fn local_fs_missing_tree_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let mut installer = Installer::new(LocalFs, temp.path().join("nothing-here"));

        installer.remove_old(&v("1.17")).expect("Should succeed");

        assert_eq!(installer.state(), InstallState::RemovingOld);
    }
}
