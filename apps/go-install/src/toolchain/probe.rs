//! Detection of the currently installed Go runtime.
//!
//! The installed version is whatever `<root>/go/bin/go version` prints. A `go`
//! elsewhere on `PATH` belongs to some other installation and is never asked.
//! A missing binary or any failure to run it means "not installed".

use std::path::{Path, PathBuf};
use std::process::Command;

use super::installer::RUNTIME_DIR;
use super::platform::Platform;
use super::version::{RuntimeVersion, extract_version};

/// The runtime found under an installation root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledState {
    /// Version reported by the runtime, or `Unknown` if none responded.
    pub version: RuntimeVersion,
    /// The installation root that was probed.
    pub root_path: PathBuf,
}

impl InstalledState {
    /// Returns `true` if a runtime reported a parseable version.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.version.is_known()
    }
}

/// Source of `go version` output.
pub trait VersionProbe {
    /// Runs the version query and returns its stdout, or `None` if no runtime
    /// could be run.
    fn probe_output(&self) -> Option<String>;
}

/// Probes by spawning the `go` binary.
#[derive(Debug, Clone)]
pub struct CommandProbe {
    root: PathBuf,
    executable_extension: &'static str,
}

impl CommandProbe {
    /// Creates a probe for the runtime under `root`.
    pub fn new(root: impl Into<PathBuf>, platform: &Platform) -> Self {
        Self {
            root: root.into(),
            executable_extension: platform.executable_extension(),
        }
    }

    /// Returns `<root>/go/bin/go` with the platform's executable extension.
    #[must_use]
    pub fn local_binary(&self) -> PathBuf {
        self.root
            .join(RUNTIME_DIR)
            .join("bin")
            .join(format!("go{}", self.executable_extension))
    }

    /// Finds an executable `go` in `<root>/go/bin` only.
    fn locate(&self) -> Option<PathBuf> {
        let bin_dir = self.root.join(RUNTIME_DIR).join("bin");
        match which::which_in("go", Some(&bin_dir), &self.root) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::debug!("No runtime at {}: {e}", self.local_binary().display());
                None
            }
        }
    }
}

impl VersionProbe for CommandProbe {
    fn probe_output(&self) -> Option<String> {
        let binary = self.locate()?;
        tracing::debug!("Querying {} for its version", binary.display());

        match Command::new(&binary).arg("version").output() {
            Ok(output) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(output) => {
                tracing::warn!(
                    "{} version exited with {}: {}",
                    binary.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                None
            }
            Err(e) => {
                tracing::warn!("Failed to run {}: {e}", binary.display());
                None
            }
        }
    }
}

/// Asks `probe` for the runtime version under `root`.
#[must_use]
pub fn detect_installed(probe: &impl VersionProbe, root: &Path) -> InstalledState {
    let version = probe
        .probe_output()
        .map_or(RuntimeVersion::Unknown, |output| extract_version(&output));

    InstalledState {
        version,
        root_path: root.to_path_buf(),
    }
}
