//! Go runtime installation engine.
//!
//! Everything needed to get from "install version X" to an unpacked
//! `<root>/go` tree, independent of the command line.
//!
//! ## Module Structure
//!
//! - [`platform`] - OS and architecture names as Go spells them
//! - [`version`] - Version extraction and comparison
//! - [`release`] - Resolving a version to a download URL
//! - [`download`] - Streaming HTTP download with progress snapshots
//! - [`archive`] - tar.gz extraction with path traversal checks
//! - [`installer`] - Remove-then-extract state machine
//! - [`probe`] - Querying the installed runtime for its version

pub mod archive;
pub mod download;
pub mod installer;
pub mod platform;
pub mod probe;
pub mod release;
pub mod version;

pub use download::{fetch, format_progress};
pub use installer::{Installer, LocalFs};
pub use platform::Platform;
pub use probe::{CommandProbe, InstalledState, VersionProbe, detect_installed};
pub use release::{HttpLinkLister, LinkLister, ReleaseAsset, resolve_release};
pub use version::UpgradeDecision;
