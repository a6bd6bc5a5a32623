//! Runtime version parsing and comparison.
//!
//! Go reports versions in several free-form shapes: asset filenames
//! (`go1.17.8.linux-amd64.tar.gz`), `go version` output
//! (`go version go1.22 linux/amd64`) and user input (`v1.17`). All of them are
//! reduced to the first run of one to three dot-separated numbers.
//!
//! Comparison is numeric and pads missing components with zero, so `1.17`
//! and `1.17.0` are the same version.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// First dotted numeric run with one to three components.
static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+(?:\.\d+){0,2}").unwrap_or_else(|e| panic!("invalid version pattern: {e}"))
});

/// A Go runtime version, or the sentinel for "nothing parseable".
#[derive(Debug, Clone)]
pub enum RuntimeVersion {
    /// A version with one to three numeric components.
    Known {
        /// The substring the version was extracted from, e.g. `1.17`.
        text: String,
        /// Numeric components, zero-padded to three.
        components: [u64; 3],
    },
    /// No version could be extracted.
    Unknown,
}

impl RuntimeVersion {
    /// Returns `true` unless this is the `Unknown` sentinel.
    #[must_use]
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known { .. })
    }

    /// Converts a known version into a `semver::Version`, padding with zeros.
    #[must_use]
    pub fn as_semver(&self) -> Option<semver::Version> {
        match self {
            Self::Known { components, .. } => Some(semver::Version::new(
                components[0],
                components[1],
                components[2],
            )),
            Self::Unknown => None,
        }
    }

    /// Extracts the version embedded in an asset URL.
    ///
    /// Only the final path segment is scanned, so digits in the host name or
    /// port never leak into the result.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let filename = url.rsplit('/').next().unwrap_or(url);
        extract_version(filename)
    }
}

impl PartialEq for RuntimeVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RuntimeVersion {}

impl PartialOrd for RuntimeVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// `Unknown` sorts below every known version.
impl Ord for RuntimeVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.as_semver(), other.as_semver()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        }
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known { text, .. } => write!(f, "{text}"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Scans `text` for the first dotted numeric version.
///
/// Returns [`RuntimeVersion::Unknown`] when the text contains no digits.
/// Components too large for `u64` saturate instead of failing.
#[must_use]
pub fn extract_version(text: &str) -> RuntimeVersion {
    let Some(found) = VERSION_PATTERN.find(text) else {
        return RuntimeVersion::Unknown;
    };

    let mut components = [0u64; 3];
    for (slot, part) in components.iter_mut().zip(found.as_str().split('.')) {
        *slot = part.parse().unwrap_or(u64::MAX);
    }

    RuntimeVersion::Known {
        text: found.as_str().to_string(),
        components,
    }
}

/// Compares two versions numerically, component by component.
#[must_use]
pub fn compare(a: &RuntimeVersion, b: &RuntimeVersion) -> Ordering {
    a.cmp(b)
}

/// What installing `remote` over `installed` would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeDecision {
    /// Nothing is installed, or its version could not be read.
    NotInstalled,
    /// The installed version equals the remote one; no prompt is needed.
    UpToDate,
    /// The remote version is newer.
    Upgrade,
    /// The remote version is older (a pinned version was requested).
    Downgrade,
}

impl UpgradeDecision {
    /// Decides how `remote` relates to the `installed` version.
    #[must_use]
    pub fn between(remote: &RuntimeVersion, installed: &RuntimeVersion) -> Self {
        if !installed.is_known() {
            return Self::NotInstalled;
        }
        match compare(remote, installed) {
            Ordering::Equal => Self::UpToDate,
            Ordering::Greater => Self::Upgrade,
            Ordering::Less => Self::Downgrade,
        }
    }

    /// Returns `true` when an install should be offered.
    #[must_use]
    pub fn needs_install(self) -> bool {
        !matches!(self, Self::UpToDate)
    }
}
