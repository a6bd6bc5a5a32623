//! Validated configuration for one go-install invocation.
//!
//! `main` turns parsed arguments into an [`InstallConfig`]; nothing below the
//! command layer reads the environment or the command line directly.

use std::fmt;
use std::path::PathBuf;

use crate::errors::GoInstallError;
use crate::toolchain::Platform;

/// Distribution server used when none is configured.
pub const DEFAULT_DIST_SERVER: &str = "https://go.dev";

/// Build metadata baked in at compile time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    /// Package version; empty for ad-hoc builds.
    pub version: String,
    /// Git commit the binary was built from, if known.
    pub commit: Option<String>,
}

impl BuildInfo {
    /// Reads the metadata compiled into this binary.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            commit: option_env!("GO_INSTALL_GIT_COMMIT").map(String::from),
        }
    }

    /// Returns the version, or `[built from source]` when it is empty.
    #[must_use]
    pub fn display_version(&self) -> &str {
        if self.version.is_empty() {
            "[built from source]"
        } else {
            &self.version
        }
    }

    /// Returns the commit hash or `unknown`.
    #[must_use]
    pub fn commit_or_unknown(&self) -> &str {
        self.commit.as_deref().unwrap_or("unknown")
    }
}

/// Which release the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRequest {
    /// Whatever the listing shows first.
    Latest,
    /// A specific version such as `1.17.8`.
    Pinned(String),
}

impl VersionRequest {
    /// Parses user input; empty input and `latest` mean [`VersionRequest::Latest`].
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("latest") {
            Self::Latest
        } else {
            Self::Pinned(trimmed.to_string())
        }
    }

    /// Returns the string release resolution expects.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Latest => "latest",
            Self::Pinned(version) => version,
        }
    }
}

impl fmt::Display for VersionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the install workflow needs, already validated.
#[derive(Debug, Clone)]
pub struct InstallConfig {
    /// Directory holding the `go` runtime tree.
    pub root: PathBuf,
    /// Requested release.
    pub version: VersionRequest,
    /// Skip the confirmation prompt.
    pub assume_yes: bool,
    /// Reinstall even when the versions match.
    pub force: bool,
    /// Target OS/architecture.
    pub platform: Platform,
    /// Base URL of the distribution server, without a trailing slash.
    pub dist_server: String,
    /// Build metadata of this binary.
    pub build: BuildInfo,
}

impl InstallConfig {
    /// Validates raw values into a configuration.
    ///
    /// `os` and `arch` override the detected host platform individually.
    /// `build` is the metadata `main` read once at startup.
    ///
    /// # Errors
    ///
    /// Returns [`GoInstallError::InvalidArguments`] for an empty root or a
    /// malformed server URL, and [`GoInstallError::UnsupportedPlatform`] when
    /// the host cannot be mapped and no override is given.
    pub fn new(
        root: PathBuf,
        version: &str,
        os: Option<String>,
        arch: Option<String>,
        dist_server: &str,
        build: BuildInfo,
    ) -> Result<Self, GoInstallError> {
        if root.as_os_str().is_empty() {
            return Err(GoInstallError::invalid_arguments(
                "--go-base must not be empty",
            ));
        }

        let platform = match (os, arch) {
            (Some(os), Some(arch)) => Platform::new(os, arch),
            (os, arch) => {
                let host = Platform::detect()?;
                Platform::new(
                    os.unwrap_or_else(|| host.os().to_string()),
                    arch.unwrap_or_else(|| host.arch().to_string()),
                )
            }
        };

        let dist_server = dist_server.trim_end_matches('/');
        if reqwest::Url::parse(dist_server).is_err() {
            return Err(GoInstallError::invalid_arguments(format!(
                "invalid distribution server URL: {dist_server}"
            )));
        }

        Ok(Self {
            root,
            version: VersionRequest::parse(version),
            assume_yes: false,
            force: false,
            platform,
            dist_server: dist_server.to_string(),
            build,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_version_uses_package_version() {
        let build = BuildInfo {
            version: "0.1.0".to_string(),
            commit: None,
        };
        assert_eq!(build.display_version(), "0.1.0");
        assert_eq!(build.commit_or_unknown(), "unknown");
    }

    #[test]
    fn empty_version_is_built_from_source() {
        let build = BuildInfo {
            version: String::new(),
            commit: Some("abc123".to_string()),
        };
        assert_eq!(build.display_version(), "[built from source]");
        assert_eq!(build.commit_or_unknown(), "abc123");
    }

    #[test]
    fn from_env_uses_package_version() {
        assert_eq!(BuildInfo::from_env().version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn version_request_parsing() {
        assert_eq!(VersionRequest::parse(""), VersionRequest::Latest);
        assert_eq!(VersionRequest::parse("latest"), VersionRequest::Latest);
        assert_eq!(VersionRequest::parse("LATEST"), VersionRequest::Latest);
        assert_eq!(
            VersionRequest::parse(" 1.17.8 "),
            VersionRequest::Pinned("1.17.8".to_string())
        );
        assert_eq!(VersionRequest::Latest.as_str(), "latest");
    }

    #[test]
    fn explicit_platform_skips_detection() {
        let config = InstallConfig::new(
            PathBuf::from("/opt"),
            "1.18",
            Some("plan9".to_string()),
            Some("arm".to_string()),
            "https://example.com/",
            BuildInfo::from_env(),
        )
        .unwrap();

        assert_eq!(config.platform, Platform::new("plan9", "arm"));
        assert_eq!(config.dist_server, "https://example.com");
        assert_eq!(config.version, VersionRequest::Pinned("1.18".to_string()));
        assert!(!config.assume_yes);
        assert!(!config.force);
    }

    #[test]
    fn empty_root_is_rejected() {
        let err = InstallConfig::new(
            PathBuf::new(),
            "latest",
            Some("linux".to_string()),
            Some("amd64".to_string()),
            DEFAULT_DIST_SERVER,
            BuildInfo::from_env(),
        )
        .unwrap_err();
        assert!(matches!(err, GoInstallError::InvalidArguments { .. }));
    }

    #[test]
    fn malformed_server_is_rejected() {
        let err = InstallConfig::new(
            PathBuf::from("/opt"),
            "latest",
            Some("linux".to_string()),
            Some("amd64".to_string()),
            "not a url",
            BuildInfo::from_env(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not a url"));
    }
}
