//! Platform detection for go-install.
//!
//! Maps the host OS and architecture onto the names Go uses in its
//! distribution filenames (`go1.22.1.linux-amd64.tar.gz`).
//!
//! ## Supported Platforms
//!
//! - Operating systems: `linux`, `darwin`, `windows`, `freebsd`
//! - Architectures: `amd64`, `arm64`, `386`, `armv6l`, `ppc64le`, `s390x`,
//!   `riscv64`, `loong64`

use std::fmt;

use crate::errors::GoInstallError;

/// An OS/architecture pair spelled the way Go names its downloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    os: String,
    arch: String,
}

impl Platform {
    /// Creates a platform from explicit Go names.
    #[must_use]
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Detects the host platform from compile-time configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GoInstallError::UnsupportedPlatform`] if the host OS or
    /// architecture has no Go distribution name.
    pub fn detect() -> Result<Self, GoInstallError> {
        Self::from_rust(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Translates Rust's `std::env::consts` names into Go names.
    ///
    /// # Errors
    ///
    /// Returns [`GoInstallError::UnsupportedPlatform`] for unknown names.
    pub fn from_rust(os: &str, arch: &str) -> Result<Self, GoInstallError> {
        let unsupported = || GoInstallError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        };

        let go_os = match os {
            "linux" => "linux",
            "macos" => "darwin",
            "windows" => "windows",
            "freebsd" => "freebsd",
            _ => return Err(unsupported()),
        };

        let go_arch = match arch {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            "arm" => "armv6l",
            "powerpc64" => "ppc64le",
            "s390x" => "s390x",
            "riscv64" => "riscv64",
            "loongarch64" => "loong64",
            _ => return Err(unsupported()),
        };

        Ok(Self::new(go_os, go_arch))
    }

    /// Returns the Go OS name (`linux`, `darwin`, ...).
    #[must_use = "returns the OS string without side effects"]
    pub fn os(&self) -> &str {
        &self.os
    }

    /// Returns the Go architecture name (`amd64`, `arm64`, ...).
    #[must_use = "returns the architecture string without side effects"]
    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// Returns the executable file extension for this platform.
    ///
    /// Returns `.exe` on Windows, empty string everywhere else.
    #[must_use = "returns the extension string without side effects"]
    pub fn executable_extension(&self) -> &'static str {
        if self.is_windows() { ".exe" } else { "" }
    }

    /// Returns whether this platform is Windows.
    #[must_use = "returns platform check result without side effects"]
    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}
