//! Error types for the go-install CLI.
//!
//! Each stage of the install workflow has its own error enum so callers and
//! tests can match on the exact failure. The command layer wraps them in
//! `anyhow::Error`; every one of them is fatal to the invocation.

use std::path::PathBuf;
use thiserror::Error;

use crate::toolchain::installer::InstallState;

/// Top-level error kinds surfaced by the install command.
#[derive(Debug, Error)]
pub enum GoInstallError {
    /// No link on the listing page contained the expected asset suffix.
    #[error("{suffix} file was not found on the server")]
    ResolutionNotFound {
        /// The filename suffix that was searched for.
        suffix: String,
    },

    /// The archive could not be fetched.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Removing the old tree or extracting the new one failed.
    #[error(transparent)]
    Install(#[from] InstallError),

    /// Invalid command line arguments.
    #[error("invalid arguments: {message}")]
    InvalidArguments {
        /// Description of what was invalid.
        message: String,
    },

    /// The host OS/architecture has no Go distribution name.
    #[error("unsupported platform: {os} on {arch}")]
    UnsupportedPlatform {
        /// Host operating system as reported by Rust.
        os: String,
        /// Host architecture as reported by Rust.
        arch: String,
    },
}

impl GoInstallError {
    /// Creates a new `ResolutionNotFound` error.
    #[must_use]
    pub fn resolution_not_found(suffix: impl Into<String>) -> Self {
        Self::ResolutionNotFound {
            suffix: suffix.into(),
        }
    }

    /// Creates a new `InvalidArguments` error.
    #[must_use]
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }
}

/// Failures of the HTTP transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The request could not be sent or the connection failed.
    #[error("failed to connect to {url}")]
    Request {
        /// The URL being fetched.
        url: String,
        /// The underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-2xx status.
    #[error("HTTP error {status}: {url}")]
    Status {
        /// The URL being fetched.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The body stream failed mid-transfer.
    #[error("failed to read response body from {url}")]
    Body {
        /// The URL being fetched.
        url: String,
        /// The underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// The stream ended before `Content-Length` bytes arrived.
    #[error("transfer of {url} ended early: received {received} of {expected} bytes")]
    Truncated {
        /// The URL being fetched.
        url: String,
        /// Bytes actually received.
        received: u64,
        /// Bytes announced by the server.
        expected: u64,
    },

    /// Writing the temporary file failed.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O operation that failed.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The transfer task panicked or was aborted.
    #[error("transfer task failed: {message}")]
    Task {
        /// Description from the join error.
        message: String,
    },
}

impl TransferError {
    /// Creates a new `Io` error with context.
    #[must_use]
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }
}

/// Failures while unpacking an archive.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// A filesystem operation failed.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O operation that failed.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The archive stream itself is unreadable (bad gzip, bad tar header).
    #[error("corrupt archive {}", .path.display())]
    Archive {
        /// The archive being read.
        path: PathBuf,
        /// The underlying decode error.
        #[source]
        source: std::io::Error,
    },

    /// An entry would land outside the destination root.
    #[error("refusing to extract {}: entry resolves outside {}", .entry.display(), .root.display())]
    PathTraversal {
        /// The entry path as recorded in the archive.
        entry: PathBuf,
        /// The destination root.
        root: PathBuf,
    },

    /// Fewer (or more) bytes were written than the header declared.
    #[error("file size mismatch for {}: wrote {written}, wanted {expected}", .path.display())]
    SizeMismatch {
        /// The file that was being written.
        path: PathBuf,
        /// Size declared by the tar header.
        expected: u64,
        /// Bytes actually written.
        written: u64,
    },
}

impl ExtractionError {
    /// Creates a new `Io` error with context.
    #[must_use]
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }
}

/// Failures of the installation state machine.
#[derive(Debug, Error)]
pub enum InstallError {
    /// The old runtime tree exists but could not be deleted.
    #[error("failed to remove {}", .path.display())]
    Removal {
        /// The tree that could not be removed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Unpacking the new runtime failed after any old tree was removed.
    #[error(
        "failed to extract the runtime into {}; any previous installation has already been \
         removed, so no Go runtime is installed there until go-install is run again",
        .root.display()
    )]
    Extraction {
        /// The installation root.
        root: PathBuf,
        /// The extraction failure.
        #[source]
        source: ExtractionError,
    },

    /// A step was requested from a state that does not allow it.
    #[error("invalid install transition from {from} to {to}")]
    InvalidTransition {
        /// The current state.
        from: InstallState,
        /// The requested state.
        to: InstallState,
    },
}
