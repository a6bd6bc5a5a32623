//! Command modules for the go-install CLI.
//!
//! - [`install`] - Download and install a Go runtime (the default command)
//! - [`version`] - Display version information

pub mod install;
pub mod version;
