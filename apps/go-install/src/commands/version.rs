//! Version command for go-install.
//!
//! Prints the version of this binary. Verbose mode adds the commit and the
//! platform downloads are resolved for.

use std::io::{self, Write};

use anyhow::Result;

use crate::config::BuildInfo;
use crate::toolchain::Platform;

/// Executes the version command.
///
/// # Errors
///
/// Returns an error if stdout cannot be written.
pub fn execute(build: &BuildInfo, verbose: bool) -> Result<()> {
    write_version(&mut io::stdout(), build, verbose)?;
    Ok(())
}

fn write_version(out: &mut impl Write, build: &BuildInfo, verbose: bool) -> io::Result<()> {
    writeln!(out, "go-install v{}", build.display_version())?;
    if verbose {
        writeln!(out)?;
        writeln!(out, "Build Information:")?;
        writeln!(out, "  Commit:   {}", build.commit_or_unknown())?;
        writeln!(out, "  Platform: {}", platform_string())?;
    }
    Ok(())
}

/// Returns the Go platform name, or Rust's names if Go has no equivalent.
fn platform_string() -> String {
    Platform::detect().map_or_else(
        |_| format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
        |platform| platform.to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(build: &BuildInfo, verbose: bool) -> String {
        let mut out = Vec::new();
        write_version(&mut out, build, verbose).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn prints_package_version() {
        let build = BuildInfo {
            version: "0.3.1".to_string(),
            commit: None,
        };
        assert_eq!(render(&build, false), "go-install v0.3.1\n");
    }

    #[test]
    fn empty_version_is_built_from_source() {
        let build = BuildInfo {
            version: String::new(),
            commit: None,
        };
        assert_eq!(render(&build, false), "go-install v[built from source]\n");
    }

    #[test]
    fn verbose_adds_commit_and_platform() {
        let build = BuildInfo {
            version: "0.3.1".to_string(),
            commit: Some("deadbeef".to_string()),
        };
        let text = render(&build, true);
        assert!(text.contains("Commit:   deadbeef"));
        assert!(text.contains("Platform: "));
    }

    #[test]
    fn platform_string_is_not_empty() {
        assert!(platform_string().contains('-'));
    }
}
