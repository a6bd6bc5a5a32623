//! Embeds the commit of the git checkout as `GO_INSTALL_GIT_COMMIT`.
//!
//! Outside a checkout nothing is set and the binary reports `unknown`.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=../../.git/HEAD");

    if let Some(commit) = short_head() {
        println!("cargo:rustc-env=GO_INSTALL_GIT_COMMIT={commit}");
    }
}

fn short_head() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }

    let hash = String::from_utf8(output.stdout).ok()?;
    let hash = hash.trim();
    (!hash.is_empty()).then(|| hash.to_string())
}
