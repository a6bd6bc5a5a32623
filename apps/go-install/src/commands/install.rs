//! Install command for go-install.
//!
//! Replaces the Go runtime under `--go-base` with the requested release.
//!
//! ## Usage
//!
//! ```bash
//! go-install -g /usr/local              # Install the latest release
//! go-install install 1.17.8 -g ~/sdk    # Install a specific version
//! go-install -g /usr/local --yes        # Skip the confirmation prompt
//! ```

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::config::{BuildInfo, DEFAULT_DIST_SERVER, InstallConfig};
use crate::errors::GoInstallError;
use crate::toolchain::release::listing_url;
use crate::toolchain::{
    CommandProbe, HttpLinkLister, InstalledState, Installer, LinkLister, LocalFs, ReleaseAsset,
    UpgradeDecision, VersionProbe, detect_installed, fetch, format_progress, resolve_release,
};

/// Arguments for the install command.
#[derive(Args, Debug, Clone)]
pub struct InstallArgs {
    /// Version to install (e.g., "1.17.8" or "latest").
    #[clap(id = "runtime_version", value_name = "VERSION", default_value = "latest")]
    pub version: String,

    /// Directory the `go` runtime is installed under.
    #[clap(short = 'g', long = "go-base", env = "GO_BASE", required = true)]
    pub go_base: Option<PathBuf>,

    /// Install without asking for confirmation.
    #[clap(short = 'y', long = "yes", action = clap::ArgAction::SetTrue)]
    pub yes: bool,

    /// Reinstall even if the requested version is already installed.
    #[clap(long = "force", action = clap::ArgAction::SetTrue)]
    pub force: bool,

    /// Target operating system as Go names it (default: host).
    #[clap(long = "os")]
    pub os: Option<String>,

    /// Target architecture as Go names it (default: host).
    #[clap(long = "arch")]
    pub arch: Option<String>,

    /// Distribution server hosting the `/dl/` listing.
    #[clap(
        long = "dist-server",
        env = "GO_INSTALL_DIST_SERVER",
        default_value = DEFAULT_DIST_SERVER
    )]
    pub dist_server: String,
}

impl InstallArgs {
    /// Validates the arguments into an [`InstallConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`GoInstallError::InvalidArguments`] without a root, otherwise
    /// see [`InstallConfig::new`].
    pub fn into_config(self, build: BuildInfo) -> Result<InstallConfig, GoInstallError> {
        let root = self
            .go_base
            .ok_or_else(|| GoInstallError::invalid_arguments("--go-base is required"))?;
        let mut config = InstallConfig::new(
            root,
            &self.version,
            self.os,
            self.arch,
            &self.dist_server,
            build,
        )?;
        config.assume_yes = self.yes;
        config.force = self.force;
        Ok(config)
    }
}

/// How an install run ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The requested version is already installed.
    UpToDate(InstalledState),
    /// The user answered no at the prompt.
    Declined,
    /// The new runtime was installed; carries the re-probed state.
    Installed(InstalledState),
}

/// Executes the install command against the real network and filesystem.
///
/// Prints the installed version to stdout when the workflow finishes.
///
/// # Errors
///
/// Returns an error if resolution, download, removal or extraction fails.
pub async fn execute(config: &InstallConfig) -> Result<()> {
    let lister = HttpLinkLister::new()?;
    let probe = CommandProbe::new(&config.root, &config.platform);
    let stdin = io::stdin();

    let outcome = run(config, &lister, &probe, &mut stdin.lock(), &mut io::stdout()).await?;
    if let InstallOutcome::UpToDate(state) | InstallOutcome::Installed(state) = outcome {
        println!("{}", state.version);
    }
    Ok(())
}

/// Runs the full install workflow.
///
/// Resolves the asset, compares it to what `probe` reports, asks for
/// confirmation on `input`/`output` unless told not to, then downloads and
/// installs. The temporary archive is removed and the runtime re-probed
/// whether or not installation succeeded.
///
/// # Errors
///
/// Returns an error if any stage fails.
pub async fn run<L, P>(
    config: &InstallConfig,
    lister: &L,
    probe: &P,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<InstallOutcome>
where
    L: LinkLister,
    P: VersionProbe,
{
    tracing::debug!(
        "go-install v{} ({})",
        config.build.display_version(),
        config.build.commit_or_unknown()
    );

    let listing = listing_url(&config.dist_server);
    let asset = resolve_release(lister, &listing, config.version.as_str(), &config.platform).await?;

    tracing::debug!(
        "Resolved {} for {}-{}",
        asset.filename(),
        asset.os_name,
        asset.arch_name
    );

    let installed = detect_installed(probe, &config.root);
    let decision = UpgradeDecision::between(&asset.version, &installed.version);
    tracing::debug!(
        "Remote v{}, installed v{} under {}: {decision:?}",
        asset.version,
        installed.version,
        installed.root_path.display()
    );

    if !decision.needs_install() && !config.force {
        writeln!(output, "go v{} is already up to date", installed.version)?;
        return Ok(InstallOutcome::UpToDate(installed));
    }

    if !config.assume_yes {
        let question = format!("{} Would you like to proceed", summary(&asset, &installed));
        if !ask_for_confirmation(&question, input, output)? {
            return Ok(InstallOutcome::Declined);
        }
    }

    tracing::info!("Preparing to install v{}", asset.version);
    let archive = fetch(&asset.url, |snapshot| {
        let _ = write!(output, "\r{}", format_progress(snapshot));
        let _ = output.flush();
    })
    .await?;
    writeln!(output)?;

    let result = install_archive(config, &asset, &installed, archive.clone()).await;

    cleanup(&archive);
    let after = detect_installed(probe, &config.root);

    if let Err(e) = &result {
        tracing::warn!(
            "Installing v{} failed, {} now reports v{}: {e:#}",
            asset.version,
            after.root_path.display(),
            after.version
        );
    }
    result?;
    Ok(InstallOutcome::Installed(after))
}

/// Builds the `Installed: vX, Target: vY.` summary shown before the prompt.
fn summary(asset: &ReleaseAsset, installed: &InstalledState) -> String {
    let target = format!("Target: v{}", asset.version);
    if installed.is_installed() {
        format!("Installed: v{}, {target}.", installed.version)
    } else {
        format!("{target}.")
    }
}

/// Removes the old tree and extracts `archive` on the blocking pool.
async fn install_archive(
    config: &InstallConfig,
    asset: &ReleaseAsset,
    installed: &InstalledState,
    archive: PathBuf,
) -> Result<()> {
    let root = config.root.clone();
    let new_version = asset.version.clone();
    let current_version = installed.version.clone();

    tokio::task::spawn_blocking(move || {
        let mut installer = Installer::new(LocalFs, root);
        let result = installer.install(&new_version, &current_version, &archive);
        if result.is_err() {
            tracing::warn!("Installer stopped in state {}", installer.state());
        }
        result
    })
    .await
    .context("Installation task panicked")?
    .map_err(GoInstallError::from)
    .context("Installation failed")
}

/// Deletes the downloaded archive, logging instead of failing.
fn cleanup(archive: &std::path::Path) {
    tracing::info!("Removing {}", archive.display());
    if let Err(e) = std::fs::remove_file(archive) {
        tracing::warn!("Failed to remove {}: {e}", archive.display());
    }
}

/// Prompts with `question [y/n]?: ` until a recognised answer arrives.
///
/// Accepts `y`/`yes` and `n`/`no`/`q`/`quit`/`exit`, case-insensitively.
/// End of input counts as no.
///
/// # Errors
///
/// Returns an error if reading or writing fails.
pub fn ask_for_confirmation(
    question: &str,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> io::Result<bool> {
    let mut line = String::new();
    loop {
        write!(output, "{question} [y/n]?: ")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(false);
        }
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" | "q" | "quit" | "exit" => return Ok(false),
            _ => {}
        }
    }
}
