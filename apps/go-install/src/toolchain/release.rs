//! Release resolution for go-install.
//!
//! Turns a requested version and a [`Platform`] into the URL of a concrete
//! download. The Go download page is treated as a flat, ordered list of
//! hyperlinks; resolution picks the first link whose target contains the
//! expected filename suffix.
//!
//! ## Listing order
//!
//! The download page is assumed to list the newest build first, so the first
//! match for `linux-amd64.tar.gz` is the latest release. This is a property of
//! the upstream page, not something this module checks. If the page ever
//! reorders its links, `latest` resolves to whatever is listed first.
//!
//! ## Data Source
//!
//! The listing is `{server}/dl/` where the server defaults to
//! `https://go.dev` and can be overridden with `GO_INSTALL_DIST_SERVER`.

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Url;

use super::platform::Platform;
use super::version::RuntimeVersion;
use crate::errors::{GoInstallError, TransferError};

/// Request timeout in seconds for fetching the listing page.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// User-Agent header for HTTP requests.
const USER_AGENT: &str = concat!("go-install/", env!("CARGO_PKG_VERSION"));

/// `href` attribute of an anchor tag, single or double quoted.
static HREF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s[^>]*?href\s*=\s*["']([^"']+)["']"#)
        .unwrap_or_else(|e| panic!("invalid href pattern: {e}"))
});

/// A downloadable archive for one OS/architecture/version combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    /// Absolute download URL.
    pub url: String,
    /// Go OS name the asset was resolved for.
    pub os_name: String,
    /// Go architecture name the asset was resolved for.
    pub arch_name: String,
    /// Version extracted from the asset filename.
    pub version: RuntimeVersion,
}

impl ReleaseAsset {
    /// Builds an asset from a resolved URL, extracting its version.
    #[must_use]
    pub fn new(url: String, platform: &Platform) -> Self {
        let version = RuntimeVersion::from_url(&url);
        Self {
            url,
            os_name: platform.os().to_string(),
            arch_name: platform.arch().to_string(),
            version,
        }
    }

    /// Extracts the filename from the URL (last path segment).
    ///
    /// Example: `"https://go.dev/dl/go1.22.1.linux-amd64.tar.gz"` -> `"go1.22.1.linux-amd64.tar.gz"`
    #[must_use]
    pub fn filename(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or(&self.url)
    }
}

/// Source of the ordered hyperlink targets on a listing page.
pub trait LinkLister {
    /// Returns every link target on the page at `url`, in document order.
    fn list_links(&self, url: &str)
    -> impl Future<Output = Result<Vec<String>, TransferError>> + Send;
}

/// Fetches the listing page over HTTP and scrapes its anchors.
pub struct HttpLinkLister {
    client: reqwest::Client,
}

impl HttpLinkLister {
    /// Creates a lister with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self, TransferError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|source| TransferError::Request {
                url: String::new(),
                source,
            })?;
        Ok(Self { client })
    }
}

impl LinkLister for HttpLinkLister {
    async fn list_links(&self, url: &str) -> Result<Vec<String>, TransferError> {
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|source| TransferError::Request {
                    url: url.to_string(),
                    source,
                })?;

        if !response.status().is_success() {
            return Err(TransferError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| TransferError::Body {
            url: url.to_string(),
            source,
        })?;

        Ok(extract_links(&body))
    }
}

/// Extracts `href` targets from HTML in document order.
#[must_use]
pub fn extract_links(html: &str) -> Vec<String> {
    HREF_PATTERN
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Returns the listing page URL for a distribution server.
#[must_use]
pub fn listing_url(dist_server: &str) -> String {
    format!("{}/dl/", dist_server.trim_end_matches('/'))
}

/// Returns `true` when `desired` asks for the newest release.
#[must_use]
pub fn is_latest(desired: &str) -> bool {
    let desired = desired.trim();
    desired.is_empty() || desired.eq_ignore_ascii_case("latest")
}

/// Strips the `v` or `go` prefix users put in front of version numbers.
#[must_use]
pub fn normalize_version(desired: &str) -> &str {
    let desired = desired.trim();
    desired
        .strip_prefix('v')
        .or_else(|| desired.strip_prefix("go"))
        .unwrap_or(desired)
}

/// Builds the filename suffix an asset link must contain.
///
/// `latest` (or an empty request) gives `{os}-{arch}.tar.gz`; a pinned
/// version gives `{version}.{os}-{arch}.tar.gz` with any leading `v` removed.
#[must_use]
pub fn asset_suffix(desired: &str, os: &str, arch: &str) -> String {
    if is_latest(desired) {
        format!("{os}-{arch}.tar.gz")
    } else {
        format!("{}.{os}-{arch}.tar.gz", normalize_version(desired))
    }
}

/// Checks whether `link` contains `suffix`.
///
/// For pinned versions the suffix must not be glued onto a longer version:
/// `1.2.linux-amd64.tar.gz` does not match `go1.21.2.linux-amd64.tar.gz`.
fn link_matches(link: &str, suffix: &str, pinned: bool) -> bool {
    if !pinned {
        return link.contains(suffix);
    }
    link.match_indices(suffix).any(|(start, _)| {
        link[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_ascii_digit() && c != '.')
    })
}

/// Resolves the download URL of the asset matching `desired` on `platform`.
///
/// Scans the links of the listing at `listing` and stops at the first match.
/// Relative links are resolved against the listing URL.
///
/// # Errors
///
/// Returns [`GoInstallError::ResolutionNotFound`] when no link contains the
/// suffix, or a transfer error when the listing cannot be fetched.
pub async fn resolve_asset_url<L: LinkLister>(
    lister: &L,
    listing: &str,
    desired: &str,
    platform: &Platform,
) -> Result<String, GoInstallError> {
    let suffix = asset_suffix(desired, platform.os(), platform.arch());
    let pinned = !is_latest(desired);
    tracing::info!("Looking for the {suffix} release on the server");

    let links = lister.list_links(listing).await?;
    let Some(link) = links
        .iter()
        .find(|link| link_matches(link, &suffix, pinned))
    else {
        return Err(GoInstallError::resolution_not_found(suffix));
    };

    Ok(absolutize(listing, link))
}

/// Resolves the full [`ReleaseAsset`] for `desired` on `platform`.
///
/// # Errors
///
/// See [`resolve_asset_url`].
pub async fn resolve_release<L: LinkLister>(
    lister: &L,
    listing: &str,
    desired: &str,
    platform: &Platform,
) -> Result<ReleaseAsset, GoInstallError> {
    let url = resolve_asset_url(lister, listing, desired, platform).await?;
    tracing::debug!("Resolved asset {url}");
    Ok(ReleaseAsset::new(url, platform))
}

/// Joins a possibly relative link onto the listing URL.
fn absolutize(listing: &str, link: &str) -> String {
    Url::parse(listing)
        .and_then(|base| base.join(link))
        .map_or_else(|_| link.to_string(), String::from)
}
