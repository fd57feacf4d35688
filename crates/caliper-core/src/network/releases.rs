//! Release resolution and asset selection.
//!
//! Resolves a version tag (or `"latest"`) to a release descriptor through
//! the Releases API, with bounded retry on transient failures and a
//! list-all-releases fallback when the `latest` endpoint itself fails.
//! Asset selection applies an ordered glob preference with a smallest-size
//! tie break.

use crate::config::{EngineConfig, NetworkConfig};
use crate::error::{CaliperError, Result};
use crate::models::{GitHubAsset, GitHubRelease};
use crate::network::client::HttpClient;
use crate::network::retry::{retry_async, RetryConfig};
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use tracing::{debug, info, warn};

/// Source of release descriptors.
///
/// The orchestrator depends on this seam rather than on the concrete API
/// client, so resolution can be driven by a test double.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Resolve `version` (a concrete tag, or `"latest"`) to a release.
    async fn resolve(&self, version: &str) -> Result<GitHubRelease>;
}

/// Releases-API-backed [`ReleaseSource`].
pub struct ReleaseResolver {
    http: HttpClient,
    /// Repository in `owner/name` form.
    repo: String,
    retry: RetryConfig,
}

impl ReleaseResolver {
    /// Create a resolver for the given repository.
    pub fn new(repo: impl Into<String>, auth_token: Option<String>) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(auth_token)?,
            repo: repo.into(),
            retry: RetryConfig::new(),
        })
    }

    /// Create a resolver for the default engine repository.
    pub fn for_engine(auth_token: Option<String>) -> Result<Self> {
        Self::new(EngineConfig::GITHUB_REPO, auth_token)
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn release_url(&self, version: &str) -> String {
        if version.eq_ignore_ascii_case("latest") {
            format!(
                "{}/repos/{}/releases/latest",
                NetworkConfig::GITHUB_API_BASE,
                self.repo
            )
        } else {
            format!(
                "{}/repos/{}/releases/tags/{}",
                NetworkConfig::GITHUB_API_BASE,
                self.repo,
                version
            )
        }
    }

    fn listing_url(&self) -> String {
        format!(
            "{}/repos/{}/releases",
            NetworkConfig::GITHUB_API_BASE,
            self.repo
        )
    }

    /// One API round trip, with status classification but no retry.
    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        wanted_tag: &str,
    ) -> Result<T> {
        let response = self.http.get_api(url).await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CaliperError::ReleaseNotFound {
                tag: wanted_tag.to_string(),
                attempted: format!("GET {}", url),
            });
        }
        if !status.is_success() {
            return Err(CaliperError::ReleaseApi {
                message: format!("GET {} returned {}", url, status),
                status_code: Some(status.as_u16()),
            });
        }

        response.json::<T>().await.map_err(|e| CaliperError::Json {
            message: format!("Malformed release payload from {}: {}", url, e),
            source: None,
        })
    }

    async fn fetch_with_retry<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        wanted_tag: &str,
    ) -> Result<T> {
        let (result, stats) = retry_async(
            &self.retry,
            || self.fetch_json::<T>(url, wanted_tag),
            |e| e.is_retryable(),
        )
        .await;

        if stats.attempts > 1 {
            debug!(
                "Release request took {} attempt(s), {:?} total backoff",
                stats.attempts, stats.total_delay
            );
        }
        result
    }
}

#[async_trait]
impl ReleaseSource for ReleaseResolver {
    async fn resolve(&self, version: &str) -> Result<GitHubRelease> {
        let url = self.release_url(version);

        match self.fetch_with_retry::<GitHubRelease>(&url, version).await {
            Ok(release) => {
                info!("Resolved '{}' to release {}", version, release.tag_name);
                Ok(release)
            }
            Err(e) if version.eq_ignore_ascii_case("latest") => {
                // The latest endpoint can 404 on repos with only prereleases
                // and is occasionally flakier than the listing. Fall back to
                // the full listing and take the first stable entry in server
                // order (newest first).
                warn!("Latest-release endpoint failed ({}), falling back to listing", e);

                let listing_url = self.listing_url();
                let releases = self
                    .fetch_with_retry::<Vec<GitHubRelease>>(&listing_url, version)
                    .await
                    .map_err(|fallback_err| CaliperError::ReleaseNotFound {
                        tag: version.to_string(),
                        attempted: format!(
                            "GET {} (fallback listing after: {})",
                            listing_url, fallback_err
                        ),
                    })?;

                first_stable(&releases).cloned().ok_or_else(|| {
                    CaliperError::ReleaseNotFound {
                        tag: version.to_string(),
                        attempted: format!(
                            "GET {} (listing held no stable release)",
                            listing_url
                        ),
                    }
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// First non-prerelease entry in server-returned order.
fn first_stable(releases: &[GitHubRelease]) -> Option<&GitHubRelease> {
    releases.iter().find(|r| !r.prerelease)
}

/// Ordered glob preference over release asset names.
pub struct AssetSelector {
    patterns: Vec<Regex>,
}

impl AssetSelector {
    /// Build a selector from glob patterns (`*` and `?`), most-preferred
    /// first. Matching is case-insensitive over the full asset name.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        Self {
            patterns: patterns
                .iter()
                .filter_map(|p| match glob_to_regex(p.as_ref()) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!("Skipping unusable asset pattern {:?}: {}", p.as_ref(), e);
                        None
                    }
                })
                .collect(),
        }
    }

    /// Default preference for the current platform: the platform-specific
    /// engine archive, then the engine package, then generic archives, with
    /// source archives implicitly last (they only win as the final resort).
    pub fn platform_default() -> Self {
        let os = EngineConfig::asset_os();
        let arch = EngineConfig::asset_arch();
        Self::new(&[
            format!("shale-engine-{os}-{arch}*.zip"),
            format!("shale-engine-{os}-{arch}*.tar.gz"),
            format!("shale-engine-{os}-{arch}*.tgz"),
            "*.nupkg".to_string(),
            "*.zip".to_string(),
            "*.tar.gz".to_string(),
            "*.tgz".to_string(),
        ])
    }

    /// Pick the best-matching asset.
    ///
    /// First pattern with at least one match wins; among its matches the
    /// smallest asset is chosen (a compiled binary archive is smaller than a
    /// bundled source tree). With no pattern match at all, the first asset
    /// is returned as a last resort. `None` only for an empty asset list.
    pub fn select<'a>(&self, assets: &'a [GitHubAsset]) -> Option<&'a GitHubAsset> {
        for pattern in &self.patterns {
            let smallest = assets
                .iter()
                .filter(|a| pattern.is_match(&a.name))
                .min_by_key(|a| a.size);
            if let Some(asset) = smallest {
                return Some(asset);
            }
        }
        assets.first()
    }
}

/// Compile a glob (`*`, `?`) into an anchored case-insensitive regex.
fn glob_to_regex(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');

    RegexBuilder::new(&expr).case_insensitive(true).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(name: &str, size: u64) -> GitHubAsset {
        GitHubAsset {
            name: name.to_string(),
            size,
            download_url: format!("https://example.com/dl/{}", name),
        }
    }

    #[test]
    fn test_release_url_for_tag_and_latest() {
        let resolver = ReleaseResolver::new("shaledb/shale-engine", None).unwrap();
        assert_eq!(
            resolver.release_url("4.1.4"),
            "https://api.github.com/repos/shaledb/shale-engine/releases/tags/4.1.4"
        );
        assert_eq!(
            resolver.release_url("latest"),
            "https://api.github.com/repos/shaledb/shale-engine/releases/latest"
        );
        assert_eq!(
            resolver.listing_url(),
            "https://api.github.com/repos/shaledb/shale-engine/releases"
        );
    }

    #[test]
    fn test_first_stable_skips_prereleases() {
        let mut releases: Vec<GitHubRelease> = Vec::new();
        for (tag, pre) in [("5.0.0-rc.1", true), ("4.1.4", false), ("4.1.3", false)] {
            releases.push(GitHubRelease {
                tag_name: tag.to_string(),
                name: None,
                published_at: None,
                prerelease: pre,
                body: None,
                assets: vec![],
            });
        }

        assert_eq!(first_stable(&releases).unwrap().tag_name, "4.1.4");
        assert!(first_stable(&releases[..1]).is_none());
    }

    #[test]
    fn test_glob_matching() {
        let re = glob_to_regex("shale-engine-win-x64*.zip").unwrap();
        assert!(re.is_match("shale-engine-win-x64.zip"));
        assert!(re.is_match("Shale-Engine-Win-X64-4.1.4.zip"));
        assert!(!re.is_match("shale-engine-win-x64.tar.gz"));
        assert!(!re.is_match("prefix-shale-engine-win-x64.zip"));

        // Regex metacharacters in the glob are literal.
        let re = glob_to_regex("shale+engine.zip").unwrap();
        assert!(re.is_match("shale+engine.zip"));
        assert!(!re.is_match("shaleengine.zip"));
    }

    #[test]
    fn test_select_prefers_first_matching_pattern() {
        let selector = AssetSelector::new(&["*-win-x64*.zip", "*.zip", "*.tar.gz"]);
        let assets = vec![
            asset("x.tar.gz", 10),
            asset("x-win-x64.zip", 500),
            asset("x.zip", 20),
        ];

        let selected = selector.select(&assets).unwrap();
        assert_eq!(selected.name, "x-win-x64.zip");
    }

    #[test]
    fn test_select_breaks_ties_by_smallest_size() {
        let selector = AssetSelector::new(&["*.zip"]);
        let assets = vec![asset("bundle.zip", 100), asset("engine.zip", 50)];

        assert_eq!(selector.select(&assets).unwrap().name, "engine.zip");
    }

    #[test]
    fn test_select_falls_back_to_first_asset() {
        let selector = AssetSelector::new(&["*.zip"]);
        let assets = vec![asset("engine.tar.xz", 10), asset("engine.rar", 5)];

        assert_eq!(selector.select(&assets).unwrap().name, "engine.tar.xz");
    }

    #[test]
    fn test_select_empty_list_is_none() {
        let selector = AssetSelector::platform_default();
        assert!(selector.select(&[]).is_none());
    }
}
