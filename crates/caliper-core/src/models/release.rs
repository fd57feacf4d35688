//! Release metadata types.
//!
//! Populated in a single deserialization step from the Releases API payload;
//! malformed payloads are rejected at the boundary instead of surfacing as
//! missing fields deeper in the pipeline.

use serde::{Deserialize, Serialize};

/// A single downloadable file attached to a release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubAsset {
    pub name: String,
    pub size: u64,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
}

/// A tagged, versioned publication bundling downloadable assets.
///
/// Immutable once fetched. Release descriptors are re-fetched on every run;
/// only the downloaded asset bytes are cached to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

impl GitHubRelease {
    /// Tag with any leading `v` stripped, for comparison against requested
    /// version strings.
    pub fn bare_tag(&self) -> &str {
        self.tag_name.strip_prefix('v').unwrap_or(&self.tag_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_deserializes_api_payload() {
        let json = r#"{
            "tag_name": "v4.1.4",
            "name": "ShaleDB engine 4.1.4",
            "published_at": "2024-03-01T00:00:00Z",
            "prerelease": false,
            "body": "Bug fixes",
            "assets": [
                {
                    "name": "shale-engine-linux-x64.tar.gz",
                    "size": 1048576,
                    "browser_download_url": "https://example.com/dl/shale-engine-linux-x64.tar.gz"
                }
            ]
        }"#;

        let release: GitHubRelease = serde_json::from_str(json).unwrap();
        assert_eq!(release.tag_name, "v4.1.4");
        assert_eq!(release.bare_tag(), "4.1.4");
        assert_eq!(release.assets.len(), 1);
        assert_eq!(release.assets[0].size, 1_048_576);
    }

    #[test]
    fn test_release_rejects_missing_tag() {
        let json = r#"{"assets": []}"#;
        assert!(serde_json::from_str::<GitHubRelease>(json).is_err());
    }

    #[test]
    fn test_release_tolerates_sparse_payload() {
        // Tag and assets are the only fields the pipeline relies on.
        let json = r#"{"tag_name": "4.0.0"}"#;
        let release: GitHubRelease = serde_json::from_str(json).unwrap();
        assert!(release.assets.is_empty());
        assert!(!release.prerelease);
    }
}
