//! Error types for the Caliper engine resolver.
//!
//! One taxonomy for the whole resolution pipeline. Per-candidate probe
//! failures are NOT errors — they are `ProbeFailure` values carried inside
//! [`crate::models::ProbeResult`] — so only outcomes that end a resolution
//! attempt appear here.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the Caliper library.
#[derive(Debug, Error)]
pub enum CaliperError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Rate limited by {service}, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    // Release resolution errors
    #[error("Release API error: {message}")]
    ReleaseApi {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Release not found: {tag} ({attempted})")]
    ReleaseNotFound {
        /// Requested tag, or `"latest"`.
        tag: String,
        /// What was attempted remotely, for diagnostics.
        attempted: String,
    },

    // Download errors
    #[error("Download failed for {url}: {message}")]
    DownloadFailed { url: String, message: String },

    // Archive errors
    #[error("Unsupported archive format: {archive}")]
    UnsupportedFormat { archive: PathBuf },

    #[error("Failed to extract {archive}: {message}")]
    ExtractFailed { archive: PathBuf, message: String },

    // Resolution errors
    #[error(
        "ShaleDB engine library not found. Searched {} location(s):\n{}",
        searched.len(),
        format_searched(searched)
    )]
    NotFound {
        /// Every path that was probed, in probe order.
        searched: Vec<PathBuf>,
    },

    #[error("Engine installation failed: {message}")]
    InstallFailed { message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for Caliper operations.
pub type Result<T> = std::result::Result<T, CaliperError>;

fn format_searched(searched: &[PathBuf]) -> String {
    searched
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

// Conversion implementations for common error types

impl From<std::io::Error> for CaliperError {
    fn from(err: std::io::Error) -> Self {
        CaliperError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for CaliperError {
    fn from(err: serde_json::Error) -> Self {
        CaliperError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for CaliperError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CaliperError::Timeout(crate::config::NetworkConfig::REQUEST_TIMEOUT)
        } else {
            CaliperError::Network {
                message: err.to_string(),
                source: Some(err),
            }
        }
    }
}

impl CaliperError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        CaliperError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Check if this error should trigger a retry.
    ///
    /// Only transient network conditions qualify; a 404 tag or a bad archive
    /// will not get better by asking again.
    pub fn is_retryable(&self) -> bool {
        match self {
            CaliperError::Network { .. }
            | CaliperError::Timeout(_)
            | CaliperError::RateLimited { .. } => true,
            CaliperError::ReleaseApi { status_code, .. } => {
                matches!(status_code, Some(408 | 429) | Some(500..=599))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CaliperError::ReleaseNotFound {
            tag: "4.1.4".into(),
            attempted: "GET releases/tags/4.1.4".into(),
        };
        assert_eq!(
            err.to_string(),
            "Release not found: 4.1.4 (GET releases/tags/4.1.4)"
        );
    }

    #[test]
    fn test_not_found_lists_every_path() {
        let err = CaliperError::NotFound {
            searched: vec![
                PathBuf::from("/opt/caliper/libshale.so"),
                PathBuf::from("/usr/local/lib/libshale.so"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 location(s)"));
        assert!(msg.contains("/opt/caliper/libshale.so"));
        assert!(msg.contains("/usr/local/lib/libshale.so"));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(CaliperError::Timeout(std::time::Duration::from_secs(5)).is_retryable());
        assert!(CaliperError::ReleaseApi {
            message: "server error".into(),
            status_code: Some(503),
        }
        .is_retryable());
        assert!(!CaliperError::ReleaseApi {
            message: "missing".into(),
            status_code: Some(404),
        }
        .is_retryable());
        assert!(!CaliperError::ReleaseNotFound {
            tag: "latest".into(),
            attempted: "listing".into(),
        }
        .is_retryable());
        assert!(!CaliperError::UnsupportedFormat {
            archive: PathBuf::from("engine.rar"),
        }
        .is_retryable());
    }
}
