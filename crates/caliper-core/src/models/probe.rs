//! Probe outcomes and engine version metadata.
//!
//! "Try this candidate, on failure move to the next" is modeled as a value,
//! not an error: every probe returns a [`ProbeResult`] and the orchestrator
//! branches on it. Only a resolution attempt that runs out of candidates
//! turns into a [`crate::error::CaliperError`].

use crate::config::InstallConfig;
use crate::engine::EngineBinary;
use semver::Version;
use std::fmt;
use std::path::PathBuf;

/// Engine version as reported by a loaded candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineVersion {
    /// Version string exactly as reported (or `"Unknown"`).
    pub raw: String,
    /// Parsed form, when the raw string is a usable semver.
    pub parsed: Option<Version>,
    /// Present when the major version is at or above the known-incompatible
    /// threshold. The library still loads; the caller decides whether to
    /// proceed.
    pub compat_warning: Option<String>,
}

impl EngineVersion {
    /// Parse a reported version string, leniently: a leading `v` is
    /// stripped and short forms (`4`, `4.1`) are padded to full semver.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let bare = raw.trim();
        let bare = bare.strip_prefix('v').unwrap_or(bare);

        let parsed = Version::parse(bare)
            .or_else(|_| Version::parse(&format!("{bare}.0")))
            .or_else(|_| Version::parse(&format!("{bare}.0.0")))
            .ok();

        let compat_warning = parsed.as_ref().and_then(|v| {
            (v.major >= InstallConfig::INCOMPATIBLE_MAJOR).then(|| {
                format!(
                    "Engine version {} has major version {}; Caliper's schema \
                     mapping targets {}.x and may not read this database correctly",
                    bare,
                    v.major,
                    InstallConfig::INCOMPATIBLE_MAJOR - 1
                )
            })
        });

        Self {
            raw: raw.trim().to_string(),
            parsed,
            compat_warning,
        }
    }

    /// Version of a candidate that reported nothing usable.
    pub fn unknown() -> Self {
        Self {
            raw: "Unknown".to_string(),
            parsed: None,
            compat_warning: None,
        }
    }

    pub fn major(&self) -> Option<u64> {
        self.parsed.as_ref().map(|v| v.major)
    }

    pub fn is_known_incompatible(&self) -> bool {
        self.compat_warning.is_some()
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Why a candidate did not become the loaded engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    /// The path does not exist as a file. Not a true failure, just "skip".
    NotACandidate,
    /// The file exists but is too small to plausibly be the engine library.
    TooSmall { size_bytes: u64 },
    /// The loader rejected the file's architecture or container format.
    BadImageFormat { message: String },
    /// The load failed for any other reason.
    LoadError { message: String },
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeFailure::NotACandidate => write!(f, "not present"),
            ProbeFailure::TooSmall { size_bytes } => write!(
                f,
                "too small to be the engine library ({} bytes, need {})",
                size_bytes,
                InstallConfig::MIN_PLAUSIBLE_LIB_SIZE
            ),
            ProbeFailure::BadImageFormat { message } => {
                write!(f, "architecture/format mismatch: {}", message)
            }
            ProbeFailure::LoadError { message } => write!(f, "load failed: {}", message),
        }
    }
}

/// Outcome of probing one candidate path.
///
/// On success the caller owns the loaded binary. The load is a process-wide
/// one-shot side effect; see `engine::loader`.
pub enum ProbeResult {
    Loaded {
        path: PathBuf,
        binary: Box<dyn EngineBinary>,
        version: EngineVersion,
    },
    Failed {
        path: PathBuf,
        failure: ProbeFailure,
    },
}

impl ProbeResult {
    pub fn path(&self) -> &PathBuf {
        match self {
            ProbeResult::Loaded { path, .. } | ProbeResult::Failed { path, .. } => path,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, ProbeResult::Loaded { .. })
    }
}

impl fmt::Debug for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeResult::Loaded { path, version, .. } => f
                .debug_struct("Loaded")
                .field("path", path)
                .field("version", &version.raw)
                .finish_non_exhaustive(),
            ProbeResult::Failed { path, failure } => f
                .debug_struct("Failed")
                .field("path", path)
                .field("failure", failure)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_leading_v() {
        let version = EngineVersion::parse("v4.1.4");
        assert_eq!(version.raw, "v4.1.4");
        assert_eq!(version.major(), Some(4));
        assert!(!version.is_known_incompatible());
    }

    #[test]
    fn test_parse_pads_short_forms() {
        assert_eq!(EngineVersion::parse("4.1").major(), Some(4));
        assert_eq!(EngineVersion::parse("4").major(), Some(4));
    }

    #[test]
    fn test_unparseable_version_has_no_major() {
        let version = EngineVersion::parse("trunk-build");
        assert_eq!(version.parsed, None);
        assert_eq!(version.major(), None);
        assert!(!version.is_known_incompatible());
    }

    #[test]
    fn test_incompatible_major_attaches_warning() {
        let version = EngineVersion::parse("5.0.0");
        assert!(version.is_known_incompatible());
        assert!(version.compat_warning.as_ref().unwrap().contains("major version 5"));

        assert!(!EngineVersion::parse("4.9.9").is_known_incompatible());
    }

    #[test]
    fn test_unknown_displays_as_unknown() {
        let version = EngineVersion::unknown();
        assert_eq!(version.to_string(), "Unknown");
        assert_eq!(version.major(), None);
    }

    #[test]
    fn test_failure_display_carries_detail() {
        let failure = ProbeFailure::TooSmall { size_bytes: 12 };
        assert!(failure.to_string().contains("12 bytes"));

        let failure = ProbeFailure::BadImageFormat {
            message: "wrong ELF class".into(),
        };
        assert!(failure.to_string().contains("wrong ELF class"));
    }
}
