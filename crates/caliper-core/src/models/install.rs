//! Installation records and the on-disk version marker.

use crate::config::PathsConfig;
use crate::error::{CaliperError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Outcome of installing (or re-verifying) the engine library in the
/// install directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallationRecord {
    pub install_dir: PathBuf,
    pub library_path: PathBuf,
    /// Resolved release tag, as written to the version marker.
    pub version: String,
    /// Whether the installed library was confirmed loadable.
    pub valid: bool,
}

/// Write `<dir>/version.txt` containing the resolved tag on a single line.
///
/// Overwrites any previous marker. Returns the marker path.
pub fn write_version_marker(dir: &Path, tag: &str) -> Result<PathBuf> {
    let marker = dir.join(PathsConfig::VERSION_MARKER_NAME);
    std::fs::write(&marker, format!("{}\n", tag))
        .map_err(|e| CaliperError::io_with_path(e, &marker))?;
    Ok(marker)
}

/// Read the version marker co-located with an installed library, if any.
pub fn read_version_marker(dir: &Path) -> Option<String> {
    let marker = dir.join(PathsConfig::VERSION_MARKER_NAME);
    let contents = std::fs::read_to_string(marker).ok()?;
    let tag = contents.trim();
    if tag.is_empty() {
        None
    } else {
        Some(tag.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_marker_roundtrip() {
        let dir = TempDir::new().unwrap();
        let marker = write_version_marker(dir.path(), "4.1.4").unwrap();
        assert!(marker.ends_with("version.txt"));

        let contents = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(contents, "4.1.4\n");
        assert_eq!(read_version_marker(dir.path()), Some("4.1.4".to_string()));
    }

    #[test]
    fn test_marker_overwrites_previous_tag() {
        let dir = TempDir::new().unwrap();
        write_version_marker(dir.path(), "4.1.3").unwrap();
        write_version_marker(dir.path(), "4.1.4").unwrap();
        assert_eq!(read_version_marker(dir.path()), Some("4.1.4".to_string()));
    }

    #[test]
    fn test_missing_or_blank_marker() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read_version_marker(dir.path()), None);

        std::fs::write(dir.path().join("version.txt"), "  \n").unwrap();
        assert_eq!(read_version_marker(dir.path()), None);
    }
}
