//! Finalizing an engine installation.
//!
//! Copies a verified library into the install directory, fixes permissions,
//! and writes the version marker the next run's probe will read. The load
//! verification itself happens before this step; the installer never loads.

use caliper_library::config::EngineConfig;
use caliper_library::error::{CaliperError, Result};
use caliper_library::models::{write_version_marker, InstallationRecord};
use std::path::{Path, PathBuf};
use tracing::info;

/// Installs a verified engine library into the install directory.
pub struct EngineInstaller {
    install_dir: PathBuf,
}

impl EngineInstaller {
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
        }
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Where the installed library lands: the platform's preferred basename
    /// inside the install directory.
    pub fn library_destination(&self) -> PathBuf {
        self.install_dir.join(EngineConfig::library_basenames()[0])
    }

    /// Copy `source` into the install directory and write the version marker.
    ///
    /// Overwrites any previous install. The source file must already have
    /// been verified loadable by the caller.
    pub fn install(&self, source: &Path, tag: &str) -> Result<InstallationRecord> {
        std::fs::create_dir_all(&self.install_dir)
            .map_err(|e| CaliperError::io_with_path(e, &self.install_dir))?;

        let destination = self.library_destination();
        if source != destination {
            std::fs::copy(source, &destination).map_err(|e| CaliperError::InstallFailed {
                message: format!(
                    "Failed to copy {} to {}: {}",
                    source.display(),
                    destination.display(),
                    e
                ),
            })?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&destination, std::fs::Permissions::from_mode(0o755))
                .map_err(|e| CaliperError::io_with_path(e, &destination))?;
        }

        write_version_marker(&self.install_dir, tag)?;
        info!(
            "Installed engine {} at {}",
            tag,
            destination.display()
        );

        Ok(InstallationRecord {
            install_dir: self.install_dir.clone(),
            library_path: destination,
            version: tag.to_string(),
            valid: true,
        })
    }
}
