//! Candidate probing.
//!
//! A probe classifies one path: missing, implausibly small, unloadable, or
//! loaded. It is idempotent and side-effect-free beyond the load itself,
//! which is a process-wide one-shot (see `engine::loader`); the orchestrator
//! guarantees it probes to success at most once per execution.

use crate::config::InstallConfig;
use crate::engine::loader::{EngineLoader, LoadFailure, NativeLoader};
use crate::models::{read_version_marker, EngineVersion, ProbeFailure, ProbeResult};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Probes candidate paths through an [`EngineLoader`].
pub struct EngineProbe {
    loader: Arc<dyn EngineLoader>,
}

impl EngineProbe {
    pub fn new(loader: Arc<dyn EngineLoader>) -> Self {
        Self { loader }
    }

    /// Probe backed by the platform dynamic loader.
    pub fn native() -> Self {
        Self::new(Arc::new(NativeLoader))
    }

    /// Attempt to load the file at `path` and classify the outcome.
    ///
    /// Version extraction falls back in order: the engine's version export,
    /// then the version marker co-located with the file, then `"Unknown"`.
    pub fn probe(&self, path: &Path) -> ProbeResult {
        let failed = |failure: ProbeFailure| ProbeResult::Failed {
            path: path.to_path_buf(),
            failure,
        };

        let metadata = match std::fs::metadata(path) {
            Ok(m) if m.is_file() => m,
            _ => return failed(ProbeFailure::NotACandidate),
        };

        if metadata.len() < InstallConfig::MIN_PLAUSIBLE_LIB_SIZE {
            debug!(
                "Skipping {}: {} bytes is below the plausibility threshold",
                path.display(),
                metadata.len()
            );
            return failed(ProbeFailure::TooSmall {
                size_bytes: metadata.len(),
            });
        }

        match self.loader.load(path) {
            Ok(binary) => {
                let version = match binary.version_string() {
                    Some(raw) => EngineVersion::parse(raw),
                    None => path
                        .parent()
                        .and_then(read_version_marker)
                        .map(EngineVersion::parse)
                        .unwrap_or_else(EngineVersion::unknown),
                };
                debug!("Loaded {} (engine version {})", path.display(), version);
                ProbeResult::Loaded {
                    path: path.to_path_buf(),
                    binary,
                    version,
                }
            }
            Err(LoadFailure::BadImageFormat { message }) => {
                debug!("Skipping {}: {}", path.display(), message);
                failed(ProbeFailure::BadImageFormat { message })
            }
            Err(LoadFailure::Other { message }) => {
                debug!("Skipping {}: {}", path.display(), message);
                failed(ProbeFailure::LoadError { message })
            }
        }
    }
}
