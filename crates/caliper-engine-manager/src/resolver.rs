//! Engine resolution orchestration.
//!
//! `EngineResolver` composes the caliper-library components into one
//! idempotent `ensure_installed` operation: probe local candidates first,
//! then — if allowed — resolve a release, download, extract, probe the
//! extracted tree, and finalize the install. The loaded engine handle is
//! once-guarded and process-wide: it is acquired at most once and kept for
//! the process lifetime, never unloaded or replaced.

use crate::installer::EngineInstaller;
use caliper_library::archive;
use caliper_library::config::{EngineConfig, PathsConfig};
use caliper_library::engine::{CandidatePathBuilder, EngineLoader, EngineProbe};
use caliper_library::error::{CaliperError, Result};
use caliper_library::models::{EngineVersion, ProbeResult};
use caliper_library::network::{
    AssetSelector, CachingDownloader, DownloadProgress, ReleaseResolver, ReleaseSource,
};
use caliper_library::EngineBinary;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, OnceCell};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Inputs for one resolution attempt.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Explicit library file path, probed ahead of everything else.
    pub library_path: Option<PathBuf>,
    /// Directory installs land in; also hosts the download cache.
    pub install_dir: PathBuf,
    /// Database file being reported on; its directory joins the search.
    pub db_path: Option<PathBuf>,
    /// Release tag to install, or `"latest"`.
    pub version: String,
    /// Skip the local candidate search and reinstall from the release host.
    pub force: bool,
    /// Never auto-install; fail with `NotFound` if no local candidate loads.
    pub skip_install: bool,
    /// Download progress reporting channel. Absent = no progress output.
    pub progress: Option<mpsc::Sender<DownloadProgress>>,
}

impl ResolveOptions {
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            library_path: None,
            install_dir: install_dir.into(),
            db_path: None,
            version: "latest".to_string(),
            force: false,
            skip_install: false,
            progress: None,
        }
    }
}

/// A loaded engine library.
///
/// Opaque beyond version reporting; the database driver layer consumes the
/// binary to construct connections. Lives for the process lifetime.
pub struct EngineHandle {
    library_path: PathBuf,
    version: EngineVersion,
    binary: Box<dyn EngineBinary>,
}

impl EngineHandle {
    /// Durable location of the loaded library.
    pub fn library_path(&self) -> &Path {
        &self.library_path
    }

    pub fn version(&self) -> &EngineVersion {
        &self.version
    }

    pub fn binary(&self) -> &dyn EngineBinary {
        &*self.binary
    }
}

/// Orchestrates engine resolution and installation.
///
/// Holds the once-guarded process-wide handle; repeated `ensure_installed`
/// calls after a success return the same handle without probing again.
pub struct EngineResolver {
    probe: EngineProbe,
    releases: Arc<dyn ReleaseSource>,
    downloader: CachingDownloader,
    handle: OnceCell<Arc<EngineHandle>>,
}

impl EngineResolver {
    /// Compose a resolver from explicit collaborators.
    pub fn new(
        loader: Arc<dyn EngineLoader>,
        releases: Arc<dyn ReleaseSource>,
        downloader: CachingDownloader,
    ) -> Self {
        Self {
            probe: EngineProbe::new(loader),
            releases,
            downloader,
            handle: OnceCell::new(),
        }
    }

    /// Resolver backed by the platform loader and the engine's release
    /// repository.
    pub fn with_native(auth_token: Option<String>) -> Result<Self> {
        Ok(Self::new(
            Arc::new(caliper_library::engine::NativeLoader),
            Arc::new(ReleaseResolver::for_engine(auth_token)?),
            CachingDownloader::new()?,
        ))
    }

    /// The already-loaded handle, if any.
    pub fn loaded(&self) -> Option<Arc<EngineHandle>> {
        self.handle.get().cloned()
    }

    /// Ensure an engine library is loaded, installing one if necessary.
    ///
    /// Idempotent: once an engine is loaded in-process, every later call
    /// returns it immediately, `force` included — a mapped library cannot
    /// be replaced within this process's lifetime.
    pub async fn ensure_installed(&self, options: &ResolveOptions) -> Result<Arc<EngineHandle>> {
        self.handle
            .get_or_try_init(|| self.resolve(options))
            .await
            .map(Arc::clone)
    }

    async fn resolve(&self, options: &ResolveOptions) -> Result<Arc<EngineHandle>> {
        let mut searched: Vec<PathBuf> = Vec::new();

        if options.force {
            info!("Force reinstall requested, skipping local candidate search");
        } else if let Some(handle) = self.try_local_candidates(options, &mut searched) {
            return Ok(handle);
        }

        if options.skip_install {
            return Err(CaliperError::NotFound { searched });
        }

        self.install_from_release(options).await
    }

    /// Probe every local candidate in order, returning on the first load.
    fn try_local_candidates(
        &self,
        options: &ResolveOptions,
        searched: &mut Vec<PathBuf>,
    ) -> Option<Arc<EngineHandle>> {
        let candidates = CandidatePathBuilder::from_environment()
            .user_path(options.library_path.clone())
            .install_dir(&options.install_dir)
            .db_dir(
                options
                    .db_path
                    .as_deref()
                    .and_then(Path::parent)
                    .map(Path::to_path_buf),
            )
            .build();

        debug!("Probing {} local candidate location(s)", candidates.len());

        for candidate in candidates {
            match self.probe.probe(&candidate.path) {
                ProbeResult::Loaded {
                    path,
                    binary,
                    version,
                } => {
                    info!(
                        "Using existing engine at {} ({:?}, version {})",
                        path.display(),
                        candidate.origin,
                        version
                    );
                    return Some(self.finish(path, binary, version));
                }
                ProbeResult::Failed { path, failure } => {
                    debug!("Candidate {}: {}", path.display(), failure);
                    searched.push(path);
                }
            }
        }
        None
    }

    /// Resolve, download, extract, and install the engine from a release.
    async fn install_from_release(&self, options: &ResolveOptions) -> Result<Arc<EngineHandle>> {
        let release = self.releases.resolve(&options.version).await?;
        let tag = release.tag_name.clone();
        info!("Installing engine release {}", tag);

        let asset = AssetSelector::platform_default()
            .select(&release.assets)
            .ok_or_else(|| CaliperError::InstallFailed {
                message: format!("Release {} has no downloadable assets", tag),
            })?;
        info!("Selected asset {} ({} bytes)", asset.name, asset.size);

        let cache_dir = options.install_dir.join(PathsConfig::CACHE_DIR_NAME);
        let archive_path = self
            .downloader
            .download(asset, &cache_dir, options.progress.clone())
            .await?;

        // On extract failure the downloaded archive stays cached for manual
        // inspection; only the scratch directory is disposable.
        let extract_dir = options.install_dir.join(PathsConfig::EXTRACT_DIR_NAME);
        let extract_root = archive::extract(&archive_path, &extract_dir)?;

        let found = find_library_files(&extract_root);
        if found.is_empty() {
            return Err(CaliperError::InstallFailed {
                message: format!(
                    "Archive {} from release {} contained no engine library (looked for {:?})",
                    asset.name,
                    tag,
                    EngineConfig::library_basenames()
                ),
            });
        }

        let mut last_failure = None;
        for path in found {
            match self.probe.probe(&path) {
                ProbeResult::Loaded {
                    path,
                    binary,
                    version,
                } => {
                    let record = EngineInstaller::new(&options.install_dir).install(&path, &tag)?;
                    let _ = std::fs::remove_dir_all(&extract_dir);
                    return Ok(self.finish(record.library_path, binary, version));
                }
                ProbeResult::Failed { path, failure } => {
                    debug!("Extracted candidate {}: {}", path.display(), failure);
                    last_failure = Some(format!("{}: {}", path.display(), failure));
                }
            }
        }

        Err(CaliperError::InstallFailed {
            message: format!(
                "Downloaded and extracted release {} but no candidate loaded (last: {})",
                tag,
                last_failure.unwrap_or_else(|| "none probed".to_string())
            ),
        })
    }

    /// Wrap a loaded binary as the process-wide handle, surfacing any
    /// compatibility warning.
    fn finish(
        &self,
        library_path: PathBuf,
        binary: Box<dyn EngineBinary>,
        version: EngineVersion,
    ) -> Arc<EngineHandle> {
        if let Some(warning) = &version.compat_warning {
            warn!("{}", warning);
        }
        Arc::new(EngineHandle {
            library_path,
            version,
            binary,
        })
    }
}

/// Engine library files under an extraction root, shallowest first, then in
/// basename preference order.
fn find_library_files(root: &Path) -> Vec<PathBuf> {
    let basenames = EngineConfig::library_basenames();
    let name_rank = |path: &Path| {
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(|name| {
                basenames
                    .iter()
                    .position(|b| b.eq_ignore_ascii_case(name))
            })
    };

    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| name_rank(path).is_some())
        .collect();

    found.sort_by_key(|path| (path.components().count(), name_rank(path)));
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_options_default_to_latest_non_forced() {
        let options = ResolveOptions::new("/opt/caliper");
        assert_eq!(options.version, "latest");
        assert!(!options.force);
        assert!(!options.skip_install);
        assert!(options.library_path.is_none());
        assert!(options.progress.is_none());
    }

    #[test]
    fn test_find_library_files_prefers_shallow_entries() {
        let root = TempDir::new().unwrap();
        let lib = EngineConfig::library_basenames()[0];

        std::fs::create_dir_all(root.path().join("deep/nested")).unwrap();
        std::fs::write(root.path().join("deep/nested").join(lib), b"deep").unwrap();
        std::fs::write(root.path().join(lib), b"shallow").unwrap();
        std::fs::write(root.path().join("README.md"), b"docs").unwrap();

        let found = find_library_files(root.path());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0], root.path().join(lib));
    }

    #[test]
    fn test_find_library_files_ranks_preferred_basename_first() {
        let root = TempDir::new().unwrap();
        let basenames = EngineConfig::library_basenames();
        for name in basenames {
            std::fs::write(root.path().join(name), b"lib").unwrap();
        }

        let found = find_library_files(root.path());
        assert_eq!(found.len(), basenames.len());
        assert_eq!(found[0], root.path().join(basenames[0]));
    }

    #[test]
    fn test_find_library_files_empty_tree() {
        let root = TempDir::new().unwrap();
        assert!(find_library_files(root.path()).is_empty());
    }
}
