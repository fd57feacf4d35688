//! Asset download with a content-addressed on-disk cache.
//!
//! Cache entries are keyed by hash(download URL + size) and trusted purely
//! by age: an entry younger than the max age is served without any network
//! round trip. This is a deliberate trust-the-cache-by-age policy, not
//! content verification — a rebuilt artifact published under the same tag
//! and size would be served stale until the entry expires.
//!
//! Downloads stream to a `.part` temp file and are renamed into place only
//! when complete, so a cache entry is never observed half-written. Failures
//! remove the partial file. This layer does not retry; that decision belongs
//! to the caller.

use crate::config::{InstallConfig, NetworkConfig};
use crate::error::{CaliperError, Result};
use crate::models::GitHubAsset;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info};

/// Snapshot of an in-flight download, sent on the progress channel.
///
/// Carries only what was observed; rates and estimates are derived on
/// demand, so a console reporter pays for exactly the figures it prints.
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    /// Bytes written so far.
    pub bytes_downloaded: u64,
    /// Expected total, when the server or the asset metadata reported one.
    pub total_bytes: Option<u64>,
    /// Time since the transfer started.
    pub elapsed: Duration,
}

impl DownloadProgress {
    /// Average transfer rate since the download started, in bytes/second.
    pub fn speed_bytes_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes_downloaded as f64 / secs
        } else {
            0.0
        }
    }

    /// Completion as a fraction in `[0, 1]`, when the total is known.
    pub fn fraction(&self) -> Option<f64> {
        let total = self.total_bytes?;
        (total > 0).then(|| (self.bytes_downloaded as f64 / total as f64).min(1.0))
    }

    /// Seconds until completion at the average rate so far.
    pub fn eta_seconds(&self) -> Option<f64> {
        let remaining = self.total_bytes?.checked_sub(self.bytes_downloaded)?;
        let speed = self.speed_bytes_per_sec();
        (remaining > 0 && speed > 0.0).then(|| remaining as f64 / speed)
    }
}

/// Downloader serving release assets from a local cache when fresh.
pub struct CachingDownloader {
    client: reqwest::Client,
    max_age: Duration,
    progress_interval: Duration,
}

impl CachingDownloader {
    /// Create a downloader with the default cache max age.
    ///
    /// The HTTP client has a connect timeout but no whole-request timeout:
    /// engine archives can take longer than any sane whole-request limit on
    /// slow links. Stalls are caught per chunk instead — each read must
    /// arrive within the per-attempt timeout.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(NetworkConfig::REQUEST_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| CaliperError::Network {
                message: format!("Failed to create download client: {}", e),
                source: Some(e),
            })?;

        Ok(Self {
            client,
            max_age: InstallConfig::CACHE_MAX_AGE,
            progress_interval: NetworkConfig::DOWNLOAD_PROGRESS_INTERVAL,
        })
    }

    /// Override the cache freshness window.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Cache file path for an asset: `<cache_dir>/<hash>.<ext>`.
    ///
    /// The key hashes URL + size, so a re-published asset with a different
    /// size lands in a new entry. The archive extension is preserved for
    /// the extractor's dispatch.
    pub fn cache_path(cache_dir: &Path, asset: &GitHubAsset) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(asset.download_url.as_bytes());
        hasher.update(asset.size.to_le_bytes());
        let digest = hex::encode(hasher.finalize());

        cache_dir.join(format!("{}.{}", &digest[..16], archive_extension(&asset.name)))
    }

    /// Download an asset into the cache, or return the existing fresh entry.
    pub async fn download(
        &self,
        asset: &GitHubAsset,
        cache_dir: &Path,
        progress_tx: Option<mpsc::Sender<DownloadProgress>>,
    ) -> Result<PathBuf> {
        let destination = Self::cache_path(cache_dir, asset);

        if self.is_fresh(&destination) {
            info!(
                "Serving {} from cache: {}",
                asset.name,
                destination.display()
            );
            return Ok(destination);
        }

        std::fs::create_dir_all(cache_dir)
            .map_err(|e| CaliperError::io_with_path(e, cache_dir))?;

        let temp_path = PathBuf::from(format!(
            "{}{}",
            destination.display(),
            NetworkConfig::DOWNLOAD_TEMP_SUFFIX
        ));

        let result = self
            .stream_to_file(asset, &temp_path, progress_tx)
            .await
            .and_then(|bytes| {
                std::fs::rename(&temp_path, &destination).map_err(|e| {
                    CaliperError::DownloadFailed {
                        url: asset.download_url.clone(),
                        message: format!("Failed to finalize cache entry: {}", e),
                    }
                })?;
                Ok(bytes)
            });

        match result {
            Ok(bytes) => {
                info!("Downloaded {} bytes to {}", bytes, destination.display());
                Ok(destination)
            }
            Err(e) => {
                let _ = std::fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }

    // Internal methods

    fn is_fresh(&self, entry: &Path) -> bool {
        let Ok(metadata) = std::fs::metadata(entry) else {
            return false;
        };
        let age = metadata
            .modified()
            .ok()
            .and_then(|m| m.elapsed().ok())
            .unwrap_or(Duration::MAX);

        if age <= self.max_age {
            true
        } else {
            debug!(
                "Cache entry {} is stale ({:?} old), re-downloading",
                entry.display(),
                age
            );
            false
        }
    }

    async fn stream_to_file(
        &self,
        asset: &GitHubAsset,
        temp_path: &Path,
        progress_tx: Option<mpsc::Sender<DownloadProgress>>,
    ) -> Result<u64> {
        let url = &asset.download_url;
        let download_failed = |message: String| CaliperError::DownloadFailed {
            url: url.clone(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| download_failed(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(download_failed(format!("Server returned {}", status)));
        }

        let total_bytes = response.content_length().or(Some(asset.size));
        let mut file = std::fs::File::create(temp_path)
            .map_err(|e| download_failed(format!("Failed to create temp file: {}", e)))?;

        let mut bytes_downloaded: u64 = 0;
        let started = Instant::now();
        let mut last_update = Instant::now();
        let mut stream = response.bytes_stream();

        let snapshot = |bytes_downloaded| DownloadProgress {
            bytes_downloaded,
            total_bytes,
            elapsed: started.elapsed(),
        };

        if let Some(ref tx) = progress_tx {
            let _ = tx.send(snapshot(0)).await;
        }

        loop {
            // Each chunk must arrive within the per-attempt timeout; a
            // mid-stream stall fails the download instead of hanging.
            let chunk = match timeout(NetworkConfig::REQUEST_TIMEOUT, stream.next()).await {
                Ok(Some(chunk)) => {
                    chunk.map_err(|e| download_failed(format!("Error reading stream: {}", e)))?
                }
                Ok(None) => break,
                Err(_) => {
                    return Err(download_failed(format!(
                        "Stalled for {:?} waiting for data",
                        NetworkConfig::REQUEST_TIMEOUT
                    )));
                }
            };
            file.write_all(&chunk)
                .map_err(|e| download_failed(format!("Failed to write temp file: {}", e)))?;
            bytes_downloaded += chunk.len() as u64;

            if last_update.elapsed() >= self.progress_interval {
                if let Some(ref tx) = progress_tx {
                    let _ = tx.send(snapshot(bytes_downloaded)).await;
                }
                last_update = Instant::now();
            }
        }

        file.flush()
            .map_err(|e| download_failed(format!("Failed to flush temp file: {}", e)))?;

        if asset.size > 0 && bytes_downloaded != asset.size {
            return Err(download_failed(format!(
                "Size mismatch: expected {} bytes, received {}",
                asset.size, bytes_downloaded
            )));
        }

        if let Some(tx) = progress_tx {
            let _ = tx.send(snapshot(bytes_downloaded)).await;
        }

        Ok(bytes_downloaded)
    }
}

/// Archive extension of an asset name, multi-part suffixes included,
/// normalized to lowercase. Extensionless names get `bin`.
fn archive_extension(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".tar.gz") {
        "tar.gz".to_string()
    } else {
        match lower.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_string(),
            _ => "bin".to_string(),
        }
    }
}
