//! Network side of the resolver pipeline.
//!
//! This module provides:
//! - Retry logic with exponential backoff
//! - HTTP client with the standard Releases API header set
//! - Release resolution and asset selection
//! - Asset download with a content-addressed cache and progress reporting

mod client;
mod download;
mod releases;
mod retry;

pub use client::{extract_domain, HttpClient};
pub use download::{CachingDownloader, DownloadProgress};
pub use releases::{AssetSelector, ReleaseResolver, ReleaseSource};
pub use retry::{retry_async, RetryConfig, RetryStats};
