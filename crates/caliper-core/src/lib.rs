//! Caliper Library - headless resolver components for the ShaleDB engine.
//!
//! Caliper is a reporting CLI over ShaleDB databases; the database engine
//! itself is a native shared library published on GitHub releases. This
//! crate provides the leaf components that locate, fetch, and load that
//! library: candidate path enumeration, dynamic-load probing, release
//! resolution, asset selection, cached downloads, and archive extraction.
//!
//! The orchestration of these pieces into one "ensure installed" operation
//! lives in the `caliper-engine-manager` crate.
//!
//! # Example
//!
//! ```rust,ignore
//! use caliper_library::engine::{CandidatePathBuilder, EngineProbe};
//!
//! let probe = EngineProbe::native();
//! let candidates = CandidatePathBuilder::from_environment()
//!     .install_dir("/opt/caliper")
//!     .build();
//! for candidate in &candidates {
//!     if probe.probe(&candidate.path).is_loaded() {
//!         println!("Engine found at {}", candidate.path.display());
//!         break;
//!     }
//! }
//! ```

pub mod archive;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod network;

// Re-export commonly used types
pub use engine::{
    CandidatePath, CandidatePathBuilder, EngineBinary, EngineLoader, EngineProbe, LoadFailure,
    NativeLoader, PathOrigin,
};
pub use error::{CaliperError, Result};
pub use models::{
    EngineVersion, GitHubAsset, GitHubRelease, InstallationRecord, ProbeFailure, ProbeResult,
};
pub use network::{
    AssetSelector, CachingDownloader, DownloadProgress, ReleaseResolver, ReleaseSource,
};
