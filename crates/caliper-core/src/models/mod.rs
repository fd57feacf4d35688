//! Data models shared across the resolver pipeline.

mod install;
mod probe;
mod release;

pub use install::{read_version_marker, write_version_marker, InstallationRecord};
pub use probe::{EngineVersion, ProbeFailure, ProbeResult};
pub use release::{GitHubAsset, GitHubRelease};
