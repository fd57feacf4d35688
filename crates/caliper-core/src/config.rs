//! Centralized configuration for the Caliper engine resolver.
//!
//! Constants for network behavior, installation policy, filesystem layout,
//! and the identity of the ShaleDB engine artifact.

use std::time::Duration;

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const MAX_RETRIES: u32 = 3;
    pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);
    pub const DOWNLOAD_PROGRESS_INTERVAL: Duration = Duration::from_millis(500);
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".part";
    pub const GITHUB_API_BASE: &'static str = "https://api.github.com";
    pub const GITHUB_API_VERSION: &'static str = "2022-11-28";
    pub const USER_AGENT: &'static str = "caliper-library";
    pub const ACCEPT_HEADER: &'static str = "application/vnd.github+json";
}

/// Installation and verification policy.
pub struct InstallConfig;

impl InstallConfig {
    /// Files smaller than this cannot plausibly be the engine library.
    pub const MIN_PLAUSIBLE_LIB_SIZE: u64 = 1024;
    /// Engine majors at or above this changed the on-disk record format and
    /// are not known to work with Caliper's schema mapping.
    pub const INCOMPATIBLE_MAJOR: u64 = 5;
    /// Cached downloads older than this are re-fetched.
    pub const CACHE_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);
}

/// Shared directory and file name configuration.
pub struct PathsConfig;

impl PathsConfig {
    pub const CACHE_DIR_NAME: &'static str = "cache";
    pub const EXTRACT_DIR_NAME: &'static str = "extract";
    pub const VERSION_MARKER_NAME: &'static str = "version.txt";
}

/// Identity of the ShaleDB engine artifact.
pub struct EngineConfig;

impl EngineConfig {
    /// GitHub repository publishing engine releases, `owner/name` form.
    pub const GITHUB_REPO: &'static str = "shaledb/shale-engine";
    /// Exported symbol returning the engine version as a C string.
    pub const VERSION_SYMBOL: &'static [u8] = b"shale_version\0";

    /// Acceptable library file names for the current platform,
    /// most-preferred first.
    pub fn library_basenames() -> &'static [&'static str] {
        match std::env::consts::OS {
            "windows" => &["shale.dll", "libshale.dll"],
            "macos" => &["libshale.dylib", "shale.dylib"],
            _ => &["libshale.so", "libshale.so.4", "shale.so"],
        }
    }

    /// Release-asset architecture label for the current machine.
    pub fn asset_arch() -> &'static str {
        match std::env::consts::ARCH {
            "x86_64" => "x64",
            "aarch64" => "arm64",
            other => other,
        }
    }

    /// Release-asset OS label for the current machine.
    pub fn asset_os() -> &'static str {
        match std::env::consts::OS {
            "windows" => "win",
            "macos" => "osx",
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basenames_non_empty() {
        let names = EngineConfig::library_basenames();
        assert!(!names.is_empty());
        // Most-preferred variant carries the plain library name.
        assert!(names[0].contains("shale"));
    }

    #[test]
    fn test_timeouts_are_reasonable() {
        assert!(NetworkConfig::REQUEST_TIMEOUT >= Duration::from_secs(1));
        assert!(InstallConfig::CACHE_MAX_AGE > Duration::from_secs(24 * 60 * 60));
    }

    #[test]
    fn test_version_symbol_is_nul_terminated() {
        assert_eq!(EngineConfig::VERSION_SYMBOL.last(), Some(&0u8));
    }
}
