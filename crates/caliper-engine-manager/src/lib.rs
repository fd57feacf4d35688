//! Caliper Engine Manager - resolution and installation of the ShaleDB
//! engine library.
//!
//! This crate composes the `caliper-library` components into the single
//! operation the rest of Caliper calls: ensure a loadable engine library is
//! available, installing one from the engine's GitHub releases if necessary.
//!
//! # Modules
//!
//! - `resolver` - The `ensure_installed` orchestration
//! - `installer` - Finalizing a verified library into the install directory
//!
//! # Example
//!
//! ```rust,ignore
//! use caliper_engine_manager::{EngineResolver, ResolveOptions};
//!
//! #[tokio::main]
//! async fn main() -> caliper_engine_manager::Result<()> {
//!     let resolver = EngineResolver::with_native(None)?;
//!     let handle = resolver
//!         .ensure_installed(&ResolveOptions::new("/opt/caliper"))
//!         .await?;
//!     println!("Engine {} at {}", handle.version(), handle.library_path().display());
//!     Ok(())
//! }
//! ```

pub mod installer;
pub mod resolver;

// Re-export commonly used types
pub use installer::EngineInstaller;
pub use resolver::{EngineHandle, EngineResolver, ResolveOptions};

// Re-export caliper-library types that are commonly needed with the manager
pub use caliper_library::error::{CaliperError, Result};
pub use caliper_library::models::{EngineVersion, InstallationRecord};
pub use caliper_library::network::DownloadProgress;
