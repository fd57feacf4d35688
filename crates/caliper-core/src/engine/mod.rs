//! Engine library location and loading.
//!
//! - `paths`: pure candidate path enumeration
//! - `loader`: the dynamic-loading FFI boundary, behind a trait seam
//! - `probe`: load attempt plus outcome classification

mod loader;
mod paths;
mod probe;

pub use loader::{EngineBinary, EngineLoader, LoadFailure, NativeLoader};
pub use paths::{CandidatePath, CandidatePathBuilder, PathOrigin};
pub use probe::EngineProbe;
