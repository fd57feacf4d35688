//! Dynamic loading of the engine library.
//!
//! This module owns the process's only FFI boundary. Loading a shared
//! library is a process-wide, one-shot side effect: once mapped it cannot be
//! unmapped safely within this process's lifetime, so loaded binaries are
//! held for the life of the process and never released. The resolver
//! guarantees it loads at most one engine per execution.
//!
//! Everything above this module talks to the [`EngineLoader`] trait, so the
//! resolution pipeline can be exercised without a real dynamic loader.
#![allow(unsafe_code)]

use crate::config::EngineConfig;
use std::ffi::{c_char, CStr};
use std::path::Path;

/// A successfully loaded engine binary.
///
/// Opaque to the resolver beyond version reporting; the database driver
/// layer consumes it to construct connections.
pub trait EngineBinary: Send + Sync {
    /// Version string reported by the engine's version export, if present.
    fn version_string(&self) -> Option<String>;
}

/// Why a dynamic load failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadFailure {
    /// The loader rejected the file's architecture or container format.
    BadImageFormat { message: String },
    /// Any other loader failure.
    Other { message: String },
}

/// Seam over the platform dynamic loader.
pub trait EngineLoader: Send + Sync {
    /// Attempt to load the file at `path` as an engine binary.
    fn load(&self, path: &Path) -> Result<Box<dyn EngineBinary>, LoadFailure>;
}

/// [`EngineLoader`] backed by the platform dynamic loader.
#[derive(Debug, Default)]
pub struct NativeLoader;

impl EngineLoader for NativeLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn EngineBinary>, LoadFailure> {
        // SAFETY: loading a library runs its initialization routines. The
        // engine library is the artifact this whole pipeline exists to load;
        // candidates are plausibility-checked first and a failed load is
        // reported, not propagated as UB.
        let library = unsafe { libloading::Library::new(path) }
            .map_err(|e| classify_load_error(&e.to_string()))?;

        Ok(Box::new(NativeBinary { library }))
    }
}

struct NativeBinary {
    library: libloading::Library,
}

impl EngineBinary for NativeBinary {
    fn version_string(&self) -> Option<String> {
        type VersionFn = unsafe extern "C" fn() -> *const c_char;

        // SAFETY: the engine exports `shale_version` returning a pointer to
        // a static NUL-terminated string. A library without the export is
        // answered with None via the failed symbol lookup; a NULL return is
        // checked before dereferencing.
        unsafe {
            let symbol: libloading::Symbol<VersionFn> =
                self.library.get(EngineConfig::VERSION_SYMBOL).ok()?;
            let ptr = symbol();
            if ptr.is_null() {
                return None;
            }
            Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
        }
    }
}

/// Split loader failures into architecture/format mismatches and the rest.
///
/// The platform loaders report format problems only through message text,
/// so classification keys on the known phrasings (ELF on Linux, Mach-O on
/// macOS, the `%1` Win32 message on Windows).
fn classify_load_error(message: &str) -> LoadFailure {
    const FORMAT_MARKERS: &[&str] = &[
        "invalid elf header",
        "wrong elf class",
        "elfclass",
        "exec format error",
        "file too short",
        "incompatible architecture",
        "not a mach-o file",
        "not a valid win32 application",
        "%1 is not a valid",
        "is not a valid application",
    ];

    let lower = message.to_ascii_lowercase();
    if FORMAT_MARKERS.iter().any(|marker| lower.contains(marker)) {
        LoadFailure::BadImageFormat {
            message: message.to_string(),
        }
    } else {
        LoadFailure::Other {
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_classify_format_mismatches() {
        for message in [
            "/usr/lib/libshale.so: invalid ELF header",
            "libshale.so: wrong ELF class: ELFCLASS32",
            "dlopen(libshale.dylib): mach-o file, but is an incompatible architecture",
            "%1 is not a valid Win32 application. (os error 193)",
        ] {
            assert!(
                matches!(
                    classify_load_error(message),
                    LoadFailure::BadImageFormat { .. }
                ),
                "expected format mismatch for {:?}",
                message
            );
        }
    }

    #[test]
    fn test_classify_other_failures() {
        for message in [
            "libshale.so: cannot open shared object file: No such file or directory",
            "libm.so.6: version `GLIBC_2.38' not found",
        ] {
            assert!(matches!(
                classify_load_error(message),
                LoadFailure::Other { .. }
            ));
        }
    }

    #[test]
    fn test_native_loader_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(format!(
            "libgarbage{}",
            std::env::consts::DLL_SUFFIX
        ));
        std::fs::write(&path, vec![0u8; 4096]).unwrap();

        // The exact failure kind is platform-phrased; what matters is that
        // garbage never reports as loaded.
        assert!(NativeLoader.load(&path).is_err());
    }

    #[test]
    fn test_native_loader_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("libmissing.so");
        assert!(NativeLoader.load(&path).is_err());
    }
}
