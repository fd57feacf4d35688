//! Candidate path enumeration for the engine library.
//!
//! Builds the ordered list of filesystem locations a resolution attempt will
//! probe. Construction is pure: no existence checks, no I/O — the probe
//! decides later what each path actually is. Candidates are deduplicated by
//! exact path equality, preserving first-seen order, so overlapping inputs
//! (install dir == cwd, duplicate PATH entries) cost nothing and never
//! reorder the search.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Where a candidate path came from, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathOrigin {
    /// Explicit path supplied by the user.
    UserSpecified,
    /// The configured install directory.
    InstallDir,
    /// Directory containing the running executable.
    ExeDir,
    /// Directory containing the database file being reported on.
    DbDir,
    /// Process working directory.
    CurrentDir,
    /// An entry of the `PATH` environment variable.
    PathEntry,
    /// A platform well-known library directory.
    WellKnownDir,
}

/// A single location to probe for the engine library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePath {
    pub path: PathBuf,
    pub origin: PathOrigin,
}

/// Builder for the ordered candidate list.
#[derive(Debug, Default, Clone)]
pub struct CandidatePathBuilder {
    user_path: Option<PathBuf>,
    install_dir: Option<PathBuf>,
    exe_dir: Option<PathBuf>,
    db_dir: Option<PathBuf>,
    current_dir: Option<PathBuf>,
    path_entries: Vec<PathBuf>,
    well_known_dirs: Vec<PathBuf>,
    basenames: Vec<String>,
}

impl CandidatePathBuilder {
    /// Start from the given acceptable file basenames, most-preferred first.
    pub fn new<S: AsRef<str>>(basenames: &[S]) -> Self {
        Self {
            basenames: basenames.iter().map(|s| s.as_ref().to_string()).collect(),
            ..Self::default()
        }
    }

    /// Start from the platform's default basenames and ambient environment:
    /// executable directory, working directory, `PATH`, and the platform's
    /// well-known library directories.
    pub fn from_environment() -> Self {
        let mut builder = Self::new(crate::config::EngineConfig::library_basenames());
        builder.exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        builder.current_dir = std::env::current_dir().ok();
        builder.path_entries = std::env::var_os("PATH")
            .map(|raw| std::env::split_paths(&raw).collect())
            .unwrap_or_default();
        builder.well_known_dirs = well_known_dirs();
        builder
    }

    /// Explicit library file path supplied by the user. Used verbatim, ahead
    /// of everything else.
    pub fn user_path(mut self, path: Option<impl Into<PathBuf>>) -> Self {
        self.user_path = path.map(Into::into);
        self
    }

    pub fn install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = Some(dir.into());
        self
    }

    /// Directory of the database file being reported on, if known.
    pub fn db_dir(mut self, dir: Option<impl Into<PathBuf>>) -> Self {
        self.db_dir = dir.map(Into::into);
        self
    }

    pub fn exe_dir(mut self, dir: Option<impl Into<PathBuf>>) -> Self {
        self.exe_dir = dir.map(Into::into);
        self
    }

    pub fn current_dir(mut self, dir: Option<impl Into<PathBuf>>) -> Self {
        self.current_dir = dir.map(Into::into);
        self
    }

    pub fn path_entries<P: Into<PathBuf>>(mut self, entries: impl IntoIterator<Item = P>) -> Self {
        self.path_entries = entries.into_iter().map(Into::into).collect();
        self
    }

    pub fn well_known_dirs<P: Into<PathBuf>>(
        mut self,
        dirs: impl IntoIterator<Item = P>,
    ) -> Self {
        self.well_known_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Produce the ordered, deduplicated candidate list.
    pub fn build(&self) -> Vec<CandidatePath> {
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut candidates = Vec::new();

        let mut push = |path: PathBuf, origin: PathOrigin| {
            if seen.insert(path.clone()) {
                candidates.push(CandidatePath { path, origin });
            }
        };

        if let Some(ref user) = self.user_path {
            push(user.clone(), PathOrigin::UserSpecified);
        }

        let dirs_in_order = [
            (self.install_dir.as_deref(), PathOrigin::InstallDir),
            (self.exe_dir.as_deref(), PathOrigin::ExeDir),
            (self.db_dir.as_deref(), PathOrigin::DbDir),
            (self.current_dir.as_deref(), PathOrigin::CurrentDir),
        ];
        for (dir, origin) in dirs_in_order {
            if let Some(dir) = dir {
                for name in &self.basenames {
                    push(dir.join(name), origin);
                }
            }
        }

        for dir in &self.path_entries {
            for name in &self.basenames {
                push(dir.join(name), PathOrigin::PathEntry);
            }
        }
        for dir in &self.well_known_dirs {
            for name in &self.basenames {
                push(dir.join(name), PathOrigin::WellKnownDir);
            }
        }

        candidates
    }
}

/// Platform well-known library directories, in probe order.
fn well_known_dirs() -> Vec<PathBuf> {
    match std::env::consts::OS {
        "windows" => {
            let mut dirs_list = Vec::new();
            if let Some(programs) = std::env::var_os("ProgramFiles") {
                dirs_list.push(PathBuf::from(programs).join("ShaleDB"));
            }
            if let Some(local) = dirs::data_local_dir() {
                dirs_list.push(local.join("ShaleDB"));
            }
            dirs_list
        }
        "macos" => {
            let mut dirs_list = vec![
                PathBuf::from("/usr/local/lib"),
                PathBuf::from("/opt/homebrew/lib"),
            ];
            if let Some(home) = dirs::home_dir() {
                dirs_list.push(home.join(".local").join("lib"));
            }
            dirs_list
        }
        _ => {
            let mut dirs_list = vec![
                PathBuf::from("/usr/local/lib"),
                PathBuf::from("/usr/lib"),
            ];
            if let Some(home) = dirs::home_dir() {
                dirs_list.push(home.join(".local").join("lib"));
            }
            dirs_list
        }
    }
}
