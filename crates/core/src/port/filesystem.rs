// Filesystem Port
// Everything the pipeline needs from the filesystem, kept small for testability

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("IO error at {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Not found: {0}")]
    NotFound(PathBuf),
}

impl FsError {
    pub fn io(path: impl AsRef<Path>, err: impl std::fmt::Display) -> Self {
        FsError::Io {
            path: path.as_ref().to_path_buf(),
            message: err.to_string(),
        }
    }
}

/// Filesystem operations on subject and dataset directories
pub trait SubjectFs: Send + Sync {
    /// True if `path` exists (symlinks are followed)
    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Fully resolved target if `path` is a symlink, None otherwise
    fn read_link_target(&self, path: &Path) -> Result<Option<PathBuf>, FsError>;

    /// Remove a file or symlink if present; never follows the link
    fn remove_link(&self, path: &Path) -> Result<(), FsError>;

    /// Create a raw symlink at `target` pointing at `source`
    fn symlink(&self, source: &Path, target: &Path) -> Result<(), FsError>;

    /// Move `from` to `to` within one directory. A file or symlink at `to`
    /// is replaced; a link is never followed.
    fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError>;

    fn create_dir_all(&self, path: &Path) -> Result<(), FsError>;

    /// Immediate sub-directories of `path`, sorted by name
    fn list_dirs(&self, path: &Path) -> Result<Vec<PathBuf>, FsError>;

    /// Make a script runnable (mode 755)
    fn ensure_executable(&self, path: &Path) -> Result<(), FsError>;

    fn write_string(&self, path: &Path, contents: &str) -> Result<(), FsError>;

    /// Point `target` at `source`, replacing whatever `target` was.
    ///
    /// When `source` is itself a symlink the new link points at its resolved
    /// target, so links never chain.
    fn create_link(&self, source: &Path, target: &Path) -> Result<(), FsError> {
        self.remove_link(target)?;
        let resolved = self
            .read_link_target(source)?
            .unwrap_or_else(|| source.to_path_buf());
        self.symlink(&resolved, target)
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Mutex;

    /// Link resolution depth before a cycle is assumed
    const MAX_LINK_DEPTH: usize = 32;

    #[derive(Default)]
    struct State {
        files: BTreeSet<PathBuf>,
        dirs: BTreeSet<PathBuf>,
        links: BTreeMap<PathBuf, PathBuf>,
        executables: BTreeSet<PathBuf>,
        contents: BTreeMap<PathBuf, String>,
    }

    impl State {
        fn resolve(&self, path: &Path) -> Option<PathBuf> {
            let mut current = path.to_path_buf();
            for _ in 0..MAX_LINK_DEPTH {
                match self.links.get(&current) {
                    Some(next) => current = next.clone(),
                    None => return Some(current),
                }
            }
            None
        }
    }

    /// In-memory filesystem with explicit files, directories and symlinks
    #[derive(Default)]
    pub struct InMemoryFs {
        state: Mutex<State>,
    }

    impl InMemoryFs {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_file(&self, path: impl AsRef<Path>) {
            let path = path.as_ref();
            let mut state = self.state.lock().unwrap();
            state.links.remove(path);
            state.files.insert(path.to_path_buf());
        }

        pub fn add_dir(&self, path: impl AsRef<Path>) {
            let mut state = self.state.lock().unwrap();
            for ancestor in path.as_ref().ancestors() {
                if !ancestor.as_os_str().is_empty() {
                    state.dirs.insert(ancestor.to_path_buf());
                }
            }
        }

        pub fn add_link(&self, path: impl AsRef<Path>, target: impl AsRef<Path>) {
            let mut state = self.state.lock().unwrap();
            state.files.remove(path.as_ref());
            state
                .links
                .insert(path.as_ref().to_path_buf(), target.as_ref().to_path_buf());
        }

        /// Raw (unresolved) link target
        pub fn link_of(&self, path: impl AsRef<Path>) -> Option<PathBuf> {
            self.state.lock().unwrap().links.get(path.as_ref()).cloned()
        }

        pub fn is_regular_file(&self, path: impl AsRef<Path>) -> bool {
            self.state.lock().unwrap().files.contains(path.as_ref())
        }

        pub fn is_executable(&self, path: impl AsRef<Path>) -> bool {
            self.state
                .lock()
                .unwrap()
                .executables
                .contains(path.as_ref())
        }

        pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
            self.state.lock().unwrap().contents.get(path.as_ref()).cloned()
        }
    }

    impl SubjectFs for InMemoryFs {
        fn exists(&self, path: &Path) -> bool {
            let state = self.state.lock().unwrap();
            match state.resolve(path) {
                Some(p) => state.files.contains(&p) || state.dirs.contains(&p),
                None => false,
            }
        }

        fn is_dir(&self, path: &Path) -> bool {
            let state = self.state.lock().unwrap();
            state
                .resolve(path)
                .map(|p| state.dirs.contains(&p))
                .unwrap_or(false)
        }

        fn read_link_target(&self, path: &Path) -> Result<Option<PathBuf>, FsError> {
            let state = self.state.lock().unwrap();
            if !state.links.contains_key(path) {
                return Ok(None);
            }
            state
                .resolve(path)
                .map(Some)
                .ok_or_else(|| FsError::io(path, "too many levels of symbolic links"))
        }

        fn remove_link(&self, path: &Path) -> Result<(), FsError> {
            let mut state = self.state.lock().unwrap();
            state.links.remove(path);
            state.files.remove(path);
            Ok(())
        }

        fn symlink(&self, source: &Path, target: &Path) -> Result<(), FsError> {
            let mut state = self.state.lock().unwrap();
            if state.files.contains(target) || state.links.contains_key(target) {
                return Err(FsError::io(target, "File exists"));
            }
            state
                .links
                .insert(target.to_path_buf(), source.to_path_buf());
            Ok(())
        }

        fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError> {
            let mut state = self.state.lock().unwrap();
            if let Some(link) = state.links.remove(from) {
                state.files.remove(to);
                state.contents.remove(to);
                state.links.insert(to.to_path_buf(), link);
                return Ok(());
            }
            if !state.files.remove(from) {
                return Err(FsError::NotFound(from.to_path_buf()));
            }
            state.links.remove(to);
            state.files.insert(to.to_path_buf());
            match state.contents.remove(from) {
                Some(contents) => state.contents.insert(to.to_path_buf(), contents),
                None => state.contents.remove(to),
            };
            Ok(())
        }

        fn create_dir_all(&self, path: &Path) -> Result<(), FsError> {
            self.add_dir(path);
            Ok(())
        }

        fn list_dirs(&self, path: &Path) -> Result<Vec<PathBuf>, FsError> {
            let state = self.state.lock().unwrap();
            if !state.dirs.contains(path) {
                return Err(FsError::NotFound(path.to_path_buf()));
            }
            Ok(state
                .dirs
                .iter()
                .filter(|d| d.parent() == Some(path))
                .cloned()
                .collect())
        }

        fn ensure_executable(&self, path: &Path) -> Result<(), FsError> {
            if !self.exists(path) {
                return Err(FsError::NotFound(path.to_path_buf()));
            }
            self.state
                .lock()
                .unwrap()
                .executables
                .insert(path.to_path_buf());
            Ok(())
        }

        fn write_string(&self, path: &Path, contents: &str) -> Result<(), FsError> {
            let mut state = self.state.lock().unwrap();
            state.files.insert(path.to_path_buf());
            state
                .contents
                .insert(path.to_path_buf(), contents.to_string());
            Ok(())
        }
    }

}
