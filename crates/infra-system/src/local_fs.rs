// Local filesystem adapter (std::fs)

use mtlseg_core::port::{FsError, SubjectFs};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

impl SubjectFs for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_link_target(&self, path: &Path) -> Result<Option<PathBuf>, FsError> {
        let metadata = match fs::symlink_metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(FsError::io(path, e)),
        };

        if !metadata.file_type().is_symlink() {
            return Ok(None);
        }

        // canonicalize follows the whole chain, like realpath(3)
        fs::canonicalize(path)
            .map(Some)
            .map_err(|e| FsError::io(path, e))
    }

    fn remove_link(&self, path: &Path) -> Result<(), FsError> {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "Removed existing link or file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FsError::io(path, e)),
        }
    }

    fn symlink(&self, source: &Path, target: &Path) -> Result<(), FsError> {
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(source, target).map_err(|e| FsError::io(target, e))
        }

        #[cfg(windows)]
        {
            std::os::windows::fs::symlink_file(source, target).map_err(|e| FsError::io(target, e))
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        fs::rename(from, to).map_err(|e| match e.kind() {
            ErrorKind::NotFound => FsError::NotFound(from.to_path_buf()),
            _ => FsError::io(from, e),
        })?;
        debug!(from = %from.display(), to = %to.display(), "Renamed");
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), FsError> {
        fs::create_dir_all(path).map_err(|e| FsError::io(path, e))
    }

    fn list_dirs(&self, path: &Path) -> Result<Vec<PathBuf>, FsError> {
        let entries = fs::read_dir(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => FsError::NotFound(path.to_path_buf()),
            _ => FsError::io(path, e),
        })?;

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FsError::io(path, e))?;
            let entry_path = entry.path();
            if entry_path.is_dir() {
                dirs.push(entry_path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    fn ensure_executable(&self, path: &Path) -> Result<(), FsError> {
        if !path.exists() {
            return Err(FsError::NotFound(path.to_path_buf()));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o755))
                .map_err(|e| FsError::io(path, e))?;
        }

        Ok(())
    }

    fn write_string(&self, path: &Path, contents: &str) -> Result<(), FsError> {
        fs::write(path, contents).map_err(|e| FsError::io(path, e))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    #[test]
    fn test_create_link_replaces_regular_file() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("raw.nii.gz");
        let target = dir.path().join("image.nii.gz");
        fs::write(&source, b"raw").unwrap();
        fs::write(&target, b"stale").unwrap();

        LocalFs.create_link(&source, &target).unwrap();

        assert!(fs::symlink_metadata(&target).unwrap().file_type().is_symlink());
        assert_eq!(fs::read(&target).unwrap(), b"raw");
    }

    #[test]
    fn test_create_link_resolves_linked_source() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("raw.nii.gz");
        let stage = dir.path().join("stage.nii.gz");
        let target = dir.path().join("image.nii.gz");
        fs::write(&raw, b"raw").unwrap();
        std::os::unix::fs::symlink(&raw, &stage).unwrap();

        LocalFs.create_link(&stage, &target).unwrap();

        assert_eq!(
            fs::read_link(&target).unwrap(),
            fs::canonicalize(&raw).unwrap()
        );
    }

    #[test]
    fn test_read_link_target_of_regular_file_is_none() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.nii.gz");
        fs::write(&file, b"a").unwrap();

        assert_eq!(LocalFs.read_link_target(&file).unwrap(), None);
        assert_eq!(
            LocalFs
                .read_link_target(&dir.path().join("missing"))
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_remove_link_keeps_link_target() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("raw.nii.gz");
        let link = dir.path().join("image.nii.gz");
        fs::write(&raw, b"raw").unwrap();
        std::os::unix::fs::symlink(&raw, &link).unwrap();

        LocalFs.remove_link(&link).unwrap();
        LocalFs.remove_link(&link).unwrap();

        assert!(!link.exists());
        assert!(raw.exists());
    }

    #[test]
    fn test_rename_over_link_keeps_link_target() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("raw.nii.gz");
        let link = dir.path().join("image.nii.gz");
        let oriented = dir.path().join("image.orient.nii.gz");
        fs::write(&raw, b"raw").unwrap();
        fs::write(&oriented, b"oriented").unwrap();
        std::os::unix::fs::symlink(&raw, &link).unwrap();

        LocalFs.rename(&oriented, &link).unwrap();

        assert!(!fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read(&link).unwrap(), b"oriented");
        assert_eq!(fs::read(&raw).unwrap(), b"raw");
        assert!(!oriented.exists());
        assert!(matches!(
            LocalFs.rename(&oriented, &link),
            Err(FsError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_dirs_sorted_and_directories_only() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub02")).unwrap();
        fs::create_dir(dir.path().join("sub01")).unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let dirs = LocalFs.list_dirs(dir.path()).unwrap();

        assert_eq!(
            dirs,
            vec![dir.path().join("sub01"), dir.path().join("sub02")]
        );
        assert!(matches!(
            LocalFs.list_dirs(&dir.path().join("missing")),
            Err(FsError::NotFound(_))
        ));
    }

    #[test]
    fn test_ensure_executable() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("trim_neck.sh");
        fs::write(&script, b"#!/bin/sh\n").unwrap();

        LocalFs.ensure_executable(&script).unwrap();

        let mode = fs::metadata(&script).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
