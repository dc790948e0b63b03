//! The slice of an emulator the resolvers need to see.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::unsync::OnceCell;

use crate::{ResolveError, Result};

/// The emulator context a resolution runs in.
pub trait Emulator {
    /// Pointer width of the emulated process, in bytes (4 or 8).
    fn pointer_size(&self) -> usize;

    /// The host directory standing in for the emulated filesystem root.
    fn root_dir(&self) -> &Path;

    /// Get the process' working directory on the host, creating it on first
    /// use.
    fn create_work_dir(&self) -> Result<PathBuf>;

    fn is_64bit(&self) -> bool {
        self.pointer_size() == 8
    }
}

impl<E: Emulator + ?Sized> Emulator for &E {
    fn pointer_size(&self) -> usize {
        (**self).pointer_size()
    }

    fn root_dir(&self) -> &Path {
        (**self).root_dir()
    }

    fn create_work_dir(&self) -> Result<PathBuf> {
        (**self).create_work_dir()
    }
}

/// An [`Emulator`] backed by a directory on the host.
#[derive(Debug)]
pub struct SandboxEmulator {
    root: PathBuf,
    pointer_size: usize,
    work_dir: String,
    created_work_dir: OnceCell<PathBuf>,
}

impl SandboxEmulator {
    /// Where Android processes start out.
    pub const DEFAULT_WORK_DIR: &'static str = "/data";

    pub fn new(root: impl Into<PathBuf>, pointer_size: usize) -> Self {
        SandboxEmulator {
            root: root.into(),
            pointer_size,
            work_dir: SandboxEmulator::DEFAULT_WORK_DIR.to_string(),
            created_work_dir: OnceCell::new(),
        }
    }

    /// Use a different working directory, given as an emulated path.
    pub fn with_work_dir(self, work_dir: impl Into<String>) -> Self {
        SandboxEmulator {
            work_dir: work_dir.into(),
            created_work_dir: OnceCell::new(),
            ..self
        }
    }
}

impl Emulator for SandboxEmulator {
    fn pointer_size(&self) -> usize {
        self.pointer_size
    }

    fn root_dir(&self) -> &Path {
        &self.root
    }

    fn create_work_dir(&self) -> Result<PathBuf> {
        self.created_work_dir
            .get_or_try_init(|| {
                let dir = self.root.join(self.work_dir.trim_start_matches('/'));
                if !dir.exists() {
                    fs::create_dir_all(&dir).map_err(|e| ResolveError::create_dir(&dir, e))?;
                    tracing::debug!(dir=%dir.display(), "Created the working directory");
                }
                Ok(dir)
            })
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_dir_is_created_lazily() {
        let temp = tempfile::tempdir().unwrap();
        let emulator = SandboxEmulator::new(temp.path(), 8);
        let expected = temp.path().join("data");
        assert!(!expected.exists());

        let dir = emulator.create_work_dir().unwrap();

        assert_eq!(dir, expected);
        assert!(dir.is_dir());
        assert!(emulator.is_64bit());
    }

    #[test]
    fn custom_work_dir() {
        let temp = tempfile::tempdir().unwrap();
        let emulator = SandboxEmulator::new(temp.path(), 4).with_work_dir("/home/user");

        let dir = emulator.create_work_dir().unwrap();

        assert_eq!(dir, temp.path().join("home/user"));
        assert!(!emulator.is_64bit());
    }

    #[test]
    fn work_dir_creation_failure_is_fatal() {
        let temp = tempfile::tempdir().unwrap();
        // A regular file where the working directory's parent should be.
        fs::write(temp.path().join("data"), b"").unwrap();
        let emulator = SandboxEmulator::new(temp.path(), 8).with_work_dir("/data/app");

        let err = emulator.create_work_dir().unwrap_err();

        assert!(matches!(err, ResolveError::CreateDir { .. }), "{err:?}");
    }
}
