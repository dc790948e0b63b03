//! On-disk copies of packaged resources.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::{ResolveError, Result};

/// Make sure `<cache_dir>/<relative>` exists, writing `data` there only if
/// nothing is cached yet.
///
/// An existing file is never rewritten and a directory at the target is an
/// error. New contents are staged in a
/// temporary file next to the target and moved into place, so the target
/// either holds the full contents or does not exist.
pub(crate) fn ensure_cached(cache_dir: &Path, relative: &str, data: &[u8]) -> Result<PathBuf> {
    let target = cache_dir.join(relative);

    if target.is_file() {
        tracing::trace!(path=%target.display(), "Using the cached copy");
        return Ok(target);
    }
    if target.is_dir() {
        return Err(ResolveError::CacheWrite {
            error: io::Error::from(io::ErrorKind::IsADirectory),
            path: target,
        });
    }

    let dir = target.parent().unwrap_or(cache_dir);
    if !dir.is_dir() {
        fs::create_dir_all(dir).map_err(|e| ResolveError::create_dir(dir, e))?;
    }

    let write_error = |error| ResolveError::CacheWrite {
        path: target.clone(),
        error,
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| ResolveError::create_file(dir, e))?;
    temp.write_all(data).map_err(write_error)?;
    temp.flush().map_err(write_error)?;

    match temp.persist_noclobber(&target) {
        Ok(_) => {
            tracing::debug!(path=%target.display(), num_bytes=data.len(), "Cached a packaged resource");
        }
        Err(e) if target.is_file() => {
            tracing::trace!(path=%target.display(), error=%e.error, "Someone else cached the file first");
        }
        Err(e) => return Err(write_error(e.error)),
    }

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_missing_files_with_parents() {
        let temp = tempfile::tempdir().unwrap();

        let path = ensure_cached(temp.path(), "proc/cpuinfo", b"processor : 0").unwrap();

        assert_eq!(path, temp.path().join("proc/cpuinfo"));
        assert_eq!(fs::read(&path).unwrap(), b"processor : 0");
    }

    #[test]
    fn existing_files_are_left_alone() {
        let temp = tempfile::tempdir().unwrap();
        let path = ensure_cached(temp.path(), "etc/hosts", b"original").unwrap();
        fs::write(&path, b"edited").unwrap();

        let again = ensure_cached(temp.path(), "etc/hosts", b"original").unwrap();

        assert_eq!(again, path);
        assert_eq!(fs::read(&path).unwrap(), b"edited");
    }

    #[test]
    fn directory_in_place_of_the_file_is_fatal() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp.path().join("system/fonts")).unwrap();

        let err = ensure_cached(temp.path(), "system/fonts", b"font data").unwrap_err();

        assert!(
            matches!(&err, ResolveError::CacheWrite { path, .. } if path.ends_with("system/fonts")),
            "{err:?}"
        );
    }

    #[test]
    fn unusable_cache_dir_is_fatal() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("etc"), b"not a directory").unwrap();

        let err = ensure_cached(temp.path(), "etc/hosts", b"data").unwrap_err();

        assert!(matches!(err, ResolveError::CreateDir { .. }), "{err:?}");
    }
}
