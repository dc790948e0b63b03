use std::io;
use std::path::PathBuf;

use thiserror::Error;
use zip::result::ZipError;

/// Result type used throughout the resolvers.
pub type Result<T, E = ResolveError> = std::result::Result<T, E>;

/// A fatal failure while resolving a library or a path.
///
/// A library or path that simply does not exist is *not* an error. Those
/// outcomes are reported as `Ok(None)` or [`FileResult::NotFound`] and the
/// caller decides how to surface them. Everything in here leaves the sandbox
/// in a state the caller should not paper over.
///
/// [`FileResult::NotFound`]: crate::FileResult::NotFound
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A directory needed by the sandbox or the cache could not be created.
    #[error("unable to create the directory \"{}\"", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
    /// A backing file could not be created.
    #[error("unable to create the file \"{}\"", .path.display())]
    CreateFile {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
    /// Packaged resource bytes could not be written to the cache.
    #[error("unable to write the cached copy at \"{}\"", .path.display())]
    CacheWrite {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
    /// Reading an entry out of a bundle failed.
    #[error("unable to read \"{entry}\" from the bundle at \"{}\"", .bundle.display())]
    Archive {
        bundle: PathBuf,
        entry: String,
        #[source]
        error: ZipError,
    },
    /// The bundle's main executable is missing.
    #[error("the bundle at \"{}\" has no entry \"{entry}\"", .bundle.display())]
    MissingExecutable { bundle: PathBuf, entry: String },
    /// The file handed to [`Bundle::open()`](crate::Bundle::open) is not a
    /// readable archive.
    #[error("\"{}\" is not a valid bundle", .path.display())]
    InvalidBundle {
        path: PathBuf,
        #[source]
        error: ZipError,
    },
    /// The bundle does not follow the `Payload/<Name>.app/` layout.
    #[error("unable to locate the application directory in \"{}\"", .path.display())]
    MissingAppDir { path: PathBuf },
    #[error("invalid allow-list entry {entry:?}: {reason}")]
    InvalidAllowListEntry { entry: String, reason: &'static str },
    #[error("invalid resource namespace {0:?}")]
    InvalidNamespace(String),
    #[error("unable to parse the resolver configuration")]
    Config(#[source] toml::de::Error),
    #[error("I/O error on \"{}\"", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
}

impl ResolveError {
    pub(crate) fn create_dir(path: impl Into<PathBuf>, error: io::Error) -> Self {
        ResolveError::CreateDir {
            path: path.into(),
            error,
        }
    }

    pub(crate) fn create_file(path: impl Into<PathBuf>, error: io::Error) -> Self {
        ResolveError::CreateFile {
            path: path.into(),
            error,
        }
    }

    /// Was this raised while validating configuration rather than while
    /// resolving?
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ResolveError::InvalidBundle { .. }
                | ResolveError::MissingAppDir { .. }
                | ResolveError::InvalidAllowListEntry { .. }
                | ResolveError::InvalidNamespace(_)
                | ResolveError::Config(_)
        )
    }
}
