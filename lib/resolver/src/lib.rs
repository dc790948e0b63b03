//! Library and filesystem resolution for emulated processes.
//!
//! Two kinds of resolver live here:
//!
//! - [`LibraryFile`] resolves the dependencies of an iOS executable from the
//!   application bundle it was loaded from, honouring `@rpath` and an
//!   optional allow-list.
//! - [`AndroidResolver`] resolves platform libraries and `open()` requests
//!   for an Android process, layering a host sandbox directory over a set of
//!   packaged platform resources.
//!
//! Neither resolver treats "not found" as an error. Missing libraries and
//! paths come back as `Ok(None)` or [`FileResult::NotFound`] so the
//! emulator can report them the way the guest expects.

pub mod allow_list;
pub mod android;
pub mod bundle;
mod cache;
pub mod config;
pub mod emulator;
mod error;
pub mod file_io;
pub mod library;
pub mod resource;

pub use crate::{
    allow_list::NeededSet,
    android::AndroidResolver,
    bundle::Bundle,
    config::ResolverConfig,
    emulator::{Emulator, SandboxEmulator},
    error::{ResolveError, Result},
    file_io::{
        AccessMode, DirectoryFile, FileIo, FileKind, FileResult, LogCatFile, LogPriority,
        LogRecord, OpenFlags, SimpleFile, StdoutCallback,
    },
    library::{LibraryFile, LibraryOrigin},
    resource::{
        DirectoryResources, ResourceEntry, ResourceNamespace, ResourceProvider, StaticResources,
    },
};

/// Something the emulated dynamic loader can ask for shared libraries.
pub trait LibraryResolver {
    /// Look up the library called `name`.
    ///
    /// Returns `Ok(None)` when the library doesn't exist or isn't permitted.
    fn resolve_library(&self, emulator: &dyn Emulator, name: &str) -> Result<Option<LibraryFile>>;
}

/// Something that can back the emulated process' `open()` calls.
pub trait IoResolver {
    fn resolve(&self, emulator: &dyn Emulator, path: &str, oflags: OpenFlags) -> Result<FileResult>;
}
