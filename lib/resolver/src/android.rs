//! Library and path resolution for emulated Android processes.

use std::fmt::{self, Debug};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::allow_list::NeededSet;
use crate::cache::ensure_cached;
use crate::config::ResolverConfig;
use crate::file_io::{
    DirectoryFile, FileIo, FileResult, LogCatFile, OpenFlags, SimpleFile, StdoutCallback,
};
use crate::resource::{ResourceEntry, ResourceNamespace, ResourceProvider, normalize_relative};
use crate::{Emulator, IoResolver, LibraryFile, LibraryResolver, ResolveError, Result};

/// Paths below this prefix are served by emulated logger devices.
pub const LOG_DEVICE_PREFIX: &str = "/dev/log/";

const CURRENT_DIR: &str = ".";

/// Resolves libraries and `open()` requests for an Android process.
///
/// Paths are looked up in this order, first match wins:
///
/// 1. `/dev/log/*` devices, backed by files inside the sandbox
/// 2. `.`, the process' working directory
/// 3. files and directories that exist inside the sandbox
/// 4. files the caller asked to create, if their parent directory exists
/// 5. packaged platform resources, copied into a cache directory on first
///    use
///
/// Libraries only come from the packaged resources, and only when an
/// allow-list was configured (see [`AndroidResolver::new()`]).
#[derive(Clone)]
pub struct AndroidResolver {
    sdk: u32,
    needed: Option<NeededSet>,
    namespace: ResourceNamespace,
    resources: Arc<dyn ResourceProvider>,
    cache_dir: PathBuf,
    callback: Option<Arc<dyn StdoutCallback>>,
}

impl AndroidResolver {
    /// Create a resolver for the given SDK version.
    ///
    /// `needed` controls library resolution: `None` disables it, an
    /// unrestricted set resolves anything the resources provide, and an
    /// explicit set only resolves the names it lists.
    pub fn new(sdk: u32, needed: Option<NeededSet>, resources: Arc<dyn ResourceProvider>) -> Self {
        AndroidResolver {
            sdk,
            needed,
            namespace: ResourceNamespace::default(),
            resources,
            cache_dir: std::env::temp_dir(),
            callback: None,
        }
    }

    /// Create a resolver from its configuration file representation.
    pub fn from_config(
        config: &ResolverConfig,
        resources: Arc<dyn ResourceProvider>,
    ) -> Result<Self> {
        let resolver = AndroidResolver::new(config.sdk, config.needed_set()?, resources)
            .with_namespace(config.namespace()?)
            .with_cache_dir(config.cache_dir());

        Ok(resolver)
    }

    pub fn with_namespace(self, namespace: ResourceNamespace) -> Self {
        AndroidResolver { namespace, ..self }
    }

    /// Where packaged resources get extracted to.
    pub fn with_cache_dir(self, cache_dir: impl Into<PathBuf>) -> Self {
        AndroidResolver {
            cache_dir: cache_dir.into(),
            ..self
        }
    }

    /// Forward log device output to `callback`.
    pub fn with_stdout_callback(self, callback: impl StdoutCallback + 'static) -> Self {
        self.with_shared_stdout_callback(Arc::new(callback))
    }

    pub fn with_shared_stdout_callback(self, callback: Arc<dyn StdoutCallback>) -> Self {
        AndroidResolver {
            callback: Some(callback),
            ..self
        }
    }

    pub fn sdk(&self) -> u32 {
        self.sdk
    }

    pub fn needed(&self) -> Option<&NeededSet> {
        self.needed.as_ref()
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn open_log_device(
        &self,
        root: &Path,
        path: &str,
        relative: &str,
        oflags: OpenFlags,
    ) -> Result<FileIo> {
        let log = root.join(relative);

        if let Some(dir) = log.parent() {
            if !dir.is_dir() {
                fs::create_dir_all(dir).map_err(|e| ResolveError::create_dir(dir, e))?;
            }
        }

        if !log.exists() {
            match OpenOptions::new().write(true).create_new(true).open(&log) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(ResolveError::create_file(&log, e)),
            }
            tracing::debug!(path, file=%log.display(), "Created a log device");
        }

        Ok(FileIo::LogCat(LogCatFile::new(
            oflags,
            log,
            path,
            self.callback.clone(),
        )))
    }

    fn resolve_packaged(&self, path: &str, relative: &str, oflags: OpenFlags) -> Result<FileResult> {
        let Some(address) = self.namespace.path_address(relative, self.sdk) else {
            return Ok(FileResult::NotFound);
        };

        match self.resources.get(&address) {
            Some(ResourceEntry::Directory) => Ok(FileResult::Success(FileIo::Directory(
                DirectoryFile::new(oflags, path, None),
            ))),
            Some(ResourceEntry::File(data)) => {
                // one cached copy per namespace and SDK
                let cached = ensure_cached(&self.cache_dir, address.trim_start_matches('/'), &data)?;
                Ok(FileResult::Success(FileIo::Simple(SimpleFile::new(
                    oflags, cached, path,
                ))))
            }
            None => {
                tracing::trace!(path, %address, "Path not found");
                Ok(FileResult::NotFound)
            }
        }
    }
}

impl LibraryResolver for AndroidResolver {
    fn resolve_library(&self, emulator: &dyn Emulator, name: &str) -> Result<Option<LibraryFile>> {
        let Some(needed) = &self.needed else {
            tracing::trace!(name, "Library resolution is disabled");
            return Ok(None);
        };

        if !needed.permits(name) {
            tracing::debug!(name, "Library is not in the allow-list");
            return Ok(None);
        }

        Ok(LibraryFile::from_resource(
            &self.resources,
            &self.namespace,
            emulator.pointer_size(),
            name,
            self.sdk,
        ))
    }
}

impl IoResolver for AndroidResolver {
    fn resolve(&self, emulator: &dyn Emulator, path: &str, oflags: OpenFlags) -> Result<FileResult> {
        let Some(relative) = normalize_relative(path) else {
            tracing::warn!(path, "Refusing to open a path above the sandbox root");
            return Ok(FileResult::NotFound);
        };
        let root = emulator.root_dir();

        if format!("/{relative}").starts_with(LOG_DEVICE_PREFIX) {
            return self.open_log_device(root, path, &relative, oflags).map(FileResult::Success);
        }

        if path == CURRENT_DIR {
            let dir = emulator.create_work_dir()?;
            return Ok(FileResult::Success(FileIo::Directory(DirectoryFile::new(
                oflags,
                path,
                Some(dir),
            ))));
        }

        let file = root.join(&relative);
        if is_readable(&file) {
            return Ok(FileResult::Success(host_file_io(file, path, oflags)));
        }

        let parent_exists = file.parent().is_some_and(Path::exists);
        if parent_exists && oflags.contains(OpenFlags::O_CREAT) {
            return Ok(FileResult::Success(FileIo::Simple(SimpleFile::new(
                oflags, file, path,
            ))));
        }

        self.resolve_packaged(path, &relative, oflags)
    }
}

impl Debug for AndroidResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AndroidResolver")
            .field("sdk", &self.sdk)
            .field("needed", &self.needed)
            .field("namespace", &self.namespace)
            .field("resources", &self.resources)
            .field("cache_dir", &self.cache_dir)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

fn is_readable(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => fs::read_dir(path).is_ok(),
        Ok(_) => fs::File::open(path).is_ok(),
        Err(_) => false,
    }
}

fn host_file_io(file: PathBuf, path: &str, oflags: OpenFlags) -> FileIo {
    if file.is_dir() {
        FileIo::Directory(DirectoryFile::new(oflags, path, Some(file)))
    } else {
        FileIo::Simple(SimpleFile::new(oflags, file, path))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::*;
    use crate::SandboxEmulator;
    use crate::file_io::FileKind;
    use crate::resource::StaticResources;

    fn resources() -> Arc<dyn ResourceProvider> {
        Arc::new(
            StaticResources::new()
                .with_file("/android/sdk23/lib64/libc.so", b"libc64")
                .with_file("/android/sdk23/proc/cpuinfo", b"processor : 0"),
        )
    }

    #[traced_test]
    #[test]
    fn disabled_library_resolution_is_logged_quietly() {
        let temp = tempfile::tempdir().unwrap();
        let emulator = SandboxEmulator::new(temp.path(), 8);
        let resolver = AndroidResolver::new(23, None, resources());

        let lib = resolver.resolve_library(&emulator, "libc.so").unwrap();

        assert!(lib.is_none());
        assert!(logs_contain("Library resolution is disabled"));
        assert!(!logs_contain("ERROR"));
    }

    #[traced_test]
    #[test]
    fn escaping_paths_are_flagged() {
        let temp = tempfile::tempdir().unwrap();
        let emulator = SandboxEmulator::new(temp.path().join("root"), 8);
        let resolver = AndroidResolver::new(23, None, resources())
            .with_cache_dir(temp.path().join("cache"));

        let result = resolver
            .resolve(&emulator, "/../../etc/shadow", OpenFlags::O_RDONLY)
            .unwrap();

        assert!(!result.is_found());
        assert!(logs_contain("Refusing to open a path above the sandbox root"));
    }

    #[test]
    fn debug_output_hides_the_callback() {
        let resolver = AndroidResolver::new(23, Some(NeededSet::unrestricted()), resources())
            .with_stdout_callback(|_: &[u8], _: bool| {});

        let debug = format!("{resolver:?}");

        assert!(debug.contains("callback: true"), "{debug}");
        assert!(debug.contains("sdk: 23"), "{debug}");
    }

    #[test]
    fn from_config() {
        let temp = tempfile::tempdir().unwrap();
        let config = ResolverConfig::from_toml(&format!(
            "sdk = 19\nneeded = [\"libc.so\"]\ncache_dir = {:?}\n",
            temp.path().display().to_string()
        ))
        .unwrap();

        let resolver = AndroidResolver::from_config(&config, resources()).unwrap();

        assert_eq!(resolver.sdk(), 19);
        assert_eq!(resolver.cache_dir(), temp.path());
        assert!(resolver.needed().unwrap().permits("libc.so"));
        assert!(!resolver.needed().unwrap().permits("libm.so"));
    }

    #[test]
    fn packaged_files_are_cached_under_their_normalized_path() {
        let temp = tempfile::tempdir().unwrap();
        let emulator = SandboxEmulator::new(temp.path().join("root"), 8);
        std::fs::create_dir_all(emulator.root_dir()).unwrap();
        let cache = temp.path().join("cache");
        let resolver = AndroidResolver::new(23, None, resources()).with_cache_dir(&cache);

        let file = resolver
            .resolve(&emulator, "/proc/self/../cpuinfo", OpenFlags::O_RDONLY)
            .unwrap()
            .into_file()
            .unwrap();

        assert_eq!(file.kind(), FileKind::Regular);
        assert_eq!(file.path(), "/proc/self/../cpuinfo");
        assert_eq!(
            file.backing_path(),
            Some(cache.join("android/sdk23/proc/cpuinfo").as_path())
        );
    }
}
