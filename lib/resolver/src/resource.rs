//! Read-only platform resources keyed by SDK version and ABI width.
//!
//! Resources live under addresses such as `/android/sdk23/lib64/libc.so`.
//! The first segment is the namespace root, the second the SDK the files
//! were taken from. Library lookups add a `lib` or `lib64` segment
//! depending on the pointer width of the emulated process, while plain
//! filesystem lookups use the emulated path directly.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::ops::Deref;
use std::path::PathBuf;

use bytes::Bytes;

use crate::{ResolveError, Result};

/// The namespace root used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "android";

/// Something stored at a resource address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceEntry {
    File(Bytes),
    Directory,
}

/// A read-only store of resources addressed by `/`-separated keys.
pub trait ResourceProvider: Debug {
    /// Look up the resource at `address`.
    ///
    /// Returns `None` when nothing is stored there.
    fn get(&self, address: &str) -> Option<ResourceEntry>;
}

impl<D, P> ResourceProvider for D
where
    D: Deref<Target = P> + Debug,
    P: ResourceProvider + ?Sized,
{
    fn get(&self, address: &str) -> Option<ResourceEntry> {
        (**self).get(address)
    }
}

/// The ABI directory for a given pointer width.
pub fn lib_dir(pointer_size: usize) -> &'static str {
    if pointer_size == 4 { "lib" } else { "lib64" }
}

/// Make a library name storable in a resource namespace, which can't hold
/// a literal `+`.
pub fn sanitize_name(name: &str) -> String {
    name.replace('+', "p")
}

/// Composes resource addresses below a namespace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNamespace {
    root: String,
}

impl ResourceNamespace {
    pub fn new(root: impl Into<String>) -> Result<Self> {
        let root = root.into();
        let valid = !root.is_empty()
            && !root.contains('/')
            && !root.contains('\0')
            && root != "."
            && root != "..";

        if valid {
            Ok(ResourceNamespace { root })
        } else {
            Err(ResolveError::InvalidNamespace(root))
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// The address of a platform library, e.g.
    /// `/android/sdk23/lib64/libstdcpp.so` for `libstdc++.so`.
    pub fn library_address(&self, name: &str, pointer_size: usize, sdk: u32) -> String {
        format!(
            "/{}/sdk{sdk}/{}/{}",
            self.root,
            lib_dir(pointer_size),
            sanitize_name(name)
        )
    }

    /// The address mirroring an emulated filesystem path.
    ///
    /// Returns `None` when the path climbs out of the SDK directory with
    /// `..` segments.
    pub fn path_address(&self, path: &str, sdk: u32) -> Option<String> {
        let relative = normalize_relative(path)?;
        if relative.is_empty() {
            Some(format!("/{}/sdk{sdk}", self.root))
        } else {
            Some(format!("/{}/sdk{sdk}/{relative}", self.root))
        }
    }

    /// Fetch a platform library's bytes.
    pub fn lookup_library(
        &self,
        provider: &dyn ResourceProvider,
        name: &str,
        pointer_size: usize,
        sdk: u32,
    ) -> Option<Bytes> {
        let address = self.library_address(name, pointer_size, sdk);
        match provider.get(&address) {
            Some(ResourceEntry::File(data)) => Some(data),
            Some(ResourceEntry::Directory) | None => {
                tracing::trace!(name, %address, "No such platform library");
                None
            }
        }
    }
}

impl Default for ResourceNamespace {
    fn default() -> Self {
        ResourceNamespace {
            root: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

/// Lexically normalize a `/`-separated path into a relative one.
///
/// Empty and `.` segments are dropped and `..` removes the previous segment.
/// Returns `None` if a `..` would climb above the starting point.
pub(crate) fn normalize_relative(path: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }

    Some(segments.join("/"))
}

/// Resources compiled into the binary, usually with [`include_bytes!`].
///
/// Only files are stored; a directory exists whenever some file lives
/// below it.
#[derive(Debug, Clone, Default)]
pub struct StaticResources {
    files: BTreeMap<String, &'static [u8]>,
}

impl StaticResources {
    pub fn new() -> Self {
        StaticResources::default()
    }

    pub fn with_file(mut self, address: &str, data: &'static [u8]) -> Self {
        self.insert(address, data);
        self
    }

    /// Store `data` at `address`, replacing whatever was there before.
    pub fn insert(&mut self, address: &str, data: &'static [u8]) {
        self.files.insert(canonical_key(address), data);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl ResourceProvider for StaticResources {
    fn get(&self, address: &str) -> Option<ResourceEntry> {
        let key = canonical_key(address);

        if let Some(data) = self.files.get(&key) {
            return Some(ResourceEntry::File(Bytes::from_static(data)));
        }

        let prefix = if key == "/" { key } else { format!("{key}/") };
        let has_children = self
            .files
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(candidate, _)| candidate.starts_with(&prefix));

        has_children.then_some(ResourceEntry::Directory)
    }
}

fn canonical_key(address: &str) -> String {
    match normalize_relative(address) {
        Some(relative) => format!("/{relative}"),
        None => "/".to_string(),
    }
}

/// Resources unpacked into a directory on the host, laid out the same way
/// as their addresses.
#[derive(Debug, Clone)]
pub struct DirectoryResources {
    root: PathBuf,
}

impl DirectoryResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryResources { root: root.into() }
    }
}

impl ResourceProvider for DirectoryResources {
    fn get(&self, address: &str) -> Option<ResourceEntry> {
        let path = self.root.join(normalize_relative(address)?);
        let metadata = fs::metadata(&path).ok()?;

        if metadata.is_dir() {
            return Some(ResourceEntry::Directory);
        }

        match fs::read(&path) {
            Ok(data) => Some(ResourceEntry::File(Bytes::from(data))),
            Err(error) => {
                tracing::warn!(path=%path.display(), %error, "Unable to read a packaged resource");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn library_addresses() {
        let ns = ResourceNamespace::default();

        assert_eq!(
            ns.library_address("libstdc++.so", 8, 23),
            "/android/sdk23/lib64/libstdcpp.so"
        );
        assert_eq!(ns.library_address("libc.so", 4, 19), "/android/sdk19/lib/libc.so");
        assert_eq!(
            ns.library_address("libc++_shared.so", 8, 23),
            "/android/sdk23/lib64/libcpp_shared.so"
        );
    }

    #[test]
    fn path_addresses_are_normalized() {
        let ns = ResourceNamespace::default();

        assert_eq!(
            ns.path_address("/proc/self/../cpuinfo", 23).unwrap(),
            "/android/sdk23/proc/cpuinfo"
        );
        assert_eq!(
            ns.path_address("//system/./fonts/", 23).unwrap(),
            "/android/sdk23/system/fonts"
        );
        assert_eq!(ns.path_address("/", 23).unwrap(), "/android/sdk23");
        assert_eq!(ns.path_address("/../../etc/passwd", 23), None);
    }

    #[test]
    fn invalid_namespaces() {
        for root in ["", "a/b", "..", "."] {
            assert!(ResourceNamespace::new(root).is_err(), "{root:?}");
        }
        assert_eq!(ResourceNamespace::new("ios").unwrap().root(), "ios");
    }

    #[test]
    fn static_resources_expose_files_and_implied_directories() {
        let resources = StaticResources::new()
            .with_file("/android/sdk23/lib64/libc.so", b"libc")
            .with_file("android/sdk23/system/fonts/Roboto.ttf", b"font");

        assert_eq!(
            resources.get("/android/sdk23/lib64/libc.so"),
            Some(ResourceEntry::File(Bytes::from_static(b"libc")))
        );
        assert_eq!(
            resources.get("/android/sdk23/system/fonts"),
            Some(ResourceEntry::Directory)
        );
        assert_eq!(
            resources.get("/android/sdk23/system/"),
            Some(ResourceEntry::Directory)
        );
        assert_eq!(resources.get("/android/sdk23/sys"), None);
        assert_eq!(resources.get("/android/sdk23/lib64/libm.so"), None);
        assert_eq!(resources.len(), 2);
    }

    #[test]
    fn library_lookup_goes_through_the_provider() {
        let ns = ResourceNamespace::default();
        let resources: Arc<dyn ResourceProvider> = Arc::new(
            StaticResources::new()
                .with_file("/android/sdk23/lib64/libstdcpp.so", b"stl64")
                .with_file("/android/sdk23/lib/libstdcpp.so", b"stl32"),
        );

        let found = ns.lookup_library(&resources, "libstdc++.so", 8, 23);
        assert_eq!(found, Some(Bytes::from_static(b"stl64")));
        let found = ns.lookup_library(&resources, "libstdc++.so", 4, 23);
        assert_eq!(found, Some(Bytes::from_static(b"stl32")));
        assert_eq!(ns.lookup_library(&resources, "libstdc++.so", 8, 19), None);
        // Directories are never libraries
        assert_eq!(ns.lookup_library(&resources, "..", 8, 23), None);
    }

    #[test]
    fn directory_resources() {
        let temp = tempfile::tempdir().unwrap();
        let lib64 = temp.path().join("android/sdk23/lib64");
        fs::create_dir_all(&lib64).unwrap();
        fs::write(lib64.join("libdl.so"), b"dl").unwrap();
        let resources = DirectoryResources::new(temp.path());

        assert_eq!(
            resources.get("/android/sdk23/lib64/libdl.so"),
            Some(ResourceEntry::File(Bytes::from_static(b"dl")))
        );
        assert_eq!(
            resources.get("/android/sdk23/lib64"),
            Some(ResourceEntry::Directory)
        );
        assert_eq!(resources.get("/android/sdk23/lib/libdl.so"), None);
        assert_eq!(resources.get("/../outside"), None);
    }
}
