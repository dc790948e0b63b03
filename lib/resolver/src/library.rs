//! Library images handed to the emulated dynamic loader.

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;

use crate::allow_list::{NeededSet, basename};
use crate::resource::{ResourceNamespace, ResourceProvider, lib_dir};
use crate::{Bundle, Emulator, LibraryResolver, ResolveError, Result};

const RPATH: &str = "@rpath";

/// Where a [`LibraryFile`] came from, and so where its own dependencies are
/// looked up.
#[derive(Debug, Clone)]
pub enum LibraryOrigin {
    /// A member of an application bundle.
    Bundle {
        app_dir: String,
        bundle: Arc<Bundle>,
        needed: NeededSet,
    },
    /// A platform library from a resource namespace.
    Resource {
        sdk: u32,
        lib_dir: &'static str,
        namespace: ResourceNamespace,
        resources: Arc<dyn ResourceProvider>,
    },
}

/// An immutable, fully loaded library image.
///
/// Every successful resolution produces a new value. A library never
/// changes after it has been created; resolving its dependencies yields
/// new libraries that inherit the same origin context.
#[derive(Debug, Clone)]
pub struct LibraryFile {
    name: String,
    data: Bytes,
    origin: LibraryOrigin,
}

impl LibraryFile {
    /// Load a bundle's main executable at `app_dir + executable`.
    ///
    /// `needed` bounds which dependencies the executable (and everything
    /// it pulls in) may resolve from the bundle.
    pub fn load(
        app_dir: impl Into<String>,
        bundle: Arc<Bundle>,
        executable: &str,
        needed: NeededSet,
    ) -> Result<Self> {
        let app_dir = app_dir.into();
        let entry = format!("{app_dir}{executable}");

        let data = bundle
            .read_entry(&entry)?
            .ok_or_else(|| ResolveError::MissingExecutable {
                bundle: bundle.path().to_path_buf(),
                entry,
            })?;

        tracing::debug!(
            bundle=%bundle.path().display(),
            %app_dir,
            executable,
            num_bytes=data.len(),
            "Loaded the main executable",
        );

        Ok(LibraryFile {
            name: executable.to_string(),
            data,
            origin: LibraryOrigin::Bundle {
                app_dir,
                bundle,
                needed,
            },
        })
    }

    /// Like [`LibraryFile::load()`], discovering the application
    /// directory and the executable name from the bundle's layout.
    pub fn load_main(bundle: Arc<Bundle>, needed: NeededSet) -> Result<Self> {
        let missing_app_dir = || ResolveError::MissingAppDir {
            path: bundle.path().to_path_buf(),
        };
        let app_dir = bundle.app_dir().ok_or_else(missing_app_dir)?;
        let executable = bundle.default_executable().ok_or_else(missing_app_dir)?;

        LibraryFile::load(app_dir, bundle, &executable, needed)
    }

    /// Fetch a platform library from a resource namespace.
    pub(crate) fn from_resource(
        resources: &Arc<dyn ResourceProvider>,
        namespace: &ResourceNamespace,
        pointer_size: usize,
        name: &str,
        sdk: u32,
    ) -> Option<Self> {
        let data = namespace.lookup_library(resources, name, pointer_size, sdk)?;

        tracing::debug!(name, sdk, num_bytes=data.len(), "Resolved a platform library");

        Some(LibraryFile {
            name: name.to_string(),
            data,
            origin: LibraryOrigin::Resource {
                sdk,
                lib_dir: lib_dir(pointer_size),
                namespace: namespace.clone(),
                resources: Arc::clone(resources),
            },
        })
    }

    /// The name the library was requested by.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The label the loader gives the library's memory regions.
    pub fn map_region_name(&self) -> String {
        match &self.origin {
            LibraryOrigin::Bundle { .. } => self.name.clone(),
            LibraryOrigin::Resource { .. } => self.path(),
        }
    }

    /// The library's full path as seen by the emulated process.
    pub fn path(&self) -> String {
        match &self.origin {
            LibraryOrigin::Bundle { app_dir, .. } => format!("{app_dir}{}", self.name),
            LibraryOrigin::Resource { lib_dir, .. } => format!("/system/{lib_dir}/{}", self.name),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// A fresh read-only cursor over the image.
    ///
    /// Each call starts at offset zero, regardless of how earlier cursors
    /// were used.
    pub fn map_buffer(&self) -> Cursor<Bytes> {
        Cursor::new(self.data.clone())
    }

    /// The SDK version the library was taken from, for platform libraries.
    pub fn sdk(&self) -> Option<u32> {
        match &self.origin {
            LibraryOrigin::Resource { sdk, .. } => Some(*sdk),
            LibraryOrigin::Bundle { .. } => None,
        }
    }

    /// The allow-list bounding this library's dependencies, for bundle
    /// libraries.
    pub fn needed(&self) -> Option<&NeededSet> {
        match &self.origin {
            LibraryOrigin::Bundle { needed, .. } => Some(needed),
            LibraryOrigin::Resource { .. } => None,
        }
    }

    pub fn origin(&self) -> &LibraryOrigin {
        &self.origin
    }

    fn resolve_from_bundle(
        &self,
        app_dir: &str,
        bundle: &Arc<Bundle>,
        needed: &NeededSet,
        so_name: &str,
    ) -> Result<Option<LibraryFile>> {
        let path = so_name.replace(RPATH, &format!("{app_dir}Frameworks"));
        tracing::debug!(so_name, %path, "Try resolve library");

        if !needed.permits(basename(&path)) {
            tracing::debug!(so_name, %path, "Library is not in the allow-list");
            return Ok(None);
        }

        let Some(data) = bundle.read_entry(&path)? else {
            tracing::debug!(so_name, %path, "Library is not in the bundle");
            return Ok(None);
        };

        Ok(Some(LibraryFile {
            name: so_name.to_string(),
            data,
            origin: LibraryOrigin::Bundle {
                app_dir: app_dir.to_string(),
                bundle: Arc::clone(bundle),
                needed: needed.clone(),
            },
        }))
    }
}

impl LibraryResolver for LibraryFile {
    /// Resolve one of this library's dependencies.
    ///
    /// Bundle libraries substitute `@rpath` with the bundle's `Frameworks`
    /// directory and filter on the resulting basename. Platform libraries
    /// look their dependencies up in the namespace they came from.
    fn resolve_library(
        &self,
        emulator: &dyn Emulator,
        so_name: &str,
    ) -> Result<Option<LibraryFile>> {
        match &self.origin {
            LibraryOrigin::Bundle {
                app_dir,
                bundle,
                needed,
            } => self.resolve_from_bundle(app_dir, bundle, needed, so_name),
            LibraryOrigin::Resource {
                sdk,
                namespace,
                resources,
                ..
            } => Ok(LibraryFile::from_resource(
                resources,
                namespace,
                emulator.pointer_size(),
                so_name,
                *sdk,
            )),
        }
    }
}
