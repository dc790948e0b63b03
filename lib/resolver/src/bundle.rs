//! Application bundles (`.ipa` files and friends).

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use zip::ZipArchive;
use zip::result::{ZipError, ZipResult};

use crate::{ResolveError, Result};

const PAYLOAD_DIR: &str = "Payload/";
const APP_SUFFIX: &str = ".app";

/// A zip-compressed application bundle on disk.
///
/// The archive is validated once when the bundle is opened. Every
/// [`Bundle::read_entry()`] call then works on its own view of the archive,
/// so entries may be read while libraries resolved from the bundle are
/// still alive.
#[derive(Debug)]
pub struct Bundle {
    path: PathBuf,
    entries: Vec<String>,
}

impl Bundle {
    /// Open the bundle at `path`, failing if it is not a readable archive.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let archive = open_archive(&path).map_err(|error| ResolveError::InvalidBundle {
            path: path.clone(),
            error,
        })?;
        let entries = archive.file_names().map(str::to_owned).collect();

        Ok(Bundle { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The names of every member in the archive.
    pub fn entries(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(String::as_str)
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.iter().any(|e| e == entry)
    }

    /// Read an entry's contents into memory.
    ///
    /// A missing entry is `Ok(None)`. A damaged archive or an I/O failure
    /// while decompressing is an error.
    pub fn read_entry(&self, entry: &str) -> Result<Option<Bytes>> {
        let archive_error = |error: ZipError| ResolveError::Archive {
            bundle: self.path.clone(),
            entry: entry.to_string(),
            error,
        };

        let mut archive = open_archive(&self.path).map_err(archive_error)?;
        let mut file = match archive.by_name(entry) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(error) => return Err(archive_error(error)),
        };

        // the declared size is untrusted: compare it, never allocate from it
        let declared = file.size();
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| archive_error(ZipError::Io(e)))?;

        if data.len() as u64 != declared {
            return Err(archive_error(ZipError::InvalidArchive(
                "entry size does not match its header".into(),
            )));
        }

        tracing::trace!(bundle=%self.path.display(), entry, num_bytes=data.len(), "Read bundle entry");

        Ok(Some(Bytes::from(data)))
    }

    /// Find the application directory, e.g. `Payload/Demo.app/`.
    pub fn app_dir(&self) -> Option<String> {
        self.entries().find_map(|entry| {
            let rest = entry.strip_prefix(PAYLOAD_DIR)?;
            let (name, _) = rest.split_once('/')?;
            (name.len() > APP_SUFFIX.len() && name.ends_with(APP_SUFFIX))
                .then(|| format!("{PAYLOAD_DIR}{name}/"))
        })
    }

    /// The conventional executable name, i.e. the application directory's
    /// name without its `.app` suffix.
    pub fn default_executable(&self) -> Option<String> {
        let app_dir = self.app_dir()?;
        let name = app_dir
            .strip_prefix(PAYLOAD_DIR)?
            .strip_suffix('/')?
            .strip_suffix(APP_SUFFIX)?;
        Some(name.to_string())
    }
}

fn open_archive(path: &Path) -> ZipResult<ZipArchive<BufReader<File>>> {
    let file = File::open(path)?;
    ZipArchive::new(BufReader::new(file))
}
