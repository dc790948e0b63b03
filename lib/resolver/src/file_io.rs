//! File handles produced by path resolution.

use std::borrow::Cow;
use std::fmt::{self, Debug, Display};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bitflags::bitflags;

bitflags! {
    /// Linux `open(2)` flags, as passed in by the emulated process.
    pub struct OpenFlags: u32 {
        const O_WRONLY = 0o1;
        const O_RDWR = 0o2;
        const O_CREAT = 0o100;
        const O_EXCL = 0o200;
        const O_NOCTTY = 0o400;
        const O_TRUNC = 0o1000;
        const O_APPEND = 0o2000;
        const O_NONBLOCK = 0o4000;
        const O_DIRECTORY = 0o200000;
        const O_NOFOLLOW = 0o400000;
        const O_CLOEXEC = 0o2000000;
    }
}

/// The access mode encoded in the low bits of [`OpenFlags`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl OpenFlags {
    /// An empty set of flags, i.e. `O_RDONLY`.
    pub const O_RDONLY: OpenFlags = OpenFlags::empty();

    pub fn access_mode(&self) -> AccessMode {
        if self.contains(OpenFlags::O_RDWR) {
            AccessMode::ReadWrite
        } else if self.contains(OpenFlags::O_WRONLY) {
            AccessMode::WriteOnly
        } else {
            AccessMode::ReadOnly
        }
    }
}

/// Receives whatever the emulated process writes to a log device.
pub trait StdoutCallback: Send + Sync {
    fn notify_out(&self, data: &[u8], err: bool);
}

impl<F> StdoutCallback for F
where
    F: Fn(&[u8], bool) + Send + Sync,
{
    fn notify_out(&self, data: &[u8], err: bool) {
        self(data, err)
    }
}

/// The outcome of resolving a path.
#[derive(Debug, Clone)]
pub enum FileResult {
    Success(FileIo),
    NotFound,
}

impl FileResult {
    pub fn is_found(&self) -> bool {
        matches!(self, FileResult::Success(_))
    }

    pub fn file(&self) -> Option<&FileIo> {
        match self {
            FileResult::Success(file) => Some(file),
            FileResult::NotFound => None,
        }
    }

    pub fn into_file(self) -> Option<FileIo> {
        match self {
            FileResult::Success(file) => Some(file),
            FileResult::NotFound => None,
        }
    }
}

impl From<FileIo> for FileResult {
    fn from(file: FileIo) -> Self {
        FileResult::Success(file)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    Directory,
    LogStream,
}

impl Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::Regular => write!(f, "regular file"),
            FileKind::Directory => write!(f, "directory"),
            FileKind::LogStream => write!(f, "log stream"),
        }
    }
}

/// A file the emulated process opened.
#[derive(Debug, Clone)]
pub enum FileIo {
    Simple(SimpleFile),
    Directory(DirectoryFile),
    LogCat(LogCatFile),
}

impl FileIo {
    pub fn kind(&self) -> FileKind {
        match self {
            FileIo::Simple(_) => FileKind::Regular,
            FileIo::Directory(_) => FileKind::Directory,
            FileIo::LogCat(_) => FileKind::LogStream,
        }
    }

    /// The path the emulated process asked for.
    pub fn path(&self) -> &str {
        match self {
            FileIo::Simple(f) => &f.path,
            FileIo::Directory(d) => &d.path,
            FileIo::LogCat(l) => &l.path,
        }
    }

    pub fn oflags(&self) -> OpenFlags {
        match self {
            FileIo::Simple(f) => f.oflags,
            FileIo::Directory(d) => d.oflags,
            FileIo::LogCat(l) => l.oflags,
        }
    }

    /// The host file or directory behind the handle, if there is one.
    pub fn backing_path(&self) -> Option<&Path> {
        match self {
            FileIo::Simple(f) => Some(&f.file),
            FileIo::Directory(d) => d.dir.as_deref(),
            FileIo::LogCat(l) => Some(&l.file),
        }
    }
}

/// A regular file backed by a file on the host.
#[derive(Debug, Clone)]
pub struct SimpleFile {
    oflags: OpenFlags,
    file: PathBuf,
    path: String,
}

impl SimpleFile {
    pub fn new(oflags: OpenFlags, file: impl Into<PathBuf>, path: impl Into<String>) -> Self {
        SimpleFile {
            oflags,
            file: file.into(),
            path: path.into(),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Open the backing file the way the emulated `open()` asked for.
    pub fn open(&self) -> io::Result<fs::File> {
        let mode = self.oflags.access_mode();
        let writable = mode != AccessMode::ReadOnly;
        let create = self.oflags.contains(OpenFlags::O_CREAT);
        let exclusive = create && self.oflags.contains(OpenFlags::O_EXCL);
        let append = self.oflags.contains(OpenFlags::O_APPEND);
        let truncate = writable && self.oflags.contains(OpenFlags::O_TRUNC);

        if !writable && create {
            // std refuses to create files without write access
            match OpenOptions::new().write(true).create_new(true).open(&self.file) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && !exclusive => {}
                Err(e) => return Err(e),
            }
        }

        let file = OpenOptions::new()
            .read(mode != AccessMode::WriteOnly)
            .write(writable)
            .append(writable && append)
            .truncate(truncate && !append)
            .create(writable && create && !exclusive)
            .create_new(writable && exclusive)
            .open(&self.file)?;

        if truncate && append {
            file.set_len(0)?;
        }

        Ok(file)
    }
}

/// A directory, either on the host or inside a resource namespace.
#[derive(Debug, Clone)]
pub struct DirectoryFile {
    oflags: OpenFlags,
    path: String,
    dir: Option<PathBuf>,
}

impl DirectoryFile {
    pub fn new(oflags: OpenFlags, path: impl Into<String>, dir: Option<PathBuf>) -> Self {
        DirectoryFile {
            oflags,
            path: path.into(),
            dir,
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// The names of the directory's entries, sorted.
    ///
    /// Directories without a host backing list as empty.
    pub fn list(&self) -> io::Result<Vec<String>> {
        let Some(dir) = &self.dir else {
            return Ok(Vec::new());
        };

        let mut names = fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<io::Result<Vec<_>>>()?;
        names.sort();

        Ok(names)
    }
}

/// Android log priorities, as found in the first byte of a logger record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LogPriority {
    Verbose,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogPriority {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            2 => Some(LogPriority::Verbose),
            3 => Some(LogPriority::Debug),
            4 => Some(LogPriority::Info),
            5 => Some(LogPriority::Warn),
            6 => Some(LogPriority::Error),
            7 => Some(LogPriority::Fatal),
            _ => None,
        }
    }

    /// The single-letter form used by `logcat`.
    pub fn letter(&self) -> char {
        match self {
            LogPriority::Verbose => 'V',
            LogPriority::Debug => 'D',
            LogPriority::Info => 'I',
            LogPriority::Warn => 'W',
            LogPriority::Error => 'E',
            LogPriority::Fatal => 'F',
        }
    }
}

/// A decoded logger record: `<priority><tag>\0<message>\0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord<'a> {
    pub priority: LogPriority,
    pub tag: Cow<'a, str>,
    pub message: Cow<'a, str>,
}

impl<'a> LogRecord<'a> {
    pub fn decode(buf: &'a [u8]) -> Option<Self> {
        let (&priority, rest) = buf.split_first()?;
        let priority = LogPriority::from_byte(priority)?;
        let tag_end = rest.iter().position(|&b| b == 0)?;
        let (tag, rest) = (&rest[..tag_end], &rest[tag_end + 1..]);
        let message_end = rest.iter().position(|&b| b == 0)?;

        Some(LogRecord {
            priority,
            tag: String::from_utf8_lossy(tag),
            message: String::from_utf8_lossy(&rest[..message_end]),
        })
    }
}

impl Display for LogRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}: {}",
            self.priority.letter(),
            self.tag,
            self.message.trim_end_matches('\n')
        )
    }
}

/// An emulated `/dev/log/*` device.
///
/// Writes are mirrored into a backing file inside the sandbox and handed to
/// the [`StdoutCallback`], if there is one.
#[derive(Clone)]
pub struct LogCatFile {
    oflags: OpenFlags,
    file: PathBuf,
    path: String,
    callback: Option<Arc<dyn StdoutCallback>>,
}

impl LogCatFile {
    pub fn new(
        oflags: OpenFlags,
        file: impl Into<PathBuf>,
        path: impl Into<String>,
        callback: Option<Arc<dyn StdoutCallback>>,
    ) -> Self {
        LogCatFile {
            oflags,
            file: file.into(),
            path: path.into(),
            callback,
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Write one logger record, returning the number of bytes consumed.
    ///
    /// Buffers that don't decode as a record are passed through untouched.
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let line: Cow<'_, [u8]> = match LogRecord::decode(buf) {
            Some(record) => Cow::Owned(format!("{record}\n").into_bytes()),
            None => Cow::Borrowed(buf),
        };

        let mut backing = OpenOptions::new().append(true).open(&self.file)?;
        backing.write_all(&line)?;

        if let Some(callback) = &self.callback {
            callback.notify_out(&line, false);
        }

        Ok(buf.len())
    }
}

impl Debug for LogCatFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogCatFile")
            .field("oflags", &self.oflags)
            .field("file", &self.file)
            .field("path", &self.path)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
