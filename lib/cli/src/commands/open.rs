use anyhow::{Context, Result};
use clap::Parser;
use emu_resolver::{FileIo, FileResult, IoResolver, OpenFlags};

use crate::opts::{EmulatorOpts, ResolverOpts};

/// Show how an `open()` call in the emulated process would be served.
#[derive(Debug, Parser)]
pub struct Open {
    #[clap(flatten)]
    resolver: ResolverOpts,

    #[clap(flatten)]
    emulator: EmulatorOpts,

    /// Open with `O_CREAT`.
    #[clap(long)]
    create: bool,

    /// Open for writing (`O_RDWR`).
    #[clap(long)]
    write: bool,

    /// Open with `O_APPEND`.
    #[clap(long)]
    append: bool,

    /// Open with `O_TRUNC`.
    #[clap(long)]
    truncate: bool,

    /// List the entries of a directory.
    #[clap(long)]
    list: bool,

    /// The emulated path, e.g. `/proc/cpuinfo`.
    #[clap(name = "PATH")]
    path: String,
}

impl Open {
    pub fn execute(&self) -> Result<()> {
        self.inner_execute()
            .with_context(|| format!("failed to open `{}`", self.path))
    }

    fn oflags(&self) -> OpenFlags {
        let mut oflags = OpenFlags::O_RDONLY;
        oflags.set(OpenFlags::O_RDWR, self.write);
        oflags.set(OpenFlags::O_CREAT, self.create);
        oflags.set(OpenFlags::O_APPEND, self.append);
        oflags.set(OpenFlags::O_TRUNC, self.truncate);
        oflags
    }

    fn inner_execute(&self) -> Result<()> {
        let resolver = self.resolver.resolver()?;
        let emulator = self.emulator.emulator();

        let file = match resolver.resolve(&emulator, &self.path, self.oflags())? {
            FileResult::Success(file) => file,
            FileResult::NotFound => anyhow::bail!("no such file or directory"),
        };

        println!("Path: {}", file.path());
        println!("Kind: {}", file.kind());
        match file.backing_path() {
            Some(backing) => println!("Backing: {}", backing.display()),
            None => println!("Backing: (none)"),
        }

        if self.list {
            let FileIo::Directory(dir) = &file else {
                anyhow::bail!("not a directory");
            };
            for name in dir.list()? {
                println!("  {name}");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_to_oflags() {
        let open = Open::try_parse_from(["open", "--write", "--create", "--truncate", "/data/x"])
            .unwrap();

        let oflags = open.oflags();

        assert_eq!(
            oflags,
            OpenFlags::O_RDWR | OpenFlags::O_CREAT | OpenFlags::O_TRUNC
        );
    }

    #[test]
    fn read_only_by_default() {
        let open = Open::try_parse_from(["open", "/proc/cpuinfo"]).unwrap();

        assert_eq!(open.oflags(), OpenFlags::O_RDONLY);
        assert_eq!(open.path, "/proc/cpuinfo");
    }
}
