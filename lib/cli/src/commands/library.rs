use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use emu_resolver::{LibraryFile, LibraryResolver};

use crate::opts::{EmulatorOpts, ResolverOpts};

/// Resolve a platform library, optionally following its dependencies.
#[derive(Debug, Parser)]
pub struct Library {
    #[clap(flatten)]
    resolver: ResolverOpts,

    #[clap(flatten)]
    emulator: EmulatorOpts,

    /// Also resolve these libraries as dependencies of the first one.
    #[clap(long, value_delimiter = ',')]
    deps: Vec<String>,

    /// Write the library's contents to this file.
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// The library to resolve, e.g. `libc.so`.
    #[clap(name = "NAME")]
    name: String,
}

impl Library {
    pub fn execute(&self) -> Result<()> {
        self.inner_execute()
            .with_context(|| format!("failed to resolve `{}`", self.name))
    }

    fn inner_execute(&self) -> Result<()> {
        let resolver = self.resolver.resolver()?;
        let emulator = self.emulator.emulator();

        let Some(lib) = resolver.resolve_library(&emulator, &self.name)? else {
            anyhow::bail!("library not found");
        };
        print_library(&lib);

        for dep in &self.deps {
            match lib.resolve_library(&emulator, dep)? {
                Some(dep) => print_library(&dep),
                None => println!("{dep}: not found"),
            }
        }

        if let Some(output) = &self.output {
            std::fs::write(output, lib.bytes())
                .with_context(|| format!("Unable to write to \"{}\"", output.display()))?;
        }

        Ok(())
    }
}

pub(crate) fn print_library(lib: &LibraryFile) {
    println!("{}:", lib.name());
    println!("  Path: {}", lib.path());
    println!("  Region: {}", lib.map_region_name());
    println!("  Size: {} bytes", lib.bytes().len());
    if let Some(sdk) = lib.sdk() {
        println!("  SDK: {sdk}");
    }
}
