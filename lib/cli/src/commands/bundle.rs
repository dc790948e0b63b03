use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use emu_resolver::{LibraryFile, LibraryResolver, NeededSet};

use crate::commands::library::print_library;
use crate::opts::EmulatorOpts;

/// Load an application bundle and resolve its dependencies.
#[derive(Debug, Parser)]
pub struct Bundle {
    #[clap(flatten)]
    emulator: EmulatorOpts,

    /// The application directory inside the bundle, e.g. `Payload/App.app/`.
    /// Discovered from the bundle's layout when omitted.
    #[clap(long, requires = "executable")]
    app_dir: Option<String>,

    /// The main executable's name inside the application directory.
    #[clap(long, requires = "app_dir")]
    executable: Option<String>,

    /// Dependency basenames that may be resolved. Everything is allowed when
    /// no names are given.
    #[clap(long, value_delimiter = ',')]
    allow: Vec<String>,

    /// Print every entry in the bundle.
    #[clap(long)]
    list: bool,

    /// The bundle to load.
    #[clap(name = "IPA")]
    ipa: PathBuf,

    /// Dependencies to resolve, e.g. `@rpath/Foo.framework/Foo`.
    #[clap(name = "DEPS")]
    deps: Vec<String>,
}

impl Bundle {
    pub fn execute(&self) -> Result<()> {
        self.inner_execute()
            .with_context(|| format!("failed to load `{}`", self.ipa.display()))
    }

    fn inner_execute(&self) -> Result<()> {
        let bundle = Arc::new(emu_resolver::Bundle::open(&self.ipa)?);
        let needed = NeededSet::new(self.allow.iter().map(String::as_str))?;
        let emulator = self.emulator.emulator();

        if self.list {
            for entry in bundle.entries() {
                println!("{entry}");
            }
        }

        let main = match (&self.app_dir, &self.executable) {
            (Some(app_dir), Some(executable)) => {
                LibraryFile::load(app_dir.as_str(), bundle, executable, needed)?
            }
            _ => LibraryFile::load_main(bundle, needed)?,
        };
        print_library(&main);

        for dep in &self.deps {
            match main.resolve_library(&emulator, dep)? {
                Some(lib) => print_library(&lib),
                None => println!("{dep}: not found"),
            }
        }

        Ok(())
    }
}
