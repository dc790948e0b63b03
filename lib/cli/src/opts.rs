use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use emu_resolver::{
    AndroidResolver, DirectoryResources, ResolverConfig, ResourceProvider, SandboxEmulator,
    StaticResources,
};

/// Options describing how the [`AndroidResolver`] is configured.
#[derive(Debug, Default, Clone, clap::Parser)]
pub struct ResolverOpts {
    /// A TOML file with the resolver configuration. Flags override it.
    #[clap(long, env = "EMU_RESOLVER_CONFIG")]
    pub config: Option<PathBuf>,

    /// The Android SDK version to emulate.
    #[clap(long)]
    pub sdk: Option<u32>,

    /// Libraries that may be resolved. Pass the flag without values to
    /// allow every library.
    #[clap(long, num_args = 0.., value_delimiter = ',')]
    pub needed: Option<Vec<String>>,

    /// A directory holding the packaged platform resources, laid out by
    /// address (e.g. `android/sdk23/lib64/libc.so`).
    #[clap(long, env = "EMU_RESOLVER_RESOURCES")]
    pub resources: Option<PathBuf>,

    /// Where packaged files are extracted to.
    #[clap(long)]
    pub cache_dir: Option<PathBuf>,

    /// The resource namespace root.
    #[clap(long)]
    pub namespace: Option<String>,
}

impl ResolverOpts {
    /// The configuration file merged with any command-line overrides.
    pub fn config(&self) -> Result<ResolverConfig> {
        let mut config = match &self.config {
            Some(path) => ResolverConfig::from_path(path)
                .with_context(|| format!("Unable to load \"{}\"", path.display()))?,
            None => ResolverConfig::default(),
        };

        if let Some(sdk) = self.sdk {
            config.sdk = sdk;
        }
        if let Some(needed) = &self.needed {
            config.needed = Some(needed.clone());
        }
        if let Some(cache_dir) = &self.cache_dir {
            config.cache_dir = Some(cache_dir.clone());
        }
        if let Some(namespace) = &self.namespace {
            config.namespace = namespace.clone();
        }

        Ok(config)
    }

    pub fn resolver(&self) -> Result<AndroidResolver> {
        let config = self.config()?;

        let resources: Arc<dyn ResourceProvider> = match &self.resources {
            Some(dir) => Arc::new(DirectoryResources::new(dir)),
            None => {
                tracing::warn!("No resource directory was provided");
                Arc::new(StaticResources::new())
            }
        };

        AndroidResolver::from_config(&config, resources).context("Invalid resolver configuration")
    }
}

/// Options describing the emulated process.
#[derive(Debug, Clone, clap::Parser)]
pub struct EmulatorOpts {
    /// The host directory standing in for the emulated root filesystem.
    #[clap(long, default_value = ".")]
    pub root: PathBuf,

    /// The pointer width of the emulated process, in bytes.
    #[clap(long, default_value_t = 8, value_parser = parse_pointer_size)]
    pub pointer_size: usize,

    /// The emulated working directory.
    #[clap(long, default_value = SandboxEmulator::DEFAULT_WORK_DIR)]
    pub work_dir: String,
}

impl EmulatorOpts {
    pub fn emulator(&self) -> SandboxEmulator {
        SandboxEmulator::new(&self.root, self.pointer_size).with_work_dir(&self.work_dir)
    }
}

fn parse_pointer_size(s: &str) -> Result<usize, String> {
    match s {
        "4" | "32" => Ok(4),
        "8" | "64" => Ok(8),
        other => Err(format!(
            "expected 4 or 8 (or 32/64 bits), found \"{other}\""
        )),
    }
}
