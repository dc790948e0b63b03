//! Resolver settings loaded from TOML.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::resource::{DEFAULT_NAMESPACE, ResourceNamespace};
use crate::{NeededSet, ResolveError, Result};

/// Settings for an [`AndroidResolver`](crate::AndroidResolver), usually
/// read from a TOML file.
///
/// ```toml
/// sdk = 23
/// needed = ["libc.so", "libm.so"]
/// cache_dir = "/var/cache/emu"
/// namespace = "android"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    #[serde(default = "default_sdk")]
    pub sdk: u32,
    /// Libraries the resolver may hand out. Leaving this out disables
    /// library resolution and an empty list permits everything.
    #[serde(default)]
    pub needed: Option<Vec<String>>,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl ResolverConfig {
    pub const DEFAULT_SDK: u32 = 23;

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(ResolveError::Config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|error| ResolveError::Io {
            path: path.to_path_buf(),
            error,
        })?;

        ResolverConfig::from_toml(&text)
    }

    /// The validated allow-list.
    pub fn needed_set(&self) -> Result<Option<NeededSet>> {
        self.needed
            .as_ref()
            .map(|names| NeededSet::new(names.iter().map(String::as_str)))
            .transpose()
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn namespace(&self) -> Result<ResourceNamespace> {
        ResourceNamespace::new(self.namespace.as_str())
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            sdk: ResolverConfig::DEFAULT_SDK,
            needed: None,
            cache_dir: None,
            namespace: default_namespace(),
        }
    }
}

fn default_sdk() -> u32 {
    ResolverConfig::DEFAULT_SDK
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = ResolverConfig::from_toml("").unwrap();

        assert_eq!(config, ResolverConfig::default());
        assert_eq!(config.needed_set().unwrap(), None);
        assert_eq!(config.namespace().unwrap().root(), "android");
        assert_eq!(config.cache_dir(), std::env::temp_dir());
    }

    #[test]
    fn empty_allow_list_is_unrestricted() {
        let config = ResolverConfig::from_toml("needed = []").unwrap();

        let needed = config.needed_set().unwrap().unwrap();

        assert!(needed.is_unrestricted());
        assert!(needed.permits("libanything.so"));
    }

    #[test]
    fn full_config() {
        let config = ResolverConfig::from_toml(
            r#"
            sdk = 19
            needed = ["libc.so", "libz.so"]
            cache_dir = "/tmp/emu-cache"
            namespace = "platform"
            "#,
        )
        .unwrap();

        assert_eq!(config.sdk, 19);
        assert_eq!(config.cache_dir(), PathBuf::from("/tmp/emu-cache"));
        assert_eq!(config.namespace().unwrap().root(), "platform");
        let needed = config.needed_set().unwrap().unwrap();
        assert_eq!(needed.iter().collect::<Vec<_>>(), ["libc.so", "libz.so"]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ResolverConfig::from_toml("sdkk = 23").unwrap_err();

        assert!(matches!(err, ResolveError::Config(_)), "{err:?}");
        assert!(err.is_config_error());
    }

    #[test]
    fn invalid_allow_list_entries() {
        let config = ResolverConfig::from_toml(r#"needed = ["lib/evil.so"]"#).unwrap();

        let err = config.needed_set().unwrap_err();

        assert!(matches!(err, ResolveError::InvalidAllowListEntry { .. }), "{err:?}");
    }

    #[test]
    fn missing_file() {
        let temp = tempfile::tempdir().unwrap();

        let err = ResolverConfig::from_path(&temp.path().join("missing.toml")).unwrap_err();

        assert!(matches!(err, ResolveError::Io { .. }), "{err:?}");
    }
}
