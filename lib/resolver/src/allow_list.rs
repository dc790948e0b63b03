//! The set of library basenames a resolver is allowed to satisfy.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::{ResolveError, Result};

/// An exact-match filter over library basenames.
///
/// An empty set places no restriction on what may be resolved. Resolvers that
/// can be switched off entirely hold an `Option<NeededSet>`, where `None`
/// disables resolution and `Some(NeededSet::unrestricted())` allows
/// everything.
///
/// The names live behind an [`Arc`] so the same set travels with every
/// library resolved through it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeededSet {
    names: Arc<BTreeSet<String>>,
}

impl NeededSet {
    /// A set that lets every name through.
    pub fn unrestricted() -> Self {
        NeededSet::default()
    }

    /// Build a filter from a list of basenames.
    ///
    /// Entries must be non-empty basenames; anything containing a path
    /// separator or a NUL byte is rejected.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = BTreeSet::new();

        for name in names {
            let name = name.into();
            validate(&name)?;
            set.insert(name);
        }

        Ok(NeededSet {
            names: Arc::new(set),
        })
    }

    pub fn is_unrestricted(&self) -> bool {
        self.names.is_empty()
    }

    /// Does this filter let `name` through?
    pub fn permits(&self, name: &str) -> bool {
        self.names.is_empty() || self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.iter().map(String::as_str)
    }

    /// Check whether two filters share the same underlying set, rather than
    /// merely holding equal names.
    pub fn ptr_eq(&self, other: &NeededSet) -> bool {
        Arc::ptr_eq(&self.names, &other.names)
    }
}

fn validate(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "names must not be empty"
    } else if name.contains('/') {
        "names must be basenames, not paths"
    } else if name.contains('\0') {
        "names must not contain NUL bytes"
    } else {
        return Ok(());
    };

    Err(ResolveError::InvalidAllowListEntry {
        entry: name.to_string(),
        reason,
    })
}

/// The last `/`-separated component of `path`.
pub(crate) fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_is_unrestricted() {
        let needed = NeededSet::unrestricted();

        assert!(needed.is_unrestricted());
        assert!(needed.permits("libc.so"));
        assert!(needed.permits("anything"));
    }

    #[test]
    fn explicit_set_filters_exact_names() {
        let needed = NeededSet::new(["libc.so", "libm.so"]).unwrap();

        assert!(needed.permits("libc.so"));
        assert!(!needed.permits("libdl.so"));
        assert!(!needed.permits("libc"));
        assert_eq!(needed.iter().collect::<Vec<_>>(), ["libc.so", "libm.so"]);
    }

    #[test]
    fn malformed_entries_are_rejected() {
        for entry in ["", "lib/libc.so", "libc\0.so"] {
            let err = NeededSet::new([entry]).unwrap_err();
            assert!(
                matches!(&err, ResolveError::InvalidAllowListEntry { entry: e, .. } if e == entry),
                "{err:?}"
            );
            assert!(err.is_config_error());
        }
    }

    #[test]
    fn clones_share_the_same_set() {
        let needed = NeededSet::new(["Foo"]).unwrap();
        let other = NeededSet::new(["Foo"]).unwrap();

        assert!(needed.ptr_eq(&needed.clone()));
        assert_eq!(needed, other);
        assert!(!needed.ptr_eq(&other));
    }

    #[test]
    fn basename_of_paths() {
        assert_eq!(basename("Payload/Demo.app/Frameworks/Foo.framework/Foo"), "Foo");
        assert_eq!(basename("libc.so"), "libc.so");
        assert_eq!(basename("dir/"), "");
    }
}
