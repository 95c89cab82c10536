//! Filesystem configuration.
//!
//! A [`Builder`] collects the construction-time options (roots, separator,
//! name transforms, attribute views, block size, ...) and produces a
//! [`MemoryFileSystem`]. All options are fixed for the lifetime of the
//! filesystem.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::fs::MemoryFileSystem;
use crate::types::Permissions;
use crate::{VfsError, VfsResult};

/// A pure transform from an original name to the form the filesystem works
/// with. Applied element by element.
pub type NameTransform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Comparator over sibling names, used to order the endpoints of two-path
/// operations.
pub type Collator = Arc<dyn Fn(&str, &str) -> Ordering + Send + Sync>;

bitflags::bitflags! {
    /// Attribute views available beyond the always-present basic view.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ViewSet: u8 {
        const DOS = 1;
        const OWNER = 1 << 1;
        const POSIX = 1 << 2;
        const USER = 1 << 3;
    }
}

pub(crate) struct Config {
    pub name: String,
    pub separator: Arc<str>,
    pub roots: Vec<String>,
    pub cwd: String,
    pub store_transform: NameTransform,
    pub lookup_transform: NameTransform,
    pub collator: Collator,
    pub views: ViewSet,
    pub umask: Permissions,
    pub block_size: usize,
    pub max_size: Option<u64>,
    pub read_only: bool,
}

impl Config {
    pub(crate) fn default_file_permissions(&self) -> Permissions {
        Permissions::from_mode(0o666) - self.umask
    }

    pub(crate) fn default_dir_permissions(&self) -> Permissions {
        Permissions::from_mode(0o777) - self.umask
    }
}

/// Builder for [`MemoryFileSystem`].
pub struct Builder {
    name: String,
    separator: String,
    roots: Vec<String>,
    cwd: Option<String>,
    store_transform: NameTransform,
    lookup_transform: NameTransform,
    collator: Collator,
    views: ViewSet,
    umask: Permissions,
    block_size: usize,
    max_size: Option<u64>,
    read_only: bool,
}

fn identity() -> NameTransform {
    Arc::new(str::to_owned)
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            name: "memory".to_owned(),
            separator: "/".to_owned(),
            roots: vec!["/".to_owned()],
            cwd: None,
            store_transform: identity(),
            lookup_transform: identity(),
            collator: Arc::new(str::cmp),
            views: ViewSet::empty(),
            umask: Permissions::empty(),
            block_size: 4096,
            max_size: None,
            read_only: false,
        }
    }
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A Unix-like filesystem: single `/` root, POSIX attributes.
    pub fn linux() -> Self {
        Self::new()
            .views(ViewSet::POSIX | ViewSet::OWNER | ViewSet::USER)
            .umask(Permissions::from_mode(0o022))
    }

    /// A Windows-like filesystem: `C:\` root, backslash separator,
    /// case-insensitive lookup, DOS attributes.
    pub fn windows() -> Self {
        Self::new()
            .separator("\\")
            .roots(["C:\\"])
            .case_insensitive()
            .views(ViewSet::DOS | ViewSet::OWNER | ViewSet::USER)
    }

    /// A macOS-like filesystem: `/` root, case-insensitive lookup with
    /// case-preserving display, POSIX attributes.
    pub fn osx() -> Self {
        Self::linux().case_insensitive()
    }

    /// Filesystem key, used to order cross-instance two-path operations.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Replaces the root set. Each root must end with the separator.
    pub fn roots<I, S>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roots = roots.into_iter().map(Into::into).collect();
        self
    }

    /// Absolute path used to resolve relative paths. Defaults to the first
    /// root.
    pub fn current_working_directory(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Transform deciding the canonical displayed name of a stored entry.
    pub fn store_transform(mut self, transform: NameTransform) -> Self {
        self.store_transform = transform;
        self
    }

    /// Transform deriving directory map keys; a folding transform makes the
    /// filesystem case-insensitive.
    pub fn lookup_transform(mut self, transform: NameTransform) -> Self {
        self.lookup_transform = transform;
        self
    }

    /// Case-insensitive lookup with case-preserving display names.
    pub fn case_insensitive(self) -> Self {
        self.lookup_transform(Arc::new(str::to_lowercase))
    }

    pub fn collator(mut self, collator: Collator) -> Self {
        self.collator = collator;
        self
    }

    pub fn views(mut self, views: ViewSet) -> Self {
        self.views = views;
        self
    }

    pub fn umask(mut self, umask: Permissions) -> Self {
        self.umask = umask;
        self
    }

    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Byte ceiling for the whole store; allocation past it fails.
    pub fn max_size(mut self, max_size: u64) -> Self {
        self.max_size = Some(max_size);
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn build(self) -> VfsResult<MemoryFileSystem> {
        if self.separator.is_empty() {
            return Err(VfsError::InvalidArgument("empty separator".into()));
        }
        if self.roots.is_empty() {
            return Err(VfsError::InvalidArgument(
                "at least one root is required".into(),
            ));
        }
        for root in &self.roots {
            let Some(prefix) = root.strip_suffix(&self.separator) else {
                return Err(VfsError::InvalidArgument(format!(
                    "root {root:?} does not end with separator {:?}",
                    self.separator
                )));
            };
            if prefix.contains(&self.separator) {
                return Err(VfsError::InvalidArgument(format!(
                    "root {root:?} contains the separator"
                )));
            }
        }
        if self.block_size == 0 {
            return Err(VfsError::InvalidArgument("zero block size".into()));
        }
        let mut views = self.views;
        if views.contains(ViewSet::POSIX) {
            views |= ViewSet::OWNER;
        }
        let cwd = self.cwd.unwrap_or_else(|| self.roots[0].clone());
        MemoryFileSystem::from_config(Config {
            name: self.name,
            separator: Arc::from(self.separator.as_str()),
            roots: self.roots,
            cwd,
            store_transform: self.store_transform,
            lookup_transform: self.lookup_transform,
            collator: self.collator,
            views,
            umask: self.umask,
            block_size: self.block_size,
            max_size: self.max_size,
            read_only: self.read_only,
        })
    }
}
