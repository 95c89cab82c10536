//! Symbolic-link payload.

use crate::path::VfsPath;

/// The target a symlink points at, stored as parsed: an optional root plus
/// an element sequence. Resolution happens at traversal time; the target
/// need not exist.
pub(crate) struct LinkTarget {
    target: VfsPath,
}

impl LinkTarget {
    pub(crate) fn new(target: VfsPath) -> Self {
        Self { target }
    }

    pub(crate) fn target(&self) -> &VfsPath {
        &self.target
    }
}
