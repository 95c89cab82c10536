//! The owner view: the entry's user principal.

use crate::fs::MemoryFileSystem;
use crate::node::EntryState;
use crate::path::VfsPath;
use crate::types::{AttrValue, Principal};
use crate::VfsResult;

pub(crate) fn read(state: &EntryState, name: &str) -> Option<AttrValue> {
    (name == "owner").then(|| AttrValue::Principal(state.attrs.owner.clone()))
}

pub(crate) fn set(
    state: &mut EntryState,
    name: &str,
    value: &AttrValue,
    spec: &str,
) -> VfsResult<()> {
    if name == "owner" {
        state.attrs.owner = value.expect_principal(spec)?;
        Ok(())
    } else {
        super::basic::set(name, spec)
    }
}

/// Typed handle on the owner view of one path.
pub struct OwnerView {
    fs: MemoryFileSystem,
    path: VfsPath,
    follow: bool,
}

impl OwnerView {
    pub(crate) fn new(fs: MemoryFileSystem, path: VfsPath, follow: bool) -> Self {
        Self { fs, path, follow }
    }

    pub fn owner(&self) -> VfsResult<Principal> {
        self.fs.owner(&self.path, self.follow)
    }

    pub fn set_owner(&self, owner: Principal) -> VfsResult<()> {
        self.fs.set_attribute(
            &self.path,
            "owner:owner",
            AttrValue::Principal(owner),
            self.follow,
        )
    }
}
