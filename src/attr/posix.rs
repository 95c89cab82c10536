//! The POSIX view: owner, group and the nine-bit permission set.

use super::basic::BasicAttributes;
use crate::fs::MemoryFileSystem;
use crate::node::EntryState;
use crate::path::VfsPath;
use crate::types::{AttrValue, Permissions, Principal};
use crate::VfsResult;

pub(crate) const NAMES: &[&str] = &["permissions", "group"];

pub(crate) fn read(state: &EntryState, name: &str) -> Option<AttrValue> {
    match name {
        "permissions" => Some(AttrValue::Permissions(state.attrs.perms)),
        "group" => Some(AttrValue::Principal(state.attrs.group.clone())),
        _ => None,
    }
}

pub(crate) fn set(
    state: &mut EntryState,
    name: &str,
    value: &AttrValue,
    spec: &str,
) -> VfsResult<()> {
    match name {
        "permissions" => {
            state.attrs.perms = value.expect_permissions(spec)?;
            Ok(())
        }
        "group" => {
            state.attrs.group = value.expect_principal(spec)?;
            Ok(())
        }
        _ => super::owner::set(state, name, value, spec),
    }
}

/// Snapshot of the POSIX attributes of one entry.
#[derive(Debug, Clone)]
pub struct PosixAttributes {
    basic: BasicAttributes,
    owner: Principal,
    group: Principal,
    permissions: Permissions,
}

impl PosixAttributes {
    pub(crate) fn from_state(state: &EntryState) -> Self {
        Self {
            basic: BasicAttributes::from_state(state),
            owner: state.attrs.owner.clone(),
            group: state.attrs.group.clone(),
            permissions: state.attrs.perms,
        }
    }

    pub fn basic(&self) -> &BasicAttributes {
        &self.basic
    }

    pub fn owner(&self) -> &Principal {
        &self.owner
    }

    pub fn group(&self) -> &Principal {
        &self.group
    }

    pub fn permissions(&self) -> Permissions {
        self.permissions
    }
}

/// Typed handle on the POSIX view of one path.
pub struct PosixView {
    fs: MemoryFileSystem,
    path: VfsPath,
    follow: bool,
}

impl PosixView {
    pub(crate) fn new(fs: MemoryFileSystem, path: VfsPath, follow: bool) -> Self {
        Self { fs, path, follow }
    }

    pub fn read(&self) -> VfsResult<PosixAttributes> {
        self.fs.read_posix_attributes(&self.path, self.follow)
    }

    pub fn set_permissions(&self, permissions: Permissions) -> VfsResult<()> {
        self.fs.set_attribute(
            &self.path,
            "posix:permissions",
            AttrValue::Permissions(permissions),
            self.follow,
        )
    }

    pub fn set_group(&self, group: Principal) -> VfsResult<()> {
        self.fs.set_attribute(
            &self.path,
            "posix:group",
            AttrValue::Principal(group),
            self.follow,
        )
    }

    pub fn set_owner(&self, owner: Principal) -> VfsResult<()> {
        self.fs.set_attribute(
            &self.path,
            "posix:owner",
            AttrValue::Principal(owner),
            self.follow,
        )
    }
}
