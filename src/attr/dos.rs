//! The DOS view: read-only, hidden, system and archive flags.

use super::basic::BasicAttributes;
use crate::fs::MemoryFileSystem;
use crate::node::EntryState;
use crate::path::VfsPath;
use crate::types::{AttrValue, DosFlags};
use crate::VfsResult;

pub(crate) const NAMES: &[&str] = &["readonly", "hidden", "system", "archive"];

pub(crate) fn read(state: &EntryState, name: &str) -> Option<AttrValue> {
    let flag = flag_for(name)?;
    Some(AttrValue::Bool(state.attrs.dos.contains(flag)))
}

pub(crate) fn set(
    state: &mut EntryState,
    name: &str,
    value: &AttrValue,
    spec: &str,
) -> VfsResult<()> {
    match flag_for(name) {
        Some(flag) => {
            state.attrs.dos.set(flag, value.expect_bool(spec)?);
            Ok(())
        }
        None => super::basic::set(name, spec),
    }
}

fn flag_for(name: &str) -> Option<DosFlags> {
    match name {
        "readonly" => Some(DosFlags::READ_ONLY),
        "hidden" => Some(DosFlags::HIDDEN),
        "system" => Some(DosFlags::SYSTEM),
        "archive" => Some(DosFlags::ARCHIVE),
        _ => None,
    }
}

/// Snapshot of the DOS attributes of one entry.
#[derive(Debug, Clone)]
pub struct DosAttributes {
    basic: BasicAttributes,
    flags: DosFlags,
}

impl DosAttributes {
    pub(crate) fn from_state(state: &EntryState) -> Self {
        Self {
            basic: BasicAttributes::from_state(state),
            flags: state.attrs.dos,
        }
    }

    pub fn basic(&self) -> &BasicAttributes {
        &self.basic
    }

    pub fn is_read_only(&self) -> bool {
        self.flags.contains(DosFlags::READ_ONLY)
    }

    pub fn is_hidden(&self) -> bool {
        self.flags.contains(DosFlags::HIDDEN)
    }

    pub fn is_system(&self) -> bool {
        self.flags.contains(DosFlags::SYSTEM)
    }

    pub fn is_archive(&self) -> bool {
        self.flags.contains(DosFlags::ARCHIVE)
    }
}

/// Typed handle on the DOS view of one path.
pub struct DosView {
    fs: MemoryFileSystem,
    path: VfsPath,
    follow: bool,
}

impl DosView {
    pub(crate) fn new(fs: MemoryFileSystem, path: VfsPath, follow: bool) -> Self {
        Self { fs, path, follow }
    }

    pub fn read(&self) -> VfsResult<DosAttributes> {
        self.fs.read_dos_attributes(&self.path, self.follow)
    }

    pub fn set_read_only(&self, value: bool) -> VfsResult<()> {
        self.set_flag("dos:readonly", value)
    }

    pub fn set_hidden(&self, value: bool) -> VfsResult<()> {
        self.set_flag("dos:hidden", value)
    }

    pub fn set_system(&self, value: bool) -> VfsResult<()> {
        self.set_flag("dos:system", value)
    }

    pub fn set_archive(&self, value: bool) -> VfsResult<()> {
        self.set_flag("dos:archive", value)
    }

    fn set_flag(&self, spec: &str, value: bool) -> VfsResult<()> {
        self.fs
            .set_attribute(&self.path, spec, AttrValue::Bool(value), self.follow)
    }
}
