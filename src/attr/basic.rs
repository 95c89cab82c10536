//! The basic view: entry kind, size and timestamps. Always available.

use std::time::SystemTime;

use crate::fs::MemoryFileSystem;
use crate::node::EntryState;
use crate::path::VfsPath;
use crate::types::{AttrValue, EntryType};
use crate::{VfsError, VfsResult};

pub(crate) const NAMES: &[&str] = &[
    "lastModifiedTime",
    "lastAccessTime",
    "creationTime",
    "size",
    "isRegularFile",
    "isDirectory",
    "isSymbolicLink",
    "isOther",
];

pub(crate) fn read(state: &EntryState, name: &str) -> Option<AttrValue> {
    let value = match name {
        "lastModifiedTime" => AttrValue::Time(state.times.modified),
        "lastAccessTime" => AttrValue::Time(state.times.accessed),
        "creationTime" => AttrValue::Time(state.times.created),
        "size" => AttrValue::Size(state.file_size()),
        "isRegularFile" => AttrValue::Bool(state.entry_type().is_regular_file()),
        "isDirectory" => AttrValue::Bool(state.entry_type().is_directory()),
        "isSymbolicLink" => AttrValue::Bool(state.entry_type().is_symlink()),
        "isOther" => AttrValue::Bool(false),
        _ => return None,
    };
    Some(value)
}

/// Basic attributes are read-only by name; timestamps change only through
/// the atomic all-three `set_times`.
pub(crate) fn set(name: &str, spec: &str) -> VfsResult<()> {
    if NAMES.contains(&name) {
        Err(VfsError::NotSupported(format!(
            "attribute cannot be set: {spec}"
        )))
    } else {
        Err(VfsError::InvalidArgument(format!(
            "no such attribute: {spec}"
        )))
    }
}

/// Snapshot of the basic attributes of one entry.
#[derive(Debug, Clone)]
pub struct BasicAttributes {
    entry_type: EntryType,
    size: u64,
    created: SystemTime,
    modified: SystemTime,
    accessed: SystemTime,
}

impl BasicAttributes {
    pub(crate) fn from_state(state: &EntryState) -> Self {
        Self {
            entry_type: state.entry_type(),
            size: state.file_size(),
            created: state.times.created,
            modified: state.times.modified,
            accessed: state.times.accessed,
        }
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn is_regular_file(&self) -> bool {
        self.entry_type.is_regular_file()
    }

    pub fn is_directory(&self) -> bool {
        self.entry_type.is_directory()
    }

    pub fn is_symlink(&self) -> bool {
        self.entry_type.is_symlink()
    }

    pub fn is_other(&self) -> bool {
        false
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn creation_time(&self) -> SystemTime {
        self.created
    }

    pub fn last_modified_time(&self) -> SystemTime {
        self.modified
    }

    pub fn last_access_time(&self) -> SystemTime {
        self.accessed
    }
}

/// Typed handle on the basic view of one path.
pub struct BasicView {
    fs: MemoryFileSystem,
    path: VfsPath,
    follow: bool,
}

impl BasicView {
    pub(crate) fn new(fs: MemoryFileSystem, path: VfsPath, follow: bool) -> Self {
        Self { fs, path, follow }
    }

    pub fn read(&self) -> VfsResult<BasicAttributes> {
        self.fs.read_basic_attributes(&self.path, self.follow)
    }

    /// Sets all three timestamps atomically. Every argument is required;
    /// an absent one fails with `InvalidArgument`.
    pub fn set_times(
        &self,
        created: Option<SystemTime>,
        modified: Option<SystemTime>,
        accessed: Option<SystemTime>,
    ) -> VfsResult<()> {
        self.fs
            .set_times_inner(&self.path, created, modified, accessed, self.follow)
    }
}
