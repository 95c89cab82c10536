//! The user-defined view: a name to byte-array map per entry.

use crate::fs::MemoryFileSystem;
use crate::node::EntryState;
use crate::path::VfsPath;
use crate::types::AttrValue;
use crate::VfsResult;

pub(crate) fn read(state: &EntryState, name: &str) -> Option<AttrValue> {
    state
        .attrs
        .user
        .get(name)
        .map(|bytes| AttrValue::Bytes(bytes.to_vec()))
}

pub(crate) fn set(state: &mut EntryState, name: &str, value: &AttrValue) -> VfsResult<()> {
    let bytes = value.expect_bytes(name)?;
    state
        .attrs
        .user
        .insert(name.to_owned(), bytes.into_boxed_slice());
    Ok(())
}

/// Typed handle on the user-defined view of one path.
pub struct UserView {
    fs: MemoryFileSystem,
    path: VfsPath,
}

impl UserView {
    pub(crate) fn new(fs: MemoryFileSystem, path: VfsPath) -> Self {
        Self { fs, path }
    }

    /// Names of all attributes present, in no particular order.
    pub fn list(&self) -> VfsResult<Vec<String>> {
        self.fs.list_user_attributes(&self.path)
    }

    /// Size in bytes of one attribute value.
    pub fn size(&self, name: &str) -> VfsResult<u64> {
        self.fs.user_attribute_size(&self.path, name)
    }

    /// Reads an attribute value into `buf`; fails if `buf` is too small.
    /// Returns the number of bytes copied.
    pub fn read(&self, name: &str, buf: &mut [u8]) -> VfsResult<usize> {
        self.fs.read_user_attribute(&self.path, name, buf)
    }

    pub fn write(&self, name: &str, value: &[u8]) -> VfsResult<()> {
        self.fs.write_user_attribute(&self.path, name, value)
    }

    pub fn delete(&self, name: &str) -> VfsResult<()> {
        self.fs.delete_user_attribute(&self.path, name)
    }
}
