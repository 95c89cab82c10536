//! Directory children and directory streams.

use indexmap::IndexMap;

use super::Entry;
use crate::path::VfsPath;
use crate::{VfsError, VfsResult};

/// Children of a directory, keyed by lookup-transformed name.
///
/// Insertion order is preserved and is the enumeration order. Display names
/// live on the child entries themselves.
#[derive(Default)]
pub(crate) struct DirChildren {
    children: IndexMap<String, Entry>,
}

impl DirChildren {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, key: &str) -> Option<&Entry> {
        self.children.get(key)
    }

    pub(crate) fn get_or_fail(&self, key: &str, path: &VfsPath) -> VfsResult<Entry> {
        self.children
            .get(key)
            .cloned()
            .ok_or_else(|| VfsError::NotFound(path.to_string()))
    }

    pub(crate) fn add(&mut self, key: String, entry: Entry, path: &VfsPath) -> VfsResult<()> {
        match self.children.entry(key) {
            indexmap::map::Entry::Occupied(_) => {
                Err(VfsError::AlreadyExists(path.to_string()))
            }
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
        }
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<Entry> {
        self.children.shift_remove(key)
    }

    pub(crate) fn check_empty(&self, path: &VfsPath) -> VfsResult<()> {
        if self.children.is_empty() {
            Ok(())
        } else {
            Err(VfsError::DirectoryNotEmpty(path.to_string()))
        }
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.children.values()
    }
}

/// A stream over the child paths of a directory.
///
/// The child names are snapshotted when the stream is opened; the stream
/// itself holds no lock, so mutations made after opening are not reflected.
pub struct DirStream {
    base: VfsPath,
    names: std::vec::IntoIter<String>,
    filter: Option<Box<dyn Fn(&VfsPath) -> bool>>,
}

impl DirStream {
    pub(crate) fn new(
        base: VfsPath,
        names: Vec<String>,
        filter: Option<Box<dyn Fn(&VfsPath) -> bool>>,
    ) -> Self {
        Self {
            base,
            names: names.into_iter(),
            filter,
        }
    }
}

impl Iterator for DirStream {
    type Item = VfsPath;

    fn next(&mut self) -> Option<VfsPath> {
        loop {
            let name = self.names.next()?;
            let path = self.base.child(&name);
            match &self.filter {
                Some(filter) if !filter(&path) => continue,
                _ => return Some(path),
            }
        }
    }
}
