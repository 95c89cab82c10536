//! Entries: the nodes of the filesystem tree.
//!
//! An [`Entry`] is a cheap-clone handle over the node's guarded state. All
//! mutable state, the display name, timestamps, attributes, and the
//! kind-specific payload, lives behind one reader-writer lock per entry;
//! the traversal protocol in [`crate::resolve`] decides when that lock is
//! taken in read or write mode.

mod dir;
mod file;
mod symlink;

use std::sync::Arc;
use std::time::SystemTime;

pub use dir::DirStream;
pub(crate) use dir::DirChildren;
pub(crate) use file::{FileContent, StoreLimits};
pub(crate) use symlink::LinkTarget;

use parking_lot::RwLock;

use crate::attr::AttrState;
use crate::lock::{EntryReadGuard, EntryWriteGuard};
use crate::path::VfsPath;
use crate::types::EntryType;
use crate::{VfsError, VfsResult};

/// Handle to a filesystem node. Clones share the node; identity is pointer
/// identity.
pub(crate) struct Entry {
    state: Arc<RwLock<EntryState>>,
}

impl Clone for Entry {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl Entry {
    fn new(state: EntryState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub(crate) fn new_directory(name: String, attrs: AttrState) -> Self {
        Self::new(EntryState::new(name, attrs, NodeKind::Directory(DirChildren::new())))
    }

    pub(crate) fn new_file(
        name: String,
        attrs: AttrState,
        block_size: usize,
        limits: Arc<StoreLimits>,
    ) -> Self {
        Self::new(EntryState::new(
            name,
            attrs,
            NodeKind::File(FileContent::new(block_size, limits)),
        ))
    }

    pub(crate) fn new_symlink(name: String, attrs: AttrState, target: VfsPath) -> Self {
        Self::new(EntryState::new(
            name,
            attrs,
            NodeKind::Symlink(LinkTarget::new(target)),
        ))
    }

    pub(crate) fn from_kind(name: String, attrs: AttrState, kind: NodeKind) -> Self {
        Self::new(EntryState::new(name, attrs, kind))
    }

    pub(crate) fn read(&self) -> EntryReadGuard {
        self.state.read_arc()
    }

    pub(crate) fn write(&self) -> EntryWriteGuard {
        self.state.write_arc()
    }

    pub(crate) fn ptr_eq(&self, other: &Entry) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.state) as usize
    }
}

/// Creation, last-modified and last-access times. Monotonically
/// non-decreasing under the entry's write lock.
pub(crate) struct Timestamps {
    pub created: SystemTime,
    pub modified: SystemTime,
    pub accessed: SystemTime,
}

impl Timestamps {
    pub(crate) fn now() -> Self {
        let now = SystemTime::now();
        Self {
            created: now,
            modified: now,
            accessed: now,
        }
    }

    pub(crate) fn touch_modified(&mut self) {
        advance(&mut self.modified);
        advance(&mut self.accessed);
    }

    pub(crate) fn touch_accessed(&mut self) {
        advance(&mut self.accessed);
    }
}

fn advance(slot: &mut SystemTime) {
    let now = SystemTime::now();
    if now > *slot {
        *slot = now;
    }
}

/// Kind-specific payload of a node.
pub(crate) enum NodeKind {
    File(FileContent),
    Directory(DirChildren),
    Symlink(LinkTarget),
}

/// The guarded state of a node.
pub(crate) struct EntryState {
    pub name: String,
    pub times: Timestamps,
    pub attrs: AttrState,
    pub kind: NodeKind,
}

impl EntryState {
    fn new(name: String, attrs: AttrState, kind: NodeKind) -> Self {
        Self {
            name,
            times: Timestamps::now(),
            attrs,
            kind,
        }
    }

    pub(crate) fn entry_type(&self) -> EntryType {
        match &self.kind {
            NodeKind::File(_) => EntryType::RegularFile,
            NodeKind::Directory(_) => EntryType::Directory,
            NodeKind::Symlink(_) => EntryType::Symlink,
        }
    }

    pub(crate) fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory(_))
    }

    pub(crate) fn is_symlink(&self) -> bool {
        matches!(self.kind, NodeKind::Symlink(_))
    }

    pub(crate) fn as_dir(&self, path: &VfsPath) -> VfsResult<&DirChildren> {
        match &self.kind {
            NodeKind::Directory(children) => Ok(children),
            _ => Err(VfsError::NotADirectory(path.to_string())),
        }
    }

    pub(crate) fn as_dir_mut(&mut self, path: &VfsPath) -> VfsResult<&mut DirChildren> {
        match &mut self.kind {
            NodeKind::Directory(children) => Ok(children),
            _ => Err(VfsError::NotADirectory(path.to_string())),
        }
    }

    pub(crate) fn as_file(&self, path: &VfsPath) -> VfsResult<&FileContent> {
        match &self.kind {
            NodeKind::File(content) => Ok(content),
            _ => Err(VfsError::NotSupported(format!("{path}: not a regular file"))),
        }
    }

    pub(crate) fn as_file_mut(&mut self, path: &VfsPath) -> VfsResult<&mut FileContent> {
        match &mut self.kind {
            NodeKind::File(content) => Ok(content),
            _ => Err(VfsError::NotSupported(format!("{path}: not a regular file"))),
        }
    }

    pub(crate) fn symlink_target(&self) -> Option<&VfsPath> {
        match &self.kind {
            NodeKind::Symlink(link) => Some(link.target()),
            _ => None,
        }
    }

    pub(crate) fn file_size(&self) -> u64 {
        match &self.kind {
            NodeKind::File(content) => content.len(),
            _ => 0,
        }
    }
}
