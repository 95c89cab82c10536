//! Lock guards and the traversal release discipline.
//!
//! Traversals push owned guards onto a [`GuardStack`] as they descend and
//! the stack releases them in reverse acquisition order, on success or on
//! error. Two-path operations go through [`HeldLocks`], which additionally
//! guarantees that no entry is ever locked twice by the same operation,
//! even when one endpoint's parent chain runs through the other's.

use parking_lot::RawRwLock;
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use smallvec::SmallVec;

use crate::node::{Entry, EntryState};
use crate::{VfsError, VfsResult};

pub(crate) type EntryReadGuard = ArcRwLockReadGuard<RawRwLock, EntryState>;
pub(crate) type EntryWriteGuard = ArcRwLockWriteGuard<RawRwLock, EntryState>;

/// Lock mode decided per element at acquisition time; there is no upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LockMode {
    Read,
    Write,
}

/// An owned guard on one entry, in either mode.
pub(crate) enum EntryGuard {
    Read(EntryReadGuard),
    Write(EntryWriteGuard),
}

impl EntryGuard {
    pub(crate) fn acquire(entry: &Entry, mode: LockMode) -> Self {
        match mode {
            LockMode::Read => EntryGuard::Read(entry.read()),
            LockMode::Write => EntryGuard::Write(entry.write()),
        }
    }

    pub(crate) fn state(&self) -> &EntryState {
        match self {
            EntryGuard::Read(guard) => guard,
            EntryGuard::Write(guard) => guard,
        }
    }

    pub(crate) fn state_mut(&mut self) -> VfsResult<&mut EntryState> {
        match self {
            EntryGuard::Write(guard) => Ok(&mut **guard),
            EntryGuard::Read(_) => Err(VfsError::Io(
                "entry locked for reading where writing is required".into(),
            )),
        }
    }

    pub(crate) fn is_write(&self) -> bool {
        matches!(self, EntryGuard::Write(_))
    }
}

/// Stack of guards acquired along one walk, released in reverse order.
#[derive(Default)]
pub(crate) struct GuardStack {
    guards: SmallVec<[EntryGuard; 8]>,
}

impl GuardStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, guard: EntryGuard) {
        self.guards.push(guard);
    }

    pub(crate) fn len(&self) -> usize {
        self.guards.len()
    }

    pub(crate) fn last(&self) -> Option<&EntryGuard> {
        self.guards.last()
    }

    pub(crate) fn state(&self, index: usize) -> &EntryState {
        self.guards[index].state()
    }

    pub(crate) fn state_mut(&mut self, index: usize) -> VfsResult<&mut EntryState> {
        self.guards[index].state_mut()
    }

    pub(crate) fn release_all(&mut self) {
        while self.guards.pop().is_some() {}
    }
}

impl Drop for GuardStack {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Lock table for a two-path operation.
///
/// Acquisition goes through [`read`](Self::read) / [`write`](Self::write),
/// which return the guard of an already-held entry instead of locking it a
/// second time. Guards are released in reverse acquisition order on drop.
pub(crate) struct HeldLocks {
    guards: Vec<EntryGuard>,
    ids: Vec<usize>,
}

impl HeldLocks {
    pub(crate) fn new() -> Self {
        Self {
            guards: Vec::new(),
            ids: Vec::new(),
        }
    }

    fn find(&self, entry: &Entry) -> Option<usize> {
        let id = entry.id();
        self.ids.iter().position(|held| *held == id)
    }

    /// The mode in which `entry` is currently held, if at all.
    pub(crate) fn mode_of(&self, entry: &Entry) -> Option<LockMode> {
        self.find(entry).map(|index| {
            if self.guards[index].is_write() {
                LockMode::Write
            } else {
                LockMode::Read
            }
        })
    }

    /// Read-locks `entry`, or reuses the guard already held on it.
    pub(crate) fn read(&mut self, entry: &Entry) -> usize {
        if let Some(index) = self.find(entry) {
            return index;
        }
        self.guards.push(EntryGuard::Read(entry.read()));
        self.ids.push(entry.id());
        self.guards.len() - 1
    }

    /// Write-locks `entry`, or reuses a write guard already held on it.
    ///
    /// A read guard on the same entry means the acquisition order promised
    /// by the path ordering was violated; that is a protocol bug, not a
    /// caller error.
    pub(crate) fn write(&mut self, entry: &Entry) -> VfsResult<usize> {
        if let Some(index) = self.find(entry) {
            return if self.guards[index].is_write() {
                Ok(index)
            } else {
                Err(VfsError::Io(
                    "two-path lock ordering violated: write after read on one entry".into(),
                ))
            };
        }
        self.guards.push(EntryGuard::Write(entry.write()));
        self.ids.push(entry.id());
        Ok(self.guards.len() - 1)
    }

    pub(crate) fn state(&self, index: usize) -> &EntryState {
        self.guards[index].state()
    }

    pub(crate) fn state_mut(&mut self, index: usize) -> VfsResult<&mut EntryState> {
        self.guards[index].state_mut()
    }
}

impl Drop for HeldLocks {
    fn drop(&mut self) {
        while self.guards.pop().is_some() {
            self.ids.pop();
        }
    }
}
