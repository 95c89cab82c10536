//! Path resolution: the retained-lock tree walk.
//!
//! A walk acquires read locks from the root downward and a read or write
//! lock on the terminal entry, decided at acquisition time. Guards pile up
//! on a [`GuardStack`] and are released in reverse order when the walk's
//! result is dropped.
//!
//! Symlinks are chased by restarting: the walk releases every lock it
//! holds, splices the link target into the remaining elements, and starts
//! over from the target's root. An identity set of the symlink entries
//! already traversed turns cycles into a `Loop` error instead of an
//! endless restart chain.

use smallvec::SmallVec;

use crate::fs::FsState;
use crate::lock::{EntryGuard, GuardStack, HeldLocks, LockMode};
use crate::node::Entry;
use crate::path::VfsPath;
use crate::{VfsError, VfsResult};

/// A resolved terminal entry with every lock of the walk still held; the
/// terminal guard is the last on the stack.
pub(crate) struct Resolved {
    pub stack: GuardStack,
    pub entry: Entry,
    /// Canonical root key.
    pub root: String,
    /// Display names from the root to the terminal entry.
    pub trail: Vec<String>,
}

/// A resolved parent directory, locked per the requested mode, plus the
/// final path element in its three derived forms.
pub(crate) struct ResolvedParent {
    pub stack: GuardStack,
    pub root: String,
    pub trail: Vec<String>,
    /// Key for looking up an existing child: lookup(name).
    pub lookup_key: String,
    /// Key for inserting a new child: lookup(store(name)).
    pub insert_key: String,
    /// Display name for a newly stored child: store(name).
    pub display: String,
}

/// Identity set of symlink entries already followed in one resolution.
#[derive(Default)]
struct SeenLinks(SmallVec<[Entry; 4]>);

impl SeenLinks {
    fn insert(&mut self, entry: &Entry, path: &VfsPath) -> VfsResult<()> {
        if self.0.iter().any(|seen| seen.ptr_eq(entry)) {
            return Err(VfsError::Loop(path.to_string()));
        }
        self.0.push(entry.clone());
        Ok(())
    }
}

impl FsState {
    /// Resolves `path` to its terminal entry.
    ///
    /// Intermediate symlinks are always chased; `follow` decides whether a
    /// terminal symlink is chased too or returned as-is. The terminal is
    /// locked in `mode`, every ancestor in read mode.
    pub(crate) fn resolve_entry(
        &self,
        path: &VfsPath,
        mode: LockMode,
        follow: bool,
    ) -> VfsResult<Resolved> {
        let mut seen = SeenLinks::default();
        let (mut root, mut elements) = self.start_of(path)?;
        'restart: loop {
            let root_dir = self.root_dir(&root, path)?;
            let mut stack = GuardStack::new();
            let mut trail: Vec<String> = Vec::with_capacity(elements.len());
            if elements.is_empty() {
                stack.push(EntryGuard::acquire(&root_dir, mode));
                return Ok(Resolved {
                    stack,
                    entry: root_dir,
                    root,
                    trail,
                });
            }
            stack.push(EntryGuard::acquire(&root_dir, LockMode::Read));
            let mut current = root_dir;
            for i in 0..elements.len() {
                let terminal = i + 1 == elements.len();
                let key = self.lookup_key(&elements[i]);
                let child = {
                    let parent = stack.state(stack.len() - 1);
                    parent.as_dir(path)?.get_or_fail(&key, path)?
                };
                let child_mode = if terminal && mode == LockMode::Write {
                    LockMode::Write
                } else {
                    LockMode::Read
                };
                let guard = EntryGuard::acquire(&child, child_mode);
                if guard.state().is_symlink() && (!terminal || follow) {
                    seen.insert(&child, path)?;
                    let target = match guard.state().symlink_target() {
                        Some(target) => target.clone(),
                        None => return Err(VfsError::Io("symlink without a target".into())),
                    };
                    let rest: Vec<String> = elements[i + 1..].to_vec();
                    drop(guard);
                    stack.release_all();
                    (root, elements) = self.link_continuation(&root, &trail, &target, rest)?;
                    continue 'restart;
                }
                if !terminal && !guard.state().is_dir() {
                    return Err(VfsError::NotADirectory(path.to_string()));
                }
                trail.push(guard.state().name.clone());
                stack.push(guard);
                current = child;
            }
            return Ok(Resolved {
                stack,
                entry: current,
                root,
                trail,
            });
        }
    }

    /// Resolves the parent directory of `path`, locking it in `mode`, and
    /// derives the lookup, insertion and display forms of the final
    /// element. The final element itself is not resolved and need not
    /// exist.
    pub(crate) fn resolve_parent(
        &self,
        path: &VfsPath,
        mode: LockMode,
    ) -> VfsResult<ResolvedParent> {
        let name = path
            .file_name()
            .ok_or_else(|| {
                VfsError::InvalidArgument(format!("{path}: root has no parent directory"))
            })?
            .to_owned();
        let parent_path = match path.parent() {
            Some(parent) => parent,
            None => {
                return Err(VfsError::InvalidArgument(format!(
                    "{path}: root has no parent directory"
                )));
            }
        };
        let resolved = self.resolve_entry(&parent_path, mode, true)?;
        match resolved.stack.last() {
            Some(guard) => guard.state().as_dir(&parent_path)?,
            None => return Err(VfsError::Io("empty guard stack after walk".into())),
        };
        let display = self.store_name(&name);
        let insert_key = self.lookup_key(&display);
        let lookup_key = self.lookup_key(&name);
        Ok(ResolvedParent {
            stack: resolved.stack,
            root: resolved.root,
            trail: resolved.trail,
            lookup_key,
            insert_key,
            display,
        })
    }

    /// Walk used inside two-path operations: elements are an already
    /// canonical parent chain (no symlinks, no dot elements), locks go
    /// through the shared [`HeldLocks`] table, ancestors in read mode and
    /// the final directory in write mode. Returns the guard index of the
    /// parent.
    pub(crate) fn walk_parent_held(
        &self,
        held: &mut HeldLocks,
        root: &str,
        parent_elements: &[String],
        orig: &VfsPath,
    ) -> VfsResult<usize> {
        let root_dir = self.root_dir(root, orig)?;
        let mut current = root_dir;
        for element in parent_elements {
            let key = self.lookup_key(element);
            let index = held.read(&current);
            let child = held.state(index).as_dir(orig)?.get_or_fail(&key, orig)?;
            current = child;
        }
        let index = held.write(&current)?;
        held.state(index).as_dir(orig)?;
        Ok(index)
    }

    fn start_of(&self, path: &VfsPath) -> VfsResult<(String, Vec<String>)> {
        let root = path.root().ok_or_else(|| {
            VfsError::InvalidArgument(format!("{path}: absolute path required"))
        })?;
        Ok((self.canonical_root(root, path)?, path.elements().to_vec()))
    }

    /// Computes the restart point after hitting a symlink: the target is
    /// resolved against its own root when absolute, else against the
    /// symlink's parent (the trail walked so far), then the unconsumed
    /// elements are appended.
    fn link_continuation(
        &self,
        root: &str,
        trail: &[String],
        target: &VfsPath,
        rest: Vec<String>,
    ) -> VfsResult<(String, Vec<String>)> {
        let (new_root, base): (String, Vec<String>) = match target.root() {
            Some(target_root) => (
                self.canonical_root(target_root, target)?,
                target.elements().to_vec(),
            ),
            None => {
                let mut base = trail.to_vec();
                base.extend(target.elements().iter().cloned());
                (root.to_owned(), base)
            }
        };
        let normalized =
            VfsPath::absolute(new_root.clone(), base, self.separator_arc().clone()).normalized();
        let mut elements = normalized.elements().to_vec();
        elements.extend(rest);
        Ok((new_root, elements))
    }
}
