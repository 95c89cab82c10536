//! The filesystem façade: roots, configuration, and every operation.

use std::cmp::Ordering as CmpOrdering;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use hashbrown::HashMap;
use indexmap::IndexMap;
use inherit_methods_macro::inherit_methods;
use log::trace;
use parking_lot::RawRwLock;
use parking_lot::RwLock;
use parking_lot::lock_api::ArcRwLockWriteGuard;
use smallvec::SmallVec;

use crate::attr::{
    self, AttrState, BasicAttributes, BasicView, DosAttributes, DosView, OwnerView,
    PosixAttributes, PosixView, UserView,
};
use crate::channel::FileChannel;
use crate::config::{Builder, Config, ViewSet};
use crate::lock::{EntryGuard, HeldLocks, LockMode};
use crate::node::{DirStream, Entry, EntryState, NodeKind, StoreLimits};
use crate::path::VfsPath;
use crate::types::{
    AccessMode, AttrValue, CopyFlags, OpenOptions, Permissions, Principal,
};
use crate::{VfsError, VfsResult};

/// Capacity snapshot of the backing store.
#[derive(Debug, Clone)]
pub struct StoreInfo {
    pub name: String,
    pub block_size: usize,
    pub allocated_bytes: u64,
    pub max_bytes: Option<u64>,
}

type OrderingGuard = ArcRwLockWriteGuard<RawRwLock, ()>;

#[derive(Clone, Copy, PartialEq)]
enum TransferOp {
    Copy,
    Move,
}

pub(crate) struct FsState {
    config: Config,
    /// Canonical root key to root directory, in configuration order.
    roots: IndexMap<String, Entry>,
    /// lookup(root key) to canonical root key.
    root_lookup: HashMap<String, String>,
    cwd: VfsPath,
    limits: Arc<StoreLimits>,
    /// Two-path operations hold this in write mode, deletes in read mode.
    ordering: Arc<RwLock<()>>,
    open: AtomicBool,
}

impl FsState {
    pub(crate) fn lookup_key(&self, raw: &str) -> String {
        (self.config.lookup_transform)(raw)
    }

    pub(crate) fn store_name(&self, raw: &str) -> String {
        (self.config.store_transform)(raw)
    }

    pub(crate) fn separator_arc(&self) -> &Arc<str> {
        &self.config.separator
    }

    pub(crate) fn name(&self) -> &str {
        &self.config.name
    }

    pub(crate) fn separator(&self) -> &str {
        &self.config.separator
    }

    pub(crate) fn is_read_only(&self) -> bool {
        self.config.read_only
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.load(AtomicOrdering::Acquire)
    }

    pub(crate) fn supported_views(&self) -> ViewSet {
        self.config.views
    }

    pub(crate) fn check_open(&self) -> VfsResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(VfsError::Closed)
        }
    }

    fn check_writable(&self) -> VfsResult<()> {
        self.check_open()?;
        if self.config.read_only {
            Err(VfsError::ReadOnly)
        } else {
            Ok(())
        }
    }

    pub(crate) fn canonical_root(&self, root: &str, context: &VfsPath) -> VfsResult<String> {
        self.root_lookup
            .get(&self.lookup_key(root))
            .cloned()
            .ok_or_else(|| VfsError::NotFound(context.to_string()))
    }

    /// Root directory by canonical root key.
    pub(crate) fn root_dir(&self, root: &str, context: &VfsPath) -> VfsResult<Entry> {
        self.roots
            .get(root)
            .cloned()
            .ok_or_else(|| VfsError::NotFound(context.to_string()))
    }

    /// Splits a raw string on the separator, detecting a root prefix. No
    /// working-directory resolution and no normalization.
    fn parse_components(&self, raw: &str) -> VfsPath {
        let separator: &str = &self.config.separator;
        let matched = self
            .roots
            .keys()
            .filter(|root| {
                raw.get(..root.len())
                    .is_some_and(|prefix| self.lookup_key(prefix) == self.lookup_key(root))
            })
            .max_by_key(|root| root.len());
        let elements = |rest: &str| -> Vec<String> {
            rest.split(separator)
                .filter(|element| !element.is_empty())
                .map(str::to_owned)
                .collect()
        };
        match matched {
            Some(root) => VfsPath::absolute(
                root.clone(),
                elements(&raw[root.len()..]),
                self.config.separator.clone(),
            ),
            None => VfsPath::relative(elements(raw), self.config.separator.clone()),
        }
    }

    /// Parses a raw string, resolves it against the working directory when
    /// relative, and normalizes it.
    pub(crate) fn parse_path(&self, raw: &str) -> VfsResult<VfsPath> {
        let parsed = self.parse_components(raw);
        let absolute = if parsed.is_absolute() {
            parsed
        } else {
            self.cwd.join(&parsed)
        };
        Ok(absolute.normalized())
    }

    /// Removes a file at channel close time; unlike `delete` this succeeds
    /// on open files, tombstoning them for reclamation at last close.
    pub(crate) fn unlink_for_close(&self, path: &VfsPath) -> VfsResult<()> {
        self.delete_at(path, true)
    }

    fn delete_at(&self, path: &VfsPath, for_close: bool) -> VfsResult<()> {
        self.check_writable()?;
        let _ordering = self.ordering.read_arc();
        let mut resolved = self.resolve_parent(path, LockMode::Write)?;
        let parent_index = resolved.stack.len() - 1;
        let victim = resolved
            .stack
            .state(parent_index)
            .as_dir(path)?
            .get_or_fail(&resolved.lookup_key, path)?;
        resolved
            .stack
            .push(EntryGuard::acquire(&victim, LockMode::Write));
        let victim_index = parent_index + 1;
        {
            let state = resolved.stack.state(victim_index);
            match &state.kind {
                NodeKind::Directory(children) => children.check_empty(path)?,
                NodeKind::File(content) => {
                    if !for_close && content.open_count() > 0 {
                        return Err(VfsError::Busy(path.to_string()));
                    }
                }
                NodeKind::Symlink(_) => {}
            }
        }
        if let NodeKind::File(content) = &mut resolved.stack.state_mut(victim_index)?.kind {
            content.mark_deleted();
        }
        let parent = resolved.stack.state_mut(parent_index)?;
        parent.as_dir_mut(path)?.remove(&resolved.lookup_key);
        parent.times.touch_modified();
        Ok(())
    }

    /// Builds a copy of `source` living in this filesystem's store.
    /// Directories are copied empty. With `with_attrs` the timestamps and
    /// the attributes of every view this filesystem configures come along;
    /// otherwise the copy starts with fresh creation state.
    fn duplicate_entry(
        &self,
        source: &EntryState,
        display: String,
        with_attrs: bool,
    ) -> VfsResult<Entry> {
        let (kind, perms) = match &source.kind {
            NodeKind::File(content) => (
                NodeKind::File(content.duplicate(self.config.block_size, &self.limits)?),
                self.config.default_file_permissions(),
            ),
            NodeKind::Directory(_) => (
                NodeKind::Directory(Default::default()),
                self.config.default_dir_permissions(),
            ),
            NodeKind::Symlink(link) => (
                NodeKind::Symlink(crate::node::LinkTarget::new(link.target().clone())),
                Permissions::from_mode(0o777),
            ),
        };
        let entry = Entry::from_kind(display, AttrState::new(perms), kind);
        if with_attrs {
            let mut state = entry.write();
            state.times.created = source.times.created;
            state.times.modified = source.times.modified;
            state.times.accessed = source.times.accessed;
            let views = self.config.views;
            if views.contains(ViewSet::OWNER) {
                state.attrs.owner = source.attrs.owner.clone();
            }
            if views.contains(ViewSet::POSIX) {
                state.attrs.group = source.attrs.group.clone();
                state.attrs.perms = source.attrs.perms;
            }
            if views.contains(ViewSet::DOS) {
                state.attrs.dos = source.attrs.dos;
            }
            if views.contains(ViewSet::USER) {
                state.attrs.user = source.attrs.user.clone();
            }
        }
        Ok(entry)
    }
}

/// An in-process, in-memory filesystem.
///
/// Handles are cheap to clone and share one store. Construction goes
/// through [`Builder`]; see the crate docs for the data and locking model.
pub struct MemoryFileSystem {
    state: Arc<FsState>,
}

impl Clone for MemoryFileSystem {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

#[inherit_methods(from = "self.state")]
impl MemoryFileSystem {
    /// The filesystem key, used to order cross-instance operations.
    pub fn name(&self) -> &str;

    pub fn separator(&self) -> &str;

    pub fn is_read_only(&self) -> bool;

    pub fn is_open(&self) -> bool;

    /// The attribute views this filesystem was built with, beyond basic.
    pub fn supported_views(&self) -> ViewSet;
}

impl MemoryFileSystem {
    pub fn builder() -> Builder {
        Builder::new()
    }

    pub(crate) fn from_config(config: Config) -> VfsResult<Self> {
        let limits = Arc::new(StoreLimits::new(config.max_size));
        let mut roots = IndexMap::new();
        let mut root_lookup = HashMap::new();
        for root in &config.roots {
            let key = (config.lookup_transform)(root);
            if root_lookup.insert(key, root.clone()).is_some() {
                return Err(VfsError::InvalidArgument(format!(
                    "duplicate root: {root:?}"
                )));
            }
            let perms = config.default_dir_permissions();
            roots.insert(
                root.clone(),
                Entry::new_directory(root.clone(), AttrState::new(perms)),
            );
        }
        let placeholder = VfsPath::absolute(
            config.roots[0].clone(),
            Vec::new(),
            config.separator.clone(),
        );
        let raw_cwd = config.cwd.clone();
        let mut state = FsState {
            config,
            roots,
            root_lookup,
            cwd: placeholder,
            limits,
            ordering: Arc::new(RwLock::new(())),
            open: AtomicBool::new(true),
        };
        let cwd = state.parse_components(&raw_cwd).normalized();
        if !cwd.is_absolute() {
            return Err(VfsError::InvalidArgument(format!(
                "working directory must be absolute: {raw_cwd:?}"
            )));
        }
        state.canonical_root(cwd.root().unwrap_or_default(), &cwd)?;
        state.cwd = cwd;
        Ok(Self {
            state: Arc::new(state),
        })
    }

    /// Parses a raw path string against this filesystem's separator and
    /// roots; relative paths resolve against the working directory. The
    /// result is absolute and normalized.
    pub fn path(&self, raw: &str) -> VfsResult<VfsPath> {
        self.state.check_open()?;
        self.state.parse_path(raw)
    }

    /// Parses a raw string without resolving it against the working
    /// directory, preserving relativeness. Useful for symlink targets that
    /// should resolve against the link's own directory.
    pub fn relative_path(&self, raw: &str) -> VfsResult<VfsPath> {
        self.state.check_open()?;
        Ok(self.state.parse_components(raw).normalized())
    }

    /// The configured roots, in configuration order.
    pub fn roots(&self) -> Vec<VfsPath> {
        self.state
            .roots
            .keys()
            .map(|root| {
                VfsPath::absolute(root.clone(), Vec::new(), self.state.separator_arc().clone())
            })
            .collect()
    }

    pub fn store_info(&self) -> StoreInfo {
        StoreInfo {
            name: self.state.config.name.clone(),
            block_size: self.state.config.block_size,
            allocated_bytes: self.state.limits.allocated(),
            max_bytes: self.state.limits.max(),
        }
    }

    /// Closes the filesystem. Idempotent; all further operations (on the
    /// filesystem and on its channels) fail with `Closed`.
    pub fn close(&self) {
        if self.state.open.swap(false, AtomicOrdering::AcqRel) {
            trace!("{}: closed", self.state.config.name);
        }
    }

    /// Compiles a `glob:` or `regex:` matcher against this filesystem's
    /// separator.
    pub fn path_matcher(&self, expr: &str) -> VfsResult<crate::matcher::PathMatcher> {
        self.state.check_open()?;
        crate::matcher::PathMatcher::compile(expr, self.state.separator())
    }

    // --- creation -------------------------------------------------------

    pub fn create_directory(&self, path: &VfsPath, attrs: &[(&str, AttrValue)]) -> VfsResult<()> {
        self.create_entry(path, attrs, |display, config| {
            Entry::new_directory(display, AttrState::new(config.default_dir_permissions()))
        })
    }

    pub fn create_file(&self, path: &VfsPath, attrs: &[(&str, AttrValue)]) -> VfsResult<()> {
        let limits = self.state.limits.clone();
        self.create_entry(path, attrs, move |display, config| {
            Entry::new_file(
                display,
                AttrState::new(config.default_file_permissions()),
                config.block_size,
                limits.clone(),
            )
        })
    }

    /// Creates a symlink at `path` pointing at `target`. The target need
    /// not exist and is not resolved.
    pub fn create_symlink(
        &self,
        path: &VfsPath,
        target: &VfsPath,
        attrs: &[(&str, AttrValue)],
    ) -> VfsResult<()> {
        let target = target.clone();
        self.create_entry(path, attrs, move |display, _config| {
            Entry::new_symlink(
                display,
                AttrState::new(Permissions::from_mode(0o777)),
                target.clone(),
            )
        })
    }

    fn create_entry(
        &self,
        path: &VfsPath,
        attrs: &[(&str, AttrValue)],
        build: impl Fn(String, &Config) -> Entry,
    ) -> VfsResult<()> {
        self.state.check_writable()?;
        trace!("create {path}");
        let mut resolved = self.state.resolve_parent(path, LockMode::Write)?;
        let parent_index = resolved.stack.len() - 1;
        if resolved
            .stack
            .state(parent_index)
            .as_dir(path)?
            .get(&resolved.lookup_key)
            .is_some()
        {
            return Err(VfsError::AlreadyExists(path.to_string()));
        }
        let entry = build(resolved.display.clone(), &self.state.config);
        {
            let mut state = entry.write();
            for (spec, value) in attrs {
                attr::set_attribute(&mut state, self.state.config.views, spec, value, true)?;
            }
        }
        let parent = resolved.stack.state_mut(parent_index)?;
        parent
            .as_dir_mut(path)?
            .add(resolved.insert_key.clone(), entry, path)?;
        parent.times.touch_modified();
        Ok(())
    }

    // --- channels -------------------------------------------------------

    /// Opens a byte channel on the file at `path`, creating it when the
    /// options ask for that. Symlinks are followed.
    pub fn open(&self, path: &VfsPath, options: OpenOptions) -> VfsResult<FileChannel> {
        self.open_with(path, options, &[])
    }

    /// Like [`open`](Self::open), with initial attributes applied when the
    /// call creates the file.
    pub fn open_with(
        &self,
        path: &VfsPath,
        options: OpenOptions,
        attrs: &[(&str, AttrValue)],
    ) -> VfsResult<FileChannel> {
        let options = options.normalized()?;
        self.state.check_open()?;
        if options.is_writable() || options.contains(OpenOptions::DELETE_ON_CLOSE) {
            self.state.check_writable()?;
        }
        trace!("open {path} ({options:?})");
        loop {
            match self.state.resolve_entry(path, LockMode::Write, true) {
                Ok(mut resolved) => {
                    if options.contains(OpenOptions::CREATE_NEW) {
                        return Err(VfsError::AlreadyExists(path.to_string()));
                    }
                    let index = resolved.stack.len() - 1;
                    {
                        let state = resolved.stack.state_mut(index)?;
                        let file = state.as_file_mut(path)?;
                        file.opened();
                        if options.contains(OpenOptions::TRUNCATE_EXISTING) && options.is_writable()
                        {
                            file.truncate(0);
                            state.times.touch_modified();
                        }
                    }
                    let canonical = VfsPath::absolute(
                        resolved.root.clone(),
                        resolved.trail.iter().cloned(),
                        self.state.separator_arc().clone(),
                    );
                    return Ok(FileChannel::new(
                        self.state.clone(),
                        resolved.entry.clone(),
                        canonical,
                        options,
                    ));
                }
                // CREATE is ignored when the channel is not opened for
                // writing.
                Err(VfsError::NotFound(_))
                    if options.contains(OpenOptions::CREATE) && options.is_writable() =>
                {
                    self.state.check_writable()?;
                    let mut resolved = self.state.resolve_parent(path, LockMode::Write)?;
                    let parent_index = resolved.stack.len() - 1;
                    if resolved
                        .stack
                        .state(parent_index)
                        .as_dir(path)?
                        .get(&resolved.lookup_key)
                        .is_some()
                    {
                        // Appeared while we were not looking; retry the
                        // plain open path.
                        continue;
                    }
                    let entry = Entry::new_file(
                        resolved.display.clone(),
                        AttrState::new(self.state.config.default_file_permissions()),
                        self.state.config.block_size,
                        self.state.limits.clone(),
                    );
                    {
                        let mut state = entry.write();
                        for (spec, value) in attrs {
                            attr::set_attribute(
                                &mut state,
                                self.state.config.views,
                                spec,
                                value,
                                true,
                            )?;
                        }
                        state.as_file_mut(path)?.opened();
                    }
                    let canonical = VfsPath::absolute(
                        resolved.root.clone(),
                        resolved
                            .trail
                            .iter()
                            .cloned()
                            .chain(std::iter::once(resolved.display.clone())),
                        self.state.separator_arc().clone(),
                    );
                    let parent = resolved.stack.state_mut(parent_index)?;
                    parent
                        .as_dir_mut(path)?
                        .add(resolved.insert_key.clone(), entry.clone(), path)?;
                    parent.times.touch_modified();
                    return Ok(FileChannel::new(
                        self.state.clone(),
                        entry,
                        canonical,
                        options,
                    ));
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// A read-only channel on an existing file.
    pub fn input_stream(&self, path: &VfsPath) -> VfsResult<FileChannel> {
        self.open(path, OpenOptions::READ)
    }

    /// A write channel that creates or truncates the file.
    pub fn output_stream(&self, path: &VfsPath) -> VfsResult<FileChannel> {
        self.open(
            path,
            OpenOptions::WRITE | OpenOptions::CREATE | OpenOptions::TRUNCATE_EXISTING,
        )
    }

    // --- deletion -------------------------------------------------------

    /// Deletes the entry at `path`. Non-empty directories and open files
    /// are rejected; a terminal symlink is removed, not followed.
    pub fn delete(&self, path: &VfsPath) -> VfsResult<()> {
        trace!("delete {path}");
        self.state.delete_at(path, false)
    }

    // --- two-path operations --------------------------------------------

    pub fn copy(&self, src: &VfsPath, dst: &VfsPath, flags: CopyFlags) -> VfsResult<()> {
        Self::transfer(self, src, self, dst, flags, TransferOp::Copy)
    }

    pub fn move_to(&self, src: &VfsPath, dst: &VfsPath, flags: CopyFlags) -> VfsResult<()> {
        Self::transfer(self, src, self, dst, flags, TransferOp::Move)
    }

    /// Copies between two filesystem instances.
    pub fn copy_between(
        src_fs: &MemoryFileSystem,
        src: &VfsPath,
        dst_fs: &MemoryFileSystem,
        dst: &VfsPath,
        flags: CopyFlags,
    ) -> VfsResult<()> {
        Self::transfer(src_fs, src, dst_fs, dst, flags, TransferOp::Copy)
    }

    /// Moves between two filesystem instances. Only files, symlinks and
    /// empty directories can change stores.
    pub fn move_between(
        src_fs: &MemoryFileSystem,
        src: &VfsPath,
        dst_fs: &MemoryFileSystem,
        dst: &VfsPath,
        flags: CopyFlags,
    ) -> VfsResult<()> {
        Self::transfer(src_fs, src, dst_fs, dst, flags, TransferOp::Move)
    }

    fn transfer(
        src_fs: &MemoryFileSystem,
        src: &VfsPath,
        dst_fs: &MemoryFileSystem,
        dst: &VfsPath,
        flags: CopyFlags,
        op: TransferOp,
    ) -> VfsResult<()> {
        let src_state = &src_fs.state;
        let dst_state = &dst_fs.state;
        let same_fs = Arc::ptr_eq(src_state, dst_state);
        dst_state.check_writable()?;
        if op == TransferOp::Move {
            src_state.check_writable()?;
        } else {
            src_state.check_open()?;
            if flags.contains(CopyFlags::ATOMIC_MOVE) {
                return Err(VfsError::NotSupported(
                    "ATOMIC_MOVE applies to moves only".into(),
                ));
            }
        }
        trace!(
            "{} {src} -> {dst}",
            if op == TransferOp::Move { "move" } else { "copy" }
        );

        // Freeze the ordering relation for the whole acquisition and
        // mutation phase.
        let _ordering = Self::acquire_ordering(src_state, dst_state);

        // Canonicalize both endpoints: resolve parent chains (and, for a
        // following copy, the source itself) to symlink-free trails. The
        // ordering write lock excludes deletes and other two-path
        // operations, so these trails stay valid below.
        let follow_source = op == TransferOp::Copy && !flags.contains(CopyFlags::NOFOLLOW_LINKS);
        let (src_parent_trail, src_root, src_leaf_key, src_leaf_name) = if follow_source {
            let resolved = src_state.resolve_entry(src, LockMode::Read, true)?;
            let mut trail = resolved.trail.clone();
            let root = resolved.root.clone();
            drop(resolved);
            let leaf = trail.pop().ok_or_else(|| {
                VfsError::InvalidArgument(format!("{src}: cannot copy a root directory"))
            })?;
            let key = src_state.lookup_key(&leaf);
            (trail, root, key, leaf)
        } else {
            let resolved = src_state.resolve_parent(src, LockMode::Read)?;
            (
                resolved.trail.clone(),
                resolved.root.clone(),
                resolved.lookup_key.clone(),
                resolved.display.clone(),
            )
        };
        let (dst_parent_trail, dst_root, dst_lookup, dst_insert, dst_display) = {
            let resolved = dst_state.resolve_parent(dst, LockMode::Read)?;
            (
                resolved.trail.clone(),
                resolved.root.clone(),
                resolved.lookup_key.clone(),
                resolved.insert_key.clone(),
                resolved.display.clone(),
            )
        };

        if same_fs && op == TransferOp::Move && src_root == dst_root {
            let mut src_full: Vec<String> = src_parent_trail
                .iter()
                .map(|name| src_state.lookup_key(name))
                .collect();
            src_full.push(src_leaf_key.clone());
            let dst_keys: Vec<String> = dst_parent_trail
                .iter()
                .map(|name| dst_state.lookup_key(name))
                .collect();
            if dst_keys.len() >= src_full.len() && dst_keys[..src_full.len()] == src_full[..] {
                return Err(VfsError::InvalidArgument(format!(
                    "{src}: cannot move an entry into its own subtree"
                )));
            }
        }

        // Total order over (filesystem key, parent path, element name).
        let source_first = Self::endpoint_order(
            src_state,
            &src_root,
            &src_parent_trail,
            &src_leaf_name,
            dst_state,
            &dst_root,
            &dst_parent_trail,
            &dst_display,
        ) != CmpOrdering::Greater;

        let mut held = HeldLocks::new();
        let (src_parent_index, dst_parent_index) = if source_first {
            let src_index =
                src_state.walk_parent_held(&mut held, &src_root, &src_parent_trail, src)?;
            let dst_index =
                dst_state.walk_parent_held(&mut held, &dst_root, &dst_parent_trail, dst)?;
            (src_index, dst_index)
        } else {
            let dst_index =
                dst_state.walk_parent_held(&mut held, &dst_root, &dst_parent_trail, dst)?;
            let src_index =
                src_state.walk_parent_held(&mut held, &src_root, &src_parent_trail, src)?;
            (src_index, dst_index)
        };

        let source_child = held
            .state(src_parent_index)
            .as_dir(src)?
            .get_or_fail(&src_leaf_key, src)?;
        let target_child = held
            .state(dst_parent_index)
            .as_dir(dst)?
            .get(&dst_lookup)
            .cloned();

        if let Some(target) = &target_child {
            if target.ptr_eq(&source_child) {
                return Ok(());
            }
            // A target already read-held sits on one of the parent chains:
            // it is a directory with descendants, so replacing it can only
            // end one way. Locking it for writing is neither possible nor
            // needed.
            if held.mode_of(target) == Some(LockMode::Read) {
                return Err(if flags.contains(CopyFlags::REPLACE_EXISTING) {
                    VfsError::DirectoryNotEmpty(dst.to_string())
                } else {
                    VfsError::AlreadyExists(dst.to_string())
                });
            }
        }

        // Lock the endpoint children in the same total order as their
        // parents; HeldLocks keeps shared entries single-locked.
        let source_mode = if op == TransferOp::Move {
            LockMode::Write
        } else {
            LockMode::Read
        };
        let lock_source = |held: &mut HeldLocks| -> VfsResult<usize> {
            match source_mode {
                LockMode::Write => held.write(&source_child),
                LockMode::Read => Ok(held.read(&source_child)),
            }
        };
        let lock_target = |held: &mut HeldLocks| -> VfsResult<Option<usize>> {
            match &target_child {
                Some(target) => Ok(Some(held.write(target)?)),
                None => Ok(None),
            }
        };
        let (source_index, target_index) = if source_first {
            let source_index = lock_source(&mut held)?;
            let target_index = lock_target(&mut held)?;
            (source_index, target_index)
        } else {
            let target_index = lock_target(&mut held)?;
            let source_index = lock_source(&mut held)?;
            (source_index, target_index)
        };

        if let Some(target_index) = target_index {
            if !flags.contains(CopyFlags::REPLACE_EXISTING) {
                return Err(VfsError::AlreadyExists(dst.to_string()));
            }
            {
                let state = held.state(target_index);
                match &state.kind {
                    NodeKind::Directory(children) => children.check_empty(dst)?,
                    NodeKind::File(content) => {
                        if content.open_count() > 0 {
                            return Err(VfsError::Busy(dst.to_string()));
                        }
                    }
                    NodeKind::Symlink(_) => {}
                }
            }
            if let NodeKind::File(content) = &mut held.state_mut(target_index)?.kind {
                content.mark_deleted();
            }
            let parent = held.state_mut(dst_parent_index)?;
            parent.as_dir_mut(dst)?.remove(&dst_lookup);
            parent.times.touch_modified();
        }

        match op {
            TransferOp::Move if same_fs => {
                held.state_mut(src_parent_index)?
                    .as_dir_mut(src)?
                    .remove(&src_leaf_key);
                held.state_mut(src_parent_index)?.times.touch_modified();
                held.state_mut(source_index)?.name = dst_display.clone();
                let parent = held.state_mut(dst_parent_index)?;
                parent
                    .as_dir_mut(dst)?
                    .add(dst_insert, source_child.clone(), dst)?;
                parent.times.touch_modified();
            }
            TransferOp::Move => {
                {
                    let state = held.state(source_index);
                    match &state.kind {
                        NodeKind::Directory(children) => children.check_empty(src)?,
                        NodeKind::File(content) => {
                            if content.open_count() > 0 {
                                return Err(VfsError::Busy(src.to_string()));
                            }
                        }
                        NodeKind::Symlink(_) => {}
                    }
                }
                let copy =
                    dst_state.duplicate_entry(held.state(source_index), dst_display, true)?;
                let parent = held.state_mut(dst_parent_index)?;
                parent.as_dir_mut(dst)?.add(dst_insert, copy, dst)?;
                parent.times.touch_modified();
                if let NodeKind::File(content) = &mut held.state_mut(source_index)?.kind {
                    content.mark_deleted();
                }
                let parent = held.state_mut(src_parent_index)?;
                parent.as_dir_mut(src)?.remove(&src_leaf_key);
                parent.times.touch_modified();
            }
            TransferOp::Copy => {
                let copy = dst_state.duplicate_entry(
                    held.state(source_index),
                    dst_display,
                    flags.contains(CopyFlags::COPY_ATTRIBUTES),
                )?;
                let parent = held.state_mut(dst_parent_index)?;
                parent.as_dir_mut(dst)?.add(dst_insert, copy, dst)?;
                parent.times.touch_modified();
            }
        }
        Ok(())
    }

    fn acquire_ordering(
        src: &Arc<FsState>,
        dst: &Arc<FsState>,
    ) -> SmallVec<[OrderingGuard; 2]> {
        let mut guards = SmallVec::new();
        if Arc::ptr_eq(src, dst) {
            guards.push(src.ordering.write_arc());
            return guards;
        }
        let src_key = (src.config.name.as_str(), Arc::as_ptr(src) as usize);
        let dst_key = (dst.config.name.as_str(), Arc::as_ptr(dst) as usize);
        if src_key <= dst_key {
            guards.push(src.ordering.write_arc());
            guards.push(dst.ordering.write_arc());
        } else {
            guards.push(dst.ordering.write_arc());
            guards.push(src.ordering.write_arc());
        }
        guards
    }

    #[allow(clippy::too_many_arguments)]
    fn endpoint_order(
        src_state: &Arc<FsState>,
        src_root: &str,
        src_parent: &[String],
        src_leaf: &str,
        dst_state: &Arc<FsState>,
        dst_root: &str,
        dst_parent: &[String],
        dst_leaf: &str,
    ) -> CmpOrdering {
        if !Arc::ptr_eq(src_state, dst_state) {
            let src_key = (src_state.config.name.as_str(), Arc::as_ptr(src_state) as usize);
            let dst_key = (dst_state.config.name.as_str(), Arc::as_ptr(dst_state) as usize);
            return src_key.cmp(&dst_key);
        }
        let collate = &src_state.config.collator;
        match src_root.cmp(dst_root) {
            CmpOrdering::Equal => {}
            unequal => return unequal,
        }
        for (a, b) in src_parent.iter().zip(dst_parent.iter()) {
            match collate(a, b) {
                CmpOrdering::Equal => {}
                unequal => return unequal,
            }
        }
        match src_parent.len().cmp(&dst_parent.len()) {
            CmpOrdering::Equal => collate(src_leaf, dst_leaf),
            unequal => unequal,
        }
    }

    // --- attributes -----------------------------------------------------

    /// Reads attributes per a spec like `"size"`, `"posix:*"` or
    /// `"dos:hidden,system"`.
    pub fn read_attributes(
        &self,
        path: &VfsPath,
        spec: &str,
        follow: bool,
    ) -> VfsResult<IndexMap<String, AttrValue>> {
        self.state.check_open()?;
        let resolved = self.state.resolve_entry(path, LockMode::Read, follow)?;
        let index = resolved.stack.len() - 1;
        attr::read_attributes(resolved.stack.state(index), self.state.config.views, spec)
    }

    /// Reads a single attribute.
    pub fn read_attribute(
        &self,
        path: &VfsPath,
        spec: &str,
        follow: bool,
    ) -> VfsResult<AttrValue> {
        self.state.check_open()?;
        let resolved = self.state.resolve_entry(path, LockMode::Read, follow)?;
        let index = resolved.stack.len() - 1;
        attr::read_attribute(resolved.stack.state(index), self.state.config.views, spec)
    }

    pub fn set_attribute(
        &self,
        path: &VfsPath,
        spec: &str,
        value: AttrValue,
        follow: bool,
    ) -> VfsResult<()> {
        self.state.check_writable()?;
        let mut resolved = self.state.resolve_entry(path, LockMode::Write, follow)?;
        let index = resolved.stack.len() - 1;
        attr::set_attribute(
            resolved.stack.state_mut(index)?,
            self.state.config.views,
            spec,
            &value,
            false,
        )
    }

    pub fn read_basic_attributes(
        &self,
        path: &VfsPath,
        follow: bool,
    ) -> VfsResult<BasicAttributes> {
        self.state.check_open()?;
        let resolved = self.state.resolve_entry(path, LockMode::Read, follow)?;
        let index = resolved.stack.len() - 1;
        Ok(BasicAttributes::from_state(resolved.stack.state(index)))
    }

    pub fn read_dos_attributes(&self, path: &VfsPath, follow: bool) -> VfsResult<DosAttributes> {
        self.state.check_open()?;
        attr::check_view(self.state.config.views, "dos")?;
        let resolved = self.state.resolve_entry(path, LockMode::Read, follow)?;
        let index = resolved.stack.len() - 1;
        Ok(DosAttributes::from_state(resolved.stack.state(index)))
    }

    pub fn read_posix_attributes(
        &self,
        path: &VfsPath,
        follow: bool,
    ) -> VfsResult<PosixAttributes> {
        self.state.check_open()?;
        attr::check_view(self.state.config.views, "posix")?;
        let resolved = self.state.resolve_entry(path, LockMode::Read, follow)?;
        let index = resolved.stack.len() - 1;
        Ok(PosixAttributes::from_state(resolved.stack.state(index)))
    }

    pub fn owner(&self, path: &VfsPath, follow: bool) -> VfsResult<Principal> {
        self.read_attribute(path, "owner:owner", follow)
            .and_then(|value| value.expect_principal("owner:owner"))
    }

    /// Sets all three timestamps atomically. Every argument is required;
    /// an absent one fails with `InvalidArgument` and nothing changes.
    pub fn set_times(
        &self,
        path: &VfsPath,
        created: Option<std::time::SystemTime>,
        modified: Option<std::time::SystemTime>,
        accessed: Option<std::time::SystemTime>,
    ) -> VfsResult<()> {
        self.set_times_inner(path, created, modified, accessed, true)
    }

    pub(crate) fn set_times_inner(
        &self,
        path: &VfsPath,
        created: Option<std::time::SystemTime>,
        modified: Option<std::time::SystemTime>,
        accessed: Option<std::time::SystemTime>,
        follow: bool,
    ) -> VfsResult<()> {
        self.state.check_writable()?;
        let (Some(created), Some(modified), Some(accessed)) = (created, modified, accessed) else {
            return Err(VfsError::InvalidArgument(
                "all three timestamps are required".into(),
            ));
        };
        let mut resolved = self.state.resolve_entry(path, LockMode::Write, follow)?;
        let index = resolved.stack.len() - 1;
        let state = resolved.stack.state_mut(index)?;
        state.times.created = created;
        state.times.modified = modified;
        state.times.accessed = accessed;
        Ok(())
    }

    pub fn basic_view(&self, path: &VfsPath, follow: bool) -> BasicView {
        BasicView::new(self.clone(), path.clone(), follow)
    }

    pub fn dos_view(&self, path: &VfsPath, follow: bool) -> VfsResult<DosView> {
        attr::check_view(self.state.config.views, "dos")?;
        Ok(DosView::new(self.clone(), path.clone(), follow))
    }

    pub fn owner_view(&self, path: &VfsPath, follow: bool) -> VfsResult<OwnerView> {
        attr::check_view(self.state.config.views, "owner")?;
        Ok(OwnerView::new(self.clone(), path.clone(), follow))
    }

    pub fn posix_view(&self, path: &VfsPath, follow: bool) -> VfsResult<PosixView> {
        attr::check_view(self.state.config.views, "posix")?;
        Ok(PosixView::new(self.clone(), path.clone(), follow))
    }

    pub fn user_view(&self, path: &VfsPath) -> VfsResult<UserView> {
        attr::check_view(self.state.config.views, "user")?;
        Ok(UserView::new(self.clone(), path.clone()))
    }

    // --- user-defined attributes ----------------------------------------

    pub fn list_user_attributes(&self, path: &VfsPath) -> VfsResult<Vec<String>> {
        self.state.check_open()?;
        attr::check_view(self.state.config.views, "user")?;
        let resolved = self.state.resolve_entry(path, LockMode::Read, true)?;
        let index = resolved.stack.len() - 1;
        Ok(resolved
            .stack
            .state(index)
            .attrs
            .user
            .keys()
            .cloned()
            .collect())
    }

    pub fn user_attribute_size(&self, path: &VfsPath, name: &str) -> VfsResult<u64> {
        self.state.check_open()?;
        attr::check_view(self.state.config.views, "user")?;
        let resolved = self.state.resolve_entry(path, LockMode::Read, true)?;
        let index = resolved.stack.len() - 1;
        match resolved.stack.state(index).attrs.user.get(name) {
            Some(bytes) => Ok(bytes.len() as u64),
            None => Err(VfsError::InvalidArgument(format!(
                "no such user attribute: {name}"
            ))),
        }
    }

    /// Copies a user attribute value into `buf`; fails if `buf` cannot
    /// hold it. Returns the number of bytes copied.
    pub fn read_user_attribute(
        &self,
        path: &VfsPath,
        name: &str,
        buf: &mut [u8],
    ) -> VfsResult<usize> {
        self.state.check_open()?;
        attr::check_view(self.state.config.views, "user")?;
        let resolved = self.state.resolve_entry(path, LockMode::Read, true)?;
        let index = resolved.stack.len() - 1;
        let state = resolved.stack.state(index);
        let bytes = state.attrs.user.get(name).ok_or_else(|| {
            VfsError::InvalidArgument(format!("no such user attribute: {name}"))
        })?;
        if buf.len() < bytes.len() {
            return Err(VfsError::InvalidArgument(format!(
                "buffer of {} bytes cannot hold attribute of {} bytes",
                buf.len(),
                bytes.len()
            )));
        }
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(bytes.len())
    }

    pub fn write_user_attribute(
        &self,
        path: &VfsPath,
        name: &str,
        value: &[u8],
    ) -> VfsResult<()> {
        self.set_attribute(
            path,
            &format!("user:{name}"),
            AttrValue::Bytes(value.to_vec()),
            true,
        )
    }

    pub fn delete_user_attribute(&self, path: &VfsPath, name: &str) -> VfsResult<()> {
        self.state.check_writable()?;
        attr::check_view(self.state.config.views, "user")?;
        let mut resolved = self.state.resolve_entry(path, LockMode::Write, true)?;
        let index = resolved.stack.len() - 1;
        let state = resolved.stack.state_mut(index)?;
        if state.attrs.user.remove(name).is_none() {
            return Err(VfsError::InvalidArgument(format!(
                "no such user attribute: {name}"
            )));
        }
        Ok(())
    }

    // --- queries --------------------------------------------------------

    /// Checks that the entry exists and that each requested mode is
    /// grantable. Write access on a read-only filesystem fails `ReadOnly`.
    pub fn check_access(&self, path: &VfsPath, modes: &[AccessMode]) -> VfsResult<()> {
        self.state.check_open()?;
        let _resolved = self.state.resolve_entry(path, LockMode::Read, true)?;
        if modes.contains(&AccessMode::Write) && self.state.config.read_only {
            return Err(VfsError::ReadOnly);
        }
        Ok(())
    }

    /// Whether an entry exists at `path`. Resolution failures other than
    /// a missing or mismatched component propagate.
    pub fn exists(&self, path: &VfsPath, follow: bool) -> VfsResult<bool> {
        self.state.check_open()?;
        match self.state.resolve_entry(path, LockMode::Read, follow) {
            Ok(_) => Ok(true),
            Err(VfsError::NotFound(_) | VfsError::NotADirectory(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// The absolute, normalized, display-cased path of the entry, with
    /// symlinks expanded when `follow` is set.
    pub fn real_path(&self, path: &VfsPath, follow: bool) -> VfsResult<VfsPath> {
        self.state.check_open()?;
        let resolved = self.state.resolve_entry(path, LockMode::Read, follow)?;
        Ok(VfsPath::absolute(
            resolved.root.clone(),
            resolved.trail.iter().cloned(),
            self.state.separator_arc().clone(),
        ))
    }

    /// The stored target of the symlink at `path`.
    pub fn read_symlink(&self, path: &VfsPath) -> VfsResult<VfsPath> {
        self.state.check_open()?;
        let resolved = self.state.resolve_entry(path, LockMode::Read, false)?;
        let index = resolved.stack.len() - 1;
        resolved
            .stack
            .state(index)
            .symlink_target()
            .cloned()
            .ok_or_else(|| {
                VfsError::InvalidArgument(format!("{path}: not a symbolic link"))
            })
    }

    /// A stream over the child paths of the directory at `path`, in
    /// insertion order. Child names are snapshotted now; the stream holds
    /// no lock afterwards.
    pub fn read_dir(&self, path: &VfsPath) -> VfsResult<DirStream> {
        self.read_dir_inner(path, None)
    }

    /// Like [`read_dir`](Self::read_dir), yielding only paths accepted by
    /// `filter`.
    pub fn read_dir_filtered<F>(&self, path: &VfsPath, filter: F) -> VfsResult<DirStream>
    where
        F: Fn(&VfsPath) -> bool + 'static,
    {
        self.read_dir_inner(path, Some(Box::new(filter)))
    }

    fn read_dir_inner(
        &self,
        path: &VfsPath,
        filter: Option<Box<dyn Fn(&VfsPath) -> bool>>,
    ) -> VfsResult<DirStream> {
        self.state.check_open()?;
        let mut resolved = self.state.resolve_entry(path, LockMode::Write, true)?;
        let index = resolved.stack.len() - 1;
        let names: Vec<String> = {
            let state = resolved.stack.state(index);
            let children = state.as_dir(path)?;
            children
                .entries()
                .map(|child| child.read().name.clone())
                .collect()
        };
        if !self.state.config.read_only {
            resolved.stack.state_mut(index)?.times.touch_accessed();
        }
        Ok(DirStream::new(path.normalized(), names, filter))
    }
}
