use std::fmt;
use std::time::SystemTime;

use crate::{VfsError, VfsResult};

/// Filesystem entry kind.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EntryType {
    RegularFile,
    Directory,
    Symlink,
}

impl EntryType {
    pub fn is_regular_file(self) -> bool {
        matches!(self, EntryType::RegularFile)
    }

    pub fn is_directory(self) -> bool {
        matches!(self, EntryType::Directory)
    }

    pub fn is_symlink(self) -> bool {
        matches!(self, EntryType::Symlink)
    }
}

bitflags::bitflags! {
    /// POSIX permission set, one bit per (class, right) pair.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Permissions: u16 {
        /// Owner has read permission.
        const OWNER_READ = 0o400;
        /// Owner has write permission.
        const OWNER_WRITE = 0o200;
        /// Owner has execute permission.
        const OWNER_EXEC = 0o100;

        /// Group has read permission.
        const GROUP_READ = 0o40;
        /// Group has write permission.
        const GROUP_WRITE = 0o20;
        /// Group has execute permission.
        const GROUP_EXEC = 0o10;

        /// Others have read permission.
        const OTHER_READ = 0o4;
        /// Others have write permission.
        const OTHER_WRITE = 0o2;
        /// Others have execute permission.
        const OTHER_EXEC = 0o1;
    }
}

impl Permissions {
    /// Builds a permission set from an octal mode, ignoring non-permission
    /// bits.
    pub fn from_mode(mode: u16) -> Self {
        Self::from_bits_truncate(mode)
    }

    /// The octal mode corresponding to this set.
    pub fn mode(self) -> u16 {
        self.bits()
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::from_bits_truncate(0o666)
    }
}

bitflags::bitflags! {
    /// DOS attribute flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DosFlags: u8 {
        const READ_ONLY = 1;
        const HIDDEN = 1 << 1;
        const SYSTEM = 1 << 2;
        const ARCHIVE = 1 << 3;
    }
}

bitflags::bitflags! {
    /// Options recognized when opening a byte channel.
    ///
    /// `SYNC`, `DSYNC` and `SPARSE` are accepted and ignored; there is no
    /// stable storage to synchronize against and all files are sparse.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct OpenOptions: u16 {
        const READ = 1;
        const WRITE = 1 << 1;
        const APPEND = 1 << 2;
        const CREATE = 1 << 3;
        const CREATE_NEW = 1 << 4;
        const TRUNCATE_EXISTING = 1 << 5;
        const DELETE_ON_CLOSE = 1 << 6;
        const SYNC = 1 << 7;
        const DSYNC = 1 << 8;
        const SPARSE = 1 << 9;
    }
}

impl OpenOptions {
    /// Applies the implication and conflict rules for open options.
    ///
    /// `CREATE_NEW` implies `CREATE`, `APPEND` implies `WRITE`, and a set
    /// naming no access mode defaults to `READ`. `READ` combined with
    /// `APPEND`, or `APPEND` combined with `TRUNCATE_EXISTING`, is rejected.
    pub(crate) fn normalized(mut self) -> VfsResult<Self> {
        if self.contains(Self::CREATE_NEW) {
            self |= Self::CREATE;
        }
        if self.contains(Self::APPEND) {
            if self.contains(Self::READ) {
                return Err(VfsError::InvalidArgument(
                    "READ and APPEND cannot be combined".into(),
                ));
            }
            if self.contains(Self::TRUNCATE_EXISTING) {
                return Err(VfsError::InvalidArgument(
                    "APPEND and TRUNCATE_EXISTING cannot be combined".into(),
                ));
            }
            self |= Self::WRITE;
        }
        if !self.intersects(Self::READ | Self::WRITE) {
            self |= Self::READ;
        }
        Ok(self)
    }

    pub(crate) fn is_readable(self) -> bool {
        self.contains(Self::READ)
    }

    pub(crate) fn is_writable(self) -> bool {
        self.contains(Self::WRITE)
    }
}

bitflags::bitflags! {
    /// Options for copy and move operations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CopyFlags: u8 {
        const REPLACE_EXISTING = 1;
        const COPY_ATTRIBUTES = 1 << 1;
        const NOFOLLOW_LINKS = 1 << 2;
        const ATOMIC_MOVE = 1 << 3;
    }
}

/// Access mode checked by `check_access`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
    Execute,
}

/// An opaque user or group principal, identified by name only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal(String);

impl Principal {
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

/// Dynamically typed attribute value, used by the by-name attribute API.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    Size(u64),
    Time(SystemTime),
    Principal(Principal),
    Permissions(Permissions),
    Bytes(Vec<u8>),
}

impl AttrValue {
    pub(crate) fn expect_bool(&self, name: &str) -> VfsResult<bool> {
        match self {
            AttrValue::Bool(v) => Ok(*v),
            _ => Err(type_mismatch(name, "bool")),
        }
    }

    pub(crate) fn expect_principal(&self, name: &str) -> VfsResult<Principal> {
        match self {
            AttrValue::Principal(v) => Ok(v.clone()),
            _ => Err(type_mismatch(name, "principal")),
        }
    }

    pub(crate) fn expect_permissions(&self, name: &str) -> VfsResult<Permissions> {
        match self {
            AttrValue::Permissions(v) => Ok(*v),
            _ => Err(type_mismatch(name, "permissions")),
        }
    }

    pub(crate) fn expect_bytes(&self, name: &str) -> VfsResult<Vec<u8>> {
        match self {
            AttrValue::Bytes(v) => Ok(v.clone()),
            _ => Err(type_mismatch(name, "bytes")),
        }
    }
}

fn type_mismatch(name: &str, expected: &str) -> VfsError {
    VfsError::InvalidArgument(format!("attribute {name} expects a {expected} value"))
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        AttrValue::Size(v)
    }
}

impl From<SystemTime> for AttrValue {
    fn from(v: SystemTime) -> Self {
        AttrValue::Time(v)
    }
}

impl From<Principal> for AttrValue {
    fn from(v: Principal) -> Self {
        AttrValue::Principal(v)
    }
}

impl From<Permissions> for AttrValue {
    fn from(v: Permissions) -> Self {
        AttrValue::Permissions(v)
    }
}

impl From<Vec<u8>> for AttrValue {
    fn from(v: Vec<u8>) -> Self {
        AttrValue::Bytes(v)
    }
}

impl From<&[u8]> for AttrValue {
    fn from(v: &[u8]) -> Self {
        AttrValue::Bytes(v.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_options_defaults_to_read() {
        let opts = OpenOptions::empty().normalized().unwrap();
        assert!(opts.is_readable());
        assert!(!opts.is_writable());
    }

    #[test]
    fn create_new_implies_create() {
        let opts = (OpenOptions::WRITE | OpenOptions::CREATE_NEW)
            .normalized()
            .unwrap();
        assert!(opts.contains(OpenOptions::CREATE));
    }

    #[test]
    fn append_implies_write_and_rejects_read() {
        let opts = OpenOptions::APPEND.normalized().unwrap();
        assert!(opts.is_writable());
        assert!(matches!(
            (OpenOptions::READ | OpenOptions::APPEND).normalized(),
            Err(VfsError::InvalidArgument(_))
        ));
        assert!(matches!(
            (OpenOptions::APPEND | OpenOptions::TRUNCATE_EXISTING).normalized(),
            Err(VfsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn permissions_mode_round_trip() {
        let perms = Permissions::from_mode(0o751);
        assert!(perms.contains(Permissions::OWNER_READ | Permissions::OWNER_WRITE));
        assert!(perms.contains(Permissions::GROUP_READ | Permissions::GROUP_EXEC));
        assert_eq!(perms.mode(), 0o751);
    }
}
