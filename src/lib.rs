//! An in-process, in-memory virtual filesystem.
//!
//! `memvfs` keeps a hierarchical namespace of directories, regular files
//! and symbolic links entirely in memory. Every entry carries its own
//! reader-writer lock; traversals acquire read locks from the root down
//! and a read or write lock on the terminal entry, and two-path operations
//! (move, copy) serialize on a filesystem-wide ordering lock so that
//! concurrent tree operations cannot deadlock.
//!
//! ```
//! use memvfs::Builder;
//!
//! let fs = Builder::new().build().unwrap();
//! let path = fs.path("/hello.txt").unwrap();
//! let out = fs.output_stream(&path).unwrap();
//! out.write(b"hello world").unwrap();
//! out.close();
//!
//! let input = fs.input_stream(&path).unwrap();
//! let mut buf = [0u8; 16];
//! let read = input.read(&mut buf).unwrap();
//! assert_eq!(&buf[..read], b"hello world");
//! ```

mod attr;
mod channel;
mod config;
mod error;
mod fs;
mod lock;
mod matcher;
mod node;
mod path;
mod resolve;
mod types;

pub use attr::{
    BasicAttributes, BasicView, DosAttributes, DosView, OwnerView, PosixAttributes, PosixView,
    UserView,
};
pub use channel::FileChannel;
pub use config::{Builder, Collator, NameTransform, ViewSet};
pub use error::VfsError;
pub use fs::{MemoryFileSystem, StoreInfo};
pub use matcher::PathMatcher;
pub use node::DirStream;
pub use path::VfsPath;
pub use types::{
    AccessMode, AttrValue, CopyFlags, DosFlags, EntryType, OpenOptions, Permissions, Principal,
};

pub type VfsResult<T> = Result<T, VfsError>;
