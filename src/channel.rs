//! Byte channels over regular files.
//!
//! A channel owns a cursor; each read takes the file's read lock and each
//! write its write lock, with the cursor advanced under that lock. Two
//! channels on one file therefore serialize their transfers, in an
//! otherwise unspecified relative order.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::fs::FsState;
use crate::node::Entry;
use crate::path::VfsPath;
use crate::types::OpenOptions;
use crate::{VfsError, VfsResult};

/// A readable, writable, seekable channel on a regular file.
///
/// The file's open count was incremented when the channel was constructed;
/// [`close`](Self::close) (or drop) decrements it, and the last close of a
/// file already removed from the tree reclaims its content. Close is
/// idempotent.
pub struct FileChannel {
    fs: Arc<FsState>,
    entry: Entry,
    path: VfsPath,
    readable: bool,
    writable: bool,
    append: bool,
    delete_on_close: bool,
    cursor: Mutex<u64>,
    open: AtomicBool,
}

impl FileChannel {
    pub(crate) fn new(fs: Arc<FsState>, entry: Entry, path: VfsPath, options: OpenOptions) -> Self {
        Self {
            fs,
            entry,
            path,
            readable: options.is_readable(),
            writable: options.is_writable(),
            append: options.contains(OpenOptions::APPEND),
            delete_on_close: options.contains(OpenOptions::DELETE_ON_CLOSE),
            cursor: Mutex::new(0),
            open: AtomicBool::new(true),
        }
    }

    fn check_usable(&self) -> VfsResult<()> {
        if !self.open.load(Ordering::Acquire) {
            return Err(VfsError::Closed);
        }
        self.fs.check_open()
    }

    /// Reads at the cursor, advancing it. Returns zero at end of file.
    pub fn read(&self, buf: &mut [u8]) -> VfsResult<usize> {
        self.check_usable()?;
        if !self.readable {
            return Err(VfsError::NotSupported(
                "channel not open for reading".into(),
            ));
        }
        let mut cursor = self.cursor.lock();
        let state = self.entry.read();
        let read = state.as_file(&self.path)?.read_at(*cursor, buf);
        *cursor += read as u64;
        Ok(read)
    }

    /// Writes at the cursor (or at end of file in append mode), advancing
    /// the cursor past the written bytes.
    pub fn write(&self, data: &[u8]) -> VfsResult<usize> {
        self.check_usable()?;
        if !self.writable {
            return Err(VfsError::NotSupported(
                "channel not open for writing".into(),
            ));
        }
        let mut cursor = self.cursor.lock();
        let mut state = self.entry.write();
        let pos = if self.append {
            state.file_size()
        } else {
            *cursor
        };
        let written = state.as_file_mut(&self.path)?.write_at(pos, data)?;
        state.times.touch_modified();
        *cursor = pos + written as u64;
        Ok(written)
    }

    pub fn position(&self) -> VfsResult<u64> {
        self.check_usable()?;
        Ok(*self.cursor.lock())
    }

    /// Moves the cursor. Illegal on append-mode channels, whose writes are
    /// pinned to end of file.
    pub fn set_position(&self, position: u64) -> VfsResult<()> {
        self.check_usable()?;
        if self.append {
            return Err(VfsError::InvalidArgument(
                "cannot set position on an append-mode channel".into(),
            ));
        }
        *self.cursor.lock() = position;
        Ok(())
    }

    pub fn size(&self) -> VfsResult<u64> {
        self.check_usable()?;
        Ok(self.entry.read().file_size())
    }

    /// Shrinks the file to `size`; a cursor past the new end moves to it.
    pub fn truncate(&self, size: u64) -> VfsResult<()> {
        self.check_usable()?;
        if !self.writable {
            return Err(VfsError::NotSupported(
                "channel not open for writing".into(),
            ));
        }
        let mut cursor = self.cursor.lock();
        let mut state = self.entry.write();
        state.as_file_mut(&self.path)?.truncate(size);
        state.times.touch_modified();
        if *cursor > size {
            *cursor = size;
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Closes the channel. Idempotent. The last close of a deleted file
    /// reclaims its blocks; a `DELETE_ON_CLOSE` channel removes the file
    /// from the tree first.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            if self.delete_on_close && self.fs.check_open().is_ok() {
                // The entry may already be gone; close never reports it.
                let _ = self.fs.unlink_for_close(&self.path);
            }
            let mut state = self.entry.write();
            if let Ok(file) = state.as_file_mut(&self.path) {
                file.released();
            }
        }
    }
}

impl Drop for FileChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl io::Read for FileChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        FileChannel::read(self, buf).map_err(Into::into)
    }
}

impl io::Write for FileChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        FileChannel::write(self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Seek for FileChannel {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let target = match pos {
            io::SeekFrom::Start(offset) => Some(offset),
            io::SeekFrom::End(delta) => self.size()?.checked_add_signed(delta),
            io::SeekFrom::Current(delta) => self.position()?.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::from(VfsError::InvalidArgument("seek before start of file".into()))
        })?;
        self.set_position(target)?;
        Ok(target)
    }
}
