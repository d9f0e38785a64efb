//! # File Handles and the I/O-Methods Surface
//!
//! One [`FileHandle`] represents one open file as seen by the engine. The
//! handle is populated by [`Vfs::open`](super::Vfs::open) and carries:
//!
//! - the underlying host file,
//! - the io-methods dispatch object, set exactly once at open time and never
//!   reassigned for the handle's lifetime,
//! - the current lock level (always [`LockLevel::None`] at open),
//! - a chunk-size hint,
//! - a per-handle semaphore minted from the mutex subsystem, never shared
//!   across handles.
//!
//! ## Lock-Level State Machine
//!
//! ```text
//! None ──▶ Shared ──▶ Reserved ──▶ Pending ──▶ Exclusive
//!   ◀───────── unlock (to Shared or None) ─────────┘
//! ```
//!
//! The adapter guarantees only that the field starts at `None` and is never
//! mutated except through the io-methods surface. The full cross-process
//! locking protocol is the collaborator's concern; [`HostIoMethods`] keeps
//! the in-process bookkeeping and serializes transitions on the handle's
//! semaphore.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ErrorCode, Result, VfsError};
use crate::mutex::VfsMutex;

/// File lock levels, in strictly increasing order of exclusivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LockLevel {
    None,
    Shared,
    Reserved,
    Pending,
    Exclusive,
}

/// The per-open-file dispatch surface (read/write/lock/sync operations).
///
/// Supplied to the VFS at construction time and embedded into every handle
/// it opens. Implementations must be callable from multiple threads; any
/// per-handle serialization they need is available through the handle's
/// semaphore.
pub trait IoMethods: Send + Sync {
    /// Reads up to `buf.len()` bytes at `offset`. Returns the bytes read;
    /// a short count means end of file.
    fn read(&self, file: &mut FileHandle, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Writes all of `data` at `offset`. Returns the bytes written.
    fn write(&self, file: &mut FileHandle, offset: u64, data: &[u8]) -> Result<usize>;

    /// Truncates or extends the file to exactly `size` bytes.
    fn truncate(&self, file: &mut FileHandle, size: u64) -> Result<()>;

    /// Flushes file content to stable storage before returning, or reports
    /// a distinguishable error. `data_only` skips metadata where the host
    /// supports it.
    fn sync(&self, file: &mut FileHandle, data_only: bool) -> Result<()>;

    /// Current size of the file in bytes.
    fn file_size(&self, file: &mut FileHandle) -> Result<u64>;

    /// Moves the handle's lock level up to `level`.
    fn lock(&self, file: &mut FileHandle, level: LockLevel) -> Result<()>;

    /// Moves the handle's lock level down to `level` (`Shared` or `None`).
    fn unlock(&self, file: &mut FileHandle, level: LockLevel) -> Result<()>;

    /// Whether any handle holds a Reserved (or higher) lock on this file.
    fn check_reserved_lock(&self, file: &mut FileHandle) -> Result<bool>;

    /// Host sector size hint.
    fn sector_size(&self, _file: &FileHandle) -> usize {
        4096
    }

    /// Device characteristic bits; none are claimed by default.
    fn device_characteristics(&self, _file: &FileHandle) -> u32 {
        0
    }

    /// Releases per-handle resources. The handle is dropped by the caller
    /// immediately afterwards.
    fn close(&self, file: &mut FileHandle) -> Result<()>;
}

/// One open file as seen by the engine.
///
/// All reads/writes/locks go through the io-methods object embedded at open
/// time; the inherent methods below are thin dispatch wrappers.
pub struct FileHandle {
    pub(crate) file: File,
    path: PathBuf,
    io: Arc<dyn IoMethods>,
    pub(crate) lock_level: LockLevel,
    chunk_size: usize,
    sem: Arc<VfsMutex>,
}

impl std::fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHandle")
            .field("path", &self.path)
            .field("lock_level", &self.lock_level)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

impl FileHandle {
    pub(crate) fn new(
        file: File,
        path: PathBuf,
        io: Arc<dyn IoMethods>,
        sem: Arc<VfsMutex>,
    ) -> Self {
        Self {
            file,
            path,
            io,
            lock_level: LockLevel::None,
            chunk_size: 0,
            sem,
        }
    }

    /// The path this handle was opened under. For temporary files this is
    /// the synthesized name (already unlinked if delete-on-close).
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_level(&self) -> LockLevel {
        self.lock_level
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Sets the allocation chunk hint; purely advisory.
    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.chunk_size = chunk_size;
    }

    /// The per-handle semaphore. Its locking discipline is owned by the
    /// io-methods collaborator, not by this layer.
    pub fn semaphore(&self) -> &Arc<VfsMutex> {
        &self.sem
    }

    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let io = Arc::clone(&self.io);
        io.read(self, offset, buf)
    }

    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<usize> {
        let io = Arc::clone(&self.io);
        io.write(self, offset, data)
    }

    pub fn truncate(&mut self, size: u64) -> Result<()> {
        let io = Arc::clone(&self.io);
        io.truncate(self, size)
    }

    pub fn sync(&mut self, data_only: bool) -> Result<()> {
        let io = Arc::clone(&self.io);
        io.sync(self, data_only)
    }

    pub fn file_size(&mut self) -> Result<u64> {
        let io = Arc::clone(&self.io);
        io.file_size(self)
    }

    pub fn lock(&mut self, level: LockLevel) -> Result<()> {
        let io = Arc::clone(&self.io);
        io.lock(self, level)
    }

    pub fn unlock(&mut self, level: LockLevel) -> Result<()> {
        let io = Arc::clone(&self.io);
        io.unlock(self, level)
    }

    pub fn check_reserved_lock(&mut self) -> Result<bool> {
        let io = Arc::clone(&self.io);
        io.check_reserved_lock(self)
    }

    pub fn sector_size(&self) -> usize {
        self.io.sector_size(self)
    }

    pub fn device_characteristics(&self) -> u32 {
        self.io.device_characteristics(self)
    }

    /// Closes the handle through the io-methods surface and consumes it.
    pub fn close(mut self) -> Result<()> {
        let io = Arc::clone(&self.io);
        io.close(&mut self)
    }
}

/// Host-backed io-methods implementation over the std file API.
///
/// Lock transitions here are in-process bookkeeping only: they serialize on
/// the handle's semaphore and move `lock_level` monotonically. Cross-process
/// byte-range locking is outside this implementation.
#[derive(Debug, Default)]
pub struct HostIoMethods;

impl HostIoMethods {
    pub fn new() -> Self {
        Self
    }
}

impl IoMethods for HostIoMethods {
    fn read(&self, file: &mut FileHandle, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let path = file.path.clone();
        file.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| VfsError::from_host(ErrorCode::ReadFailed, "seek", Some(&path), e))?;

        // Read until the buffer is full or EOF; a short count is not an
        // error, the engine zero-fills past end of file itself.
        let mut filled = 0;
        while filled < buf.len() {
            match file.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(VfsError::from_host(
                        ErrorCode::ReadFailed,
                        "read",
                        Some(&path),
                        e,
                    ))
                }
            }
        }
        Ok(filled)
    }

    fn write(&self, file: &mut FileHandle, offset: u64, data: &[u8]) -> Result<usize> {
        let path = file.path.clone();
        file.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| VfsError::from_host(ErrorCode::WriteFailed, "seek", Some(&path), e))?;
        file.file
            .write_all(data)
            .map_err(|e| VfsError::from_host(ErrorCode::WriteFailed, "write", Some(&path), e))?;
        Ok(data.len())
    }

    fn truncate(&self, file: &mut FileHandle, size: u64) -> Result<()> {
        let path = file.path.clone();
        file.file.set_len(size).map_err(|e| {
            VfsError::from_host(ErrorCode::TruncateFailed, "ftruncate", Some(&path), e)
        })
    }

    fn sync(&self, file: &mut FileHandle, data_only: bool) -> Result<()> {
        let path = file.path.clone();
        let result = if data_only {
            file.file.sync_data()
        } else {
            file.file.sync_all()
        };
        result.map_err(|e| VfsError::from_host(ErrorCode::SyncFailed, "fsync", Some(&path), e))
    }

    fn file_size(&self, file: &mut FileHandle) -> Result<u64> {
        let path = file.path.clone();
        file.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| VfsError::from_host(ErrorCode::AccessFailed, "fstat", Some(&path), e))
    }

    fn lock(&self, file: &mut FileHandle, level: LockLevel) -> Result<()> {
        debug_assert!(level > LockLevel::None, "lock() cannot target None");
        file.sem.enter();
        if level > file.lock_level {
            file.lock_level = level;
        }
        file.sem.leave();
        Ok(())
    }

    fn unlock(&self, file: &mut FileHandle, level: LockLevel) -> Result<()> {
        debug_assert!(
            level <= LockLevel::Shared,
            "unlock() targets Shared or None"
        );
        file.sem.enter();
        if level < file.lock_level {
            file.lock_level = level;
        }
        file.sem.leave();
        Ok(())
    }

    fn check_reserved_lock(&self, file: &mut FileHandle) -> Result<bool> {
        Ok(file.lock_level >= LockLevel::Reserved)
    }

    fn close(&self, file: &mut FileHandle) -> Result<()> {
        // Lock state is irrelevant once the handle is closed; the host file
        // is released when the handle is dropped by the caller.
        file.lock_level = LockLevel::None;
        Ok(())
    }
}
