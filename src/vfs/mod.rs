//! # Host File/VFS Adapter
//!
//! The engine's pluggable interface for all host file and OS-service access.
//! Two dispatch surfaces, both resolved once and then called indirectly:
//!
//! - the VFS-level surface ([`Vfs`]): open/delete/access/full-pathname/
//!   randomness/sleep/clock, plus unsupported system-call hook stubs;
//! - the file-instance surface ([`IoMethods`](file::IoMethods)): read/write/
//!   lock/sync on one open file, embedded in the [`FileHandle`](file::FileHandle)
//!   at open time and never reassigned.
//!
//! ## Control Flow
//!
//! ```text
//! engine ──open(path, flags)──▶ Vfs ──▶ FileHandle { io, lock_level, sem }
//!    │                                        │
//!    └──read/write/lock/sync─────────────────▶ IoMethods (per handle)
//! ```
//!
//! The adapter calls the mutex subsystem exactly once per open, to mint the
//! per-handle semaphore embedded in the handle.
//!
//! ## Open-Flag Invariants
//!
//! `open` requires exactly one of `READ_ONLY`/`READ_WRITE`, and permits
//! `CREATE`, `EXCLUSIVE`, `DELETE_ON_CLOSE` under:
//!
//! - `CREATE` ⇒ `READ_WRITE`
//! - `EXCLUSIVE` ⇒ `CREATE`
//! - `DELETE_ON_CLOSE` ⇒ `CREATE`
//!
//! Violations are caller error, enforced by debug assertions only — a caller
//! that violates them has already broken the contract.

pub mod file;
pub mod host;
pub mod registry;

pub use file::{FileHandle, HostIoMethods, IoMethods, LockLevel};
pub use host::HostVfs;

use std::path::{Path, PathBuf};

use bitflags::bitflags;

use crate::error::Result;

/// Longest pathname this adapter will produce or accept, in bytes.
pub const MAX_PATHNAME: usize = 256;

/// Version of the VFS dispatch surface.
pub const VFS_VERSION: u32 = 3;

bitflags! {
    /// Portable open flags, translated to host open semantics by each VFS.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const READ_ONLY       = 0x0001;
        const READ_WRITE      = 0x0002;
        const CREATE          = 0x0004;
        const DELETE_ON_CLOSE = 0x0008;
        const EXCLUSIVE       = 0x0010;
    }
}

impl OpenFlags {
    /// Debug-asserts the open-flag invariants. Release builds skip the
    /// check entirely; an illegal combination is undefined behavior.
    pub(crate) fn debug_check_open_invariants(self) {
        let read_only = self.contains(OpenFlags::READ_ONLY);
        let read_write = self.contains(OpenFlags::READ_WRITE);
        debug_assert!(
            read_only != read_write,
            "exactly one of READ_ONLY/READ_WRITE must be set"
        );
        debug_assert!(
            !self.contains(OpenFlags::CREATE) || read_write,
            "CREATE requires READ_WRITE"
        );
        debug_assert!(
            !self.contains(OpenFlags::EXCLUSIVE) || self.contains(OpenFlags::CREATE),
            "EXCLUSIVE requires CREATE"
        );
        debug_assert!(
            !self.contains(OpenFlags::DELETE_ON_CLOSE) || self.contains(OpenFlags::CREATE),
            "DELETE_ON_CLOSE requires CREATE"
        );
    }
}

/// Which host access check [`Vfs::access`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Does the path exist? A present file of stored size zero reports
    /// "does not exist" — zero-length artifacts indicate a prior failed
    /// write the engine should not resume.
    Exists,
    /// Is the path readable?
    Read,
    /// Is the path readable and writable?
    ReadWrite,
}

/// A successful open: the populated handle plus the effective flags.
///
/// `flags` may differ from the requested flags in exactly one way: a
/// read-write open that failed on read-only media is silently downgraded
/// to read-only, and the downgrade is visible here.
#[derive(Debug)]
pub struct OpenOutcome {
    pub handle: FileHandle,
    pub flags: OpenFlags,
}

/// Opaque stand-in for a host system-call pointer.
///
/// This VFS does not support system-call interception; the type exists only
/// so the hook stubs have the engine's required shape.
pub type SystemCall = fn();

/// The VFS-level dispatch surface.
///
/// One conforming implementation exists per host; selection happens once at
/// registration ([`registry`]), not per call. Implementations must be safe
/// to call from multiple host threads concurrently.
pub trait Vfs: Send + Sync {
    /// Identity of this VFS in the process-wide registry.
    fn name(&self) -> &str;

    fn version(&self) -> u32 {
        VFS_VERSION
    }

    /// Longest pathname this VFS accepts, in bytes.
    fn max_pathname(&self) -> usize {
        MAX_PATHNAME
    }

    /// Opens a file and populates a handle.
    ///
    /// `path` of `None` means "create a temporary file" under a synthesized
    /// unique name. See the module docs for the flag invariants.
    fn open(&self, path: Option<&Path>, flags: OpenFlags) -> Result<OpenOutcome>;

    /// Removes the named file.
    ///
    /// Not-found is reported distinctly ([`ErrorCode::DeleteNotFound`]) from
    /// a generic delete failure so the engine can treat "already gone"
    /// non-fatally. `sync_dir` additionally flushes the parent directory.
    ///
    /// [`ErrorCode::DeleteNotFound`]: crate::error::ErrorCode::DeleteNotFound
    fn delete(&self, path: &Path, sync_dir: bool) -> Result<()>;

    /// Performs the host access check selected by `mode`.
    fn access(&self, path: &Path, mode: AccessMode) -> Result<bool>;

    /// Normalizes a possibly relative path into an absolute, canonical form
    /// bounded by [`max_pathname`](Vfs::max_pathname).
    fn full_pathname(&self, path: &Path) -> Result<PathBuf>;

    /// Fills `buf` with bytes suitable for non-repeating temp-file suffixes.
    ///
    /// Explicitly NOT cryptographically strong. `buf` must be at least
    /// `size_of::<u64>() + size_of::<u32>()` bytes (debug-asserted). Returns
    /// the number of bytes written.
    fn randomness(&self, buf: &mut [u8]) -> usize;

    /// Suspends the calling thread for at least `micros` microseconds,
    /// rounded up to whole milliseconds. Returns the granted duration in
    /// microseconds.
    fn sleep(&self, micros: u64) -> u64;

    /// Host wall-clock time as a Julian-day floating value.
    ///
    /// Kept consistent with [`current_time_millis`](Vfs::current_time_millis)
    /// by construction: the float form is the integer form divided by the
    /// milliseconds in a day.
    fn current_time(&self) -> f64 {
        self.current_time_millis() as f64 / MILLIS_PER_DAY as f64
    }

    /// Host wall-clock time in milliseconds since the Julian epoch.
    fn current_time_millis(&self) -> i64;

    /// Last host error text, if the VFS tracks one. This VFS does not.
    fn last_error(&self) -> Option<String> {
        None
    }

    /// System-call interception is unsupported: always "not found".
    fn set_system_call(&self, _name: &str, _call: Option<SystemCall>) -> Result<()> {
        Err(crate::error::VfsError::new(
            crate::error::ErrorCode::NotFound,
            "set_system_call",
        ))
    }

    /// System-call interception is unsupported: always empty.
    fn get_system_call(&self, _name: &str) -> Option<SystemCall> {
        None
    }

    /// System-call interception is unsupported: always empty.
    fn next_system_call(&self, _name: Option<&str>) -> Option<&'static str> {
        None
    }
}

/// Milliseconds in one day; links the two clock representations.
pub const MILLIS_PER_DAY: i64 = 86_400_000;
