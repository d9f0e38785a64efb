//! # Error Taxonomy
//!
//! This module defines the fixed error-code enumeration the storage engine
//! sees from the OS layer. The engine dispatches on these codes (for example,
//! treating a not-found delete as non-fatal), so the set is closed and stable.
//!
//! ## Propagation Policy
//!
//! Host `std::io::Error` values never cross the layer boundary directly.
//! At the point of failure the host error is logged (errno, failing host
//! operation, file path) and then mapped onto an [`ErrorCode`]. The original
//! error is retained as the `source` of the returned [`VfsError`] purely for
//! diagnostics; callers must branch on [`VfsError::code`], not on the source.
//!
//! ## Contract Violations
//!
//! Illegal open-flag combinations, out-of-range static mutex identities and
//! undersized randomness buffers are programming errors, not recoverable
//! conditions. They are enforced with `debug_assert!` and are undefined
//! behavior in release builds, matching the calling engine's own
//! invariant-checking discipline.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Fixed error codes returned to the storage engine.
///
/// The engine never sees raw host errno values; every host failure is mapped
/// onto exactly one of these before it crosses the layer boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The file could not be opened, even after the read-only fallback.
    CantOpen,
    /// Delete of a path that does not exist. Distinct from [`DeleteFailed`]
    /// so the engine can treat "already gone" non-fatally.
    ///
    /// [`DeleteFailed`]: ErrorCode::DeleteFailed
    DeleteNotFound,
    /// Delete failed for a reason other than the path being absent.
    DeleteFailed,
    /// Flushing the parent directory after a delete failed.
    DirSyncFailed,
    /// A host access/stat check failed for a reason other than absence.
    AccessFailed,
    /// A read through the io-methods surface failed.
    ReadFailed,
    /// A write through the io-methods surface failed.
    WriteFailed,
    /// Truncating a file through the io-methods surface failed.
    TruncateFailed,
    /// A requested host flush did not complete.
    SyncFailed,
    /// A file lock transition failed.
    LockFailed,
    /// A normalized path exceeds the VFS's maximum pathname length.
    PathTooLong,
    /// The requested facility is not supported by this VFS
    /// (system-call interception hooks).
    NotFound,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::CantOpen => "cannot open file",
            ErrorCode::DeleteNotFound => "delete: no such file",
            ErrorCode::DeleteFailed => "delete failed",
            ErrorCode::DirSyncFailed => "directory sync failed",
            ErrorCode::AccessFailed => "access check failed",
            ErrorCode::ReadFailed => "read failed",
            ErrorCode::WriteFailed => "write failed",
            ErrorCode::TruncateFailed => "truncate failed",
            ErrorCode::SyncFailed => "sync failed",
            ErrorCode::LockFailed => "lock failed",
            ErrorCode::PathTooLong => "pathname too long",
            ErrorCode::NotFound => "not supported",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error returned by the VFS or io-methods surface.
///
/// Carries the engine-visible [`ErrorCode`], the name of the host operation
/// that failed and, where available, the path involved and the underlying
/// host error (diagnostics only).
#[derive(Debug, Error)]
#[error("{code} in {op}({})", display_path(.path))]
pub struct VfsError {
    code: ErrorCode,
    op: &'static str,
    path: Option<PathBuf>,
    #[source]
    source: Option<io::Error>,
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => p.display().to_string(),
        None => String::new(),
    }
}

impl VfsError {
    /// An error with no host-error context (contract stubs, bounds checks).
    pub fn new(code: ErrorCode, op: &'static str) -> Self {
        Self {
            code,
            op,
            path: None,
            source: None,
        }
    }

    pub fn with_path(code: ErrorCode, op: &'static str, path: &Path) -> Self {
        Self {
            code,
            op,
            path: Some(path.to_path_buf()),
            source: None,
        }
    }

    /// Captures a failed host call: logs the host errno together with the
    /// failing operation and path, then maps it to the fixed `code`.
    ///
    /// This is the single funnel through which host errors reach the engine.
    pub fn from_host(
        code: ErrorCode,
        op: &'static str,
        path: Option<&Path>,
        source: io::Error,
    ) -> Self {
        tracing::error!(
            errno = source.raw_os_error(),
            op,
            path = %path.map(|p| p.display().to_string()).unwrap_or_default(),
            %code,
            "host call failed: {source}",
        );

        Self {
            code,
            op,
            path: path.map(Path::to_path_buf),
            source: Some(source),
        }
    }

    /// The engine-visible error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// The host operation that failed (e.g. `"open"`, `"unlink"`, `"fsync"`).
    pub fn op(&self) -> &'static str {
        self.op
    }

    /// The path involved in the failure, when one was known.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

pub type Result<T> = std::result::Result<T, VfsError>;
