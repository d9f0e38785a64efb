//! # hostvfs - Host OS Abstraction Layer for an Embedded Storage Engine
//!
//! This crate lets an embedded, file-backed relational storage engine run on
//! a host whose filesystem, threading and timing primitives differ from the
//! POSIX APIs the engine was designed against. The engine itself (query
//! execution, B-tree storage, transaction log) lives above this crate and
//! calls into it for every disk I/O, file-locking, mutual-exclusion,
//! temporary-name, randomness and clock operation.
//!
//! ## Architecture
//!
//! Two collaborating components, each behind a dispatch surface resolved
//! once at startup:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                storage engine                 │
//! └──────────┬──────────────────────┬────────────┘
//!            │ Vfs trait            │ mutex subsystem shape
//! ┌──────────▼───────────┐  ┌───────▼────────────┐
//! │  Host File/VFS       │  │  Mutex Manager      │
//! │  Adapter (vfs)       │──▶  (mutex)            │
//! │  open/delete/access/ │  │  static + dynamic   │
//! │  time/randomness     │  │  host locks         │
//! └──────────┬───────────┘  └────────────────────┘
//!            │ IoMethods trait (per open file)
//! ┌──────────▼───────────┐
//! │  host filesystem     │
//! └──────────────────────┘
//! ```
//!
//! The adapter depends on the Mutex Manager for exactly one thing: the
//! per-handle semaphore embedded in every open file handle.
//!
//! ## Faithfulness Over Cleanliness
//!
//! This layer sits under an engine that reacts to exact error codes and
//! exact flag semantics; a mismatch shows up as silent data corruption or
//! deadlock above, not as a visible crash here. Several behaviors are
//! therefore kept even where they look odd:
//!
//! - a present file of stored size zero is reported as non-existent;
//! - a directory-sync failure after delete is computed, logged and then
//!   discarded;
//! - the debug held/not-held introspection reports `true` for an absent
//!   mutex.
//!
//! ## Quick Start
//!
//! ```ignore
//! use hostvfs::{os_init, os_end, AccessMode, OpenFlags};
//!
//! let vfs = hostvfs::os_init();
//!
//! let mut outcome = vfs.open(
//!     Some("data.db".as_ref()),
//!     OpenFlags::READ_WRITE | OpenFlags::CREATE,
//! )?;
//! outcome.handle.write_at(0, b"first page")?;
//! outcome.handle.sync(false)?;
//!
//! assert!(vfs.access("data.db".as_ref(), AccessMode::Exists)?);
//! vfs.delete("data.db".as_ref(), true)?;
//!
//! os_end();
//! ```
//!
//! ## Module Overview
//!
//! - [`mutex`]: static (identity-addressed) and dynamic (fast/recursive)
//!   mutual-exclusion primitives
//! - [`vfs`]: the VFS dispatch surface, host implementation, file handles,
//!   io-methods surface and the process-wide registry
//! - [`error`]: the fixed error-code enumeration the engine dispatches on
//!
//! ## Configuration
//!
//! Build-time cargo features only, no runtime parameters:
//!
//! - `threadsafe` (default): real host locks. Disabled, every mutex
//!   operation is a no-op for single-threaded hosts.

pub mod error;
pub mod mutex;
pub mod vfs;

pub use error::{ErrorCode, Result, VfsError};
pub use mutex::{MutexKind, MutexSubsystem, StaticMutexId, TryEnter, VfsMutex};
pub use vfs::registry::{default_vfs, find, os_end, os_init, register, unregister};
pub use vfs::{
    AccessMode, FileHandle, HostIoMethods, HostVfs, IoMethods, LockLevel, OpenFlags, OpenOutcome,
    Vfs, MAX_PATHNAME,
};

#[cfg(debug_assertions)]
pub use mutex::{held, not_held};
