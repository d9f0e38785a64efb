//! # Host Lock Primitive
//!
//! The single point where this crate touches the host's locking primitives.
//! Everything above ([`crate::mutex::MutexSubsystem`], the per-file-handle
//! semaphore) goes through [`HostLock`] and never names `parking_lot` types
//! directly, so swapping the host primitive touches only this file.
//!
//! ## Fast vs Recursive
//!
//! A fast lock is a plain raw mutex. A recursive lock is a reentrant raw
//! mutex keyed on the host thread id; re-entry by the owning thread succeeds
//! without deadlock. Recursion is delegated *entirely* to the host
//! primitive — this layer performs no recursion counting of its own.
//!
//! ## Single-Threaded Builds
//!
//! With the `threadsafe` feature disabled every operation is a no-op and
//! `try_lock` always reports success. This mirrors a host without threads,
//! where mutual exclusion is vacuous.
//!
//! ## Unlock Contract
//!
//! `unlock` may only be called by the logical owner that acquired the lock.
//! Calling it on an unheld lock is undefined behavior; debug builds assert.

#[cfg(feature = "threadsafe")]
use parking_lot::lock_api::{RawMutex as _, RawReentrantMutex};
#[cfg(feature = "threadsafe")]
use parking_lot::{RawMutex, RawThreadId};

/// A host mutual-exclusion primitive, either plain or reentrant.
#[cfg(feature = "threadsafe")]
pub enum HostLock {
    Fast(RawMutex),
    Recursive(RawReentrantMutex<RawMutex, RawThreadId>),
}

#[cfg(feature = "threadsafe")]
impl HostLock {
    pub fn new(recursive: bool) -> Self {
        if recursive {
            HostLock::Recursive(RawReentrantMutex::INIT)
        } else {
            HostLock::Fast(RawMutex::INIT)
        }
    }

    /// Blocks the calling thread until the lock is acquired. Infallible.
    pub fn lock(&self) {
        match self {
            HostLock::Fast(m) => m.lock(),
            HostLock::Recursive(m) => m.lock(),
        }
    }

    /// Non-blocking acquire. Returns `true` if the lock is now held by the
    /// caller, `false` if it is busy.
    pub fn try_lock(&self) -> bool {
        match self {
            HostLock::Fast(m) => m.try_lock(),
            HostLock::Recursive(m) => m.try_lock(),
        }
    }

    /// Releases a lock previously acquired by the same logical owner.
    ///
    /// Calling this on an unheld lock is undefined behavior (debug-asserted).
    pub fn unlock(&self) {
        match self {
            HostLock::Fast(m) => {
                debug_assert!(m.is_locked());
                // SAFETY: the caller contract requires the lock to be held by
                // the current logical owner; release pairs with its acquire.
                unsafe { m.unlock() }
            }
            HostLock::Recursive(m) => {
                debug_assert!(m.is_owned_by_current_thread());
                // SAFETY: same contract; the reentrant primitive additionally
                // requires the current thread to be the owner, asserted above.
                unsafe { m.unlock() }
            }
        }
    }

    pub fn is_locked(&self) -> bool {
        match self {
            HostLock::Fast(m) => m.is_locked(),
            HostLock::Recursive(m) => m.is_locked(),
        }
    }
}

/// No-op lock for single-threaded builds.
#[cfg(not(feature = "threadsafe"))]
pub struct HostLock;

#[cfg(not(feature = "threadsafe"))]
impl HostLock {
    pub fn new(_recursive: bool) -> Self {
        HostLock
    }

    pub fn lock(&self) {}

    pub fn try_lock(&self) -> bool {
        true
    }

    pub fn unlock(&self) {}

    pub fn is_locked(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for HostLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}
