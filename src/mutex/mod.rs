//! # Mutex Subsystem
//!
//! Mutual-exclusion primitives behind the engine's required mutex-subsystem
//! shape: a small fixed set of *static* (identity-addressed) mutexes the
//! engine uses for its own global state, plus an open-ended set of *dynamic*
//! (fast/recursive) mutexes for per-object locking.
//!
//! ## Static vs Dynamic
//!
//! | Kind       | Allocation          | Identity            | Freed by        |
//! |------------|---------------------|---------------------|-----------------|
//! | Static     | eagerly at `init()` | [`StaticMutexId`]   | `shutdown()`    |
//! | Fast       | per `alloc()` call  | unique per call     | `free()` / drop |
//! | Recursive  | per `alloc()` call  | unique per call     | `free()` / drop |
//!
//! For a given static identity exactly one instance exists for the life of
//! the subsystem; every `alloc` of that identity returns the same instance
//! (`Arc::ptr_eq` holds). Dynamic mutexes are fresh on every call and owned
//! by the caller that allocated them.
//!
//! ## Blocking Model
//!
//! [`VfsMutex::enter`] blocks the calling thread indefinitely; there is no
//! timeout or cancellation anywhere in this layer. [`VfsMutex::try_enter`]
//! is the only non-blocking operation. A thread that enters and never leaves
//! permanently blocks all other enterers, matching the engine's expectation
//! of simple blocking mutexes.
//!
//! ## Recursive Semantics
//!
//! Re-entrant acquisition of a [`MutexKind::Recursive`] mutex by the owning
//! thread succeeds without deadlock. The property comes entirely from the
//! host primitive ([`HostLock`]); this layer does no recursion counting.

mod host;

pub use host::HostLock;

use std::sync::Arc;

/// Number of identity-addressed static mutexes.
pub const STATIC_MUTEX_COUNT: usize = 12;

/// The fixed enumeration of static mutex identities.
///
/// These mirror the engine's well-known global locks. The set is closed;
/// requesting an identity outside it is impossible by construction (the
/// enum is the range check).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaticMutexId {
    Master,
    Mem,
    Open,
    Prng,
    Lru,
    Pmem,
    App1,
    App2,
    App3,
    Vfs1,
    Vfs2,
    Vfs3,
}

impl StaticMutexId {
    pub const ALL: [StaticMutexId; STATIC_MUTEX_COUNT] = [
        StaticMutexId::Master,
        StaticMutexId::Mem,
        StaticMutexId::Open,
        StaticMutexId::Prng,
        StaticMutexId::Lru,
        StaticMutexId::Pmem,
        StaticMutexId::App1,
        StaticMutexId::App2,
        StaticMutexId::App3,
        StaticMutexId::Vfs1,
        StaticMutexId::Vfs2,
        StaticMutexId::Vfs3,
    ];

    /// Index into the static mutex table.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// What kind of mutex `alloc` should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutexKind {
    /// Fresh, caller-owned, not necessarily reentrant.
    Fast,
    /// Fresh, caller-owned, reentrant by the owning thread.
    Recursive,
    /// The shared pre-existing instance for the given identity.
    Static(StaticMutexId),
}

/// Result of a non-blocking acquire attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryEnter {
    /// The calling owner now holds the mutex.
    Acquired,
    /// The mutex is currently held by another logical owner.
    Busy,
}

/// A mutual-exclusion primitive handed out by the subsystem.
#[derive(Debug)]
pub struct VfsMutex {
    lock: HostLock,
    kind: MutexKind,
}

impl VfsMutex {
    fn new(kind: MutexKind) -> Self {
        Self {
            lock: HostLock::new(matches!(kind, MutexKind::Recursive)),
            kind,
        }
    }

    pub fn kind(&self) -> MutexKind {
        self.kind
    }

    pub fn is_static(&self) -> bool {
        matches!(self.kind, MutexKind::Static(_))
    }

    /// Blocks the calling thread until the mutex is acquired.
    ///
    /// Unconditional success: the host primitive is assumed non-failing once
    /// allocated, so there is no error path.
    pub fn enter(&self) {
        self.lock.lock();
    }

    /// Non-blocking variant of [`enter`](VfsMutex::enter).
    pub fn try_enter(&self) -> TryEnter {
        if self.lock.try_lock() {
            TryEnter::Acquired
        } else {
            TryEnter::Busy
        }
    }

    /// Releases a mutex previously acquired by the same logical owner.
    ///
    /// Undefined behavior if the mutex is not held (debug-asserted), matching
    /// the engine's own contract.
    pub fn leave(&self) {
        self.lock.unlock();
    }
}

/// Advisory introspection for caller assertions (debug builds only).
///
/// When handed `None` this reports `true`: an absent mutex can never violate
/// a holding assumption. Counter-intuitive, but required — the engine's debug
/// assertions call this even when mutexing is compiled out, and they must not
/// fire in that configuration.
#[cfg(debug_assertions)]
pub fn held(_mutex: Option<&VfsMutex>) -> bool {
    true
}

/// See [`held`]; same `None` quirk applies.
#[cfg(debug_assertions)]
pub fn not_held(_mutex: Option<&VfsMutex>) -> bool {
    true
}

/// The mutex subsystem: owns the static mutex table, mints dynamic mutexes.
///
/// Created once at OS-layer initialization and shared (via `Arc`) with every
/// component that needs a lock; the VFS adapter uses it to mint the per-file
/// handle semaphore.
#[derive(Debug)]
pub struct MutexSubsystem {
    statics: [Arc<VfsMutex>; STATIC_MUTEX_COUNT],
}

impl MutexSubsystem {
    /// Allocates all static-mutex instances eagerly.
    ///
    /// Host lock construction cannot fail with the current primitive, so
    /// init is infallible; there is no partially-initialized state to
    /// observe.
    pub fn init() -> Self {
        Self {
            statics: std::array::from_fn(|i| {
                Arc::new(VfsMutex::new(MutexKind::Static(StaticMutexId::ALL[i])))
            }),
        }
    }

    /// Destroys all static-mutex instances. Always succeeds.
    ///
    /// Must only be called when no thread holds, or will again request, a
    /// static mutex.
    pub fn shutdown(self) {
        for m in &self.statics {
            debug_assert!(!m.lock.is_locked(), "static mutex held at shutdown");
        }
    }

    /// Allocates a mutex of the requested kind.
    ///
    /// Fast/Recursive return a fresh instance uniquely owned by the caller.
    /// A static identity returns the shared pre-existing instance for that
    /// identity — the same instance on every call.
    pub fn alloc(&self, kind: MutexKind) -> Arc<VfsMutex> {
        match kind {
            MutexKind::Fast | MutexKind::Recursive => Arc::new(VfsMutex::new(kind)),
            MutexKind::Static(id) => Arc::clone(&self.statics[id.index()]),
        }
    }

    /// Releases a mutex obtained from [`alloc`](MutexSubsystem::alloc).
    ///
    /// For fast/recursive mutexes this destroys the host lock once the last
    /// owner is gone. For static mutexes it destroys nothing — static
    /// instances are reclaimed only at [`shutdown`](MutexSubsystem::shutdown),
    /// and callers must not expect them to disappear here.
    pub fn free(&self, mutex: Arc<VfsMutex>) {
        if !mutex.is_static() {
            debug_assert!(!mutex.lock.is_locked(), "dynamic mutex freed while held");
        }
        drop(mutex);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn static_identity_requested_twice_returns_identical_instance() {
        let subsystem = MutexSubsystem::init();

        for id in StaticMutexId::ALL {
            let a = subsystem.alloc(MutexKind::Static(id));
            let b = subsystem.alloc(MutexKind::Static(id));
            assert!(Arc::ptr_eq(&a, &b), "{id:?} yielded distinct instances");
        }
    }

    #[test]
    fn distinct_static_identities_return_distinct_instances() {
        let subsystem = MutexSubsystem::init();

        let master = subsystem.alloc(MutexKind::Static(StaticMutexId::Master));
        let mem = subsystem.alloc(MutexKind::Static(StaticMutexId::Mem));

        assert!(!Arc::ptr_eq(&master, &mem));
    }

    #[test]
    fn dynamic_alloc_then_free_leaves_statics_undisturbed() {
        let subsystem = MutexSubsystem::init();
        let before = subsystem.alloc(MutexKind::Static(StaticMutexId::Lru));

        let fast = subsystem.alloc(MutexKind::Fast);
        let recursive = subsystem.alloc(MutexKind::Recursive);
        subsystem.free(fast);
        subsystem.free(recursive);

        let after = subsystem.alloc(MutexKind::Static(StaticMutexId::Lru));
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn dynamic_allocations_are_unique_per_call() {
        let subsystem = MutexSubsystem::init();

        let a = subsystem.alloc(MutexKind::Fast);
        let b = subsystem.alloc(MutexKind::Fast);

        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn free_of_static_mutex_does_not_destroy_it() {
        let subsystem = MutexSubsystem::init();

        let m = subsystem.alloc(MutexKind::Static(StaticMutexId::Open));
        subsystem.free(m);

        // Still usable through a fresh alloc of the same identity.
        let again = subsystem.alloc(MutexKind::Static(StaticMutexId::Open));
        again.enter();
        again.leave();
    }

    #[cfg(feature = "threadsafe")]
    #[test]
    fn try_enter_on_mutex_held_elsewhere_reports_busy() {
        let subsystem = MutexSubsystem::init();
        let mutex = subsystem.alloc(MutexKind::Fast);

        let holder = Arc::clone(&mutex);
        let (locked_tx, locked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            holder.enter();
            locked_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            holder.leave();
        });

        locked_rx.recv().unwrap();
        assert_eq!(mutex.try_enter(), TryEnter::Busy);

        release_tx.send(()).unwrap();
        handle.join().unwrap();

        assert_eq!(mutex.try_enter(), TryEnter::Acquired);
        mutex.leave();
    }

    #[test]
    fn recursive_mutex_reenters_without_deadlock() {
        let subsystem = MutexSubsystem::init();
        let mutex = subsystem.alloc(MutexKind::Recursive);

        mutex.enter();
        mutex.enter();
        assert_eq!(mutex.try_enter(), TryEnter::Acquired);

        mutex.leave();
        mutex.leave();
        mutex.leave();
        subsystem.free(mutex);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn held_introspection_reports_true_for_absent_mutex() {
        assert!(held(None));
        assert!(not_held(None));
    }

    #[test]
    fn shutdown_succeeds_with_outstanding_static_references() {
        let subsystem = MutexSubsystem::init();
        let _kept = subsystem.alloc(MutexKind::Static(StaticMutexId::Prng));

        subsystem.shutdown();
    }
}
