//! # Process-Wide VFS Registry
//!
//! Discoverability by name among multiple competing VFS backends. The
//! registry is populated at initialization, read for the remainder of the
//! process, and torn down explicitly — an initialization/teardown lifecycle,
//! not implicit module-load state.
//!
//! ## Default Selection
//!
//! The first entry is the default. Registering with `make_default` moves the
//! implementation to the front; registering a name that is already present
//! replaces the previous entry.
//!
//! ## Lifecycle
//!
//! [`os_init`] brings up the whole OS layer: it creates the mutex subsystem
//! (all static mutexes allocated eagerly) and registers the host VFS as the
//! default. [`os_end`] unregisters it and shuts the mutex subsystem down.
//! Both are idempotent; `os_init` after `os_end` brings the layer back up.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::mutex::MutexSubsystem;

use super::host::{HostVfs, HOST_VFS_NAME};
use super::Vfs;

static REGISTRY: RwLock<Vec<Arc<dyn Vfs>>> = RwLock::new(Vec::new());
static SUBSYSTEM: RwLock<Option<Arc<MutexSubsystem>>> = RwLock::new(None);

/// Registers a VFS implementation under its name.
///
/// An existing registration with the same name is replaced. With
/// `make_default` the implementation becomes the process default.
pub fn register(vfs: Arc<dyn Vfs>, make_default: bool) {
    let mut registry = REGISTRY.write();
    registry.retain(|existing| existing.name() != vfs.name());
    if make_default {
        registry.insert(0, vfs);
    } else {
        registry.push(vfs);
    }
}

/// Removes the named VFS. Returns whether it was registered.
pub fn unregister(name: &str) -> bool {
    let mut registry = REGISTRY.write();
    let before = registry.len();
    registry.retain(|existing| existing.name() != name);
    registry.len() != before
}

/// Looks up a VFS by name.
pub fn find(name: &str) -> Option<Arc<dyn Vfs>> {
    REGISTRY
        .read()
        .iter()
        .find(|vfs| vfs.name() == name)
        .cloned()
}

/// The process default VFS, if any is registered.
pub fn default_vfs() -> Option<Arc<dyn Vfs>> {
    REGISTRY.read().first().cloned()
}

/// Initializes the OS layer: mutex subsystem first, then the host VFS
/// registered as the process default. Idempotent.
pub fn os_init() -> Arc<dyn Vfs> {
    let subsystem = {
        let mut slot = SUBSYSTEM.write();
        Arc::clone(slot.get_or_insert_with(|| Arc::new(MutexSubsystem::init())))
    };

    if let Some(existing) = find(HOST_VFS_NAME) {
        return existing;
    }

    let vfs: Arc<dyn Vfs> = Arc::new(HostVfs::new(subsystem));
    register(Arc::clone(&vfs), true);
    vfs
}

/// Tears the OS layer down: unregisters the host VFS and, if this was the
/// last reference, destroys the static mutexes.
///
/// Must only be called when no thread holds or will again request a static
/// mutex or an open handle from the host VFS.
pub fn os_end() {
    unregister(HOST_VFS_NAME);
    if let Some(subsystem) = SUBSYSTEM.write().take() {
        if let Ok(subsystem) = Arc::try_unwrap(subsystem) {
            subsystem.shutdown();
        }
    }
}
