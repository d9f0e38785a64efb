//! # VFS Smoke Binary
//!
//! Example call site for the OS layer: exercises open, write, read, sync,
//! access, temporary files and delete against a real host filesystem, the
//! way the engine above would.
//!
//! ## Usage
//!
//! ```bash
//! # Run against a scratch file
//! vfs-smoke /tmp/smoke.db
//! ```

use std::path::Path;

use eyre::{bail, Result, WrapErr};
use hostvfs::{AccessMode, OpenFlags};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let path = match args.get(1) {
        Some(p) => Path::new(p),
        None => bail!("usage: vfs-smoke <path>"),
    };

    let vfs = hostvfs::os_init();
    tracing::info!(vfs = vfs.name(), "OS layer initialized");

    let mut outcome = vfs
        .open(Some(path), OpenFlags::READ_WRITE | OpenFlags::CREATE)
        .wrap_err_with(|| format!("opening '{}'", path.display()))?;
    tracing::info!(
        path = %outcome.handle.path().display(),
        lock = ?outcome.handle.lock_level(),
        flags = ?outcome.flags,
        "opened"
    );

    outcome.handle.write_at(0, b"vfs smoke page")?;
    outcome.handle.sync(false)?;

    let mut buf = [0u8; 14];
    let read = outcome.handle.read_at(0, &mut buf)?;
    tracing::info!(read, content = %String::from_utf8_lossy(&buf[..read]), "read back");

    let exists = vfs.access(path, AccessMode::Exists)?;
    tracing::info!(exists, "access check after write");

    let temp = vfs.open(
        None,
        OpenFlags::READ_WRITE | OpenFlags::CREATE | OpenFlags::DELETE_ON_CLOSE,
    )?;
    tracing::info!(temp = %temp.handle.path().display(), "temporary file opened");
    temp.handle.close()?;

    outcome.handle.close()?;
    vfs.delete(path, true)?;
    tracing::info!(
        exists = vfs.access(path, AccessMode::Exists)?,
        "deleted with directory sync"
    );

    hostvfs::os_end();
    tracing::info!("OS layer shut down");

    Ok(())
}
