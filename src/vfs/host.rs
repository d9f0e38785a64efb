//! # Host VFS Implementation
//!
//! The conforming [`Vfs`] implementation for this host, built on the std
//! file API. One instance serves the whole process once registered.
//!
//! ## Open Algorithm
//!
//! 1. `None` path ⇒ synthesize a unique temporary name (see below).
//! 2. Translate the portable flag bitset into host open options.
//! 3. Attempt the open. If it fails for a non-directory reason while
//!    requesting read-write access without exclusivity, silently downgrade
//!    to read-only and retry once — read-only media can still satisfy
//!    read-write opens that are allowed to degrade. The downgrade is
//!    reported in the outcome's effective flags, not as an error.
//! 4. If delete-on-close was requested, remove the path immediately; the
//!    handle itself is already held by the underlying filesystem.
//! 5. Populate the handle: io-methods object, lock level `None`, chunk
//!    hint 0, a per-handle semaphore minted from the mutex subsystem.
//!
//! ## Temporary Names
//!
//! Candidate directories are tried in order: the configured temp directory,
//! the host temp directory, the current directory. The name is the prefix
//! plus 15 characters sampled from an alphanumeric alphabet via
//! [`Vfs::randomness`], re-sampled until the candidate is absent from the
//! filesystem. A process-wide sequence number is folded into every sample
//! because the randomness source is clock-seeded and would otherwise repeat
//! within one millisecond.
//!
//! ## Clock
//!
//! Both time representations come from a single host millisecond clock
//! offset by a fixed epoch constant (the Julian day number of the Unix
//! epoch, in milliseconds), so the floating Julian-day form always equals
//! the integer form divided by the milliseconds in a day.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{ErrorCode, Result, VfsError};
use crate::mutex::{MutexKind, MutexSubsystem};

use super::file::{FileHandle, HostIoMethods, IoMethods};
use super::{AccessMode, OpenFlags, OpenOutcome, Vfs};

/// Registry name of the host VFS.
pub const HOST_VFS_NAME: &str = "host";

/// Prefix for synthesized temporary file names.
pub const TEMP_FILE_PREFIX: &str = "hostvfs_";

const TEMP_NAME_RANDOM_LEN: usize = 15;

const ALPHANUMERIC: &[u8; 62] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Milliseconds between the Julian epoch and the Unix epoch.
const JULIAN_UNIX_EPOCH_MS: i64 = 24_405_875 * 8_640_000;

/// Smallest legal randomness request: a timestamp plus an integer.
const MIN_RANDOMNESS_LEN: usize = std::mem::size_of::<u64>() + std::mem::size_of::<u32>();

// Folded into temp-name samples; the clock-seeded mixer repeats within one
// millisecond and the existence re-check alone cannot break that tie.
static TEMP_NAME_SEQ: AtomicU64 = AtomicU64::new(0);

fn host_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Deterministic feedback mixer over the host clock.
///
/// Two rolling tick values are seeded from the low and second-low bytes of
/// the current millisecond timestamp and folded through every output byte.
/// Explicitly NOT cryptographically strong; it exists only so temp-file
/// suffixes do not repeat across calls.
pub(crate) fn fill_randomness(buf: &mut [u8]) -> usize {
    debug_assert!(
        buf.len() >= MIN_RANDOMNESS_LEN,
        "randomness buffer must hold a timestamp plus an integer"
    );

    let now = host_millis() as u64;
    let mut tick8 = now as u8;
    let mut tick16 = (now >> 8) as u8;

    for (i, byte) in buf.iter_mut().enumerate() {
        *byte = (i as u8) ^ tick8 ^ tick16;
        tick8 = *byte;
        tick16 = !(tick8 ^ tick16);
    }

    buf.len()
}

/// Lexically normalizes an absolute path: strips `.`, resolves `..` against
/// the preceding component. No filesystem access, so the result exists only
/// if its components do.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir.as_os_str());
                }
            }
            Component::Normal(c) => out.push(c),
        }
    }
    out
}

/// The host-backed VFS adapter.
pub struct HostVfs {
    name: String,
    mutex: Arc<MutexSubsystem>,
    io: Arc<dyn IoMethods>,
    temp_dir: Option<PathBuf>,
}

impl std::fmt::Debug for HostVfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostVfs")
            .field("name", &self.name)
            .field("temp_dir", &self.temp_dir)
            .finish()
    }
}

impl HostVfs {
    /// Builds the adapter with the default host io-methods surface.
    pub fn new(mutex: Arc<MutexSubsystem>) -> Self {
        Self::with_io_methods(mutex, Arc::new(HostIoMethods::new()))
    }

    /// Builds the adapter around an externally supplied io-methods surface.
    pub fn with_io_methods(mutex: Arc<MutexSubsystem>, io: Arc<dyn IoMethods>) -> Self {
        Self {
            name: HOST_VFS_NAME.to_string(),
            mutex,
            io,
            temp_dir: None,
        }
    }

    /// Overrides the directory used for synthesized temporary files.
    pub fn set_temp_directory<P: Into<PathBuf>>(&mut self, dir: P) {
        self.temp_dir = Some(dir.into());
    }

    fn temp_file_dir(&self) -> PathBuf {
        if let Some(dir) = &self.temp_dir {
            if dir.is_dir() {
                return dir.clone();
            }
        }
        let host_tmp = std::env::temp_dir();
        if host_tmp.is_dir() {
            return host_tmp;
        }
        PathBuf::from(".")
    }

    /// Synthesizes a unique temporary file name: prefix plus random
    /// alphanumeric suffix, re-sampled until the candidate does not exist.
    fn temp_file_name(&self) -> Result<PathBuf> {
        let dir = self.temp_file_dir();

        loop {
            let mut raw = [0u8; TEMP_NAME_RANDOM_LEN];
            fill_randomness(&mut raw);

            let seq = TEMP_NAME_SEQ.fetch_add(1, Ordering::Relaxed);
            for (i, byte) in raw.iter_mut().enumerate() {
                *byte = byte.wrapping_add((seq >> ((i % 8) * 8)) as u8);
            }

            let mut name = String::with_capacity(TEMP_FILE_PREFIX.len() + TEMP_NAME_RANDOM_LEN);
            name.push_str(TEMP_FILE_PREFIX);
            for byte in raw {
                name.push(ALPHANUMERIC[(byte % 62) as usize] as char);
            }

            let candidate = dir.join(name);
            if candidate.as_os_str().len() >= self.max_pathname() {
                return Err(VfsError::with_path(
                    ErrorCode::PathTooLong,
                    "temp_file_name",
                    &candidate,
                ));
            }

            if !candidate.exists() {
                return Ok(candidate);
            }
        }
    }
}

fn host_open(path: &Path, flags: OpenFlags) -> io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.read(true);
    if flags.contains(OpenFlags::READ_WRITE) {
        opts.write(true);
    }
    if flags.contains(OpenFlags::CREATE) {
        opts.create(true);
    }
    if flags.contains(OpenFlags::EXCLUSIVE) {
        opts.create_new(true);
    }
    opts.open(path)
}

impl Vfs for HostVfs {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self, path: Option<&Path>, flags: OpenFlags) -> Result<OpenOutcome> {
        flags.debug_check_open_invariants();
        let mut flags = flags;

        let path = match path {
            Some(p) => p.to_path_buf(),
            None => self.temp_file_name()?,
        };

        let file = match host_open(&path, flags) {
            Ok(file) => file,
            Err(first) => {
                let downgradable = flags.contains(OpenFlags::READ_WRITE)
                    && !flags.contains(OpenFlags::EXCLUSIVE)
                    && first.kind() != io::ErrorKind::IsADirectory;

                if !downgradable {
                    return Err(VfsError::from_host(
                        ErrorCode::CantOpen,
                        "open",
                        Some(&path),
                        first,
                    ));
                }

                // Read-only fallback: a retry, not a second error path.
                flags.remove(OpenFlags::READ_WRITE | OpenFlags::CREATE);
                flags.insert(OpenFlags::READ_ONLY);
                match host_open(&path, flags) {
                    Ok(file) => file,
                    Err(second) => {
                        return Err(VfsError::from_host(
                            ErrorCode::CantOpen,
                            "open",
                            Some(&path),
                            second,
                        ))
                    }
                }
            }
        };

        if flags.contains(OpenFlags::DELETE_ON_CLOSE) {
            // The handle is already held by the underlying filesystem, so
            // the name can go now while the handle stays usable until close.
            let _ = fs::remove_file(&path);
        }

        let handle = FileHandle::new(
            file,
            path,
            Arc::clone(&self.io),
            self.mutex.alloc(MutexKind::Fast),
        );

        Ok(OpenOutcome { handle, flags })
    }

    fn delete(&self, path: &Path, sync_dir: bool) -> Result<()> {
        if let Err(e) = fs::remove_file(path) {
            return Err(if e.kind() == io::ErrorKind::NotFound {
                VfsError::with_path(ErrorCode::DeleteNotFound, "unlink", path)
            } else {
                VfsError::from_host(ErrorCode::DeleteFailed, "unlink", Some(path), e)
            });
        }

        if sync_dir {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                let synced = File::open(parent).and_then(|dir| dir.sync_all());
                if let Err(e) = synced {
                    // The failure code is computed and then discarded; this
                    // path has always returned success afterwards and callers
                    // depend on that. Looks unintentional — kept unchanged
                    // for compatibility, logged loudly instead.
                    let discarded =
                        VfsError::from_host(ErrorCode::DirSyncFailed, "fsync", Some(path), e);
                    tracing::warn!(
                        path = %path.display(),
                        error = %discarded,
                        "directory sync failure discarded after delete"
                    );
                }
            }
        }

        Ok(())
    }

    fn access(&self, path: &Path, mode: AccessMode) -> Result<bool> {
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(VfsError::from_host(
                    ErrorCode::AccessFailed,
                    "stat",
                    Some(path),
                    e,
                ))
            }
        };

        Ok(match mode {
            // A present file of stored size zero is reported as absent:
            // zero-length artifacts indicate a prior failed write the
            // engine must not resume.
            AccessMode::Exists => meta.len() > 0,
            AccessMode::Read => true,
            AccessMode::ReadWrite => !meta.permissions().readonly(),
        })
    }

    fn full_pathname(&self, path: &Path) -> Result<PathBuf> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            let cwd = std::env::current_dir().map_err(|e| {
                VfsError::from_host(ErrorCode::AccessFailed, "getcwd", Some(path), e)
            })?;
            cwd.join(path)
        };

        let normalized = normalize_lexically(&absolute);
        if normalized.as_os_str().len() >= self.max_pathname() {
            return Err(VfsError::with_path(
                ErrorCode::PathTooLong,
                "full_pathname",
                &normalized,
            ));
        }

        Ok(normalized)
    }

    fn randomness(&self, buf: &mut [u8]) -> usize {
        fill_randomness(buf)
    }

    fn sleep(&self, micros: u64) -> u64 {
        let millis = micros.div_ceil(1000);
        std::thread::sleep(Duration::from_millis(millis));
        millis * 1000
    }

    fn current_time_millis(&self) -> i64 {
        JULIAN_UNIX_EPOCH_MS + host_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_vfs() -> HostVfs {
        HostVfs::new(Arc::new(MutexSubsystem::init()))
    }

    fn test_vfs_in(dir: &Path) -> HostVfs {
        let mut vfs = test_vfs();
        vfs.set_temp_directory(dir);
        vfs
    }

    mod open_tests {
        use super::*;
        use crate::vfs::LockLevel;

        #[test]
        fn open_create_populates_handle_with_no_lock() {
            let dir = tempdir().unwrap();
            let vfs = test_vfs();

            let outcome = vfs
                .open(
                    Some(&dir.path().join("db.main")),
                    OpenFlags::READ_WRITE | OpenFlags::CREATE,
                )
                .unwrap();

            assert_eq!(outcome.handle.lock_level(), LockLevel::None);
            assert_eq!(outcome.handle.chunk_size(), 0);
            assert!(outcome.flags.contains(OpenFlags::READ_WRITE));
        }

        #[test]
        fn open_then_access_reports_existing_once_nonempty() {
            let dir = tempdir().unwrap();
            let vfs = test_vfs();
            let path = dir.path().join("db.main");

            let mut outcome = vfs
                .open(Some(&path), OpenFlags::READ_WRITE | OpenFlags::CREATE)
                .unwrap();

            // Freshly created and still empty: the zero-length policy says
            // it does not exist yet.
            assert!(!vfs.access(&path, AccessMode::Exists).unwrap());

            outcome.handle.write_at(0, b"page zero").unwrap();
            assert!(vfs.access(&path, AccessMode::Exists).unwrap());
        }

        #[test]
        fn open_missing_file_without_create_fails_with_cantopen() {
            let dir = tempdir().unwrap();
            let vfs = test_vfs();

            let err = vfs
                .open(Some(&dir.path().join("absent.db")), OpenFlags::READ_ONLY)
                .unwrap_err();

            assert_eq!(err.code(), ErrorCode::CantOpen);
        }

        #[test]
        fn exclusive_open_of_existing_file_fails() {
            let dir = tempdir().unwrap();
            let vfs = test_vfs();
            let path = dir.path().join("already.db");
            fs::write(&path, b"x").unwrap();

            let err = vfs
                .open(
                    Some(&path),
                    OpenFlags::READ_WRITE | OpenFlags::CREATE | OpenFlags::EXCLUSIVE,
                )
                .unwrap_err();

            assert_eq!(err.code(), ErrorCode::CantOpen);
        }

        #[cfg(unix)]
        #[test]
        fn read_write_open_on_readonly_file_downgrades_to_read_only() {
            let dir = tempdir().unwrap();
            let vfs = test_vfs();
            let path = dir.path().join("media.db");
            fs::write(&path, b"frozen").unwrap();

            let mut perms = fs::metadata(&path).unwrap().permissions();
            perms.set_readonly(true);
            fs::set_permissions(&path, perms).unwrap();

            let outcome = vfs.open(Some(&path), OpenFlags::READ_WRITE).unwrap();

            assert!(outcome.flags.contains(OpenFlags::READ_ONLY));
            assert!(!outcome.flags.contains(OpenFlags::READ_WRITE));

            let mut restore = fs::metadata(&path).unwrap().permissions();
            restore.set_readonly(false);
            fs::set_permissions(&path, restore).unwrap();
        }

        #[test]
        fn delete_on_close_removes_path_while_handle_stays_usable() {
            let dir = tempdir().unwrap();
            let vfs = test_vfs();
            let path = dir.path().join("transient.db");

            let mut outcome = vfs
                .open(
                    Some(&path),
                    OpenFlags::READ_WRITE | OpenFlags::CREATE | OpenFlags::DELETE_ON_CLOSE,
                )
                .unwrap();

            assert!(!path.exists());

            outcome.handle.write_at(0, b"still usable").unwrap();
            let mut buf = [0u8; 12];
            assert_eq!(outcome.handle.read_at(0, &mut buf).unwrap(), 12);
            assert_eq!(&buf, b"still usable");
        }
    }

    mod temp_name_tests {
        use super::*;

        #[test]
        fn temp_opens_in_immediate_succession_yield_distinct_paths() {
            let dir = tempdir().unwrap();
            let vfs = test_vfs_in(dir.path());
            let flags = OpenFlags::READ_WRITE | OpenFlags::CREATE | OpenFlags::DELETE_ON_CLOSE;

            let first = vfs.open(None, flags).unwrap();
            let second = vfs.open(None, flags).unwrap();

            assert_ne!(first.handle.path(), second.handle.path());
        }

        #[test]
        fn temp_names_carry_prefix_and_land_in_configured_dir() {
            let dir = tempdir().unwrap();
            let vfs = test_vfs_in(dir.path());

            let outcome = vfs
                .open(None, OpenFlags::READ_WRITE | OpenFlags::CREATE)
                .unwrap();

            let path = outcome.handle.path();
            assert_eq!(path.parent(), Some(dir.path()));
            assert!(path
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(TEMP_FILE_PREFIX));
        }

        #[test]
        fn temp_name_resamples_when_candidate_already_exists() {
            let dir = tempdir().unwrap();
            let vfs = test_vfs_in(dir.path());

            // Exhaustively pre-creating candidates is not possible, but two
            // back-to-back generations within the same millisecond must not
            // collide either.
            let a = vfs.temp_file_name().unwrap();
            fs::write(&a, b"taken").unwrap();
            let b = vfs.temp_file_name().unwrap();

            assert_ne!(a, b);
            assert!(!b.exists());
        }
    }

    mod delete_tests {
        use super::*;

        #[test]
        fn delete_missing_path_reports_not_found_distinctly() {
            let dir = tempdir().unwrap();
            let vfs = test_vfs();

            let err = vfs
                .delete(&dir.path().join("missing.db"), false)
                .unwrap_err();

            assert_eq!(err.code(), ErrorCode::DeleteNotFound);
            assert_ne!(err.code(), ErrorCode::DeleteFailed);
        }

        #[test]
        fn delete_existing_file_succeeds_and_file_is_gone() {
            let dir = tempdir().unwrap();
            let vfs = test_vfs();
            let path = dir.path().join("doomed.db");
            fs::write(&path, b"bytes").unwrap();

            vfs.delete(&path, false).unwrap();

            assert!(!path.exists());
            assert!(!vfs.access(&path, AccessMode::Exists).unwrap());
        }

        #[test]
        fn delete_with_sync_dir_still_reports_success() {
            let dir = tempdir().unwrap();
            let vfs = test_vfs();
            let path = dir.path().join("synced.db");
            fs::write(&path, b"bytes").unwrap();

            vfs.delete(&path, true).unwrap();

            assert!(!path.exists());
        }
    }

    mod access_tests {
        use super::*;

        #[test]
        fn zero_length_file_is_reported_absent() {
            let dir = tempdir().unwrap();
            let vfs = test_vfs();
            let path = dir.path().join("empty.db");
            fs::write(&path, b"").unwrap();

            assert!(path.exists());
            assert!(!vfs.access(&path, AccessMode::Exists).unwrap());
        }

        #[test]
        fn nonempty_file_is_readable_and_writable() {
            let dir = tempdir().unwrap();
            let vfs = test_vfs();
            let path = dir.path().join("full.db");
            fs::write(&path, b"content").unwrap();

            assert!(vfs.access(&path, AccessMode::Exists).unwrap());
            assert!(vfs.access(&path, AccessMode::Read).unwrap());
            assert!(vfs.access(&path, AccessMode::ReadWrite).unwrap());
        }

        #[cfg(unix)]
        #[test]
        fn readonly_file_fails_readwrite_check_but_passes_read() {
            let dir = tempdir().unwrap();
            let vfs = test_vfs();
            let path = dir.path().join("frozen.db");
            fs::write(&path, b"content").unwrap();

            let mut perms = fs::metadata(&path).unwrap().permissions();
            perms.set_readonly(true);
            fs::set_permissions(&path, perms).unwrap();

            assert!(vfs.access(&path, AccessMode::Read).unwrap());
            assert!(!vfs.access(&path, AccessMode::ReadWrite).unwrap());

            let mut restore = fs::metadata(&path).unwrap().permissions();
            restore.set_readonly(false);
            fs::set_permissions(&path, restore).unwrap();
        }
    }

    mod pathname_tests {
        use super::*;

        #[test]
        fn relative_path_becomes_absolute() {
            let vfs = test_vfs();

            let full = vfs.full_pathname(Path::new("some/file.db")).unwrap();

            assert!(full.is_absolute());
            assert!(full.ends_with("some/file.db"));
        }

        #[test]
        fn dot_and_dotdot_components_are_resolved() {
            let vfs = test_vfs();

            let full = vfs
                .full_pathname(Path::new("/data/./journals/../main.db"))
                .unwrap();

            assert_eq!(full, PathBuf::from("/data/main.db"));
        }

        #[test]
        fn overlong_path_is_rejected() {
            let vfs = test_vfs();
            let long = format!("/{}", "x".repeat(MAX_PATHNAME_TEST));

            let err = vfs.full_pathname(Path::new(&long)).unwrap_err();

            assert_eq!(err.code(), ErrorCode::PathTooLong);
        }

        const MAX_PATHNAME_TEST: usize = crate::vfs::MAX_PATHNAME + 8;
    }

    mod clock_tests {
        use super::*;
        use crate::vfs::MILLIS_PER_DAY;

        #[test]
        fn float_time_equals_millis_divided_by_millis_per_day() {
            let vfs = test_vfs();

            let millis = vfs.current_time_millis();
            let float = vfs.current_time();

            // Both derive from the same clock; bound the drift between the
            // two samples to well under a day.
            let reconstructed = float * MILLIS_PER_DAY as f64;
            assert!((reconstructed - millis as f64).abs() < 10_000.0);
        }

        #[test]
        fn current_time_millis_is_offset_by_julian_epoch() {
            let vfs = test_vfs();

            assert!(vfs.current_time_millis() > JULIAN_UNIX_EPOCH_MS);
        }

        #[test]
        fn clock_advances_at_least_as_fast_as_sleep() {
            let vfs = test_vfs();

            let before = vfs.current_time_millis();
            vfs.sleep(25_000);
            let after = vfs.current_time_millis();

            assert!(after - before >= 20, "clock advanced only {}ms", after - before);
        }

        #[test]
        fn sleep_rounds_up_to_whole_milliseconds() {
            let vfs = test_vfs();

            assert_eq!(vfs.sleep(1), 1000);
            assert_eq!(vfs.sleep(1500), 2000);
            assert_eq!(vfs.sleep(2000), 2000);
        }
    }

    mod randomness_tests {
        use super::*;

        #[test]
        fn fills_entire_buffer_and_reports_length() {
            let vfs = test_vfs();
            let mut buf = [0u8; 32];

            assert_eq!(vfs.randomness(&mut buf), 32);
        }

        #[test]
        fn output_is_not_all_zero_for_typical_clock_values() {
            let vfs = test_vfs();
            let mut buf = [0u8; 16];
            vfs.randomness(&mut buf);

            // The feedback mix flips ticks every byte; an all-zero output
            // would require a pathological clock value.
            assert!(buf.iter().any(|&b| b != 0));
        }
    }

    mod syscall_stub_tests {
        use super::*;

        #[test]
        fn system_call_hooks_report_unsupported() {
            let vfs = test_vfs();

            assert_eq!(
                vfs.set_system_call("open", None).unwrap_err().code(),
                ErrorCode::NotFound
            );
            assert!(vfs.get_system_call("open").is_none());
            assert!(vfs.next_system_call(None).is_none());
            assert!(vfs.last_error().is_none());
        }
    }
}
