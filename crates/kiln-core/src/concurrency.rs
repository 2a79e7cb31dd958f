use crate::CoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Exclusive per-project export lock. Released on drop.
#[derive(Debug)]
pub struct ExportLock {
    lock_file: File,
}

impl ExportLock {
    /// Take the lock or fail fast with [`CoreError::ExportInProgress`].
    pub fn acquire(lock_path: &Path) -> Result<Self, CoreError> {
        Self::try_acquire(lock_path)?.ok_or(CoreError::ExportInProgress)
    }

    pub fn try_acquire(lock_path: &Path) -> Result<Option<Self>, CoreError> {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(lock_path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { lock_file: file })),
            Err(_) => Ok(None),
        }
    }
}

impl Drop for ExportLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// First Ctrl-C sets the shutdown flag; the second exits immediately.
pub fn install_signal_handler() {
    let _ = ctrlc::set_handler(move || {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            std::process::exit(130);
        }
        SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
        eprintln!("\nshutdown requested, stopping the server before exit...");
    });
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join(".kiln").join("export.lock");

        {
            let _lock = ExportLock::acquire(&lock_path).unwrap();
            assert!(lock_path.exists());
        }
    }

    #[test]
    fn second_export_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("export.lock");

        let _lock = ExportLock::acquire(&lock_path).unwrap();
        assert!(ExportLock::try_acquire(&lock_path).unwrap().is_none());
        assert!(matches!(
            ExportLock::acquire(&lock_path),
            Err(CoreError::ExportInProgress)
        ));
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("export.lock");

        {
            let _lock = ExportLock::acquire(&lock_path).unwrap();
        }

        let lock2 = ExportLock::try_acquire(&lock_path).unwrap();
        assert!(lock2.is_some());
    }
}
