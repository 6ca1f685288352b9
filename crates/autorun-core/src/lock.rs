use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use fs2::FileExt;
use tracing::trace;

use crate::error::CoreError;

/// Exclusive advisory lock held for the duration of one pass.
///
/// Keeps two overlapping ticks from reading and writing the history concurrently. Released on drop; the
/// lock file itself stays in place.
#[derive(Debug)]
pub struct PassLock {
    file: File,
    path: PathBuf,
}

impl PassLock {
    /// Try to take the lock without blocking.
    ///
    /// Returns [`CoreError::Busy`] when another pass holds it.
    pub fn try_acquire(path: &Path) -> Result<Self, CoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| lock_err(path, e))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| lock_err(path, e))?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                return Err(CoreError::Busy(path.to_path_buf()));
            }
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                return Err(CoreError::Busy(path.to_path_buf()));
            }
            Err(e) => return Err(lock_err(path, e)),
        }

        // Owner pid, for humans inspecting a stuck lock.
        file.set_len(0).map_err(|e| lock_err(path, e))?;
        writeln!(file, "{}", std::process::id()).map_err(|e| lock_err(path, e))?;

        trace!(target: "autorun.core.lock", path = %path.display(), "pass lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PassLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn lock_err(path: &Path, e: io::Error) -> CoreError {
    CoreError::Lock {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}
