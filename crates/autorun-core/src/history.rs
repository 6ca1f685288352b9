//! Durable history of the last run of every known task.
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use autorun_model::History;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::CoreError;

/// JSON file holding the [`History`], rewritten wholesale once per pass.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted history.
    ///
    /// A missing or unreadable file yields an empty history; it is overwritten by the next save.
    pub fn load(&self) -> History {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(target: "autorun.core.history", path = %self.path.display(), "no history yet");
                return History::new();
            }
            Err(e) => {
                warn!(target: "autorun.core.history", path = %self.path.display(), error = %e, "history unreadable; starting empty");
                return History::new();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(history) => history,
            Err(e) => {
                warn!(target: "autorun.core.history", path = %self.path.display(), error = %e, "history corrupt; starting empty");
                History::new()
            }
        }
    }

    /// Replace the persisted history with `history`.
    ///
    /// Written to a temporary sibling and renamed into place, so readers see either the old or the new file.
    pub fn save(&self, history: &History) -> Result<(), CoreError> {
        let content = serde_json::to_vec_pretty(history).map_err(|e| self.err(e))?;
        write_atomic(&self.path, &content).map_err(|e| self.err(e))?;
        debug!(target: "autorun.core.history", path = %self.path.display(), tasks = history.len(), "history saved");
        Ok(())
    }

    fn err(&self, e: impl std::fmt::Display) -> CoreError {
        CoreError::History {
            path: self.path.clone(),
            reason: e.to_string(),
        }
    }
}

/// Merge the results of this pass into the previous history.
///
/// Every task observed this pass replaces or inserts its record; every previous task not observed this pass
/// is dropped.
pub fn reconcile(current: History, mut previous: History) -> History {
    let before = previous.len();
    previous.retain(|key, _| current.contains(key));
    let purged = before - previous.len();
    if purged > 0 {
        debug!(target: "autorun.core.history", purged, "dropped records of vanished tasks");
    }
    previous.extend(current);
    previous
}

/// Write `content` to a temporary sibling of `path`, fsync it and rename it over `path`.
pub fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let tmp = parent.join(format!(".{}.tmp", Uuid::new_v4()));
    let written = (|| -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&tmp)?;
        file.write_all(content)?;
        file.sync_all()
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}
