use std::path::{Component, Path, PathBuf};

use autorun_model::TaskKey;
use tracing::{debug, trace, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::CoreError;

/// Where to look for tasks and how to recognize them.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub root: PathBuf,
    /// Substring a file name must contain.
    pub marker: String,
    /// Extension a file must have, without the dot.
    pub extension: String,
    /// Paths under this directory are never tasks (rendered artifacts live here).
    pub exclude: Option<PathBuf>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            marker: "autorun".to_string(),
            extension: "ipynb".to_string(),
            exclude: None,
        }
    }
}

/// A discovered task file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Absolute path.
    pub path: PathBuf,
    /// Path relative to the discovery root, `/`-separated.
    pub key: TaskKey,
}

/// Recursively list task files under `cfg.root`, sorted by relative path.
///
/// Hidden files and directories (any component starting with `.`) are skipped, as is the excluded directory.
/// An unreadable root fails the whole discovery; unreadable entries below it are skipped.
pub fn discover(cfg: &DiscoveryConfig) -> Result<Vec<Task>, CoreError> {
    let root = cfg.root.canonicalize().map_err(|e| CoreError::Discovery {
        root: cfg.root.clone(),
        reason: e.to_string(),
    })?;
    let exclude = cfg.exclude.as_ref().and_then(|p| p.canonicalize().ok());

    let walker = WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| keep_entry(e, exclude.as_deref()));

    let mut tasks = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(CoreError::Discovery {
                    root,
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                warn!(target: "autorun.core.discovery", error = %e, "skipping unreadable entry");
                continue;
            }
        };

        if !entry.file_type().is_file() || !matches_name(&entry, cfg) {
            continue;
        }

        let Ok(rel) = entry.path().strip_prefix(&root) else {
            continue;
        };
        let key = task_key(rel);
        trace!(target: "autorun.core.discovery", task = %key, "candidate");
        tasks.push(Task {
            path: entry.path().to_path_buf(),
            key,
        });
    }

    tasks.sort_by(|a, b| a.key.cmp(&b.key));
    debug!(target: "autorun.core.discovery", root = %root.display(), count = tasks.len(), "discovery finished");
    Ok(tasks)
}

fn keep_entry(entry: &DirEntry, exclude: Option<&Path>) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    if entry.file_name().to_string_lossy().starts_with('.') {
        return false;
    }
    match exclude {
        Some(dir) => entry.path() != dir,
        None => true,
    }
}

fn matches_name(entry: &DirEntry, cfg: &DiscoveryConfig) -> bool {
    let path = entry.path();
    let name = entry.file_name().to_string_lossy();
    let ext_ok = path
        .extension()
        .is_some_and(|ext| ext.to_string_lossy() == cfg.extension);
    ext_ok && name.contains(cfg.marker.as_str())
}

fn task_key(rel: &Path) -> TaskKey {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
