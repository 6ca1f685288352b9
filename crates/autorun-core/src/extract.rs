//! Trigger metadata extraction.
use std::{fs, path::Path};

use autorun_model::TaskConfig;
use serde_json::Value;
use tracing::debug;

use crate::error::TaskError;

/// Pulls the trigger configuration out of a task file.
///
/// `Ok(None)` means the file carries no usable trigger; such a task is recorded as not run.
/// `Err` is reserved for failures that say nothing about the file's content (e.g. it vanished mid-pass).
pub trait Extractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Option<TaskConfig>, TaskError>;
}

/// Reads the `metadata.<section>` object of a Jupyter notebook.
///
/// ```json
/// { "metadata": { "autorun": { "every": "1 hour", "MaxMem": 512 } }, "cells": [] }
/// ```
///
/// Scalar values are stringified; nested values are ignored.
#[derive(Debug, Clone)]
pub struct NotebookExtractor {
    section: String,
}

impl NotebookExtractor {
    pub fn new() -> Self {
        Self {
            section: "autorun".to_string(),
        }
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = section.into();
        self
    }

    /// Extract from already-loaded notebook bytes.
    pub fn from_bytes(&self, bytes: &[u8]) -> Option<TaskConfig> {
        let doc: Value = serde_json::from_slice(bytes).ok()?;
        let section = doc.get("metadata")?.get(&self.section)?.as_object()?;

        let cfg: TaskConfig = section
            .iter()
            .filter_map(|(k, v)| scalar(v).map(|v| (k.clone(), v)))
            .collect();
        (!cfg.is_empty()).then_some(cfg)
    }
}

impl Default for NotebookExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for NotebookExtractor {
    fn extract(&self, path: &Path) -> Result<Option<TaskConfig>, TaskError> {
        let bytes = fs::read(path).map_err(|e| TaskError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let cfg = self.from_bytes(&bytes);
        if cfg.is_none() {
            debug!(target: "autorun.core.extract", path = %path.display(), "no trigger metadata");
        }
        Ok(cfg)
    }
}

fn scalar(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
