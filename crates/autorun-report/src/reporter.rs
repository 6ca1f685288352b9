use std::path::{Path, PathBuf};

use autorun_core::{CoreError, Reporter, clock::format_timestamp, write_atomic};
use autorun_model::History;
use tracing::debug;

use crate::{
    error::ReportError,
    html::{ReportMeta, render},
};

/// [`Reporter`] writing the status page to a single HTML file.
#[derive(Debug, Clone)]
pub struct HtmlReporter {
    path: PathBuf,
    title: String,
    artifact_extension: String,
}

impl HtmlReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let defaults = ReportMeta::default();
        Self {
            path: path.into(),
            title: defaults.title,
            artifact_extension: defaults.artifact_extension,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_artifact_extension(mut self, ext: impl Into<String>) -> Self {
        self.artifact_extension = ext.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, history: &History, generated_at: i64) -> Result<(), ReportError> {
        let meta = ReportMeta {
            title: self.title.clone(),
            generated_at: format_timestamp(generated_at),
            artifact_extension: self.artifact_extension.clone(),
        };
        let doc = render(history, &meta);
        write_atomic(&self.path, doc.as_bytes()).map_err(|source| ReportError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(target: "autorun.report", path = %self.path.display(), tasks = history.len(), "report written");
        Ok(())
    }
}

impl Reporter for HtmlReporter {
    fn publish(&self, history: &History, generated_at: i64) -> Result<(), CoreError> {
        Ok(self.write(history, generated_at)?)
    }
}
