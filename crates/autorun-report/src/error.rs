use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<ReportError> for autorun_core::CoreError {
    fn from(e: ReportError) -> Self {
        autorun_core::CoreError::Report(e.to_string())
    }
}
