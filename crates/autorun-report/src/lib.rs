//! Static HTML status page rendered from the run history.

mod error;
pub use error::ReportError;

mod html;
pub use html::{ReportMeta, render};

mod reporter;
pub use reporter::HtmlReporter;
