//! Report generation for validation runs.
//!
//! This crate provides:
//! - A serializable report context built from a `ResultCollection`
//! - Minijinja rendering of JUnit XML, plain-text and HTML reports
//! - A report writer with timestamped file names and a cross-run `index.html`

pub mod context;
pub mod error;
pub mod templating;
pub mod writer;

pub use context::ReportContext;
pub use error::ReportError;
pub use templating::ReportRenderer;
pub use writer::{report_stem, ReportWriter, WrittenReports};
