//! Minijinja rendering of the report formats.
//!
//! Templates are compiled into the binary and registered once. Autoescaping
//! follows the template name, so `junit.xml`, `report.html` and `index.html`
//! are escaped and `summary.txt` is not.

use minijinja::Environment;
use serde::Serialize;

use crate::context::ReportContext;
use crate::error::ReportError;

pub const JUNIT_TEMPLATE: &str = "junit.xml";
pub const SUMMARY_TEMPLATE: &str = "summary.txt";
pub const HTML_TEMPLATE: &str = "report.html";
pub const INDEX_TEMPLATE: &str = "index.html";

/// One linked report in `index.html`.
#[derive(Debug, Clone, Serialize)]
pub struct IndexEntry {
    pub name: String,
    pub href: String,
    pub modified: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexContext {
    pub generated: String,
    pub reports: Vec<IndexEntry>,
}

/// Renders reports from a [`ReportContext`].
#[derive(Debug)]
pub struct ReportRenderer {
    env: Environment<'static>,
}

impl ReportRenderer {
    /// Create a renderer with every report template registered.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Template`] if a bundled template fails to parse.
    pub fn new() -> Result<Self, ReportError> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);

        env.add_template(JUNIT_TEMPLATE, include_str!("../templates/junit.xml"))?;
        env.add_template(SUMMARY_TEMPLATE, include_str!("../templates/summary.txt"))?;
        env.add_template(HTML_TEMPLATE, include_str!("../templates/report.html"))?;
        env.add_template(INDEX_TEMPLATE, include_str!("../templates/index.html"))?;
        Ok(Self { env })
    }

    fn render<S: Serialize>(&self, name: &str, ctx: &S) -> Result<String, ReportError> {
        Ok(self.env.get_template(name)?.render(ctx)?)
    }

    pub fn junit(&self, ctx: &ReportContext) -> Result<String, ReportError> {
        self.render(JUNIT_TEMPLATE, ctx)
    }

    pub fn summary(&self, ctx: &ReportContext) -> Result<String, ReportError> {
        self.render(SUMMARY_TEMPLATE, ctx)
    }

    pub fn html(&self, ctx: &ReportContext) -> Result<String, ReportError> {
        self.render(HTML_TEMPLATE, ctx)
    }

    pub fn index(&self, ctx: &IndexContext) -> Result<String, ReportError> {
        self.render(INDEX_TEMPLATE, ctx)
    }
}
