//! Writing reports to the report directory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use ids_core::config::ReportConfig;
use ids_rules::ResultCollection;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::context::ReportContext;
use crate::error::ReportError;
use crate::templating::{IndexContext, IndexEntry, ReportRenderer, INDEX_TEMPLATE};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Paths of the files written for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenReports {
    pub junit: PathBuf,
    pub summary: PathBuf,
    pub html: PathBuf,
    pub index: PathBuf,
}

/// A file-name stem for a store URI: its last path segment with every
/// character outside `[A-Za-z0-9_-]` replaced by `_`.
pub fn report_stem(uri: &str) -> String {
    let last = uri
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("");
    let stem: String = last
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.trim_matches('_').is_empty() {
        "report".to_string()
    } else {
        stem
    }
}

pub struct ReportWriter {
    dir: PathBuf,
    renderer: ReportRenderer,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ReportError> {
        Ok(Self {
            dir: dir.into(),
            renderer: ReportRenderer::new()?,
        })
    }

    pub fn from_config(config: &ReportConfig) -> Result<Self, ReportError> {
        Self::new(config.dir.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `<stem>_<timestamp>.{xml,txt,html}` and refresh `index.html`.
    pub fn write(&self, collection: &ResultCollection, stem: &str) -> Result<WrittenReports, ReportError> {
        self.write_at(collection, stem, Local::now())
    }

    pub fn write_at(
        &self,
        collection: &ResultCollection,
        stem: &str,
        now: DateTime<Local>,
    ) -> Result<WrittenReports, ReportError> {
        fs::create_dir_all(&self.dir).map_err(|source| ReportError::Write {
            path: self.dir.clone(),
            source,
        })?;

        let context = ReportContext::build(collection, now);
        let base = self.unique_base(&format!("{stem}_{}", now.format(TIMESTAMP_FORMAT)));

        let junit = self.save(&base, "xml", &self.renderer.junit(&context)?)?;
        let summary = self.save(&base, "txt", &self.renderer.summary(&context)?)?;
        let html = self.save(&base, "html", &self.renderer.html(&context)?)?;
        let index = self.write_index(now)?;

        info!(
            uri = %collection.uri,
            junit = %junit.display(),
            summary = %summary.display(),
            html = %html.display(),
            "reports written"
        );
        Ok(WrittenReports {
            junit,
            summary,
            html,
            index,
        })
    }

    /// Rebuild `index.html` from every HTML report in the directory,
    /// newest file name first.
    pub fn write_index(&self, now: DateTime<Local>) -> Result<PathBuf, ReportError> {
        let mut reports = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !entry.file_type().is_file() || !name.ends_with(".html") || name == INDEX_TEMPLATE {
                continue;
            }
            let modified = entry
                .metadata()?
                .modified()
                .ok()
                .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default();
            reports.push(IndexEntry {
                href: name.clone(),
                name,
                modified,
            });
        }
        reports.sort_by(|a, b| b.name.cmp(&a.name));
        debug!(dir = %self.dir.display(), count = reports.len(), "indexing reports");

        let context = IndexContext {
            generated: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            reports,
        };
        let path = self.dir.join(INDEX_TEMPLATE);
        write_file(&path, &self.renderer.index(&context)?)?;
        Ok(path)
    }

    /// `base`, or `base_<n>` when a report with that name already exists.
    fn unique_base(&self, base: &str) -> String {
        let taken = |b: &str| ["xml", "txt", "html"].iter().any(|ext| self.dir.join(format!("{b}.{ext}")).exists());
        if !taken(base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{base}_{n}"))
            .find(|b| !taken(b))
            .unwrap_or_else(|| base.to_string())
    }

    fn save(&self, base: &str, ext: &str, content: &str) -> Result<PathBuf, ReportError> {
        let path = self.dir.join(format!("{base}.{ext}"));
        write_file(&path, content)?;
        Ok(path)
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), ReportError> {
    fs::write(path, content).map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::TimeZone;
    use tempfile::TempDir;

    use super::*;

    fn empty_run() -> ResultCollection {
        ResultCollection {
            uri: "/data/shot_1".to_string(),
            results: Vec::new(),
            coverage: BTreeMap::new(),
        }
    }

    #[test]
    fn writes_timestamped_reports_and_index() {
        let dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(dir.path().join("reports")).unwrap();
        let now = Local.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();

        let first = writer.write_at(&empty_run(), "shot_1", now).unwrap();
        assert_eq!(first.junit.file_name().unwrap(), "shot_1_2026-03-01_09-30-00.xml");
        assert!(first.summary.exists());
        assert!(first.html.exists());

        let second = writer.write_at(&empty_run(), "shot_1", now).unwrap();
        assert_eq!(second.html.file_name().unwrap(), "shot_1_2026-03-01_09-30-00_1.html");

        let index = fs::read_to_string(&second.index).unwrap();
        assert!(index.contains("shot_1_2026-03-01_09-30-00.html"));
        assert!(index.contains("shot_1_2026-03-01_09-30-00_1.html"));
        assert!(!index.contains(">index.html<"));
    }

    #[test]
    fn stem_from_uri() {
        assert_eq!(report_stem("/data/shot_134173/"), "shot_134173");
        assert_eq!(report_stem("file:///data/run%201"), "run_201");
        assert_eq!(report_stem("json://scratch/demo.v2"), "demo_v2");
        assert_eq!(report_stem("/"), "report");
    }
}
