//! Folder document loader.
//!
//! Walks a folder recursively (sorted by file name, so runs are
//! deterministic), dispatches each file on its extension and turns it into
//! a [`Document`]. Files with unsupported extensions are skipped; files that
//! cannot be read or parsed become [`IngestionError`]s without stopping the
//! walk.
//!
//! | Extension | Handling |
//! |-----------|----------|
//! | `.txt`, `.md`, `.markdown` | UTF-8 text as-is |
//! | `.csv` | rows rendered as `header: value` lines |
//! | `.html`, `.htm` | markup stripped, `<title>` used as title |
//! | `.pdf` | `pdf-extract` |
//! | `.docx`, `.pptx` | OOXML text runs |

use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ragbot_core::error::IngestionError;
use ragbot_core::models::{Document, DocumentFormat};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::DocumentsConfig;
use crate::extract;
use crate::html;

/// Everything one pass over a folder produced.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub failures: Vec<IngestionError>,
    /// Files ignored because of their extension.
    pub skipped: Vec<PathBuf>,
}

pub struct FolderLoader {
    root: PathBuf,
    include: Option<GlobSet>,
    exclude: GlobSet,
    follow_symlinks: bool,
    max_file_bytes: u64,
}

impl FolderLoader {
    /// Loader with default settings: every supported extension, VCS and
    /// build directories excluded.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        Self::from_config(&DocumentsConfig {
            folder: root.into(),
            ..DocumentsConfig::default()
        })
    }

    pub fn from_config(config: &DocumentsConfig) -> Result<Self> {
        let include = if config.include_globs.is_empty() {
            None
        } else {
            Some(build_globset(&config.include_globs)?)
        };

        let mut excludes = vec![
            "**/.git/**".to_string(),
            "**/target/**".to_string(),
            "**/node_modules/**".to_string(),
        ];
        excludes.extend(config.exclude_globs.iter().cloned());

        Ok(Self {
            root: config.folder.clone(),
            include,
            exclude: build_globset(&excludes)?,
            follow_symlinks: config.follow_symlinks,
            max_file_bytes: config.max_file_bytes,
        })
    }

    /// Whether the folder holds at least one file the loader would try.
    pub fn has_candidates(&self) -> bool {
        self.iter().next().is_some()
    }

    /// Lazily load documents. An absent folder yields nothing.
    pub fn iter(&self) -> DocumentIter<'_> {
        let walker = WalkDir::new(&self.root)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name()
            .into_iter();
        DocumentIter {
            loader: self,
            walker,
            skipped: Vec::new(),
        }
    }

    /// Load the whole folder into a [`LoadReport`].
    pub fn load(&self) -> LoadReport {
        let mut iter = self.iter();
        let mut report = LoadReport::default();
        for item in iter.by_ref() {
            match item {
                Ok(doc) => report.documents.push(doc),
                Err(e) => report.failures.push(e),
            }
        }
        report.skipped = iter.skipped;
        report
    }

    fn is_selected(&self, relative: &str) -> bool {
        if self.exclude.is_match(relative) {
            return false;
        }
        self.include
            .as_ref()
            .map_or(true, |set| set.is_match(relative))
    }

    fn load_path(&self, path: &Path, format: DocumentFormat) -> Result<Document, IngestionError> {
        let source_id = path.display().to_string();
        let size = std::fs::metadata(path)
            .map_err(|e| IngestionError::new(&source_id, e))?
            .len();
        if size > self.max_file_bytes {
            return Err(IngestionError::new(
                &source_id,
                format!("file is {} bytes, limit is {}", size, self.max_file_bytes),
            ));
        }
        load_file_as(path, format)
    }
}

/// Iterator returned by [`FolderLoader::iter`].
pub struct DocumentIter<'a> {
    loader: &'a FolderLoader,
    walker: walkdir::IntoIter,
    skipped: Vec<PathBuf>,
}

impl DocumentIter<'_> {
    /// Files skipped so far because of their extension.
    pub fn skipped(&self) -> &[PathBuf] {
        &self.skipped
    }
}

impl Iterator for DocumentIter<'_> {
    type Item = Result<Document, IngestionError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    // An absent root is an empty folder, not a failure.
                    if e.depth() == 0 && e.io_error().map(|io| io.kind()) == Some(std::io::ErrorKind::NotFound) {
                        return None;
                    }
                    let source = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| self.loader.root.display().to_string());
                    return Some(Err(IngestionError::new(source, e)));
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path
                .strip_prefix(&self.loader.root)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string();
            if !self.loader.is_selected(&relative) {
                continue;
            }

            let format = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(DocumentFormat::from_extension);
            let Some(format) = format else {
                debug!(path = %path.display(), "skipping unsupported file");
                self.skipped.push(path.to_path_buf());
                continue;
            };

            return Some(self.loader.load_path(path, format));
        }
    }
}

/// Load every supported file under `root` with default settings.
pub fn load_folder(root: impl Into<PathBuf>) -> Result<LoadReport> {
    Ok(FolderLoader::new(root)?.load())
}

/// Load one file, dispatching on its extension.
pub fn load_file(path: &Path) -> Result<Document, IngestionError> {
    let source_id = path.display().to_string();
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let format = DocumentFormat::from_extension(ext).ok_or_else(|| {
        IngestionError::new(&source_id, format!("unsupported file type '.{}'", ext))
    })?;
    load_file_as(path, format)
}

fn load_file_as(path: &Path, format: DocumentFormat) -> Result<Document, IngestionError> {
    let source_id = path.display().to_string();
    let fail = |reason: String| IngestionError::new(&source_id, reason);

    let bytes = std::fs::read(path).map_err(|e| fail(format!("read failed: {}", e)))?;
    let file_title = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| source_id.clone());

    let (title, text) = match format {
        DocumentFormat::Text | DocumentFormat::Markdown => (file_title, utf8(&bytes).map_err(fail)?),
        DocumentFormat::Csv => {
            let raw = utf8(&bytes).map_err(fail)?;
            (file_title, extract::extract_csv(&raw).map_err(|e| fail(e.to_string()))?)
        }
        DocumentFormat::Html => {
            let raw = utf8(&bytes).map_err(fail)?;
            let title = html::extract_title(&raw).unwrap_or(file_title);
            (title, html::strip_tags(&raw))
        }
        DocumentFormat::Pdf => (file_title, extract::extract_pdf(&bytes).map_err(|e| fail(e.to_string()))?),
        DocumentFormat::Docx => (file_title, extract::extract_docx(&bytes).map_err(|e| fail(e.to_string()))?),
        DocumentFormat::Pptx => (file_title, extract::extract_pptx(&bytes).map_err(|e| fail(e.to_string()))?),
        DocumentFormat::Web => return Err(fail("web documents are not loaded from files".to_string())),
    };

    if text.trim().is_empty() {
        return Err(fail("no extractable text".to_string()));
    }

    Ok(Document::new(source_id, title, format, text))
}

fn utf8(bytes: &[u8]) -> Result<String, String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8(bytes.to_vec()).map_err(|e| format!("not valid UTF-8: {}", e))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
