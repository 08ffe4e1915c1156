//! Page file discovery.

use std::path::{Path, PathBuf};

use folio_routes::{file_role, FileRole};
use walkdir::WalkDir;

use crate::error::PageError;

/// File extensions treated as pages.
pub const PAGE_EXTENSIONS: &[&str] = &["md", "markdown"];

/// A page, layout or not-found file under the pages root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub role: FileRole,
}

/// Whether `path` looks like a page source. Hidden files are skipped.
pub fn is_page_source(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'));
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    !hidden && PAGE_EXTENSIONS.contains(&ext)
}

/// Find every page source below `root`, sorted by path.
pub fn discover(root: &Path) -> Result<Vec<SourceFile>, PageError> {
    if !root.is_dir() {
        return Err(PageError::MissingRoot(root.display().to_string()));
    }

    let mut files: Vec<SourceFile> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!("Skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && is_page_source(e.path()))
        .map(|e| SourceFile {
            role: file_role(e.path()),
            path: e.into_path(),
        })
        .collect();

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}
