//! Raw page files on disk: `page_<n>.html`, body stored verbatim.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const PAGE_PREFIX: &str = "page_";
pub const PAGE_EXT: &str = "html";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("folder {0:?} does not exist")]
    MissingDir(PathBuf),
    #[error("{0:?} is not a folder")]
    NotADir(PathBuf),
    #[error("{path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A saved page read back for extraction.
pub struct SavedPage {
    /// File name, used to identify the page in logs.
    pub id: String,
    pub body: String,
}

pub fn page_file_name(counter: usize) -> String {
    format!("{}{}.{}", PAGE_PREFIX, counter, PAGE_EXT)
}

/// Write one page body into `dir`, creating the folder if needed.
pub fn save_page(dir: &Path, counter: usize, body: &str) -> Result<PathBuf, StoreError> {
    fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
    let path = dir.join(page_file_name(counter));
    fs::write(&path, body).map_err(|e| StoreError::io(&path, e))?;
    Ok(path)
}

/// Fail early on a missing or non-folder input path.
pub fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
    if !dir.exists() {
        return Err(StoreError::MissingDir(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(StoreError::NotADir(dir.to_path_buf()));
    }
    Ok(())
}

/// All `page_*` files in `dir`, ordered by page counter.
pub fn list_pages(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    ensure_dir(dir)?;

    let mut pages = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))? {
        let entry = entry.map_err(|e| StoreError::io(dir, e))?;
        let path = entry.path();
        let is_page = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(PAGE_PREFIX));
        if is_page && path.is_file() {
            pages.push(path);
        }
    }

    // Numbered pages first in counter order, anything else after by name.
    pages.sort_by_key(|p| {
        let name = p.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
        (page_counter(&name).unwrap_or(usize::MAX), name)
    });
    Ok(pages)
}

pub fn read_page(path: &Path) -> Result<SavedPage, StoreError> {
    let bytes = fs::read(path).map_err(|e| StoreError::io(path, e))?;
    let id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(SavedPage {
        id,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    })
}

fn page_counter(file_name: &str) -> Option<usize> {
    let rest = file_name.strip_prefix(PAGE_PREFIX)?;
    let stem = rest.split('.').next().unwrap_or(rest);
    stem.parse().ok()
}
