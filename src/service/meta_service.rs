use std::fs;
use std::path::Path;

use crate::model::error::probe_errors::ProbeError;
use crate::model::repository::ProbedItem;
use crate::model::response::meta_responses::{DirListing, EntryMeta};
use crate::repository::is_index_db_file;
use crate::service::file_probe;

pub const DEFAULT_LIST_OFFSET: usize = 0;
pub const DEFAULT_LIST_COUNT: usize = 10;

#[derive(Debug, PartialEq)]
pub enum ListDirError {
    NotFound,
    /// enumeration only makes sense for directories
    NotADirectory,
    /// the offset points past the end of the listing
    OutOfRange,
    Unreadable,
}

/// metadata for a single filesystem entry, straight off the disk
pub fn describe_entry(path: &Path) -> Result<EntryMeta, ProbeError> {
    file_probe::probe(path).map(EntryMeta::from)
}

/// one page of a directory listing: directories first, then files, each
/// group in case-insensitive name order. Entries that cannot be probed are
/// left out.
pub fn list_directory(dir: &Path, offset: usize, count: usize) -> Result<DirListing, ListDirError> {
    let meta = fs::metadata(dir).map_err(|_| ListDirError::NotFound)?;
    if !meta.is_dir() {
        return Err(ListDirError::NotADirectory);
    }
    let entries = fs::read_dir(dir).map_err(|e| {
        log::warn!("failed to read '{}': {}", dir.display(), e);
        ListDirError::Unreadable
    })?;
    let mut items: Vec<ProbedItem> = entries
        .flatten()
        .filter(|entry| !is_index_db_file(&entry.file_name().to_string_lossy()))
        .filter_map(|entry| file_probe::probe(&entry.path()).ok())
        .collect();
    if offset > items.len() {
        return Err(ListDirError::OutOfRange);
    }
    items.sort_by(|a, b| {
        b.is_dir
            .cmp(&a.is_dir)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    let files = items
        .into_iter()
        .skip(offset)
        .take(count)
        .map(EntryMeta::from)
        .collect();
    Ok(DirListing { offset, files })
}
