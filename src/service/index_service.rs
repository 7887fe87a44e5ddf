use std::path::{Path, PathBuf};

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{Connection, ErrorCode};

use crate::model::error::index_errors::{
    GetItemError, ImportItemError, PlaceholderError, RemoveItemError,
};
use crate::model::error::probe_errors::ProbeError;
use crate::model::repository::ChangeAction;
use crate::model::response::file_responses::{ChangeList, FileMeta};
use crate::repository::{
    changelog_repository, create_tables, file_repository, is_index_db_file, open_connection,
};
use crate::service::file_probe;

/// how many change-log rows a single poll returns when the client does not
/// ask for a specific window size
pub const DEFAULT_CHANGE_COUNT: i64 = 10;

/// how many candidate names are tried before a placeholder is given up on
const MAX_NAME_ATTEMPTS: u32 = 100;

static ITEM_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new("^[^/]+$").unwrap());

/// an acceptable name for an uploaded item: one non-empty path segment that
/// cannot collide with the index database
pub fn valid_item_name(name: &str) -> bool {
    ITEM_NAME_PATTERN.is_match(name) && name != "." && name != ".." && !is_index_db_file(name)
}

/// the persistent index over the served directory tree. All row and
/// change-log mutations go through here; connections are opened per
/// operation so handlers can share one instance across threads.
pub struct FileIndex {
    pub(crate) db_path: PathBuf,
    pub(crate) root_id: i64,
    pub(crate) start_time: i64,
}

impl FileIndex {
    /// connects to the database file, creating the schema and the synthetic
    /// root row on first use. The scan epoch is captured once per process.
    pub fn open(db_path: &Path) -> Result<FileIndex, rusqlite::Error> {
        let con = open_connection(db_path)?;
        create_tables(&con)?;
        let root_id = match file_repository::find_root(&con)? {
            Some(id) => id,
            None => file_repository::insert_root(&con)?,
        };
        Ok(FileIndex {
            db_path: db_path.to_path_buf(),
            root_id,
            start_time: Utc::now().timestamp(),
        })
    }

    pub fn connect(&self) -> Result<Connection, rusqlite::Error> {
        open_connection(&self.db_path)
    }

    /// id of the synthetic root row, the ancestor of every indexed item
    pub fn root_id(&self) -> i64 {
        self.root_id
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    /// walks the parent chain and returns the absolute filesystem path
    pub fn get_path_for_id(&self, id: i64) -> Result<PathBuf, GetItemError> {
        let con = self.connect().map_err(log_db_error)?;
        let mut parts: Vec<String> = Vec::new();
        let mut current = id;
        while current != self.root_id {
            match file_repository::name_and_parent(&con, current) {
                Ok(Some((name, Some(parent)))) => {
                    parts.push(name);
                    current = parent;
                }
                // a parentless row that is not the root is not reachable
                Ok(Some((_, None))) | Ok(None) => return Err(GetItemError::NotFound),
                Err(e) => {
                    log::error!("failed to resolve path for item {}: {}", id, e);
                    return Err(GetItemError::DbFailure);
                }
            }
        }
        let mut path = PathBuf::from("/");
        for part in parts.iter().rev() {
            path.push(part);
        }
        Ok(path)
    }

    /// descends from the root one `(parent_id, name)` lookup per component
    pub fn get_id_for_path(&self, path: &Path) -> Result<i64, GetItemError> {
        if !path.is_absolute() {
            return Err(GetItemError::NotFound);
        }
        let con = self.connect().map_err(log_db_error)?;
        let mut id = self.root_id;
        for component in path.components() {
            let name = match component {
                std::path::Component::Normal(name) => name.to_string_lossy(),
                _ => continue,
            };
            match file_repository::find_child_by_name(&con, id, &name) {
                Ok(Some(child)) => id = child,
                Ok(None) => return Err(GetItemError::NotFound),
                Err(e) => {
                    log::error!("failed to resolve id for '{}': {}", path.display(), e);
                    return Err(GetItemError::DbFailure);
                }
            }
        }
        Ok(id)
    }

    /// reserves a row under `(parent_id, name)` and returns its id. On a name
    /// collision the insert is retried with `{stem}-{k}.{ext}` for k=1..99.
    /// No change-log entry is written, so other clients cannot see the item
    /// until an import completes.
    pub fn create_item_placeholder(
        &self,
        parent_id: i64,
        name: &str,
    ) -> Result<i64, PlaceholderError> {
        let con = self.connect().map_err(|e| {
            log::error!("failed to open the index: {}", e);
            PlaceholderError::DbFailure
        })?;
        for suffix in 0..MAX_NAME_ATTEMPTS {
            let candidate = if suffix == 0 {
                name.to_string()
            } else {
                numbered_name(name, suffix)
            };
            match file_repository::insert_placeholder(&con, parent_id, &candidate) {
                Ok(id) => return Ok(id),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    continue;
                }
                Err(e) => {
                    log::error!("failed to reserve '{}': {}", candidate, e);
                    return Err(PlaceholderError::DbFailure);
                }
            }
        }
        Err(PlaceholderError::NamesExhausted)
    }

    /// unconditionally drops a row without touching the change log. Only for
    /// rolling back a placeholder whose import never happened; anything that
    /// was imported must go through `remove_item` instead.
    pub fn delete_item_placeholder(&self, id: i64) {
        let result = self
            .connect()
            .and_then(|con| file_repository::delete_by_id(&con, id));
        if let Err(e) = result {
            log::error!("failed to roll back placeholder {}: {}", id, e);
        }
    }

    /// fills a placeholder row from the on-disk object and publishes the item
    /// with an ADD entry, atomically
    pub fn import_item(&self, id: i64, path: &Path) -> Result<(), ImportItemError> {
        let item = file_probe::probe(path).map_err(|e| match e {
            ProbeError::NotFound => ImportItemError::NotFound,
            ProbeError::Skipped => ImportItemError::NotIndexable,
        })?;
        let mut con = self.connect().map_err(|e| {
            log::error!("failed to open the index: {}", e);
            ImportItemError::DbFailure
        })?;
        let import = |tx: &Connection| -> Result<(), ImportItemError> {
            let touched = file_repository::refresh_item(tx, id, self.start_time, &item)
                .map_err(|e| import_db_error(id, e))?;
            if touched == 0 {
                return Err(ImportItemError::NotFound);
            }
            let parent = file_repository::parent_of(tx, id)
                .map_err(|e| import_db_error(id, e))?
                .flatten()
                .ok_or(ImportItemError::NotFound)?;
            changelog_repository::record_change(tx, parent, id, ChangeAction::Add)
                .map_err(|e| import_db_error(id, e))?;
            Ok(())
        };
        let tx = con.transaction().map_err(|e| import_db_error(id, e))?;
        import(&tx)?;
        tx.commit().map_err(|e| import_db_error(id, e))?;
        Ok(())
    }

    /// deletes the row (descendants cascade) and records an ERASE entry,
    /// atomically. The on-disk object is the caller's business.
    pub fn remove_item(&self, id: i64) -> Result<(), RemoveItemError> {
        let mut con = self.connect().map_err(|e| {
            log::error!("failed to open the index: {}", e);
            RemoveItemError::DbFailure
        })?;
        let tx = con.transaction().map_err(|e| remove_db_error(id, e))?;
        let parent = match file_repository::parent_of(&tx, id).map_err(|e| remove_db_error(id, e))? {
            Some(Some(parent)) => parent,
            // missing row, or the synthetic root, which must never go away
            Some(None) | None => return Err(RemoveItemError::NotFound),
        };
        file_repository::delete_by_id(&tx, id).map_err(|e| remove_db_error(id, e))?;
        changelog_repository::record_change(&tx, parent, id, ChangeAction::Erase)
            .map_err(|e| remove_db_error(id, e))?;
        tx.commit().map_err(|e| remove_db_error(id, e))?;
        Ok(())
    }

    /// wire metadata for one item, or `None` when the id is unknown or the
    /// row is a placeholder that has not been imported yet
    pub fn get_metadata_for_item(&self, id: i64) -> Option<FileMeta> {
        let con = match self.connect() {
            Ok(con) => con,
            Err(e) => {
                log::error!("failed to open the index: {}", e);
                return None;
            }
        };
        match file_repository::select_metadata(&con, id) {
            Ok(meta) => meta,
            Err(e) => {
                log::error!("failed to read metadata for item {}: {}", id, e);
                None
            }
        }
    }

    /// one bounded window of changes under `parent_id` past `anchor`. The
    /// returned anchor is a high-watermark the client passes back verbatim;
    /// `remain` is how many change rows are still waiting past it.
    pub fn get_changes_in_directory_since(
        &self,
        parent_id: i64,
        anchor: i64,
        count: i64,
    ) -> Result<ChangeList, GetItemError> {
        let count = if count <= 0 { DEFAULT_CHANGE_COUNT } else { count };
        let con = self.connect().map_err(log_db_error)?;
        let rows = changelog_repository::changes_since(&con, parent_id, anchor, count)
            .map_err(log_db_error)?;
        let mut list = ChangeList {
            new: Vec::new(),
            erase: Vec::new(),
            anchor,
            remain: 0,
        };
        for row in rows {
            list.anchor = row.change_id;
            match row.action {
                Some(ChangeAction::Add) => match (row.name, row.ctype) {
                    (Some(name), Some(ctype)) => list.new.push(FileMeta {
                        id: row.file_id,
                        size: row.size.unwrap_or_default(),
                        mdate: row.mdate.unwrap_or_default(),
                        cdate: row.cdate.unwrap_or_default(),
                        name,
                        ctype,
                    }),
                    _ => log::warn!(
                        "change {} advertises an item that no longer exists; skipping",
                        row.change_id
                    ),
                },
                Some(ChangeAction::Erase) => list.erase.push(row.file_id),
                _ => continue,
            }
        }
        list.remain = changelog_repository::count_remaining(&con, parent_id, list.anchor)
            .map_err(log_db_error)?;
        Ok(list)
    }
}

fn log_db_error(e: rusqlite::Error) -> GetItemError {
    log::error!("index operation failed: {}", e);
    GetItemError::DbFailure
}

fn import_db_error(id: i64, e: rusqlite::Error) -> ImportItemError {
    log::error!("failed to import item {}: {}", id, e);
    ImportItemError::DbFailure
}

fn remove_db_error(id: i64, e: rusqlite::Error) -> RemoveItemError {
    log::error!("failed to remove item {}: {}", id, e);
    RemoveItemError::DbFailure
}

/// k-th fallback name for a taken `(parent, name)` pair. Names without an
/// extension get a plain `-k` suffix rather than a trailing dot.
fn numbered_name(name: &str, k: u32) -> String {
    let path = Path::new(name);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(extension)) => format!(
            "{}-{}.{}",
            stem.to_string_lossy(),
            k,
            extension.to_string_lossy()
        ),
        _ => format!("{}-{}", name, k),
    }
}


#[cfg(test)]
mod index_tests {
    use super::*;
    use crate::test::{cleanup, create_file_disk, refresh_test_dir, test_index};

    #[test]
    fn placeholder_collisions_pick_numbered_names() {
        let dir = refresh_test_dir();
        let index = test_index(&dir);
        let first = index.create_item_placeholder(index.root_id(), "a.txt").unwrap();
        let second = index.create_item_placeholder(index.root_id(), "a.txt").unwrap();
        assert_ne!(first, second);
        let path = index.get_path_for_id(second).unwrap();
        assert_eq!("a-1.txt", path.file_name().unwrap().to_string_lossy());
        cleanup();
    }

    #[test]
    fn placeholder_names_run_out_after_one_hundred() {
        let dir = refresh_test_dir();
        let index = test_index(&dir);
        for _ in 0..100 {
            index.create_item_placeholder(index.root_id(), "x.bin").unwrap();
        }
        assert_eq!(
            Err(PlaceholderError::NamesExhausted),
            index.create_item_placeholder(index.root_id(), "x.bin")
        );
        cleanup();
    }

    #[test]
    fn import_publishes_metadata_and_an_add_entry() {
        let dir = refresh_test_dir();
        let index = test_index(&dir);
        let id = index.create_item_placeholder(index.root_id(), "a.txt").unwrap();
        create_file_disk(&dir, "a.txt", "hello");
        index.import_item(id, &dir.join("a.txt")).unwrap();

        let meta = index.get_metadata_for_item(id).unwrap();
        assert_eq!("a.txt", meta.name);
        assert_eq!(5, meta.size);
        assert!(meta.ctype.starts_with("text/plain"));

        let changes = index
            .get_changes_in_directory_since(index.root_id(), 0, 10)
            .unwrap();
        assert_eq!(vec![meta], changes.new);
        assert!(changes.erase.is_empty());
        assert!(changes.anchor > 0);
        assert_eq!(0, changes.remain);
        cleanup();
    }

    #[test]
    fn remove_erases_the_item_and_its_metadata() {
        let dir = refresh_test_dir();
        let index = test_index(&dir);
        let id = index.create_item_placeholder(index.root_id(), "a.txt").unwrap();
        create_file_disk(&dir, "a.txt", "hello");
        index.import_item(id, &dir.join("a.txt")).unwrap();

        index.remove_item(id).unwrap();
        assert_eq!(None, index.get_metadata_for_item(id));
        let changes = index
            .get_changes_in_directory_since(index.root_id(), 0, 10)
            .unwrap();
        assert_eq!(vec![id], changes.erase);
        assert!(changes.new.is_empty());
        cleanup();
    }

    #[test]
    fn add_then_remove_between_polls_collapses_to_one_erase() {
        let dir = refresh_test_dir();
        let index = test_index(&dir);
        let id = index.create_item_placeholder(index.root_id(), "a.txt").unwrap();
        create_file_disk(&dir, "a.txt", "hello");
        index.import_item(id, &dir.join("a.txt")).unwrap();
        index.remove_item(id).unwrap();

        let changes = index
            .get_changes_in_directory_since(index.root_id(), 0, 10)
            .unwrap();
        assert!(changes.new.is_empty());
        assert_eq!(vec![id], changes.erase);
        cleanup();
    }

    #[test]
    fn rolled_back_placeholder_leaves_no_trace() {
        let dir = refresh_test_dir();
        let index = test_index(&dir);
        let id = index.create_item_placeholder(index.root_id(), "a.txt").unwrap();
        index.delete_item_placeholder(id);

        assert_eq!(None, index.get_metadata_for_item(id));
        assert_eq!(Err(GetItemError::NotFound), index.get_path_for_id(id));
        let changes = index
            .get_changes_in_directory_since(index.root_id(), 0, 10)
            .unwrap();
        assert!(changes.new.is_empty());
        assert!(changes.erase.is_empty());

        // the name is free again, with no numbering
        let again = index.create_item_placeholder(index.root_id(), "a.txt").unwrap();
        let path = index.get_path_for_id(again).unwrap();
        assert_eq!("a.txt", path.file_name().unwrap().to_string_lossy());
        cleanup();
    }

    #[test]
    fn paths_and_ids_round_trip() {
        let dir = refresh_test_dir();
        let index = test_index(&dir);
        let id = index.create_item_placeholder(index.root_id(), "a.txt").unwrap();
        let path = index.get_path_for_id(id).unwrap();
        assert_eq!(id, index.get_id_for_path(&path).unwrap());
        cleanup();
    }

    #[test]
    fn change_windows_never_step_backwards() {
        let dir = refresh_test_dir();
        let index = test_index(&dir);
        for name in ["a.txt", "b.txt", "c.txt"] {
            let id = index.create_item_placeholder(index.root_id(), name).unwrap();
            create_file_disk(&dir, name, "x");
            index.import_item(id, &dir.join(name)).unwrap();
        }

        let first = index
            .get_changes_in_directory_since(index.root_id(), 0, 2)
            .unwrap();
        assert_eq!(2, first.new.len());
        assert_eq!(1, first.remain);

        let second = index
            .get_changes_in_directory_since(index.root_id(), first.anchor, 2)
            .unwrap();
        assert_eq!(1, second.new.len());
        assert_eq!(0, second.remain);
        assert!(second.anchor > first.anchor);
        cleanup();
    }

    #[test]
    fn removing_the_synthetic_root_is_refused() {
        let dir = refresh_test_dir();
        let index = test_index(&dir);
        assert_eq!(
            Err(RemoveItemError::NotFound),
            index.remove_item(index.root_id())
        );
        cleanup();
    }
}
