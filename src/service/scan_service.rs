use std::fs;
use std::path::{Component, Path, PathBuf};

use rusqlite::Connection;

use crate::model::error::index_errors::ScanError;
use crate::model::repository::{ChangeAction, ProbedItem};
use crate::repository::{changelog_repository, file_repository, is_index_db_file};
use crate::service::file_probe;
use crate::service::index_service::FileIndex;

/// reconciles the subtree rooted at `path` with the index, in one
/// transaction, and returns the id of the deepest path component: the root
/// of the served subtree.
///
/// Rows confirmed by the walk get their `scan_time` stamped; rows under the
/// subtree the walk did not confirm are swept at the end. Running this twice
/// over an unchanged tree changes nothing but the stamps.
pub fn scan_path(index: &FileIndex, path: &Path) -> Result<i64, ScanError> {
    log::info!("scanning '{}' ...", path.display());
    if !path.is_absolute() {
        return Err(ScanError::NotAbsolute);
    }
    let components: Vec<String> = path
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if components.is_empty() {
        // refusing to treat the filesystem root as a served subtree
        return Err(ScanError::NotAbsolute);
    }

    let mut con = index.connect().map_err(log_scan_error)?;

    // find the deepest path prefix the index already knows. The last
    // component always goes through the probe below, even when present.
    let mut parent = index.root_id();
    let mut reached = 0;
    while reached + 1 < components.len() {
        match file_repository::find_child_by_name(&con, parent, &components[reached]) {
            Ok(Some(id)) => {
                parent = id;
                reached += 1;
            }
            Ok(None) => break,
            Err(e) => return Err(log_scan_error(e)),
        }
    }

    let tx = con.transaction().map_err(log_scan_error)?;

    let mut current_path = PathBuf::from("/");
    for component in &components[..reached] {
        current_path.push(component);
    }
    let mut scanned_dir = false;
    for component in &components[reached..] {
        current_path.push(component);
        let item = match file_probe::probe(&current_path) {
            Ok(item) => item,
            Err(e) => {
                log::error!("terminating scan at '{}': {:?}", current_path.display(), e);
                return Err(ScanError::Unreachable);
            }
        };
        scanned_dir = item.is_dir;
        parent = match refresh_or_insert(&tx, parent, index.start_time(), &item) {
            Ok(id) => id,
            Err(e) => return Err(log_scan_error(e)),
        };
    }

    if scanned_dir {
        walk_directory(&tx, index.start_time(), &current_path, parent);
    }

    log::info!("sweeping orphans ...");
    sweep_orphans(&tx, parent, index.start_time()).map_err(log_scan_error)?;

    tx.commit().map_err(log_scan_error)?;
    log::info!("scan of '{}' done", path.display());
    Ok(parent)
}

fn log_scan_error(e: rusqlite::Error) -> ScanError {
    log::error!("scan failed: {}", e);
    ScanError::DbFailure
}

/// stamps the row for `(parent_id, item.name)` with the scan epoch, creating
/// it (plus an ADD entry) when the walk sees the item for the first time
fn refresh_or_insert(
    con: &Connection,
    parent_id: i64,
    scan_time: i64,
    item: &ProbedItem,
) -> Result<i64, rusqlite::Error> {
    match file_repository::find_child_by_name(con, parent_id, &item.name)? {
        Some(id) => {
            file_repository::refresh_item(con, id, scan_time, item)?;
            Ok(id)
        }
        None => {
            let id = file_repository::insert_scanned(con, parent_id, scan_time, item)?;
            changelog_repository::record_change(con, parent_id, id, ChangeAction::Add)?;
            Ok(id)
        }
    }
}

/// depth-first walk over the on-disk tree. Items that cannot be probed or
/// recorded are skipped with a log line; the scan carries on.
fn walk_directory(con: &Connection, scan_time: i64, dir: &Path, parent_id: i64) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("cannot read '{}': {}", dir.display(), e);
            return;
        }
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        if is_index_db_file(&name.to_string_lossy()) {
            continue;
        }
        let child_path = entry.path();
        let item = match file_probe::probe(&child_path) {
            Ok(item) => item,
            Err(e) => {
                log::warn!("skipping '{}': {:?}", child_path.display(), e);
                continue;
            }
        };
        match refresh_or_insert(con, parent_id, scan_time, &item) {
            Ok(child_id) => {
                if item.is_dir {
                    walk_directory(con, scan_time, &child_path, child_id);
                }
            }
            Err(e) => log::warn!("failed to record '{}': {}", child_path.display(), e),
        }
    }
}

/// deletes every row under `subtree_root` the walk did not confirm, at any
/// depth, recording an ERASE for each row that had been imported. Stale
/// placeholders were never published, so they go quietly.
fn sweep_orphans(
    con: &Connection,
    subtree_root: i64,
    scan_time: i64,
) -> Result<(), rusqlite::Error> {
    let stale = file_repository::select_stale_subtree(con, subtree_root, scan_time)?;
    for row in &stale {
        if row.imported {
            if let Some(parent_id) = row.parent_id {
                changelog_repository::record_change(con, parent_id, row.id, ChangeAction::Erase)?;
            }
        }
        file_repository::delete_by_id(con, row.id)?;
    }
    if !stale.is_empty() {
        log::info!("swept {} orphaned rows", stale.len());
    }
    Ok(())
}

#[cfg(test)]
mod scan_tests {
    use super::*;
    use crate::model::repository::FOLDER_CONTENT_TYPE;
    use crate::test::{cleanup, create_dir_disk, create_file_disk, refresh_test_dir, test_index};

    /// all data rows as comparable tuples, scan stamps excluded
    fn snapshot(index: &FileIndex) -> Vec<(i64, Option<i64>, String, Option<i64>, Option<String>)> {
        let con = index.connect().unwrap();
        let mut pst = con
            .prepare("SELECT id, parent_id, name, size, ctype FROM files ORDER BY id")
            .unwrap();
        let rows = pst
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })
            .unwrap();
        rows.collect::<Result<Vec<_>, _>>().unwrap()
    }

    #[test]
    fn relative_paths_are_rejected() {
        let dir = refresh_test_dir();
        let index = test_index(&dir);
        assert_eq!(
            Err(ScanError::NotAbsolute),
            scan_path(&index, Path::new("relative/path"))
        );
        cleanup();
    }

    #[test]
    fn scan_indexes_a_tree() {
        let dir = refresh_test_dir();
        create_file_disk(&dir, "a.txt", "hello");
        let sub = create_dir_disk(&dir, "d");
        create_file_disk(&sub, "b.txt", "world!");

        let index = test_index(&dir);
        let root = scan_path(&index, &dir).unwrap();
        assert!(root > 0);

        let file_id = index.get_id_for_path(&dir.join("a.txt")).unwrap();
        let meta = index.get_metadata_for_item(file_id).unwrap();
        assert_eq!(5, meta.size);
        assert!(meta.ctype.starts_with("text/plain"));

        let dir_id = index.get_id_for_path(&sub).unwrap();
        let dir_meta = index.get_metadata_for_item(dir_id).unwrap();
        assert_eq!(FOLDER_CONTENT_TYPE, dir_meta.ctype);
        assert_eq!(1, dir_meta.size);

        let nested = index.get_id_for_path(&sub.join("b.txt")).unwrap();
        assert_eq!(6, index.get_metadata_for_item(nested).unwrap().size);
        cleanup();
    }

    #[test]
    fn scan_returns_the_same_root_every_time() {
        let dir = refresh_test_dir();
        let index = test_index(&dir);
        let first = scan_path(&index, &dir).unwrap();
        let second = scan_path(&index, &dir).unwrap();
        assert_eq!(first, second);
        cleanup();
    }

    #[test]
    fn rescanning_an_unchanged_tree_is_a_no_op() {
        let dir = refresh_test_dir();
        create_file_disk(&dir, "a.txt", "hello");
        let sub = create_dir_disk(&dir, "d");
        create_file_disk(&sub, "b.txt", "world");

        let index = test_index(&dir);
        scan_path(&index, &dir).unwrap();
        let before = snapshot(&index);
        scan_path(&index, &dir).unwrap();
        assert_eq!(before, snapshot(&index));
        cleanup();
    }

    #[test]
    fn new_items_get_add_entries() {
        let dir = refresh_test_dir();
        create_file_disk(&dir, "a.txt", "hello");
        let index = test_index(&dir);
        let root = scan_path(&index, &dir).unwrap();
        let changes = index.get_changes_in_directory_since(root, 0, 10).unwrap();
        assert_eq!(1, changes.new.len());
        assert_eq!("a.txt", changes.new[0].name);
        cleanup();
    }

    #[test]
    fn sweep_erases_items_that_left_the_disk() {
        let dir = refresh_test_dir();
        create_file_disk(&dir, "a.txt", "hello");
        let index = test_index(&dir);
        let root = scan_path(&index, &dir).unwrap();
        let seen = index.get_changes_in_directory_since(root, 0, 10).unwrap();
        let gone_id = seen.new[0].id;

        std::fs::remove_file(dir.join("a.txt")).unwrap();
        let mut later = test_index(&dir);
        later.start_time = index.start_time() + 10;
        let root = scan_path(&later, &dir).unwrap();

        assert_eq!(None, later.get_metadata_for_item(gone_id));
        let changes = later
            .get_changes_in_directory_since(root, seen.anchor, 10)
            .unwrap();
        assert_eq!(vec![gone_id], changes.erase);
        cleanup();
    }

    #[test]
    fn sweep_reaches_any_depth() {
        let dir = refresh_test_dir();
        let sub = create_dir_disk(&dir, "outer");
        let inner = create_dir_disk(&sub, "inner");
        create_file_disk(&inner, "deep.txt", "x");

        let index = test_index(&dir);
        scan_path(&index, &dir).unwrap();
        let inner_id = index.get_id_for_path(&inner).unwrap();
        let deep_id = index.get_id_for_path(&inner.join("deep.txt")).unwrap();

        std::fs::remove_dir_all(&inner).unwrap();
        let mut later = test_index(&dir);
        later.start_time = index.start_time() + 10;
        scan_path(&later, &dir).unwrap();

        assert_eq!(None, later.get_metadata_for_item(inner_id));
        assert_eq!(None, later.get_metadata_for_item(deep_id));
        let outer_id = later.get_id_for_path(&sub).unwrap();
        let changes = later
            .get_changes_in_directory_since(outer_id, 0, 10)
            .unwrap();
        assert!(changes.erase.contains(&inner_id));
        cleanup();
    }

    #[test]
    fn the_index_database_is_not_indexed() {
        let dir = refresh_test_dir();
        create_file_disk(&dir, "a.txt", "hello");
        let index = test_index(&dir);
        scan_path(&index, &dir).unwrap();
        assert!(index.get_id_for_path(&dir.join(".meta.db")).is_err());
        cleanup();
    }

    #[test]
    fn scan_extends_through_unknown_path_components() {
        let dir = refresh_test_dir();
        let sub = create_dir_disk(&dir, "a");
        let deeper = create_dir_disk(&sub, "b");
        create_file_disk(&deeper, "c.txt", "deep");

        let index = test_index(&dir);
        let subtree = scan_path(&index, &deeper).unwrap();
        assert_eq!(subtree, index.get_id_for_path(&deeper).unwrap());
        assert!(index.get_id_for_path(&deeper.join("c.txt")).is_ok());
        cleanup();
    }
}
