use rusqlite::{params, Connection, OptionalExtension};

use crate::model::repository::{ProbedItem, FOLDER_CONTENT_TYPE};
use crate::model::response::file_responses::FileMeta;

/// one row caught by the orphan sweep. `imported` is false for placeholder
/// rows that never made it through an import.
pub struct StaleRow {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub imported: bool,
}

pub fn find_root(con: &Connection) -> Result<Option<i64>, rusqlite::Error> {
    let mut pst = con
        .prepare(include_str!("../assets/queries/files/find_root.sql"))
        .unwrap();
    pst.query_row([], |row| row.get(0)).optional()
}

pub fn insert_root(con: &Connection) -> Result<i64, rusqlite::Error> {
    let mut pst = con
        .prepare(include_str!("../assets/queries/files/insert_root.sql"))
        .unwrap();
    pst.insert([])
}

pub fn find_child_by_name(
    con: &Connection,
    parent_id: i64,
    name: &str,
) -> Result<Option<i64>, rusqlite::Error> {
    let mut pst = con
        .prepare(include_str!(
            "../assets/queries/files/find_child_by_name.sql"
        ))
        .unwrap();
    pst.query_row(params![parent_id, name], |row| row.get(0))
        .optional()
}

/// reserves `(parent_id, name)` and returns the new row id. The row carries
/// no metadata until an import fills it in.
pub fn insert_placeholder(
    con: &Connection,
    parent_id: i64,
    name: &str,
) -> Result<i64, rusqlite::Error> {
    let mut pst = con
        .prepare(include_str!(
            "../assets/queries/files/insert_placeholder.sql"
        ))
        .unwrap();
    pst.insert(params![parent_id, name])
}

/// deletes the row; children go with it through the cascade
pub fn delete_by_id(con: &Connection, id: i64) -> Result<usize, rusqlite::Error> {
    let mut pst = con
        .prepare(include_str!("../assets/queries/files/delete_by_id.sql"))
        .unwrap();
    pst.execute([id])
}

pub fn parent_of(con: &Connection, id: i64) -> Result<Option<Option<i64>>, rusqlite::Error> {
    let mut pst = con
        .prepare(include_str!("../assets/queries/files/select_parent_id.sql"))
        .unwrap();
    pst.query_row([id], |row| row.get(0)).optional()
}

pub fn name_and_parent(
    con: &Connection,
    id: i64,
) -> Result<Option<(String, Option<i64>)>, rusqlite::Error> {
    let mut pst = con
        .prepare(include_str!(
            "../assets/queries/files/select_name_and_parent.sql"
        ))
        .unwrap();
    pst.query_row([id], |row| Ok((row.get(0)?, row.get(1)?)))
        .optional()
}

/// fills the data columns of an existing row from a probe and stamps it with
/// the scan epoch. Returns the number of rows touched.
pub fn refresh_item(
    con: &Connection,
    id: i64,
    scan_time: i64,
    item: &ProbedItem,
) -> Result<usize, rusqlite::Error> {
    let mut pst = con
        .prepare(include_str!("../assets/queries/files/refresh_item.sql"))
        .unwrap();
    pst.execute(params![
        scan_time, item.size, item.mdate, item.cdate, item.ctype, id
    ])
}

/// inserts a fully-populated row discovered by a scan and returns its id
pub fn insert_scanned(
    con: &Connection,
    parent_id: i64,
    scan_time: i64,
    item: &ProbedItem,
) -> Result<i64, rusqlite::Error> {
    let mut pst = con
        .prepare(include_str!("../assets/queries/files/insert_scanned.sql"))
        .unwrap();
    pst.insert(params![
        parent_id, scan_time, item.size, item.mdate, item.cdate, item.name, item.ctype
    ])
}

/// reads the wire metadata for one item. Directory sizes are projected as the
/// immediate-child count at read time. Placeholder rows report `None`.
pub fn select_metadata(con: &Connection, id: i64) -> Result<Option<FileMeta>, rusqlite::Error> {
    let mut pst = con
        .prepare(include_str!("../assets/queries/files/select_metadata.sql"))
        .unwrap();
    let row = pst
        .query_row(params![FOLDER_CONTENT_TYPE, id], |row| {
            let ctype: Option<String> = row.get(5)?;
            let ctype = match ctype {
                Some(ctype) => ctype,
                // a placeholder awaiting import has no metadata to expose
                None => return Ok(None),
            };
            Ok(Some(FileMeta {
                id: row.get(0)?,
                size: row.get::<_, Option<i64>>(1)?.unwrap_or_default(),
                mdate: row.get::<_, Option<i64>>(2)?.unwrap_or_default(),
                cdate: row.get::<_, Option<i64>>(3)?.unwrap_or_default(),
                name: row.get(4)?,
                ctype,
            }))
        })
        .optional()?;
    Ok(row.flatten())
}

/// collects every row under `subtree_root` (itself excluded) whose scan stamp
/// predates `scan_time`, placeholders included
pub fn select_stale_subtree(
    con: &Connection,
    subtree_root: i64,
    scan_time: i64,
) -> Result<Vec<StaleRow>, rusqlite::Error> {
    let mut pst = con
        .prepare(include_str!(
            "../assets/queries/files/select_stale_subtree.sql"
        ))
        .unwrap();
    let rows = pst.query_map(params![subtree_root, scan_time], |row| {
        let ctype: Option<String> = row.get(2)?;
        Ok(StaleRow {
            id: row.get(0)?,
            parent_id: row.get(1)?,
            imported: ctype.is_some(),
        })
    })?;
    rows.collect()
}
