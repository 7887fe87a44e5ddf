use rusqlite::{params, Connection};

use crate::model::repository::{ChangeAction, FOLDER_CONTENT_TYPE};

/// one changelog row joined against the current `files` table. The file
/// columns are `None` when the row no longer exists (erases).
pub struct ChangeRow {
    pub change_id: i64,
    pub file_id: i64,
    pub action: Option<ChangeAction>,
    pub name: Option<String>,
    pub ctype: Option<String>,
    pub mdate: Option<i64>,
    pub cdate: Option<i64>,
    pub size: Option<i64>,
}

/// records a change for `(parent_id, file_id)`. The unique constraint keeps
/// only the latest change per pair, so history stays bounded by the number
/// of live edges.
pub fn record_change(
    con: &Connection,
    parent_id: i64,
    file_id: i64,
    action: ChangeAction,
) -> Result<(), rusqlite::Error> {
    let mut pst = con
        .prepare(include_str!(
            "../assets/queries/changelog/insert_change.sql"
        ))
        .unwrap();
    pst.execute(params![parent_id, file_id, action as i64])?;
    Ok(())
}

/// reads one window of changes under a directory, oldest first
pub fn changes_since(
    con: &Connection,
    parent_id: i64,
    anchor: i64,
    count: i64,
) -> Result<Vec<ChangeRow>, rusqlite::Error> {
    let mut pst = con
        .prepare(include_str!(
            "../assets/queries/changelog/select_changes_since.sql"
        ))
        .unwrap();
    let rows = pst.query_map(
        params![FOLDER_CONTENT_TYPE, parent_id, anchor, count],
        |row| {
            Ok(ChangeRow {
                change_id: row.get(0)?,
                file_id: row.get(1)?,
                action: ChangeAction::from_i64(row.get(2)?),
                name: row.get(3)?,
                ctype: row.get(4)?,
                mdate: row.get(5)?,
                cdate: row.get(6)?,
                size: row.get(7)?,
            })
        },
    )?;
    rows.collect()
}

/// number of changelog rows under `parent_id` past the given anchor
pub fn count_remaining(
    con: &Connection,
    parent_id: i64,
    anchor: i64,
) -> Result<i64, rusqlite::Error> {
    let mut pst = con
        .prepare(include_str!(
            "../assets/queries/changelog/count_remaining.sql"
        ))
        .unwrap();
    pst.query_row(params![parent_id, anchor], |row| row.get(0))
}
