use std::path::Path;

use rusqlite::Connection;

pub mod changelog_repository;
pub mod file_repository;

/// name of the index database inside the base directory. The walk in
/// `scan_service` refuses to index this file or its SQLite side files.
pub static META_DB_NAME: &str = ".meta.db";

/// true for the index database itself and its `-wal`/`-shm` companions
pub fn is_index_db_file(name: &str) -> bool {
    name.starts_with(META_DB_NAME)
}

/// opens a connection to the index database with foreign keys enforced
pub fn open_connection(db_path: &Path) -> Result<Connection, rusqlite::Error> {
    let con = Connection::open(db_path)?;
    con.pragma_update(None, "foreign_keys", "ON")?;
    Ok(con)
}

/// creates the `files` and `changelog` tables if they are missing
pub fn create_tables(con: &Connection) -> Result<(), rusqlite::Error> {
    con.execute_batch(include_str!("../assets/init.sql"))
}

#[cfg(test)]
mod schema_tests {
    use rusqlite::Connection;

    use super::*;

    fn connection() -> Connection {
        let con = Connection::open_in_memory().unwrap();
        con.pragma_update(None, "foreign_keys", "ON").unwrap();
        create_tables(&con).unwrap();
        con
    }

    #[test]
    fn duplicate_names_under_one_parent_are_rejected() {
        let con = connection();
        let root = file_repository::insert_root(&con).unwrap();
        file_repository::insert_placeholder(&con, root, "a.txt").unwrap();
        let duplicate = file_repository::insert_placeholder(&con, root, "a.txt");
        assert!(duplicate.is_err());
    }

    #[test]
    fn deleting_a_directory_cascades_to_children() {
        let con = connection();
        let root = file_repository::insert_root(&con).unwrap();
        let dir = file_repository::insert_placeholder(&con, root, "d").unwrap();
        let child = file_repository::insert_placeholder(&con, dir, "inner.txt").unwrap();
        file_repository::delete_by_id(&con, dir).unwrap();
        assert_eq!(None, file_repository::name_and_parent(&con, child).unwrap());
    }

    #[test]
    fn index_db_side_files_are_recognized() {
        assert!(is_index_db_file(".meta.db"));
        assert!(is_index_db_file(".meta.db-wal"));
        assert!(!is_index_db_file("meta.db"));
        assert!(!is_index_db_file("notes.txt"));
    }
}
