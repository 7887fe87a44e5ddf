use std::fs;
use std::path::{Path, PathBuf};

use crate::repository::META_DB_NAME;
use crate::service::index_service::FileIndex;

/// name of the running test's thread, safe to use in a filename. Tests run
/// on threads named after the test, which keeps their scratch space apart.
pub fn current_thread_name() -> String {
    std::thread::current()
        .name()
        .unwrap_or("unnamed")
        .replace("::", "_")
}

/// this test's private scratch directory
pub fn test_dir() -> PathBuf {
    std::env::temp_dir().join(format!("storage_server_{}", current_thread_name()))
}

/// wipes and recreates the scratch directory
pub fn refresh_test_dir() -> PathBuf {
    let dir = test_dir();
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn cleanup() {
    let _ = fs::remove_dir_all(test_dir());
}

pub fn create_file_disk(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

pub fn create_dir_disk(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::create_dir_all(&path).unwrap();
    path
}

/// an index backed by a database inside the scratch directory
pub fn test_index(dir: &Path) -> FileIndex {
    FileIndex::open(&dir.join(META_DB_NAME)).unwrap()
}
