use std::path::PathBuf;

use rocket::http::Status;

use crate::service::index_service::FileIndex;

pub mod file_handler;
pub mod meta_handler;
pub mod store_handler;

/// state for the id-keyed files handler: the index, the directory it serves
/// and the id of that directory's row
pub struct FilesState {
    pub index: FileIndex,
    pub base_dir: PathBuf,
    pub root_id: i64,
}

/// state for the filesystem-direct metadata handler
pub struct MetaState {
    pub base_dir: PathBuf,
}

/// state for the path-keyed blob handler
pub struct StoreState {
    pub base_dir: PathBuf,
}

#[put("/<_..>")]
pub fn method_not_allowed_put() -> Status {
    Status::MethodNotAllowed
}

#[patch("/<_..>")]
pub fn method_not_allowed_patch() -> Status {
    Status::MethodNotAllowed
}
