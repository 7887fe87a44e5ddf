use std::path::PathBuf;

use rocket::serde::json::Json;
use rocket::State;

use crate::handler::MetaState;
use crate::model::request::meta_requests::EnumerateQuery;
use crate::model::response::meta_responses::MetaResponse;
use crate::service::meta_service::{
    self, ListDirError, DEFAULT_LIST_COUNT, DEFAULT_LIST_OFFSET,
};

/// `GET /meta/<path>` describes a single filesystem entry; with `enumerate`
/// it returns one page of the directory listing instead
#[get("/<path..>?<query..>")]
pub fn get_meta(path: PathBuf, query: EnumerateQuery<'_>, state: &State<MetaState>) -> MetaResponse {
    let local_path = state.base_dir.join(path);
    if !local_path.starts_with(&state.base_dir) {
        return MetaResponse::NotFound(());
    }
    if query.wants_listing() {
        let offset = query.offset.unwrap_or(DEFAULT_LIST_OFFSET);
        let count = query.count.unwrap_or(DEFAULT_LIST_COUNT);
        return match meta_service::list_directory(&local_path, offset, count) {
            Ok(listing) => MetaResponse::Listing(Json(listing)),
            Err(ListDirError::NotFound) => MetaResponse::NotFound(()),
            Err(ListDirError::NotADirectory) | Err(ListDirError::OutOfRange) => {
                MetaResponse::OutOfRange(())
            }
            Err(ListDirError::Unreadable) => MetaResponse::Failure(()),
        };
    }
    match meta_service::describe_entry(&local_path) {
        Ok(entry) => MetaResponse::Entry(Json(entry)),
        Err(_) => MetaResponse::NotFound(()),
    }
}
