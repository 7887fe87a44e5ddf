use rocket::data::{Data, ToByteUnit};
use rocket::fs::NamedFile;
use rocket::serde::json::Json;
use rocket::tokio::fs as tokio_fs;
use rocket::State;

use crate::handler::FilesState;
use crate::model::error::index_errors::{GetItemError, RemoveItemError};
use crate::model::repository::FOLDER_CONTENT_TYPE;
use crate::model::request::file_requests::{CreateItemQuery, ItemId, ItemQuery};
use crate::model::response::file_responses::{
    CreateItemResponse, DeleteItemResponse, GetItemResponse, GzipJson,
};
use crate::model::response::BasicMessage;
use crate::service::index_service::{self, DEFAULT_CHANGE_COUNT};

fn resolve_id(id: Option<ItemId>, state: &FilesState) -> Option<i64> {
    match id {
        Some(ItemId::Root) => Some(state.root_id),
        Some(ItemId::Id(id)) => Some(id),
        None => None,
    }
}

/// `GET /files?id=<id>` serves the item itself; `cmd=info` returns its
/// metadata and `cmd=list` a gzip-compressed change-log window
#[get("/?<query..>")]
pub async fn get_item(query: ItemQuery<'_>, state: &State<FilesState>) -> GetItemResponse {
    let id = match resolve_id(query.id, state) {
        Some(id) => id,
        None => return GetItemResponse::BadRequest(BasicMessage::new("an item id is required")),
    };
    let path = match state.index.get_path_for_id(id) {
        Ok(path) => path,
        Err(GetItemError::NotFound) => {
            return GetItemResponse::NotFound(BasicMessage::new(
                "no item with the passed id exists",
            ))
        }
        Err(_) => {
            return GetItemResponse::Failure(BasicMessage::new(
                "failed to resolve the item. Check server logs for details",
            ))
        }
    };
    if !path.starts_with(&state.base_dir) {
        return GetItemResponse::Forbidden(BasicMessage::new(
            "the item is outside of the served directory",
        ));
    }
    match query.cmd {
        Some("info") => match state.index.get_metadata_for_item(id) {
            Some(meta) => GetItemResponse::Info(Json(meta)),
            None => GetItemResponse::NotFound(BasicMessage::new(
                "no item with the passed id exists",
            )),
        },
        Some("list") => {
            let anchor = query.anchor.unwrap_or(0);
            let count = query.count.unwrap_or(DEFAULT_CHANGE_COUNT);
            let changes = match state.index.get_changes_in_directory_since(id, anchor, count) {
                Ok(changes) => changes,
                Err(_) => {
                    return GetItemResponse::Failure(BasicMessage::new(
                        "failed to read the change log. Check server logs for details",
                    ))
                }
            };
            match GzipJson::from_serialize(&changes) {
                Ok(body) => GetItemResponse::Changes(body),
                Err(e) => {
                    log::error!("failed to compress the change list: {}", e);
                    GetItemResponse::Failure(BasicMessage::new(
                        "failed to encode the change log",
                    ))
                }
            }
        }
        _ => {
            if let Some(meta) = state.index.get_metadata_for_item(id) {
                if meta.ctype == FOLDER_CONTENT_TYPE {
                    return GetItemResponse::BadRequest(BasicMessage::new(
                        "directories are not streamed; poll cmd=list instead",
                    ));
                }
            }
            match NamedFile::open(&path).await {
                Ok(file) => GetItemResponse::File(file),
                Err(_) => GetItemResponse::NotFound(BasicMessage::new(
                    "the item no longer exists on disk",
                )),
            }
        }
    }
}

/// `POST /files?parentId=<id>&name=<name>` uploads the request body as a new
/// file; with `cmd=createDir` it creates a directory instead. The item id is
/// reserved up front and rolled back if anything after that fails.
#[post("/?<query..>", data = "<body>")]
pub async fn create_item(
    query: CreateItemQuery<'_>,
    body: Data<'_>,
    state: &State<FilesState>,
) -> CreateItemResponse {
    let parent_id = match resolve_id(query.parent_id, state) {
        Some(id) => id,
        None => return CreateItemResponse::BadRequest(BasicMessage::new("a parentId is required")),
    };
    let name = match query.name {
        Some(name) if index_service::valid_item_name(name) => name,
        Some(_) => return CreateItemResponse::BadRequest(BasicMessage::new("invalid item name")),
        None => return CreateItemResponse::BadRequest(BasicMessage::new("a name is required")),
    };
    let parent_path = match state.index.get_path_for_id(parent_id) {
        Ok(path) => path,
        Err(GetItemError::NotFound) => {
            return CreateItemResponse::ParentNotFound(BasicMessage::new(
                "no item with the passed parentId exists",
            ))
        }
        Err(_) => {
            return CreateItemResponse::Failure(BasicMessage::new(
                "failed to resolve the parent. Check server logs for details",
            ))
        }
    };
    if !parent_path.starts_with(&state.base_dir) {
        return CreateItemResponse::Forbidden(BasicMessage::new(
            "the parent is outside of the served directory",
        ));
    }
    let id = match state.index.create_item_placeholder(parent_id, name) {
        Ok(id) => id,
        Err(e) => {
            log::error!("failed to reserve '{}' under {}: {:?}", name, parent_id, e);
            return CreateItemResponse::Failure(BasicMessage::new(
                "failed to reserve a name for the item",
            ));
        }
    };
    // the placeholder may have picked a numbered name; the index knows best
    let file_path = match state.index.get_path_for_id(id) {
        Ok(path) => path,
        Err(_) => {
            state.index.delete_item_placeholder(id);
            return CreateItemResponse::Failure(BasicMessage::new("failed to place the item"));
        }
    };

    if query.cmd == Some("createDir") {
        // the directory may already exist on disk; consume it rather than fail
        let _ = tokio_fs::create_dir(&file_path).await;
        if let Err(e) = state.index.import_item(id, &file_path) {
            log::error!("failed to import '{}': {:?}", file_path.display(), e);
            state.index.delete_item_placeholder(id);
            return CreateItemResponse::Failure(BasicMessage::new(
                "failed to create the directory",
            ));
        }
    } else {
        let mut file = match tokio_fs::File::create(&file_path).await {
            Ok(file) => file,
            Err(e) => {
                log::error!("failed to create '{}': {}", file_path.display(), e);
                state.index.delete_item_placeholder(id);
                return CreateItemResponse::Failure(BasicMessage::new("failed to create the file"));
            }
        };
        let streamed = body.open(8.gibibytes()).stream_to(&mut file).await;
        let written = match streamed {
            Ok(n) if n.complete => file.sync_all().await,
            Ok(_) => Err(std::io::Error::other("request body exceeded the upload cap")),
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            log::error!("failed to write '{}': {}", file_path.display(), e);
            state.index.delete_item_placeholder(id);
            let _ = tokio_fs::remove_file(&file_path).await;
            return CreateItemResponse::Failure(BasicMessage::new("failed to store the file"));
        }
        if let Err(e) = state.index.import_item(id, &file_path) {
            log::error!("failed to import '{}': {:?}", file_path.display(), e);
            state.index.delete_item_placeholder(id);
            let _ = tokio_fs::remove_file(&file_path).await;
            return CreateItemResponse::Failure(BasicMessage::new("failed to index the file"));
        }
    }

    match state.index.get_metadata_for_item(id) {
        Some(meta) => CreateItemResponse::Created(Json(meta)),
        None => CreateItemResponse::Failure(BasicMessage::new(
            "the item was created but its metadata could not be read",
        )),
    }
}

/// `DELETE /files?id=<id>` removes the item from the index and then from the
/// disk. The index is authoritative: a failed disk removal is only logged.
#[delete("/?<id>")]
pub async fn delete_item(id: Option<i64>, state: &State<FilesState>) -> DeleteItemResponse {
    let id = match id {
        Some(id) => id,
        None => return DeleteItemResponse::BadRequest(BasicMessage::new("an item id is required")),
    };
    if id == state.root_id {
        return DeleteItemResponse::Forbidden(BasicMessage::new(
            "the served root cannot be deleted",
        ));
    }
    let path = match state.index.get_path_for_id(id) {
        Ok(path) => path,
        Err(GetItemError::NotFound) => {
            return DeleteItemResponse::NotFound(BasicMessage::new(
                "no item with the passed id exists",
            ))
        }
        Err(_) => {
            return DeleteItemResponse::Failure(BasicMessage::new(
                "failed to resolve the item. Check server logs for details",
            ))
        }
    };
    if !path.starts_with(&state.base_dir) {
        return DeleteItemResponse::Forbidden(BasicMessage::new(
            "the item is outside of the served directory",
        ));
    }
    let meta = state.index.get_metadata_for_item(id);
    match state.index.remove_item(id) {
        Ok(()) => {}
        Err(RemoveItemError::NotFound) => {
            return DeleteItemResponse::NotFound(BasicMessage::new(
                "no item with the passed id exists",
            ))
        }
        Err(_) => {
            return DeleteItemResponse::Failure(BasicMessage::new(
                "failed to remove the item. Check server logs for details",
            ))
        }
    }
    let removed = match meta {
        Some(meta) if meta.ctype == FOLDER_CONTENT_TYPE => tokio_fs::remove_dir_all(&path).await,
        _ => tokio_fs::remove_file(&path).await,
    };
    if let Err(e) = removed {
        log::error!("failed to delete '{}': {}", path.display(), e);
    }
    DeleteItemResponse::Success(())
}
