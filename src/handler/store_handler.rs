use std::path::PathBuf;

use rocket::data::{Data, ToByteUnit};
use rocket::fs::NamedFile;
use rocket::tokio::fs as tokio_fs;
use rocket::State;

use crate::handler::StoreState;
use crate::model::response::store_responses::{
    CreateStoreFileResponse, DeleteStoreFileResponse, GetStoreFileResponse,
};
use crate::model::response::BasicMessage;

/// `GET /store/<path>` streams the blob at that path
#[get("/<path..>")]
pub async fn download_blob(path: PathBuf, state: &State<StoreState>) -> GetStoreFileResponse {
    let local_path = state.base_dir.join(path);
    match tokio_fs::metadata(&local_path).await {
        Ok(meta) if meta.is_file() => {}
        _ => {
            return GetStoreFileResponse::NotFound(BasicMessage::new(
                "no file exists at the passed path",
            ))
        }
    }
    match NamedFile::open(&local_path).await {
        Ok(file) => GetStoreFileResponse::File(file),
        Err(_) => GetStoreFileResponse::NotFound(BasicMessage::new(
            "no file exists at the passed path",
        )),
    }
}

/// `POST /store/<path>` creates a blob from the raw request body. An
/// existing path is never overwritten.
#[post("/<path..>", data = "<body>")]
pub async fn upload_blob(
    path: PathBuf,
    body: Data<'_>,
    state: &State<StoreState>,
) -> CreateStoreFileResponse {
    let local_path = state.base_dir.join(path);
    if tokio_fs::metadata(&local_path).await.is_ok() {
        return CreateStoreFileResponse::Conflict(BasicMessage::new(
            "a file already exists at the passed path",
        ));
    }
    // the blob area itself appears on first use
    if let Err(e) = tokio_fs::create_dir_all(&state.base_dir).await {
        log::error!("failed to create '{}': {}", state.base_dir.display(), e);
        return CreateStoreFileResponse::Failure(BasicMessage::new("failed to create the file"));
    }
    let mut file = match tokio_fs::File::create(&local_path).await {
        Ok(file) => file,
        Err(e) => {
            log::error!("failed to create '{}': {}", local_path.display(), e);
            return CreateStoreFileResponse::Failure(BasicMessage::new(
                "failed to create the file",
            ));
        }
    };
    let streamed = body.open(8.gibibytes()).stream_to(&mut file).await;
    let stored = match streamed {
        Ok(n) if n.complete => file.sync_all().await,
        Ok(_) => Err(std::io::Error::other("request body exceeded the upload cap")),
        Err(e) => Err(e),
    };
    if let Err(e) = stored {
        log::error!("failed to write '{}': {}", local_path.display(), e);
        let _ = tokio_fs::remove_file(&local_path).await;
        return CreateStoreFileResponse::Failure(BasicMessage::new("failed to store the file"));
    }
    CreateStoreFileResponse::Created(())
}

/// `DELETE /store/<path>` removes the blob (or empty directory) at that path
#[delete("/<path..>")]
pub async fn delete_blob(path: PathBuf, state: &State<StoreState>) -> DeleteStoreFileResponse {
    let local_path = state.base_dir.join(path);
    let meta = match tokio_fs::metadata(&local_path).await {
        Ok(meta) => meta,
        Err(_) => {
            return DeleteStoreFileResponse::NotFound(BasicMessage::new(
                "nothing exists at the passed path",
            ))
        }
    };
    let removed = if meta.is_dir() {
        tokio_fs::remove_dir(&local_path).await
    } else {
        tokio_fs::remove_file(&local_path).await
    };
    match removed {
        Ok(()) => DeleteStoreFileResponse::Success(()),
        Err(e) => {
            log::error!("failed to delete '{}': {}", local_path.display(), e);
            DeleteStoreFileResponse::Failure(BasicMessage::new("failed to delete the file"))
        }
    }
}
