use rocket::fs::NamedFile;
use rocket::serde::json::Json;

use crate::model::response::BasicMessage;

type NoContent = ();

#[derive(Responder)]
pub enum GetStoreFileResponse {
    #[response(status = 200)]
    File(NamedFile),
    #[response(status = 404, content_type = "json")]
    NotFound(Json<BasicMessage>),
}

#[derive(Responder)]
pub enum CreateStoreFileResponse {
    #[response(status = 201)]
    Created(NoContent),
    #[response(status = 409, content_type = "json")]
    Conflict(Json<BasicMessage>),
    #[response(status = 500, content_type = "json")]
    Failure(Json<BasicMessage>),
}

#[derive(Responder)]
pub enum DeleteStoreFileResponse {
    #[response(status = 200)]
    Success(NoContent),
    #[response(status = 404, content_type = "json")]
    NotFound(Json<BasicMessage>),
    #[response(status = 500, content_type = "json")]
    Failure(Json<BasicMessage>),
}
