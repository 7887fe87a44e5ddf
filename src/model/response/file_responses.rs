use std::io::{self, Cursor, Write};

use flate2::write::GzEncoder;
use flate2::Compression;
use rocket::fs::NamedFile;
use rocket::http::{ContentType, Header};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::{serde_json, Json};
use rocket::serde::{Deserialize, Serialize};

use crate::model::response::BasicMessage;

/// the wire shape of a single indexed item. `ctype` is `"folder"` for
/// directories, whose `size` is their immediate-child count.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(crate = "rocket::serde")]
pub struct FileMeta {
    pub id: i64,
    pub size: i64,
    pub mdate: i64,
    pub cdate: i64,
    pub name: String,
    pub ctype: String,
}

/// one window of the change log for a directory. `anchor` is the
/// high-watermark to pass back on the next poll; `remain` tells the client
/// whether to poll again immediately.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(crate = "rocket::serde")]
pub struct ChangeList {
    pub new: Vec<FileMeta>,
    pub erase: Vec<i64>,
    pub anchor: i64,
    pub remain: i64,
}

/// a pre-compressed JSON body, served with `Content-Encoding: gzip`
pub struct GzipJson(Vec<u8>);

impl GzipJson {
    pub fn from_serialize<T: Serialize>(value: &T) -> io::Result<GzipJson> {
        let raw = serde_json::to_vec(value).map_err(io::Error::other)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        Ok(GzipJson(encoder.finish()?))
    }
}

impl<'r> Responder<'r, 'static> for GzipJson {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        Response::build()
            .header(ContentType::JSON)
            .header(Header::new("Content-Encoding", "gzip"))
            .sized_body(self.0.len(), Cursor::new(self.0))
            .ok()
    }
}

#[derive(Responder)]
pub enum GetItemResponse {
    #[response(status = 200, content_type = "json")]
    Info(Json<FileMeta>),
    #[response(status = 200)]
    Changes(GzipJson),
    #[response(status = 200)]
    File(NamedFile),
    #[response(status = 400, content_type = "json")]
    BadRequest(Json<BasicMessage>),
    #[response(status = 403, content_type = "json")]
    Forbidden(Json<BasicMessage>),
    #[response(status = 404, content_type = "json")]
    NotFound(Json<BasicMessage>),
    #[response(status = 500, content_type = "json")]
    Failure(Json<BasicMessage>),
}

#[derive(Responder)]
pub enum CreateItemResponse {
    #[response(status = 201, content_type = "json")]
    Created(Json<FileMeta>),
    #[response(status = 400, content_type = "json")]
    BadRequest(Json<BasicMessage>),
    #[response(status = 403, content_type = "json")]
    Forbidden(Json<BasicMessage>),
    #[response(status = 404, content_type = "json")]
    ParentNotFound(Json<BasicMessage>),
    #[response(status = 500, content_type = "json")]
    Failure(Json<BasicMessage>),
}

type NoContent = ();

#[derive(Responder)]
pub enum DeleteItemResponse {
    #[response(status = 200)]
    Success(NoContent),
    #[response(status = 400, content_type = "json")]
    BadRequest(Json<BasicMessage>),
    #[response(status = 403, content_type = "json")]
    Forbidden(Json<BasicMessage>),
    #[response(status = 404, content_type = "json")]
    NotFound(Json<BasicMessage>),
    #[response(status = 500, content_type = "json")]
    Failure(Json<BasicMessage>),
}
