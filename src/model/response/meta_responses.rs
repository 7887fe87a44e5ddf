use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};

use crate::model::repository::ProbedItem;

/// compact single-entry metadata served by the `/meta` handler; key names are
/// kept short because listings can carry many of these
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(crate = "rocket::serde")]
pub struct EntryMeta {
    #[serde(rename = "nn")]
    pub name: String,
    #[serde(rename = "ct")]
    pub ctype: String,
    #[serde(rename = "sz")]
    pub size: i64,
    #[serde(rename = "md")]
    pub mdate: i64,
    #[serde(rename = "cd")]
    pub cdate: i64,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(crate = "rocket::serde")]
pub struct DirListing {
    pub offset: usize,
    pub files: Vec<EntryMeta>,
}

impl From<ProbedItem> for EntryMeta {
    fn from(item: ProbedItem) -> Self {
        EntryMeta {
            name: item.name,
            ctype: item.ctype,
            size: item.size,
            mdate: item.mdate,
            cdate: item.cdate,
        }
    }
}

type NoContent = ();

#[derive(Responder)]
pub enum MetaResponse {
    #[response(status = 200, content_type = "json")]
    Entry(Json<EntryMeta>),
    #[response(status = 200, content_type = "json")]
    Listing(Json<DirListing>),
    #[response(status = 204)]
    OutOfRange(NoContent),
    #[response(status = 404)]
    NotFound(NoContent),
    #[response(status = 500)]
    Failure(NoContent),
}
