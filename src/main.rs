#[macro_use]
extern crate rocket;

use std::fs;
use std::path::PathBuf;

use rocket::{Build, Rocket};

use crate::config::STORAGE_CONFIG;
use crate::handler::file_handler::{create_item, delete_item, get_item};
use crate::handler::meta_handler::get_meta;
use crate::handler::store_handler::{delete_blob, download_blob, upload_blob};
use crate::handler::{
    method_not_allowed_patch, method_not_allowed_put, FilesState, MetaState, StoreState,
};
use crate::repository::META_DB_NAME;
use crate::service::index_service::FileIndex;
use crate::service::scan_service;

mod config;
mod handler;
mod model;
mod repository;
mod service;
#[cfg(test)]
mod test;

#[cfg(not(test))]
fn base_dir() -> PathBuf {
    PathBuf::from(&STORAGE_CONFIG.basedir)
}

#[cfg(test)]
fn base_dir() -> PathBuf {
    test::test_dir().join("storage")
}

#[launch]
fn rocket() -> Rocket<Build> {
    let base_dir = base_dir();
    if let Err(e) = fs::create_dir_all(&base_dir) {
        panic!(
            "Failed to create base directory '{}': {}",
            base_dir.display(),
            e
        );
    }
    let base_dir = match fs::canonicalize(&base_dir) {
        Ok(dir) => dir,
        Err(e) => panic!(
            "Failed to resolve base directory '{}': {}",
            base_dir.display(),
            e
        ),
    };

    let index = match FileIndex::open(&base_dir.join(META_DB_NAME)) {
        Ok(index) => index,
        Err(e) => panic!("Failed to open the index: {}", e),
    };
    let root_id = match scan_service::scan_path(&index, &base_dir) {
        Ok(id) => id,
        Err(e) => panic!("Initial scan of '{}' failed: {:?}", base_dir.display(), e),
    };

    let figment = rocket::Config::figment().merge(("port", STORAGE_CONFIG.port));
    rocket::custom(figment)
        .manage(FilesState {
            index,
            base_dir: base_dir.clone(),
            root_id,
        })
        .manage(MetaState {
            base_dir: base_dir.clone(),
        })
        .manage(StoreState {
            base_dir: base_dir.join("store"),
        })
        .mount(
            "/files",
            routes![
                get_item,
                create_item,
                delete_item,
                method_not_allowed_put,
                method_not_allowed_patch
            ],
        )
        .mount(
            "/meta",
            routes![get_meta, method_not_allowed_put, method_not_allowed_patch],
        )
        .mount(
            "/store",
            routes![
                download_blob,
                upload_blob,
                delete_blob,
                method_not_allowed_put,
                method_not_allowed_patch
            ],
        )
}
