#[macro_use]
extern crate rocket;
#[macro_use]
extern crate error_chain;

pub mod cache;
pub mod comment;
pub mod config;
pub mod db;
pub mod feed;
pub mod group;
pub mod media;
pub mod pagination;
pub mod post;
pub mod profile;
pub mod types;
pub mod users;
pub mod utils;

use rocket::figment::Figment;
use rocket::fs::FileServer;
use rocket::request::Request;
use rocket::serde::json::Json;
use rocket::{Build, Rocket};
use serde_json::{json, Value};

use crate::cache::PageCache;
use crate::config::Settings;

#[catch(422)]
fn handle_422(_req: &Request) -> Json<Value> {
    Json(json!({
        "errors": [
            "unprocessable entity"
        ]
    }))
}

#[catch(404)]
fn not_found(req: &Request) -> Json<Value> {
    Json(json!({
        "errors": [
            "entity not found"
        ],
        "path": req.uri().path().as_str()
    }))
}

#[catch(500)]
fn server_error(_req: &Request) -> Json<Value> {
    Json(json!({
        "errors": [
            "internal server error"
        ]
    }))
}

/// Assembles the application: settings, database pool, page cache, routes.
pub fn build(figment: Figment) -> db::Result<Rocket<Build>> {
    let settings = Settings::from_figment(&figment)?;
    let pool = db::init_pool(&settings.database_url)?;
    std::fs::create_dir_all(&settings.media_root)?;
    let cache = PageCache::new(settings.cache_ttl(), settings.cache_max_entries);
    let media = FileServer::from(&settings.media_root);

    Ok(rocket::custom(figment)
        .manage(pool)
        .manage(cache)
        .manage(settings)
        .mount(
            "/",
            routes![
                post::index,
                post::new,
                post::create,
                post::view,
                post::edit,
                post::update,
                post::delete,
                group::group_posts,
                comment::add,
                profile::profile,
                profile::profile_follow,
                profile::profile_unfollow,
                profile::follow_index,
            ],
        )
        .mount(
            "/auth",
            routes![users::login_page, users::authenticate, users::signup],
        )
        .mount("/media", media)
        .register("/", catchers![not_found, handle_422, server_error]))
}
