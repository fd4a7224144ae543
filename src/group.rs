use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::{insert_into, select};
use rocket::serde::json::Json;
use rocket::State;
use serde::Serialize;
use slug::slugify;

use crate::config::Settings;
use crate::db::schema::groups;
use crate::db::DbConnection;
use crate::feed::{paged_posts, FeedScope, PostView};
use crate::pagination::{parse_page_number, Page};
use crate::types::{ApiError, ApiResult, ValidationError};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, PartialEq)]
#[diesel(table_name = groups)]
pub struct Group {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl Group {
    pub fn load_by_slug(slug_: &str, connection: &mut SqliteConnection) -> Result<Group, ApiError> {
        use crate::db::schema::groups::dsl::*;
        groups
            .filter(slug.eq(slug_))
            .get_result::<Group>(connection)
            .map_err(|e| e.into())
    }

    pub fn all(connection: &mut SqliteConnection) -> Result<Vec<Group>, ApiError> {
        use crate::db::schema::groups::dsl::*;
        groups
            .order(title.asc())
            .load::<Group>(connection)
            .map_err(|e| e.into())
    }
}

#[derive(Insertable)]
#[diesel(table_name = groups)]
struct NewGroup<'a> {
    title: &'a str,
    slug: &'a str,
    description: &'a str,
}

/// Creates a group. Without an explicit slug one is derived from the title.
pub fn create_group(
    connection: &mut SqliteConnection,
    title_: &str,
    slug_: Option<&str>,
    description_: &str,
) -> Result<Group, ApiError> {
    use crate::db::schema::groups::dsl::*;

    let mut error = ValidationError::default();
    if title_.trim().is_empty() {
        error.add_error("title", "empty title");
    }
    let slug_ = slugify(slug_.unwrap_or(title_));
    if slug_.is_empty() {
        error.add_error("slug", "empty slug");
    } else if select(exists(groups.filter(slug.eq(&slug_)))).get_result::<bool>(connection)? {
        error.add_error("slug", format!("slug already taken: {}", slug_));
    }
    error.into_result()?;

    let group = insert_into(groups)
        .values(&NewGroup {
            title: title_.trim(),
            slug: &slug_,
            description: description_,
        })
        .get_result::<Group>(connection)?;
    tracing::info!("created group {}", group.slug);
    Ok(group)
}

#[derive(Debug, Serialize)]
pub struct GroupPage {
    group: Group,
    page: Page<PostView>,
}

#[get("/group/<slug>?<page>")]
pub fn group_posts(
    mut connection: DbConnection,
    settings: &State<Settings>,
    slug: &str,
    page: Option<&str>,
) -> ApiResult<GroupPage> {
    let group = Group::load_by_slug(slug, &mut connection)?;
    let page = paged_posts(
        &mut connection,
        FeedScope::Group(&group),
        parse_page_number(page),
        settings.page_size,
    )?;
    Ok(Json(GroupPage { group, page }))
}
