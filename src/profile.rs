use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::{delete, insert_or_ignore_into, select};
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::State;
use serde::Serialize;
use std::borrow::Cow;

use crate::config::Settings;
use crate::db::DbConnection;
use crate::feed::{paged_posts, FeedScope, PostView};
use crate::pagination::{parse_page_number, Page};
use crate::types::{ApiError, ApiResult, RedirectResult};
use crate::users::models::User;
use crate::users::CurrentUser;
use crate::utils::profile_url;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Profile<'a> {
    pub username: Cow<'a, str>,
    pub first_name: Cow<'a, str>,
    pub last_name: Cow<'a, str>,
}

impl<'a> From<&'a User> for Profile<'a> {
    fn from(user: &'a User) -> Self {
        Profile {
            username: Cow::Borrowed(&user.username),
            first_name: Cow::Borrowed(&user.first_name),
            last_name: Cow::Borrowed(&user.last_name),
        }
    }
}

impl From<User> for Profile<'static> {
    fn from(user: User) -> Self {
        Profile {
            username: Cow::Owned(user.username),
            first_name: Cow::Owned(user.first_name),
            last_name: Cow::Owned(user.last_name),
        }
    }
}

/// Adds the follow edge. Following yourself, or someone already followed,
/// changes nothing. Returns whether an edge was created.
pub fn follow(connection: &mut SqliteConnection, follower: &User, author: &User) -> Result<bool, ApiError> {
    use crate::db::schema::follows::dsl::*;

    if follower.id == author.id {
        tracing::warn!("{} tried to follow themselves", follower.username);
        return Ok(false);
    }
    let inserted = insert_or_ignore_into(follows)
        .values((user_id.eq(follower.id), author_id.eq(author.id)))
        .execute(connection)?;
    if inserted > 0 {
        tracing::info!("{} follows {}", follower.username, author.username);
    }
    Ok(inserted > 0)
}

/// Removes the follow edge if there is one. Returns whether one was removed.
pub fn unfollow(connection: &mut SqliteConnection, follower: &User, author: &User) -> Result<bool, ApiError> {
    use crate::db::schema::follows::dsl::*;

    let removed = delete(
        follows
            .filter(user_id.eq(follower.id))
            .filter(author_id.eq(author.id)),
    ).execute(connection)?;
    if removed > 0 {
        tracing::info!("{} unfollowed {}", follower.username, author.username);
    }
    Ok(removed > 0)
}

pub fn is_following(connection: &mut SqliteConnection, follower: &User, author: &User) -> Result<bool, ApiError> {
    use crate::db::schema::follows::dsl::*;

    select(exists(
        follows
            .filter(user_id.eq(follower.id))
            .filter(author_id.eq(author.id)),
    )).get_result::<bool>(connection)
        .map_err(|e| e.into())
}

pub fn follower_count(connection: &mut SqliteConnection, author: &User) -> Result<i64, ApiError> {
    use crate::db::schema::follows::dsl::*;

    follows
        .filter(author_id.eq(author.id))
        .count()
        .get_result::<i64>(connection)
        .map_err(|e| e.into())
}

pub fn following_count(connection: &mut SqliteConnection, follower: &User) -> Result<i64, ApiError> {
    use crate::db::schema::follows::dsl::*;

    follows
        .filter(user_id.eq(follower.id))
        .count()
        .get_result::<i64>(connection)
        .map_err(|e| e.into())
}

#[derive(Debug, Serialize)]
pub struct ProfilePage {
    profile: Profile<'static>,
    total_posts: usize,
    followers: i64,
    following: i64,
    /// `None` for anonymous viewers.
    follow_status: Option<bool>,
    page: Page<PostView>,
}

#[get("/<name>?<page>", rank = 5)]
pub fn profile(
    mut connection: DbConnection,
    settings: &State<Settings>,
    current_user: Option<User>,
    name: &str,
    page: Option<&str>,
) -> ApiResult<ProfilePage> {
    let author = User::load_by_name(name, &mut connection)?;
    let page = paged_posts(
        &mut connection,
        FeedScope::Author(&author),
        parse_page_number(page),
        settings.page_size,
    )?;
    let follow_status = match current_user {
        Some(current) => Some(is_following(&mut connection, &current, &author)?),
        None => None,
    };

    Ok(Json(ProfilePage {
        total_posts: page.count,
        followers: follower_count(&mut connection, &author)?,
        following: following_count(&mut connection, &author)?,
        follow_status,
        page,
        profile: Profile::from(author),
    }))
}

#[get("/<name>/follow", rank = 3)]
pub fn profile_follow(mut connection: DbConnection, current_user: CurrentUser, name: &str) -> RedirectResult {
    let current = current_user?;
    let author = User::load_by_name(name, &mut connection)?;
    follow(&mut connection, &current, &author)?;
    Ok(Redirect::to(profile_url(&author.username)))
}

#[get("/<name>/unfollow", rank = 3)]
pub fn profile_unfollow(mut connection: DbConnection, current_user: CurrentUser, name: &str) -> RedirectResult {
    let current = current_user?;
    let author = User::load_by_name(name, &mut connection)?;
    unfollow(&mut connection, &current, &author)?;
    Ok(Redirect::to(profile_url(&author.username)))
}

#[derive(Debug, Serialize)]
pub struct FollowPage {
    page: Page<PostView>,
}

#[get("/follow?<page>")]
pub fn follow_index(
    mut connection: DbConnection,
    settings: &State<Settings>,
    current_user: CurrentUser,
    page: Option<&str>,
) -> ApiResult<FollowPage> {
    let current = current_user?;
    let page = paged_posts(
        &mut connection,
        FeedScope::FollowedBy(&current),
        parse_page_number(page),
        settings.page_size,
    )?;
    Ok(Json(FollowPage { page }))
}
