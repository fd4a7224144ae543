//! Paginated post listings: the global feed, a group, an author's profile and
//! the personal feed of everyone a user follows. Newest first.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::Sqlite;
use serde::Serialize;
use std::collections::HashMap;

use crate::db::schema::{follows, groups, posts, users};
use crate::group::Group;
use crate::pagination::{Page, Paginator};
use crate::post::Post;
use crate::profile::Profile;
use crate::types::ApiError;
use crate::users::User;
use crate::utils::{media_url, serialize_date};

#[derive(Debug, Clone, Copy)]
pub enum FeedScope<'a> {
    All,
    Group(&'a Group),
    Author(&'a User),
    FollowedBy(&'a User),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GroupRef {
    pub title: String,
    pub slug: String,
}

/// A post as every listing shows it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PostView {
    pub id: i32,
    pub text: String,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: NaiveDateTime,
    pub author: Profile<'static>,
    pub group: Option<GroupRef>,
    pub image: Option<String>,
}

fn scoped<'a>(scope: FeedScope<'_>) -> posts::BoxedQuery<'a, Sqlite> {
    let query = posts::table.into_boxed();
    match scope {
        FeedScope::All => query,
        FeedScope::Group(group) => query.filter(posts::group_id.eq(group.id)),
        FeedScope::Author(author) => query.filter(posts::author_id.eq(author.id)),
        FeedScope::FollowedBy(user) => query.filter(
            posts::author_id.eq_any(
                follows::table
                    .select(follows::author_id)
                    .filter(follows::user_id.eq(user.id)),
            ),
        ),
    }
}

pub fn paged_posts(
    connection: &mut SqliteConnection,
    scope: FeedScope<'_>,
    page: Option<i64>,
    page_size: usize,
) -> Result<Page<PostView>, ApiError> {
    let count = scoped(scope).count().get_result::<i64>(connection)?;
    let paginator = Paginator::new(count as usize, page_size);
    let window = paginator.window(page);

    let rows = scoped(scope)
        .order((posts::created_at.desc(), posts::id.desc()))
        .limit(window.limit as i64)
        .offset(window.offset as i64)
        .load::<Post>(connection)?;
    let views = post_views(connection, rows)?;
    Ok(paginator.page(window.number, views))
}

/// Attaches authors and groups to a batch of posts, keeping their order.
pub fn post_views(connection: &mut SqliteConnection, rows: Vec<Post>) -> Result<Vec<PostView>, ApiError> {
    let author_ids = rows.iter().map(|post| post.author_id).collect::<Vec<_>>();
    let group_ids = rows.iter().filter_map(|post| post.group_id).collect::<Vec<_>>();

    let authors = users::table
        .filter(users::id.eq_any(author_ids))
        .load::<User>(connection)?
        .into_iter()
        .map(|user| (user.id, user))
        .collect::<HashMap<_, _>>();
    let groups = if group_ids.is_empty() {
        HashMap::new()
    } else {
        groups::table
            .filter(groups::id.eq_any(group_ids))
            .load::<Group>(connection)?
            .into_iter()
            .map(|group| (group.id, group))
            .collect::<HashMap<_, _>>()
    };

    rows.into_iter()
        .map(|post| {
            let author = authors
                .get(&post.author_id)
                .ok_or(ApiError::Diesel(diesel::result::Error::NotFound))?;
            let group = post.group_id.and_then(|id| groups.get(&id)).map(|group| GroupRef {
                title: group.title.clone(),
                slug: group.slug.clone(),
            });
            Ok(PostView {
                id: post.id,
                text: post.text,
                created_at: post.created_at,
                author: Profile::from(author.clone()),
                group,
                image: post.image.as_deref().map(media_url),
            })
        })
        .collect()
}

pub fn post_view(connection: &mut SqliteConnection, post: Post) -> Result<PostView, ApiError> {
    post_views(connection, vec![post])?
        .pop()
        .ok_or(ApiError::Internal)
}
