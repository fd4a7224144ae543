use chrono::{NaiveDateTime, Utc};
use diesel::insert_into;
use diesel::prelude::*;
use rocket::form::Form;
use rocket::response::Redirect;
use serde::Serialize;

use crate::db::schema::{comments, users};
use crate::db::DbConnection;
use crate::post::Post;
use crate::profile::Profile;
use crate::types::{ApiError, RedirectResult, ValidationError};
use crate::users::models::User;
use crate::users::CurrentUser;
use crate::utils::{post_url, serialize_date};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, PartialEq)]
#[diesel(belongs_to(Post))]
#[diesel(belongs_to(User, foreign_key = author_id))]
#[diesel(table_name = comments)]
pub struct Comment {
    pub id: i32,
    pub post_id: i32,
    pub author_id: i32,
    pub text: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommentView {
    id: i32,
    text: String,
    #[serde(serialize_with = "serialize_date")]
    created_at: NaiveDateTime,
    author: Profile<'static>,
}

impl From<(Comment, User)> for CommentView {
    fn from(comment_and_author: (Comment, User)) -> Self {
        let (comment, author) = comment_and_author;
        CommentView {
            id: comment.id,
            text: comment.text,
            created_at: comment.created_at,
            author: Profile::from(author),
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = comments)]
struct NewComment<'a> {
    post_id: i32,
    author_id: i32,
    text: &'a str,
    created_at: NaiveDateTime,
}

pub fn add_comment(
    connection: &mut SqliteConnection,
    author: &User,
    post: &Post,
    text: &str,
) -> Result<Comment, ApiError> {
    if text.trim().is_empty() {
        return Err(ValidationError::from("text", "empty comment").into());
    }
    let comment = insert_into(comments::table)
        .values(&NewComment {
            post_id: post.id,
            author_id: author.id,
            text,
            created_at: Utc::now().naive_utc(),
        })
        .get_result::<Comment>(connection)?;
    tracing::info!("{} commented on post #{}", author.username, post.id);
    Ok(comment)
}

/// Comments of a post, oldest first.
pub fn comments_for(connection: &mut SqliteConnection, post: &Post) -> Result<Vec<CommentView>, ApiError> {
    let data = Comment::belonging_to(post)
        .inner_join(users::table)
        .order((comments::created_at.asc(), comments::id.asc()))
        .select((Comment::as_select(), User::as_select()))
        .load::<(Comment, User)>(connection)?;
    Ok(data.into_iter().map(CommentView::from).collect())
}

#[derive(Debug, FromForm)]
pub struct CommentForm {
    #[field(default = String::new())]
    text: String,
}

#[post("/<username>/<post_id>/comment", data = "<form>", rank = 4)]
pub fn add(
    mut connection: DbConnection,
    user: CurrentUser,
    username: &str,
    post_id: i32,
    form: Form<CommentForm>,
) -> RedirectResult {
    let user = user?;
    let author = User::load_by_name(username, &mut connection)?;
    let post = Post::load(&mut connection, &author, post_id)?;
    match add_comment(&mut connection, &user, &post, &form.text) {
        Ok(_) | Err(ApiError::Validation(_)) => Ok(Redirect::to(post_url(&author.username, post.id))),
        Err(e) => Err(e),
    }
}
