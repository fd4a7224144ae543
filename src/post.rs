use chrono::{NaiveDateTime, Utc};
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::{delete as diesel_delete, insert_into, select, update as diesel_update};
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::response::content::RawJson;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::State;
use serde::Serialize;
use std::path::Path;

use crate::cache::PageCache;
use crate::comment::{comments_for, CommentView};
use crate::config::Settings;
use crate::db::schema::posts;
use crate::db::DbConnection;
use crate::feed::{paged_posts, post_view, FeedScope, PostView};
use crate::group::Group;
use crate::media::{self, ImageUpload};
use crate::pagination::{parse_page_number, Page};
use crate::profile::Profile;
use crate::types::{ApiError, ApiResult, PageOrRedirect, RedirectResult, Validate, ValidationError};
use crate::users::{CurrentUser, User};
use crate::utils::{post_url, profile_url};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, PartialEq)]
#[diesel(belongs_to(User, foreign_key = author_id))]
#[diesel(belongs_to(Group))]
#[diesel(table_name = posts)]
pub struct Post {
    pub id: i32,
    pub text: String,
    pub created_at: NaiveDateTime,
    pub author_id: i32,
    pub group_id: Option<i32>,
    pub image: Option<String>,
}

impl Post {
    /// A post addressed through its author's profile; any mismatch is a 404.
    pub fn load(connection: &mut SqliteConnection, author: &User, post_id: i32) -> Result<Post, ApiError> {
        use crate::db::schema::posts::dsl::*;
        posts
            .filter(id.eq(post_id))
            .filter(author_id.eq(author.id))
            .get_result::<Post>(connection)
            .map_err(|e| e.into())
    }

    pub fn count_by_author(connection: &mut SqliteConnection, author: &User) -> Result<i64, ApiError> {
        use crate::db::schema::posts::dsl::*;
        posts
            .filter(author_id.eq(author.id))
            .count()
            .get_result::<i64>(connection)
            .map_err(|e| e.into())
    }
}

#[derive(Insertable)]
#[diesel(table_name = posts)]
struct NewPost {
    text: String,
    created_at: NaiveDateTime,
    author_id: i32,
    group_id: Option<i32>,
    image: Option<String>,
}

/// Validated input for creating or editing a post.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostDraft {
    pub text: String,
    pub group_id: Option<i32>,
    pub image: Option<ImageUpload>,
}

impl PostDraft {
    pub fn new<T: Into<String>>(text: T) -> PostDraft {
        PostDraft {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn in_group(mut self, group: &Group) -> PostDraft {
        self.group_id = Some(group.id);
        self
    }

    pub fn with_image(mut self, image: ImageUpload) -> PostDraft {
        self.image = Some(image);
        self
    }
}

impl Validate for PostDraft {
    type Error = ApiError;
    fn validate(self, connection: &mut SqliteConnection) -> Result<Self, ApiError> {
        use crate::db::schema::groups::dsl::*;

        let mut error = ValidationError::default();
        if self.text.trim().is_empty() {
            error.add_error("text", "empty text");
        }

        if let Some(group) = self.group_id {
            let group_exists = select(exists(groups.filter(id.eq(group)))).get_result::<bool>(connection)?;
            if !group_exists {
                error.add_error("group", format!("no such group: {}", group));
            }
        }

        if let Some(upload) = &self.image {
            if let Err(e) = upload.check() {
                error.merge(e);
            }
        }

        error.into_result()?;
        Ok(self)
    }
}

pub fn create_post(connection: &mut SqliteConnection, author: &User, draft: PostDraft) -> Result<Post, ApiError> {
    let draft = draft.validate(connection)?;
    insert_post(connection, author, draft)
}

// Expects a validated draft.
fn insert_post(connection: &mut SqliteConnection, author: &User, draft: PostDraft) -> Result<Post, ApiError> {
    let new_post = NewPost {
        text: draft.text,
        created_at: Utc::now().naive_utc(),
        author_id: author.id,
        group_id: draft.group_id,
        image: draft.image.map(|upload| upload.path),
    };
    let post = insert_into(posts::table)
        .values(&new_post)
        .get_result::<Post>(connection)?;
    tracing::info!("{} published post #{}", author.username, post.id);
    Ok(post)
}

/// Replaces text and group. The image changes only when a new one is given.
pub fn edit_post(
    connection: &mut SqliteConnection,
    editor: &User,
    post: &Post,
    draft: PostDraft,
) -> Result<Post, ApiError> {
    ensure_author(editor, post, "edit")?;
    let draft = draft.validate(connection)?;
    update_post(connection, editor, post, draft)
}

// Expects a validated draft from the post's author.
fn update_post(
    connection: &mut SqliteConnection,
    editor: &User,
    post: &Post,
    draft: PostDraft,
) -> Result<Post, ApiError> {
    let changes = (posts::text.eq(draft.text), posts::group_id.eq(draft.group_id));
    let target = diesel_update(posts::table.find(post.id));
    let updated = match draft.image {
        Some(upload) => target
            .set((changes.0, changes.1, posts::image.eq(Some(upload.path))))
            .get_result::<Post>(connection)?,
        None => target.set(changes).get_result::<Post>(connection)?,
    };
    tracing::info!("{} edited post #{}", editor.username, post.id);
    Ok(updated)
}

/// Removes the post together with its comments.
pub fn delete_post(connection: &mut SqliteConnection, requester: &User, post: &Post) -> Result<(), ApiError> {
    use crate::db::schema::comments;

    ensure_author(requester, post, "delete")?;
    connection.transaction::<_, ApiError, _>(|conn| {
        diesel_delete(comments::table.filter(comments::post_id.eq(post.id))).execute(conn)?;
        diesel_delete(posts::table.find(post.id)).execute(conn)?;
        Ok(())
    })?;
    tracing::info!("{} deleted post #{}", requester.username, post.id);
    Ok(())
}

fn ensure_author(user: &User, post: &Post, action: &str) -> Result<(), ApiError> {
    if user.id == post.author_id {
        Ok(())
    } else {
        tracing::warn!("{} tried to {} post #{}", user.username, action, post.id);
        Err(ApiError::Forbidden)
    }
}

#[derive(Debug, FromForm)]
pub struct PostForm<'r> {
    #[field(default = String::new())]
    text: String,
    group: Option<i32>,
    image: Option<TempFile<'r>>,
}

impl<'r> PostForm<'r> {
    async fn draft(&self) -> Result<PostDraft, ApiError> {
        // an empty file input still submits a part
        let image = match self.image.as_ref().filter(|file| file.len() > 0) {
            Some(file) => Some(ImageUpload::inspect(file).await?),
            None => None,
        };
        Ok(PostDraft {
            text: self.text.clone(),
            group_id: self.group,
            image,
        })
    }

    /// Returns the stored path, if the draft carries an image.
    async fn store_image(&mut self, draft: &PostDraft, media_root: &Path) -> Result<Option<String>, ApiError> {
        match (&draft.image, self.image.as_mut()) {
            (Some(upload), Some(file)) => {
                media::store(file, media_root, upload).await?;
                Ok(Some(upload.path.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IndexPage {
    page: Page<PostView>,
}

#[get("/?<page>")]
pub fn index(
    mut connection: DbConnection,
    settings: &State<Settings>,
    cache: &State<PageCache>,
    page: Option<&str>,
) -> Result<RawJson<String>, ApiError> {
    let requested = parse_page_number(page);
    // other query parameters do not change the page, so they stay out of the key
    let key = format!("index:{}", requested.unwrap_or(1).max(1));
    if let Some(body) = cache.get(&key) {
        return Ok(RawJson(body));
    }

    let page = paged_posts(&mut connection, FeedScope::All, requested, settings.page_size)?;
    let body = serde_json::to_string(&IndexPage { page }).map_err(|_| ApiError::Internal)?;
    cache.insert(key, body.clone());
    Ok(RawJson(body))
}

#[derive(Debug, Serialize)]
pub struct PostFormPage {
    groups: Vec<Group>,
    post: Option<PostView>,
}

#[get("/new")]
pub fn new(mut connection: DbConnection, user: CurrentUser) -> ApiResult<PostFormPage> {
    user?;
    let groups = Group::all(&mut connection)?;
    Ok(Json(PostFormPage { groups, post: None }))
}

#[post("/new", data = "<form>")]
pub async fn create(
    mut connection: DbConnection,
    user: CurrentUser,
    settings: &State<Settings>,
    mut form: Form<PostForm<'_>>,
) -> RedirectResult {
    let user = user?;
    let draft = form.draft().await?.validate(&mut connection)?;
    let stored = form.store_image(&draft, &settings.media_root).await?;
    if let Err(e) = insert_post(&mut connection, &user, draft) {
        if let Some(path) = stored {
            media::discard(&settings.media_root, &path).await;
        }
        return Err(e);
    }
    Ok(Redirect::to("/"))
}

#[derive(Debug, Serialize)]
pub struct PostPage {
    post: PostView,
    author: Profile<'static>,
    total_posts: i64,
    comments: Vec<CommentView>,
}

#[get("/<username>/<post_id>", rank = 4)]
pub fn view(mut connection: DbConnection, username: &str, post_id: i32) -> ApiResult<PostPage> {
    let author = User::load_by_name(username, &mut connection)?;
    let post = Post::load(&mut connection, &author, post_id)?;
    let total_posts = Post::count_by_author(&mut connection, &author)?;
    let comments = comments_for(&mut connection, &post)?;
    let post = post_view(&mut connection, post)?;
    Ok(Json(PostPage {
        post,
        author: Profile::from(author),
        total_posts,
        comments,
    }))
}

#[get("/<username>/<post_id>/edit", rank = 4)]
pub fn edit(
    mut connection: DbConnection,
    user: CurrentUser,
    username: &str,
    post_id: i32,
) -> Result<PageOrRedirect<PostFormPage>, ApiError> {
    let user = user?;
    let author = User::load_by_name(username, &mut connection)?;
    let post = Post::load(&mut connection, &author, post_id)?;
    if user.id != post.author_id {
        return Ok(Err(Redirect::to(post_url(&author.username, post.id))));
    }
    let groups = Group::all(&mut connection)?;
    let post = post_view(&mut connection, post)?;
    Ok(Ok(Json(PostFormPage {
        groups,
        post: Some(post),
    })))
}

#[post("/<username>/<post_id>/edit", data = "<form>", rank = 4)]
pub async fn update(
    mut connection: DbConnection,
    user: CurrentUser,
    settings: &State<Settings>,
    username: &str,
    post_id: i32,
    mut form: Form<PostForm<'_>>,
) -> RedirectResult {
    let user = user?;
    let author = User::load_by_name(username, &mut connection)?;
    let post = Post::load(&mut connection, &author, post_id)?;
    let target = post_url(&author.username, post.id);
    if ensure_author(&user, &post, "edit").is_err() {
        return Ok(Redirect::to(target));
    }

    let draft = form.draft().await?.validate(&mut connection)?;
    let stored = form.store_image(&draft, &settings.media_root).await?;
    let replaced = match update_post(&mut connection, &user, &post, draft) {
        Ok(_) => stored.and(post.image),
        Err(e) => {
            if let Some(path) = stored {
                media::discard(&settings.media_root, &path).await;
            }
            return Err(e);
        }
    };
    if let Some(old) = replaced {
        media::discard(&settings.media_root, &old).await;
    }
    Ok(Redirect::to(target))
}

#[post("/<username>/<post_id>/delete", rank = 4)]
pub async fn delete(
    mut connection: DbConnection,
    user: CurrentUser,
    settings: &State<Settings>,
    username: &str,
    post_id: i32,
) -> RedirectResult {
    let user = user?;
    let author = User::load_by_name(username, &mut connection)?;
    let post = Post::load(&mut connection, &author, post_id)?;
    match delete_post(&mut connection, &user, &post) {
        Ok(()) => {
            if let Some(image) = &post.image {
                media::discard(&settings.media_root, image).await;
            }
            Ok(Redirect::to(profile_url(&user.username)))
        }
        Err(ApiError::Forbidden) => Ok(Redirect::to(post_url(&author.username, post.id))),
        Err(e) => Err(e),
    }
}
