mod common;

use common::*;
use diesel::prelude::*;
use rocket::http::Status;

use yatube::comment::add_comment;
use yatube::db::schema::comments;
use yatube::types::ApiError;

fn comment_texts(app: &TestApp, post_id: i32) -> Vec<String> {
    comments::table
        .filter(comments::post_id.eq(post_id))
        .order(comments::id.asc())
        .select(comments::text)
        .load(&mut *app.conn())
        .unwrap()
}

#[test]
fn authorized_user_comments_posts() {
    let app = TestApp::new();
    let sarah = app.user("sarah");
    let user1 = app.user("user1");
    let post = app.publish(&sarah, "Testing post.");

    let url = format!("/sarah/{}/comment/", post.id);
    let response = app.post_form(&url, &[("text", "new comment")], Some(&user1));
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(location(&response), format!("/sarah/{}/", post.id));
    assert_eq!(comment_texts(&app, post.id), vec!["new comment".to_owned()]);

    app.post_form(&url, &[("text", "second")], Some(&sarah));
    let detail = app.get_json(&format!("/sarah/{}/", post.id), None);
    let shown = detail["comments"].as_array().unwrap();
    assert_eq!(shown.len(), 2);
    assert_eq!(shown[0]["text"], "new comment");
    assert_eq!(shown[0]["author"]["username"], "user1");
    assert_eq!(shown[1]["text"], "second");
}

#[test]
fn anonymous_comment_is_redirected_to_login() {
    let app = TestApp::new();
    let sarah = app.user("sarah");
    let post = app.publish(&sarah, "Testing post.");

    let response = app.post_form(&format!("/sarah/{}/comment/", post.id), &[("text", "drive-by")], None);
    assert_eq!(response.status(), Status::SeeOther);
    assert!(location(&response).starts_with("/auth/login/"));
    assert!(comment_texts(&app, post.id).is_empty());
}

#[test]
fn blank_comment_is_dropped() {
    let app = TestApp::new();
    let sarah = app.user("sarah");
    let post = app.publish(&sarah, "Testing post.");

    let response = app.post_form(&format!("/sarah/{}/comment/", post.id), &[("text", "")], Some(&sarah));
    assert_eq!(response.status(), Status::SeeOther);
    assert!(comment_texts(&app, post.id).is_empty());

    let err = add_comment(&mut app.conn(), &sarah, &post, "  ").unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
}

#[test]
fn commenting_on_missing_post_is_not_found() {
    let app = TestApp::new();
    let sarah = app.user("sarah");

    let response = app.post_form("/sarah/999/comment/", &[("text", "hello")], Some(&sarah));
    assert_eq!(response.status(), Status::NotFound);
}
