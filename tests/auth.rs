mod common;

use common::*;
use rocket::http::{Header, Status};
use serde_json::Value;

#[test]
fn signup_issues_a_working_token() {
    let app = TestApp::new();

    let response = app.post_form(
        "/auth/signup/",
        &[
            ("username", "sarah"),
            ("email", "connor.s@skynet.com"),
            ("password", "12345"),
            ("first_name", "Sarah"),
            ("last_name", "Connor"),
        ],
        None,
    );
    assert_eq!(response.status(), Status::Ok);
    let body = response.into_json::<Value>().unwrap();
    assert_eq!(body["user"]["username"], "sarah");
    assert!(body["user"].get("password_hash").is_none());
    let token = body["token"].as_str().unwrap().to_owned();

    let response = app
        .client
        .get("/new/")
        .header(Header::new("Authorization", format!("Token {}", token)))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
}

#[test]
fn signup_reports_every_bad_field() {
    let app = TestApp::new();
    app.user("sarah");

    let response = app.post_form(
        "/auth/signup/",
        &[("username", "sarah"), ("email", "nope"), ("password", "123")],
        None,
    );
    assert_eq!(response.status(), Status::UnprocessableEntity);
    let body = response.into_json::<Value>().unwrap();
    for field in ["username", "email", "password"] {
        assert!(body["errors"][field].is_array(), "missing error for {}", field);
    }
}

#[test]
fn login_checks_the_password() {
    let app = TestApp::new();
    app.user("sarah");

    let response = app.post_form(
        "/auth/login/",
        &[("username", "sarah"), ("password", "12345-password")],
        None,
    );
    assert_eq!(response.status(), Status::Ok);
    let body = response.into_json::<Value>().unwrap();
    assert!(body["token"].is_string());

    let response = app.post_form(
        "/auth/login/",
        &[("username", "sarah"), ("password", "wrong")],
        None,
    );
    assert_eq!(response.status(), Status::UnprocessableEntity);
}

#[test]
fn forged_tokens_are_treated_as_anonymous() {
    let app = TestApp::new();
    app.user("sarah");

    let response = app
        .client
        .get("/new/")
        .header(Header::new("Authorization", "Token not.a.jwt"))
        .dispatch();
    assert_eq!(response.status(), Status::SeeOther);
    assert!(location(&response).starts_with("/auth/login/"));
}

#[test]
fn login_page_remembers_next() {
    let app = TestApp::new();
    let page = app.get_json("/auth/login/?next=/new/", None);
    assert_eq!(page["next"], "/new/");
}
