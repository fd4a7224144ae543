#![allow(dead_code)]

use diesel::r2d2::ConnectionManager;
use diesel::SqliteConnection;
use image::{DynamicImage, ImageOutputFormat};
use rocket::http::{ContentType, Header, Status};
use rocket::local::blocking::{Client, LocalResponse};
use serde_json::Value;
use std::io::Cursor;
use tempfile::TempDir;

use yatube::cache::PageCache;
use yatube::db::Pool;
use yatube::group::{create_group, Group};
use yatube::post::{create_post, PostDraft};
use yatube::users::{register, Registration, User};

pub const BOUNDARY: &str = "yatube-test-boundary";

pub struct TestApp {
    pub client: Client,
    pub dir: TempDir,
}

impl TestApp {
    pub fn new() -> TestApp {
        TestApp::with_cache_ttl(0)
    }

    pub fn with_cache_ttl(ttl: u64) -> TestApp {
        let dir = tempfile::tempdir().expect("temp dir");
        let database_url = dir
            .path()
            .join("test.sqlite3")
            .to_string_lossy()
            .into_owned();
        let figment = rocket::Config::figment()
            .merge(("database_url", database_url))
            .merge(("media_root", dir.path().join("media")))
            .merge(("cache_ttl", ttl))
            .merge(("page_size", 10))
            .merge(("log_level", "off"));
        let rocket = yatube::build(figment).expect("valid rocket");
        let client = Client::untracked(rocket).expect("valid client");
        TestApp { client, dir }
    }

    pub fn conn(&self) -> r2d2::PooledConnection<ConnectionManager<SqliteConnection>> {
        self.client
            .rocket()
            .state::<Pool>()
            .expect("managed pool")
            .get()
            .expect("connection")
    }

    pub fn cache(&self) -> &PageCache {
        self.client
            .rocket()
            .state::<PageCache>()
            .expect("managed page cache")
    }

    pub fn user(&self, name: &str) -> User {
        let registration = Registration::new(name, &format!("{}@mail.com", name), "12345-password");
        register(&mut self.conn(), registration).expect("registered user")
    }

    pub fn group(&self, title: &str, slug: &str) -> Group {
        create_group(&mut self.conn(), title, Some(slug), "testing group").expect("group")
    }

    pub fn publish(&self, author: &User, text: &str) -> yatube::post::Post {
        create_post(&mut self.conn(), author, PostDraft::new(text)).expect("post")
    }

    pub fn get(&self, path: &str, user: Option<&User>) -> LocalResponse<'_> {
        let mut request = self.client.get(path.to_owned());
        if let Some(user) = user {
            request = request.header(auth(user));
        }
        request.dispatch()
    }

    pub fn get_json(&self, path: &str, user: Option<&User>) -> Value {
        let response = self.get(path, user);
        assert_eq!(response.status(), Status::Ok, "GET {}", path);
        response.into_json::<Value>().expect("json body")
    }

    pub fn post_form(&self, path: &str, fields: &[(&str, &str)], user: Option<&User>) -> LocalResponse<'_> {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let mut request = self
            .client
            .post(path.to_owned())
            .header(ContentType::Form)
            .body(body);
        if let Some(user) = user {
            request = request.header(auth(user));
        }
        request.dispatch()
    }

    pub fn post_multipart(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        file: (&str, &str, &[u8]),
        user: &User,
    ) -> LocalResponse<'_> {
        self.client
            .post(path.to_owned())
            .header(ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY)))
            .header(auth(user))
            .body(multipart_body(fields, file))
            .dispatch()
    }
}

pub fn auth(user: &User) -> Header<'static> {
    Header::new("Authorization", format!("Token {}", user.token().expect("token")))
}

/// `file` is `(filename, content type, bytes)` for the `image` field.
pub fn multipart_body(fields: &[(&str, &str)], file: (&str, &str, &[u8])) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    let (filename, content_type, bytes) = file;
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            BOUNDARY, filename, content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn location<'a>(response: &'a LocalResponse<'_>) -> &'a str {
    response.headers().get_one("Location").unwrap_or("")
}

pub fn texts(page: &Value) -> Vec<String> {
    page["page"]["object_list"]
        .as_array()
        .expect("object list")
        .iter()
        .map(|post| post["text"].as_str().unwrap_or_default().to_owned())
        .collect()
}

/// A small PNG that decodes.
pub fn png() -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::new_rgba8(2, 2)
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .expect("png");
    bytes
}
