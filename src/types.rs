use diesel::result::Error as DieselError;
use diesel::SqliteConnection;
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Redirect, Responder};
use rocket::serde::json::Json;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::io::Error as IoError;

use crate::utils::{login_url, try_respond};

pub trait Validate
where
    Self: Sized,
{
    type Error;
    fn validate(self, connection: &mut SqliteConnection) -> Result<Self, Self::Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("database error: {0}")]
    Diesel(#[from] DieselError),
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("io error: {0}")]
    Io(#[from] IoError),
    #[error("internal error")]
    Internal,
    #[error("authentication required")]
    Unauthorized,
    #[error("only the author may do that")]
    Forbidden,
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

pub type RedirectResult = Result<Redirect, ApiError>;

/// A page context, or a redirect when the viewer may not see it.
pub type PageOrRedirect<T> = Result<Json<T>, Redirect>;

#[derive(Debug, Serialize, Default, PartialEq)]
pub struct ValidationError(HashMap<String, Vec<String>>);

impl ValidationError {
    pub fn add_error<K: Into<String>, V: Into<String>>(&mut self, key: K, val: V) {
        let entry = self.0.entry(key.into()).or_default();
        entry.push(val.into());
    }

    pub fn from<K: Into<String>, V: Into<String>>(key: K, val: V) -> Self {
        let mut error = ValidationError::default();
        error.add_error(key, val);
        error
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: ValidationError) {
        for (key, errors) in other.0.into_iter() {
            let entry = self.0.entry(key).or_default();
            entry.extend(errors);
        }
    }

    pub fn empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// `Ok(())` when nothing was recorded, the collected errors otherwise.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields = self.0.keys().map(String::as_str).collect::<Vec<_>>();
        fields.sort_unstable();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

impl std::error::Error for ValidationError {}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        match self {
            ApiError::Diesel(error) => match error {
                DieselError::NotFound => Err(Status::NotFound),
                other => {
                    tracing::error!("{} {}: {}", req.method(), req.uri(), other);
                    Err(Status::InternalServerError)
                }
            },

            ApiError::Validation(error) => {
                let body = json!({ "errors": error });
                try_respond(req, &body, Status::UnprocessableEntity)
            }

            ApiError::Unauthorized => Redirect::to(login_url(req.uri().path().as_str())).respond_to(req),

            ApiError::Forbidden => Err(Status::Forbidden),

            other => {
                tracing::error!("{} {}: {}", req.method(), req.uri(), other);
                Err(Status::InternalServerError)
            }
        }
    }
}
