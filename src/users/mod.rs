use diesel::insert_into;
use diesel::prelude::*;
use rocket::form::Form;
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest};
use rocket::serde::json::Json;
use rocket::Request;
use serde::Serialize;
use serde_json::{json, Value};

use crate::db::DbConnection;
use crate::types::{ApiError, ApiResult, Validate, ValidationError};

pub mod models;
mod utils;

pub use self::models::User;
use self::utils::*;

/// The authenticated principal of a request, or why there is none.
pub type CurrentUser = Result<models::User, ApiError>;

#[derive(Debug, FromForm)]
pub struct Registration {
    username: String,
    email: String,
    password: String,
    #[field(default = String::new())]
    first_name: String,
    #[field(default = String::new())]
    last_name: String,
}

impl Registration {
    pub fn new(username: &str, email: &str, password: &str) -> Registration {
        Registration {
            username: username.to_owned(),
            email: email.to_owned(),
            password: password.to_owned(),
            first_name: String::new(),
            last_name: String::new(),
        }
    }
}

impl Validate for Registration {
    type Error = ApiError;
    fn validate(self, connection: &mut SqliteConnection) -> Result<Self, Self::Error> {
        let mut errors = ValidationError::default();

        match validate_username(&self.username, connection) {
            Ok(_) => {}
            Err(ApiError::Validation(e)) => errors.merge(e),
            Err(other) => return Err(other),
        }

        if let Err(e) = validate_email_re(&self.email) {
            errors.merge(e);
        }

        if let Err(e) = validate_password(&self.password) {
            errors.merge(e);
        }

        errors.into_result()?;
        Ok(self)
    }
}

/// Creates an account with a hashed password.
pub fn register(connection: &mut SqliteConnection, registration: Registration) -> Result<User, ApiError> {
    use crate::db::schema::users::dsl::*;

    let registration = registration.validate(connection)?;
    let new_user = models::NewUser {
        password_hash: models::User::make_password(&registration.password)?,
        username: registration.username,
        email: registration.email,
        first_name: registration.first_name,
        last_name: registration.last_name,
    };

    let user = insert_into(users)
        .values(&new_user)
        .get_result::<models::User>(connection)?;
    tracing::info!("registered user {} (#{})", user.username, user.id);
    Ok(user)
}

/// Checks credentials and issues a token for the account.
pub fn login(
    connection: &mut SqliteConnection,
    name: &str,
    password: &str,
) -> Result<(User, String), ApiError> {
    use crate::db::schema::users::dsl::*;

    let user = users
        .filter(username.eq(name))
        .first::<models::User>(connection)
        .optional()?;
    match user {
        Some(user) if user.verify_password(password)? => {
            let token = user.token()?;
            Ok((user, token))
        }
        _ => {
            tracing::warn!("failed login for {}", name);
            Err(ValidationError::from("password", "Invalid username or password").into())
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for models::User {
    type Error = ApiError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let token = match request.headers().get_one("Authorization") {
            Some(header) => header.trim_start_matches("Token ").trim().to_owned(),
            None => return Outcome::Error((Status::Unauthorized, ApiError::Unauthorized)),
        };
        let mut connection = match request.guard::<DbConnection>().await {
            Outcome::Success(connection) => connection,
            _ => return Outcome::Error((Status::ServiceUnavailable, ApiError::Internal)),
        };
        match models::User::load_from_token(&token, &mut connection) {
            Ok(user) => Outcome::Success(user),
            Err(ApiError::Unauthorized) => {
                Outcome::Error((Status::Unauthorized, ApiError::Unauthorized))
            }
            Err(e) => Outcome::Error((Status::InternalServerError, e)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginPage {
    next: String,
}

#[get("/login?<next>")]
pub fn login_page(next: Option<String>) -> Json<LoginPage> {
    Json(LoginPage {
        next: next.unwrap_or_else(|| "/".to_owned()),
    })
}

#[derive(Debug, FromForm)]
pub struct Credentials {
    username: String,
    password: String,
}

#[post("/login", data = "<credentials>")]
pub fn authenticate(mut connection: DbConnection, credentials: Form<Credentials>) -> ApiResult<Value> {
    let (user, token) = login(&mut connection, &credentials.username, &credentials.password)?;
    Ok(Json(json!({ "user": user, "token": token })))
}

#[post("/signup", data = "<registration>")]
pub fn signup(mut connection: DbConnection, registration: Form<Registration>) -> ApiResult<Value> {
    let user = register(&mut connection, registration.into_inner())?;
    let token = user.token()?;
    Ok(Json(json!({ "user": user, "token": token })))
}
