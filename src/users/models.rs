use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use diesel::prelude::*;
use hmac::{Hmac, Mac};
use jwt::{Header, RegisteredClaims, SignWithKey, Token, Unverified, VerifyWithKey};
use serde::Serialize;
use sha2::Sha256;

use crate::db::schema::users;
use crate::types::ApiError;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, PartialEq)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

impl User {
    pub fn make_password(password: &str) -> Result<String, ApiError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                tracing::error!("failed to hash password: {}", e);
                ApiError::Internal
            })
    }

    pub fn verify_password(&self, password_to_verify: &str) -> Result<bool, ApiError> {
        let parsed = PasswordHash::new(&self.password_hash).map_err(|_| ApiError::Internal)?;
        Ok(Argon2::default()
            .verify_password(password_to_verify.as_bytes(), &parsed)
            .is_ok())
    }

    // Tokens are keyed by the password hash, so a new password revokes them.
    fn signing_key(&self) -> Result<Hmac<Sha256>, ApiError> {
        Hmac::new_from_slice(self.password_hash.as_bytes()).map_err(|_| ApiError::Internal)
    }

    pub fn token(&self) -> Result<String, ApiError> {
        let claims = RegisteredClaims {
            issuer: Some(self.email.clone()),
            subject: Some(self.id.to_string()),
            ..Default::default()
        };
        claims
            .sign_with_key(&self.signing_key()?)
            .map_err(|_| ApiError::Internal)
    }

    pub fn load_from_token(jwt_token: &str, connection: &mut SqliteConnection) -> Result<User, ApiError> {
        use crate::db::schema::users::dsl::*;

        let unverified: Token<Header, RegisteredClaims, Unverified<'_>> =
            Token::parse_unverified(jwt_token).map_err(|_| ApiError::Unauthorized)?;
        let claims = unverified.claims();
        let user_id = claims
            .subject
            .as_ref()
            .and_then(|sub| sub.parse::<i32>().ok())
            .ok_or(ApiError::Unauthorized)?;
        let user_email = claims.issuer.clone().ok_or(ApiError::Unauthorized)?;

        let user = users
            .filter(id.eq(user_id))
            .filter(email.eq(&user_email))
            .get_result::<User>(connection)
            .optional()?
            .ok_or(ApiError::Unauthorized)?;

        let _verified: Token<Header, RegisteredClaims, _> = unverified
            .verify_with_key(&user.signing_key()?)
            .map_err(|_| ApiError::Unauthorized)?;
        Ok(user)
    }

    pub fn load_by_name(name: &str, connection: &mut SqliteConnection) -> Result<User, ApiError> {
        use crate::db::schema::users::dsl::*;
        users
            .filter(username.eq(name))
            .get_result::<User>(connection)
            .map_err(|e| e.into())
    }
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
}
