use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::select;
use diesel::SqliteConnection;
use lazy_static::lazy_static;
use regex::Regex;

use crate::types::{ApiError, ValidationError};

lazy_static! {
    static ref EMAIL_RE: Regex = {
        let pattern = r"\A[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\z";
        Regex::new(pattern).unwrap()
    };
    static ref USERNAME_RE: Regex = Regex::new(r"\A[\w.@+-]+\z").unwrap();
}

// First path segments that belong to fixed routes, not profiles.
const RESERVED_USERNAMES: &[&str] = &["new", "follow", "group", "auth", "media"];

pub fn validate_email_re(email: &str) -> Result<(), ValidationError> {
    if !EMAIL_RE.is_match(&email.to_lowercase()) {
        Err(ValidationError::from(
            "email",
            format!("Invalid email: {}", email),
        ))
    } else {
        Ok(())
    }
}

pub fn validate_username_re(username: &str) -> Result<(), ValidationError> {
    if username.chars().count() < 3 {
        Err(ValidationError::from(
            "username",
            format!("username too short: {}", username),
        ))
    } else if RESERVED_USERNAMES.contains(&username.to_lowercase().as_str()) {
        Err(ValidationError::from(
            "username",
            format!("username is reserved: {}", username),
        ))
    } else if !USERNAME_RE.is_match(username) {
        Err(ValidationError::from(
            "username",
            "letters, digits and @/./+/-/_ only",
        ))
    } else {
        Ok(())
    }
}

pub fn validate_username(
    username_to_validate: &str,
    connection: &mut SqliteConnection,
) -> Result<(), ApiError> {
    use crate::db::schema::users::dsl::*;
    let mut errors = ValidationError::default();
    if let Err(e) = validate_username_re(username_to_validate) {
        errors.merge(e);
    }

    let username_exists = select(exists(users.filter(username.eq(username_to_validate))))
        .get_result::<bool>(connection)?;
    if username_exists {
        errors.add_error("username", "username already exists");
    }

    errors.into_result().map_err(|e| e.into())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < 5 {
        Err(ValidationError::from("password", "Password too short"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_addresses() {
        assert!(validate_email_re("connor.s@skynet.com").is_ok());
        assert!(validate_email_re("User1@Mail.com").is_ok());
    }

    #[test]
    fn rejects_malformed_addresses() {
        let err = validate_email_re("not-an-email").unwrap_err();
        assert!(err.has_field("email"));
    }

    #[test]
    fn usernames_need_three_safe_characters() {
        assert!(validate_username_re("sarah").is_ok());
        assert!(validate_username_re("ab").is_err());
        assert!(validate_username_re("two words").is_err());
        // a slash would break profile routes
        assert!(validate_username_re("a/b/c").is_err());
        assert!(validate_username_re("follow").is_err());
    }

    #[test]
    fn passwords_need_five_characters() {
        assert!(validate_password("1234").is_err());
        assert!(validate_password("12345").is_ok());
    }
}
