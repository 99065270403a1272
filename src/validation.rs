use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::AppError;

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Accepts an optional leading `+` and 8 to 15 digits; spaces, dots and
/// dashes between digits are ignored.
pub fn is_valid_phone(phone: &str) -> bool {
    lazy_static! {
        static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9]{8,15}$").unwrap();
    }
    let compact: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.'))
        .collect();
    PHONE_RE.is_match(&compact)
}

pub fn check_password(password: &str) -> Result<(), AppError> {
    if password.len() < 8 {
        return Err(AppError::BadRequest("Password too short".into()));
    }
    if password.to_lowercase().contains("password") {
        return Err(AppError::BadRequest(
            "Password cannot contain the word \"password\"".into(),
        ));
    }
    Ok(())
}

/// Trims a required text field, rejecting it when nothing is left.
pub fn required(field: &str, value: &str) -> Result<String, AppError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(AppError::BadRequest(format!("{} is required", field)));
    }
    Ok(v.to_string())
}

/// Rejects a partial-update body carrying any key outside `allowed`.
pub fn check_update_keys(body: &Map<String, Value>, allowed: &[&str]) -> Result<(), AppError> {
    if body.keys().all(|k| allowed.contains(&k.as_str())) {
        Ok(())
    } else {
        Err(AppError::BadRequest("Invalid updates".into()))
    }
}
