use axum::{
    extract::{FromRef, State},
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RefreshRequest, RegisterRequest},
        repo_types::{Gender, NewUser, Role, User},
        services::{hash_password, verify_password, JwtKeys},
    },
    customers::{
        repo_types::{ContactInfo, CustomerEvent},
        services::record_event,
    },
    error::{AppError, AppResult},
    state::AppState,
    validation::{check_password, is_valid_email, is_valid_phone, required},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

/// Checks and normalizes the profile part of a registration.
pub(crate) fn new_user_from(
    email: &str,
    password: &str,
    full_name: &str,
    gender: &str,
    phone: &str,
    address: &str,
    role: Role,
) -> AppResult<(NewUser, String)> {
    let email = email.trim().to_lowercase();
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AppError::BadRequest("Invalid email".into()));
    }
    let password = password.trim();
    check_password(password)?;
    let phone = required("phone", phone)?;
    if !is_valid_phone(&phone) {
        return Err(AppError::BadRequest("This is not a phone number".into()));
    }
    let user = NewUser {
        email,
        password_hash: String::new(),
        full_name: required("full_name", full_name)?,
        gender: gender.parse::<Gender>()?,
        phone,
        address: required("address", address)?,
        role,
    };
    Ok((user, password.to_string()))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<Json<AuthResponse>> {
    let (mut new, password) = new_user_from(
        &payload.email,
        &payload.password,
        &payload.full_name,
        &payload.gender,
        &payload.phone,
        &payload.address,
        Role::Customer,
    )?;

    // Ensure email is not taken
    if User::find_by_email(&state.db, &new.email).await?.is_some() {
        warn!(email = %new.email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    new.password_hash = hash_password(&password)?;

    let mut tx = state.db.begin().await?;
    let user = User::create(&mut *tx, &new).await?;
    let contact = ContactInfo {
        email: user.email.clone(),
        full_name: user.full_name.clone(),
        gender: user.gender,
        phone: user.phone.clone(),
        address: user.address.clone(),
    };
    record_event(&mut *tx, &contact, CustomerEvent::SignedUp).await?;
    tx.commit().await?;

    let keys = JwtKeys::from_ref(&state);
    let response = keys.issue(&user)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(Json(response))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::BadRequest("Invalid email".into()));
    }

    let invalid = || AppError::Unauthorized("Invalid credentials".into());

    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(invalid());
        }
    };

    if !verify_password(payload.password.trim(), &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    if !user.active {
        warn!(user_id = %user.id, "login on deactivated account");
        return Err(AppError::Forbidden("Account is deactivated".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let response = keys.issue(&user)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(response))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    // Reload so a role change or deactivation takes effect on refresh.
    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .filter(|u| u.active)
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    Ok(Json(keys.issue(&user)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_is_normalized() {
        let (user, password) = new_user_from(
            "  Anh@Example.COM ",
            "correct-horse ",
            " Anh ",
            "F",
            "0387 897 777",
            " Can Tho ",
            Role::Customer,
        )
        .unwrap();
        assert_eq!(user.email, "anh@example.com");
        assert_eq!(user.full_name, "Anh");
        assert_eq!(user.address, "Can Tho");
        assert_eq!(user.gender, Gender::F);
        assert_eq!(password, "correct-horse");
    }

    #[test]
    fn new_user_rejects_bad_fields() {
        let ok = |email: &str, pwd: &str, gender: &str, phone: &str| {
            new_user_from(email, pwd, "Anh", gender, phone, "Can Tho", Role::Customer)
        };
        assert!(ok("nope", "correct-horse", "F", "0387897777").is_err());
        assert!(ok("a@b.co", "password123", "F", "0387897777").is_err());
        assert!(ok("a@b.co", "correct-horse", "X", "0387897777").is_err());
        assert!(ok("a@b.co", "correct-horse", "F", "12").is_err());
        assert!(ok("a@b.co", "correct-horse", "F", "0387897777").is_ok());
    }
}
