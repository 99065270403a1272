use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    routing::{get, patch, put},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{CreateUserRequest, UpdateAccessRequest, UpdateProfileRequest, UserQuery};
use super::services::{avatar_url, remove_avatar, replace_avatar};
use crate::{
    auth::{
        handlers::new_user_from,
        repo_types::{Gender, Role, User},
        services::{hash_password, AuthUser},
    },
    error::{AppError, AppResult},
    state::AppState,
    storage::ImageType,
    validation::{is_valid_phone, required},
};

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).patch(update_me))
        .route(
            "/me/avatar",
            put(upload_avatar)
                .get(get_avatar)
                .delete(delete_avatar)
                .layer(DefaultBodyLimit::max(5 * 1024 * 1024)), // 5MB
        )
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", patch(update_access))
}

async fn load_me(state: &AppState, auth: &AuthUser) -> AppResult<User> {
    User::find_by_id(&state.db, auth.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))
}

#[instrument(skip(state))]
pub async fn get_me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<User>> {
    Ok(Json(load_me(&state, &auth).await?))
}

#[instrument(skip(state, body))]
pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<UpdateProfileRequest>,
) -> AppResult<Json<User>> {
    let me = load_me(&state, &auth).await?;

    let full_name = match body.full_name.as_deref() {
        Some(v) => required("full_name", v)?,
        None => me.full_name,
    };
    let gender = match body.gender.as_deref() {
        Some(v) => v.parse::<Gender>()?,
        None => me.gender,
    };
    let phone = match body.phone.as_deref() {
        Some(v) => {
            let v = required("phone", v)?;
            if !is_valid_phone(&v) {
                return Err(AppError::BadRequest("This is not a phone number".into()));
            }
            v
        }
        None => me.phone,
    };
    let address = match body.address.as_deref() {
        Some(v) => required("address", v)?,
        None => me.address,
    };

    let user = User::update_profile(&state.db, me.id, &full_name, gender, &phone, &address).await?;
    info!(user_id = %user.id, "profile updated");
    Ok(Json(user))
}

#[instrument(skip(state, headers, body))]
pub async fn upload_avatar(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<StatusCode> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");
    let Some(image) = ImageType::from_content_type(content_type) else {
        warn!(%content_type, "rejected avatar type");
        return Err(AppError::BadRequest("Avatar must be a jpeg, png, webp or gif image".into()));
    };
    if body.is_empty() {
        return Err(AppError::BadRequest("Avatar body is empty".into()));
    }

    let me = load_me(&state, &auth).await?;
    let key = replace_avatar(&state, &me, body, image).await?;
    info!(user_id = %me.id, %key, "avatar uploaded");
    Ok(StatusCode::NO_CONTENT)
}

/// 307 to a short-lived presigned URL of the avatar.
#[instrument(skip(state))]
pub async fn get_avatar(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<impl IntoResponse> {
    let me = load_me(&state, &auth).await?;
    let key = me
        .avatar_key
        .ok_or_else(|| AppError::NotFound("Avatar not found".into()))?;
    let url = avatar_url(&state, &key).await?;
    Ok(Redirect::temporary(&url))
}

#[instrument(skip(state))]
pub async fn delete_avatar(State(state): State<AppState>, auth: AuthUser) -> AppResult<StatusCode> {
    let me = load_me(&state, &auth).await?;
    remove_avatar(&state, &me).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<UserQuery>,
) -> AppResult<Json<Vec<User>>> {
    auth.require(Role::Admin)?;
    let role = q.role.as_deref().map(str::parse::<Role>).transpose()?;
    Ok(Json(User::list(&state.db, role).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    auth.require(Role::Admin)?;
    let role: Role = payload.role.parse()?;
    let (mut new, password) = new_user_from(
        &payload.email,
        &payload.password,
        &payload.full_name,
        &payload.gender,
        &payload.phone,
        &payload.address,
        role,
    )?;

    if User::find_by_email(&state.db, &new.email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".into()));
    }
    new.password_hash = hash_password(&password)?;

    let user = User::create(&state.db, &new).await?;
    info!(user_id = %user.id, %role, by = %auth.id, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, body))]
pub async fn update_access(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateAccessRequest>,
) -> AppResult<Json<User>> {
    auth.require(Role::Admin)?;
    if id == auth.id {
        return Err(AppError::BadRequest("Cannot change your own access".into()));
    }
    let role = body.role.as_deref().map(str::parse::<Role>).transpose()?;
    let user = User::update_access(&state.db, id, body.active, role)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    info!(user_id = %user.id, active = user.active, role = %user.role, by = %auth.id, "user access updated");
    Ok(Json(user))
}
