use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{AddItemRequest, CheckoutRequest, UpdateItemRequest};
use super::repo_types::Cart;
use super::services;
use crate::{
    auth::{
        repo_types::{Role, User},
        services::AuthUser,
    },
    error::{AppError, AppResult},
    orders::repo_types::OrderAggregate,
    state::AppState,
};

pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(get_cart))
        .route("/cart/items", post(add_item))
        .route("/cart/items/:id", patch(update_item).delete(remove_item))
        .route("/cart/empty", delete(empty_cart))
        .route("/cart/checkout", post(checkout))
}

#[instrument(skip(state))]
pub async fn get_cart(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Cart>> {
    auth.require(Role::Customer)?;
    Ok(Json(services::get(&state.db, auth.id).await?))
}

#[instrument(skip(state))]
pub async fn add_item(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<AddItemRequest>,
) -> AppResult<Json<Cart>> {
    auth.require(Role::Customer)?;
    if body.quantity < 1 {
        return Err(AppError::BadRequest("quantity must be at least 1".into()));
    }
    let cart = services::add_item(&state.db, auth.id, body.product_id, body.quantity).await?;
    Ok(Json(cart))
}

#[instrument(skip(state))]
pub async fn update_item(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateItemRequest>,
) -> AppResult<Json<Cart>> {
    auth.require(Role::Customer)?;
    if body.quantity < 1 {
        return Err(AppError::BadRequest("quantity must be at least 1".into()));
    }
    Ok(Json(services::update_item(&state.db, auth.id, id, body.quantity).await?))
}

#[instrument(skip(state))]
pub async fn remove_item(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Cart>> {
    auth.require(Role::Customer)?;
    Ok(Json(services::remove_item(&state.db, auth.id, id).await?))
}

#[instrument(skip(state))]
pub async fn empty_cart(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Cart>> {
    auth.require(Role::Customer)?;
    Ok(Json(services::empty(&state.db, auth.id).await?))
}

#[instrument(skip(state, body))]
pub async fn checkout(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CheckoutRequest>,
) -> AppResult<(StatusCode, Json<OrderAggregate>)> {
    auth.require(Role::Customer)?;
    let buyer = User::find_by_id(&state.db, auth.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    let contact = body.into_contact(&buyer).validate()?;
    let order = services::checkout(&state.db, &buyer, contact).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::services::JwtKeys;
    use axum::{
        body::Body,
        extract::FromRef,
        http::{header, Method, Request},
    };
    use tower::ServiceExt;

    fn request(method: Method, uri: &str, token: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    #[tokio::test]
    async fn cart_is_for_customers() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let app = cart_routes().with_state(state);

        let res = app
            .clone()
            .oneshot(request(Method::GET, "/cart", None, None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let admin = keys.sign_access(Uuid::new_v4(), Role::Admin).unwrap();
        let res = app
            .oneshot(request(Method::DELETE, "/cart/empty", Some(&admin), None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let app = cart_routes().with_state(state);
        let customer = keys.sign_access(Uuid::new_v4(), Role::Customer).unwrap();

        let res = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/cart/items",
                Some(&customer),
                Some(serde_json::json!({ "product_id": Uuid::new_v4(), "quantity": 0 })),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let uri = format!("/cart/items/{}", Uuid::new_v4());
        let res = app
            .oneshot(request(
                Method::PATCH,
                &uri,
                Some(&customer),
                Some(serde_json::json!({ "quantity": -2 })),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
