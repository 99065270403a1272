use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{Map, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{GuestCheckoutRequest, ManagerPatch, OrderList, SalerPatch};
use super::query::{self, OrderListQuery, OrderSearchQuery};
use super::repo::{self, Scope};
use super::repo_types::{OrderAggregate, OrderDetails, OrderStatus, OrderSummary};
use super::services::{self, NewOrder, OrderLine, OrderPatch};
use crate::{
    auth::{dto::PublicUser, repo_types::{Role, User}, services::AuthUser},
    error::{AppError, AppResult},
    state::AppState,
    validation::check_update_keys,
};

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders/me", get(my_orders))
        .route("/orders/me/:id", get(my_order).delete(cancel_my_order))
        .route("/orders/guest", post(guest_checkout))
        .route("/orders/guest/:id", get(guest_order))
        .route("/orders/saleManager", get(manager_orders))
        .route("/orders/saleManager/search", post(manager_search))
        .route("/orders/saleManager/salers", get(active_salers))
        .route(
            "/orders/saleManager/:id",
            get(manager_order).patch(manager_update),
        )
        .route("/orders/saler", get(saler_orders))
        .route("/orders/saler/search", post(saler_search))
        .route("/orders/saler/:id", get(saler_order).patch(saler_update))
}

/// Parses a PATCH body restricted to `allowed` keys.
fn patch_body<T: serde::de::DeserializeOwned>(body: Map<String, Value>, allowed: &[&str]) -> AppResult<T> {
    check_update_keys(&body, allowed)?;
    serde_json::from_value(Value::Object(body)).map_err(|e| AppError::BadRequest(e.to_string()))
}

fn parse_status(raw: Option<&str>) -> AppResult<Option<OrderStatus>> {
    Ok(raw.map(str::parse::<OrderStatus>).transpose()?)
}

async fn list_orders(state: &AppState, q: OrderListQuery, saler: Option<Uuid>) -> AppResult<OrderList> {
    let (filter, sort, window) = q.into_parts(saler)?;
    let orders = query::list(&state.db, &filter, sort, window).await?;
    let count = query::count(&state.db, &filter).await?;
    Ok(OrderList { orders, count })
}

async fn search_orders(state: &AppState, q: OrderSearchQuery, saler: Option<Uuid>) -> AppResult<OrderList> {
    let Some((filter, window)) = q.into_parts(saler)? else {
        return Ok(OrderList::empty());
    };
    let orders = query::list(&state.db, &filter, query::Sort::default(), window).await?;
    let count = query::count(&state.db, &filter).await?;
    Ok(OrderList { orders, count })
}

// Owner

#[instrument(skip(state))]
pub async fn my_orders(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<OrderSummary>>> {
    auth.require(Role::Customer)?;
    Ok(Json(repo::list_by_owner(&state.db, auth.id).await?))
}

#[instrument(skip(state))]
pub async fn my_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<OrderDetails>> {
    auth.require(Role::Customer)?;
    Ok(Json(services::details(&state.db, id, Scope::Owner(auth.id)).await?))
}

#[instrument(skip(state))]
pub async fn cancel_my_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<OrderAggregate>> {
    auth.require(Role::Customer)?;
    Ok(Json(services::cancel_by_owner(&state.db, id, auth.id).await?))
}

// Guest

#[instrument(skip(state, body))]
pub async fn guest_checkout(
    State(state): State<AppState>,
    Json(body): Json<GuestCheckoutRequest>,
) -> AppResult<(StatusCode, Json<OrderAggregate>)> {
    let contact = body.contact.validate()?;
    let lines = body
        .items
        .into_iter()
        .map(|l| OrderLine {
            product_id: l.product_id,
            quantity: l.quantity,
            title: None,
            amount: None,
        })
        .collect();

    let mut tx = state.db.begin().await?;
    let order = services::place_order(
        &mut *tx,
        NewOrder {
            contact,
            owner_id: None,
            lines,
        },
    )
    .await?;
    tx.commit().await?;
    info!(order_id = %order.order.id, "guest order placed");
    Ok((StatusCode::CREATED, Json(order)))
}

#[instrument(skip(state))]
pub async fn guest_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<OrderDetails>> {
    Ok(Json(services::details(&state.db, id, Scope::Any).await?))
}

// Sale manager

#[instrument(skip(state))]
pub async fn manager_orders(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<OrderListQuery>,
) -> AppResult<Json<OrderList>> {
    auth.require(Role::SaleManager)?;
    Ok(Json(list_orders(&state, q, None).await?))
}

#[instrument(skip(state))]
pub async fn manager_search(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<OrderSearchQuery>,
) -> AppResult<Json<OrderList>> {
    auth.require(Role::SaleManager)?;
    Ok(Json(search_orders(&state, q, None).await?))
}

#[instrument(skip(state))]
pub async fn active_salers(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<PublicUser>>> {
    auth.require(Role::SaleManager)?;
    let salers = User::list_active_salers(&state.db).await?;
    Ok(Json(salers.iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state))]
pub async fn manager_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<OrderDetails>> {
    auth.require(Role::SaleManager)?;
    Ok(Json(services::details(&state.db, id, Scope::Any).await?))
}

#[instrument(skip(state, body))]
pub async fn manager_update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<Map<String, Value>>,
) -> AppResult<Json<OrderAggregate>> {
    auth.require(Role::SaleManager)?;
    let patch: ManagerPatch = patch_body(body, &["status", "saler"])?;
    let patch = OrderPatch {
        status: parse_status(patch.status.as_deref())?,
        saler: patch.saler,
    };
    Ok(Json(services::change_order(&state.db, id, Scope::Any, patch).await?))
}

// Saler

#[instrument(skip(state))]
pub async fn saler_orders(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(mut q): Query<OrderListQuery>,
) -> AppResult<Json<OrderList>> {
    auth.require(Role::Saler)?;
    q.sale_name = None;
    Ok(Json(list_orders(&state, q, Some(auth.id)).await?))
}

#[instrument(skip(state))]
pub async fn saler_search(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<OrderSearchQuery>,
) -> AppResult<Json<OrderList>> {
    auth.require(Role::Saler)?;
    Ok(Json(search_orders(&state, q, Some(auth.id)).await?))
}

#[instrument(skip(state))]
pub async fn saler_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<OrderDetails>> {
    auth.require(Role::Saler)?;
    Ok(Json(services::details(&state.db, id, Scope::Saler(auth.id)).await?))
}

#[instrument(skip(state, body))]
pub async fn saler_update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<Map<String, Value>>,
) -> AppResult<Json<OrderAggregate>> {
    auth.require(Role::Saler)?;
    let patch: SalerPatch = patch_body(body, &["status"])?;
    let patch = OrderPatch {
        status: parse_status(patch.status.as_deref())?,
        saler: None,
    };
    Ok(Json(services::change_order(&state.db, id, Scope::Saler(auth.id), patch).await?))
}
