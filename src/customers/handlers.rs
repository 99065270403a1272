use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{CustomerList, CustomerQuery, UpdateCustomerRequest};
use super::repo;
use super::repo_types::{Customer, CustomerStatus};
use crate::{
    auth::{repo_types::Role, services::AuthUser},
    error::{AppError, AppResult},
    paging,
    state::AppState,
};

pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/customers", get(list_customers))
        .route("/customers/:id", get(get_customer).patch(update_customer))
}

#[instrument(skip(state))]
pub async fn list_customers(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<CustomerQuery>,
) -> AppResult<Json<CustomerList>> {
    auth.require(Role::SaleManager)?;
    let status = q
        .status
        .as_deref()
        .map(str::parse::<CustomerStatus>)
        .transpose()?;
    let w = paging::window(q.limit, q.page)?;

    let customers = repo::list(&state.db, status, w.limit, w.offset).await?;
    let count = repo::count(&state.db, status).await?;
    Ok(Json(CustomerList { customers, count }))
}

#[instrument(skip(state))]
pub async fn get_customer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Customer>> {
    auth.require(Role::SaleManager)?;
    repo::find_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Customer not found".into()))
}

#[instrument(skip(state, body))]
pub async fn update_customer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateCustomerRequest>,
) -> AppResult<Json<Customer>> {
    auth.require(Role::SaleManager)?;
    let status: CustomerStatus = body.status.parse()?;
    let customer = repo::update_status(&state.db, id, status, auth.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer not found".into()))?;
    info!(customer_id = %id, %status, by = %auth.id, "customer status set");
    Ok(Json(customer))
}
