use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{
    check_price, check_stock, CreateProductRequest, ProductList, ProductQuery,
    UpdateProductRequest,
};
use super::repo;
use super::repo_types::Product;
use crate::{
    auth::{repo_types::Role, services::AuthUser},
    error::{AppError, AppResult},
    paging,
    state::AppState,
    validation::required,
};

const EDITORS: &[Role] = &[Role::Admin, Role::SaleManager];

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/:id", get(get_product).patch(update_product))
}

#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    Query(q): Query<ProductQuery>,
) -> AppResult<Json<ProductList>> {
    let w = paging::window(q.limit, q.page)?;
    let search = q.q.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let products = repo::list(&state.db, search, w.limit, w.offset).await?;
    let count = repo::count(&state.db, search).await?;
    Ok(Json(ProductList { products, count }))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    repo::find_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Product not found".into()))
}

#[instrument(skip(state, body))]
pub async fn create_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<Product>)> {
    auth.require_any(EDITORS)?;
    let title = required("title", &body.title)?;
    let product = repo::create(
        &state.db,
        &title,
        body.description.as_deref().map(str::trim),
        check_price(body.sale_price)?,
        check_stock(body.quantity)?,
    )
    .await?;
    info!(product_id = %product.id, by = %auth.id, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, body))]
pub async fn update_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateProductRequest>,
) -> AppResult<Json<Product>> {
    auth.require_any(EDITORS)?;
    let title = body.title.as_deref().map(|t| required("title", t)).transpose()?;
    let sale_price = body.sale_price.map(check_price).transpose()?;
    let quantity = body.quantity.map(check_stock).transpose()?;
    let product = repo::update(
        &state.db,
        id,
        title.as_deref(),
        body.description.as_deref().map(str::trim),
        sale_price,
        quantity,
    )
    .await?
    .ok_or_else(|| AppError::NotFound("Product not found".into()))?;
    info!(product_id = %product.id, by = %auth.id, "product updated");
    Ok(Json(product))
}
