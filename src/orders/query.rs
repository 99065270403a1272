//! Filtering, sorting and paging of the staff order listings.

use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::{format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime};
use uuid::Uuid;

use super::repo::attach_items;
use super::repo_types::{OrderStatus, OrderSummary};
use crate::error::AppError;
use crate::paging::{self, Window};

/// Query string of `GET /orders/saleManager` and `GET /orders/saler`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub status: Option<String>,
    pub sale_name: Option<String>,
    pub sorted_by: Option<String>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

/// Query string of the `search` endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSearchQuery {
    pub customer_name: Option<String>,
    pub order_id: Option<String>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub id: Option<Uuid>,
    pub saler_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    /// `from <= created_at < to`
    pub created: Option<(OffsetDateTime, OffsetDateTime)>,
    pub saler_name: Option<String>,
    pub receiver_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    OrderDate,
    UpdatedAt,
    CustomerName,
    TotalCost,
    Status,
}

impl SortField {
    fn column(self) -> &'static str {
        match self {
            SortField::OrderDate => "o.created_at",
            SortField::UpdatedAt => "o.updated_at",
            SortField::CustomerName => "o.receiver_name",
            SortField::TotalCost => "o.total_cost",
            SortField::Status => "o.status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub field: SortField,
    pub descending: bool,
}

impl Default for Sort {
    fn default() -> Self {
        Sort {
            field: SortField::OrderDate,
            descending: true,
        }
    }
}

/// Parses a `field_direction` token such as `orderDate_desc`. A missing or
/// unknown direction sorts ascending; an unknown field keeps the default.
pub fn parse_sort(token: &str) -> Sort {
    let (field, direction) = token.split_once('_').unwrap_or((token, ""));
    let field = match field {
        "orderDate" | "createdAt" => SortField::OrderDate,
        "updatedAt" => SortField::UpdatedAt,
        "customerName" | "receiverName" => SortField::CustomerName,
        "totalCost" => SortField::TotalCost,
        "status" => SortField::Status,
        _ => return Sort::default(),
    };
    Sort {
        field,
        descending: direction == "desc",
    }
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_instant(raw: &str) -> Result<OffsetDateTime, AppError> {
    let raw = raw.trim();
    if let Ok(t) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(t);
    }
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .map(|d| d.midnight().assume_utc())
        .map_err(|_| AppError::BadRequest(format!("Invalid date: {}", raw)))
}

/// The range only applies when both ends are given.
pub fn parse_range(
    from: Option<&str>,
    to: Option<&str>,
) -> Result<Option<(OffsetDateTime, OffsetDateTime)>, AppError> {
    match (from, to) {
        (Some(from), Some(to)) => Ok(Some((parse_instant(from)?, parse_instant(to)?))),
        _ => Ok(None),
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl OrderListQuery {
    /// `saler` restricts the listing to one saler's orders. Unknown status
    /// values are ignored rather than rejected.
    pub fn into_parts(self, saler: Option<Uuid>) -> Result<(OrderFilter, Sort, Window), AppError> {
        let filter = OrderFilter {
            saler_id: saler,
            status: self.status.as_deref().and_then(|s| s.parse().ok()),
            created: parse_range(self.from.as_deref(), self.to.as_deref())?,
            saler_name: non_empty(self.sale_name),
            ..OrderFilter::default()
        };
        let sort = self.sorted_by.as_deref().map(parse_sort).unwrap_or_default();
        Ok((filter, sort, paging::window(self.limit, self.page)?))
    }
}

impl OrderSearchQuery {
    /// `None` when neither criterion is present. The customer name wins
    /// when both are given.
    pub fn into_parts(self, saler: Option<Uuid>) -> Result<Option<(OrderFilter, Window)>, AppError> {
        let window = paging::window(self.limit, self.page)?;
        let mut filter = OrderFilter {
            saler_id: saler,
            ..OrderFilter::default()
        };
        if let Some(name) = non_empty(self.customer_name) {
            filter.receiver_name = Some(name);
        } else if let Some(raw) = non_empty(self.order_id) {
            let id = Uuid::parse_str(&raw).map_err(|_| AppError::BadRequest("Invalid ID".into()))?;
            filter.id = Some(id);
        } else {
            return Ok(None);
        }
        Ok(Some((filter, window)))
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, f: &OrderFilter) {
    qb.push(" WHERE TRUE");
    if let Some(id) = f.id {
        qb.push(" AND o.id = ").push_bind(id);
    }
    if let Some(saler_id) = f.saler_id {
        qb.push(" AND o.saler_id = ").push_bind(saler_id);
    }
    if let Some(status) = f.status {
        qb.push(" AND o.status = ").push_bind(status.as_str());
    }
    if let Some((from, to)) = f.created {
        qb.push(" AND o.created_at >= ").push_bind(from);
        qb.push(" AND o.created_at < ").push_bind(to);
    }
    if let Some(name) = &f.saler_name {
        qb.push(" AND strpos(lower(s.full_name), lower(")
            .push_bind(name.clone())
            .push(")) > 0");
    }
    if let Some(name) = &f.receiver_name {
        qb.push(" AND strpos(lower(o.receiver_name), lower(")
            .push_bind(name.clone())
            .push(")) > 0");
    }
}

const FROM_ORDERS: &str = " FROM orders o LEFT JOIN users s ON s.id = o.saler_id";

pub async fn list(
    db: &PgPool,
    filter: &OrderFilter,
    sort: Sort,
    window: Window,
) -> anyhow::Result<Vec<OrderSummary>> {
    let mut qb = QueryBuilder::<Postgres>::new(
        "SELECT o.id, o.receiver_name, o.address, o.phone, o.email, o.gender, o.total_cost, \
         o.status, o.note, o.owner_id, o.saler_id, o.created_at, o.updated_at, \
         s.full_name AS saler_name",
    );
    qb.push(FROM_ORDERS);
    push_filters(&mut qb, filter);
    qb.push(" ORDER BY ")
        .push(sort.field.column())
        .push(if sort.descending { " DESC" } else { " ASC" })
        .push(", o.id");
    if let Some(limit) = window.limit {
        qb.push(" LIMIT ").push_bind(limit);
    }
    if let Some(offset) = window.offset {
        qb.push(" OFFSET ").push_bind(offset);
    }

    let mut orders = qb.build_query_as::<OrderSummary>().fetch_all(db).await?;
    attach_items(db, &mut orders).await?;
    Ok(orders)
}

pub async fn count(db: &PgPool, filter: &OrderFilter) -> anyhow::Result<i64> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
    qb.push(FROM_ORDERS);
    push_filters(&mut qb, filter);
    let (n,) = qb.build_query_as::<(i64,)>().fetch_one(db).await?;
    Ok(n)
}
