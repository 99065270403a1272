use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use super::repo_types::{
    ItemProductRow, Order, OrderAggregate, OrderItem, OrderItemDetails, OrderSummary, SalerLoad,
};

/// Whose orders a lookup may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Any,
    Owner(Uuid),
    Saler(Uuid),
}

impl Scope {
    fn owner(self) -> Option<Uuid> {
        match self {
            Scope::Owner(id) => Some(id),
            _ => None,
        }
    }

    fn saler(self) -> Option<Uuid> {
        match self {
            Scope::Saler(id) => Some(id),
            _ => None,
        }
    }
}

/// Inserts the order row and its items; returns the stored order.
pub async fn insert(conn: &mut PgConnection, agg: &OrderAggregate) -> anyhow::Result<Order> {
    let o = &agg.order;
    let order = sqlx::query_as::<_, Order>(
        r#"
        INSERT INTO orders (id, receiver_name, address, phone, email, gender, total_cost,
                            status, note, owner_id, saler_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING id, receiver_name, address, phone, email, gender, total_cost, status,
                  note, owner_id, saler_id, created_at, updated_at
        "#,
    )
    .bind(o.id)
    .bind(&o.receiver_name)
    .bind(&o.address)
    .bind(&o.phone)
    .bind(&o.email)
    .bind(o.gender.as_str())
    .bind(o.total_cost)
    .bind(o.status.as_str())
    .bind(&o.note)
    .bind(o.owner_id)
    .bind(o.saler_id)
    .fetch_one(&mut *conn)
    .await?;

    for (position, item) in agg.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, product_id, title, quantity, amount,
                                     total_amount, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(item.id)
        .bind(order.id)
        .bind(item.product_id)
        .bind(&item.title)
        .bind(item.quantity)
        .bind(item.amount)
        .bind(item.total_amount)
        .bind(position as i32)
        .execute(&mut *conn)
        .await?;
    }
    Ok(order)
}

/// Writes the mutable columns of an existing order.
pub async fn update<'e>(db: impl PgExecutor<'e>, o: &Order) -> anyhow::Result<Order> {
    let order = sqlx::query_as::<_, Order>(
        r#"
        UPDATE orders
           SET status = $2, saler_id = $3, total_cost = $4, updated_at = now()
         WHERE id = $1
        RETURNING id, receiver_name, address, phone, email, gender, total_cost, status,
                  note, owner_id, saler_id, created_at, updated_at
        "#,
    )
    .bind(o.id)
    .bind(o.status.as_str())
    .bind(o.saler_id)
    .bind(o.total_cost)
    .fetch_one(db)
    .await?;
    Ok(order)
}

pub async fn update_item_total<'e>(
    db: impl PgExecutor<'e>,
    item_id: Uuid,
    total_amount: Decimal,
) -> anyhow::Result<()> {
    sqlx::query("UPDATE order_items SET total_amount = $2 WHERE id = $1")
        .bind(item_id)
        .bind(total_amount)
        .execute(db)
        .await?;
    Ok(())
}

/// Order counts of the salers eligible for assignment, oldest account first.
/// Deactivated salers are left out, so they never receive new orders even
/// though the orders they already hold stay with them.
pub async fn saler_loads<'e>(db: impl PgExecutor<'e>) -> anyhow::Result<Vec<SalerLoad>> {
    let rows = sqlx::query_as::<_, SalerLoad>(
        r#"
        SELECT u.id AS saler_id, COUNT(o.id) AS orders
          FROM users u
          LEFT JOIN orders o ON o.saler_id = u.id
         WHERE u.role = 'saler' AND u.active
         GROUP BY u.id, u.created_at
         ORDER BY u.created_at, u.id
        "#,
    )
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn items_of<'e>(db: impl PgExecutor<'e>, order_id: Uuid) -> anyhow::Result<Vec<OrderItem>> {
    let rows = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT id, order_id, product_id, title, quantity, amount, total_amount
          FROM order_items
         WHERE order_id = $1
         ORDER BY position
        "#,
    )
    .bind(order_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Loads an order with its items and locks the order row for the rest of
/// the transaction.
pub async fn lock(
    conn: &mut PgConnection,
    id: Uuid,
    scope: Scope,
) -> anyhow::Result<Option<OrderAggregate>> {
    let order = sqlx::query_as::<_, Order>(
        r#"
        SELECT id, receiver_name, address, phone, email, gender, total_cost, status,
               note, owner_id, saler_id, created_at, updated_at
          FROM orders
         WHERE id = $1
           AND ($2::uuid IS NULL OR owner_id = $2)
           AND ($3::uuid IS NULL OR saler_id = $3)
         FOR UPDATE
        "#,
    )
    .bind(id)
    .bind(scope.owner())
    .bind(scope.saler())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(order) = order else {
        return Ok(None);
    };
    let items = items_of(&mut *conn, order.id).await?;
    Ok(Some(OrderAggregate { order, items }))
}

pub async fn find<'e>(db: impl PgExecutor<'e>, id: Uuid, scope: Scope) -> anyhow::Result<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(
        r#"
        SELECT id, receiver_name, address, phone, email, gender, total_cost, status,
               note, owner_id, saler_id, created_at, updated_at
          FROM orders
         WHERE id = $1
           AND ($2::uuid IS NULL OR owner_id = $2)
           AND ($3::uuid IS NULL OR saler_id = $3)
        "#,
    )
    .bind(id)
    .bind(scope.owner())
    .bind(scope.saler())
    .fetch_optional(db)
    .await?;
    Ok(order)
}

pub async fn item_details<'e>(
    db: impl PgExecutor<'e>,
    order_id: Uuid,
) -> anyhow::Result<Vec<OrderItemDetails>> {
    let rows = sqlx::query_as::<_, ItemProductRow>(
        r#"
        SELECT i.id, i.order_id, i.product_id, i.title, i.quantity, i.amount, i.total_amount,
               p.title AS product_title, p.sale_price AS product_sale_price,
               p.quantity AS product_quantity
          FROM order_items i
          JOIN products p ON p.id = i.product_id
         WHERE i.order_id = $1
         ORDER BY i.position
        "#,
    )
    .bind(order_id)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(OrderItemDetails::from).collect())
}

/// Fills in the items of every summary with one query.
pub async fn attach_items(db: &PgPool, orders: &mut [OrderSummary]) -> anyhow::Result<()> {
    if orders.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = orders.iter().map(|o| o.order.id).collect();
    let rows = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT id, order_id, product_id, title, quantity, amount, total_amount
          FROM order_items
         WHERE order_id = ANY($1)
         ORDER BY order_id, position
        "#,
    )
    .bind(&ids)
    .fetch_all(db)
    .await?;

    let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for item in rows {
        by_order.entry(item.order_id).or_default().push(item);
    }
    for summary in orders.iter_mut() {
        summary.items = by_order.remove(&summary.order.id).unwrap_or_default();
    }
    Ok(())
}

/// Orders placed by `owner_id`, newest first.
pub async fn list_by_owner(db: &PgPool, owner_id: Uuid) -> anyhow::Result<Vec<OrderSummary>> {
    let mut orders = sqlx::query_as::<_, OrderSummary>(
        r#"
        SELECT o.id, o.receiver_name, o.address, o.phone, o.email, o.gender, o.total_cost,
               o.status, o.note, o.owner_id, o.saler_id, o.created_at, o.updated_at,
               s.full_name AS saler_name
          FROM orders o
          LEFT JOIN users s ON s.id = o.saler_id
         WHERE o.owner_id = $1
         ORDER BY o.created_at DESC, o.id
        "#,
    )
    .bind(owner_id)
    .fetch_all(db)
    .await?;
    attach_items(db, &mut orders).await?;
    Ok(orders)
}
