use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::OrderContact;
use super::pipeline;
use super::repo::{self, Scope};
use super::repo_types::{Order, OrderAggregate, OrderDetails, OrderItem, OrderStatus};
use crate::{
    auth::{dto::PublicUser, repo_types::User},
    error::{AppError, AppResult},
    products,
};

/// One requested product. `title` and `amount` carry a cart snapshot; when
/// absent the product's current title and sale price are used.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub title: Option<String>,
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub contact: OrderContact,
    pub owner_id: Option<Uuid>,
    pub lines: Vec<OrderLine>,
}

/// Changes requested by staff; `None` keeps the stored value.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub saler: Option<Uuid>,
}

/// Folds repeated products into one line, keeping the first snapshot.
pub fn merge_lines(lines: Vec<OrderLine>) -> AppResult<Vec<OrderLine>> {
    if lines.is_empty() {
        return Err(AppError::BadRequest("Order has no items".into()));
    }
    let mut merged: Vec<OrderLine> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity < 1 {
            return Err(AppError::BadRequest("quantity must be at least 1".into()));
        }
        match merged.iter_mut().find(|l| l.product_id == line.product_id) {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(line.quantity)
                    .ok_or_else(|| AppError::BadRequest("quantity too large".into()))?;
            }
            None => merged.push(line),
        }
    }
    Ok(merged)
}

fn draft(contact: OrderContact, owner_id: Option<Uuid>) -> Order {
    let now = OffsetDateTime::now_utc();
    Order {
        id: Uuid::new_v4(),
        receiver_name: contact.receiver_name,
        address: contact.address,
        phone: contact.phone,
        email: contact.email,
        gender: contact.gender,
        total_cost: Decimal::ZERO,
        status: OrderStatus::Submitted,
        note: contact.note,
        owner_id,
        saler_id: None,
        created_at: now,
        updated_at: now,
    }
}

/// Reserves stock for every line and saves the new order. Must run inside a
/// transaction: a line that cannot be served leaves earlier reservations to
/// the rollback.
pub async fn place_order(conn: &mut PgConnection, new: NewOrder) -> AppResult<OrderAggregate> {
    let lines = merge_lines(new.lines)?;
    let order = draft(new.contact, new.owner_id);

    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let Some(product) = products::repo::reserve_stock(conn, line.product_id, line.quantity).await? else {
            let product = products::repo::find_by_id(&mut *conn, line.product_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Product not found".into()))?;
            warn!(product_id = %product.id, wanted = line.quantity, left = product.quantity, "not enough stock");
            return Err(AppError::BadRequest(format!(
                "not enough quantity of {} (only {} left)",
                product.title, product.quantity
            )));
        };
        items.push(OrderItem {
            id: Uuid::new_v4(),
            order_id: order.id,
            product_id: product.id,
            title: line.title.unwrap_or(product.title),
            quantity: line.quantity,
            amount: line.amount.unwrap_or(product.sale_price),
            total_amount: Decimal::ZERO,
        });
    }

    let saved = pipeline::save(conn, OrderAggregate { order, items }, None).await?;
    info!(
        order_id = %saved.order.id,
        owner_id = ?saved.order.owner_id,
        total = %saved.order.total_cost,
        "order placed"
    );
    Ok(saved)
}

/// Applies a staff patch to an order within `scope`.
pub async fn change_order(
    db: &PgPool,
    id: Uuid,
    scope: Scope,
    patch: OrderPatch,
) -> AppResult<OrderAggregate> {
    let mut tx = db.begin().await?;
    let mut agg = repo::lock(&mut *tx, id, scope)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;
    let previous = agg.order.status;

    if let Some(next) = patch.status {
        if !previous.can_become(next) {
            warn!(order_id = %id, from = %previous, to = %next, "rejected status change");
            return Err(AppError::BadRequest(format!(
                "cannot change order status from {} to {}",
                previous, next
            )));
        }
        agg.order.status = next;
    }

    if let Some(saler_id) = patch.saler {
        if !User::is_active_saler(&mut *tx, saler_id).await? {
            return Err(AppError::BadRequest("Saler must be an active saler".into()));
        }
        agg.order.saler_id = Some(saler_id);
    }

    let saved = pipeline::save(&mut *tx, agg, Some(previous)).await?;
    tx.commit().await?;
    info!(order_id = %id, from = %previous, to = %saved.order.status, saler_id = ?saved.order.saler_id, "order updated");
    Ok(saved)
}

/// Owner-side cancellation; only submitted orders can be cancelled.
pub async fn cancel_by_owner(db: &PgPool, id: Uuid, owner_id: Uuid) -> AppResult<OrderAggregate> {
    let mut tx = db.begin().await?;
    let mut agg = repo::lock(&mut *tx, id, Scope::Owner(owner_id))
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;
    let previous = agg.order.status;
    if previous != OrderStatus::Submitted {
        return Err(AppError::BadRequest(
            "Only submitted orders can be cancelled".into(),
        ));
    }
    agg.order.status = OrderStatus::Cancelled;

    let saved = pipeline::save(&mut *tx, agg, Some(previous)).await?;
    tx.commit().await?;
    info!(order_id = %id, %owner_id, "order cancelled by owner");
    Ok(saved)
}

pub async fn details(db: &PgPool, id: Uuid, scope: Scope) -> AppResult<OrderDetails> {
    let order = repo::find(db, id, scope)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;
    let items = repo::item_details(db, order.id).await?;

    let mut owner = None;
    if let Some(owner_id) = order.owner_id {
        owner = User::find_by_id(db, owner_id).await?.map(|u| PublicUser::from(&u));
    }
    let mut saler = None;
    if let Some(saler_id) = order.saler_id {
        saler = User::find_by_id(db, saler_id).await?.map(|u| PublicUser::from(&u));
    }

    Ok(OrderDetails {
        order,
        owner,
        saler,
        items,
    })
}


#[cfg(test)]
mod db_tests {
    use super::*;
    use crate::auth::repo_types::{Gender, NewUser, Role};
    use crate::customers::repo_types::CustomerStatus;
    use crate::orders::query::{self, OrderFilter, Sort};
    use crate::paging::Window;
    use time::macros::datetime;

    async fn product(pool: &PgPool, stock: i32) -> anyhow::Result<Uuid> {
        let p = products::repo::create(pool, "Tắt đèn", None, "12.50".parse()?, stock).await?;
        Ok(p.id)
    }

    async fn stock(pool: &PgPool, id: Uuid) -> anyhow::Result<i32> {
        let p = products::repo::find_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("product {id} missing"))?;
        Ok(p.quantity)
    }

    async fn saler(pool: &PgPool, email: &str, joined: OffsetDateTime) -> anyhow::Result<Uuid> {
        let user = User::create(pool, &NewUser::sample(email, Role::Saler)).await?;
        sqlx::query("UPDATE users SET created_at = $2 WHERE id = $1")
            .bind(user.id)
            .bind(joined)
            .execute(pool)
            .await?;
        Ok(user.id)
    }

    async fn customer_status(pool: &PgPool, email: &str) -> anyhow::Result<CustomerStatus> {
        let (status,): (String,) = sqlx::query_as("SELECT status FROM customers WHERE email = $1")
            .bind(email)
            .fetch_one(pool)
            .await?;
        Ok(status.parse()?)
    }

    fn guest(receiver_name: &str, email: &str, lines: Vec<OrderLine>) -> NewOrder {
        NewOrder {
            contact: OrderContact {
                receiver_name: receiver_name.into(),
                address: "Da Nang".into(),
                phone: "0905123456".into(),
                email: email.into(),
                gender: Gender::F,
                note: None,
            },
            owner_id: None,
            lines,
        }
    }

    fn line(product_id: Uuid, quantity: i32) -> OrderLine {
        OrderLine {
            product_id,
            quantity,
            title: None,
            amount: None,
        }
    }

    async fn place(pool: &PgPool, new: NewOrder) -> anyhow::Result<OrderAggregate> {
        let mut tx = pool.begin().await?;
        let agg = place_order(&mut *tx, new).await?;
        tx.commit().await?;
        Ok(agg)
    }

    fn set_status(status: OrderStatus) -> OrderPatch {
        OrderPatch {
            status: Some(status),
            saler: None,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn guest_cancellation_restocks_once(pool: PgPool) -> anyhow::Result<()> {
        let book = product(&pool, 5).await?;
        let agg = place(&pool, guest("Lan", "lan@example.com", vec![line(book, 2)])).await?;
        assert_eq!(agg.order.owner_id, None);
        assert_eq!(agg.order.status, OrderStatus::Submitted);
        assert_eq!(agg.order.total_cost, "25.00".parse::<Decimal>()?);
        assert_eq!(stock(&pool, book).await?, 3);
        assert_eq!(customer_status(&pool, "lan@example.com").await?, CustomerStatus::Contact);

        let id = agg.order.id;
        let cancelled = change_order(&pool, id, Scope::Any, set_status(OrderStatus::Cancelled)).await?;
        assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
        assert_eq!(stock(&pool, book).await?, 5);
        assert_eq!(customer_status(&pool, "lan@example.com").await?, CustomerStatus::Potential);

        // same status again is a no-op
        change_order(&pool, id, Scope::Any, set_status(OrderStatus::Cancelled)).await?;
        assert_eq!(stock(&pool, book).await?, 5);

        let res = change_order(&pool, id, Scope::Any, set_status(OrderStatus::Success)).await;
        assert!(matches!(res, Err(AppError::BadRequest(_))));
        assert_eq!(customer_status(&pool, "lan@example.com").await?, CustomerStatus::Potential);
        Ok(())
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn success_makes_the_buyer_a_customer(pool: PgPool) -> anyhow::Result<()> {
        let book = product(&pool, 4).await?;
        let agg = place(&pool, guest("Minh", "minh@example.com", vec![line(book, 1)])).await?;

        let done = change_order(&pool, agg.order.id, Scope::Any, set_status(OrderStatus::Success)).await?;
        assert_eq!(done.order.status, OrderStatus::Success);
        assert_eq!(customer_status(&pool, "minh@example.com").await?, CustomerStatus::Customer);
        assert_eq!(stock(&pool, book).await?, 3);

        let res = change_order(&pool, agg.order.id, Scope::Any, set_status(OrderStatus::Cancelled)).await;
        assert!(matches!(res, Err(AppError::BadRequest(_))));
        assert_eq!(stock(&pool, book).await?, 3);
        Ok(())
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn short_stock_rolls_back_every_line(pool: PgPool) -> anyhow::Result<()> {
        let plenty = product(&pool, 10).await?;
        let scarce = product(&pool, 1).await?;

        let res = place(&pool, guest("Hoa", "hoa@example.com", vec![line(plenty, 3), line(scarce, 2)])).await;
        let err = res.unwrap_err().downcast::<AppError>()?;
        assert!(matches!(&err, AppError::BadRequest(msg) if msg.contains("only 1 left")));
        assert_eq!(stock(&pool, plenty).await?, 10);
        assert_eq!(stock(&pool, scarce).await?, 1);
        Ok(())
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn orders_go_to_the_least_loaded_saler(pool: PgPool) -> anyhow::Result<()> {
        let retired = saler(&pool, "retired@example.com", datetime!(2022-01-01 0:00 UTC)).await?;
        User::update_access(&pool, retired, Some(false), None).await?;
        let senior = saler(&pool, "senior@example.com", datetime!(2023-01-01 0:00 UTC)).await?;
        let junior = saler(&pool, "junior@example.com", datetime!(2023-06-01 0:00 UTC)).await?;
        let book = product(&pool, 10).await?;

        let mut assigned = Vec::new();
        for n in 0..3 {
            let email = format!("buyer{n}@example.com");
            let agg = place(&pool, guest("Buyer", &email, vec![line(book, 1)])).await?;
            assigned.push(agg.order.saler_id);
        }
        // ties go to the oldest account
        assert_eq!(assigned, vec![Some(senior), Some(junior), Some(senior)]);
        assert!(!assigned.contains(&Some(retired)));
        Ok(())
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn filtered_count_ignores_the_page(pool: PgPool) -> anyhow::Result<()> {
        let book = product(&pool, 10).await?;
        for (name, email) in [
            ("Anh Nguyen", "a1@example.com"),
            ("anh Tran", "a2@example.com"),
            ("Binh Le", "b@example.com"),
        ] {
            place(&pool, guest(name, email, vec![line(book, 1)])).await?;
        }

        let filter = OrderFilter {
            receiver_name: Some("ANH".into()),
            ..OrderFilter::default()
        };
        let first = Window {
            limit: Some(1),
            offset: None,
        };
        let page = query::list(&pool, &filter, Sort::default(), first).await?;
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].items.len(), 1);
        assert!(page[0].order.receiver_name.to_lowercase().contains("anh"));
        assert_eq!(query::count(&pool, &filter).await?, 2);

        let second = Window {
            limit: Some(1),
            offset: Some(1),
        };
        let next = query::list(&pool, &filter, Sort::default(), second).await?;
        assert_eq!(next.len(), 1);
        assert_ne!(next[0].order.id, page[0].order.id);

        let cancelled = OrderFilter {
            status: Some(OrderStatus::Cancelled),
            ..OrderFilter::default()
        };
        assert_eq!(query::count(&pool, &cancelled).await?, 0);
        assert_eq!(query::count(&pool, &OrderFilter::default()).await?, 3);
        Ok(())
    }
}
