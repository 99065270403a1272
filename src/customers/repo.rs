use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use super::repo_types::{ContactInfo, Customer, CustomerStatus};

/// Inserts a record unless one already exists for the email.
/// Returns `true` when a row was inserted.
pub async fn insert_if_absent(
    conn: &mut PgConnection,
    contact: &ContactInfo,
    status: CustomerStatus,
) -> anyhow::Result<bool> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO customers (email, full_name, gender, phone, address, status)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (email) DO NOTHING
        "#,
    )
    .bind(&contact.email)
    .bind(&contact.full_name)
    .bind(contact.gender.as_str())
    .bind(&contact.phone)
    .bind(&contact.address)
    .bind(status.as_str())
    .execute(&mut *conn)
    .await?
    .rows_affected();
    Ok(inserted == 1)
}

/// Reads the status of the record for `email` and locks the row until the
/// surrounding transaction ends.
pub async fn lock_status(
    conn: &mut PgConnection,
    email: &str,
) -> anyhow::Result<Option<CustomerStatus>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT status FROM customers WHERE email = $1 FOR UPDATE")
            .bind(email)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(row.map(|(s,)| s.parse::<CustomerStatus>()).transpose()?)
}

pub async fn set_status_by_email(
    conn: &mut PgConnection,
    email: &str,
    status: CustomerStatus,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE customers
           SET status = $2, updated_by = NULL, updated_at = now()
         WHERE email = $1
        "#,
    )
    .bind(email)
    .bind(status.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn list<'e>(
    db: impl PgExecutor<'e>,
    status: Option<CustomerStatus>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> anyhow::Result<Vec<Customer>> {
    let rows = sqlx::query_as::<_, Customer>(
        r#"
        SELECT id, email, full_name, gender, phone, address, status,
               updated_by, created_at, updated_at
          FROM customers
         WHERE $1::text IS NULL OR status = $1
         ORDER BY updated_at DESC, id
         LIMIT $2 OFFSET $3
        "#,
    )
    .bind(status.map(CustomerStatus::as_str))
    .bind(limit)
    .bind(offset.unwrap_or(0))
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn count<'e>(db: impl PgExecutor<'e>, status: Option<CustomerStatus>) -> anyhow::Result<i64> {
    let (n,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM customers WHERE $1::text IS NULL OR status = $1")
            .bind(status.map(CustomerStatus::as_str))
            .fetch_one(db)
            .await?;
    Ok(n)
}

pub async fn find_by_id<'e>(db: impl PgExecutor<'e>, id: Uuid) -> anyhow::Result<Option<Customer>> {
    let row = sqlx::query_as::<_, Customer>(
        r#"
        SELECT id, email, full_name, gender, phone, address, status,
               updated_by, created_at, updated_at
          FROM customers
         WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Manual status change by staff; `updated_by` records who made it.
pub async fn update_status<'e>(
    db: impl PgExecutor<'e>,
    id: Uuid,
    status: CustomerStatus,
    updated_by: Uuid,
) -> anyhow::Result<Option<Customer>> {
    let row = sqlx::query_as::<_, Customer>(
        r#"
        UPDATE customers
           SET status = $2, updated_by = $3, updated_at = now()
         WHERE id = $1
        RETURNING id, email, full_name, gender, phone, address, status,
                  updated_by, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(updated_by)
    .fetch_optional(db)
    .await?;
    Ok(row)
}
