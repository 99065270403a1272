use sqlx::PgConnection;
use tracing::{debug, info};

use super::repo;
use super::repo_types::{ContactInfo, CustomerEvent, CustomerStatus};

/// Applies `event` to the CRM record of `contact.email`, creating it when
/// missing. Runs on the caller's connection so it commits or rolls back with
/// the surrounding transaction.
pub async fn record_event(
    conn: &mut PgConnection,
    contact: &ContactInfo,
    event: CustomerEvent,
) -> anyhow::Result<CustomerStatus> {
    let initial = event.next_status(None);
    if repo::insert_if_absent(conn, contact, initial).await? {
        info!(email = %contact.email, status = %initial, ?event, "customer record created");
        return Ok(initial);
    }

    // Row exists (possibly created concurrently); lock it before deciding.
    let current = repo::lock_status(conn, &contact.email)
        .await?
        .ok_or_else(|| anyhow::anyhow!("customer {} vanished", contact.email))?;
    let next = event.next_status(Some(current));
    if next != current {
        repo::set_status_by_email(conn, &contact.email, next).await?;
        info!(email = %contact.email, from = %current, to = %next, ?event, "customer status changed");
    } else {
        debug!(email = %contact.email, status = %current, ?event, "customer status unchanged");
    }
    Ok(next)
}
