//! Steps run every time an order is written.
//!
//! 1. totals are recomputed from the items;
//! 2. a transition to `cancelled` puts the items back in stock;
//! 3. an order without a saler gets the least loaded active saler;
//! 4. the CRM record of the buyer follows the status: any other transition
//!    creates it or promotes `contact` to `potential`, a transition to
//!    `success` makes it a `customer`;
//! 5. the order row (and items, on insert) are written.
//!
//! Everything goes through the caller's connection, which is expected to be
//! inside a transaction: one failing step aborts the whole save.

use sqlx::PgConnection;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::repo;
use super::repo_types::{Order, OrderAggregate, OrderStatus, SalerLoad};
use crate::{
    auth::repo_types::User,
    customers::{
        repo_types::{ContactInfo, CustomerEvent},
        services::record_event,
    },
    products,
};

/// Side effects a save has to perform, decided from the status change alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavePlan {
    pub restock: bool,
    pub assign_saler: bool,
    pub customer_event: Option<CustomerEvent>,
}

/// `previous` is `None` when the order is being inserted.
pub fn plan_save(previous: Option<OrderStatus>, next: OrderStatus, has_saler: bool) -> SavePlan {
    let changed = previous != Some(next);
    SavePlan {
        restock: changed && previous.is_some() && next == OrderStatus::Cancelled,
        assign_saler: !has_saler,
        customer_event: match (changed, next) {
            (false, _) => None,
            (true, OrderStatus::Success) => Some(CustomerEvent::OrderSucceeded),
            (true, _) => Some(CustomerEvent::OrderActivity),
        },
    }
}

/// Saler with the fewest orders; on a tie the first one listed wins.
pub fn pick_least_loaded(loads: &[SalerLoad]) -> Option<Uuid> {
    let mut best: Option<&SalerLoad> = None;
    for load in loads {
        if best.map_or(true, |b| load.orders < b.orders) {
            best = Some(load);
        }
    }
    best.map(|b| b.saler_id)
}

/// CRM identity of an order: its owner's profile, or the contact fields the
/// guest typed at checkout.
async fn contact_for(conn: &mut PgConnection, order: &Order) -> anyhow::Result<ContactInfo> {
    if let Some(owner_id) = order.owner_id {
        if let Some(owner) = User::find_by_id(&mut *conn, owner_id).await? {
            return Ok(ContactInfo {
                email: owner.email,
                full_name: owner.full_name,
                gender: owner.gender,
                phone: owner.phone,
                address: owner.address,
            });
        }
        warn!(order_id = %order.id, %owner_id, "order owner missing; using order contact");
    }
    Ok(ContactInfo {
        email: order.email.clone(),
        full_name: order.receiver_name.clone(),
        gender: order.gender,
        phone: order.phone.clone(),
        address: order.address.clone(),
    })
}

/// Runs the pipeline and persists the order. `previous` is the stored status
/// before this save, `None` for a new order.
pub async fn save(
    conn: &mut PgConnection,
    mut agg: OrderAggregate,
    previous: Option<OrderStatus>,
) -> anyhow::Result<OrderAggregate> {
    let corrected = agg.recompute_totals();
    let plan = plan_save(previous, agg.order.status, agg.order.saler_id.is_some());
    debug!(order_id = %agg.order.id, ?previous, next = %agg.order.status, ?plan, "saving order");

    if plan.restock {
        for item in &agg.items {
            products::repo::restock(conn, item.product_id, item.quantity).await?;
        }
        info!(order_id = %agg.order.id, items = agg.items.len(), "order items restocked");
    }

    if plan.assign_saler {
        let loads = repo::saler_loads(&mut *conn).await?;
        match pick_least_loaded(&loads) {
            Some(saler_id) => {
                agg.order.saler_id = Some(saler_id);
                info!(order_id = %agg.order.id, %saler_id, "saler assigned");
            }
            None => warn!(order_id = %agg.order.id, "no active saler to assign"),
        }
    }

    if let Some(event) = plan.customer_event {
        let contact = contact_for(conn, &agg.order).await?;
        record_event(conn, &contact, event).await?;
    }

    agg.order = match previous {
        None => repo::insert(conn, &agg).await?,
        Some(_) => {
            for item in agg.items.iter().filter(|i| corrected.contains(&i.id)) {
                repo::update_item_total(&mut *conn, item.id, item.total_amount).await?;
            }
            repo::update(&mut *conn, &agg.order).await?
        }
    };
    Ok(agg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    #[test]
    fn new_order_touches_customer_and_needs_saler() {
        let plan = plan_save(None, Submitted, false);
        assert_eq!(
            plan,
            SavePlan {
                restock: false,
                assign_saler: true,
                customer_event: Some(CustomerEvent::OrderActivity),
            }
        );
    }

    #[test]
    fn cancellation_restocks_and_touches_customer() {
        let plan = plan_save(Some(Submitted), Cancelled, true);
        assert!(plan.restock);
        assert!(!plan.assign_saler);
        assert_eq!(plan.customer_event, Some(CustomerEvent::OrderActivity));
    }

    #[test]
    fn success_promotes_customer_without_restock() {
        let plan = plan_save(Some(Submitted), Success, true);
        assert!(!plan.restock);
        assert_eq!(plan.customer_event, Some(CustomerEvent::OrderSucceeded));
    }

    #[test]
    fn unchanged_status_has_no_side_effects() {
        for status in [Submitted, Success, Cancelled] {
            let plan = plan_save(Some(status), status, true);
            assert!(!plan.restock, "{status}");
            assert_eq!(plan.customer_event, None, "{status}");
        }
        // a missing saler is still filled in
        assert!(plan_save(Some(Cancelled), Cancelled, false).assign_saler);
    }

    #[test]
    fn picks_fewest_orders_first_seen_on_tie() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let loads = [
            SalerLoad { saler_id: a, orders: 4 },
            SalerLoad { saler_id: b, orders: 1 },
            SalerLoad { saler_id: c, orders: 1 },
        ];
        assert_eq!(pick_least_loaded(&loads), Some(b));

        let tie = [
            SalerLoad { saler_id: c, orders: 0 },
            SalerLoad { saler_id: a, orders: 0 },
        ];
        assert_eq!(pick_least_loaded(&tie), Some(c));
    }

    #[test]
    fn no_salers_no_pick() {
        assert_eq!(pick_least_loaded(&[]), None);
    }
}
