//! Stale order cancellation ahead of each hedge cycle.

use crate::exchange::{ActiveOrder, VenueRegistry};
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

/// Whether a cycle may place new hedge orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// No active orders
    Open,
    /// Active orders exist; stale ones were asked to cancel
    Blocked { active: usize, cancelled: usize },
}

impl GateState {
    pub fn is_open(&self) -> bool {
        matches!(self, GateState::Open)
    }
}

/// Cancels orders older than `max_order_age` and blocks hedging while any
/// order is still active.
#[derive(Debug, Clone, Copy)]
pub struct OrderLifecycleGate {
    max_order_age: Duration,
}

impl OrderLifecycleGate {
    pub fn new(max_order_age: Duration) -> Self {
        Self { max_order_age }
    }

    pub fn from_secs(max_order_age_secs: u64) -> Self {
        let max_order_age = i64::try_from(max_order_age_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self::new(max_order_age)
    }

    /// An order is stale once its age reaches the maximum.
    pub fn is_stale(&self, order: &ActiveOrder, now: DateTime<Utc>) -> bool {
        order.age(now) >= self.max_order_age
    }

    /// Cancel stale orders on every venue. Cancellation is requested, not
    /// awaited: the orders count as active until a venue stops reporting them.
    pub async fn check(&self, venues: &VenueRegistry, now: DateTime<Utc>) -> GateState {
        let mut active = 0;
        let mut cancelled = 0;

        for (venue_name, venue) in venues.iter() {
            let router = venue.router();
            for order in router.active_orders() {
                active += 1;
                if !self.is_stale(&order, now) {
                    continue;
                }
                info!(
                    venue = venue_name,
                    order_id = %order.client_order_id,
                    "Cancel {} {} {} at {}",
                    order.side,
                    order.quantity,
                    order.trading_pair,
                    order.price
                );
                match router.cancel(&order.trading_pair, &order.client_order_id).await {
                    Ok(()) => cancelled += 1,
                    Err(e) => warn!(
                        venue = venue_name,
                        order_id = %order.client_order_id,
                        error = %e,
                        "Cancel request failed"
                    ),
                }
            }
        }

        if active == 0 {
            GateState::Open
        } else {
            GateState::Blocked { active, cancelled }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{OrderSide, PaperVenue};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn order(id: &str, created_at: DateTime<Utc>) -> ActiveOrder {
        ActiveOrder {
            client_order_id: id.to_string(),
            trading_pair: "ETH-USDT".to_string(),
            side: OrderSide::Sell,
            quantity: dec!(1),
            price: dec!(1960),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_open_without_active_orders() {
        let venues = VenueRegistry::new().with(Arc::new(PaperVenue::spot("spot")));
        let gate = OrderLifecycleGate::from_secs(5);

        assert_eq!(gate.check(&venues, Utc::now()).await, GateState::Open);
    }

    #[tokio::test]
    async fn test_cancels_only_stale_orders_and_blocks() {
        let venue = Arc::new(PaperVenue::perpetual("perp"));
        let now = Utc::now();
        venue.insert_active_order(order("stale", now - Duration::seconds(10)));
        venue.insert_active_order(order("fresh", now - Duration::seconds(1)));
        let venues = VenueRegistry::new().with(venue.clone());

        let state = OrderLifecycleGate::from_secs(5).check(&venues, now).await;

        assert_eq!(state, GateState::Blocked { active: 2, cancelled: 1 });
        assert_eq!(venue.cancelled_orders(), vec!["stale".to_string()]);
    }

    #[tokio::test]
    async fn test_blocks_for_the_cycle_even_after_cancelling_everything() {
        let venue = Arc::new(PaperVenue::spot("spot"));
        let now = Utc::now();
        venue.insert_active_order(order("old", now - Duration::seconds(60)));
        let venues = VenueRegistry::new().with(venue.clone());
        let gate = OrderLifecycleGate::from_secs(5);

        let first = gate.check(&venues, now).await;
        assert!(!first.is_open());

        // Cancellation has settled by the next cycle
        assert!(gate.check(&venues, now).await.is_open());
    }

    #[test]
    fn test_age_at_threshold_is_stale() {
        let gate = OrderLifecycleGate::from_secs(5);
        let now = Utc::now();

        assert!(gate.is_stale(&order("a", now - Duration::seconds(5)), now));
        assert!(!gate.is_stale(&order("b", now - Duration::milliseconds(4999)), now));
    }
}
