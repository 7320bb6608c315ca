//! Venue-agnostic collaborator traits.
//!
//! The engine never talks to an exchange directly. Each venue is reached
//! through three seams:
//! - `MarketView`: synchronous snapshot reads (prices, balances, positions)
//! - `BudgetChecker`: balance/margin-aware order size adjustment
//! - `OrderRouter`: order placement, cancellation and account setup

use super::types::{ActiveOrder, OrderCandidate, Position, PositionMode};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;

/// Read-only view of one venue's market state.
pub trait MarketView: Send + Sync {
    /// Venue name, matching `MarketPair::venue`.
    fn name(&self) -> &str;

    /// True for perpetual/futures venues.
    fn is_derivative(&self) -> bool;

    /// Whether the venue has finished syncing its order books and balances.
    fn is_ready(&self) -> bool {
        true
    }

    fn mid_price(&self, trading_pair: &str) -> anyhow::Result<Decimal>;

    /// Volume-weighted execution price for `amount` on the side that a buy
    /// (asks) or sell (bids) would consume.
    fn vwap_for_size(&self, trading_pair: &str, is_buy: bool, amount: Decimal)
        -> anyhow::Result<Decimal>;

    /// Spot balance of the pair's base asset.
    fn base_balance(&self, trading_pair: &str) -> anyhow::Result<Decimal>;

    /// Open positions on a pair. Empty for spot venues.
    fn positions(&self, trading_pair: &str) -> Vec<Position>;

    fn quantize_order_price(&self, _trading_pair: &str, price: Decimal) -> Decimal {
        price
    }

    fn quantize_order_amount(&self, _trading_pair: &str, amount: Decimal) -> Decimal {
        amount
    }
}

/// Validates an order candidate against available balance or margin.
#[cfg_attr(test, mockall::automock)]
pub trait BudgetChecker: Send + Sync {
    /// Returns the candidate with its amount reduced to what the account can
    /// afford. Never increases the amount. With `all_or_none` an unaffordable
    /// candidate is zeroed instead of reduced.
    fn adjust_candidate(&self, candidate: OrderCandidate, all_or_none: bool) -> OrderCandidate;
}

/// Order placement and account setup on a venue.
#[async_trait]
pub trait OrderRouter: Send + Sync {
    /// Orders placed by this engine that are still resting.
    fn active_orders(&self) -> Vec<ActiveOrder>;

    /// Place a limit order; returns the client order id.
    async fn place(&self, candidate: &OrderCandidate) -> anyhow::Result<String>;

    /// Request cancellation. Completion is observed through `active_orders`.
    async fn cancel(&self, trading_pair: &str, client_order_id: &str) -> anyhow::Result<()>;

    async fn set_leverage(&self, trading_pair: &str, leverage: u32) -> anyhow::Result<()>;

    async fn set_position_mode(&self, mode: PositionMode) -> anyhow::Result<()>;
}

/// A venue exposes all three seams.
pub trait Venue: Send + Sync {
    fn market(&self) -> &dyn MarketView;
    fn budget_checker(&self) -> &dyn BudgetChecker;
    fn router(&self) -> &dyn OrderRouter;
}

/// Exposure reported by a source outside the connected venues, such as a
/// liquidity-pool deposit whose delta per asset is computed off-venue.
#[async_trait]
pub trait ExternalExposure: Send + Sync {
    /// Signed base-asset exposure attributed to `trading_pair`.
    fn base_amount(&self, trading_pair: &str) -> anyhow::Result<Decimal>;

    /// Refresh cached state from the underlying feeds.
    async fn reconcile(&self) -> anyhow::Result<()>;

    /// Nested explain data describing the current exposure breakdown.
    fn explain(&self) -> Value {
        Value::Null
    }
}
