//! Domain types shared between the engine and its venue collaborators.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A trading pair on a specific venue (e.g., "binance_perpetual" / "BTC-USDT").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarketPair {
    pub venue: String,
    pub trading_pair: String,
}

impl MarketPair {
    pub fn new(venue: impl Into<String>, trading_pair: impl Into<String>) -> Self {
        Self {
            venue: venue.into(),
            trading_pair: trading_pair.into(),
        }
    }
}

impl fmt::Display for MarketPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.venue, self.trading_pair)
    }
}

/// Position side (long, short, or both for one-way mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Both,
    Long,
    Short,
}

/// Position mode of a derivative account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionMode {
    /// One net position per pair
    #[default]
    Oneway,
    /// Dual-sided books: separate long and short positions
    Hedge,
}

impl fmt::Display for PositionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionMode::Oneway => write!(f, "ONEWAY"),
            PositionMode::Hedge => write!(f, "HEDGE"),
        }
    }
}

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn from_is_buy(is_buy: bool) -> Self {
        if is_buy {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, OrderSide::Buy)
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit,
}

/// Whether a derivative order opens new exposure or closes existing exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionAction {
    Open,
    Close,
}

/// Derivative position snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub trading_pair: String,
    pub side: PositionSide,
    /// Signed amount (short positions are usually reported negative)
    pub amount: Decimal,
    pub entry_price: Decimal,
    pub leverage: u32,
}

/// Derivative-only order terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PerpetualTerms {
    pub leverage: Decimal,
    pub position_action: PositionAction,
}

/// An order the engine wants placed, before or after budget adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderCandidate {
    pub trading_pair: String,
    pub is_maker: bool,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub amount: Decimal,
    pub price: Decimal,
    /// Present for perpetual candidates only
    pub perpetual: Option<PerpetualTerms>,
}

impl OrderCandidate {
    /// A taker limit order candidate for a spot market.
    pub fn spot(trading_pair: &str, side: OrderSide, amount: Decimal, price: Decimal) -> Self {
        Self {
            trading_pair: trading_pair.to_string(),
            is_maker: false,
            order_type: OrderType::Limit,
            side,
            amount,
            price,
            perpetual: None,
        }
    }

    /// A taker limit order candidate for a perpetual market.
    pub fn perpetual(
        trading_pair: &str,
        side: OrderSide,
        amount: Decimal,
        price: Decimal,
        leverage: Decimal,
        position_action: PositionAction,
    ) -> Self {
        Self {
            perpetual: Some(PerpetualTerms {
                leverage,
                position_action,
            }),
            ..Self::spot(trading_pair, side, amount, price)
        }
    }

    pub fn notional(&self) -> Decimal {
        self.amount * self.price
    }

    /// Position action used when placing; spot orders always open.
    pub fn position_action(&self) -> PositionAction {
        self.perpetual
            .map(|terms| terms.position_action)
            .unwrap_or(PositionAction::Open)
    }

    pub fn is_close(&self) -> bool {
        self.position_action() == PositionAction::Close
    }
}

impl fmt::Display for OrderCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} at {}",
            self.side, self.amount, self.trading_pair, self.price
        )?;
        if self.is_close() {
            write!(f, " (close)")?;
        }
        Ok(())
    }
}

/// A live resting order reported by a venue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveOrder {
    pub client_order_id: String,
    pub trading_pair: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl ActiveOrder {
    /// Age of the order at `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    #[test]
    fn test_positions_keyed_by_side() {
        let mut positions = HashMap::new();
        positions.insert(("ETH-USDT".to_string(), PositionSide::Long), dec!(3));
        positions.insert(("ETH-USDT".to_string(), PositionSide::Short), dec!(-2));

        assert_eq!(positions.len(), 2);
        assert_eq!(positions[&("ETH-USDT".to_string(), PositionSide::Short)], dec!(-2));
        assert!(!positions.contains_key(&("ETH-USDT".to_string(), PositionSide::Both)));
    }

    #[test]
    fn test_perpetual_candidate_position_action() {
        let open = OrderCandidate::perpetual(
            "ETH-USDT",
            OrderSide::Sell,
            dec!(2),
            dec!(1800),
            dec!(5),
            PositionAction::Open,
        );
        let close = OrderCandidate {
            perpetual: Some(PerpetualTerms {
                leverage: dec!(5),
                position_action: PositionAction::Close,
            }),
            ..open.clone()
        };

        assert!(!open.is_close());
        assert!(close.is_close());
        assert_eq!(open.notional(), dec!(3600));
        assert_eq!(close.to_string(), "sell 2 ETH-USDT at 1800 (close)");
    }

    #[test]
    fn test_spot_candidate_always_opens() {
        let candidate = OrderCandidate::spot("BTC-USDT", OrderSide::Buy, dec!(0.1), dec!(50000));
        assert_eq!(candidate.position_action(), PositionAction::Open);
        assert_eq!(candidate.order_type, OrderType::Limit);
        assert!(!candidate.is_maker);
    }

    #[test]
    fn test_market_pair_display() {
        assert_eq!(
            MarketPair::new("kucoin", "ETH-USDT").to_string(),
            "kucoin:ETH-USDT"
        );
    }
}
