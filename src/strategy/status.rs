//! Operator-facing status snapshot.

use super::exposure::ExposureAggregator;
use crate::config::HedgeMode;
use crate::exchange::{ActiveOrder, MarketPair, OrderSide, PositionSide};
use rust_decimal::Decimal;
use serde::Serialize;

/// Balance and value of one configured market. Fields are `None` when the
/// venue cannot report them.
#[derive(Debug, Clone, Serialize)]
pub struct WalletRow {
    pub pair: MarketPair,
    pub mid_price: Option<Decimal>,
    pub amount: Option<Decimal>,
    pub value: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionRow {
    pub pair: MarketPair,
    pub side: PositionSide,
    pub entry_price: Decimal,
    pub amount: Decimal,
    pub leverage: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderRow {
    pub venue: String,
    pub order: ActiveOrder,
}

#[derive(Debug, Clone, Serialize)]
pub struct NextHedge {
    pub side: OrderSide,
    pub price: Decimal,
    pub amount: Decimal,
}

/// Value-mode totals and the order the next evaluation would place.
#[derive(Debug, Clone, Serialize)]
pub struct ValueSummary {
    pub total_value: Option<Decimal>,
    pub hedge_value: Option<Decimal>,
    pub next_hedge: Option<NextHedge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HedgeStatus {
    pub mode: HedgeMode,
    pub ready: bool,
    pub wallet: Vec<WalletRow>,
    pub positions: Vec<PositionRow>,
    pub active_orders: Vec<OrderRow>,
    pub value_summary: Option<ValueSummary>,
}

impl HedgeStatus {
    pub fn collect(
        aggregator: &ExposureAggregator,
        pairs: &[MarketPair],
        mode: HedgeMode,
        value_summary: Option<ValueSummary>,
    ) -> Self {
        let wallet = pairs
            .iter()
            .map(|pair| WalletRow {
                pair: pair.clone(),
                mid_price: aggregator.mid_price(pair).ok(),
                amount: aggregator.base_amount(pair).ok(),
                value: aggregator.base_value(pair).ok(),
            })
            .collect();

        let positions = pairs
            .iter()
            .filter(|pair| matches!(aggregator.is_derivative(pair), Ok(true)))
            .flat_map(|pair| {
                aggregator
                    .positions_for(pair, None)
                    .unwrap_or_default()
                    .into_iter()
                    .map(move |position| PositionRow {
                        pair: pair.clone(),
                        side: position.side,
                        entry_price: position.entry_price,
                        amount: position.amount,
                        leverage: position.leverage,
                    })
            })
            .collect();

        let venues = aggregator.venues();
        let active_orders = venues
            .iter()
            .flat_map(|(name, venue)| {
                venue
                    .router()
                    .active_orders()
                    .into_iter()
                    .map(move |order| OrderRow {
                        venue: name.to_string(),
                        order,
                    })
            })
            .collect();

        Self {
            mode,
            ready: venues.all_ready(),
            wallet,
            positions,
            active_orders,
            value_summary,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{PaperVenue, VenueRegistry};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[test]
    fn test_collect_tolerates_missing_prices() {
        let spot = Arc::new(PaperVenue::spot("spot"));
        let perp = Arc::new(PaperVenue::perpetual("perp"));
        spot.set_base_balance("ETH-USDT", dec!(1));
        perp.set_position("ETH-USDT", PositionSide::Short, dec!(-1), dec!(2000));
        perp.insert_active_order(ActiveOrder {
            client_order_id: "o1".to_string(),
            trading_pair: "ETH-USDT".to_string(),
            side: OrderSide::Buy,
            quantity: dec!(1),
            price: dec!(1990),
            created_at: Utc::now(),
        });
        let venues = VenueRegistry::new().with(spot).with(perp);
        let pairs = vec![
            MarketPair::new("perp", "ETH-USDT"),
            MarketPair::new("spot", "ETH-USDT"),
        ];
        let offsets: HashMap<_, _> = pairs.iter().map(|p| (p.clone(), Decimal::ZERO)).collect();
        let aggregator = ExposureAggregator::new(venues, offsets);

        let status = HedgeStatus::collect(&aggregator, &pairs, HedgeMode::Amount, None);

        assert_eq!(status.wallet[0].amount, Some(dec!(-1)));
        assert_eq!(status.wallet[1].mid_price, None);
        assert_eq!(status.wallet[1].value, None);
        assert_eq!(status.positions.len(), 1);
        assert_eq!(status.active_orders[0].venue, "perp");
        assert!(status.ready);
        assert_eq!(status.to_json()["mode"], "amount");
    }
}
