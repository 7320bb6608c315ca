//! Order candidate construction with balance-aware amount adjustment.
//!
//! Spot hedges produce at most one candidate. Perpetual hedges in HEDGE
//! position mode first close opposing exposure and then open the remainder,
//! so a single decision may yield a close and an open candidate.

use crate::exchange::{
    BudgetChecker, OrderCandidate, OrderSide, Position, PositionAction, PositionMode, PositionSide,
};
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Builds budget-checked order candidates for a hedge decision.
#[derive(Debug, Clone, Copy)]
pub struct OrderCandidateBuilder {
    min_trade_size: Decimal,
    leverage: Decimal,
    position_mode: PositionMode,
}

impl OrderCandidateBuilder {
    pub fn new(min_trade_size: Decimal, leverage: Decimal, position_mode: PositionMode) -> Self {
        Self {
            min_trade_size,
            leverage,
            position_mode,
        }
    }

    /// True when the notional clears the minimum trade size.
    pub fn meets_min_notional(&self, amount: Decimal, price: Decimal) -> bool {
        let notional = amount * price;
        if notional < self.min_trade_size {
            info!(
                %notional,
                min_trade_size = %self.min_trade_size,
                "Trade value is less than min trade size"
            );
            return false;
        }
        true
    }

    /// Single limit order candidate for a spot hedge pair.
    pub fn spot(
        &self,
        trading_pair: &str,
        budget: &dyn BudgetChecker,
        is_buy: bool,
        amount: Decimal,
        price: Decimal,
    ) -> Vec<OrderCandidate> {
        if !self.meets_min_notional(amount, price) {
            return Vec::new();
        }
        let candidate =
            OrderCandidate::spot(trading_pair, OrderSide::from_is_buy(is_buy), amount, price);
        let adjusted = adjust(budget, candidate);
        if adjusted.amount > Decimal::ZERO {
            vec![adjusted]
        } else {
            Vec::new()
        }
    }

    /// Close-then-open candidates for a perpetual hedge pair. `positions`
    /// are the open positions on the pair.
    pub fn perpetual(
        &self,
        trading_pair: &str,
        positions: &[Position],
        budget: &dyn BudgetChecker,
        is_buy: bool,
        amount: Decimal,
        price: Decimal,
    ) -> Vec<OrderCandidate> {
        if !self.meets_min_notional(amount, price) {
            return Vec::new();
        }
        let side = OrderSide::from_is_buy(is_buy);
        let mut remaining = amount;
        let mut candidates = Vec::new();

        if self.position_mode == PositionMode::Hedge {
            let opposing_side = if is_buy {
                PositionSide::Short
            } else {
                PositionSide::Long
            };
            for position in positions.iter().filter(|p| p.side == opposing_side) {
                if remaining <= Decimal::ZERO {
                    break;
                }
                let close_amount = remaining.min(position.amount.abs());
                let candidate = OrderCandidate::perpetual(
                    trading_pair,
                    side,
                    close_amount,
                    price,
                    self.leverage,
                    PositionAction::Close,
                );
                let adjusted = adjust(budget, candidate);
                if adjusted.amount > Decimal::ZERO {
                    remaining -= adjusted.amount;
                    candidates.push(adjusted);
                }
            }
        }

        if remaining > Decimal::ZERO {
            let candidate = OrderCandidate::perpetual(
                trading_pair,
                side,
                remaining,
                price,
                self.leverage,
                PositionAction::Open,
            );
            let adjusted = adjust(budget, candidate);
            if adjusted.amount > Decimal::ZERO {
                candidates.push(adjusted);
            }
        }

        candidates
    }
}

/// Submit a candidate to the budget checker, partial amounts allowed.
fn adjust(budget: &dyn BudgetChecker, candidate: OrderCandidate) -> OrderCandidate {
    debug!(order = %candidate, "Order candidate");
    let requested = candidate.amount;
    let mut adjusted = budget.adjust_candidate(candidate, false);
    adjusted.amount = adjusted.amount.min(requested).max(Decimal::ZERO);
    debug!(order = %adjusted, "Adjusted order candidate");
    adjusted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::MockBudgetChecker;
    use mockall::predicate::eq;
    use rust_decimal_macros::dec;

    fn passthrough() -> MockBudgetChecker {
        let mut budget = MockBudgetChecker::new();
        budget
            .expect_adjust_candidate()
            .with(mockall::predicate::always(), eq(false))
            .returning(|candidate, _| candidate);
        budget
    }

    fn long(amount: Decimal) -> Position {
        Position {
            trading_pair: "ETH-USDT".to_string(),
            side: PositionSide::Long,
            amount,
            entry_price: dec!(1900),
            leverage: 5,
        }
    }

    fn hedge_builder() -> OrderCandidateBuilder {
        OrderCandidateBuilder::new(dec!(10), dec!(5), PositionMode::Hedge)
    }

    #[test]
    fn test_min_notional_boundary() {
        let builder = OrderCandidateBuilder::new(dec!(100), Decimal::ONE, PositionMode::Oneway);
        let budget = passthrough();

        // Exactly at minimum is accepted
        assert_eq!(builder.spot("ETH-USDT", &budget, true, dec!(1), dec!(100)).len(), 1);
        assert_eq!(builder.perpetual("ETH-USDT", &[], &budget, true, dec!(1), dec!(100)).len(), 1);

        // One unit below is rejected without consulting the budget checker
        let mut untouched = MockBudgetChecker::new();
        untouched.expect_adjust_candidate().never();
        assert!(builder.spot("ETH-USDT", &untouched, true, dec!(1), dec!(99)).is_empty());
        assert!(builder
            .perpetual("ETH-USDT", &[], &untouched, true, dec!(1), dec!(99))
            .is_empty());
    }

    #[test]
    fn test_spot_candidate_is_limit_taker() {
        let builder = OrderCandidateBuilder::new(Decimal::ZERO, Decimal::ONE, PositionMode::Oneway);
        let candidates = builder.spot("ETH-USDT", &passthrough(), false, dec!(0.3), dec!(1960));

        assert_eq!(
            candidates,
            vec![OrderCandidate::spot("ETH-USDT", OrderSide::Sell, dec!(0.3), dec!(1960))]
        );
    }

    #[test]
    fn test_spot_budget_reduced_to_zero_drops_candidate() {
        let builder = OrderCandidateBuilder::new(Decimal::ZERO, Decimal::ONE, PositionMode::Oneway);
        let mut budget = MockBudgetChecker::new();
        budget.expect_adjust_candidate().times(1).returning(|mut c, _| {
            c.amount = Decimal::ZERO;
            c
        });

        assert!(builder.spot("ETH-USDT", &budget, true, dec!(1), dec!(2000)).is_empty());
    }

    #[test]
    fn test_budget_cannot_increase_amount() {
        let builder = OrderCandidateBuilder::new(Decimal::ZERO, Decimal::ONE, PositionMode::Oneway);
        let mut budget = MockBudgetChecker::new();
        budget.expect_adjust_candidate().returning(|mut c, _| {
            c.amount *= dec!(2);
            c
        });

        let candidates = builder.spot("ETH-USDT", &budget, true, dec!(1), dec!(2000));
        assert_eq!(candidates[0].amount, dec!(1));
    }

    #[test]
    fn test_netting_closes_then_opens_remainder() {
        // Sell 5 against a long of 3: close 3, open 2
        let candidates = hedge_builder().perpetual(
            "ETH-USDT",
            &[long(dec!(3))],
            &passthrough(),
            false,
            dec!(5),
            dec!(1960),
        );

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].side, OrderSide::Sell);
        assert_eq!(candidates[0].amount, dec!(3));
        assert!(candidates[0].is_close());
        assert_eq!(candidates[1].side, OrderSide::Sell);
        assert_eq!(candidates[1].amount, dec!(2));
        assert_eq!(candidates[1].position_action(), PositionAction::Open);
        assert_eq!(candidates[1].perpetual.map(|t| t.leverage), Some(dec!(5)));
    }

    #[test]
    fn test_netting_within_opposing_position_only_closes() {
        for requested in [dec!(2), dec!(3)] {
            let candidates = hedge_builder().perpetual(
                "ETH-USDT",
                &[long(dec!(3))],
                &passthrough(),
                false,
                requested,
                dec!(1960),
            );

            assert_eq!(candidates.len(), 1);
            assert!(candidates[0].is_close());
            assert_eq!(candidates[0].amount, requested);
        }
    }

    #[test]
    fn test_netting_ignores_same_side_positions() {
        // Buying never closes a long
        let candidates = hedge_builder().perpetual(
            "ETH-USDT",
            &[long(dec!(3))],
            &passthrough(),
            true,
            dec!(1),
            dec!(2040),
        );

        assert_eq!(candidates.len(), 1);
        assert!(!candidates[0].is_close());
    }

    #[test]
    fn test_oneway_mode_never_closes() {
        let builder = OrderCandidateBuilder::new(Decimal::ZERO, Decimal::ONE, PositionMode::Oneway);
        let candidates =
            builder.perpetual("ETH-USDT", &[long(dec!(3))], &passthrough(), false, dec!(5), dec!(1960));

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].amount, dec!(5));
        assert_eq!(candidates[0].position_action(), PositionAction::Open);
    }

    #[test]
    fn test_reduced_close_leaves_more_to_open() {
        let mut budget = MockBudgetChecker::new();
        budget.expect_adjust_candidate().returning(|mut c, all_or_none| {
            assert!(!all_or_none);
            if c.is_close() {
                c.amount = dec!(1);
            }
            c
        });

        let candidates =
            hedge_builder().perpetual("ETH-USDT", &[long(dec!(3))], &budget, false, dec!(5), dec!(1960));

        assert_eq!(candidates[0].amount, dec!(1));
        assert_eq!(candidates[1].amount, dec!(4));
    }
}
