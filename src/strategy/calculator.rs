//! Hedge direction and magnitude calculation.
//!
//! Two modes:
//!
//! - **By value**: one hedge target offsets the total notional value of all
//!   tracked markets.
//!   `net = sum(tracked values) * hedge_ratio + hedge value`
//! - **By amount**: tracked markets are grouped by trading pair under the
//!   hedge target with the same pair, and each group offsets base amounts.
//!   `net = sum(tracked amounts) * hedge_ratio + hedge amount`
//!
//! A non-negative net is hedged by selling, a negative net by buying.

use crate::config::HedgeMode;
use crate::error::{HedgeError, Result};
use crate::exchange::MarketPair;
use rust_decimal::Decimal;
use serde::Serialize;

/// Direction and size of the exposure to offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HedgeDecision {
    /// Signed net exposure before taking the absolute value
    pub net_exposure: Decimal,
    pub is_buy: bool,
    /// Always non-negative
    pub magnitude: Decimal,
}

/// Combine tracked and hedge exposure into a hedge decision.
pub fn net_exposure_decision(
    tracked_total: Decimal,
    hedge_ratio: Decimal,
    hedge_exposure: Decimal,
) -> HedgeDecision {
    let net_exposure = tracked_total * hedge_ratio + hedge_exposure;
    HedgeDecision {
        net_exposure,
        is_buy: net_exposure < Decimal::ZERO,
        magnitude: net_exposure.abs(),
    }
}

/// By-value decision from the tracked pairs' values and the target's value.
pub fn hedge_by_value(
    tracked_values: &[Decimal],
    hedge_value: Decimal,
    hedge_ratio: Decimal,
) -> HedgeDecision {
    net_exposure_decision(tracked_values.iter().sum(), hedge_ratio, hedge_value)
}

/// By-amount decision for one hedge group.
pub fn hedge_by_amount(
    tracked_amounts: &[Decimal],
    hedge_amount: Decimal,
    hedge_ratio: Decimal,
) -> HedgeDecision {
    net_exposure_decision(tracked_amounts.iter().sum(), hedge_ratio, hedge_amount)
}

/// A hedge target and the tracked pairs it offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HedgeGroup {
    pub target: MarketPair,
    pub tracked: Vec<MarketPair>,
}

/// Group tracked pairs under the hedge target with the same trading pair.
pub fn group_by_trading_pair(hedge_pairs: &[MarketPair], tracked: &[MarketPair]) -> Vec<HedgeGroup> {
    hedge_pairs
        .iter()
        .map(|target| HedgeGroup {
            target: target.clone(),
            tracked: tracked
                .iter()
                .filter(|pair| pair.trading_pair == target.trading_pair)
                .cloned()
                .collect(),
        })
        .collect()
}

/// Hedging mode resolved against the configured markets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HedgeStrategy {
    /// Single target offsetting every tracked pair by value
    ByValue(HedgeGroup),
    /// One group per hedge target, offset by amount
    ByAmount(Vec<HedgeGroup>),
}

impl HedgeStrategy {
    pub fn new(mode: HedgeMode, hedge_pairs: &[MarketPair], tracked: &[MarketPair]) -> Result<Self> {
        let first = hedge_pairs.first().ok_or(HedgeError::NoHedgeTarget)?;
        Ok(match mode {
            HedgeMode::Value => HedgeStrategy::ByValue(HedgeGroup {
                target: first.clone(),
                tracked: tracked.to_vec(),
            }),
            HedgeMode::Amount => {
                HedgeStrategy::ByAmount(group_by_trading_pair(hedge_pairs, tracked))
            }
        })
    }

    pub fn mode(&self) -> HedgeMode {
        match self {
            HedgeStrategy::ByValue(_) => HedgeMode::Value,
            HedgeStrategy::ByAmount(_) => HedgeMode::Amount,
        }
    }

    pub fn groups(&self) -> &[HedgeGroup] {
        match self {
            HedgeStrategy::ByValue(group) => std::slice::from_ref(group),
            HedgeStrategy::ByAmount(groups) => groups,
        }
    }

    /// The group hedged by `target`.
    pub fn group(&self, target: &MarketPair) -> Result<&HedgeGroup> {
        self.groups()
            .iter()
            .find(|group| &group.target == target)
            .ok_or_else(|| HedgeError::UnknownHedgeTarget(target.clone()))
    }
}
