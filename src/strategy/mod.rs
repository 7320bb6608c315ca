//! Hedging strategy.
//!
//! Contains the core logic for:
//! - Exposure aggregation across tracked and hedge markets
//! - Value and amount hedge calculations
//! - Slippage pricing and candidate construction
//! - Order lifecycle gating and the per-cycle engine

mod calculator;
mod candidates;
mod engine;
mod exposure;
mod gate;
mod pricing;
mod status;

pub use calculator::{
    group_by_trading_pair, hedge_by_amount, hedge_by_value, net_exposure_decision, HedgeDecision,
    HedgeGroup, HedgeStrategy,
};
pub use candidates::OrderCandidateBuilder;
pub use engine::{
    HedgeEngine, HedgeOrder, HedgeVariant, PlacedOrder, PlanOutcome, TargetOutcome, TargetPlan,
    TargetReport, TickOutcome,
};
pub use exposure::{net_position_amount, ExposureAggregator};
pub use gate::{GateState, OrderLifecycleGate};
pub use pricing::PricingAdjuster;
pub use status::{HedgeStatus, NextHedge, OrderRow, PositionRow, ValueSummary, WalletRow};
