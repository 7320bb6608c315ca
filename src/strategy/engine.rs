//! Per-cycle hedge driver.
//!
//! Each evaluated cycle runs, in order:
//! 1. The order lifecycle gate (stale orders cancelled; any active order
//!    defers hedging to the next cycle)
//! 2. External exposure reconciliation, when configured
//! 3. The hedge calculation for every hedge target
//! 4. Candidate construction and order placement

use super::calculator::{hedge_by_amount, hedge_by_value, HedgeDecision, HedgeGroup, HedgeStrategy};
use super::candidates::OrderCandidateBuilder;
use super::exposure::ExposureAggregator;
use super::gate::{GateState, OrderLifecycleGate};
use super::pricing::PricingAdjuster;
use super::status::{HedgeStatus, NextHedge, ValueSummary};
use crate::config::{HedgeConfig, MarketsConfig};
use crate::error::{HedgeError, Result};
use crate::exchange::{ExternalExposure, MarketPair, OrderCandidate, OrderSide, VenueRegistry};
use crate::utils::{flatten_value, join_path};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument, Span};

/// Where tracked exposure comes from, resolved once at construction.
#[derive(Clone, Default)]
pub enum HedgeVariant {
    /// Positions and balances of the tracked venues
    #[default]
    Standard,
    /// Tracked amounts come from an off-venue exposure feed
    ExternalPosition(Arc<dyn ExternalExposure>),
}

/// Hedge order for one target, before candidate construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HedgeOrder {
    pub target: MarketPair,
    pub is_buy: bool,
    /// Quantized base amount; zero means nothing to hedge
    pub amount: Decimal,
    /// Slippage-adjusted, quantized limit price
    pub price: Decimal,
    pub decision: HedgeDecision,
}

/// Result of planning one hedge target.
#[derive(Debug)]
pub enum PlanOutcome {
    NoHedge(HedgeDecision),
    /// Candidates may be empty when below minimum notional or unaffordable
    Candidates {
        order: HedgeOrder,
        candidates: Vec<OrderCandidate>,
    },
    Failed(HedgeError),
}

#[derive(Debug)]
pub struct TargetPlan {
    pub target: MarketPair,
    pub outcome: PlanOutcome,
}

impl TargetPlan {
    pub fn candidates(&self) -> &[OrderCandidate] {
        match &self.outcome {
            PlanOutcome::Candidates { candidates, .. } => candidates,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacedOrder {
    pub candidate: OrderCandidate,
    /// None when placement failed
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TargetOutcome {
    NoHedge,
    NoCandidates,
    Placed(Vec<PlacedOrder>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetReport {
    pub target: MarketPair,
    pub outcome: TargetOutcome,
}

/// What a call to `tick` did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TickOutcome {
    /// Hedge interval has not elapsed
    NotDue,
    /// Active orders exist; hedging deferred
    OrdersPending { active: usize, cancelled: usize },
    Evaluated(Vec<TargetReport>),
}

/// Keeps tracked exposure within the configured hedge ratio.
pub struct HedgeEngine {
    config: HedgeConfig,
    strategy: HedgeStrategy,
    hedge_pairs: Vec<MarketPair>,
    tracked_pairs: Vec<MarketPair>,
    aggregator: ExposureAggregator,
    pricing: PricingAdjuster,
    builder: OrderCandidateBuilder,
    gate: OrderLifecycleGate,
    variant: HedgeVariant,
    interval: Duration,
    span: Span,
    last_run: Option<DateTime<Utc>>,
}

impl HedgeEngine {
    /// Build an engine. Fails on invalid parameters, a missing hedge target
    /// or a market on an unregistered venue.
    pub fn new(
        config: HedgeConfig,
        markets: &MarketsConfig,
        venues: VenueRegistry,
        variant: HedgeVariant,
        span: Span,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| HedgeError::InvalidConfig(e.to_string()))?;

        let hedge_pairs = markets.hedge_pairs();
        let tracked_pairs = markets.tracked_pairs();
        let strategy = HedgeStrategy::new(config.mode, &hedge_pairs, &tracked_pairs)?;
        for pair in hedge_pairs.iter().chain(tracked_pairs.iter()) {
            venues.get(&pair.venue)?;
        }

        let mut aggregator = ExposureAggregator::new(venues, markets.offsets());
        if let HedgeVariant::ExternalPosition(external) = &variant {
            aggregator = aggregator.with_external(external.clone());
        }

        let interval = i64::try_from(config.hedge_interval_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| HedgeError::InvalidConfig("hedge_interval_secs out of range".into()))?;

        Ok(Self {
            pricing: PricingAdjuster::new(config.slippage),
            builder: OrderCandidateBuilder::new(
                config.min_trade_size,
                Decimal::from(config.leverage),
                config.position_mode,
            ),
            gate: OrderLifecycleGate::from_secs(config.max_order_age_secs),
            config,
            strategy,
            hedge_pairs,
            tracked_pairs,
            aggregator,
            variant,
            interval,
            span,
            last_run: None,
        })
    }

    pub fn config(&self) -> &HedgeConfig {
        &self.config
    }

    pub fn strategy(&self) -> &HedgeStrategy {
        &self.strategy
    }

    pub fn venues(&self) -> &VenueRegistry {
        self.aggregator.venues()
    }

    /// Record the start time and configure leverage and position mode on
    /// derivative hedge venues.
    pub async fn start(&mut self, now: DateTime<Utc>) {
        self.last_run = Some(now);
        let span = self.span.clone();
        self.apply_initial_setting().instrument(span).await;
    }

    async fn apply_initial_setting(&self) {
        let Some(first) = self.hedge_pairs.first() else {
            return;
        };
        if !matches!(self.aggregator.is_derivative(first), Ok(true)) {
            return;
        }
        warn!(
            "Please ensure that the position mode on {} is set to {}. \
             The engine will try to set it automatically; ignore this message if it already is.",
            first.venue, self.config.position_mode
        );

        for pair in &self.hedge_pairs {
            let Ok(venue) = self.aggregator.venue(pair) else {
                continue;
            };
            if !venue.market().is_derivative() {
                continue;
            }
            let router = venue.router();
            if let Err(e) = router
                .set_leverage(&pair.trading_pair, self.config.leverage)
                .await
            {
                warn!(%pair, error = %e, "Failed to set leverage");
            }
            if let Err(e) = router.set_position_mode(self.config.position_mode).await {
                warn!(%pair, error = %e, "Failed to set position mode");
            }
        }
    }

    fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_run {
            Some(last) => now.signed_duration_since(last) >= self.interval,
            None => true,
        }
    }

    /// Run one scheduling tick.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let span = self.span.clone();
        self.run_cycle(now).instrument(span).await
    }

    async fn run_cycle(&mut self, now: DateTime<Utc>) -> TickOutcome {
        debug!("tick...");
        if !self.is_due(now) {
            return TickOutcome::NotDue;
        }
        self.last_run = Some(now);

        if let GateState::Blocked { active, cancelled } =
            self.gate.check(self.aggregator.venues(), now).await
        {
            info!(active, cancelled, "Active orders present.");
            return TickOutcome::OrdersPending { active, cancelled };
        }

        if let HedgeVariant::ExternalPosition(external) = &self.variant {
            if let Err(e) = external.reconcile().await {
                warn!(error = %e, "External exposure reconciliation failed");
            }
            log_explain(external.as_ref());
        }

        debug!("Checking hedge conditions...");
        let mut reports = Vec::new();
        for plan in self.plan() {
            reports.push(self.execute(plan).await);
        }
        TickOutcome::Evaluated(reports)
    }

    /// Compute order candidates for every hedge target from the current
    /// snapshot. Places nothing.
    pub fn plan(&self) -> Vec<TargetPlan> {
        self.strategy
            .groups()
            .iter()
            .map(|group| TargetPlan {
                target: group.target.clone(),
                outcome: self.plan_target(group),
            })
            .collect()
    }

    fn plan_target(&self, group: &HedgeGroup) -> PlanOutcome {
        let order = match self.hedge_order(group) {
            Ok(order) => order,
            Err(e) => {
                warn!(pair = %group.target, error = %e, "Hedge computation failed");
                return PlanOutcome::Failed(e);
            }
        };
        if order.amount == Decimal::ZERO {
            debug!(pair = %group.target, "No hedge required.");
            return PlanOutcome::NoHedge(order.decision);
        }

        info!(
            pair = %group.target,
            mode = ?self.strategy.mode(),
            direction = %OrderSide::from_is_buy(order.is_buy),
            price = %order.price,
            amount = %order.amount,
            "Hedging"
        );

        match self.order_candidates(&order) {
            Ok(candidates) => {
                if candidates.is_empty() {
                    info!(pair = %group.target, "No order candidates.");
                }
                PlanOutcome::Candidates { order, candidates }
            }
            Err(e) => {
                warn!(pair = %group.target, error = %e, "Candidate construction failed");
                PlanOutcome::Failed(e)
            }
        }
    }

    /// Direction, amount and price to hedge for one group.
    pub fn hedge_order(&self, group: &HedgeGroup) -> Result<HedgeOrder> {
        match &self.strategy {
            HedgeStrategy::ByValue(_) => self.hedge_order_by_value(group),
            HedgeStrategy::ByAmount(_) => self.hedge_order_by_amount(group),
        }
    }

    fn hedge_order_by_value(&self, group: &HedgeGroup) -> Result<HedgeOrder> {
        let values = group
            .tracked
            .iter()
            .map(|pair| self.aggregator.base_value(pair))
            .collect::<Result<Vec<_>>>()?;
        let hedge_value = self.aggregator.base_value(&group.target)?;
        let decision = hedge_by_value(&values, hedge_value, self.config.hedge_ratio);

        let mid = self.aggregator.mid_price(&group.target)?;
        if mid <= Decimal::ZERO {
            return Err(HedgeError::PriceUnavailable(group.target.clone()));
        }
        let market = self.aggregator.venue(&group.target)?.market();
        let trading_pair = &group.target.trading_pair;
        let amount = market.quantize_order_amount(trading_pair, decision.magnitude / mid);
        let price = market.quantize_order_price(
            trading_pair,
            self.pricing.adjusted_price(mid, decision.is_buy),
        );

        Ok(HedgeOrder {
            target: group.target.clone(),
            is_buy: decision.is_buy,
            amount,
            price,
            decision,
        })
    }

    fn hedge_order_by_amount(&self, group: &HedgeGroup) -> Result<HedgeOrder> {
        let tracked = self.aggregator.tracked_base_amount(group)?;
        let hedge_amount = self.aggregator.base_amount(&group.target)?;
        let decision = hedge_by_amount(&[tracked], hedge_amount, self.config.hedge_ratio);
        debug!(
            pair = %group.target,
            amount = %decision.magnitude,
            "Hedge by amount"
        );

        let market = self.aggregator.venue(&group.target)?.market();
        let trading_pair = &group.target.trading_pair;
        let amount = market.quantize_order_amount(trading_pair, decision.magnitude);
        if amount == Decimal::ZERO {
            return Ok(HedgeOrder {
                target: group.target.clone(),
                is_buy: decision.is_buy,
                amount,
                price: Decimal::ZERO,
                decision,
            });
        }

        // Size-aware reference price: the hedge may walk several book levels
        let reference = market.vwap_for_size(trading_pair, decision.is_buy, amount)?;
        let price = market.quantize_order_price(
            trading_pair,
            self.pricing.adjusted_price(reference, decision.is_buy),
        );

        Ok(HedgeOrder {
            target: group.target.clone(),
            is_buy: decision.is_buy,
            amount,
            price,
            decision,
        })
    }

    fn order_candidates(&self, order: &HedgeOrder) -> Result<Vec<OrderCandidate>> {
        let venue = self.aggregator.venue(&order.target)?;
        let market = venue.market();
        let trading_pair = &order.target.trading_pair;

        Ok(if market.is_derivative() {
            let positions = market.positions(trading_pair);
            self.builder.perpetual(
                trading_pair,
                &positions,
                venue.budget_checker(),
                order.is_buy,
                order.amount,
                order.price,
            )
        } else {
            self.builder.spot(
                trading_pair,
                venue.budget_checker(),
                order.is_buy,
                order.amount,
                order.price,
            )
        })
    }

    async fn execute(&self, plan: TargetPlan) -> TargetReport {
        let TargetPlan { target, outcome } = plan;
        let outcome = match outcome {
            PlanOutcome::NoHedge(_) => TargetOutcome::NoHedge,
            PlanOutcome::Failed(e) => TargetOutcome::Failed(e.to_string()),
            PlanOutcome::Candidates { candidates, .. } if candidates.is_empty() => {
                TargetOutcome::NoCandidates
            }
            PlanOutcome::Candidates { candidates, .. } => {
                match self.place_orders(&target, candidates).await {
                    Ok(placed) => TargetOutcome::Placed(placed),
                    Err(e) => TargetOutcome::Failed(e.to_string()),
                }
            }
        };
        TargetReport { target, outcome }
    }

    async fn place_orders(
        &self,
        target: &MarketPair,
        candidates: Vec<OrderCandidate>,
    ) -> Result<Vec<PlacedOrder>> {
        let router = self.aggregator.venue(target)?.router();
        info!(pair = %target, count = candidates.len(), "Placing orders");

        let mut placed = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            info!(
                pair = %target,
                action = ?candidate.position_action(),
                "Create {} {} {} at {}",
                candidate.side,
                candidate.amount,
                candidate.trading_pair,
                candidate.price
            );
            let order_id = match router.place(&candidate).await {
                Ok(order_id) => Some(order_id),
                Err(e) => {
                    error!(pair = %target, order = %candidate, error = %e, "Order placement failed");
                    None
                }
            };
            placed.push(PlacedOrder {
                candidate,
                order_id,
            });
        }
        Ok(placed)
    }

    fn all_pairs(&self) -> Vec<MarketPair> {
        self.hedge_pairs
            .iter()
            .chain(self.tracked_pairs.iter())
            .cloned()
            .collect()
    }

    /// Snapshot of balances, positions, active orders and, in value mode,
    /// the next hedge.
    pub fn status(&self) -> HedgeStatus {
        let value_summary = match &self.strategy {
            HedgeStrategy::ByValue(group) => Some(self.value_summary(group)),
            HedgeStrategy::ByAmount(_) => None,
        };
        HedgeStatus::collect(
            &self.aggregator,
            &self.all_pairs(),
            self.strategy.mode(),
            value_summary,
        )
    }

    fn value_summary(&self, group: &HedgeGroup) -> ValueSummary {
        let next_hedge = self
            .hedge_order(group)
            .ok()
            .filter(|order| order.amount > Decimal::ZERO)
            .map(|order| NextHedge {
                side: OrderSide::from_is_buy(order.is_buy),
                price: order.price,
                amount: order.amount,
            });
        ValueSummary {
            total_value: self.aggregator.total_value(&group.tracked).ok(),
            hedge_value: self.aggregator.base_value(&group.target).ok(),
            next_hedge,
        }
    }
}

fn log_explain(external: &dyn ExternalExposure) {
    for (path, value) in flatten_value(&external.explain()) {
        debug!(key = %join_path(&path, "."), %value, "Exposure explain");
    }
}
