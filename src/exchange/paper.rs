//! Paper venue for simulated hedging and tests.
//!
//! Keeps prices, balances, positions and resting orders in memory and
//! implements every venue seam. Orders fill immediately at their limit price
//! unless the venue is built with `resting_orders()`.

use super::traits::{BudgetChecker, MarketView, OrderRouter, Venue};
use super::types::*;
use crate::config::PaperVenueConfig;
use crate::utils::decimal::{round_down_to_lot, round_to_tick, safe_div, weighted_average};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Price levels of a simulated order book, best first.
#[derive(Debug, Clone, Default)]
pub struct PaperBook {
    pub bids: Vec<(Decimal, Decimal)>,
    pub asks: Vec<(Decimal, Decimal)>,
}

/// Mutable state of a paper venue.
#[derive(Debug)]
struct PaperState {
    ready: bool,
    quote_balance: Decimal,
    base_balances: HashMap<String, Decimal>,
    prices: HashMap<String, Decimal>,
    books: HashMap<String, PaperBook>,
    positions: HashMap<(String, PositionSide), Position>,
    active_orders: Vec<ActiveOrder>,
    leverage: HashMap<String, u32>,
    position_mode: PositionMode,
    placed: Vec<OrderCandidate>,
    cancelled: Vec<String>,
}

impl Default for PaperState {
    fn default() -> Self {
        Self {
            ready: true,
            quote_balance: Decimal::new(10_000, 0),
            base_balances: HashMap::new(),
            prices: HashMap::new(),
            books: HashMap::new(),
            positions: HashMap::new(),
            active_orders: Vec::new(),
            leverage: HashMap::new(),
            position_mode: PositionMode::Oneway,
            placed: Vec::new(),
            cancelled: Vec::new(),
        }
    }
}

/// In-memory spot or perpetual venue.
pub struct PaperVenue {
    name: String,
    derivative: bool,
    lot_size: Decimal,
    tick_size: Decimal,
    fill_on_place: bool,
    order_id_counter: AtomicU64,
    state: RwLock<PaperState>,
}

impl PaperVenue {
    fn new(name: &str, derivative: bool) -> Self {
        Self {
            name: name.to_string(),
            derivative,
            lot_size: Decimal::ZERO,
            tick_size: Decimal::ZERO,
            fill_on_place: true,
            order_id_counter: AtomicU64::new(1),
            state: RwLock::new(PaperState::default()),
        }
    }

    pub fn spot(name: &str) -> Self {
        Self::new(name, false)
    }

    pub fn perpetual(name: &str) -> Self {
        Self::new(name, true)
    }

    /// Build a venue from its config section.
    pub fn from_config(config: &PaperVenueConfig) -> Self {
        let venue = Self::new(&config.name, config.derivative)
            .with_lot_size(config.lot_size)
            .with_tick_size(config.tick_size);
        {
            let mut state = venue.write();
            state.quote_balance = config.quote_balance;
            state.base_balances = config.base_balances.clone();
            state.prices = config.prices.clone();
        }
        venue
    }

    pub fn with_lot_size(mut self, lot_size: Decimal) -> Self {
        self.lot_size = lot_size;
        self
    }

    pub fn with_tick_size(mut self, tick_size: Decimal) -> Self {
        self.tick_size = tick_size;
        self
    }

    /// Keep placed orders resting instead of filling them.
    pub fn resting_orders(mut self) -> Self {
        self.fill_on_place = false;
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, PaperState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, PaperState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_ready(&self, ready: bool) {
        self.write().ready = ready;
    }

    pub fn set_price(&self, trading_pair: &str, price: Decimal) {
        self.write().prices.insert(trading_pair.to_string(), price);
    }

    pub fn set_book(&self, trading_pair: &str, book: PaperBook) {
        self.write().books.insert(trading_pair.to_string(), book);
    }

    pub fn set_quote_balance(&self, balance: Decimal) {
        self.write().quote_balance = balance;
    }

    pub fn set_base_balance(&self, trading_pair: &str, balance: Decimal) {
        self.write()
            .base_balances
            .insert(trading_pair.to_string(), balance);
    }

    /// Set (or clear, with zero amount) the position on one side of a pair.
    pub fn set_position(
        &self,
        trading_pair: &str,
        side: PositionSide,
        amount: Decimal,
        entry_price: Decimal,
    ) {
        let mut state = self.write();
        let leverage = state.leverage.get(trading_pair).copied().unwrap_or(1);
        state.positions.insert(
            (trading_pair.to_string(), side),
            Position {
                trading_pair: trading_pair.to_string(),
                side,
                amount,
                entry_price,
                leverage,
            },
        );
    }

    pub fn insert_active_order(&self, order: ActiveOrder) {
        self.write().active_orders.push(order);
    }

    /// Orders accepted by `place`, in placement order.
    pub fn placed_orders(&self) -> Vec<OrderCandidate> {
        self.read().placed.clone()
    }

    /// Client order ids passed to `cancel`.
    pub fn cancelled_orders(&self) -> Vec<String> {
        self.read().cancelled.clone()
    }

    pub fn leverage(&self, trading_pair: &str) -> Option<u32> {
        self.read().leverage.get(trading_pair).copied()
    }

    pub fn position_mode(&self) -> PositionMode {
        self.read().position_mode
    }


    fn next_order_id(&self) -> String {
        format!("paper-{}", self.order_id_counter.fetch_add(1, Ordering::SeqCst))
    }

    /// Position amount on `side`, zero when flat.
    fn position_amount(state: &PaperState, trading_pair: &str, side: PositionSide) -> Decimal {
        state
            .positions
            .get(&(trading_pair.to_string(), side))
            .map(|p| p.amount)
            .unwrap_or(Decimal::ZERO)
    }

    fn apply_fill(&self, state: &mut PaperState, candidate: &OrderCandidate) {
        let pair = candidate.trading_pair.clone();
        let amount = candidate.amount;
        let price = candidate.price;

        if !self.derivative {
            let base = state.base_balances.entry(pair).or_insert(Decimal::ZERO);
            match candidate.side {
                OrderSide::Buy => {
                    *base += amount;
                    state.quote_balance -= amount * price;
                }
                OrderSide::Sell => {
                    *base -= amount;
                    state.quote_balance += amount * price;
                }
            }
            return;
        }

        let signed = if candidate.side.is_buy() { amount } else { -amount };
        let side = match (state.position_mode, candidate.position_action(), candidate.side) {
            (PositionMode::Oneway, _, _) => PositionSide::Both,
            (PositionMode::Hedge, PositionAction::Open, OrderSide::Buy) => PositionSide::Long,
            (PositionMode::Hedge, PositionAction::Open, OrderSide::Sell) => PositionSide::Short,
            (PositionMode::Hedge, PositionAction::Close, OrderSide::Buy) => PositionSide::Short,
            (PositionMode::Hedge, PositionAction::Close, OrderSide::Sell) => PositionSide::Long,
        };
        let leverage = state.leverage.get(&pair).copied().unwrap_or(1);
        let position = state
            .positions
            .entry((pair.clone(), side))
            .or_insert_with(|| Position {
                trading_pair: pair.clone(),
                side,
                amount: Decimal::ZERO,
                entry_price: price,
                leverage,
            });

        let previous = position.amount;
        position.amount += signed;
        // Entry price moves only when exposure grows
        if position.amount.abs() > previous.abs() {
            position.entry_price = weighted_average(&[
                (position.entry_price, previous.abs()),
                (price, amount),
            ]);
        }
    }
}

impl MarketView for PaperVenue {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_derivative(&self) -> bool {
        self.derivative
    }

    fn is_ready(&self) -> bool {
        self.read().ready
    }

    fn mid_price(&self, trading_pair: &str) -> Result<Decimal> {
        self.read()
            .prices
            .get(trading_pair)
            .copied()
            .ok_or_else(|| anyhow!("no price for {} on {}", trading_pair, self.name))
    }

    fn vwap_for_size(&self, trading_pair: &str, is_buy: bool, amount: Decimal) -> Result<Decimal> {
        let levels = {
            let state = self.read();
            state
                .books
                .get(trading_pair)
                .map(|book| if is_buy { book.asks.clone() } else { book.bids.clone() })
                .unwrap_or_default()
        };
        if levels.is_empty() {
            return self.mid_price(trading_pair);
        }

        let mut remaining = amount;
        let mut consumed = Vec::new();
        for (price, qty) in levels {
            if remaining <= Decimal::ZERO {
                break;
            }
            let take = qty.min(remaining);
            consumed.push((price, take));
            remaining -= take;
        }
        Ok(weighted_average(&consumed))
    }

    fn base_balance(&self, trading_pair: &str) -> Result<Decimal> {
        Ok(self
            .read()
            .base_balances
            .get(trading_pair)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    fn positions(&self, trading_pair: &str) -> Vec<Position> {
        let state = self.read();
        let mut positions: Vec<Position> = state
            .positions
            .values()
            .filter(|p| p.trading_pair == trading_pair && p.amount != Decimal::ZERO)
            .cloned()
            .collect();
        positions.sort_by_key(|p| p.side as u8);
        positions
    }

    fn quantize_order_price(&self, _trading_pair: &str, price: Decimal) -> Decimal {
        round_to_tick(price, self.tick_size)
    }

    fn quantize_order_amount(&self, _trading_pair: &str, amount: Decimal) -> Decimal {
        round_down_to_lot(amount, self.lot_size)
    }
}

impl BudgetChecker for PaperVenue {
    fn adjust_candidate(&self, mut candidate: OrderCandidate, all_or_none: bool) -> OrderCandidate {
        let state = self.read();
        let pair = &candidate.trading_pair;

        let affordable = match (&candidate.perpetual, candidate.side) {
            (None, OrderSide::Buy) => safe_div(state.quote_balance, candidate.price),
            (None, OrderSide::Sell) => state.base_balances.get(pair).copied().unwrap_or(Decimal::ZERO),
            (Some(terms), side) if terms.position_action == PositionAction::Close => {
                let closing = match (state.position_mode, side) {
                    (PositionMode::Oneway, _) => PositionSide::Both,
                    (PositionMode::Hedge, OrderSide::Buy) => PositionSide::Short,
                    (PositionMode::Hedge, OrderSide::Sell) => PositionSide::Long,
                };
                Self::position_amount(&state, pair, closing).abs()
            }
            (Some(terms), _) => {
                safe_div(state.quote_balance * terms.leverage, candidate.price)
            }
        };
        let affordable = round_down_to_lot(affordable.max(Decimal::ZERO), self.lot_size);

        if candidate.amount > affordable {
            candidate.amount = if all_or_none { Decimal::ZERO } else { affordable };
            debug!(
                venue = %self.name,
                pair = %candidate.trading_pair,
                amount = %candidate.amount,
                "Candidate reduced to available budget"
            );
        }
        candidate
    }
}

#[async_trait]
impl OrderRouter for PaperVenue {
    fn active_orders(&self) -> Vec<ActiveOrder> {
        self.read().active_orders.clone()
    }

    async fn place(&self, candidate: &OrderCandidate) -> Result<String> {
        let order_id = self.next_order_id();
        let mut state = self.write();
        state.placed.push(candidate.clone());

        if self.fill_on_place {
            self.apply_fill(&mut state, candidate);
            info!(venue = %self.name, %order_id, order = %candidate, "Paper order filled");
        } else {
            let created_at: DateTime<Utc> = Utc::now();
            state.active_orders.push(ActiveOrder {
                client_order_id: order_id.clone(),
                trading_pair: candidate.trading_pair.clone(),
                side: candidate.side,
                quantity: candidate.amount,
                price: candidate.price,
                created_at,
            });
            info!(venue = %self.name, %order_id, order = %candidate, "Paper order resting");
        }
        Ok(order_id)
    }

    async fn cancel(&self, trading_pair: &str, client_order_id: &str) -> Result<()> {
        let mut state = self.write();
        state.cancelled.push(client_order_id.to_string());
        state
            .active_orders
            .retain(|o| !(o.client_order_id == client_order_id && o.trading_pair == trading_pair));
        Ok(())
    }

    async fn set_leverage(&self, trading_pair: &str, leverage: u32) -> Result<()> {
        anyhow::ensure!(self.derivative, "{} does not support leverage", self.name);
        self.write().leverage.insert(trading_pair.to_string(), leverage);
        Ok(())
    }

    async fn set_position_mode(&self, mode: PositionMode) -> Result<()> {
        anyhow::ensure!(self.derivative, "{} does not support position modes", self.name);
        self.write().position_mode = mode;
        Ok(())
    }
}

impl Venue for PaperVenue {
    fn market(&self) -> &dyn MarketView {
        self
    }

    fn budget_checker(&self) -> &dyn BudgetChecker {
        self
    }

    fn router(&self) -> &dyn OrderRouter {
        self
    }
}
