//! Exposure aggregation across derivative and spot instruments.

use super::calculator::HedgeGroup;
use crate::error::{HedgeError, Result};
use crate::exchange::{ExternalExposure, MarketPair, Position, PositionSide, Venue, VenueRegistry};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Net signed amount of a set of positions: LONG and BOTH count as reported,
/// SHORT always counts negative.
pub fn net_position_amount(positions: &[Position]) -> Decimal {
    positions
        .iter()
        .map(|position| match position.side {
            PositionSide::Long | PositionSide::Both => position.amount,
            PositionSide::Short => -position.amount.abs(),
        })
        .sum()
}

/// Converts venue positions and balances plus per-pair offsets into signed
/// base amounts and values.
#[derive(Clone)]
pub struct ExposureAggregator {
    venues: VenueRegistry,
    offsets: HashMap<MarketPair, Decimal>,
    external: Option<Arc<dyn ExternalExposure>>,
}

impl ExposureAggregator {
    pub fn new(venues: VenueRegistry, offsets: HashMap<MarketPair, Decimal>) -> Self {
        Self {
            venues,
            offsets,
            external: None,
        }
    }

    /// Source tracked amounts from an external exposure feed instead of the
    /// tracked venues.
    pub fn with_external(mut self, external: Arc<dyn ExternalExposure>) -> Self {
        self.external = Some(external);
        self
    }

    pub fn venues(&self) -> &VenueRegistry {
        &self.venues
    }

    pub fn venue(&self, pair: &MarketPair) -> Result<&dyn Venue> {
        self.venues.get(&pair.venue)
    }

    pub fn is_derivative(&self, pair: &MarketPair) -> Result<bool> {
        Ok(self.venue(pair)?.market().is_derivative())
    }

    pub fn offset(&self, pair: &MarketPair) -> Result<Decimal> {
        self.offsets
            .get(pair)
            .copied()
            .ok_or_else(|| HedgeError::MissingOffset(pair.clone()))
    }

    /// Open positions on a pair, optionally restricted to one side.
    pub fn positions_for(
        &self,
        pair: &MarketPair,
        side: Option<PositionSide>,
    ) -> Result<Vec<Position>> {
        let positions = self.venue(pair)?.market().positions(&pair.trading_pair);
        Ok(match side {
            Some(side) => positions.into_iter().filter(|p| p.side == side).collect(),
            None => positions,
        })
    }

    pub fn mid_price(&self, pair: &MarketPair) -> Result<Decimal> {
        self.venue(pair)?
            .market()
            .mid_price(&pair.trading_pair)
            .map_err(|e| {
                debug!(%pair, error = %e, "Mid price lookup failed");
                HedgeError::PriceUnavailable(pair.clone())
            })
    }

    /// Signed base amount: net position amount for derivatives, spot balance
    /// otherwise, plus the configured offset.
    pub fn base_amount(&self, pair: &MarketPair) -> Result<Decimal> {
        let offset = self.offset(pair)?;
        let market = self.venue(pair)?.market();
        let amount = if market.is_derivative() {
            net_position_amount(&market.positions(&pair.trading_pair))
        } else {
            market.base_balance(&pair.trading_pair)?
        };
        Ok(amount + offset)
    }

    /// Base amount valued at the pair's mid price.
    pub fn base_value(&self, pair: &MarketPair) -> Result<Decimal> {
        Ok(self.base_amount(pair)? * self.mid_price(pair)?)
    }

    /// Tracked base amount for a hedge group: the external feed's exposure
    /// for the target's trading pair when configured, else the sum over the
    /// group's tracked pairs.
    pub fn tracked_base_amount(&self, group: &HedgeGroup) -> Result<Decimal> {
        if let Some(external) = &self.external {
            return Ok(external.base_amount(&group.target.trading_pair)?);
        }
        group
            .tracked
            .iter()
            .map(|pair| self.base_amount(pair))
            .sum()
    }

    /// Total value of a set of tracked pairs.
    pub fn total_value(&self, pairs: &[MarketPair]) -> Result<Decimal> {
        pairs.iter().map(|pair| self.base_value(pair)).sum()
    }
}
