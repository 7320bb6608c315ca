//! Configuration management for the hedge engine.
//!
//! Loads settings from an optional `hedge` config file and `HEDGE__`-prefixed
//! environment variables.

use crate::exchange::{MarketPair, PositionMode};
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Hedging parameters
    #[serde(default)]
    pub hedge: HedgeConfig,
    /// Hedge targets and tracked instruments
    #[serde(default)]
    pub markets: MarketsConfig,
    /// Where tracked exposure comes from
    #[serde(default)]
    pub exposure: ExposureSourceConfig,
    /// Paper venues for the simulated driver
    #[serde(default)]
    pub paper: PaperConfig,
}

/// Immutable run parameters of the hedge engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgeConfig {
    /// Fraction of aggregate tracked exposure to offset (typically 0.0-1.0)
    #[serde(default = "default_hedge_ratio")]
    pub hedge_ratio: Decimal,
    /// Leverage applied to derivative hedge pairs
    #[serde(default = "default_leverage")]
    pub leverage: u32,
    /// Slippage fraction applied to the hedge price (0.02 = 2%)
    #[serde(default = "default_slippage")]
    pub slippage: Decimal,
    /// Minimum order notional in quote currency
    #[serde(default)]
    pub min_trade_size: Decimal,
    /// Seconds between hedge evaluations
    #[serde(default = "default_hedge_interval")]
    pub hedge_interval_secs: u64,
    /// Resting orders older than this are cancelled
    #[serde(default = "default_max_order_age")]
    pub max_order_age_secs: u64,
    /// Seconds between status snapshots in the driver
    #[serde(default = "default_status_report_interval")]
    pub status_report_interval_secs: u64,
    /// Hedge by aggregate value or by base amount per asset
    #[serde(default)]
    pub mode: HedgeMode,
    /// Position mode to configure on derivative hedge venues
    #[serde(default)]
    pub position_mode: PositionMode,
}

/// Hedging algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HedgeMode {
    /// Offset the total notional value of all tracked markets with one hedge pair
    Value,
    /// Offset base amounts per asset, one hedge pair per trading pair
    #[default]
    Amount,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketsConfig {
    /// Instruments traded to perform the offset
    #[serde(default)]
    pub hedge: Vec<MarketPairConfig>,
    /// Instruments whose exposure is offset
    #[serde(default)]
    pub tracked: Vec<MarketPairConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketPairConfig {
    pub venue: String,
    pub trading_pair: String,
    /// Manual exposure correction in base asset units. Unset offsets count
    /// as zero and are reported by `AppConfig::validate`.
    #[serde(default)]
    pub offset: Option<Decimal>,
}

impl MarketPairConfig {
    pub fn pair(&self) -> MarketPair {
        MarketPair::new(&self.venue, &self.trading_pair)
    }
}

impl MarketsConfig {
    pub fn hedge_pairs(&self) -> Vec<MarketPair> {
        self.hedge.iter().map(MarketPairConfig::pair).collect()
    }

    pub fn tracked_pairs(&self) -> Vec<MarketPair> {
        self.tracked.iter().map(MarketPairConfig::pair).collect()
    }

    /// Offsets of every configured pair, hedge and tracked.
    pub fn offsets(&self) -> HashMap<MarketPair, Decimal> {
        self.hedge
            .iter()
            .chain(self.tracked.iter())
            .map(|market| (market.pair(), market.offset.unwrap_or(Decimal::ZERO)))
            .collect()
    }

    /// Pairs configured without an explicit offset.
    pub fn defaulted_offsets(&self) -> Vec<MarketPair> {
        self.hedge
            .iter()
            .chain(self.tracked.iter())
            .filter(|market| market.offset.is_none())
            .map(MarketPairConfig::pair)
            .collect()
    }
}

/// Source of tracked exposure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExposureSourceConfig {
    /// Positions and balances of the tracked venues
    #[default]
    Standard,
    /// Off-venue deposit: exposure per pair is `deposit_balance * delta`
    ExternalPosition {
        deposit_balance: Decimal,
        /// Normalized delta per trading pair
        #[serde(default)]
        deltas: HashMap<String, Decimal>,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperConfig {
    #[serde(default)]
    pub venues: Vec<PaperVenueConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperVenueConfig {
    pub name: String,
    #[serde(default)]
    pub derivative: bool,
    /// Quote currency balance (margin for derivative venues)
    #[serde(default = "default_paper_quote_balance")]
    pub quote_balance: Decimal,
    /// Base asset balances keyed by trading pair
    #[serde(default)]
    pub base_balances: HashMap<String, Decimal>,
    /// Mid prices keyed by trading pair
    #[serde(default)]
    pub prices: HashMap<String, Decimal>,
    #[serde(default)]
    pub lot_size: Decimal,
    #[serde(default)]
    pub tick_size: Decimal,
}

// Default value functions
fn default_hedge_ratio() -> Decimal {
    Decimal::ONE
}

fn default_leverage() -> u32 {
    1
}

fn default_slippage() -> Decimal {
    Decimal::new(2, 2) // 0.02
}

fn default_hedge_interval() -> u64 {
    60
}

fn default_max_order_age() -> u64 {
    5
}

fn default_status_report_interval() -> u64 {
    900
}

fn default_paper_quote_balance() -> Decimal {
    Decimal::new(10_000, 0)
}

impl Default for HedgeConfig {
    fn default() -> Self {
        Self {
            hedge_ratio: default_hedge_ratio(),
            leverage: default_leverage(),
            slippage: default_slippage(),
            min_trade_size: Decimal::ZERO,
            hedge_interval_secs: default_hedge_interval(),
            max_order_age_secs: default_max_order_age(),
            status_report_interval_secs: default_status_report_interval(),
            mode: HedgeMode::default(),
            position_mode: PositionMode::default(),
        }
    }
}

impl HedgeConfig {
    /// Validate hedging parameters.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.hedge_ratio >= Decimal::ZERO,
            "hedge_ratio must not be negative"
        );
        anyhow::ensure!(
            self.slippage >= Decimal::ZERO && self.slippage < Decimal::ONE,
            "slippage must be in [0, 1)"
        );
        anyhow::ensure!(self.leverage >= 1, "leverage must be >= 1");
        anyhow::ensure!(
            self.min_trade_size >= Decimal::ZERO,
            "min_trade_size must not be negative"
        );
        anyhow::ensure!(self.hedge_interval_secs > 0, "hedge_interval_secs must be > 0");
        anyhow::ensure!(self.max_order_age_secs > 0, "max_order_age_secs must be > 0");
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from an optional file and environment variables.
    pub fn load(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::default().separator("__").prefix("HEDGE"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        self.hedge.validate()?;

        anyhow::ensure!(
            !self.markets.hedge.is_empty(),
            "at least one hedge market pair is required"
        );

        if self.hedge.mode == HedgeMode::Amount {
            for hedge in &self.markets.hedge {
                let tracked = self
                    .markets
                    .tracked
                    .iter()
                    .filter(|m| m.trading_pair == hedge.trading_pair)
                    .count();
                if tracked == 0 {
                    tracing::warn!(
                        pair = %hedge.pair(),
                        "hedge pair has no tracked market with the same trading pair"
                    );
                }
            }
        }

        for pair in self.markets.defaulted_offsets() {
            tracing::warn!(%pair, "no offset configured, using 0");
        }

        let mut seen = std::collections::HashSet::new();
        for market in self.markets.hedge.iter().chain(self.markets.tracked.iter()) {
            anyhow::ensure!(
                seen.insert(market.pair()),
                "market pair {} is configured more than once",
                market.pair()
            );
        }

        if let ExposureSourceConfig::ExternalPosition { deposit_balance, .. } = &self.exposure {
            anyhow::ensure!(
                *deposit_balance >= Decimal::ZERO,
                "deposit_balance must not be negative"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn market(venue: &str, pair: &str, offset: Decimal) -> MarketPairConfig {
        MarketPairConfig {
            venue: venue.to_string(),
            trading_pair: pair.to_string(),
            offset: Some(offset),
        }
    }

    fn test_config() -> AppConfig {
        AppConfig {
            markets: MarketsConfig {
                hedge: vec![market("perp", "ETH-USDT", Decimal::ZERO)],
                tracked: vec![market("spot", "ETH-USDT", dec!(0.5))],
            },
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_default_hedge_config_is_valid() {
        assert!(HedgeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_requires_hedge_pair() {
        assert!(AppConfig::default().validate().is_err());
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_slippage() {
        let mut config = test_config();
        config.hedge.slippage = dec!(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_market_pairs() {
        let mut config = test_config();
        config.markets.tracked.push(market("spot", "ETH-USDT", Decimal::ZERO));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_offsets_cover_all_pairs() {
        let offsets = test_config().markets.offsets();
        assert_eq!(offsets.len(), 2);
        assert_eq!(offsets[&MarketPair::new("spot", "ETH-USDT")], dec!(0.5));
    }

    #[test]
    fn test_unset_offset_is_reported() {
        let json = r#"{
            "markets": {
                "hedge": [{"venue": "perp", "trading_pair": "ETH-USDT"}],
                "tracked": [{"venue": "spot", "trading_pair": "ETH-USDT", "offset": "0"}]
            }
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();

        assert_eq!(
            config.markets.defaulted_offsets(),
            vec![MarketPair::new("perp", "ETH-USDT")]
        );
        assert_eq!(
            config.markets.offsets()[&MarketPair::new("perp", "ETH-USDT")],
            Decimal::ZERO
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_modes() {
        let json = r#"{
            "hedge": {"hedge_ratio": "0.8", "mode": "value", "position_mode": "HEDGE"},
            "exposure": {"kind": "external_position", "deposit_balance": "1000"}
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.hedge.mode, HedgeMode::Value);
        assert_eq!(config.hedge.position_mode, PositionMode::Hedge);
        assert_eq!(config.hedge.hedge_ratio, dec!(0.8));
        assert_eq!(config.hedge.slippage, dec!(0.02));
        assert!(matches!(
            config.exposure,
            ExposureSourceConfig::ExternalPosition { deposit_balance, .. } if deposit_balance == dec!(1000)
        ));
    }
}
