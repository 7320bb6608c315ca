//! Exposure held outside the connected venues.
//!
//! A deposit (for example a liquidity-pool share) carries exposure to several
//! assets at once. Each asset's share is reported by a `DeltaProvider` as a
//! normalized delta; the exposure for a pair is `deposit_balance * delta`.

use super::traits::ExternalExposure;
use crate::utils::{gather, DEFAULT_GATHER_LIMIT};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Reports the normalized delta of one trading pair's asset.
#[async_trait]
pub trait DeltaProvider: Send + Sync {
    fn trading_pair(&self) -> &str;

    async fn fetch_delta(&self) -> Result<Decimal>;
}

/// Fixed delta, used for configured paper runs.
#[derive(Debug, Clone)]
pub struct StaticDelta {
    trading_pair: String,
    delta: Decimal,
}

impl StaticDelta {
    pub fn new(trading_pair: &str, delta: Decimal) -> Self {
        Self {
            trading_pair: trading_pair.to_string(),
            delta,
        }
    }
}

#[async_trait]
impl DeltaProvider for StaticDelta {
    fn trading_pair(&self) -> &str {
        &self.trading_pair
    }

    async fn fetch_delta(&self) -> Result<Decimal> {
        Ok(self.delta)
    }
}

#[derive(Debug, Default)]
struct DeltaSnapshot {
    deltas: HashMap<String, Decimal>,
    reconciled_at: Option<DateTime<Utc>>,
}

/// Deposit exposure refreshed from a set of delta providers.
pub struct DeltaFeedExposure {
    deposit_balance: Decimal,
    providers: Vec<Arc<dyn DeltaProvider>>,
    concurrency: usize,
    snapshot: RwLock<DeltaSnapshot>,
}

impl DeltaFeedExposure {
    pub fn new(deposit_balance: Decimal, providers: Vec<Arc<dyn DeltaProvider>>) -> Self {
        Self {
            deposit_balance,
            providers,
            concurrency: DEFAULT_GATHER_LIMIT,
            snapshot: RwLock::new(DeltaSnapshot::default()),
        }
    }

    /// Build a feed of fixed deltas keyed by trading pair.
    pub fn from_static(deposit_balance: Decimal, deltas: &HashMap<String, Decimal>) -> Self {
        let providers = deltas
            .iter()
            .map(|(pair, delta)| Arc::new(StaticDelta::new(pair, *delta)) as Arc<dyn DeltaProvider>)
            .collect();
        Self::new(deposit_balance, providers)
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn reconciled_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .reconciled_at
    }
}

#[async_trait]
impl ExternalExposure for DeltaFeedExposure {
    fn base_amount(&self, trading_pair: &str) -> Result<Decimal> {
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        snapshot
            .deltas
            .get(trading_pair)
            .map(|delta| self.deposit_balance * delta)
            .ok_or_else(|| anyhow!("no delta reconciled for {}", trading_pair))
    }

    async fn reconcile(&self) -> Result<()> {
        let fetches = self.providers.iter().map(|provider| provider.fetch_delta());
        let results = gather(fetches, self.concurrency).await;

        let mut refreshed = 0usize;
        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        for (provider, result) in self.providers.iter().zip(results) {
            match result {
                Ok(delta) => {
                    snapshot
                        .deltas
                        .insert(provider.trading_pair().to_string(), delta);
                    refreshed += 1;
                }
                Err(e) => {
                    // Previous delta stays cached
                    warn!(pair = provider.trading_pair(), error = %e, "Delta refresh failed");
                }
            }
        }
        snapshot.reconciled_at = Some(Utc::now());
        debug!(refreshed, total = self.providers.len(), "Reconciled external exposure");

        anyhow::ensure!(
            refreshed > 0 || self.providers.is_empty(),
            "all {} delta providers failed",
            self.providers.len()
        );
        Ok(())
    }

    fn explain(&self) -> Value {
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        let mut pairs = Map::new();
        for (pair, delta) in &snapshot.deltas {
            pairs.insert(
                pair.clone(),
                json!({
                    "delta": delta,
                    "exposure": self.deposit_balance * delta,
                }),
            );
        }
        json!({
            "reconciled_at": snapshot.reconciled_at.map(|t| t.to_rfc3339()),
            "deposit_balance": self.deposit_balance,
            "pairs": pairs,
        })
    }
}
