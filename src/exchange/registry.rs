//! Lookup of connected venues by name.

use super::Venue;
use crate::error::{HedgeError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Connected venues keyed by `MarketView::name`.
#[derive(Clone, Default)]
pub struct VenueRegistry {
    venues: BTreeMap<String, Arc<dyn Venue>>,
}

impl VenueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a venue, replacing any venue with the same name.
    pub fn register(&mut self, venue: Arc<dyn Venue>) {
        let name = venue.market().name().to_string();
        self.venues.insert(name, venue);
    }

    pub fn with(mut self, venue: Arc<dyn Venue>) -> Self {
        self.register(venue);
        self
    }

    pub fn get(&self, name: &str) -> Result<&dyn Venue> {
        self.venues
            .get(name)
            .map(|venue| venue.as_ref())
            .ok_or_else(|| HedgeError::UnknownVenue(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.venues.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn Venue)> {
        self.venues
            .iter()
            .map(|(name, venue)| (name.as_str(), venue.as_ref()))
    }

    /// True when every registered venue reports ready.
    pub fn all_ready(&self) -> bool {
        self.venues.values().all(|venue| venue.market().is_ready())
    }
}

impl std::fmt::Debug for VenueRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.venues.keys()).finish()
    }
}
