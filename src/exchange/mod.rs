//! Venue integrations for the hedge engine.
//!
//! The engine reaches each venue through the seams in `traits`:
//! - Market data and position snapshots (`MarketView`)
//! - Balance-aware order sizing (`BudgetChecker`)
//! - Order placement and cancellation (`OrderRouter`)
//!
//! `paper` provides an in-memory venue and `external` an exposure source for
//! deposits held outside the connected venues.

pub mod external;
pub mod paper;
mod registry;
mod traits;
mod types;

pub use external::{DeltaFeedExposure, DeltaProvider, StaticDelta};
pub use paper::{PaperBook, PaperVenue};
pub use registry::VenueRegistry;
pub use traits::{BudgetChecker, ExternalExposure, MarketView, OrderRouter, Venue};
pub use types::*;

#[cfg(test)]
pub use traits::MockBudgetChecker;
