//! Error types for the hedge engine.

use crate::exchange::MarketPair;
use thiserror::Error;

/// Failures surfaced by the hedge engine and its collaborators.
#[derive(Error, Debug)]
pub enum HedgeError {
    /// A tracked or hedge pair has no configured offset.
    #[error("no offset configured for {0}")]
    MissingOffset(MarketPair),

    #[error("no hedge market pair configured")]
    NoHedgeTarget,

    #[error("hedge target {0} is not configured")]
    UnknownHedgeTarget(MarketPair),

    #[error("venue {0} is not registered")]
    UnknownVenue(String),

    #[error("price unavailable for {0}")]
    PriceUnavailable(MarketPair),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A collaborator (venue, exposure feed) failed.
    #[error("venue error: {0}")]
    Venue(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, HedgeError>;
