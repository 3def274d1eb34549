// 11.2: result types and errors for driver operations.

use std::fmt;

use crate::lifecycle::LifecycleError;
use crate::params::ParamsError;
use crate::replay::ReplayError;
use crate::types::{Amount, Height};

/// Driver errors. Policy violations are fatal by design: they mean the
/// policy under test is broken and must not be silently corrected. Nothing
/// here is retried.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("pricing policy returned {price} which is under the minimum allowed price of {minimum}")]
    PriceBelowMinimum { price: Amount, minimum: Amount },

    #[error("demand policy returned {value} which is not in the range [0, 1]")]
    DemandOutOfRange { value: f64 },

    #[error(
        "purchasing {requested} tickets at {price} requires {required} \
         but only {spendable} is spendable"
    )]
    InsufficientSupply {
        requested: u8,
        price: Amount,
        required: Amount,
        spendable: Amount,
    },

    #[error("unknown pricing policy {0:?}")]
    UnknownPricingPolicy(String),

    #[error("unknown demand policy {0:?}")]
    UnknownDemandPolicy(String),

    #[error(transparent)]
    Params(#[from] ParamsError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Replay(#[from] ReplayError),
}

/// Snapshot of where a run ended up, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimSummary {
    pub height: Height,
    pub ticket_price: Amount,
    pub pool_size: u32,
    pub immature: usize,
    pub missed: usize,
    pub total_supply: Amount,
    pub spendable_supply: Amount,
    pub staked_coins: Amount,
}

impl fmt::Display for SimSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "height {}: price {}, pool {} (+{} immature, {} missed), \
             supply {} ({} spendable, {} staked)",
            self.height,
            self.ticket_price,
            self.pool_size,
            self.immature,
            self.missed,
            self.total_supply,
            self.spendable_supply,
            self.staked_coins,
        )
    }
}
