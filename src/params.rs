// 2.0 params.rs: all chain settings in one place. pool targets, maturity and
// expiry windows, retarget cadence, subsidy schedule constants, network presets.

use chrono::Duration;

use crate::types::{Amount, Height};

/// Immutable chain configuration. Every field is block-denominated unless
/// noted otherwise. Supplied once at simulator construction and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct ChainParameters {
    /// Votes required per block once stake validation begins.
    pub tickets_per_block: u16,
    /// Target number of price windows worth of live tickets. The target live
    /// pool is `tickets_per_block * ticket_pool_size`.
    pub ticket_pool_size: u16,
    /// Blocks a purchased ticket waits before entering the live pool.
    pub ticket_maturity: u16,
    /// Blocks after purchase at which an unvoted live ticket expires.
    pub ticket_expiry: u32,
    /// Blocks before newly created coins (and vote/revocation returns)
    /// become spendable.
    pub coinbase_maturity: u16,
    /// Height at which voting begins. Below this, blocks carry zero votes.
    pub stake_validation_height: Height,
    /// Blocks between ticket price re-evaluations.
    pub stake_diff_window_size: i64,
    /// Number of past windows examined by windowed statistics such as VWAP.
    pub stake_diff_windows: i64,
    /// Hard cap on ticket purchases in a single block.
    pub max_fresh_stake_per_block: u8,
    /// Floor for the ticket price. Pricing policies must never return less.
    pub minimum_stake_diff: Amount,
    /// Wall-clock pacing of the chain; only used to convert calendar horizons
    /// (e.g. an expected payout in 28 days) into block counts.
    pub target_time_per_block: Duration,

    // subsidy schedule constants, see subsidy.rs
    pub base_subsidy: i64,
    pub mul_subsidy: i64,
    pub div_subsidy: i64,
    pub subsidy_reduction_interval: i64,
    pub work_reward_proportion: u16,
    pub stake_reward_proportion: u16,
    pub block_tax_proportion: u16,
    /// One-off subsidy paid out in block 1.
    pub block_one_subsidy: Amount,
}

impl ChainParameters {
    /// Production-scale network parameters.
    pub fn mainnet() -> Self {
        Self {
            tickets_per_block: 5,
            ticket_pool_size: 8192,
            ticket_maturity: 256,
            ticket_expiry: 40960,
            coinbase_maturity: 256,
            stake_validation_height: 4096,
            stake_diff_window_size: 144,
            stake_diff_windows: 20,
            max_fresh_stake_per_block: 20,
            minimum_stake_diff: Amount::from_coins(2),
            target_time_per_block: Duration::minutes(5),
            base_subsidy: 3_119_582_664,
            mul_subsidy: 100,
            div_subsidy: 101,
            subsidy_reduction_interval: 6144,
            work_reward_proportion: 6,
            stake_reward_proportion: 3,
            block_tax_proportion: 1,
            block_one_subsidy: Amount::from_coins(1_680_000),
        }
    }

    /// Small-window preset for tests and fast experiments. Retargets every 8
    /// blocks and matures tickets in 16, so full lifecycle transitions happen
    /// within a few hundred blocks instead of tens of thousands.
    pub fn simnet() -> Self {
        Self {
            tickets_per_block: 5,
            ticket_pool_size: 64,
            ticket_maturity: 16,
            ticket_expiry: 384,
            coinbase_maturity: 16,
            stake_validation_height: 32,
            stake_diff_window_size: 8,
            stake_diff_windows: 8,
            max_fresh_stake_per_block: 20,
            minimum_stake_diff: Amount::from_atoms(20_000),
            target_time_per_block: Duration::minutes(5),
            base_subsidy: 50_000_000_000,
            mul_subsidy: 100,
            div_subsidy: 101,
            subsidy_reduction_interval: 128,
            work_reward_proportion: 6,
            stake_reward_proportion: 3,
            block_tax_proportion: 1,
            block_one_subsidy: Amount::from_coins(168_000),
        }
    }

    /// Live pool size the pricing policies steer towards.
    pub fn target_pool_size(&self) -> i64 {
        i64::from(self.tickets_per_block) * i64::from(self.ticket_pool_size)
    }

    /// Sum of the subsidy split proportions.
    pub fn total_proportions(&self) -> i64 {
        i64::from(self.work_reward_proportion)
            + i64::from(self.stake_reward_proportion)
            + i64::from(self.block_tax_proportion)
    }

    /// Check the parameter set for internal consistency.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.tickets_per_block == 0 || self.ticket_pool_size == 0 {
            return Err(ParamsError::InvalidPool {
                reason: "tickets per block and pool size must be positive".to_string(),
            });
        }
        if u32::from(self.ticket_maturity) >= self.ticket_expiry {
            return Err(ParamsError::InvalidPool {
                reason: "ticket expiry must exceed ticket maturity".to_string(),
            });
        }
        if self.stake_diff_window_size <= 0 || self.stake_diff_windows <= 0 {
            return Err(ParamsError::InvalidWindow {
                reason: "retarget window size and count must be positive".to_string(),
            });
        }
        if self.stake_validation_height <= Height::from(self.ticket_maturity) {
            return Err(ParamsError::InvalidWindow {
                reason: "stake validation height must exceed ticket maturity".to_string(),
            });
        }
        if u16::from(self.max_fresh_stake_per_block) < self.tickets_per_block {
            return Err(ParamsError::InvalidPool {
                reason: "purchase cap cannot replace fewer tickets than are voted".to_string(),
            });
        }
        if self.minimum_stake_diff <= Amount::ZERO {
            return Err(ParamsError::InvalidSubsidy {
                reason: "minimum stake difficulty must be positive".to_string(),
            });
        }
        if self.target_time_per_block <= Duration::zero() {
            return Err(ParamsError::InvalidWindow {
                reason: "target time per block must be positive".to_string(),
            });
        }
        if self.base_subsidy < 0
            || self.mul_subsidy <= 0
            || self.div_subsidy <= 0
            || self.subsidy_reduction_interval <= 0
        {
            return Err(ParamsError::InvalidSubsidy {
                reason: "subsidy schedule constants must be positive".to_string(),
            });
        }
        if self.total_proportions() == 0 {
            return Err(ParamsError::InvalidSubsidy {
                reason: "subsidy split proportions sum to zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Parameter validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamsError {
    #[error("invalid pool configuration: {reason}")]
    InvalidPool { reason: String },

    #[error("invalid window configuration: {reason}")]
    InvalidWindow { reason: String },

    #[error("invalid subsidy configuration: {reason}")]
    InvalidSubsidy { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        assert!(ChainParameters::mainnet().validate().is_ok());
        assert!(ChainParameters::simnet().validate().is_ok());
    }

    #[test]
    fn mainnet_targets() {
        let params = ChainParameters::mainnet();
        assert_eq!(params.target_pool_size(), 40_960);
        assert_eq!(params.total_proportions(), 10);
        assert_eq!(params.minimum_stake_diff, Amount::from_atoms(200_000_000));
    }

    #[test]
    fn expiry_must_exceed_maturity() {
        let mut params = ChainParameters::simnet();
        params.ticket_expiry = u32::from(params.ticket_maturity);
        assert!(matches!(
            params.validate(),
            Err(ParamsError::InvalidPool { .. })
        ));
    }

    #[test]
    fn retarget_window_must_be_positive() {
        let mut params = ChainParameters::simnet();
        params.stake_diff_window_size = 0;
        assert!(matches!(
            params.validate(),
            Err(ParamsError::InvalidWindow { .. })
        ));
    }
}
