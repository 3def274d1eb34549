// 3.0 subsidy.rs: the height-indexed coin issuance schedule. pure functions of
// (params, height, voters); the driver folds these into per-block supply totals
// and pricing policies read the estimate for supply-relative price ceilings.

use crate::params::ChainParameters;
use crate::types::{Amount, Height};

impl ChainParameters {
    /// Full subsidy for a block at the given height, before the
    /// work/stake/tax split. Block 0 pays nothing, block 1 pays the one-off
    /// premine, and every `subsidy_reduction_interval` blocks thereafter the
    /// base subsidy is reduced by `mul_subsidy / div_subsidy`.
    pub fn full_subsidy(&self, height: Height) -> Amount {
        if height <= 0 {
            return Amount::ZERO;
        }
        if height == 1 {
            return self.block_one_subsidy;
        }

        let mut subsidy = self.base_subsidy;
        let reductions = height / self.subsidy_reduction_interval;
        for _ in 0..reductions {
            subsidy *= self.mul_subsidy;
            subsidy /= self.div_subsidy;
        }
        Amount::from_atoms(subsidy)
    }

    /// Proof-of-work portion of the block subsidy. Once voting has started
    /// the reward scales with the fraction of required votes that were cast.
    pub fn work_subsidy(&self, height: Height, voters: u16) -> Amount {
        let full = self.full_subsidy(height);
        let work = full
            .mul_int(i64::from(self.work_reward_proportion))
            .div_int(self.total_proportions());
        self.scale_by_voters(work, height, voters)
    }

    /// Whole proof-of-stake portion of the block subsidy.
    pub fn pos_subsidy(&self, height: Height) -> Amount {
        self.full_subsidy(height)
            .mul_int(i64::from(self.stake_reward_proportion))
            .div_int(self.total_proportions())
    }

    /// Subsidy paid to a single vote at the given height.
    pub fn stake_subsidy_per_vote(&self, height: Height) -> Amount {
        self.pos_subsidy(height)
            .div_int(i64::from(self.tickets_per_block))
    }

    /// Treasury portion of the block subsidy, scaled like the work portion.
    pub fn tax_subsidy(&self, height: Height, voters: u16) -> Amount {
        let full = self.full_subsidy(height);
        let tax = full
            .mul_int(i64::from(self.block_tax_proportion))
            .div_int(self.total_proportions());
        self.scale_by_voters(tax, height, voters)
    }

    fn scale_by_voters(&self, portion: Amount, height: Height, voters: u16) -> Amount {
        if height < self.stake_validation_height {
            return portion;
        }
        portion
            .mul_int(i64::from(voters))
            .div_int(i64::from(self.tickets_per_block))
    }

    /// Estimate of the coin supply just before the block at the given height.
    /// Walks the reduction intervals in bulk rather than per block; exact for
    /// a chain with every block fully approved, which is all the pricing
    /// policies need.
    pub fn estimate_supply(&self, height: Height) -> Amount {
        if height <= 0 {
            return Amount::ZERO;
        }

        // Bulk-add every reduction interval at its subsidy level, then the
        // partial interval at the current level.
        let mut supply = self.block_one_subsidy.atoms();
        let mut subsidy = self.base_subsidy;
        let reductions = height / self.subsidy_reduction_interval;
        for _ in 0..reductions {
            supply += self.subsidy_reduction_interval * subsidy;
            subsidy *= self.mul_subsidy;
            subsidy /= self.div_subsidy;
        }
        supply += (height % self.subsidy_reduction_interval) * subsidy;

        // Blocks 0 and 1 were counted at the base subsidy above even though
        // they pay nothing and the premine respectively.
        supply -= self.base_subsidy * 2;

        Amount::from_atoms(supply)
    }
}
