// 11.1 engine/core.rs: the simulator itself. one instance owns one chain and
// one set of pools; comparing policies in parallel means independent
// instances, never shared state.

use std::collections::BTreeMap;
use std::io;

use crate::chain::{BlockSummary, Chain, ChainNode};
use crate::lifecycle::{BlockIntents, TicketLifecycleManager};
use crate::params::ChainParameters;
use crate::policy::{ChainView, DemandPolicy, PolicyRegistry, PricingPolicy};
use crate::replay::ReplayReader;
use crate::types::{Amount, Height};

use super::config::SimConfig;
use super::results::{SimError, SimSummary};

pub struct Simulator {
    params: ChainParameters,
    config: SimConfig,
    chain: Chain,
    lifecycle: TicketLifecycleManager,
    pricing: Box<dyn PricingPolicy>,
    demand: Box<dyn DemandPolicy>,
    // per-window purchase budget, refreshed at each retarget boundary
    demand_per_window: i64,
    // amounts that become spendable at a given height
    maturing: BTreeMap<Height, Amount>,
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("params", &self.params)
            .field("config", &self.config)
            .field("chain", &self.chain)
            .field("lifecycle", &self.lifecycle)
            .field("pricing", &"<dyn PricingPolicy>")
            .field("demand", &"<dyn DemandPolicy>")
            .field("demand_per_window", &self.demand_per_window)
            .field("maturing", &self.maturing)
            .finish()
    }
}

impl Simulator {
    pub fn new(
        params: ChainParameters,
        config: SimConfig,
        pricing: Box<dyn PricingPolicy>,
        demand: Box<dyn DemandPolicy>,
    ) -> Result<Self, SimError> {
        params.validate()?;
        let demand_per_window =
            i64::from(params.max_fresh_stake_per_block) * params.stake_diff_window_size;
        Ok(Self {
            lifecycle: TicketLifecycleManager::new(config.seed),
            chain: Chain::new(),
            maturing: BTreeMap::new(),
            params,
            config,
            pricing,
            demand,
            demand_per_window,
        })
    }

    /// Construct with named policies from a registry.
    pub fn from_registry(
        params: ChainParameters,
        config: SimConfig,
        registry: &PolicyRegistry,
        pricing_name: &str,
        demand_name: &str,
    ) -> Result<Self, SimError> {
        let pricing = registry
            .pricing(pricing_name)
            .ok_or_else(|| SimError::UnknownPricingPolicy(pricing_name.to_string()))?;
        let demand = registry
            .demand(demand_name)
            .ok_or_else(|| SimError::UnknownDemandPolicy(demand_name.to_string()))?;
        Self::new(params, config, pricing, demand)
    }

    pub fn params(&self) -> &ChainParameters {
        &self.params
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn lifecycle(&self) -> &TicketLifecycleManager {
        &self.lifecycle
    }

    /// Read-only view over current state, as handed to policies.
    pub fn view(&self) -> ChainView<'_> {
        ChainView::new(&self.params, &self.chain, &self.lifecycle)
    }

    /// Funds scheduled to become spendable at future heights.
    pub fn maturing_total(&self) -> Amount {
        self.maturing.values().sum()
    }

    pub fn summary(&self) -> Option<SimSummary> {
        let tip = self.chain.tip()?;
        Some(SimSummary {
            height: tip.height,
            ticket_price: tip.ticket_price,
            pool_size: tip.pool_size,
            immature: self.lifecycle.immature_count(),
            missed: self.lifecycle.missed_count(),
            total_supply: tip.total_supply,
            spendable_supply: tip.spendable_supply,
            staked_coins: tip.staked_coins,
        })
    }

    /// Ask the pricing policy for the next price and enforce its contract.
    fn query_price(&mut self) -> Result<Amount, SimError> {
        let view = ChainView::new(&self.params, &self.chain, &self.lifecycle);
        let price = self.pricing.next_price(&view);
        if price < self.params.minimum_stake_diff {
            return Err(SimError::PriceBelowMinimum {
                price,
                minimum: self.params.minimum_stake_diff,
            });
        }
        Ok(price)
    }

    /// Ask the demand policy for a fraction and enforce its contract.
    fn query_demand(&mut self, next_height: Height, price: Amount) -> Result<f64, SimError> {
        let view = ChainView::new(&self.params, &self.chain, &self.lifecycle);
        let value = self.demand.demand_fraction(&view, next_height, price);
        if !(0.0..=1.0).contains(&value) {
            return Err(SimError::DemandOutOfRange { value });
        }
        Ok(value)
    }

    /// Extend the chain by one block using explicit intents. This is the
    /// replay entry point; synthesized runs go through `run`.
    pub fn next_node(&mut self, intents: BlockIntents) -> Result<&ChainNode, SimError> {
        let price = self.query_price()?;
        self.connect_with_price(price, intents)
    }

    fn connect_with_price(
        &mut self,
        price: Amount,
        intents: BlockIntents,
    ) -> Result<&ChainNode, SimError> {
        let next_height = self.chain.next_height();
        let (parent_total, parent_spendable, parent_staked, parent_height, parent_voters) =
            match self.chain.tip() {
                Some(tip) => (
                    tip.total_supply,
                    tip.spendable_supply,
                    tip.staked_coins,
                    tip.height,
                    tip.voters,
                ),
                None => (Amount::ZERO, Amount::ZERO, Amount::ZERO, -1, 0),
            };

        // affordability against the parent's spendable supply, before any
        // state changes
        let required = price.mul_int(i64::from(intents.new_tickets));
        if required > parent_spendable {
            return Err(SimError::InsufficientSupply {
                requested: intents.new_tickets,
                price,
                required,
                spendable: parent_spendable,
            });
        }

        let transition = self
            .lifecycle
            .connect_block(next_height, price, &intents, &self.params)?;

        let coinbase_maturity = Height::from(self.params.coinbase_maturity);

        // the parent's coinbase joins the supply once this block's votes
        // approve it; the stake subsidy joins with the votes that earn it
        let mut total_supply = parent_total;
        if intents.prev_valid && parent_height >= 0 {
            let coinbase = self.coinbase_subsidy(parent_height, parent_voters);
            total_supply = total_supply.add(coinbase);
            self.schedule_maturing(parent_height + coinbase_maturity, coinbase);
        }
        let per_vote = self.params.stake_subsidy_per_vote(next_height);
        let vote_subsidy = per_vote.mul_int(transition.voted.len() as i64);
        total_supply = total_supply.add(vote_subsidy);

        // vote and revocation returns mature like coinbase
        self.schedule_maturing(
            next_height + coinbase_maturity,
            transition.voted_value().add(vote_subsidy),
        );
        self.schedule_maturing(next_height + coinbase_maturity, transition.revoked_value());

        let purchased_cost = transition.purchased_value();
        let staked_coins = parent_staked
            .add(purchased_cost)
            .sub(transition.voted_value())
            .sub(transition.revoked_value());

        let matured = self.maturing.remove(&next_height).unwrap_or(Amount::ZERO);
        let spendable_supply = parent_spendable.add(matured).sub(purchased_cost);

        let pool_size = self.lifecycle.live().len() as u32;
        let voters = transition.voted.len() as u16;
        let revocations = transition.revoked.len() as u16;
        let node = self.chain.advance(BlockSummary {
            ticket_price: price,
            pool_size,
            tickets_added: transition.purchased,
            total_supply,
            spendable_supply,
            staked_coins,
            voters,
            revocations,
        });

        if self.config.progress_interval > 0
            && next_height > 0
            && next_height % self.config.progress_interval == 0
        {
            tracing::info!(height = next_height, pool_size, price = %price, "block connected");
        }

        Ok(node)
    }

    // the premine is a single undivided payout; later blocks split by
    // proportion and scale with the approving votes
    fn coinbase_subsidy(&self, height: Height, voters: u16) -> Amount {
        if height == 1 {
            return self.params.block_one_subsidy;
        }
        self.params
            .work_subsidy(height, voters)
            .add(self.params.tax_subsidy(height, voters))
    }

    fn schedule_maturing(&mut self, height: Height, amount: Amount) {
        if amount.is_zero() {
            return;
        }
        let entry = self.maturing.entry(height).or_insert(Amount::ZERO);
        *entry = entry.add(amount);
    }

    /// Synthesize `num_blocks` blocks from the configured pricing and demand
    /// policies. The block count doubles as the iteration cap; stopping is
    /// always on a block boundary.
    pub fn run(&mut self, num_blocks: u64) -> Result<(), SimError> {
        let window_size = self.params.stake_diff_window_size;
        let max_per_window =
            i64::from(self.params.max_fresh_stake_per_block) * window_size;

        for _ in 0..num_blocks {
            let next_height = self.chain.next_height();
            let (total_supply, spendable_supply, staked_coins) = match self.chain.tip() {
                Some(tip) => (tip.total_supply, tip.spendable_supply, tip.staked_coins),
                None => (Amount::ZERO, Amount::ZERO, Amount::ZERO),
            };

            let next_price = self.query_price()?;

            // re-evaluate demand once per retarget window
            if next_height % window_size == 0 && next_height != 0 {
                let demand = self.query_demand(next_height, next_price)?;
                self.demand_per_window = (max_per_window as f64 * demand) as i64;
            }

            let mut new_tickets = (self.demand_per_window / window_size) as u8;

            // clamp to what the spendable supply can actually buy
            let max_possible = spendable_supply.atoms() / next_price.atoms();
            if i64::from(new_tickets) > max_possible {
                new_tickets = max_possible as u8;
            }

            // stake-share cap, relaxed inside the surge window of the run
            let h = next_height as u64;
            let (start_num, start_den) = self.config.surge_window_start;
            let (end_num, end_den) = self.config.surge_window_end;
            let outside_surge = h < num_blocks * start_num / start_den
                || h > num_blocks * end_num / end_den;
            let (cap_num, cap_den) = if outside_surge {
                self.config.base_stake_share
            } else {
                self.config.surge_stake_share
            };
            if new_tickets > 0 && staked_coins > total_supply.mul_int(cap_num).div_int(cap_den) {
                new_tickets = 0;
            }

            // vote every block once stake validation begins; revoke expired
            // tickets as soon as possible
            let voters = if next_height >= self.params.stake_validation_height {
                self.params.tickets_per_block
            } else {
                0
            };
            let intents = BlockIntents {
                new_tickets,
                ticket_ids: None,
                voters,
                revocations: self.lifecycle.missed_count() as u16,
                prev_valid: true,
            };
            self.connect_with_price(next_price, intents)?;
        }
        Ok(())
    }

    /// Replay recorded chain data. Every row is fully parsed and validated
    /// before the simulator state is touched; the first bad row aborts the
    /// run with no partial block applied. Returns the number of blocks
    /// replayed.
    pub fn run_replay<R: io::Read>(&mut self, input: R) -> Result<u64, SimError> {
        let mut blocks = 0u64;
        for row in ReplayReader::new(input) {
            let data = row?;
            self.next_node(data.to_intents())?;
            blocks += 1;
        }
        Ok(blocks)
    }
}
