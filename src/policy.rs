// 7.0 policy.rs: the seam between the simulation kernel and the economics
// under test. pricing and demand formulas are capability objects consuming
// read-only chain state; a name-keyed registry replaces ad hoc function
// pointer selection so runs can be configured by string.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::chain::{Chain, ChainNode};
use crate::lifecycle::TicketLifecycleManager;
use crate::params::ChainParameters;
use crate::pool::OrderedTicketPool;
use crate::types::{Amount, Height, Ticket};

/// Read-only view of everything a policy is allowed to see: parameters, the
/// snapshot chain, and the current pool membership. Policies never mutate
/// engine state through this.
pub struct ChainView<'a> {
    pub params: &'a ChainParameters,
    pub chain: &'a Chain,
    lifecycle: &'a TicketLifecycleManager,
}

impl<'a> ChainView<'a> {
    pub fn new(
        params: &'a ChainParameters,
        chain: &'a Chain,
        lifecycle: &'a TicketLifecycleManager,
    ) -> Self {
        Self {
            params,
            chain,
            lifecycle,
        }
    }

    pub fn tip(&self) -> Option<&'a ChainNode> {
        self.chain.tip()
    }

    /// Height of the block currently being priced.
    pub fn next_height(&self) -> Height {
        self.chain.next_height()
    }

    pub fn live_pool(&self) -> &'a OrderedTicketPool {
        self.lifecycle.live()
    }

    pub fn live_count(&self) -> usize {
        self.lifecycle.live().len()
    }

    pub fn immature_count(&self) -> usize {
        self.lifecycle.immature_count()
    }

    pub fn immature_iter(&self) -> impl Iterator<Item = &'a Ticket> + 'a {
        self.lifecycle.immature_iter()
    }

    pub fn ancestor(
        &self,
        from: &'a ChainNode,
        target_height: Height,
        visitor: Option<&mut dyn FnMut(&ChainNode)>,
    ) -> Option<&'a ChainNode> {
        self.chain.ancestor(from, target_height, visitor)
    }

    /// Volume-weighted average ticket purchase price over up to
    /// `stake_diff_windows` whole price windows ending at the most recent
    /// retarget before `from`. Weighted sums accumulate in `Decimal`; an i64
    /// product of price and ticket volume could overflow over a full span.
    /// Falls back to the minimum price when the span holds no purchases.
    pub fn prev_window_vwap(&self, from: &ChainNode) -> Amount {
        let window_size = self.params.stake_diff_window_size;
        let windows = self.params.stake_diff_windows;

        // height of the block just before the most recent price change
        let want_height = from.height - (from.height + 1) % window_size;
        let mut node = self.chain.ancestor(from, want_height, None);

        let mut weighted_sum = Decimal::ZERO;
        let mut total_tickets = Decimal::ZERO;
        let blocks_to_iterate = windows * window_size;
        let mut iterated = 0;
        while let Some(n) = node {
            if iterated >= blocks_to_iterate {
                break;
            }
            let num_tickets = Decimal::from(n.tickets_added.len() as u64);
            weighted_sum += num_tickets * n.ticket_price.to_decimal();
            total_tickets += num_tickets;
            node = n.parent.map(|idx| self.chain.node(idx));
            iterated += 1;
        }

        if total_tickets.is_zero() {
            return self.params.minimum_stake_diff;
        }
        let vwap = (weighted_sum / total_tickets).trunc();
        Amount::from_atoms(vwap.to_i64().unwrap_or(i64::MAX))
    }
}

/// Produces the ticket price for the next block. Result must be at least
/// `minimum_stake_diff`; the driver treats anything lower as a broken policy
/// and aborts. Stateful policies keep their running terms as instance fields
/// so parallel simulations stay independent.
pub trait PricingPolicy {
    fn name(&self) -> &'static str;
    fn next_price(&mut self, view: &ChainView) -> Amount;
}

/// Produces the fraction of the per-window purchase budget the market takes
/// up at a candidate price. Must land in [0, 1]; the driver aborts otherwise.
pub trait DemandPolicy {
    fn name(&self) -> &'static str;
    fn demand_fraction(
        &mut self,
        view: &ChainView,
        next_height: Height,
        ticket_price: Amount,
    ) -> f64;
}

type PricingCtor = fn() -> Box<dyn PricingPolicy>;
type DemandCtor = fn() -> Box<dyn DemandPolicy>;

/// Name-keyed policy registry. Constructors rather than instances: every run
/// gets a fresh policy object, so stateful policies never leak state between
/// runs.
#[derive(Default)]
pub struct PolicyRegistry {
    pricing: BTreeMap<&'static str, PricingCtor>,
    demand: BTreeMap<&'static str, DemandCtor>,
}

impl PolicyRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry pre-populated with every built-in pricing and demand policy.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        crate::proposals::register_all(&mut registry);
        crate::demand::register_all(&mut registry);
        registry
    }

    pub fn register_pricing(&mut self, name: &'static str, ctor: PricingCtor) {
        self.pricing.insert(name, ctor);
    }

    pub fn register_demand(&mut self, name: &'static str, ctor: DemandCtor) {
        self.demand.insert(name, ctor);
    }

    /// Fresh instance of the named pricing policy.
    pub fn pricing(&self, name: &str) -> Option<Box<dyn PricingPolicy>> {
        self.pricing.get(name).map(|ctor| ctor())
    }

    /// Fresh instance of the named demand policy.
    pub fn demand(&self, name: &str) -> Option<Box<dyn DemandPolicy>> {
        self.demand.get(name).map(|ctor| ctor())
    }

    pub fn pricing_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.pricing.keys().copied()
    }

    pub fn demand_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.demand.keys().copied()
    }
}
