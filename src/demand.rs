// 9.0 demand.rs: simulated market demand, expressed as the fraction of the
// per-window purchase budget taken up at a candidate price. two ingredients,
// expected staking yield and distance from the trailing VWAP, and two
// published combinations of them.

use crate::policy::{ChainView, DemandPolicy, PolicyRegistry};
use crate::types::{Amount, Height};

/// Demand from the estimated yield of a ticket: the per-vote subsidy at the
/// expected payout height (28 days of blocks out) over the candidate price.
/// Full demand above a 5% yield, none below 2%, linear in between.
pub fn yield_demand(view: &ChainView, next_height: Height, ticket_price: Amount) -> f64 {
    let params = view.params;
    let expected_payout_height = chrono::Duration::days(28).num_seconds()
        / params.target_time_per_block.num_seconds();
    let per_vote_subsidy =
        params.stake_subsidy_per_vote(next_height + expected_payout_height - 1);

    let yield_fraction = per_vote_subsidy.atoms() as f64 / ticket_price.atoms() as f64;
    if yield_fraction > 0.05 {
        return 1.0;
    }
    if yield_fraction < 0.02 {
        return 0.0;
    }
    (yield_fraction - 0.02) / 0.03
}

/// Demand from the candidate price's distance to the volume-weighted average
/// purchase price of the previous windows. Full demand under 80% of the
/// VWAP, none over 120%, linear in between.
pub fn vwap_demand(view: &ChainView, ticket_price: Amount) -> f64 {
    let Some(tip) = view.tip() else {
        return 0.0;
    };
    let ticket_vwap = view.prev_window_vwap(tip).atoms();
    let price = ticket_price.atoms();

    let eighty_percent_vwap = (ticket_vwap * 8) / 10;
    if price < eighty_percent_vwap {
        return 1.0;
    }
    if price > (ticket_vwap * 12) / 10 {
        return 0.0;
    }

    let forty_percent_vwap = (ticket_vwap * 4) / 10;
    1.0 - (price - eighty_percent_vwap) as f64 / forty_percent_vwap as f64
}

/// Yield demand combined with VWAP demand. The product of the two, except
/// that full yield demand overrides a zero VWAP demand entirely.
#[derive(Debug, Default)]
pub struct DemandA;

impl DemandPolicy for DemandA {
    fn name(&self) -> &'static str {
        "a"
    }

    fn demand_fraction(
        &mut self,
        view: &ChainView,
        next_height: Height,
        ticket_price: Amount,
    ) -> f64 {
        let yield_d = yield_demand(view, next_height, ticket_price);
        let vwap_d = vwap_demand(view, ticket_price);

        let mut demand = yield_d * vwap_d;
        if yield_d == 1.0 && vwap_d == 0.0 {
            demand = 1.0;
        }
        demand
    }
}

/// Yield demand alone.
#[derive(Debug, Default)]
pub struct DemandB;

impl DemandPolicy for DemandB {
    fn name(&self) -> &'static str {
        "b"
    }

    fn demand_fraction(
        &mut self,
        view: &ChainView,
        next_height: Height,
        ticket_price: Amount,
    ) -> f64 {
        yield_demand(view, next_height, ticket_price)
    }
}

/// Register every built-in demand policy.
pub fn register_all(registry: &mut PolicyRegistry) {
    registry.register_demand("a", || Box::new(DemandA));
    registry.register_demand("b", || Box::new(DemandB));
}
