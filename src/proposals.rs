// 8.0 proposals.rs: the pricing policies under comparison. each one is a
// faithful rendition of an externally proposed retarget formula, including
// the quirks its author shipped. several anchor the previous retarget
// window at the tip height where others use the next height, and those
// differences are deliberately preserved. the simulator exists to compare
// the proposals as written, bugs included, so do not unify or "fix" them.

use crate::chain::ChainNode;
use crate::policy::{ChainView, PolicyRegistry, PricingPolicy};
use crate::types::{Amount, Height, ATOMS_PER_COIN};

/// Window context shared by every policy once the retarget gate passes.
struct Retarget<'a> {
    next_height: Height,
    cur_diff: Amount,
    interval: i64,
    tip: &'a ChainNode,
}

/// Common prologue: the minimum price before any ticket could have been
/// purchased, and the previous price between retarget boundaries.
enum Gate<'a> {
    Fixed(Amount),
    Evaluate(Retarget<'a>),
}

fn retarget_gate<'a>(view: &ChainView<'a>) -> Gate<'a> {
    let next_height = view.next_height();
    let start_height = Height::from(view.params.coinbase_maturity) + 1;
    if next_height < start_height {
        return Gate::Fixed(view.params.minimum_stake_diff);
    }

    let tip = view.tip().expect("a tip exists past the start height");
    let interval = view.params.stake_diff_window_size;
    if next_height % interval != 0 {
        return Gate::Fixed(tip.ticket_price);
    }

    Gate::Evaluate(Retarget {
        next_height,
        cur_diff: tip.ticket_price,
        interval,
        tip,
    })
}

/// Live pool size recorded at the given height, or 0 when the chain does not
/// reach back that far.
fn pool_size_at<'a>(view: &ChainView<'a>, tip: &'a ChainNode, height: Height) -> i64 {
    view.ancestor(tip, height, None)
        .map(|n| i64::from(n.pool_size))
        .unwrap_or(0)
}

/// Tickets purchased in the maturity window ending at `from`, i.e. the
/// tickets that were still immature as of `from`.
fn immature_at<'a>(view: &ChainView<'a>, from: Option<&'a ChainNode>, maturity: i64) -> i64 {
    let mut count = 0i64;
    if let Some(node) = from {
        let mut tally = |n: &ChainNode| count += n.tickets_added.len() as i64;
        view.ancestor(node, node.height - maturity, Some(&mut tally));
    }
    count
}

// the ratio family

/// Scales the price by the ratio of the live pool size to its size one
/// retarget window earlier. The simplest of the family: no target term, no
/// clamps beyond the gate, so it can undershoot the price floor.
#[derive(Debug, Default)]
pub struct PoolRatio;

impl PricingPolicy for PoolRatio {
    fn name(&self) -> &'static str {
        "ratio"
    }

    fn next_price(&mut self, view: &ChainView) -> Amount {
        let ctx = match retarget_gate(view) {
            Gate::Fixed(price) => return price,
            Gate::Evaluate(ctx) => ctx,
        };

        let prev_pool_size = pool_size_at(view, ctx.tip, ctx.next_height - ctx.interval);
        if prev_pool_size == 0 {
            return ctx.cur_diff;
        }

        let cur_pool_size = i64::from(ctx.tip.pool_size);
        let ratio = cur_pool_size as f64 / prev_pool_size as f64;
        Amount::from_atoms((ctx.cur_diff.atoms() as f64 * ratio) as i64)
    }
}

/// Ratio variant E: includes immature tickets in both pool measurements and
/// multiplies in a target-pool-size ratio, with a supply-relative ceiling.
/// The previous window is anchored at the tip height (not the next height),
/// as proposed.
#[derive(Debug, Default)]
pub struct PoolRatioE;

impl PricingPolicy for PoolRatioE {
    fn name(&self) -> &'static str {
        "ratio-e"
    }

    fn next_price(&mut self, view: &ChainView) -> Amount {
        let ctx = match retarget_gate(view) {
            Gate::Fixed(price) => return price,
            Gate::Evaluate(ctx) => ctx,
        };
        let params = view.params;

        let prev_pool_size = pool_size_at(view, ctx.tip, ctx.next_height - ctx.interval);
        if prev_pool_size == 0 {
            return ctx.cur_diff;
        }

        // immature ticket count from the previous window, tip-anchored
        let ticket_maturity = i64::from(params.ticket_maturity);
        let relevant_height = ctx.tip.height - ctx.interval;
        let relevant_node = view.ancestor(ctx.tip, relevant_height, None);
        let prev_immature = immature_at(view, relevant_node, ticket_maturity);

        // ratio of percent change in pool size; at most 2
        let immature = view.immature_count() as i64;
        let cur_pool_size_all = i64::from(ctx.tip.pool_size) + immature;
        let prev_pool_size_all = prev_pool_size + prev_immature;
        let pool_size_change_ratio = cur_pool_size_all as f64 / prev_pool_size_all as f64;

        // ratio of percent of target pool size
        let tickets_per_block = i64::from(params.tickets_per_block);
        let ticket_pool_size = i64::from(params.ticket_pool_size);
        let target_pool_size = tickets_per_block * ticket_pool_size;
        let target_pool_size_all = tickets_per_block * (ticket_pool_size + ticket_maturity);
        let target_ratio = cur_pool_size_all as f64 / target_pool_size_all as f64;

        let next_diff = ctx.cur_diff.atoms() as f64 * pool_size_change_ratio * target_ratio;

        // ceiling keeps the pool populatable out of the spendable supply
        let maximum_stake_diff =
            (ctx.tip.total_supply.atoms() as f64 / target_pool_size as f64) as i64;
        if next_diff as i64 > maximum_stake_diff {
            if maximum_stake_diff < params.minimum_stake_diff.atoms() {
                return params.minimum_stake_diff;
            }
            return Amount::from_atoms(maximum_stake_diff);
        }

        if (next_diff as i64) < params.minimum_stake_diff.atoms() {
            return params.minimum_stake_diff;
        }
        Amount::from_atoms(next_diff as i64)
    }
}

/// Ratio variant F: variant E plus a relative-strength correction for
/// downward moves and a gravity exponent above the target pool size.
#[derive(Debug, Default)]
pub struct PoolRatioF;

impl PricingPolicy for PoolRatioF {
    fn name(&self) -> &'static str {
        "ratio-f"
    }

    fn next_price(&mut self, view: &ChainView) -> Amount {
        let ctx = match retarget_gate(view) {
            Gate::Fixed(price) => return price,
            Gate::Evaluate(ctx) => ctx,
        };
        let params = view.params;

        let prev_pool_size = pool_size_at(view, ctx.tip, ctx.next_height - ctx.interval);
        if prev_pool_size == 0 {
            return ctx.cur_diff;
        }

        let ticket_maturity = i64::from(params.ticket_maturity);
        let relevant_height = ctx.tip.height - ctx.interval;
        let relevant_node = view.ancestor(ctx.tip, relevant_height, None);
        let prev_immature = immature_at(view, relevant_node, ticket_maturity);

        let immature = view.immature_count() as i64;
        let cur_pool_size_all = i64::from(ctx.tip.pool_size) + immature;
        let prev_pool_size_all = prev_pool_size + prev_immature;
        let pool_size_change_ratio = cur_pool_size_all as f64 / prev_pool_size_all as f64;

        let tickets_per_block = i64::from(params.tickets_per_block);
        let tickets_per_window = tickets_per_block * ctx.interval;
        let ticket_pool_size = i64::from(params.ticket_pool_size);
        let target_pool_size = tickets_per_block * ticket_pool_size;
        let target_pool_size_all = tickets_per_block * (ticket_pool_size + ticket_maturity);
        let target_ratio = cur_pool_size_all as f64 / target_pool_size_all as f64;

        let mut next_diff;
        if pool_size_change_ratio < 1.0 {
            // upward price movements are stronger than downward ones; give
            // downward movements relative strength so the market can respond
            let max_fresh_per_block = i64::from(params.max_fresh_stake_per_block);
            let max_fresh_per_window = max_fresh_per_block * ctx.interval;
            let buys_per_vote = max_fresh_per_window as f64 / tickets_per_window as f64;
            let size_diff = prev_pool_size_all as f64 - cur_pool_size_all as f64;
            let temp_ratio =
                (prev_pool_size_all as f64 - size_diff * buys_per_vote) / prev_pool_size_all as f64;
            next_diff = ctx.cur_diff.atoms() as f64 * temp_ratio * target_ratio;
        } else {
            // gravity: acceleration grows with distance above the target
            let relative_intervals = ((target_pool_size_all - cur_pool_size_all) as f64).abs()
                / tickets_per_window as f64;
            next_diff = ctx.cur_diff.atoms() as f64
                * pool_size_change_ratio.powf(relative_intervals)
                * target_ratio;
        }

        let maximum_stake_diff =
            (ctx.tip.total_supply.atoms() as f64 / target_pool_size as f64) as i64;
        if next_diff as i64 > maximum_stake_diff && target_ratio < 1.0 {
            next_diff = maximum_stake_diff as f64 * target_ratio;
        }
        if next_diff as i64 > maximum_stake_diff {
            if maximum_stake_diff < params.minimum_stake_diff.atoms() {
                return params.minimum_stake_diff;
            }
            return Amount::from_atoms(maximum_stake_diff);
        }

        if (next_diff as i64) < params.minimum_stake_diff.atoms() {
            return params.minimum_stake_diff;
        }
        Amount::from_atoms(next_diff as i64)
    }
}

/// Ratio variant G: variant F plus a fresh-stake fill ratio that amplifies
/// the ramp while the pool is still being populated, and target-ratio
/// amplification above the target.
#[derive(Debug, Default)]
pub struct PoolRatioG;

impl PricingPolicy for PoolRatioG {
    fn name(&self) -> &'static str {
        "ratio-g"
    }

    fn next_price(&mut self, view: &ChainView) -> Amount {
        let ctx = match retarget_gate(view) {
            Gate::Fixed(price) => return price,
            Gate::Evaluate(ctx) => ctx,
        };
        let params = view.params;

        let prev_pool_size = pool_size_at(view, ctx.tip, ctx.next_height - ctx.interval);
        if prev_pool_size == 0 {
            return ctx.cur_diff;
        }

        let ticket_maturity = i64::from(params.ticket_maturity);
        let relevant_height = ctx.tip.height - ctx.interval;
        let relevant_node = view.ancestor(ctx.tip, relevant_height, None);
        let prev_immature = immature_at(view, relevant_node, ticket_maturity);

        let immature = view.immature_count() as i64;
        let cur_pool_size_all = i64::from(ctx.tip.pool_size) + immature;
        let prev_pool_size_all = prev_pool_size + prev_immature;
        let mut pool_size_change_ratio = cur_pool_size_all as f64 / prev_pool_size_all as f64;

        let tickets_per_block = i64::from(params.tickets_per_block);
        let tickets_per_window = tickets_per_block * ctx.interval;
        let ticket_pool_size = i64::from(params.ticket_pool_size);
        let target_pool_size = tickets_per_block * ticket_pool_size;
        let target_pool_size_all = tickets_per_block * (ticket_pool_size + ticket_maturity);
        let mut target_ratio = cur_pool_size_all as f64 / target_pool_size_all as f64;

        // ratio of purchase slots filled; a steady market sits at 1
        let max_fresh_per_block = i64::from(params.max_fresh_stake_per_block);
        let max_fresh_per_window = max_fresh_per_block * ctx.interval;
        let fresh_stake_last_window = cur_pool_size_all - prev_pool_size_all;
        let steady_fresh_ratio = tickets_per_block as f64 / max_fresh_per_block as f64;
        let fresh_stake_ratio = (fresh_stake_last_window as f64 / max_fresh_per_window as f64)
            * (1.0 / steady_fresh_ratio);

        if pool_size_change_ratio < 1.0 {
            let buys_per_vote = max_fresh_per_window as f64 / tickets_per_window as f64;
            let size_diff = (prev_pool_size_all - cur_pool_size_all) as f64;
            pool_size_change_ratio =
                (prev_pool_size_all as f64 - size_diff * buys_per_vote) / prev_pool_size_all as f64;
        }

        // protect the pool from running over target: amplify by the number
        // of intervals the overshoot represents
        if target_ratio > 1.0 {
            let size_diff = (cur_pool_size_all - target_pool_size_all) as f64;
            let relative_intervals = size_diff / tickets_per_window as f64;
            target_ratio = (target_pool_size_all as f64 + size_diff * relative_intervals)
                / target_pool_size_all as f64;
        }

        let mut next_diff = ctx.cur_diff.atoms() as f64 * pool_size_change_ratio * target_ratio;

        // ramp up: below target with the pool growing, amplify by the fill
        // ratio and drop the target term entirely
        if cur_pool_size_all < target_pool_size_all - max_fresh_per_window
            && pool_size_change_ratio > 1.0
        {
            let pool_size_diff = (cur_pool_size_all - prev_pool_size_all) as f64;
            pool_size_change_ratio = (prev_pool_size_all as f64 + pool_size_diff * fresh_stake_ratio)
                / prev_pool_size_all as f64;
            next_diff = ctx.cur_diff.atoms() as f64 * pool_size_change_ratio;
        }

        let maximum_stake_diff =
            (ctx.tip.total_supply.atoms() as f64 / target_pool_size as f64) as i64;
        if next_diff as i64 > maximum_stake_diff && target_ratio < 1.0 {
            next_diff = maximum_stake_diff as f64 * target_ratio;
        }
        if next_diff as i64 > maximum_stake_diff {
            if maximum_stake_diff < params.minimum_stake_diff.atoms() {
                return params.minimum_stake_diff;
            }
            return Amount::from_atoms(maximum_stake_diff);
        }

        if (next_diff as i64) < params.minimum_stake_diff.atoms() {
            return params.minimum_stake_diff;
        }
        Amount::from_atoms(next_diff as i64)
    }
}

/// Ratio variant H: boosts price movements by the per-block pool size change
/// instead of compounding ratios.
#[derive(Debug, Default)]
pub struct PoolRatioH;

impl PricingPolicy for PoolRatioH {
    fn name(&self) -> &'static str {
        "ratio-h"
    }

    fn next_price(&mut self, view: &ChainView) -> Amount {
        let ctx = match retarget_gate(view) {
            Gate::Fixed(price) => return price,
            Gate::Evaluate(ctx) => ctx,
        };
        let params = view.params;

        let prev_retarget_height = ctx.next_height - ctx.interval;
        let node = view.ancestor(ctx.tip, prev_retarget_height, None);
        let prev_pool_size = node.map(|n| i64::from(n.pool_size)).unwrap_or(0);

        let ticket_maturity = i64::from(params.ticket_maturity);
        let prev_immature = immature_at(view, node, ticket_maturity);
        if prev_pool_size + prev_immature == 0 {
            return ctx.cur_diff;
        }

        let immature = view.immature_count() as i64;
        let cur_pool_size_all = i64::from(ctx.tip.pool_size) + immature;
        let prev_pool_size_all = prev_pool_size + prev_immature;

        let tickets_per_block = i64::from(params.tickets_per_block);
        let ticket_pool_size = i64::from(params.ticket_pool_size);
        let target_pool_size = tickets_per_block * ticket_pool_size;
        let target_pool_size_all = tickets_per_block * (ticket_pool_size + ticket_maturity);
        let target_ratio = cur_pool_size_all as f64 / target_pool_size_all as f64;

        let pool_size_change = ((cur_pool_size_all - prev_pool_size_all) as f64).abs();
        let pool_size_change_per_block = pool_size_change / ctx.interval as f64;

        // the per-block change doubles as the boost multiplier
        let boost_factor = pool_size_change_per_block;
        let relative_boost = if cur_pool_size_all < prev_pool_size_all {
            (prev_pool_size_all as f64 - pool_size_change * boost_factor)
                / prev_pool_size_all as f64
        } else {
            (prev_pool_size_all as f64 + pool_size_change * boost_factor)
                / prev_pool_size_all as f64
        };

        let mut next_diff = ctx.cur_diff.atoms() as f64 * relative_boost * target_ratio;

        let maximum_stake_diff =
            (ctx.tip.total_supply.atoms() as f64 / target_pool_size as f64) as i64;
        if next_diff as i64 > maximum_stake_diff && target_ratio < 1.0 {
            next_diff = maximum_stake_diff as f64 * target_ratio;
        }
        if next_diff as i64 > maximum_stake_diff {
            if maximum_stake_diff < params.minimum_stake_diff.atoms() {
                return params.minimum_stake_diff;
            }
            return Amount::from_atoms(maximum_stake_diff);
        }

        if (next_diff as i64) < params.minimum_stake_diff.atoms() {
            return params.minimum_stake_diff;
        }
        Amount::from_atoms(next_diff as i64)
    }
}

/// Ratio variant R: directional boost plus a target balancer extrapolating
/// how many intervals the current trend needs to reach the target.
#[derive(Debug, Default)]
pub struct PoolRatioR;

impl PricingPolicy for PoolRatioR {
    fn name(&self) -> &'static str {
        "ratio-r"
    }

    fn next_price(&mut self, view: &ChainView) -> Amount {
        let ctx = match retarget_gate(view) {
            Gate::Fixed(price) => return price,
            Gate::Evaluate(ctx) => ctx,
        };
        let params = view.params;

        let prev_retarget_height = ctx.next_height - ctx.interval;
        let node = view.ancestor(ctx.tip, prev_retarget_height, None);
        let prev_pool_size = node.map(|n| i64::from(n.pool_size)).unwrap_or(0);

        let ticket_maturity = i64::from(params.ticket_maturity);
        let prev_immature = immature_at(view, node, ticket_maturity);
        if prev_pool_size + prev_immature == 0 {
            return ctx.cur_diff;
        }

        let immature = view.immature_count() as i64;
        let cur_pool_size_all = i64::from(ctx.tip.pool_size) + immature;
        let prev_pool_size_all = prev_pool_size + prev_immature;

        let tickets_per_block = i64::from(params.tickets_per_block);
        let ticket_pool_size = i64::from(params.ticket_pool_size);
        let target_pool_size_all = tickets_per_block * (ticket_pool_size + ticket_maturity);
        let target_ratio = cur_pool_size_all as f64 / target_pool_size_all as f64;

        let pool_size_change = ((cur_pool_size_all - prev_pool_size_all) as f64).abs();
        let pool_size_change_per_block = pool_size_change / ctx.interval as f64;
        let pool_size_change_ratio = cur_pool_size_all as f64 / prev_pool_size_all as f64;

        let mut relative_boost = pool_size_change_ratio;
        let mut target_balancer = target_ratio;
        let boost_factor = pool_size_change_per_block;
        let target_distance = ((cur_pool_size_all - target_pool_size_all) as f64).abs();
        let intervals_till_impact = target_distance / pool_size_change;
        if cur_pool_size_all < prev_pool_size_all {
            relative_boost = (cur_pool_size_all as f64 - pool_size_change * boost_factor)
                / prev_pool_size_all as f64;
            target_balancer = (cur_pool_size_all as f64 - pool_size_change * intervals_till_impact)
                / target_pool_size_all as f64;
        } else if cur_pool_size_all > prev_pool_size_all {
            relative_boost = (cur_pool_size_all as f64 + pool_size_change * boost_factor)
                / prev_pool_size_all as f64;
            target_balancer = (cur_pool_size_all as f64 + pool_size_change * intervals_till_impact)
                / target_pool_size_all as f64;
        }

        let mut next_diff = ctx.cur_diff.atoms() as f64 * relative_boost * target_balancer;

        // supply ceiling relative to the immature-inclusive target
        let maximum_stake_diff =
            (ctx.tip.total_supply.atoms() as f64 / target_pool_size_all as f64) as i64;
        if next_diff > maximum_stake_diff as f64 * target_ratio {
            next_diff = maximum_stake_diff as f64 * target_ratio;
        }
        if next_diff as i64 > maximum_stake_diff {
            if maximum_stake_diff < params.minimum_stake_diff.atoms() {
                return params.minimum_stake_diff;
            }
            return Amount::from_atoms(maximum_stake_diff);
        }

        if (next_diff as i64) < params.minimum_stake_diff.atoms() {
            return params.minimum_stake_diff;
        }
        Amount::from_atoms(next_diff as i64)
    }
}

// standalone proposals

/// Rational-function curve around the target pool size:
///
/// ```text
///                ax
/// f(x) = - ---------------- + d
///           (x - b)(x + c)
/// ```
///
/// x = ticket deviation from the target pool size, a = slope modifier,
/// b/c = boundaries, d = the average price of all bought tickets.
#[derive(Debug, Default)]
pub struct Curve;

impl PricingPolicy for Curve {
    fn name(&self) -> &'static str {
        "curve"
    }

    fn next_price(&mut self, view: &ChainView) -> Amount {
        let ctx = match retarget_gate(view) {
            Gate::Fixed(price) => return price,
            Gate::Evaluate(ctx) => ctx,
        };
        let params = view.params;

        let x = i64::from(ctx.tip.pool_size)
            - i64::from(params.tickets_per_block) * i64::from(params.ticket_pool_size);
        let a = 100_000i64;
        let b = 2880i64;
        let c = 2880i64;

        // d: average purchase price across immature and live tickets
        let mut d = 0i64;
        let mut total_spent = 0i64;
        let total_tickets = (view.immature_count() + view.live_count()) as i64;
        if total_tickets != 0 {
            for ticket in view.immature_iter() {
                total_spent += ticket.price.atoms();
            }
            view.live_pool().for_each(|ticket| {
                total_spent += ticket.price.atoms();
            });
            d = total_spent / total_tickets;
        }

        let price = (d as f64
            - 100_000_000.0 * ((a * x) as f64 / ((x - b) * (x + c)) as f64)) as i64;
        if price < params.minimum_stake_diff.atoms() {
            return params.minimum_stake_diff;
        }
        Amount::from_atoms(price)
    }
}

/// Prices tickets off the locked supply: a blend of locked/target-pool-size
/// and locked/actual-pool-size, with the blend fixed fully on the target
/// term as proposed.
#[derive(Debug, Default)]
pub struct LockedShare;

impl PricingPolicy for LockedShare {
    fn name(&self) -> &'static str {
        "locked-share"
    }

    fn next_price(&mut self, view: &ChainView) -> Amount {
        let ctx = match retarget_gate(view) {
            Gate::Fixed(price) => return price,
            Gate::Evaluate(ctx) => ctx,
        };
        let params = view.params;

        // f(x) = x*(locked/target_pool_size) + (1-x)*(locked/pool_size_actual)
        let tickets_per_block = i64::from(params.tickets_per_block);
        let target_pool_size = tickets_per_block * i64::from(params.ticket_pool_size);
        let locked_supply = ctx.tip.staked_coins.atoms();
        let x = 1i64;
        let price = if ctx.tip.pool_size == 0 {
            locked_supply / target_pool_size
        } else {
            x * locked_supply / target_pool_size
                + (1 - x) * (locked_supply / i64::from(ctx.tip.pool_size))
        };

        if price < params.minimum_stake_diff.atoms() {
            return params.minimum_stake_diff;
        }
        Amount::from_atoms(price)
    }
}

/// Steps the price by a bounded fraction derived from how many tickets were
/// bought in the previous window relative to the vote rate, signed by which
/// side of the target the pool sits on.
#[derive(Debug, Default)]
pub struct PurchaseBand;

impl PricingPolicy for PurchaseBand {
    fn name(&self) -> &'static str {
        "purchase-band"
    }

    fn next_price(&mut self, view: &ChainView) -> Amount {
        let ctx = match retarget_gate(view) {
            Gate::Fixed(price) => return price,
            Gate::Evaluate(ctx) => ctx,
        };
        let params = view.params;

        // tickets purchased in the previous interval, tip-anchored
        let mut tickets_purchased = 0i64;
        let prev_retarget_height = ctx.tip.height - ctx.interval;
        let mut tally = |n: &ChainNode| tickets_purchased += n.tickets_added.len() as i64;
        view.ancestor(ctx.tip, prev_retarget_height, Some(&mut tally));

        // interval quantities are scaled by the pool size, as proposed
        let votes_per_block = i64::from(params.tickets_per_block);
        let votes_per_interval = votes_per_block * i64::from(params.ticket_pool_size);
        let max_tickets_per_block = i64::from(params.max_fresh_stake_per_block);
        let max_tickets_per_interval = max_tickets_per_block * i64::from(params.ticket_pool_size);
        let target_pool_size = votes_per_block * i64::from(params.ticket_pool_size);

        // Bounds = TickPrice * TickVotesCycle / MaxTickCycle
        // ScalingFactor = (TickBought - TickVotesCycle) / (MaxTickCycle - TickVotesCycle)
        let bounds =
            ctx.cur_diff.atoms() as f64 * votes_per_interval as f64 / max_tickets_per_interval as f64;
        let scaling_factor = (tickets_purchased - votes_per_interval) as f64
            / (max_tickets_per_interval - votes_per_interval) as f64;
        let next_diff = if target_pool_size >= i64::from(ctx.tip.pool_size) {
            (ctx.cur_diff.atoms() as f64 + bounds * scaling_factor) as i64
        } else {
            (ctx.cur_diff.atoms() as f64 - bounds * scaling_factor) as i64
        };

        if next_diff < params.minimum_stake_diff.atoms() {
            return params.minimum_stake_diff;
        }
        Amount::from_atoms(next_diff)
    }
}

/// Classic PID controller on the pool size error. The integral and previous
/// error live on the instance, so concurrently running simulations with
/// different configurations stay independent.
#[derive(Debug, Default)]
pub struct PidController {
    integral: f64,
    previous_error: f64,
}

impl PricingPolicy for PidController {
    fn name(&self) -> &'static str {
        "pid"
    }

    fn next_price(&mut self, view: &ChainView) -> Amount {
        let ctx = match retarget_gate(view) {
            Gate::Fixed(price) => return price,
            Gate::Evaluate(ctx) => ctx,
        };
        let params = view.params;

        let target_pool_size =
            i64::from(params.tickets_per_block) * i64::from(params.ticket_pool_size);

        let kp = 0.0017;
        let ki = 0.00005;
        let kd = 0.0024;
        let error = (i64::from(ctx.tip.pool_size) - target_pool_size) as f64;
        self.integral += error;
        let derivative = error - self.previous_error;
        let next_diff =
            (ATOMS_PER_COIN as f64 * (error * kp + self.integral * ki + derivative * kd)) as i64;
        self.previous_error = error;

        if next_diff < params.minimum_stake_diff.atoms() {
            return params.minimum_stake_diff;
        }
        Amount::from_atoms(next_diff)
    }
}

/// Pool delta and pool force scaled by an exponential price-velocity damper:
/// a large price change in the previous window attenuates the next one. The
/// previous window is anchored at the tip height (not the next height), as
/// proposed.
#[derive(Debug, Default)]
pub struct DampedDelta;

impl PricingPolicy for DampedDelta {
    fn name(&self) -> &'static str {
        "damped"
    }

    fn next_price(&mut self, view: &ChainView) -> Amount {
        let ctx = match retarget_gate(view) {
            Gate::Fixed(price) => return price,
            Gate::Evaluate(ctx) => ctx,
        };
        let params = view.params;

        // pool: p, c, t (previous, current, target); price: q, cur, n
        let prev_retarget_height = ctx.tip.height - ctx.interval;
        let prev_node = view.ancestor(ctx.tip, prev_retarget_height, None);
        let (p0, q) = prev_node
            .map(|n| (i64::from(n.pool_size), n.ticket_price.atoms()))
            .unwrap_or((0, 0));
        if p0 == 0 {
            return ctx.cur_diff;
        }
        let prev_node = prev_node.expect("nonzero previous pool implies a node");

        let c = i64::from(ctx.tip.pool_size) + view.immature_count() as i64;
        let mut t = i64::from(params.tickets_per_block) * i64::from(params.ticket_pool_size);

        let b = (i64::from(params.max_fresh_stake_per_block)
            - i64::from(params.tickets_per_block))
            * ctx.interval;
        t += 1280; // fixed offset, as proposed

        // pool velocity: previous live count plus its immature window
        let ticket_maturity = i64::from(params.ticket_maturity);
        let immprev = immature_at(view, Some(prev_node), ticket_maturity);
        let p = p0 + immprev;

        // pool size change mapped onto a fraction of the max possible change;
        // small changes snap to 1 so the price can converge
        let mut pool_delta = (c - p) as f64;
        pool_delta = 1.0 + pool_delta / b as f64 / 4.0;
        if (pool_delta - 1.0).abs() < 0.05 {
            pool_delta = 1.0;
        }

        // pool force: signed multiple of the target pool size
        let del = (c - t) as f64 / t as f64;

        // price velocity damper: magnitude of the last price change mapped
        // onto (0,1] by an exponential decay
        let abs_price_delta_last = ((ctx.cur_diff.atoms() - q) as f64 / q as f64).abs();
        let m = (-abs_price_delta_last * 2.0).exp();

        let s1 = 100.0;
        let pct_change = s1 / 100.0 * m * del;
        let n = ctx.cur_diff.atoms() as f64 * (1.0 + pct_change) * pool_delta;

        let p_max = ctx.tip.total_supply.atoms() / i64::from(params.ticket_pool_size);
        let mut price = n as i64;
        if price < params.minimum_stake_diff.atoms() {
            price = params.minimum_stake_diff.atoms();
        } else if price > p_max {
            price = p_max;
        }
        Amount::from_atoms(price)
    }
}

/// Immature-inclusive pool change ratio times target ratio, bounded by an
/// estimated-supply-relative maximum. The reference default.
#[derive(Debug, Default)]
pub struct HybridRatio;

impl PricingPolicy for HybridRatio {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn next_price(&mut self, view: &ChainView) -> Amount {
        let ctx = match retarget_gate(view) {
            Gate::Fixed(price) => return price,
            Gate::Evaluate(ctx) => ctx,
        };
        let params = view.params;

        let prev_retarget_height = ctx.next_height - ctx.interval;
        let node = view.ancestor(ctx.tip, prev_retarget_height, None);
        let prev_pool_size = node.map(|n| i64::from(n.pool_size)).unwrap_or(0);
        if prev_pool_size == 0 {
            return ctx.cur_diff;
        }

        let ticket_maturity = i64::from(params.ticket_maturity);
        let prev_immature = immature_at(view, node, ticket_maturity);

        let immature = view.immature_count() as i64;
        let cur_pool_size_all = i64::from(ctx.tip.pool_size) + immature;
        let prev_pool_size_all = prev_pool_size + prev_immature;
        let pool_size_change_ratio = cur_pool_size_all as f64 / prev_pool_size_all as f64;

        let tickets_per_block = i64::from(params.tickets_per_block);
        let ticket_pool_size = i64::from(params.ticket_pool_size);
        let target_pool_size_all = tickets_per_block * (ticket_pool_size + ticket_maturity);
        let target_ratio = cur_pool_size_all as f64 / target_pool_size_all as f64;

        let mut next_diff =
            (ctx.cur_diff.atoms() as f64 * pool_size_change_ratio * target_ratio) as i64;

        // bound between the floor and a maximum relative to estimated supply
        let estimated_supply = params.estimate_supply(ctx.next_height);
        let maximum_stake_diff =
            (estimated_supply.atoms() as f64 / ticket_pool_size as f64) as i64;
        if next_diff > maximum_stake_diff {
            next_diff = maximum_stake_diff;
        }
        if next_diff < params.minimum_stake_diff.atoms() {
            next_diff = params.minimum_stake_diff.atoms();
        }
        Amount::from_atoms(next_diff)
    }
}

/// Register every built-in pricing policy.
pub fn register_all(registry: &mut PolicyRegistry) {
    registry.register_pricing("ratio", || Box::new(PoolRatio));
    registry.register_pricing("ratio-e", || Box::new(PoolRatioE));
    registry.register_pricing("ratio-f", || Box::new(PoolRatioF));
    registry.register_pricing("ratio-g", || Box::new(PoolRatioG));
    registry.register_pricing("ratio-h", || Box::new(PoolRatioH));
    registry.register_pricing("ratio-r", || Box::new(PoolRatioR));
    registry.register_pricing("curve", || Box::new(Curve));
    registry.register_pricing("locked-share", || Box::new(LockedShare));
    registry.register_pricing("purchase-band", || Box::new(PurchaseBand));
    registry.register_pricing("pid", || Box::new(PidController::default()));
    registry.register_pricing("damped", || Box::new(DampedDelta));
    registry.register_pricing("hybrid", || Box::new(HybridRatio));
}
