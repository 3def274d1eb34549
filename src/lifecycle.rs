// 6.0 lifecycle.rs: the ticket lifecycle state machine. owns the immature
// queue, the live pool and the missed set, and runs the fixed per-block
// transition protocol: maturation, expiry, voting, revocation, purchase.
// later steps observe earlier steps' results; the driver never touches the
// pools mid-transition.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;

use crate::params::ChainParameters;
use crate::pool::{OrderedTicketPool, PoolError};
use crate::types::{Amount, Height, Ticket, TicketId};

// splitmix64 golden gamma; spreads per-block winner seeds
const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;
// keeps the treap priority stream disjoint from winner draws
const PRIORITY_STREAM_SALT: u64 = 0xB5AD_4ECE_DA1C_E2A9;

/// Per-block inputs: what the driver (or a replay record) wants this block
/// to do. Ticket ids are only supplied when replaying recorded data.
#[derive(Debug, Clone)]
pub struct BlockIntents {
    pub new_tickets: u8,
    pub ticket_ids: Option<Vec<TicketId>>,
    pub voters: u16,
    pub revocations: u16,
    /// Whether this block's votes approve the parent's regular transactions.
    pub prev_valid: bool,
}

impl Default for BlockIntents {
    fn default() -> Self {
        Self {
            new_tickets: 0,
            ticket_ids: None,
            voters: 0,
            revocations: 0,
            prev_valid: true,
        }
    }
}

/// What a single block transition did, for supply accounting and snapshots.
#[derive(Debug, Clone, Default)]
pub struct BlockTransition {
    pub matured: usize,
    pub expired: usize,
    pub voted: Vec<Ticket>,
    pub revoked: Vec<Ticket>,
    pub purchased: Vec<Ticket>,
}

impl BlockTransition {
    pub fn voted_value(&self) -> Amount {
        self.voted.iter().map(|t| t.price).sum()
    }

    pub fn revoked_value(&self) -> Amount {
        self.revoked.iter().map(|t| t.price).sum()
    }

    pub fn purchased_value(&self) -> Amount {
        self.purchased.iter().map(|t| t.price).sum()
    }
}

/// Lifecycle errors. Caller logic errors are rejected before any state
/// mutation; pool errors mean the bookkeeping has desynchronized from the
/// pool and the run is unrecoverable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("lifecycle bookkeeping desynchronized from pool: {0}")]
    Pool(#[from] PoolError),

    #[error("{requested} revocations requested with only {missed} missed tickets")]
    RevocationOverflow { requested: u16, missed: usize },

    #[error("{requested} ticket purchases exceed the per-block cap of {cap}")]
    PurchaseExceedsCap { requested: u8, cap: u8 },

    #[error("{declared} new tickets declared with {supplied} ticket ids supplied")]
    TicketIdCountMismatch { declared: u8, supplied: usize },
}

/// Owns every ticket between purchase and discard and moves them between
/// pools one block at a time.
#[derive(Debug)]
pub struct TicketLifecycleManager {
    immature: VecDeque<Ticket>,
    live: OrderedTicketPool,
    // lazy expiry FIFO: tickets enter at maturation and are checked against
    // their expiry height; entries already voted out of the pool are skipped
    expiry_queue: VecDeque<Ticket>,
    missed: VecDeque<Ticket>,
    winner_seed: u64,
}

impl TicketLifecycleManager {
    /// The run seed feeds two independent streams: the pool's balancing
    /// priorities (salted) and the per-block winner draws.
    pub fn new(seed: u64) -> Self {
        Self {
            immature: VecDeque::new(),
            live: OrderedTicketPool::new(seed ^ PRIORITY_STREAM_SALT),
            expiry_queue: VecDeque::new(),
            missed: VecDeque::new(),
            winner_seed: seed,
        }
    }

    pub fn live(&self) -> &OrderedTicketPool {
        &self.live
    }

    pub fn immature_count(&self) -> usize {
        self.immature.len()
    }

    pub fn immature_iter(&self) -> impl Iterator<Item = &Ticket> {
        self.immature.iter()
    }

    pub fn missed_count(&self) -> usize {
        self.missed.len()
    }

    /// Execute the transition protocol for the block at `new_height`.
    ///
    /// Caller logic errors (over-cap purchases, revocations beyond the missed
    /// set, id count mismatches) are rejected up front, before any mutation.
    /// Revocation capacity is judged against the pre-block missed set: a
    /// ticket that expires in this block cannot also be revoked in it.
    pub fn connect_block(
        &mut self,
        new_height: Height,
        ticket_price: Amount,
        intents: &BlockIntents,
        params: &ChainParameters,
    ) -> Result<BlockTransition, LifecycleError> {
        if intents.new_tickets > params.max_fresh_stake_per_block {
            return Err(LifecycleError::PurchaseExceedsCap {
                requested: intents.new_tickets,
                cap: params.max_fresh_stake_per_block,
            });
        }
        if let Some(ids) = &intents.ticket_ids {
            if ids.len() != usize::from(intents.new_tickets) {
                return Err(LifecycleError::TicketIdCountMismatch {
                    declared: intents.new_tickets,
                    supplied: ids.len(),
                });
            }
        }
        if usize::from(intents.revocations) > self.missed.len() {
            return Err(LifecycleError::RevocationOverflow {
                requested: intents.revocations,
                missed: self.missed.len(),
            });
        }

        let mut transition = BlockTransition::default();

        // 1. maturation: queued tickets reaching purchase_height + maturity
        let maturity = Height::from(params.ticket_maturity);
        while let Some(front) = self.immature.front() {
            if front.purchase_height + maturity > new_height {
                break;
            }
            let ticket = self.immature.pop_front().expect("front checked");
            self.live.insert(ticket)?;
            self.expiry_queue.push_back(ticket);
            transition.matured += 1;
        }

        // 2. expiry: live tickets that aged out unvoted move to the missed set
        let expiry = Height::from(params.ticket_expiry);
        while let Some(front) = self.expiry_queue.front() {
            if front.purchase_height + expiry > new_height {
                break;
            }
            let candidate = self.expiry_queue.pop_front().expect("front checked");
            if let Some(ticket) = self.live.remove(&candidate.id) {
                self.missed.push_back(ticket);
                transition.expired += 1;
            }
        }

        // 3. voting: weighted-random draws without replacement, seeded per
        // block. below the stake validation height zero votes are drawn.
        if new_height >= params.stake_validation_height {
            let mut rng = ChaCha8Rng::seed_from_u64(
                self.winner_seed ^ (new_height as u64).wrapping_mul(SEED_MIX),
            );
            let draws = usize::from(intents.voters).min(self.live.len());
            for _ in 0..draws {
                let rank = rng.gen_range(0..self.live.len());
                let winner = self.live.remove_rank(rank)?;
                transition.voted.push(winner);
            }
        }

        // 4. revocation: oldest missed tickets first, permanently discarded
        for _ in 0..intents.revocations {
            let ticket = self.missed.pop_front().expect("capacity checked");
            transition.revoked.push(ticket);
        }

        // 5. purchase: fresh tickets at this block's price
        let count = u32::from(intents.new_tickets);
        match &intents.ticket_ids {
            Some(ids) => {
                for id in ids {
                    transition
                        .purchased
                        .push(Ticket::new(*id, ticket_price, new_height));
                }
            }
            None => {
                for index in 0..count {
                    transition.purchased.push(Ticket::new(
                        TicketId::generate(new_height, index),
                        ticket_price,
                        new_height,
                    ));
                }
            }
        }
        self.immature.extend(transition.purchased.iter().copied());

        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ChainParameters {
        ChainParameters::simnet()
    }

    fn price() -> Amount {
        Amount::from_atoms(20_000)
    }

    fn buy(count: u8) -> BlockIntents {
        BlockIntents {
            new_tickets: count,
            ..Default::default()
        }
    }

    /// Drive empty blocks from `from` up to and including `to`.
    fn run_empty(
        mgr: &mut TicketLifecycleManager,
        params: &ChainParameters,
        from: Height,
        to: Height,
    ) {
        for h in from..=to {
            mgr.connect_block(h, price(), &BlockIntents::default(), params)
                .unwrap();
        }
    }

    #[test]
    fn tickets_mature_exactly_at_maturity() {
        let params = params();
        let mut mgr = TicketLifecycleManager::new(1);
        mgr.connect_block(0, price(), &buy(5), &params).unwrap();
        assert_eq!(mgr.immature_count(), 5);
        assert_eq!(mgr.live().len(), 0);

        // height 15: still immature
        run_empty(&mut mgr, &params, 1, 15);
        assert_eq!(mgr.immature_count(), 5);
        assert_eq!(mgr.live().len(), 0);

        // height 16 == purchase (0) + maturity (16): all five enter the pool
        let transition = mgr
            .connect_block(16, price(), &BlockIntents::default(), &params)
            .unwrap();
        assert_eq!(transition.matured, 5);
        assert_eq!(mgr.immature_count(), 0);
        assert_eq!(mgr.live().len(), 5);
    }

    #[test]
    fn no_votes_below_stake_validation_height() {
        let params = params();
        let mut mgr = TicketLifecycleManager::new(1);
        mgr.connect_block(0, price(), &buy(5), &params).unwrap();
        run_empty(&mut mgr, &params, 1, 16);

        // voting requested below the threshold draws nothing
        let intents = BlockIntents {
            voters: 5,
            ..Default::default()
        };
        let transition = mgr.connect_block(17, price(), &intents, &params).unwrap();
        assert!(transition.voted.is_empty());
        assert_eq!(mgr.live().len(), 5);
    }

    #[test]
    fn votes_draw_without_replacement_and_clamp_to_pool() {
        let params = params();
        let mut mgr = TicketLifecycleManager::new(1);
        mgr.connect_block(0, price(), &buy(3), &params).unwrap();
        run_empty(&mut mgr, &params, 1, params.stake_validation_height - 1);
        assert_eq!(mgr.live().len(), 3);

        // five votes requested, only three live tickets
        let intents = BlockIntents {
            voters: 5,
            ..Default::default()
        };
        let transition = mgr
            .connect_block(params.stake_validation_height, price(), &intents, &params)
            .unwrap();
        assert_eq!(transition.voted.len(), 3);
        assert_eq!(mgr.live().len(), 0);

        // all drawn tickets are distinct
        let mut ids: Vec<_> = transition.voted.iter().map(|t| t.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn winner_draws_are_deterministic_per_seed() {
        let params = params();
        let run = |seed| {
            let mut mgr = TicketLifecycleManager::new(seed);
            mgr.connect_block(0, price(), &buy(20), &params).unwrap();
            run_empty(&mut mgr, &params, 1, params.stake_validation_height - 1);
            let intents = BlockIntents {
                voters: 5,
                ..Default::default()
            };
            mgr.connect_block(params.stake_validation_height, price(), &intents, &params)
                .unwrap()
                .voted
        };
        assert_eq!(run(7), run(7));
        assert_ne!(run(7), run(8));
    }

    #[test]
    fn expired_tickets_move_to_missed_set() {
        let mut params = params();
        params.ticket_expiry = 32; // expire quickly, before voting starts
        let mut mgr = TicketLifecycleManager::new(1);
        mgr.connect_block(0, price(), &buy(4), &params).unwrap();
        run_empty(&mut mgr, &params, 1, 31);
        assert_eq!(mgr.live().len(), 4);
        assert_eq!(mgr.missed_count(), 0);

        // height 32 == purchase (0) + expiry (32)
        let transition = mgr
            .connect_block(32, price(), &BlockIntents::default(), &params)
            .unwrap();
        assert_eq!(transition.expired, 4);
        assert_eq!(mgr.live().len(), 0);
        assert_eq!(mgr.missed_count(), 4);
    }

    #[test]
    fn revocations_discard_oldest_missed_tickets() {
        let mut params = params();
        params.ticket_expiry = 32;
        let mut mgr = TicketLifecycleManager::new(1);
        mgr.connect_block(0, price(), &buy(4), &params).unwrap();
        run_empty(&mut mgr, &params, 1, 32);
        assert_eq!(mgr.missed_count(), 4);

        let intents = BlockIntents {
            revocations: 3,
            ..Default::default()
        };
        let transition = mgr.connect_block(33, price(), &intents, &params).unwrap();
        assert_eq!(transition.revoked.len(), 3);
        assert_eq!(mgr.missed_count(), 1);
    }

    #[test]
    fn revocation_overflow_is_rejected_without_mutation() {
        let params = params();
        let mut mgr = TicketLifecycleManager::new(1);
        mgr.connect_block(0, price(), &buy(2), &params).unwrap();

        let intents = BlockIntents {
            revocations: 1,
            ..Default::default()
        };
        let err = mgr.connect_block(1, price(), &intents, &params).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::RevocationOverflow {
                requested: 1,
                missed: 0
            }
        );
        // nothing moved: the rejected block left the queue untouched
        assert_eq!(mgr.immature_count(), 2);
    }

    #[test]
    fn purchase_cap_is_enforced() {
        let params = params();
        let mut mgr = TicketLifecycleManager::new(1);
        let err = mgr
            .connect_block(0, price(), &buy(params.max_fresh_stake_per_block + 1), &params)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::PurchaseExceedsCap { .. }));
        assert_eq!(mgr.immature_count(), 0);
    }

    #[test]
    fn supplied_id_count_must_match_declared() {
        let params = params();
        let mut mgr = TicketLifecycleManager::new(1);
        let intents = BlockIntents {
            new_tickets: 3,
            ticket_ids: Some(vec![TicketId::generate(0, 0), TicketId::generate(0, 1)]),
            ..Default::default()
        };
        let err = mgr.connect_block(0, price(), &intents, &params).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::TicketIdCountMismatch {
                declared: 3,
                supplied: 2
            }
        );
        assert_eq!(mgr.immature_count(), 0);
    }

    #[test]
    fn conservation_across_transitions() {
        let mut params = params();
        params.ticket_expiry = 40;
        let mut mgr = TicketLifecycleManager::new(3);
        let mut purchased = 0usize;
        let mut voted = 0usize;
        let mut revoked = 0usize;

        for h in 0..200 {
            let intents = BlockIntents {
                new_tickets: 5,
                voters: params.tickets_per_block,
                revocations: mgr.missed_count() as u16,
                ..Default::default()
            };
            let t = mgr.connect_block(h, price(), &intents, &params).unwrap();
            purchased += t.purchased.len();
            voted += t.voted.len();
            revoked += t.revoked.len();

            let held = mgr.immature_count() + mgr.live().len() + mgr.missed_count();
            assert_eq!(held, purchased - voted - revoked, "height {h}");
        }
        assert!(voted > 0);
        assert!(revoked > 0);
    }
}
