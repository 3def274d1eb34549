// stakesim-core: deterministic what-if simulator for a proof-of-stake ticket
// market layered on a block-by-block ledger.
// determinism-first architecture: identical parameters, policies and seed
// reproduce byte-identical runs. all computation is synchronous with no
// external I/O; replay input and report rendering live at the edges.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Amount, TicketId, Height, Ticket
//   2.x  params.rs: ChainParameters, network presets, validation
//   3.x  subsidy.rs: height-indexed issuance schedule, supply estimate
//   4.x  pool.rs: OrderedTicketPool, the size-augmented treap
//   5.x  chain.rs: Chain/ChainNode, append-only snapshot arena
//   6.x  lifecycle.rs: per-block ticket transitions and winner draws
//   7.x  policy.rs: pricing/demand traits, ChainView, policy registry
//   8.x  proposals.rs: pricing policy implementations
//   9.x  demand.rs: yield and VWAP demand models
//   10.x replay.rs: CSV replay decoding (header blob + ticket ids)
//   11.x engine/: the simulation driver

// simulation kernel
pub mod chain;
pub mod lifecycle;
pub mod params;
pub mod pool;
pub mod subsidy;
pub mod types;

// policy seam and implementations
pub mod demand;
pub mod policy;
pub mod proposals;

// integration modules
pub mod engine;
pub mod replay;

// re exports for convenience
pub use chain::{BlockSummary, Chain, ChainNode};
pub use engine::{SimConfig, SimError, SimSummary, Simulator};
pub use lifecycle::{BlockIntents, BlockTransition, LifecycleError, TicketLifecycleManager};
pub use params::{ChainParameters, ParamsError};
pub use policy::{ChainView, DemandPolicy, PolicyRegistry, PricingPolicy};
pub use pool::{OrderedTicketPool, PoolError};
pub use replay::{ReplayData, ReplayError, ReplayReader};
pub use types::{Amount, Height, Ticket, TicketId, ATOMS_PER_COIN};
