// 5.0 chain.rs: the block snapshot chain. an append-only arena of per-block
// snapshots; each node records its parent's index, so ancestor walks are plain
// index hops with no ownership cycles. history is never pruned or mutated;
// windowed statistics (VWAP, purchase counts) re-read it constantly.

use serde::{Deserialize, Serialize};

use crate::types::{Amount, Height, Ticket};

/// One immutable per-block snapshot. Created by `Chain::advance`, never
/// touched again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainNode {
    pub height: Height,
    /// Arena index of the parent node; None only for the first block.
    pub parent: Option<u32>,
    /// Ticket price this block was connected under.
    pub ticket_price: Amount,
    /// Live pool size immediately after this block's transitions.
    pub pool_size: u32,
    /// Tickets purchased in this block.
    pub tickets_added: Vec<Ticket>,
    pub total_supply: Amount,
    pub spendable_supply: Amount,
    pub staked_coins: Amount,
    pub voters: u16,
    pub revocations: u16,
}

/// Per-block figures handed to `Chain::advance`; the chain itself assigns
/// height and parent linkage.
#[derive(Debug, Clone)]
pub struct BlockSummary {
    pub ticket_price: Amount,
    pub pool_size: u32,
    pub tickets_added: Vec<Ticket>,
    pub total_supply: Amount,
    pub spendable_supply: Amount,
    pub staked_coins: Amount,
    pub voters: u16,
    pub revocations: u16,
}

/// Strictly linear chain of snapshots. Exactly one tip exists; there is no
/// forking and no rollback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    nodes: Vec<ChainNode>,
}

impl Chain {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The current tip, or None before the first advance.
    pub fn tip(&self) -> Option<&ChainNode> {
        self.nodes.last()
    }

    /// Node at the given arena index. Indices come from `ChainNode::parent`.
    pub fn node(&self, index: u32) -> &ChainNode {
        &self.nodes[index as usize]
    }

    /// Height the next advance will create.
    pub fn next_height(&self) -> Height {
        self.nodes.len() as Height
    }

    /// Append the next snapshot. The first block gets height 0; every later
    /// block extends the tip by exactly one.
    pub fn advance(&mut self, summary: BlockSummary) -> &ChainNode {
        let height = self.nodes.len() as Height;
        let parent = if height == 0 {
            None
        } else {
            Some((height - 1) as u32)
        };
        self.nodes.push(ChainNode {
            height,
            parent,
            ticket_price: summary.ticket_price,
            pool_size: summary.pool_size,
            tickets_added: summary.tickets_added,
            total_supply: summary.total_supply,
            spendable_supply: summary.spendable_supply,
            staked_coins: summary.staked_coins,
            voters: summary.voters,
            revocations: summary.revocations,
        });
        self.nodes.last().expect("just pushed")
    }

    /// Walk parent links from `from` down to `target_height`, invoking the
    /// visitor on every node passed through on the way down: the start node
    /// included, the target excluded. Returns None without visiting anything
    /// when the target lies above `from`; a negative target walks (and
    /// visits) all the way past the first block and also yields None. Cost is
    /// O(distance).
    pub fn ancestor<'a>(
        &'a self,
        from: &'a ChainNode,
        target_height: Height,
        mut visitor: Option<&mut dyn FnMut(&ChainNode)>,
    ) -> Option<&'a ChainNode> {
        if target_height > from.height {
            return None;
        }
        let mut node = from;
        loop {
            if node.height == target_height {
                return Some(node);
            }
            if let Some(f) = visitor.as_deref_mut() {
                f(node);
            }
            match node.parent {
                Some(idx) => node = &self.nodes[idx as usize],
                None => return None,
            }
        }
    }

    /// All snapshots in height order, for reporting collaborators.
    pub fn iter(&self) -> impl Iterator<Item = &ChainNode> {
        self.nodes.iter()
    }
}
