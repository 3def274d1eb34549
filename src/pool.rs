// 4.0 pool.rs: the ordered ticket pool. a randomized size-augmented search
// tree (treap) keyed by ticket id: O(log n) insert/delete/lookup plus O(log n)
// selection by rank, which is what makes per-block lottery draws cheap even
// with hundreds of thousands of live tickets.
//
// two separate random streams are involved and must never be conflated:
// the pool owns the stream for balancing priorities; winner-selection ranks
// are drawn by the lifecycle manager from a per-block seeded stream.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::cmp::Ordering;

use crate::types::{Ticket, TicketId};

/// Errors from ordered pool operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("ticket {0} is already in the live pool")]
    DuplicateTicket(TicketId),

    #[error("rank {rank} out of bounds for pool of size {size}")]
    RankOutOfBounds { rank: usize, size: usize },
}

#[derive(Debug)]
struct Node {
    ticket: Ticket,
    priority: u64,
    // number of tickets in this subtree, including this node
    count: usize,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

impl Node {
    fn boxed(ticket: Ticket, priority: u64) -> Box<Node> {
        Box::new(Node {
            ticket,
            priority,
            count: 1,
            left: None,
            right: None,
        })
    }

    fn update_count(&mut self) {
        self.count = 1 + subtree_size(&self.left) + subtree_size(&self.right);
    }
}

fn subtree_size(node: &Option<Box<Node>>) -> usize {
    node.as_ref().map_or(0, |n| n.count)
}

// left child moves up, node becomes its right child
fn rotate_right(mut node: Box<Node>) -> Box<Node> {
    let mut pivot = node.left.take().expect("rotate_right requires a left child");
    node.left = pivot.right.take();
    node.update_count();
    pivot.right = Some(node);
    pivot.update_count();
    pivot
}

// right child moves up, node becomes its left child
fn rotate_left(mut node: Box<Node>) -> Box<Node> {
    let mut pivot = node.right.take().expect("rotate_left requires a right child");
    node.right = pivot.left.take();
    node.update_count();
    pivot.left = Some(node);
    pivot.update_count();
    pivot
}

fn insert_rec(node: Option<Box<Node>>, ticket: Ticket, priority: u64) -> Box<Node> {
    let mut node = match node {
        None => return Node::boxed(ticket, priority),
        Some(n) => n,
    };

    if ticket.id < node.ticket.id {
        node.left = Some(insert_rec(node.left.take(), ticket, priority));
        node.update_count();
        // max-heap on priorities keeps the expected depth logarithmic
        if node.left.as_ref().map_or(false, |l| l.priority > node.priority) {
            return rotate_right(node);
        }
    } else {
        node.right = Some(insert_rec(node.right.take(), ticket, priority));
        node.update_count();
        if node.right.as_ref().map_or(false, |r| r.priority > node.priority) {
            return rotate_left(node);
        }
    }
    node
}

fn remove_rec(node: Option<Box<Node>>, id: &TicketId) -> (Option<Box<Node>>, Option<Ticket>) {
    let mut node = match node {
        None => return (None, None),
        Some(n) => n,
    };

    match id.cmp(&node.ticket.id) {
        Ordering::Less => {
            let (left, removed) = remove_rec(node.left.take(), id);
            node.left = left;
            node.update_count();
            (Some(node), removed)
        }
        Ordering::Greater => {
            let (right, removed) = remove_rec(node.right.take(), id);
            node.right = right;
            node.update_count();
            (Some(node), removed)
        }
        Ordering::Equal => {
            let removed = node.ticket;
            (unlink(node), Some(removed))
        }
    }
}

// rotate the doomed node downward, always lifting the higher-priority child,
// until it has at most one child and can be spliced out
fn unlink(mut node: Box<Node>) -> Option<Box<Node>> {
    match (node.left.take(), node.right.take()) {
        (None, None) => None,
        (Some(left), None) => Some(left),
        (None, Some(right)) => Some(right),
        (Some(left), Some(right)) => {
            let lift_left = left.priority > right.priority;
            node.left = Some(left);
            node.right = Some(right);
            let mut top = if lift_left {
                rotate_right(node)
            } else {
                rotate_left(node)
            };
            if lift_left {
                let child = top.right.take().expect("doomed node below pivot");
                top.right = unlink(child);
            } else {
                let child = top.left.take().expect("doomed node below pivot");
                top.left = unlink(child);
            }
            top.update_count();
            Some(top)
        }
    }
}

/// The live ticket pool: every matured, not yet voted or expired ticket,
/// ordered by id. Mutated in place; only the node chain retains history.
#[derive(Debug)]
pub struct OrderedTicketPool {
    root: Option<Box<Node>>,
    prng: ChaCha8Rng,
}

impl OrderedTicketPool {
    /// Create an empty pool. The seed feeds the balancing-priority stream
    /// only; identical seeds and operation sequences produce identical tree
    /// shapes, which keeps whole runs reproducible.
    pub fn new(seed: u64) -> Self {
        Self {
            root: None,
            prng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn len(&self) -> usize {
        subtree_size(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn get(&self, id: &TicketId) -> Option<&Ticket> {
        let mut node = self.root.as_deref();
        while let Some(n) = node {
            match id.cmp(&n.ticket.id) {
                Ordering::Less => node = n.left.as_deref(),
                Ordering::Greater => node = n.right.as_deref(),
                Ordering::Equal => return Some(&n.ticket),
            }
        }
        None
    }

    pub fn contains(&self, id: &TicketId) -> bool {
        self.get(id).is_some()
    }

    /// Insert a ticket. A duplicate id is an error: the lifecycle manager
    /// owns membership, so a collision means its bookkeeping has
    /// desynchronized from the pool.
    pub fn insert(&mut self, ticket: Ticket) -> Result<(), PoolError> {
        if self.contains(&ticket.id) {
            return Err(PoolError::DuplicateTicket(ticket.id));
        }
        let priority = self.prng.gen();
        self.root = Some(insert_rec(self.root.take(), ticket, priority));
        Ok(())
    }

    /// Remove a ticket by id. Returns the ticket, or None if it was absent
    /// (removal of a missing id is a no-op).
    pub fn remove(&mut self, id: &TicketId) -> Option<Ticket> {
        let (root, removed) = remove_rec(self.root.take(), id);
        self.root = root;
        removed
    }

    /// The ticket at ordinal position `rank` (0-based) in key order.
    /// Descends comparing the target rank against cached subtree sizes.
    pub fn select(&self, mut rank: usize) -> Option<&Ticket> {
        if rank >= self.len() {
            return None;
        }
        let mut node = self.root.as_deref()?;
        loop {
            let left = subtree_size(&node.left);
            match rank.cmp(&left) {
                Ordering::Less => node = node.left.as_deref()?,
                Ordering::Equal => return Some(&node.ticket),
                Ordering::Greater => {
                    rank -= left + 1;
                    node = node.right.as_deref()?;
                }
            }
        }
    }

    /// Remove and return the ticket at the given rank. Drawing against an
    /// empty pool or past the end is an invariant violation, never clamped.
    pub fn remove_rank(&mut self, rank: usize) -> Result<Ticket, PoolError> {
        let ticket = *self.select(rank).ok_or(PoolError::RankOutOfBounds {
            rank,
            size: self.len(),
        })?;
        let removed = self.remove(&ticket.id);
        debug_assert!(removed.is_some());
        Ok(ticket)
    }

    /// Visit every ticket in ascending key order.
    pub fn for_each<F: FnMut(&Ticket)>(&self, mut visitor: F) {
        fn walk<F: FnMut(&Ticket)>(node: &Option<Box<Node>>, visitor: &mut F) {
            if let Some(n) = node {
                walk(&n.left, visitor);
                visitor(&n.ticket);
                walk(&n.right, visitor);
            }
        }
        walk(&self.root, &mut visitor);
    }

    #[cfg(test)]
    fn assert_invariants(&self) {
        fn check(node: &Option<Box<Node>>) -> usize {
            let Some(n) = node else { return 0 };
            let left = check(&n.left);
            let right = check(&n.right);
            assert_eq!(n.count, left + right + 1, "stale subtree count");
            if let Some(l) = &n.left {
                assert!(l.ticket.id < n.ticket.id, "left key out of order");
                assert!(l.priority <= n.priority, "heap order violated");
            }
            if let Some(r) = &n.right {
                assert!(r.ticket.id > n.ticket.id, "right key out of order");
                assert!(r.priority <= n.priority, "heap order violated");
            }
            n.count
        }
        check(&self.root);
    }
}
