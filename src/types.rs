// 1.0: all the primitives live here. nothing in the simulator works without these types.
// amounts, ticket identifiers, heights. each is a newtype so the compiler catches type mixups.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::iter::Sum;

/// Number of atomic units per coin.
pub const ATOMS_PER_COIN: i64 = 100_000_000;

/// Block height. Negative values only show up transiently in window
/// arithmetic (height minus an interval near the start of the chain) and
/// never resolve to a node.
pub type Height = i64;

// 1.1: amount in atoms. prices, subsidies and supply totals all use this.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_atoms(atoms: i64) -> Self {
        Self(atoms)
    }

    pub fn from_coins(coins: i64) -> Self {
        Self(coins * ATOMS_PER_COIN)
    }

    pub fn atoms(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn add(&self, other: Amount) -> Self {
        Self(self.0 + other.0)
    }

    pub fn sub(&self, other: Amount) -> Self {
        Self(self.0 - other.0)
    }

    // total cost of `count` tickets at this price, etc.
    pub fn mul_int(&self, count: i64) -> Self {
        Self(self.0 * count)
    }

    pub fn div_int(&self, divisor: i64) -> Self {
        Self(self.0 / divisor)
    }

    /// Exact decimal view, used where i64 products would overflow.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::from(self.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // render as coins, honoring width/alignment flags
        f.pad(&Decimal::new(self.0, 8).normalize().to_string())
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, a| acc.add(a))
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, a| acc.add(*a))
    }
}

// 1.2: opaque ticket identifier. totally ordered by byte comparison, which is
// what the ordered pool keys on. real data uses 32-byte hashes; synthesized
// tickets get a SHA-256 of their origin so the key space looks the same.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketId([u8; 32]);

impl TicketId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse from the conventional 64-character hex string. The string is in
    /// display order (most significant byte first), so the decoded bytes are
    /// reversed into internal order.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        bytes.reverse();
        Ok(Self(bytes))
    }

    /// Deterministically synthesize an identifier for a simulated purchase.
    pub fn generate(height: Height, index: u32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"stakesim/ticket");
        hasher.update(height.to_le_bytes());
        hasher.update(index.to_le_bytes());
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut display = self.0;
        display.reverse();
        write!(f, "{}", hex::encode(display))
    }
}

impl fmt::Debug for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TicketId({})", self)
    }
}

// 1.3: a ticket. immutable once purchased; owned by exactly one of the
// immature queue, the live pool, or the missed set until it is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub price: Amount,
    pub purchase_height: Height,
}

impl Ticket {
    pub fn new(id: TicketId, price: Amount, purchase_height: Height) -> Self {
        Self {
            id,
            price,
            purchase_height,
        }
    }
}
