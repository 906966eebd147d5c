//! Price lookup for tokens whose usd price is not carried by the observation.

use crate::domain::{Address, Decimal};
use std::collections::{BTreeMap, HashMap};

/// Usd price of a token at a block.
///
/// Implementations must be fully materialized before the engine runs; the
/// engine never waits on a lookup.
pub trait PriceLookup: Send + Sync {
    fn usd_price(&self, token: &Address, block: u64) -> Option<Decimal>;
}

/// In-memory prices keyed by token, resolved at the closest block at or before
/// the requested one.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceLookup {
    prices: HashMap<Address, BTreeMap<u64, Decimal>>,
}

impl StaticPriceLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, token: Address, block: u64, usd: Decimal) -> Self {
        self.insert(token, block, usd);
        self
    }

    pub fn insert(&mut self, token: Address, block: u64, usd: Decimal) {
        self.prices.entry(token).or_default().insert(block, usd);
    }

    pub fn len(&self) -> usize {
        self.prices.values().map(|by_block| by_block.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PriceLookup for StaticPriceLookup {
    fn usd_price(&self, token: &Address, block: u64) -> Option<Decimal> {
        self.prices
            .get(token)
            .and_then(|by_block| by_block.range(..=block).next_back())
            .map(|(_, usd)| *usd)
    }
}
