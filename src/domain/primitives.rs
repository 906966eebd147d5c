//! Domain primitives: Address, TimeLocation, PeriodTimeframe, TokenPair.

use crate::domain::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Vault or token address (lowercase hex string).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Create an Address, normalizing to lowercase.
    pub fn new(addr: String) -> Self {
        Address(addr.trim().to_lowercase())
    }

    /// Get the address as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Address::new(value.to_string())
    }
}

/// A point on chain: unix timestamp (seconds) and block number.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TimeLocation {
    pub timestamp: i64,
    pub block: u64,
}

impl TimeLocation {
    pub fn new(timestamp: i64, block: u64) -> Self {
        Self { timestamp, block }
    }
}

/// Interval between two time locations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodTimeframe {
    pub ini: TimeLocation,
    pub end: TimeLocation,
}

impl PeriodTimeframe {
    pub fn new(ini: TimeLocation, end: TimeLocation) -> Self {
        Self { ini, end }
    }

    /// Elapsed seconds. Negative only for a malformed timeframe.
    pub fn seconds(&self) -> i64 {
        self.end.timestamp - self.ini.timestamp
    }

    /// Elapsed blocks. Negative only for a malformed timeframe.
    pub fn blocks(&self) -> i64 {
        self.end.block as i64 - self.ini.block as i64
    }

    pub fn is_well_formed(&self) -> bool {
        self.seconds() >= 0 && self.blocks() >= 0
    }
}

/// Generic two-asset container for quantities, prices and deltas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenPair<T> {
    pub token0: T,
    pub token1: T,
}

impl<T> TokenPair<T> {
    pub fn new(token0: T, token1: T) -> Self {
        Self { token0, token1 }
    }

    /// Apply `f` to both sides.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> TokenPair<U> {
        TokenPair {
            token0: f(self.token0),
            token1: f(self.token1),
        }
    }
}

impl TokenPair<Decimal> {
    pub fn zero() -> Self {
        Self::new(Decimal::zero(), Decimal::zero())
    }

    /// Usd value of the quantities at the given prices.
    pub fn value_at(&self, prices: &TokenPair<Decimal>) -> Decimal {
        self.token0 * prices.token0 + self.token1 * prices.token1
    }
}

impl<T: Add<Output = T>> Add for TokenPair<T> {
    type Output = TokenPair<T>;

    fn add(self, rhs: TokenPair<T>) -> TokenPair<T> {
        TokenPair {
            token0: self.token0 + rhs.token0,
            token1: self.token1 + rhs.token1,
        }
    }
}

impl<T: Sub<Output = T>> Sub for TokenPair<T> {
    type Output = TokenPair<T>;

    fn sub(self, rhs: TokenPair<T>) -> TokenPair<T> {
        TokenPair {
            token0: self.token0 - rhs.token0,
            token1: self.token1 - rhs.token1,
        }
    }
}

impl Mul<Decimal> for TokenPair<Decimal> {
    type Output = TokenPair<Decimal>;

    fn mul(self, rhs: Decimal) -> TokenPair<Decimal> {
        self.map(|v| v * rhs)
    }
}
