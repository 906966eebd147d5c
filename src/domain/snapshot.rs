//! Point-in-time vault observation and its JSON parse/validate boundary.
//!
//! Upstream scrapers hand over loosely shaped JSON documents. They are turned
//! into a typed [`Snapshot`] exactly once, in [`Snapshot::from_json`]; the
//! engine never inspects raw fields.

use crate::domain::{Address, Decimal, TimeLocation, TokenPair};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnapshotError {
    #[error("missing field: {0}")]
    MissingField(String),
    #[error("invalid number in {field}: {value}")]
    InvalidNumber { field: String, value: String },
    #[error("negative value in {field}: {value}")]
    Negative { field: String, value: Decimal },
    #[error("value out of range in {field}: {value}")]
    OutOfRange { field: String, value: String },
}

/// Breakdown of the vault's claim on pool assets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnderlyingDetails {
    /// Gross uncollected fee accrual, protocol share included.
    pub fees_uncollected: TokenPair<Decimal>,
    /// Protocol ("gamma") share of accrued fees, as a fraction in [0, 1].
    pub protocol_fee_share: Decimal,
    /// Informational breakdown (deployed, idle, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Decimal>,
}

/// Token quantities the vault's shares are entitled to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnderlyingValue {
    /// LP-attributable quantities, uncollected LP fees included.
    pub qty: TokenPair<Decimal>,
    pub details: UnderlyingDetails,
}

/// A single observation of a vault at one block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub address: Address,
    pub location: TimeLocation,
    pub prices: TokenPair<Decimal>,
    pub underlying: UnderlyingValue,
    pub supply: Decimal,
}

impl Snapshot {
    pub fn new(
        address: Address,
        location: TimeLocation,
        prices: TokenPair<Decimal>,
        qty: TokenPair<Decimal>,
        supply: Decimal,
    ) -> Self {
        Self {
            address,
            location,
            prices,
            underlying: UnderlyingValue {
                qty,
                details: UnderlyingDetails::default(),
            },
            supply,
        }
    }

    /// Set the gross uncollected fees and the protocol share they are split with.
    pub fn with_uncollected_fees(
        mut self,
        fees_uncollected: TokenPair<Decimal>,
        protocol_fee_share: Decimal,
    ) -> Self {
        self.underlying.details.fees_uncollected = fees_uncollected;
        self.underlying.details.protocol_fee_share = protocol_fee_share;
        self
    }

    /// Usd value of the underlying quantities at this snapshot's prices.
    pub fn underlying_usd(&self) -> Decimal {
        self.underlying.qty.value_at(&self.prices)
    }

    pub fn price_per_share(&self) -> Decimal {
        self.underlying_usd().safe_div(self.supply)
    }

    /// LP portion of the uncollected fee accrual.
    pub fn lp_fees_uncollected(&self) -> TokenPair<Decimal> {
        let lp_share = Decimal::one() - self.underlying.details.protocol_fee_share;
        self.underlying.details.fees_uncollected * lp_share
    }

    /// Protocol portion of the uncollected fee accrual.
    pub fn protocol_fees_uncollected(&self) -> TokenPair<Decimal> {
        self.underlying.details.fees_uncollected * self.underlying.details.protocol_fee_share
    }

    /// Parse and validate a snapshot document.
    ///
    /// Numbers may be JSON numbers or numeric strings.
    pub fn from_json(value: &Value) -> Result<Snapshot, SnapshotError> {
        let address = Address::new(get_str(value, "address")?.to_string());
        let block = get_u64(value, "block")?;
        let timestamp = get_i64(value, "timestamp")?;
        if timestamp < 0 {
            return Err(SnapshotError::OutOfRange {
                field: "timestamp".to_string(),
                value: timestamp.to_string(),
            });
        }

        let prices = get_non_negative_pair(value, "prices")?;
        let supply = get_non_negative(value, "supply")?;

        let underlying = field(value, "underlying")?;
        let qty = get_non_negative_pair(underlying, "underlying.qty")?;

        let fees_uncollected = match underlying.get("fees_uncollected") {
            Some(v) if !v.is_null() => {
                get_non_negative_pair(underlying, "underlying.fees_uncollected")?
            }
            _ => TokenPair::zero(),
        };

        let protocol_fee_share = match underlying.get("protocol_fee_share") {
            Some(v) if !v.is_null() => parse_decimal(v, "underlying.protocol_fee_share")?,
            _ => Decimal::zero(),
        };
        if protocol_fee_share.is_negative() || protocol_fee_share > Decimal::one() {
            return Err(SnapshotError::OutOfRange {
                field: "underlying.protocol_fee_share".to_string(),
                value: protocol_fee_share.to_string(),
            });
        }

        let mut extra = BTreeMap::new();
        if let Some(Value::Object(details)) = underlying.get("details") {
            for (key, raw) in details {
                extra.insert(key.clone(), parse_decimal(raw, &format!("underlying.details.{}", key))?);
            }
        }

        Ok(Snapshot {
            address,
            location: TimeLocation::new(timestamp, block),
            prices,
            underlying: UnderlyingValue {
                qty,
                details: UnderlyingDetails {
                    fees_uncollected,
                    protocol_fee_share,
                    extra,
                },
            },
            supply,
        })
    }
}

/// Looks up the last segment of a dotted field path; the full path is kept
/// for error messages.
pub(crate) fn field<'a>(value: &'a Value, name: &str) -> Result<&'a Value, SnapshotError> {
    let key = name.rsplit('.').next().unwrap_or(name);
    match value.get(key) {
        Some(v) if !v.is_null() => Ok(v),
        _ => Err(SnapshotError::MissingField(name.to_string())),
    }
}

pub(crate) fn parse_decimal(value: &Value, name: &str) -> Result<Decimal, SnapshotError> {
    let invalid = || SnapshotError::InvalidNumber {
        field: name.to_string(),
        value: value.to_string(),
    };
    match value {
        Value::String(s) => Decimal::from_str_canonical(s).map_err(|_| invalid()),
        Value::Number(n) => Decimal::from_str_canonical(&n.to_string()).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

pub(crate) fn get_decimal(value: &Value, name: &str) -> Result<Decimal, SnapshotError> {
    parse_decimal(field(value, name)?, name)
}

pub(crate) fn get_non_negative(value: &Value, name: &str) -> Result<Decimal, SnapshotError> {
    let parsed = get_decimal(value, name)?;
    if parsed.is_negative() {
        return Err(SnapshotError::Negative {
            field: name.to_string(),
            value: parsed,
        });
    }
    Ok(parsed)
}

pub(crate) fn get_non_negative_pair(
    value: &Value,
    name: &str,
) -> Result<TokenPair<Decimal>, SnapshotError> {
    let pair = field(value, name)?;
    Ok(TokenPair::new(
        get_non_negative(pair, &format!("{}.token0", name))?,
        get_non_negative(pair, &format!("{}.token1", name))?,
    ))
}

pub(crate) fn get_decimal_pair(value: &Value, name: &str) -> Result<TokenPair<Decimal>, SnapshotError> {
    let pair = field(value, name)?;
    Ok(TokenPair::new(
        get_decimal(pair, &format!("{}.token0", name))?,
        get_decimal(pair, &format!("{}.token1", name))?,
    ))
}

pub(crate) fn get_str<'a>(value: &'a Value, name: &str) -> Result<&'a str, SnapshotError> {
    field(value, name)?
        .as_str()
        .ok_or_else(|| SnapshotError::MissingField(name.to_string()))
}

pub(crate) fn get_i64(value: &Value, name: &str) -> Result<i64, SnapshotError> {
    let raw = field(value, name)?;
    let parsed = match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| SnapshotError::InvalidNumber {
        field: name.to_string(),
        value: raw.to_string(),
    })
}

pub(crate) fn get_u64(value: &Value, name: &str) -> Result<u64, SnapshotError> {
    let raw = field(value, name)?;
    let parsed = match raw {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| SnapshotError::InvalidNumber {
        field: name.to_string(),
        value: raw.to_string(),
    })
}
