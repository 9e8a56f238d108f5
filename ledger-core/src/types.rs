//! Core types for the product ledger
//!
//! All types are designed for:
//! - Deterministic serialization (serde)
//! - Exact arithmetic (integer minor units for money)
//! - Opaque handling of externally stored documents (content hashes)

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Actor identity (wallet address, organisation key, etc.)
///
/// The empty identity is the sentinel for "nobody" and is never a valid owner.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    /// Create new actor ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The sentinel identity
    pub fn sentinel() -> Self {
        Self(String::new())
    }

    /// Whether this is the sentinel identity
    pub fn is_sentinel(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ActorId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Product identifier. Zero means "does not exist".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(u64);

impl ProductId {
    /// Sentinel id
    pub const NONE: ProductId = ProductId(0);

    /// Wrap a raw id
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw value
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Whether this is the sentinel id
    pub fn is_sentinel(&self) -> bool {
        self.0 == 0
    }

    pub(crate) fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monetary amount in integer minor units.
///
/// One economic unit is [`Amount::MINOR_PER_UNIT`] minor units, so
/// `Amount::from_units(1)` is one unit and `1.5` units is `1_500_000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u128);

impl Amount {
    /// Minor units per economic unit
    pub const MINOR_PER_UNIT: u128 = 1_000_000;

    /// Decimal places carried by minor units
    pub const SCALE: u32 = 6;

    /// Zero
    pub const ZERO: Amount = Amount(0);

    /// From raw minor units
    pub const fn from_minor(minor: u128) -> Self {
        Self(minor)
    }

    /// From whole units
    pub fn from_units(units: u64) -> Self {
        Self(units as u128 * Self::MINOR_PER_UNIT)
    }

    /// From a decimal number of units. Digits beyond the minor-unit scale are
    /// truncated. Negative values are rejected.
    pub fn from_decimal(units: Decimal) -> Option<Self> {
        let minor = units.checked_mul(Decimal::from(Self::MINOR_PER_UNIT as u64))?.trunc();
        minor.to_u128().map(Self)
    }

    /// Raw minor units
    pub fn minor(&self) -> u128 {
        self.0
    }

    /// Whether the amount is zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Convert to a decimal number of units
    pub fn to_decimal(&self) -> Decimal {
        i128::try_from(self.0)
            .ok()
            .and_then(|m| Decimal::try_from_i128_with_scale(m, Self::SCALE).ok())
            .unwrap_or(Decimal::MAX)
    }

    /// Absolute difference
    pub fn abs_diff(&self, other: Amount) -> Amount {
        Amount(self.0.abs_diff(other.0))
    }

    /// Checked addition
    pub fn checked_add(&self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Saturating addition
    pub fn saturating_add(&self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    /// Deviation of `self` from `reference` in basis points.
    ///
    /// Returns `None` when the reference is zero.
    pub fn deviation_bp(&self, reference: Amount) -> Option<u128> {
        if reference.is_zero() {
            return None;
        }
        Some(
            self.abs_diff(reference)
                .0
                .saturating_mul(BASIS_POINTS)
                / reference.0,
        )
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal().normalize())
    }
}

/// 100% expressed in basis points
pub const BASIS_POINTS: u128 = 10_000;

/// Opaque 32-byte reference to externally stored data (certificates,
/// images, location commitments). Never interpreted by the ledger.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// All-zero hash
    pub const ZERO: ContentHash = ContentHash([0u8; 32]);

    /// Wrap raw bytes
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// SHA-256 of arbitrary content
    pub fn digest(data: impl AsRef<[u8]>) -> Self {
        Self(Sha256::digest(data.as_ref()).into())
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self)
    }
}

/// Product lifecycle stage, totally ordered from planting to sale
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Stage {
    /// Seeded / initial registration
    Planted = 0,
    /// Growing in the field
    Growing = 1,
    /// Harvested
    Harvested = 2,
    /// Processed (cleaned, milled, ...)
    Processed = 3,
    /// Packaged for shipment
    Packaged = 4,
    /// In transit between parties
    InTransit = 5,
    /// Delivered to a distributor
    Distributed = 6,
    /// On retail shelves
    Retail = 7,
    /// Sold to the consumer (conventionally final)
    Sold = 8,
}

impl Stage {
    /// Every stage in lifecycle order
    pub const ALL: [Stage; 9] = [
        Stage::Planted,
        Stage::Growing,
        Stage::Harvested,
        Stage::Processed,
        Stage::Packaged,
        Stage::InTransit,
        Stage::Distributed,
        Stage::Retail,
        Stage::Sold,
    ];

    /// Position in the lifecycle (0..=8)
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Stage at a lifecycle position
    pub fn from_index(index: u8) -> Option<Stage> {
        Self::ALL.get(index as usize).copied()
    }

    /// Stage immediately before this one
    pub fn previous(self) -> Option<Stage> {
        self.index().checked_sub(1).and_then(Stage::from_index)
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Planted => "Planted",
            Stage::Growing => "Growing",
            Stage::Harvested => "Harvested",
            Stage::Processed => "Processed",
            Stage::Packaged => "Packaged",
            Stage::InTransit => "InTransit",
            Stage::Distributed => "Distributed",
            Stage::Retail => "Retail",
            Stage::Sold => "Sold",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Authoritative product record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Product ID (immutable)
    pub id: ProductId,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Timestamp of the last stage or ownership change
    pub updated_at: DateTime<Utc>,

    /// Quantity (always positive)
    pub quantity: u64,

    /// Current price
    pub price: Amount,

    /// Current owner
    pub owner: ActorId,

    /// Current lifecycle stage
    pub stage: Stage,

    /// Location / provenance commitment
    pub location_hash: ContentHash,

    /// Attached document references
    pub content_hashes: Vec<ContentHash>,
}

/// Single environmental / quality reading. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityObservation {
    /// When the observation was recorded
    pub recorded_at: DateTime<Utc>,

    /// Temperature reading
    pub temperature: i32,

    /// Humidity reading
    pub humidity: u32,

    /// Quality score (0..=1000)
    pub score: u16,

    /// Certification document reference
    pub certification_hash: ContentHash,

    /// Who recorded it
    pub recorded_by: ActorId,
}

/// Quality history of one product
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityHistory {
    /// Observations in recording order
    pub observations: Vec<QualityObservation>,

    /// Content hashes attached alongside the observations
    pub content_hashes: Vec<ContentHash>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_stage_ordering_and_lookup() {
        assert!(Stage::Planted < Stage::Sold);
        assert_eq!(Stage::from_index(5), Some(Stage::InTransit));
        assert_eq!(Stage::from_index(9), None);
        assert_eq!(Stage::Planted.previous(), None);
        assert_eq!(Stage::Sold.previous(), Some(Stage::Retail));
    }

    #[test]
    fn test_amount_decimal_conversion() {
        let amount = Amount::from_decimal(Decimal::from_str("1.5").unwrap()).unwrap();
        assert_eq!(amount.minor(), 1_500_000);
        assert_eq!(amount.to_decimal(), Decimal::from_str("1.5").unwrap());
        assert_eq!(amount.to_string(), "1.5");

        // Digits past the minor-unit scale are dropped
        let truncated = Amount::from_decimal(Decimal::from_str("0.0000019").unwrap()).unwrap();
        assert_eq!(truncated.minor(), 1);

        assert!(Amount::from_decimal(Decimal::from_str("-1").unwrap()).is_none());
    }

    #[test]
    fn test_deviation_bp() {
        let market = Amount::from_units(100);
        assert_eq!(Amount::from_units(120).deviation_bp(market), Some(2000));
        assert_eq!(Amount::from_units(80).deviation_bp(market), Some(2000));
        assert_eq!(market.deviation_bp(Amount::ZERO), None);
    }

    #[test]
    fn test_sentinels() {
        assert!(ActorId::sentinel().is_sentinel());
        assert!(!ActorId::new("farmer-1").is_sentinel());
        assert!(ProductId::NONE.is_sentinel());
        assert!(!ProductId::new(1).is_sentinel());
    }

    #[test]
    fn test_content_hash_display() {
        let hash = ContentHash::digest(b"certificate.pdf");
        assert_eq!(hash.to_string().len(), 64);
        assert_ne!(hash, ContentHash::ZERO);
    }
}
