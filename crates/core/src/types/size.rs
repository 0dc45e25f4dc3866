//! Shirt sizes and per-size quantities.

use core::fmt;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A garment size.
///
/// Ordered from smallest to largest so per-size maps list naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShirtSize {
    #[serde(rename = "XS")]
    Xs,
    #[serde(rename = "S")]
    S,
    #[serde(rename = "M")]
    M,
    #[serde(rename = "L")]
    L,
    #[serde(rename = "XL")]
    Xl,
    #[serde(rename = "2XL", alias = "XXL")]
    Xxl,
    #[serde(rename = "3XL", alias = "XXXL")]
    Xxxl,
}

impl ShirtSize {
    /// All sizes, smallest first.
    pub const ALL: [Self; 7] = [
        Self::Xs,
        Self::S,
        Self::M,
        Self::L,
        Self::Xl,
        Self::Xxl,
        Self::Xxxl,
    ];

    /// Canonical label (`"M"`, `"2XL"`).
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Xs => "XS",
            Self::S => "S",
            Self::M => "M",
            Self::L => "L",
            Self::Xl => "XL",
            Self::Xxl => "2XL",
            Self::Xxxl => "3XL",
        }
    }
}

impl fmt::Display for ShirtSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for ShirtSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "XS" => Ok(Self::Xs),
            "S" => Ok(Self::S),
            "M" => Ok(Self::M),
            "L" => Ok(Self::L),
            "XL" => Ok(Self::Xl),
            "2XL" | "XXL" => Ok(Self::Xxl),
            "3XL" | "XXXL" => Ok(Self::Xxxl),
            _ => Err(format!("invalid shirt size: {s}")),
        }
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for ShirtSize {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ShirtSize {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for ShirtSize {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.label(), buf)
    }
}

/// Quantities ordered per size, e.g. `{"M": 2, "L": 1}`.
///
/// Zero quantities are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<ShirtSize, u32>")]
pub struct SizeQuantities(BTreeMap<ShirtSize, u32>);

impl From<BTreeMap<ShirtSize, u32>> for SizeQuantities {
    fn from(map: BTreeMap<ShirtSize, u32>) -> Self {
        Self(map.into_iter().filter(|(_, qty)| *qty > 0).collect())
    }
}

impl FromIterator<(ShirtSize, u32)> for SizeQuantities {
    fn from_iter<T: IntoIterator<Item = (ShirtSize, u32)>>(iter: T) -> Self {
        Self::from(iter.into_iter().collect::<BTreeMap<_, _>>())
    }
}

impl SizeQuantities {
    /// Empty quantities.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Quantity for one size (0 when absent).
    #[must_use]
    pub fn get(&self, size: ShirtSize) -> u32 {
        self.0.get(&size).copied().unwrap_or(0)
    }

    /// Set the quantity for a size; zero removes it.
    pub fn set(&mut self, size: ShirtSize, quantity: u32) {
        if quantity == 0 {
            self.0.remove(&size);
        } else {
            self.0.insert(size, quantity);
        }
    }

    /// Total garments across all sizes.
    #[must_use]
    pub fn total_units(&self) -> u32 {
        self.0.values().fold(0_u32, |acc, q| acc.saturating_add(*q))
    }

    /// Whether no size has a quantity.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Add another set of quantities into this one.
    pub fn merge(&mut self, other: &Self) {
        for (size, qty) in &other.0 {
            let entry = self.0.entry(*size).or_insert(0);
            *entry = entry.saturating_add(*qty);
        }
    }

    /// Take another set of quantities out of this one, stopping at zero.
    pub fn subtract(&mut self, other: &Self) {
        for (size, qty) in &other.0 {
            let left = self.get(*size).saturating_sub(*qty);
            self.set(*size, left);
        }
    }

    /// Iterate `(size, quantity)` pairs, smallest size first.
    pub fn iter(&self) -> impl Iterator<Item = (ShirtSize, u32)> + '_ {
        self.0.iter().map(|(s, q)| (*s, *q))
    }
}
