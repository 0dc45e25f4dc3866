//! Type-safe money representation in integer minor units.
//!
//! Prices are stored and computed as whole cents. Payment providers take
//! amounts in the smallest currency unit, so keeping cents end to end avoids
//! any rounding at the provider boundary.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors from money arithmetic.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The operands use different currencies.
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch {
        /// Currency of the left operand.
        left: CurrencyCode,
        /// Currency of the right operand.
        right: CurrencyCode,
    },
    /// The result does not fit in 64 bits.
    #[error("money amount overflow")]
    Overflow,
}

/// ISO 4217 currency codes accepted by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyCode {
    #[default]
    Usd,
    Eur,
    Gbp,
    Cad,
    Aud,
}

impl CurrencyCode {
    /// Lowercase code as used by the payment provider (`"usd"`).
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Usd => "usd",
            Self::Eur => "eur",
            Self::Gbp => "gbp",
            Self::Cad => "cad",
            Self::Aud => "aud",
        }
    }

    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Usd | Self::Cad | Self::Aud => "$",
            Self::Eur => "€",
            Self::Gbp => "£",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "usd" => Ok(Self::Usd),
            "eur" => Ok(Self::Eur),
            "gbp" => Ok(Self::Gbp),
            "cad" => Ok(Self::Cad),
            "aud" => Ok(Self::Aud),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}

/// An amount of money in minor units (cents).
///
/// ## Examples
///
/// ```
/// use stitchworks_core::{CurrencyCode, Money};
///
/// let shirt = Money::from_cents(2_450, CurrencyCode::Usd);
/// let three = shirt.checked_mul(3).unwrap();
/// assert_eq!(three.cents(), 7_350);
/// assert_eq!(three.display(), "$73.50");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    cents: i64,
    currency: CurrencyCode,
}

impl Money {
    /// Create an amount from minor units.
    #[must_use]
    pub const fn from_cents(cents: i64, currency: CurrencyCode) -> Self {
        Self { cents, currency }
    }

    /// Zero in the given currency.
    #[must_use]
    pub const fn zero(currency: CurrencyCode) -> Self {
        Self { cents: 0, currency }
    }

    /// Amount in minor units.
    #[must_use]
    pub const fn cents(&self) -> i64 {
        self.cents
    }

    /// Currency of the amount.
    #[must_use]
    pub const fn currency(&self) -> CurrencyCode {
        self.currency
    }

    /// Whether the amount is exactly zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Amount as a decimal in major units (`12.50`).
    #[must_use]
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.cents, 2)
    }

    /// Add two amounts of the same currency.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::CurrencyMismatch`] or [`MoneyError::Overflow`].
    pub fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        let cents = self
            .cents
            .checked_add(other.cents)
            .ok_or(MoneyError::Overflow)?;
        Ok(Self::from_cents(cents, self.currency))
    }

    /// Subtract an amount of the same currency.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::CurrencyMismatch`] or [`MoneyError::Overflow`].
    pub fn checked_sub(self, other: Self) -> Result<Self, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        let cents = self
            .cents
            .checked_sub(other.cents)
            .ok_or(MoneyError::Overflow)?;
        Ok(Self::from_cents(cents, self.currency))
    }

    /// Multiply by a quantity.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the product does not fit.
    pub fn checked_mul(self, quantity: u32) -> Result<Self, MoneyError> {
        let cents = self
            .cents
            .checked_mul(i64::from(quantity))
            .ok_or(MoneyError::Overflow)?;
        Ok(Self::from_cents(cents, self.currency))
    }

    /// Sum an iterator of amounts, starting from zero in `currency`.
    ///
    /// # Errors
    ///
    /// Returns an error on currency mismatch or overflow.
    pub fn sum<I>(currency: CurrencyCode, amounts: I) -> Result<Self, MoneyError>
    where
        I: IntoIterator<Item = Self>,
    {
        amounts
            .into_iter()
            .try_fold(Self::zero(currency), Self::checked_add)
    }

    /// Format for display (e.g., `"$19.99"`, `"-$5.00"`).
    #[must_use]
    pub fn display(&self) -> String {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        format!(
            "{sign}{}{}.{:02}",
            self.currency.symbol(),
            abs / 100,
            abs % 100
        )
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn usd(cents: i64) -> Money {
        Money::from_cents(cents, CurrencyCode::Usd)
    }

    #[test]
    fn test_display() {
        assert_eq!(usd(1999).display(), "$19.99");
        assert_eq!(usd(5).display(), "$0.05");
        assert_eq!(usd(-500).display(), "-$5.00");
        assert_eq!(Money::from_cents(1000, CurrencyCode::Gbp).display(), "£10.00");
    }

    #[test]
    fn test_sum() {
        let total = Money::sum(CurrencyCode::Usd, [usd(100), usd(250), usd(5)]).unwrap();
        assert_eq!(total, usd(355));

        let empty = Money::sum(CurrencyCode::Usd, []).unwrap();
        assert!(empty.is_zero());
    }

    #[test]
    fn test_currency_mismatch() {
        let eur = Money::from_cents(100, CurrencyCode::Eur);
        assert!(matches!(
            usd(100).checked_add(eur),
            Err(MoneyError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_overflow() {
        assert_eq!(usd(i64::MAX).checked_mul(2), Err(MoneyError::Overflow));
        assert_eq!(usd(i64::MAX).checked_add(usd(1)), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_to_decimal() {
        assert_eq!(usd(1250).to_decimal().to_string(), "12.50");
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("USD".parse::<CurrencyCode>().unwrap(), CurrencyCode::Usd);
        assert!("xyz".parse::<CurrencyCode>().is_err());
    }
}
