//! Money, tax, and order totals.
//!
//! Amounts are `Decimal` values in the currency's standard unit (rupees, not
//! paise). Tax is rounded half-up to whole units, and the payment processor
//! is always handed minor units (`amount * 100`).

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::order::OrderLine;

/// ISO 4217 currency codes accepted by the payment processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Currency {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
}

impl Currency {
    /// The three-letter ISO code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::INR => "INR",
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INR" => Ok(Self::INR),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

/// A tax rate expressed as a fraction (0.18 for 18%).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxRate(Decimal);

impl TaxRate {
    /// The flat goods-and-services rate applied at checkout.
    pub const STANDARD: Self = Self(Decimal::from_parts(18, 0, 0, false, 2));

    /// Create a rate from a fraction.
    ///
    /// Returns `None` for negative rates or rates above 100%.
    #[must_use]
    pub fn new(fraction: Decimal) -> Option<Self> {
        (fraction >= Decimal::ZERO && fraction <= Decimal::ONE).then_some(Self(fraction))
    }

    /// The underlying fraction.
    #[must_use]
    pub const fn fraction(&self) -> Decimal {
        self.0
    }

    /// Tax owed on `amount`, rounded half-up to whole currency units.
    #[must_use]
    pub fn tax_on(&self, amount: Decimal) -> Decimal {
        (amount * self.0).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Subtotal, tax, and grand total of a set of order lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

impl Totals {
    /// Sum line subtotals and apply `rate`.
    #[must_use]
    pub fn compute<'a, I>(lines: I, rate: TaxRate) -> Self
    where
        I: IntoIterator<Item = &'a OrderLine>,
    {
        let subtotal: Decimal = lines.into_iter().map(|line| line.subtotal).sum();
        let tax = rate.tax_on(subtotal);
        Self {
            subtotal,
            tax,
            total: subtotal + tax,
        }
    }
}

/// Convert a standard-unit amount to processor minor units (`amount * 100`).
///
/// Fractions of a minor unit are truncated. Returns `None` if the result does
/// not fit in an `i64`.
#[must_use]
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED).trunc().to_i64()
}
