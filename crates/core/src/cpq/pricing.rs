use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateKind {
    Discount,
    Margin,
}

impl fmt::Display for RateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discount => f.write_str("discount"),
            Self::Margin => f.write_str("margin"),
        }
    }
}

/// Fractional tier discount in `[0, 1)`. Zero means no discount.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct DiscountRate(Decimal);

impl DiscountRate {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        check_fraction(RateKind::Discount, value).map(Self)
    }

    pub fn value(self) -> Decimal {
        self.0
    }

    /// Factor applied to list prices, e.g. `0.75` for a 25% tier.
    pub fn multiplier(self) -> Decimal {
        Decimal::ONE - self.0
    }
}

impl TryFrom<Decimal> for DiscountRate {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DiscountRate> for Decimal {
    fn from(rate: DiscountRate) -> Self {
        rate.0
    }
}

/// Distributor profit margin in `[0, 1)`, used only for customer-facing prices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Margin(Decimal);

impl Margin {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        check_fraction(RateKind::Margin, value).map(Self)
    }

    pub fn value(self) -> Decimal {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }
}

impl TryFrom<Decimal> for Margin {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Margin> for Decimal {
    fn from(margin: Margin) -> Self {
        margin.0
    }
}

/// Accepts `0.2` as well as `20%`.
impl FromStr for Margin {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        parse_fraction(RateKind::Margin, raw).and_then(Self::new)
    }
}

impl FromStr for DiscountRate {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        parse_fraction(RateKind::Discount, raw).and_then(Self::new)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePricing {
    pub discounted_price: Decimal,
    pub line_total: Decimal,
    pub customer_price: Decimal,
    pub customer_line_total: Decimal,
}

pub fn apply_discount(list_price: Decimal, rate: DiscountRate) -> Result<Decimal, DomainError> {
    list_price.checked_mul(rate.multiplier()).ok_or(DomainError::AmountOverflow)
}

pub fn line_total(discounted_price: Decimal, quantity: u32) -> Result<Decimal, DomainError> {
    if quantity == 0 {
        return Err(DomainError::InvalidQuantity { quantity: 0 });
    }
    discounted_price.checked_mul(Decimal::from(quantity)).ok_or(DomainError::AmountOverflow)
}

/// Grosses the distributor price up so the margin is a share of the selling price.
/// A margin close to 1 can push the result past the decimal range.
pub fn customer_price(discounted_price: Decimal, margin: Margin) -> Result<Decimal, DomainError> {
    if margin.value() <= Decimal::ZERO {
        return Ok(discounted_price);
    }
    discounted_price
        .checked_div(Decimal::ONE - margin.value())
        .ok_or(DomainError::AmountOverflow)
}

pub fn customer_line_total(
    discounted_price: Decimal,
    margin: Margin,
    quantity: u32,
) -> Result<Decimal, DomainError> {
    line_total(customer_price(discounted_price, margin)?, quantity)
}

pub fn price_line(
    list_price: Decimal,
    rate: DiscountRate,
    quantity: u32,
    margin: Margin,
) -> Result<LinePricing, DomainError> {
    let discounted_price = apply_discount(list_price, rate)?;
    let line_total = line_total(discounted_price, quantity)?;
    let customer_price = customer_price(discounted_price, margin)?;
    let customer_line_total = self::line_total(customer_price, quantity)?;

    Ok(LinePricing { discounted_price, line_total, customer_price, customer_line_total })
}

pub fn add_amounts(left: Decimal, right: Decimal) -> Result<Decimal, DomainError> {
    left.checked_add(right).ok_or(DomainError::AmountOverflow)
}

pub fn sum_amounts(amounts: impl IntoIterator<Item = Decimal>) -> Result<Decimal, DomainError> {
    amounts.into_iter().try_fold(Decimal::ZERO, add_amounts)
}

/// Parses user-entered quantities; rejects zero, negatives and fractions.
pub fn parse_quantity(raw: &str) -> Result<u32, DomainError> {
    let trimmed = raw.trim();
    let quantity = trimmed
        .parse::<i64>()
        .map_err(|_| DomainError::UnparsableQuantity(trimmed.to_string()))?;
    if quantity <= 0 {
        return Err(DomainError::InvalidQuantity { quantity });
    }
    u32::try_from(quantity).map_err(|_| DomainError::UnparsableQuantity(trimmed.to_string()))
}

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn format_money(amount: Decimal) -> String {
    format!("${:.2}", round_money(amount))
}

fn check_fraction(kind: RateKind, value: Decimal) -> Result<Decimal, DomainError> {
    if value < Decimal::ZERO || value >= Decimal::ONE {
        return Err(DomainError::RateOutOfRange { kind, value });
    }
    Ok(value)
}

fn parse_fraction(kind: RateKind, raw: &str) -> Result<Decimal, DomainError> {
    let trimmed = raw.trim();
    let unparsable = || DomainError::UnparsableRate { kind, raw: trimmed.to_string() };

    match trimmed.strip_suffix('%') {
        Some(percent) => Decimal::from_str(percent.trim())
            .map(|value| value / Decimal::ONE_HUNDRED)
            .map_err(|_| unparsable()),
        None => Decimal::from_str(trimmed).map_err(|_| unparsable()),
    }
}
