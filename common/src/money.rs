use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{BookError, Result};

/// Amounts and odds carry at most this many fractional digits.
pub const MONEY_SCALE: u32 = 2;

fn has_excess_precision(value: Decimal) -> bool {
    value.normalize().scale() > MONEY_SCALE
}

/// Checks that `amount` is a non-negative figure with at most two decimals.
pub fn validate_amount(field: &str, amount: Decimal) -> Result<Decimal> {
    if amount < Decimal::ZERO {
        return Err(BookError::validation(field, "must not be negative"));
    }
    if has_excess_precision(amount) {
        return Err(BookError::validation(field, "more than two decimal places"));
    }
    Ok(amount)
}

pub fn validate_odds(odds: Decimal) -> Result<Decimal> {
    if odds <= Decimal::ZERO {
        return Err(BookError::validation("odds", "must be greater than zero"));
    }
    if has_excess_precision(odds) {
        return Err(BookError::validation("odds", "more than two decimal places"));
    }
    Ok(odds)
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}
