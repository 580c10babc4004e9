use common::error::Result;
use common::money::validate_amount;
use common::BookError;
use rust_decimal::Decimal;

/// The single running balance of an account.
///
/// Every operation either applies in full or returns an error and leaves the
/// balance untouched; the balance is never negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    balance: Decimal,
}

impl Ledger {
    pub fn new(opening_balance: Decimal) -> Result<Self> {
        let balance = validate_amount("opening balance", opening_balance)?;
        Ok(Self { balance })
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn credit(&mut self, amount: Decimal) -> Result<()> {
        let amount = validate_amount("amount", amount)?;
        self.balance = self.checked_add(amount)?;
        Ok(())
    }

    pub fn debit(&mut self, amount: Decimal) -> Result<()> {
        let amount = validate_amount("amount", amount)?;
        if self.balance - amount < Decimal::ZERO {
            return Err(BookError::InsufficientFunds {
                balance: self.balance,
                requested: amount,
            });
        }
        self.balance -= amount;
        Ok(())
    }

    /// Credits a positive `delta`, debits a negative one.
    pub fn adjust(&mut self, delta: Decimal) -> Result<()> {
        if delta < Decimal::ZERO {
            self.debit(-delta)
        } else {
            self.credit(delta)
        }
    }

    pub fn projected(&self, delta: Decimal) -> Result<Decimal> {
        self.checked_add(delta)
    }

    fn checked_add(&self, delta: Decimal) -> Result<Decimal> {
        self.balance
            .checked_add(delta)
            .ok_or_else(|| BookError::validation("amount", "balance would overflow"))
    }
}
