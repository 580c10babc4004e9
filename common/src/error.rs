use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::WagerId;

pub type Result<T> = std::result::Result<T, BookError>;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum Entity {
    Wager,
    Leg,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Wager => f.write_str("wager"),
            Entity::Leg => f.write_str("leg"),
        }
    }
}

/// Reasons the book rejects an operation. A rejected operation leaves every
/// wager and the balance exactly as they were.
#[derive(Serialize, Deserialize, Debug, Error, PartialEq, Eq, Clone)]
pub enum BookError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: Uuid },
    #[error("wager {wager_id} is settled and can no longer change")]
    InvalidState { wager_id: WagerId },
    #[error("wager {wager_id} has no stake")]
    ZeroStake { wager_id: WagerId },
    #[error("wager {wager_id} has no legs")]
    NoLegs { wager_id: WagerId },
    #[error("wager {wager_id} still has pending legs")]
    PendingLegs { wager_id: WagerId },
    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },
    #[error("operation would leave a negative balance of {projected}")]
    NegativeBalance { projected: Decimal },
}

impl BookError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BookError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn wager_not_found(id: WagerId) -> Self {
        BookError::NotFound {
            entity: Entity::Wager,
            id,
        }
    }

    pub fn leg_not_found(id: Uuid) -> Self {
        BookError::NotFound {
            entity: Entity::Leg,
            id,
        }
    }
}
