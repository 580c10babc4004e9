use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod error;
pub mod money;
pub mod network;
pub mod status;

pub use error::{BookError, Entity};
pub use status::resolve;

pub type WagerId = Uuid;
pub type LegId = Uuid;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetStatus {
    #[default]
    Pending,
    Won,
    Lost,
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BetStatus::Pending => "PENDING",
            BetStatus::Won => "WON",
            BetStatus::Lost => "LOST",
        };
        f.write_str(label)
    }
}

/// One selection ("betting market") inside a wager.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct OutcomeLeg {
    pub id: LegId,
    pub title: String,
    pub sport: Option<String>,
    pub odds: Decimal,
    pub status: BetStatus,
}

// A potential, unrealised leg. To be used for adding a new leg to an open wager
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct NewLeg {
    pub title: String,
    pub sport: Option<String>,
    pub odds: Decimal,
    pub status: BetStatus,
}

impl NewLeg {
    pub fn new(odds: Decimal) -> Self {
        Self {
            title: String::new(),
            sport: None,
            odds,
            status: BetStatus::Pending,
        }
    }

    pub fn with_status(mut self, status: BetStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_sport(mut self, sport: impl Into<String>) -> Self {
        self.sport = Some(sport.into());
        self
    }
}

/// Figures frozen at the moment a wager is settled.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Settlement {
    pub status: BetStatus,
    pub total_odds: Decimal,
    pub winnings: Decimal,
    pub settled_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Wager {
    pub id: WagerId,
    pub title: String,
    pub placed_on: NaiveDate,
    pub stake: Decimal,
    pub legs: Vec<OutcomeLeg>,
    pub settlement: Option<Settlement>,
}

impl Wager {
    pub fn is_settled(&self) -> bool {
        self.settlement.is_some()
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct DailyResult {
    pub date: NaiveDate,
    pub net: Decimal,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
pub struct HistorySummary {
    pub won: u32,
    pub lost: u32,
    pub settled: u32,
    /// Fraction of settled wagers that were won, in `[0, 1]`.
    pub win_rate: Decimal,
    pub total_profit: Decimal,
    pub daily: Vec<DailyResult>,
}
