use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use common::{BetStatus, OutcomeLeg, Settlement, WagerId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use surrealdb::engine::local::{Db, Mem};
use surrealdb::sql::statements::{BeginStatement, CommitStatement};
use surrealdb::sql::{Id, Thing};
use surrealdb::{Connection, Result, Surreal};
use uuid::Uuid;

use crate::wager::{Wager, WagerState};

const ACCOUNT_TABLE: &str = "account";
const WAGER_TABLE: &str = "wager";

pub fn wager_thing(wager_id: WagerId) -> Thing {
    Thing {
        tb: WAGER_TABLE.into(),
        id: Id::String(wager_id.to_string()),
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DbAccount {
    pub id: Thing,
    pub name: String,
    pub balance: Decimal,
}

impl DbAccount {
    pub fn new(name: impl Into<String> + Clone, balance: Decimal) -> Self {
        Self {
            id: Thing {
                tb: ACCOUNT_TABLE.into(),
                id: Id::String(name.clone().into()),
            },
            name: name.into(),
            balance,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DbLeg {
    pub id: String,
    pub title: String,
    pub sport: Option<String>,
    pub odds: Decimal,
    pub status: BetStatus,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DbSettlement {
    pub status: BetStatus,
    pub total_odds: Decimal,
    pub winnings: Decimal,
    pub settled_at: DateTime<Utc>,
}

/// One document per wager, legs and settlement snapshot embedded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DbWager {
    pub id: Thing,
    pub title: String,
    pub placed_on: NaiveDate,
    pub stake: Decimal,
    pub legs: Vec<DbLeg>,
    pub settlement: Option<DbSettlement>,
}

impl From<&Wager> for DbWager {
    fn from(wager: &Wager) -> Self {
        Self {
            id: wager_thing(wager.id()),
            title: wager.title().to_owned(),
            placed_on: wager.placed_on(),
            stake: wager.stake(),
            legs: wager
                .legs()
                .iter()
                .map(|leg| DbLeg {
                    id: leg.id.to_string(),
                    title: leg.title.clone(),
                    sport: leg.sport.clone(),
                    odds: leg.odds,
                    status: leg.status,
                })
                .collect(),
            settlement: wager.settlement().map(|s| DbSettlement {
                status: s.status,
                total_odds: s.total_odds,
                winnings: s.winnings,
                settled_at: s.settled_at,
            }),
        }
    }
}

impl TryFrom<DbWager> for Wager {
    type Error = anyhow::Error;

    fn try_from(value: DbWager) -> anyhow::Result<Self> {
        let id = Uuid::parse_str(&value.id.id.to_raw())
            .with_context(|| format!("malformed wager id {}", value.id))?;
        let legs = value
            .legs
            .into_iter()
            .map(|leg| {
                Ok(OutcomeLeg {
                    id: Uuid::parse_str(&leg.id)
                        .with_context(|| format!("malformed leg id {}", leg.id))?,
                    title: leg.title,
                    sport: leg.sport,
                    odds: leg.odds,
                    status: leg.status,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let state = match value.settlement {
            Some(s) => WagerState::Settled(Settlement {
                status: s.status,
                total_odds: s.total_odds,
                winnings: s.winnings,
                settled_at: s.settled_at,
            }),
            None => WagerState::Open,
        };
        Ok(Wager::from_parts(
            id,
            value.title,
            value.placed_on,
            value.stake,
            legs,
            state,
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WagerChange {
    Unchanged,
    Upsert(DbWager),
    Remove(Thing),
}

/// Everything one book operation changed: the new balance and at most one
/// wager document.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub balance: Decimal,
    pub wager: WagerChange,
}

pub struct DatabaseConnection<C: Connection> {
    connection: Surreal<C>,
    account: Thing,
}

impl DatabaseConnection<Db> {
    pub async fn in_memory(namespace: &str, database: &str, account: &str) -> Result<Self> {
        let db = Surreal::new::<Mem>(()).await?;
        Self::new(db, namespace, database, account).await
    }
}

impl<C: Connection> DatabaseConnection<C> {
    pub async fn new(
        connection: Surreal<C>,
        namespace: &str,
        database: &str,
        account: &str,
    ) -> Result<Self> {
        connection.use_ns(namespace).use_db(database).await?;
        Ok(Self {
            connection,
            account: DbAccount::new(account, Decimal::ZERO).id,
        })
    }

    pub async fn get_account(&self) -> Result<Option<DbAccount>> {
        self.connection.select(self.account.clone()).await
    }

    /// Returns the account record, creating it with `opening_balance` the
    /// first time.
    pub async fn open_account(&mut self, opening_balance: Decimal) -> Result<DbAccount> {
        if let Some(account) = self.get_account().await? {
            return Ok(account);
        }
        let account = DbAccount::new(self.account.id.to_raw(), opening_balance);
        let _: Option<DbAccount> = self
            .connection
            .create(self.account.clone())
            .content(&account)
            .await?;
        Ok(account)
    }

    pub async fn get_all_wagers(&self) -> Result<Vec<DbWager>> {
        self.connection.select(WAGER_TABLE).await
    }

    pub async fn get_wager(&self, wager_id: WagerId) -> Result<Option<DbWager>> {
        self.connection.select(wager_thing(wager_id)).await
    }

    /// Writes the balance and the wager change in one transaction.
    pub async fn commit(&mut self, commit: &Commit) -> Result<()> {
        let query = self
            .connection
            .query(BeginStatement)
            .query("UPDATE $account SET balance = $balance;")
            .bind(("account", &self.account))
            .bind(("balance", commit.balance));
        let query = match &commit.wager {
            WagerChange::Unchanged => query,
            WagerChange::Upsert(wager) => query
                .query("UPDATE $wager CONTENT $content;")
                .bind(("wager", &wager.id))
                .bind(("content", wager)),
            WagerChange::Remove(wager_id) => {
                query.query("DELETE $wager;").bind(("wager", wager_id))
            }
        };
        query.query(CommitStatement).await?.check()?;
        Ok(())
    }
}
