use anyhow::anyhow;
use chrono::{NaiveDate, Utc};
use common::{BetStatus, BookError, HistorySummary, LegId, NewLeg, Settlement, WagerId};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

use crate::coordinator::{Checkpoint, SettlementCoordinator};
use crate::database::{wager_thing, Commit, DbWager, WagerChange};
use crate::database_manager::{DatabaseRequest, Responder};
use crate::history::{summarize, DateRange};
use crate::ids::IdSource;
use crate::ledger::Ledger;

pub enum WagerRequest {
    Balance {
        responder: Responder<Decimal>,
    },
    Deposit {
        amount: Decimal,
        responder: Responder<Decimal>,
    },
    GetWager {
        wager_id: WagerId,
        responder: Responder<common::Wager>,
    },
    ListWagers {
        placed_on: Option<NaiveDate>,
        responder: Responder<Vec<common::Wager>>,
    },
    CreateWager {
        title: String,
        placed_on: Option<NaiveDate>,
        stake: Decimal,
        responder: Responder<WagerId>,
    },
    RenameWager {
        wager_id: WagerId,
        title: String,
        responder: Responder<()>,
    },
    AddLeg {
        wager_id: WagerId,
        leg: NewLeg,
        responder: Responder<LegId>,
    },
    EditLeg {
        wager_id: WagerId,
        leg_id: LegId,
        title: String,
        sport: Option<String>,
        responder: Responder<()>,
    },
    RemoveLeg {
        wager_id: WagerId,
        leg_id: LegId,
        responder: Responder<()>,
    },
    SetLegStatus {
        wager_id: WagerId,
        leg_id: LegId,
        status: BetStatus,
        responder: Responder<()>,
    },
    SetLegOdds {
        wager_id: WagerId,
        leg_id: LegId,
        odds: Decimal,
        responder: Responder<()>,
    },
    SetStake {
        wager_id: WagerId,
        stake: Decimal,
        responder: Responder<Decimal>,
    },
    Settle {
        wager_id: WagerId,
        responder: Responder<Settlement>,
    },
    DeleteWager {
        wager_id: WagerId,
        responder: Responder<Decimal>,
    },
    History {
        range: DateRange,
        responder: Responder<HistorySummary>,
    },
}

/// Single writer for the book. Requests are served one at a time, so every
/// read-modify-write of the balance (and every settlement check-and-set) is
/// atomic with respect to the others.
///
/// Each change is committed to the database before it is acknowledged; if
/// the commit fails the in-memory book is rolled back.
pub struct WagerManager {
    coordinator: SettlementCoordinator,
    work_queue: mpsc::Receiver<WagerRequest>,
    database_requester: mpsc::Sender<DatabaseRequest>,
}

//NOTE: No functions in this impl may crash
impl WagerManager {
    /// Loads the committed book, seeding the account with `opening_balance`
    /// if it does not exist yet.
    pub async fn start(
        work_queue: mpsc::Receiver<WagerRequest>,
        database_requester: mpsc::Sender<DatabaseRequest>,
        opening_balance: Decimal,
        ids: Arc<dyn IdSource>,
    ) -> anyhow::Result<Self> {
        let (book_tx, book_rx) = oneshot::channel();
        database_requester
            .send(DatabaseRequest::LoadBook {
                opening_balance,
                responder: book_tx,
            })
            .await
            .map_err(|_| anyhow!("database manager is not running"))?;
        let book = book_rx.await??;
        info!(balance = %book.balance, wagers = book.wagers.len(), "book loaded");

        let coordinator =
            SettlementCoordinator::restore(Ledger::new(book.balance)?, book.wagers, ids);
        Ok(Self {
            coordinator,
            work_queue,
            database_requester,
        })
    }

    pub async fn manage(&mut self) {
        while let Some(request) = self.work_queue.recv().await {
            // we do not care if the receiver has already disappeared
            match request {
                WagerRequest::Balance { responder } => {
                    responder.send(Ok(self.coordinator.balance())).ok();
                }
                WagerRequest::Deposit { amount, responder } => {
                    let resp = self.transact(None, |c| c.deposit(amount)).await;
                    responder.send(resp).ok();
                }
                WagerRequest::GetWager {
                    wager_id,
                    responder,
                } => {
                    let resp = self
                        .coordinator
                        .wager(wager_id)
                        .map(common::Wager::from)
                        .map_err(anyhow::Error::from);
                    responder.send(resp).ok();
                }
                WagerRequest::ListWagers {
                    placed_on,
                    responder,
                } => {
                    responder.send(Ok(self.list_wagers(placed_on))).ok();
                }
                WagerRequest::CreateWager {
                    title,
                    placed_on,
                    stake,
                    responder,
                } => {
                    let placed_on = placed_on.unwrap_or_else(|| Utc::now().date_naive());
                    responder
                        .send(self.create_wager(title, placed_on, stake).await)
                        .ok();
                }
                WagerRequest::RenameWager {
                    wager_id,
                    title,
                    responder,
                } => {
                    let resp = self
                        .transact(Some(wager_id), |c| c.rename_wager(wager_id, title))
                        .await;
                    responder.send(resp).ok();
                }
                WagerRequest::AddLeg {
                    wager_id,
                    leg,
                    responder,
                } => {
                    let resp = self
                        .transact(Some(wager_id), |c| c.add_leg(wager_id, leg))
                        .await;
                    responder.send(resp).ok();
                }
                WagerRequest::EditLeg {
                    wager_id,
                    leg_id,
                    title,
                    sport,
                    responder,
                } => {
                    let resp = self
                        .transact(Some(wager_id), |c| c.edit_leg(wager_id, leg_id, title, sport))
                        .await;
                    responder.send(resp).ok();
                }
                WagerRequest::RemoveLeg {
                    wager_id,
                    leg_id,
                    responder,
                } => {
                    let resp = self
                        .transact(Some(wager_id), |c| c.remove_leg(wager_id, leg_id))
                        .await;
                    responder.send(resp).ok();
                }
                WagerRequest::SetLegStatus {
                    wager_id,
                    leg_id,
                    status,
                    responder,
                } => {
                    let resp = self
                        .transact(Some(wager_id), |c| c.set_leg_status(wager_id, leg_id, status))
                        .await;
                    responder.send(resp).ok();
                }
                WagerRequest::SetLegOdds {
                    wager_id,
                    leg_id,
                    odds,
                    responder,
                } => {
                    let resp = self
                        .transact(Some(wager_id), |c| c.set_leg_odds(wager_id, leg_id, odds))
                        .await;
                    responder.send(resp).ok();
                }
                WagerRequest::SetStake {
                    wager_id,
                    stake,
                    responder,
                } => {
                    let resp = self
                        .transact(Some(wager_id), |c| {
                            c.set_stake(wager_id, stake).map(|()| c.balance())
                        })
                        .await;
                    responder.send(resp).ok();
                }
                WagerRequest::Settle {
                    wager_id,
                    responder,
                } => {
                    let resp = self
                        .transact(Some(wager_id), |c| c.settle(wager_id, Utc::now()))
                        .await;
                    responder.send(resp).ok();
                }
                WagerRequest::DeleteWager {
                    wager_id,
                    responder,
                } => {
                    let resp = self
                        .transact(Some(wager_id), |c| {
                            c.delete_wager(wager_id).map(|_| c.balance())
                        })
                        .await;
                    responder.send(resp).ok();
                }
                WagerRequest::History { range, responder } => {
                    responder
                        .send(Ok(summarize(self.coordinator.wagers(), range)))
                        .ok();
                }
            }
        }
        info!("wager manager stopped");
    }

    fn list_wagers(&self, placed_on: Option<NaiveDate>) -> Vec<common::Wager> {
        let mut wagers: Vec<common::Wager> = self
            .coordinator
            .wagers()
            .filter(|w| placed_on.map_or(true, |date| w.placed_on() == date))
            .map(common::Wager::from)
            .collect();
        wagers.sort_by(|a, b| a.placed_on.cmp(&b.placed_on));
        wagers
    }

    async fn create_wager(
        &mut self,
        title: String,
        placed_on: NaiveDate,
        stake: Decimal,
    ) -> anyhow::Result<WagerId> {
        let checkpoint = self.coordinator.checkpoint(None);
        let wager_id = self.coordinator.create_wager(title, placed_on, stake)?;
        self.persist(checkpoint.track_created(wager_id)).await?;
        Ok(wager_id)
    }

    /// Applies `op` to the book and commits the result, rolling back on a
    /// failed commit. A rejected `op` has already left the book untouched.
    async fn transact<T>(
        &mut self,
        wager_id: Option<WagerId>,
        op: impl FnOnce(&mut SettlementCoordinator) -> Result<T, BookError>,
    ) -> anyhow::Result<T> {
        let checkpoint = self.coordinator.checkpoint(wager_id);
        let value = op(&mut self.coordinator)?;
        self.persist(checkpoint).await?;
        Ok(value)
    }

    async fn persist(&mut self, checkpoint: Checkpoint) -> anyhow::Result<()> {
        let wager = match checkpoint.wager_id() {
            Some(wager_id) => match self.coordinator.wager(wager_id) {
                Ok(wager) => WagerChange::Upsert(DbWager::from(wager)),
                Err(_) => WagerChange::Remove(wager_thing(wager_id)),
            },
            None => WagerChange::Unchanged,
        };
        let commit = Commit {
            balance: self.coordinator.balance(),
            wager,
        };

        let (resp_tx, resp_rx) = oneshot::channel();
        let result = match self
            .database_requester
            .send(DatabaseRequest::Commit {
                commit,
                responder: resp_tx,
            })
            .await
        {
            Ok(()) => resp_rx.await.map_err(anyhow::Error::from).and_then(|r| r),
            Err(_) => Err(anyhow!("database manager is not running")),
        };

        if let Err(e) = &result {
            error!(error = %e, "commit failed, rolling back");
            self.coordinator.rollback(checkpoint);
        }
        result
    }
}

/// Cloneable front door to a running [`WagerManager`].
#[derive(Clone)]
pub struct WagerHandle {
    sender: mpsc::Sender<WagerRequest>,
}

impl WagerHandle {
    pub fn new(sender: mpsc::Sender<WagerRequest>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Responder<T>) -> WagerRequest,
    ) -> anyhow::Result<T> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.sender
            .send(build(resp_tx))
            .await
            .map_err(|_| anyhow!("wager manager is not running"))?;
        resp_rx.await?
    }

    pub async fn balance(&self) -> anyhow::Result<Decimal> {
        self.request(|responder| WagerRequest::Balance { responder })
            .await
    }

    pub async fn deposit(&self, amount: Decimal) -> anyhow::Result<Decimal> {
        self.request(|responder| WagerRequest::Deposit { amount, responder })
            .await
    }

    pub async fn get_wager(&self, wager_id: WagerId) -> anyhow::Result<common::Wager> {
        self.request(|responder| WagerRequest::GetWager {
            wager_id,
            responder,
        })
        .await
    }

    pub async fn list_wagers(
        &self,
        placed_on: Option<NaiveDate>,
    ) -> anyhow::Result<Vec<common::Wager>> {
        self.request(|responder| WagerRequest::ListWagers {
            placed_on,
            responder,
        })
        .await
    }

    pub async fn create_wager(
        &self,
        title: impl Into<String>,
        placed_on: Option<NaiveDate>,
        stake: Decimal,
    ) -> anyhow::Result<WagerId> {
        let title = title.into();
        self.request(|responder| WagerRequest::CreateWager {
            title,
            placed_on,
            stake,
            responder,
        })
        .await
    }

    pub async fn rename_wager(
        &self,
        wager_id: WagerId,
        title: impl Into<String>,
    ) -> anyhow::Result<()> {
        let title = title.into();
        self.request(|responder| WagerRequest::RenameWager {
            wager_id,
            title,
            responder,
        })
        .await
    }

    pub async fn add_leg(&self, wager_id: WagerId, leg: NewLeg) -> anyhow::Result<LegId> {
        self.request(|responder| WagerRequest::AddLeg {
            wager_id,
            leg,
            responder,
        })
        .await
    }

    pub async fn edit_leg(
        &self,
        wager_id: WagerId,
        leg_id: LegId,
        title: impl Into<String>,
        sport: Option<String>,
    ) -> anyhow::Result<()> {
        let title = title.into();
        self.request(|responder| WagerRequest::EditLeg {
            wager_id,
            leg_id,
            title,
            sport,
            responder,
        })
        .await
    }

    pub async fn remove_leg(&self, wager_id: WagerId, leg_id: LegId) -> anyhow::Result<()> {
        self.request(|responder| WagerRequest::RemoveLeg {
            wager_id,
            leg_id,
            responder,
        })
        .await
    }

    pub async fn set_leg_status(
        &self,
        wager_id: WagerId,
        leg_id: LegId,
        status: BetStatus,
    ) -> anyhow::Result<()> {
        self.request(|responder| WagerRequest::SetLegStatus {
            wager_id,
            leg_id,
            status,
            responder,
        })
        .await
    }

    pub async fn set_leg_odds(
        &self,
        wager_id: WagerId,
        leg_id: LegId,
        odds: Decimal,
    ) -> anyhow::Result<()> {
        self.request(|responder| WagerRequest::SetLegOdds {
            wager_id,
            leg_id,
            odds,
            responder,
        })
        .await
    }

    /// Returns the balance after the stake change.
    pub async fn set_stake(&self, wager_id: WagerId, stake: Decimal) -> anyhow::Result<Decimal> {
        self.request(|responder| WagerRequest::SetStake {
            wager_id,
            stake,
            responder,
        })
        .await
    }

    pub async fn settle(&self, wager_id: WagerId) -> anyhow::Result<Settlement> {
        self.request(|responder| WagerRequest::Settle {
            wager_id,
            responder,
        })
        .await
    }

    /// Returns the balance after the refund.
    pub async fn delete_wager(&self, wager_id: WagerId) -> anyhow::Result<Decimal> {
        self.request(|responder| WagerRequest::DeleteWager {
            wager_id,
            responder,
        })
        .await
    }

    pub async fn history(&self, range: DateRange) -> anyhow::Result<HistorySummary> {
        self.request(|responder| WagerRequest::History { range, responder })
            .await
    }
}
