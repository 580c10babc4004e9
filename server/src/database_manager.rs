use rust_decimal::Decimal;
use surrealdb::Connection;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::database::{Commit, DatabaseConnection};
use crate::wager::Wager;

pub type Responder<T> = oneshot::Sender<anyhow::Result<T>>;

/// Account balance and wagers as last committed.
#[derive(Debug, Clone)]
pub struct StoredBook {
    pub balance: Decimal,
    pub wagers: Vec<Wager>,
}

pub enum DatabaseRequest {
    LoadBook {
        opening_balance: Decimal,
        responder: Responder<StoredBook>,
    },
    Commit {
        commit: Commit,
        responder: Responder<()>,
    },
}

pub struct DatabaseManager<Conn: Connection> {
    db_connection: DatabaseConnection<Conn>,
    work_queue: mpsc::Receiver<DatabaseRequest>,
}

pub fn transform_err<T>(error: surrealdb::Result<T>) -> anyhow::Result<T> {
    match error {
        Ok(t) => Ok(t),
        Err(e) => Err(e.into()),
    }
}

impl<Conn: Connection> DatabaseManager<Conn> {
    pub fn new(
        db_connection: DatabaseConnection<Conn>,
        work_queue: mpsc::Receiver<DatabaseRequest>,
    ) -> Self {
        Self {
            db_connection,
            work_queue,
        }
    }

    pub async fn manage(&mut self) {
        info!("database manager started");
        while let Some(request) = self.work_queue.recv().await {
            match request {
                DatabaseRequest::LoadBook {
                    opening_balance,
                    responder,
                } => {
                    let resp = self.load_book(opening_balance).await;
                    if let Err(e) = &resp {
                        error!(error = %e, "failed to load book");
                    }
                    let _ = responder.send(resp);
                }
                DatabaseRequest::Commit { commit, responder } => {
                    let resp = transform_err(self.db_connection.commit(&commit).await);
                    match &resp {
                        Ok(()) => debug!(balance = %commit.balance, "committed"),
                        Err(e) => error!(error = %e, "commit failed"),
                    }
                    let _ = responder.send(resp);
                }
            }
        }
        info!("database manager stopped");
    }

    async fn load_book(&mut self, opening_balance: Decimal) -> anyhow::Result<StoredBook> {
        let account = transform_err(self.db_connection.open_account(opening_balance).await)?;
        let wagers = transform_err(self.db_connection.get_all_wagers().await)?
            .into_iter()
            .map(Wager::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(StoredBook {
            balance: account.balance,
            wagers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{DbWager, WagerChange};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[tokio::test]
    async fn load_reflects_commits() {
        let db = DatabaseConnection::in_memory("test", "wager_book", "main")
            .await
            .unwrap();
        let (tx, rx) = mpsc::channel(4);
        let mut manager = DatabaseManager::new(db, rx);
        let task = tokio::spawn(async move { manager.manage().await });

        let (resp_tx, resp_rx) = oneshot::channel();
        tx.send(DatabaseRequest::LoadBook {
            opening_balance: dec!(50),
            responder: resp_tx,
        })
        .await
        .unwrap();
        let book = resp_rx.await.unwrap().unwrap();
        assert_eq!(book.balance, dec!(50));
        assert!(book.wagers.is_empty());

        let wager = Wager::create(
            Uuid::from_u64_pair(0, 3),
            "Grand prix",
            NaiveDate::from_ymd_opt(2024, 7, 7).unwrap(),
            dec!(20),
        )
        .unwrap();
        let (resp_tx, resp_rx) = oneshot::channel();
        tx.send(DatabaseRequest::Commit {
            commit: Commit {
                balance: dec!(30),
                wager: WagerChange::Upsert(DbWager::from(&wager)),
            },
            responder: resp_tx,
        })
        .await
        .unwrap();
        resp_rx.await.unwrap().unwrap();

        let (resp_tx, resp_rx) = oneshot::channel();
        tx.send(DatabaseRequest::LoadBook {
            opening_balance: dec!(50),
            responder: resp_tx,
        })
        .await
        .unwrap();
        let book = resp_rx.await.unwrap().unwrap();
        assert_eq!(book.balance, dec!(30));
        assert_eq!(book.wagers, vec![wager]);

        drop(tx);
        task.await.unwrap();
    }
}
