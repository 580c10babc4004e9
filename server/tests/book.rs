use std::sync::Arc;

use chrono::NaiveDate;
use common::network::{Connection, Request, Response};
use common::{BetStatus, BookError, NewLeg};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use server::connection_manager::hande_listen_server;
use server::database::DatabaseConnection;
use server::database_manager::{DatabaseManager, DatabaseRequest};
use server::history::DateRange;
use server::ids::SequentialIds;
use server::wager_manager::{WagerHandle, WagerManager};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

async fn start_database() -> mpsc::Sender<DatabaseRequest> {
    start_database_task().await.0
}

async fn start_database_task() -> (mpsc::Sender<DatabaseRequest>, JoinHandle<()>) {
    let database = DatabaseConnection::in_memory("test", "wager_book", "main")
        .await
        .unwrap();
    let (db_tx, db_rx) = mpsc::channel(8);
    let mut db_manager = DatabaseManager::new(database, db_rx);
    let task = tokio::spawn(async move { db_manager.manage().await });
    (db_tx, task)
}

async fn start_book(db_tx: mpsc::Sender<DatabaseRequest>, opening_balance: Decimal) -> WagerHandle {
    let (wager_tx, wager_rx) = mpsc::channel(8);
    let mut manager = WagerManager::start(
        wager_rx,
        db_tx,
        opening_balance,
        Arc::new(SequentialIds::new()),
    )
    .await
    .unwrap();
    tokio::spawn(async move { manager.manage().await });
    WagerHandle::new(wager_tx)
}

fn rejection(error: anyhow::Error) -> BookError {
    error.downcast::<BookError>().unwrap()
}

fn day(d: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2024, 6, d)
}

#[tokio::test]
async fn winning_parlay_pays_out_once() {
    let book = start_book(start_database().await, dec!(100)).await;

    let wager = book.create_wager("Saturday double", day(1), dec!(0)).await.unwrap();
    assert_eq!(book.set_stake(wager, dec!(10)).await.unwrap(), dec!(90));
    book.add_leg(wager, NewLeg::new(dec!(2.0)).with_status(BetStatus::Won))
        .await
        .unwrap();

    let settlement = book.settle(wager).await.unwrap();
    assert_eq!(settlement.status, BetStatus::Won);
    assert_eq!(settlement.winnings, dec!(20));
    assert_eq!(book.balance().await.unwrap(), dec!(110));

    let again = rejection(book.settle(wager).await.unwrap_err());
    assert_eq!(again, BookError::InvalidState { wager_id: wager });
    assert_eq!(book.balance().await.unwrap(), dec!(110));

    assert_eq!(book.delete_wager(wager).await.unwrap(), dec!(100));
    assert!(book.get_wager(wager).await.is_err());
}

#[tokio::test]
async fn losing_and_pending_wagers() {
    let book = start_book(start_database().await, dec!(100)).await;

    let lost = book.create_wager("Long shot", day(2), dec!(10)).await.unwrap();
    book.add_leg(lost, NewLeg::new(dec!(1.5)).with_status(BetStatus::Lost))
        .await
        .unwrap();
    let settlement = book.settle(lost).await.unwrap();
    assert_eq!(settlement.status, BetStatus::Lost);
    assert_eq!(settlement.winnings, Decimal::ZERO);
    assert_eq!(book.balance().await.unwrap(), dec!(90));

    let pending = book.create_wager("Evening", day(2), dec!(5)).await.unwrap();
    let leg = book.add_leg(pending, NewLeg::new(dec!(3))).await.unwrap();
    let blocked = rejection(book.settle(pending).await.unwrap_err());
    assert_eq!(blocked, BookError::PendingLegs { wager_id: pending });
    assert_eq!(book.balance().await.unwrap(), dec!(85));

    book.set_leg_status(pending, leg, BetStatus::Won).await.unwrap();
    book.settle(pending).await.unwrap();
    assert_eq!(book.balance().await.unwrap(), dec!(100));
}

#[tokio::test]
async fn stake_round_trip() {
    let book = start_book(start_database().await, dec!(100)).await;
    let wager = book.create_wager("Stake test", day(3), dec!(0)).await.unwrap();

    assert_eq!(book.set_stake(wager, dec!(50)).await.unwrap(), dec!(50));
    assert_eq!(book.set_stake(wager, dec!(20)).await.unwrap(), dec!(80));

    let too_much = rejection(book.set_stake(wager, dec!(200)).await.unwrap_err());
    assert_eq!(
        too_much,
        BookError::InsufficientFunds {
            balance: dec!(80),
            requested: dec!(180),
        }
    );
    assert_eq!(book.get_wager(wager).await.unwrap().stake, dec!(20));
    assert_eq!(book.balance().await.unwrap(), dec!(80));
}

#[tokio::test]
async fn book_survives_a_restart() {
    let db_tx = start_database().await;
    let book = start_book(db_tx.clone(), dec!(100)).await;

    let wager = book.create_wager("Derby", day(4), dec!(25)).await.unwrap();
    let leg = book
        .add_leg(wager, NewLeg::new(dec!(1.80)).with_title("Away win"))
        .await
        .unwrap();
    book.edit_leg(wager, leg, "Away win or draw", Some("Football".into()))
        .await
        .unwrap();
    book.set_leg_status(wager, leg, BetStatus::Won).await.unwrap();
    book.settle(wager).await.unwrap();
    let before = book.get_wager(wager).await.unwrap();
    drop(book);

    // opening balance only applies to a fresh account
    let book = start_book(db_tx, dec!(999)).await;
    assert_eq!(book.balance().await.unwrap(), dec!(120));
    let after = book.get_wager(wager).await.unwrap();
    assert_eq!(after, before);
    assert_eq!(after.legs[0].sport.as_deref(), Some("Football"));
}

#[tokio::test]
async fn failed_commits_leave_the_book_untouched() {
    let (db_tx, db_task) = start_database_task().await;
    let book = start_book(db_tx, dec!(100)).await;
    let wager = book.create_wager("Offline", day(7), dec!(10)).await.unwrap();
    book.add_leg(wager, NewLeg::new(dec!(2)).with_status(BetStatus::Won))
        .await
        .unwrap();

    db_task.abort();
    assert!(db_task.await.unwrap_err().is_cancelled());

    assert!(book.set_stake(wager, dec!(50)).await.is_err());
    assert!(book.settle(wager).await.is_err());
    assert!(book.deposit(dec!(5)).await.is_err());

    assert_eq!(book.balance().await.unwrap(), dec!(90));
    let unchanged = book.get_wager(wager).await.unwrap();
    assert_eq!(unchanged.stake, dec!(10));
    assert!(!unchanged.is_settled());
}

#[tokio::test]
async fn overflowing_deposit_is_rejected_and_the_book_keeps_serving() {
    let book = start_book(start_database().await, Decimal::MAX).await;

    let overflow = rejection(book.deposit(dec!(1)).await.unwrap_err());
    assert!(matches!(overflow, BookError::Validation { .. }));
    assert_eq!(book.balance().await.unwrap(), Decimal::MAX);
}

#[tokio::test]
async fn history_and_listing() {
    let book = start_book(start_database().await, dec!(200)).await;

    let first = book.create_wager("Early", day(1), dec!(10)).await.unwrap();
    book.add_leg(first, NewLeg::new(dec!(2.5)).with_status(BetStatus::Won))
        .await
        .unwrap();
    book.settle(first).await.unwrap();

    let second = book.create_wager("Late", day(5), dec!(20)).await.unwrap();
    book.add_leg(second, NewLeg::new(dec!(2)).with_status(BetStatus::Lost))
        .await
        .unwrap();
    book.settle(second).await.unwrap();

    book.create_wager("Open", day(5), dec!(5)).await.unwrap();

    let all = book.history(DateRange::new(None, None)).await.unwrap();
    assert_eq!(all.won, 1);
    assert_eq!(all.lost, 1);
    assert_eq!(all.settled, 2);
    assert_eq!(all.win_rate, dec!(0.5));
    assert_eq!(all.total_profit, dec!(-5));

    let early = book.history(DateRange::new(day(1), day(2))).await.unwrap();
    assert_eq!(early.settled, 1);
    assert_eq!(early.total_profit, dec!(15));

    assert_eq!(book.list_wagers(None).await.unwrap().len(), 3);
    assert_eq!(book.list_wagers(day(5)).await.unwrap().len(), 2);
}

#[tokio::test]
async fn websocket_clients_get_rejection_reasons() {
    let book = start_book(start_database().await, dec!(100)).await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move { hande_listen_server(listener, book).await });

    let mut client = Connection::connect(&format!("ws://{address}")).await.unwrap();
    assert_eq!(
        client.call(Request::Balance).await.unwrap(),
        Response::Balance(dec!(100))
    );

    let response = client
        .call(Request::CreateWager {
            title: "Too rich".into(),
            placed_on: None,
            stake: Some(dec!(500)),
        })
        .await
        .unwrap();
    assert_eq!(
        response,
        Response::Rejected(BookError::InsufficientFunds {
            balance: dec!(100),
            requested: dec!(500),
        })
    );

    let Response::WagerCreated(wager_id) = client
        .call(Request::CreateWager {
            title: "Fits".into(),
            placed_on: day(6),
            stake: Some(dec!(40)),
        })
        .await
        .unwrap()
    else {
        panic!("wager was not created");
    };
    assert_eq!(
        client.call(Request::DeleteWager { wager_id }).await.unwrap(),
        Response::Balance(dec!(100))
    );
    client.close().await.unwrap();
}
