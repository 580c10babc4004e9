use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use server::config::ServerConfig;
use server::connection_manager::hande_listen_server;
use server::database::DatabaseConnection;
use server::database_manager::DatabaseManager;
use server::ids::RandomIds;
use server::wager_manager::{WagerHandle, WagerManager};
use tokio::join;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("server=info,common=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();
    init_tracing();
    info!(?config, "starting wager book");

    let database =
        DatabaseConnection::in_memory(&config.namespace, &config.database, &config.account).await?;
    let (db_tx, db_rx) = mpsc::channel(config.queue_depth);
    let mut db_manager = DatabaseManager::new(database, db_rx);

    let db_task = tokio::spawn(async move {
        db_manager.manage().await;
    });

    let (wager_tx, wager_rx) = mpsc::channel(config.queue_depth);
    let mut wager_manager =
        WagerManager::start(wager_rx, db_tx, config.opening_balance, Arc::new(RandomIds)).await?;

    let wager_task = tokio::spawn(async move {
        wager_manager.manage().await;
    });

    let listener = TcpListener::bind(config.listen).await?;
    let wagers = WagerHandle::new(wager_tx);
    let listen_server_task = tokio::spawn(async move {
        if let Err(e) = hande_listen_server(listener, wagers).await {
            error!(error = %e, "listener stopped");
        }
    });

    let (res1, res2, res3) = join!(db_task, wager_task, listen_server_task);
    res1?;
    res2?;
    res3?;
    Ok(())
}
