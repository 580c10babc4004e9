use std::net::SocketAddr;

use clap::Parser;
use rust_decimal::Decimal;

/// Wager book server.
#[derive(Parser, Debug, Clone)]
#[command(name = "wager-book-server")]
#[command(about = "Parlay wager ledger served over websocket", long_about = None)]
pub struct ServerConfig {
    /// Address the websocket listener binds to
    #[arg(long, env = "WAGER_BOOK_LISTEN", default_value = "127.0.0.1:6379")]
    pub listen: SocketAddr,

    /// Database namespace
    #[arg(long, env = "WAGER_BOOK_NAMESPACE", default_value = "wager_book")]
    pub namespace: String,

    #[arg(long, env = "WAGER_BOOK_DATABASE", default_value = "book")]
    pub database: String,

    /// Account record holding the balance
    #[arg(long, env = "WAGER_BOOK_ACCOUNT", default_value = "main")]
    pub account: String,

    /// Balance given to the account the first time it is created
    #[arg(long, env = "WAGER_BOOK_OPENING_BALANCE", default_value = "0")]
    pub opening_balance: Decimal,

    /// Capacity of the manager work queues
    #[arg(long, env = "WAGER_BOOK_QUEUE_DEPTH", default_value_t = 32)]
    pub queue_depth: usize,
}
