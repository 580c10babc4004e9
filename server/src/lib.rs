pub mod config;
pub mod connection_manager;
pub mod coordinator;
pub mod database;
pub mod database_manager;
pub mod history;
pub mod ids;
pub mod ledger;
pub mod wager;
pub mod wager_manager;
