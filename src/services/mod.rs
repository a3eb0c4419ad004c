pub mod finnhub;
pub mod market_data;
pub mod db_init;

pub mod alerts_service;
pub mod watchlist_service;
pub mod user_directory;
pub mod memory_store;

pub mod notifier;
pub mod alert_monitor;
pub mod digest;
pub mod scheduler;
