pub mod client;
pub mod config;
pub mod daemon;
pub mod db;
pub mod domains;
pub mod error;
pub mod interfaces;
pub mod logging;
pub mod providers;
pub mod runtime_paths;
pub mod services;
pub mod texts;
pub mod timebucket;
pub mod transports;

pub type Result<T> = std::result::Result<T, error::TurnipBotError>;
