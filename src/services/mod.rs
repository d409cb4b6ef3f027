pub mod commands;
pub mod resolver;
pub mod turnips;
pub mod upsert;
