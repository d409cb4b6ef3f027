#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use turnip_bot::client::TurnipBot;
use turnip_bot::config::Config;
use turnip_bot::interfaces::clock::FixedClock;
use turnip_bot::interfaces::storage::TurnipStore;
use turnip_bot::interfaces::transport::{ChatKind, IncomingMessage, ObservedChat, ObservedUser};
use turnip_bot::services::turnips::TurnipService;
use turnip_bot::timebucket::TimeBucketer;

pub const GROUP_ID: i64 = -1001;

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn villager(id: i64, first_name: &str) -> ObservedUser {
    ObservedUser {
        id,
        first_name: first_name.to_string(),
        last_name: String::new(),
        username: String::new(),
    }
}

pub fn island() -> ObservedChat {
    ObservedChat {
        id: GROUP_ID,
        title: "Nook Island".to_string(),
        kind: ChatKind::Group,
    }
}

pub fn service(store: Arc<dyn TurnipStore>, clock: Arc<FixedClock>) -> TurnipService {
    TurnipService::new(store, clock, TimeBucketer::default(), chrono_tz::UTC)
}

pub fn test_config() -> Config {
    let mut config = Config::convention_defaults(":memory:");
    config.texts_dir = Some(concat!(env!("CARGO_MANIFEST_DIR"), "/texts").to_string());
    config
}

pub fn bot(config: &Config, store: Arc<dyn TurnipStore>, clock: Arc<FixedClock>) -> TurnipBot {
    TurnipBot::with_parts(config, store, clock).unwrap()
}

pub fn message(user: &ObservedUser, chat: &ObservedChat, text: &str) -> IncomingMessage {
    IncomingMessage {
        user: user.clone(),
        chat: chat.clone(),
        text: text.to_string(),
        sender_is_admin: false,
    }
}
