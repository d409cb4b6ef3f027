use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ObservedUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    Private,
    #[default]
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ObservedChat {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub kind: ChatKind,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IncomingMessage {
    pub user: ObservedUser,
    pub chat: ObservedChat,
    pub text: String,
    #[serde(default)]
    pub sender_is_admin: bool,
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    fn name(&self) -> &str;
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()>;
}
