use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::client::TurnipBot;
use crate::config::Config;
use crate::error::{Result, TurnipBotError};
use crate::interfaces::transport::{ChatKind, IncomingMessage, ObservedChat, ObservedUser};

#[derive(Clone)]
pub struct AppState {
    pub bot: Arc<TurnipBot>,
    pub token: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Deserialize)]
struct MessageRequest {
    user: ObservedUser,
    chat: ObservedChat,
    text: String,
    #[serde(default)]
    sender_is_admin: bool,
}

#[derive(Serialize)]
struct MessageResponse {
    reply: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/message", post(message))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("TURNIP_GIT_SHA").to_string(),
    })
}

async fn message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<MessageRequest>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    if payload.chat.kind == ChatKind::Private && payload.chat.id != payload.user.id {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "private chat id must match the user id".to_string(),
            }),
        )
            .into_response();
    }

    let incoming = IncomingMessage {
        user: payload.user,
        chat: payload.chat,
        text: payload.text,
        sender_is_admin: payload.sender_is_admin,
    };
    tracing::debug!(
        user_id = incoming.user.id,
        chat_id = incoming.chat.id,
        "Received webhook message"
    );
    let reply = state.bot.process(&incoming).await;
    (StatusCode::OK, Json(MessageResponse { reply })).into_response()
}

fn authorize(
    headers: &HeaderMap,
    token: &str,
) -> std::result::Result<(), (StatusCode, Json<ErrorResponse>)> {
    let expected_token = token.trim();
    let unauthorized = || {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Unauthorized".to_string(),
            }),
        )
    };
    if expected_token.is_empty() {
        return Err(unauthorized());
    }

    let header = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let api_key = headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let bearer = header.strip_prefix("Bearer ").unwrap_or("").trim();

    if bearer == expected_token || api_key.trim() == expected_token {
        Ok(())
    } else {
        Err(unauthorized())
    }
}

pub async fn run(config: &Config) -> Result<()> {
    run_with_shutdown(config, futures::future::pending::<()>()).await
}

pub async fn run_with_shutdown<F>(config: &Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let token = config.resolve_token().ok_or_else(|| {
        TurnipBotError::Config(format!(
            "daemon token missing; set {} or daemon.token",
            crate::config::TOKEN_ENV
        ))
    })?;
    let bot = Arc::new(TurnipBot::from_config(config).await?);
    let app = build_router(AppState { bot, token });

    let addr = format!("{}:{}", config.daemon.host, config.daemon.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| TurnipBotError::Runtime(e.to_string()))?;
    tracing::info!(%addr, "Daemon listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| TurnipBotError::Runtime(e.to_string()))?;

    tracing::info!("Daemon stopped");
    Ok(())
}
