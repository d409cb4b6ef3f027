use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

use crate::error::{Result, TurnipBotError};
use crate::interfaces::transport::ChatTransport;

/// Writes replies as plain lines, one reply block per message.
pub struct ConsoleTransport<W = Stdout> {
    out: Mutex<W>,
}

impl ConsoleTransport<Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> ConsoleTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[async_trait]
impl<W> ChatTransport for ConsoleTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn name(&self) -> &str {
        "console"
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        let mut out = self.out.lock().await;
        let line = format!("[{chat_id}] {text}\n");
        out.write_all(line.as_bytes())
            .await
            .map_err(|e| TurnipBotError::Runtime(e.to_string()))?;
        out.flush()
            .await
            .map_err(|e| TurnipBotError::Runtime(e.to_string()))
    }
}
