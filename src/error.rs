use thiserror::Error;

#[derive(Debug, Error)]
pub enum TurnipBotError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("date parse failed: {0}")]
    DateParse(String),
    #[error("invalid timezone: {0}")]
    Timezone(String),
    #[error("texts error: {0}")]
    Texts(String),
    #[error("market closed on {0}")]
    MarketClosed(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl TurnipBotError {
    /// Errors caused by user input rather than by a fault in the bot.
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            Self::DateParse(_) | Self::Timezone(_) | Self::MarketClosed(_)
        )
    }
}

pub use crate::Result;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_input_classification() {
        let err = TurnipBotError::DateParse("not-a-date".to_string());
        assert!(format!("{err}").contains("date parse failed"));
        assert!(err.is_user_input());

        let err = TurnipBotError::Storage("disk I/O error".to_string());
        assert!(format!("{err}").starts_with("storage error"));
        assert!(!err.is_user_input());
    }
}
