//! Localized reply templates.
//!
//! Templates are loaded from `<dir>/<lang>.json` once at startup. Every key
//! is required, and templates that take arguments are checked for their
//! `{placeholder}`s, so a broken translation fails at load time instead of
//! in the middle of a conversation.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, TurnipBotError};

#[derive(Debug, Clone, Deserialize)]
pub struct HelpTexts {
    pub cmd: String,
    pub desc: String,
    pub available_cmds: String,
    pub admin_cmds: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminTexts {
    pub cmd: String,
    pub desc: String,
    pub available_cmds: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuyTexts {
    pub cmd: String,
    pub params: String,
    pub desc: String,
    pub saved: String,
    pub changed: String,
    pub current: String,
    pub units_mod_ten: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SellTexts {
    pub cmd: String,
    pub params: String,
    pub desc: String,
    pub saved: String,
    pub changed: String,
    pub current: String,
    pub no_current: String,
    pub invalid_date: String,
    pub no_market_today: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListTexts {
    pub cmd: String,
    pub desc: String,
    pub owned: String,
    pub no_owned: String,
    pub prices: String,
    pub price_line: String,
    pub no_prices: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TurnipsTexts {
    pub cmd: String,
    pub desc: String,
    pub owneds: String,
    pub owned_line: String,
    pub no_owneds: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteTexts {
    pub cmd: String,
    pub desc: String,
    pub done: String,
    pub disabled: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeTzTexts {
    pub cmd: String,
    pub params: String,
    pub desc: String,
    pub current: String,
    pub changed: String,
    pub invalid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Texts {
    pub group_only: String,
    pub join_text: String,
    pub internal_error: String,
    pub invalid_parameters: String,
    pub unprivileged: String,
    pub unknown_command: String,
    pub am: String,
    pub pm: String,
    pub days_short: Vec<String>,
    pub help: HelpTexts,
    pub admin: AdminTexts,
    pub buy: BuyTexts,
    pub sell: SellTexts,
    pub list: ListTexts,
    pub turnips: TurnipsTexts,
    pub delete: DeleteTexts,
    pub changetz: ChangeTzTexts,
}

impl Texts {
    pub fn load(dir: impl AsRef<Path>, lang: &str) -> Result<Self> {
        let path = dir.as_ref().join(format!("{lang}.json"));
        let raw = fs::read_to_string(&path).map_err(|e| {
            TurnipBotError::Texts(format!("failed to read {}: {e}", path.to_string_lossy()))
        })?;
        let texts = Self::from_json_str(&raw).map_err(|err| match err {
            TurnipBotError::Texts(message) => {
                TurnipBotError::Texts(format!("{}: {message}", path.to_string_lossy()))
            }
            other => other,
        })?;
        tracing::info!(lang, path = %path.to_string_lossy(), "Loaded texts");
        Ok(texts)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let texts: Texts =
            serde_json::from_str(raw).map_err(|e| TurnipBotError::Texts(e.to_string()))?;
        texts.validate()?;
        Ok(texts)
    }

    fn validate(&self) -> Result<()> {
        if self.days_short.len() != 7 {
            return Err(TurnipBotError::Texts(
                "days_short needs seven entries starting on Monday".to_string(),
            ));
        }

        let commands = [
            &self.help.cmd,
            &self.admin.cmd,
            &self.buy.cmd,
            &self.sell.cmd,
            &self.list.cmd,
            &self.turnips.cmd,
            &self.delete.cmd,
            &self.changetz.cmd,
        ];
        if let Some(empty) = commands.iter().position(|cmd| cmd.trim().is_empty()) {
            return Err(TurnipBotError::Texts(format!(
                "command name #{empty} is empty"
            )));
        }

        let checks: [(&str, &str, &[&str]); 16] = [
            ("join_text", &self.join_text, &["title", "help_cmd"]),
            ("invalid_parameters", &self.invalid_parameters, &["usage"]),
            ("buy.saved", &self.buy.saved, &["units", "bells"]),
            (
                "buy.changed",
                &self.buy.changed,
                &["old_units", "old_bells", "units", "bells"],
            ),
            ("buy.current", &self.buy.current, &["units", "bells"]),
            ("sell.saved", &self.sell.saved, &["bells", "date"]),
            ("sell.changed", &self.sell.changed, &["old_bells", "bells", "date"]),
            ("sell.current", &self.sell.current, &["bells", "date"]),
            ("sell.no_current", &self.sell.no_current, &["date"]),
            ("sell.invalid_date", &self.sell.invalid_date, &["input"]),
            ("list.owned", &self.list.owned, &["units", "bells"]),
            ("list.price_line", &self.list.price_line, &["date", "bells"]),
            (
                "turnips.owned_line",
                &self.turnips.owned_line,
                &["name", "units", "bells"],
            ),
            ("delete.done", &self.delete.done, &["count"]),
            ("changetz.changed", &self.changetz.changed, &["timezone"]),
            ("changetz.invalid", &self.changetz.invalid, &["timezone"]),
        ];
        for (name, template, placeholders) in checks {
            for placeholder in placeholders {
                if !template.contains(&format!("{{{placeholder}}}")) {
                    return Err(TurnipBotError::Texts(format!(
                        "{name} is missing the {{{placeholder}}} placeholder"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn day_short(&self, weekday: chrono::Weekday) -> &str {
        self.days_short
            .get(weekday.num_days_from_monday() as usize)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Substitutes `{name}` placeholders in `template`.
pub fn render(template: &str, args: &[(&str, &dyn std::fmt::Display)]) -> String {
    let mut out = template.to_string();
    for (name, value) in args {
        out = out.replace(&format!("{{{name}}}"), &value.to_string());
    }
    out
}
