use std::sync::Arc;

use chrono::{DateTime, Datelike};
use chrono_tz::Tz;
use tracing::{debug, error};

use crate::error::{Result, TurnipBotError};
use crate::interfaces::storage::Lookup;
use crate::interfaces::transport::{ChatKind, ChatTransport, IncomingMessage};
use crate::services::turnips::TurnipService;
use crate::texts::{render, Texts};
use crate::timebucket::{half_day_bucket, half_day_of, HalfDay};

const START_CMD: &str = "start";

/// Largest unit count or price the store can hold.
const MAX_AMOUNT: u32 = i32::MAX as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Help,
    Admin,
    Buy,
    Sell,
    List,
    Turnips,
    Delete,
    ChangeTz,
}

/// A chat command split into its name and whitespace separated arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand<'a> {
    pub name: String,
    pub args: Vec<&'a str>,
}

/// Splits `/name@botname arg1 arg2` into lowercase `name` and its arguments.
/// Returns `None` for text that is not a command.
pub fn parse_command(text: &str) -> Option<ParsedCommand<'_>> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;
    let mut parts = rest.split_whitespace();
    let head = parts.next()?;
    let name = head.split('@').next().unwrap_or_default().to_lowercase();
    if name.is_empty() {
        return None;
    }
    Some(ParsedCommand {
        name,
        args: parts.collect(),
    })
}

/// Turns chat commands into service calls and localized replies.
pub struct CommandHandler {
    service: Arc<TurnipService>,
    texts: Arc<Texts>,
    allow_delete: bool,
}

impl CommandHandler {
    pub fn new(service: Arc<TurnipService>, texts: Arc<Texts>, allow_delete: bool) -> Self {
        Self {
            service,
            texts,
            allow_delete,
        }
    }

    pub fn service(&self) -> &Arc<TurnipService> {
        &self.service
    }

    pub fn texts(&self) -> &Texts {
        &self.texts
    }

    /// Handles one message and sends the reply, if any, through `transport`.
    pub async fn dispatch(
        &self,
        message: &IncomingMessage,
        transport: &dyn ChatTransport,
    ) -> Result<()> {
        if let Some(reply) = self.handle(message).await {
            debug!(transport = transport.name(), chat_id = message.chat.id, "sending reply");
            transport.send_text(message.chat.id, &reply).await?;
        }
        Ok(())
    }

    /// Returns the reply for `message`; plain chatter gets no reply.
    pub async fn handle(&self, message: &IncomingMessage) -> Option<String> {
        let parsed = parse_command(&message.text)?;
        let texts = self.texts.as_ref();
        let command = match self.lookup(&parsed.name) {
            Some(command) => command,
            None => {
                debug!(command = %parsed.name, "ignoring unknown command");
                return Some(texts.unknown_command.clone());
            }
        };

        if message.chat.kind == ChatKind::Private {
            return Some(texts.group_only.clone());
        }

        let result = match command {
            Command::Start => Ok(render(
                &texts.join_text,
                &[("title", &message.chat.title), ("help_cmd", &texts.help.cmd)],
            )),
            Command::Help => Ok(self.help()),
            Command::Admin => Ok(self.admin_help()),
            Command::Buy => self.buy(message, &parsed.args).await,
            Command::Sell => self.sell(message, &parsed.args).await,
            Command::List => self.list(message).await,
            Command::Turnips => self.turnips(message).await,
            Command::Delete => self.delete(message).await,
            Command::ChangeTz => self.change_timezone(message, &parsed.args).await,
        };

        Some(result.unwrap_or_else(|err| self.render_error(command, &parsed.args, err)))
    }

    fn lookup(&self, name: &str) -> Option<Command> {
        let texts = self.texts.as_ref();
        let table = [
            (START_CMD, Command::Start),
            (texts.help.cmd.as_str(), Command::Help),
            (texts.admin.cmd.as_str(), Command::Admin),
            (texts.buy.cmd.as_str(), Command::Buy),
            (texts.sell.cmd.as_str(), Command::Sell),
            (texts.list.cmd.as_str(), Command::List),
            (texts.turnips.cmd.as_str(), Command::Turnips),
            (texts.delete.cmd.as_str(), Command::Delete),
            (texts.changetz.cmd.as_str(), Command::ChangeTz),
        ];
        table
            .into_iter()
            .find(|(cmd, _)| cmd.eq_ignore_ascii_case(name))
            .map(|(_, command)| command)
    }

    fn help(&self) -> String {
        let texts = self.texts.as_ref();
        let mut lines = vec![texts.help.available_cmds.clone()];
        lines.push(command_line(&texts.help.cmd, "", &texts.help.desc));
        lines.push(command_line(&texts.buy.cmd, &texts.buy.params, &texts.buy.desc));
        lines.push(command_line(&texts.sell.cmd, &texts.sell.params, &texts.sell.desc));
        lines.push(command_line(&texts.list.cmd, "", &texts.list.desc));
        lines.push(command_line(&texts.turnips.cmd, "", &texts.turnips.desc));
        lines.push(String::new());
        lines.push(texts.help.admin_cmds.clone());
        lines.join("\n")
    }

    fn admin_help(&self) -> String {
        let texts = self.texts.as_ref();
        let mut lines = vec![texts.admin.available_cmds.clone()];
        lines.push(command_line(&texts.admin.cmd, "", &texts.admin.desc));
        if self.allow_delete {
            lines.push(command_line(&texts.delete.cmd, "", &texts.delete.desc));
        }
        lines.push(command_line(
            &texts.changetz.cmd,
            &texts.changetz.params,
            &texts.changetz.desc,
        ));
        lines.join("\n")
    }

    async fn buy(&self, message: &IncomingMessage, args: &[&str]) -> Result<String> {
        let texts = self.texts.as_ref();
        if args.is_empty() {
            let current = self
                .service
                .get_weekly_ownership(&message.user, &message.chat)
                .await?;
            return Ok(match current {
                Lookup::Found(owned) => render(
                    &texts.buy.current,
                    &[("units", &owned.units), ("bells", &owned.bells)],
                ),
                Lookup::NotFound => texts.list.no_owned.clone(),
            });
        }

        let [units, bells] = args else {
            return Ok(self.usage(&texts.buy.cmd, &texts.buy.params));
        };
        let (Some(units), Some(bells)) = (parse_amount(units), parse_amount(bells)) else {
            return Ok(self.usage(&texts.buy.cmd, &texts.buy.params));
        };
        if units == 0 || units % 10 != 0 {
            return Ok(texts.buy.units_mod_ten.clone());
        }

        let saved = self
            .service
            .save_weekly_ownership(&message.user, &message.chat, units, bells)
            .await?;
        if saved.is_new {
            Ok(render(
                &texts.buy.saved,
                &[("units", &units), ("bells", &bells)],
            ))
        } else {
            Ok(render(
                &texts.buy.changed,
                &[
                    ("old_units", &saved.previous_units),
                    ("old_bells", &saved.previous_bells),
                    ("units", &units),
                    ("bells", &bells),
                ],
            ))
        }
    }

    async fn sell(&self, message: &IncomingMessage, args: &[&str]) -> Result<String> {
        let texts = self.texts.as_ref();
        let Some((bells, date)) = args.split_first() else {
            let participants = self
                .service
                .resolve(&message.user, &message.chat)
                .await?;
            let bucket = half_day_bucket(&self.service.now(), participants.group.timezone);
            let label = self.bucket_label(&bucket);
            let current = self
                .service
                .get_current_sell_price(&message.user, &message.chat)
                .await?;
            return Ok(match current {
                Lookup::Found(price) => render(
                    &texts.sell.current,
                    &[("bells", &price.bells), ("date", &label)],
                ),
                Lookup::NotFound => render(&texts.sell.no_current, &[("date", &label)]),
            });
        };

        let Some(bells) = parse_amount(bells) else {
            return Ok(self.usage(&texts.sell.cmd, &texts.sell.params));
        };
        let date_text = date.join(" ");
        let saved = self
            .service
            .save_sell_price(
                &message.user,
                &message.chat,
                bells,
                Some(date_text.as_str()).filter(|text| !text.is_empty()),
            )
            .await?;
        let label = self.bucket_label(&saved.bucket);
        if saved.is_new {
            Ok(render(
                &texts.sell.saved,
                &[("bells", &bells), ("date", &label)],
            ))
        } else {
            Ok(render(
                &texts.sell.changed,
                &[
                    ("old_bells", &saved.previous_bells),
                    ("bells", &bells),
                    ("date", &label),
                ],
            ))
        }
    }

    async fn list(&self, message: &IncomingMessage) -> Result<String> {
        let texts = self.texts.as_ref();
        let week = self
            .service
            .list_week(&message.user, &message.chat)
            .await?;

        let mut lines = Vec::new();
        match &week.owned {
            Some(owned) => lines.push(render(
                &texts.list.owned,
                &[("units", &owned.units), ("bells", &owned.bells)],
            )),
            None => lines.push(texts.list.no_owned.clone()),
        }
        if week.prices.is_empty() {
            lines.push(texts.list.no_prices.clone());
        } else {
            lines.push(texts.list.prices.clone());
            for price in &week.prices {
                let bucket = price.half_day.with_timezone(&week.timezone);
                lines.push(render(
                    &texts.list.price_line,
                    &[("date", &self.bucket_label(&bucket)), ("bells", &price.bells)],
                ));
            }
        }
        Ok(lines.join("\n"))
    }

    async fn turnips(&self, message: &IncomingMessage) -> Result<String> {
        let texts = self.texts.as_ref();
        let holdings = self
            .service
            .group_week_owned(&message.user, &message.chat)
            .await?;
        if holdings.is_empty() {
            return Ok(texts.turnips.no_owneds.clone());
        }

        let mut lines = vec![texts.turnips.owneds.clone()];
        for holding in &holdings {
            lines.push(render(
                &texts.turnips.owned_line,
                &[
                    ("name", &holding.user.display_name()),
                    ("units", &holding.owned.units),
                    ("bells", &holding.owned.bells),
                ],
            ));
        }
        Ok(lines.join("\n"))
    }

    async fn delete(&self, message: &IncomingMessage) -> Result<String> {
        let texts = self.texts.as_ref();
        if !self.allow_delete {
            return Ok(texts.delete.disabled.clone());
        }
        if !message.sender_is_admin {
            return Ok(texts.unprivileged.clone());
        }
        let count = self
            .service
            .delete_user_records(&message.user, &message.chat)
            .await?;
        Ok(render(&texts.delete.done, &[("count", &count)]))
    }

    async fn change_timezone(&self, message: &IncomingMessage, args: &[&str]) -> Result<String> {
        let texts = self.texts.as_ref();
        if !message.sender_is_admin {
            return Ok(texts.unprivileged.clone());
        }
        let [timezone] = args else {
            if args.is_empty() {
                let participants = self
                    .service
                    .resolve(&message.user, &message.chat)
                    .await?;
                return Ok(render(
                    &texts.changetz.current,
                    &[("timezone", &participants.group.timezone.name())],
                ));
            }
            return Ok(self.usage(&texts.changetz.cmd, &texts.changetz.params));
        };

        let group = self
            .service
            .change_timezone(&message.user, &message.chat, timezone)
            .await?;
        Ok(render(
            &texts.changetz.changed,
            &[("timezone", &group.timezone.name())],
        ))
    }

    fn render_error(&self, command: Command, args: &[&str], err: TurnipBotError) -> String {
        let texts = self.texts.as_ref();
        match err {
            TurnipBotError::DateParse(reason) => {
                debug!(%reason, "rejected sell date");
                let input = args.get(1..).map(|rest| rest.join(" ")).unwrap_or_default();
                render(&texts.sell.invalid_date, &[("input", &input)])
            }
            TurnipBotError::MarketClosed(bucket) => {
                debug!(%bucket, "rejected sell price on a closed market day");
                texts.sell.no_market_today.clone()
            }
            TurnipBotError::Timezone(name) if command == Command::ChangeTz => {
                render(&texts.changetz.invalid, &[("timezone", &name)])
            }
            other => {
                error!(?command, error = %other, "command failed");
                texts.internal_error.clone()
            }
        }
    }

    fn usage(&self, cmd: &str, params: &str) -> String {
        render(
            &self.texts.invalid_parameters,
            &[("usage", &format!("/{cmd} {params}"))],
        )
    }

    /// Localized label such as `Wed 15/04/2020 PM`.
    pub fn bucket_label(&self, bucket: &DateTime<Tz>) -> String {
        let texts = self.texts.as_ref();
        let half = match half_day_of(bucket) {
            HalfDay::Am => &texts.am,
            HalfDay::Pm => &texts.pm,
        };
        format!(
            "{} {} {}",
            texts.day_short(bucket.weekday()),
            bucket.format("%d/%m/%Y"),
            half
        )
    }
}

fn parse_amount(arg: &str) -> Option<u32> {
    arg.parse::<u32>().ok().filter(|amount| *amount <= MAX_AMOUNT)
}

fn command_line(cmd: &str, params: &str, desc: &str) -> String {
    if params.is_empty() {
        format!("/{cmd} - {desc}")
    } else {
        format!("/{cmd} {params} - {desc}")
    }
}
