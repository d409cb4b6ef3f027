use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc, Weekday};
use chrono_tz::Tz;
use tracing::info;

use crate::config::parse_timezone;
use crate::domains::turnips::{
    Group, Owned, OwnedKey, OwnedValues, Price, PriceKey, PriceValues, User,
};
use crate::error::{Result, TurnipBotError};
use crate::interfaces::clock::Clock;
use crate::interfaces::storage::{Lookup, RecordStore, TurnipStore};
use crate::interfaces::transport::{ObservedChat, ObservedUser};
use crate::services::resolver::{resolve_group, resolve_user};
use crate::services::upsert::{find, log_fault, upsert};
use crate::timebucket::{half_day_bucket, half_day_label, parse_local_date, TimeBucketer};

#[derive(Debug, Clone)]
pub struct Participants {
    pub user: User,
    pub group: Group,
    pub group_created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipSaved {
    pub is_new: bool,
    pub previous_units: u32,
    pub previous_bells: u32,
    pub week: DateTime<Tz>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellPriceSaved {
    pub is_new: bool,
    pub previous_bells: u32,
    pub bucket: DateTime<Tz>,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct WeekSummary {
    pub week_start: DateTime<Tz>,
    pub timezone: Tz,
    pub owned: Option<Owned>,
    pub prices: Vec<Price>,
}

#[derive(Debug, Clone)]
pub struct GroupHolding {
    pub user: User,
    pub owned: Owned,
}

/// Weekly ownership and half-day sell price use-cases.
pub struct TurnipService {
    store: Arc<dyn TurnipStore>,
    clock: Arc<dyn Clock>,
    bucketer: TimeBucketer,
    default_timezone: Tz,
}

impl TurnipService {
    pub fn new(
        store: Arc<dyn TurnipStore>,
        clock: Arc<dyn Clock>,
        bucketer: TimeBucketer,
        default_timezone: Tz,
    ) -> Self {
        Self {
            store,
            clock,
            bucketer,
            default_timezone,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn resolve(&self, user: &ObservedUser, chat: &ObservedChat) -> Result<Participants> {
        let user = resolve_user(self.store.as_ref(), user).await?.entity;
        let group = resolve_group(self.store.as_ref(), chat, self.default_timezone).await?;
        Ok(Participants {
            user,
            group: group.entity,
            group_created: group.was_created,
        })
    }

    pub async fn save_weekly_ownership(
        &self,
        user: &ObservedUser,
        chat: &ObservedChat,
        units: u32,
        bells: u32,
    ) -> Result<OwnershipSaved> {
        let Participants { user, group, .. } = self.resolve(user, chat).await?;
        let week = self
            .bucketer
            .beginning_of_week(&self.clock.now(), group.timezone);
        let key = OwnedKey {
            user_id: user.id,
            group_id: group.id,
            week: week.with_timezone(&Utc),
        };
        let outcome =
            upsert::<Owned, dyn TurnipStore>(self.store.as_ref(), key, OwnedValues { units, bells })
                .await?;
        info!(
            user_id = user.id,
            group_id = group.id,
            units,
            bells,
            is_new = outcome.is_new,
            "saved weekly ownership"
        );
        Ok(OwnershipSaved {
            is_new: outcome.is_new,
            previous_units: outcome.previous.units,
            previous_bells: outcome.previous.bells,
            week,
        })
    }

    pub async fn get_weekly_ownership(
        &self,
        user: &ObservedUser,
        chat: &ObservedChat,
    ) -> Result<Lookup<Owned>> {
        let Participants { user, group, .. } = self.resolve(user, chat).await?;
        self.owned_this_week(&user, &group).await
    }

    /// Saves the sell price for the half-day containing `date_text`, or the
    /// current half-day when no text is given.
    pub async fn save_sell_price(
        &self,
        user: &ObservedUser,
        chat: &ObservedChat,
        bells: u32,
        date_text: Option<&str>,
    ) -> Result<SellPriceSaved> {
        let Participants { user, group, .. } = self.resolve(user, chat).await?;
        let tz = group.timezone;
        let now = self.clock.now();
        let at = match date_text.map(str::trim).filter(|text| !text.is_empty()) {
            Some(text) => parse_local_date(text, tz, &now)?.with_timezone(&Utc),
            None => now,
        };

        let bucket = half_day_bucket(&at, tz);
        let label = half_day_label(&bucket);
        if bucket.weekday() == Weekday::Sun {
            return Err(TurnipBotError::MarketClosed(label));
        }

        let key = PriceKey {
            user_id: user.id,
            group_id: group.id,
            half_day: bucket.with_timezone(&Utc),
        };
        let outcome =
            upsert::<Price, dyn TurnipStore>(self.store.as_ref(), key, PriceValues { bells })
                .await?;
        info!(
            user_id = user.id,
            group_id = group.id,
            bells,
            bucket = %label,
            is_new = outcome.is_new,
            "saved sell price"
        );
        Ok(SellPriceSaved {
            is_new: outcome.is_new,
            previous_bells: outcome.previous.bells,
            bucket,
            label,
        })
    }

    pub async fn get_sell_price(
        &self,
        user: &ObservedUser,
        chat: &ObservedChat,
        at: DateTime<Utc>,
    ) -> Result<Lookup<Price>> {
        let Participants { user, group, .. } = self.resolve(user, chat).await?;
        let bucket = half_day_bucket(&at, group.timezone);
        let key = PriceKey {
            user_id: user.id,
            group_id: group.id,
            half_day: bucket.with_timezone(&Utc),
        };
        find::<Price, dyn TurnipStore>(self.store.as_ref(), &key).await
    }

    pub async fn get_current_sell_price(
        &self,
        user: &ObservedUser,
        chat: &ObservedChat,
    ) -> Result<Lookup<Price>> {
        self.get_sell_price(user, chat, self.clock.now()).await
    }

    /// The user's purchase and prices for the current week of the group.
    pub async fn list_week(&self, user: &ObservedUser, chat: &ObservedChat) -> Result<WeekSummary> {
        let Participants { user, group, .. } = self.resolve(user, chat).await?;
        let (start, end) = self.bucketer.week_range(&self.clock.now(), group.timezone);
        let owned = self.owned_this_week(&user, &group).await?.into_option();
        let prices = self
            .store
            .prices_between(
                user.id,
                group.id,
                start.with_timezone(&Utc),
                end.with_timezone(&Utc),
            )
            .await?;
        Ok(WeekSummary {
            week_start: start,
            timezone: group.timezone,
            owned,
            prices,
        })
    }

    /// Every purchase recorded in the group this week, with its buyer.
    pub async fn group_week_owned(
        &self,
        user: &ObservedUser,
        chat: &ObservedChat,
    ) -> Result<Vec<GroupHolding>> {
        let Participants { group, .. } = self.resolve(user, chat).await?;
        let (start, end) = self.bucketer.week_range(&self.clock.now(), group.timezone);
        let owned = self
            .store
            .owned_between(group.id, start.with_timezone(&Utc), end.with_timezone(&Utc))
            .await?;
        if owned.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = owned.iter().map(|row| row.user_id).collect();
        let users: HashMap<i64, User> = self
            .store
            .users_by_ids(&ids)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();

        Ok(owned
            .into_iter()
            .filter_map(|row| {
                users.get(&row.user_id).cloned().map(|user| GroupHolding {
                    user,
                    owned: row,
                })
            })
            .collect())
    }

    pub async fn delete_user_records(
        &self,
        user: &ObservedUser,
        chat: &ObservedChat,
    ) -> Result<usize> {
        let Participants { user, group, .. } = self.resolve(user, chat).await?;
        let deleted = self.store.delete_user_records(user.id, group.id).await?;
        info!(
            user_id = user.id,
            group_id = group.id,
            deleted,
            "deleted user records"
        );
        Ok(deleted)
    }

    /// Replaces the group timezone; an unknown zone name leaves it untouched.
    pub async fn change_timezone(
        &self,
        user: &ObservedUser,
        chat: &ObservedChat,
        timezone: &str,
    ) -> Result<Group> {
        let timezone = parse_timezone(timezone)?;
        let Participants { mut group, .. } = self.resolve(user, chat).await?;
        group.timezone = timezone;
        RecordStore::<Group>::save(self.store.as_ref(), &group)
            .await
            .inspect_err(|err| log_fault::<Group>("save", &group.id, err))?;
        info!(group_id = group.id, timezone = %timezone, "changed group timezone");
        Ok(group)
    }

    async fn owned_this_week(&self, user: &User, group: &Group) -> Result<Lookup<Owned>> {
        let week = self
            .bucketer
            .beginning_of_week(&self.clock.now(), group.timezone);
        let key = OwnedKey {
            user_id: user.id,
            group_id: group.id,
            week: week.with_timezone(&Utc),
        };
        find::<Owned, dyn TurnipStore>(self.store.as_ref(), &key).await
    }
}
