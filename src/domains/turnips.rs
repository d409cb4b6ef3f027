use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::interfaces::storage::{Bucketed, Record};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
}

impl User {
    /// Name shown in group listings.
    pub fn display_name(&self) -> String {
        if !self.username.is_empty() {
            return format!("@{}", self.username);
        }
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.id.to_string()
        } else {
            full.to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub timezone: Tz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnedKey {
    pub user_id: i64,
    pub group_id: i64,
    pub week: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OwnedValues {
    pub units: u32,
    pub bells: u32,
}

/// Turnips bought by a user in a group during one week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owned {
    pub user_id: i64,
    pub group_id: i64,
    pub week: DateTime<Utc>,
    pub units: u32,
    pub bells: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PriceKey {
    pub user_id: i64,
    pub group_id: i64,
    pub half_day: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriceValues {
    pub bells: u32,
}

/// Sell price offered to a user during one AM or PM half-day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Price {
    pub user_id: i64,
    pub group_id: i64,
    pub half_day: DateTime<Utc>,
    pub bells: u32,
}

impl Record for User {
    type Key = i64;
    const KIND: &'static str = "user";

    fn key(&self) -> i64 {
        self.id
    }
}

impl Record for Group {
    type Key = i64;
    const KIND: &'static str = "group";

    fn key(&self) -> i64 {
        self.id
    }
}

impl Record for Owned {
    type Key = OwnedKey;
    const KIND: &'static str = "owned";

    fn key(&self) -> OwnedKey {
        OwnedKey {
            user_id: self.user_id,
            group_id: self.group_id,
            week: self.week,
        }
    }
}

impl Bucketed for Owned {
    type Values = OwnedValues;

    fn values(&self) -> OwnedValues {
        OwnedValues {
            units: self.units,
            bells: self.bells,
        }
    }

    fn from_parts(key: OwnedKey, values: OwnedValues) -> Self {
        Self {
            user_id: key.user_id,
            group_id: key.group_id,
            week: key.week,
            units: values.units,
            bells: values.bells,
        }
    }

    fn set_values(&mut self, values: OwnedValues) {
        self.units = values.units;
        self.bells = values.bells;
    }
}

impl Record for Price {
    type Key = PriceKey;
    const KIND: &'static str = "price";

    fn key(&self) -> PriceKey {
        PriceKey {
            user_id: self.user_id,
            group_id: self.group_id,
            half_day: self.half_day,
        }
    }
}

impl Bucketed for Price {
    type Values = PriceValues;

    fn values(&self) -> PriceValues {
        PriceValues { bells: self.bells }
    }

    fn from_parts(key: PriceKey, values: PriceValues) -> Self {
        Self {
            user_id: key.user_id,
            group_id: key.group_id,
            half_day: key.half_day,
            bells: values.bells,
        }
    }

    fn set_values(&mut self, values: PriceValues) {
        self.bells = values.bells;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_handle() {
        let mut user = User {
            id: 7,
            first_name: "Tom".to_string(),
            last_name: "Nook".to_string(),
            username: "tanuki".to_string(),
        };
        assert_eq!(user.display_name(), "@tanuki");
        user.username.clear();
        assert_eq!(user.display_name(), "Tom Nook");
        user.first_name.clear();
        user.last_name.clear();
        assert_eq!(user.display_name(), "7");
    }
}
