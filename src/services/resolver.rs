use chrono_tz::Tz;
use tracing::debug;

use crate::domains::turnips::{Group, User};
use crate::error::Result;
use crate::interfaces::storage::{Lookup, RecordStore};
use crate::interfaces::transport::{ObservedChat, ObservedUser};
use crate::services::upsert::{find, log_fault};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<T> {
    pub entity: T,
    pub was_created: bool,
}

/// Gets or creates the user, refreshing stored names when they drifted.
pub async fn resolve_user<S>(store: &S, observed: &ObservedUser) -> Result<Resolution<User>>
where
    S: RecordStore<User> + ?Sized,
{
    match find::<User, S>(store, &observed.id).await? {
        Lookup::NotFound => {
            let user = User {
                id: observed.id,
                first_name: observed.first_name.clone(),
                last_name: observed.last_name.clone(),
                username: observed.username.clone(),
            };
            store
                .create(&user)
                .await
                .inspect_err(|err| log_fault::<User>("create", &user.id, err))?;
            debug!(user_id = user.id, "created user");
            Ok(Resolution {
                entity: user,
                was_created: true,
            })
        }
        Lookup::Found(mut user) => {
            let drifted = user.first_name != observed.first_name
                || user.last_name != observed.last_name
                || user.username != observed.username;
            if drifted {
                user.first_name = observed.first_name.clone();
                user.last_name = observed.last_name.clone();
                user.username = observed.username.clone();
                store
                    .save(&user)
                    .await
                    .inspect_err(|err| log_fault::<User>("save", &user.id, err))?;
                debug!(user_id = user.id, "refreshed user names");
            }
            Ok(Resolution {
                entity: user,
                was_created: false,
            })
        }
    }
}

/// Gets or creates the group with `default_timezone`, refreshing the stored
/// title when it drifted. The timezone is left alone.
pub async fn resolve_group<S>(
    store: &S,
    observed: &ObservedChat,
    default_timezone: Tz,
) -> Result<Resolution<Group>>
where
    S: RecordStore<Group> + ?Sized,
{
    match find::<Group, S>(store, &observed.id).await? {
        Lookup::NotFound => {
            let group = Group {
                id: observed.id,
                title: observed.title.clone(),
                timezone: default_timezone,
            };
            store
                .create(&group)
                .await
                .inspect_err(|err| log_fault::<Group>("create", &group.id, err))?;
            debug!(group_id = group.id, timezone = %group.timezone, "created group");
            Ok(Resolution {
                entity: group,
                was_created: true,
            })
        }
        Lookup::Found(mut group) => {
            if group.title != observed.title {
                group.title = observed.title.clone();
                store
                    .save(&group)
                    .await
                    .inspect_err(|err| log_fault::<Group>("save", &group.id, err))?;
                debug!(group_id = group.id, "refreshed group title");
            }
            Ok(Resolution {
                entity: group,
                was_created: false,
            })
        }
    }
}
