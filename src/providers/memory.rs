use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domains::turnips::{Group, Owned, OwnedKey, Price, PriceKey, User};
use crate::error::{Result, TurnipBotError};
use crate::interfaces::storage::{Lookup, Record, RecordStore, TurnipQueries};

#[derive(Default)]
struct Tables {
    users: HashMap<i64, User>,
    groups: HashMap<i64, Group>,
    owned: HashMap<OwnedKey, Owned>,
    prices: HashMap<PriceKey, Price>,
    writes: HashMap<&'static str, usize>,
}

/// Process-local store with the same uniqueness rules as the SQLite one.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later create/save fail with a storage error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> usize {
        self.tables
            .try_read()
            .map(|tables| tables.writes.values().sum())
            .unwrap_or_default()
    }

    pub fn writes_for(&self, kind: &str) -> usize {
        self.tables
            .try_read()
            .ok()
            .and_then(|tables| tables.writes.get(kind).copied())
            .unwrap_or_default()
    }

    fn check_writable<R: Record>(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TurnipBotError::Storage(format!(
                "{} table is read-only",
                R::KIND
            )));
        }
        Ok(())
    }
}

fn insert_unique<K, V>(table: &mut HashMap<K, V>, key: K, value: V, kind: &str) -> Result<()>
where
    K: std::hash::Hash + Eq + std::fmt::Debug,
{
    if table.contains_key(&key) {
        return Err(TurnipBotError::Storage(format!(
            "UNIQUE constraint failed: {kind} {key:?}"
        )));
    }
    table.insert(key, value);
    Ok(())
}

fn replace_existing<K, V>(table: &mut HashMap<K, V>, key: K, value: V, kind: &str) -> Result<()>
where
    K: std::hash::Hash + Eq + std::fmt::Debug,
{
    match table.get_mut(&key) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(TurnipBotError::Storage(format!(
            "no {kind} row to update for {key:?}"
        ))),
    }
}

macro_rules! memory_record_store {
    ($record:ty, $table:ident) => {
        #[async_trait]
        impl RecordStore<$record> for InMemoryStore {
            async fn find_one(&self, key: &<$record as Record>::Key) -> Result<Lookup<$record>> {
                let tables = self.tables.read().await;
                Ok(tables.$table.get(key).cloned().into())
            }

            async fn create(&self, record: &$record) -> Result<()> {
                self.check_writable::<$record>()?;
                let mut tables = self.tables.write().await;
                insert_unique(
                    &mut tables.$table,
                    record.key(),
                    record.clone(),
                    <$record as Record>::KIND,
                )?;
                *tables.writes.entry(<$record as Record>::KIND).or_default() += 1;
                Ok(())
            }

            async fn save(&self, record: &$record) -> Result<()> {
                self.check_writable::<$record>()?;
                let mut tables = self.tables.write().await;
                replace_existing(
                    &mut tables.$table,
                    record.key(),
                    record.clone(),
                    <$record as Record>::KIND,
                )?;
                *tables.writes.entry(<$record as Record>::KIND).or_default() += 1;
                Ok(())
            }
        }
    };
}

memory_record_store!(User, users);
memory_record_store!(Group, groups);
memory_record_store!(Owned, owned);
memory_record_store!(Price, prices);

#[async_trait]
impl TurnipQueries for InMemoryStore {
    async fn prices_between(
        &self,
        user_id: i64,
        group_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Price>> {
        let tables = self.tables.read().await;
        let mut prices: Vec<Price> = tables
            .prices
            .values()
            .filter(|price| {
                price.user_id == user_id
                    && price.group_id == group_id
                    && price.half_day >= from
                    && price.half_day < to
            })
            .cloned()
            .collect();
        prices.sort_by_key(|price| price.half_day);
        Ok(prices)
    }

    async fn owned_between(
        &self,
        group_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Owned>> {
        let tables = self.tables.read().await;
        let mut owned: Vec<Owned> = tables
            .owned
            .values()
            .filter(|row| row.group_id == group_id && row.week >= from && row.week < to)
            .cloned()
            .collect();
        owned.sort_by_key(|row| (row.week, row.user_id));
        Ok(owned)
    }

    async fn users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.users.get(id).cloned())
            .collect())
    }

    async fn delete_user_records(&self, user_id: i64, group_id: i64) -> Result<usize> {
        self.check_writable::<Owned>()?;
        let mut tables = self.tables.write().await;
        let before = tables.owned.len() + tables.prices.len();
        tables
            .owned
            .retain(|key, _| !(key.user_id == user_id && key.group_id == group_id));
        tables
            .prices
            .retain(|key, _| !(key.user_id == user_id && key.group_id == group_id));
        Ok(before - tables.owned.len() - tables.prices.len())
    }
}
