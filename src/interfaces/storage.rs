use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domains::turnips::{Group, Owned, Price, User};
use crate::error::Result;

/// Outcome of an exact-key lookup. Failures travel in the surrounding
/// `Result`, so absence is never confused with an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Lookup::Found(value),
            None => Lookup::NotFound,
        }
    }
}

pub trait Record: Clone + Send + Sync + 'static {
    type Key: Clone + Debug + Send + Sync;
    const KIND: &'static str;

    fn key(&self) -> Self::Key;
}

/// A record whose natural key includes a time bucket and whose remaining
/// fields can be replaced wholesale.
pub trait Bucketed: Record {
    type Values: Clone + Copy + Debug + Default + PartialEq + Send + Sync;

    fn values(&self) -> Self::Values;
    fn from_parts(key: Self::Key, values: Self::Values) -> Self;
    fn set_values(&mut self, values: Self::Values);
}

#[async_trait]
pub trait RecordStore<R: Record>: Send + Sync {
    async fn find_one(&self, key: &R::Key) -> Result<Lookup<R>>;
    async fn create(&self, record: &R) -> Result<()>;
    async fn save(&self, record: &R) -> Result<()>;
}

#[async_trait]
pub trait TurnipQueries: Send + Sync {
    /// Prices of one user in one group with `from <= half_day < to`, oldest first.
    async fn prices_between(
        &self,
        user_id: i64,
        group_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Price>>;

    /// Owned rows of every user in a group with `from <= week < to`.
    async fn owned_between(
        &self,
        group_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Owned>>;

    async fn users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>>;

    /// Removes the user's owned and price rows in the group, returning how many went.
    async fn delete_user_records(&self, user_id: i64, group_id: i64) -> Result<usize>;
}

pub trait TurnipStore:
    RecordStore<User> + RecordStore<Group> + RecordStore<Owned> + RecordStore<Price> + TurnipQueries
{
}

impl<T> TurnipStore for T where
    T: RecordStore<User>
        + RecordStore<Group>
        + RecordStore<Owned>
        + RecordStore<Price>
        + TurnipQueries
{
}
