use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

use crate::config::parse_timezone;
use crate::db::{ensure_parent_dir, storage_error};
use crate::domains::turnips::{Group, Owned, OwnedKey, Price, PriceKey, User};
use crate::error::{Result, TurnipBotError};
use crate::interfaces::storage::{Lookup, RecordStore, TurnipQueries};

mod schema;
use schema::{chat_groups, owned, prices, users};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

#[derive(Queryable)]
struct UserRow {
    id: i64,
    first_name: String,
    last_name: String,
    username: String,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
struct NewUser<'a> {
    id: i64,
    first_name: &'a str,
    last_name: &'a str,
    username: &'a str,
    created_at: i64,
    updated_at: i64,
}

#[derive(Queryable)]
struct GroupRow {
    id: i64,
    title: String,
    timezone: String,
}

#[derive(Insertable)]
#[diesel(table_name = chat_groups)]
struct NewGroup<'a> {
    id: i64,
    title: &'a str,
    timezone: &'a str,
    created_at: i64,
    updated_at: i64,
}

#[derive(Queryable)]
struct OwnedRow {
    user_id: i64,
    group_id: i64,
    week: i64,
    units: i32,
    bells: i32,
}

#[derive(Insertable)]
#[diesel(table_name = owned)]
struct NewOwned {
    user_id: i64,
    group_id: i64,
    week: i64,
    units: i32,
    bells: i32,
    updated_at: i64,
}

#[derive(Queryable)]
struct PriceRow {
    user_id: i64,
    group_id: i64,
    half_day: i64,
    bells: i32,
}

#[derive(Insertable)]
#[diesel(table_name = prices)]
struct NewPrice {
    user_id: i64,
    group_id: i64,
    half_day: i64,
    bells: i32,
    updated_at: i64,
}

/// Storage port backed by a SQLite file. Uniqueness of the bucket keys is
/// enforced by the schema, so a racing second create fails instead of
/// producing a duplicate row.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn new(sqlite_path: impl AsRef<str>) -> Result<Self> {
        let sqlite_path = sqlite_path.as_ref();
        if sqlite_path.trim() == ":memory:" {
            return Err(TurnipBotError::Config(
                "SqliteStore needs a file path; use InMemoryStore for :memory:".to_string(),
            ));
        }
        ensure_parent_dir(sqlite_path)?;
        run_migrations(sqlite_path).await?;

        let manager = AsyncDieselConnectionManager::<SqliteAsyncConn>::new(sqlite_path);
        let pool: SqlitePool = Pool::builder()
            .build(manager)
            .await
            .map_err(storage_error)?;
        info!(sqlite_path, "Opened turnip store");
        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        let mut conn = self.pool.get().await.map_err(storage_error)?;
        crate::db::apply_pragmas_async(&mut conn).await?;
        Ok(conn)
    }
}

#[async_trait]
impl RecordStore<User> for SqliteStore {
    async fn find_one(&self, key: &i64) -> Result<Lookup<User>> {
        let mut conn = self.conn().await?;
        let row = users::table
            .filter(users::id.eq(*key))
            .select((
                users::id,
                users::first_name,
                users::last_name,
                users::username,
            ))
            .first::<UserRow>(&mut conn)
            .await
            .optional()
            .map_err(storage_error)?;
        Ok(row.map(map_user).into())
    }

    async fn create(&self, record: &User) -> Result<()> {
        let now = now_ts();
        let mut conn = self.conn().await?;
        let new = NewUser {
            id: record.id,
            first_name: &record.first_name,
            last_name: &record.last_name,
            username: &record.username,
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(users::table)
            .values(&new)
            .execute(&mut conn)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn save(&self, record: &User) -> Result<()> {
        let mut conn = self.conn().await?;
        let updated = diesel::update(users::table.filter(users::id.eq(record.id)))
            .set((
                users::first_name.eq(&record.first_name),
                users::last_name.eq(&record.last_name),
                users::username.eq(&record.username),
                users::updated_at.eq(now_ts()),
            ))
            .execute(&mut conn)
            .await
            .map_err(storage_error)?;
        expect_one_row(updated, "user")
    }
}

#[async_trait]
impl RecordStore<Group> for SqliteStore {
    async fn find_one(&self, key: &i64) -> Result<Lookup<Group>> {
        let mut conn = self.conn().await?;
        let row = chat_groups::table
            .filter(chat_groups::id.eq(*key))
            .select((chat_groups::id, chat_groups::title, chat_groups::timezone))
            .first::<GroupRow>(&mut conn)
            .await
            .optional()
            .map_err(storage_error)?;
        match row {
            Some(row) => Ok(Lookup::Found(map_group(row)?)),
            None => Ok(Lookup::NotFound),
        }
    }

    async fn create(&self, record: &Group) -> Result<()> {
        let now = now_ts();
        let mut conn = self.conn().await?;
        let new = NewGroup {
            id: record.id,
            title: &record.title,
            timezone: record.timezone.name(),
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(chat_groups::table)
            .values(&new)
            .execute(&mut conn)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn save(&self, record: &Group) -> Result<()> {
        let mut conn = self.conn().await?;
        let updated = diesel::update(chat_groups::table.filter(chat_groups::id.eq(record.id)))
            .set((
                chat_groups::title.eq(&record.title),
                chat_groups::timezone.eq(record.timezone.name()),
                chat_groups::updated_at.eq(now_ts()),
            ))
            .execute(&mut conn)
            .await
            .map_err(storage_error)?;
        expect_one_row(updated, "group")
    }
}

#[async_trait]
impl RecordStore<Owned> for SqliteStore {
    async fn find_one(&self, key: &OwnedKey) -> Result<Lookup<Owned>> {
        let mut conn = self.conn().await?;
        let row = owned::table
            .filter(owned::user_id.eq(key.user_id))
            .filter(owned::group_id.eq(key.group_id))
            .filter(owned::week.eq(key.week.timestamp()))
            .select(owned_columns())
            .first::<OwnedRow>(&mut conn)
            .await
            .optional()
            .map_err(storage_error)?;
        match row {
            Some(row) => Ok(Lookup::Found(map_owned(row)?)),
            None => Ok(Lookup::NotFound),
        }
    }

    async fn create(&self, record: &Owned) -> Result<()> {
        let new = NewOwned {
            user_id: record.user_id,
            group_id: record.group_id,
            week: record.week.timestamp(),
            units: to_column(record.units, "units")?,
            bells: to_column(record.bells, "bells")?,
            updated_at: now_ts(),
        };
        let mut conn = self.conn().await?;
        diesel::insert_into(owned::table)
            .values(&new)
            .execute(&mut conn)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn save(&self, record: &Owned) -> Result<()> {
        let units = to_column(record.units, "units")?;
        let bells = to_column(record.bells, "bells")?;
        let mut conn = self.conn().await?;
        let updated = diesel::update(
            owned::table
                .filter(owned::user_id.eq(record.user_id))
                .filter(owned::group_id.eq(record.group_id))
                .filter(owned::week.eq(record.week.timestamp())),
        )
        .set((
            owned::units.eq(units),
            owned::bells.eq(bells),
            owned::updated_at.eq(now_ts()),
        ))
        .execute(&mut conn)
        .await
        .map_err(storage_error)?;
        expect_one_row(updated, "owned")
    }
}

#[async_trait]
impl RecordStore<Price> for SqliteStore {
    async fn find_one(&self, key: &PriceKey) -> Result<Lookup<Price>> {
        let mut conn = self.conn().await?;
        let row = prices::table
            .filter(prices::user_id.eq(key.user_id))
            .filter(prices::group_id.eq(key.group_id))
            .filter(prices::half_day.eq(key.half_day.timestamp()))
            .select(price_columns())
            .first::<PriceRow>(&mut conn)
            .await
            .optional()
            .map_err(storage_error)?;
        match row {
            Some(row) => Ok(Lookup::Found(map_price(row)?)),
            None => Ok(Lookup::NotFound),
        }
    }

    async fn create(&self, record: &Price) -> Result<()> {
        let new = NewPrice {
            user_id: record.user_id,
            group_id: record.group_id,
            half_day: record.half_day.timestamp(),
            bells: to_column(record.bells, "bells")?,
            updated_at: now_ts(),
        };
        let mut conn = self.conn().await?;
        diesel::insert_into(prices::table)
            .values(&new)
            .execute(&mut conn)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn save(&self, record: &Price) -> Result<()> {
        let bells = to_column(record.bells, "bells")?;
        let mut conn = self.conn().await?;
        let updated = diesel::update(
            prices::table
                .filter(prices::user_id.eq(record.user_id))
                .filter(prices::group_id.eq(record.group_id))
                .filter(prices::half_day.eq(record.half_day.timestamp())),
        )
        .set((prices::bells.eq(bells), prices::updated_at.eq(now_ts())))
        .execute(&mut conn)
        .await
        .map_err(storage_error)?;
        expect_one_row(updated, "price")
    }
}

#[async_trait]
impl TurnipQueries for SqliteStore {
    async fn prices_between(
        &self,
        user_id: i64,
        group_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Price>> {
        let mut conn = self.conn().await?;
        let rows: Vec<PriceRow> = prices::table
            .filter(prices::user_id.eq(user_id))
            .filter(prices::group_id.eq(group_id))
            .filter(prices::half_day.ge(from.timestamp()))
            .filter(prices::half_day.lt(to.timestamp()))
            .order(prices::half_day.asc())
            .select(price_columns())
            .load(&mut conn)
            .await
            .map_err(storage_error)?;
        rows.into_iter().map(map_price).collect()
    }

    async fn owned_between(
        &self,
        group_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Owned>> {
        let mut conn = self.conn().await?;
        let rows: Vec<OwnedRow> = owned::table
            .filter(owned::group_id.eq(group_id))
            .filter(owned::week.ge(from.timestamp()))
            .filter(owned::week.lt(to.timestamp()))
            .order((owned::week.asc(), owned::user_id.asc()))
            .select(owned_columns())
            .load(&mut conn)
            .await
            .map_err(storage_error)?;
        rows.into_iter().map(map_owned).collect()
    }

    async fn users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        let rows: Vec<UserRow> = users::table
            .filter(users::id.eq_any(ids))
            .select((
                users::id,
                users::first_name,
                users::last_name,
                users::username,
            ))
            .load(&mut conn)
            .await
            .map_err(storage_error)?;
        Ok(rows.into_iter().map(map_user).collect())
    }

    async fn delete_user_records(&self, user_id: i64, group_id: i64) -> Result<usize> {
        let mut conn = self.conn().await?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            async move {
                let owned_deleted = diesel::delete(
                    owned::table
                        .filter(owned::user_id.eq(user_id))
                        .filter(owned::group_id.eq(group_id)),
                )
                .execute(conn)
                .await?;
                let prices_deleted = diesel::delete(
                    prices::table
                        .filter(prices::user_id.eq(user_id))
                        .filter(prices::group_id.eq(group_id)),
                )
                .execute(conn)
                .await?;
                Ok(owned_deleted + prices_deleted)
            }
            .scope_boxed()
        })
        .await
        .map_err(storage_error)
    }
}

fn owned_columns() -> (
    owned::user_id,
    owned::group_id,
    owned::week,
    owned::units,
    owned::bells,
) {
    (
        owned::user_id,
        owned::group_id,
        owned::week,
        owned::units,
        owned::bells,
    )
}

fn price_columns() -> (
    prices::user_id,
    prices::group_id,
    prices::half_day,
    prices::bells,
) {
    (
        prices::user_id,
        prices::group_id,
        prices::half_day,
        prices::bells,
    )
}

fn map_user(row: UserRow) -> User {
    User {
        id: row.id,
        first_name: row.first_name,
        last_name: row.last_name,
        username: row.username,
    }
}

fn map_group(row: GroupRow) -> Result<Group> {
    let timezone = parse_timezone(&row.timezone)?;
    Ok(Group {
        id: row.id,
        title: row.title,
        timezone,
    })
}

fn map_owned(row: OwnedRow) -> Result<Owned> {
    Ok(Owned {
        user_id: row.user_id,
        group_id: row.group_id,
        week: from_ts(row.week)?,
        units: from_column(row.units, "units")?,
        bells: from_column(row.bells, "bells")?,
    })
}

fn map_price(row: PriceRow) -> Result<Price> {
    Ok(Price {
        user_id: row.user_id,
        group_id: row.group_id,
        half_day: from_ts(row.half_day)?,
        bells: from_column(row.bells, "bells")?,
    })
}

fn from_ts(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| TurnipBotError::Storage(format!("timestamp {ts} out of range")))
}

fn to_column(value: u32, field: &str) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| TurnipBotError::Storage(format!("{field} value {value} out of range")))
}

fn from_column(value: i32, field: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| TurnipBotError::Storage(format!("negative {field} value {value}")))
}

fn expect_one_row(updated: usize, kind: &str) -> Result<()> {
    if updated == 0 {
        return Err(TurnipBotError::Storage(format!("no {kind} row to update")));
    }
    Ok(())
}

fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

async fn run_migrations(database_url: &str) -> Result<()> {
    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = crate::db::open_connection_sync(&database_url)?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(storage_error)?;
        Ok::<_, TurnipBotError>(())
    })
    .await
    .map_err(|e| TurnipBotError::Runtime(e.to_string()))??;
    Ok(())
}
