use std::path::Path;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::RunQueryDsl;

use crate::error::{Result, TurnipBotError};

const CONNECTION_PRAGMAS: &str = "PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;";

pub fn storage_error(err: impl std::fmt::Display) -> TurnipBotError {
    TurnipBotError::Storage(err.to_string())
}

pub fn open_connection_sync(database_url: &str) -> Result<SqliteConnection> {
    let mut conn = SqliteConnection::establish(database_url).map_err(storage_error)?;
    apply_pragmas_sync(&mut conn)?;
    Ok(conn)
}

pub fn apply_pragmas_sync(conn: &mut SqliteConnection) -> Result<()> {
    conn.batch_execute(CONNECTION_PRAGMAS)
        .map_err(storage_error)?;
    if let Err(err) = conn.batch_execute("PRAGMA journal_mode = WAL;") {
        tracing::debug!("Unable to enable WAL journal mode: {}", err);
    }
    Ok(())
}

pub async fn apply_pragmas_async(conn: &mut SyncConnectionWrapper<SqliteConnection>) -> Result<()> {
    RunQueryDsl::execute(diesel::sql_query("PRAGMA busy_timeout = 5000"), conn)
        .await
        .map_err(storage_error)?;
    RunQueryDsl::execute(diesel::sql_query("PRAGMA foreign_keys = ON"), conn)
        .await
        .map_err(storage_error)?;
    Ok(())
}

pub fn ensure_parent_dir(path: &str) -> Result<()> {
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| TurnipBotError::Runtime(e.to_string()))?;
        }
    }
    Ok(())
}
