use tracing::{debug, error};

use crate::error::{Result, TurnipBotError};
use crate::interfaces::storage::{Bucketed, Lookup, Record, RecordStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome<V> {
    pub is_new: bool,
    /// Values the record held before this call; zero-valued when it is new.
    pub previous: V,
}

/// Exact-key lookup that logs storage faults with the entity kind and key.
pub async fn find<R, S>(store: &S, key: &R::Key) -> Result<Lookup<R>>
where
    R: Record,
    S: RecordStore<R> + ?Sized,
{
    store
        .find_one(key)
        .await
        .inspect_err(|err| log_fault::<R>("find", key, err))
}

/// Creates the record for `key` or overwrites the values of the existing
/// one. Performs exactly one write.
pub async fn upsert<R, S>(
    store: &S,
    key: R::Key,
    values: R::Values,
) -> Result<UpsertOutcome<R::Values>>
where
    R: Bucketed,
    S: RecordStore<R> + ?Sized,
{
    match find::<R, S>(store, &key).await? {
        Lookup::NotFound => {
            let record = R::from_parts(key.clone(), values);
            store
                .create(&record)
                .await
                .inspect_err(|err| log_fault::<R>("create", &key, err))?;
            debug!(kind = R::KIND, key = ?key, "created record");
            Ok(UpsertOutcome {
                is_new: true,
                previous: R::Values::default(),
            })
        }
        Lookup::Found(mut record) => {
            let previous = record.values();
            record.set_values(values);
            store
                .save(&record)
                .await
                .inspect_err(|err| log_fault::<R>("save", &key, err))?;
            debug!(kind = R::KIND, key = ?key, ?previous, "updated record");
            Ok(UpsertOutcome {
                is_new: false,
                previous,
            })
        }
    }
}

pub(crate) fn log_fault<R: Record>(operation: &str, key: &R::Key, err: &TurnipBotError) {
    error!(
        kind = R::KIND,
        key = ?key,
        operation,
        error = %err,
        "storage operation failed"
    );
}
