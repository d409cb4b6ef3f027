mod common;

use std::sync::Arc;

use chrono::Duration;
use diesel::RunQueryDsl;
use tempfile::tempdir;

use turnip_bot::db::open_connection_sync;
use turnip_bot::domains::turnips::{Group, Owned, OwnedKey, Price, User};
use turnip_bot::error::TurnipBotError;
use turnip_bot::interfaces::clock::FixedClock;
use turnip_bot::interfaces::storage::{Lookup, RecordStore, TurnipQueries};
use turnip_bot::interfaces::transport::ObservedUser;
use turnip_bot::providers::sqlite::SqliteStore;

use common::{island, service, utc, villager, GROUP_ID};

async fn seeded_store(dir: &std::path::Path) -> SqliteStore {
    let db_path = dir.join("turnips.db");
    let store = SqliteStore::new(db_path.to_str().unwrap()).await.unwrap();
    let user = User {
        id: 1,
        first_name: "Tom".to_string(),
        last_name: "Nook".to_string(),
        username: "tom_nook".to_string(),
    };
    RecordStore::<User>::create(&store, &user).await.unwrap();
    let group = Group {
        id: GROUP_ID,
        title: "Nook Island".to_string(),
        timezone: chrono_tz::UTC,
    };
    RecordStore::<Group>::create(&store, &group).await.unwrap();
    store
}

#[tokio::test]
async fn ownership_upsert_round_trips_through_sqlite() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("turnips.db");
    let store = Arc::new(SqliteStore::new(db_path.to_str().unwrap()).await.unwrap());
    let clock = Arc::new(FixedClock::new(utc(2020, 4, 15, 9, 0)));
    let service = service(store.clone(), clock.clone());
    let user = villager(1, "Tom");

    let first = service
        .save_weekly_ownership(&user, &island(), 10, 100)
        .await
        .unwrap();
    assert!(first.is_new);
    clock.advance(Duration::hours(30));
    let second = service
        .save_weekly_ownership(&user, &island(), 12, 100)
        .await
        .unwrap();
    assert!(!second.is_new);
    assert_eq!((second.previous_units, second.previous_bells), (10, 100));

    let key = OwnedKey {
        user_id: 1,
        group_id: GROUP_ID,
        week: utc(2020, 4, 13, 0, 0),
    };
    let stored = RecordStore::<Owned>::find_one(store.as_ref(), &key)
        .await
        .unwrap();
    assert_eq!(stored.into_option().map(|owned| owned.units), Some(12));
}

#[tokio::test]
async fn duplicate_bucket_create_is_rejected() {
    let dir = tempdir().unwrap();
    let store = seeded_store(dir.path()).await;

    let owned = Owned {
        user_id: 1,
        group_id: GROUP_ID,
        week: utc(2020, 4, 13, 0, 0),
        units: 10,
        bells: 100,
    };
    RecordStore::<Owned>::create(&store, &owned).await.unwrap();
    let err = RecordStore::<Owned>::create(&store, &owned)
        .await
        .unwrap_err();
    assert!(matches!(err, TurnipBotError::Storage(_)));
    assert!(err.to_string().contains("UNIQUE"));
}

#[tokio::test]
async fn save_without_existing_row_fails() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("turnips.db");
    let store = SqliteStore::new(db_path.to_str().unwrap()).await.unwrap();

    let user = User {
        id: 7,
        first_name: "Ghost".to_string(),
        last_name: String::new(),
        username: String::new(),
    };
    let err = RecordStore::<User>::save(&store, &user).await.unwrap_err();
    assert!(matches!(err, TurnipBotError::Storage(_)));
}

#[tokio::test]
async fn group_timezone_survives_reopen() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("nested").join("turnips.db");
    let path = db_path.to_str().unwrap().to_string();

    {
        let store = SqliteStore::new(&path).await.unwrap();
        let group = Group {
            id: GROUP_ID,
            title: "Nook Island".to_string(),
            timezone: chrono_tz::America::New_York,
        };
        RecordStore::<Group>::create(&store, &group).await.unwrap();
    }

    let store = SqliteStore::new(&path).await.unwrap();
    let found = RecordStore::<Group>::find_one(&store, &GROUP_ID)
        .await
        .unwrap();
    let Lookup::Found(group) = found else {
        panic!("group should persist");
    };
    assert_eq!(group.timezone, chrono_tz::America::New_York);
    assert_eq!(group.title, "Nook Island");
}

#[tokio::test]
async fn range_queries_are_ordered_and_bounded() {
    let dir = tempdir().unwrap();
    let store = seeded_store(dir.path()).await;

    for (hour, bells) in [(12, 120), (0, 90), (36, 70)] {
        let price = Price {
            user_id: 1,
            group_id: GROUP_ID,
            half_day: utc(2020, 4, 14, 0, 0) + Duration::hours(hour),
            bells,
        };
        RecordStore::<Price>::create(&store, &price).await.unwrap();
    }

    let prices = store
        .prices_between(1, GROUP_ID, utc(2020, 4, 14, 0, 0), utc(2020, 4, 15, 0, 0))
        .await
        .unwrap();
    let bells: Vec<u32> = prices.iter().map(|price| price.bells).collect();
    assert_eq!(bells, vec![90, 120]);

    let deleted = store.delete_user_records(1, GROUP_ID).await.unwrap();
    assert_eq!(deleted, 3);
}

#[tokio::test]
async fn users_by_ids_skips_unknown_ids() {
    let dir = tempdir().unwrap();
    let store = seeded_store(dir.path()).await;

    let users = store.users_by_ids(&[1, 2]).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].display_name(), "@tom_nook");
}

#[tokio::test]
async fn memory_path_is_rejected() {
    let err = SqliteStore::new(":memory:").await.err().unwrap();
    assert!(matches!(err, TurnipBotError::Config(_)));
}

#[tokio::test]
async fn stored_unknown_timezone_is_reported_without_writes() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("turnips.db");
    let path = db_path.to_str().unwrap().to_string();
    let store = Arc::new(SqliteStore::new(&path).await.unwrap());
    let user = User {
        id: 1,
        first_name: "Tom".to_string(),
        last_name: "Nook".to_string(),
        username: "tom_nook".to_string(),
    };
    RecordStore::<User>::create(store.as_ref(), &user).await.unwrap();
    {
        let mut conn = open_connection_sync(&path).unwrap();
        diesel::sql_query(
            "INSERT INTO chat_groups (id, title, timezone, created_at, updated_at) \
             VALUES (-1001, 'Nook Island', 'Mars/Olympus', 0, 0)",
        )
        .execute(&mut conn)
        .unwrap();
    }

    let clock = Arc::new(FixedClock::new(utc(2020, 4, 15, 9, 0)));
    let service = service(store.clone(), clock);
    let observed = ObservedUser {
        id: 1,
        first_name: "Tom".to_string(),
        last_name: "Nook".to_string(),
        username: "tom_nook".to_string(),
    };

    let err = service.resolve(&observed, &island()).await.err().unwrap();
    assert!(matches!(err, TurnipBotError::Timezone(ref name) if name == "Mars/Olympus"));

    let err = service
        .save_weekly_ownership(&observed, &island(), 10, 100)
        .await
        .unwrap_err();
    assert!(matches!(err, TurnipBotError::Timezone(_)));

    let key = OwnedKey {
        user_id: 1,
        group_id: GROUP_ID,
        week: utc(2020, 4, 13, 0, 0),
    };
    let found = RecordStore::<Owned>::find_one(store.as_ref(), &key)
        .await
        .unwrap();
    assert_eq!(found, Lookup::NotFound);

    // The bad row is left for an operator to fix, not replaced by the default.
    let err = RecordStore::<Group>::find_one(store.as_ref(), &GROUP_ID)
        .await
        .unwrap_err();
    assert!(matches!(err, TurnipBotError::Timezone(_)));
}

#[tokio::test]
async fn failed_delete_keeps_every_record() {
    let dir = tempdir().unwrap();
    let store = seeded_store(dir.path()).await;
    let owned = Owned {
        user_id: 1,
        group_id: GROUP_ID,
        week: utc(2020, 4, 13, 0, 0),
        units: 10,
        bells: 100,
    };
    RecordStore::<Owned>::create(&store, &owned).await.unwrap();
    let price = Price {
        user_id: 1,
        group_id: GROUP_ID,
        half_day: utc(2020, 4, 14, 0, 0),
        bells: 90,
    };
    RecordStore::<Price>::create(&store, &price).await.unwrap();

    let db_path = dir.path().join("turnips.db");
    {
        let mut conn = open_connection_sync(db_path.to_str().unwrap()).unwrap();
        diesel::sql_query(
            "CREATE TRIGGER keep_prices BEFORE DELETE ON prices \
             BEGIN SELECT RAISE(ABORT, 'prices are locked'); END",
        )
        .execute(&mut conn)
        .unwrap();
    }

    let err = store.delete_user_records(1, GROUP_ID).await.unwrap_err();
    assert!(matches!(err, TurnipBotError::Storage(_)));

    let key = OwnedKey {
        user_id: 1,
        group_id: GROUP_ID,
        week: owned.week,
    };
    let found = RecordStore::<Owned>::find_one(&store, &key).await.unwrap();
    assert_eq!(found, Lookup::Found(owned));
}
