mod common;

use std::sync::Arc;

use chrono::Duration;

use turnip_bot::error::TurnipBotError;
use turnip_bot::interfaces::clock::FixedClock;
use turnip_bot::interfaces::storage::Lookup;
use turnip_bot::providers::memory::InMemoryStore;

use common::{island, service, utc, villager, GROUP_ID};

#[tokio::test]
async fn second_purchase_in_same_week_reports_previous_values() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(FixedClock::new(utc(2020, 4, 15, 9, 0)));
    let service = service(store.clone(), clock.clone());
    let user = villager(1, "Tom");

    let first = service
        .save_weekly_ownership(&user, &island(), 10, 100)
        .await
        .unwrap();
    assert!(first.is_new);
    assert_eq!((first.previous_units, first.previous_bells), (0, 0));
    assert_eq!(first.week.to_rfc3339(), "2020-04-13T00:00:00+00:00");

    clock.advance(Duration::days(2));
    let second = service
        .save_weekly_ownership(&user, &island(), 12, 100)
        .await
        .unwrap();
    assert!(!second.is_new);
    assert_eq!((second.previous_units, second.previous_bells), (10, 100));
    assert_eq!(store.writes_for("owned"), 2);

    let current = service.get_weekly_ownership(&user, &island()).await.unwrap();
    let Lookup::Found(owned) = current else {
        panic!("ownership should exist");
    };
    assert_eq!((owned.units, owned.bells), (12, 100));
}

#[tokio::test]
async fn purchase_in_next_week_is_a_new_record() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(FixedClock::new(utc(2020, 4, 19, 23, 0)));
    let service = service(store.clone(), clock.clone());
    let user = villager(1, "Tom");

    service
        .save_weekly_ownership(&user, &island(), 10, 100)
        .await
        .unwrap();
    clock.advance(Duration::hours(2));
    let next_week = service
        .save_weekly_ownership(&user, &island(), 20, 95)
        .await
        .unwrap();
    assert!(next_week.is_new);
    assert_eq!(next_week.week.to_rfc3339(), "2020-04-20T00:00:00+00:00");
}

#[tokio::test]
async fn unparsable_date_is_rejected_without_writing() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(FixedClock::new(utc(2020, 4, 15, 9, 0)));
    let service = service(store.clone(), clock);

    let err = service
        .save_sell_price(&villager(1, "Tom"), &island(), 95, Some("not-a-date"))
        .await
        .unwrap_err();
    assert!(matches!(err, TurnipBotError::DateParse(_)));
    assert!(err.is_user_input());
    assert_eq!(store.writes_for("price"), 0);
}

#[tokio::test]
async fn prices_either_side_of_noon_are_separate_records() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(FixedClock::new(utc(2020, 4, 15, 11, 59)));
    let service = service(store.clone(), clock.clone());
    let user = villager(1, "Tom");

    let morning = service
        .save_sell_price(&user, &island(), 90, None)
        .await
        .unwrap();
    clock.advance(Duration::minutes(2));
    let afternoon = service
        .save_sell_price(&user, &island(), 130, None)
        .await
        .unwrap();

    assert!(morning.is_new);
    assert!(afternoon.is_new);
    assert_eq!(morning.label, "Wed 15/04/2020 AM");
    assert_eq!(afternoon.label, "Wed 15/04/2020 PM");

    let week = service.list_week(&user, &island()).await.unwrap();
    let bells: Vec<u32> = week.prices.iter().map(|price| price.bells).collect();
    assert_eq!(bells, vec![90, 130]);
    assert!(week.owned.is_none());
}

#[tokio::test]
async fn same_half_day_overwrites_and_reports_previous_price() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(FixedClock::new(utc(2020, 4, 15, 13, 0)));
    let service = service(store.clone(), clock.clone());
    let user = villager(1, "Tom");

    service
        .save_sell_price(&user, &island(), 101, None)
        .await
        .unwrap();
    clock.advance(Duration::hours(4));
    let again = service
        .save_sell_price(&user, &island(), 140, None)
        .await
        .unwrap();
    assert!(!again.is_new);
    assert_eq!(again.previous_bells, 101);

    let current = service
        .get_current_sell_price(&user, &island())
        .await
        .unwrap();
    assert_eq!(current.into_option().map(|price| price.bells), Some(140));
}

#[tokio::test]
async fn past_half_day_can_be_filled_in() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(FixedClock::new(utc(2020, 4, 16, 9, 0)));
    let service = service(store.clone(), clock);
    let user = villager(1, "Tom");

    let saved = service
        .save_sell_price(&user, &island(), 88, Some("yesterday pm"))
        .await
        .unwrap();
    assert_eq!(saved.bucket.to_rfc3339(), "2020-04-15T12:00:00+00:00");

    let found = service
        .get_sell_price(&user, &island(), utc(2020, 4, 15, 18, 30))
        .await
        .unwrap();
    assert!(found.is_found());
    let now = service.get_current_sell_price(&user, &island()).await.unwrap();
    assert_eq!(now, Lookup::NotFound);
}

#[tokio::test]
async fn sunday_prices_are_rejected() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(FixedClock::new(utc(2020, 4, 19, 10, 0)));
    let service = service(store.clone(), clock);

    let err = service
        .save_sell_price(&villager(1, "Tom"), &island(), 100, None)
        .await
        .unwrap_err();
    assert!(matches!(err, TurnipBotError::MarketClosed(_)));
    assert_eq!(store.writes_for("price"), 0);
}

#[tokio::test]
async fn reads_before_any_write_are_not_found() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(FixedClock::new(utc(2020, 4, 15, 9, 0)));
    let service = service(store, clock);
    let user = villager(1, "Tom");

    assert_eq!(
        service.get_weekly_ownership(&user, &island()).await.unwrap(),
        Lookup::NotFound
    );
    assert_eq!(
        service.get_current_sell_price(&user, &island()).await.unwrap(),
        Lookup::NotFound
    );
}

#[tokio::test]
async fn group_listing_joins_buyers() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(FixedClock::new(utc(2020, 4, 14, 9, 0)));
    let service = service(store, clock);

    service
        .save_weekly_ownership(&villager(2, "Isabelle"), &island(), 30, 98)
        .await
        .unwrap();
    service
        .save_weekly_ownership(&villager(1, "Tom"), &island(), 10, 100)
        .await
        .unwrap();
    service
        .save_sell_price(&villager(3, "Blathers"), &island(), 60, None)
        .await
        .unwrap();

    let holdings = service
        .group_week_owned(&villager(3, "Blathers"), &island())
        .await
        .unwrap();
    let names: Vec<String> = holdings
        .iter()
        .map(|holding| holding.user.display_name())
        .collect();
    assert_eq!(names, vec!["Tom".to_string(), "Isabelle".to_string()]);
    assert_eq!(holdings[1].owned.units, 30);
}

#[tokio::test]
async fn timezone_change_moves_bucket_boundaries() {
    let store = Arc::new(InMemoryStore::new());
    // 23:30 UTC on Sunday is already Monday in Madrid.
    let clock = Arc::new(FixedClock::new(utc(2020, 4, 19, 23, 30)));
    let service = service(store, clock);
    let user = villager(1, "Tom");

    let group = service
        .change_timezone(&user, &island(), "Europe/Madrid")
        .await
        .unwrap();
    assert_eq!(group.timezone, chrono_tz::Europe::Madrid);
    assert_eq!(group.id, GROUP_ID);

    let saved = service
        .save_weekly_ownership(&user, &island(), 10, 100)
        .await
        .unwrap();
    assert_eq!(saved.week.to_rfc3339(), "2020-04-20T00:00:00+02:00");

    let err = service
        .change_timezone(&user, &island(), "Mars/Olympus_Mons")
        .await
        .unwrap_err();
    assert!(matches!(err, TurnipBotError::Timezone(_)));
    let participants = service.resolve(&user, &island()).await.unwrap();
    assert_eq!(participants.group.timezone, chrono_tz::Europe::Madrid);
}

#[tokio::test]
async fn delete_removes_only_the_callers_records() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(FixedClock::new(utc(2020, 4, 15, 9, 0)));
    let service = service(store, clock);
    let tom = villager(1, "Tom");
    let isabelle = villager(2, "Isabelle");

    service
        .save_weekly_ownership(&tom, &island(), 10, 100)
        .await
        .unwrap();
    service
        .save_sell_price(&tom, &island(), 90, None)
        .await
        .unwrap();
    service
        .save_weekly_ownership(&isabelle, &island(), 20, 99)
        .await
        .unwrap();

    let deleted = service.delete_user_records(&tom, &island()).await.unwrap();
    assert_eq!(deleted, 2);

    let week = service.list_week(&tom, &island()).await.unwrap();
    assert!(week.owned.is_none());
    assert!(week.prices.is_empty());
    let remaining = service.group_week_owned(&tom, &island()).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].user.id, 2);
}

#[tokio::test]
async fn storage_faults_propagate() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(FixedClock::new(utc(2020, 4, 15, 9, 0)));
    let service = service(store.clone(), clock);
    let user = villager(1, "Tom");

    service.resolve(&user, &island()).await.unwrap();
    store.fail_writes(true);
    let err = service
        .save_weekly_ownership(&user, &island(), 10, 100)
        .await
        .unwrap_err();
    assert!(matches!(err, TurnipBotError::Storage(_)));
    assert!(!err.is_user_input());
}
