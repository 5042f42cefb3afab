use super::*;
use crate::config::EndpointCategory;

fn key(id: &str) -> CounterKey {
    CounterKey::new(id, EndpointCategory::PitchWrite)
}

#[tokio::test]
async fn get_missing_key_is_none() {
    let store = MemoryCounterStore::new();
    assert_eq!(store.get(&key("a")).await.unwrap(), None);
}

#[tokio::test]
async fn insert_then_get() {
    let store = MemoryCounterStore::new();
    let k = key("a");
    let entry = WindowEntry::fresh(1_000, 60_000);

    let outcome = store.insert_if_absent(&k, entry, 1_000).await.unwrap();
    assert_eq!(outcome, InsertOutcome::Inserted);
    assert_eq!(store.get(&k).await.unwrap(), Some(entry));
}

#[tokio::test]
async fn insert_against_live_row_reports_already_exists() {
    let store = MemoryCounterStore::new();
    let k = key("a");
    let first = WindowEntry::fresh(1_000, 60_000);
    store.insert_if_absent(&k, first, 1_000).await.unwrap();

    let outcome = store
        .insert_if_absent(&k, WindowEntry::fresh(2_000, 60_000), 2_000)
        .await
        .unwrap();
    assert_eq!(outcome, InsertOutcome::AlreadyExists);
    // The live row is untouched.
    assert_eq!(store.get(&k).await.unwrap(), Some(first));
}

#[tokio::test]
async fn insert_supersedes_expired_row() {
    let store = MemoryCounterStore::new();
    let k = key("a");
    store
        .insert_if_absent(&k, WindowEntry { count: 9, window_reset_at: 5_000 }, 1_000)
        .await
        .unwrap();

    // At now=5_000 the old window has ended; a fresh one replaces it.
    let fresh = WindowEntry::fresh(5_000, 60_000);
    let outcome = store.insert_if_absent(&k, fresh, 5_000).await.unwrap();
    assert_eq!(outcome, InsertOutcome::Inserted);
    assert_eq!(store.get(&k).await.unwrap(), Some(fresh));
}

#[tokio::test]
async fn increment_inside_window_returns_new_count() {
    let store = MemoryCounterStore::new();
    let k = key("a");
    store.insert_if_absent(&k, WindowEntry::fresh(1_000, 60_000), 1_000).await.unwrap();

    let outcome = store.increment_if_window_valid(&k, 2_000).await.unwrap();
    assert_eq!(
        outcome,
        IncrementOutcome::Incremented(WindowEntry { count: 2, window_reset_at: 61_000 })
    );
}

#[tokio::test]
async fn increment_missing_or_expired_is_no_valid_window() {
    let store = MemoryCounterStore::new();
    let k = key("a");
    assert_eq!(store.increment_if_window_valid(&k, 1_000).await.unwrap(), IncrementOutcome::NoValidWindow);

    store
        .insert_if_absent(&k, WindowEntry { count: 4, window_reset_at: 5_000 }, 1_000)
        .await
        .unwrap();
    assert_eq!(store.increment_if_window_valid(&k, 5_000).await.unwrap(), IncrementOutcome::NoValidWindow);
}

#[tokio::test]
async fn delete_removes_row() {
    let store = MemoryCounterStore::new();
    let k = key("a");
    store.insert_if_absent(&k, WindowEntry::fresh(1_000, 60_000), 1_000).await.unwrap();

    store.delete(&k).await.unwrap();
    assert_eq!(store.get(&k).await.unwrap(), None);
}

#[tokio::test]
async fn delete_expired_before_removes_only_past_windows() {
    let store = MemoryCounterStore::new();
    let old = key("old");
    let live = key("live");
    store
        .insert_if_absent(&old, WindowEntry { count: 2, window_reset_at: 4_000 }, 1_000)
        .await
        .unwrap();
    store
        .insert_if_absent(&live, WindowEntry { count: 2, window_reset_at: 9_000 }, 1_000)
        .await
        .unwrap();

    let removed = store.delete_expired_before(5_000).await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(store.get(&old).await.unwrap(), None);
    assert!(store.get(&live).await.unwrap().is_some());
    assert_eq!(store.row_count(), 1);
}

#[tokio::test]
async fn concurrent_increments_serialize_on_one_key() {
    use std::sync::Arc;

    let store = Arc::new(MemoryCounterStore::new());
    let k = key("contended");
    store.insert_if_absent(&k, WindowEntry::fresh(0, i64::MAX / 2), 0).await.unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..50 {
        let store = Arc::clone(&store);
        let k = k.clone();
        tasks.spawn(async move { store.increment_if_window_valid(&k, 1).await.unwrap() });
    }

    let mut counts = Vec::new();
    while let Some(res) = tasks.join_next().await {
        match res.unwrap() {
            IncrementOutcome::Incremented(entry) => counts.push(entry.count),
            IncrementOutcome::NoValidWindow => panic!("window should be live"),
        }
    }

    // Every increment observed a distinct count: no lost updates.
    counts.sort_unstable();
    let expected: Vec<i64> = (2..=51).collect();
    assert_eq!(counts, expected);
}
