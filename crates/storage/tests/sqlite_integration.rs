use chrono::Duration;
use exam_core::model::{AttemptId, CategoryId, CheckpointState, PackageId, PreparedCategory, SessionToken};
use exam_core::time::fixed_now;
use storage::{AttemptCacheRepository, CheckpointSnapshotRepository, Storage};

async fn storage() -> Storage {
    Storage::sqlite("sqlite::memory:").await.unwrap()
}

fn prepared(id: &str, name: &str) -> PreparedCategory {
    PreparedCategory {
        category_id: CategoryId::new(id),
        category_name: name.to_string(),
        package_id: PackageId::new(format!("pkg-{id}")),
        turn: 1,
        question_count: 20,
        duration_minutes: 30,
    }
}

#[tokio::test]
async fn cache_round_trips_session_token() {
    let storage = storage().await;
    let id = AttemptId::new("att-1");
    let now = fixed_now();

    storage
        .cache
        .save_session_token(&id, &SessionToken::new("tok"), now)
        .await
        .unwrap();

    let cached = storage.cache.get(&id).await.unwrap().unwrap();
    assert_eq!(cached.attempt_id, id);
    assert_eq!(cached.session_token, SessionToken::new("tok"));
    assert_eq!(cached.saved_at, now);

    storage.cache.clear_local(&id).await.unwrap();
    assert!(storage.cache.get(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn cache_save_overwrites_existing_entry() {
    let storage = storage().await;
    let id = AttemptId::new("att-1");
    let now = fixed_now();

    storage
        .cache
        .save_session_token(&id, &SessionToken::new("old"), now)
        .await
        .unwrap();
    storage
        .cache
        .save_session_token(&id, &SessionToken::new("new"), now + Duration::minutes(5))
        .await
        .unwrap();

    let cached = storage.cache.get(&id).await.unwrap().unwrap();
    assert_eq!(cached.session_token, SessionToken::new("new"));
}

#[tokio::test]
async fn stale_sweep_and_targeted_cleanup() {
    let storage = storage().await;
    let now = fixed_now();

    storage
        .cache
        .save_session_token(&AttemptId::new("old"), &SessionToken::new("a"), now - Duration::hours(48))
        .await
        .unwrap();
    storage
        .cache
        .save_session_token(&AttemptId::new("keep"), &SessionToken::new("b"), now)
        .await
        .unwrap();
    storage
        .cache
        .save_session_token(&AttemptId::new("other"), &SessionToken::new("c"), now)
        .await
        .unwrap();

    let removed = storage.cache.clear_stale_data(24, now).await.unwrap();
    assert_eq!(removed, 1);

    storage
        .cache
        .validate_and_cleanup(&AttemptId::new("keep"))
        .await
        .unwrap();

    assert!(storage.cache.get(&AttemptId::new("keep")).await.unwrap().is_some());
    assert!(storage.cache.get(&AttemptId::new("other")).await.unwrap().is_none());
}

#[tokio::test]
async fn last_attempt_pointer_is_single_slot() {
    let storage = storage().await;

    storage
        .cache
        .set_last_attempt(&AttemptId::new("att-1"))
        .await
        .unwrap();
    storage
        .cache
        .set_last_attempt(&AttemptId::new("att-2"))
        .await
        .unwrap();
    assert_eq!(
        storage.cache.last_attempt().await.unwrap(),
        Some(AttemptId::new("att-2"))
    );

    storage
        .cache
        .clear_last_attempt_if(&AttemptId::new("att-1"))
        .await
        .unwrap();
    assert_eq!(
        storage.cache.last_attempt().await.unwrap(),
        Some(AttemptId::new("att-2"))
    );

    storage
        .cache
        .clear_last_attempt_if(&AttemptId::new("att-2"))
        .await
        .unwrap();
    assert_eq!(storage.cache.last_attempt().await.unwrap(), None);
}

#[tokio::test]
async fn snapshot_slot_survives_overwrite_and_clear() {
    let storage = storage().await;

    let first = CheckpointState::new(
        vec![CategoryId::new("a"), CategoryId::new("b")],
        vec![prepared("a", "Listening"), prepared("b", "Reading")],
        None,
    )
    .unwrap();
    let mut second = first.clone();
    second.mark_completed(&CategoryId::new("a"));

    storage.snapshots.save(&first).await.unwrap();
    storage.snapshots.save(&second).await.unwrap();
    assert_eq!(storage.snapshots.load().await.unwrap(), Some(second));

    storage.snapshots.clear().await.unwrap();
    assert_eq!(storage.snapshots.load().await.unwrap(), None);
}
