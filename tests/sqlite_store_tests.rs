use chrono::{TimeZone, Utc};
use quiz_engine::store::{keys, read_json, write_json};
use quiz_engine::{
    KeyValueStore, ManualClock, ProgressRecord, QuizCatalog, QuizEngine, RecordingNotifier, SqliteStore,
    StartKind,
};
use std::sync::Arc;

async fn memory_store() -> SqliteStore {
    SqliteStore::new("sqlite::memory:").await.unwrap()
}

#[tokio::test]
async fn test_get_set_delete() {
    let store = memory_store().await;

    assert_eq!(store.get("quiz_username").await.unwrap(), None);
    store.set("quiz_username", "Meera").await.unwrap();
    assert_eq!(store.get("quiz_username").await.unwrap().as_deref(), Some("Meera"));

    // Last writer wins
    store.set("quiz_username", "Arjun").await.unwrap();
    assert_eq!(store.get("quiz_username").await.unwrap().as_deref(), Some("Arjun"));

    store.delete("quiz_username").await.unwrap();
    assert_eq!(store.get("quiz_username").await.unwrap(), None);
    store.delete("quiz_username").await.unwrap();
}

#[tokio::test]
async fn test_keys_are_listed_sorted() {
    let store = memory_store().await;
    store.set(keys::LEADERBOARD, "[]").await.unwrap();
    store.set(keys::BOOKMARKS, "[]").await.unwrap();
    store.set(&keys::session("vedic-foundations"), "{}").await.unwrap();

    assert_eq!(
        store.keys().await.unwrap(),
        vec!["quiz_leaderboard", "quiz_vedic-foundations", "saved_questions"]
    );
}

#[tokio::test]
async fn test_typed_json_helpers() {
    let store = memory_store().await;
    let record = ProgressRecord {
        current_streak: 2,
        longest_streak: 2,
        last_played_date: "2026-10-19".to_string(),
        total_quizzes: 4,
        ..Default::default()
    };

    write_json(&store, keys::PROGRESS, &record).await.unwrap();
    let loaded: Option<ProgressRecord> = read_json(&store, keys::PROGRESS).await.unwrap();
    assert_eq!(loaded, Some(record));
}

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let path = std::env::temp_dir().join(format!("quiz-engine-{}.db", uuid::Uuid::new_v4()));
    let url = format!("sqlite:{}", path.display());

    {
        let store = SqliteStore::new(&url).await.unwrap();
        store.set(keys::DISPLAY_NAME, "Meera").await.unwrap();
    }

    let store = SqliteStore::new(&url).await.unwrap();
    assert_eq!(store.get(keys::DISPLAY_NAME).await.unwrap().as_deref(), Some("Meera"));

    drop(store);
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_engine_resumes_from_sqlite_store() {
    let catalog = Arc::new(
        QuizCatalog::from_json_str(
            r#"{"quizzes":[{"id":"gita-basics","title":"Gita Basics","category":"Philosophy","duration":90,
                "questions":[
                    {"id":1,"type":"true-false","question":"The Gita has 18 chapters.","answer":"true","explanation":"It does."},
                    {"id":2,"type":"true-false","question":"Arjuna is the narrator.","answer":"false","explanation":"Sanjaya narrates."}
                ]}]}"#,
        )
        .unwrap(),
    );
    let store = Arc::new(memory_store().await);
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 7, 0, 0).unwrap()));

    let mut engine = QuizEngine::open(
        catalog.clone(),
        store.clone(),
        clock.clone(),
        Arc::new(RecordingNotifier::new()),
    )
    .await;
    engine.set_display_name("Meera").await.unwrap();
    engine.start("gita-basics").await.unwrap();
    engine.answer_current("true").await.unwrap();
    engine.next().await.unwrap();
    engine.tick().await.unwrap();
    drop(engine);

    let mut engine = QuizEngine::open(catalog, store.clone(), clock, Arc::new(RecordingNotifier::new())).await;
    assert_eq!(engine.start("gita-basics").await.unwrap(), StartKind::Resumed);
    let session = engine.active_session().unwrap();
    assert_eq!(session.current_index(), 1);
    assert_eq!(session.time_left(), 89);

    engine.submit().await.unwrap();
    assert_eq!(store.get("quiz_gita-basics").await.unwrap(), None);
    assert!(store.get(keys::PROGRESS).await.unwrap().is_some());
}
