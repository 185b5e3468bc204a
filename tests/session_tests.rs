mod common;

use chrono::{Duration, TimeZone, Utc};
use quiz_engine::store::keys;
use quiz_engine::{
    Badge, KeyValueStore, ManualClock, MemoryStore, Phase, QuizCatalog, QuizEngine, QuizError,
    RecordingNotifier, SessionSnapshot, StartKind, TickOutcome,
};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

use common::FlakyStore;

fn true_false(id: u32, answer: &str) -> Value {
    json!({
        "id": id,
        "type": "true-false",
        "question": format!("Statement {}", id),
        "answer": answer,
        "explanation": "See the commentary."
    })
}

fn catalog() -> Arc<QuizCatalog> {
    let document = json!({
        "quizzes": [
            {
                "id": "two-step",
                "title": "Two Step",
                "category": "Philosophy",
                "duration": 60,
                "questions": [true_false(1, "true"), true_false(2, "true")]
            },
            {
                "id": "three-step",
                "title": "Three Step",
                "category": "Ancient Texts",
                "duration": 3,
                "questions": [
                    {
                        "id": 1,
                        "type": "mcq",
                        "question": "How many Vedas are there?",
                        "options": ["Two", "Three", "Four"],
                        "answer": "Four",
                        "explanation": "Rig, Sama, Yajur and Atharva."
                    },
                    true_false(2, "false"),
                    true_false(3, "true")
                ]
            },
            {
                "id": "perfect-five",
                "title": "Perfect Five",
                "category": "Science",
                "duration": 300,
                "questions": [
                    true_false(1, "true"),
                    true_false(2, "true"),
                    true_false(3, "true"),
                    true_false(4, "true"),
                    true_false(5, "true")
                ]
            },
            {
                "id": "no-time",
                "title": "No Time",
                "category": "Philosophy",
                "duration": 0,
                "questions": [true_false(1, "true")]
            },
            {
                "id": "empty",
                "title": "Empty",
                "category": "Philosophy",
                "duration": 30,
                "questions": []
            }
        ]
    });
    Arc::new(QuizCatalog::from_json_str(&document.to_string()).unwrap())
}

struct Harness {
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    notifier: Arc<RecordingNotifier>,
}

impl Harness {
    fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            clock: Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap())),
            notifier: Arc::new(RecordingNotifier::new()),
        }
    }

    async fn engine(&self) -> QuizEngine {
        QuizEngine::open(
            catalog(),
            self.store.clone(),
            self.clock.clone(),
            self.notifier.clone(),
        )
        .await
    }

    async fn named_engine(&self) -> QuizEngine {
        let mut engine = self.engine().await;
        engine.set_display_name("Meera").await.unwrap();
        engine
    }

    async fn snapshot(&self, quiz_id: &str) -> Option<SessionSnapshot> {
        let raw = self.store.get(&keys::session(quiz_id)).await.unwrap()?;
        Some(serde_json::from_str(&raw).unwrap())
    }
}

#[tokio::test]
async fn test_half_correct_attempt_scores_fifty_percent() {
    let harness = Harness::new();
    let mut engine = harness.named_engine().await;

    assert_eq!(engine.start("two-step").await.unwrap(), StartKind::Fresh);
    engine.answer_current("true").await.unwrap();
    assert!(engine.next().await.unwrap());
    engine.answer_current("false").await.unwrap();

    let score = engine.submit().await.unwrap();
    assert_eq!(score.score, 1);
    assert_eq!(score.total, 2);
    assert_eq!(score.percentage, 50.0);
    assert_eq!(engine.phase(), Phase::Results);

    let leaderboard = engine.leaderboard().await;
    assert_eq!(leaderboard.len(), 1);
    assert_eq!(leaderboard[0].user_name, "Meera");
    assert_eq!(leaderboard[0].quiz_title, "Two Step");
    assert_eq!(leaderboard[0].percentage, 50.0);
}

#[tokio::test]
async fn test_timer_expiry_submits_with_no_answers() {
    let harness = Harness::new();
    let mut engine = harness.named_engine().await;
    engine.start("three-step").await.unwrap();

    assert_eq!(engine.tick().await.unwrap(), TickOutcome::Running { time_left: 2 });
    assert_eq!(engine.tick().await.unwrap(), TickOutcome::Running { time_left: 1 });
    assert_eq!(engine.tick().await.unwrap(), TickOutcome::Expired);

    assert_eq!(engine.phase(), Phase::Results);
    let outcome = engine.outcome().unwrap();
    assert_eq!(outcome.score.score, 0);
    assert_eq!(outcome.score.total, 3);
    assert!(harness.snapshot("three-step").await.is_none());

    assert_eq!(engine.tick().await.unwrap(), TickOutcome::Inactive);
}

#[tokio::test]
async fn test_first_perfect_quiz_earns_two_badges() {
    let harness = Harness::new();
    let mut engine = harness.named_engine().await;
    engine.start("perfect-five").await.unwrap();

    for _ in 0..5 {
        engine.answer_current("true").await.unwrap();
        engine.next().await.unwrap();
    }
    engine.submit().await.unwrap();

    let outcome = engine.outcome().unwrap();
    assert_eq!(outcome.badges_earned, vec![Badge::FirstQuiz, Badge::PerfectScore]);
    assert_eq!(outcome.rank.label(), "Acharya");

    let record = engine.progress_record().await;
    assert_eq!(record.badges, vec!["first_quiz", "perfect_score"]);
    assert_eq!(record.total_quizzes, 1);
    assert_eq!(record.last_played_date, "2026-10-19");

    let badge_toasts = harness
        .notifier
        .titles()
        .into_iter()
        .filter(|title| title == "Badge Earned!")
        .count();
    assert_eq!(badge_toasts, 2);
}

#[tokio::test]
async fn test_next_on_last_question_is_a_no_op() {
    let harness = Harness::new();
    let mut engine = harness.named_engine().await;
    engine.start("two-step").await.unwrap();
    engine.next().await.unwrap();

    assert!(!engine.next().await.unwrap());
    let session = engine.active_session().unwrap();
    assert_eq!(session.current_index(), 1);
    assert!(session.is_last());
    assert_eq!(engine.phase(), Phase::Active);
}

#[tokio::test]
async fn test_previous_on_first_question_is_a_no_op() {
    let harness = Harness::new();
    let mut engine = harness.named_engine().await;
    engine.start("two-step").await.unwrap();

    assert!(!engine.previous().await.unwrap());
    assert_eq!(engine.active_session().unwrap().current_index(), 0);
}

#[tokio::test]
async fn test_start_requires_display_name() {
    let harness = Harness::new();
    let mut engine = harness.engine().await;

    let result = engine.start("two-step").await;
    assert!(matches!(result, Err(QuizError::MissingDisplayName)));
    assert_eq!(engine.phase(), Phase::Selection);

    engine.set_display_name("   ").await.unwrap();
    assert!(matches!(engine.start("two-step").await, Err(QuizError::MissingDisplayName)));
}

#[tokio::test]
async fn test_start_rejects_unknown_and_empty_quizzes() {
    let harness = Harness::new();
    let mut engine = harness.named_engine().await;

    assert!(matches!(engine.start("missing").await, Err(QuizError::UnknownQuiz(id)) if id == "missing"));
    assert!(matches!(engine.start("empty").await, Err(QuizError::EmptyQuiz(_))));
    assert_eq!(engine.phase(), Phase::Selection);
}

#[tokio::test]
async fn test_start_while_active_is_rejected() {
    let harness = Harness::new();
    let mut engine = harness.named_engine().await;
    engine.start("two-step").await.unwrap();

    let result = engine.start("perfect-five").await;
    assert!(matches!(result, Err(QuizError::InvalidState { state: "active", .. })));
    assert_eq!(engine.active_session().unwrap().quiz().id, "two-step");
}

#[tokio::test]
async fn test_resume_restores_last_autosave() {
    let harness = Harness::new();
    {
        let mut engine = harness.named_engine().await;
        engine.start("two-step").await.unwrap();
        engine.answer_current("true").await.unwrap();
        engine.next().await.unwrap();
        engine.answer_current("false").await.unwrap();
        engine.tick().await.unwrap();
        engine.tick().await.unwrap();
        engine.reset();
    }

    let mut engine = harness.engine().await;
    assert_eq!(engine.display_name(), Some("Meera"));
    assert_eq!(engine.start("two-step").await.unwrap(), StartKind::Resumed);

    let session = engine.active_session().unwrap();
    assert_eq!(session.current_index(), 1);
    assert_eq!(session.answer_for(0), Some("true"));
    assert_eq!(session.answer_for(1), Some("false"));
    assert_eq!(session.time_left(), 58);
}

#[tokio::test]
async fn test_autosave_pairs_timer_with_answers() {
    let harness = Harness::new();
    let mut engine = harness.named_engine().await;
    engine.start("two-step").await.unwrap();
    engine.tick().await.unwrap();
    engine.answer_current("true").await.unwrap();

    let snapshot = harness.snapshot("two-step").await.unwrap();
    assert_eq!(snapshot.time_left, 59);
    assert_eq!(snapshot.current_question, 0);
    assert_eq!(snapshot.answers.get(&0).map(String::as_str), Some("true"));

    let raw = harness.store.get("quiz_two-step").await.unwrap().unwrap();
    let value: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["timeLeft"], 59);
    assert_eq!(value["currentQuestion"], 0);
}

#[tokio::test]
async fn test_submit_deletes_autosave_and_retry_starts_fresh() {
    let harness = Harness::new();
    let mut engine = harness.named_engine().await;
    engine.start("two-step").await.unwrap();
    engine.answer_current("true").await.unwrap();
    engine.tick().await.unwrap();
    assert!(harness.snapshot("two-step").await.is_some());

    engine.submit().await.unwrap();
    assert!(harness.snapshot("two-step").await.is_none());

    assert_eq!(engine.retry().await.unwrap(), StartKind::Fresh);
    let session = engine.active_session().unwrap();
    assert_eq!(session.time_left(), 60);
    assert!(session.answers().is_empty());
    assert_eq!(session.current_index(), 0);
}

#[tokio::test]
async fn test_submit_twice_is_rejected_and_progress_counts_once() {
    let harness = Harness::new();
    let mut engine = harness.named_engine().await;
    engine.start("two-step").await.unwrap();
    engine.submit().await.unwrap();

    assert!(matches!(engine.submit().await, Err(QuizError::InvalidState { action: "submit", .. })));
    assert_eq!(engine.progress_record().await.total_quizzes, 1);
    assert_eq!(engine.leaderboard().await.len(), 1);
}

#[tokio::test]
async fn test_out_of_range_saved_index_is_clamped() {
    let harness = Harness::new();
    let mut answers = BTreeMap::new();
    answers.insert(0, "true".to_string());
    answers.insert(6, "false".to_string());
    let stale = SessionSnapshot {
        current_question: 6,
        answers,
        time_left: 40,
        time_per_question: vec![],
        difficulty_progress: vec![],
    };
    harness
        .store
        .set(&keys::session("two-step"), &serde_json::to_string(&stale).unwrap())
        .await
        .unwrap();

    let mut engine = harness.named_engine().await;
    assert_eq!(engine.start("two-step").await.unwrap(), StartKind::Resumed);

    let session = engine.active_session().unwrap();
    assert_eq!(session.current_index(), 1);
    assert_eq!(session.answers().len(), 1);
    assert_eq!(session.time_left(), 40);
}

#[tokio::test]
async fn test_corrupt_autosave_starts_fresh() {
    let harness = Harness::new();
    harness.store.set("quiz_two-step", "{\"currentQuestion\":").await.unwrap();

    let mut engine = harness.named_engine().await;
    assert_eq!(engine.start("two-step").await.unwrap(), StartKind::Fresh);
    assert_eq!(engine.active_session().unwrap().time_left(), 60);
}

#[tokio::test]
async fn test_legacy_autosave_without_trace_resumes() {
    let harness = Harness::new();
    harness
        .store
        .set(
            "quiz_two-step",
            r#"{"currentQuestion":1,"answers":{"0":"true"},"timeLeft":12,"timePerQuestion":[3.5]}"#,
        )
        .await
        .unwrap();

    let mut engine = harness.named_engine().await;
    assert_eq!(engine.start("two-step").await.unwrap(), StartKind::Resumed);
    let session = engine.active_session().unwrap();
    assert_eq!(session.time_left(), 12);
    assert_eq!(session.time_per_question(), &[Some(3.5)]);
    assert!(session.difficulty_progress().is_empty());
}

#[tokio::test]
async fn test_zero_duration_submits_immediately() {
    let harness = Harness::new();
    let mut engine = harness.named_engine().await;

    assert_eq!(engine.start("no-time").await.unwrap(), StartKind::Expired);
    assert_eq!(engine.phase(), Phase::Results);
    assert_eq!(engine.outcome().unwrap().score.score, 0);
    assert!(harness.snapshot("no-time").await.is_none());
}

#[tokio::test]
async fn test_elapsed_time_recorded_moving_forward_and_on_submit() {
    let harness = Harness::new();
    let mut engine = harness.named_engine().await;
    engine.start("three-step").await.unwrap();

    harness.clock.advance(Duration::seconds(4));
    engine.next().await.unwrap();
    harness.clock.advance(Duration::seconds(1));
    engine.previous().await.unwrap();
    assert_eq!(engine.active_session().unwrap().time_per_question(), &[Some(4.0)]);

    harness.clock.advance(Duration::milliseconds(2500));
    engine.submit().await.unwrap();

    let outcome = engine.outcome().unwrap();
    assert_eq!(outcome.time_per_question, vec![Some(2.5)]);
    assert_eq!(outcome.time_spent, 2.5);
    assert_eq!(engine.leaderboard().await[0].time_spent, 2.5);
}

#[tokio::test]
async fn test_adaptive_mode_records_difficulty_trace() {
    let harness = Harness::new();
    let mut engine = harness.named_engine().await;
    engine.set_adaptive_mode(true);
    engine.start("three-step").await.unwrap();

    engine.answer_current("Four").await.unwrap();
    engine.next().await.unwrap();
    engine.answer_current("true").await.unwrap();
    engine.next().await.unwrap();

    let trace: Vec<(usize, f64)> = engine
        .active_session()
        .unwrap()
        .difficulty_progress()
        .iter()
        .map(|point| (point.question, point.difficulty))
        .collect();
    assert_eq!(trace, vec![(2, 2.5), (3, 2.0)]);

    let snapshot = harness.snapshot("three-step").await.unwrap();
    assert_eq!(snapshot.difficulty_progress.len(), 2);
}

#[tokio::test]
async fn test_without_adaptive_mode_no_trace_is_kept() {
    let harness = Harness::new();
    let mut engine = harness.named_engine().await;
    engine.start("three-step").await.unwrap();
    engine.next().await.unwrap();

    assert!(engine.active_session().unwrap().difficulty_progress().is_empty());
}

#[tokio::test]
async fn test_answer_only_accepts_current_question() {
    let harness = Harness::new();
    let mut engine = harness.named_engine().await;
    engine.start("two-step").await.unwrap();

    let result = engine.answer(1, "true").await;
    assert!(matches!(result, Err(QuizError::QuestionNotCurrent { index: 1, current: 0 })));

    engine.answer(0, "false").await.unwrap();
    engine.answer(0, "true").await.unwrap();
    assert_eq!(engine.active_session().unwrap().answer_for(0), Some("true"));
}

#[tokio::test]
async fn test_answer_outside_active_state_is_rejected() {
    let harness = Harness::new();
    let mut engine = harness.named_engine().await;

    let result = engine.answer_current("true").await;
    assert!(matches!(result, Err(QuizError::InvalidState { state: "selection", .. })));
}

#[tokio::test]
async fn test_bookmarks_persist_across_engines() {
    let harness = Harness::new();
    let mut engine = harness.named_engine().await;

    assert!(engine.toggle_bookmark(3).await.unwrap());
    assert!(engine.toggle_bookmark(5).await.unwrap());
    assert!(!engine.toggle_bookmark(3).await.unwrap());
    assert_eq!(harness.store.get("saved_questions").await.unwrap().as_deref(), Some("[5]"));
    assert_eq!(
        harness.notifier.titles(),
        vec!["Question Bookmarked", "Question Bookmarked", "Bookmark Removed"]
    );

    let engine = harness.engine().await;
    assert_eq!(engine.bookmarks(), &[5]);
    assert!(engine.is_bookmarked(5));
}

#[tokio::test]
async fn test_review_round_trip() {
    let harness = Harness::new();
    let mut engine = harness.named_engine().await;
    assert!(engine.review().is_err());

    engine.start("two-step").await.unwrap();
    engine.answer_current("true").await.unwrap();
    engine.submit().await.unwrap();

    engine.review().unwrap();
    assert_eq!(engine.phase(), Phase::Review);
    let items = engine.outcome().unwrap().review_items();
    assert!(items[0].is_correct);
    assert_eq!(items[1].user_answer, None);

    engine.close_review().unwrap();
    assert_eq!(engine.phase(), Phase::Results);

    engine.reset();
    assert_eq!(engine.phase(), Phase::Selection);
    assert!(engine.outcome().is_none());
}

#[tokio::test]
async fn test_outcome_analytics_and_certificate() {
    let harness = Harness::new();
    let mut engine = harness.named_engine().await;
    engine.start("three-step").await.unwrap();
    engine.answer_current("Four").await.unwrap();
    harness.clock.advance(Duration::seconds(6));
    engine.next().await.unwrap();
    engine.answer_current("false").await.unwrap();
    harness.clock.advance(Duration::seconds(2));
    engine.submit().await.unwrap();

    let outcome = engine.outcome().unwrap();
    let analytics = outcome.analytics();
    assert_eq!(analytics.accuracy, 66.7);
    assert_eq!(analytics.average_time, 4.0);

    let certificate = outcome.certificate();
    assert_eq!(certificate.recipient, "Meera");
    assert_eq!(certificate.percentage, 67);
    assert_eq!(certificate.file_name(), "Three-Step-certificate.png");
}

#[tokio::test]
async fn test_stale_attempt_tick_is_ignored() {
    let harness = Harness::new();
    let mut engine = harness.named_engine().await;
    engine.start("two-step").await.unwrap();
    let first_attempt = engine.active_session().unwrap().attempt_id();
    engine.submit().await.unwrap();

    engine.retry().await.unwrap();
    assert_eq!(engine.tick_attempt(first_attempt).await.unwrap(), TickOutcome::Inactive);
    assert_eq!(engine.active_session().unwrap().time_left(), 60);
}

#[tokio::test]
async fn test_display_name_is_trimmed_and_cleared() {
    let harness = Harness::new();
    let mut engine = harness.engine().await;

    engine.set_display_name("  Arjun ").await.unwrap();
    assert_eq!(engine.display_name(), Some("Arjun"));
    assert_eq!(harness.store.get("quiz_username").await.unwrap().as_deref(), Some("Arjun"));

    engine.set_display_name("").await.unwrap();
    assert_eq!(engine.display_name(), None);
    assert!(!harness.store.contains_key("quiz_username").await);
}

#[tokio::test]
async fn test_challenge_link_names_selected_quiz() {
    let harness = Harness::new();
    let mut engine = harness.named_engine().await;
    assert!(engine.challenge_link("https://example.org").is_none());

    engine.start("two-step").await.unwrap();
    let link = engine.challenge_link("https://example.org/").unwrap();
    assert!(link.starts_with("https://example.org/quiz?challenge="));
    assert!(link.ends_with("&quiz=two-step"));

    let challenge = link
        .trim_start_matches("https://example.org/quiz?challenge=")
        .trim_end_matches("&quiz=two-step");
    assert_eq!(challenge.len(), 8);
}

async fn flaky_engine(store: &Arc<FlakyStore>) -> QuizEngine {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap()));
    let mut engine = QuizEngine::open(catalog(), store.clone(), clock, Arc::new(RecordingNotifier::new())).await;
    engine.set_display_name("Meera").await.unwrap();
    engine
}

#[tokio::test]
async fn test_storage_failure_on_submit_keeps_attempt_active() {
    let store = Arc::new(FlakyStore::new());
    let mut engine = flaky_engine(&store).await;
    engine.start("two-step").await.unwrap();

    store.fail_deletes();
    assert!(matches!(engine.submit().await, Err(QuizError::Storage(_))));
    assert_eq!(engine.phase(), Phase::Active);

    store.heal();
    engine.submit().await.unwrap();
    assert_eq!(engine.phase(), Phase::Results);
    assert_eq!(engine.progress_record().await.total_quizzes, 1);
}

#[tokio::test]
async fn test_leaderboard_write_failure_records_progress_once() {
    let store = Arc::new(FlakyStore::new());
    let mut engine = flaky_engine(&store).await;
    engine.start("two-step").await.unwrap();
    engine.answer_current("true").await.unwrap();

    store.fail_writes_of(keys::LEADERBOARD);
    assert!(matches!(engine.submit().await, Err(QuizError::Storage(_))));
    assert_eq!(engine.phase(), Phase::Active);
    assert!(engine.active_session().unwrap().is_submitting());
    assert_eq!(engine.progress_record().await.total_quizzes, 1);

    // The attempt is frozen while its submit is incomplete
    assert!(matches!(
        engine.answer_current("false").await,
        Err(QuizError::InvalidState { .. })
    ));

    store.heal();
    let score = engine.submit().await.unwrap();
    assert_eq!(score.score, 1);
    assert_eq!(engine.phase(), Phase::Results);
    assert_eq!(engine.outcome().unwrap().badges_earned, vec![Badge::FirstQuiz]);

    let record = engine.progress_record().await;
    assert_eq!(record.total_quizzes, 1);
    assert_eq!(record.badges, vec!["first_quiz"]);
    assert_eq!(engine.leaderboard().await.len(), 1);
    assert!(store.get(&keys::session("two-step")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_expired_attempt_retries_submit_without_double_counting() {
    let store = Arc::new(FlakyStore::new());
    let mut engine = flaky_engine(&store).await;
    engine.start("three-step").await.unwrap();

    store.fail_writes_of(keys::LEADERBOARD);
    assert_eq!(engine.tick().await.unwrap(), TickOutcome::Running { time_left: 2 });
    assert_eq!(engine.tick().await.unwrap(), TickOutcome::Running { time_left: 1 });
    for _ in 0..3 {
        assert!(engine.tick().await.is_err());
        assert_eq!(engine.phase(), Phase::Active);
        assert!(store.get(&keys::session("three-step")).await.unwrap().is_none());
    }

    store.heal();
    assert_eq!(engine.tick().await.unwrap(), TickOutcome::Expired);
    assert_eq!(engine.phase(), Phase::Results);
    assert_eq!(engine.progress_record().await.total_quizzes, 1);
    assert_eq!(engine.leaderboard().await.len(), 1);
}

#[tokio::test]
async fn test_progress_read_failure_aborts_submit_without_overwriting() {
    let store = Arc::new(FlakyStore::new());
    let mut engine = flaky_engine(&store).await;
    for _ in 0..3 {
        engine.start("no-time").await.unwrap();
        engine.reset();
    }
    assert_eq!(engine.progress_record().await.total_quizzes, 3);

    engine.start("two-step").await.unwrap();
    store.fail_reads_of(keys::PROGRESS);
    assert!(engine.submit().await.is_err());

    store.heal();
    assert_eq!(engine.progress_record().await.total_quizzes, 3);
    engine.submit().await.unwrap();

    let record = engine.progress_record().await;
    assert_eq!(record.total_quizzes, 4);
    assert_eq!(record.badges, vec!["first_quiz"]);
}
