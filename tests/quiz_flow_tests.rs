use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::RwLock;

use physics_daily_core::{
    app_state::{ActiveQuiz, AppState, FinishedQuiz},
    config::Config,
    errors::AppResult,
    models::domain::{
        LedgerEvent, QuestionBank, QuizConfiguration, QuizResultRecord, SyncIdentity, XpLogEntry,
    },
    repositories::{InMemoryKeyValueStore, KeyValueStore, RemoteSyncRepository},
    services::quiz_session::SessionPhase,
};

const BANK_JSON: &str = r#"{
    "questions": [
        { "question": "Unit of force?", "options": ["N", "J", "W", "Pa"], "answer": "N",
          "solution": "Newton is kg m/s^2." },
        { "question": "Unit of energy?", "options": ["N", "J", "W", "Pa"], "answer": "J" },
        { "question": "Unit of power?", "options": ["N", "J", "W", "Pa"], "answer": "W" },
        { "question": "Unit of pressure?", "options": ["N", "J", "W", "Pa"], "answer": "Pa" },
        { "question": "Unit of charge?", "options": ["C", "A", "V", "F"], "answer": "C" }
    ]
}"#;

#[derive(Default)]
struct InMemoryRemoteSyncRepository {
    logs: RwLock<Vec<XpLogEntry>>,
    totals: RwLock<HashMap<String, u64>>,
    quiz_results: RwLock<Vec<QuizResultRecord>>,
}

#[async_trait]
impl RemoteSyncRepository for InMemoryRemoteSyncRepository {
    async fn append_xp_log(&self, entry: XpLogEntry) -> AppResult<()> {
        self.logs.write().await.push(entry);
        Ok(())
    }

    async fn increment_xp_total(&self, identity: &SyncIdentity, amount: u64) -> AppResult<()> {
        *self
            .totals
            .write()
            .await
            .entry(identity.uid.clone())
            .or_insert(0) += amount;
        Ok(())
    }

    async fn fetch_xp_total(&self, uid: &str) -> AppResult<u64> {
        Ok(self.totals.read().await.get(uid).copied().unwrap_or(0))
    }

    async fn record_quiz_result(&self, record: QuizResultRecord) -> AppResult<()> {
        self.quiz_results.write().await.push(record);
        Ok(())
    }
}

fn config() -> Config {
    let mut config = Config::from_env();
    config.persist_debounce_ms = 300;
    config.sign_in_hint_interval_secs = 60;
    config.partial_cache_max_age_days = 7;
    config
}

fn bank() -> QuestionBank {
    QuestionBank::from_json(BANK_JSON).expect("bank should parse")
}

#[tokio::test(start_paused = true)]
async fn signed_in_quiz_is_awarded_and_mirrored() {
    let store = Arc::new(InMemoryKeyValueStore::new());
    let remote = Arc::new(InMemoryRemoteSyncRepository::default());
    let state = AppState::with_store(
        config(),
        store.clone(),
        Some(remote.clone() as Arc<dyn RemoteSyncRepository>),
    );
    state
        .ledger
        .sign_in(SyncIdentity::new("uid-ada", "Ada", Some("GB")));

    let active = state
        .start_quiz(QuizConfiguration::new(5, 5), &bank())
        .unwrap();
    {
        let mut session = active.session.lock().unwrap();
        for i in 0..5 {
            let answer = session.questions()[i].correct_answer.clone();
            session.select_answer(i, &answer).unwrap();
        }
    }
    tokio::time::sleep(Duration::from_millis(60_500)).await;

    let FinishedQuiz {
        result,
        award,
        mastery,
    } = state.finish_quiz(active, "units", "mechanics").unwrap();
    assert!(mastery.is_none());
    assert_eq!(result.correct_count, 5);
    assert_eq!(result.score, 20.0);
    assert_eq!(result.time_spent_seconds, 60);
    // 50 base + 20 score bonus + (240s left / 30 = 8) / 2
    assert_eq!(award.xp, 74);
    assert_eq!(award.badges.len(), 2);

    state.shutdown().await;

    assert_eq!(remote.fetch_xp_total("uid-ada").await.unwrap(), 74);
    let logs = remote.logs.read().await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].reason, "quiz");
    assert_eq!(logs[0].display_name, "Ada");

    let quizzes = remote.quiz_results.read().await;
    assert_eq!(quizzes.len(), 1);
    assert_eq!(quizzes[0].chapter, "units");
    assert_eq!(quizzes[0].correct_answers, 5);

    assert!(store.get("pd:gamification").unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn expired_quiz_submits_once_and_matches_manual_grade() {
    let state = AppState::with_store(config(), Arc::new(InMemoryKeyValueStore::new()), None);

    let active = state
        .start_quiz(QuizConfiguration::new(3, 1), &bank())
        .unwrap();
    {
        let mut session = active.session.lock().unwrap();
        let answer = session.questions()[0].correct_answer.clone();
        session.select_answer(0, &answer).unwrap();
        session.mark_for_review(1).unwrap();
    }

    let session = Arc::clone(&active.session);
    let ActiveQuiz {
        expired,
        timer: _timer,
        ..
    } = active;
    let expired = expired.await.expect("clock should run out");
    assert_eq!(session.lock().unwrap().phase(), SessionPhase::Submitted);

    let resubmitted = session.lock().unwrap().submit().unwrap();
    assert_eq!(resubmitted, expired);
    assert_eq!(expired.time_spent_seconds, 60);
    assert_eq!(expired.correct_count, 1);
    assert_eq!(expired.unanswered_count, 2);
    assert_eq!(expired.score, 4.0);
    assert_eq!(expired.retry_bank().len(), 2);
}

#[tokio::test]
async fn signed_out_progress_is_backfilled_after_sign_in() {
    let remote = Arc::new(InMemoryRemoteSyncRepository::default());
    let state = AppState::with_store(
        config(),
        Arc::new(InMemoryKeyValueStore::new()),
        Some(remote.clone() as Arc<dyn RemoteSyncRepository>),
    );
    let mut events = state.ledger.subscribe();

    state
        .ledger
        .grant_xp(120.0, "lesson", serde_json::Value::Null);
    assert!(remote.logs.read().await.is_empty());

    state
        .ledger
        .sign_in(SyncIdentity::new("uid-ada", "Ada", None));
    assert_eq!(state.ledger.sync_xp_to_cloud().await, 120);
    state.shutdown().await;

    assert_eq!(remote.fetch_xp_total("uid-ada").await.unwrap(), 120);
    let logs = remote.logs.read().await;
    assert_eq!(logs[0].reason, "backfill");
    assert_eq!(logs[0].meta["__silent"], true);

    let mut saw_hint = false;
    let mut saw_backfill = false;
    while let Ok(event) = events.try_recv() {
        match event {
            LedgerEvent::SignInHint => saw_hint = true,
            LedgerEvent::CloudBackfilled { amount } => saw_backfill = amount == 120,
            _ => {}
        }
    }
    assert!(saw_hint);
    assert!(saw_backfill);
}

#[tokio::test]
async fn award_made_just_before_sync_is_not_pushed_twice() {
    let remote = Arc::new(InMemoryRemoteSyncRepository::default());
    let state = AppState::with_store(
        config(),
        Arc::new(InMemoryKeyValueStore::new()),
        Some(remote.clone() as Arc<dyn RemoteSyncRepository>),
    );
    state
        .ledger
        .sign_in(SyncIdentity::new("uid-ada", "Ada", None));

    state
        .ledger
        .grant_xp(100.0, "quiz", serde_json::Value::Null);
    assert_eq!(state.ledger.sync_xp_to_cloud().await, 0);
    state.shutdown().await;

    assert_eq!(remote.fetch_xp_total("uid-ada").await.unwrap(), 100);
    let logs = remote.logs.read().await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].reason, "quiz");
}

#[tokio::test(start_paused = true)]
async fn mastery_bonus_is_mirrored_for_catalog_topics() {
    let remote = Arc::new(InMemoryRemoteSyncRepository::default());
    let state = AppState::with_store(
        config(),
        Arc::new(InMemoryKeyValueStore::new()),
        Some(remote.clone() as Arc<dyn RemoteSyncRepository>),
    );
    state
        .ledger
        .sign_in(SyncIdentity::new("uid-ada", "Ada", None));

    let active = state
        .start_quiz(QuizConfiguration::new(5, 5), &bank())
        .unwrap();
    {
        let mut session = active.session.lock().unwrap();
        for i in 0..5 {
            let answer = session.questions()[i].correct_answer.clone();
            session.select_answer(i, &answer).unwrap();
        }
    }

    let finished = state
        .finish_quiz(active, "units", "mechanics-foundations")
        .unwrap();
    let mastery = finished.mastery.expect("mechanics-foundations is tracked");
    // 5 of 100 questions: explorer only
    assert_eq!(mastery.badges, vec!["explorer-mechanics-foundations".to_string()]);
    assert_eq!(mastery.completion, 5.0);
    state.shutdown().await;

    let logs = remote.logs.read().await;
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[1].reason, "topic-mastery");
    assert_eq!(logs[1].xp, 10);
    assert_eq!(
        remote.fetch_xp_total("uid-ada").await.unwrap(),
        finished.award.xp + 10
    );
}

#[tokio::test]
async fn progress_and_partials_share_local_storage() {
    let state = AppState::with_store(config(), Arc::new(InMemoryKeyValueStore::new()), None);

    state.progress.mark_complete("mechanics", "vectors");
    state.progress.write("mechanics", "kinematics", 150.0);
    state.progress.write("mechanics", "dynamics", -5.0);

    assert_eq!(state.progress.read("mechanics", "kinematics"), 100);
    assert_eq!(state.progress.read("mechanics", "dynamics"), 0);
    assert_eq!(state.progress.summary("mechanics", 4).percentage, 50);

    state.partials.put("header", "<nav/>", "2026.10");
    assert!(state.partials.get_fresh("header", "2026.10").is_some());
    assert!(state.partials.get_fresh("header", "2026.11").is_none());
}
