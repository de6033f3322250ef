use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

use crate::{
    config::Config,
    db::Database,
    errors::AppResult,
    models::domain::{QuestionBank, QuizConfiguration, QuizResult, TopicCatalog},
    repositories::{
        InMemoryKeyValueStore, JsonFileKeyValueStore, KeyValueStore, MongoRemoteSyncRepository,
        RemoteSyncRepository,
    },
    services::{
        gamification_service::{GamificationLedger, LedgerSettings, QuizAward},
        partial_cache_service::PartialCache,
        progress_service::ProgressStore,
        quiz_session::QuizSession,
        quiz_timer::{QuizTimer, SharedSession},
        topic_mastery_service::{TopicAward, TopicMastery},
    },
};

/// A running quiz: the shared session, its countdown, and the channel that fires on expiry.
pub struct ActiveQuiz {
    pub session: SharedSession,
    pub timer: QuizTimer,
    pub expired: oneshot::Receiver<QuizResult>,
}

/// Everything a finished quiz produced.
#[derive(Debug)]
pub struct FinishedQuiz {
    pub result: QuizResult,
    pub award: QuizAward,
    /// `None` when the topic has no mastery tracking.
    pub mastery: Option<TopicAward>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn KeyValueStore>,
    pub progress: Arc<ProgressStore>,
    pub partials: Arc<PartialCache>,
    pub ledger: GamificationLedger,
    pub mastery: Arc<TopicMastery>,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        config.validate()?;

        let store: Arc<dyn KeyValueStore> = match JsonFileKeyValueStore::open(&config.storage_path)
        {
            Ok(store) => Arc::new(store),
            Err(err) => {
                log::warn!(
                    "Local storage at {} unavailable, progress will not survive restart: {}",
                    config.storage_path.display(),
                    err
                );
                Arc::new(InMemoryKeyValueStore::new())
            }
        };

        let remote = if config.remote_sync_enabled {
            match Self::connect_remote(&config).await {
                Ok(remote) => Some(remote),
                Err(err) => {
                    log::warn!("Remote sync disabled, running local only: {}", err);
                    None
                }
            }
        } else {
            log::info!("Remote sync not enabled");
            None
        };

        Ok(Self::with_store(config, store, remote))
    }

    async fn connect_remote(config: &Config) -> AppResult<Arc<dyn RemoteSyncRepository>> {
        let db = Database::connect(config).await?;
        let repository = MongoRemoteSyncRepository::new(&db);
        repository.ensure_indexes().await?;

        let repository: Arc<dyn RemoteSyncRepository> = Arc::new(repository);
        Ok(repository)
    }

    /// Wires the services over an existing store. A remote requires a tokio runtime.
    pub fn with_store(
        config: Config,
        store: Arc<dyn KeyValueStore>,
        remote: Option<Arc<dyn RemoteSyncRepository>>,
    ) -> Self {
        let settings = LedgerSettings::from_config(&config);
        let ledger = match remote {
            Some(remote) => GamificationLedger::with_remote(Arc::clone(&store), settings, remote),
            None => GamificationLedger::new(Arc::clone(&store), settings),
        };

        let partials = PartialCache::new(
            Arc::clone(&store),
            chrono::Duration::days(config.partial_cache_max_age_days),
        );

        let mastery = TopicMastery::new(
            Arc::clone(&store),
            TopicCatalog::default(),
            ledger.clone(),
        );

        Self {
            progress: Arc::new(ProgressStore::new(Arc::clone(&store))),
            partials: Arc::new(partials),
            mastery: Arc::new(mastery),
            ledger,
            store,
            config: Arc::new(config),
        }
    }

    /// Samples a quiz from `bank` and starts its countdown. Must be called inside a tokio runtime.
    pub fn start_quiz(
        &self,
        config: QuizConfiguration,
        bank: &QuestionBank,
    ) -> AppResult<ActiveQuiz> {
        let mut session = QuizSession::new();
        session.configure(config, bank.questions())?;
        log::info!(
            "Quiz {} started with {} questions",
            session.id(),
            session.questions().len()
        );

        let session = Arc::new(Mutex::new(session));
        let (timer, expired) = QuizTimer::start(Arc::clone(&session));

        Ok(ActiveQuiz {
            session,
            timer,
            expired,
        })
    }

    /// Submits the quiz if the clock has not already done so, then awards and mirrors the result.
    /// Topic mastery bonuses come on top of the quiz award.
    pub fn finish_quiz(
        &self,
        active: ActiveQuiz,
        chapter: &str,
        topic: &str,
    ) -> AppResult<FinishedQuiz> {
        active.timer.cancel();

        let result = active
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .submit()?;

        let award = self.ledger.award_for_quiz(&result);
        self.ledger.record_quiz_attempt(chapter, topic, &result);
        let mastery = self.mastery.record_quiz(topic, &result);

        log::info!(
            "Quiz finished: {}/{} correct, {:.0}%, {} XP",
            result.correct_count,
            result.total_questions,
            result.percentage,
            award.xp
        );
        Ok(FinishedQuiz {
            result,
            award,
            mastery,
        })
    }

    pub async fn shutdown(&self) {
        self.ledger.shutdown().await;
    }
}
