use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::{NaiveDate, Utc};
use serde_json::json;
use tokio::sync::{broadcast, oneshot};

use crate::config::Config;
use crate::models::domain::{
    Badge, GamificationSnapshot, GamificationState, LedgerEvent, LevelProgress, QuizResult,
    QuizResultRecord, SyncIdentity,
};
use crate::repositories::{KeyValueStore, RemoteSyncRepository};
use crate::services::level_curve::level_for_xp;
use crate::services::persist_scheduler::PersistScheduler;
use crate::services::sync_forwarder::{SyncCommand, SyncForwarder};

pub const STATE_KEY: &str = "pd:gamification";
pub const SIGN_IN_HINT_KEY: &str = "pd:xp:signinHintAt";

const EVENT_CAPACITY: usize = 64;
const SILENT_META_KEY: &str = "__silent";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedgerSettings {
    pub persist_debounce: Duration,
    pub sign_in_hint_interval: Duration,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            persist_debounce: Duration::from_millis(300),
            sign_in_hint_interval: Duration::from_secs(60),
        }
    }
}

impl LedgerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            persist_debounce: config.persist_debounce(),
            sign_in_hint_interval: config.sign_in_hint_interval(),
        }
    }
}

/// What a single quiz submission earned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuizAward {
    pub xp: u64,
    pub coins: u64,
    pub badges: Vec<String>,
}

/// XP earned for a quiz: 10 per correct answer, a fifth of the rounded percentage, and half of
/// the speed bonus (one point per 30s left of a one-minute-per-question budget).
pub fn quiz_xp(result: &QuizResult) -> u64 {
    let base = u64::from(result.correct_count) * 10;
    let budget = f64::from(result.total_questions) * 60.0 - result.time_spent_seconds as f64;
    let speed_bonus = (budget / 30.0).round().max(0.0) as u64;
    let score_bonus = result.percentage.round().max(0.0) as u64;

    base + score_bonus / 5 + speed_bonus / 2
}

/// Floors and clamps at zero; NaN and negatives award nothing.
fn whole_units(amount: f64) -> u64 {
    if amount.is_finite() && amount > 0.0 {
        amount.floor() as u64
    } else {
        0
    }
}

fn is_silent(meta: &serde_json::Value) -> bool {
    meta.get(SILENT_META_KEY)
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
}

/// Owns the learner's XP, coins, and badges.
///
/// Local state is authoritative. Every mutation schedules a debounced save, and awards made while
/// signed in are mirrored to the remote store in the background.
#[derive(Clone)]
pub struct GamificationLedger {
    inner: Arc<LedgerInner>,
}

struct LedgerInner {
    state: Mutex<GamificationState>,
    store: Arc<dyn KeyValueStore>,
    persist: PersistScheduler,
    events: broadcast::Sender<LedgerEvent>,
    sync: Option<SyncForwarder>,
    identity: Mutex<Option<SyncIdentity>>,
    /// Held while local XP changes and its remote command is queued, so a backfill snapshot
    /// never sees XP whose award is not yet in the queue.
    sync_order: Mutex<()>,
    settings: LedgerSettings,
}

impl LedgerInner {
    fn lock_state(&self) -> MutexGuard<'_, GamificationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn save_state(&self) {
        let raw = serde_json::to_string(&*self.lock_state());
        match raw {
            Ok(raw) => {
                if let Err(err) = self.store.set(STATE_KEY, &raw) {
                    log::warn!("Could not persist gamification state: {}", err);
                }
            }
            Err(err) => log::warn!("Could not serialize gamification state: {}", err),
        }
    }
}

fn load_state(store: &dyn KeyValueStore) -> GamificationState {
    let mut state = match store.get(STATE_KEY) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
            log::warn!("Discarding unreadable gamification state: {}", err);
            GamificationState::default()
        }),
        Ok(None) => GamificationState::default(),
        Err(err) => {
            log::warn!("Gamification state unavailable, starting fresh: {}", err);
            GamificationState::default()
        }
    };

    state.level = state.level.max(level_for_xp(state.xp).level);
    state
}

impl GamificationLedger {
    /// A ledger that keeps everything local.
    pub fn new(store: Arc<dyn KeyValueStore>, settings: LedgerSettings) -> Self {
        Self::build(store, settings, None)
    }

    /// A ledger that also mirrors awards to `remote`. Must be called inside a tokio runtime.
    pub fn with_remote(
        store: Arc<dyn KeyValueStore>,
        settings: LedgerSettings,
        remote: Arc<dyn RemoteSyncRepository>,
    ) -> Self {
        Self::build(store, settings, Some(SyncForwarder::spawn(remote)))
    }

    fn build(
        store: Arc<dyn KeyValueStore>,
        settings: LedgerSettings,
        sync: Option<SyncForwarder>,
    ) -> Self {
        let state = load_state(store.as_ref());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(LedgerInner {
                state: Mutex::new(state),
                store,
                persist: PersistScheduler::new(settings.persist_debounce),
                events,
                sync,
                identity: Mutex::new(None),
                sync_order: Mutex::new(()),
                settings,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: LedgerEvent) {
        // No listeners is fine.
        let _ = self.inner.events.send(event);
    }

    fn schedule_persist(&self) {
        let inner = Arc::clone(&self.inner);
        self.inner.persist.schedule(move || inner.save_state());
    }

    pub fn get_state(&self) -> GamificationSnapshot {
        let state = self.inner.lock_state().clone();
        let progress = level_for_xp(state.xp);
        GamificationSnapshot { state, progress }
    }

    pub fn level_progress(&self) -> LevelProgress {
        level_for_xp(self.inner.lock_state().xp)
    }

    /// Adds XP and reports only the final level reached, even when several thresholds are
    /// crossed at once. Returns the XP actually added.
    pub fn add_xp(&self, amount: f64) -> u64 {
        let amount = whole_units(amount);

        let reached = {
            let mut state = self.inner.lock_state();
            state.xp = state.xp.saturating_add(amount);
            state.last_award_at = Some(Utc::now());

            let level = level_for_xp(state.xp).level;
            if level > state.level {
                state.level = level;
                Some(level)
            } else {
                None
            }
        };

        if let Some(level) = reached {
            log::info!("Level up: now level {}", level);
            self.add_badge(&format!("level-up-{}", level), &format!("Level {} reached!", level));
            self.emit(LedgerEvent::LevelUp { level });
        }

        self.schedule_persist();
        amount
    }

    pub fn add_coins(&self, amount: f64) -> u64 {
        let amount = whole_units(amount);
        {
            let mut state = self.inner.lock_state();
            state.coins = state.coins.saturating_add(amount);
        }
        self.schedule_persist();
        amount
    }

    /// No-op when a badge with `id` is already held.
    pub fn add_badge(&self, id: &str, text: &str) -> bool {
        let added = self.inner.lock_state().push_badge(Badge {
            id: id.to_string(),
            text: text.to_string(),
            awarded_at: Utc::now(),
        });

        if added {
            self.emit(LedgerEvent::BadgeAwarded {
                id: id.to_string(),
                text: text.to_string(),
            });
            self.schedule_persist();
        }
        added
    }

    /// Awards a badge whose id carries the current timestamp, so repeat achievements each
    /// get their own entry.
    fn add_timestamped_badge(&self, prefix: &str, text: &str) -> String {
        let id = {
            let mut state = self.inner.lock_state();
            let now = Utc::now();
            let base = format!("{}-{}", prefix, now.timestamp_millis());

            let mut id = base.clone();
            let mut n = 1;
            while state.has_badge(&id) {
                id = format!("{}-{}", base, n);
                n += 1;
            }

            state.push_badge(Badge {
                id: id.clone(),
                text: text.to_string(),
                awarded_at: now,
            });
            id
        };

        self.emit(LedgerEvent::BadgeAwarded {
            id: id.clone(),
            text: text.to_string(),
        });
        self.schedule_persist();
        id
    }

    pub fn award_for_quiz(&self, result: &QuizResult) -> QuizAward {
        let meta = json!({
            "totalQuestions": result.total_questions,
            "correct": result.correct_count,
            "incorrect": result.incorrect_count,
            "unanswered": result.unanswered_count,
            "percentage": result.percentage,
            "timeSpent": result.time_spent_seconds,
        });

        let xp = self.grant_xp(quiz_xp(result) as f64, "quiz", meta);
        let coins = self.add_coins(f64::from(result.correct_count));

        let mut badges = Vec::new();
        if result.percentage >= 90.0 {
            badges.push(self.add_timestamped_badge("ace", "Quiz Ace: 90%+"));
        }
        if result.is_perfect() {
            badges.push(self.add_timestamped_badge("perfect", "Perfect Score!"));
        }

        QuizAward { xp, coins, badges }
    }

    /// Adds XP locally, then queues the award for the remote store when signed in.
    pub fn grant_xp(&self, amount: f64, reason: &str, meta: serde_json::Value) -> u64 {
        let (awarded, identity) = {
            let _order = self
                .inner
                .sync_order
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let awarded = self.add_xp(amount);
            let identity = self.identity();
            if let Some(identity) = &identity {
                self.forward(SyncCommand::LogXp {
                    identity: identity.clone(),
                    amount: awarded,
                    reason: reason.to_string(),
                    meta: meta.clone(),
                });
            }
            (awarded, identity)
        };

        if identity.is_none() && !is_silent(&meta) {
            self.maybe_hint_sign_in();
        }

        self.emit(LedgerEvent::XpAwarded {
            amount: awarded,
            reason: reason.to_string(),
            meta,
        });
        awarded
    }

    fn forward(&self, command: SyncCommand) {
        match &self.inner.sync {
            Some(sync) => sync.forward(command),
            None => log::debug!("No remote store configured; award stays local"),
        }
    }

    fn maybe_hint_sign_in(&self) {
        let now = Utc::now().timestamp_millis();
        let last = match self.inner.store.get(SIGN_IN_HINT_KEY) {
            Ok(value) => value.and_then(|v| v.parse::<i64>().ok()).unwrap_or(0),
            Err(err) => {
                log::warn!("Could not read sign-in hint time: {}", err);
                0
            }
        };

        let interval = self.inner.settings.sign_in_hint_interval.as_millis() as i64;
        if now - last <= interval {
            return;
        }

        self.emit(LedgerEvent::SignInHint);
        if let Err(err) = self.inner.store.set(SIGN_IN_HINT_KEY, &now.to_string()) {
            log::warn!("Could not record sign-in hint time: {}", err);
        }
    }

    pub fn sign_in(&self, identity: SyncIdentity) {
        log::info!("Mirroring XP for {}", identity.uid);
        *self
            .inner
            .identity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(identity);
    }

    pub fn sign_out(&self) {
        self.inner
            .identity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn identity(&self) -> Option<SyncIdentity> {
        self.inner
            .identity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Pushes any local XP the remote total is missing. Returns the amount pushed.
    pub async fn sync_xp_to_cloud(&self) -> u64 {
        let (Some(identity), Some(sync)) = (self.identity(), self.inner.sync.as_ref()) else {
            return 0;
        };

        let (reply, pushed) = oneshot::channel();
        {
            let _order = self
                .inner
                .sync_order
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            // The worker applies every award queued before this snapshot first.
            let local_total = self.inner.lock_state().xp;
            sync.forward(SyncCommand::Backfill {
                identity,
                local_total,
                reply,
            });
        }

        let missing = pushed.await.unwrap_or(0);
        if missing > 0 {
            self.emit(LedgerEvent::CloudBackfilled { amount: missing });
        }
        missing
    }

    /// Mirrors a finished quiz to the learner's remote history when signed in.
    pub fn record_quiz_attempt(&self, chapter: &str, topic: &str, result: &QuizResult) {
        if let Some(identity) = self.identity() {
            let record = QuizResultRecord::new(&identity.uid, chapter, topic, result);
            self.forward(SyncCommand::RecordQuiz(record));
        }
    }

    pub fn record_daily_login(&self) -> Option<u64> {
        self.record_daily_login_on(Utc::now().date_naive())
    }

    /// Counts one active day. Returns the XP granted, or `None` if `today` was already counted.
    pub fn record_daily_login_on(&self, today: NaiveDate) -> Option<u64> {
        let streak = {
            let mut state = self.inner.lock_state();
            if state.last_login_date == Some(today) {
                return None;
            }

            let continues = state
                .last_login_date
                .is_some_and(|last| Some(last) == today.pred_opt());
            state.login_streak = if continues { state.login_streak + 1 } else { 1 };
            state.last_login_date = Some(today);
            state.total_days_active += 1;
            state.login_streak
        };

        let bonus = (f64::from(streak) * 0.5).min(5.0).floor() as u64;
        let xp = self.grant_xp(
            (2 + bonus) as f64,
            "daily-login",
            json!({ "streak": streak, "bonus": bonus, "__silent": true }),
        );

        match streak {
            7 => {
                self.add_badge("week-streak", "7-Day Login Streak!");
            }
            30 => {
                self.add_badge("month-streak", "30-Day Login Streak!");
            }
            100 => {
                self.add_badge("century-streak", "100-Day Login Streak!");
            }
            _ => {}
        }

        self.schedule_persist();
        Some(xp)
    }

    /// Wipes all progress and writes the empty state immediately.
    pub fn reset(&self) {
        *self.inner.lock_state() = GamificationState::default();
        self.schedule_persist();
        self.flush();
        log::info!("Gamification state reset");
    }

    /// Writes pending state now instead of waiting for the debounce.
    pub fn flush(&self) {
        let inner = Arc::clone(&self.inner);
        self.inner.persist.flush_now(move || inner.save_state());
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.inner.persist.is_dirty()
    }

    /// Flushes local state and waits for queued remote updates.
    pub async fn shutdown(&self) {
        self.flush();
        if let Some(sync) = &self.inner.sync {
            sync.drain().await;
        }
    }
}
