use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::Utc;
use serde_json::json;

use crate::models::domain::{
    MasteryLevel, QuestionOutcome, QuizResult, TopicCatalog, TopicMasterySummary, TopicProgress,
};
use crate::repositories::KeyValueStore;
use crate::services::gamification_service::GamificationLedger;

pub const TOPIC_PROGRESS_KEY: &str = "pd:xp:topicProgress";

pub const EXPLORER_BONUS: u64 = 10;

/// Completion thresholds and the one-time bonus XP each unlocks.
pub const MASTERY_MILESTONES: [(u32, u64); 3] = [(50, 20), (70, 30), (90, 50)];

/// Bonuses earned on top of the regular quiz award.
#[derive(Clone, Debug, PartialEq)]
pub struct TopicAward {
    pub topic_id: String,
    pub bonus_xp: u64,
    pub badges: Vec<String>,
    pub new_questions: usize,
    /// Rounded to one decimal place.
    pub completion: f64,
    pub mastery_level: MasteryLevel,
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Tracks which questions each topic has had answered correctly and pays out explorer and
/// mastery milestones through the ledger.
pub struct TopicMastery {
    store: Arc<dyn KeyValueStore>,
    catalog: TopicCatalog,
    ledger: GamificationLedger,
    progress: Mutex<HashMap<String, TopicProgress>>,
}

impl TopicMastery {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        catalog: TopicCatalog,
        ledger: GamificationLedger,
    ) -> Self {
        let progress = load_progress(store.as_ref());
        Self {
            store,
            catalog,
            ledger,
            progress: Mutex::new(progress),
        }
    }

    fn lock_progress(&self) -> MutexGuard<'_, HashMap<String, TopicProgress>> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn catalog(&self) -> &TopicCatalog {
        &self.catalog
    }

    pub fn progress(&self, topic_id: &str) -> TopicProgress {
        self.lock_progress()
            .get(topic_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Folds the correctly answered questions of `result` into the topic and grants any
    /// explorer or milestone bonus. Returns `None` for topics outside the catalog.
    pub fn record_quiz(&self, topic_id: &str, result: &QuizResult) -> Option<TopicAward> {
        let Some(topic) = self.catalog.get(topic_id) else {
            log::debug!("No mastery tracking for topic {}", topic_id);
            return None;
        };

        let (new_questions, first_solve, completion) = {
            let mut all = self.lock_progress();
            let progress = all.entry(topic_id.to_string()).or_default();

            let mut new_questions = 0;
            for review in &result.reviews {
                if review.outcome == QuestionOutcome::Correct
                    && progress.correct_answers.insert(review.question.prompt.clone())
                {
                    new_questions += 1;
                }
            }
            progress.total_attempted += new_questions as u32;

            let first_solve = progress.first_solve_date.is_none() && new_questions > 0;
            if first_solve {
                progress.first_solve_date = Some(Utc::now());
            }

            let completion = progress.completion(topic.total_questions);
            self.save(&all);
            (new_questions, first_solve, completion)
        };

        let mut bonus_xp = 0;
        let mut badges = Vec::new();

        if first_solve {
            let id = format!("explorer-{}", topic_id);
            if self
                .ledger
                .add_badge(&id, &format!("{} Explorer!", topic.name))
            {
                bonus_xp += EXPLORER_BONUS;
                badges.push(id);
            }
        }

        for (threshold, bonus) in MASTERY_MILESTONES {
            if completion < f64::from(threshold) {
                continue;
            }
            let id = format!("mastery-{}-{}", threshold, topic_id);
            let text = format!("{} - {}% Mastery!", topic.name, threshold);
            if self.ledger.add_badge(&id, &text) {
                bonus_xp += bonus;
                badges.push(id);
            }
        }

        let completion = round_tenth(completion);
        if bonus_xp > 0 {
            self.ledger.grant_xp(
                bonus_xp as f64,
                "topic-mastery",
                json!({ "topicId": topic_id, "completion": completion, "badges": badges }),
            );
        }

        Some(TopicAward {
            topic_id: topic_id.to_string(),
            bonus_xp,
            badges,
            new_questions,
            completion,
            mastery_level: MasteryLevel::for_completion(completion),
        })
    }

    /// One entry per catalog topic, including those not started yet.
    pub fn topic_mastery_summary(&self) -> BTreeMap<String, TopicMasterySummary> {
        let all = self.lock_progress();

        self.catalog
            .iter()
            .map(|(id, topic)| {
                let (completed, completion) = all
                    .get(id)
                    .map(|p| {
                        (
                            p.correct_answers.len().min(topic.total_questions),
                            p.completion(topic.total_questions),
                        )
                    })
                    .unwrap_or((0, 0.0));

                let summary = TopicMasterySummary {
                    name: topic.name.clone(),
                    completed,
                    total: topic.total_questions,
                    percentage: round_tenth(completion),
                    mastery_level: MasteryLevel::for_completion(completion),
                };
                (id.clone(), summary)
            })
            .collect()
    }

    fn save(&self, progress: &HashMap<String, TopicProgress>) {
        let raw = match serde_json::to_string(progress) {
            Ok(raw) => raw,
            Err(err) => {
                log::warn!("Could not serialize topic progress: {}", err);
                return;
            }
        };
        if let Err(err) = self.store.set(TOPIC_PROGRESS_KEY, &raw) {
            log::warn!("Could not persist topic progress: {}", err);
        }
    }
}

fn load_progress(store: &dyn KeyValueStore) -> HashMap<String, TopicProgress> {
    match store.get(TOPIC_PROGRESS_KEY) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
            log::warn!("Discarding unreadable topic progress: {}", err);
            HashMap::new()
        }),
        Ok(None) => HashMap::new(),
        Err(err) => {
            log::warn!("Topic progress unavailable, starting fresh: {}", err);
            HashMap::new()
        }
    }
}
