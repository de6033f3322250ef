use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::domain::quiz_result::QuizResult;

/// The signed-in learner whose XP is mirrored remotely.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncIdentity {
    pub uid: String,
    pub display_name: String,
    pub country: Option<String>,
}

impl SyncIdentity {
    pub fn new(uid: &str, display_name: &str, country: Option<&str>) -> Self {
        SyncIdentity {
            uid: uid.to_string(),
            display_name: display_name.to_string(),
            country: country.map(str::to_string),
        }
    }
}

/// Append-only record of a single XP award.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XpLogEntry {
    pub id: String,
    pub uid: String,
    pub display_name: String,
    pub country: Option<String>,
    pub xp: i64,
    pub reason: String,
    pub meta: serde_json::Value,
    pub client_ts: DateTime<Utc>,
}

impl XpLogEntry {
    pub fn new(identity: &SyncIdentity, xp: u64, reason: &str, meta: serde_json::Value) -> Self {
        XpLogEntry {
            id: Uuid::new_v4().to_string(),
            uid: identity.uid.clone(),
            display_name: identity.display_name.clone(),
            country: identity.country.clone(),
            xp: i64::try_from(xp).unwrap_or(i64::MAX),
            reason: reason.to_string(),
            meta,
            client_ts: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResultRecord {
    pub id: String,
    pub uid: String,
    pub chapter: String,
    pub topic: String,
    pub total_questions: i64,
    pub correct_answers: i64,
    /// Percentage, 0-100.
    pub score: f64,
    pub time_spent: i64,
    pub client_ts: DateTime<Utc>,
}

impl QuizResultRecord {
    pub fn new(uid: &str, chapter: &str, topic: &str, result: &QuizResult) -> Self {
        QuizResultRecord {
            id: Uuid::new_v4().to_string(),
            uid: uid.to_string(),
            chapter: chapter.to_string(),
            topic: topic.to_string(),
            total_questions: i64::from(result.total_questions),
            correct_answers: i64::from(result.correct_count),
            score: result.percentage,
            time_spent: i64::try_from(result.time_spent_seconds).unwrap_or(i64::MAX),
            client_ts: Utc::now(),
        }
    }
}
