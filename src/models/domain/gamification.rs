use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Only the most recent badges are kept.
pub const MAX_BADGES: usize = 20;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Badge {
    pub id: String,
    pub text: String,
    pub awarded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct GamificationState {
    pub xp: u64,
    pub level: u32,
    pub coins: u64,
    /// Newest first.
    pub badges: Vec<Badge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_award_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_date: Option<NaiveDate>,
    #[serde(default)]
    pub login_streak: u32,
    #[serde(default)]
    pub total_days_active: u32,
}

impl Default for GamificationState {
    fn default() -> Self {
        GamificationState {
            xp: 0,
            level: 1,
            coins: 0,
            badges: Vec::new(),
            last_award_at: None,
            last_login_date: None,
            login_streak: 0,
            total_days_active: 0,
        }
    }
}

impl GamificationState {
    pub fn has_badge(&self, id: &str) -> bool {
        self.badges.iter().any(|b| b.id == id)
    }

    /// Prepends the badge unless one with the same id exists. Returns whether it was added.
    pub fn push_badge(&mut self, badge: Badge) -> bool {
        if self.has_badge(&badge.id) {
            return false;
        }
        self.badges.insert(0, badge);
        self.badges.truncate(MAX_BADGES);
        true
    }
}

/// Position within the level curve, derived from total XP.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct LevelProgress {
    pub level: u32,
    pub xp_into_level: u64,
    /// Size of the current level's span.
    pub xp_for_next_level: u64,
    pub xp_to_next_level: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct GamificationSnapshot {
    #[serde(flatten)]
    pub state: GamificationState,
    pub progress: LevelProgress,
}

/// Notifications published by the ledger for whatever UI is listening.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerEvent {
    XpAwarded {
        amount: u64,
        reason: String,
        meta: serde_json::Value,
    },
    LevelUp {
        level: u32,
    },
    BadgeAwarded {
        id: String,
        text: String,
    },
    SignInHint,
    CloudBackfilled {
        amount: u64,
    },
}
