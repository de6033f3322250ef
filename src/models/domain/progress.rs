use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const COMPLETE: u8 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProgressSummary {
    pub completed: usize,
    pub total: usize,
    pub percentage: u8,
}

impl ProgressSummary {
    pub fn new(completed: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            ((completed.min(total) as f64 / total as f64) * 100.0).round() as u8
        };

        ProgressSummary {
            completed,
            total,
            percentage,
        }
    }
}

/// A cached page fragment with the metadata needed to expire it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedPartial {
    pub html: String,
    pub version: String,
    pub stored_at: DateTime<Utc>,
}
