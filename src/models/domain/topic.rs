use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Completion at or above this counts as high mastery.
pub const HIGH_MASTERY_PERCENT: f64 = 70.0;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicInfo {
    pub name: String,
    pub total_questions: usize,
}

/// The topics mastery is tracked for, keyed by topic id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicCatalog {
    topics: BTreeMap<String, TopicInfo>,
}

impl TopicCatalog {
    pub fn empty() -> Self {
        TopicCatalog {
            topics: BTreeMap::new(),
        }
    }

    pub fn with_topic(mut self, id: &str, name: &str, total_questions: usize) -> Self {
        self.topics.insert(
            id.to_string(),
            TopicInfo {
                name: name.to_string(),
                total_questions,
            },
        );
        self
    }

    pub fn get(&self, id: &str) -> Option<&TopicInfo> {
        self.topics.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TopicInfo)> {
        self.topics.iter()
    }
}

impl Default for TopicCatalog {
    fn default() -> Self {
        TopicCatalog::empty()
            .with_topic("mechanics-foundations", "Mechanics Foundations", 100)
            .with_topic("mechanics-rotation", "Rotational Motion", 80)
            .with_topic("mechanics-energy", "Energy & Gravitation", 90)
            .with_topic("fluids-mechanics", "Fluid Mechanics", 60)
            .with_topic("waves-sound", "Waves & Sound", 70)
            .with_topic("thermodynamics", "Thermodynamics", 85)
            .with_topic("electromagnetism-electrostatics", "Electrostatics", 120)
            .with_topic("electromagnetism-current", "Current & Magnetism", 110)
            .with_topic("electromagnetism-ac", "AC Circuits & Light", 95)
            .with_topic("optics-geometric", "Geometric Optics", 75)
            .with_topic("optics-wave", "Wave Properties of Light", 85)
            .with_topic("modern-quantum", "Quantum & Atomic Physics", 100)
            .with_topic("modern-nuclear", "Nuclear & Particle Physics", 80)
    }
}

/// Distinct questions a learner has answered correctly within one topic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicProgress {
    pub correct_answers: BTreeSet<String>,
    #[serde(default)]
    pub total_attempted: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_solve_date: Option<DateTime<Utc>>,
}

impl TopicProgress {
    pub fn completion(&self, total_questions: usize) -> f64 {
        if total_questions == 0 {
            return 0.0;
        }
        (self.correct_answers.len().min(total_questions) as f64 / total_questions as f64) * 100.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryLevel {
    Developing,
    High,
}

impl MasteryLevel {
    pub fn for_completion(percentage: f64) -> Self {
        if percentage >= HIGH_MASTERY_PERCENT {
            MasteryLevel::High
        } else {
            MasteryLevel::Developing
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct TopicMasterySummary {
    pub name: String,
    pub completed: usize,
    pub total: usize,
    /// Rounded to one decimal place.
    pub percentage: f64,
    pub mastery_level: MasteryLevel,
}
