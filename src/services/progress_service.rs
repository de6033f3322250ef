use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::models::domain::{ProgressSummary, COMPLETE};
use crate::repositories::KeyValueStore;

const KEY_PREFIX: &str = "pd:progress";

fn progress_key(namespace: &str, chapter: &str) -> String {
    format!("{}:{}:{}", KEY_PREFIX, namespace, chapter)
}

fn namespace_prefix(namespace: &str) -> String {
    format!("{}:{}:", KEY_PREFIX, namespace)
}

/// Rounds to a whole percentage in `0..=100`. Non-finite input counts as zero.
fn clamp_percentage(pct: f64) -> u8 {
    if pct.is_nan() {
        return 0;
    }
    pct.round().clamp(0.0, f64::from(COMPLETE)) as u8
}

/// Chapter completion percentages, namespaced by topic.
///
/// Storage failures never reach the caller. Writes that cannot be persisted are kept in memory
/// for the rest of the process so reads stay consistent.
pub struct ProgressStore {
    store: Arc<dyn KeyValueStore>,
    fallback: Mutex<HashMap<String, u8>>,
}

impl ProgressStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            fallback: Mutex::new(HashMap::new()),
        }
    }

    fn fallback(&self) -> MutexGuard<'_, HashMap<String, u8>> {
        self.fallback.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read(&self, namespace: &str, chapter: &str) -> u8 {
        let key = progress_key(namespace, chapter);
        if let Some(pct) = self.fallback().get(&key) {
            return *pct;
        }

        match self.store.get(&key) {
            Ok(Some(raw)) => raw
                .trim()
                .parse::<f64>()
                .map(clamp_percentage)
                .unwrap_or_else(|_| {
                    log::warn!("Ignoring malformed progress value for {}", key);
                    0
                }),
            Ok(None) => 0,
            Err(err) => {
                log::warn!("Could not read progress for {}: {}", key, err);
                0
            }
        }
    }

    /// Stores the clamped percentage and returns it.
    pub fn write(&self, namespace: &str, chapter: &str, pct: f64) -> u8 {
        let pct = clamp_percentage(pct);
        let key = progress_key(namespace, chapter);

        match self.store.set(&key, &pct.to_string()) {
            Ok(()) => {
                self.fallback().remove(&key);
            }
            Err(err) => {
                log::warn!("Could not save progress for {}, keeping it in memory: {}", key, err);
                self.fallback().insert(key, pct);
            }
        }
        pct
    }

    pub fn mark_complete(&self, namespace: &str, chapter: &str) {
        self.write(namespace, chapter, f64::from(COMPLETE));
    }

    /// Clears the given chapters, or every chapter in the namespace when `chapters` is `None`.
    pub fn reset(&self, namespace: &str, chapters: Option<&[&str]>) {
        let keys: Vec<String> = match chapters {
            Some(chapters) => chapters
                .iter()
                .map(|chapter| progress_key(namespace, chapter))
                .collect(),
            None => self.namespace_keys(namespace),
        };

        let mut fallback = self.fallback();
        for key in keys {
            fallback.remove(&key);
            if let Err(err) = self.store.remove(&key) {
                log::warn!("Could not clear progress for {}: {}", key, err);
            }
        }
    }

    fn namespace_keys(&self, namespace: &str) -> Vec<String> {
        let prefix = namespace_prefix(namespace);

        let mut keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(err) => {
                log::warn!("Could not list progress keys: {}", err);
                Vec::new()
            }
        };
        keys.extend(self.fallback().keys().cloned());
        keys.retain(|key| key.starts_with(&prefix));
        keys.sort();
        keys.dedup();
        keys
    }

    /// Chapters in `namespace` recorded at 100%, sorted by name.
    pub fn completed_chapters(&self, namespace: &str) -> Vec<String> {
        let prefix = namespace_prefix(namespace);

        self.namespace_keys(namespace)
            .into_iter()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .filter(|chapter| self.read(namespace, chapter) >= COMPLETE)
            .collect()
    }

    pub fn summary(&self, namespace: &str, total_chapters: usize) -> ProgressSummary {
        ProgressSummary::new(self.completed_chapters(namespace).len(), total_chapters)
    }
}
