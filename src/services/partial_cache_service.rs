use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::errors::AppResult;
use crate::models::domain::CachedPartial;
use crate::repositories::KeyValueStore;

fn html_key(name: &str) -> String {
    format!("pd:{}:html", name)
}

fn ts_key(name: &str) -> String {
    format!("pd:{}:ts", name)
}

fn ver_key(name: &str) -> String {
    format!("pd:{}:ver", name)
}

/// Versioned cache of rendered page fragments (header, footer, and the like).
pub struct PartialCache {
    store: Arc<dyn KeyValueStore>,
    max_age: Duration,
}

impl PartialCache {
    pub fn new(store: Arc<dyn KeyValueStore>, max_age: Duration) -> Self {
        Self { store, max_age }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn put(&self, name: &str, html: &str, version: &str) {
        self.put_at(name, html, version, Utc::now());
    }

    pub fn put_at(&self, name: &str, html: &str, version: &str, now: DateTime<Utc>) {
        let stored = self
            .store
            .set(&html_key(name), html)
            .and_then(|_| self.store.set(&ts_key(name), &now.timestamp_millis().to_string()))
            .and_then(|_| self.store.set(&ver_key(name), version));

        if let Err(err) = stored {
            log::warn!("Could not cache partial {}: {}", name, err);
        }
    }

    /// The cached fragment if it matches `version` and is younger than the max age.
    pub fn get_fresh(&self, name: &str, version: &str) -> Option<CachedPartial> {
        self.get_fresh_at(name, version, Utc::now())
    }

    pub fn get_fresh_at(
        &self,
        name: &str,
        version: &str,
        now: DateTime<Utc>,
    ) -> Option<CachedPartial> {
        self.get_any(name)
            .filter(|partial| partial.version == version)
            .filter(|partial| now - partial.stored_at < self.max_age)
    }

    /// The cached fragment regardless of age or version, for use when a refresh fails.
    pub fn get_any(&self, name: &str) -> Option<CachedPartial> {
        match self.load(name) {
            Ok(partial) => partial,
            Err(err) => {
                log::warn!("Could not read cached partial {}: {}", name, err);
                None
            }
        }
    }

    fn load(&self, name: &str) -> AppResult<Option<CachedPartial>> {
        let Some(html) = self.store.get(&html_key(name))? else {
            return Ok(None);
        };

        let stored_at = self
            .store
            .get(&ts_key(name))?
            .and_then(|ts| ts.parse::<i64>().ok())
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let version = self.store.get(&ver_key(name))?.unwrap_or_default();

        Ok(Some(CachedPartial {
            html,
            version,
            stored_at,
        }))
    }

    pub fn invalidate(&self, name: &str) {
        for key in [html_key(name), ts_key(name), ver_key(name)] {
            if let Err(err) = self.store.remove(&key) {
                log::warn!("Could not drop cached partial key {}: {}", key, err);
            }
        }
    }
}
