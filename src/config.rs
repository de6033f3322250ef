use std::{env, path::PathBuf, time::Duration};

use crate::errors::{AppError, AppResult};

#[derive(Clone, Debug)]
pub struct Config {
    pub storage_path: PathBuf,
    pub persist_debounce_ms: u64,
    pub remote_sync_enabled: bool,
    pub mongo_conn_string: String,
    pub mongo_db_name: String,
    pub users_collection: String,
    pub xp_logs_collection: String,
    pub quiz_results_collection: String,
    pub sign_in_hint_interval_secs: u64,
    pub partial_cache_max_age_days: i64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            storage_path: env::var("PD_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".physics-daily/storage.json")),
            persist_debounce_ms: env::var("PD_PERSIST_DEBOUNCE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            remote_sync_enabled: env::var("PD_REMOTE_SYNC_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            mongo_conn_string: env::var("MONGO_CONN_STRING")
                .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            mongo_db_name: env::var("MONGO_DB_NAME")
                .unwrap_or_else(|_| "physics-daily-local".to_string()),
            users_collection: env::var("PD_USERS_COLLECTION")
                .unwrap_or_else(|_| "users".to_string()),
            xp_logs_collection: env::var("PD_XP_LOGS_COLLECTION")
                .unwrap_or_else(|_| "xp_logs".to_string()),
            quiz_results_collection: env::var("PD_QUIZ_RESULTS_COLLECTION")
                .unwrap_or_else(|_| "quiz_results".to_string()),
            sign_in_hint_interval_secs: env::var("PD_SIGNIN_HINT_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            partial_cache_max_age_days: env::var("PD_PARTIAL_CACHE_MAX_AGE_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7),
        }
    }

    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }

    pub fn sign_in_hint_interval(&self) -> Duration {
        Duration::from_secs(self.sign_in_hint_interval_secs)
    }

    /// Reject settings that would make the ledger or caches misbehave.
    pub fn validate(&self) -> AppResult<()> {
        if self.storage_path.as_os_str().is_empty() {
            return Err(AppError::InvalidConfiguration(
                "PD_STORAGE_PATH must not be empty".to_string(),
            ));
        }

        if self.partial_cache_max_age_days <= 0 {
            return Err(AppError::InvalidConfiguration(format!(
                "PD_PARTIAL_CACHE_MAX_AGE_DAYS must be positive, got {}",
                self.partial_cache_max_age_days
            )));
        }

        if self.remote_sync_enabled && self.mongo_db_name.is_empty() {
            return Err(AppError::InvalidConfiguration(
                "MONGO_DB_NAME is required when remote sync is enabled".to_string(),
            ));
        }

        Ok(())
    }

    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            storage_path: env::temp_dir().join("physics-daily-test/storage.json"),
            persist_debounce_ms: 300,
            remote_sync_enabled: false,
            mongo_conn_string: "mongodb://localhost:27017".to_string(),
            mongo_db_name: "physics-daily-test".to_string(),
            users_collection: "users".to_string(),
            xp_logs_collection: "xp_logs".to_string(),
            quiz_results_collection: "quiz_results".to_string(),
            sign_in_hint_interval_secs: 60,
            partial_cache_max_age_days: 7,
        }
    }
}
