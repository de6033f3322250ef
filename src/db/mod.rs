use mongodb::{
    bson::{doc, Document},
    options::{ClientOptions, ServerApi, ServerApiVersion},
    Client, Collection, Database as MongoDatabase,
};
use std::time::Duration;

use crate::{
    config::Config,
    errors::AppResult,
    models::domain::{QuizResultRecord, XpLogEntry},
};

const APP_NAME: &str = "physics-daily";

/// Handle to the remote document store that mirrors XP and quiz history.
#[derive(Clone)]
pub struct Database {
    db: MongoDatabase,
    users_collection: String,
    xp_logs_collection: String,
    quiz_results_collection: String,
}

async fn client_options(config: &Config) -> AppResult<ClientOptions> {
    let mut options = ClientOptions::parse(&config.mongo_conn_string).await?;

    options.app_name = Some(APP_NAME.to_string());
    options.server_api = Some(ServerApi::builder().version(ServerApiVersion::V1).build());
    // Retryable writes keep a resent `$inc` from being applied twice.
    options.retry_writes = Some(true);
    options.max_pool_size = Some(4);
    options.min_pool_size = Some(1);
    options.connect_timeout = Some(Duration::from_secs(5));
    options.server_selection_timeout = Some(Duration::from_secs(5));

    Ok(options)
}

impl Database {
    pub async fn connect(config: &Config) -> AppResult<Self> {
        let client = Client::with_options(client_options(config).await?)?;
        let db = client.database(&config.mongo_db_name);

        db.run_command(doc! { "ping": 1 }).await?;
        log::info!("Connected to remote store '{}'", config.mongo_db_name);

        Ok(Self {
            db,
            users_collection: config.users_collection.clone(),
            xp_logs_collection: config.xp_logs_collection.clone(),
            quiz_results_collection: config.quiz_results_collection.clone(),
        })
    }

    /// Per-learner documents holding XP totals, profile, and quiz stats.
    pub fn users(&self) -> Collection<Document> {
        self.db.collection(&self.users_collection)
    }

    pub fn xp_logs(&self) -> Collection<XpLogEntry> {
        self.db.collection(&self.xp_logs_collection)
    }

    pub fn quiz_results(&self) -> Collection<QuizResultRecord> {
        self.db.collection(&self.quiz_results_collection)
    }
}
