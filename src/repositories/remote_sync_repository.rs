use async_trait::async_trait;
use mongodb::{
    bson::{doc, Bson, DateTime as BsonDateTime, Document},
    error::{ErrorKind, WriteFailure},
    options::{IndexOptions, UpdateOptions},
    Collection, IndexModel,
};

use crate::{
    db::Database,
    errors::AppResult,
    models::domain::{QuizResultRecord, SyncIdentity, XpLogEntry},
};

const DUPLICATE_KEY: i32 = 11000;

/// Remote mirror of XP totals and quiz results used for leaderboards.
///
/// Totals only ever move through additive increments so a retried call can never clobber a
/// concurrent award from another device.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteSyncRepository: Send + Sync {
    async fn append_xp_log(&self, entry: XpLogEntry) -> AppResult<()>;
    async fn increment_xp_total(&self, identity: &SyncIdentity, amount: u64) -> AppResult<()>;
    async fn fetch_xp_total(&self, uid: &str) -> AppResult<u64>;
    async fn record_quiz_result(&self, record: QuizResultRecord) -> AppResult<()>;
}

pub struct MongoRemoteSyncRepository {
    users: Collection<Document>,
    xp_logs: Collection<XpLogEntry>,
    quiz_results: Collection<QuizResultRecord>,
}

impl MongoRemoteSyncRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            users: db.users(),
            xp_logs: db.xp_logs(),
            quiz_results: db.quiz_results(),
        }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for remote sync collections");

        let uid_unique = IndexModel::builder()
            .keys(doc! { "uid": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("uid_unique".to_string())
                    .build(),
            )
            .build();

        let log_id_unique = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        let log_uid = IndexModel::builder()
            .keys(doc! { "uid": 1, "clientTs": -1 })
            .options(IndexOptions::builder().name("uid_recent".to_string()).build())
            .build();

        let result_id_unique = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        self.users.create_index(uid_unique).await?;
        self.xp_logs.create_index(log_id_unique).await?;
        self.xp_logs.create_index(log_uid).await?;
        self.quiz_results.create_index(result_id_unique).await?;

        log::info!("Successfully created indexes for remote sync collections");
        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

fn bson_to_u64(value: &Bson) -> u64 {
    match value {
        Bson::Int32(v) => (*v).max(0) as u64,
        Bson::Int64(v) => (*v).max(0) as u64,
        Bson::Double(v) if v.is_finite() => v.max(0.0).floor() as u64,
        _ => 0,
    }
}

fn upsert() -> UpdateOptions {
    UpdateOptions::builder().upsert(true).build()
}

#[async_trait]
impl RemoteSyncRepository for MongoRemoteSyncRepository {
    async fn append_xp_log(&self, entry: XpLogEntry) -> AppResult<()> {
        match self.xp_logs.insert_one(&entry).await {
            Ok(_) => Ok(()),
            // Retried append of an entry that already landed.
            Err(err) if is_duplicate_key(&err) => {
                log::debug!("XP log {} already recorded", entry.id);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn increment_xp_total(&self, identity: &SyncIdentity, amount: u64) -> AppResult<()> {
        let amount = i64::try_from(amount).unwrap_or(i64::MAX);
        let update = doc! {
            "$inc": { "xp.total": amount },
            "$set": {
                "xp.lastAwardAt": BsonDateTime::now(),
                "profile.nickname": identity.display_name.as_str(),
                "profile.country": identity.country.clone(),
            },
        };

        self.users
            .update_one(doc! { "uid": identity.uid.as_str() }, update)
            .with_options(upsert())
            .await?;
        Ok(())
    }

    async fn fetch_xp_total(&self, uid: &str) -> AppResult<u64> {
        let user = self.users.find_one(doc! { "uid": uid }).await?;

        let total = user
            .as_ref()
            .and_then(|u| u.get_document("xp").ok())
            .and_then(|xp| xp.get("total"))
            .map(bson_to_u64)
            .unwrap_or(0);

        Ok(total)
    }

    async fn record_quiz_result(&self, record: QuizResultRecord) -> AppResult<()> {
        match self.quiz_results.insert_one(&record).await {
            Ok(_) => {}
            Err(err) if is_duplicate_key(&err) => {
                log::debug!("Quiz result {} already recorded", record.id);
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }

        let update = doc! {
            "$inc": {
                "stats.totalQuizzes": 1_i64,
                "stats.correctAnswers": record.correct_answers,
                "stats.totalTime": record.time_spent,
            },
        };

        self.users
            .update_one(doc! { "uid": record.uid.as_str() }, update)
            .with_options(upsert())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bson_totals_are_read_from_any_numeric_type() {
        assert_eq!(bson_to_u64(&Bson::Int32(12)), 12);
        assert_eq!(bson_to_u64(&Bson::Int64(1_000)), 1_000);
        assert_eq!(bson_to_u64(&Bson::Double(99.9)), 99);
        assert_eq!(bson_to_u64(&Bson::Int64(-5)), 0);
        assert_eq!(bson_to_u64(&Bson::String("12".into())), 0);
    }

    #[test]
    fn upsert_options_enable_upsert() {
        assert_eq!(upsert().upsert, Some(true));
    }

    #[test]
    fn test_repository_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MongoRemoteSyncRepository>();
    }
}
