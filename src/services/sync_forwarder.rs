use std::sync::{Arc, Mutex, PoisonError};

use serde_json::json;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::errors::AppResult;
use crate::models::domain::{QuizResultRecord, SyncIdentity, XpLogEntry};
use crate::repositories::RemoteSyncRepository;

#[derive(Debug)]
pub enum SyncCommand {
    LogXp {
        identity: SyncIdentity,
        amount: u64,
        reason: String,
        meta: serde_json::Value,
    },
    RecordQuiz(QuizResultRecord),
    /// Tops the remote total up to `local_total`. Runs after every command queued before it, so
    /// awards still in flight are not counted twice. The amount pushed is sent on `reply`.
    Backfill {
        identity: SyncIdentity,
        local_total: u64,
        reply: oneshot::Sender<u64>,
    },
}

/// Background worker that mirrors local awards to the remote store.
///
/// Commands are queued without waiting. Failures are logged by the worker and never reach the
/// code that queued them.
pub struct SyncForwarder {
    tx: Mutex<Option<mpsc::UnboundedSender<SyncCommand>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SyncForwarder {
    /// Must be called from within a tokio runtime.
    pub fn spawn(remote: Arc<dyn RemoteSyncRepository>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<SyncCommand>();

        let worker = tokio::spawn(async move {
            log::info!("Remote sync worker started");
            while let Some(command) = rx.recv().await {
                if let Err(err) = process(remote.as_ref(), command).await {
                    log::warn!("Remote sync failed, keeping local state: {}", err);
                }
            }
            log::info!("Remote sync worker stopped");
        });

        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn forward(&self, command: SyncCommand) {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let sent = tx.as_ref().is_some_and(|tx| tx.send(command).is_ok());
        if !sent {
            log::warn!("Remote sync worker is not running; dropping update");
        }
    }

    /// Stops accepting commands and waits for the queued ones to finish.
    pub async fn drain(&self) {
        drop(self.tx.lock().unwrap_or_else(PoisonError::into_inner).take());

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                log::warn!("Remote sync worker ended abnormally: {}", err);
            }
        }
    }
}

async fn process(remote: &dyn RemoteSyncRepository, command: SyncCommand) -> AppResult<()> {
    match command {
        SyncCommand::LogXp {
            identity,
            amount,
            reason,
            meta,
        } => {
            let entry = XpLogEntry::new(&identity, amount, &reason, meta);
            remote.append_xp_log(entry).await?;
            remote.increment_xp_total(&identity, amount).await?;
            log::debug!("Mirrored {} XP ({}) for {}", amount, reason, identity.uid);
        }
        SyncCommand::RecordQuiz(record) => {
            let uid = record.uid.clone();
            remote.record_quiz_result(record).await?;
            log::debug!("Mirrored quiz result for {}", uid);
        }
        SyncCommand::Backfill {
            identity,
            local_total,
            reply,
        } => {
            let outcome = backfill(remote, &identity, local_total).await;
            let _ = reply.send(outcome.as_ref().copied().unwrap_or(0));
            outcome?;
        }
    }
    Ok(())
}

async fn backfill(
    remote: &dyn RemoteSyncRepository,
    identity: &SyncIdentity,
    local_total: u64,
) -> AppResult<u64> {
    let remote_total = remote.fetch_xp_total(&identity.uid).await?;
    let missing = local_total.saturating_sub(remote_total);
    if missing == 0 {
        return Ok(0);
    }

    log::info!(
        "Backfilling {} XP for {} (local {}, remote {})",
        missing,
        identity.uid,
        local_total,
        remote_total
    );
    let meta = json!({ "__silent": true, "source": "local-sync" });
    remote
        .append_xp_log(XpLogEntry::new(identity, missing, "backfill", meta))
        .await?;
    remote.increment_xp_total(identity, missing).await?;
    Ok(missing)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::errors::AppError;
    use crate::repositories::remote_sync_repository::MockRemoteSyncRepository;

    fn identity() -> SyncIdentity {
        SyncIdentity::new("uid-7", "Marie", Some("PL"))
    }

    #[tokio::test]
    async fn forwards_log_then_increment() {
        let mut remote = MockRemoteSyncRepository::new();
        let mut seq = mockall::Sequence::new();
        remote
            .expect_append_xp_log()
            .withf(|entry| entry.uid == "uid-7" && entry.xp == 40 && entry.reason == "quiz")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        remote
            .expect_increment_xp_total()
            .withf(|identity, amount| identity.uid == "uid-7" && *amount == 40)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let forwarder = SyncForwarder::spawn(Arc::new(remote));
        forwarder.forward(SyncCommand::LogXp {
            identity: identity(),
            amount: 40,
            reason: "quiz".to_string(),
            meta: serde_json::Value::Null,
        });
        forwarder.drain().await;
    }

    #[tokio::test]
    async fn failure_does_not_stop_the_worker() {
        let mut remote = MockRemoteSyncRepository::new();
        remote
            .expect_append_xp_log()
            .times(2)
            .returning(|entry| {
                if entry.xp == 1 {
                    Err(AppError::RemoteSyncFailure("offline".into()))
                } else {
                    Ok(())
                }
            });
        remote
            .expect_increment_xp_total()
            .withf(|_, amount| *amount == 2)
            .times(1)
            .returning(|_, _| Ok(()));

        let forwarder = SyncForwarder::spawn(Arc::new(remote));
        for amount in [1, 2] {
            forwarder.forward(SyncCommand::LogXp {
                identity: identity(),
                amount,
                reason: "quiz".to_string(),
                meta: serde_json::Value::Null,
            });
        }
        forwarder.drain().await;
    }

    #[tokio::test]
    async fn backfill_waits_for_queued_awards() {
        let total = Arc::new(AtomicU64::new(0));
        let mut remote = MockRemoteSyncRepository::new();
        remote.expect_append_xp_log().returning(|_| Ok(()));
        let added = Arc::clone(&total);
        remote
            .expect_increment_xp_total()
            .returning(move |_, amount| {
                added.fetch_add(amount, Ordering::SeqCst);
                Ok(())
            });
        let read = Arc::clone(&total);
        remote
            .expect_fetch_xp_total()
            .returning(move |_| Ok(read.load(Ordering::SeqCst)));

        let forwarder = SyncForwarder::spawn(Arc::new(remote));
        forwarder.forward(SyncCommand::LogXp {
            identity: identity(),
            amount: 100,
            reason: "quiz".to_string(),
            meta: serde_json::Value::Null,
        });
        let (reply, pushed) = oneshot::channel();
        forwarder.forward(SyncCommand::Backfill {
            identity: identity(),
            local_total: 130,
            reply,
        });

        assert_eq!(pushed.await.unwrap(), 30);
        forwarder.drain().await;
        assert_eq!(total.load(Ordering::SeqCst), 130);
    }

    #[tokio::test]
    async fn failed_backfill_replies_zero() {
        let mut remote = MockRemoteSyncRepository::new();
        remote
            .expect_fetch_xp_total()
            .returning(|_| Err(AppError::RemoteSyncFailure("offline".into())));

        let forwarder = SyncForwarder::spawn(Arc::new(remote));
        let (reply, pushed) = oneshot::channel();
        forwarder.forward(SyncCommand::Backfill {
            identity: identity(),
            local_total: 50,
            reply,
        });

        assert_eq!(pushed.await.unwrap(), 0);
        forwarder.drain().await;
    }

    #[tokio::test]
    async fn forward_after_drain_is_dropped() {
        let remote = MockRemoteSyncRepository::new();
        let forwarder = SyncForwarder::spawn(Arc::new(remote));
        forwarder.drain().await;

        // No expectations set: a call reaching the mock would panic.
        forwarder.forward(SyncCommand::LogXp {
            identity: identity(),
            amount: 5,
            reason: "quiz".to_string(),
            meta: serde_json::Value::Null,
        });
    }
}
