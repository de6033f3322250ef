use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::{sync::oneshot, task::JoinHandle, time};

use crate::models::domain::QuizResult;
use crate::services::quiz_session::{QuizSession, SessionPhase};

pub type SharedSession = Arc<Mutex<QuizSession>>;

/// Drives a session's countdown once per second. Dropping the timer stops it.
pub struct QuizTimer {
    handle: JoinHandle<()>,
}

impl QuizTimer {
    /// The receiver resolves with the result only if the clock runs out. If the learner
    /// submits first, the timer stops on its next tick and the sender is dropped.
    pub fn start(session: SharedSession) -> (Self, oneshot::Receiver<QuizResult>) {
        Self::start_with_period(session, Duration::from_secs(1))
    }

    fn start_with_period(
        session: SharedSession,
        period: Duration,
    ) -> (Self, oneshot::Receiver<QuizResult>) {
        let (tx, rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(period);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                interval.tick().await;

                let outcome = {
                    let mut guard = session.lock().unwrap_or_else(PoisonError::into_inner);
                    if guard.phase() != SessionPhase::InProgress {
                        break;
                    }
                    guard.tick()
                };

                match outcome {
                    Ok(Some(result)) => {
                        let _ = tx.send(result);
                        break;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        log::warn!("Quiz timer stopped: {}", err);
                        break;
                    }
                }
            }
        });

        (Self { handle }, rx)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for QuizTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
