use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use tokio::{runtime::Handle, task::JoinHandle, time};

/// Coalesces bursts of writes into one trailing flush.
///
/// Each `schedule` marks the state dirty and re-arms the delay, cancelling the pending flush.
/// The flush clears the dirty flag. Outside a tokio runtime the flush runs inline.
pub struct PersistScheduler {
    delay: Duration,
    dirty: Arc<AtomicBool>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl PersistScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            dirty: Arc::new(AtomicBool::new(false)),
            pending: Mutex::new(None),
        }
    }

    pub fn schedule<F>(&self, flush: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.dirty.store(true, Ordering::SeqCst);

        let Ok(runtime) = Handle::try_current() else {
            self.dirty.store(false, Ordering::SeqCst);
            flush();
            return;
        };

        let dirty = Arc::clone(&self.dirty);
        let delay = self.delay;
        let task = runtime.spawn(async move {
            time::sleep(delay).await;
            if dirty.swap(false, Ordering::SeqCst) {
                flush();
            }
        });

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.replace(task) {
            previous.abort();
        }
    }

    /// Cancels any pending flush and runs `flush` now if there is unsaved state.
    pub fn flush_now<F>(&self, flush: F)
    where
        F: FnOnce(),
    {
        if let Some(pending) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            pending.abort();
        }

        if self.dirty.swap(false, Ordering::SeqCst) {
            flush();
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }
}

impl Drop for PersistScheduler {
    fn drop(&mut self) {
        if let Some(pending) = self
            .pending
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            pending.abort();
        }
    }
}
