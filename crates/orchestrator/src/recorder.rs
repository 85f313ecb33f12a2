//! Background persistence of conversation turns.

use std::sync::{Arc, Mutex, MutexGuard};

use database::NewTurn;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::store::ChatStore;

/// Writes turns off the request path.
///
/// Failures are logged and never reach the caller. [`TurnRecorder::flush`]
/// waits for writes still in flight.
pub struct TurnRecorder {
    store: Arc<dyn ChatStore>,
    pending: Mutex<JoinSet<()>>,
}

impl TurnRecorder {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self {
            store,
            pending: Mutex::new(JoinSet::new()),
        }
    }

    /// Queue a turn for persistence. Must be called within a tokio runtime.
    pub fn record(&self, turn: NewTurn) {
        let store = Arc::clone(&self.store);
        let mut pending = self.lock();
        while pending.try_join_next().is_some() {}

        pending.spawn(async move {
            match store.append_turn(&turn).await {
                Ok(()) => debug!("Persisted {} turn for session {}", turn.role, turn.session_id),
                Err(e) => warn!(
                    "Persistence failure: {} turn for session {} dropped: {}",
                    turn.role, turn.session_id, e
                ),
            }
        });
    }

    /// Number of writes not yet reaped.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Wait for every queued write to finish.
    pub async fn flush(&self) {
        let mut tasks = std::mem::take(&mut *self.lock());
        let count = tasks.len();
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!("Turn write task failed: {}", e);
            }
        }
        if count > 0 {
            debug!("Flushed {} pending turn write(s)", count);
        }
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
