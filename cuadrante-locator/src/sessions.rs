//! Last-request-wins viewport sessions
//!
//! A map client fires a query every time the viewport settles. Queries are
//! keyed by a caller-chosen session id; starting a new one cancels the
//! previous one for the same session:
//!
//! 1. Register the query's generation and `CancellationToken`, cancelling the
//!    previous token for the session
//! 2. Wait out the debounce window (rapid pans cancel here, before any I/O)
//! 3. Run the work, dropping it mid-flight on cancellation
//! 4. A result that completes after being superseded is discarded

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Result of a session-scoped query
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome<T> {
    Completed(T),
    /// A newer query for the same session arrived first
    Superseded,
}

pub struct ViewportSessions {
    debounce: Duration,
    active: Mutex<HashMap<String, (u64, CancellationToken)>>,
    next_generation: AtomicU64,
}

impl ViewportSessions {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            active: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Sessions with a query in flight
    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }

    /// Run `work` as the latest query of `session`
    pub async fn run<F, Fut, T>(&self, session: &str, work: F) -> SessionOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();

        {
            let mut active = self.active.lock().await;
            if let Some((previous, previous_token)) =
                active.insert(session.to_string(), (generation, token.clone()))
            {
                debug!(session, previous, generation, "Superseding in-flight query");
                previous_token.cancel();
            }
        }

        let debounce = self.debounce;
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => SessionOutcome::Superseded,
            value = async move {
                tokio::time::sleep(debounce).await;
                work().await
            } => {
                if token.is_cancelled() {
                    SessionOutcome::Superseded
                } else {
                    SessionOutcome::Completed(value)
                }
            }
        };

        let mut active = self.active.lock().await;
        if active.get(session).is_some_and(|(g, _)| *g == generation) {
            active.remove(session);
        }
        if matches!(outcome, SessionOutcome::Superseded) {
            debug!(session, generation, "Query superseded, result dropped");
        }
        outcome
    }
}
