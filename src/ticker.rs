use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error};
use uuid::Uuid;

use crate::session::{QuizEngine, TickOutcome};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Background countdown bound to one attempt.
///
/// The task only ticks while its attempt is the engine's active one, so a
/// ticker left over from an abandoned attempt can never touch a newer session.
/// Dropping the ticker aborts the task.
pub struct Ticker {
    attempt_id: Uuid,
    handle: Option<JoinHandle<TickOutcome>>,
}

impl Ticker {
    pub fn spawn(engine: Arc<Mutex<QuizEngine>>, attempt_id: Uuid, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick fires immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                let result = engine.lock().await.tick_attempt(attempt_id).await;
                match result {
                    Ok(TickOutcome::Running { .. }) => {}
                    Ok(outcome) => {
                        debug!(attempt_id = %attempt_id, outcome = ?outcome, "Ticker stopped");
                        return outcome;
                    }
                    Err(e) => {
                        // The engine keeps the attempt active; try again next second
                        error!(attempt_id = %attempt_id, error = %e, "Tick failed");
                    }
                }
            }
        });

        Self {
            attempt_id,
            handle: Some(handle),
        }
    }

    /// Start a countdown for whichever attempt is active, if any
    pub async fn for_active(engine: Arc<Mutex<QuizEngine>>) -> Option<Self> {
        let attempt_id = engine.lock().await.active_session()?.attempt_id();
        Some(Self::spawn(engine, attempt_id, TICK_PERIOD))
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn cancel(&self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the countdown to stop; `None` if it was cancelled
    pub async fn join(mut self) -> Option<TickOutcome> {
        let handle = self.handle.take()?;
        handle.await.ok()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancel();
    }
}
