//! Expiry reaper scheduler
//!
//! Long-lived background task that periodically removes expired
//! memberships. Each tick is independent: a failed tick is logged and the
//! next one proceeds normally. The reap itself is idempotent, so no jitter
//! or coordination is needed.

use std::sync::Arc;
use std::time::Duration;

use segmentify_core::MembershipReaper;
use segmentify_domain::ReaperConfig;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::error::{SchedulerError, SchedulerResult};

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Periodic scheduler around a `MembershipReaper` store
pub struct ExpiryReaper {
    store: Arc<dyn MembershipReaper>,
    config: ReaperConfig,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl ExpiryReaper {
    /// Create a new reaper over the given store
    pub fn new(store: Arc<dyn MembershipReaper>, config: ReaperConfig) -> Self {
        Self {
            store,
            config,
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the background loop
    ///
    /// # Errors
    /// Returns an error if the reaper is already running.
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        // Fresh token so the reaper can be restarted after stop
        self.cancellation_token = CancellationToken::new();

        let store = Arc::clone(&self.store);
        let interval = self.config.interval;
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::reap_loop(store, interval, cancel).await;
        });

        *self.task_handle.lock().await = Some(handle);

        info!(interval_secs = self.config.interval.as_secs(), "expiry reaper started");
        Ok(())
    }

    /// Stop the background loop, joining the task with a bounded timeout
    ///
    /// # Errors
    /// Returns an error if the reaper is not running or the task does not
    /// finish in time.
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            let join_timeout = Duration::from_secs(5);
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })??;
        }

        info!("expiry reaper stopped");
        Ok(())
    }

    /// Whether the background task is alive
    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|handle| !handle.is_finished()))
            .unwrap_or(false)
    }

    async fn reap_loop(
        store: Arc<dyn MembershipReaper>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("reap loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    match store.reap_expired_memberships().await {
                        Ok(0) => debug!("no expired memberships"),
                        Ok(removed) => info!(removed, "expired memberships removed"),
                        Err(err) => error!(error = %err, "failed to reap expired memberships"),
                    }
                }
            }
        }
    }
}

/// Ensure the background task is cancelled when dropped
impl Drop for ExpiryReaper {
    fn drop(&mut self) {
        if !self.cancellation_token.is_cancelled() {
            self.cancellation_token.cancel();
        }
    }
}
