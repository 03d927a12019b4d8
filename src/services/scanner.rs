//! Generic scan session machinery shared by the movie and series
//! pipelines.
//!
//! A run owns an opaque session UUID. Starting a new run replaces the
//! active session, which is the cancellation primitive: a superseded loop
//! notices the mismatch at its next iteration boundary (bounded by the
//! inter-bundle delay) and aborts without touching the newer session's
//! state. In-flight item work for the current bundle is never interrupted,
//! only future bundles are skipped.

use crate::services::media::MediaError;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ScanError {
    /// The session was cancelled or superseded by a newer run. Logged as
    /// an informational abort at the `run()` level, never as an error.
    #[error("scan session superseded or cancelled")]
    Aborted,

    #[error(transparent)]
    Media(#[from] MediaError),
}

#[derive(Debug, Default)]
struct ScanState {
    running: bool,
    session_id: Option<Uuid>,
    progress: usize,
    total: usize,
    current_server: Option<String>,
    four_k_enabled: bool,
}

/// Read-only snapshot for the status API.
#[derive(Debug, Clone, Serialize)]
pub struct ScanStatus {
    pub name: &'static str,
    pub running: bool,
    pub progress: usize,
    pub total: usize,
    pub current_server: Option<String>,
}

pub struct ScanEngine {
    name: &'static str,
    state: Arc<RwLock<ScanState>>,
    bundle_size: usize,
    bundle_delay: Duration,
}

impl ScanEngine {
    #[must_use]
    pub fn new(name: &'static str, bundle_size: usize, bundle_delay: Duration) -> Self {
        Self {
            name,
            state: Arc::new(RwLock::new(ScanState::default())),
            bundle_size: bundle_size.max(1),
            bundle_delay,
        }
    }

    /// Begins a new session, silently superseding any run still in flight.
    /// `four_k_enabled` is derived from the configured server list and
    /// feeds the reconciler's 4k gate for the whole run.
    pub async fn start_run(&self, four_k_enabled: bool) -> Uuid {
        let session = Uuid::new_v4();
        let mut state = self.state.write().await;
        state.running = true;
        state.session_id = Some(session);
        state.progress = 0;
        state.total = 0;
        state.current_server = None;
        state.four_k_enabled = four_k_enabled;
        info!(scanner = self.name, session = %session, "Scan session started");
        session
    }

    /// Marks the server currently being walked and the item count for it.
    pub async fn begin_server(&self, session: Uuid, server: &str, total: usize) {
        let mut state = self.state.write().await;
        if state.session_id == Some(session) {
            state.current_server = Some(server.to_string());
            state.progress = 0;
            state.total = total;
        }
    }

    pub async fn four_k_enabled(&self) -> bool {
        self.state.read().await.four_k_enabled
    }

    async fn ensure_active(&self, session: Uuid) -> Result<(), ScanError> {
        let state = self.state.read().await;
        if !state.running || state.session_id != Some(session) {
            return Err(ScanError::Aborted);
        }
        Ok(())
    }

    /// Drives `items` through `process` one bundle at a time.
    ///
    /// The session is validated at every iteration boundary; each bundle's
    /// fan-out settles before the loop sleeps the inter-bundle delay.
    /// `process` handles per-item failures itself so one bad item cannot
    /// abort the pass.
    pub async fn run_bundles<T, F, Fut>(
        &self,
        session: Uuid,
        items: Vec<T>,
        mut process: F,
    ) -> Result<(), ScanError>
    where
        T: Clone,
        F: FnMut(Vec<T>) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut start = 0;
        while start < items.len() {
            self.ensure_active(session).await?;

            let end = (start + self.bundle_size).min(items.len());
            debug!(
                scanner = self.name,
                start,
                end,
                total = items.len(),
                "Processing bundle"
            );
            process(items[start..end].to_vec()).await;

            {
                let mut state = self.state.write().await;
                if state.session_id == Some(session) {
                    state.progress = end;
                }
            }

            start = end;
            if start < items.len() {
                tokio::time::sleep(self.bundle_delay).await;
            }
        }
        Ok(())
    }

    /// Flips back to idle if `session` is still the active one; a newer
    /// session owns the running flag and makes this a no-op.
    pub async fn end_run(&self, session: Uuid) {
        let mut state = self.state.write().await;
        if state.session_id == Some(session) {
            state.running = false;
            state.current_server = None;
            info!(scanner = self.name, session = %session, "Scan session ended");
        }
    }

    /// Cooperative cancel: the loop observes this at its next iteration.
    pub async fn cancel(&self) {
        let mut state = self.state.write().await;
        if state.running {
            state.running = false;
            info!(scanner = self.name, "Scan cancelled");
        }
    }

    pub async fn status(&self) -> ScanStatus {
        let state = self.state.read().await;
        ScanStatus {
            name: self.name,
            running: state.running,
            progress: state.progress,
            total: state.total,
            current_server: state.current_server.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engine(bundle_size: usize, delay_secs: u64) -> ScanEngine {
        ScanEngine::new("test", bundle_size, Duration::from_secs(delay_secs))
    }

    #[tokio::test(start_paused = true)]
    async fn bundles_cover_all_items_in_order() {
        let engine = engine(3, 1);
        let session = engine.start_run(false).await;

        let seen = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        engine
            .run_bundles(session, (0..8).collect(), move |bundle| {
                let seen = seen2.clone();
                async move {
                    seen.lock().await.push(bundle);
                }
            })
            .await
            .unwrap();

        let seen = seen.lock().await;
        assert_eq!(*seen, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7]]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_aborts_at_next_bundle_boundary() {
        let engine = Arc::new(engine(1, 2));
        let session = engine.start_run(false).await;

        let processed = Arc::new(AtomicUsize::new(0));
        let processed2 = processed.clone();
        let engine2 = engine.clone();
        let driver = tokio::spawn(async move {
            engine2
                .run_bundles(session, vec![1, 2, 3, 4], move |_| {
                    let processed = processed2.clone();
                    async move {
                        processed.fetch_add(1, Ordering::SeqCst);
                    }
                })
                .await
        });

        // Let the first bundle land, then cancel mid-delay.
        tokio::time::sleep(Duration::from_millis(100)).await;
        engine.cancel().await;

        let result = driver.await.unwrap();
        assert!(matches!(result, Err(ScanError::Aborted)));
        assert!(processed.load(Ordering::SeqCst) < 4);
    }

    #[tokio::test(start_paused = true)]
    async fn new_session_silently_supersedes_old_loop() {
        let engine = Arc::new(engine(1, 1));
        let first = engine.start_run(false).await;

        let engine2 = engine.clone();
        let driver = tokio::spawn(async move {
            engine2
                .run_bundles(first, vec![1, 2, 3, 4, 5], |_| async {})
                .await
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        let second = engine.start_run(true).await;

        // The old loop observes the session mismatch within one delay.
        let result = driver.await.unwrap();
        assert!(matches!(result, Err(ScanError::Aborted)));

        // Status reflects the second session only.
        assert!(engine.status().await.running);
        engine.end_run(first).await;
        assert!(engine.status().await.running, "stale end_run must be a no-op");
        engine.end_run(second).await;
        assert!(!engine.status().await.running);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_item_list_completes_immediately() {
        let engine = engine(20, 4);
        let session = engine.start_run(false).await;
        engine
            .run_bundles::<i32, _, _>(session, Vec::new(), |_| async {})
            .await
            .unwrap();
        engine.end_run(session).await;
        assert!(!engine.status().await.running);
    }
}
