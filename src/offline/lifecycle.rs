//! Worker lifecycle: an explicit state machine for the install/activate flow
//! with its side effects (precache on install, bucket eviction and client
//! claiming on activate).

use std::sync::Mutex;

use thiserror::Error;
use tracing::info;

use super::cache::{FetchError, OfflineCache};

/// Phases a worker moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Precaching the asset manifest.
    Installing,
    /// Precache done; waiting to activate.
    Installed,
    /// Evicting stale buckets.
    Activating,
    /// In control of all clients.
    Active,
}

/// Events driving the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerEvent {
    /// Precache finished.
    InstallCompleted,
    /// Activation began.
    ActivationStarted,
    /// Stale buckets evicted, clients claimed.
    ActivationCompleted,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the lifecycle was in when the invalid event was received.
    pub from: WorkerPhase,
    /// The event that cannot be applied from this phase.
    pub event: WorkerEvent,
}

/// The lifecycle state machine itself, side-effect free.
#[derive(Debug, Clone)]
pub struct WorkerLifecycle {
    phase: WorkerPhase,
}

impl Default for WorkerLifecycle {
    fn default() -> Self {
        Self {
            phase: WorkerPhase::Installing,
        }
    }
}

impl WorkerLifecycle {
    /// A lifecycle starting in the installing phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> WorkerPhase {
        self.phase
    }

    /// Apply an event, returning the next phase.
    pub fn apply(&mut self, event: WorkerEvent) -> Result<WorkerPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (WorkerPhase::Installing, WorkerEvent::InstallCompleted) => WorkerPhase::Installed,
            (WorkerPhase::Installed, WorkerEvent::ActivationStarted) => WorkerPhase::Activating,
            (WorkerPhase::Activating, WorkerEvent::ActivationCompleted) => WorkerPhase::Active,
            (from, event) => return Err(InvalidTransition { from, event }),
        };
        self.phase = next;
        Ok(next)
    }
}

/// Failures while driving the lifecycle.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Precache or fetch failure.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Lifecycle event applied out of order.
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

/// Drives one worker: owns the cache engine and its lifecycle, applying the
/// side effects each transition requires.
pub struct WorkerHost {
    cache: OfflineCache,
    manifest: Vec<String>,
    lifecycle: Mutex<WorkerLifecycle>,
    claimed: Mutex<bool>,
}

impl WorkerHost {
    /// Create a host for a cache engine and its precache manifest.
    pub fn new(cache: OfflineCache, manifest: Vec<String>) -> Self {
        Self {
            cache,
            manifest,
            lifecycle: Mutex::new(WorkerLifecycle::new()),
            claimed: Mutex::new(false),
        }
    }

    /// The cache engine this worker controls.
    pub fn cache(&self) -> &OfflineCache {
        &self.cache
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> WorkerPhase {
        self.lifecycle.lock().expect("lifecycle lock poisoned").phase()
    }

    /// Whether the worker has claimed its clients.
    pub fn is_claimed(&self) -> bool {
        *self.claimed.lock().expect("claimed lock poisoned")
    }

    /// Install: precache the manifest, then advance to installed.
    pub async fn install(&self) -> Result<(), WorkerError> {
        self.cache.precache(&self.manifest).await?;
        self.lifecycle
            .lock()
            .expect("lifecycle lock poisoned")
            .apply(WorkerEvent::InstallCompleted)?;
        info!(bucket = %self.cache.static_bucket(), "worker installed");
        Ok(())
    }

    /// Activate: evict every bucket from older builds, claim clients
    /// immediately, and advance to active. Returns the evicted bucket names.
    pub async fn activate(&self) -> Result<Vec<String>, WorkerError> {
        {
            let mut lifecycle = self.lifecycle.lock().expect("lifecycle lock poisoned");
            lifecycle.apply(WorkerEvent::ActivationStarted)?;
        }

        let purged = self.cache.purge_stale_buckets();

        {
            let mut lifecycle = self.lifecycle.lock().expect("lifecycle lock poisoned");
            lifecycle.apply(WorkerEvent::ActivationCompleted)?;
        }
        *self.claimed.lock().expect("claimed lock poisoned") = true;
        info!(purged = purged.len(), "worker active and clients claimed");
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::cache::testing::MapFetcher;
    use crate::offline::cache::{RUNTIME_BUCKET, StoredResponse, static_bucket_name};

    const SHELL: &str = "https://app.example.test/index.html";

    fn host(version: &str) -> WorkerHost {
        let fetcher = MapFetcher::new(&[(SHELL, "<html>shell</html>")]);
        let cache = OfflineCache::new(version, fetcher, None, None);
        WorkerHost::new(cache, vec![SHELL.to_string()])
    }

    #[test]
    fn lifecycle_happy_path() {
        let mut lifecycle = WorkerLifecycle::new();
        assert_eq!(lifecycle.phase(), WorkerPhase::Installing);
        assert_eq!(
            lifecycle.apply(WorkerEvent::InstallCompleted).unwrap(),
            WorkerPhase::Installed
        );
        assert_eq!(
            lifecycle.apply(WorkerEvent::ActivationStarted).unwrap(),
            WorkerPhase::Activating
        );
        assert_eq!(
            lifecycle.apply(WorkerEvent::ActivationCompleted).unwrap(),
            WorkerPhase::Active
        );
    }

    #[test]
    fn out_of_order_events_are_rejected() {
        let mut lifecycle = WorkerLifecycle::new();
        let err = lifecycle.apply(WorkerEvent::ActivationStarted).unwrap_err();
        assert_eq!(err.from, WorkerPhase::Installing);
        assert_eq!(err.event, WorkerEvent::ActivationStarted);

        lifecycle.apply(WorkerEvent::InstallCompleted).unwrap();
        let err = lifecycle
            .apply(WorkerEvent::ActivationCompleted)
            .unwrap_err();
        assert_eq!(err.from, WorkerPhase::Installed);
    }

    #[tokio::test]
    async fn install_precaches_the_manifest() {
        let host = host("2.0.0");
        host.install().await.unwrap();

        assert_eq!(host.phase(), WorkerPhase::Installed);
        let cached = host
            .cache()
            .peek(&static_bucket_name("2.0.0"), SHELL)
            .unwrap();
        assert_eq!(cached.body, b"<html>shell</html>");
    }

    #[tokio::test]
    async fn activation_purges_older_builds_and_claims() {
        let host = host("2.0.0");
        // A bucket left behind by a previous deploy.
        host.cache().seed(
            &static_bucket_name("1.9.0"),
            SHELL,
            StoredResponse::ok("text/html", b"old".to_vec()),
        );

        host.install().await.unwrap();
        let purged = host.activate().await.unwrap();

        assert_eq!(purged, vec![static_bucket_name("1.9.0")]);
        assert_eq!(host.phase(), WorkerPhase::Active);
        assert!(host.is_claimed());

        let names = host.cache().bucket_names();
        assert!(names.contains(&static_bucket_name("2.0.0")));
        assert!(names.contains(&RUNTIME_BUCKET.to_string()));
        assert!(!names.contains(&static_bucket_name("1.9.0")));
    }

    #[tokio::test]
    async fn double_activation_fails_cleanly() {
        let host = host("2.0.0");
        host.install().await.unwrap();
        host.activate().await.unwrap();

        let err = host.activate().await.unwrap_err();
        assert!(matches!(err, WorkerError::Transition(_)));
    }
}
