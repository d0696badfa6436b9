//! Debounced, serialized synchronization of local edits to the remote API.
//!
//! One worker task per team collapses rapid edits into a single save, keeps
//! at most one save in flight per sheet, retries transport failures with
//! exponential backoff, and surfaces conflicts instead of retrying them.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use tokio::sync::{Mutex, Notify, watch};
use tokio::time::{Instant, sleep, sleep_until};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, warn};

use crate::client::api::{ClientError, SaveTeamCall, SyncTransport};
use crate::client::store::LocalStore;
use crate::dao::models::TeamDocumentEntity;

/// Quiet window after the last edit before a save fires.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1_500);
/// Bounded attempts per save; only transport failures are retried.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Observable state of a team's sync lane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// Nothing queued.
    Idle,
    /// Edit saved locally, sync pending.
    Saved,
    /// Save in flight.
    Syncing,
    /// Last edit confirmed by the server.
    Synced,
    /// Server moved ahead; the edit is retained for reconciliation and will
    /// not be retried automatically.
    Conflict {
        /// The server's current timestamp.
        server_last_modified: u64,
    },
    /// Token rejected; the edit is retained and the stored token dropped.
    AuthExpired,
    /// Retries exhausted; the edit is retained until an explicit retry.
    Failed,
}

#[derive(Debug, Clone)]
struct PendingEdit {
    document: TeamDocumentEntity,
    revision: u64,
}

struct TeamLane {
    team_id: String,
    sheet_name: String,
    pending: Mutex<Option<PendingEdit>>,
    deadline: Mutex<Instant>,
    in_flight: Mutex<()>,
    revision: AtomicU64,
    wake: Notify,
    status: watch::Sender<SyncStatus>,
}

struct SchedulerInner {
    transport: Arc<dyn SyncTransport>,
    store: Arc<LocalStore>,
    debounce: Duration,
    max_attempts: u32,
    lanes: DashMap<String, Arc<TeamLane>>,
}

/// Per-session scheduler owning every team's sync lane.
#[derive(Clone)]
pub struct SyncScheduler {
    inner: Arc<SchedulerInner>,
}

impl SyncScheduler {
    /// Create a scheduler with the given debounce window and attempt bound.
    pub fn new(
        transport: Arc<dyn SyncTransport>,
        store: Arc<LocalStore>,
        debounce: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                transport,
                store,
                debounce,
                max_attempts,
                lanes: DashMap::new(),
            }),
        }
    }

    /// Queue a local edit for synchronization. Replaces any edit already
    /// queued for the team (last edit wins locally) and resets the debounce
    /// window.
    pub async fn queue_edit(
        &self,
        team_id: &str,
        sheet_name: &str,
        document: TeamDocumentEntity,
    ) {
        let lane = self.lane(team_id, sheet_name);
        let revision = lane.revision.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut pending = lane.pending.lock().await;
            *pending = Some(PendingEdit { document, revision });
        }
        {
            let mut deadline = lane.deadline.lock().await;
            *deadline = Instant::now() + self.inner.debounce;
        }
        let _ = lane.status.send(SyncStatus::Saved);
        lane.wake.notify_one();
    }

    /// Trigger an immediate sync attempt for a team, skipping the remaining
    /// debounce window. Also the explicit retry path for failed-pending
    /// edits.
    pub async fn flush(&self, team_id: &str) {
        if let Some(lane) = self.inner.lanes.get(team_id) {
            let mut deadline = lane.deadline.lock().await;
            *deadline = Instant::now();
            drop(deadline);
            lane.wake.notify_one();
        }
    }

    /// Whether an unconfirmed edit is queued for the team.
    pub async fn has_pending(&self, team_id: &str) -> bool {
        match self.inner.lanes.get(team_id) {
            Some(lane) => lane.pending.lock().await.is_some(),
            None => false,
        }
    }

    /// The retained pending edit, for conflict reconciliation UIs.
    pub async fn pending_document(&self, team_id: &str) -> Option<TeamDocumentEntity> {
        let lane = self.inner.lanes.get(team_id)?;
        let pending = lane.pending.lock().await;
        pending.as_ref().map(|edit| edit.document.clone())
    }

    /// Watch a team's sync status.
    pub fn status(&self, team_id: &str) -> watch::Receiver<SyncStatus> {
        match self.inner.lanes.get(team_id) {
            Some(lane) => lane.status.subscribe(),
            None => watch::channel(SyncStatus::Idle).0.subscribe(),
        }
    }

    /// Stream of status changes, for indicator UIs.
    pub fn status_stream(&self, team_id: &str) -> WatchStream<SyncStatus> {
        WatchStream::new(self.status(team_id))
    }

    fn lane(&self, team_id: &str, sheet_name: &str) -> Arc<TeamLane> {
        use dashmap::mapref::entry::Entry;

        match self.inner.lanes.entry(team_id.to_string()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(slot) => {
                let (status_tx, _) = watch::channel(SyncStatus::Idle);
                let lane = Arc::new(TeamLane {
                    team_id: team_id.to_string(),
                    sheet_name: sheet_name.to_string(),
                    pending: Mutex::new(None),
                    deadline: Mutex::new(Instant::now()),
                    in_flight: Mutex::new(()),
                    revision: AtomicU64::new(0),
                    wake: Notify::new(),
                    status: status_tx,
                });
                slot.insert(lane.clone());
                tokio::spawn(run_lane(self.inner.clone(), lane.clone()));
                lane
            }
        }
    }
}

/// Worker loop for one team: debounce, send, settle.
async fn run_lane(inner: Arc<SchedulerInner>, lane: Arc<TeamLane>) {
    loop {
        lane.wake.notified().await;

        'drain: loop {
            // Debounce: wait until the deadline stops moving.
            loop {
                let deadline = *lane.deadline.lock().await;
                if Instant::now() >= deadline {
                    break;
                }
                tokio::select! {
                    _ = sleep_until(deadline) => {}
                    _ = lane.wake.notified() => {}
                }
            }

            let Some(edit) = lane.pending.lock().await.clone() else {
                break 'drain;
            };

            let call = SaveTeamCall {
                sheet_name: lane.sheet_name.clone(),
                document: edit.document.clone(),
                client_last_modified: inner.store.last_modified_of(&lane.team_id),
                pin_token: inner.store.pin_token(&lane.team_id),
            };

            let flight = lane.in_flight.lock().await;
            let _ = lane.status.send(SyncStatus::Syncing);
            let result = save_with_retry(&inner, &lane, call).await;
            drop(flight);

            match result {
                Ok(last_modified) => {
                    inner.store.set_last_modified(&lane.team_id, last_modified);
                    let mut pending = lane.pending.lock().await;
                    if pending
                        .as_ref()
                        .is_some_and(|current| current.revision == edit.revision)
                    {
                        *pending = None;
                        let _ = lane.status.send(SyncStatus::Synced);
                        break 'drain;
                    }
                    // A newer edit arrived mid-flight: it becomes the next
                    // save, using the freshest snapshot.
                    let _ = lane.status.send(SyncStatus::Saved);
                }
                Err(ClientError::Stale {
                    server_last_modified,
                    ..
                }) => {
                    // The edit stays queued for reconciliation; the cached
                    // copy is dropped so the next load refetches.
                    inner.store.invalidate_team(&lane.team_id);
                    let _ = lane.status.send(SyncStatus::Conflict {
                        server_last_modified,
                    });
                    break 'drain;
                }
                Err(ClientError::AuthRequired) => {
                    inner.store.remove_pin_token(&lane.team_id);
                    let _ = lane.status.send(SyncStatus::AuthExpired);
                    break 'drain;
                }
                Err(err) => {
                    warn!(team = %lane.team_id, error = %err, "sync failed; edit retained");
                    let _ = lane.status.send(SyncStatus::Failed);
                    break 'drain;
                }
            }
        }
    }
}

async fn save_with_retry(
    inner: &SchedulerInner,
    lane: &TeamLane,
    call: SaveTeamCall,
) -> Result<u64, ClientError> {
    let mut attempt = 1;
    loop {
        match inner.transport.save_team(call.clone()).await {
            Ok(last_modified) => return Ok(last_modified),
            Err(err) if err.is_retryable() && attempt < inner.max_attempts => {
                // 3 s, 9 s, 27 s plus jitter so reconnecting clients spread out.
                let backoff = Duration::from_secs(3u64.pow(attempt));
                let jitter = Duration::from_millis(rand::rng().random_range(0..500));
                debug!(
                    team = %lane.team_id,
                    attempt,
                    backoff_secs = backoff.as_secs(),
                    "save attempt failed; backing off"
                );
                sleep(backoff + jitter).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicUsize;

    struct MockInner {
        calls: StdMutex<Vec<SaveTeamCall>>,
        responses: StdMutex<Vec<Result<u64, ClientError>>>,
        active: AtomicUsize,
        max_active: AtomicUsize,
        delay: Option<Duration>,
    }

    struct MockTransport {
        inner: Arc<MockInner>,
    }

    impl MockTransport {
        fn scripted(responses: Vec<Result<u64, ClientError>>) -> Arc<Self> {
            Arc::new(Self {
                inner: Arc::new(MockInner {
                    calls: StdMutex::new(Vec::new()),
                    responses: StdMutex::new(responses),
                    active: AtomicUsize::new(0),
                    max_active: AtomicUsize::new(0),
                    delay: None,
                }),
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                inner: Arc::new(MockInner {
                    calls: StdMutex::new(Vec::new()),
                    responses: StdMutex::new(Vec::new()),
                    active: AtomicUsize::new(0),
                    max_active: AtomicUsize::new(0),
                    delay: Some(delay),
                }),
            })
        }

        fn call_count(&self) -> usize {
            self.inner.calls.lock().unwrap().len()
        }

        fn last_call(&self) -> SaveTeamCall {
            self.inner.calls.lock().unwrap().last().unwrap().clone()
        }

        fn max_active(&self) -> usize {
            self.inner.max_active.load(Ordering::SeqCst)
        }
    }

    impl SyncTransport for MockTransport {
        fn save_team(&self, call: SaveTeamCall) -> BoxFuture<'static, Result<u64, ClientError>> {
            let inner = self.inner.clone();
            Box::pin(async move {
                inner.calls.lock().unwrap().push(call);
                let response = {
                    let mut responses = inner.responses.lock().unwrap();
                    if responses.is_empty() {
                        Ok(1)
                    } else {
                        responses.remove(0)
                    }
                };
                let active = inner.active.fetch_add(1, Ordering::SeqCst) + 1;
                inner.max_active.fetch_max(active, Ordering::SeqCst);
                if let Some(delay) = inner.delay {
                    sleep(delay).await;
                }
                inner.active.fetch_sub(1, Ordering::SeqCst);
                response
            })
        }
    }

    fn document(tag: &str) -> TeamDocumentEntity {
        let mut doc = TeamDocumentEntity::default();
        doc.games.push(crate::dao::models::GameEntity {
            id: tag.into(),
            opponent: "Sparks".into(),
            date: "2026-03-07".into(),
            round: None,
            team_score: None,
            opponent_score: None,
            completed: false,
            lineup: Default::default(),
        });
        doc
    }

    fn scheduler(transport: Arc<MockTransport>) -> (tempfile::TempDir, SyncScheduler) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalStore::open(dir.path().join("store.json")));
        let scheduler = SyncScheduler::new(transport, store, DEFAULT_DEBOUNCE, 3);
        (dir, scheduler)
    }

    async fn wait_for(scheduler: &SyncScheduler, team: &str, expected: SyncStatus) {
        let mut status = scheduler.status(team);
        status
            .wait_for(|current| *current == expected)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_collapse_into_one_save_with_last_content() {
        let transport = MockTransport::scripted(vec![Ok(10)]);
        let (_dir, scheduler) = scheduler(transport.clone());

        for tag in ["edit-1", "edit-2", "edit-3"] {
            scheduler.queue_edit("team_1", "sheet_1", document(tag)).await;
        }

        wait_for(&scheduler, "team_1", SyncStatus::Synced).await;
        assert_eq!(transport.call_count(), 1);
        assert_eq!(transport.last_call().document.games[0].id, "edit-3");
        assert!(!scheduler.has_pending("team_1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn edit_during_flight_is_queued_not_fired_concurrently() {
        let transport = MockTransport::slow(Duration::from_secs(5));
        let (_dir, scheduler) = scheduler(transport.clone());

        scheduler
            .queue_edit("team_1", "sheet_1", document("first"))
            .await;
        // Let the debounce fire and the first save start.
        sleep(Duration::from_secs(2)).await;
        assert_eq!(transport.call_count(), 1);

        scheduler
            .queue_edit("team_1", "sheet_1", document("second"))
            .await;

        wait_for(&scheduler, "team_1", SyncStatus::Synced).await;
        assert_eq!(transport.call_count(), 2);
        assert_eq!(transport.last_call().document.games[0].id, "second");
        assert_eq!(transport.max_active(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_conflict_is_surfaced_not_retried() {
        let transport = MockTransport::scripted(vec![Err(ClientError::Stale {
            server_last_modified: 150,
            snapshot: None,
        })]);
        let (_dir, scheduler) = scheduler(transport.clone());

        scheduler
            .queue_edit("team_1", "sheet_1", document("conflicted"))
            .await;
        wait_for(
            &scheduler,
            "team_1",
            SyncStatus::Conflict {
                server_last_modified: 150,
            },
        )
        .await;

        assert_eq!(transport.call_count(), 1);
        // The edit is preserved for reconciliation.
        assert!(scheduler.has_pending("team_1").await);
        assert_eq!(
            scheduler
                .pending_document("team_1")
                .await
                .unwrap()
                .games[0]
                .id,
            "conflicted"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn network_failures_retry_with_backoff_then_succeed() {
        let transport = MockTransport::scripted(vec![
            Err(ClientError::Network {
                message: "offline".into(),
            }),
            Err(ClientError::Network {
                message: "offline".into(),
            }),
            Ok(20),
        ]);
        let (_dir, scheduler) = scheduler(transport.clone());

        scheduler
            .queue_edit("team_1", "sheet_1", document("retried"))
            .await;
        wait_for(&scheduler, "team_1", SyncStatus::Synced).await;
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_leave_edit_failed_pending_until_flush() {
        let transport = MockTransport::scripted(vec![
            Err(ClientError::Network {
                message: "offline".into(),
            }),
            Err(ClientError::Network {
                message: "offline".into(),
            }),
            Err(ClientError::Network {
                message: "offline".into(),
            }),
            Ok(30),
        ]);
        let (_dir, scheduler) = scheduler(transport.clone());

        scheduler
            .queue_edit("team_1", "sheet_1", document("patient"))
            .await;
        wait_for(&scheduler, "team_1", SyncStatus::Failed).await;
        assert_eq!(transport.call_count(), 3);
        assert!(scheduler.has_pending("team_1").await);

        // Explicit retry (connectivity restored).
        scheduler.flush("team_1").await;
        wait_for(&scheduler, "team_1", SyncStatus::Synced).await;
        assert_eq!(transport.call_count(), 4);
        assert!(!scheduler.has_pending("team_1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_rejection_drops_stored_token() {
        let transport = MockTransport::scripted(vec![Err(ClientError::AuthRequired)]);
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalStore::open(dir.path().join("store.json")));
        store.set_pin_token("team_1", "expired".into());
        let scheduler =
            SyncScheduler::new(transport.clone(), store.clone(), DEFAULT_DEBOUNCE, 3);

        scheduler
            .queue_edit("team_1", "sheet_1", document("denied"))
            .await;
        wait_for(&scheduler, "team_1", SyncStatus::AuthExpired).await;

        assert_eq!(transport.last_call().pin_token.as_deref(), Some("expired"));
        assert!(store.pin_token("team_1").is_none());
        assert!(scheduler.has_pending("team_1").await);
    }
}
