//! The background task that keeps a [`Store`] subscribed to a [`PatchSource`].

use std::{sync::Arc, time::Duration};

use futures_util::StreamExt as _;
use startos_client_core::patch::SequenceId;
use tokio::{sync::watch, task::JoinHandle, time::Instant};
use tracing::{debug, info, info_span, trace, warn, Instrument as _};

use crate::{
    source::{PatchSource, PatchStream, SyncError},
    store::Store,
    sync::{PatchOutcome, ResyncReason, SyncConfig, Synchronizer},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Connecting,
    /// The store is current up to `sequence`.
    Live { sequence: SequenceId },
    Resyncing { reason: ResyncReason },
    /// The subscription was lost. `retry_in` is `None` when the driver gave up,
    /// which happens when the session is not authorized.
    Disconnected {
        error: SyncError,
        retry_in: Option<Duration>,
    },
}

/// Owns the synchronizer task. Dropping the handle stops it; the store and its
/// watchers stay usable, they just stop receiving updates.
pub struct SyncHandle {
    status: watch::Receiver<SyncStatus>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn status_changes(&self) -> watch::Receiver<SyncStatus> {
        self.status.clone()
    }

    /// Wait until the store has loaded a snapshot. Returns `Err` with the last
    /// error if the driver gave up first.
    pub async fn live(&self) -> Result<SequenceId, SyncError> {
        let mut status = self.status.clone();
        let r = status
            .wait_for(|s| {
                matches!(
                    s,
                    SyncStatus::Live { .. } | SyncStatus::Disconnected { retry_in: None, .. }
                )
            })
            .await;
        match r.as_deref() {
            Ok(SyncStatus::Live { sequence }) => Ok(*sequence),
            Ok(SyncStatus::Disconnected { error, .. }) => Err(error.clone()),
            _ => Err(SyncError::StreamClosed),
        }
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start keeping `store` in sync with `source`.
///
/// Every subscription starts from a fresh snapshot, including the ones after a
/// resync or a lost connection. Watchers registered on the store are kept
/// across all of them.
pub fn spawn(store: Arc<Store>, source: Arc<dyn PatchSource>, config: SyncConfig) -> SyncHandle {
    let (status_tx, status) = watch::channel(SyncStatus::Connecting);
    let synchronizer = Synchronizer::new(store, config);
    let task = tokio::spawn(
        run(synchronizer, source, status_tx).instrument(info_span!("Synchronizing database")),
    );
    SyncHandle { status, task }
}

enum Interruption {
    Resync(ResyncReason),
    Lost(SyncError),
}

async fn run(
    mut sync: Synchronizer,
    source: Arc<dyn PatchSource>,
    status: watch::Sender<SyncStatus>,
) {
    let initial_backoff = sync.config().reconnect_initial_backoff;
    let mut backoff = initial_backoff;
    // Resyncs in a row that applied no patch, and the wait before the next one
    let mut stalled_resyncs = 0u32;
    let mut resync_backoff = initial_backoff;
    loop {
        status.send_replace(SyncStatus::Connecting);
        let error = match source.subscribe(None).await {
            Ok(subscription) => {
                let sequence = subscription.snapshot.sequence_id;
                sync.load_snapshot(subscription.snapshot);
                info!(sequence, "database snapshot loaded");
                status.send_replace(SyncStatus::Live { sequence });
                backoff = initial_backoff;
                let (interruption, progressed) =
                    follow(&mut sync, subscription.patches, &status).await;
                if progressed {
                    stalled_resyncs = 0;
                    resync_backoff = initial_backoff;
                }
                match interruption {
                    Interruption::Resync(reason) => {
                        status.send_replace(SyncStatus::Resyncing { reason });
                        stalled_resyncs += 1;
                        if stalled_resyncs > 1 {
                            warn!(
                                attempts = stalled_resyncs,
                                retry_in = ?resync_backoff,
                                "resyncing repeatedly without progress"
                            );
                            tokio::time::sleep(resync_backoff).await;
                            resync_backoff =
                                (resync_backoff * 2).min(sync.config().reconnect_max_backoff);
                        }
                        continue;
                    }
                    Interruption::Lost(error) => error,
                }
            }
            Err(error) => error,
        };

        if error == SyncError::Unauthorized {
            warn!(%error, "giving up on the database subscription");
            status.send_replace(SyncStatus::Disconnected {
                error,
                retry_in: None,
            });
            return;
        }
        warn!(%error, retry_in = ?backoff, "database subscription lost");
        status.send_replace(SyncStatus::Disconnected {
            error,
            retry_in: Some(backoff),
        });
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(sync.config().reconnect_max_backoff);
    }
}

/// Apply patches until the subscription cannot continue. Also returns whether
/// any patch was applied.
async fn follow(
    sync: &mut Synchronizer,
    mut patches: PatchStream,
    status: &watch::Sender<SyncStatus>,
) -> (Interruption, bool) {
    let mut progressed = false;
    let interruption = loop {
        let deadline = sync.gap_deadline();
        tokio::select! {
            message = patches.next() => {
                let message = match message {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => break Interruption::Lost(e),
                    None => break Interruption::Lost(SyncError::StreamClosed),
                };
                match sync.handle_message(message, Instant::now()) {
                    PatchOutcome::Applied { last_applied, count } => {
                        trace!(last_applied, count, "applied patches");
                        progressed = true;
                        status.send_replace(SyncStatus::Live { sequence: last_applied });
                    }
                    PatchOutcome::Buffered { missing } => {
                        debug!(missing, buffered = sync.pending_len(), "waiting for missing patch");
                    }
                    PatchOutcome::Duplicate => trace!("ignoring duplicate patch"),
                    PatchOutcome::Resync(reason) => break Interruption::Resync(reason),
                }
            }
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(far_future)), if deadline.is_some() => {
                if let Some(reason) = sync.check_gap(Instant::now()) {
                    break Interruption::Resync(reason);
                }
            }
        }
    };
    (interruption, progressed)
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86400)
}
