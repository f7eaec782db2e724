//! Ordering and gap handling for the patch stream.
//!
//! [`Synchronizer`] does no IO and never reads the clock; the caller passes
//! the arrival time of every message and asks for [`Synchronizer::gap_deadline`]
//! to know when to come back. The async loop around it lives in
//! [`crate::driver`].

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use serde_json::Value;
use startos_client_core::patch::{MalformedPatch, Patch, SequenceId, Snapshot};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Patches held back while waiting for a missing one. Exceeding this
    /// forces a resync.
    pub max_buffered_patches: usize,
    /// How long a gap may stay open before forcing a resync.
    pub gap_timeout: Duration,
    pub reconnect_initial_backoff: Duration,
    pub reconnect_max_backoff: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            max_buffered_patches: 50,
            gap_timeout: Duration::from_secs(5),
            reconnect_initial_backoff: Duration::from_millis(500),
            reconnect_max_backoff: Duration::from_secs(30),
        }
    }
}

/// Why the current subscription cannot be continued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResyncReason {
    #[error(transparent)]
    Malformed(#[from] MalformedPatch),
    #[error("{buffered} patches buffered while patch {missing} is missing")]
    BufferOverflow {
        missing: SequenceId,
        buffered: usize,
    },
    #[error("patch {missing} did not arrive within {waited:?}")]
    GapTimeout {
        missing: SequenceId,
        waited: Duration,
    },
    #[error("received a patch before any snapshot")]
    NoSnapshot,
    #[error("no sequence id follows {last}")]
    SequenceExhausted { last: SequenceId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// `count` patches were applied, the last one being `last_applied`.
    Applied {
        last_applied: SequenceId,
        count: usize,
    },
    /// Held back until `missing` arrives.
    Buffered { missing: SequenceId },
    /// Already applied; ignored.
    Duplicate,
    /// The buffer was discarded and a fresh snapshot is required.
    Resync(ResyncReason),
}

pub struct Synchronizer {
    store: Arc<Store>,
    config: SyncConfig,
    pending: BTreeMap<SequenceId, Patch>,
    /// When the current gap was last observed without progress
    gap_started: Option<Instant>,
}

impl Synchronizer {
    pub fn new(store: Arc<Store>, config: SyncConfig) -> Self {
        Synchronizer {
            store,
            config,
            pending: BTreeMap::new(),
            gap_started: None,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn last_applied(&self) -> Option<SequenceId> {
        self.store.sequence()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Replace the store contents and forget everything buffered.
    pub fn load_snapshot(&mut self, snapshot: Snapshot) {
        self.discard();
        debug!(sequence_id = snapshot.sequence_id, "loading snapshot");
        self.store.replace(snapshot);
    }

    /// Decode and process one raw message from the patch stream.
    pub fn handle_message(&mut self, message: Value, now: Instant) -> PatchOutcome {
        match Patch::from_message(message) {
            Ok(patch) => self.handle_patch(patch, now),
            Err(e) => self.resync(e.into()),
        }
    }

    pub fn handle_patch(&mut self, patch: Patch, now: Instant) -> PatchOutcome {
        let Some(last) = self.store.sequence() else {
            return self.resync(ResyncReason::NoSnapshot);
        };
        let Some(expected) = last.checked_add(1) else {
            return self.resync(ResyncReason::SequenceExhausted { last });
        };
        if patch.sequence_id < expected {
            return PatchOutcome::Duplicate;
        }
        if patch.sequence_id > expected {
            self.pending.insert(patch.sequence_id, patch);
            if self.pending.len() > self.config.max_buffered_patches {
                let buffered = self.pending.len();
                return self.resync(ResyncReason::BufferOverflow {
                    missing: expected,
                    buffered,
                });
            }
            self.gap_started.get_or_insert(now);
            return PatchOutcome::Buffered { missing: expected };
        }

        let mut last_applied = last;
        let mut count = 0;
        let mut next = Some(patch);
        while let Some(patch) = next {
            if let Err(e) = self.store.apply(&patch) {
                return self.resync(e.into());
            }
            last_applied = patch.sequence_id;
            count += 1;
            next = last_applied
                .checked_add(1)
                .and_then(|n| self.pending.remove(&n));
        }
        // Progress restarts the clock for whatever gap remains
        self.gap_started = if self.pending.is_empty() {
            None
        } else {
            Some(now)
        };
        PatchOutcome::Applied {
            last_applied,
            count,
        }
    }

    /// When the open gap, if any, should be given up on.
    pub fn gap_deadline(&self) -> Option<Instant> {
        self.gap_started.map(|started| started + self.config.gap_timeout)
    }

    /// Give up on the open gap if its deadline has passed.
    pub fn check_gap(&mut self, now: Instant) -> Option<ResyncReason> {
        let started = self.gap_started?;
        let waited = now.saturating_duration_since(started);
        if waited < self.config.gap_timeout {
            return None;
        }
        let missing = self.store.sequence().map_or(0, |s| s.saturating_add(1));
        match self.resync(ResyncReason::GapTimeout { missing, waited }) {
            PatchOutcome::Resync(reason) => Some(reason),
            _ => None,
        }
    }

    fn discard(&mut self) {
        self.pending.clear();
        self.gap_started = None;
    }

    fn resync(&mut self, reason: ResyncReason) -> PatchOutcome {
        warn!(%reason, discarded = self.pending.len(), "patch stream needs a resync");
        self.discard();
        PatchOutcome::Resync(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use startos_client_core::patch::DbPath;

    fn path(s: &str) -> DbPath {
        DbPath::parse_dotted(s)
    }

    fn synchronizer(config: SyncConfig) -> Synchronizer {
        let mut sync = Synchronizer::new(Arc::new(Store::new()), config);
        sync.load_snapshot(Snapshot {
            sequence_id: 1,
            full_document: json!({ "counters": {}, "log": [] }),
        });
        sync
    }

    fn patches() -> Vec<Patch> {
        vec![
            Patch::set(2, path("counters.a"), json!(1)),
            Patch::set(3, path("counters.b"), json!(1)),
            Patch::set(4, path("counters.a"), json!(2)),
            Patch::set(5, path("log.0"), json!("first")),
            Patch::delete(6, path("counters.b")),
        ]
    }

    fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut r = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let first = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, first.clone());
                r.push(tail);
            }
        }
        r
    }

    #[test]
    fn test_in_order() {
        let mut sync = synchronizer(SyncConfig::default());
        let now = Instant::now();
        for p in patches() {
            let id = p.sequence_id;
            assert_eq!(
                sync.handle_patch(p, now),
                PatchOutcome::Applied {
                    last_applied: id,
                    count: 1
                }
            );
        }
        assert_eq!(
            sync.store().get(&DbPath::root()),
            Some(json!({ "counters": { "a": 2 }, "log": ["first"] }))
        );
        assert_eq!(sync.last_applied(), Some(6));
        assert_eq!(sync.gap_deadline(), None);
    }

    #[test]
    fn test_arrival_order_does_not_matter() {
        let expected = {
            let mut sync = synchronizer(SyncConfig::default());
            for p in patches() {
                sync.handle_patch(p, Instant::now());
            }
            sync.store().get(&DbPath::root())
        };
        for order in permutations(&patches()) {
            let mut sync = synchronizer(SyncConfig::default());
            let ids: Vec<_> = order.iter().map(|p| p.sequence_id).collect();
            for p in order {
                let outcome = sync.handle_patch(p, Instant::now());
                assert!(
                    !matches!(outcome, PatchOutcome::Resync(_)),
                    "{:?}: {:?}",
                    ids,
                    outcome
                );
            }
            assert_eq!(sync.store().get(&DbPath::root()), expected, "{:?}", ids);
            assert_eq!(sync.last_applied(), Some(6));
            assert_eq!(sync.pending_len(), 0);
        }
    }

    #[test]
    fn test_gap_is_filled_from_buffer() {
        let mut sync = synchronizer(SyncConfig::default());
        let now = Instant::now();
        let mut ps = patches().into_iter();
        let (p2, p3, p4) = (ps.next().unwrap(), ps.next().unwrap(), ps.next().unwrap());
        assert_eq!(
            sync.handle_patch(p4, now),
            PatchOutcome::Buffered { missing: 2 }
        );
        assert_eq!(
            sync.handle_patch(p3, now),
            PatchOutcome::Buffered { missing: 2 }
        );
        assert_eq!(sync.pending_len(), 2);
        assert_eq!(sync.store().get(&path("counters")), Some(json!({})));
        assert_eq!(
            sync.handle_patch(p2, now),
            PatchOutcome::Applied {
                last_applied: 4,
                count: 3
            }
        );
        assert_eq!(sync.pending_len(), 0);
    }

    #[test]
    fn test_duplicates_are_ignored() {
        let mut sync = synchronizer(SyncConfig::default());
        let now = Instant::now();
        let p2 = Patch::set(2, path("counters.a"), json!(1));
        sync.handle_patch(p2.clone(), now);
        let before = sync.store().get(&DbPath::root());
        assert_eq!(sync.handle_patch(p2, now), PatchOutcome::Duplicate);
        assert_eq!(
            sync.handle_patch(Patch::set(1, path("counters.a"), json!(100)), now),
            PatchOutcome::Duplicate
        );
        assert_eq!(sync.store().get(&DbPath::root()), before);
        assert_eq!(sync.last_applied(), Some(2));
    }

    #[test]
    fn test_buffer_overflow_forces_resync() {
        let mut sync = synchronizer(SyncConfig {
            max_buffered_patches: 2,
            ..SyncConfig::default()
        });
        let now = Instant::now();
        for id in [3, 4] {
            assert_eq!(
                sync.handle_patch(Patch::set(id, path("counters.a"), json!(id)), now),
                PatchOutcome::Buffered { missing: 2 }
            );
        }
        assert_eq!(
            sync.handle_patch(Patch::set(5, path("counters.a"), json!(5)), now),
            PatchOutcome::Resync(ResyncReason::BufferOverflow {
                missing: 2,
                buffered: 3
            })
        );
        assert_eq!(sync.pending_len(), 0);
        assert_eq!(sync.gap_deadline(), None);
    }

    #[test]
    fn test_gap_timeout() {
        let config = SyncConfig::default();
        let timeout = config.gap_timeout;
        let mut sync = synchronizer(config);
        let t0 = Instant::now();
        sync.handle_patch(Patch::set(3, path("counters.a"), json!(3)), t0);
        assert_eq!(sync.gap_deadline(), Some(t0 + timeout));

        // A later patch does not extend the deadline
        sync.handle_patch(Patch::set(4, path("counters.a"), json!(4)), t0 + timeout / 2);
        assert_eq!(sync.gap_deadline(), Some(t0 + timeout));

        assert_eq!(sync.check_gap(t0 + timeout / 2), None);
        assert_eq!(
            sync.check_gap(t0 + timeout),
            Some(ResyncReason::GapTimeout {
                missing: 2,
                waited: timeout
            })
        );
        assert_eq!(sync.pending_len(), 0);
        assert_eq!(sync.check_gap(t0 + timeout * 2), None);
    }

    #[test]
    fn test_progress_restarts_gap_clock() {
        let config = SyncConfig::default();
        let timeout = config.gap_timeout;
        let mut sync = synchronizer(config);
        let t0 = Instant::now();
        sync.handle_patch(Patch::set(3, path("counters.a"), json!(3)), t0);
        sync.handle_patch(Patch::set(5, path("counters.a"), json!(5)), t0);
        let t1 = t0 + timeout / 2;
        assert_eq!(
            sync.handle_patch(Patch::set(2, path("counters.a"), json!(2)), t1),
            PatchOutcome::Applied {
                last_applied: 3,
                count: 2
            }
        );
        assert_eq!(sync.gap_deadline(), Some(t1 + timeout));
        assert_eq!(sync.check_gap(t0 + timeout), None);
    }

    #[test]
    fn test_malformed_message_forces_resync() {
        let mut sync = synchronizer(SyncConfig::default());
        let now = Instant::now();
        sync.handle_patch(Patch::set(3, path("counters.a"), json!(3)), now);
        let outcome = sync.handle_message(
            json!({ "sequenceId": 2, "path": ["counters"], "operation": "frobnicate" }),
            now,
        );
        assert!(
            matches!(outcome, PatchOutcome::Resync(ResyncReason::Malformed(_))),
            "{:?}",
            outcome
        );
        assert_eq!(sync.pending_len(), 0);
        assert_eq!(sync.last_applied(), Some(1));
    }

    #[test]
    fn test_unappliable_patch_is_not_partially_applied() {
        let mut sync = synchronizer(SyncConfig::default());
        let now = Instant::now();
        let outcome = sync.handle_message(
            json!({ "sequenceId": 2, "path": ["nothing", "here"], "operation": "set", "value": 1 }),
            now,
        );
        let PatchOutcome::Resync(ResyncReason::Malformed(e)) = outcome else {
            panic!("expected a resync, got {:?}", outcome);
        };
        assert_eq!(e.sequence_id, Some(2));
        assert_eq!(
            sync.store().get(&DbPath::root()),
            Some(json!({ "counters": {}, "log": [] }))
        );
        assert_eq!(sync.last_applied(), Some(1));
    }

    #[test]
    fn test_patch_without_snapshot() {
        let mut sync = Synchronizer::new(Arc::new(Store::new()), SyncConfig::default());
        assert_eq!(
            sync.handle_patch(Patch::set(1, path("a"), json!(1)), Instant::now()),
            PatchOutcome::Resync(ResyncReason::NoSnapshot)
        );
    }

    #[test]
    fn test_last_sequence_id_forces_resync() {
        let mut sync = Synchronizer::new(Arc::new(Store::new()), SyncConfig::default());
        sync.load_snapshot(Snapshot {
            sequence_id: SequenceId::MAX,
            full_document: json!({}),
        });
        assert_eq!(
            sync.handle_patch(Patch::set(5, path("a"), json!(1)), Instant::now()),
            PatchOutcome::Resync(ResyncReason::SequenceExhausted {
                last: SequenceId::MAX
            })
        );
        assert_eq!(sync.pending_len(), 0);
        assert_eq!(sync.store().get(&DbPath::root()), Some(json!({})));
    }
}
