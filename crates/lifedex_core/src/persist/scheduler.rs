//! Debounced persistence scheduler.
//!
//! # Responsibility
//! - Hold at most one pending payload; later schedules replace it.
//! - Fire one write when the debounce deadline passes (`poll`).
//! - Provide a synchronous write path for destructive operations.
//!
//! # Invariants
//! - The deadline is armed by the first schedule of a burst and is not
//!   pushed back by later schedules, bounding write latency.
//! - A due write is skipped, and re-armed, while the guard reports a
//!   write in progress.
//! - At most two store writes per attempt: the payload, then the stripped
//!   payload if the first write failed.

use crate::config::PersistenceConfig;
use crate::model::state::State;
use crate::persist::codec::{encode, strip_embedded_payloads};
use crate::persist::guard::ReentrancyGuard;
use crate::store::KeyValueStore;
use log::{debug, info, log};
use std::time::Instant;

/// Outcome of one write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Full payload written.
    Written { bytes: usize },
    /// Payload written with embedded attachment payloads stripped.
    WrittenStripped { bytes: usize },
    /// Write not attempted because a synchronous write held the guard.
    Skipped,
    /// Both the payload and the stripped retry failed.
    Failed,
}

impl WriteOutcome {
    pub fn is_written(self) -> bool {
        matches!(self, Self::Written { .. } | Self::WrittenStripped { .. })
    }
}

pub struct PersistenceScheduler<S: KeyValueStore> {
    store: S,
    config: PersistenceConfig,
    pending: Option<State>,
    deadline: Option<Instant>,
}

impl<S: KeyValueStore> PersistenceScheduler<S> {
    pub fn new(store: S, config: PersistenceConfig) -> Self {
        Self {
            store,
            config,
            pending: None,
            deadline: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Records `state` as the payload for the next debounced write.
    pub fn schedule(&mut self, state: &State, now: Instant) {
        self.pending = Some(state.clone());
        if self.deadline.is_none() {
            self.deadline = Some(now + self.config.debounce);
        }
    }

    /// Drops any pending payload; used when a synchronous write supersedes it.
    pub fn discard_pending(&mut self) {
        self.pending = None;
        self.deadline = None;
    }

    /// Fires the pending write if its deadline has passed.
    pub fn poll(&mut self, guard: &ReentrancyGuard, now: Instant) -> Option<WriteOutcome> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }

        if guard.is_write_in_progress() {
            self.deadline = Some(now + self.config.debounce);
            debug!("event=state_save module=persist status=skipped reason=write_in_progress");
            return Some(WriteOutcome::Skipped);
        }

        self.deadline = None;
        let payload = self.pending.take()?;
        Some(self.write_with_fallback(&payload))
    }

    /// Writes `state` immediately, bypassing the debounce window.
    pub fn write_now(&mut self, state: &State) -> WriteOutcome {
        self.write_with_fallback(state)
    }

    /// Fires the pending write now, ignoring its deadline.
    ///
    /// Used when the owning process is about to exit.
    pub fn flush(&mut self, guard: &ReentrancyGuard) -> Option<WriteOutcome> {
        if guard.is_write_in_progress() {
            return Some(WriteOutcome::Skipped);
        }
        self.deadline = None;
        let payload = self.pending.take()?;
        Some(self.write_with_fallback(&payload))
    }

    /// Removes the stored document and any pending payload.
    pub fn clear_stored(&mut self) {
        self.discard_pending();
        if let Err(err) = self.store.remove(self.config.storage_key.as_str()) {
            log!(
                self.config.diagnostic_level(),
                "event=state_clear module=persist status=error error={err}"
            );
        }
    }

    fn write_with_fallback(&self, state: &State) -> WriteOutcome {
        let key = self.config.storage_key.as_str();

        let first_attempt = match encode(state) {
            Ok(text) if text.len() > self.config.max_payload_bytes => {
                info!(
                    "event=state_save module=persist status=degraded reason=oversized bytes={} limit={}",
                    text.len(),
                    self.config.max_payload_bytes
                );
                None
            }
            Ok(text) => Some(text),
            Err(err) => {
                log!(
                    self.config.diagnostic_level(),
                    "event=state_save module=persist status=error error_code=encode_failed error={err}"
                );
                None
            }
        };

        if let Some(text) = first_attempt {
            match self.store.set(key, text.as_str()) {
                Ok(()) => {
                    debug!(
                        "event=state_save module=persist status=ok bytes={}",
                        text.len()
                    );
                    return WriteOutcome::Written { bytes: text.len() };
                }
                Err(err) => {
                    log!(
                        self.config.diagnostic_level(),
                        "event=state_save module=persist status=error error_code=store_rejected error={err}"
                    );
                }
            }
        }

        self.write_stripped(key, state)
    }

    fn write_stripped(&self, key: &str, state: &State) -> WriteOutcome {
        let stripped = strip_embedded_payloads(state);
        let result = encode(&stripped)
            .map_err(|err| err.to_string())
            .and_then(|text| {
                self.store
                    .set(key, text.as_str())
                    .map(|()| text.len())
                    .map_err(|err| err.to_string())
            });

        match result {
            Ok(bytes) => {
                debug!("event=state_save module=persist status=ok stripped=true bytes={bytes}");
                WriteOutcome::WrittenStripped { bytes }
            }
            Err(err) => {
                log!(
                    self.config.diagnostic_level(),
                    "event=state_save module=persist status=error error_code=retry_failed error={err}"
                );
                WriteOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PersistenceScheduler, WriteOutcome};
    use crate::config::PersistenceConfig;
    use crate::model::entry::{Attachment, LogEntry};
    use crate::model::state::{Category, State, Tracker};
    use crate::persist::codec::decode;
    use crate::persist::guard::ReentrancyGuard;
    use crate::store::KeyValueStore;
    use crate::testing::MemoryStore;
    use std::time::{Duration, Instant};

    fn state_with_xp(xp: i64) -> State {
        State {
            trackers: vec![Tracker::new("Run", Category::Trait).with_xp(xp)],
            ..State::default()
        }
    }

    fn heavy_state(payload_len: usize) -> State {
        let mut tracker = Tracker::new("Photos", Category::Hobby);
        let mut entry = LogEntry::new("album", 1, 1_700_000_000_000);
        entry.attachments.push(Attachment {
            embedded_payload: Some(format!("data:image/png;base64,{}", "A".repeat(payload_len))),
            ..Attachment::metadata("big.png", "image/png", payload_len as u64)
        });
        tracker.log.push(entry);
        State {
            trackers: vec![tracker],
            ..State::default()
        }
    }

    fn stored(store: &MemoryStore) -> State {
        let text = store
            .get("lifedex_v2")
            .expect("get should succeed")
            .expect("document should be stored");
        decode(&text).expect("stored document should decode")
    }

    #[test]
    fn burst_coalesces_into_one_write_of_the_latest_payload() {
        let store = MemoryStore::new();
        let mut scheduler = PersistenceScheduler::new(store.clone(), PersistenceConfig::default());
        let guard = ReentrancyGuard::new();
        let start = Instant::now();

        scheduler.schedule(&state_with_xp(1), start);
        scheduler.schedule(&state_with_xp(2), start + Duration::from_millis(50));
        scheduler.schedule(&state_with_xp(3), start + Duration::from_millis(100));

        assert_eq!(scheduler.poll(&guard, start + Duration::from_millis(349)), None);
        assert_eq!(store.write_count(), 0);

        let outcome = scheduler.poll(&guard, start + Duration::from_millis(350));
        assert!(matches!(outcome, Some(WriteOutcome::Written { .. })));
        assert_eq!(store.write_count(), 1);
        assert_eq!(stored(&store).trackers[0].xp, 3);

        assert_eq!(scheduler.poll(&guard, start + Duration::from_secs(5)), None);
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn deadline_is_not_pushed_back_by_later_schedules() {
        let mut scheduler =
            PersistenceScheduler::new(MemoryStore::new(), PersistenceConfig::default());
        let start = Instant::now();
        scheduler.schedule(&state_with_xp(1), start);
        scheduler.schedule(&state_with_xp(2), start + Duration::from_millis(300));
        assert_eq!(
            scheduler.next_deadline(),
            Some(start + Duration::from_millis(350))
        );
    }

    #[test]
    fn held_guard_skips_and_rearms_the_write() {
        let store = MemoryStore::new();
        let mut scheduler = PersistenceScheduler::new(store.clone(), PersistenceConfig::default());
        let mut guard = ReentrancyGuard::new();
        let start = Instant::now();

        scheduler.schedule(&state_with_xp(9), start);
        guard.begin_destructive();
        let due = start + Duration::from_millis(400);
        assert_eq!(scheduler.poll(&guard, due), Some(WriteOutcome::Skipped));
        assert_eq!(store.set_attempts(), 0);
        assert!(scheduler.has_pending());

        guard.finish_destructive();
        guard.release_if_due();
        let outcome = scheduler.poll(&guard, due + Duration::from_millis(350));
        assert!(outcome.is_some_and(WriteOutcome::is_written));
    }

    #[test]
    fn flush_writes_before_the_deadline() {
        let store = MemoryStore::new();
        let mut scheduler = PersistenceScheduler::new(store.clone(), PersistenceConfig::default());
        let guard = ReentrancyGuard::new();

        assert_eq!(scheduler.flush(&guard), None);
        scheduler.schedule(&state_with_xp(4), Instant::now());
        assert!(scheduler
            .flush(&guard)
            .is_some_and(WriteOutcome::is_written));
        assert_eq!(scheduler.next_deadline(), None);
        assert_eq!(stored(&store).trackers[0].xp, 4);
    }

    #[test]
    fn oversized_payload_is_written_stripped() {
        let store = MemoryStore::new();
        let config = PersistenceConfig::default().with_max_payload_bytes(1_000);
        let mut scheduler = PersistenceScheduler::new(store.clone(), config);

        let outcome = scheduler.write_now(&heavy_state(5_000));
        assert!(matches!(outcome, WriteOutcome::WrittenStripped { .. }));
        assert_eq!(store.set_attempts(), 1);

        let saved = stored(&store);
        let attachment = &saved.trackers[0].log[0].attachments[0];
        assert_eq!(attachment.embedded_payload, None);
        assert_eq!(attachment.name, "big.png");
    }

    #[test]
    fn quota_failure_retries_once_with_stripped_payload() {
        let store = MemoryStore::with_quota(2_000);
        let mut scheduler = PersistenceScheduler::new(store.clone(), PersistenceConfig::default());

        let outcome = scheduler.write_now(&heavy_state(5_000));
        assert!(matches!(outcome, WriteOutcome::WrittenStripped { .. }));
        assert_eq!(store.set_attempts(), 2);
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn second_failure_is_swallowed() {
        let store = MemoryStore::with_quota(10);
        let config = PersistenceConfig::default().with_diagnostics(true);
        let mut scheduler = PersistenceScheduler::new(store.clone(), config);

        assert_eq!(scheduler.write_now(&state_with_xp(1)), WriteOutcome::Failed);
        assert_eq!(store.set_attempts(), 2);
        assert_eq!(store.get("lifedex_v2").expect("get should succeed"), None);
    }
}
