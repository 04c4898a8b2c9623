//! Commit pipeline and session state owner.
//!
//! # Responsibility
//! - Own the live `State`, the undo stack, the persistence scheduler and
//!   the reentrancy guard.
//! - Apply every mutation as clone, mutate, repair, snapshot, replace,
//!   schedule.
//! - Run destructive operations with a synchronous write.
//!
//! # Invariants
//! - The live state always satisfies the repair invariants.
//! - A commit never observes a draft older than the previous commit.
//! - Undo snapshots hold pre-mutation XP and are skipped while the guard is
//!   in destructive mode.
//! - Destructive writes supersede any pending debounced payload.
//!
//! # See also
//! - `persist::scheduler` for debounce and degrade-on-failure rules.

use crate::clock::{Clock, SystemClock};
use crate::config::PersistenceConfig;
use crate::integrity::migrate::{migrate, stamp_current};
use crate::integrity::repair::{repair_state_at, Repaired};
use crate::model::history::{HistorySnapshot, UndoStack};
use crate::model::state::{default_seed, State, TrackerId};
use crate::persist::codec::{encode_pretty, load_state};
use crate::persist::guard::ReentrancyGuard;
use crate::persist::scheduler::{PersistenceScheduler, WriteOutcome};
use crate::service::scoring::{KeywordScorer, SemanticScorer};
use crate::service::{ImportError, ServiceError, ServiceResult};
use crate::store::KeyValueStore;
use log::{debug, info, log};
use serde_json::Value;
use std::time::Instant;

pub struct ProgressSession<S: KeyValueStore> {
    state: State,
    history: UndoStack,
    scheduler: PersistenceScheduler<S>,
    guard: ReentrancyGuard,
    clock: Box<dyn Clock>,
    scorer: Box<dyn SemanticScorer>,
}

impl<S: KeyValueStore> ProgressSession<S> {
    /// Loads the stored document, or seeds defaults when nothing usable is
    /// stored, using the system clock.
    pub fn open(store: S, config: PersistenceConfig) -> Self {
        Self::open_with_clock(store, config, SystemClock)
    }

    pub fn open_with_clock(store: S, config: PersistenceConfig, clock: impl Clock + 'static) -> Self {
        let loaded = load_state(&store, config.storage_key.as_str());
        let source = if loaded.is_some() { "stored" } else { "seed" };
        let state = loaded.map(stamp_current).unwrap_or_else(default_seed);
        info!(
            "event=session_open module=session status=ok source={} trackers={} timeline={}",
            source,
            state.trackers.len(),
            state.timeline.len()
        );
        Self::with_state(state, store, config, clock)
    }

    /// Starts a session over an explicit state, repairing it first.
    pub fn with_state(
        state: State,
        store: S,
        config: PersistenceConfig,
        clock: impl Clock + 'static,
    ) -> Self {
        let state = repair_state_at(state, clock.epoch_ms()).into_state();
        Self {
            state,
            history: UndoStack::default(),
            scheduler: PersistenceScheduler::new(store, config),
            guard: ReentrancyGuard::new(),
            clock: Box::new(clock),
            scorer: Box::new(KeywordScorer),
        }
    }

    /// Replaces the keyword scorer used by `add_xp`.
    pub fn with_scorer(mut self, scorer: impl SemanticScorer + 'static) -> Self {
        self.scorer = Box::new(scorer);
        self
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn has_pending_write(&self) -> bool {
        self.scheduler.has_pending()
    }

    pub fn next_write_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    pub fn store(&self) -> &S {
        self.scheduler.store()
    }

    pub fn scorer(&self) -> &dyn SemanticScorer {
        self.scorer.as_ref()
    }

    pub fn epoch_ms(&self) -> i64 {
        self.clock.epoch_ms()
    }

    /// Applies `mutator` to a draft copy of the live state.
    ///
    /// The draft is repaired before it replaces the live state, so the
    /// mutator may leave it temporarily invalid. The mutator's return value
    /// is passed through.
    pub fn commit<R>(&mut self, mutator: impl FnOnce(&mut State) -> R) -> R {
        let mut draft = self.state.clone();
        let result = mutator(&mut draft);

        let repaired = repair_state_at(draft, self.clock.epoch_ms());
        if let Repaired::PartiallyRecovered(_, issues) = &repaired {
            log!(
                self.scheduler.config().diagnostic_level(),
                "event=commit module=session status=repaired issues={}",
                issues.len()
            );
        }

        if self.guard.is_destructive() {
            debug!("event=history_push module=session status=skipped reason=destructive");
        } else {
            self.history.push(HistorySnapshot::capture(&self.state));
        }

        self.state = repaired.into_state();
        self.scheduler.schedule(&self.state, self.clock.now());
        result
    }

    /// Rolls tracker XP back to the most recent snapshot.
    ///
    /// Returns `false` when there is nothing to undo. Logs, timeline and
    /// removed trackers are not restored.
    pub fn undo(&mut self) -> bool {
        let Some(snapshot) = self.history.pop() else {
            debug!("event=undo module=session status=skipped reason=empty");
            return false;
        };
        let restored = snapshot.restore_into(&mut self.state);
        self.scheduler.schedule(&self.state, self.clock.now());
        info!(
            "event=undo module=session status=ok restored={} remaining={}",
            restored,
            self.history.len()
        );
        true
    }

    /// One scheduling tick: releases guard flags held since the previous
    /// tick, then fires the debounced write if it is due.
    pub fn poll(&mut self) -> Option<WriteOutcome> {
        if self.guard.release_if_due() {
            debug!("event=guard_release module=session status=ok");
        }
        self.scheduler.poll(&self.guard, self.clock.now())
    }

    /// Releases finished guards and writes any pending payload immediately.
    pub fn flush(&mut self) -> Option<WriteOutcome> {
        self.guard.release_if_due();
        self.scheduler.flush(&self.guard)
    }

    /// Zeroes a tracker's XP and clears its log, persisted synchronously.
    pub fn reset_tracker(&mut self, id: &TrackerId) -> ServiceResult<WriteOutcome> {
        self.run_destructive(id, "tracker_reset", |draft| {
            if let Some(tracker) = draft.tracker_mut(id) {
                tracker.xp = 0;
                tracker.log.clear();
            }
        })
    }

    /// Removes a tracker, persisted synchronously.
    ///
    /// Timeline entries that referenced it are kept and now dangle.
    pub fn delete_tracker(&mut self, id: &TrackerId) -> ServiceResult<WriteOutcome> {
        self.run_destructive(id, "tracker_delete", |draft| {
            draft.trackers.retain(|tracker| &tracker.id != id);
        })
    }

    /// Drops the stored document and starts over from the default seed.
    pub fn reset_all(&mut self) {
        self.scheduler.clear_stored();
        self.state = default_seed();
        self.history.clear();
        self.scheduler.schedule(&self.state, self.clock.now());
        info!("event=reset_all module=session status=ok");
    }

    /// Re-validated, current-version, pretty-printed document.
    pub fn export_document(&self) -> ServiceResult<String> {
        let repaired = repair_state_at(self.state.clone(), self.clock.epoch_ms());
        let document = stamp_current(repaired.into_state());
        let text = encode_pretty(&document).map_err(ServiceError::Export)?;
        info!(
            "event=export module=session status=ok bytes={} trackers={}",
            text.len(),
            document.trackers.len()
        );
        Ok(text)
    }

    /// Replaces the live state with an imported document.
    ///
    /// The import is all-or-nothing: on error the live state, history and
    /// stored document are untouched. On success history is cleared and the
    /// document is written synchronously.
    pub fn import_document(&mut self, text: &str) -> ServiceResult<WriteOutcome> {
        let imported = match parse_import(text) {
            Ok(state) => state,
            Err(err) => {
                info!("event=import module=session status=error error={err}");
                return Err(err.into());
            }
        };

        self.state = imported;
        self.history.clear();
        self.scheduler.discard_pending();
        let outcome = self.scheduler.write_now(&self.state);
        info!(
            "event=import module=session status=ok trackers={} timeline={} written={}",
            self.state.trackers.len(),
            self.state.timeline.len(),
            outcome.is_written()
        );
        Ok(outcome)
    }

    fn run_destructive(
        &mut self,
        id: &TrackerId,
        operation: &'static str,
        mutation: impl FnOnce(&mut State),
    ) -> ServiceResult<WriteOutcome> {
        if self.state.tracker(id).is_none() {
            return Err(ServiceError::TrackerNotFound(id.clone()));
        }

        self.guard.begin_destructive();
        self.commit(mutation);
        self.scheduler.discard_pending();
        let outcome = self.scheduler.write_now(&self.state);
        self.guard.finish_destructive();

        info!(
            "event={} module=session status=ok written={}",
            operation,
            outcome.is_written()
        );
        Ok(outcome)
    }
}

fn parse_import(text: &str) -> Result<State, ImportError> {
    let value: Value = serde_json::from_str(text)?;
    let migrated = migrate(&value).ok_or(ImportError::NotAnObject)?;
    Ok(stamp_current(migrated.state))
}
