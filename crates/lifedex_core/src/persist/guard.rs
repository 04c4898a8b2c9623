//! Reentrancy guard separating autosave from destructive writes.
//!
//! Owned by the session and passed by reference to the scheduler; there is
//! no process-global flag.
//!
//! # Invariants
//! - While `write_in_progress` is held, debounced writes do not fire.
//! - While `destructive` is held, commits do not record undo snapshots.
//! - Both flags are released together, on the scheduling tick after the
//!   destructive operation finished.

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReentrancyGuard {
    write_in_progress: bool,
    destructive: bool,
    release_pending: bool,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes both flags for a destructive operation.
    pub fn begin_destructive(&mut self) {
        self.write_in_progress = true;
        self.destructive = true;
        self.release_pending = false;
    }

    /// Marks the destructive operation finished; flags drop on the next tick.
    pub fn finish_destructive(&mut self) {
        self.release_pending = true;
    }

    /// Releases both flags if a finished operation is waiting for a tick.
    pub fn release_if_due(&mut self) -> bool {
        if !self.release_pending {
            return false;
        }
        self.write_in_progress = false;
        self.destructive = false;
        self.release_pending = false;
        true
    }

    pub fn is_write_in_progress(&self) -> bool {
        self.write_in_progress
    }

    pub fn is_destructive(&self) -> bool {
        self.destructive
    }
}

#[cfg(test)]
mod tests {
    use super::ReentrancyGuard;

    #[test]
    fn flags_survive_until_the_next_tick() {
        let mut guard = ReentrancyGuard::new();
        assert!(!guard.release_if_due());

        guard.begin_destructive();
        assert!(guard.is_destructive());
        assert!(guard.is_write_in_progress());
        assert!(!guard.release_if_due());

        guard.finish_destructive();
        assert!(guard.is_destructive());
        assert!(guard.release_if_due());
        assert!(!guard.is_destructive());
        assert!(!guard.is_write_in_progress());
    }
}
