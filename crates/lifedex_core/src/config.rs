//! Runtime configuration for persistence.
//!
//! Domain limits (timeline cap, history depth, attachment caps) are fixed
//! constants in `model`; only storage behavior is configurable.

use log::Level;
use std::time::Duration;

pub const DEFAULT_STORAGE_KEY: &str = "lifedex_v2";
pub const DEFAULT_DEBOUNCE_MS: u64 = 350;
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 3_500_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceConfig {
    /// Key under which the full document is stored.
    pub storage_key: String,
    /// Quiet window that coalesces scheduled writes.
    pub debounce: Duration,
    /// Encoded size above which embedded attachment payloads are stripped.
    pub max_payload_bytes: usize,
    /// Developer diagnostics: surface swallowed failures at `warn`.
    pub diagnostics: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            diagnostics: false,
        }
    }
}

impl PersistenceConfig {
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_max_payload_bytes(mut self, bytes: usize) -> Self {
        self.max_payload_bytes = bytes;
        self
    }

    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    /// Level used for recoverable failures that are otherwise swallowed.
    pub fn diagnostic_level(&self) -> Level {
        if self.diagnostics {
            Level::Warn
        } else {
            Level::Debug
        }
    }
}
