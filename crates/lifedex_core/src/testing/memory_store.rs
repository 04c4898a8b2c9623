//! In-process key-value store with an optional byte quota.
//!
//! Clones share the same underlying map, so a test can keep a handle while
//! the session owns another.

use crate::store::{KeyValueStore, StoreError, StoreResult};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, String>,
    quota_bytes: Option<usize>,
    set_attempts: usize,
    successful_writes: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose values may not exceed `quota_bytes` in total.
    pub fn with_quota(quota_bytes: usize) -> Self {
        let store = Self::default();
        store.set_quota(Some(quota_bytes));
        store
    }

    pub fn set_quota(&self, quota_bytes: Option<usize>) {
        self.inner.borrow_mut().quota_bytes = quota_bytes;
    }

    /// Number of `set` calls, successful or not.
    pub fn set_attempts(&self) -> usize {
        self.inner.borrow().set_attempts
    }

    /// Values written by successful `set` calls, oldest first.
    pub fn successful_writes(&self) -> Vec<String> {
        self.inner.borrow().successful_writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.inner.borrow().successful_writes.len()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.inner.borrow().entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut inner = self.inner.borrow_mut();
        inner.set_attempts += 1;

        if let Some(quota) = inner.quota_bytes {
            let used_elsewhere: usize = inner
                .entries
                .iter()
                .filter(|(existing, _)| existing.as_str() != key)
                .map(|(existing, stored)| existing.len() + stored.len())
                .sum();
            let available = quota.saturating_sub(used_elsewhere);
            let requested = key.len() + value.len();
            if requested > available {
                return Err(StoreError::QuotaExceeded {
                    requested,
                    available,
                });
            }
        }

        inner.entries.insert(key.to_string(), value.to_string());
        inner.successful_writes.push(value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.inner.borrow_mut().entries.remove(key);
        Ok(())
    }
}
