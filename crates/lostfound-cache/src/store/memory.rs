//! In-process store for single-instance deployments and tests.
//!
//! Keys are kept ordered. A scan cursor is a handle on the last key a step
//! returned, and the next step resumes strictly after that key. Keys removed
//! or added meanwhile never shift the position, so every key present for the
//! whole iteration is returned, as with Redis `SCAN`.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use super::{CacheStore, ConnectionState, ConnectionStateCell, glob_to_regex};
use crate::clock::Clock;
use crate::error::{CacheError, CacheResult};

#[derive(Debug, Clone)]
struct MemoryEntry {
    data: Vec<u8>,
    expires_at_ms: u64,
}

/// Open cursors kept at most; the oldest is dropped beyond this.
const MAX_OPEN_CURSORS: usize = 1024;

#[derive(Debug)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, MemoryEntry>>,
    /// Cursor id -> last key returned by the step that issued it
    cursors: Mutex<BTreeMap<u64, String>>,
    next_cursor_id: AtomicU64,
    state: ConnectionStateCell,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            cursors: Mutex::new(BTreeMap::new()),
            next_cursor_id: AtomicU64::new(1),
            state: ConnectionStateCell::new(ConnectionState::Connected),
            clock,
        }
    }

    /// Stop serving; every later call fails with [`CacheError::Closed`].
    pub fn close(&self) {
        self.state.close();
    }

    /// Remaining time to live of a live key.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now_millis();
        self.entries
            .read()
            .get(key)
            .filter(|e| e.expires_at_ms > now)
            .map(|e| Duration::from_millis(e.expires_at_ms - now))
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = self.clock.now_millis();
        self.entries
            .read()
            .values()
            .filter(|e| e.expires_at_ms > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Park `last_key` under a fresh cursor id.
    fn issue_cursor(&self, last_key: String) -> u64 {
        let id = self.next_cursor_id.fetch_add(1, Ordering::Relaxed);
        let mut cursors = self.cursors.lock();
        cursors.insert(id, last_key);
        while cursors.len() > MAX_OPEN_CURSORS {
            cursors.pop_first();
        }
        id
    }

    fn ensure_open(&self) -> CacheResult<()> {
        match self.state.get() {
            ConnectionState::Closed => Err(CacheError::Closed),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn connection_state(&self) -> ConnectionState {
        self.state.get()
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        let now = self.clock.now_millis();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if entry.expires_at_ms > now => return Ok(Some(entry.data.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Expired: drop it lazily
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| e.expires_at_ms <= now) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        self.ensure_open()?;
        let expires_at_ms = self
            .clock
            .now_millis()
            .saturating_add(ttl.as_millis() as u64);
        self.entries.write().insert(
            key.to_string(),
            MemoryEntry {
                data: value,
                expires_at_ms,
            },
        );
        Ok(())
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> CacheResult<(u64, Vec<String>)> {
        self.ensure_open()?;
        let matcher = glob_to_regex(pattern)?;
        let resume_after = if cursor == 0 {
            None
        } else {
            match self.cursors.lock().remove(&cursor) {
                Some(last) => Some(last),
                // Unknown or evicted cursor: the iteration is over
                None => return Ok((0, Vec::new())),
            }
        };

        let now = self.clock.now_millis();
        let entries = self.entries.read();
        let lower = match &resume_after {
            Some(last) => Bound::Excluded(last.as_str()),
            None => Bound::Unbounded,
        };
        let mut window = entries
            .range::<str, _>((lower, Bound::Unbounded))
            .take(count.max(1))
            .peekable();

        let mut keys = Vec::new();
        let mut last_examined = None;
        while let Some((key, entry)) = window.next() {
            if entry.expires_at_ms > now && matcher.is_match(key) {
                keys.push(key.clone());
            }
            if window.peek().is_none() {
                last_examined = Some(key.clone());
            }
        }

        let next_cursor = match last_examined {
            Some(last)
                if entries
                    .range::<str, _>((Bound::Excluded(last.as_str()), Bound::Unbounded))
                    .next()
                    .is_some() =>
            {
                self.issue_cursor(last)
            }
            _ => 0,
        };
        Ok((next_cursor, keys))
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        self.ensure_open()?;
        let now = self.clock.now_millis();
        let mut entries = self.entries.write();
        let mut deleted = 0;
        for key in keys {
            if let Some(entry) = entries.remove(key)
                && entry.expires_at_ms > now
            {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn ping(&self) -> CacheResult<()> {
        self.ensure_open()
    }
}
