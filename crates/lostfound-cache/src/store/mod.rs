//! Key-value stores the cache adapter can sit on.
//!
//! Stores deal in fully namespaced keys and raw bytes. Namespacing, TTL
//! ceilings, timeouts and failure accounting all live one level up in
//! [`crate::adapter::StoreAdapter`].

pub mod memory;
pub mod redis;

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CacheResult;

pub use memory::MemoryStore;
pub use redis::RedisStore;

/// Lifecycle of the raw store connection, independent of failure counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

impl ConnectionState {
    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Connecting => 0,
            ConnectionState::Connected => 1,
            ConnectionState::Reconnecting => 2,
            ConnectionState::Closed => 3,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Connected,
            2 => ConnectionState::Reconnecting,
            _ => ConnectionState::Closed,
        }
    }
}

/// Lock-free holder for a [`ConnectionState`].
#[derive(Debug)]
pub struct ConnectionStateCell(AtomicU8);

impl ConnectionStateCell {
    pub fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Set a new state unless the cell is already closed. Returns the previous state.
    pub fn transition(&self, to: ConnectionState) -> ConnectionState {
        let mut current = self.0.load(Ordering::SeqCst);
        loop {
            if ConnectionState::from_u8(current) == ConnectionState::Closed {
                return ConnectionState::Closed;
            }
            match self.0.compare_exchange(
                current,
                to.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(prev) => return ConnectionState::from_u8(prev),
                Err(actual) => current = actual,
            }
        }
    }

    pub fn close(&self) {
        self.0.store(ConnectionState::Closed.as_u8(), Ordering::SeqCst);
    }
}

/// A remote (or local) key-value store with per-key expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    fn name(&self) -> &'static str;

    fn connection_state(&self) -> ConnectionState;

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()>;

    /// One incremental scan step. A returned cursor of `0` ends the iteration.
    /// Keys may repeat across steps.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize)
    -> CacheResult<(u64, Vec<String>)>;

    /// Delete the given keys in one round-trip, returning how many existed.
    async fn delete(&self, keys: &[String]) -> CacheResult<u64>;

    async fn ping(&self) -> CacheResult<()>;
}

/// Compile a Redis-style glob (`*`, `?`, `[...]`, `\` escapes) into a regex.
///
/// Like `SCAN MATCH`, wildcards and negated classes match any byte of the
/// key, newlines included.
pub fn glob_to_regex(pattern: &str) -> CacheResult<regex::Regex> {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => match chars.next() {
                Some(escaped) => out.push_str(&regex::escape(&escaped.to_string())),
                None => out.push_str(&regex::escape("\\")),
            },
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'^') {
                    chars.next();
                    out.push('^');
                }
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == ']' {
                        closed = true;
                        break;
                    }
                    if matches!(inner, '\\' | '[' | '&' | '~' | '|') {
                        out.push('\\');
                    }
                    out.push(inner);
                }
                if !closed {
                    return Err(crate::error::CacheError::InvalidPattern {
                        pattern: pattern.to_string(),
                        message: "unterminated character class".into(),
                    });
                }
                out.push(']');
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    regex::RegexBuilder::new(&out)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| crate::error::CacheError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_star_and_question_mark() {
        let re = glob_to_regex("app:dev:items:list:*").unwrap();
        assert!(re.is_match("app:dev:items:list:p1"));
        assert!(re.is_match("app:dev:items:list:"));
        assert!(!re.is_match("app:prod:items:list:p1"));

        let re = glob_to_regex("item:4?").unwrap();
        assert!(re.is_match("item:42"));
        assert!(!re.is_match("item:420"));
    }

    #[test]
    fn glob_exact_key_does_not_match_longer_keys() {
        let re = glob_to_regex("item:42").unwrap();
        assert!(re.is_match("item:42"));
        assert!(!re.is_match("item:420"));
        assert!(!re.is_match("item:42:claims:all"));
    }

    #[test]
    fn glob_classes_and_escapes() {
        let re = glob_to_regex("user:[ab]:x").unwrap();
        assert!(re.is_match("user:a:x"));
        assert!(!re.is_match("user:c:x"));

        let re = glob_to_regex("user:[^ab]:x").unwrap();
        assert!(re.is_match("user:c:x"));

        let re = glob_to_regex(r"lit\*").unwrap();
        assert!(re.is_match("lit*"));
        assert!(!re.is_match("litx"));

        let re = glob_to_regex("a.b+c").unwrap();
        assert!(re.is_match("a.b+c"));
        assert!(!re.is_match("aXb+c"));
    }

    #[test]
    fn glob_wildcards_match_newlines() {
        let re = glob_to_regex("items:list:*").unwrap();
        assert!(re.is_match("items:list:category=a\nb:page=1"));
        assert!(re.is_match("items:list:\n"));

        let re = glob_to_regex("k:?:v").unwrap();
        assert!(re.is_match("k:\n:v"));

        let re = glob_to_regex("k:[^ab]:v").unwrap();
        assert!(re.is_match("k:\n:v"));
        assert!(!re.is_match("k:a:v"));
    }

    #[test]
    fn glob_unterminated_class_is_rejected() {
        assert!(glob_to_regex("user:[ab").is_err());
    }

    #[test]
    fn closed_state_is_terminal() {
        let cell = ConnectionStateCell::new(ConnectionState::Connecting);
        assert_eq!(cell.transition(ConnectionState::Connected), ConnectionState::Connecting);
        cell.close();
        assert_eq!(cell.transition(ConnectionState::Connected), ConnectionState::Closed);
        assert_eq!(cell.get(), ConnectionState::Closed);
    }
}
