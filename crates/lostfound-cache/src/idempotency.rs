//! Request idempotency records.
//!
//! Per client token:
//!
//! ```text
//! Unseen ──handler completes──▶ Recorded ──same token within TTL──▶ Replayed
//! ```
//!
//! The guard is fail-open: if the store cannot be read the token is treated
//! as unseen, and if the record cannot be written the response is still
//! returned. Two concurrent first requests with the same token are not
//! serialized; both run the handler.
//!
//! The HTTP wiring (header extraction, response capture) lives in the server's
//! middleware; this module owns the token rules and the stored record.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::adapter::StoreAdapter;
use crate::metrics;

/// Header carrying the client token.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Header marking a replayed response.
pub const IDEMPOTENCY_REPLAYED_HEADER: &str = "idempotency-replayed";

const KEY_PREFIX: &str = "idempotency:";

/// A validated client token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Accepts 1..=`max_len` visible ASCII characters.
    pub fn parse(raw: &str, max_len: usize) -> Option<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= max_len
            && raw.bytes().all(|b| b.is_ascii_graphic());
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn cache_key(&self) -> String {
        format!("{KEY_PREFIX}{}", self.0)
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A captured response. The body is kept as raw JSON text so a replay is
/// byte-for-byte the original.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyRecord {
    pub status_code: u16,
    pub body: Box<RawValue>,
}

impl IdempotencyRecord {
    /// Capture a response body. Fails when the body is not a JSON document.
    pub fn from_json_bytes(status_code: u16, body: &[u8]) -> Result<Self, serde_json::Error> {
        let body: Box<RawValue> = serde_json::from_slice(body)?;
        Ok(Self { status_code, body })
    }

    pub fn body_bytes(&self) -> &[u8] {
        self.body.get().as_bytes()
    }
}

/// Outcome of a token lookup.
#[derive(Debug, Clone)]
pub enum Lookup {
    Unseen,
    Replay(IdempotencyRecord),
}

#[derive(Clone, Debug)]
pub struct IdempotencyGuard {
    adapter: StoreAdapter,
    max_key_length: usize,
}

impl IdempotencyGuard {
    pub fn new(adapter: StoreAdapter, max_key_length: usize) -> Self {
        Self {
            adapter,
            max_key_length,
        }
    }

    /// Validate a raw header value. Invalid tokens are ignored, not rejected.
    pub fn parse_key(&self, raw: &str) -> Option<IdempotencyKey> {
        let key = IdempotencyKey::parse(raw, self.max_key_length);
        if key.is_none() {
            tracing::warn!(
                len = raw.len(),
                max = self.max_key_length,
                "ignoring malformed idempotency key"
            );
        }
        key
    }

    pub async fn lookup(&self, key: &IdempotencyKey) -> Lookup {
        match self.adapter.get::<IdempotencyRecord>(&key.cache_key()).await {
            Some(record) => {
                metrics::record_idempotency_replay();
                tracing::debug!(
                    idempotency_key = %key,
                    status = record.status_code,
                    "replaying recorded response"
                );
                Lookup::Replay(record)
            }
            None => Lookup::Unseen,
        }
    }

    /// Store a response under `key`. The TTL is subject to the adapter's ceiling.
    pub async fn record(&self, key: &IdempotencyKey, record: &IdempotencyRecord, ttl: Duration) {
        self.adapter.set(&key.cache_key(), record, ttl).await;
        tracing::debug!(
            idempotency_key = %key,
            status = record.status_code,
            ttl_secs = self.adapter.effective_ttl(ttl).as_secs(),
            "recorded response"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_rules() {
        assert!(IdempotencyKey::parse("abc-123", 256).is_some());
        assert!(IdempotencyKey::parse("", 256).is_none());
        assert!(IdempotencyKey::parse("has space", 256).is_none());
        assert!(IdempotencyKey::parse("ключ", 256).is_none());
        assert!(IdempotencyKey::parse(&"x".repeat(257), 256).is_none());
        assert!(IdempotencyKey::parse(&"x".repeat(256), 256).is_some());
    }

    #[test]
    fn record_keeps_body_text_verbatim() {
        let body = r#"{"z":1,"a":[true,null],"m":"é"}"#.as_bytes();
        let record = IdempotencyRecord::from_json_bytes(201, body).unwrap();
        assert_eq!(record.body_bytes(), body);

        let stored = serde_json::to_vec(&record).unwrap();
        let back: IdempotencyRecord = serde_json::from_slice(&stored).unwrap();
        assert_eq!(back.status_code, 201);
        assert_eq!(back.body_bytes(), body);
    }

    #[test]
    fn non_json_body_is_not_recordable() {
        assert!(IdempotencyRecord::from_json_bytes(200, b"plain text").is_err());
        assert!(IdempotencyRecord::from_json_bytes(204, b"").is_err());
    }
}
