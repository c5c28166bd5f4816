//! On-disk envelope and freshness rule
//!
//! Every stored value is wrapped in an [`Envelope`] carrying the logical key
//! and the time it was written. The TTL is not stored: callers pass it at read
//! time, so the same entry can be fresh for one caller and stale for another.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{ser::Error as _, Deserialize, Serialize};
use serde_json::Value;

/// Deepest payload nesting that still decodes
///
/// serde_json refuses to parse past 128 nested containers, and the envelope
/// itself takes one level.
pub const MAX_PAYLOAD_DEPTH: usize = 120;

/// Whether `value` nests arrays or objects more than `limit` levels deep
fn exceeds_depth(value: &Value, limit: usize) -> bool {
    match value {
        Value::Array(items) => limit == 0 || items.iter().any(|v| exceeds_depth(v, limit - 1)),
        Value::Object(map) => limit == 0 || map.values().any(|v| exceeds_depth(v, limit - 1)),
        _ => false,
    }
}

/// Wrapper struct for cached data stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The logical key this entry was saved under
    pub key: String,
    /// When the entry was written, stamped by the backend
    pub stored_at: DateTime<Utc>,
    /// The cached data
    pub payload: Value,
}

impl Envelope {
    pub fn new(key: &str, stored_at: DateTime<Utc>, payload: Value) -> Self {
        Self {
            key: key.to_string(),
            stored_at,
            payload,
        }
    }

    /// Age of the entry at `now`, or `None` if it was stamped in the future
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        now.signed_duration_since(self.stored_at).to_std().ok()
    }

    /// Whether the entry is still valid at `now` for the given TTL
    ///
    /// Valid iff `now - stored_at < ttl`. Without a TTL an entry never expires.
    /// Entries stamped in the future count as fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Option<Duration>) -> bool {
        match (ttl, self.age(now)) {
            (None, _) | (_, None) => true,
            (Some(ttl), Some(age)) => age < ttl,
        }
    }
}

/// Serialization format for envelopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryFormat {
    /// Single-line JSON
    #[default]
    Compact,
    /// Indented JSON, easier to inspect by hand
    Pretty,
}

impl EntryFormat {
    /// Fails for payloads nested deeper than [`MAX_PAYLOAD_DEPTH`], which
    /// could be written but never read back
    pub fn encode(&self, envelope: &Envelope) -> serde_json::Result<Vec<u8>> {
        if exceeds_depth(&envelope.payload, MAX_PAYLOAD_DEPTH) {
            return Err(serde_json::Error::custom(format!(
                "payload nests deeper than {MAX_PAYLOAD_DEPTH} levels"
            )));
        }
        match self {
            EntryFormat::Compact => serde_json::to_vec(envelope),
            EntryFormat::Pretty => serde_json::to_vec_pretty(envelope),
        }
    }

    /// Both variants are JSON, so either can read what the other wrote
    pub fn decode(&self, bytes: &[u8]) -> serde_json::Result<Envelope> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nested(depth: usize) -> Value {
        (0..depth).fold(json!("leaf"), |inner, _| json!([inner]))
    }

    fn stored_at() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap()
    }

    #[test]
    fn test_fresh_just_before_ttl() {
        let entry = Envelope::new("k", stored_at(), json!(1));
        let ttl = Duration::from_secs(3600);
        let now = stored_at() + chrono::Duration::seconds(3599);
        assert!(entry.is_fresh(now, Some(ttl)));
    }

    #[test]
    fn test_stale_at_and_after_ttl() {
        let entry = Envelope::new("k", stored_at(), json!(1));
        let ttl = Duration::from_secs(3600);
        assert!(!entry.is_fresh(stored_at() + chrono::Duration::seconds(3600), Some(ttl)));
        assert!(!entry.is_fresh(stored_at() + chrono::Duration::seconds(3601), Some(ttl)));
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let entry = Envelope::new("k", stored_at(), json!(1));
        let far_future = stored_at() + chrono::Duration::days(3650);
        assert!(entry.is_fresh(far_future, None));
    }

    #[test]
    fn test_future_stamp_is_fresh() {
        let entry = Envelope::new("k", stored_at(), json!(1));
        let before = stored_at() - chrono::Duration::seconds(30);
        assert!(entry.is_fresh(before, Some(Duration::from_secs(1))));
        assert!(entry.age(before).is_none());
    }

    #[test]
    fn test_formats_read_each_other() {
        let entry = Envelope::new(
            "jira_issues:PROJ",
            stored_at(),
            json!({"issues": [{"key": "PROJ-1", "points": 3.5}], "total": 1}),
        );
        let pretty = EntryFormat::Pretty.encode(&entry).unwrap();
        let compact = EntryFormat::Compact.encode(&entry).unwrap();
        assert!(pretty.contains(&b'\n'));
        assert!(!compact.contains(&b'\n'));
        assert_eq!(EntryFormat::Compact.decode(&pretty).unwrap(), entry);
        assert_eq!(EntryFormat::Pretty.decode(&compact).unwrap(), entry);
    }

    #[test]
    fn test_deepest_allowed_payload_decodes() {
        let entry = Envelope::new("k", stored_at(), nested(MAX_PAYLOAD_DEPTH));
        let bytes = EntryFormat::Compact.encode(&entry).unwrap();
        assert_eq!(EntryFormat::Compact.decode(&bytes).unwrap(), entry);
    }

    #[test]
    fn test_too_deep_payload_is_rejected() {
        let entry = Envelope::new("k", stored_at(), nested(MAX_PAYLOAD_DEPTH + 1));
        let err = EntryFormat::Pretty.encode(&entry).unwrap_err();
        assert!(err.to_string().contains("nests deeper"));

        let object = json!({ "wrapped": nested(MAX_PAYLOAD_DEPTH) });
        assert!(EntryFormat::Compact
            .encode(&Envelope::new("k", stored_at(), object))
            .is_err());
    }
}
