//! Result Cache Port - TTL cache for capability results.
//!
//! Entries are keyed by capability name, requesting user and canonical
//! arguments, and expire purely by TTL; nothing invalidates them explicitly.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Cached value for the key, if present and unexpired.
    async fn get(&self, key: &str) -> Option<Value>;

    /// Stores a value that expires after `ttl`.
    async fn put(&self, key: String, value: Value, ttl: Duration);

    /// Drops expired entries, returning how many were removed.
    async fn purge_expired(&self) -> usize;
}

/// Builds a cache key from a capability name, the requesting user and the
/// planner arguments.
///
/// Handlers see the injected user id, so results are never shared across
/// users. `serde_json::Map` keeps keys sorted, so equal argument sets always
/// serialize identically.
pub fn cache_key(capability: &str, user_id: &str, args: &Map<String, Value>) -> String {
    format!(
        "{}:{}:{}",
        capability,
        Value::String(user_id.to_string()),
        Value::Object(args.clone())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cache_key_ignores_insertion_order() {
        let mut a = Map::new();
        a.insert("b".into(), json!(2));
        a.insert("a".into(), json!(1));

        let mut b = Map::new();
        b.insert("a".into(), json!(1));
        b.insert("b".into(), json!(2));

        assert_eq!(cache_key("price", "alice", &a), cache_key("price", "alice", &b));
        assert_eq!(
            cache_key("price", "alice", &a),
            r#"price:"alice":{"a":1,"b":2}"#
        );
    }

    #[test]
    fn cache_key_separates_users() {
        let args = Map::new();
        assert_ne!(cache_key("balance", "alice", &args), cache_key("balance", "bob", &args));
    }
}
