use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored value plus its lifetime (spec §4.7, "`Entry` carries
/// `created-at`, `expires-at`, and yields `expired?`").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry<V> {
    pub value: V,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<V> Entry<V> {
    pub fn new(value: V, created_at: DateTime<Utc>, ttl: chrono::Duration) -> Self {
        Entry { value, created_at, expires_at: created_at + ttl }
    }

    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn map<W>(self, f: impl FnOnce(V) -> W) -> Entry<W> {
        Entry { value: f(self.value), created_at: self.created_at, expires_at: self.expires_at }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_compares_against_expires_at() {
        let created = Utc::now();
        let entry = Entry::new(42, created, chrono::Duration::seconds(10));
        assert!(!entry.expired(created));
        assert!(entry.expired(created + chrono::Duration::seconds(11)));
    }
}
