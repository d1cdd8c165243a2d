use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// In-memory set of revoked token ids.
///
/// Entries are kept only until the token would have expired anyway.
#[derive(Debug, Default)]
pub struct RevocationList {
    revoked: Mutex<HashMap<Uuid, DateTime<Utc>>>,
}

impl RevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoke(&self, jti: Uuid, expires_at: DateTime<Utc>, now: DateTime<Utc>) {
        let mut revoked = self.revoked.lock().unwrap_or_else(|e| e.into_inner());
        let before = revoked.len();
        revoked.retain(|_, exp| *exp > now);
        let pruned = before - revoked.len();
        if pruned > 0 {
            tracing::debug!(pruned, "expired revocations dropped");
        }
        if expires_at > now {
            revoked.insert(jti, expires_at);
        }
    }

    pub fn is_revoked(&self, jti: &Uuid) -> bool {
        let revoked = self.revoked.lock().unwrap_or_else(|e| e.into_inner());
        revoked.contains_key(jti)
    }

    pub fn len(&self) -> usize {
        self.revoked.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn revoked_until_pruned() {
        let list = RevocationList::new();
        let now = Utc::now();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        list.revoke(a, now + Duration::minutes(1), now);
        assert!(list.is_revoked(&a));
        assert!(!list.is_revoked(&b));

        // A later revocation prunes entries whose tokens have expired.
        list.revoke(b, now + Duration::hours(1), now + Duration::minutes(2));
        assert!(!list.is_revoked(&a));
        assert!(list.is_revoked(&b));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn already_expired_tokens_are_not_stored() {
        let list = RevocationList::new();
        let now = Utc::now();
        list.revoke(Uuid::new_v4(), now - Duration::seconds(1), now);
        assert!(list.is_empty());
    }
}
