//! Short-TTL mutual exclusion for admission critical sections.
//!
//! Locks are advisory and expire on their own: a crashed holder blocks
//! other entrants for at most the TTL. Release is compare-and-delete on the
//! fencing token, so an expired holder can never free a lock someone else
//! has since acquired.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;
use velvet_core::StoreError;

/// Proof of lock ownership, returned by a successful acquisition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockToken {
    key: String,
    fence: Uuid,
}

impl LockToken {
    /// The key this token locks.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Set-if-absent locking with a TTL.
#[async_trait]
pub trait LockService: Send + Sync {
    /// Acquires the lock for `key`, or returns `None` if someone else holds
    /// it. Never blocks waiting for the holder.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the backend is unreachable.
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockToken>, StoreError>;

    /// Releases the lock if `token` still owns it. Returns `false` when the
    /// lock already expired or belongs to a later holder.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the backend is unreachable.
    async fn release(&self, token: LockToken) -> Result<bool, StoreError>;
}

struct HeldLock {
    fence: Uuid,
    expires_at: Instant,
}

/// Process-local lock service with the same expiry semantics as the Redis
/// one. Suitable for tests and single-node deployments.
#[derive(Default)]
pub struct InMemoryLockService {
    held: Mutex<HashMap<String, HeldLock>>,
}

impl InMemoryLockService {
    /// Creates a lock service holding no locks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockService for InMemoryLockService {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockToken>, StoreError> {
        let mut held = self
            .held
            .lock()
            .map_err(|_| StoreError::Backend("lock table mutex poisoned".into()))?;
        let now = Instant::now();
        if let Some(existing) = held.get(key) {
            if existing.expires_at > now {
                return Ok(None);
            }
        }
        let fence = Uuid::new_v4();
        held.insert(
            key.to_owned(),
            HeldLock {
                fence,
                expires_at: now + ttl,
            },
        );
        Ok(Some(LockToken {
            key: key.to_owned(),
            fence,
        }))
    }

    async fn release(&self, token: LockToken) -> Result<bool, StoreError> {
        let mut held = self
            .held
            .lock()
            .map_err(|_| StoreError::Backend("lock table mutex poisoned".into()))?;
        match held.get(&token.key) {
            Some(existing) if existing.fence == token.fence => {
                let live = existing.expires_at > Instant::now();
                held.remove(&token.key);
                Ok(live)
            }
            _ => Ok(false),
        }
    }
}

/// Delete the key only if the fencing token still matches.
const RELEASE_SCRIPT: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
";

/// Redis-backed lock service for multi-node deployments.
///
/// Acquisition is `SET key fence NX PX ttl`; release runs a Lua
/// compare-and-delete so only the current holder can free the key.
pub struct RedisLockService {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisLockService {
    /// Wraps an established connection; keys are namespaced under `prefix`.
    #[must_use]
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    fn redis_key(&self, key: &str) -> String {
        format!("{}:lock:{key}", self.prefix)
    }
}

#[async_trait]
impl LockService for RedisLockService {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockToken>, StoreError> {
        let fence = Uuid::new_v4();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let mut conn = self.conn.clone();
        let set: Option<String> = redis::cmd("SET")
            .arg(self.redis_key(key))
            .arg(fence.to_string())
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(set.map(|_| LockToken {
            key: key.to_owned(),
            fence,
        }))
    }

    async fn release(&self, token: LockToken) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(self.redis_key(&token.key))
            .arg(token.fence.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(deleted == 1)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_fails_while_held() {
        let locks = InMemoryLockService::new();
        let ttl = Duration::from_secs(10);

        let token = locks.try_acquire("event:1", ttl).await.unwrap();
        assert!(token.is_some());
        assert!(locks.try_acquire("event:1", ttl).await.unwrap().is_none());

        // Different keys never contend.
        assert!(locks.try_acquire("event:2", ttl).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn release_frees_the_key() {
        let locks = InMemoryLockService::new();
        let ttl = Duration::from_secs(10);

        let token = locks.try_acquire("event:1", ttl).await.unwrap().unwrap();
        assert!(locks.release(token).await.unwrap());
        assert!(locks.try_acquire("event:1", ttl).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn expired_locks_are_reacquirable() {
        let locks = InMemoryLockService::new();

        let stale = locks
            .try_acquire("event:1", Duration::from_millis(0))
            .await
            .unwrap()
            .unwrap();
        let fresh = locks
            .try_acquire("event:1", Duration::from_secs(10))
            .await
            .unwrap();
        assert!(fresh.is_some());

        // The stale holder cannot free the new holder's lock.
        assert!(!locks.release(stale).await.unwrap());
        assert!(locks
            .try_acquire("event:1", Duration::from_secs(10))
            .await
            .unwrap()
            .is_none());
    }
}
