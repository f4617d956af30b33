use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use redis::{Client as RedisClient, Script};
use uuid::Uuid;

/// Redis key guarding the sync run.
pub const SYNC_LOCK_KEY: &str = "jobboard:automation:sync-lock";

/// Proof of ownership handed out by [`RunLock::try_acquire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(String);

/// Exclusive lock around a sync run. Only one holder at a time, across every
/// instance sharing the backend.
#[async_trait]
pub trait RunLock: Send + Sync {
    /// `None` if someone else holds the lock.
    async fn try_acquire(&self) -> Result<Option<LockToken>>;

    /// Releases only if `token` still owns the lock.
    async fn release(&self, token: LockToken) -> Result<()>;

    async fn is_held(&self) -> Result<bool>;
}

/// `SET key token NX PX ttl`, released with a compare-and-delete script so an
/// expired holder never deletes a newer holder's lock.
pub struct RedisRunLock {
    client: RedisClient,
    key: String,
    ttl: Duration,
}

const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
"#;

impl RedisRunLock {
    pub fn new(client: RedisClient, ttl: Duration) -> Self {
        Self {
            client,
            key: SYNC_LOCK_KEY.to_string(),
            ttl,
        }
    }
}

#[async_trait]
impl RunLock for RedisRunLock {
    async fn try_acquire(&self) -> Result<Option<LockToken>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let token = Uuid::new_v4().to_string();

        let reply: Option<String> = redis::cmd("SET")
            .arg(&self.key)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(self.ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;

        Ok(reply.map(|_| LockToken(token)))
    }

    async fn release(&self, token: LockToken) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let deleted: i32 = Script::new(RELEASE_SCRIPT)
            .key(&self.key)
            .arg(&token.0)
            .invoke_async(&mut conn)
            .await?;

        if deleted == 0 {
            tracing::warn!("Sync lock had already expired or changed hands before release");
        }
        Ok(())
    }

    async fn is_held(&self) -> Result<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let exists: bool = redis::cmd("EXISTS")
            .arg(&self.key)
            .query_async(&mut conn)
            .await?;
        Ok(exists)
    }
}
