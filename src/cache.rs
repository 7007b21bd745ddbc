use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

/// Best-effort Redis cache. Reads and writes swallow connection failures so a
/// down cache degrades to "miss", never to a request error. Deletes surface
/// their error because the event consumer must requeue on failure.
#[derive(Clone)]
pub struct Cache {
    client: redis::Client,
}

impl Cache {
    pub fn open(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self { client })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, key, "cache read failed");
                return None;
            }
        };
        let raw: Option<String> = match conn.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, key, "cache read failed");
                return None;
            }
        };
        raw.and_then(|raw| serde_json::from_str(&raw).ok())
    }

    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, key, "cache serialize failed");
                return;
            }
        };
        let result: Result<(), redis::RedisError> = async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.set_ex(key, raw, ttl_secs).await
        }
        .await;
        if let Err(e) = result {
            warn!(error = %e, key, "cache write failed");
        }
    }

    /// Deleting an absent key is a no-op, which keeps invalidation idempotent
    /// under duplicate event delivery.
    pub async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: u64 = conn.del(key).await?;
        Ok(())
    }
}
