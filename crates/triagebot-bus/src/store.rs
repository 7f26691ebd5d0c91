//! Shared key/value store abstraction (§3, §6), backed by Redis.
//!
//! Every service opens its own [`Store`] handle; there is no locking —
//! callers rely on TTL expiry and last-writer-wins list rewrites, per §5.

use std::time::Duration;

use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::error::Result;

#[derive(Clone)]
pub struct Store {
    conn: redis::aio::ConnectionManager,
}

impl Store {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    /// `SET key value PX <ttl>` — used for [`IncidentRecord`](triagebot_core::types::IncidentRecord)
    /// writes and OAuth-state persistence.
    pub async fn set_json_ttl<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key, payload, ttl.as_secs().max(1))
            .await
            .map_err(crate::error::BusError::from)?;
        Ok(())
    }

    /// `SET key value` with no expiry.
    pub async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, payload).await.map_err(crate::error::BusError::from)?;
        Ok(())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await.map_err(crate::error::BusError::from)?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    /// Reset TTL on an existing key without rewriting its value (used when
    /// appending to an [`IncidentRecord`](triagebot_core::types::IncidentRecord)).
    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .expire(key, ttl.as_secs().max(1) as i64)
            .await
            .map_err(crate::error::BusError::from)?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.map_err(crate::error::BusError::from)?;
        Ok(())
    }

    /// Prefix scan (`SCAN MATCH {prefix}*`), decoding every matched value as
    /// `T`. Used by the tier-2 temporal threading lookup (§4.2).
    pub async fn scan_prefix_json<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>> {
        let mut conn = self.conn.clone();
        let pattern = format!("{prefix}*");
        let mut iter: redis::AsyncIter<'_, String> = conn
            .scan_match(&pattern)
            .await
            .map_err(crate::error::BusError::from)?;

        let mut keys = Vec::new();
        while let Some(key) = futures_util::StreamExt::next(&mut iter).await {
            keys.push(key);
        }
        drop(iter);

        debug!(pattern = %pattern, matched = keys.len(), "prefix scan");

        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get_json::<T>(&key).await? {
                out.push(value);
            }
        }
        Ok(out)
    }

    /// `RPUSH key value` — append to a persistent list (§4.3 fallback queue).
    pub async fn list_push_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        let mut conn = self.conn.clone();
        let _: () = conn.rpush(key, payload).await.map_err(crate::error::BusError::from)?;
        Ok(())
    }

    /// `LRANGE key 0 -1`, decoding every entry as `T`.
    pub async fn list_get_all_json<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.lrange(key, 0, -1).await.map_err(crate::error::BusError::from)?;
        raw.iter()
            .map(|s| serde_json::from_str(s).map_err(Into::into))
            .collect()
    }

    /// Atomically replace the entire list at `key` with `values`, inside a
    /// `MULTI`/`EXEC` transaction — the closest Redis gets to an atomic
    /// "read-modify-write" over a list without per-entry identifiers.
    pub async fn list_replace_all_json<T: Serialize + Sync>(
        &self,
        key: &str,
        values: &[T],
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic().del(key);
        for value in values {
            let payload = serde_json::to_string(value)?;
            pipe.rpush(key, payload);
        }
        let _: () = pipe.query_async(&mut conn).await.map_err(crate::error::BusError::from)?;
        Ok(())
    }
}
