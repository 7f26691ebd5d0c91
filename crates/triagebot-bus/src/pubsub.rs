//! Low-level pub/sub primitives.
//!
//! §9 requires publishing and subscribing to use two distinct bus
//! connections, so subscribe-side backpressure can never stall publish-side
//! work. [`PublishHandle`] and [`SubscribeHandle`] each open their own
//! connection to the same Redis deployment.

use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use redis::{AsyncCommands, Msg};

use crate::error::Result;

#[derive(Clone)]
pub struct PublishHandle {
    conn: redis::aio::ConnectionManager,
}

impl PublishHandle {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    /// Raw `PUBLISH channel payload`. Callers needing retry/backoff should
    /// go through [`crate::publisher::BusPublisher`] instead of calling this
    /// directly.
    pub async fn publish_raw(&self, channel: &str, payload: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .publish(channel, payload)
            .await
            .map_err(crate::error::BusError::from)?;
        Ok(())
    }
}

/// A single subscribed channel's message stream, plus the connection that
/// backs it. Dropping this drops the subscription.
pub struct Subscription {
    stream: Pin<Box<dyn Stream<Item = Msg> + Send>>,
}

impl Subscription {
    /// Await the next published payload as a UTF-8 string, or `None` if the
    /// connection was closed.
    pub async fn next_payload(&mut self) -> Option<String> {
        loop {
            let msg = self.stream.next().await?;
            match msg.get_payload::<String>() {
                Ok(payload) => return Some(payload),
                Err(e) => {
                    tracing::warn!(error = %e, "dropping non-UTF8 bus message");
                    continue;
                }
            }
        }
    }
}

pub struct SubscribeHandle {
    client: redis::Client,
}

impl SubscribeHandle {
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self { client })
    }

    /// Open a dedicated subscription to `channel`. Each call establishes its
    /// own connection — the handle itself is just a client factory.
    pub async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        Ok(Subscription {
            stream: Box::pin(pubsub.into_on_message()),
        })
    }
}
