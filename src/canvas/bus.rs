//! Broadcast Bus (§4.4): one logical topic, `pixelUpdates`, carrying
//! encoded placement events. Publish is fire-and-forget from the
//! placement path; the connection server holds the single subscription
//! and fans each message out to every live session.

use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::Pool;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::Result;

pub const TOPIC: &str = "pixelUpdates";

#[async_trait]
pub trait BroadcastBus: Send + Sync {
	/// Non-blocking from the writer's perspective: errors surface but do
	/// not undo whatever already landed in the Canvas Store / Update Log.
	async fn publish(&self, bytes: Vec<u8>) -> Result<()>;

	/// A lazy, best-effort stream of encoded events. The server holds
	/// exactly one of these per process.
	async fn subscribe(&self) -> Result<BoxStream<'static, Vec<u8>>>;
}

#[derive(Clone)]
pub struct RedisBroadcastBus {
	pool: Pool,
	redis_url: String,
}

impl RedisBroadcastBus {
	pub fn new(pool: Pool, redis_url: String) -> Self {
		Self { pool, redis_url }
	}
}

#[async_trait]
impl BroadcastBus for RedisBroadcastBus {
	async fn publish(&self, bytes: Vec<u8>) -> Result<()> {
		let mut conn = self.pool.get().await?;
		conn.publish::<_, _, ()>(TOPIC, bytes).await?;
		Ok(())
	}

	/// A dedicated, non-pooled connection: pub/sub puts a Redis connection
	/// into a mode it can't leave, so it can never go back into the pool.
	async fn subscribe(&self) -> Result<BoxStream<'static, Vec<u8>>> {
		let client = deadpool_redis::redis::Client::open(self.redis_url.as_str())?;
		let mut pubsub = client.get_async_pubsub().await?;
		pubsub.subscribe(TOPIC).await?;

		let (tx, rx) = mpsc::unbounded_channel();
		tokio::spawn(async move {
			let mut stream = pubsub.into_on_message();
			while let Some(msg) = stream.next().await {
				let payload: Vec<u8> = match msg.get_payload() {
					Ok(payload) => payload,
					Err(_) => continue,
				};
				if tx.send(payload).is_err() {
					break;
				}
			}
		});

		Ok(UnboundedReceiverStream::new(rx).boxed())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::canvas::testutil::FakeBroadcastBus;

	#[tokio::test]
	async fn published_messages_reach_every_subscriber() {
		let bus = FakeBroadcastBus::new();
		let mut sub_a = bus.subscribe().await.unwrap();
		let mut sub_b = bus.subscribe().await.unwrap();

		bus.publish(b"hello".to_vec()).await.unwrap();

		assert_eq!(sub_a.next().await, Some(b"hello".to_vec()));
		assert_eq!(sub_b.next().await, Some(b"hello".to_vec()));
	}

	#[tokio::test]
	async fn a_full_subscriber_queue_drops_rather_than_blocks() {
		let bus = FakeBroadcastBus::with_capacity(1);
		let mut sub = bus.subscribe().await.unwrap();

		bus.publish(b"first".to_vec()).await.unwrap();
		bus.publish(b"second".to_vec()).await.unwrap();

		// The bounded fake drops the newest message once a subscriber's
		// queue is full, mirroring the fan-out's own drop policy (§4.5.5).
		assert_eq!(sub.next().await, Some(b"first".to_vec()));
	}
}
