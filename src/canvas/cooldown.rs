//! Cooldown Store (§4.2): keyed TTL entries for the user and pixel rate
//! limits. A present key blocks the next placement; the store's own
//! expiry sweep is authoritative, so a key with a "past" stored instant
//! is still treated as present until Redis actually evicts it.

use async_trait::async_trait;
use deadpool_redis::{redis, Pool};

use crate::error::Result;

#[async_trait]
pub trait CooldownStore: Send + Sync {
	/// Sets `key`'s value to `expiry_unix_secs` with a `ttl_secs` expiry,
	/// atomically.
	async fn set_with_ttl(&self, key: &str, expiry_unix_secs: i64, ttl_secs: u64) -> Result<()>;

	/// `Some(expiry_unix_secs)` if the key is present, `None` if free.
	async fn check(&self, key: &str) -> Result<Option<i64>>;
}

pub fn user_key(user_id: &str) -> String {
	format!("user:{user_id}")
}

pub fn pixel_key(canvas_id: &str, pixel_id: u32) -> String {
	format!("pixel:{canvas_id}:{pixel_id}")
}

#[derive(Clone)]
pub struct RedisCooldownStore {
	pool: Pool,
}

impl RedisCooldownStore {
	pub fn new(pool: Pool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl CooldownStore for RedisCooldownStore {
	async fn set_with_ttl(&self, key: &str, expiry_unix_secs: i64, ttl_secs: u64) -> Result<()> {
		let mut conn = self.pool.get().await?;
		redis::cmd("SET")
			.arg(key)
			.arg(expiry_unix_secs)
			.arg("EX")
			.arg(ttl_secs)
			.query_async::<_, ()>(&mut conn)
			.await?;
		Ok(())
	}

	async fn check(&self, key: &str) -> Result<Option<i64>> {
		let mut conn = self.pool.get().await?;
		let value: Option<i64> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
		Ok(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::canvas::testutil::FakeCooldownStore;

	#[test]
	fn key_shapes() {
		assert_eq!(user_key("u1"), "user:u1");
		assert_eq!(pixel_key("REGULAR_CANVAS", 42), "pixel:REGULAR_CANVAS:42");
	}

	#[tokio::test]
	async fn absent_key_reports_free() {
		let store = FakeCooldownStore::new();
		assert_eq!(store.check("user:u1").await.unwrap(), None);
	}

	#[tokio::test]
	async fn present_key_reports_its_expiry() {
		let store = FakeCooldownStore::new();
		store.set_with_ttl("user:u1", 1_700_000_010, 10).await.unwrap();
		assert_eq!(store.check("user:u1").await.unwrap(), Some(1_700_000_010));
	}

	#[tokio::test]
	async fn ttl_expiry_clears_presence() {
		let store = FakeCooldownStore::new();
		store.set_with_ttl("user:u1", 1_700_000_010, 0).await.unwrap();
		store.advance(1);
		assert_eq!(store.check("user:u1").await.unwrap(), None);
	}
}
