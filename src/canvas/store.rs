//! Canvas Store (§4.1): a dense pixel grid per canvas, addressed by ordinal
//! `pixelId` rather than by hash, backed by a Redis `BITFIELD` string.

use async_trait::async_trait;
use deadpool_redis::{redis, Pool};

use crate::error::Result;

#[async_trait]
pub trait CanvasStore: Send + Sync {
	/// Ensures `canvasId`'s backing key exists, zero-initialised, without
	/// clobbering any pixels already placed. Idempotent.
	async fn init_canvas(&self, canvas_id: &str, width: u32, height: u32) -> Result<()>;

	/// Writes one 8-bit cell. O(1); no ordering guarantee against a
	/// concurrent `set_pixel` on the same cell beyond last-write-wins.
	async fn set_pixel(&self, canvas_id: &str, pixel_id: u32, color: u8) -> Result<()>;

	/// Returns a dense snapshot of `width*height` bytes. Not guaranteed to
	/// be atomic against concurrent writes.
	async fn get_canvas(&self, canvas_id: &str, width: u32, height: u32) -> Result<Vec<u8>>;
}

#[derive(Clone)]
pub struct RedisCanvasStore {
	pool: Pool,
}

impl RedisCanvasStore {
	pub fn new(pool: Pool) -> Self {
		Self { pool }
	}

	fn key(canvas_id: &str) -> String {
		format!("canvas:{canvas_id}")
	}
}

#[async_trait]
impl CanvasStore for RedisCanvasStore {
	async fn init_canvas(&self, canvas_id: &str, width: u32, height: u32) -> Result<()> {
		let mut conn = self.pool.get().await?;
		let len = (width * height) as usize;

		// SETNX-style guard: only zero-fill if the key is entirely absent,
		// so a restart never overwrites an already-populated canvas.
		let exists: bool = redis::cmd("EXISTS")
			.arg(Self::key(canvas_id))
			.query_async(&mut conn)
			.await?;
		if exists {
			return Ok(());
		}

		redis::cmd("SETRANGE")
			.arg(Self::key(canvas_id))
			.arg(len.saturating_sub(1))
			.arg(&[0u8])
			.query_async::<_, ()>(&mut conn)
			.await?;
		Ok(())
	}

	async fn set_pixel(&self, canvas_id: &str, pixel_id: u32, color: u8) -> Result<()> {
		let mut conn = self.pool.get().await?;
		redis::cmd("BITFIELD")
			.arg(Self::key(canvas_id))
			.arg("SET")
			.arg("u8")
			.arg(format!("#{pixel_id}"))
			.arg(color)
			.query_async::<_, Vec<i64>>(&mut conn)
			.await?;
		Ok(())
	}

	async fn get_canvas(&self, canvas_id: &str, width: u32, height: u32) -> Result<Vec<u8>> {
		let mut conn = self.pool.get().await?;
		let raw: Option<Vec<u8>> = redis::cmd("GET")
			.arg(Self::key(canvas_id))
			.query_async(&mut conn)
			.await?;

		let len = (width * height) as usize;
		let mut bytes = raw.unwrap_or_default();
		bytes.resize(len, 0);
		Ok(bytes)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::canvas::testutil::FakeCanvasStore;

	#[tokio::test]
	async fn set_then_get_reflects_the_write() {
		let store = FakeCanvasStore::new();
		store.init_canvas("REGULAR_CANVAS", 10, 10).await.unwrap();
		store.set_pixel("REGULAR_CANVAS", 42, 7).await.unwrap();

		let snapshot = store.get_canvas("REGULAR_CANVAS", 10, 10).await.unwrap();
		assert_eq!(snapshot.len(), 100);
		assert_eq!(snapshot[42], 7);
	}

	#[tokio::test]
	async fn init_canvas_is_idempotent() {
		let store = FakeCanvasStore::new();
		store.init_canvas("REGULAR_CANVAS", 10, 10).await.unwrap();
		store.set_pixel("REGULAR_CANVAS", 0, 3).await.unwrap();
		store.init_canvas("REGULAR_CANVAS", 10, 10).await.unwrap();

		let snapshot = store.get_canvas("REGULAR_CANVAS", 10, 10).await.unwrap();
		assert_eq!(snapshot[0], 3);
	}
}
