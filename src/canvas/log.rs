//! Update Log (§4.3): the durable "latest placement" record, one document
//! per `(canvasId, pixelId)`, replaced on every new placement (upsert by
//! pixelId, never appended).

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::options::{FindOneOptions, UpdateOptions};
use mongodb::Client;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
	pub pixel_id: u32,
	pub user_id: String,
	pub color: u8,
	/// Seconds since epoch.
	pub timestamp: i64,
}

#[async_trait]
pub trait UpdateLog: Send + Sync {
	/// Replaces any existing record keyed by `(canvasId, pixelId)`.
	async fn upsert_placement(&self, canvas_id: &str, placement: &Placement) -> Result<()>;

	/// One record, or `None` if nothing has ever been placed there.
	async fn read_placement(&self, canvas_id: &str, pixel_id: u32) -> Result<Option<Placement>>;
}

#[derive(Clone)]
pub struct MongoUpdateLog {
	client: Client,
	database: String,
}

impl MongoUpdateLog {
	pub fn new(client: Client, database: impl Into<String>) -> Self {
		Self { client, database: database.into() }
	}

	fn collection(&self, canvas_id: &str) -> mongodb::Collection<Placement> {
		self.client.database(&self.database).collection(canvas_id)
	}
}

#[async_trait]
impl UpdateLog for MongoUpdateLog {
	async fn upsert_placement(&self, canvas_id: &str, placement: &Placement) -> Result<()> {
		let filter = doc! { "pixel_id": placement.pixel_id as i64 };
		let update = doc! { "$set": {
			"pixel_id": placement.pixel_id as i64,
			"user_id": &placement.user_id,
			"color": placement.color as i32,
			"timestamp": placement.timestamp,
		}};
		self.collection(canvas_id)
			.update_one(filter, update, UpdateOptions::builder().upsert(true).build())
			.await?;
		Ok(())
	}

	async fn read_placement(&self, canvas_id: &str, pixel_id: u32) -> Result<Option<Placement>> {
		let filter = doc! { "pixel_id": pixel_id as i64 };
		let placement = self
			.collection(canvas_id)
			.find_one(filter, FindOneOptions::default())
			.await?;
		Ok(placement)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::canvas::testutil::FakeUpdateLog;

	fn placement(pixel_id: u32) -> Placement {
		Placement { pixel_id, user_id: "507f1f77bcf86cd799439011".to_string(), color: 4, timestamp: 1_700_000_000 }
	}

	#[tokio::test]
	async fn missing_pixel_reads_as_absent() {
		let log = FakeUpdateLog::new();
		assert_eq!(log.read_placement("REGULAR_CANVAS", 999_999).await.unwrap(), None);
	}

	#[tokio::test]
	async fn upsert_replaces_the_prior_record() {
		let log = FakeUpdateLog::new();
		log.upsert_placement("REGULAR_CANVAS", &placement(10)).await.unwrap();

		let mut second = placement(10);
		second.color = 9;
		second.timestamp = 1_700_000_050;
		log.upsert_placement("REGULAR_CANVAS", &second).await.unwrap();

		let stored = log.read_placement("REGULAR_CANVAS", 10).await.unwrap().unwrap();
		assert_eq!(stored.color, 9);
		assert_eq!(stored.timestamp, 1_700_000_050);
	}

	#[tokio::test]
	async fn canvases_are_isolated_namespaces() {
		let log = FakeUpdateLog::new();
		log.upsert_placement("REGULAR_CANVAS", &placement(10)).await.unwrap();
		assert_eq!(log.read_placement("INDIA_CANVAS", 10).await.unwrap(), None);
	}
}
