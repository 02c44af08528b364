//! In-memory fakes for the four store traits, standing in for Redis and
//! MongoDB in unit and placement-critical-path tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::canvas::bus::BroadcastBus;
use crate::canvas::cooldown::CooldownStore;
use crate::canvas::log::{Placement, UpdateLog};
use crate::canvas::store::CanvasStore;
use crate::error::Result;

pub struct FakeCanvasStore {
	grids: Mutex<HashMap<String, Vec<u8>>>,
}

impl FakeCanvasStore {
	pub fn new() -> Self {
		Self { grids: Mutex::new(HashMap::new()) }
	}
}

#[async_trait]
impl CanvasStore for FakeCanvasStore {
	async fn init_canvas(&self, canvas_id: &str, width: u32, height: u32) -> Result<()> {
		let mut grids = self.grids.lock().unwrap();
		grids.entry(canvas_id.to_string()).or_insert_with(|| vec![0u8; (width * height) as usize]);
		Ok(())
	}

	async fn set_pixel(&self, canvas_id: &str, pixel_id: u32, color: u8) -> Result<()> {
		let mut grids = self.grids.lock().unwrap();
		let grid = grids.entry(canvas_id.to_string()).or_insert_with(Vec::new);
		if grid.len() <= pixel_id as usize {
			grid.resize(pixel_id as usize + 1, 0);
		}
		grid[pixel_id as usize] = color;
		Ok(())
	}

	async fn get_canvas(&self, canvas_id: &str, width: u32, height: u32) -> Result<Vec<u8>> {
		let grids = self.grids.lock().unwrap();
		let mut snapshot = grids.get(canvas_id).cloned().unwrap_or_default();
		snapshot.resize((width * height) as usize, 0);
		Ok(snapshot)
	}
}

/// Entries carry a manual tick counter instead of wall-clock time so tests
/// can deterministically simulate expiry with [`FakeCooldownStore::advance`].
pub struct FakeCooldownStore {
	entries: Mutex<HashMap<String, (i64, u64)>>,
}

impl FakeCooldownStore {
	pub fn new() -> Self {
		Self { entries: Mutex::new(HashMap::new()) }
	}

	/// Advances every entry's remaining TTL by `secs`, evicting any that
	/// reach zero — simulating the store's own expiry sweep.
	pub fn advance(&self, secs: u64) {
		let mut entries = self.entries.lock().unwrap();
		entries.retain(|_, (_, remaining)| {
			if *remaining <= secs {
				false
			} else {
				*remaining -= secs;
				true
			}
		});
	}
}

#[async_trait]
impl CooldownStore for FakeCooldownStore {
	async fn set_with_ttl(&self, key: &str, expiry_unix_secs: i64, ttl_secs: u64) -> Result<()> {
		let mut entries = self.entries.lock().unwrap();
		entries.insert(key.to_string(), (expiry_unix_secs, ttl_secs));
		Ok(())
	}

	async fn check(&self, key: &str) -> Result<Option<i64>> {
		let entries = self.entries.lock().unwrap();
		Ok(entries.get(key).map(|(expiry, _)| *expiry))
	}
}

pub struct FakeUpdateLog {
	records: Mutex<HashMap<(String, u32), Placement>>,
}

impl FakeUpdateLog {
	pub fn new() -> Self {
		Self { records: Mutex::new(HashMap::new()) }
	}
}

#[async_trait]
impl UpdateLog for FakeUpdateLog {
	async fn upsert_placement(&self, canvas_id: &str, placement: &Placement) -> Result<()> {
		let mut records = self.records.lock().unwrap();
		records.insert((canvas_id.to_string(), placement.pixel_id), placement.clone());
		Ok(())
	}

	async fn read_placement(&self, canvas_id: &str, pixel_id: u32) -> Result<Option<Placement>> {
		let records = self.records.lock().unwrap();
		Ok(records.get(&(canvas_id.to_string(), pixel_id)).cloned())
	}
}

/// Fans published bytes out to every subscriber's bounded channel,
/// dropping silently on a full queue rather than blocking the publisher
/// — the same policy the real fan-out task enforces (§4.5.5).
pub struct FakeBroadcastBus {
	capacity: usize,
	subscribers: Mutex<Vec<mpsc::Sender<Vec<u8>>>>,
}

impl FakeBroadcastBus {
	pub fn new() -> Self {
		Self::with_capacity(16)
	}

	pub fn with_capacity(capacity: usize) -> Self {
		Self { capacity, subscribers: Mutex::new(Vec::new()) }
	}
}

#[async_trait]
impl BroadcastBus for FakeBroadcastBus {
	async fn publish(&self, bytes: Vec<u8>) -> Result<()> {
		let subscribers = self.subscribers.lock().unwrap();
		for sender in subscribers.iter() {
			let _ = sender.try_send(bytes.clone());
		}
		Ok(())
	}

	async fn subscribe(&self) -> Result<BoxStream<'static, Vec<u8>>> {
		let (tx, rx) = mpsc::channel(self.capacity);
		self.subscribers.lock().unwrap().push(tx);
		Ok(ReceiverStream::new(rx).boxed())
	}
}
