//! The session registry (§9, "Session registry as a global"): a
//! thread-safe set of live sessions addressable by the broadcast fan-out
//! task and the liveness task, keyed by session identity.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, RwLock};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// What the registry and the liveness task need of a session: an
/// outbound queue to enqueue onto, and a clock to judge idleness by.
/// Nothing here ever blocks — enqueue is the only write surface other
/// tasks get onto a session's connection.
pub struct SessionHandle {
	pub uuid: Uuid,
	pub user_id: String,
	pub canvas_id: String,
	sender: mpsc::Sender<Vec<u8>>,
	last_activity_unix_secs: AtomicI64,
	cancel: CancellationToken,
}

impl SessionHandle {
	pub fn new(uuid: Uuid, user_id: String, canvas_id: String, sender: mpsc::Sender<Vec<u8>>, now: i64) -> Self {
		Self {
			uuid,
			user_id,
			canvas_id,
			sender,
			last_activity_unix_secs: AtomicI64::new(now),
			cancel: CancellationToken::new(),
		}
	}

	/// Signals the session's reader and writer tasks to tear down; used by
	/// the liveness sweep and by the reader loop's own fatal-error paths.
	pub fn close(&self) {
		self.cancel.cancel();
	}

	pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
		self.cancel.cancelled()
	}

	pub fn touch(&self, now: i64) {
		self.last_activity_unix_secs.store(now, Ordering::Relaxed);
	}

	pub fn idle_for(&self, now: i64) -> i64 {
		now - self.last_activity_unix_secs.load(Ordering::Relaxed)
	}

	/// A full queue is dropped rather than awaited: the fan-out task must
	/// never stall behind one slow consumer (§4.5.5).
	pub fn try_enqueue(&self, bytes: Vec<u8>) -> bool {
		self.sender.try_send(bytes).is_ok()
	}
}

#[derive(Default)]
pub struct Registry {
	sessions: RwLock<HashMap<Uuid, std::sync::Arc<SessionHandle>>>,
	by_canvas: Mutex<HashMap<String, Vec<Uuid>>>,
}

impl Registry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&self, handle: std::sync::Arc<SessionHandle>) {
		let uuid = handle.uuid;
		let canvas_id = handle.canvas_id.clone();
		self.sessions.write().unwrap().insert(uuid, handle);
		self.by_canvas.lock().unwrap().entry(canvas_id).or_default().push(uuid);
	}

	pub fn remove(&self, uuid: &Uuid) {
		let removed = self.sessions.write().unwrap().remove(uuid);
		if let Some(handle) = removed {
			if let Some(list) = self.by_canvas.lock().unwrap().get_mut(&handle.canvas_id) {
				list.retain(|id| id != uuid);
			}
		}
	}

	pub fn get(&self, uuid: &Uuid) -> Option<std::sync::Arc<SessionHandle>> {
		self.sessions.read().unwrap().get(uuid).cloned()
	}

	/// Every live session on `canvas_id`, for the broadcast fan-out.
	pub fn sessions_on_canvas(&self, canvas_id: &str) -> Vec<std::sync::Arc<SessionHandle>> {
		let sessions = self.sessions.read().unwrap();
		let by_canvas = self.by_canvas.lock().unwrap();
		by_canvas
			.get(canvas_id)
			.into_iter()
			.flatten()
			.filter_map(|uuid| sessions.get(uuid).cloned())
			.collect()
	}

	/// Every live session, for the liveness sweep.
	pub fn all(&self) -> Vec<std::sync::Arc<SessionHandle>> {
		self.sessions.read().unwrap().values().cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.sessions.read().unwrap().len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn handle(uuid: Uuid, canvas_id: &str) -> (std::sync::Arc<SessionHandle>, mpsc::Receiver<Vec<u8>>) {
		let (tx, rx) = mpsc::channel(4);
		(std::sync::Arc::new(SessionHandle::new(uuid, "u1".to_string(), canvas_id.to_string(), tx, 0)), rx)
	}

	#[test]
	fn insert_then_remove_clears_both_indexes() {
		let registry = Registry::new();
		let id = Uuid::new_v4();
		let (h, _rx) = handle(id, "REGULAR_CANVAS");
		registry.insert(h);

		assert_eq!(registry.len(), 1);
		assert_eq!(registry.sessions_on_canvas("REGULAR_CANVAS").len(), 1);

		registry.remove(&id);
		assert_eq!(registry.len(), 0);
		assert!(registry.sessions_on_canvas("REGULAR_CANVAS").is_empty());
	}

	#[test]
	fn sessions_on_canvas_only_returns_that_canvas() {
		let registry = Registry::new();
		let (a, _rx_a) = handle(Uuid::new_v4(), "REGULAR_CANVAS");
		let (b, _rx_b) = handle(Uuid::new_v4(), "INDIA_CANVAS");
		registry.insert(a);
		registry.insert(b);

		assert_eq!(registry.sessions_on_canvas("REGULAR_CANVAS").len(), 1);
		assert_eq!(registry.sessions_on_canvas("INDIA_CANVAS").len(), 1);
	}

	#[test]
	fn a_full_queue_is_reported_back_as_a_failed_enqueue() {
		let (tx, _rx) = mpsc::channel(1);
		let handle = SessionHandle::new(Uuid::new_v4(), "u1".to_string(), "REGULAR_CANVAS".to_string(), tx, 0);

		assert!(handle.try_enqueue(b"first".to_vec()));
		assert!(!handle.try_enqueue(b"second".to_vec()));
	}

	#[test]
	fn idleness_tracks_the_last_touch() {
		let (tx, _rx) = mpsc::channel(1);
		let handle = SessionHandle::new(Uuid::new_v4(), "u1".to_string(), "REGULAR_CANVAS".to_string(), tx, 100);
		assert_eq!(handle.idle_for(130), 30);

		handle.touch(130);
		assert_eq!(handle.idle_for(140), 10);
	}
}
