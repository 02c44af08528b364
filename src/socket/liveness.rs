//! The liveness task (§4.5.6, §9): probes idle sessions and forces their
//! close path once they exceed `DISCONNECT_AFTER_SECS` of inactivity.
//!
//! The original implementation this system is modelled on never swept
//! idle connections at all; carrying that forward would leave the
//! registry growing unbounded under churn, so this ticker is a deliberate
//! addition rather than a straight port.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::connections::Registry;

pub async fn run(registry: Arc<Registry>, disconnect_after_secs: u64, tick: Duration) {
	let mut interval = tokio::time::interval(tick);
	loop {
		interval.tick().await;
		let now = now_unix_secs();

		for session in registry.all() {
			if session.idle_for(now) >= disconnect_after_secs as i64 {
				debug!(uuid = %session.uuid, user_id = %session.user_id, "closing idle session");
				session.close();
				registry.remove(&session.uuid);
			}
		}
	}
}

fn now_unix_secs() -> i64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.unwrap_or_default()
		.as_secs() as i64
}
