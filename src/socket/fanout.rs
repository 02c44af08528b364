//! The broadcast fan-out task (§4.5.5): the one subscriber to the
//! Broadcast Bus, pushing every event onto the outbound queue of each
//! live session on the matching canvas. Never blocks on a slow consumer.

use std::sync::Arc;

use futures_util::StreamExt;
use tracing::{trace, warn};

use crate::canvas::bus::BroadcastBus;
use crate::socket::connections::Registry;
use crate::socket::packet::decode_bus_event;

pub async fn run(bus: Arc<dyn BroadcastBus>, registry: Arc<Registry>) {
	let mut events = match bus.subscribe().await {
		Ok(stream) => stream,
		Err(err) => {
			warn!(%err, "broadcast bus subscription failed; fan-out task exiting");
			return;
		}
	};

	while let Some(bytes) = events.next().await {
		let event = match decode_bus_event(&bytes) {
			Ok(event) => event,
			Err(err) => {
				warn!(%err, "dropping undecodable broadcast event");
				continue;
			}
		};

		for session in registry.sessions_on_canvas(&event.canvas_id) {
			if !session.try_enqueue(event.payload.clone()) {
				trace!(uuid = %session.uuid, "dropping broadcast for a full outbound queue");
			}
		}
	}
}
