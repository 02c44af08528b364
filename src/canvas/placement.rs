//! The placement critical path (§4.5.4): validate, check both cooldowns,
//! then apply canvas write + cooldown writes + broadcast + log record in
//! the prescribed order, surfacing any failure as `Error` without
//! attempting to roll back earlier steps.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::canvas::bus::BroadcastBus;
use crate::canvas::cooldown::{pixel_key, user_key, CooldownStore};
use crate::canvas::log::{Placement, UpdateLog};
use crate::canvas::store::CanvasStore;
use crate::canvas::validate_placement;
use crate::config::CanvasDef;
use crate::socket::packet::Response;

pub struct PlacementStores {
	pub canvas_store: Arc<dyn CanvasStore>,
	pub cooldown_store: Arc<dyn CooldownStore>,
	pub update_log: Arc<dyn UpdateLog>,
	pub bus: Arc<dyn BroadcastBus>,
	pub user_cooldown_secs: u64,
	pub pixel_cooldown_secs: u64,
}

fn now_unix_secs() -> i64 {
	SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

/// Returns the reply the session should send back to the placing client.
/// The `ResponseCode::Update` broadcast to every *other* session on the
/// canvas is published to the bus as part of this call; the caller only
/// needs to send the returned reply back down its own connection.
pub async fn place(
	stores: &PlacementStores,
	canvas: &CanvasDef,
	user_id: &str,
	pixel_id: u32,
	color: u8,
) -> Response {
	if !validate_placement(canvas, pixel_id, color) {
		return Response::error("not a valid place tile request");
	}

	let now = now_unix_secs();

	match stores.cooldown_store.check(&user_key(user_id)).await {
		Ok(Some(expiry)) => return Response::user_cooldown((expiry - now).max(0)),
		Ok(None) => (),
		Err(_) => return Response::error("Error setting pixel!"),
	}

	match stores.cooldown_store.check(&pixel_key(&canvas.id, pixel_id)).await {
		Ok(Some(expiry)) => return Response::pixel_cooldown((expiry - now).max(0)),
		Ok(None) => (),
		Err(_) => return Response::error("Error setting pixel!"),
	}

	if stores.canvas_store.set_pixel(&canvas.id, pixel_id, color).await.is_err() {
		return Response::error("Error setting pixel!");
	}

	let user_expiry = now + stores.user_cooldown_secs as i64;
	let pixel_expiry = now + stores.pixel_cooldown_secs as i64;
	let update = Response::update(user_id.to_string(), pixel_id, color);
	let encoded = match crate::socket::packet::encode_bus_event(&canvas.id, &update) {
		Ok(bytes) => bytes,
		Err(_) => return Response::error("Error setting pixel!"),
	};

	let batch = tokio::try_join!(
		stores.cooldown_store.set_with_ttl(&user_key(user_id), user_expiry, stores.user_cooldown_secs),
		stores.cooldown_store.set_with_ttl(&pixel_key(&canvas.id, pixel_id), pixel_expiry, stores.pixel_cooldown_secs),
		stores.bus.publish(encoded),
	);
	if batch.is_err() {
		return Response::error("Error setting pixel!");
	}

	let placement = Placement { pixel_id, user_id: user_id.to_string(), color, timestamp: now };
	if stores.update_log.upsert_placement(&canvas.id, &placement).await.is_err() {
		return Response::error("Error setting pixel!");
	}

	Response::success("Pixel set!")
}
