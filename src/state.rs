//! The dependencies every session needs: the four stores, the quota
//! client, the token verifier, and the session registry. One instance is
//! built in `main` and cloned (cheaply, via `Arc`) into every filter.

use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::canvas::bus::BroadcastBus;
use crate::canvas::cooldown::CooldownStore;
use crate::canvas::log::UpdateLog;
use crate::canvas::placement::PlacementStores;
use crate::canvas::store::CanvasStore;
use crate::config::CanvasDef;
use crate::quota::QuotaClient;
use crate::socket::connections::Registry;

#[derive(Clone)]
pub struct AppState {
	pub canvas_store: Arc<dyn CanvasStore>,
	pub cooldown_store: Arc<dyn CooldownStore>,
	pub update_log: Arc<dyn UpdateLog>,
	pub bus: Arc<dyn BroadcastBus>,
	pub verifier: Arc<TokenVerifier>,
	pub quota: Arc<QuotaClient>,
	pub registry: Arc<Registry>,
	pub user_cooldown_secs: u64,
	pub pixel_cooldown_secs: u64,
	pub ping_interval_secs: u64,
	pub disconnect_after_secs: u64,
	pub outbound_queue_depth: usize,
}

impl AppState {
	pub fn placement_stores(&self) -> PlacementStores {
		PlacementStores {
			canvas_store: self.canvas_store.clone(),
			cooldown_store: self.cooldown_store.clone(),
			update_log: self.update_log.clone(),
			bus: self.bus.clone(),
			user_cooldown_secs: self.user_cooldown_secs,
			pixel_cooldown_secs: self.pixel_cooldown_secs,
		}
	}

	pub fn config_response(&self, canvas: &CanvasDef) -> crate::socket::packet::Response {
		crate::socket::packet::Response {
			canvas_width: Some(canvas.width),
			canvas_height: Some(canvas.height),
			user_cooldown: Some(self.user_cooldown_secs),
			pixel_cooldown: Some(self.pixel_cooldown_secs),
			ping_interval: Some(self.ping_interval_secs),
			disconnect_timeout: Some(self.disconnect_after_secs),
			..crate::socket::packet::Response::success("Config!")
		}
	}
}
