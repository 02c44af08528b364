#[macro_use]
extern crate lazy_static;

mod auth;
mod canvas;
mod config;
mod error;
mod quota;
mod routes;
mod socket;
mod state;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::auth::TokenVerifier;
use crate::canvas::bus::{BroadcastBus, RedisBroadcastBus};
use crate::canvas::cooldown::{CooldownStore, RedisCooldownStore};
use crate::canvas::log::{MongoUpdateLog, UpdateLog};
use crate::canvas::store::{CanvasStore, RedisCanvasStore};
use crate::config::{CANVASES, CONFIG};
use crate::quota::QuotaClient;
use crate::socket::connections::Registry;
use crate::socket::{fanout, liveness};
use crate::state::AppState;

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt()
		.json()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	config::check();

	let pool_config = deadpool_redis::Config::from_url(CONFIG.redis_url.as_str());
	let redis_pool = pool_config
		.create_pool(Some(deadpool_redis::Runtime::Tokio1))
		.expect("failed to build the redis connection pool");

	let mongo_client = mongodb::Client::with_uri_str(CONFIG.mongo_url.as_str())
		.await
		.expect("failed to connect to mongodb");

	let canvas_store: Arc<dyn CanvasStore> = Arc::new(RedisCanvasStore::new(redis_pool.clone()));
	let cooldown_store: Arc<dyn CooldownStore> = Arc::new(RedisCooldownStore::new(redis_pool.clone()));
	let update_log: Arc<dyn UpdateLog> = Arc::new(MongoUpdateLog::new(mongo_client, "canvas"));
	let bus: Arc<dyn BroadcastBus> = Arc::new(RedisBroadcastBus::new(redis_pool.clone(), CONFIG.redis_url.to_string()));

	for def in CANVASES.values() {
		canvas_store
			.init_canvas(&def.id, def.width, def.height)
			.await
			.unwrap_or_else(|err| panic!("failed to initialise canvas {}: {err}", def.id));
	}

	let state = AppState {
		canvas_store,
		cooldown_store,
		update_log,
		bus: bus.clone(),
		verifier: Arc::new(TokenVerifier::new(&CONFIG.auth_secret)),
		quota: Arc::new(QuotaClient::new(
			CONFIG.quota_service_base_url.clone(),
			Duration::from_secs(CONFIG.quota_service_timeout_secs),
		)),
		registry: Arc::new(Registry::new()),
		user_cooldown_secs: CONFIG.user_cooldown_secs,
		pixel_cooldown_secs: CONFIG.pixel_cooldown_secs,
		ping_interval_secs: CONFIG.ping_interval_secs,
		disconnect_after_secs: CONFIG.disconnect_after_secs,
		outbound_queue_depth: CONFIG.outbound_queue_depth,
	};

	tokio::spawn(fanout::run(bus, state.registry.clone()));
	tokio::spawn(liveness::run(state.registry.clone(), CONFIG.disconnect_after_secs, Duration::from_secs(5)));

	let routes = routes::routes(state).recover(routes::recover);

	let binding = ([0, 0, 0, 0], CONFIG.port);
	let exit_signal = async {
		tokio::signal::ctrl_c().await.expect("ctrl+c interrupt error");
	};

	info!(host = %CONFIG.host, port = CONFIG.port, "starting canvas server");
	let (_, server) = warp::serve(routes).bind_with_graceful_shutdown(binding, exit_signal);
	server.await
}
