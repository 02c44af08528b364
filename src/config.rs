use std::collections::HashMap;
use std::fs;

use serde::Deserialize;
use url::Url;

#[derive(Deserialize)]
pub struct Config {
	pub host: String,
	pub port: u16,
	pub redis_url: Url,
	pub mongo_url: Url,
	pub auth_secret: String,

	#[serde(default = "default_canvas_width")]
	pub canvas_width: u32,
	#[serde(default = "default_canvas_height")]
	pub canvas_height: u32,
	/// Comma-separated canvas ids, e.g. "REGULAR_CANVAS,INDIA_CANVAS".
	#[serde(default = "default_canvases")]
	pub canvases: String,
	/// Comma-separated `canvasId=WIDTHxHEIGHT` pairs for canvases whose
	/// dimensions differ from `canvas_width`/`canvas_height`.
	#[serde(default)]
	pub canvas_dimensions: String,
	/// Comma-separated `canvasId=/path/to/mask` pairs for canvases whose
	/// placement mask differs from the implicit all-ones mask.
	#[serde(default)]
	pub masked_canvases: String,

	#[serde(default = "default_user_cooldown")]
	pub user_cooldown_secs: u64,
	#[serde(default = "default_pixel_cooldown")]
	pub pixel_cooldown_secs: u64,
	#[serde(default = "default_ping_interval")]
	pub ping_interval_secs: u64,
	#[serde(default = "default_disconnect_after")]
	pub disconnect_after_secs: u64,
	#[serde(default = "default_worker_pool_size")]
	pub reader_worker_pool_size: usize,
	#[serde(default = "default_queue_depth")]
	pub outbound_queue_depth: usize,

	pub quota_service_base_url: Url,
	#[serde(default = "default_quota_timeout")]
	pub quota_service_timeout_secs: u64,
}

fn default_canvas_width() -> u32 { 200 }
fn default_canvas_height() -> u32 { 200 }
fn default_canvases() -> String { "REGULAR_CANVAS".to_string() }
fn default_user_cooldown() -> u64 { 10 }
fn default_pixel_cooldown() -> u64 { 20 }
fn default_ping_interval() -> u64 { 5 }
fn default_disconnect_after() -> u64 { 30 }
fn default_worker_pool_size() -> usize { 150 }
fn default_queue_depth() -> usize { 256 }
fn default_quota_timeout() -> u64 { 3 }

lazy_static! {
	pub static ref CONFIG: Config = {
		dotenvy::dotenv().ok();
		envy::from_env::<Config>().expect("Incomplete config setup")
	};
}

/// A single named grid: its dimensions and, if it isn't a plain rectangle,
/// the placement mask carved out of configuration at boot.
#[derive(Debug, Clone)]
pub struct CanvasDef {
	pub id: String,
	pub width: u32,
	pub height: u32,
	pub mask: Option<Vec<u8>>,
}

impl CanvasDef {
	pub fn len(&self) -> usize {
		(self.width * self.height) as usize
	}

	pub fn is_placeable(&self, pixel_id: u32) -> bool {
		if pixel_id as usize >= self.len() {
			return false;
		}
		match &self.mask {
			Some(mask) => mask.get(pixel_id as usize).copied() == Some(1),
			None => true,
		}
	}
}

fn parse_masked_canvases() -> HashMap<String, Vec<u8>> {
	let mut masks = HashMap::new();
	for entry in CONFIG.masked_canvases.split(',') {
		let entry = entry.trim();
		if entry.is_empty() {
			continue;
		}
		let Some((canvas_id, path)) = entry.split_once('=') else {
			panic!("Malformed MASKED_CANVASES entry: {entry}");
		};
		let bytes = fs::read(path)
			.unwrap_or_else(|err| panic!("Failed to read mask file {path}: {err}"));
		masks.insert(canvas_id.to_string(), bytes);
	}
	masks
}

/// Parses `CANVAS_DIMENSIONS` (`canvasId=WIDTHxHEIGHT` pairs) so a
/// deployment can mix canvases of different sizes in one process rather
/// than sharing one global `canvas_width`/`canvas_height`.
fn parse_canvas_dimensions() -> HashMap<String, (u32, u32)> {
	let mut dimensions = HashMap::new();
	for entry in CONFIG.canvas_dimensions.split(',') {
		let entry = entry.trim();
		if entry.is_empty() {
			continue;
		}
		let Some((canvas_id, size)) = entry.split_once('=') else {
			panic!("Malformed CANVAS_DIMENSIONS entry: {entry}");
		};
		let Some((width, height)) = size.split_once('x') else {
			panic!("Malformed CANVAS_DIMENSIONS size for {canvas_id}: {size}");
		};
		let width: u32 = width.parse().unwrap_or_else(|_| panic!("Bad width in CANVAS_DIMENSIONS for {canvas_id}: {width}"));
		let height: u32 = height.parse().unwrap_or_else(|_| panic!("Bad height in CANVAS_DIMENSIONS for {canvas_id}: {height}"));
		dimensions.insert(canvas_id.to_string(), (width, height));
	}
	dimensions
}

lazy_static! {
	pub static ref CANVASES: HashMap<String, CanvasDef> = {
		let masks = parse_masked_canvases();
		let dimensions = parse_canvas_dimensions();
		CONFIG.canvases
			.split(',')
			.map(str::trim)
			.filter(|id| !id.is_empty())
			.map(|id| {
				let mask = masks.get(id).cloned();
				let (width, height) = dimensions.get(id).copied()
					.unwrap_or((CONFIG.canvas_width, CONFIG.canvas_height));
				(id.to_string(), CanvasDef {
					id: id.to_string(),
					width,
					height,
					mask,
				})
			})
			.collect()
	};
}

pub fn check() {
	if CONFIG.host.is_empty() {
		panic!("Missing HOST value");
	}

	if CONFIG.auth_secret.is_empty() {
		panic!("Missing AUTH_SECRET value");
	}

	if CANVASES.is_empty() {
		panic!("CANVASES resolved to an empty canvas set");
	}

	for canvas in CANVASES.values() {
		if let Some(mask) = &canvas.mask {
			assert_eq!(
				mask.len(),
				canvas.len(),
				"mask for canvas {} has the wrong length",
				canvas.id,
			);
		}
	}
}
