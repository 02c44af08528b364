//! Per-connection protocol state machine (§4.5): one reader task and one
//! writer task per session, talking the binary envelope defined in
//! `packet.rs` and driving the placement critical path.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;
use warp::ws::{Message, WebSocket};

use crate::config::CanvasDef;
use crate::socket::connections::SessionHandle;
use crate::socket::packet::{decode_request, encode_response, MessageType, Response};
use crate::state::AppState;

fn now_unix_secs() -> i64 {
	SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

/// Runs for the lifetime of one upgraded connection. `user_id` and
/// `canvas` have already been authenticated and resolved by the
/// handshake filter in `routes.rs`.
pub async fn run(socket: WebSocket, state: AppState, user_id: String, canvas: CanvasDef) {
	let (mut ws_tx, mut ws_rx) = socket.split();
	let (tx, mut rx) = mpsc::channel::<Vec<u8>>(state.outbound_queue_depth);

	let uuid = Uuid::new_v4();
	let handle = Arc::new(SessionHandle::new(uuid, user_id.clone(), canvas.id.clone(), tx, now_unix_secs()));
	state.registry.insert(handle.clone());
	info!(%uuid, %user_id, canvas_id = %canvas.id, "session connected");

	let writer = {
		let handle = handle.clone();
		let ping_interval = Duration::from_secs(state.ping_interval_secs.max(1));
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(ping_interval);
			loop {
				tokio::select! {
					_ = handle.cancelled() => break,
					_ = ticker.tick() => {
						if ws_tx.send(Message::ping(Vec::new())).await.is_err() {
							break;
						}
					}
					queued = rx.recv() => {
						match queued {
							Some(bytes) => {
								if ws_tx.send(Message::binary(bytes)).await.is_err() {
									break;
								}
							}
							None => break,
						}
					}
				}
			}
			let _ = ws_tx.close().await;
		})
	};

	loop {
		tokio::select! {
			_ = handle.cancelled() => break,
			next = ws_rx.next() => {
				match next {
					Some(Ok(message)) => {
						handle.touch(now_unix_secs());
						if message.is_close() {
							break;
						}
						// Transport-level WebSocket control frames; tungstenite answers
						// these itself. The app-level `Ping` (§4.5.2) travels inside a
						// binary frame and is handled by `dispatch` below.
						if message.is_ping() || message.is_pong() {
							continue;
						}
						if !message.is_binary() {
							send(&handle, Response::error("expected a binary frame"));
							continue;
						}

						let response = dispatch(&state, &canvas, &user_id, message.as_bytes()).await;
						match response {
							Dispatch::Reply(response) => send(&handle, response),
							Dispatch::Disconnect => break,
							Dispatch::NoReply => (),
						}
					}
					Some(Err(err)) => {
						warn!(%uuid, %err, "websocket read error; closing session");
						break;
					}
					None => break,
				}
			}
		}
	}

	state.registry.remove(&uuid);
	handle.close();
	writer.abort();
	info!(%uuid, %user_id, "session closed");
}

fn send(handle: &SessionHandle, response: Response) {
	match encode_response(&response) {
		Ok(bytes) => {
			let _ = handle.try_enqueue(bytes);
		}
		Err(err) => warn!(%err, "failed to encode a response"),
	}
}

enum Dispatch {
	Reply(Response),
	Disconnect,
	NoReply,
}

async fn dispatch(state: &AppState, canvas: &CanvasDef, user_id: &str, bytes: &[u8]) -> Dispatch {
	let request = match decode_request(bytes) {
		Ok(request) => request,
		Err(_) => return Dispatch::Reply(Response::error("malformed request")),
	};

	let message_type = match MessageType::try_from(request.message_type) {
		Ok(message_type) => message_type,
		Err(()) => return Dispatch::Reply(Response::error("unknown message type")),
	};

	match message_type {
		MessageType::GetConfig => Dispatch::Reply(state.config_response(canvas)),

		MessageType::GetCanvas => {
			match state.canvas_store.get_canvas(&canvas.id, canvas.width, canvas.height).await {
				Ok(bytes) => Dispatch::Reply(Response { canvas: Some(bytes), ..Response::success("Canvas!") }),
				Err(_) => Dispatch::Reply(Response::error("Error fetching canvas!")),
			}
		}

		MessageType::SetCanvas => {
			let (Some(pixel_id), Some(color)) = (request.pixel_id, request.color) else {
				return Dispatch::Reply(Response::error("not a valid place tile request"));
			};
			let stores = state.placement_stores();
			Dispatch::Reply(crate::canvas::placement::place(&stores, canvas, user_id, pixel_id, color).await)
		}

		MessageType::ViewPixel => {
			let Some(pixel_id) = request.pixel_id else {
				return Dispatch::Reply(Response::error("missing pixelId"));
			};
			match state.update_log.read_placement(&canvas.id, pixel_id).await {
				Ok(Some(placement)) => Dispatch::Reply(Response {
					user_id: Some(placement.user_id),
					pixel_id: Some(placement.pixel_id),
					color: Some(placement.color),
					..Response::success("Placement found!")
				}),
				Ok(None) => Dispatch::Reply(Response::success("Pixel empty!")),
				Err(_) => Dispatch::Reply(Response::error("Error reading pixel!")),
			}
		}

		MessageType::Disconnect => Dispatch::Disconnect,

		MessageType::Ping => Dispatch::Reply(Response::pong()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::auth::TokenVerifier;
	use crate::canvas::testutil::{FakeBroadcastBus, FakeCanvasStore, FakeCooldownStore, FakeUpdateLog};
	use crate::quota::QuotaClient;
	use crate::socket::connections::Registry;
	use crate::socket::packet::ResponseCode;
	use serde::Serialize;

	#[derive(Serialize)]
	struct WireRequest {
		message_type: u8,
		pixel_id: Option<u32>,
		color: Option<u8>,
	}

	fn encode(message_type: u8, pixel_id: Option<u32>, color: Option<u8>) -> Vec<u8> {
		rmp_serde::to_vec_named(&WireRequest { message_type, pixel_id, color }).unwrap()
	}

	fn state() -> AppState {
		AppState {
			canvas_store: Arc::new(FakeCanvasStore::new()),
			cooldown_store: Arc::new(FakeCooldownStore::new()),
			update_log: Arc::new(FakeUpdateLog::new()),
			bus: Arc::new(FakeBroadcastBus::new()),
			verifier: Arc::new(TokenVerifier::new("test-secret")),
			quota: Arc::new(QuotaClient::new("http://localhost/".parse().unwrap(), Duration::from_secs(1))),
			registry: Arc::new(Registry::new()),
			user_cooldown_secs: 10,
			pixel_cooldown_secs: 20,
			ping_interval_secs: 5,
			disconnect_after_secs: 30,
			outbound_queue_depth: 16,
		}
	}

	fn canvas() -> CanvasDef {
		CanvasDef { id: "REGULAR_CANVAS".to_string(), width: 200, height: 200, mask: None }
	}

	#[tokio::test]
	async fn an_app_level_ping_is_answered_with_a_pong() {
		let state = state();
		let bytes = encode(MessageType::Ping as u8, None, None);

		match dispatch(&state, &canvas(), "507f1f77bcf86cd799439011", &bytes).await {
			Dispatch::Reply(response) => assert_eq!(response.message_type, ResponseCode::Pong as u8),
			_ => panic!("expected a reply"),
		}
	}

	#[tokio::test]
	async fn an_unknown_tag_is_rejected_without_closing() {
		let state = state();
		let bytes = encode(250, None, None);

		match dispatch(&state, &canvas(), "507f1f77bcf86cd799439011", &bytes).await {
			Dispatch::Reply(response) => assert_eq!(response.message_type, ResponseCode::Error as u8),
			_ => panic!("expected a reply"),
		}
	}
}
