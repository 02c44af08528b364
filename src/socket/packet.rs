//! The wire envelope (§4.6): one schema, MessagePack-encoded, carried
//! inside WebSocket binary frames — the frame boundary itself is the
//! length prefix, so the envelope never repeats one on the wire.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Request tags. `GET_CONFIG` sits at 0 so a client can request the
/// server's cooldown/dimension constants before anything else. `Ping` is
/// the application-level liveness probe of §4.5.2/§4.5.7 — distinct from
/// any transport-level WebSocket control frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
	GetConfig = 0,
	GetCanvas = 1,
	SetCanvas = 2,
	ViewPixel = 3,
	Disconnect = 4,
	Ping = 5,
}

impl TryFrom<u8> for MessageType {
	type Error = ();

	fn try_from(value: u8) -> std::result::Result<Self, ()> {
		match value {
			0 => Ok(MessageType::GetConfig),
			1 => Ok(MessageType::GetCanvas),
			2 => Ok(MessageType::SetCanvas),
			3 => Ok(MessageType::ViewPixel),
			4 => Ok(MessageType::Disconnect),
			5 => Ok(MessageType::Ping),
			_ => Err(()),
		}
	}
}

/// Response codes (§6). `Update` is only ever sent unsolicited, by the
/// broadcast fan-out, never as a direct reply to a request. `Pong` is the
/// reply to an app-level `Ping` (§4.5.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseCode {
	Success = 1,
	UserCooldown = 2,
	PixelCooldown = 3,
	Update = 4,
	NotFound = 5,
	Error = 6,
	Pong = 7,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Request {
	pub message_type: u8,
	#[serde(default)]
	pub pixel_id: Option<u32>,
	#[serde(default)]
	pub color: Option<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
	pub message_type: u8,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub canvas: Option<Vec<u8>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub user_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub pixel_id: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub color: Option<u8>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub canvas_width: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub canvas_height: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub user_cooldown: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub pixel_cooldown: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ping_interval: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub disconnect_timeout: Option<u64>,
}

impl Response {
	pub fn new(code: ResponseCode, message: impl Into<String>) -> Self {
		Self { message_type: code as u8, message: message.into(), ..Default::default() }
	}

	pub fn success(message: impl Into<String>) -> Self {
		Self::new(ResponseCode::Success, message)
	}

	pub fn error(message: impl Into<String>) -> Self {
		Self::new(ResponseCode::Error, message)
	}

	pub fn user_cooldown(remaining_secs: i64) -> Self {
		Self::new(ResponseCode::UserCooldown, format!("Wait {remaining_secs}s before placing another pixel!"))
	}

	pub fn pixel_cooldown(remaining_secs: i64) -> Self {
		Self::new(ResponseCode::PixelCooldown, format!("Pixel is on cooldown for {remaining_secs}s!"))
	}

	pub fn update(user_id: String, pixel_id: u32, color: u8) -> Self {
		Self {
			user_id: Some(user_id),
			pixel_id: Some(pixel_id),
			color: Some(color),
			..Self::new(ResponseCode::Update, "Pixel updated!")
		}
	}

	pub fn pong() -> Self {
		Self::new(ResponseCode::Pong, "Pong!")
	}
}

pub fn decode_request(bytes: &[u8]) -> Result<Request> {
	rmp_serde::from_slice(bytes).map_err(AppError::from)
}

pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
	rmp_serde::to_vec_named(response).map_err(AppError::from)
}

/// What actually travels on the Broadcast Bus (§4.4). The client-facing
/// `Response` envelope has no room for `canvasId` — clients only ever
/// subscribe to their own canvas implicitly — but the fan-out task still
/// needs it to route a bus message to the right sessions, since pixelId
/// ranges are reused across canvases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
	pub canvas_id: String,
	pub payload: Vec<u8>,
}

pub fn encode_bus_event(canvas_id: &str, response: &Response) -> Result<Vec<u8>> {
	let payload = encode_response(response)?;
	let event = BusEvent { canvas_id: canvas_id.to_string(), payload };
	rmp_serde::to_vec_named(&event).map_err(AppError::from)
}

pub fn decode_bus_event(bytes: &[u8]) -> Result<BusEvent> {
	rmp_serde::from_slice(bytes).map_err(AppError::from)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn message_type_round_trips_through_its_tag() {
		assert_eq!(MessageType::try_from(0), Ok(MessageType::GetConfig));
		assert_eq!(MessageType::try_from(2), Ok(MessageType::SetCanvas));
		assert_eq!(MessageType::try_from(4), Ok(MessageType::Disconnect));
		assert_eq!(MessageType::try_from(5), Ok(MessageType::Ping));
		assert_eq!(MessageType::try_from(6), Err(()));
	}

	#[test]
	fn pong_replies_with_the_pong_response_code() {
		let response = Response::pong();
		assert_eq!(response.message_type, ResponseCode::Pong as u8);
	}

	#[test]
	fn request_decodes_from_encoded_bytes() {
		#[derive(Serialize)]
		struct Wire {
			message_type: u8,
			pixel_id: Option<u32>,
			color: Option<u8>,
		}
		let wire = Wire { message_type: 2, pixel_id: Some(42), color: Some(7) };
		let bytes = rmp_serde::to_vec_named(&wire).unwrap();

		let request = decode_request(&bytes).unwrap();
		assert_eq!(request.message_type, 2);
		assert_eq!(request.pixel_id, Some(42));
		assert_eq!(request.color, Some(7));
	}

	#[test]
	fn malformed_bytes_fail_to_decode() {
		assert!(decode_request(&[0xff, 0x00, 0x01]).is_err());
	}

	#[test]
	fn response_omits_fields_that_do_not_apply() {
		let response = Response::success("Pixel set!");
		let bytes = encode_response(&response).unwrap();
		assert!(response.canvas.is_none());
		assert!(!bytes.is_empty());
	}

	#[test]
	fn bus_event_round_trips_with_its_canvas_id() {
		let update = Response::update("507f1f77bcf86cd799439011".to_string(), 10, 3);
		let bytes = encode_bus_event("REGULAR_CANVAS", &update).unwrap();

		let event = decode_bus_event(&bytes).unwrap();
		assert_eq!(event.canvas_id, "REGULAR_CANVAS");

		let decoded: Response = rmp_serde::from_slice(&event.payload).unwrap();
		assert_eq!(decoded.pixel_id, Some(10));
	}

	#[test]
	fn update_response_carries_the_placement() {
		let response = Response::update("507f1f77bcf86cd799439011".to_string(), 10, 3);
		assert_eq!(response.message_type, ResponseCode::Update as u8);
		assert_eq!(response.pixel_id, Some(10));
		assert_eq!(response.color, Some(3));
	}
}
