use thiserror::Error;
use warp::http::StatusCode;
use warp::reject::Reject;
use warp::reply::Response;
use warp::Reply;

/// Every fallible operation in the server funnels into one of these. Each
/// variant wraps its underlying cause so the root error survives up to the
/// log line instead of being flattened into a string early.
#[derive(Debug, Error)]
pub enum AppError {
	#[error("redis error: {0}")]
	Redis(#[from] deadpool_redis::redis::RedisError),

	#[error("redis pool error: {0}")]
	RedisPool(#[from] deadpool_redis::PoolError),

	#[error("update log error: {0}")]
	UpdateLog(#[from] mongodb::error::Error),

	#[error("update log encoding error: {0}")]
	UpdateLogEncoding(#[from] mongodb::bson::ser::Error),

	#[error("update log decoding error: {0}")]
	UpdateLogDecoding(#[from] mongodb::bson::de::Error),

	#[error("token validation failed: {0}")]
	Auth(#[from] AuthError),

	#[error("malformed request: {0}")]
	Protocol(String),

	#[error("envelope decode error: {0}")]
	Decode(#[from] rmp_serde::decode::Error),

	#[error("envelope encode error: {0}")]
	Encode(#[from] rmp_serde::encode::Error),

	#[error("quota service error: {0}")]
	Quota(#[from] reqwest::Error),
}

#[derive(Debug, Error, Clone)]
pub enum AuthError {
	#[error("missing or malformed userId")]
	BadUserId,

	#[error("unknown canvasIdentifier")]
	BadCanvas,

	#[error("missing X-Auth-Token header")]
	MissingToken,

	#[error("token signature or claims invalid: {0}")]
	InvalidToken(#[from] jsonwebtoken::errors::Error),

	#[error("token subject does not match userId")]
	SubjectMismatch,
}

impl Reject for AuthError {}

impl Reply for AuthError {
	fn into_response(self) -> Response {
		let status = match self {
			AuthError::BadUserId | AuthError::BadCanvas => StatusCode::BAD_REQUEST,
			AuthError::MissingToken
			| AuthError::InvalidToken(_)
			| AuthError::SubjectMismatch => StatusCode::UNAUTHORIZED,
		};
		warp::reply::with_status(self.to_string(), status).into_response()
	}
}

pub type Result<T> = std::result::Result<T, AppError>;
