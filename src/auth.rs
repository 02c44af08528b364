//! Bearer token verification for the handshake (§4.5.1).
//!
//! Identity issuance lives outside this process; we only verify the
//! HMAC signature on `X-Auth-Token` and check that its subject claim
//! matches the `userId` query parameter the client also supplied.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::error::AuthError;

#[derive(Debug, Deserialize)]
pub struct Identity {
	pub sub: String,
	pub exp: u64,
}

/// Verifies the HMAC-signed bearer token against a fixed symmetric key.
/// One instance is built at startup from the configured auth secret and
/// shared behind an `Arc` across every handshake.
pub struct TokenVerifier {
	decoding_key: DecodingKey,
	validation: Validation,
}

impl TokenVerifier {
	pub fn new(secret: &str) -> Self {
		Self {
			decoding_key: DecodingKey::from_secret(secret.as_bytes()),
			validation: Validation::new(Algorithm::HS256),
		}
	}

	/// Validates `token` and checks its `sub` claim against `expected_user_id`.
	pub fn authenticate(&self, token: &str, expected_user_id: &str) -> Result<Identity, AuthError> {
		let data = decode::<Identity>(token, &self.decoding_key, &self.validation)?;

		if data.claims.sub != expected_user_id {
			return Err(AuthError::SubjectMismatch);
		}

		Ok(data.claims)
	}
}

/// `userId` is expected to look like a 24-character hex ObjectId, matching
/// the identifiers minted by the external identity issuer.
pub fn is_valid_user_id(user_id: &str) -> bool {
	user_id.len() == 24 && user_id.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
	use super::*;
	use jsonwebtoken::{encode, EncodingKey, Header};
	use serde::Serialize;

	#[derive(Serialize)]
	struct Claims<'a> {
		sub: &'a str,
		exp: u64,
	}

	const SECRET: &str = "test-secret";

	fn token_for(sub: &str) -> String {
		encode(
			&Header::new(Algorithm::HS256),
			&Claims { sub, exp: 9_999_999_999 },
			&EncodingKey::from_secret(SECRET.as_bytes()),
		)
		.unwrap()
	}

	#[test]
	fn valid_user_id_shape() {
		assert!(is_valid_user_id("507f1f77bcf86cd799439011"));
		assert!(!is_valid_user_id("not-hex-and-wrong-length"));
		assert!(!is_valid_user_id("507f1f77bcf86cd79943901")); // 23 chars
	}

	#[test]
	fn authenticate_matches_subject() {
		let verifier = TokenVerifier::new(SECRET);
		let token = token_for("507f1f77bcf86cd799439011");
		let identity = verifier.authenticate(&token, "507f1f77bcf86cd799439011").unwrap();
		assert_eq!(identity.sub, "507f1f77bcf86cd799439011");
	}

	#[test]
	fn authenticate_rejects_subject_mismatch() {
		let verifier = TokenVerifier::new(SECRET);
		let token = token_for("507f1f77bcf86cd799439011");
		let err = verifier.authenticate(&token, "000000000000000000000000").unwrap_err();
		assert!(matches!(err, AuthError::SubjectMismatch));
	}

	#[test]
	fn authenticate_rejects_wrong_key() {
		let verifier = TokenVerifier::new("a-different-secret");
		let token = token_for("507f1f77bcf86cd799439011");
		let err = verifier.authenticate(&token, "507f1f77bcf86cd799439011").unwrap_err();
		assert!(matches!(err, AuthError::InvalidToken(_)));
	}
}
