//! The external "pixels available" quota service (§6): consumed
//! read-only, treated as a black-box collaborator outside the core.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize)]
struct QuotaResponse {
	#[serde(rename = "pixelsAvailable")]
	pixels_available: i64,
}

#[derive(Clone)]
pub struct QuotaClient {
	http: reqwest::Client,
	base_url: Url,
}

impl QuotaClient {
	pub fn new(base_url: Url, timeout: Duration) -> Self {
		let http = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.expect("failed to build quota service HTTP client");
		Self { http, base_url }
	}

	/// A non-positive or failed response means zero: the quota service is
	/// consulted on a best-effort basis and never blocks placement.
	pub async fn pixels_available(&self, user_id: &str) -> u16 {
		let url = match self.base_url.join(&format!("getPixelsAvailable/{user_id}")) {
			Ok(url) => url,
			Err(_) => return 0,
		};

		let response = match self.http.get(url).send().await.and_then(|r| r.error_for_status()) {
			Ok(response) => response,
			Err(_) => return 0,
		};

		match response.json::<QuotaResponse>().await {
			Ok(body) => body.pixels_available.max(0).min(u16::MAX as i64) as u16,
			Err(_) => 0,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn negative_quota_clamps_to_zero() {
		let body = QuotaResponse { pixels_available: -5 };
		assert_eq!(body.pixels_available.max(0), 0);
	}
}
