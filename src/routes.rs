//! The acceptance endpoint (§4.5.1, §6): a single route that validates
//! the handshake query parameters and bearer token, then upgrades to a
//! WebSocket and hands the connection off to `socket::session::run`.

use serde::Deserialize;
use warp::{Filter, Rejection, Reply};

use crate::auth::is_valid_user_id;
use crate::config::CANVASES;
use crate::error::AuthError;
use crate::socket::session;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HandshakeQuery {
	user_id: String,
	canvas_identifier: String,
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = std::convert::Infallible> + Clone {
	warp::any().map(move || state.clone())
}

pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
	warp::path::end()
		.and(warp::ws())
		.and(warp::query::<HandshakeQuery>())
		.and(warp::header::optional::<String>("X-Auth-Token"))
		.and(with_state(state))
		.and_then(handshake)
}

async fn handshake(
	ws: warp::ws::Ws,
	query: HandshakeQuery,
	token: Option<String>,
	state: AppState,
) -> Result<impl Reply, Rejection> {
	if !is_valid_user_id(&query.user_id) {
		return Err(warp::reject::custom(AuthError::BadUserId));
	}

	let canvas = CANVASES.get(&query.canvas_identifier).cloned().ok_or_else(|| warp::reject::custom(AuthError::BadCanvas))?;

	let token = token.ok_or_else(|| warp::reject::custom(AuthError::MissingToken))?;
	state
		.verifier
		.authenticate(&token, &query.user_id)
		.map_err(warp::reject::custom)?;

	let user_id = query.user_id;
	Ok(ws.on_upgrade(move |socket| session::run(socket, state, user_id, canvas)))
}

pub async fn recover(rejection: Rejection) -> Result<impl Reply, std::convert::Infallible> {
	if let Some(err) = rejection.find::<AuthError>() {
		Ok(err.clone().into_response())
	} else if rejection.is_not_found() {
		Ok(warp::reply::with_status("not found", warp::http::StatusCode::NOT_FOUND).into_response())
	} else {
		Ok(warp::reply::with_status("internal error", warp::http::StatusCode::INTERNAL_SERVER_ERROR).into_response())
	}
}
