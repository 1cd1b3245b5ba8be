//! HTTP surface: `POST /exec` plus the discovery documents.

// crates.io
use axum::{
	Json, Router,
	body::Bytes,
	extract::State,
	http::{
		HeaderMap, HeaderValue, StatusCode,
		header::{ALLOW, AUTHORIZATION, WWW_AUTHENTICATE},
	},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use tokio::net::TcpListener;
// self
use crate::{
	_prelude::*,
	config::PROTECTED_RESOURCE_PATH,
	error::TransportError,
	gateway::{ErrorEnvelope, Gateway},
};

/// Path of the authorization-server metadata document.
pub const AUTHORIZATION_SERVER_PATH: &str = "/.well-known/oauth-authorization-server";
/// Path of the OpenID Provider configuration document.
pub const OPENID_CONFIGURATION_PATH: &str = "/.well-known/openid-configuration";

/// Routes every endpoint onto `gateway`.
pub fn router(gateway: Arc<Gateway>) -> Router {
	Router::new()
		.route("/exec", post(exec).fallback(method_not_allowed))
		.route(PROTECTED_RESOURCE_PATH, get(protected_resource))
		.route(AUTHORIZATION_SERVER_PATH, get(authorization_server))
		.route(OPENID_CONFIGURATION_PATH, get(openid_configuration))
		.with_state(gateway)
}

/// Serves [`router`] on the configured bind address until Ctrl+C.
pub async fn serve(gateway: Arc<Gateway>) -> Result<()> {
	let bind = gateway.config().server.bind;
	let listener = TcpListener::bind(bind).await.map_err(TransportError::from)?;

	tracing::info!(%bind, resource = %gateway.config().server.resource_url, "Gateway listening.");

	axum::serve(listener, router(gateway))
		.with_graceful_shutdown(shutdown_signal())
		.await
		.map_err(TransportError::from)?;

	tracing::info!("Gateway stopped.");

	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %e, "Failed to listen for the shutdown signal.");
	}
}

async fn exec(State(gateway): State<Arc<Gateway>>, headers: HeaderMap, body: Bytes) -> Response {
	let authorization = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());

	match gateway.execute(authorization, &body).await {
		Ok(response) => (StatusCode::OK, Json(response)).into_response(),
		Err(e) => error_response(&gateway, &e),
	}
}

async fn method_not_allowed() -> Response {
	let envelope = ErrorEnvelope {
		ok: false,
		error: "method_not_allowed",
		message: "Only POST is allowed on /exec.".into(),
		available_actions: None,
		details: None,
	};

	(StatusCode::METHOD_NOT_ALLOWED, [(ALLOW, "POST")], Json(envelope)).into_response()
}

async fn protected_resource(State(gateway): State<Arc<Gateway>>) -> Response {
	Json(&gateway.discovery().protected_resource).into_response()
}

async fn authorization_server(State(gateway): State<Arc<Gateway>>) -> Response {
	Json(&gateway.discovery().authorization_server).into_response()
}

async fn openid_configuration(State(gateway): State<Arc<Gateway>>) -> Response {
	Json(&gateway.discovery().openid_configuration).into_response()
}

fn error_response(gateway: &Gateway, error: &Error) -> Response {
	let status = StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::BAD_GATEWAY);

	if status.is_server_error() {
		tracing::warn!(code = error.code(), error = %error, "Request failed.");
	} else {
		tracing::debug!(code = error.code(), error = %error, "Request rejected.");
	}

	let mut response = (status, Json(ErrorEnvelope::from(error))).into_response();

	if let Some(challenge) =
		gateway.challenge_for(error).and_then(|challenge| HeaderValue::from_str(challenge).ok())
	{
		response.headers_mut().insert(WWW_AUTHENTICATE, challenge);
	}

	response
}
