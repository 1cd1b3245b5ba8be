mod common;

// std
use std::sync::Arc;
// crates.io
use action_gateway::{
	config::{GatewayConfig, JwksConfig},
	error::Error,
	gateway::Gateway,
	server,
};
use axum::{
	Router,
	body::Body,
	http::{HeaderMap, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use serde_json::Value as JsonValue;
use tower::ServiceExt;
// self
use common::*;

const CHALLENGE: &str = r#"Bearer realm="mcp", resource_metadata="http://127.0.0.1:8080/.well-known/oauth-protected-resource""#;

fn router(server: &MockServer) -> Router {
	let mut config = GatewayConfig::new(
		TEST_ISSUER,
		url(&server.url("/v1")),
		url(&server.url("/schema")),
	)
	.expect("Configuration should build.");

	config.jwks = JwksConfig::new(url(&server.url("/jwks.json")));
	config.server.scopes_supported = vec!["items:read".into()];

	server::router(Arc::new(Gateway::from_config(config).expect("Gateway should build.")))
}

async fn call(router: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, JsonValue) {
	let response = router.clone().oneshot(request).await.expect("Router should respond.");
	let status = response.status();
	let headers = response.headers().clone();
	let body = response.into_body().collect().await.expect("Body should be readable.").to_bytes();
	let json = serde_json::from_slice(&body).expect("Response body should be JSON.");

	(status, headers, json)
}

fn exec(token: Option<&str>, body: JsonValue) -> Request<Body> {
	let mut builder = Request::post("/exec").header(header::CONTENT_TYPE, "application/json");

	if let Some(token) = token {
		builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
	}

	builder.body(Body::from(body.to_string())).expect("Request should build.")
}

#[tokio::test]
async fn exec_only_accepts_post() {
	let server = MockServer::start_async().await;
	let router = router(&server);

	for method in ["GET", "PUT", "DELETE"] {
		let request = Request::builder()
			.method(method)
			.uri("/exec")
			.body(Body::empty())
			.expect("Request should build.");
		let (status, headers, body) = call(&router, request).await;

		assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
		assert_eq!(headers.get(header::ALLOW).and_then(|v| v.to_str().ok()), Some("POST"));
		assert_eq!(body["ok"], false);
	}
}

#[tokio::test]
async fn missing_credentials_are_challenged() {
	let server = MockServer::start_async().await;
	let jwks = publish_jwks(&server).await;
	let router = router(&server);
	let (status, headers, body) =
		call(&router, exec(None, serde_json::json!({ "action": "items.list" }))).await;

	assert_eq!(status, StatusCode::UNAUTHORIZED);
	assert_eq!(
		headers.get(header::WWW_AUTHENTICATE).and_then(|v| v.to_str().ok()),
		Some(CHALLENGE)
	);
	assert_eq!(
		body,
		serde_json::json!({
			"ok": false,
			"error": "invalid_token",
			"message": "Missing bearer token"
		})
	);

	let mut expired = valid_claims();

	expired["exp"] = unix_now_plus(-60).into();

	let (status, headers, body) = call(
		&router,
		exec(Some(&mint(&expired)), serde_json::json!({ "action": "items.list" })),
	)
	.await;

	assert_eq!(status, StatusCode::UNAUTHORIZED);
	assert!(headers.contains_key(header::WWW_AUTHENTICATE));
	assert_eq!(body["message"], "Token expired");

	jwks.assert_calls_async(1).await;
}

#[tokio::test]
async fn authorized_calls_return_the_traceable_envelope() {
	let server = MockServer::start_async().await;

	publish_jwks(&server).await;
	publish_catalog(&server).await;

	let api = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/items/42");
			then.status(200).header("content-type", "application/json").body(r#"{"id":42}"#);
		})
		.await;
	let router = router(&server);
	let mut claims = valid_claims();

	claims["scope"] = "items:read".into();

	let token = mint(&claims);
	let (status, _, body) = call(
		&router,
		exec(Some(&token), serde_json::json!({ "action": "items.get", "args": { "id": 42 } })),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(
		body,
		serde_json::json!({
			"ok": true,
			"data": { "id": 42 },
			"action": "items.get",
			"method": "GET",
			"path": "/items/42",
			"token_subject": "agent-7",
			"token_scopes": ["items:read"]
		})
	);

	api.assert_calls_async(1).await;
}

#[tokio::test]
async fn request_errors_use_the_error_envelope() {
	let server = MockServer::start_async().await;

	publish_jwks(&server).await;
	publish_catalog(&server).await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/users/me");
			then.status(401).header("www-authenticate", r#"Bearer error="insufficient_scope""#);
		})
		.await;

	let router = router(&server);
	let token = mint(&valid_claims());
	let (status, _, body) =
		call(&router, exec(Some(&token), serde_json::json!({ "args": {} }))).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error"], "invalid_request");

	let (status, _, body) =
		call(&router, exec(Some(&token), serde_json::json!({ "action": "items.nope" }))).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error"], "unknown_action");
	assert_eq!(
		body["available_actions"],
		serde_json::json!(["items.get", "items.delete", "items.list", "users.me"])
	);

	let (status, headers, body) =
		call(&router, exec(Some(&token), serde_json::json!({ "action": "users.me" }))).await;

	assert_eq!(status, StatusCode::UNAUTHORIZED);
	assert_eq!(body["error"], "downstream_error");
	assert_eq!(
		headers.get(header::WWW_AUTHENTICATE).and_then(|v| v.to_str().ok()),
		Some(r#"Bearer error="insufficient_scope""#)
	);
}

#[tokio::test]
async fn discovery_documents_are_served() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let router = router(&server);
	let get = |uri: &'static str| Request::get(uri).body(Body::empty());
	let (status, _, resource) = call(&router, get("/.well-known/oauth-protected-resource")?).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(resource["authorization_servers"], serde_json::json!([TEST_ISSUER]));
	assert_eq!(resource["scopes_supported"], serde_json::json!(["items:read"]));

	let (_, _, metadata) = call(&router, get("/.well-known/oauth-authorization-server")?).await;

	assert_eq!(metadata["jwks_uri"], server.url("/jwks.json"));
	assert_eq!(metadata["token_endpoint"], "https://issuer.example.com/oauth/token");
	assert_eq!(metadata["registration_endpoint"], "https://issuer.example.com/register");

	let (_, _, openid) = call(&router, get("/.well-known/openid-configuration")?).await;

	assert_eq!(openid["subject_types_supported"], serde_json::json!(["public"]));
	assert_eq!(openid["issuer"], TEST_ISSUER);

	Ok(())
}

#[tokio::test]
async fn host_only_issuers_are_matched_verbatim() {
	let server = MockServer::start_async().await;

	publish_jwks(&server).await;

	let mut config = GatewayConfig::new(
		"https://issuer.example.com",
		url(&server.url("/v1")),
		url(&server.url("/schema")),
	)
	.expect("Configuration should build.");

	config.jwks = JwksConfig::new(url(&server.url("/jwks.json")));

	let gateway = Gateway::from_config(config).expect("Gateway should build.");
	let mut claims = valid_claims();

	claims["iss"] = "https://issuer.example.com".into();

	let token = gateway
		.validator()
		.validate(Some(&mint(&claims)))
		.await
		.expect("Token from the configured issuer should validate.");

	assert_eq!(token.claims.iss, "https://issuer.example.com");

	claims["iss"] = "https://issuer.example.com/".into();

	let err = gateway
		.validator()
		.validate(Some(&mint(&claims)))
		.await
		.expect_err("Issuer must match exactly.");

	assert_eq!(Error::from(err).code(), "invalid_token");
	assert_eq!(
		gateway.discovery().protected_resource.authorization_servers,
		["https://issuer.example.com"]
	);
}
