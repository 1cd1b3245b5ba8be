mod common;

// crates.io
use action_gateway::{
	auth::{ValidationCode, ValidationFailure},
	config::JwksConfig,
};
use httpmock::prelude::*;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
// self
use common::*;

#[tokio::test]
async fn valid_tokens_expose_subject_and_scope_union() {
	let server = MockServer::start_async().await;
	let jwks = publish_jwks(&server).await;
	let validator = validator(&jwks_config(&server));
	let mut claims = valid_claims();

	claims["scope"] = "items:read items:write".into();
	claims["scp"] = serde_json::json!(["items:write", "admin"]);

	let token = validator
		.validate(Some(&mint(&claims)))
		.await
		.expect("Correctly signed token should validate.");

	assert_eq!(token.subject(), Some("agent-7"));
	assert_eq!(token.scopes.len(), 3);
	assert!(token.scopes.contains("items:read"));
	assert!(token.scopes.contains("admin"));

	jwks.assert_calls_async(1).await;
}

#[tokio::test]
async fn audience_is_not_enforced() {
	let server = MockServer::start_async().await;

	publish_jwks(&server).await;

	let validator = validator(&jwks_config(&server));
	let mut claims = valid_claims();

	claims["aud"] = serde_json::json!(["some-other-api", "yet-another"]);

	let token = validator
		.validate(Some(&mint(&claims)))
		.await
		.expect("Tokens for any audience are accepted at this layer.");

	assert!(token.claims.aud.is_some());
}

#[tokio::test]
async fn expired_and_immature_tokens_are_rejected_with_401() {
	let server = MockServer::start_async().await;

	publish_jwks(&server).await;

	let validator = validator(&jwks_config(&server));
	let mut expired = valid_claims();

	expired["exp"] = unix_now_plus(-120).into();

	let err = validator.validate(Some(&mint(&expired))).await.expect_err("Expired token must fail.");

	assert_eq!(err.failure, ValidationFailure::Expired);
	assert_eq!(err.code, ValidationCode::InvalidToken);
	assert_eq!(err.http_status, 401);

	let mut immature = valid_claims();

	immature["nbf"] = unix_now_plus(600).into();

	let err =
		validator.validate(Some(&mint(&immature))).await.expect_err("Immature token must fail.");

	assert_eq!(err.failure, ValidationFailure::NotYetValid);
	assert_eq!(err.http_status, 401);
}

#[tokio::test]
async fn foreign_issuer_is_invalid() {
	let server = MockServer::start_async().await;

	publish_jwks(&server).await;

	let validator = validator(&jwks_config(&server));
	let mut claims = valid_claims();

	claims["iss"] = "https://impostor.example.com/".into();

	let err = validator.validate(Some(&mint(&claims))).await.expect_err("Wrong issuer must fail.");

	assert_eq!(err.failure, ValidationFailure::Invalid);
}

#[tokio::test]
async fn symmetric_tokens_are_rejected_without_fetching_keys() {
	let server = MockServer::start_async().await;
	let jwks = publish_jwks(&server).await;
	let validator = validator(&jwks_config(&server));
	let mut header = Header::new(Algorithm::HS256);

	header.kid = Some(TEST_KID.into());

	// HMAC keyed with the public JWKS text, the classic confusion attempt.
	let forged = jsonwebtoken::encode(
		&header,
		&valid_claims(),
		&EncodingKey::from_secret(JWKS_JSON.as_bytes()),
	)
	.expect("Forged token should encode.");
	let err = validator.validate(Some(&forged)).await.expect_err("HS256 must be refused.");

	assert_eq!(err.failure, ValidationFailure::Invalid);
	assert_eq!(err.http_status, 401);

	jwks.assert_calls_async(0).await;
}

#[tokio::test]
async fn missing_and_malformed_tokens_never_fetch_keys() {
	let server = MockServer::start_async().await;
	let jwks = publish_jwks(&server).await;
	let validator = validator(&jwks_config(&server));

	for (raw, failure) in [
		(None, ValidationFailure::Missing),
		(Some("   "), ValidationFailure::Missing),
		(Some("not-a-jwt"), ValidationFailure::Malformed),
		(Some("a.b.c"), ValidationFailure::Malformed),
	] {
		let err = validator.validate(raw).await.expect_err("Token must be rejected.");

		assert_eq!(err.failure, failure);
		assert_eq!(err.code.as_str(), "invalid_token");
	}

	let mut header = Header::new(Algorithm::RS256);

	header.kid = None;

	let kidless = mint_with_header(&header, &valid_claims());
	let err = validator.validate(Some(&kidless)).await.expect_err("Tokens need a kid.");

	assert_eq!(err.failure, ValidationFailure::Malformed);

	jwks.assert_calls_async(0).await;
}

#[tokio::test]
async fn slow_key_set_times_out_then_serves_from_cache() {
	let server = MockServer::start_async().await;
	let jwks = server
		.mock_async(|when, then| {
			when.method(GET).path("/jwks.json");
			then.status(200).body(JWKS_JSON).delay(millis(300));
		})
		.await;
	let config = JwksConfig { timeout: millis(50), ..jwks_config(&server) };
	let validator = validator(&config);
	let token = mint(&valid_claims());
	let err = validator.validate(Some(&token)).await.expect_err("Slow key set must time out.");

	assert_eq!(err.failure, ValidationFailure::KeyTimeout);
	assert_eq!(err.code.as_str(), "jwks_timeout");
	assert_eq!(err.http_status, 503);

	// The abandoned fetch still lands in the cache.
	tokio::time::sleep(millis(600)).await;

	validator.validate(Some(&token)).await.expect("Late fetch should have populated the cache.");

	jwks.assert_calls_async(1).await;
}

#[tokio::test]
async fn fetch_budget_caps_key_set_requests() {
	let server = MockServer::start_async().await;
	let jwks = server
		.mock_async(|when, then| {
			when.method(GET).path("/jwks.json");
			then.status(502).body("bad gateway");
		})
		.await;
	let config = JwksConfig { requests_per_minute: 1, ..jwks_config(&server) };
	let validator = validator(&config);
	let token = mint(&valid_claims());
	let first = validator.validate(Some(&token)).await.expect_err("Upstream failure must fail.");
	let second = validator.validate(Some(&token)).await.expect_err("Budget must be exhausted.");

	assert_eq!(first.failure, ValidationFailure::KeyUnavailable);
	assert_eq!(second.failure, ValidationFailure::KeyUnavailable);
	assert_eq!(second.code.as_str(), "jwks_unavailable");
	assert_eq!(second.http_status, 503);

	jwks.assert_calls_async(1).await;
}
