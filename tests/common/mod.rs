//! Fixtures shared by the integration suites.

#![allow(dead_code)]

// std
use std::time::Duration as StdDuration;
// crates.io
use action_gateway::{
	auth::{KeyResolver, TokenValidator},
	clock::SystemClock,
	config::{JwksConfig, ValidationConfig},
	url::Url,
};
use httpmock::prelude::*;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::Value as JsonValue;
use time::OffsetDateTime;

/// Key identifier published in the fixture JWKS.
pub const TEST_KID: &str = "test-key-1";
/// Issuer every fixture token is minted for.
pub const TEST_ISSUER: &str = "https://issuer.example.com/";
/// PKCS#1 private key matching the fixture JWKS.
pub const SIGNING_KEY_PEM: &str = include_str!("../fixtures/signing_key.pem");
/// Published key set containing [`TEST_KID`].
pub const JWKS_JSON: &str = include_str!("../fixtures/jwks.json");

/// Signs `claims` with the fixture key under `header`.
pub fn mint_with_header(header: &Header, claims: &JsonValue) -> String {
	let key = EncodingKey::from_rsa_pem(SIGNING_KEY_PEM.as_bytes())
		.expect("Fixture signing key should parse.");

	jsonwebtoken::encode(header, claims, &key).expect("Fixture token should encode.")
}

/// Signs `claims` as an RS256 token carrying [`TEST_KID`].
pub fn mint(claims: &JsonValue) -> String {
	let mut header = Header::new(Algorithm::RS256);

	header.kid = Some(TEST_KID.into());

	mint_with_header(&header, claims)
}

/// Claims of a token valid for the next hour.
pub fn valid_claims() -> JsonValue {
	serde_json::json!({
		"iss": TEST_ISSUER,
		"sub": "agent-7",
		"exp": unix_now_plus(3_600),
		"iat": unix_now_plus(0),
	})
}

/// Seconds since the Unix epoch, offset by `delta`.
pub fn unix_now_plus(delta: i64) -> i64 {
	OffsetDateTime::now_utc().unix_timestamp() + delta
}

/// Parses a fixture URL.
pub fn url(raw: &str) -> Url {
	Url::parse(raw).expect("Fixture URL should parse.")
}

/// Key-set settings pointing at `server`'s `/jwks.json`.
pub fn jwks_config(server: &MockServer) -> JwksConfig {
	JwksConfig::new(url(&server.url("/jwks.json")))
}

/// Publishes the fixture key set on `server`.
pub async fn publish_jwks(server: &MockServer) -> httpmock::Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(GET).path("/jwks.json");
			then.status(200).header("content-type", "application/json").body(JWKS_JSON);
		})
		.await
}

/// Validator trusting [`TEST_ISSUER`] with keys from `config`.
pub fn validator(config: &JwksConfig) -> TokenValidator {
	let resolver = KeyResolver::new(reqwest::Client::new(), config, SystemClock::shared());

	TokenValidator::new(resolver, TEST_ISSUER, &ValidationConfig::default())
}

/// Shorthand for millisecond durations.
pub fn millis(ms: u64) -> StdDuration {
	StdDuration::from_millis(ms)
}

/// Schema document with two groups and four actions.
pub const CATALOG_JSON: &str = r#"{
	"info": { "title": "Inventory", "version": "2.1" },
	"capabilities": [
		{
			"name": "items",
			"actions": [
				{
					"action_id": "items.get",
					"method": "GET",
					"path": "/items/{id}",
					"parameters": [
						{ "name": "id", "in": "path", "required": true },
						{ "name": "tags", "in": "query" }
					]
				},
				{
					"action_id": "items.delete",
					"method": "DELETE",
					"path": "/items/{id}",
					"parameters": [{ "name": "id", "in": "path", "required": true }]
				},
				{ "action_id": "items.list", "method": "GET", "path": "/items" }
			]
		},
		{
			"name": "users",
			"actions": [{ "action_id": "users.me", "method": "get", "path": "/users/me" }]
		}
	]
}"#;

/// Publishes [`CATALOG_JSON`] at `/schema` on `server`.
pub async fn publish_catalog(server: &MockServer) -> httpmock::Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(GET).path("/schema");
			then.status(200).header("content-type", "application/json").body(CATALOG_JSON);
		})
		.await
}
