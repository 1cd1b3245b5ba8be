mod common;

// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use action_gateway::{
	auth::TokenSecret,
	capability::{CapabilityCache, HttpSchemaSource, SchemaSource},
	clock::ManualClock,
	config::SchemaConfig,
	error::{Error, TransientError},
};
use httpmock::prelude::*;
// self
use common::*;

fn source(server: &MockServer, configure: impl FnOnce(&mut SchemaConfig)) -> Arc<HttpSchemaSource> {
	let mut config = SchemaConfig::new(url(&server.url("/schema")));

	configure(&mut config);

	Arc::new(HttpSchemaSource::new(reqwest::Client::new(), &config))
}

#[tokio::test]
async fn schema_source_sends_the_static_bearer() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/schema")
				.header("authorization", "Bearer schema-token")
				.header("accept", "application/json");
			then.status(200).body(CATALOG_JSON);
		})
		.await;
	let source = source(&server, |config| config.bearer = Some(TokenSecret::new("schema-token")));
	let catalog = source.fetch().await.expect("Schema should load.");

	assert_eq!(catalog.action_ids(), ["items.get", "items.delete", "items.list", "users.me"]);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn catalog_is_served_from_cache_within_ttl_and_refetched_after_clear() {
	let server = MockServer::start_async().await;
	let mock = publish_catalog(&server).await;
	let cache = CapabilityCache::new(source(&server, |_| {}), StdDuration::from_secs(300));
	let first = cache.fresh_capabilities().await.expect("Catalog should load.");
	let second = cache.fresh_capabilities().await.expect("Catalog should be cached.");

	assert!(Arc::ptr_eq(&first, &second));

	mock.assert_calls_async(1).await;

	cache.clear_schema_cache();
	cache.fresh_capabilities().await.expect("Catalog should reload.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn failing_source_keeps_serving_the_last_catalog() {
	let server = MockServer::start_async().await;
	let healthy = publish_catalog(&server).await;
	let clock = ManualClock::starting_now();
	let cache = CapabilityCache::new(source(&server, |_| {}), StdDuration::from_secs(300))
		.with_clock(clock.shared());
	let first = cache.fresh_capabilities().await.expect("Catalog should load.");

	healthy.delete_async().await;

	let failing = server
		.mock_async(|when, then| {
			when.method(GET).path("/schema");
			then.status(500).body("schema store offline");
		})
		.await;

	clock.advance(StdDuration::from_secs(301));

	let stale = cache.fresh_capabilities().await.expect("Stale catalog should be served.");

	assert!(Arc::ptr_eq(&first, &stale));
	assert!(!cache.cache_status().is_valid);

	failing.assert_calls_async(1).await;
}

#[tokio::test]
async fn first_fetch_failures_surface() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/schema");
			then.status(503);
		})
		.await;

	let cache = CapabilityCache::new(source(&server, |_| {}), StdDuration::from_secs(300));
	let err = cache.fresh_capabilities().await.expect_err("Nothing cached means failure.");

	assert!(matches!(err, Error::Transient(TransientError::SchemaSource { status: 503 })));
	assert_eq!(err.code(), "upstream_unavailable");
}

#[tokio::test]
async fn slow_schema_fetches_time_out() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/schema");
			then.status(200).body(CATALOG_JSON).delay(millis(500));
		})
		.await;

	let source = source(&server, |config| config.timeout = millis(50));
	let err = source.fetch().await.expect_err("Slow schema must time out.");

	assert!(matches!(
		err,
		Error::Transient(TransientError::Timeout { operation: "schema fetch", .. })
	));
}

#[tokio::test]
async fn api_metadata_summarizes_the_catalog() {
	let server = MockServer::start_async().await;

	publish_catalog(&server).await;

	let cache = CapabilityCache::new(source(&server, |_| {}), StdDuration::from_secs(300));
	let metadata = cache.api_metadata().await.expect("Metadata should load.");

	assert_eq!(metadata.title.as_deref(), Some("Inventory"));
	assert_eq!(metadata.version.as_deref(), Some("2.1"));
	assert_eq!(metadata.group_count, 2);
	assert_eq!(metadata.action_count, 4);
	assert_eq!(metadata.action_ids[3], "users.me");
	assert!(cache.cache_status().is_valid);
}
