//! Signing-key resolution against the issuer's published key set.
//!
//! Keys are cached per `kid` in a bounded, age-limited cache. Misses are gated by a per-minute
//! [`FetchBudget`] and each lookup waits at most the configured timeout. A fetch that outlives
//! its caller keeps running and still populates the cache, so the next lookup for the same key
//! is served locally. Concurrent misses for one `kid` share a single fetch.

pub mod budget;

pub use budget::*;

// crates.io
use jsonwebtoken::{DecodingKey, jwk::JwkSet};
use moka::future::Cache;
use reqwest::header::ACCEPT;
// self
use crate::{
	_prelude::*,
	clock::SharedClock,
	config::JwksConfig,
	deadline::{self, DeadlineError},
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Verification key selected from the published key set.
#[derive(Clone)]
pub struct SigningKey {
	/// Key identifier the key was published under.
	pub kid: String,
	/// Decoded verification material.
	pub key: DecodingKey,
	/// Instant the key set holding this key was fetched.
	pub fetched_at: OffsetDateTime,
}
impl Debug for SigningKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SigningKey")
			.field("kid", &self.kid)
			.field("fetched_at", &self.fetched_at)
			.finish_non_exhaustive()
	}
}

/// Normalized failure of a signing-key lookup.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum JwksError {
	/// Lookup did not complete within the configured timeout.
	#[error("Timed out after {after:?} waiting for the key set.")]
	Timeout {
		/// Configured timeout.
		after: StdDuration,
	},
	/// Fetch budget for the current minute is spent.
	#[error("Key set fetch budget is exhausted; retry in {retry_in:?}.")]
	RateLimited {
		/// Time until the budget window rolls over.
		retry_in: StdDuration,
	},
	/// Key set was fetched but does not publish the requested key.
	#[error("Signing key `{kid}` is not published in the key set.")]
	KeyNotFound {
		/// Requested key identifier.
		kid: String,
	},
	/// Key set could not be fetched or decoded.
	#[error("Key set is unavailable: {message}.")]
	Unavailable {
		/// Human-readable cause.
		message: String,
	},
}
impl JwksError {
	fn unavailable(message: impl Display) -> Self {
		Self::Unavailable { message: message.to_string() }
	}
}

/// Caching, rate-limited, deadline-bounded signing-key lookup.
#[derive(Clone, Debug)]
pub struct KeyResolver {
	http_client: ReqwestClient,
	jwks_uri: Url,
	timeout: StdDuration,
	keys: Cache<String, Arc<SigningKey>>,
	budget: Arc<FetchBudget>,
	clock: SharedClock,
}
impl KeyResolver {
	/// Creates a resolver for the key set described by `config`.
	pub fn new(http_client: ReqwestClient, config: &JwksConfig, clock: SharedClock) -> Self {
		let keys = Cache::builder()
			.max_capacity(config.cache_max_entries)
			.time_to_live(config.cache_max_age)
			.build();

		Self {
			http_client,
			jwks_uri: config.uri.clone(),
			timeout: config.timeout,
			keys,
			budget: Arc::new(FetchBudget::new(config.requests_per_minute, clock.clone())),
			clock,
		}
	}

	/// Key set location this resolver fetches from.
	pub fn jwks_uri(&self) -> &Url {
		&self.jwks_uri
	}

	/// Returns the verification key published under `kid`.
	pub async fn signing_key(&self, kid: &str) -> Result<Arc<SigningKey>, JwksError> {
		let span = OpSpan::new(OpKind::KeyResolution, "signing_key");

		span.instrument(async move {
			if let Some(key) = self.keys.get(kid).await {
				tracing::debug!(kid, "Signing key served from cache.");

				return Ok(key);
			}

			obs::record_op_outcome(OpKind::KeyResolution, OpOutcome::Attempt);

			let result = self.fetch_within_deadline(kid).await;

			match &result {
				Ok(_) => obs::record_op_outcome(OpKind::KeyResolution, OpOutcome::Success),
				Err(e) => {
					tracing::warn!(kid, error = %e, "Signing key lookup failed.");
					obs::record_op_outcome(OpKind::KeyResolution, OpOutcome::Failure);
				},
			}

			result
		})
		.await
	}

	/// Drops every cached key.
	pub fn clear(&self) {
		self.keys.invalidate_all();
	}

	async fn fetch_within_deadline(&self, kid: &str) -> Result<Arc<SigningKey>, JwksError> {
		let keys = self.keys.clone();
		let budget = self.budget.clone();
		let http_client = self.http_client.clone();
		let jwks_uri = self.jwks_uri.clone();
		let clock = self.clock.clone();
		let kid = kid.to_owned();
		let fetch_kid = kid.clone();
		let fetch = async move {
			// Only the caller that runs `init` fetches, so only it spends budget.
			let init = async move {
				if let BudgetDecision::Deny(directive) = budget.acquire() {
					return Err(JwksError::RateLimited { retry_in: directive.retry_in });
				}

				fetch_signing_key(http_client, jwks_uri, fetch_kid, clock).await
			};

			keys.try_get_with(kid, init).await.map_err(|e| (*e).clone())
		};

		match deadline::settle_within(self.timeout, fetch).await {
			Ok(result) => result,
			Err(DeadlineError::Elapsed { after }) => Err(JwksError::Timeout { after }),
			Err(DeadlineError::Abandoned) => Err(JwksError::unavailable("fetch task was abandoned")),
		}
	}
}

async fn fetch_signing_key(
	http_client: ReqwestClient,
	jwks_uri: Url,
	kid: String,
	clock: SharedClock,
) -> Result<Arc<SigningKey>, JwksError> {
	let response = http_client
		.get(jwks_uri)
		.header(ACCEPT, "application/json")
		.send()
		.await
		.map_err(JwksError::unavailable)?;
	let status = response.status();

	if !status.is_success() {
		return Err(JwksError::unavailable(format_args!(
			"key set endpoint responded with HTTP {}",
			status.as_u16()
		)));
	}

	let body = response.bytes().await.map_err(JwksError::unavailable)?;
	let set = serde_json::from_slice::<JwkSet>(&body).map_err(JwksError::unavailable)?;
	let jwk = set.find(&kid).ok_or_else(|| JwksError::KeyNotFound { kid: kid.clone() })?;
	let key = DecodingKey::from_jwk(jwk).map_err(JwksError::unavailable)?;

	tracing::debug!(kid = %kid, keys = set.keys.len(), "Fetched key set.");

	Ok(Arc::new(SigningKey { kid, key, fetched_at: clock.now() }))
}
