//! Cached service credential obtained through the `client_credentials` grant.
//!
//! One credential is cached per gateway. It is reused until `now` reaches its expiry minus the
//! safety window, or until a caller asks for a credential minted by a different token endpoint.
//! Concurrent refreshes are coalesced: the first caller exchanges, the rest wait and reuse the
//! result. The same credential serves as the initial access token for client registration.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
	clock::{SharedClock, SystemClock},
	config::{self, ClientCredentialConfig},
	error::ConfigError,
	http::{ReqwestHttpClient, TokenHttpClient},
	oauth::{ClientCredentialsFacade, ReqwestTransportErrorMapper, TransportErrorMapper},
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Credential lifetimes are floored to this much beyond the safety window.
const MIN_LIFETIME_BEYOND_SAFETY: StdDuration = StdDuration::from_secs(30);

/// Cached service credential.
#[derive(Clone, Debug)]
pub struct CachedCredential {
	/// Bearer token.
	pub access_token: TokenSecret,
	/// Instant after which the token must not be used.
	pub expires_at: OffsetDateTime,
	/// Granted scopes.
	pub scope: ScopeSet,
	/// Token endpoint that minted the credential.
	pub token_endpoint: Url,
}
impl CachedCredential {
	/// Whether the credential needs replacing at `now` given `safety_window`.
	pub fn is_stale_at(&self, now: OffsetDateTime, safety_window: StdDuration) -> bool {
		now >= self.expires_at - safety_window
	}
}

/// Computes the expiry of a credential issued at `now`.
///
/// Short-lived tokens are floored to `safety_window + 30s` so a freshly minted credential is
/// never already stale.
pub fn credential_expiry(
	now: OffsetDateTime,
	expires_in: Duration,
	safety_window: StdDuration,
) -> OffsetDateTime {
	let floor = safety_window + MIN_LIFETIME_BEYOND_SAFETY;

	if expires_in < floor { now + floor } else { now + expires_in }
}

/// Single-entry, singleflight cache of the gateway's service credential.
pub struct ClientCredentialCache<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	config: ClientCredentialConfig,
	scope: ScopeSet,
	http_client: Arc<C>,
	transport_mapper: Arc<M>,
	clock: SharedClock,
	current: RwLock<Option<Arc<CachedCredential>>>,
	refresh_guard: AsyncMutex<()>,
}
impl ClientCredentialCache {
	/// Creates a cache that exchanges through `client`.
	pub fn new(config: ClientCredentialConfig, client: ReqwestClient) -> Self {
		Self::with_http_client(
			config,
			Arc::new(ReqwestHttpClient::with_client(client)),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<C, M> ClientCredentialCache<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a cache over a custom transport and error mapper.
	pub fn with_http_client(
		config: ClientCredentialConfig,
		http_client: Arc<C>,
		transport_mapper: Arc<M>,
	) -> Self {
		let scope = ScopeSet::lenient(config.scope.iter());

		Self {
			config,
			scope,
			http_client,
			transport_mapper,
			clock: SystemClock::shared(),
			current: RwLock::new(None),
			refresh_guard: AsyncMutex::new(()),
		}
	}

	/// Replaces the clock used for expiry decisions.
	pub fn with_clock(mut self, clock: SharedClock) -> Self {
		self.clock = clock;

		self
	}

	/// Returns a usable bearer token minted by `<base_url><token_path>`.
	pub async fn access_token(&self, base_url: &Url) -> Result<TokenSecret> {
		Ok(self.credential(base_url).await?.access_token.clone())
	}

	/// Returns the cached credential, exchanging for a new one when stale.
	pub async fn credential(&self, base_url: &Url) -> Result<Arc<CachedCredential>> {
		let (client_id, client_secret) = match (&self.config.client_id, &self.config.client_secret) {
			(Some(id), Some(secret)) => (id.as_str(), secret),
			_ => return Err(ConfigError::MissingClientCredentials.into()),
		};
		let token_endpoint =
			config::join_url("credentials.token_path", base_url, &self.config.token_path)?;

		if let Some(current) = self.fresh(&token_endpoint) {
			return Ok(current);
		}

		let span = OpSpan::new(OpKind::ClientCredentials, "credential");

		span.instrument(async move {
			let _singleflight = self.refresh_guard.lock().await;

			if let Some(current) = self.fresh(&token_endpoint) {
				return Ok(current);
			}

			obs::record_op_outcome(OpKind::ClientCredentials, OpOutcome::Attempt);

			let facade: ClientCredentialsFacade<C, M> = ClientCredentialsFacade::new(
				&token_endpoint,
				client_id,
				client_secret,
				self.http_client.clone(),
				self.transport_mapper.clone(),
			);
			let issued = match facade.exchange(&self.scope, self.config.audience.as_deref()).await {
				Ok(issued) => issued,
				Err(e) => {
					tracing::warn!(endpoint = %token_endpoint, error = %e, "Client credential exchange failed.");
					obs::record_op_outcome(OpKind::ClientCredentials, OpOutcome::Failure);

					return Err(e);
				},
			};
			let expires_at =
				credential_expiry(self.clock.now(), issued.expires_in, self.config.safety_window);
			let credential = Arc::new(CachedCredential {
				access_token: issued.access_token,
				expires_at,
				scope: issued.scope,
				token_endpoint,
			});

			*self.current.write() = Some(credential.clone());

			tracing::info!(expires_at = %expires_at, "Cached a new client credential.");
			obs::record_op_outcome(OpKind::ClientCredentials, OpOutcome::Success);

			Ok(credential)
		})
		.await
	}

	/// Currently cached credential, fresh or not.
	pub fn cached(&self) -> Option<Arc<CachedCredential>> {
		self.current.read().clone()
	}

	/// Forgets the cached credential.
	pub fn clear(&self) {
		*self.current.write() = None;
	}

	fn fresh(&self, token_endpoint: &Url) -> Option<Arc<CachedCredential>> {
		let now = self.clock.now();

		self.current
			.read()
			.as_ref()
			.filter(|current| {
				&current.token_endpoint == token_endpoint
					&& !current.is_stale_at(now, self.config.safety_window)
			})
			.cloned()
	}
}
impl<C, M> Debug for ClientCredentialCache<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCredentialCache")
			.field("client_id", &self.config.client_id)
			.field("scope", &self.scope)
			.field("cached", &self.cached().map(|current| current.expires_at))
			.finish_non_exhaustive()
	}
}
