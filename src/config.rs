//! Gateway configuration with defaults for every tunable.

// std
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
// crates.io
use jsonwebtoken::Algorithm;
// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Default deadline for a signing-key lookup.
pub const DEFAULT_JWKS_TIMEOUT: StdDuration = StdDuration::from_millis(5_000);
/// Default number of signing keys kept in memory.
pub const DEFAULT_JWKS_CACHE_MAX_ENTRIES: u64 = 5;
/// Default lifetime of a cached signing key.
pub const DEFAULT_JWKS_CACHE_MAX_AGE: StdDuration = StdDuration::from_millis(600_000);
/// Default key-set fetch budget per minute.
pub const DEFAULT_JWKS_REQUESTS_PER_MINUTE: u32 = 10;
/// Default freshness window of the capability catalog.
pub const DEFAULT_SCHEMA_TTL: StdDuration = StdDuration::from_secs(300);
/// Default deadline for fetching the capability schema.
pub const DEFAULT_SCHEMA_TIMEOUT: StdDuration = StdDuration::from_secs(10);
/// Default timeout applied to every outbound HTTP request.
pub const DEFAULT_REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(30);
/// Default token endpoint path, relative to the credential base URL.
pub const DEFAULT_TOKEN_PATH: &str = "/oauth/token";
/// Default margin before expiry at which a service credential counts as stale.
pub const DEFAULT_SAFETY_WINDOW: StdDuration = StdDuration::from_secs(90);
/// Default registration endpoint path, relative to the registration base URL.
pub const DEFAULT_REGISTRATION_PATH: &str = "/register";
/// Default listen address.
pub const DEFAULT_BIND: SocketAddr =
	SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 8080));

/// Complete gateway configuration.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
	/// Issuer identifier exactly as configured; tokens must carry this `iss` verbatim.
	pub issuer: String,
	/// Parsed issuer; the default DCR, key set, and credential base URL.
	pub issuer_url: Url,
	/// Signing-key resolution.
	pub jwks: JwksConfig,
	/// Token validation rules.
	pub validation: ValidationConfig,
	/// Downstream API.
	pub api: ApiConfig,
	/// Capability schema source.
	pub schema: SchemaConfig,
	/// Service credential acquisition.
	pub credentials: ClientCredentialConfig,
	/// Dynamic client registration.
	pub registration: RegistrationConfig,
	/// Inbound HTTP server.
	pub server: ServerConfig,
}
impl GatewayConfig {
	/// Builds a configuration with defaults for everything but the issuer and the two required
	/// URLs.
	///
	/// `issuer` is kept verbatim for exact `iss` matching; only `issuer_url` is normalized.
	pub fn new(issuer: impl Into<String>, api_base_url: Url, schema_url: Url) -> Result<Self> {
		let issuer = issuer.into();
		let issuer_url = Url::parse(&issuer)
			.map_err(|source| ConfigError::InvalidUrl { name: "issuer", source })?;
		let jwks = JwksConfig::for_issuer(&issuer_url)?;

		Ok(Self {
			issuer,
			issuer_url,
			jwks,
			validation: ValidationConfig::default(),
			api: ApiConfig { base_url: api_base_url, request_timeout: DEFAULT_REQUEST_TIMEOUT },
			schema: SchemaConfig::new(schema_url),
			credentials: ClientCredentialConfig::default(),
			registration: RegistrationConfig::default(),
			server: ServerConfig::bound_to(DEFAULT_BIND)?,
		})
	}

	/// Rejects zero timeouts, zero capacities, and zero rate limits.
	pub fn validate(&self) -> Result<()> {
		fn positive(name: &'static str, value: StdDuration) -> Result<(), ConfigError> {
			if value.is_zero() {
				return Err(ConfigError::invalid(name, "must be greater than zero"));
			}

			Ok(())
		}

		positive("jwks.timeout", self.jwks.timeout)?;
		positive("jwks.cache_max_age", self.jwks.cache_max_age)?;
		positive("api.request_timeout", self.api.request_timeout)?;
		positive("schema.ttl", self.schema.ttl)?;
		positive("schema.timeout", self.schema.timeout)?;

		if self.jwks.cache_max_entries == 0 {
			return Err(ConfigError::invalid("jwks.cache_max_entries", "must be greater than zero")
				.into());
		}
		if self.jwks.requests_per_minute == 0 {
			return Err(ConfigError::invalid("jwks.requests_per_minute", "must be greater than zero")
				.into());
		}

		Ok(())
	}

	/// URL of the protected-resource metadata document advertised in challenges.
	pub fn resource_metadata_url(&self) -> Result<Url> {
		join_url("server.resource_url", &self.server.resource_url, PROTECTED_RESOURCE_PATH)
	}

	/// Token endpoint the service credential is requested from when no base URL is given.
	pub fn token_endpoint(&self) -> Result<Url> {
		join_url("credentials.token_path", &self.issuer_url, &self.credentials.token_path)
	}

	/// Registration endpoint used when no base URL is given.
	pub fn registration_endpoint(&self) -> Result<Url> {
		let base = self.registration.base_url.as_ref().unwrap_or(&self.issuer_url);

		join_url("registration.endpoint_path", base, &self.registration.endpoint_path)
	}
}

/// Well-known path of the protected-resource metadata document.
pub const PROTECTED_RESOURCE_PATH: &str = "/.well-known/oauth-protected-resource";

/// Signing-key resolution settings.
#[derive(Clone, Debug)]
pub struct JwksConfig {
	/// Key set location.
	pub uri: Url,
	/// Deadline for one lookup.
	pub timeout: StdDuration,
	/// Maximum number of cached keys.
	pub cache_max_entries: u64,
	/// Maximum age of a cached key.
	pub cache_max_age: StdDuration,
	/// Outbound fetch budget per minute.
	pub requests_per_minute: u32,
}
impl JwksConfig {
	/// Defaults pointing at `<issuer>/.well-known/jwks.json`.
	pub fn for_issuer(issuer: &Url) -> Result<Self> {
		Ok(Self::new(join_url("jwks.uri", issuer, "/.well-known/jwks.json")?))
	}

	/// Defaults pointing at `uri`.
	pub fn new(uri: Url) -> Self {
		Self {
			uri,
			timeout: DEFAULT_JWKS_TIMEOUT,
			cache_max_entries: DEFAULT_JWKS_CACHE_MAX_ENTRIES,
			cache_max_age: DEFAULT_JWKS_CACHE_MAX_AGE,
			requests_per_minute: DEFAULT_JWKS_REQUESTS_PER_MINUTE,
		}
	}
}

/// Token validation settings.
#[derive(Clone, Debug)]
pub struct ValidationConfig {
	/// The only accepted signing algorithm.
	pub algorithm: Algorithm,
	/// Clock skew tolerated on `exp` and `nbf`, in seconds.
	pub leeway_secs: u64,
}
impl ValidationConfig {
	/// Parses an asymmetric JWS algorithm name such as `RS256`.
	pub fn parse_algorithm(name: &str) -> Result<Algorithm, ConfigError> {
		let unsupported = || ConfigError::UnsupportedAlgorithm { alg: name.to_owned() };
		let algorithm = Algorithm::from_str(name).map_err(|_| unsupported())?;

		match algorithm {
			Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Err(unsupported()),
			_ => Ok(algorithm),
		}
	}
}
impl Default for ValidationConfig {
	fn default() -> Self {
		Self { algorithm: Algorithm::RS256, leeway_secs: 0 }
	}
}

/// Downstream API settings.
#[derive(Clone, Debug)]
pub struct ApiConfig {
	/// Base URL action paths are appended to.
	pub base_url: Url,
	/// Timeout applied to each outbound request.
	pub request_timeout: StdDuration,
}

/// Capability schema source settings.
#[derive(Clone, Debug)]
pub struct SchemaConfig {
	/// Schema document location.
	pub url: Url,
	/// Freshness window of a fetched catalog.
	pub ttl: StdDuration,
	/// Deadline for one fetch.
	pub timeout: StdDuration,
	/// Static bearer sent to the schema source.
	pub bearer: Option<TokenSecret>,
}
impl SchemaConfig {
	/// Defaults pointing at `url`.
	pub fn new(url: Url) -> Self {
		Self { url, ttl: DEFAULT_SCHEMA_TTL, timeout: DEFAULT_SCHEMA_TIMEOUT, bearer: None }
	}
}

/// Service credential settings.
#[derive(Clone, Debug)]
pub struct ClientCredentialConfig {
	/// OAuth client identifier.
	pub client_id: Option<String>,
	/// OAuth client secret.
	pub client_secret: Option<TokenSecret>,
	/// Space-delimited scope requested with the credential.
	pub scope: Option<String>,
	/// Audience requested with the credential.
	pub audience: Option<String>,
	/// Token endpoint path relative to the base URL.
	pub token_path: String,
	/// Margin before expiry at which the credential counts as stale.
	pub safety_window: StdDuration,
}
impl Default for ClientCredentialConfig {
	fn default() -> Self {
		Self {
			client_id: None,
			client_secret: None,
			scope: None,
			audience: None,
			token_path: DEFAULT_TOKEN_PATH.into(),
			safety_window: DEFAULT_SAFETY_WINDOW,
		}
	}
}

/// Dynamic client registration settings.
#[derive(Clone, Debug)]
pub struct RegistrationConfig {
	/// Base URL of the registration endpoint; the issuer when absent.
	pub base_url: Option<Url>,
	/// Registration endpoint path relative to the base URL.
	pub endpoint_path: String,
}
impl Default for RegistrationConfig {
	fn default() -> Self {
		Self { base_url: None, endpoint_path: DEFAULT_REGISTRATION_PATH.into() }
	}
}

/// Inbound HTTP server settings.
#[derive(Clone, Debug)]
pub struct ServerConfig {
	/// Listen address.
	pub bind: SocketAddr,
	/// Public URL of this resource server.
	pub resource_url: Url,
	/// Scopes advertised in protected-resource metadata.
	pub scopes_supported: Vec<String>,
}
impl ServerConfig {
	/// Binds to `bind` and advertises `http://<bind>/` as the resource URL.
	pub fn bound_to(bind: SocketAddr) -> Result<Self> {
		let resource_url = Url::parse(&format!("http://{bind}/"))
			.map_err(|source| ConfigError::InvalidUrl { name: "server.resource_url", source })?;

		Ok(Self { bind, resource_url, scopes_supported: Vec::new() })
	}
}

/// Appends `path` to `base`, keeping any path prefix `base` already carries.
///
/// `Url::join` would replace the base path for absolute paths; an API mounted under `/v1`
/// must keep that prefix.
pub fn join_url(name: &'static str, base: &Url, path: &str) -> Result<Url> {
	let joined = format!("{}/{}", base.as_str().trim_end_matches('/'), path.trim_start_matches('/'));

	Url::parse(&joined).map_err(|source| ConfigError::InvalidUrl { name, source }.into())
}
