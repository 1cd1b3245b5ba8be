//! Command line: flags fall back to environment variables, then to built-in defaults.

// std
use std::net::SocketAddr;
// crates.io
use clap::{Args, Parser, Subcommand};
use jsonwebtoken::Algorithm;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::{
		self, ClientCredentialConfig, DEFAULT_BIND, DEFAULT_JWKS_CACHE_MAX_AGE,
		DEFAULT_JWKS_CACHE_MAX_ENTRIES, DEFAULT_JWKS_REQUESTS_PER_MINUTE, DEFAULT_JWKS_TIMEOUT,
		DEFAULT_REGISTRATION_PATH, DEFAULT_SAFETY_WINDOW, DEFAULT_SCHEMA_TIMEOUT, DEFAULT_SCHEMA_TTL,
		DEFAULT_TOKEN_PATH, GatewayConfig, RegistrationConfig, ServerConfig, ValidationConfig,
	},
	credentials::ClientCredentialCache,
	error::{ConfigError, TransportError},
	gateway::Gateway,
	registration::{ClientMetadata, RegistrationBroker},
	server,
};

/// Token-gated action gateway.
#[derive(Debug, Parser)]
#[command(name = "action-gateway", version, about)]
pub struct Cli {
	/// Log filter used when `RUST_LOG` is unset.
	#[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
	pub log_level: String,
	/// Command to run.
	#[command(subcommand)]
	pub command: Command,
}

/// Top-level commands.
#[derive(Debug, Subcommand)]
pub enum Command {
	/// Serve `POST /exec` and the discovery documents.
	Serve(GatewayArgs),
	/// Print a summary of the downstream capability catalog.
	Schema(GatewayArgs),
	/// Manage dynamically registered clients.
	Dcr(DcrArgs),
}

/// Settings for a full gateway.
#[derive(Debug, Args)]
pub struct GatewayArgs {
	/// Issuer whose tokens are accepted, matched verbatim against `iss`.
	#[arg(long, env = "ISSUER")]
	pub issuer: String,
	/// Base URL of the downstream API.
	#[arg(long, env = "API_BASE_URL")]
	pub api_base_url: Url,
	/// Location of the capability schema.
	#[arg(long, env = "SCHEMA_URL")]
	pub schema_url: Url,
	/// Static bearer sent to the schema source.
	#[arg(long, env = "SCHEMA_BEARER", hide_env_values = true)]
	pub schema_bearer: Option<String>,
	/// Catalog freshness window, in seconds.
	#[arg(long, env = "SCHEMA_TTL_SECS", default_value_t = DEFAULT_SCHEMA_TTL.as_secs())]
	pub schema_ttl_secs: u64,
	/// Schema fetch deadline, in seconds.
	#[arg(long, env = "SCHEMA_TIMEOUT_SECS", default_value_t = DEFAULT_SCHEMA_TIMEOUT.as_secs())]
	pub schema_timeout_secs: u64,
	/// Key set location; `<issuer>/.well-known/jwks.json` when omitted.
	#[arg(long, env = "JWKS_URI")]
	pub jwks_uri: Option<Url>,
	/// Signing-key lookup deadline, in milliseconds.
	#[arg(long, env = "JWKS_TIMEOUT_MS", default_value_t = DEFAULT_JWKS_TIMEOUT.as_millis() as u64)]
	pub jwks_timeout_ms: u64,
	/// Maximum number of cached signing keys.
	#[arg(long, env = "JWKS_CACHE_MAX_ENTRIES", default_value_t = DEFAULT_JWKS_CACHE_MAX_ENTRIES)]
	pub jwks_cache_max_entries: u64,
	/// Maximum age of a cached signing key, in milliseconds.
	#[arg(
		long,
		env = "JWKS_CACHE_MAX_AGE_MS",
		default_value_t = DEFAULT_JWKS_CACHE_MAX_AGE.as_millis() as u64
	)]
	pub jwks_cache_max_age_ms: u64,
	/// Key set fetches allowed per minute.
	#[arg(long, env = "JWKS_REQUESTS_PER_MINUTE", default_value_t = DEFAULT_JWKS_REQUESTS_PER_MINUTE)]
	pub jwks_requests_per_minute: u32,
	/// Accepted token signing algorithm.
	#[arg(long, env = "TOKEN_ALGORITHM", default_value = "RS256", value_parser = ValidationConfig::parse_algorithm)]
	pub algorithm: Algorithm,
	/// Clock skew tolerated on `exp` and `nbf`, in seconds.
	#[arg(long, env = "TOKEN_LEEWAY_SECS", default_value_t = 0)]
	pub leeway_secs: u64,
	/// Listen address.
	#[arg(long, env = "BIND_ADDR", default_value_t = DEFAULT_BIND)]
	pub bind: SocketAddr,
	/// Public URL of this gateway; `http://<bind>/` when omitted.
	#[arg(long, env = "RESOURCE_URL")]
	pub resource_url: Option<Url>,
	/// Scopes advertised in protected-resource metadata.
	#[arg(long = "scope-supported", env = "SCOPES_SUPPORTED", value_delimiter = ' ')]
	pub scopes_supported: Vec<String>,
	/// Registration base URL; the issuer when omitted.
	#[arg(long, env = "REGISTRATION_BASE_URL")]
	pub registration_base_url: Option<Url>,
	/// Service credential settings.
	#[command(flatten)]
	pub credentials: CredentialArgs,
}
impl GatewayArgs {
	/// Builds and validates the gateway configuration.
	pub fn into_config(self) -> Result<GatewayConfig> {
		let mut config = GatewayConfig::new(self.issuer, self.api_base_url, self.schema_url)?;

		if let Some(uri) = self.jwks_uri {
			config.jwks.uri = uri;
		}

		config.jwks.timeout = StdDuration::from_millis(self.jwks_timeout_ms);
		config.jwks.cache_max_entries = self.jwks_cache_max_entries;
		config.jwks.cache_max_age = StdDuration::from_millis(self.jwks_cache_max_age_ms);
		config.jwks.requests_per_minute = self.jwks_requests_per_minute;
		config.validation = ValidationConfig { algorithm: self.algorithm, leeway_secs: self.leeway_secs };
		config.schema.ttl = StdDuration::from_secs(self.schema_ttl_secs);
		config.schema.timeout = StdDuration::from_secs(self.schema_timeout_secs);
		config.schema.bearer = self.schema_bearer.map(TokenSecret::new);
		config.server = ServerConfig::bound_to(self.bind)?;

		if let Some(resource_url) = self.resource_url {
			config.server.resource_url = resource_url;
		}

		config.server.scopes_supported = self.scopes_supported;
		config.registration.base_url = self.registration_base_url;
		config.credentials = self.credentials.into_config();
		config.validate()?;

		Ok(config)
	}
}

/// Service credential flags.
#[derive(Debug, Args)]
pub struct CredentialArgs {
	/// OAuth client identifier.
	#[arg(long, env = "CLIENT_ID")]
	pub client_id: Option<String>,
	/// OAuth client secret.
	#[arg(long, env = "CLIENT_SECRET", hide_env_values = true)]
	pub client_secret: Option<String>,
	/// Space-delimited scope requested with the credential.
	#[arg(long, env = "CLIENT_SCOPE")]
	pub client_scope: Option<String>,
	/// Audience requested with the credential.
	#[arg(long, env = "CLIENT_AUDIENCE")]
	pub client_audience: Option<String>,
	/// Token endpoint path relative to the credential base URL.
	#[arg(long, env = "TOKEN_PATH", default_value = DEFAULT_TOKEN_PATH)]
	pub token_path: String,
	/// Margin before expiry at which the credential is replaced, in seconds.
	#[arg(long, env = "TOKEN_SAFETY_WINDOW_SECS", default_value_t = DEFAULT_SAFETY_WINDOW.as_secs())]
	pub safety_window_secs: u64,
}
impl CredentialArgs {
	fn into_config(self) -> ClientCredentialConfig {
		ClientCredentialConfig {
			client_id: self.client_id,
			client_secret: self.client_secret.map(TokenSecret::new),
			scope: self.client_scope,
			audience: self.client_audience,
			token_path: self.token_path,
			safety_window: StdDuration::from_secs(self.safety_window_secs),
		}
	}
}

/// Client registration control plane.
#[derive(Debug, Args)]
pub struct DcrArgs {
	/// Authorization server; also the default credential and registration base URL.
	#[arg(long, env = "ISSUER")]
	pub issuer: Url,
	/// Registration base URL; the issuer when omitted.
	#[arg(long, env = "REGISTRATION_BASE_URL")]
	pub registration_base_url: Option<Url>,
	/// Registration endpoint path relative to the base URL.
	#[arg(long, env = "REGISTRATION_PATH", default_value = DEFAULT_REGISTRATION_PATH)]
	pub registration_path: String,
	/// Service credential settings.
	#[command(flatten)]
	pub credentials: CredentialArgs,
	/// Lifecycle step to run.
	#[command(subcommand)]
	pub command: DcrCommand,
}

/// Registration lifecycle steps.
#[derive(Debug, Subcommand)]
pub enum DcrCommand {
	/// Register a new client.
	Register {
		/// Client metadata as a JSON object.
		#[arg(long, value_parser = parse_metadata)]
		metadata: ClientMetadata,
		/// Initial access token; a service credential is minted when omitted.
		#[arg(long, env = "INITIAL_ACCESS_TOKEN", hide_env_values = true)]
		initial_access_token: Option<String>,
	},
	/// Read a client's current configuration.
	Fetch {
		/// Client configuration endpoint.
		registration_uri: Url,
		/// Registration access token.
		#[arg(long, env = "REGISTRATION_ACCESS_TOKEN", hide_env_values = true)]
		token: String,
	},
	/// Replace or patch a client's configuration.
	Update {
		/// Client configuration endpoint.
		registration_uri: Url,
		/// Registration access token.
		#[arg(long, env = "REGISTRATION_ACCESS_TOKEN", hide_env_values = true)]
		token: String,
		/// Client metadata as a JSON object.
		#[arg(long, value_parser = parse_metadata)]
		metadata: ClientMetadata,
		/// Send `PATCH` instead of `PUT`.
		#[arg(long)]
		patch: bool,
	},
	/// Delete a client.
	Delete {
		/// Client configuration endpoint.
		registration_uri: Url,
		/// Registration access token.
		#[arg(long, env = "REGISTRATION_ACCESS_TOKEN", hide_env_values = true)]
		token: String,
	},
}

impl DcrArgs {
	async fn run(self) -> Result<()> {
		let http_client = ReqwestClient::builder()
			.timeout(config::DEFAULT_REQUEST_TIMEOUT)
			.build()
			.map_err(ConfigError::from)?;
		let registration = RegistrationConfig {
			base_url: self.registration_base_url,
			endpoint_path: self.registration_path,
		};
		let broker = RegistrationBroker::new(http_client.clone(), self.issuer.clone(), &registration);

		match self.command {
			DcrCommand::Register { metadata, initial_access_token } => {
				let credentials = ClientCredentialCache::new(self.credentials.into_config(), http_client);
				let record = broker
					.register_with_credentials(
						&metadata,
						initial_access_token.map(TokenSecret::new),
						&credentials,
						None,
					)
					.await?;

				print_json(&record)
			},
			DcrCommand::Fetch { registration_uri, token } =>
				print_json(&broker.fetch(&registration_uri, &TokenSecret::new(token)).await?),
			DcrCommand::Update { registration_uri, token, metadata, patch } => print_json(
				&broker.update(&registration_uri, &TokenSecret::new(token), &metadata, patch).await?,
			),
			DcrCommand::Delete { registration_uri, token } => {
				broker.delete(&registration_uri, &TokenSecret::new(token)).await?;

				tracing::info!(%registration_uri, "Client deleted.");

				Ok(())
			},
		}
	}
}

/// Runs `command` to completion.
pub async fn run(command: Command) -> Result<()> {
	match command {
		Command::Serve(args) => {
			let gateway = Gateway::from_config(args.into_config()?)?;

			server::serve(Arc::new(gateway)).await
		},
		Command::Schema(args) => {
			let gateway = Gateway::from_config(args.into_config()?)?;

			print_json(&gateway.capabilities().api_metadata().await?)
		},
		Command::Dcr(args) => args.run().await,
	}
}

fn parse_metadata(raw: &str) -> Result<ClientMetadata, serde_json::Error> {
	serde_json::from_str(raw)
}

fn print_json(value: &impl Serialize) -> Result<()> {
	let rendered = serde_json::to_string_pretty(value)
		.map_err(|e| TransportError::Io(std::io::Error::from(e)))?;

	println!("{rendered}");

	Ok(())
}
