//! Process-wide context wiring every component, plus the `/exec` request boundary.
//!
//! One [`Gateway`] owns the key resolver, the catalog and credential caches, and the brokers.
//! Handlers borrow it; nothing lives in module-level state.

// self
use crate::{
	_prelude::*,
	auth::{KeyResolver, ScopeSet, TokenSecret, TokenValidator},
	capability::{CapabilityCache, HttpMethod, HttpSchemaSource, SchemaSource},
	clock::SystemClock,
	config::GatewayConfig,
	credentials::ClientCredentialCache,
	discovery::{AuthorizationServerMetadata, ProtectedResourceMetadata},
	dispatch::Dispatcher,
	error::ConfigError,
	registration::RegistrationBroker,
};

/// Realm advertised in bearer challenges.
pub const CHALLENGE_REALM: &str = "mcp";

/// Action invocation decoded from an `/exec` body.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecRequest {
	/// Action identifier.
	pub action: String,
	/// Untyped argument bag.
	pub args: JsonMap<String, JsonValue>,
}
impl ExecRequest {
	/// Decodes `{ "action": string, "args"?: object }`.
	///
	/// Only the presence and type of `action` are checked; `args` defaults to an empty object.
	pub fn from_slice(body: &[u8]) -> Result<Self> {
		let invalid = |reason: &str| Error::InvalidRequest { reason: reason.to_owned() };
		let value: JsonValue =
			serde_json::from_slice(body).map_err(|_| invalid("body is not valid JSON"))?;
		let JsonValue::Object(mut object) = value else {
			return Err(invalid("body must be a JSON object"));
		};
		let action = match object.remove("action") {
			Some(JsonValue::String(action)) if !action.is_empty() => action,
			_ => return Err(invalid("field `action` must be a non-empty string")),
		};
		let args = match object.remove("args") {
			None | Some(JsonValue::Null) => JsonMap::new(),
			Some(JsonValue::Object(args)) => args,
			Some(_) => return Err(invalid("field `args` must be an object")),
		};

		Ok(Self { action, args })
	}
}

/// Successful `/exec` response.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExecResponse {
	/// Always `true`.
	pub ok: bool,
	/// Downstream payload.
	pub data: JsonValue,
	/// Invoked action identifier.
	pub action: String,
	/// HTTP method used downstream.
	pub method: HttpMethod,
	/// Path and query used downstream.
	pub path: String,
	/// Subject of the caller's token.
	pub token_subject: Option<String>,
	/// Scopes granted to the caller's token.
	pub token_scopes: ScopeSet,
}

/// Failure body shared by every error response.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ErrorEnvelope {
	/// Always `false`.
	pub ok: bool,
	/// Stable error code.
	pub error: &'static str,
	/// Human-readable message.
	pub message: String,
	/// Known action identifiers, for `unknown_action`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub available_actions: Option<Vec<String>>,
	/// Downstream response body, for `downstream_error`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<JsonValue>,
}
impl From<&Error> for ErrorEnvelope {
	fn from(e: &Error) -> Self {
		let (available_actions, details) = match e {
			Error::UnknownAction { available_actions, .. } => (Some(available_actions.clone()), None),
			Error::Downstream { body, .. } => (None, Some(body.clone())),
			_ => (None, None),
		};

		Self { ok: false, error: e.code(), message: e.to_string(), available_actions, details }
	}
}

/// Well-known documents rendered once from configuration.
#[derive(Clone, Debug)]
pub struct DiscoveryDocuments {
	/// `/.well-known/oauth-protected-resource`.
	pub protected_resource: ProtectedResourceMetadata,
	/// `/.well-known/oauth-authorization-server`.
	pub authorization_server: AuthorizationServerMetadata,
	/// `/.well-known/openid-configuration`.
	pub openid_configuration: AuthorizationServerMetadata,
}

/// Shared gateway context.
#[derive(Debug)]
pub struct Gateway {
	config: GatewayConfig,
	validator: TokenValidator,
	capabilities: Arc<CapabilityCache>,
	dispatcher: Dispatcher,
	credentials: ClientCredentialCache,
	registration: RegistrationBroker,
	discovery: DiscoveryDocuments,
	challenge: String,
}
impl Gateway {
	/// Builds every component from `config`, fetching the catalog over HTTP.
	pub fn from_config(config: GatewayConfig) -> Result<Self> {
		let http_client = build_http_client(&config)?;
		let source = Arc::new(HttpSchemaSource::new(http_client.clone(), &config.schema));

		Self::assemble(config, http_client, source)
	}

	/// Builds every component from `config`, reading the catalog from `source`.
	pub fn with_schema_source(config: GatewayConfig, source: Arc<dyn SchemaSource>) -> Result<Self> {
		let http_client = build_http_client(&config)?;

		Self::assemble(config, http_client, source)
	}

	fn assemble(
		config: GatewayConfig,
		http_client: ReqwestClient,
		source: Arc<dyn SchemaSource>,
	) -> Result<Self> {
		config.validate()?;

		let resolver = KeyResolver::new(http_client.clone(), &config.jwks, SystemClock::shared());
		let validator = TokenValidator::new(resolver, &config.issuer, &config.validation);
		let capabilities = Arc::new(CapabilityCache::new(source, config.schema.ttl));
		let dispatcher = Dispatcher::new(capabilities.clone(), http_client.clone(), &config.api);
		let credentials = ClientCredentialCache::new(config.credentials.clone(), http_client.clone());
		let registration =
			RegistrationBroker::new(http_client, config.issuer_url.clone(), &config.registration);
		let discovery = DiscoveryDocuments {
			protected_resource: ProtectedResourceMetadata::from_config(&config),
			authorization_server: AuthorizationServerMetadata::from_config(&config)?,
			openid_configuration: AuthorizationServerMetadata::openid_from_config(&config)?,
		};
		let challenge = format!(
			"Bearer realm=\"{CHALLENGE_REALM}\", resource_metadata=\"{}\"",
			config.resource_metadata_url()?
		);

		Ok(Self {
			config,
			validator,
			capabilities,
			dispatcher,
			credentials,
			registration,
			discovery,
			challenge,
		})
	}

	/// Configuration the gateway was built from.
	pub fn config(&self) -> &GatewayConfig {
		&self.config
	}

	/// Token validator.
	pub fn validator(&self) -> &TokenValidator {
		&self.validator
	}

	/// Capability catalog cache.
	pub fn capabilities(&self) -> &CapabilityCache {
		&self.capabilities
	}

	/// Action dispatcher.
	pub fn dispatcher(&self) -> &Dispatcher {
		&self.dispatcher
	}

	/// Service credential cache.
	pub fn credentials(&self) -> &ClientCredentialCache {
		&self.credentials
	}

	/// Client registration broker.
	pub fn registration(&self) -> &RegistrationBroker {
		&self.registration
	}

	/// Discovery documents.
	pub fn discovery(&self) -> &DiscoveryDocuments {
		&self.discovery
	}

	/// `WWW-Authenticate` value pointing callers at the protected-resource metadata.
	pub fn challenge(&self) -> &str {
		&self.challenge
	}

	/// Challenge to attach to a response for `error`: the downstream one when it sent one,
	/// ours for any other 401, none otherwise.
	pub fn challenge_for<'a>(&'a self, error: &'a Error) -> Option<&'a str> {
		match error {
			Error::Downstream { status: 401, challenge: Some(challenge), .. } =>
				Some(challenge.as_str()),
			_ if error.http_status() == 401 => Some(self.challenge.as_str()),
			_ => None,
		}
	}

	/// Authenticates the caller from `authorization`, then runs the action named in `body` with
	/// the caller's own token.
	pub async fn execute(&self, authorization: Option<&str>, body: &[u8]) -> Result<ExecResponse> {
		let presented = authorization.and_then(TokenSecret::from_authorization);
		let token = self.validator.validate(presented.as_ref().map(TokenSecret::expose)).await?;
		let request = ExecRequest::from_slice(body)?;

		tracing::debug!(action = %request.action, sub = token.subject(), "Executing action.");

		let outcome = self.dispatcher.dispatch(&request.action, &request.args, &token.raw).await?;

		Ok(ExecResponse {
			ok: true,
			data: outcome.data,
			action: outcome.action,
			method: outcome.method,
			path: outcome.path,
			token_subject: token.claims.sub.clone(),
			token_scopes: token.scopes.clone(),
		})
	}
}

fn build_http_client(config: &GatewayConfig) -> Result<ReqwestClient> {
	ReqwestClient::builder()
		.timeout(config.api.request_timeout)
		.build()
		.map_err(|e| ConfigError::from(e).into())
}
