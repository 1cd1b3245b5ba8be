//! Discovery documents served from configuration.

// self
use crate::{_prelude::*, config::GatewayConfig};

/// OAuth 2.0 protected-resource metadata (RFC 9728).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProtectedResourceMetadata {
	/// This resource server.
	pub resource: Url,
	/// Issuers whose tokens are accepted.
	pub authorization_servers: Vec<String>,
	/// Accepted bearer presentation methods.
	pub bearer_methods_supported: Vec<&'static str>,
	/// Scopes this resource understands.
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub scopes_supported: Vec<String>,
}
impl ProtectedResourceMetadata {
	/// Builds the document for `config`.
	pub fn from_config(config: &GatewayConfig) -> Self {
		Self {
			resource: config.server.resource_url.clone(),
			authorization_servers: vec![config.issuer.clone()],
			bearer_methods_supported: vec!["header"],
			scopes_supported: config.server.scopes_supported.clone(),
		}
	}
}

/// OAuth 2.0 authorization-server metadata (RFC 8414); with the OpenID fields set it doubles as
/// an OpenID Provider configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuthorizationServerMetadata {
	/// Issuer identifier.
	pub issuer: String,
	/// Signing key set.
	pub jwks_uri: Url,
	/// Token endpoint.
	pub token_endpoint: Url,
	/// Dynamic client registration endpoint.
	pub registration_endpoint: Url,
	/// Grants the gateway relies on.
	pub grant_types_supported: Vec<&'static str>,
	/// Client authentication methods the gateway uses.
	pub token_endpoint_auth_methods_supported: Vec<&'static str>,
	/// Accepted token signing algorithms.
	pub id_token_signing_alg_values_supported: Vec<String>,
	/// OpenID subject identifier types.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub subject_types_supported: Option<Vec<&'static str>>,
	/// OpenID response types.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub response_types_supported: Option<Vec<&'static str>>,
}
impl AuthorizationServerMetadata {
	/// Builds the RFC 8414 document for `config`.
	pub fn from_config(config: &GatewayConfig) -> Result<Self> {
		Ok(Self {
			issuer: config.issuer.clone(),
			jwks_uri: config.jwks.uri.clone(),
			token_endpoint: config.token_endpoint()?,
			registration_endpoint: config.registration_endpoint()?,
			grant_types_supported: vec!["client_credentials"],
			token_endpoint_auth_methods_supported: vec!["client_secret_post"],
			id_token_signing_alg_values_supported: vec![format!("{:?}", config.validation.algorithm)],
			subject_types_supported: None,
			response_types_supported: None,
		})
	}

	/// Builds the OpenID Provider configuration for `config`.
	pub fn openid_from_config(config: &GatewayConfig) -> Result<Self> {
		Ok(Self {
			subject_types_supported: Some(vec!["public"]),
			response_types_supported: Some(vec!["token"]),
			..Self::from_config(config)?
		})
	}
}
