//! Gateway-level error types shared by validation, catalog, dispatch, and registration.

// self
use crate::{
	_prelude::*,
	auth::{JwksError, TokenValidationError, ValidationFailure},
	registration::RegistrationError,
};

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical gateway error exposed by public APIs.
///
/// Every variant maps onto a stable machine-readable [`code`](Error::code) and an HTTP
/// [`status`](Error::http_status) so the server surface never has to inspect messages.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Caller's bearer token was rejected.
	#[error(transparent)]
	InvalidToken(#[from] TokenValidationError),
	/// Signing-key lookup failed outside token validation.
	#[error(transparent)]
	Jwks(#[from] JwksError),
	/// Registration endpoint rejected or failed a lifecycle call.
	#[error(transparent)]
	Registration(#[from] RegistrationError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Requested action is not present in the capability catalog.
	#[error("Unknown action `{action}`.")]
	UnknownAction {
		/// Action identifier supplied by the caller.
		action: String,
		/// Identifiers the catalog does expose, in catalog order.
		available_actions: Vec<String>,
	},
	/// Inbound request body is not an action invocation.
	#[error("Request is invalid: {reason}.")]
	InvalidRequest {
		/// Human-readable reason.
		reason: String,
	},
	/// Downstream API answered with a non-success status.
	#[error("Downstream API responded with HTTP {status}.")]
	Downstream {
		/// Status code returned downstream.
		status: u16,
		/// Response body, parsed as JSON when possible.
		body: JsonValue,
		/// `WWW-Authenticate` challenge returned alongside a 401.
		challenge: Option<String>,
	},
	/// Token endpoint rejected the configured client credentials.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider-supplied reason string.
		reason: String,
	},
}
impl Error {
	/// Stable machine-readable code used in error envelopes.
	pub fn code(&self) -> &'static str {
		match self {
			Self::InvalidToken(e) => e.code.as_str(),
			Self::Jwks(e) => TokenValidationError::new(ValidationFailure::from(e.clone())).code.as_str(),
			Self::Registration(_) => "dcr_broker_error",
			Self::Config(_) => "configuration_error",
			Self::Transient(_) | Self::Transport(_) => "upstream_unavailable",
			Self::UnknownAction { .. } => "unknown_action",
			Self::InvalidRequest { .. } => "invalid_request",
			Self::Downstream { .. } => "downstream_error",
			Self::InvalidClient { .. } => "invalid_client",
		}
	}

	/// HTTP status the server surface answers with.
	pub fn http_status(&self) -> u16 {
		match self {
			Self::InvalidToken(e) => e.http_status,
			Self::Jwks(e) => TokenValidationError::new(ValidationFailure::from(e.clone())).http_status,
			Self::Registration(e) => e.status.unwrap_or(502),
			Self::Config(_) | Self::InvalidClient { .. } => 500,
			Self::Transient(_) | Self::Transport(_) => 503,
			Self::UnknownAction { .. } | Self::InvalidRequest { .. } => 400,
			Self::Downstream { status, .. } => *status,
		}
	}
}

/// Configuration and validation failures raised by the gateway.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A configured URL cannot be parsed or joined.
	#[error("Setting `{name}` is not a valid URL.")]
	InvalidUrl {
		/// Setting name.
		name: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A setting holds an unusable value.
	#[error("Setting `{name}` is invalid: {reason}.")]
	InvalidSetting {
		/// Setting name.
		name: &'static str,
		/// Human-readable reason.
		reason: String,
	},
	/// Configured signing algorithm is unknown or symmetric.
	#[error("Signing algorithm `{alg}` is not an accepted asymmetric algorithm.")]
	UnsupportedAlgorithm {
		/// Algorithm name as configured.
		alg: String,
	},

	/// Client id or secret is absent while a service credential was requested.
	#[error("Client credentials are not configured.")]
	MissingClientCredentials,
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Builds an [`ConfigError::InvalidSetting`] from any displayable reason.
	pub fn invalid(name: &'static str, reason: impl Display) -> Self {
		Self::InvalidSetting { name, reason: reason.to_string() }
	}
}
impl From<reqwest::Error> for ConfigError {
	fn from(e: reqwest::Error) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Token endpoint returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or gateway-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Schema source answered with a non-success status.
	#[error("Schema source responded with HTTP {status}.")]
	SchemaSource {
		/// HTTP status code.
		status: u16,
	},
	/// Schema document could not be decoded.
	#[error("Schema document is malformed.")]
	SchemaParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Schema document decoded but violates catalog rules.
	#[error("Schema document is invalid: {reason}.")]
	InvalidCatalog {
		/// Human-readable reason.
		reason: String,
	},
	/// A remote call did not settle before its deadline.
	#[error("The {operation} call did not complete within {after:?}.")]
	Timeout {
		/// Short label of the remote call.
		operation: &'static str,
		/// Deadline that elapsed.
		after: StdDuration,
	},
	/// A remote call ended without producing a result.
	#[error("The {operation} call was interrupted before it completed.")]
	Interrupted {
		/// Short label of the remote call.
		operation: &'static str,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling an upstream endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling an upstream endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
impl From<ReqwestError> for Error {
	fn from(e: ReqwestError) -> Self {
		Self::Transport(e.into())
	}
}
