//! Bearer token validation.
//!
//! The header is inspected before any key lookup, so structurally broken tokens and tokens
//! signed with an algorithm outside the allow-list never trigger a key-set fetch. Audience is
//! deliberately left unchecked; issuer, signature, expiry, and not-before are enforced.

// crates.io
use jsonwebtoken::{Algorithm, Validation, errors::ErrorKind};
// self
use crate::{
	_prelude::*,
	auth::{JwksError, KeyResolver, ScopeSet, TokenSecret},
	config::ValidationConfig,
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Error code carried by a [`TokenValidationError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationCode {
	/// Token is missing, malformed, expired, or otherwise unacceptable.
	InvalidToken,
	/// Signing keys could not be fetched in time.
	JwksTimeout,
	/// Signing keys could not be fetched at all.
	JwksUnavailable,
}
impl ValidationCode {
	/// Stable wire label.
	pub const fn as_str(self) -> &'static str {
		match self {
			ValidationCode::InvalidToken => "invalid_token",
			ValidationCode::JwksTimeout => "jwks_timeout",
			ValidationCode::JwksUnavailable => "jwks_unavailable",
		}
	}
}

/// Reason a token was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValidationFailure {
	/// No bearer token was presented.
	Missing,
	/// Token is not a structurally valid JWT.
	Malformed,
	/// Token's `exp` is in the past.
	Expired,
	/// Token's `nbf` is in the future.
	NotYetValid,
	/// Signature, issuer, algorithm, or key selection failed.
	Invalid,
	/// Signing-key lookup hit its deadline.
	KeyTimeout,
	/// Signing-key lookup failed or was rate limited.
	KeyUnavailable,
}
impl ValidationFailure {
	const fn message(self) -> &'static str {
		match self {
			ValidationFailure::Missing => "Missing bearer token",
			ValidationFailure::Malformed => "Malformed token",
			ValidationFailure::Expired => "Token expired",
			ValidationFailure::NotYetValid => "Token not yet valid",
			ValidationFailure::Invalid => "Invalid token",
			ValidationFailure::KeyTimeout => "Timed out fetching signing keys",
			ValidationFailure::KeyUnavailable => "Signing keys are unavailable",
		}
	}

	const fn code(self) -> ValidationCode {
		match self {
			ValidationFailure::KeyTimeout => ValidationCode::JwksTimeout,
			ValidationFailure::KeyUnavailable => ValidationCode::JwksUnavailable,
			_ => ValidationCode::InvalidToken,
		}
	}

	const fn http_status(self) -> u16 {
		match self {
			ValidationFailure::KeyTimeout | ValidationFailure::KeyUnavailable => 503,
			_ => 401,
		}
	}
}
impl From<JwksError> for ValidationFailure {
	fn from(e: JwksError) -> Self {
		match e {
			JwksError::Timeout { .. } => ValidationFailure::KeyTimeout,
			JwksError::RateLimited { .. } | JwksError::Unavailable { .. } =>
				ValidationFailure::KeyUnavailable,
			JwksError::KeyNotFound { .. } => ValidationFailure::Invalid,
		}
	}
}
impl From<&jsonwebtoken::errors::Error> for ValidationFailure {
	fn from(e: &jsonwebtoken::errors::Error) -> Self {
		match e.kind() {
			ErrorKind::ExpiredSignature => ValidationFailure::Expired,
			ErrorKind::ImmatureSignature => ValidationFailure::NotYetValid,
			ErrorKind::InvalidToken
			| ErrorKind::Base64(_)
			| ErrorKind::Json(_)
			| ErrorKind::Utf8(_)
			| ErrorKind::MissingRequiredClaim(_) => ValidationFailure::Malformed,
			_ => ValidationFailure::Invalid,
		}
	}
}

/// Normalized token rejection with its wire code and HTTP status.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("{message}")]
pub struct TokenValidationError {
	/// Underlying reason.
	pub failure: ValidationFailure,
	/// Wire code for error envelopes.
	pub code: ValidationCode,
	/// HTTP status to answer with.
	pub http_status: u16,
	/// Human-readable message, one per failure kind.
	pub message: &'static str,
}
impl TokenValidationError {
	/// Builds the error for `failure`.
	pub const fn new(failure: ValidationFailure) -> Self {
		Self {
			failure,
			code: failure.code(),
			http_status: failure.http_status(),
			message: failure.message(),
		}
	}
}
impl From<ValidationFailure> for TokenValidationError {
	fn from(failure: ValidationFailure) -> Self {
		Self::new(failure)
	}
}

/// `aud` claim, which issuers emit either as a string or an array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
	/// Single audience.
	One(String),
	/// Multiple audiences.
	Many(Vec<String>),
}

/// Claims read from a verified token.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenClaims {
	/// Subject.
	#[serde(default)]
	pub sub: Option<String>,
	/// Issuer.
	pub iss: String,
	/// Audience, surfaced but not enforced.
	#[serde(default)]
	pub aud: Option<Audience>,
	/// Expiry (seconds since the Unix epoch).
	pub exp: i64,
	/// Issued-at (seconds since the Unix epoch).
	#[serde(default)]
	pub iat: Option<i64>,
	/// Not-before (seconds since the Unix epoch).
	#[serde(default)]
	pub nbf: Option<i64>,
	/// Space-delimited string or array form of granted scopes.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<JsonValue>,
	/// Array or space-delimited string form of granted scopes.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scp: Option<JsonValue>,
}
impl TokenClaims {
	/// Union of the `scope` and `scp` claims.
	pub fn scopes(&self) -> ScopeSet {
		scope_claim(self.scope.as_ref()).union(&scope_claim(self.scp.as_ref()))
	}
}

/// Token that passed validation.
#[derive(Clone, Debug)]
pub struct ValidatedToken {
	/// Token as presented by the caller.
	pub raw: TokenSecret,
	/// Decoded claims.
	pub claims: TokenClaims,
	/// Granted scopes.
	pub scopes: ScopeSet,
}
impl ValidatedToken {
	/// Token subject, when present.
	pub fn subject(&self) -> Option<&str> {
		self.claims.sub.as_deref()
	}
}

/// Verifies bearer tokens issued by a single issuer.
#[derive(Clone, Debug)]
pub struct TokenValidator {
	resolver: KeyResolver,
	algorithm: Algorithm,
	validation: Validation,
}
impl TokenValidator {
	/// Creates a validator accepting tokens from `issuer` signed per `config`.
	pub fn new(resolver: KeyResolver, issuer: &str, config: &ValidationConfig) -> Self {
		let mut validation = Validation::new(config.algorithm);

		validation.set_issuer(&[issuer]);
		validation.set_required_spec_claims(&["exp", "iss"]);
		validation.validate_aud = false;
		validation.validate_nbf = true;
		validation.leeway = config.leeway_secs;

		Self { resolver, algorithm: config.algorithm, validation }
	}

	/// Signing-key resolver backing this validator.
	pub fn resolver(&self) -> &KeyResolver {
		&self.resolver
	}

	/// Validates `raw`, which is `None` when the caller presented no bearer token.
	pub async fn validate(&self, raw: Option<&str>) -> Result<ValidatedToken, TokenValidationError> {
		let span = OpSpan::new(OpKind::TokenValidation, "validate");

		span.instrument(async move {
			obs::record_op_outcome(OpKind::TokenValidation, OpOutcome::Attempt);

			let result = self.validate_inner(raw).await;

			match &result {
				Ok(token) => {
					tracing::debug!(sub = token.subject(), "Token accepted.");
					obs::record_op_outcome(OpKind::TokenValidation, OpOutcome::Success);
				},
				Err(e) => {
					tracing::info!(reason = ?e.failure, "Token rejected.");
					obs::record_op_outcome(OpKind::TokenValidation, OpOutcome::Failure);
				},
			}

			result
		})
		.await
	}

	async fn validate_inner(&self, raw: Option<&str>) -> Result<ValidatedToken, TokenValidationError> {
		let raw = raw.map(str::trim).filter(|raw| !raw.is_empty()).ok_or(ValidationFailure::Missing)?;
		let header = jsonwebtoken::decode_header(raw).map_err(|_| ValidationFailure::Malformed)?;

		if header.alg != self.algorithm {
			return Err(ValidationFailure::Invalid.into());
		}

		let kid = header.kid.ok_or(ValidationFailure::Malformed)?;
		let key = self.resolver.signing_key(&kid).await.map_err(ValidationFailure::from)?;
		let data = jsonwebtoken::decode::<TokenClaims>(raw, &key.key, &self.validation)
			.map_err(|e| ValidationFailure::from(&e))?;
		let scopes = data.claims.scopes();

		Ok(ValidatedToken { raw: TokenSecret::new(raw), claims: data.claims, scopes })
	}
}

fn scope_claim(value: Option<&JsonValue>) -> ScopeSet {
	match value {
		Some(JsonValue::String(s)) => ScopeSet::lenient([s]),
		Some(JsonValue::Array(items)) => ScopeSet::lenient(items.iter().filter_map(JsonValue::as_str)),
		_ => ScopeSet::default(),
	}
}
