//! Dynamic client registration (RFC 7591) and its management lifecycle (RFC 7592).
//!
//! Every failure, whether an HTTP error status, an unreadable response, or a transport
//! problem, is reported as one [`RegistrationError`] naming the lifecycle stage. Calls are not
//! retried.

// crates.io
use reqwest::{RequestBuilder, header::ACCEPT};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::{self, RegistrationConfig},
	credentials::ClientCredentialCache,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Maximum length, in characters, of an error summary.
pub const SUMMARY_LIMIT: usize = 200;

/// Lifecycle call that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStage {
	/// `POST` to the registration endpoint.
	Register,
	/// `GET` of the client configuration.
	Fetch,
	/// `PUT`/`PATCH` of the client configuration.
	Update,
	/// `DELETE` of the client configuration.
	Delete,
}
impl RegistrationStage {
	/// Stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			RegistrationStage::Register => "register",
			RegistrationStage::Fetch => "fetch",
			RegistrationStage::Update => "update",
			RegistrationStage::Delete => "delete",
		}
	}
}
impl Display for RegistrationStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Normalized registration failure.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error(
	"Client registration {stage} failed{}: {summary}.",
	.status.map(|status| format!(" with HTTP {status}")).unwrap_or_default()
)]
pub struct RegistrationError {
	/// Lifecycle call that failed.
	pub stage: RegistrationStage,
	/// HTTP status, absent for transport failures.
	pub status: Option<u16>,
	/// Truncated description of the failure, at most [`SUMMARY_LIMIT`] characters.
	pub summary: String,
}
impl RegistrationError {
	/// Builds an error, truncating `detail` to [`SUMMARY_LIMIT`] characters.
	pub fn new(stage: RegistrationStage, status: Option<u16>, detail: impl AsRef<str>) -> Self {
		Self { stage, status, summary: summarize(detail.as_ref()) }
	}
}

/// Trims `detail` and truncates it to [`SUMMARY_LIMIT`] characters, ending in `…` when cut.
pub fn summarize(detail: &str) -> String {
	let detail = detail.trim();

	if detail.chars().count() <= SUMMARY_LIMIT {
		return detail.to_owned();
	}

	let mut summary = detail.chars().take(SUMMARY_LIMIT - 1).collect::<String>();

	summary.push('…');

	summary
}

/// Client metadata submitted on registration and update.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientMetadata {
	/// Human-readable client name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_name: Option<String>,
	/// Redirect URIs.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub redirect_uris: Vec<String>,
	/// Grant types the client will use.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub grant_types: Vec<String>,
	/// Response types the client will use.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub response_types: Vec<String>,
	/// Space-delimited scope.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
	/// Token endpoint authentication method.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_endpoint_auth_method: Option<String>,
	/// Any other metadata, passed through untouched.
	#[serde(flatten)]
	pub extra: JsonMap<String, JsonValue>,
}
impl ClientMetadata {
	/// Metadata naming the client.
	pub fn named(client_name: impl Into<String>) -> Self {
		Self { client_name: Some(client_name.into()), ..Default::default() }
	}

	/// Adds a grant type.
	pub fn with_grant_type(mut self, grant: impl Into<String>) -> Self {
		self.grant_types.push(grant.into());

		self
	}
}

/// Registration record returned by the authorization server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientRegistration {
	/// Issued client identifier.
	pub client_id: String,
	/// Issued client secret.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_secret: Option<TokenSecret>,
	/// Issue time (seconds since the Unix epoch).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_id_issued_at: Option<i64>,
	/// Secret expiry (seconds since the Unix epoch, `0` for never).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_secret_expires_at: Option<i64>,
	/// Client configuration endpoint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub registration_client_uri: Option<Url>,
	/// Token authorizing calls to the configuration endpoint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub registration_access_token: Option<TokenSecret>,
	/// Metadata as registered.
	#[serde(flatten)]
	pub metadata: ClientMetadata,
}

/// Drives the registration lifecycle against an authorization server.
#[derive(Clone, Debug)]
pub struct RegistrationBroker {
	http_client: ReqwestClient,
	default_base_url: Url,
	endpoint_path: String,
}
impl RegistrationBroker {
	/// Creates a broker registering at `<base><endpoint_path>`, `default_base_url` being the base
	/// unless a call overrides it.
	pub fn new(http_client: ReqwestClient, default_base_url: Url, config: &RegistrationConfig) -> Self {
		Self {
			http_client,
			default_base_url: config.base_url.clone().unwrap_or(default_base_url),
			endpoint_path: config.endpoint_path.clone(),
		}
	}

	/// Registration endpoint for `base_url`, or for the default base.
	pub fn endpoint(&self, base_url: Option<&Url>) -> Result<Url> {
		let base = base_url.unwrap_or(&self.default_base_url);

		config::join_url("registration.endpoint_path", base, &self.endpoint_path)
	}

	/// Registers a new client, authorizing with `initial_access_token` when given.
	pub async fn register(
		&self,
		metadata: &ClientMetadata,
		initial_access_token: Option<&TokenSecret>,
		base_url: Option<&Url>,
	) -> Result<ClientRegistration, RegistrationError> {
		const STAGE: RegistrationStage = RegistrationStage::Register;

		let endpoint = self
			.endpoint(base_url)
			.map_err(|e| RegistrationError::new(STAGE, None, e.to_string()))?;
		let mut request = self.http_client.post(endpoint).json(metadata);

		if let Some(token) = initial_access_token {
			request = request.bearer_auth(token.expose());
		}

		self.call_for_record(STAGE, request).await
	}

	/// Registers a new client, minting the initial access token from `credentials` at the
	/// registration base URL when none is supplied.
	pub async fn register_with_credentials<C, M>(
		&self,
		metadata: &ClientMetadata,
		initial_access_token: Option<TokenSecret>,
		credentials: &ClientCredentialCache<C, M>,
		base_url: Option<&Url>,
	) -> Result<ClientRegistration>
	where
		C: ?Sized + TokenHttpClient,
		M: ?Sized + TransportErrorMapper<C::TransportError>,
	{
		let initial_access_token = match initial_access_token {
			Some(token) => token,
			None => credentials.access_token(base_url.unwrap_or(&self.default_base_url)).await?,
		};

		Ok(self.register(metadata, Some(&initial_access_token), base_url).await?)
	}

	/// Reads the current client configuration.
	pub async fn fetch(
		&self,
		registration_uri: &Url,
		registration_access_token: &TokenSecret,
	) -> Result<ClientRegistration, RegistrationError> {
		let request = self
			.http_client
			.get(registration_uri.clone())
			.bearer_auth(registration_access_token.expose());

		self.call_for_record(RegistrationStage::Fetch, request).await
	}

	/// Replaces (`PUT`) or patches (`PATCH`) the client configuration.
	pub async fn update(
		&self,
		registration_uri: &Url,
		registration_access_token: &TokenSecret,
		metadata: &ClientMetadata,
		use_patch: bool,
	) -> Result<ClientRegistration, RegistrationError> {
		let request = if use_patch {
			self.http_client.patch(registration_uri.clone())
		} else {
			self.http_client.put(registration_uri.clone())
		};
		let request = request.bearer_auth(registration_access_token.expose()).json(metadata);

		self.call_for_record(RegistrationStage::Update, request).await
	}

	/// Deletes the client.
	pub async fn delete(
		&self,
		registration_uri: &Url,
		registration_access_token: &TokenSecret,
	) -> Result<(), RegistrationError> {
		let request = self
			.http_client
			.delete(registration_uri.clone())
			.bearer_auth(registration_access_token.expose());

		self.call(RegistrationStage::Delete, request).await.map(|_| ())
	}

	async fn call_for_record(
		&self,
		stage: RegistrationStage,
		request: RequestBuilder,
	) -> Result<ClientRegistration, RegistrationError> {
		let (status, body) = self.call(stage, request).await?;

		serde_json::from_slice(&body).map_err(|e| {
			RegistrationError::new(stage, Some(status), format!("unreadable registration record: {e}"))
		})
	}

	async fn call(
		&self,
		stage: RegistrationStage,
		request: RequestBuilder,
	) -> Result<(u16, Vec<u8>), RegistrationError> {
		let span = OpSpan::new(OpKind::Registration, stage.as_str());

		span.instrument(async move {
			obs::record_op_outcome(OpKind::Registration, OpOutcome::Attempt);

			let result = round_trip(stage, request).await;

			match &result {
				Ok((status, _)) => {
					tracing::info!(%stage, status, "Registration call succeeded.");
					obs::record_op_outcome(OpKind::Registration, OpOutcome::Success);
				},
				Err(e) => {
					tracing::warn!(%stage, status = e.status, summary = %e.summary, "Registration call failed.");
					obs::record_op_outcome(OpKind::Registration, OpOutcome::Failure);
				},
			}

			result
		})
		.await
	}
}

async fn round_trip(
	stage: RegistrationStage,
	request: RequestBuilder,
) -> Result<(u16, Vec<u8>), RegistrationError> {
	let transport = |e: ReqwestError| RegistrationError::new(stage, None, e.to_string());
	let response = request
		.header(ACCEPT, "application/json")
		.send()
		.await
		.map_err(transport)?;
	let status = response.status().as_u16();
	let body = response.bytes().await.map_err(transport)?.to_vec();

	if !(200..300).contains(&status) {
		let detail = String::from_utf8_lossy(&body);
		let detail = if detail.trim().is_empty() { "empty response body".into() } else { detail };

		return Err(RegistrationError::new(stage, Some(status), detail));
	}

	Ok((status, body))
}
