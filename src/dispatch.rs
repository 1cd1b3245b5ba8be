//! Action dispatch against the downstream API.
//!
//! The caller's own bearer token is forwarded; the gateway never substitutes its service
//! credential for a caller. Non-success responses propagate with their status and body.

pub mod request;

pub use request::*;

// crates.io
use reqwest::header::{ACCEPT, WWW_AUTHENTICATE};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	capability::{CapabilityCache, HttpMethod},
	config::{self, ApiConfig},
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Successful action invocation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActionOutcome {
	/// Invoked action identifier.
	pub action: String,
	/// HTTP method used.
	pub method: HttpMethod,
	/// Path and query sent downstream.
	pub path: String,
	/// Response body, parsed as JSON when possible.
	pub data: JsonValue,
}

/// Resolves actions through the capability catalog and calls the downstream API.
#[derive(Clone, Debug)]
pub struct Dispatcher {
	capabilities: Arc<CapabilityCache>,
	http_client: ReqwestClient,
	api_base_url: Url,
}
impl Dispatcher {
	/// Creates a dispatcher targeting `config.base_url`.
	pub fn new(
		capabilities: Arc<CapabilityCache>,
		http_client: ReqwestClient,
		config: &ApiConfig,
	) -> Self {
		Self { capabilities, http_client, api_base_url: config.base_url.clone() }
	}

	/// Invokes `action_id` with `args` on behalf of the holder of `caller`.
	pub async fn dispatch(
		&self,
		action_id: &str,
		args: &JsonMap<String, JsonValue>,
		caller: &TokenSecret,
	) -> Result<ActionOutcome> {
		let span = OpSpan::new(OpKind::Dispatch, "dispatch");

		span.instrument(async move {
			let snapshot = self.capabilities.fresh_capabilities().await?;
			let Some(action) = snapshot.catalog.find(action_id) else {
				tracing::info!(action = action_id, "Rejected unknown action.");

				return Err(Error::UnknownAction {
					action: action_id.to_owned(),
					available_actions: snapshot.catalog.action_ids(),
				});
			};
			let resolved = request::resolve(action, args);

			obs::record_op_outcome(OpKind::Dispatch, OpOutcome::Attempt);

			let result = self.send(action_id, &resolved, caller).await;

			match &result {
				Ok(_) => obs::record_op_outcome(OpKind::Dispatch, OpOutcome::Success),
				Err(e) => {
					tracing::warn!(action = action_id, error = %e, "Downstream call failed.");
					obs::record_op_outcome(OpKind::Dispatch, OpOutcome::Failure);
				},
			}

			result
		})
		.await
	}

	async fn send(
		&self,
		action_id: &str,
		resolved: &ResolvedRequest,
		caller: &TokenSecret,
	) -> Result<ActionOutcome> {
		let path = resolved.path_and_query();
		let url = config::join_url("api.base_url", &self.api_base_url, &path)?;
		let response = self
			.http_client
			.request(resolved.method.into(), url)
			.bearer_auth(caller.expose())
			.header(ACCEPT, "application/json")
			.send()
			.await?;
		let status = response.status();
		let challenge = response
			.headers()
			.get(WWW_AUTHENTICATE)
			.and_then(|value| value.to_str().ok())
			.map(str::to_owned);
		let body = response.bytes().await?;
		let data = parse_body(&body);

		if !status.is_success() {
			return Err(Error::Downstream { status: status.as_u16(), body: data, challenge });
		}

		tracing::debug!(action = action_id, status = status.as_u16(), "Downstream call succeeded.");

		Ok(ActionOutcome { action: action_id.to_owned(), method: resolved.method, path, data })
	}
}

/// JSON when the body parses, the raw text otherwise, `null` when empty.
fn parse_body(body: &[u8]) -> JsonValue {
	if body.iter().all(u8::is_ascii_whitespace) {
		return JsonValue::Null;
	}

	serde_json::from_slice(body)
		.unwrap_or_else(|_| JsonValue::String(String::from_utf8_lossy(body).into_owned()))
}
