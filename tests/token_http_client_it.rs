// std
use std::{
	collections::VecDeque,
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	future::Future,
	pin::Pin,
	sync::Arc,
};
// crates.io
use action_gateway::{
	auth::TokenSecret,
	config::ClientCredentialConfig,
	credentials::ClientCredentialCache,
	error::{ConfigError, Error, TransientError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	oauth::{
		TransportErrorMapper,
		oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse, http},
	},
	url::Url,
};
use parking_lot::Mutex;
use time::Duration;

#[derive(Debug)]
struct EndpointThrottled;
impl Display for EndpointThrottled {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Token endpoint throttled the exchange.")
	}
}
impl StdError for EndpointThrottled {}

enum Reply {
	Issue { access_token: &'static str, expires_in: u64 },
	Throttle { retry_after: Duration },
}

/// In-process token endpoint answering exchanges from a script.
#[derive(Clone, Default)]
struct ScriptedEndpoint {
	replies: Arc<Mutex<VecDeque<Reply>>>,
	seen: Arc<Mutex<Vec<(String, String)>>>,
}
impl ScriptedEndpoint {
	fn scripted(replies: impl IntoIterator<Item = Reply>) -> Self {
		let endpoint = Self::default();

		endpoint.replies.lock().extend(replies);

		endpoint
	}

	/// Path and form body of every exchange received so far.
	fn seen(&self) -> Vec<(String, String)> {
		self.seen.lock().clone()
	}
}
impl TokenHttpClient for ScriptedEndpoint {
	type Handle = ScriptedExchange;
	type TransportError = EndpointThrottled;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ScriptedExchange { endpoint: self.clone(), slot }
	}
}

struct ScriptedExchange {
	endpoint: ScriptedEndpoint,
	slot: ResponseMetadataSlot,
}
impl<'a> AsyncHttpClient<'a> for ScriptedExchange {
	type Error = HttpClientError<EndpointThrottled>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send + Sync>>;

	fn call(&'a self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			assert!(self.slot.take().is_none(), "Metadata slot must start empty.");

			self.endpoint.seen.lock().push((
				request.uri().path().to_owned(),
				String::from_utf8_lossy(request.body()).into_owned(),
			));

			let reply = self.endpoint.replies.lock().pop_front().expect("Script ran out of replies.");

			match reply {
				Reply::Issue { access_token, expires_in } => {
					self.slot.store(ResponseMetadata { status: Some(200), retry_after: None });

					let body = serde_json::json!({
						"access_token": access_token,
						"token_type": "bearer",
						"expires_in": expires_in,
					});

					Ok(http::Response::builder()
						.status(200)
						.header("content-type", "application/json")
						.body(body.to_string().into_bytes())
						.expect("Scripted response should build."))
				},
				Reply::Throttle { retry_after } => {
					self.slot.store(ResponseMetadata { status: Some(429), retry_after: Some(retry_after) });

					Err(HttpClientError::Reqwest(Box::new(EndpointThrottled)))
				},
			}
		})
	}
}

/// Maps transport failures while keeping the metadata each one carried.
#[derive(Clone, Default)]
struct AuditingMapper {
	audited: Arc<Mutex<Vec<Option<ResponseMetadata>>>>,
}
impl TransportErrorMapper<EndpointThrottled> for AuditingMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<EndpointThrottled>,
	) -> Error {
		self.audited.lock().push(meta.cloned());

		let status = meta.and_then(|value| value.status);
		let retry_after = meta.and_then(|value| value.retry_after);

		match err {
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			other => TransientError::TokenEndpoint { message: other.to_string(), status, retry_after }
				.into(),
		}
	}
}

fn cache(
	endpoint: &ScriptedEndpoint,
	mapper: &AuditingMapper,
) -> ClientCredentialCache<ScriptedEndpoint, AuditingMapper> {
	let config = ClientCredentialConfig {
		client_id: Some("gateway".into()),
		client_secret: Some(TokenSecret::new("gateway-secret")),
		scope: Some("items:read".into()),
		audience: Some("inventory-api".into()),
		..Default::default()
	};

	ClientCredentialCache::with_http_client(config, Arc::new(endpoint.clone()), Arc::new(mapper.clone()))
}

fn tenant() -> Url {
	Url::parse("https://issuer.example.com/tenant").expect("Fixture URL should parse.")
}

#[tokio::test]
async fn exchange_posts_client_credentials_in_the_form_body() {
	let endpoint =
		ScriptedEndpoint::scripted([Reply::Issue { access_token: "svc-1", expires_in: 3_600 }]);
	let mapper = AuditingMapper::default();
	let cache = cache(&endpoint, &mapper);

	for _ in 0..2 {
		let token = cache.access_token(&tenant()).await.expect("Exchange should succeed.");

		assert_eq!(token.expose(), "svc-1");
	}

	let seen = endpoint.seen();

	assert_eq!(seen.len(), 1, "The second call must be served from cache.");

	let (path, form) = &seen[0];

	assert_eq!(path, "/tenant/oauth/token");

	for field in [
		"grant_type=client_credentials",
		"client_id=gateway",
		"client_secret=gateway-secret",
		"scope=items%3Aread",
		"audience=inventory-api",
	] {
		assert!(form.contains(field), "Form body {form:?} should contain {field}.");
	}

	assert!(mapper.audited.lock().is_empty());
}

#[tokio::test]
async fn throttled_exchanges_surface_retry_hints_and_are_not_cached() {
	let endpoint = ScriptedEndpoint::scripted([
		Reply::Throttle { retry_after: Duration::seconds(30) },
		Reply::Throttle { retry_after: Duration::seconds(5) },
		Reply::Issue { access_token: "svc-2", expires_in: 3_600 },
	]);
	let mapper = AuditingMapper::default();
	let cache = cache(&endpoint, &mapper);

	for expected in [30, 5] {
		let err = cache.access_token(&tenant()).await.expect_err("Exchange should be throttled.");

		match err {
			Error::Transient(TransientError::TokenEndpoint { status, retry_after, .. }) => {
				assert_eq!(status, Some(429));
				assert_eq!(retry_after, Some(Duration::seconds(expected)));
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	assert!(cache.cached().is_none());

	let token = cache.access_token(&tenant()).await.expect("Third exchange should succeed.");

	assert_eq!(token.expose(), "svc-2");
	assert_eq!(endpoint.seen().len(), 3);
	assert_eq!(mapper.audited.lock().len(), 2);
}
