//! Where capability schema documents come from.

// crates.io
use reqwest::header::ACCEPT;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	capability::CapabilityCatalog,
	config::SchemaConfig,
	deadline::{self, DeadlineError},
	error::{TransientError, TransportError},
};

/// Boxed future returned by [`SchemaSource::fetch`].
pub type SchemaFuture<'a> = Pin<Box<dyn Future<Output = Result<CapabilityCatalog>> + 'a + Send>>;

/// Producer of capability catalogs.
pub trait SchemaSource
where
	Self: Send + Sync,
{
	/// Fetches and parses the current schema document.
	fn fetch(&self) -> SchemaFuture<'_>;
}

/// Fetches the schema document over HTTP.
#[derive(Clone, Debug)]
pub struct HttpSchemaSource {
	http_client: ReqwestClient,
	url: Url,
	bearer: Option<TokenSecret>,
	timeout: StdDuration,
}
impl HttpSchemaSource {
	/// Creates a source for the document described by `config`.
	pub fn new(http_client: ReqwestClient, config: &SchemaConfig) -> Self {
		Self {
			http_client,
			url: config.url.clone(),
			bearer: config.bearer.clone(),
			timeout: config.timeout,
		}
	}
}
impl SchemaSource for HttpSchemaSource {
	fn fetch(&self) -> SchemaFuture<'_> {
		let mut request =
			self.http_client.get(self.url.clone()).header(ACCEPT, "application/json");

		if let Some(bearer) = &self.bearer {
			request = request.bearer_auth(bearer.expose());
		}

		let timeout = self.timeout;

		Box::pin(async move {
			let call = async move {
				let response = request.send().await.map_err(TransportError::from)?;
				let status = response.status();

				if !status.is_success() {
					return Err(TransientError::SchemaSource { status: status.as_u16() }.into());
				}

				let body = response.bytes().await.map_err(TransportError::from)?;

				CapabilityCatalog::from_slice(&body)
			};

			match deadline::settle_within(timeout, call).await {
				Ok(result) => result,
				Err(DeadlineError::Elapsed { after }) =>
					Err(TransientError::Timeout { operation: "schema fetch", after }.into()),
				Err(DeadlineError::Abandoned) =>
					Err(TransientError::Interrupted { operation: "schema fetch" }.into()),
			}
		})
	}
}
