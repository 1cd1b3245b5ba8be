//! Token-gated action gateway: validates bearer tokens against a rotating JWKS, keeps a
//! freshness-bounded capability catalog of a downstream API, and dispatches schema-driven
//! actions to it with the caller's own credential.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod capability;
pub mod cli;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod deadline;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod registration;
pub mod server;

#[cfg(test)]
mod _preludet {
	//! Fixtures shared by unit tests: the RSA test key, its published JWKS, and a token minter.

	pub use crate::_prelude::*;

	// crates.io
	use jsonwebtoken::{Algorithm, EncodingKey, Header};

	/// Key identifier published in the fixture JWKS.
	pub const TEST_KID: &str = "test-key-1";
	/// Issuer every fixture token is minted for.
	pub const TEST_ISSUER: &str = "https://issuer.example.com/";
	/// PKCS#1 private key matching the fixture JWKS.
	pub const SIGNING_KEY_PEM: &str = include_str!("../tests/fixtures/signing_key.pem");
	/// Published key set containing [`TEST_KID`].
	pub const JWKS_JSON: &str = include_str!("../tests/fixtures/jwks.json");

	/// Signs `claims` with the fixture key under the provided header.
	pub fn mint_with_header(header: &Header, claims: &JsonValue) -> String {
		let key = EncodingKey::from_rsa_pem(SIGNING_KEY_PEM.as_bytes())
			.expect("Fixture signing key should parse.");

		jsonwebtoken::encode(header, claims, &key).expect("Fixture token should encode.")
	}

	/// Signs `claims` as an RS256 token carrying [`TEST_KID`].
	pub fn mint(claims: &JsonValue) -> String {
		let mut header = Header::new(Algorithm::RS256);

		header.kid = Some(TEST_KID.into());

		mint_with_header(&header, claims)
	}

	/// Seconds since the Unix epoch, offset by `delta`.
	pub fn unix_now_plus(delta: i64) -> i64 {
		OffsetDateTime::now_utc().unix_timestamp() + delta
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::{Map as JsonMap, Value as JsonValue};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, http_body_util as _, httpmock as _, tower as _};
