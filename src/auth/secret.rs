//! Bearer credentials that stay out of logs.

// self
use crate::_prelude::*;

/// Redacted token wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Extracts the credential from an `Authorization: Bearer <token>` header value.
	///
	/// The scheme is matched case-insensitively; any other scheme or an empty credential
	/// yields `None`.
	pub fn from_authorization(header: &str) -> Option<Self> {
		let (scheme, credential) = header.trim().split_once(char::is_whitespace)?;
		let credential = credential.trim();

		if !scheme.eq_ignore_ascii_case("bearer") || credential.is_empty() {
			return None;
		}

		Some(Self::new(credential))
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
