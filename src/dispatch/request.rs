//! Pure mapping from an action descriptor and caller arguments to a concrete request line.

// crates.io
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	capability::{ActionDescriptor, HttpMethod, ParameterLocation},
};

/// Method, path, and query derived from an action invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedRequest {
	/// HTTP method.
	pub method: HttpMethod,
	/// Path with placeholders substituted.
	pub path: String,
	/// Encoded query string without the leading `?`; `None` when empty.
	pub query: Option<String>,
}
impl ResolvedRequest {
	/// Path followed by `?query` when a query exists.
	pub fn path_and_query(&self) -> String {
		match &self.query {
			Some(query) => format!("{}?{query}", self.path),
			None => self.path.clone(),
		}
	}
}

/// Resolves `action` against `args`.
///
/// - Path parameters replace every `{name}` placeholder with the percent-encoded value.
///   Placeholders without an argument stay untouched.
/// - Query parameters with an array value repeat as `name[]=value`; scalars appear once.
/// - `null` counts as absent. Arguments not declared by the action are ignored.
pub fn resolve(action: &ActionDescriptor, args: &JsonMap<String, JsonValue>) -> ResolvedRequest {
	let mut path = action.path.clone();
	let mut pairs = Vec::new();

	for parameter in &action.parameters {
		let Some(value) = args.get(&parameter.name).filter(|value| !value.is_null()) else {
			continue;
		};

		match parameter.location {
			ParameterLocation::Path => {
				let placeholder = format!("{{{}}}", parameter.name);

				path = path.replace(&placeholder, &encode(&scalar(value)));
			},
			ParameterLocation::Query => match value {
				JsonValue::Array(items) =>
					for item in items.iter().filter(|item| !item.is_null()) {
						pairs.push(format!("{}[]={}", encode(&parameter.name), encode(&scalar(item))));
					},
				_ => pairs.push(format!("{}={}", encode(&parameter.name), encode(&scalar(value)))),
			},
			ParameterLocation::Unsupported => {},
		}
	}

	let query = (!pairs.is_empty()).then(|| pairs.join("&"));

	ResolvedRequest { method: action.method, path, query }
}

/// Text form of an argument: strings verbatim, everything else as JSON.
fn scalar(value: &JsonValue) -> String {
	match value {
		JsonValue::String(s) => s.clone(),
		other => other.to_string(),
	}
}

/// Percent-encodes a component, spelling spaces as `%20`.
fn encode(raw: &str) -> String {
	form_urlencoded::byte_serialize(raw.as_bytes()).collect::<String>().replace('+', "%20")
}
