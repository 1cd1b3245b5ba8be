//! Capability catalog: the schema-derived list of actions the downstream API exposes.

// std
use std::collections::HashSet;
// self
use crate::{_prelude::*, error::TransientError};

/// HTTP method an action is invoked with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum HttpMethod {
	/// `GET`
	Get,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `PATCH`
	Patch,
	/// `DELETE`
	Delete,
}
impl HttpMethod {
	/// Upper-case wire form.
	pub const fn as_str(self) -> &'static str {
		match self {
			HttpMethod::Get => "GET",
			HttpMethod::Post => "POST",
			HttpMethod::Put => "PUT",
			HttpMethod::Patch => "PATCH",
			HttpMethod::Delete => "DELETE",
		}
	}
}
impl Display for HttpMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for HttpMethod {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_uppercase().as_str() {
			"GET" => Ok(HttpMethod::Get),
			"POST" => Ok(HttpMethod::Post),
			"PUT" => Ok(HttpMethod::Put),
			"PATCH" => Ok(HttpMethod::Patch),
			"DELETE" => Ok(HttpMethod::Delete),
			_ => Err(format!("unsupported HTTP method `{s}`")),
		}
	}
}
impl TryFrom<String> for HttpMethod {
	type Error = String;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}
impl From<HttpMethod> for &'static str {
	fn from(method: HttpMethod) -> Self {
		method.as_str()
	}
}
impl From<HttpMethod> for reqwest::Method {
	fn from(method: HttpMethod) -> Self {
		match method {
			HttpMethod::Get => reqwest::Method::GET,
			HttpMethod::Post => reqwest::Method::POST,
			HttpMethod::Put => reqwest::Method::PUT,
			HttpMethod::Patch => reqwest::Method::PATCH,
			HttpMethod::Delete => reqwest::Method::DELETE,
		}
	}
}

/// Where a parameter is placed in the outbound request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
	/// Substituted into a `{name}` placeholder of the path.
	Path,
	/// Appended to the query string.
	Query,
	/// Any other location (`header`, `body`, ...); carried but never sent.
	#[serde(other)]
	Unsupported,
}

/// Declared action parameter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
	/// Argument name.
	pub name: String,
	/// Placement in the request.
	#[serde(rename = "in")]
	pub location: ParameterLocation,
	/// Whether callers are expected to supply it.
	#[serde(default)]
	pub required: bool,
	/// Free-form description.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

/// One invocable action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
	/// Unique action identifier.
	pub action_id: String,
	/// HTTP method.
	pub method: HttpMethod,
	/// Path template with `{name}` placeholders.
	pub path: String,
	/// Declared parameters.
	#[serde(default)]
	pub parameters: Vec<ParameterSpec>,
	/// Free-form description.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

/// Named group of actions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityGroup {
	/// Group name.
	pub name: String,
	/// Free-form description.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	/// Actions in declaration order.
	#[serde(default)]
	pub actions: Vec<ActionDescriptor>,
}

/// Optional descriptive header of a schema document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogInfo {
	/// API title.
	#[serde(default)]
	pub title: Option<String>,
	/// API version.
	#[serde(default)]
	pub version: Option<String>,
}

/// Accepted schema document shapes.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum CatalogDocument {
	Wrapped {
		#[serde(default)]
		info: Option<CatalogInfo>,
		capabilities: Vec<CapabilityGroup>,
	},
	Bare(Vec<CapabilityGroup>),
}

/// Validated capability catalog; action identifiers are unique across groups.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CapabilityCatalog {
	info: CatalogInfo,
	groups: Vec<CapabilityGroup>,
}
impl CapabilityCatalog {
	/// Builds a catalog, rejecting duplicate action identifiers.
	pub fn new(info: CatalogInfo, groups: Vec<CapabilityGroup>) -> Result<Self> {
		let mut seen = HashSet::new();

		for action in groups.iter().flat_map(|group| group.actions.iter()) {
			if !seen.insert(action.action_id.as_str()) {
				return Err(TransientError::InvalidCatalog {
					reason: format!("action `{}` is declared more than once", action.action_id),
				}
				.into());
			}
		}

		Ok(Self { info, groups })
	}

	/// Parses a schema document: either a bare array of groups or `{ info, capabilities }`.
	pub fn from_slice(document: &[u8]) -> Result<Self> {
		let mut deserializer = serde_json::Deserializer::from_slice(document);
		let parsed: CatalogDocument = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| TransientError::SchemaParse { source })?;

		match parsed {
			CatalogDocument::Wrapped { info, capabilities } =>
				Self::new(info.unwrap_or_default(), capabilities),
			CatalogDocument::Bare(groups) => Self::new(CatalogInfo::default(), groups),
		}
	}

	/// Descriptive header.
	pub fn info(&self) -> &CatalogInfo {
		&self.info
	}

	/// Groups in declaration order.
	pub fn groups(&self) -> &[CapabilityGroup] {
		&self.groups
	}

	/// All actions in catalog order.
	pub fn actions(&self) -> impl Iterator<Item = &ActionDescriptor> {
		self.groups.iter().flat_map(|group| group.actions.iter())
	}

	/// Looks an action up by identifier.
	pub fn find(&self, action_id: &str) -> Option<&ActionDescriptor> {
		self.actions().find(|action| action.action_id == action_id)
	}

	/// Action identifiers in catalog order.
	pub fn action_ids(&self) -> Vec<String> {
		self.actions().map(|action| action.action_id.clone()).collect()
	}

	/// Number of actions across all groups.
	pub fn action_count(&self) -> usize {
		self.actions().count()
	}
}
