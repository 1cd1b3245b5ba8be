//! Scope sets granted to a token or requested from a token endpoint.

// std
use std::collections::BTreeSet;
// crates.io
use serde::{Serializer, ser::SerializeSeq};
// self
use crate::_prelude::*;

/// Deduplicated, sorted set of scopes.
///
/// Comparison is case-sensitive: `Read` and `read` are distinct scopes.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeSet(Arc<[String]>);
impl ScopeSet {
	/// Builds a set from loosely formatted values as found in token claims.
	///
	/// Each value is split on whitespace and empty fragments are discarded, so both
	/// `"a b"` and `["a", "b", ""]` yield `{a, b}`.
	pub fn lenient<I, S>(values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let set = values
			.into_iter()
			.flat_map(|value| {
				value.as_ref().split_whitespace().map(str::to_owned).collect::<Vec<_>>()
			})
			.collect::<BTreeSet<_>>();

		Self::from_sorted(set)
	}

	fn from_sorted(set: BTreeSet<String>) -> Self {
		Self(Arc::from(set.into_iter().collect::<Vec<_>>()))
	}

	/// Union of both sets.
	pub fn union(&self, other: &Self) -> Self {
		Self::from_sorted(self.iter().chain(other.iter()).map(str::to_owned).collect())
	}

	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true if no scopes are defined.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns true if the set contains `scope` exactly.
	pub fn contains(&self, scope: &str) -> bool {
		self.0.binary_search_by(|candidate| candidate.as_str().cmp(scope)).is_ok()
	}

	/// Iterator over scopes in sorted order.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	/// Space-delimited form, as sent in a `scope` form field.
	pub fn normalized(&self) -> String {
		self.0.join(" ")
	}

	/// Underlying sorted slice.
	pub fn as_slice(&self) -> &[String] {
		&self.0
	}
}
impl Debug for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ScopeSet").field(&self.0).finish()
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.normalized())
	}
}
impl Serialize for ScopeSet {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut seq = serializer.serialize_seq(Some(self.0.len()))?;

		for scope in self.0.iter() {
			seq.serialize_element(scope)?;
		}

		seq.end()
	}
}
