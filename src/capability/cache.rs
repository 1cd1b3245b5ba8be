//! Freshness-bounded capability catalog cache.
//!
//! The current catalog lives in an atomically swapped [`CatalogSnapshot`]; readers never observe
//! a partially applied refresh. Within the TTL every read is served locally. Past the TTL the
//! next read refreshes, and when the refresh fails the previous snapshot keeps being served. A
//! fetch error reaches callers only when no snapshot exists. Concurrent stale reads share one
//! refresh.

// self
use crate::{
	_prelude::*,
	capability::{CapabilityCatalog, SchemaSource},
	clock::{SharedClock, SystemClock},
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Catalog plus the instant it was fetched.
#[derive(Clone, Debug)]
pub struct CatalogSnapshot {
	/// Parsed catalog.
	pub catalog: CapabilityCatalog,
	/// Fetch instant.
	pub fetched_at: OffsetDateTime,
}

/// Freshness of the cached catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
	/// Age of the cached snapshot; `None` when nothing is cached.
	pub age: Option<Duration>,
	/// Whether the snapshot is still within its TTL.
	pub is_valid: bool,
}

/// Summary of the cached API surface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApiMetadata {
	/// API title, when the schema document names one.
	pub title: Option<String>,
	/// API version, when the schema document names one.
	pub version: Option<String>,
	/// Number of capability groups.
	pub group_count: usize,
	/// Number of actions.
	pub action_count: usize,
	/// Action identifiers in catalog order.
	pub action_ids: Vec<String>,
	/// Fetch instant of the summarized snapshot.
	#[serde(with = "time::serde::rfc3339")]
	pub fetched_at: OffsetDateTime,
}

/// TTL cache in front of a [`SchemaSource`].
pub struct CapabilityCache {
	source: Arc<dyn SchemaSource>,
	ttl: StdDuration,
	clock: SharedClock,
	snapshot: RwLock<Option<Arc<CatalogSnapshot>>>,
	refresh_guard: AsyncMutex<()>,
}
impl CapabilityCache {
	/// Creates an empty cache that keeps catalogs from `source` fresh for `ttl`.
	pub fn new(source: Arc<dyn SchemaSource>, ttl: StdDuration) -> Self {
		Self {
			source,
			ttl,
			clock: SystemClock::shared(),
			snapshot: RwLock::new(None),
			refresh_guard: AsyncMutex::new(()),
		}
	}

	/// Replaces the clock used for freshness decisions.
	pub fn with_clock(mut self, clock: SharedClock) -> Self {
		self.clock = clock;

		self
	}

	/// Returns a catalog no older than the TTL, or the last good one when a refresh fails.
	pub async fn fresh_capabilities(&self) -> Result<Arc<CatalogSnapshot>> {
		if let Some(snapshot) = self.fresh_snapshot() {
			return Ok(snapshot);
		}

		let span = OpSpan::new(OpKind::CapabilityRefresh, "fresh_capabilities");

		span.instrument(async move {
			let _singleflight = self.refresh_guard.lock().await;

			if let Some(snapshot) = self.fresh_snapshot() {
				return Ok(snapshot);
			}

			obs::record_op_outcome(OpKind::CapabilityRefresh, OpOutcome::Attempt);

			match self.source.fetch().await {
				Ok(catalog) => {
					let snapshot = Arc::new(CatalogSnapshot { catalog, fetched_at: self.clock.now() });

					*self.snapshot.write() = Some(snapshot.clone());

					tracing::info!(
						actions = snapshot.catalog.action_count(),
						"Capability catalog refreshed."
					);
					obs::record_op_outcome(OpKind::CapabilityRefresh, OpOutcome::Success);

					Ok(snapshot)
				},
				Err(e) => {
					obs::record_op_outcome(OpKind::CapabilityRefresh, OpOutcome::Failure);

					match self.snapshot.read().clone() {
						Some(stale) => {
							tracing::warn!(error = %e, "Catalog refresh failed; serving the previous snapshot.");

							Ok(stale)
						},
						None => {
							tracing::error!(error = %e, "Catalog refresh failed with nothing cached.");

							Err(e)
						},
					}
				},
			}
		})
		.await
	}

	/// Drops the cached snapshot so the next read fetches unconditionally.
	pub fn clear_schema_cache(&self) {
		*self.snapshot.write() = None;
	}

	/// Age and validity of the cached snapshot.
	pub fn cache_status(&self) -> CacheStatus {
		let now = self.clock.now();

		match self.snapshot.read().as_ref() {
			Some(snapshot) => {
				let age = now - snapshot.fetched_at;

				CacheStatus { age: Some(age), is_valid: age < self.ttl }
			},
			None => CacheStatus { age: None, is_valid: false },
		}
	}

	/// Summary of the current API surface, refreshing first when stale.
	pub async fn api_metadata(&self) -> Result<ApiMetadata> {
		let snapshot = self.fresh_capabilities().await?;
		let catalog = &snapshot.catalog;

		Ok(ApiMetadata {
			title: catalog.info().title.clone(),
			version: catalog.info().version.clone(),
			group_count: catalog.groups().len(),
			action_count: catalog.action_count(),
			action_ids: catalog.action_ids(),
			fetched_at: snapshot.fetched_at,
		})
	}

	fn fresh_snapshot(&self) -> Option<Arc<CatalogSnapshot>> {
		let now = self.clock.now();

		self.snapshot.read().as_ref().filter(|snapshot| now - snapshot.fetched_at < self.ttl).cloned()
	}
}
impl Debug for CapabilityCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CapabilityCache")
			.field("ttl", &self.ttl)
			.field("status", &self.cache_status())
			.finish_non_exhaustive()
	}
}
