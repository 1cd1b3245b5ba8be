//! Observability helpers for gateway operations.
//!
//! Every remote-facing operation opens a span named `action_gateway.op` carrying the `op` and
//! `stage` fields. Enable the `metrics` feature to increment the `action_gateway_op_total`
//! counter for every attempt/success/failure, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// crates.io
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
// self
use crate::_prelude::*;

/// Gateway operations observed by spans and counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Signing-key lookup through the JWKS cache.
	KeyResolution,
	/// Bearer token validation.
	TokenValidation,
	/// Service credential acquisition.
	ClientCredentials,
	/// Capability catalog refresh.
	CapabilityRefresh,
	/// Downstream action dispatch.
	Dispatch,
	/// Dynamic client registration lifecycle call.
	Registration,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::KeyResolution => "key_resolution",
			OpKind::TokenValidation => "token_validation",
			OpKind::ClientCredentials => "client_credentials",
			OpKind::CapabilityRefresh => "capability_refresh",
			OpKind::Dispatch => "dispatch",
			OpKind::Registration => "registration",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a gateway operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Installs the global `fmt` subscriber.
///
/// `RUST_LOG` wins over `default_directive` when set. Installing twice is a no-op so tests and
/// embedders can call this freely.
pub fn install_subscriber(default_directive: &str) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
	let _ = tracing_subscriber::registry().with(filter).with(fmt::layer().with_target(true)).try_init();
}
