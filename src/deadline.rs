//! Bounded waits for remote calls.
//!
//! [`settle_within`] races an operation against a timer. The operation runs on its own task and
//! keeps running when the timer wins, so side effects it performs (such as populating a cache)
//! still land. Whichever side settles first owns the outcome; the other side's result is dropped.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// crates.io
use tokio::sync::oneshot;
// self
use crate::_prelude::*;

/// Outcome of a wait that did not produce the operation's output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum DeadlineError {
	/// Timer fired before the operation settled.
	#[error("Operation did not settle within {after:?}.")]
	Elapsed {
		/// Deadline that elapsed.
		after: StdDuration,
	},
	/// Operation task ended without producing an output (panic or runtime shutdown).
	#[error("Operation was abandoned before it settled.")]
	Abandoned,
}

/// One-shot settle flag; only the first call to [`SettleGuard::settle`] wins.
#[derive(Clone, Debug, Default)]
pub struct SettleGuard(Arc<AtomicBool>);
impl SettleGuard {
	/// Claims the outcome, returning `true` only for the first caller.
	pub fn settle(&self) -> bool {
		!self.0.swap(true, Ordering::AcqRel)
	}
}

/// Runs `operation` on a detached task and waits at most `deadline` for it.
pub async fn settle_within<F>(deadline: StdDuration, operation: F) -> Result<F::Output, DeadlineError>
where
	F: 'static + Send + Future,
	F::Output: 'static + Send,
{
	let guard = SettleGuard::default();
	let worker_guard = guard.clone();
	let (tx, mut rx) = oneshot::channel();

	tokio::spawn(async move {
		let output = operation.await;

		if worker_guard.settle() {
			let _ = tx.send(output);
		}
	});

	match tokio::time::timeout(deadline, &mut rx).await {
		Ok(received) => received.map_err(|_| DeadlineError::Abandoned),
		Err(_) if guard.settle() => Err(DeadlineError::Elapsed { after: deadline }),
		// The operation claimed the outcome between the timer firing and our settle attempt.
		Err(_) => rx.await.map_err(|_| DeadlineError::Abandoned),
	}
}
