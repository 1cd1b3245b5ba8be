//! Per-minute budget on outbound key-set fetches.

// self
use crate::{_prelude::*, clock::SharedClock};

const WINDOW: StdDuration = StdDuration::from_secs(60);

/// Result of consulting a [`FetchBudget`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BudgetDecision {
	/// The fetch may proceed immediately.
	Allow,
	/// The budget for the current window is spent.
	Deny(RetryDirective),
}

/// Advises callers when to retry after a [`BudgetDecision::Deny`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Instant when the next window opens.
	pub earliest_retry_at: OffsetDateTime,
	/// Time left until `earliest_retry_at`.
	pub retry_in: StdDuration,
}

/// Fixed-window counter allowing at most `per_minute` fetches in each sixty-second window.
///
/// A window opens on the first fetch after the previous one closed.
#[derive(Debug)]
pub struct FetchBudget {
	per_minute: u32,
	clock: SharedClock,
	window: Mutex<Option<Window>>,
}
impl FetchBudget {
	/// Creates a budget; `per_minute == 0` disables fetching entirely.
	pub fn new(per_minute: u32, clock: SharedClock) -> Self {
		Self { per_minute, clock, window: Mutex::new(None) }
	}

	/// Consumes one unit of budget when available.
	pub fn acquire(&self) -> BudgetDecision {
		let now = self.clock.now();
		let mut window = self.window.lock();
		if window.as_ref().is_some_and(|open| now >= open.closes_at()) {
			*window = None;
		}

		let current = window.get_or_insert_with(|| Window { opened_at: now, used: 0 });

		if current.used < self.per_minute {
			current.used += 1;

			return BudgetDecision::Allow;
		}

		let earliest_retry_at = current.closes_at();
		let retry_in = StdDuration::try_from(earliest_retry_at - now).unwrap_or_default();

		BudgetDecision::Deny(RetryDirective { earliest_retry_at, retry_in })
	}
}

#[derive(Debug)]
struct Window {
	opened_at: OffsetDateTime,
	used: u32,
}
impl Window {
	fn closes_at(&self) -> OffsetDateTime {
		self.opened_at + WINDOW
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::clock::ManualClock;

	#[test]
	fn denies_past_budget_until_the_window_rolls() {
		let clock = ManualClock::starting_now();
		let budget = FetchBudget::new(2, clock.shared());

		assert_eq!(budget.acquire(), BudgetDecision::Allow);

		clock.advance(StdDuration::from_secs(20));

		assert_eq!(budget.acquire(), BudgetDecision::Allow);

		let BudgetDecision::Deny(directive) = budget.acquire() else {
			panic!("Third fetch inside the window should be denied.");
		};

		assert_eq!(directive.retry_in, StdDuration::from_secs(40));

		clock.advance(StdDuration::from_secs(40));

		assert_eq!(budget.acquire(), BudgetDecision::Allow);
	}

	#[test]
	fn zero_budget_never_allows() {
		let budget = FetchBudget::new(0, ManualClock::starting_now().shared());

		assert!(matches!(budget.acquire(), BudgetDecision::Deny(_)));
	}
}
