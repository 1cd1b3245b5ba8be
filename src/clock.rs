//! Injectable wall clock so freshness windows can be exercised without sleeping.

// self
use crate::_prelude::*;

/// Shared handle to a [`Clock`] implementation.
pub type SharedClock = Arc<dyn Clock>;

/// Source of the current UTC instant.
pub trait Clock: Send + Sync + Debug {
	/// Returns the current instant.
	fn now(&self) -> OffsetDateTime;
}

/// [`Clock`] backed by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl SystemClock {
	/// Returns the system clock as a [`SharedClock`].
	pub fn shared() -> SharedClock {
		Arc::new(Self)
	}
}
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Hand-driven [`Clock`] for tests; clones share the same instant.
#[derive(Clone, Debug)]
pub struct ManualClock(Arc<Mutex<OffsetDateTime>>);
impl ManualClock {
	/// Starts the clock at `start`.
	pub fn new(start: OffsetDateTime) -> Self {
		Self(Arc::new(Mutex::new(start)))
	}

	/// Starts the clock at the current system time.
	pub fn starting_now() -> Self {
		Self::new(OffsetDateTime::now_utc())
	}

	/// Moves the clock forward.
	pub fn advance(&self, by: StdDuration) {
		let mut now = self.0.lock();

		*now += by;
	}

	/// Pins the clock to `instant`.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.0.lock() = instant;
	}

	/// Returns this clock as a [`SharedClock`].
	pub fn shared(&self) -> SharedClock {
		Arc::new(self.clone())
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}
