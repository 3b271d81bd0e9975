// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for verification attempts.
#[derive(Debug, Default)]
pub struct VerifyMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	best_effort_failure: AtomicU64,
}
impl VerifyMetrics {
	/// Returns the total number of verification attempts.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of verifications that reached the success page.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of verifications aborted by a fatal step.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of swallowed role or notification failures.
	pub fn best_effort_failures(&self) -> u64 {
		self.best_effort_failure.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_best_effort_failure(&self) {
		self.best_effort_failure.fetch_add(1, Ordering::Relaxed);
	}
}
