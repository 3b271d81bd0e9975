//! Optional observability helpers for the verification pipeline.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `guild_gate.step` with the `step` and
//!   `policy` fields, and log events for swallowed or fatal failures.
//! - Enable `metrics` to increment the `guild_gate_step_total` counter for every
//!   attempt/success/failure/skip, labeled by `step` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Emits a `tracing` event at the given level when the `tracing` feature is enabled.
macro_rules! obs_event {
	($level:ident, $($arg:tt)+) => {{
		#[cfg(feature = "tracing")]
		{
			::tracing::$level!($($arg)+);
		}
	}};
}
pub(crate) use obs_event;

/// Outcome labels recorded for each step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Entry to a step.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure, fatal or swallowed depending on the step policy.
	Failure,
	/// The step had nothing to do.
	Skipped,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
			Outcome::Skipped => "skipped",
		}
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Installs a global `fmt` subscriber filtered by `filter` (an `EnvFilter` directive such
/// as `info` or `guild_gate=debug`).
///
/// `RUST_LOG` takes precedence over `filter` when set. Returns `false` when a global
/// subscriber was already installed.
#[cfg(feature = "tracing")]
pub fn init_subscriber(filter: &str) -> bool {
	// crates.io
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(filter))
		.unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).try_init().is_ok()
}
