//! Typed step runner with a per-step failure policy and an outcome report.
//!
//! Fatal steps propagate their error and stop the pipeline; best-effort steps swallow
//! failures after logging them. Either way the outcome lands in the [`StepReport`].

// self
use crate::{
	_prelude::*,
	error::ErrorCategory,
	obs::{self, Outcome, StepSpan, obs_event},
};

/// Steps of a verification, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Step {
	/// Authorization code exchange at the token endpoint.
	TokenExchange,
	/// Current-user lookup with the access token.
	IdentityFetch,
	/// Guild membership grant.
	MembershipGrant,
	/// Durable upsert of the verification record.
	RecordUpsert,
	/// Grant of the configured verified role.
	RoleAssignment,
	/// Direct-message confirmation.
	Notification,
}
impl Step {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Step::TokenExchange => "token_exchange",
			Step::IdentityFetch => "identity_fetch",
			Step::MembershipGrant => "membership_grant",
			Step::RecordUpsert => "record_upsert",
			Step::RoleAssignment => "role_assignment",
			Step::Notification => "notification",
		}
	}

	/// Failure policy applied to the step.
	pub const fn policy(self) -> StepPolicy {
		match self {
			Step::TokenExchange | Step::IdentityFetch | Step::MembershipGrant | Step::RecordUpsert =>
				StepPolicy::Fatal,
			Step::RoleAssignment | Step::Notification => StepPolicy::BestEffort,
		}
	}
}
impl Display for Step {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// How a step failure affects the verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StepPolicy {
	/// Failure aborts the verification.
	Fatal,
	/// Failure is logged and recorded; the verification continues.
	BestEffort,
}
impl StepPolicy {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StepPolicy::Fatal => "fatal",
			StepPolicy::BestEffort => "best_effort",
		}
	}
}

/// Recorded result of one step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepStatus {
	/// The step completed.
	Succeeded,
	/// The step had nothing to do (for example no role configured).
	Skipped,
	/// The step failed.
	Failed {
		/// Error class of the failure.
		category: ErrorCategory,
		/// Rendered error message, for diagnostics only.
		message: String,
	},
}

/// One report entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepEntry {
	/// Step the entry belongs to.
	pub step: Step,
	/// What happened.
	pub status: StepStatus,
}

/// Ordered outcome of every step that ran.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
	entries: Vec<StepEntry>,
}
impl StepReport {
	/// Entries in execution order.
	pub fn entries(&self) -> &[StepEntry] {
		&self.entries
	}

	/// Latest status recorded for `step`, if the step ran.
	pub fn status(&self, step: Step) -> Option<&StepStatus> {
		self.entries.iter().rev().find(|entry| entry.step == step).map(|entry| &entry.status)
	}

	/// Returns `true` when `step` ran and failed.
	pub fn failed(&self, step: Step) -> bool {
		matches!(self.status(step), Some(StepStatus::Failed { .. }))
	}

	/// Runs a fatal step, recording its outcome and propagating its error.
	pub async fn run_fatal<T, Fut>(&mut self, step: Step, fut: Fut) -> Result<T>
	where
		Fut: Future<Output = Result<T>>,
	{
		match self.run(step, fut).await {
			Ok(value) => Ok(value),
			Err(err) => {
				obs_event!(
					error,
					step = step.as_str(),
					category = err.category().as_str(),
					error = %err,
					"Verification step failed."
				);

				Err(err)
			},
		}
	}

	/// Runs a best-effort step; failures are logged, recorded, and turned into `None`.
	pub async fn run_best_effort<T, Fut>(&mut self, step: Step, fut: Fut) -> Option<T>
	where
		Fut: Future<Output = Result<T>>,
	{
		match self.run(step, fut).await {
			Ok(value) => Some(value),
			Err(err) => {
				obs_event!(
					warn,
					step = step.as_str(),
					error = %err,
					"Best-effort verification step failed; continuing."
				);

				#[cfg(not(feature = "tracing"))]
				let _ = err;

				None
			},
		}
	}

	/// Overrides the latest status of `step` with [`StepStatus::Skipped`].
	pub fn mark_skipped(&mut self, step: Step) {
		match self.entries.iter_mut().rev().find(|entry| entry.step == step) {
			Some(entry) => entry.status = StepStatus::Skipped,
			None => self.entries.push(StepEntry { step, status: StepStatus::Skipped }),
		}

		obs::record_step_outcome(step, Outcome::Skipped);
	}

	async fn run<T, Fut>(&mut self, step: Step, fut: Fut) -> Result<T>
	where
		Fut: Future<Output = Result<T>>,
	{
		let span = StepSpan::new(step);

		obs::record_step_outcome(step, Outcome::Attempt);

		let result = span.instrument(fut).await;
		let status = match &result {
			Ok(_) => {
				obs::record_step_outcome(step, Outcome::Success);

				StepStatus::Succeeded
			},
			Err(err) => {
				obs::record_step_outcome(step, Outcome::Failure);

				StepStatus::Failed { category: err.category(), message: err.to_string() }
			},
		};

		self.entries.push(StepEntry { step, status });

		result
	}
}
