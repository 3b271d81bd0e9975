// self
use crate::{flows::Step, obs::Outcome};

/// Records a step outcome via the global metrics recorder (when enabled).
pub fn record_step_outcome(step: Step, outcome: Outcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"guild_gate_step_total",
			"step" => step.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (step, outcome);
	}
}
