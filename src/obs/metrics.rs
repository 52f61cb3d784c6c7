// self
use crate::{
	_prelude::*,
	obs::{AuthFlow, FlowOutcome},
};

/// Records a token flow outcome via the global metrics recorder (when enabled).
pub fn record_auth_outcome(flow: AuthFlow, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"jamfpro_transport_auth_total",
			"flow" => flow.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (flow, outcome);
	}
}

/// Records a verb call outcome via the global metrics recorder (when enabled).
pub fn record_request_outcome(method: &Method, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"jamfpro_transport_request_total",
			"method" => method.as_str().to_owned(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (method, outcome);
	}
}
