// crates.io
use tracing::{Instrument, Span, instrument::Instrumented};
// self
use crate::{_prelude::*, obs::AuthFlow};

/// A span builder used by token flows and verb calls.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	span: Span,
}
impl FlowSpan {
	/// Creates a token flow span tagged with the provided flow + stage.
	pub fn new(flow: AuthFlow, stage: &'static str) -> Self {
		Self { span: tracing::info_span!("jamfpro_transport.auth", flow = flow.as_str(), stage) }
	}

	/// Creates a verb call span tagged with the method + endpoint.
	pub fn request(method: &Method, endpoint: &str) -> Self {
		Self {
			span: tracing::info_span!(
				"jamfpro_transport.request",
				method = method.as_str(),
				endpoint
			),
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}
