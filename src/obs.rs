//! Observability helpers for token flows and verb calls.
//!
//! - Token flows run inside `jamfpro_transport.auth` spans carrying the `flow` and `stage`
//!   fields; verb calls run inside `jamfpro_transport.request` spans carrying `method` and
//!   `endpoint`.
//! - Enable `metrics` to increment `jamfpro_transport_auth_total` (labeled by `flow` +
//!   `outcome`) and `jamfpro_transport_request_total` (labeled by `method` + `outcome`).

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

// self
use crate::_prelude::*;

/// Token lifecycle operations observed by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthFlow {
	/// OAuth 2.0 client-credentials fetch.
	OAuth2,
	/// Basic token exchange fetch.
	Basic,
	/// Keep-alive extension.
	KeepAlive,
	/// Server-side invalidation.
	Invalidate,
}
impl AuthFlow {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuthFlow::OAuth2 => "oauth2",
			AuthFlow::Basic => "basic",
			AuthFlow::KeepAlive => "keep_alive",
			AuthFlow::Invalidate => "invalidate",
		}
	}
}
impl Display for AuthFlow {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to an operation.
	Attempt,
	/// An attempt is about to be repeated after a retryable outcome.
	Retry,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Retry => "retry",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
