//! Per-flow counters for token endpoint round trips.
//!
//! Every outcome recorded here is also forwarded to the `metrics` facade, so diagnostics read
//! the same numbers a dashboard would.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::obs::{self, AuthFlow, FlowOutcome};

/// Point-in-time counts for one token flow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlowCounts {
	/// Round trips started.
	pub attempts: u64,
	/// Round trips that completed as intended.
	pub successes: u64,
	/// Round trips that surfaced an error.
	pub failures: u64,
}

/// Token endpoint counters, split by flow.
///
/// The OAuth2 and Basic flows share the fetch counters since a manager only ever runs one
/// of them.
#[derive(Debug, Default)]
pub struct AuthMetrics {
	fetch: Counters,
	keep_alive: Counters,
	invalidate: Counters,
}
impl AuthMetrics {
	/// Returns the counts recorded for `flow`.
	pub fn counts(&self, flow: AuthFlow) -> FlowCounts {
		self.counters(flow).snapshot()
	}

	/// Returns the number of token fetches attempted (initial and refresh).
	pub fn fetches(&self) -> u64 {
		self.fetch.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of fetches that produced a token.
	pub fn successes(&self) -> u64 {
		self.fetch.successes.load(Ordering::Relaxed)
	}

	/// Returns the number of failed fetches.
	pub fn failures(&self) -> u64 {
		self.fetch.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record(&self, flow: AuthFlow, outcome: FlowOutcome) {
		self.counters(flow).bump(outcome);
		obs::record_auth_outcome(flow, outcome);
	}

	fn counters(&self, flow: AuthFlow) -> &Counters {
		match flow {
			AuthFlow::OAuth2 | AuthFlow::Basic => &self.fetch,
			AuthFlow::KeepAlive => &self.keep_alive,
			AuthFlow::Invalidate => &self.invalidate,
		}
	}
}

#[derive(Debug, Default)]
struct Counters {
	attempts: AtomicU64,
	successes: AtomicU64,
	failures: AtomicU64,
}
impl Counters {
	fn bump(&self, outcome: FlowOutcome) {
		let counter = match outcome {
			FlowOutcome::Attempt => &self.attempts,
			FlowOutcome::Success => &self.successes,
			FlowOutcome::Failure => &self.failures,
			// Token flows are never retried in place.
			FlowOutcome::Retry => return,
		};

		counter.fetch_add(1, Ordering::Relaxed);
	}

	fn snapshot(&self) -> FlowCounts {
		FlowCounts {
			attempts: self.attempts.load(Ordering::Relaxed),
			successes: self.successes.load(Ordering::Relaxed),
			failures: self.failures.load(Ordering::Relaxed),
		}
	}
}
