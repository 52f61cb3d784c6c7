//! Idempotency-aware retry classification and the backoff schedule between attempts.
//!
//! [`should_retry`] is a pure function of the HTTP method and the attempt outcome. The
//! executor's retry loop asks it once per attempt and, on `true`, sleeps for
//! [`RetryPolicy::backoff`] before trying again.

// crates.io
use rand::Rng;
// self
use crate::_prelude::*;

/// Client errors that are definitive: retrying cannot change the outcome.
pub const NON_RETRYABLE_STATUS_CODES: [u16; 24] = [
	400, 401, 402, 403, 404, 405, 406, 407, 409, 410, 411, 412, 413, 414, 415, 416, 417, 422,
	423, 424, 426, 428, 431, 451,
];

/// Server errors that usually clear up on their own.
pub const TRANSIENT_STATUS_CODES: [u16; 4] = [500, 502, 503, 504];

/// What a single attempt produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
	/// A response arrived with this status.
	Status(StatusCode),
	/// The call failed below the HTTP layer (network error, no response).
	NoResponse,
}

/// Returns `true` for methods whose repeated execution has the same effect as one execution.
pub fn is_idempotent(method: &Method) -> bool {
	matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS | Method::PUT | Method::DELETE)
}

/// Returns `true` for definitive client errors (every 4xx listed except 429).
pub fn is_non_retryable_status(status: StatusCode) -> bool {
	NON_RETRYABLE_STATUS_CODES.contains(&status.as_u16())
}

/// Returns `true` for transient server errors and rate limiting.
pub fn is_transient_status(status: StatusCode) -> bool {
	status == StatusCode::TOO_MANY_REQUESTS || TRANSIENT_STATUS_CODES.contains(&status.as_u16())
}

/// Decides whether an attempt may be repeated.
///
/// POST and PATCH are never retried. Idempotent methods are retried after a network failure,
/// a 429, or a 500/502/503/504; every other status is final.
pub fn should_retry(method: &Method, outcome: AttemptOutcome) -> bool {
	if !is_idempotent(method) {
		return false;
	}

	match outcome {
		AttemptOutcome::NoResponse => true,
		AttemptOutcome::Status(status) if is_non_retryable_status(status) => false,
		AttemptOutcome::Status(status) => is_transient_status(status),
	}
}

/// Retry budget and exponential backoff schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Maximum number of retries after the first attempt.
	pub max_retries: u32,
	/// Wait before the first retry.
	pub wait_min: Duration,
	/// Upper bound for any single wait.
	pub wait_max: Duration,
}
impl RetryPolicy {
	/// Default retry count.
	pub const DEFAULT_MAX_RETRIES: u32 = 3;
	/// Default initial wait.
	pub const DEFAULT_WAIT_MIN: Duration = Duration::from_secs(1);
	/// Default wait ceiling.
	pub const DEFAULT_WAIT_MAX: Duration = Duration::from_secs(30);

	/// Creates a policy; `wait_max` is raised to `wait_min` when smaller.
	pub fn new(max_retries: u32, wait_min: Duration, wait_max: Duration) -> Self {
		Self { max_retries, wait_min, wait_max: wait_max.max(wait_min) }
	}

	/// Disables retries entirely.
	pub fn disabled() -> Self {
		Self::new(0, Duration::ZERO, Duration::ZERO)
	}

	/// Returns `true` when another attempt is allowed after `retries_done` retries.
	pub fn has_budget(&self, retries_done: u32) -> bool {
		retries_done < self.max_retries
	}

	/// Upper bound of the wait before retry number `retry` (zero-based): `wait_min * 2^retry`,
	/// capped at `wait_max`.
	pub fn backoff_ceiling(&self, retry: u32) -> Duration {
		let factor = 2_u32.saturating_pow(retry.min(16));

		self.wait_min.saturating_mul(factor).min(self.wait_max)
	}

	/// Wait before retry number `retry`, with equal jitter: half the ceiling plus a random
	/// share of the other half.
	pub fn backoff(&self, retry: u32) -> Duration {
		let ceiling = self.backoff_ceiling(retry);
		let half = ceiling / 2;
		let spread = ceiling.saturating_sub(half);

		if spread.is_zero() {
			return ceiling;
		}

		let jitter = rand::rng().random_range(0.0..=1.0);

		half + spread.mul_f64(jitter)
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self::new(Self::DEFAULT_MAX_RETRIES, Self::DEFAULT_WAIT_MIN, Self::DEFAULT_WAIT_MAX)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const IDEMPOTENT: [Method; 5] =
		[Method::GET, Method::HEAD, Method::OPTIONS, Method::PUT, Method::DELETE];

	fn status(code: u16) -> AttemptOutcome {
		AttemptOutcome::Status(StatusCode::from_u16(code).expect("Status fixture should be valid."))
	}

	#[test]
	fn post_and_patch_never_retry() {
		for method in [Method::POST, Method::PATCH] {
			assert!(!should_retry(&method, AttemptOutcome::NoResponse));

			for code in [200, 400, 404, 429, 500, 502, 503, 504] {
				assert!(!should_retry(&method, status(code)), "{method} {code}");
			}
		}
	}

	#[test]
	fn idempotent_methods_retry_transient_statuses() {
		for method in IDEMPOTENT {
			for code in [500, 502, 503, 504, 429] {
				assert!(should_retry(&method, status(code)), "{method} {code}");
			}

			assert!(should_retry(&method, AttemptOutcome::NoResponse));
		}
	}

	#[test]
	fn definitive_client_errors_never_retry() {
		for method in IDEMPOTENT.iter().chain([Method::POST, Method::PATCH].iter()) {
			for code in NON_RETRYABLE_STATUS_CODES {
				assert!(!should_retry(method, status(code)), "{method} {code}");
			}
		}
	}

	#[test]
	fn other_statuses_are_final() {
		for code in [200, 201, 204, 301, 501, 505] {
			assert!(!should_retry(&Method::GET, status(code)), "GET {code}");
		}
	}

	#[test]
	fn backoff_grows_exponentially_within_bounds() {
		let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(700));

		assert_eq!(policy.backoff_ceiling(0), Duration::from_millis(100));
		assert_eq!(policy.backoff_ceiling(1), Duration::from_millis(200));
		assert_eq!(policy.backoff_ceiling(2), Duration::from_millis(400));
		assert_eq!(policy.backoff_ceiling(3), Duration::from_millis(700));
		assert_eq!(policy.backoff_ceiling(40), Duration::from_millis(700));

		for retry in 0..6 {
			let wait = policy.backoff(retry);
			let ceiling = policy.backoff_ceiling(retry);

			assert!(wait >= ceiling / 2 && wait <= ceiling, "retry {retry}: {wait:?}");
		}
	}

	#[test]
	fn budget_counts_retries_not_attempts() {
		let policy = RetryPolicy::new(2, Duration::ZERO, Duration::ZERO);

		assert!(policy.has_budget(0));
		assert!(policy.has_budget(1));
		assert!(!policy.has_budget(2));
		assert!(!RetryPolicy::disabled().has_budget(0));
	}
}
